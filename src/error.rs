use std::{fmt, io::Write, panic::Location, process};

use thiserror::Error;

/// Recoverable failures while sizing or obtaining a block.
///
/// Neither variant has side effects: the running total is unchanged and no
/// guard bytes have been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("allocation size overflowed the address space")]
  Overflow,
  #[error("growth source exhausted while requesting {requested} bytes")]
  Exhausted { requested: usize },
}

/// Rejected allocator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
  #[error("alignment {0} is not a power of two")]
  AlignmentNotPowerOfTwo(usize),
  #[error("alignment {align} is smaller than the header word alignment {min}")]
  AlignmentTooSmall { align: usize, min: usize },
  #[error("guard width must be nonzero")]
  ZeroGuard,
}

/// Returned by `GuardedAllocator::check_leaks` when blocks are still live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{bytes} bytes leaked across {blocks} live blocks")]
pub struct Leak {
  pub bytes: usize,
  pub blocks: usize,
}

/// The kind of heap corruption that was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Violation {
  #[error("double free of {ptr:#x}")]
  DoubleFree { ptr: usize },
  /// `offset` is measured from the start of the payload, so the first guard
  /// byte sits at `offset == size`.
  #[error("overwrite of {ptr:#x} at {offset}")]
  Overwrite { ptr: usize, offset: usize },
}

/// The operation that was running when corruption was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Release,
  Reallocate,
}

impl fmt::Display for Operation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Operation::Release => f.write_str("release"),
      Operation::Reallocate => f.write_str("reallocate"),
    }
  }
}

/// Heap corruption detected by the allocator.
///
/// This is never something to recover from. A harness may catch it to
/// assert on the detection path, otherwise [`Corruption::abort`] ends the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{}:{}: {operation}: {violation}", .location.file(), .location.line())]
pub struct Corruption {
  pub violation: Violation,
  pub operation: Operation,
  pub location: &'static Location<'static>,
}

impl Corruption {
  pub(crate) fn new(
    violation: Violation,
    operation: Operation,
    location: &'static Location<'static>,
  ) -> Self {
    Self {
      violation,
      operation,
      location,
    }
  }

  /// Reports the violation on stderr and terminates the process.
  pub fn abort(self) -> ! {
    log::error!("heap corruption detected: {self}");

    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{self}");
    let _ = stderr.flush();

    process::abort()
  }
}

/// Failure of `GuardedAllocator::reallocate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReallocError {
  #[error(transparent)]
  Alloc(#[from] AllocError),
  #[error(transparent)]
  Corrupted(#[from] Corruption),
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_corruption_report_format() {
    let location = Location::caller();
    let report = Corruption::new(
      Violation::Overwrite {
        ptr: 0x1000,
        offset: 12,
      },
      Operation::Release,
      location,
    )
    .to_string();

    assert_eq!(
      report,
      format!("{}:{}: release: overwrite of 0x1000 at 12", location.file(), location.line())
    );
  }

  #[test]
  fn test_double_free_report_names_pointer() {
    let report = Corruption::new(
      Violation::DoubleFree { ptr: 0xdead0 },
      Operation::Reallocate,
      Location::caller(),
    )
    .to_string();

    assert!(report.ends_with(": reallocate: double free of 0xdead0"), "{report}");
    assert!(report.starts_with(file!()), "{report}");
  }

  #[test]
  fn test_realloc_error_is_transparent() {
    let err = ReallocError::from(AllocError::Exhausted { requested: 64 });
    assert_eq!(err.to_string(), "growth source exhausted while requesting 64 bytes");
  }
}
