use std::mem;

use crate::{align::is_aligned, align_to, error::ConfigError};

/// Width of the size header stored right before every payload.
pub const HEADER_WIDTH: usize = mem::size_of::<usize>();

/// Default payload alignment, matching what `malloc` promises on most targets.
pub const DEFAULT_ALIGNMENT: usize = 2 * mem::size_of::<usize>();

/// Default number of guard bytes following every payload.
pub const DEFAULT_GUARD_WIDTH: usize = 16;

/// Allocator tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  alignment: usize,
  guard_width: usize,
}

impl Config {
  /// Validates and builds a configuration.
  ///
  /// `alignment` must be a power of two no smaller than the alignment of
  /// `usize`, so that the header word in front of an aligned payload is
  /// itself aligned. `guard_width` must be nonzero.
  pub fn new(
    alignment: usize,
    guard_width: usize,
  ) -> Result<Self, ConfigError> {
    if !alignment.is_power_of_two() {
      return Err(ConfigError::AlignmentNotPowerOfTwo(alignment));
    }

    let min = mem::align_of::<usize>();
    if alignment < min {
      return Err(ConfigError::AlignmentTooSmall {
        align: alignment,
        min,
      });
    }

    if guard_width == 0 {
      return Err(ConfigError::ZeroGuard);
    }

    Ok(Self {
      alignment,
      guard_width,
    })
  }

  pub fn alignment(&self) -> usize {
    self.alignment
  }

  pub fn guard_width(&self) -> usize {
    self.guard_width
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      alignment: DEFAULT_ALIGNMENT,
      guard_width: DEFAULT_GUARD_WIDTH,
    }
  }
}

/// Where the pieces of a block live relative to its raw extent.
///
/// ```text
///   extent                 payload (aligned)
///   │                      │
///   ▼                      ▼
///   ┌─────────┬───────────┬─────────────────────┬──────────────┬──────┐
///   │ padding │  header   │   payload (size)    │ guard (0xff) │ slack│
///   └─────────┴───────────┴─────────────────────┴──────────────┴──────┘
///              payload-8                         payload+size
/// ```
///
/// The padding and the trailing slack together never exceed
/// `alignment - 1` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
  alignment: usize,
  guard_width: usize,
}

impl BlockLayout {
  pub fn new(config: Config) -> Self {
    Self {
      alignment: config.alignment,
      guard_width: config.guard_width,
    }
  }

  pub fn alignment(&self) -> usize {
    self.alignment
  }

  pub fn guard_width(&self) -> usize {
    self.guard_width
  }

  /// Bytes to request from the growth source for a payload of `size` bytes.
  ///
  /// Returns `None` if the total does not fit in a `usize`.
  pub fn extent_size(
    &self,
    size: usize,
  ) -> Option<usize> {
    size
      .checked_add(HEADER_WIDTH)?
      .checked_add(self.alignment - 1)?
      .checked_add(self.guard_width)
  }

  /// Offset of the payload from the start of an extent at address `base`.
  ///
  /// This is the lowest aligned address at or above `base + HEADER_WIDTH`.
  pub fn payload_offset(
    &self,
    base: usize,
  ) -> usize {
    let payload = align_to!(base + HEADER_WIDTH, self.alignment);
    debug_assert!(is_aligned(payload, self.alignment));
    payload - base
  }

  /// Offset of the header word relative to the payload.
  pub const fn header_offset(&self) -> isize {
    -(HEADER_WIDTH as isize)
  }

  /// The header word of the block whose payload starts at `payload`.
  ///
  /// # Safety
  ///
  /// `payload` must have been placed by this layout inside a live extent.
  pub unsafe fn header_ptr(
    &self,
    payload: *const u8,
  ) -> *mut usize {
    unsafe { payload.offset(self.header_offset()) as *mut usize }
  }

  /// Offset of the first guard byte relative to the payload.
  pub const fn guard_offset(
    &self,
    size: usize,
  ) -> usize {
    size
  }
}

impl Default for BlockLayout {
  fn default() -> Self {
    Self::new(Config::default())
  }
}
