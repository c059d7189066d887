//! Growth sources: where the raw extents behind every block come from.
//!
//! A growth source only ever moves forward. Every extent it hands out is
//! fresh, never overlaps a previous one and is never taken back, which is
//! what keeps the guard bytes of released blocks meaningful for the lifetime
//! of the allocator.

use std::{
  alloc::{self, Layout},
  mem,
  ptr::NonNull,
};

use crate::error::AllocError;

/// A monotonic supplier of raw memory.
///
/// # Safety
///
/// `GuardedAllocator` writes headers and guard bytes into every extent
/// without further checks, so an implementation must guarantee that each
/// `Some(extent)` returned by [`extend`](GrowthSource::extend):
///
/// - is valid for reads and writes of at least `bytes` bytes,
/// - does not overlap any extent handed out before,
/// - stays valid for as long as the source itself is alive.
///
/// Implementing the trait therefore requires `unsafe impl`:
///
/// ```compile_fail,E0200
/// use std::ptr::NonNull;
/// use guardalloc::GrowthSource;
///
/// struct Short;
///
/// impl GrowthSource for Short {
///   fn extend(
///     &mut self,
///     _bytes: usize,
///   ) -> Option<NonNull<u8>> {
///     None
///   }
/// }
/// ```
pub unsafe trait GrowthSource {
  /// Extends the managed memory by `bytes` and returns the start of the new
  /// extent, or `None` once the source is exhausted.
  ///
  /// The contents of the extent are unspecified.
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>>;
}

unsafe impl<S: GrowthSource + ?Sized> GrowthSource for &mut S {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    (**self).extend(bytes)
  }
}

/// Grows the process data segment with `sbrk(2)`.
///
/// The program break is process-wide state. Mixing this source with another
/// thread that moves the break is not supported.
#[cfg(unix)]
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

#[cfg(unix)]
impl Sbrk {
  /// Current program break, as reported by `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { libc::sbrk(0) as *mut u8 }
  }
}

#[cfg(unix)]
unsafe impl GrowthSource for Sbrk {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    let increment = libc::intptr_t::try_from(bytes).ok()?;

    let address = unsafe { libc::sbrk(increment) };

    if address == usize::MAX as *mut libc::c_void {
      return None;
    }

    NonNull::new(address as *mut u8)
  }
}

/// A fixed-capacity region taken from the system allocator once and then
/// handed out front to back.
///
/// Every allocator built on a `Region` is fully isolated from the others,
/// and running past the capacity is a clean, deterministic exhaustion. The
/// backing memory is returned to the system when the region is dropped.
#[derive(Debug)]
pub struct Region {
  base: NonNull<u8>,
  layout: Layout,
  capacity: usize,
  used: usize,
}

impl Region {
  pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
    let exhausted = AllocError::Exhausted {
      requested: capacity,
    };

    let layout = Layout::from_size_align(capacity.max(1), mem::align_of::<usize>())
      .map_err(|_| exhausted)?;

    let base = NonNull::new(unsafe { alloc::alloc(layout) }).ok_or(exhausted)?;

    Ok(Self {
      base,
      layout,
      capacity,
      used: 0,
    })
  }

  /// Usable bytes, as requested. A zero capacity still backs the region
  /// with a one-byte allocation, but never hands it out.
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes handed out so far.
  pub fn used(&self) -> usize {
    self.used
  }

  pub fn remaining(&self) -> usize {
    self.capacity() - self.used
  }

  /// Whether `ptr` falls inside this region.
  pub fn contains(
    &self,
    ptr: *const u8,
  ) -> bool {
    let start = self.base.as_ptr() as usize;
    (start..start + self.capacity()).contains(&(ptr as usize))
  }
}

unsafe impl GrowthSource for Region {
  fn extend(
    &mut self,
    bytes: usize,
  ) -> Option<NonNull<u8>> {
    if bytes > self.remaining() {
      return None;
    }

    let extent = unsafe { self.base.add(self.used) };
    self.used += bytes;

    Some(extent)
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    unsafe { alloc::dealloc(self.base.as_ptr(), self.layout) };
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_region_is_monotonic() {
    let mut region = Region::with_capacity(64).unwrap();

    let first = region.extend(16).unwrap();
    let second = region.extend(32).unwrap();

    assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 16);
    assert_eq!(region.used(), 48);
    assert_eq!(region.remaining(), 16);
    assert!(region.contains(second.as_ptr()));
  }

  #[test]
  fn test_region_exhaustion() {
    let mut region = Region::with_capacity(32).unwrap();

    assert!(region.extend(33).is_none());
    assert_eq!(region.used(), 0);

    assert!(region.extend(32).is_some());
    assert!(region.extend(1).is_none());
  }

  #[test]
  fn test_region_rejects_impossible_capacity() {
    assert_eq!(
      Region::with_capacity(usize::MAX).unwrap_err(),
      AllocError::Exhausted {
        requested: usize::MAX
      }
    );
  }

  #[test]
  fn test_zero_capacity_region() {
    let mut region = Region::with_capacity(0).unwrap();

    assert_eq!(region.capacity(), 0);
    assert_eq!(region.remaining(), 0);
    assert!(region.extend(1).is_none());
    assert!(!region.contains(region.base.as_ptr()));
  }

  #[test]
  fn test_borrowed_source() {
    fn grow<S: GrowthSource>(mut source: S) -> Option<NonNull<u8>> {
      source.extend(8)
    }

    let mut region = Region::with_capacity(8).unwrap();

    assert!(grow(&mut region).is_some());
    assert_eq!(region.remaining(), 0);
  }
}
