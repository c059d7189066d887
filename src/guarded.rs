use std::{panic::Location, ptr, slice};

use log::{debug, trace};

use crate::{
  error::{AllocError, Corruption, Leak, Operation, ReallocError, Violation},
  layout::{BlockLayout, Config},
  source::GrowthSource,
};

/// Fill pattern of the guard region behind every payload.
pub const GUARD_BYTE: u8 = 0xff;

/// Fill pattern written over a payload when it is released.
pub const POISON_BYTE: u8 = 0xdb;

/// Header value of a block that has already been released.
pub const FREED: usize = usize::MAX;

/// A bump allocator that checks every release.
///
/// Each block is laid out as described by [`BlockLayout`]: a size header
/// right before the payload and `guard_width` bytes of [`GUARD_BYTE`] right
/// after it. Released blocks are poisoned and marked [`FREED`] but their
/// memory is never handed out again, so a later double free or a write into
/// the guard is always detectable.
///
/// `allocated` is the number of payload bytes currently live. A run that
/// releases everything it allocated ends with it at zero.
pub struct GuardedAllocator<S> {
  source: S,
  layout: BlockLayout,
  allocated: usize,
  live_blocks: usize,
  reserved: usize,
}

#[cfg(unix)]
impl GuardedAllocator<crate::source::Sbrk> {
  /// An allocator that grows the program break.
  pub fn sbrk() -> Self {
    Self::new(crate::source::Sbrk)
  }
}

impl<S: GrowthSource> GuardedAllocator<S> {
  pub fn new(source: S) -> Self {
    Self::with_config(source, Config::default())
  }

  pub fn with_config(
    source: S,
    config: Config,
  ) -> Self {
    Self {
      source,
      layout: BlockLayout::new(config),
      allocated: 0,
      live_blocks: 0,
      reserved: 0,
    }
  }

  pub fn source(&self) -> &S {
    &self.source
  }

  pub fn layout(&self) -> BlockLayout {
    self.layout
  }

  /// Payload bytes allocated and not yet released.
  pub fn allocated(&self) -> usize {
    self.allocated
  }

  /// Number of blocks allocated and not yet released.
  pub fn live_blocks(&self) -> usize {
    self.live_blocks
  }

  /// Total bytes claimed from the growth source, bookkeeping included.
  pub fn reserved(&self) -> usize {
    self.reserved
  }

  /// Fails if any block is still live.
  pub fn check_leaks(&self) -> Result<(), Leak> {
    if self.allocated == 0 && self.live_blocks == 0 {
      return Ok(());
    }

    Err(Leak {
      bytes: self.allocated,
      blocks: self.live_blocks,
    })
  }

  /// Allocates a guarded block of `size` bytes.
  ///
  /// A zero-sized request returns a null pointer and has no side effects.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<*mut u8, AllocError> {
    if size == 0 {
      return Ok(ptr::null_mut());
    }

    let total = self.layout.extent_size(size).ok_or_else(|| {
      debug!("allocate: request of {size} bytes overflows");
      AllocError::Overflow
    })?;

    let extent = self.source.extend(total).ok_or_else(|| {
      debug!("allocate: growth source exhausted at {total} bytes");
      AllocError::Exhausted { requested: total }
    })?;

    self.reserved += total;
    self.allocated += size;
    self.live_blocks += 1;

    let extent = extent.as_ptr();
    let offset = self.layout.payload_offset(extent as usize);

    unsafe {
      let payload = extent.add(offset);

      self.layout.header_ptr(payload).write(size);
      ptr::write_bytes(
        payload.add(self.layout.guard_offset(size)),
        GUARD_BYTE,
        self.layout.guard_width(),
      );

      trace!("allocate: {size} bytes at {payload:?} (extent {extent:?}, {total} bytes)");

      Ok(payload)
    }
  }

  /// Allocates `count * size` bytes and zeroes them.
  pub fn allocate_zeroed(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<*mut u8, AllocError> {
    let total = count.checked_mul(size).ok_or_else(|| {
      debug!("allocate_zeroed: {count} * {size} overflows");
      AllocError::Overflow
    })?;

    let payload = self.allocate(total)?;

    if !payload.is_null() {
      unsafe { ptr::write_bytes(payload, 0, total) };
    }

    Ok(payload)
  }

  /// Releases a block, checking it for a double free and for writes past its
  /// end.
  ///
  /// Releasing null does nothing. On success the payload is overwritten with
  /// [`POISON_BYTE`] and the header with [`FREED`].
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer returned by this allocator.
  #[track_caller]
  pub unsafe fn release(
    &mut self,
    ptr: *mut u8,
  ) -> Result<(), Corruption> {
    unsafe { self.release_from(ptr, Operation::Release, Location::caller()) }
  }

  /// Moves a block to a fresh allocation of at least `new_size` bytes.
  ///
  /// A null `ptr` behaves like [`allocate`](Self::allocate). Otherwise the
  /// old block is validated first, then a block of `max(new_size, size)`
  /// bytes is allocated, the first `min(size, new_size)` bytes are copied
  /// over and the old block is released. Blocks are never resized in place.
  ///
  /// If the old block is corrupted, or the fresh allocation fails, nothing
  /// is modified.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer returned by this allocator.
  #[track_caller]
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    new_size: usize,
  ) -> Result<*mut u8, ReallocError> {
    if ptr.is_null() {
      return Ok(self.allocate(new_size)?);
    }

    let location = Location::caller();

    unsafe {
      let size = self.validate(ptr, Operation::Reallocate, location)?;

      let fresh = self.allocate(size.max(new_size))?;
      ptr::copy_nonoverlapping(ptr, fresh, size.min(new_size));

      self.release_from(ptr, Operation::Reallocate, location)?;

      trace!("reallocate: {ptr:?} ({size} bytes) -> {fresh:?} ({new_size} bytes)");

      Ok(fresh)
    }
  }

  /// `malloc(3)`: null on failure.
  pub fn malloc(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    self.allocate(size).unwrap_or(ptr::null_mut())
  }

  /// `calloc(3)`: null on failure.
  pub fn calloc(
    &mut self,
    count: usize,
    size: usize,
  ) -> *mut u8 {
    self.allocate_zeroed(count, size).unwrap_or(ptr::null_mut())
  }

  /// `realloc(3)`: null on allocation failure, aborts on corruption.
  ///
  /// # Safety
  ///
  /// Same contract as [`reallocate`](Self::reallocate).
  #[track_caller]
  pub unsafe fn realloc(
    &mut self,
    ptr: *mut u8,
    new_size: usize,
  ) -> *mut u8 {
    match unsafe { self.reallocate(ptr, new_size) } {
      Ok(fresh) => fresh,
      Err(ReallocError::Alloc(_)) => ptr::null_mut(),
      Err(ReallocError::Corrupted(corruption)) => corruption.abort(),
    }
  }

  /// `free(3)`: aborts the process on corruption.
  ///
  /// # Safety
  ///
  /// Same contract as [`release`](Self::release).
  #[track_caller]
  pub unsafe fn free(
    &mut self,
    ptr: *mut u8,
  ) {
    if let Err(corruption) = unsafe { self.release(ptr) } {
      corruption.abort();
    }
  }

  /// Reads the header word of a block: its size, or [`FREED`].
  ///
  /// # Safety
  ///
  /// `ptr` must be a non-null pointer returned by this allocator.
  pub unsafe fn header(
    &self,
    ptr: *const u8,
  ) -> usize {
    unsafe { self.layout.header_ptr(ptr).read() }
  }

  /// The guard bytes of a live block.
  ///
  /// # Safety
  ///
  /// `ptr` must be a non-null pointer to a live block of this allocator.
  pub unsafe fn guard(
    &self,
    ptr: *const u8,
  ) -> &[u8] {
    unsafe {
      let size = self.layout.header_ptr(ptr).read();
      slice::from_raw_parts(ptr.add(self.layout.guard_offset(size)), self.layout.guard_width())
    }
  }

  unsafe fn release_from(
    &mut self,
    ptr: *mut u8,
    operation: Operation,
    location: &'static Location<'static>,
  ) -> Result<(), Corruption> {
    if ptr.is_null() {
      return Ok(());
    }

    unsafe {
      let size = self.validate(ptr, operation, location)?;

      self.allocated -= size;
      self.live_blocks -= 1;

      ptr::write_bytes(ptr, POISON_BYTE, size);
      self.layout.header_ptr(ptr).write(FREED);
    }

    trace!("{operation}: released {ptr:?}");

    Ok(())
  }

  /// Checks the header and the guard of a block and returns its size.
  unsafe fn validate(
    &self,
    ptr: *const u8,
    operation: Operation,
    location: &'static Location<'static>,
  ) -> Result<usize, Corruption> {
    let size = unsafe { self.layout.header_ptr(ptr).read() };

    if size == FREED {
      let violation = Violation::DoubleFree { ptr: ptr as usize };
      return Err(Corruption::new(violation, operation, location));
    }

    let guard = unsafe {
      slice::from_raw_parts(ptr.add(self.layout.guard_offset(size)), self.layout.guard_width())
    };

    match guard.iter().position(|&byte| byte != GUARD_BYTE) {
      Some(index) => {
        let violation = Violation::Overwrite {
          ptr: ptr as usize,
          offset: size + index,
        };
        Err(Corruption::new(violation, operation, location))
      }
      None => Ok(size),
    }
  }
}
