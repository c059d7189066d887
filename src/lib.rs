//! # guardalloc - A Heap Corruption Detecting Allocator
//!
//! This crate provides a **guarded bump allocator**: an arena-style allocator
//! that never reuses memory and checks every block for double frees and
//! buffer overruns when it is released. It exists to validate that a test run
//! performs no illegal heap operations and leaks nothing.
//!
//! ## Overview
//!
//! ```text
//!   Guarded Bump Allocator:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          GROWTH SOURCE                               │
//!   │                                                                      │
//!   │   ┌──────────┬──────────┬──────────┬─────────────────────────────┐   │
//!   │   │ block A  │ block B  │ block C  │        not yet claimed      │   │
//!   │   │  LIVE    │  FREED   │  LIVE    │                             │   │
//!   │   └──────────┴──────────┴──────────┴─────────────────────────────┘   │
//!   │                                    ▲                                 │
//!   │                                    │                                 │
//!   │                               next extent                            │
//!   │                                                                      │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Freed blocks are poisoned and marked, never handed out again.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   guardalloc
//!   ├── align      - Alignment helpers (align_to!)
//!   ├── error      - AllocError, Corruption, Leak, ...
//!   ├── guarded    - GuardedAllocator implementation
//!   ├── layout     - Config and BlockLayout
//!   └── source     - GrowthSource trait, Sbrk and Region
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use guardalloc::{GuardedAllocator, Region, Violation};
//!
//! let mut allocator = GuardedAllocator::new(Region::with_capacity(4096).unwrap());
//!
//! let ptr = allocator.allocate(16).unwrap();
//!
//! unsafe {
//!     // One byte too far.
//!     ptr.add(16).write(0);
//!
//!     let corruption = allocator.release(ptr).unwrap_err();
//!     assert_eq!(
//!         corruption.violation,
//!         Violation::Overwrite { ptr: ptr as usize, offset: 16 }
//!     );
//! }
//! ```
//!
//! ## How It Works
//!
//! Every block is carved out of a fresh extent:
//!
//! ```text
//!   Single Allocation:
//!   ┌─────────┬─────────────┬────────────────────────┬──────────────────┐
//!   │ padding │   header    │       User Data        │      guard       │
//!   │         │  size: N    │                        │  0xff 0xff ...   │
//!   │         │ (or FREED)  │    N bytes usable      │  guard_width     │
//!   └─────────┴─────────────┴────────────────────────┴──────────────────┘
//!                           ▲
//!                           └── Aligned pointer returned to user
//! ```
//!
//! On release the header is checked against the `FREED` sentinel and the
//! guard against its fill pattern. Any mismatch is reported as a
//! [`Corruption`]. Otherwise the payload is filled with `0xdb` and the
//! header set to `FREED`.
//!
//! The running total of live payload bytes is kept per allocator. It must
//! be back to zero once a well-behaved run has released everything.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No reuse**: Memory is claimed from the growth source and never returned
//! - **Aborts on corruption**: `free` and `realloc` never return past a
//!   detected violation

pub mod align;
mod error;
mod guarded;
mod layout;
mod source;

pub use error::{AllocError, ConfigError, Corruption, Leak, Operation, ReallocError, Violation};
pub use guarded::{FREED, GUARD_BYTE, GuardedAllocator, POISON_BYTE};
pub use layout::{BlockLayout, Config, DEFAULT_ALIGNMENT, DEFAULT_GUARD_WIDTH, HEADER_WIDTH};
#[cfg(unix)]
pub use source::Sbrk;
pub use source::{GrowthSource, Region};
