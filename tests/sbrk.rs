//! The program break is process-wide, so this file holds a single test and
//! gets a process of its own.

#![cfg(unix)]

use std::slice;

use guardalloc::{GUARD_BYTE, GuardedAllocator, POISON_BYTE, Sbrk};

#[test]
fn sbrk_backed_allocator() {
  let _ = env_logger::builder().is_test(true).try_init();

  let mut allocator = GuardedAllocator::sbrk();

  let before = Sbrk::program_break();
  let ptr = allocator.allocate(100).unwrap();
  let after = Sbrk::program_break();

  assert!(ptr as usize >= before as usize);
  assert!(after as usize >= ptr as usize + 100);
  assert!(after as usize - before as usize >= allocator.reserved());

  unsafe {
    for i in 0..100 {
      ptr.add(i).write(i as u8);
    }

    assert_eq!(allocator.header(ptr), 100);
    assert!(allocator.guard(ptr).iter().all(|&byte| byte == GUARD_BYTE));

    let grown = allocator.reallocate(ptr, 200).unwrap();
    assert!(grown > ptr);
    assert_eq!(slice::from_raw_parts(grown, 100), &(0..100).map(|i| i as u8).collect::<Vec<_>>()[..]);
    assert!(slice::from_raw_parts(ptr, 100).iter().all(|&byte| byte == POISON_BYTE));

    allocator.release(grown).unwrap();
  }

  assert_eq!(allocator.check_leaks(), Ok(()));
}
