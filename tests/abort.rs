//! Uncaught corruption must take the whole process down. Each test re-runs
//! this binary filtered to itself, with `GUARDALLOC_CHILD` set, and checks
//! how the child died.

use std::{
  env,
  process::{Command, Output},
  ptr,
};

use guardalloc::{GuardedAllocator, Region};

const CHILD: &str = "GUARDALLOC_CHILD";

fn is_child(test: &str) -> bool {
  env::var(CHILD).as_deref() == Ok(test)
}

fn run_child(test: &str) -> Output {
  Command::new(env::current_exe().unwrap())
    .args([test, "--exact", "--nocapture", "--test-threads=1"])
    .env(CHILD, test)
    .output()
    .unwrap()
}

fn allocator() -> GuardedAllocator<Region> {
  let _ = env_logger::builder().is_test(true).try_init();
  GuardedAllocator::new(Region::with_capacity(4096).unwrap())
}

fn assert_aborted(
  output: &Output,
  expected: &str,
) {
  assert!(!output.status.success(), "child exited cleanly: {output:?}");

  #[cfg(unix)]
  {
    use std::os::unix::process::ExitStatusExt;
    assert_eq!(output.status.signal(), Some(libc::SIGABRT), "{output:?}");
  }

  let stderr = String::from_utf8_lossy(&output.stderr);
  assert!(stderr.contains(expected), "missing {expected:?} in:\n{stderr}");
  assert!(stderr.contains(&format!("{}:", file!())), "missing location in:\n{stderr}");
  assert!(!stderr.contains("unreachable"), "child kept running:\n{stderr}");
}

#[test]
fn double_free_aborts() {
  if is_child("double_free_aborts") {
    let mut allocator = allocator();
    let ptr = allocator.malloc(8);

    unsafe {
      allocator.free(ptr);
      allocator.free(ptr);
    }

    unreachable!("second free returned");
  }

  assert_aborted(&run_child("double_free_aborts"), ": release: double free of 0x");
}

#[test]
fn overwrite_aborts() {
  if is_child("overwrite_aborts") {
    let mut allocator = allocator();
    let ptr = allocator.malloc(10);

    unsafe {
      ptr::write_bytes(ptr, 0, 12);
      allocator.free(ptr);
    }

    unreachable!("free of an overwritten block returned");
  }

  assert_aborted(&run_child("overwrite_aborts"), " at 10\n");
}

#[test]
fn realloc_of_overwritten_block_aborts() {
  if is_child("realloc_of_overwritten_block_aborts") {
    let mut allocator = allocator();
    let ptr = allocator.malloc(4);

    unsafe {
      ptr.add(5).write(0);
      allocator.realloc(ptr, 64);
    }

    unreachable!("realloc of an overwritten block returned");
  }

  assert_aborted(
    &run_child("realloc_of_overwritten_block_aborts"),
    ": reallocate: overwrite of 0x",
  );
}
