use std::ptr;

use guardalloc::{GuardedAllocator, Sbrk};

/// Prints the current program break using `sbrk(0)`.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn main() {
  env_logger::init();

  let mut allocator = GuardedAllocator::sbrk();

  print_program_break("start");

  // --------------------------------------------------------------------
  // 1) A well-behaved block: allocate, use, release.
  // --------------------------------------------------------------------
  let first = allocator.malloc(12);
  println!("\n[1] Allocated 12 bytes at {:?}", first);

  unsafe {
    ptr::write_bytes(first, 0xab, 12);
    println!("[1] header = {}, guard = {:02x?}", allocator.header(first), allocator.guard(first));

    match allocator.release(first) {
      Ok(()) => println!("[1] Released, header is now {:#x}", allocator.header(first)),
      Err(corruption) => corruption.abort(),
    }
  }

  // --------------------------------------------------------------------
  // 2) Write two bytes past the end and watch the release catch it.
  // --------------------------------------------------------------------
  let second = allocator.malloc(8);
  println!("\n[2] Allocated 8 bytes at {:?}", second);

  unsafe {
    ptr::write_bytes(second, 0x00, 10);

    match allocator.release(second) {
      Ok(()) => println!("[2] Released without complaint?"),
      Err(corruption) => println!("[2] Caught: {corruption}"),
    }
  }

  // --------------------------------------------------------------------
  // 3) Grow a block. The data moves, the old block is poisoned.
  // --------------------------------------------------------------------
  let third = allocator.malloc(4);

  unsafe {
    third.cast::<u32>().write(0xdeadbeef);

    let grown = allocator.realloc(third, 64);
    println!("\n[3] Reallocated {:?} -> {:?}", third, grown);
    println!("[3] Value moved = {:#x}", grown.cast::<u32>().read());
    println!("[3] Old block now reads {:#x}", third.cast::<u32>().read());

    allocator.free(grown);
  }

  // --------------------------------------------------------------------
  // 4) Leak check. Block [2] was never released.
  // --------------------------------------------------------------------
  print_program_break("end");

  match allocator.check_leaks() {
    Ok(()) => println!("\n[4] No leaks"),
    Err(leak) => println!("\n[4] {leak}"),
  }
}
