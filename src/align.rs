/// Rounds `value` up to the next multiple of `align`.
///
/// `align` must be a power of two. The caller is responsible for making sure
/// the addition cannot overflow.
///
/// # Examples
///
/// ```rust
/// use guardalloc::align_to;
///
/// assert_eq!(align_to!(13, 16), 16);
/// assert_eq!(align_to!(32, 16), 32);
/// assert_eq!(align_to!(0x1001, 0x1000), 0x2000);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + ($align - 1)) & !($align - 1)
  };
}

/// Returns `true` when `value` is a multiple of `align`.
#[inline]
pub fn is_aligned(
  value: usize,
  align: usize,
) -> bool {
  value & (align - 1) == 0
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_to() {
    for align in [1usize, 2, 8, 16, 64, 4096] {
      let mut alignments = Vec::new();

      for i in 0..10 {
        let sizes = (align * i + 1)..=(align * (i + 1));

        let expected_alignment = align * (i + 1);

        alignments.push((sizes, expected_alignment));
      }

      for (sizes, expected) in alignments {
        for size in sizes {
          assert_eq!(expected, align_to!(size, align));
          assert!(is_aligned(align_to!(size, align), align));
        }
      }
    }
  }

  #[test]
  fn test_zero_is_aligned() {
    assert_eq!(align_to!(0usize, 16usize), 0);
    assert!(is_aligned(0, 16));
    assert!(!is_aligned(24, 16));
  }
}
