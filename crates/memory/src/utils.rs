//! Alignment and padding helpers shared by every allocator
//!
//! All functions are pure integer arithmetic on addresses or offsets. The
//! `alignment` argument must be a non-zero power of two; this is checked with
//! `debug_assert!` only, callers validate it on their public entry points.

/// Aligns a value up to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use strata_memory::utils::align_up;
///
/// assert_eq!(align_up(7, 8), 8);
/// assert_eq!(align_up(8, 8), 8);
/// assert_eq!(align_up(9, 8), 16);
/// ```
#[inline(always)]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    (value + alignment - 1) & !(alignment - 1)
}

/// Aligns a value down to the nearest multiple of alignment
///
/// # Examples
/// ```
/// use strata_memory::utils::align_down;
///
/// assert_eq!(align_down(7, 8), 0);
/// assert_eq!(align_down(8, 8), 8);
/// assert_eq!(align_down(9, 8), 8);
/// ```
#[inline(always)]
pub const fn align_down(value: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    value & !(alignment - 1)
}

/// Checks if a value is aligned to the given alignment
#[inline(always)]
pub const fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert!(alignment.is_power_of_two());
    value & (alignment - 1) == 0
}

/// Bytes to add to `address` to reach the next multiple of `alignment`
///
/// An already aligned address needs no padding: the result is `0`, never a
/// full `alignment` step.
///
/// # Examples
/// ```
/// use strata_memory::utils::forward_padding;
///
/// assert_eq!(forward_padding(7, 8), 1);
/// assert_eq!(forward_padding(8, 8), 0);
/// assert_eq!(forward_padding(9, 8), 7);
/// ```
#[inline(always)]
pub const fn forward_padding(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    address.wrapping_neg() & (alignment - 1)
}

/// Like [`forward_padding`], but leaves at least `header_size` bytes in front
/// of the aligned address.
///
/// When the plain padding is too small for the header, it grows by whole
/// `alignment` steps so the result stays aligned.
///
/// # Examples
/// ```
/// use strata_memory::utils::forward_padding_with_header;
///
/// // 8 bytes of padding already fit an 8-byte header
/// assert_eq!(forward_padding_with_header(8, 16, 8), 8);
/// // aligned address, header must be carved out of a full step
/// assert_eq!(forward_padding_with_header(16, 16, 8), 16);
/// // small alignment, header spans several steps
/// assert_eq!(forward_padding_with_header(3, 4, 16), 17);
/// ```
#[inline]
pub const fn forward_padding_with_header(
    address: usize,
    alignment: usize,
    header_size: usize,
) -> usize {
    let mut padding = forward_padding(address, alignment);

    if padding < header_size {
        let needed = header_size - padding;
        padding += alignment * needed.div_ceil(alignment);
    }

    padding
}

/// Bytes between `address` and the previous multiple of `alignment`
///
/// # Examples
/// ```
/// use strata_memory::utils::backward_padding;
///
/// assert_eq!(backward_padding(9, 8), 1);
/// assert_eq!(backward_padding(16, 8), 0);
/// assert_eq!(backward_padding(15, 8), 7);
/// ```
#[inline(always)]
pub const fn backward_padding(address: usize, alignment: usize) -> usize {
    debug_assert!(alignment.is_power_of_two());
    address & (alignment - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 8, 0)]
    #[case(1, 8, 7)]
    #[case(7, 8, 1)]
    #[case(8, 8, 0)]
    #[case(13, 1, 0)]
    #[case(17, 16, 15)]
    #[case(4096, 4096, 0)]
    fn forward_padding_reaches_next_boundary(
        #[case] address: usize,
        #[case] alignment: usize,
        #[case] expected: usize,
    ) {
        let padding = forward_padding(address, alignment);
        assert_eq!(padding, expected);
        assert!(is_aligned(address + padding, alignment));
        assert!(padding < alignment);
    }

    #[rstest]
    #[case(0, 8, 16, 16)]
    #[case(1, 8, 16, 23)]
    #[case(4, 8, 4, 4)]
    #[case(5, 8, 16, 19)]
    #[case(32, 16, 16, 16)]
    #[case(33, 16, 16, 31)]
    #[case(3, 1, 16, 16)]
    fn header_padding_fits_header_and_stays_aligned(
        #[case] address: usize,
        #[case] alignment: usize,
        #[case] header: usize,
        #[case] expected: usize,
    ) {
        let padding = forward_padding_with_header(address, alignment, header);
        assert_eq!(padding, expected);
        assert!(padding >= header);
        assert!(is_aligned(address + padding, alignment));
        // never more than one extra step beyond what the header requires
        assert!(padding < header + alignment);
    }

    #[test]
    fn zero_header_matches_plain_padding() {
        for address in 0..64 {
            assert_eq!(
                forward_padding_with_header(address, 16, 0),
                forward_padding(address, 16)
            );
        }
    }

    #[test]
    fn backward_and_forward_are_complementary() {
        for address in 1..100usize {
            let back = backward_padding(address, 8);
            let fwd = forward_padding(address, 8);
            assert!(is_aligned(address - back, 8));
            if back != 0 {
                assert_eq!(back + fwd, 8);
            } else {
                assert_eq!(fwd, 0);
            }
        }
    }

    #[test]
    fn align_helpers() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_down(31, 16), 16);
        assert!(is_aligned(64, 32));
        assert!(!is_aligned(65, 32));
    }
}
