//! Fixed-point digit arithmetic behind [`OrderKey`](super::OrderKey)
//!
//! Fractions are stored as base-256 digits, most significant first, with an
//! implied radix point in front of the first digit. Intermediate values that
//! can reach 1.0 (interpolation across an unbounded gap) use a *wide* layout
//! with one extra leading digit holding the integer part.

use std::cmp::Ordering;

/// Digit radix (one byte per digit)
const RADIX: u32 = 256;

/// Digit appended when halving an odd sum: one half of the next digit place
pub(super) const HALF_DIGIT: u8 = 0x80;

/// Zero-extend `digits` to `magnitude` places (no-op if already longer)
pub(super) fn pad_in_place(digits: &mut Vec<u8>, magnitude: usize) {
    if digits.len() < magnitude {
        digits.resize(magnitude, 0);
    }
}

/// Zero-extend the shorter of two fractions so both share one magnitude
pub(super) fn pad_to_equal_magnitude(a: &mut Vec<u8>, b: &mut Vec<u8>) {
    let magnitude = a.len().max(b.len());
    pad_in_place(a, magnitude);
    pad_in_place(b, magnitude);
}

/// Strip trailing zero digits, keeping a single `0` for the zero value
pub(super) fn truncate_fraction(digits: &mut Vec<u8>) {
    while digits.len() > 1 && digits.last() == Some(&0) {
        digits.pop();
    }
    if digits.is_empty() {
        digits.push(0);
    }
}

/// Compare two fractions after zero-padding to a common magnitude
pub(super) fn compare_padded(a: &[u8], b: &[u8]) -> Ordering {
    let magnitude = a.len().max(b.len());
    let digit = |digits: &[u8], i: usize| digits.get(i).copied().unwrap_or(0);
    (0..magnitude)
        .map(|i| digit(a, i).cmp(&digit(b, i)))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Add two equal-magnitude digit strings in place (`a += b`)
///
/// Returns the carry out of the most significant digit.
pub(super) fn add(a: &mut [u8], b: &[u8]) -> bool {
    debug_assert_eq!(a.len(), b.len());
    let mut carry = 0u32;
    for (x, y) in a.iter_mut().zip(b).rev() {
        let sum = *x as u32 + *y as u32 + carry;
        *x = (sum % RADIX) as u8;
        carry = sum / RADIX;
    }
    carry != 0
}

/// Add one unit in the last place, returning the carry out of the top digit
pub(super) fn add_one(digits: &mut [u8]) -> bool {
    for digit in digits.iter_mut().rev() {
        let (next, overflowed) = digit.overflowing_add(1);
        *digit = next;
        if !overflowed {
            return false;
        }
    }
    true
}

/// Subtract in place (`a -= b`), both equal magnitude with `a >= b`
pub(super) fn sub(a: &mut [u8], b: &[u8]) {
    debug_assert_eq!(a.len(), b.len());
    let mut borrow = 0i32;
    for (x, y) in a.iter_mut().zip(b).rev() {
        let mut diff = *x as i32 - *y as i32 - borrow;
        borrow = 0;
        if diff < 0 {
            diff += RADIX as i32;
            borrow = 1;
        }
        *x = diff as u8;
    }
    debug_assert_eq!(borrow, 0, "subtraction underflow");
}

/// Divide a digit string by a small divisor in place, returning the remainder
pub(super) fn div_small(digits: &mut [u8], divisor: u64) -> u64 {
    debug_assert!(divisor > 0);
    let divisor = divisor as u128;
    let mut remainder = 0u128;
    for digit in digits.iter_mut() {
        let value = remainder * RADIX as u128 + *digit as u128;
        *digit = (value / divisor) as u8;
        remainder = value % divisor;
    }
    remainder as u64
}

/// Exact midpoint of two fractions
///
/// Pads both to equal magnitude, sums digit-wise with carry propagation, then
/// halves from the most significant digit down. An odd final sum extends the
/// result by one digit place. The result is canonical.
pub(super) fn average(low: &[u8], high: &[u8]) -> Vec<u8> {
    let mut sum = low.to_vec();
    let mut other = high.to_vec();
    pad_to_equal_magnitude(&mut sum, &mut other);

    let carry = add(&mut sum, &other);

    let mut remainder = carry as u32;
    for digit in sum.iter_mut() {
        let value = remainder * RADIX + *digit as u32;
        *digit = (value / 2) as u8;
        remainder = value % 2;
    }
    if remainder != 0 {
        sum.push(HALF_DIGIT);
    }

    truncate_fraction(&mut sum);
    sum
}

/// Smallest step above `value` at its own magnitude
///
/// If adding one unit in the last place would carry past 1.0 (every digit is
/// `0xff`), the step is taken one digit place further down instead.
pub(super) fn increment(value: &[u8]) -> Vec<u8> {
    let mut next = value.to_vec();
    if add_one(&mut next) {
        next = value.to_vec();
        next.push(1);
    }
    truncate_fraction(&mut next);
    next
}

/// Number of extra digit places needed so a one-unit gap splits into `parts`
pub(super) fn places_for(parts: u64) -> usize {
    let mut places = 0;
    let mut reach = 1u128;
    while reach < parts as u128 {
        reach *= RADIX as u128;
        places += 1;
    }
    places
}

/// Widen a fraction to `magnitude` places with a leading integer digit
pub(super) fn widen(fraction: &[u8], magnitude: usize) -> Vec<u8> {
    let mut wide = Vec::with_capacity(magnitude + 1);
    wide.push(0);
    wide.extend_from_slice(fraction);
    pad_in_place(&mut wide, magnitude + 1);
    wide
}

/// The value 1.0 in the wide layout at `magnitude` places
pub(super) fn wide_one(magnitude: usize) -> Vec<u8> {
    let mut wide = vec![0; magnitude + 1];
    wide[0] = 1;
    wide
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_keeps_single_zero() {
        let mut digits = vec![0, 0, 0];
        truncate_fraction(&mut digits);
        assert_eq!(digits, vec![0]);

        let mut digits = vec![0x12, 0x00, 0x34, 0x00];
        truncate_fraction(&mut digits);
        assert_eq!(digits, vec![0x12, 0x00, 0x34]);
    }

    #[test]
    fn test_average_even_sum() {
        // 0x20 and 0x40 average to 0x30 without extra precision
        assert_eq!(average(&[0x20], &[0x40]), vec![0x30]);
    }

    #[test]
    fn test_average_odd_sum_extends_precision() {
        // Adjacent digits split into a half step one place down
        assert_eq!(average(&[0x20], &[0x21]), vec![0x20, 0x80]);
    }

    #[test]
    fn test_average_carry_into_top() {
        // 0xff + 0xff carries out of the top digit, halving brings it back
        assert_eq!(average(&[0xff], &[0xff, 0x02]), vec![0xff, 0x01]);
        assert_eq!(average(&[0xc0], &[0xe0]), vec![0xd0]);
    }

    #[test]
    fn test_average_mixed_magnitudes() {
        assert_eq!(average(&[0x10], &[0x10, 0x02]), vec![0x10, 0x01]);
    }

    #[test]
    fn test_increment_same_magnitude() {
        assert_eq!(increment(&[0x80]), vec![0x81]);
        assert_eq!(increment(&[0x12, 0xff]), vec![0x13]);
    }

    #[test]
    fn test_increment_grows_on_overflow() {
        assert_eq!(increment(&[0xff]), vec![0xff, 0x01]);
        assert_eq!(increment(&[0xff, 0xff]), vec![0xff, 0xff, 0x01]);
    }

    #[test]
    fn test_compare_padded() {
        assert_eq!(compare_padded(&[0x80], &[0x80, 0x00]), Ordering::Equal);
        assert_eq!(compare_padded(&[0x80], &[0x80, 0x01]), Ordering::Less);
        assert_eq!(compare_padded(&[0x81], &[0x80, 0xff]), Ordering::Greater);
    }

    #[test]
    fn test_sub_and_div_small() {
        let mut a = vec![0x01, 0x00, 0x00];
        sub(&mut a, &[0x00, 0x00, 0x01]);
        assert_eq!(a, vec![0x00, 0xff, 0xff]);

        let mut value = vec![0x01, 0x00];
        let remainder = div_small(&mut value, 3);
        assert_eq!(value, vec![0x00, 0x55]);
        assert_eq!(remainder, 1);
    }

    #[test]
    fn test_places_for() {
        assert_eq!(places_for(1), 0);
        assert_eq!(places_for(2), 1);
        assert_eq!(places_for(256), 1);
        assert_eq!(places_for(257), 2);
        assert_eq!(places_for(1001), 2);
    }
}
