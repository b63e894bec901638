//! Fractional order keys for stable list ordering
//!
//! Timeline entries and graph nodes are kept in user-defined order. Storing
//! that order as integers means renumbering every entry after an insertion
//! point; an [`OrderKey`] instead comes from a dense total order, so a new key
//! can always be generated strictly between two existing ones and nothing
//! else ever changes.
//!
//! A key is a fraction in `[0, 1)` written as base-256 digits, most
//! significant first. Its *magnitude* is the number of digit places. Keys
//! are immutable values: every operation returns a new key and no
//! synchronization is needed to share them between threads.
//!
//! # Usage
//!
//! ```
//! use genesis_core::order_key::OrderKey;
//!
//! let first = OrderKey::single(None, None);
//! let last = OrderKey::single(Some(&first), None);
//! let middle = OrderKey::single(Some(&first), Some(&last));
//! assert!(first < middle && middle < last);
//!
//! // Bulk insertion keeps keys short
//! let mut batch = Vec::new();
//! OrderKey::multi(&mut batch, Some(&first), Some(&middle), 1000);
//! assert_eq!(batch.len(), 1000);
//! assert!(batch.iter().all(|key| key.magnitude() <= 4));
//! ```

mod digits;
mod error;
#[cfg(test)]
mod proptest_keys;

pub use error::OrderKeyError;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Position of an item in a densely-insertable total order
///
/// Always canonical: no trailing zero digit, except the zero value which is
/// the single digit `0`. Persisted as its `(magnitude, digits)` pair.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PersistedOrderKey", into = "PersistedOrderKey")]
pub struct OrderKey {
    digits: Vec<u8>,
}

/// Serialized shape of an [`OrderKey`]
#[derive(Serialize, Deserialize)]
struct PersistedOrderKey {
    magnitude: usize,
    digits: Vec<u8>,
}

impl OrderKey {
    /// The zero value, the lower end of the key space
    ///
    /// Never produced by [`single`](Self::single) or [`multi`](Self::multi);
    /// useful as an explicit lower bound.
    pub fn zero() -> Self {
        Self { digits: vec![0] }
    }

    /// Rebuild a key from its persisted `(magnitude, digits)` pair
    pub fn from_parts(magnitude: usize, digits: Vec<u8>) -> Result<Self, OrderKeyError> {
        if digits.is_empty() {
            return Err(OrderKeyError::Empty);
        }
        if magnitude != digits.len() {
            return Err(OrderKeyError::MagnitudeMismatch {
                magnitude,
                digits: digits.len(),
            });
        }
        if digits.len() > 1 && digits.last() == Some(&0) {
            return Err(OrderKeyError::TrailingZero(digits.len() - 1));
        }
        Ok(Self { digits })
    }

    /// Number of digit places
    pub fn magnitude(&self) -> usize {
        self.digits.len()
    }

    /// Base-256 digits, most significant first
    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    /// Whether this is the zero value
    pub fn is_zero(&self) -> bool {
        self.digits == [0]
    }

    /// Generate one key strictly between `low` and `high`
    ///
    /// `None` leaves that side unbounded. With both bounds the result is
    /// their exact midpoint; without an upper bound it is one unit in the
    /// last place above `low`; without a lower bound it is the midpoint of
    /// zero and `high`; with neither it is one half.
    ///
    /// # Panics
    ///
    /// If `low >= high`, or if `high` is zero and `low` is `None`.
    pub fn single(low: Option<&OrderKey>, high: Option<&OrderKey>) -> OrderKey {
        check_bounds(low, high);

        let digits = match (low, high) {
            (Some(low), Some(high)) => digits::average(&low.digits, &high.digits),
            (Some(low), None) => digits::increment(&low.digits),
            (None, Some(high)) => digits::average(&[0], &high.digits),
            (None, None) => vec![digits::HALF_DIGIT],
        };
        OrderKey { digits }
    }

    /// Append `count` strictly increasing keys between `low` and `high` to `out`
    ///
    /// The gap is split into `count + 1` near-equal steps at a precision just
    /// large enough to tell them apart, so key length grows with
    /// `log256(count)` instead of `count`. A missing `low` is zero and a
    /// missing `high` is one.
    ///
    /// # Panics
    ///
    /// Under the same conditions as [`single`](Self::single).
    pub fn multi(
        out: &mut Vec<OrderKey>,
        low: Option<&OrderKey>,
        high: Option<&OrderKey>,
        count: usize,
    ) {
        if count == 0 {
            return;
        }
        check_bounds(low, high);

        let zero = OrderKey::zero();
        let low = low.unwrap_or(&zero);
        let base_magnitude = low.magnitude().max(high.map_or(1, OrderKey::magnitude));
        let parts = (count as u64).saturating_add(1);
        let magnitude = base_magnitude + digits::places_for(parts);

        // Wide layout: one leading integer digit so an unbounded high can be 1.0
        let mut cursor = digits::widen(&low.digits, magnitude);
        let mut step = match high {
            Some(high) => digits::widen(&high.digits, magnitude),
            None => digits::wide_one(magnitude),
        };
        digits::sub(&mut step, &cursor);
        let remainder = digits::div_small(&mut step, parts) as u128;

        // cursor_i = low + floor(gap * i / parts), stepped without multiplying
        let parts = parts as u128;
        let mut error = 0u128;
        out.reserve(count);
        for _ in 0..count {
            digits::add(&mut cursor, &step);
            error += remainder;
            if error >= parts {
                error -= parts;
                digits::add_one(&mut cursor);
            }
            debug_assert_eq!(cursor[0], 0, "interpolated key reached 1.0");

            let mut fraction = cursor[1..].to_vec();
            digits::truncate_fraction(&mut fraction);
            out.push(OrderKey { digits: fraction });
        }
    }

    /// Total order of two keys, comparing digit-wise after zero-padding
    pub fn compare(a: &OrderKey, b: &OrderKey) -> Ordering {
        digits::compare_padded(&a.digits, &b.digits)
    }
}

/// Panic on requests with no room between the bounds
fn check_bounds(low: Option<&OrderKey>, high: Option<&OrderKey>) {
    match (low, high) {
        (Some(low), Some(high)) if OrderKey::compare(low, high) != Ordering::Less => {
            panic!("order key bounds out of order: low {} >= high {}", low, high);
        }
        (None, Some(high)) if high.is_zero() => {
            panic!("no order key exists below zero");
        }
        _ => {}
    }
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        OrderKey::compare(self, other)
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for digit in &self.digits {
            write!(f, "{:02x}", digit)?;
        }
        Ok(())
    }
}

impl fmt::Debug for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OrderKey({})", self)
    }
}

impl TryFrom<PersistedOrderKey> for OrderKey {
    type Error = OrderKeyError;

    fn try_from(persisted: PersistedOrderKey) -> Result<Self, Self::Error> {
        OrderKey::from_parts(persisted.magnitude, persisted.digits)
    }
}

impl From<OrderKey> for PersistedOrderKey {
    fn from(key: OrderKey) -> Self {
        PersistedOrderKey {
            magnitude: key.magnitude(),
            digits: key.digits,
        }
    }
}
