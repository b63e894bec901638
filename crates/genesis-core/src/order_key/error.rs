//! Order key decoding errors

use thiserror::Error;

/// Reasons a persisted `(magnitude, digits)` pair is not a canonical key
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderKeyError {
    /// No digits at all (the zero value is stored as a single `0` digit)
    #[error("Order key has no digits")]
    Empty,

    /// Stored magnitude disagrees with the number of digits
    #[error("Order key magnitude {magnitude} does not match {digits} digits")]
    MagnitudeMismatch { magnitude: usize, digits: usize },

    /// Trailing zero digit on a non-zero key
    #[error("Order key is not canonical: trailing zero digit at position {0}")]
    TrailingZero(usize),
}
