//! Review ratings.

use serde::{Deserialize, Serialize};

/// A review rating between 1 and 5 stars.
///
/// Input from forms may be fractional or out of range; [`Rating::clamped`]
/// rounds to the nearest integer and clamps into `1..=5`. Non-finite input
/// counts as zero, which clamps to one star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    /// Lowest allowed rating.
    pub const MIN: u8 = 1;
    /// Highest allowed rating.
    pub const MAX: u8 = 5;

    /// Round and clamp an arbitrary number into a valid rating.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to 1..=5 first
    pub fn clamped(value: f64) -> Self {
        let value = if value.is_finite() { value.round() } else { 0.0 };
        let clamped = value.clamp(f64::from(Self::MIN), f64::from(Self::MAX));
        Self(clamped as u8)
    }

    /// Get the number of stars.
    #[must_use]
    pub const fn stars(self) -> u8 {
        self.0
    }
}

/// Arithmetic mean of the given ratings, rounded to one decimal.
///
/// Returns `0.0` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)] // rating counts never approach 2^52
pub fn average_rating(ratings: &[i32]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }
    let sum: i64 = ratings.iter().copied().map(i64::from).sum();
    let mean = sum as f64 / ratings.len() as f64;
    (mean * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped() {
        assert_eq!(Rating::clamped(4.0).stars(), 4);
        assert_eq!(Rating::clamped(4.6).stars(), 5);
        assert_eq!(Rating::clamped(9.0).stars(), 5);
        assert_eq!(Rating::clamped(-3.0).stars(), 1);
        assert_eq!(Rating::clamped(0.0).stars(), 1);
        assert_eq!(Rating::clamped(f64::NAN).stars(), 1);
    }

    #[test]
    fn test_average_rating_empty() {
        assert!(average_rating(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_rating_rounds_to_one_decimal() {
        assert!((average_rating(&[5, 4, 4]) - 4.3).abs() < 1e-9);
        assert!((average_rating(&[1, 2]) - 1.5).abs() < 1e-9);
        assert!((average_rating(&[5]) - 5.0).abs() < 1e-9);
        // 4.25 rounds half up
        assert!((average_rating(&[4, 4, 5, 4]) - 4.3).abs() < 1e-9);
    }
}
