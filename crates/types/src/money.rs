//! Whole-unit currency amounts.
//!
//! Prices, coverage and liabilities are carried as whole currency units with no
//! fractional minor units. Any computation that can produce a fraction (percentage
//! coverage, for instance) must go through [`round_half_up`] so that every component
//! rounds the same way.

/// An amount of money in whole currency units.
pub type Amount = i64;

/// Rounds to the nearest whole unit, with halves rounding towards positive infinity.
///
/// `2.5` becomes `3`, `-2.5` becomes `-2`.
pub fn round_half_up(value: f64) -> Amount {
    (value + 0.5).floor() as Amount
}

/// Returns `percentage` percent of `amount`, rounded with [`round_half_up`].
///
/// A non-finite percentage is treated as 0.
pub fn percent_of(amount: Amount, percentage: f64) -> Amount {
    if !percentage.is_finite() {
        return 0;
    }
    round_half_up(amount as f64 * percentage / 100.0)
}
