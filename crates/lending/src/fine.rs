//! Overdue fine computation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circulation_core::{Money, ValueObject};

/// Default charge per whole calendar day late, in minor units.
pub const DEFAULT_DAILY_RATE: Money = Money::from_minor(5);

/// Pure fine schedule: a flat charge per calendar day past the due date.
///
/// Holds no state besides the rate, so identical inputs always produce
/// identical outputs.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FineCalculator {
    daily_rate: Money,
}

impl ValueObject for FineCalculator {}

impl Default for FineCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_DAILY_RATE)
    }
}

impl FineCalculator {
    pub const fn new(daily_rate: Money) -> Self {
        Self { daily_rate }
    }

    pub fn daily_rate(&self) -> Money {
        self.daily_rate
    }

    /// Whole calendar days between the due date and `as_of`, time of day
    /// ignored. Zero when `as_of` is not after `due`.
    pub fn days_late(due: DateTime<Utc>, as_of: DateTime<Utc>) -> u64 {
        if as_of <= due {
            return 0;
        }
        let days = (as_of.date_naive() - due.date_naive()).num_days();
        u64::try_from(days).unwrap_or(0)
    }

    /// Fine accrued on a loan due at `due`, evaluated at `as_of`.
    pub fn compute(&self, due: DateTime<Utc>, as_of: DateTime<Utc>) -> Money {
        self.daily_rate.saturating_mul(Self::days_late(due, as_of))
    }
}
