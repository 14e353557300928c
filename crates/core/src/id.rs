//! Strongly-typed identifiers used across the lending domain.
//!
//! The three logical tables (accounts, books, loans) all use positive integer
//! keys, so every identifier is a transparent `u64` newtype.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::LendingError;

/// Identifier of an account (library member or administrator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

/// Identifier of a book (catalog entry with a copy count).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(u64);

/// Identifier of a loan record. Assigned by the ledger.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(u64);

macro_rules! impl_int_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(&self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u64> for $t {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LendingError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = u64::from_str(s.trim())
                    .map_err(|e| LendingError::validation(format!("{}: {}", $name, e)))?;
                if raw == 0 {
                    return Err(LendingError::validation(format!("{}: must be positive", $name)));
                }
                Ok(Self(raw))
            }
        }
    };
}

impl_int_newtype!(AccountId, "AccountId");
impl_int_newtype!(BookId, "BookId");
impl_int_newtype!(LoanId, "LoanId");

/// Account ids appear as `user_id` in most operations; the alias keeps
/// signatures readable without a second type.
pub type UserId = AccountId;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        let id: BookId = " 42 ".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_zero_and_garbage() {
        assert!(matches!("0".parse::<LoanId>(), Err(LendingError::Validation(_))));
        assert!(matches!("abc".parse::<AccountId>(), Err(LendingError::Validation(_))));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&LoanId::new(7)).unwrap();
        assert_eq!(json, "7");
    }
}
