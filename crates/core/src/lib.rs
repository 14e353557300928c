//! `circulation-core`: foundation building blocks for the lending engine.
//!
//! This crate contains pure primitives (no storage or locking policy).

pub mod cancel;
pub mod clock;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use cancel::CancelToken;
pub use clock::{Clock, FixedClock, SystemClock};
pub use entity::Entity;
pub use error::{LendingError, LendingResult, Resource};
pub use id::{AccountId, BookId, LoanId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
