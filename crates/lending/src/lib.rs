//! Lending domain module.
//!
//! Business rules for copies, loans and fines, implemented as deterministic
//! domain logic (no locking, no storage, no clock).

pub mod book;
pub mod filter;
pub mod fine;
pub mod loan;

pub use book::{Availability, Book, BookDetails, Reconciliation, ReleaseOutcome};
pub use filter::{LoanFilter, newest_first};
pub use fine::{DEFAULT_DAILY_RATE, FineCalculator};
pub use loan::{Loan, LoanView, Settlement};
