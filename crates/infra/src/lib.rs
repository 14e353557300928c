//! Infrastructure layer: stores, locking, compensation, and the lending engine.

pub mod config;
pub mod engine;
pub mod inventory;
pub mod ledger;
pub mod locks;
pub mod reconciliation;
pub mod retry;
pub mod saga;


pub use config::{ConfigError, LendingConfig};
pub use engine::{
    ActiveLoans, BorrowRequest, IssueReceipt, IssueRequest, LendingEngine, LoanListing, Outstanding,
    PaymentReceipt, ReturnReceipt,
};
pub use inventory::{Catalog, InMemoryInventoryStore, InventoryStore};
pub use ledger::{InMemoryLoanLedger, LoanLedger, LoanQuery};
pub use reconciliation::{DriftCause, PendingReconciliation, ReconciliationQueue};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use saga::{IssuanceSaga, IssuanceState};
