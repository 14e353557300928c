//! `circulation-auth`: account lookup contract and authorization checks.
//!
//! This crate is intentionally decoupled from transport and storage.

pub mod account;
pub mod authorize;
pub mod roles;

pub use account::{AccountLookup, AccountRecord, AccountStatus, InMemoryAccountDirectory};
pub use authorize::{require_active, require_admin, require_borrower, require_owner_or_admin};
pub use roles::Role;
