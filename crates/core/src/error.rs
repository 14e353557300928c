//! Lending error model.

use serde::Serialize;
use thiserror::Error;

use crate::id::{AccountId, BookId, LoanId, UserId};
use crate::money::Money;

/// Result type used across the lending engine.
pub type LendingResult<T> = Result<T, LendingError>;

/// The record an error refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Resource {
    Account(AccountId),
    Book(BookId),
    Loan(LoanId),
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Resource::Account(id) => write!(f, "account {id}"),
            Resource::Book(id) => write!(f, "book {id}"),
            Resource::Loan(id) => write!(f, "loan {id}"),
        }
    }
}

/// Every failure the engine can surface to a caller.
///
/// All variants are recoverable business outcomes except `InvariantViolation`,
/// which signals corrupted availability state and must never be observed
/// under correct operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LendingError {
    #[error("{0} not found")]
    NotFound(Resource),

    #[error("forbidden for account {account_id}: {reason}")]
    Forbidden { account_id: AccountId, reason: String },

    #[error("no available copies of book {book_id}")]
    Unavailable { book_id: BookId },

    #[error("user {user_id} already has an active loan for book {book_id}")]
    DuplicateActiveLoan { user_id: UserId, book_id: BookId },

    #[error("user {user_id} reached the borrow limit ({limit} active loans)")]
    BorrowLimitExceeded { user_id: UserId, limit: usize },

    #[error("loan {loan_id} already returned")]
    AlreadyReturned { loan_id: LoanId },

    #[error("insufficient payment for loan {loan_id}: required {required}, tendered {tendered}")]
    InsufficientPayment {
        loan_id: LoanId,
        required: Money,
        tendered: Money,
    },

    /// Lock acquisition on a book or user partition timed out.
    #[error("{0} is busy, try again")]
    Busy(Resource),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("request by user {user_id} for book {book_id} was cancelled")]
    Cancelled { user_id: UserId, book_id: BookId },
}

impl LendingError {
    pub fn account_not_found(id: AccountId) -> Self {
        Self::NotFound(Resource::Account(id))
    }

    pub fn book_not_found(id: BookId) -> Self {
        Self::NotFound(Resource::Book(id))
    }

    pub fn loan_not_found(id: LoanId) -> Self {
        Self::NotFound(Resource::Loan(id))
    }

    pub fn forbidden(account_id: AccountId, reason: impl Into<String>) -> Self {
        Self::Forbidden {
            account_id,
            reason: reason.into(),
        }
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable code for transport adapters.
    pub fn kind(&self) -> &'static str {
        match self {
            LendingError::NotFound(_) => "not_found",
            LendingError::Forbidden { .. } => "forbidden",
            LendingError::Unavailable { .. } => "unavailable",
            LendingError::DuplicateActiveLoan { .. } => "duplicate_active_loan",
            LendingError::BorrowLimitExceeded { .. } => "borrow_limit_exceeded",
            LendingError::AlreadyReturned { .. } => "already_returned",
            LendingError::InsufficientPayment { .. } => "insufficient_payment",
            LendingError::Busy(_) => "busy",
            LendingError::InvariantViolation(_) => "invariant_violation",
            LendingError::Validation(_) => "validation_error",
            LendingError::Conflict(_) => "conflict",
            LendingError::Cancelled { .. } => "cancelled",
        }
    }

    /// Whether retrying the same call later can succeed without caller changes.
    pub fn is_transient(&self) -> bool {
        matches!(self, LendingError::Busy(_) | LendingError::Unavailable { .. })
    }
}
