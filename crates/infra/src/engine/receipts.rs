//! Requests accepted and receipts returned by `LendingEngine`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use circulation_core::{AccountId, BookId, Money, UserId};
use circulation_lending::LoanView;

use crate::saga::IssuanceState;

/// Loan issued to `user_id` by the administrator `admin_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRequest {
    pub admin_id: AccountId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Self-service loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowRequest {
    pub user_id: UserId,
    pub book_id: BookId,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl BorrowRequest {
    pub fn new(user_id: UserId, book_id: BookId, issue_date: DateTime<Utc>, due_date: DateTime<Utc>) -> Self {
        Self {
            user_id,
            book_id,
            issue_date,
            due_date,
        }
    }

    /// The same request placed by an administrator on the user's behalf.
    pub fn issued_by(self, admin_id: AccountId) -> IssueRequest {
        IssueRequest {
            admin_id,
            user_id: self.user_id,
            book_id: self.book_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueReceipt {
    pub loan: LoanView,
    /// Copies left right after the reservation.
    pub available_copies: u32,
    pub saga_id: Uuid,
    pub state: IssuanceState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReturnReceipt {
    pub loan: LoanView,
    /// Frozen at the return instant.
    pub fine_amount: Money,
    /// `None` when the copy could not be put back and the book was queued
    /// for reconciliation.
    pub available_copies: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentReceipt {
    pub loan: LoanView,
    /// Amount tendered by the payer.
    pub paid_amount: Money,
    /// Fine the payment settled.
    pub fine_amount: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActiveLoans {
    pub user_id: UserId,
    pub active_loans: usize,
    pub can_borrow: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Outstanding {
    pub user_id: UserId,
    pub total_outstanding: Money,
}

/// Loan listing row with display fields from the account and catalog stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanListing {
    #[serde(flatten)]
    pub loan: LoanView,
    pub user_name: Option<String>,
    pub title: Option<String>,
}
