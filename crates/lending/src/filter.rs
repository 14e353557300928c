//! Loan query predicates and ordering.

use core::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circulation_core::UserId;

use crate::loan::Loan;

/// Optional predicates for loan listings. The default matches every loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanFilter {
    pub user_id: Option<UserId>,
    pub only_open: bool,
    pub only_unpaid: bool,
    /// Open and past the due date.
    pub only_overdue: bool,
}

impl LoanFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn open(mut self) -> Self {
        self.only_open = true;
        self
    }

    pub fn unpaid(mut self) -> Self {
        self.only_unpaid = true;
        self
    }

    pub fn overdue(mut self) -> Self {
        self.only_overdue = true;
        self
    }

    pub fn matches(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        if self.user_id.is_some_and(|u| u != loan.user_id()) {
            return false;
        }
        if self.only_open && !loan.is_open() {
            return false;
        }
        if self.only_unpaid && loan.is_paid() {
            return false;
        }
        if self.only_overdue && !loan.is_overdue(now) {
            return false;
        }
        true
    }
}

/// Listing order: most recently issued first, newer loan id first on ties.
pub fn newest_first(a: &Loan, b: &Loan) -> Ordering {
    b.issue_date()
        .cmp(&a.issue_date())
        .then_with(|| b.loan_id().cmp(&a.loan_id()))
}
