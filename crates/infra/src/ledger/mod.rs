//! Loan record store.

mod in_memory;
mod query;

pub use in_memory::InMemoryLoanLedger;
pub use query::LoanQuery;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use circulation_core::{BookId, LendingResult, LoanId, Money, UserId};
use circulation_lending::{Loan, LoanFilter};

/// Durable loan records. Checks and writes for one user are serialized.
pub trait LoanLedger: Send + Sync {
    /// Create an open loan after the duplicate and borrow-limit checks.
    fn open_loan(
        &self,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> LendingResult<Loan>;

    /// Set the return date and freeze the fine.
    fn close_loan(&self, loan_id: LoanId, returned_at: DateTime<Utc>) -> LendingResult<Loan>;

    /// Mark the loan paid if `tendered` covers the fine recomputed now.
    fn record_payment(&self, loan_id: LoanId, tendered: Money) -> LendingResult<Loan>;

    fn get(&self, loan_id: LoanId) -> LendingResult<Loan>;

    fn query(&self, filter: LoanFilter) -> LendingResult<LoanQuery>;

    fn active_count(&self, user_id: UserId) -> LendingResult<usize>;

    /// Sum of live fines over the user's unpaid loans, open or returned.
    fn outstanding_total(&self, user_id: UserId) -> LendingResult<Money>;

    fn open_count_for_book(&self, book_id: BookId) -> LendingResult<u32>;
}

impl<L> LoanLedger for Arc<L>
where
    L: LoanLedger + ?Sized,
{
    fn open_loan(
        &self,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> LendingResult<Loan> {
        (**self).open_loan(user_id, book_id, issue_date, due_date)
    }

    fn close_loan(&self, loan_id: LoanId, returned_at: DateTime<Utc>) -> LendingResult<Loan> {
        (**self).close_loan(loan_id, returned_at)
    }

    fn record_payment(&self, loan_id: LoanId, tendered: Money) -> LendingResult<Loan> {
        (**self).record_payment(loan_id, tendered)
    }

    fn get(&self, loan_id: LoanId) -> LendingResult<Loan> {
        (**self).get(loan_id)
    }

    fn query(&self, filter: LoanFilter) -> LendingResult<LoanQuery> {
        (**self).query(filter)
    }

    fn active_count(&self, user_id: UserId) -> LendingResult<usize> {
        (**self).active_count(user_id)
    }

    fn outstanding_total(&self, user_id: UserId) -> LendingResult<Money> {
        (**self).outstanding_total(user_id)
    }

    fn open_count_for_book(&self, book_id: BookId) -> LendingResult<u32> {
        (**self).open_count_for_book(book_id)
    }
}
