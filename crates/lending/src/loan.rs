//! Loan entity and its lifecycle transitions.
//!
//! ```text
//! open ──close──▶ returned (fine frozen)
//!  │                  │
//!  └──settle──▶ paid ◀┘
//! ```
//!
//! The stored `fine_amount` of an open loan is only a cache. Anything that
//! decides on money recomputes it through `FineCalculator`.
//!
//! A loan settled while open and returned later with a larger fine is
//! unpaid again; only the difference to what was settled is due.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circulation_core::{BookId, Entity, LendingError, LendingResult, LoanId, Money, UserId};

use crate::fine::FineCalculator;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loan {
    id: LoanId,
    book_id: BookId,
    user_id: UserId,
    issue_date: DateTime<Utc>,
    due_date: DateTime<Utc>,
    return_date: Option<DateTime<Utc>>,
    fine_amount: Money,
    paid: bool,
    #[serde(default)]
    settled: Money,
}

/// What a payment attempt did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// The loan flipped to paid.
    Settled { fine: Money },
    /// The loan was already paid; nothing changed.
    AlreadyPaid { fine: Money },
}

impl Loan {
    /// A new open loan with no fine and nothing paid.
    pub fn open(
        id: LoanId,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> LendingResult<Self> {
        if due_date < issue_date {
            return Err(LendingError::validation(format!(
                "due date {due_date} is before issue date {issue_date}"
            )));
        }
        Ok(Self {
            id,
            book_id,
            user_id,
            issue_date,
            due_date,
            return_date: None,
            fine_amount: Money::ZERO,
            paid: false,
            settled: Money::ZERO,
        })
    }

    pub fn loan_id(&self) -> LoanId {
        self.id
    }

    pub fn book_id(&self) -> BookId {
        self.book_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn issue_date(&self) -> DateTime<Utc> {
        self.issue_date
    }

    pub fn due_date(&self) -> DateTime<Utc> {
        self.due_date
    }

    pub fn return_date(&self) -> Option<DateTime<Utc>> {
        self.return_date
    }

    /// Stored fine. Frozen for returned loans, a stale cache for open ones.
    pub fn stored_fine(&self) -> Money {
        self.fine_amount
    }

    pub fn is_paid(&self) -> bool {
        self.paid
    }

    /// Fine covered by earlier payments.
    pub fn settled(&self) -> Money {
        self.settled
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_open() && now > self.due_date
    }

    /// Fine as of `now`: frozen value once returned, live accrual otherwise.
    pub fn accrued_fine(&self, fines: &FineCalculator, now: DateTime<Utc>) -> Money {
        fines.compute(self.due_date, self.return_date.unwrap_or(now))
    }

    /// Still owed as of `now`.
    pub fn balance(&self, fines: &FineCalculator, now: DateTime<Utc>) -> Money {
        if self.paid {
            return Money::ZERO;
        }
        self.accrued_fine(fines, now).saturating_sub(self.settled)
    }

    /// Close the loan at `returned_at` and freeze its fine.
    ///
    /// A paid loan whose frozen fine exceeds what was settled becomes unpaid.
    pub fn close(&mut self, fines: &FineCalculator, returned_at: DateTime<Utc>) -> LendingResult<Money> {
        if !self.is_open() {
            return Err(LendingError::AlreadyReturned { loan_id: self.id });
        }
        self.return_date = Some(returned_at);
        self.fine_amount = fines.compute(self.due_date, returned_at);
        if self.paid && self.fine_amount > self.settled {
            self.paid = false;
        }
        Ok(self.fine_amount)
    }

    /// Mark the fine paid if `tendered` covers the freshly recomputed balance.
    pub fn settle(
        &mut self,
        fines: &FineCalculator,
        tendered: Money,
        now: DateTime<Utc>,
    ) -> LendingResult<Settlement> {
        if self.paid {
            return Ok(Settlement::AlreadyPaid { fine: self.fine_amount });
        }
        let fine = self.accrued_fine(fines, now);
        let required = fine.saturating_sub(self.settled);
        if tendered < required {
            return Err(LendingError::InsufficientPayment {
                loan_id: self.id,
                required,
                tendered,
            });
        }
        self.fine_amount = fine;
        self.settled = fine;
        self.paid = true;
        Ok(Settlement::Settled { fine })
    }

    /// Display snapshot with the fine recomputed for open loans.
    pub fn view(&self, fines: &FineCalculator, now: DateTime<Utc>) -> LoanView {
        let fine_amount = if self.is_open() {
            self.accrued_fine(fines, now)
        } else {
            self.fine_amount
        };
        LoanView {
            loan_id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            issue_date: self.issue_date,
            due_date: self.due_date,
            return_date: self.return_date,
            fine_amount,
            paid: self.paid,
            balance_due: self.balance(fines, now),
            overdue: self.is_overdue(now),
            days_late: FineCalculator::days_late(self.due_date, self.return_date.unwrap_or(now)),
        }
    }
}

impl Entity for Loan {
    type Id = LoanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Read-side projection of a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub fine_amount: Money,
    pub paid: bool,
    pub balance_due: Money,
    pub overdue: bool,
    pub days_late: u64,
}
