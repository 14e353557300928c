use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, info};

use circulation_core::{BookId, Clock, LendingError, LendingResult, LoanId, Money, Resource, UserId};
use circulation_lending::{FineCalculator, Loan, LoanFilter, Settlement, newest_first};

use super::{LoanLedger, LoanQuery};
use crate::config::LendingConfig;
use crate::locks::{LockError, RowTable};

/// All loans of one user. The unit of ledger locking.
#[derive(Debug, Default)]
struct UserLoans {
    loans: Vec<Loan>,
}

impl UserLoans {
    fn open_count(&self) -> usize {
        self.loans.iter().filter(|l| l.is_open()).count()
    }

    fn has_open(&self, book_id: BookId) -> bool {
        self.loans.iter().any(|l| l.is_open() && l.book_id() == book_id)
    }

    fn find_mut(&mut self, loan_id: LoanId) -> Option<&mut Loan> {
        self.loans.iter_mut().find(|l| l.loan_id() == loan_id)
    }
}

/// In-memory ledger partitioned by user.
///
/// Each user's loans sit behind one row lock, which makes the duplicate,
/// limit, and insert steps of `open_loan` atomic for that user. A separate
/// index maps loan ids to their owner so single-loan operations lock only
/// the owning partition.
pub struct InMemoryLoanLedger {
    partitions: RowTable<UserId, UserLoans>,
    owners: RwLock<HashMap<LoanId, UserId>>,
    next_id: AtomicU64,
    fines: FineCalculator,
    borrow_limit: usize,
    clock: Arc<dyn Clock>,
}

impl InMemoryLoanLedger {
    pub fn new(config: &LendingConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            partitions: RowTable::new(config.lock_timeout),
            owners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            fines: config.fine_calculator(),
            borrow_limit: config.borrow_limit,
            clock,
        }
    }

    fn owner_of(&self, loan_id: LoanId) -> LendingResult<UserId> {
        self.owners
            .read()
            .get(&loan_id)
            .copied()
            .ok_or_else(|| LendingError::loan_not_found(loan_id))
    }

    fn with_loan<R>(&self, loan_id: LoanId, f: impl FnOnce(&mut Loan) -> LendingResult<R>) -> LendingResult<R> {
        let user_id = self.owner_of(loan_id)?;
        self.partitions
            .with_row(&user_id, |loans| match loans.find_mut(loan_id) {
                Some(loan) => f(loan),
                None => Err(LendingError::loan_not_found(loan_id)),
            })
            .map_err(|e| match e {
                LockError::Missing => LendingError::loan_not_found(loan_id),
                LockError::Timeout(_) => LendingError::Busy(Resource::Loan(loan_id)),
            })?
    }

    /// Read one user's partition; a user with no loans reads as empty.
    fn read_user<R>(&self, user_id: UserId, mut f: impl FnMut(&UserLoans) -> R) -> LendingResult<R> {
        match self.partitions.with_row(&user_id, |loans| f(loans)) {
            Ok(r) => Ok(r),
            Err(LockError::Missing) => Ok(f(&UserLoans::default())),
            Err(LockError::Timeout(_)) => Err(LendingError::Busy(Resource::Account(user_id))),
        }
    }

    fn scan(&self, mut f: impl FnMut(&Loan)) -> LendingResult<()> {
        self.partitions
            .for_each(|_, partition| partition.loans.iter().for_each(&mut f))
            .map_err(|(user_id, _)| LendingError::Busy(Resource::Account(user_id)))
    }
}

impl std::fmt::Debug for InMemoryLoanLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLoanLedger")
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .field("fines", &self.fines)
            .field("borrow_limit", &self.borrow_limit)
            .finish_non_exhaustive()
    }
}

impl LoanLedger for InMemoryLoanLedger {
    fn open_loan(
        &self,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> LendingResult<Loan> {
        let limit = self.borrow_limit;
        self.partitions
            .with_row_or_insert(user_id, UserLoans::default, |partition| {
                if partition.has_open(book_id) {
                    return Err(LendingError::DuplicateActiveLoan { user_id, book_id });
                }
                if partition.open_count() >= limit {
                    return Err(LendingError::BorrowLimitExceeded { user_id, limit });
                }
                let loan_id = LoanId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
                let loan = Loan::open(loan_id, user_id, book_id, issue_date, due_date)?;
                partition.loans.push(loan.clone());
                self.owners.write().insert(loan_id, user_id);
                debug!(%loan_id, %user_id, %book_id, "loan opened");
                Ok(loan)
            })
            .map_err(|_| LendingError::Busy(Resource::Account(user_id)))?
    }

    fn close_loan(&self, loan_id: LoanId, returned_at: DateTime<Utc>) -> LendingResult<Loan> {
        let fines = self.fines;
        self.with_loan(loan_id, |loan| {
            let was_paid = loan.is_paid();
            let fine = loan.close(&fines, returned_at)?;
            debug!(%loan_id, %fine, "loan closed");
            if was_paid && !loan.is_paid() {
                info!(%loan_id, %fine, settled = %loan.settled(), "late return reopened a paid fine");
            }
            Ok(loan.clone())
        })
    }

    fn record_payment(&self, loan_id: LoanId, tendered: Money) -> LendingResult<Loan> {
        let fines = self.fines;
        let now = self.clock.now();
        self.with_loan(loan_id, |loan| {
            match loan.settle(&fines, tendered, now)? {
                Settlement::Settled { fine } => debug!(%loan_id, %fine, %tendered, "fine paid"),
                Settlement::AlreadyPaid { fine } => {
                    debug!(%loan_id, %fine, "payment ignored, loan already paid")
                }
            }
            Ok(loan.clone())
        })
    }

    fn get(&self, loan_id: LoanId) -> LendingResult<Loan> {
        self.with_loan(loan_id, |loan| Ok(loan.clone()))
    }

    fn query(&self, filter: LoanFilter) -> LendingResult<LoanQuery> {
        let now = self.clock.now();
        let mut matched = Vec::new();
        match filter.user_id {
            Some(user_id) => self.read_user(user_id, |partition| {
                matched.extend(partition.loans.iter().filter(|l| filter.matches(l, now)).cloned());
            })?,
            None => self.scan(|loan| {
                if filter.matches(loan, now) {
                    matched.push(loan.clone());
                }
            })?,
        }
        matched.sort_by(newest_first);
        Ok(LoanQuery::new(matched, self.fines, now))
    }

    fn active_count(&self, user_id: UserId) -> LendingResult<usize> {
        self.read_user(user_id, UserLoans::open_count)
    }

    fn outstanding_total(&self, user_id: UserId) -> LendingResult<Money> {
        let now = self.clock.now();
        let fines = self.fines;
        self.read_user(user_id, |partition| {
            partition
                .loans
                .iter()
                .map(|l| l.balance(&fines, now))
                .sum()
        })
    }

    fn open_count_for_book(&self, book_id: BookId) -> LendingResult<u32> {
        let mut open = 0u32;
        self.scan(|loan| {
            if loan.is_open() && loan.book_id() == book_id {
                open = open.saturating_add(1);
            }
        })?;
        Ok(open)
    }
}
