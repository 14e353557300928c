//! Lending orchestration across accounts, inventory, and the loan ledger.
//!
//! The three stores share no transaction. Issuance reserves a copy first
//! and commits to the ledger second, releasing the copy if the ledger
//! refuses. Return closes the loan first and releases the copy second,
//! queueing the book for reconciliation if the release fails. No store lock
//! is held while another store is called.

mod receipts;

pub use receipts::{
    ActiveLoans, BorrowRequest, IssueReceipt, IssueRequest, LoanListing, Outstanding, PaymentReceipt,
    ReturnReceipt,
};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, info_span, warn};

use circulation_auth::{
    AccountLookup, InMemoryAccountDirectory, require_active, require_admin, require_borrower,
    require_owner_or_admin,
};
use circulation_core::{
    AccountId, BookId, CancelToken, Clock, LendingError, LendingResult, LoanId, Money, UserId,
};
use circulation_lending::{Availability, Book, FineCalculator, LoanFilter, Reconciliation};

use crate::config::LendingConfig;
use crate::inventory::{Catalog, InMemoryInventoryStore, InventoryStore};
use crate::ledger::{InMemoryLoanLedger, LoanLedger, LoanQuery};
use crate::reconciliation::{DriftCause, PendingReconciliation, ReconciliationQueue};
use crate::saga::{InFlightCopies, IssuanceSaga, IssuanceState, ReservationGuard, release_with_retry};

pub struct LendingEngine<A, I, L> {
    accounts: A,
    inventory: I,
    ledger: L,
    clock: Arc<dyn Clock>,
    config: LendingConfig,
    fines: FineCalculator,
    reconciliation: ReconciliationQueue,
    issuing: InFlightCopies,
    returning: InFlightCopies,
}

impl LendingEngine<InMemoryAccountDirectory, InMemoryInventoryStore, InMemoryLoanLedger> {
    /// Engine over fresh in-memory stores.
    pub fn in_memory(config: LendingConfig, clock: Arc<dyn Clock>) -> Self {
        let inventory = InMemoryInventoryStore::new(config.lock_timeout);
        let ledger = InMemoryLoanLedger::new(&config, Arc::clone(&clock));
        Self::new(InMemoryAccountDirectory::new(), inventory, ledger, clock, config)
    }
}

impl<A, I, L> LendingEngine<A, I, L>
where
    A: AccountLookup,
    I: InventoryStore + Catalog,
    L: LoanLedger,
{
    pub fn new(accounts: A, inventory: I, ledger: L, clock: Arc<dyn Clock>, config: LendingConfig) -> Self {
        Self {
            fines: config.fine_calculator(),
            accounts,
            inventory,
            ledger,
            clock,
            config,
            reconciliation: ReconciliationQueue::new(),
            issuing: InFlightCopies::new(),
            returning: InFlightCopies::new(),
        }
    }

    pub fn accounts(&self) -> &A {
        &self.accounts
    }

    pub fn inventory(&self) -> &I {
        &self.inventory
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &LendingConfig {
        &self.config
    }

    // ----- issuance -----

    /// Issue a loan on behalf of a user. The caller must be an active admin.
    pub fn issue(&self, request: IssueRequest) -> LendingResult<IssueReceipt> {
        self.issue_cancellable(request, &CancelToken::new())
    }

    pub fn issue_cancellable(&self, request: IssueRequest, cancel: &CancelToken) -> LendingResult<IssueReceipt> {
        let _span = info_span!(
            "issue",
            admin_id = %request.admin_id,
            user_id = %request.user_id,
            book_id = %request.book_id
        )
        .entered();
        self.run_issuance(
            Some(request.admin_id),
            request.user_id,
            request.book_id,
            request.issue_date,
            request.due_date,
            cancel,
        )
    }

    /// Self-service loan: the issuance flow without the admin check.
    pub fn borrow(&self, request: BorrowRequest) -> LendingResult<IssueReceipt> {
        self.borrow_cancellable(request, &CancelToken::new())
    }

    pub fn borrow_cancellable(&self, request: BorrowRequest, cancel: &CancelToken) -> LendingResult<IssueReceipt> {
        let _span = info_span!("borrow", user_id = %request.user_id, book_id = %request.book_id).entered();
        self.run_issuance(
            None,
            request.user_id,
            request.book_id,
            request.issue_date,
            request.due_date,
            cancel,
        )
    }

    fn validate_issuance(
        &self,
        admin_id: Option<AccountId>,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> LendingResult<()> {
        if let Some(admin_id) = admin_id {
            require_admin(admin_id, &self.accounts.exists(admin_id))?;
        }
        require_borrower(user_id, &self.accounts.exists(user_id))?;
        if due_date < issue_date {
            return Err(LendingError::validation(format!(
                "due date {due_date} is before issue date {issue_date}"
            )));
        }
        self.inventory.availability(book_id)?;
        Ok(())
    }

    fn run_issuance(
        &self,
        admin_id: Option<AccountId>,
        user_id: UserId,
        book_id: BookId,
        issue_date: DateTime<Utc>,
        due_date: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> LendingResult<IssueReceipt> {
        let mut saga = IssuanceSaga::start(user_id, book_id);

        if let Err(e) = self.validate_issuance(admin_id, user_id, book_id, issue_date, due_date) {
            return Err(fail(&mut saga, e));
        }
        saga.advance(IssuanceState::Validated)?;

        let guard = match ReservationGuard::acquire(
            &self.inventory,
            book_id,
            &self.issuing,
            &self.config.compensation,
            &self.reconciliation,
        ) {
            Ok(guard) => guard,
            Err(e) => return Err(fail(&mut saga, e)),
        };
        saga.advance(IssuanceState::Reserved)?;

        if cancel.is_cancelled() {
            guard.compensate();
            return Err(fail(&mut saga, LendingError::Cancelled { user_id, book_id }));
        }

        let loan = match self.ledger.open_loan(user_id, book_id, issue_date, due_date) {
            Ok(loan) => loan,
            Err(e) => {
                guard.compensate();
                return Err(fail(&mut saga, e));
            }
        };
        let available_copies = guard.remaining();
        guard.commit();
        saga.advance(IssuanceState::Committed)?;

        info!(
            saga_id = %saga.id(),
            loan_id = %loan.loan_id(),
            available_copies,
            due_date = %loan.due_date(),
            "loan issued"
        );
        Ok(IssueReceipt {
            loan: loan.view(&self.fines, self.clock.now()),
            available_copies,
            saga_id: saga.id(),
            state: saga.state(),
        })
    }

    // ----- return and payment -----

    /// Close a loan owned by `user_id` and put the copy back on the shelf.
    pub fn return_loan(&self, user_id: UserId, loan_id: LoanId) -> LendingResult<ReturnReceipt> {
        let _span = info_span!("return", %user_id, %loan_id).entered();

        require_active(user_id, &self.accounts.exists(user_id))?;
        let loan = self.ledger.get(loan_id)?;
        if loan.user_id() != user_id {
            return Err(LendingError::forbidden(
                user_id,
                format!("loan {loan_id} belongs to another user"),
            ));
        }
        if !loan.is_open() {
            return Err(LendingError::AlreadyReturned { loan_id });
        }

        let now = self.clock.now();
        // Counted before the close so the audit never misses the copy.
        let returning = self.returning.enter(loan.book_id());
        let closed = self.ledger.close_loan(loan_id, now)?;
        let book_id = closed.book_id();
        let available_copies = release_with_retry(
            &self.inventory,
            book_id,
            &self.config.compensation,
            &self.reconciliation,
            DriftCause::ReleaseFailed,
            &|| returning.unmark(),
        )
        .map(|outcome| outcome.available_copies);
        drop(returning);

        info!(%book_id, fine = %closed.stored_fine(), ?available_copies, "loan returned");
        Ok(ReturnReceipt {
            loan: closed.view(&self.fines, now),
            fine_amount: closed.stored_fine(),
            available_copies,
        })
    }

    /// Settle the fine on a loan. Allowed for the borrower or an admin.
    pub fn pay(&self, payer_id: AccountId, loan_id: LoanId, amount: Money) -> LendingResult<PaymentReceipt> {
        let _span = info_span!("pay", %payer_id, %loan_id, %amount).entered();

        let status = self.accounts.exists(payer_id);
        let loan = self.ledger.get(loan_id)?;
        require_owner_or_admin(payer_id, &status, loan.user_id())?;

        let paid = self.ledger.record_payment(loan_id, amount)?;
        info!(fine_amount = %paid.stored_fine(), "payment recorded");
        Ok(PaymentReceipt {
            loan: paid.view(&self.fines, self.clock.now()),
            paid_amount: amount,
            fine_amount: paid.stored_fine(),
        })
    }

    // ----- queries -----

    pub fn loans(&self, filter: LoanFilter) -> LendingResult<LoanQuery> {
        self.ledger.query(filter)
    }

    /// `loans` with borrower display names and book titles attached.
    pub fn list_loans(&self, filter: LoanFilter) -> LendingResult<Vec<LoanListing>> {
        let query = self.ledger.query(filter)?;
        Ok(query
            .iter()
            .map(|loan| LoanListing {
                user_name: self.accounts.display_name(loan.user_id),
                title: self.inventory.title(loan.book_id),
                loan,
            })
            .collect())
    }

    pub fn active_loans(&self, user_id: UserId) -> LendingResult<ActiveLoans> {
        let active_loans = self.ledger.active_count(user_id)?;
        Ok(ActiveLoans {
            user_id,
            active_loans,
            can_borrow: active_loans < self.config.borrow_limit,
        })
    }

    pub fn outstanding(&self, user_id: UserId) -> LendingResult<Outstanding> {
        Ok(Outstanding {
            user_id,
            total_outstanding: self.ledger.outstanding_total(user_id)?,
        })
    }

    pub fn availability(&self, book_id: BookId) -> LendingResult<Availability> {
        self.inventory.availability(book_id)
    }

    // ----- catalog management -----

    pub fn register_book(&self, admin_id: AccountId, book: Book) -> LendingResult<Availability> {
        require_admin(admin_id, &self.accounts.exists(admin_id))?;
        let availability = self.inventory.register(book)?;
        info!(%admin_id, book_id = %availability.book_id, total_copies = availability.total_copies, "book registered");
        Ok(availability)
    }

    pub fn set_total_copies(
        &self,
        admin_id: AccountId,
        book_id: BookId,
        total_copies: u32,
    ) -> LendingResult<Availability> {
        let _span = info_span!("set_total_copies", %admin_id, %book_id, total_copies).entered();
        require_admin(admin_id, &self.accounts.exists(admin_id))?;
        let availability = self
            .inventory
            .set_total_copies(book_id, total_copies, &|| self.occupied(book_id))?;
        info!(available_copies = availability.available_copies, "book resized");
        Ok(availability)
    }

    /// Remove a book from circulation. Refused while any copy is on loan or
    /// being issued.
    pub fn retire_book(&self, admin_id: AccountId, book_id: BookId) -> LendingResult<()> {
        let _span = info_span!("retire_book", %admin_id, %book_id).entered();
        require_admin(admin_id, &self.accounts.exists(admin_id))?;

        self.inventory.remove(book_id, &|| {
            let open = self.ledger.open_count_for_book(book_id)?;
            let in_flight = self.issuing.count(book_id) + self.returning.count(book_id);
            if open > 0 || in_flight > 0 {
                return Err(LendingError::conflict(format!(
                    "book {book_id} has {open} open and {in_flight} pending loans"
                )));
            }
            Ok(())
        })?;
        self.reconciliation.clear(book_id);
        info!("book retired");
        Ok(())
    }

    // ----- reconciliation -----

    /// Reset a book's availability from the ledger and drop any queued entry.
    pub fn reconcile_book(&self, book_id: BookId) -> LendingResult<Reconciliation> {
        let _span = info_span!("reconcile_book", %book_id).entered();

        let fix = self.inventory.reconcile(book_id, &|| self.occupied(book_id))?;

        if fix.changed() {
            warn!(before = fix.before, after = fix.after, "availability corrected");
        }
        self.reconciliation.clear(book_id);
        Ok(fix)
    }

    pub fn pending_reconciliation(&self) -> Vec<PendingReconciliation> {
        self.reconciliation.pending()
    }

    /// Copies of `book_id` not on the shelf. Called under the book's row lock.
    ///
    /// Issuances are marked under that lock, so their count can only fall while
    /// it is held; reading it first counts a loan committing mid-scan twice at
    /// worst. Returns are marked before the ledger close and unmarked under the
    /// lock, so their count can only rise; reading it last does the same.
    /// Either race under-counts availability, never over-counts it.
    fn occupied(&self, book_id: BookId) -> LendingResult<u32> {
        let issuing = self.issuing.count(book_id);
        let open = self.ledger.open_count_for_book(book_id)?;
        let returning = self.returning.count(book_id);
        Ok(issuing.saturating_add(open).saturating_add(returning))
    }
}

fn fail(saga: &mut IssuanceSaga, err: LendingError) -> LendingError {
    let err = saga.abort(err);
    match &err {
        LendingError::InvariantViolation(_) => {
            error!(saga_id = %saga.id(), state = ?saga.state(), error = %err, "issuance failed");
        }
        _ => info!(saga_id = %saga.id(), state = ?saga.state(), error = err.kind(), "issuance rejected"),
    }
    err
}
