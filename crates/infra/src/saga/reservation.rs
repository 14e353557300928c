//! Reserved copies that have not yet been committed to the ledger.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, warn};

use circulation_core::{BookId, LendingResult};
use circulation_lending::ReleaseOutcome;

use crate::inventory::InventoryStore;
use crate::reconciliation::{DriftCause, ReconciliationQueue};
use crate::retry::RetryPolicy;

/// Per-book count of copies between the shelf and the ledger.
///
/// The engine keeps one for issuances (reserved, not yet on the ledger) and
/// one for returns (closed on the ledger, not yet back on the shelf). The
/// availability audit adds both to the open-loan count.
#[derive(Debug, Default)]
pub struct InFlightCopies {
    counts: RwLock<HashMap<BookId, Arc<AtomicU32>>>,
}

impl InFlightCopies {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, book_id: BookId) -> Arc<AtomicU32> {
        if let Some(c) = self.counts.read().get(&book_id) {
            return Arc::clone(c);
        }
        Arc::clone(self.counts.write().entry(book_id).or_default())
    }

    /// A ticket for `book_id` that counts nothing until `mark` is called.
    pub fn ticket(&self, book_id: BookId) -> InFlightTicket {
        InFlightTicket {
            counter: self.counter(book_id),
            counted: AtomicBool::new(false),
        }
    }

    /// A ticket already counted.
    pub fn enter(&self, book_id: BookId) -> InFlightTicket {
        let ticket = self.ticket(book_id);
        ticket.mark();
        ticket
    }

    pub fn count(&self, book_id: BookId) -> u32 {
        self.counts
            .read()
            .get(&book_id)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }
}

/// One copy in flight. Counted at most once; dropping it uncounts.
///
/// `mark` and `unmark` take `&self` so they can run from an inventory hook
/// under the book's row lock.
#[derive(Debug)]
pub struct InFlightTicket {
    counter: Arc<AtomicU32>,
    counted: AtomicBool,
}

impl InFlightTicket {
    pub fn mark(&self) {
        if !self.counted.swap(true, Ordering::SeqCst) {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn unmark(&self) {
        if self.counted.swap(false, Ordering::SeqCst) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn is_counted(&self) -> bool {
        self.counted.load(Ordering::SeqCst)
    }
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        self.unmark();
    }
}

/// Give one copy back, retrying transient failures. `on_returned` runs under
/// the row lock of the attempt that succeeds.
///
/// Exhausted retries are logged and the book is queued for the availability
/// audit; `None` is returned in that case.
pub fn release_with_retry<I>(
    inventory: &I,
    book_id: BookId,
    policy: &RetryPolicy,
    queue: &ReconciliationQueue,
    cause: DriftCause,
    on_returned: &dyn Fn(),
) -> Option<ReleaseOutcome>
where
    I: InventoryStore + ?Sized,
{
    match policy.run(|_| inventory.release_with(book_id, on_returned), |e| e.is_transient()) {
        Ok(outcome) => Some(outcome),
        Err((error, attempts)) => {
            warn!(%book_id, attempts, error = %error, ?cause, "copy release failed; queued for reconciliation");
            queue.record(book_id, cause, &error, Utc::now());
            None
        }
    }
}

/// A reserved copy. Dropping the guard without `commit` gives it back.
///
/// Holds an in-flight ticket for the book. It is counted under the row lock
/// that takes the copy and uncounted either under the row lock that gives it
/// back or after `commit`, so the audit never sees the copy as neither
/// reserved nor lent.
#[must_use = "dropping the guard immediately releases the reserved copy"]
pub struct ReservationGuard<'a, I>
where
    I: InventoryStore + ?Sized,
{
    inventory: &'a I,
    book_id: BookId,
    policy: &'a RetryPolicy,
    queue: &'a ReconciliationQueue,
    remaining: u32,
    armed: bool,
    ticket: InFlightTicket,
}

impl<'a, I> ReservationGuard<'a, I>
where
    I: InventoryStore + ?Sized,
{
    /// Reserve one copy of `book_id`. Nothing is held on failure.
    pub fn acquire(
        inventory: &'a I,
        book_id: BookId,
        in_flight: &InFlightCopies,
        policy: &'a RetryPolicy,
        queue: &'a ReconciliationQueue,
    ) -> LendingResult<Self> {
        let ticket = in_flight.ticket(book_id);
        let remaining = inventory.reserve_with(book_id, &|| ticket.mark())?;
        Ok(Self {
            inventory,
            book_id,
            policy,
            queue,
            remaining,
            armed: true,
            ticket,
        })
    }

    /// Copies left on the shelf right after this reservation.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Keep the copy: the loan is on the ledger.
    pub fn commit(mut self) {
        self.armed = false;
    }

    /// Give the copy back now. `None` when the release had to be queued.
    pub fn compensate(mut self) -> Option<ReleaseOutcome> {
        self.armed = false;
        self.release()
    }

    fn release(&self) -> Option<ReleaseOutcome> {
        debug!(book_id = %self.book_id, "releasing reserved copy");
        release_with_retry(
            self.inventory,
            self.book_id,
            self.policy,
            self.queue,
            DriftCause::CompensationFailed,
            &|| self.ticket.unmark(),
        )
    }
}

impl<I> Drop for ReservationGuard<'_, I>
where
    I: InventoryStore + ?Sized,
{
    fn drop(&mut self) {
        if self.armed {
            self.armed = false;
            let _ = self.release();
        }
    }
}
