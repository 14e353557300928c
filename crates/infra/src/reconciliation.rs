//! Books whose availability may have drifted from their open loans.
//!
//! An entry is recorded whenever a copy could not be given back after its
//! retries ran out. Operators (or a periodic job) drain the queue by running
//! the availability audit for each book.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use circulation_core::{BookId, LendingError};

/// Why a book was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftCause {
    /// Releasing a reserved copy after a failed issuance did not succeed.
    CompensationFailed,
    /// Returning a copy after a closed loan did not succeed.
    ReleaseFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingReconciliation {
    pub book_id: BookId,
    pub cause: DriftCause,
    /// `kind()` of the last error seen.
    pub last_error: &'static str,
    pub first_seen: DateTime<Utc>,
    /// Failures recorded for this book since it was last cleared.
    pub occurrences: u32,
}

#[derive(Debug, Default)]
pub struct ReconciliationQueue {
    entries: Mutex<BTreeMap<BookId, PendingReconciliation>>,
}

impl ReconciliationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, book_id: BookId, cause: DriftCause, error: &LendingError, at: DateTime<Utc>) {
        let mut entries = self.entries.lock();
        entries
            .entry(book_id)
            .and_modify(|e| {
                e.cause = cause;
                e.last_error = error.kind();
                e.occurrences = e.occurrences.saturating_add(1);
            })
            .or_insert(PendingReconciliation {
                book_id,
                cause,
                last_error: error.kind(),
                first_seen: at,
                occurrences: 1,
            });
    }

    /// Entries ordered by book id.
    pub fn pending(&self) -> Vec<PendingReconciliation> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn contains(&self, book_id: BookId) -> bool {
        self.entries.lock().contains_key(&book_id)
    }

    /// Drop the entry for a book after its availability was corrected.
    pub fn clear(&self, book_id: BookId) -> Option<PendingReconciliation> {
        self.entries.lock().remove(&book_id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
