//! Book availability record.
//!
//! Every mutation keeps `0 <= available_copies <= total_copies`. A record
//! found outside those bounds is reported as an invariant violation instead of
//! being quietly repaired.

use serde::{Deserialize, Serialize};

use circulation_core::{BookId, Entity, LendingError, LendingResult, ValueObject};

/// Catalog fields the engine only reads (for display).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    pub genre: String,
}

impl BookDetails {
    pub fn new(title: impl Into<String>, author: impl Into<String>, genre: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            genre: genre.into(),
        }
    }
}

/// Snapshot of a book's copy counts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub book_id: BookId,
    pub total_copies: u32,
    pub available_copies: u32,
}

impl ValueObject for Availability {}

impl Availability {
    pub fn on_loan(&self) -> u32 {
        self.total_copies.saturating_sub(self.available_copies)
    }
}

/// Result of giving a copy back.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOutcome {
    pub available_copies: u32,
    /// The increment was dropped because the book was already at capacity.
    pub clamped: bool,
}

/// Correction applied by an availability audit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub book_id: BookId,
    pub before: u32,
    pub after: u32,
}

impl Reconciliation {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    id: BookId,
    details: BookDetails,
    total_copies: u32,
    available_copies: u32,
}

impl Book {
    /// Register a book. Rejects more available copies than owned.
    pub fn new(
        id: BookId,
        details: BookDetails,
        total_copies: u32,
        available_copies: u32,
    ) -> LendingResult<Self> {
        if available_copies > total_copies {
            return Err(LendingError::validation(format!(
                "book {id}: available copies ({available_copies}) cannot exceed total copies ({total_copies})"
            )));
        }
        Ok(Self {
            id,
            details,
            total_copies,
            available_copies,
        })
    }

    /// Register a book with every copy on the shelf.
    pub fn fully_stocked(id: BookId, details: BookDetails, total_copies: u32) -> Self {
        Self {
            id,
            details,
            total_copies,
            available_copies: total_copies,
        }
    }

    pub fn details(&self) -> &BookDetails {
        &self.details
    }

    pub fn total_copies(&self) -> u32 {
        self.total_copies
    }

    pub fn available_copies(&self) -> u32 {
        self.available_copies
    }

    pub fn availability(&self) -> Availability {
        Availability {
            book_id: self.id,
            total_copies: self.total_copies,
            available_copies: self.available_copies,
        }
    }

    fn check_bounds(&self) -> LendingResult<()> {
        if self.available_copies > self.total_copies {
            return Err(LendingError::invariant(format!(
                "book {}: available copies ({}) exceed total copies ({})",
                self.id, self.available_copies, self.total_copies
            )));
        }
        Ok(())
    }

    /// Take one copy off the shelf.
    pub fn reserve(&mut self) -> LendingResult<u32> {
        self.check_bounds()?;
        if self.available_copies == 0 {
            return Err(LendingError::Unavailable { book_id: self.id });
        }
        self.available_copies -= 1;
        Ok(self.available_copies)
    }

    /// Put one copy back, never above `total_copies`.
    pub fn release(&mut self) -> LendingResult<ReleaseOutcome> {
        self.check_bounds()?;
        let clamped = self.available_copies == self.total_copies;
        if !clamped {
            self.available_copies += 1;
        }
        Ok(ReleaseOutcome {
            available_copies: self.available_copies,
            clamped,
        })
    }

    /// Apply a signed change, clamped to `[0, total_copies]`.
    ///
    /// A decrease on an empty shelf is refused rather than clamped, matching
    /// `reserve`.
    pub fn adjust(&mut self, delta: i64) -> LendingResult<u32> {
        self.check_bounds()?;
        if delta < 0 && self.available_copies == 0 {
            return Err(LendingError::Unavailable { book_id: self.id });
        }
        let next = i64::from(self.available_copies).saturating_add(delta);
        let clamped = next.clamp(0, i64::from(self.total_copies));
        // In range [0, total_copies] so the conversion cannot fail.
        self.available_copies = u32::try_from(clamped).unwrap_or(0);
        Ok(self.available_copies)
    }

    /// Change the number of owned copies, given how many are out right now.
    ///
    /// Availability is re-derived as `total_copies - occupied`. Shrinking
    /// below the copies still out is refused.
    pub fn set_total_copies(&mut self, total_copies: u32, occupied: u32) -> LendingResult<u32> {
        if total_copies < occupied {
            return Err(LendingError::conflict(format!(
                "book {}: cannot own {total_copies} copies while {occupied} are out",
                self.id
            )));
        }
        self.total_copies = total_copies;
        self.available_copies = total_copies - occupied;
        Ok(self.available_copies)
    }

    /// Recompute availability from the number of open loans on this book.
    pub fn reconcile(&mut self, open_loans: u32) -> Reconciliation {
        let before = self.available_copies;
        self.available_copies = self.total_copies.saturating_sub(open_loans);
        Reconciliation {
            book_id: self.id,
            before,
            after: self.available_copies,
        }
    }

    #[cfg(test)]
    fn force_counts(&mut self, total_copies: u32, available_copies: u32) {
        self.total_copies = total_copies;
        self.available_copies = available_copies;
    }
}

impl Entity for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
