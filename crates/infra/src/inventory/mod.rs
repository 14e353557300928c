//! Book availability store.

mod in_memory;

pub use in_memory::InMemoryInventoryStore;

use std::sync::Arc;

use circulation_core::{BookId, LendingResult};
use circulation_lending::{Availability, Book, BookDetails, Reconciliation, ReleaseOutcome};

/// Copy counters per book. Every mutation is serialized per book id.
pub trait InventoryStore: Send + Sync {
    fn availability(&self, book_id: BookId) -> LendingResult<Availability>;

    /// Take one copy; `Unavailable` when none is left. Returns the remaining count.
    fn reserve(&self, book_id: BookId) -> LendingResult<u32> {
        self.reserve_with(book_id, &|| ())
    }

    /// `reserve`, running `on_taken` under the row lock once the copy is off
    /// the shelf. A failed reservation never runs it.
    fn reserve_with(&self, book_id: BookId, on_taken: &dyn Fn()) -> LendingResult<u32>;

    /// Return one copy, clamped at `total_copies`.
    fn release(&self, book_id: BookId) -> LendingResult<ReleaseOutcome> {
        self.release_with(book_id, &|| ())
    }

    /// `release`, running `on_returned` under the row lock after the copy is back.
    fn release_with(&self, book_id: BookId, on_returned: &dyn Fn()) -> LendingResult<ReleaseOutcome>;

    /// Signed change clamped to `[0, total_copies]`.
    fn adjust(&self, book_id: BookId, delta: i64) -> LendingResult<u32>;

    fn register(&self, book: Book) -> LendingResult<Availability>;

    /// Resize to `total_copies`, keeping `occupied()` copies out. `occupied`
    /// is evaluated under the row lock, as in `reconcile`.
    fn set_total_copies(
        &self,
        book_id: BookId,
        total_copies: u32,
        occupied: &dyn Fn() -> LendingResult<u32>,
    ) -> LendingResult<Availability>;

    /// Reset availability to `total - occupied()`, evaluating `occupied`
    /// while the book's row lock is held.
    fn reconcile(
        &self,
        book_id: BookId,
        occupied: &dyn Fn() -> LendingResult<u32>,
    ) -> LendingResult<Reconciliation>;

    /// Delete the book if `allow` succeeds, evaluated under the row lock.
    fn remove(&self, book_id: BookId, allow: &dyn Fn() -> LendingResult<()>) -> LendingResult<()>;
}

/// Read-only catalog fields, used only to enrich listings.
pub trait Catalog: Send + Sync {
    fn details(&self, book_id: BookId) -> Option<BookDetails>;

    fn title(&self, book_id: BookId) -> Option<String> {
        self.details(book_id).map(|d| d.title)
    }
}

impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    fn availability(&self, book_id: BookId) -> LendingResult<Availability> {
        (**self).availability(book_id)
    }

    fn reserve_with(&self, book_id: BookId, on_taken: &dyn Fn()) -> LendingResult<u32> {
        (**self).reserve_with(book_id, on_taken)
    }

    fn release_with(&self, book_id: BookId, on_returned: &dyn Fn()) -> LendingResult<ReleaseOutcome> {
        (**self).release_with(book_id, on_returned)
    }

    fn adjust(&self, book_id: BookId, delta: i64) -> LendingResult<u32> {
        (**self).adjust(book_id, delta)
    }

    fn register(&self, book: Book) -> LendingResult<Availability> {
        (**self).register(book)
    }

    fn set_total_copies(
        &self,
        book_id: BookId,
        total_copies: u32,
        occupied: &dyn Fn() -> LendingResult<u32>,
    ) -> LendingResult<Availability> {
        (**self).set_total_copies(book_id, total_copies, occupied)
    }

    fn reconcile(
        &self,
        book_id: BookId,
        occupied: &dyn Fn() -> LendingResult<u32>,
    ) -> LendingResult<Reconciliation> {
        (**self).reconcile(book_id, occupied)
    }

    fn remove(&self, book_id: BookId, allow: &dyn Fn() -> LendingResult<()>) -> LendingResult<()> {
        (**self).remove(book_id, allow)
    }
}

impl<S> Catalog for Arc<S>
where
    S: Catalog + ?Sized,
{
    fn details(&self, book_id: BookId) -> Option<BookDetails> {
        (**self).details(book_id)
    }
}
