//! Loan issuance saga.
//!
//! ```text
//! Requested ──▶ Validated ──▶ Reserved ──▶ Committed
//!     │             │             │
//!     └──▶ Rejected ◀┘             └──▶ RolledBack
//! ```
//!
//! Compensating action: release the reserved copy if the ledger refuses the
//! loan or the request is cancelled before commit.

use serde::{Deserialize, Serialize};
use tracing::trace;
use uuid::Uuid;

use circulation_core::{BookId, LendingError, LendingResult, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceState {
    #[default]
    Requested,
    Validated,
    Reserved,
    Committed,
    Rejected,
    RolledBack,
}

impl IssuanceState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Rejected | Self::RolledBack)
    }

    fn accepts(self, next: IssuanceState) -> bool {
        use IssuanceState::*;
        matches!(
            (self, next),
            (Requested, Validated)
                | (Requested, Rejected)
                | (Validated, Reserved)
                | (Validated, Rejected)
                | (Reserved, Committed)
                | (Reserved, RolledBack)
        )
    }
}

/// One issuance attempt, from request to a terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct IssuanceSaga {
    id: Uuid,
    user_id: UserId,
    book_id: BookId,
    state: IssuanceState,
    transcript: Vec<IssuanceState>,
}

impl IssuanceSaga {
    pub fn start(user_id: UserId, book_id: BookId) -> Self {
        let id = Uuid::now_v7();
        trace!(saga_id = %id, %user_id, %book_id, "issuance requested");
        Self {
            id,
            user_id,
            book_id,
            state: IssuanceState::Requested,
            transcript: vec![IssuanceState::Requested],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> IssuanceState {
        self.state
    }

    /// Every state visited, in order, starting with `Requested`.
    pub fn transcript(&self) -> &[IssuanceState] {
        &self.transcript
    }

    pub fn advance(&mut self, next: IssuanceState) -> LendingResult<()> {
        if !self.state.accepts(next) {
            return Err(LendingError::invariant(format!(
                "issuance {}: illegal transition {:?} -> {:?}",
                self.id, self.state, next
            )));
        }
        trace!(saga_id = %self.id, user_id = %self.user_id, book_id = %self.book_id, from = ?self.state, to = ?next, "issuance step");
        self.state = next;
        self.transcript.push(next);
        Ok(())
    }

    /// Move to `Rejected` or `RolledBack`, whichever the current state allows,
    /// and hand back `err` for propagation.
    pub fn abort(&mut self, err: LendingError) -> LendingError {
        let next = if self.state == IssuanceState::Reserved {
            IssuanceState::RolledBack
        } else {
            IssuanceState::Rejected
        };
        if !self.state.is_terminal() {
            self.state = next;
            self.transcript.push(next);
        }
        trace!(saga_id = %self.id, state = ?self.state, error = err.kind(), "issuance aborted");
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saga() -> IssuanceSaga {
        IssuanceSaga::start(UserId::new(1), BookId::new(1))
    }

    #[test]
    fn happy_path_is_recorded() {
        let mut s = saga();
        s.advance(IssuanceState::Validated).unwrap();
        s.advance(IssuanceState::Reserved).unwrap();
        s.advance(IssuanceState::Committed).unwrap();
        assert!(s.state().is_terminal());
        assert_eq!(
            s.transcript(),
            &[
                IssuanceState::Requested,
                IssuanceState::Validated,
                IssuanceState::Reserved,
                IssuanceState::Committed
            ]
        );
        assert_eq!(s.id().get_version_num(), 7);
    }

    #[test]
    fn skipping_steps_is_refused() {
        let mut s = saga();
        assert!(matches!(
            s.advance(IssuanceState::Committed),
            Err(LendingError::InvariantViolation(_))
        ));
        assert_eq!(s.state(), IssuanceState::Requested);
    }

    #[test]
    fn abort_picks_rollback_after_reservation() {
        let mut early = saga();
        early.abort(LendingError::book_not_found(BookId::new(1)));
        assert_eq!(early.state(), IssuanceState::Rejected);

        let mut late = saga();
        late.advance(IssuanceState::Validated).unwrap();
        late.advance(IssuanceState::Reserved).unwrap();
        let err = late.abort(LendingError::DuplicateActiveLoan {
            user_id: UserId::new(1),
            book_id: BookId::new(1),
        });
        assert_eq!(err.kind(), "duplicate_active_loan");
        assert_eq!(late.state(), IssuanceState::RolledBack);

        // Terminal states stay put.
        late.abort(LendingError::invariant("again"));
        assert_eq!(late.transcript().len(), 4);
    }

    #[test]
    fn state_serializes_snake_case() {
        let json = serde_json::to_string(&IssuanceState::RolledBack).unwrap();
        assert_eq!(json, "\"rolled_back\"");
    }
}
