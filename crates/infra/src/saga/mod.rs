//! Issuance saga: state tracking and the compensating reservation.

pub mod issuance;
pub mod reservation;

pub use issuance::{IssuanceSaga, IssuanceState};
pub use reservation::{InFlightCopies, InFlightTicket, ReservationGuard, release_with_retry};
