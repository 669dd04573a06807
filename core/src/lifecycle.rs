//! Reservation state machine.
//!
//! ```text
//!            PaymentSucceeded            RentalEnded
//!  pending ───────────────────▶ confirmed ───────────▶ completed
//!   │  ▲                            │
//!   │  └── PaymentFailed            │ Cancel
//!   │                               ▼
//!   └── Cancel / PaymentAbandoned ▶ cancelled
//! ```
//!
//! [`transition`] is pure: it returns the next version of a reservation and
//! never writes. Callers persist the result with one status update, so a
//! rejected transition leaves the stored record untouched.

use crate::error::{EngineError, Result};
use crate::types::{Actor, PaymentStatus, Reservation, ReservationStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Something that happens to a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationEvent {
    /// The gateway approved the charge
    PaymentSucceeded,
    /// The gateway declined; the customer may retry
    PaymentFailed,
    /// The gateway declined and the customer gave up
    PaymentAbandoned,
    /// The rental period is over
    RentalEnded,
    /// Explicit cancellation
    Cancel,
}

impl ReservationEvent {
    /// Stable snake_case label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::PaymentAbandoned => "payment_abandoned",
            Self::RentalEnded => "rental_ended",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ReservationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status and payment status after applying `event` from `status`.
///
/// `None` when the event is not allowed from `status`.
#[must_use]
pub const fn next_state(
    status: ReservationStatus,
    payment_status: PaymentStatus,
    event: ReservationEvent,
) -> Option<(ReservationStatus, PaymentStatus)> {
    use ReservationEvent as E;
    use ReservationStatus as S;

    match (status, event) {
        (S::Pending, E::PaymentSucceeded) => Some((S::Confirmed, PaymentStatus::Paid)),
        (S::Pending, E::PaymentFailed) => Some((S::Pending, PaymentStatus::Failed)),
        (S::Pending, E::PaymentAbandoned) => Some((S::Cancelled, PaymentStatus::Failed)),
        (S::Confirmed, E::RentalEnded) => Some((S::Completed, PaymentStatus::Paid)),
        (S::Pending | S::Confirmed, E::Cancel) => Some((S::Cancelled, payment_status)),
        _ => None,
    }
}

/// Applies `event` to a copy of `reservation`.
///
/// # Errors
///
/// Returns [`EngineError::InvalidTransition`] for any event on a terminal
/// reservation and for any pair not in the transition table.
pub fn transition(reservation: &Reservation, event: ReservationEvent) -> Result<Reservation> {
    let (status, payment_status) =
        next_state(reservation.status, reservation.payment_status, event).ok_or(
            EngineError::InvalidTransition {
                from: reservation.status,
                event,
            },
        )?;

    let mut next = reservation.clone();
    next.status = status;
    next.payment_status = payment_status;
    debug_assert!(next.is_consistent());
    Ok(next)
}

/// Checks that `actor` may trigger `event` on `reservation`.
///
/// Customers may only cancel their own bookings; admins may cancel or close
/// any booking; payment events come from the payment orchestrator, which acts
/// as [`Actor::System`].
///
/// # Errors
///
/// Returns [`EngineError::Forbidden`] when the actor lacks the right.
pub fn authorize(actor: &Actor, reservation: &Reservation, event: ReservationEvent) -> Result<()> {
    let allowed = match (actor, event) {
        (Actor::System, _) => true,
        (Actor::Admin, ReservationEvent::Cancel | ReservationEvent::RentalEnded) => true,
        (Actor::Customer(user_id), ReservationEvent::Cancel) => *user_id == reservation.user_id,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(EngineError::Forbidden(format!(
            "{} may not trigger {event} on reservation {}",
            actor.role(),
            reservation.id
        )))
    }
}

/// Checks that `actor` may act on `reservation` at all (read it, pay it)
///
/// # Errors
///
/// Returns [`EngineError::Forbidden`] when a customer targets someone else's booking.
pub fn authorize_access(actor: &Actor, reservation: &Reservation) -> Result<()> {
    match actor {
        Actor::Customer(user_id) if *user_id != reservation.user_id => {
            Err(EngineError::Forbidden(format!(
                "reservation {} belongs to another user",
                reservation.id
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::interval::DateInterval;
    use crate::types::{AddOns, CarId, Money, ReservationId, UserId};
    use chrono::{TimeZone, Utc};

    fn reservation(status: ReservationStatus, payment_status: PaymentStatus) -> Reservation {
        Reservation {
            id: ReservationId::new("r1"),
            user_id: UserId::new("u1"),
            car_id: CarId::new("C1"),
            interval: DateInterval::parse("2024-03-10", "2024-03-15").unwrap(),
            total_price: Money::from_units(300),
            status,
            add_ons: AddOns::NONE,
            payment_method: None,
            payment_status,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    const ALL_EVENTS: [ReservationEvent; 5] = [
        ReservationEvent::PaymentSucceeded,
        ReservationEvent::PaymentFailed,
        ReservationEvent::PaymentAbandoned,
        ReservationEvent::RentalEnded,
        ReservationEvent::Cancel,
    ];

    #[test]
    fn test_payment_success_confirms_and_marks_paid() {
        let pending = reservation(ReservationStatus::Pending, PaymentStatus::Pending);
        let confirmed = transition(&pending, ReservationEvent::PaymentSucceeded).unwrap();
        assert_eq!(confirmed.status, ReservationStatus::Confirmed);
        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        // Input untouched
        assert_eq!(pending.status, ReservationStatus::Pending);
    }

    #[test]
    fn test_payment_failure_keeps_pending() {
        let pending = reservation(ReservationStatus::Pending, PaymentStatus::Pending);
        let failed = transition(&pending, ReservationEvent::PaymentFailed).unwrap();
        assert_eq!(failed.status, ReservationStatus::Pending);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);

        // A failed attempt can still be retried
        let retried = transition(&failed, ReservationEvent::PaymentSucceeded).unwrap();
        assert_eq!(retried.status, ReservationStatus::Confirmed);
    }

    #[test]
    fn test_abandoned_payment_cancels() {
        let pending = reservation(ReservationStatus::Pending, PaymentStatus::Pending);
        let abandoned = transition(&pending, ReservationEvent::PaymentAbandoned).unwrap();
        assert_eq!(abandoned.status, ReservationStatus::Cancelled);
        assert_eq!(abandoned.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn test_rental_end_completes_confirmed() {
        let confirmed = reservation(ReservationStatus::Confirmed, PaymentStatus::Paid);
        let completed = transition(&confirmed, ReservationEvent::RentalEnded).unwrap();
        assert_eq!(completed.status, ReservationStatus::Completed);
        assert_eq!(completed.payment_status, PaymentStatus::Paid);

        let pending = reservation(ReservationStatus::Pending, PaymentStatus::Pending);
        assert!(transition(&pending, ReservationEvent::RentalEnded).is_err());
    }

    #[test]
    fn test_cancel_leaves_payment_status_untouched() {
        let confirmed = reservation(ReservationStatus::Confirmed, PaymentStatus::Paid);
        let cancelled = transition(&confirmed, ReservationEvent::Cancel).unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);
        assert_eq!(cancelled.payment_status, PaymentStatus::Paid);
    }

    #[test]
    fn test_terminal_states_reject_every_event() {
        for (status, payment) in [
            (ReservationStatus::Completed, PaymentStatus::Paid),
            (ReservationStatus::Cancelled, PaymentStatus::Pending),
        ] {
            let terminal = reservation(status, payment);
            for event in ALL_EVENTS {
                let err = transition(&terminal, event).unwrap_err();
                assert!(
                    matches!(err, EngineError::InvalidTransition { from, event: e } if from == status && e == event),
                    "{status} + {event} should be rejected"
                );
            }
        }
    }

    #[test]
    fn test_confirmed_cannot_be_paid_again() {
        let confirmed = reservation(ReservationStatus::Confirmed, PaymentStatus::Paid);
        for event in [
            ReservationEvent::PaymentSucceeded,
            ReservationEvent::PaymentFailed,
            ReservationEvent::PaymentAbandoned,
        ] {
            assert!(transition(&confirmed, event).is_err());
        }
    }

    #[test]
    fn test_every_allowed_transition_is_consistent() {
        for (status, payment) in [
            (ReservationStatus::Pending, PaymentStatus::Pending),
            (ReservationStatus::Pending, PaymentStatus::Failed),
            (ReservationStatus::Confirmed, PaymentStatus::Paid),
        ] {
            for event in ALL_EVENTS {
                if let Some((next, next_payment)) = next_state(status, payment, event) {
                    assert!(next.admits(next_payment), "{status} + {event}");
                }
            }
        }
    }

    #[test]
    fn test_customer_may_only_cancel_own_booking() {
        let booking = reservation(ReservationStatus::Pending, PaymentStatus::Pending);
        let owner = Actor::Customer(UserId::new("u1"));
        let stranger = Actor::Customer(UserId::new("u2"));

        assert!(authorize(&owner, &booking, ReservationEvent::Cancel).is_ok());
        assert!(matches!(
            authorize(&stranger, &booking, ReservationEvent::Cancel),
            Err(EngineError::Forbidden(_))
        ));
        assert!(authorize(&owner, &booking, ReservationEvent::RentalEnded).is_err());
        assert!(authorize(&owner, &booking, ReservationEvent::PaymentSucceeded).is_err());
        assert!(authorize_access(&stranger, &booking).is_err());
        assert!(authorize_access(&owner, &booking).is_ok());
    }

    #[test]
    fn test_admin_and_system_rights() {
        let booking = reservation(ReservationStatus::Confirmed, PaymentStatus::Paid);
        assert!(authorize(&Actor::Admin, &booking, ReservationEvent::RentalEnded).is_ok());
        assert!(authorize(&Actor::Admin, &booking, ReservationEvent::Cancel).is_ok());
        assert!(authorize(&Actor::Admin, &booking, ReservationEvent::PaymentSucceeded).is_err());
        for event in ALL_EVENTS {
            assert!(authorize(&Actor::System, &booking, event).is_ok());
        }
    }
}
