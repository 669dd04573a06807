//! Error types for the reservation engine.

use crate::lifecycle::ReservationEvent;
use crate::store::StoreError;
use crate::types::{CarId, Money, ReservationId, ReservationStatus};
use std::fmt;
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// One rejected payment field
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    /// Field name (`card_number`, `expiry`, `cvv`, ...)
    pub field: &'static str,
    /// Why it was rejected
    pub reason: String,
}

/// Per-field reasons for rejecting payment details
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PaymentDetailErrors(Vec<FieldError>);

impl PaymentDetailErrors {
    /// Records a rejected field
    pub fn push(&mut self, field: &'static str, reason: impl Into<String>) {
        self.0.push(FieldError {
            field,
            reason: reason.into(),
        });
    }

    /// True when no field was rejected
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rejected fields, in validation order
    #[must_use]
    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// Reason recorded for `field`, if any
    #[must_use]
    pub fn reason_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.reason.as_str())
    }
}

impl fmt::Display for PaymentDetailErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for error in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", error.field, error.reason)?;
            first = false;
        }
        Ok(())
    }
}

/// Errors surfaced by the engine to its callers
#[derive(Debug, Error)]
pub enum EngineError {
    /// Interval bounds are reversed or unparseable
    #[error("Invalid interval: {start}..{end}")]
    InvalidInterval {
        /// Start as supplied
        start: String,
        /// End as supplied
        end: String,
    },

    /// The car cannot be priced
    #[error("Invalid car {car_id}: {reason}")]
    InvalidCar {
        /// Car ID
        car_id: CarId,
        /// What is wrong with it
        reason: String,
    },

    /// The interval overlaps an existing booking, or a concurrent booking won the race
    #[error("Booking conflict for car {car_id} ({} conflicting reservation(s))", .conflicts.len())]
    BookingConflict {
        /// Car ID
        car_id: CarId,
        /// Known conflicting reservations; empty when the conflict was detected at write time
        conflicts: Vec<ReservationId>,
    },

    /// Payment details failed validation
    #[error("Invalid payment details: {0}")]
    InvalidPaymentDetails(PaymentDetailErrors),

    /// The gateway declined the charge
    #[error("Payment declined for reservation {reservation_id}: {reason}")]
    PaymentDeclined {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Gateway transaction ID of the declined attempt
        transaction_id: String,
        /// Decline reason
        reason: String,
    },

    /// No such reservation
    #[error("Reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// The event is not allowed from the current status
    #[error("Invalid transition: {event} from {from}")]
    InvalidTransition {
        /// Status at the time of the attempt
        from: ReservationStatus,
        /// Rejected event
        event: ReservationEvent,
    },

    /// The amount offered does not match the booked price
    #[error("Amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch {
        /// Reservation total
        expected: Money,
        /// Amount supplied
        actual: Money,
    },

    /// The actor may not perform this operation, or the backend refused access
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Money moved but the reservation record could not be brought in line
    #[error("Reconciliation required for reservation {reservation_id} (transaction {transaction_id}): {detail}")]
    ReconciliationError {
        /// Reservation ID
        reservation_id: ReservationId,
        /// Gateway transaction ID of the successful charge
        transaction_id: String,
        /// Which write failed
        detail: String,
    },

    /// A data-access or gateway call failed or timed out
    #[error("Upstream unavailable during {operation}: {detail}")]
    UpstreamUnavailable {
        /// Boundary operation name
        operation: &'static str,
        /// Failure detail
        detail: String,
    },
}

impl EngineError {
    /// Maps a boundary failure of `operation`.
    ///
    /// Access refusals stay [`EngineError::Forbidden`]; everything else is
    /// [`EngineError::UpstreamUnavailable`]. Callers that give `NotFound` or
    /// `Conflict` a domain meaning match on those before calling this.
    #[must_use]
    pub fn from_store(operation: &'static str, error: StoreError) -> Self {
        match error {
            StoreError::Forbidden(detail) => Self::Forbidden(detail),
            other => Self::UpstreamUnavailable {
                operation,
                detail: other.to_string(),
            },
        }
    }

    /// Business outcomes the caller can retry with different input
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::BookingConflict { .. } | Self::PaymentDeclined { .. }
        )
    }

    /// Rejected before any external call was made
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidInterval { .. } | Self::InvalidPaymentDetails(_)
        )
    }

    /// Stable label for logs and metrics
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInterval { .. } => "invalid_interval",
            Self::InvalidCar { .. } => "invalid_car",
            Self::BookingConflict { .. } => "booking_conflict",
            Self::InvalidPaymentDetails(_) => "invalid_payment_details",
            Self::PaymentDeclined { .. } => "payment_declined",
            Self::ReservationNotFound(_) => "reservation_not_found",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AmountMismatch { .. } => "amount_mismatch",
            Self::Forbidden(_) => "forbidden",
            Self::ReconciliationError { .. } => "reconciliation_error",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_errors_display_every_field() {
        let mut errors = PaymentDetailErrors::default();
        errors.push("card_number", "must contain 16 digits");
        errors.push("cvv", "must contain 3 digits");

        assert_eq!(
            errors.to_string(),
            "card_number: must contain 16 digits; cvv: must contain 3 digits"
        );
        assert_eq!(errors.reason_for("cvv"), Some("must contain 3 digits"));
        assert_eq!(errors.reason_for("expiry"), None);
    }

    #[test]
    fn test_classification() {
        let conflict = EngineError::BookingConflict {
            car_id: CarId::new("C1"),
            conflicts: vec![],
        };
        assert!(conflict.is_recoverable());
        assert_eq!(conflict.kind(), "booking_conflict");

        let reconciliation = EngineError::ReconciliationError {
            reservation_id: ReservationId::new("1"),
            transaction_id: "trx-1".to_string(),
            detail: "status update failed".to_string(),
        };
        assert!(!reconciliation.is_recoverable());
        assert!(!reconciliation.to_string().to_lowercase().contains("declined"));
    }

    #[test]
    fn test_store_failures_keep_access_refusals() {
        let forbidden = EngineError::from_store(
            "fetch_car",
            StoreError::Forbidden("token expired".to_string()),
        );
        assert!(matches!(forbidden, EngineError::Forbidden(ref d) if d == "token expired"));

        let timeout = EngineError::from_store(
            "fetch_car",
            StoreError::Timeout(std::time::Duration::from_secs(5)),
        );
        assert!(matches!(
            timeout,
            EngineError::UpstreamUnavailable { operation: "fetch_car", .. }
        ));
    }
}
