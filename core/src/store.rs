//! Data-access boundary.
//!
//! The engine never talks to the backend directly. Every read and write goes
//! through a [`DataStore`], and every call carries the caller's
//! [`SessionToken`] explicitly. Implementations live outside this crate: the
//! REST adapter in `rental-cms` and the in-memory double in `rental-testing`.

use crate::types::{
    Car, CarId, NewReservation, PaymentAttempt, PaymentMethod, PaymentRecord, PaymentStatus,
    Reservation, ReservationId, ReservationStatus, SessionToken, UserId,
};
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result type for boundary operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reported by the data-access boundary
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The resource or endpoint does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The session may not access the resource
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The write would violate a uniqueness or overlap constraint
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// The call did not complete within its time budget
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Transport failure or server error
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with something that cannot be normalized
    #[error("Malformed backend response: {0}")]
    Decode(String),
}

/// A status change guarded by the status it was decided from.
///
/// Stores apply it only while the reservation still has `expected` status
/// and report [`StoreError::Conflict`] otherwise, so a change made
/// concurrently (a cancellation during a charge, say) is never overwritten.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusUpdate {
    /// Status the reservation must still have
    pub expected: ReservationStatus,
    /// New status
    pub status: ReservationStatus,
    /// New payment status, if it changes
    pub payment_status: Option<PaymentStatus>,
    /// Payment method actually used, if it changes
    pub payment_method: Option<PaymentMethod>,
}

impl StatusUpdate {
    /// The write that moves `from` to the state of `to`
    #[must_use]
    pub const fn transition(from: &Reservation, to: &Reservation) -> Self {
        Self {
            expected: from.status,
            status: to.status,
            payment_status: Some(to.payment_status),
            payment_method: None,
        }
    }

    /// Also record the payment method
    #[must_use]
    pub const fn with_payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    /// Whether a reservation currently in `current` status accepts this update
    #[must_use]
    pub fn applies_to(&self, current: ReservationStatus) -> bool {
        current == self.expected
    }
}

/// Logical operations the engine needs from the persistence boundary
pub trait DataStore: Send + Sync {
    /// Reservations of a car, optionally without cancelled ones
    fn fetch_reservations_for_car<'a>(
        &'a self,
        session: &'a SessionToken,
        car_id: &'a CarId,
        exclude_cancelled: bool,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>>;

    /// A single reservation, `None` if it does not exist
    fn fetch_reservation<'a>(
        &'a self,
        session: &'a SessionToken,
        id: &'a ReservationId,
    ) -> BoxFuture<'a, StoreResult<Option<Reservation>>>;

    /// All reservations made by a user
    fn fetch_reservations_for_user<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>>;

    /// A car from the catalog
    fn fetch_car<'a>(
        &'a self,
        session: &'a SessionToken,
        car_id: &'a CarId,
    ) -> BoxFuture<'a, StoreResult<Car>>;

    /// Persists a new reservation, assigning its ID and creation time.
    ///
    /// Implementations that can detect an overlapping non-cancelled
    /// reservation at write time report it as [`StoreError::Conflict`].
    fn create_reservation<'a>(
        &'a self,
        session: &'a SessionToken,
        fields: NewReservation,
    ) -> BoxFuture<'a, StoreResult<Reservation>>;

    /// Writes status, payment status and payment method in a single update.
    ///
    /// Fails with [`StoreError::Conflict`] when the reservation no longer has
    /// `update.expected` status, and with [`StoreError::NotFound`] when it
    /// does not exist.
    fn update_reservation_status<'a>(
        &'a self,
        session: &'a SessionToken,
        id: &'a ReservationId,
        update: StatusUpdate,
    ) -> BoxFuture<'a, StoreResult<Reservation>>;

    /// Persists a payment attempt
    fn record_payment<'a>(
        &'a self,
        session: &'a SessionToken,
        attempt: PaymentAttempt,
    ) -> BoxFuture<'a, StoreResult<PaymentRecord>>;
}

/// Runs a boundary call with a time budget; an elapsed budget is a failure.
///
/// # Errors
///
/// Returns the call's own error, or [`StoreError::Timeout`] when `budget`
/// elapses first.
pub async fn bounded<T, F>(budget: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(budget, call)
        .await
        .unwrap_or(Err(StoreError::Timeout(budget)))
}
