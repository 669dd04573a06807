//! In-memory data store for engine tests
//!
//! [`InMemoryDataStore`] behaves like a well-behaved persistence backend:
//! sequential IDs, overlap rejection at write time, single-write status
//! updates that refuse to overwrite a concurrent change. Tests can inject failures or delays per operation and count
//! calls to prove an operation was (or was not) reached.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::future::BoxFuture;
use rental_core::store::{DataStore, StatusUpdate, StoreError, StoreResult};
use rental_core::{
    Car, CarId, NewReservation, PaymentAttempt, PaymentRecord, PaymentRecordId, Reservation,
    ReservationId, ReservationStatus, SessionToken, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Boundary operations, for failure injection and call counting
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `fetch_reservations_for_car`
    FetchReservationsForCar,
    /// `fetch_reservation`
    FetchReservation,
    /// `fetch_reservations_for_user`
    FetchReservationsForUser,
    /// `fetch_car`
    FetchCar,
    /// `create_reservation`
    CreateReservation,
    /// `update_reservation_status`
    UpdateReservationStatus,
    /// `record_payment`
    RecordPayment,
}

#[derive(Debug)]
struct State {
    cars: HashMap<CarId, Car>,
    reservations: Vec<Reservation>,
    payments: Vec<PaymentRecord>,
    next_reservation: u64,
    next_payment: u64,
    epoch: DateTime<Utc>,
    reject_overlaps: bool,
    failures: HashMap<Operation, StoreError>,
    delays: HashMap<Operation, Duration>,
    calls: HashMap<Operation, usize>,
}

/// In-memory [`DataStore`] for fast, deterministic tests.
///
/// Clones share the same data.
///
/// # Example
///
/// ```
/// use rental_testing::{InMemoryDataStore, Operation};
/// use rental_core::{Car, CarId, Money, StoreError};
///
/// let store = InMemoryDataStore::new().with_car(Car::new(CarId::new("1"), Money::from_units(50)));
/// store.fail_on(Operation::FetchReservationsForCar, StoreError::Forbidden("denied".into()));
/// assert_eq!(store.calls(Operation::FetchReservationsForCar), 0);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryDataStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDataStore {
    /// Create an empty store that rejects overlapping writes
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State {
                cars: HashMap::new(),
                reservations: Vec::new(),
                payments: Vec::new(),
                next_reservation: 1,
                next_payment: 1,
                epoch: crate::test_clock_time(),
                reject_overlaps: true,
                failures: HashMap::new(),
                delays: HashMap::new(),
                calls: HashMap::new(),
            })),
        }
    }

    /// Add a car to the catalog (builder style)
    #[must_use]
    pub fn with_car(self, car: Car) -> Self {
        self.insert_car(car);
        self
    }

    /// Add or replace a car in the catalog
    pub fn insert_car(&self, car: Car) {
        self.state.write().unwrap().cars.insert(car.id.clone(), car);
    }

    /// Seed an existing reservation, bypassing every check
    pub fn insert_reservation(&self, reservation: Reservation) {
        self.state.write().unwrap().reservations.push(reservation);
    }

    /// Accept overlapping writes, like a backend without constraints
    pub fn allow_overlapping_writes(&self) {
        self.state.write().unwrap().reject_overlaps = false;
    }

    /// Make every call to `operation` fail with `error` until cleared
    pub fn fail_on(&self, operation: Operation, error: StoreError) {
        self.state.write().unwrap().failures.insert(operation, error);
    }

    /// Delay every call to `operation` by `delay`
    pub fn delay_on(&self, operation: Operation, delay: Duration) {
        self.state.write().unwrap().delays.insert(operation, delay);
    }

    /// Remove all injected failures and delays
    pub fn clear_faults(&self) {
        let mut state = self.state.write().unwrap();
        state.failures.clear();
        state.delays.clear();
    }

    /// Number of calls made to `operation`, including failed ones
    #[must_use]
    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .read()
            .unwrap()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of write calls (create, update, record payment)
    #[must_use]
    pub fn writes(&self) -> usize {
        self.calls(Operation::CreateReservation)
            + self.calls(Operation::UpdateReservationStatus)
            + self.calls(Operation::RecordPayment)
    }

    /// Current copy of a reservation
    #[must_use]
    pub fn reservation(&self, id: &ReservationId) -> Option<Reservation> {
        self.state
            .read()
            .unwrap()
            .reservations
            .iter()
            .find(|r| r.id == *id)
            .cloned()
    }

    /// All stored reservations, in insertion order
    #[must_use]
    pub fn reservations(&self) -> Vec<Reservation> {
        self.state.read().unwrap().reservations.clone()
    }

    /// All persisted payment records, in insertion order
    #[must_use]
    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.state.read().unwrap().payments.clone()
    }

    async fn enter(&self, operation: Operation) -> StoreResult<()> {
        let (delay, failure) = {
            let mut state = self.state.write().unwrap();
            *state.calls.entry(operation).or_insert(0) += 1;
            (
                state.delays.get(&operation).copied(),
                state.failures.get(&operation).cloned(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        failure.map_or(Ok(()), Err)
    }
}

impl Default for InMemoryDataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DataStore for InMemoryDataStore {
    fn fetch_reservations_for_car<'a>(
        &'a self,
        _session: &'a SessionToken,
        car_id: &'a CarId,
        exclude_cancelled: bool,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>> {
        Box::pin(async move {
            self.enter(Operation::FetchReservationsForCar).await?;
            let state = self.state.read().unwrap();
            Ok(state
                .reservations
                .iter()
                .filter(|r| r.car_id == *car_id)
                .filter(|r| !exclude_cancelled || r.status != ReservationStatus::Cancelled)
                .cloned()
                .collect())
        })
    }

    fn fetch_reservation<'a>(
        &'a self,
        _session: &'a SessionToken,
        id: &'a ReservationId,
    ) -> BoxFuture<'a, StoreResult<Option<Reservation>>> {
        Box::pin(async move {
            self.enter(Operation::FetchReservation).await?;
            Ok(self.reservation(id))
        })
    }

    fn fetch_reservations_for_user<'a>(
        &'a self,
        _session: &'a SessionToken,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>> {
        Box::pin(async move {
            self.enter(Operation::FetchReservationsForUser).await?;
            let state = self.state.read().unwrap();
            Ok(state
                .reservations
                .iter()
                .filter(|r| r.user_id == *user_id)
                .cloned()
                .collect())
        })
    }

    fn fetch_car<'a>(
        &'a self,
        _session: &'a SessionToken,
        car_id: &'a CarId,
    ) -> BoxFuture<'a, StoreResult<Car>> {
        Box::pin(async move {
            self.enter(Operation::FetchCar).await?;
            self.state
                .read()
                .unwrap()
                .cars
                .get(car_id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound(format!("car {car_id}")))
        })
    }

    fn create_reservation<'a>(
        &'a self,
        _session: &'a SessionToken,
        fields: NewReservation,
    ) -> BoxFuture<'a, StoreResult<Reservation>> {
        Box::pin(async move {
            self.enter(Operation::CreateReservation).await?;
            let mut state = self.state.write().unwrap();

            if state.reject_overlaps {
                let clash = state.reservations.iter().find(|r| {
                    r.car_id == fields.car_id && r.blocks_car() && r.interval.overlaps(&fields.interval)
                });
                if let Some(existing) = clash {
                    return Err(StoreError::Conflict(format!(
                        "car {} already reserved by {}",
                        fields.car_id, existing.id
                    )));
                }
            }

            let mut seq = state.next_reservation;
            while state.reservations.iter().any(|r| r.id.as_str() == seq.to_string()) {
                seq += 1;
            }
            state.next_reservation = seq + 1;

            let offset = ChronoDuration::seconds(i64::try_from(seq).unwrap_or(i64::MAX));
            let reservation = Reservation {
                id: ReservationId::new(seq.to_string()),
                user_id: fields.user_id,
                car_id: fields.car_id,
                interval: fields.interval,
                total_price: fields.total_price,
                status: fields.status,
                add_ons: fields.add_ons,
                payment_method: fields.payment_method,
                payment_status: fields.payment_status,
                created_at: state.epoch + offset,
            };
            state.reservations.push(reservation.clone());
            Ok(reservation)
        })
    }

    fn update_reservation_status<'a>(
        &'a self,
        _session: &'a SessionToken,
        id: &'a ReservationId,
        update: StatusUpdate,
    ) -> BoxFuture<'a, StoreResult<Reservation>> {
        Box::pin(async move {
            self.enter(Operation::UpdateReservationStatus).await?;
            let mut state = self.state.write().unwrap();
            let reservation = state
                .reservations
                .iter_mut()
                .find(|r| r.id == *id)
                .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))?;

            if !update.applies_to(reservation.status) {
                return Err(StoreError::Conflict(format!(
                    "reservation {id} is {}, expected {}",
                    reservation.status, update.expected
                )));
            }

            reservation.status = update.status;
            if let Some(payment_status) = update.payment_status {
                reservation.payment_status = payment_status;
            }
            if let Some(method) = update.payment_method {
                reservation.payment_method = Some(method);
            }
            Ok(reservation.clone())
        })
    }

    fn record_payment<'a>(
        &'a self,
        _session: &'a SessionToken,
        attempt: PaymentAttempt,
    ) -> BoxFuture<'a, StoreResult<PaymentRecord>> {
        Box::pin(async move {
            self.enter(Operation::RecordPayment).await?;
            let mut state = self.state.write().unwrap();
            let record = PaymentRecord {
                id: PaymentRecordId::new(format!("pay-{}", state.next_payment)),
                attempt,
            };
            state.next_payment += 1;
            state.payments.push(record.clone());
            Ok(record)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{car, pending_reservation};
    use rental_core::{AddOns, DateInterval, Money, PaymentMethod, PaymentStatus};

    fn session() -> SessionToken {
        SessionToken::new("test")
    }

    fn fields(car_id: &str, start: &str, end: &str) -> NewReservation {
        NewReservation::pending(
            UserId::new("u1"),
            CarId::new(car_id),
            DateInterval::parse(start, end).unwrap(),
            Money::from_units(100),
            AddOns::NONE,
            None,
        )
    }

    #[tokio::test]
    async fn test_sequential_ids_and_overlap_rejection() {
        let store = InMemoryDataStore::new().with_car(car("C1", 50));

        let first = store
            .create_reservation(&session(), fields("C1", "2024-03-10", "2024-03-15"))
            .await
            .unwrap();
        assert_eq!(first.id.as_str(), "1");

        let clash = store
            .create_reservation(&session(), fields("C1", "2024-03-15", "2024-03-16"))
            .await;
        assert!(matches!(clash, Err(StoreError::Conflict(_))));

        let other_car = store
            .create_reservation(&session(), fields("C2", "2024-03-15", "2024-03-16"))
            .await
            .unwrap();
        assert_eq!(other_car.id.as_str(), "2");
        assert_eq!(store.calls(Operation::CreateReservation), 3);
    }

    #[tokio::test]
    async fn test_seeded_ids_are_skipped() {
        let store = InMemoryDataStore::new();
        store.insert_reservation(pending_reservation("1", "C1", "2024-01-01", "2024-01-02"));

        let created = store
            .create_reservation(&session(), fields("C1", "2024-02-01", "2024-02-02"))
            .await
            .unwrap();
        assert_eq!(created.id.as_str(), "2");
    }

    #[tokio::test]
    async fn test_injected_failure_and_exclusion() {
        let store = InMemoryDataStore::new();
        let mut cancelled = pending_reservation("7", "C1", "2024-03-01", "2024-03-02");
        cancelled.status = ReservationStatus::Cancelled;
        store.insert_reservation(cancelled);

        let visible = store
            .fetch_reservations_for_car(&session(), &CarId::new("C1"), true)
            .await
            .unwrap();
        assert!(visible.is_empty());

        store.fail_on(
            Operation::FetchReservationsForCar,
            StoreError::Forbidden("denied".to_string()),
        );
        let denied = store
            .fetch_reservations_for_car(&session(), &CarId::new("C1"), false)
            .await;
        assert_eq!(denied, Err(StoreError::Forbidden("denied".to_string())));
        assert_eq!(store.calls(Operation::FetchReservationsForCar), 2);

        store.clear_faults();
        let all = store
            .fetch_reservations_for_car(&session(), &CarId::new("C1"), false)
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_status_update_is_one_write() {
        let store = InMemoryDataStore::new();
        store.insert_reservation(pending_reservation("3", "C1", "2024-03-01", "2024-03-02"));
        let confirm = StatusUpdate {
            expected: ReservationStatus::Pending,
            status: ReservationStatus::Confirmed,
            payment_status: Some(PaymentStatus::Paid),
            payment_method: Some(PaymentMethod::PayPal),
        };

        let updated = store
            .update_reservation_status(&session(), &ReservationId::new("3"), confirm)
            .await
            .unwrap();
        assert_eq!(updated.status, ReservationStatus::Confirmed);
        assert_eq!(updated.payment_status, PaymentStatus::Paid);
        assert_eq!(updated.payment_method, Some(PaymentMethod::PayPal));
        assert_eq!(store.writes(), 1);

        let missing = store
            .update_reservation_status(&session(), &ReservationId::new("99"), confirm)
            .await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_status_update_refuses_stale_expectation() {
        let store = InMemoryDataStore::new();
        let mut cancelled = pending_reservation("4", "C1", "2024-03-01", "2024-03-02");
        cancelled.status = ReservationStatus::Cancelled;
        store.insert_reservation(cancelled);

        let stale = store
            .update_reservation_status(
                &session(),
                &ReservationId::new("4"),
                StatusUpdate {
                    expected: ReservationStatus::Pending,
                    status: ReservationStatus::Confirmed,
                    payment_status: Some(PaymentStatus::Paid),
                    payment_method: None,
                },
            )
            .await;
        assert!(matches!(stale, Err(StoreError::Conflict(_))));

        let kept = store.reservation(&ReservationId::new("4")).unwrap();
        assert_eq!(kept.status, ReservationStatus::Cancelled);
        assert_eq!(kept.payment_status, PaymentStatus::Pending);
    }
}
