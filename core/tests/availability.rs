//! Availability checks and the lookup-failure policies.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use rental_core::{
    AvailabilityPolicy, CarId, EngineConfig, EngineError, PaymentStatus, ReservationId,
    ReservationStatus, StoreError,
};
use rental_testing::helpers::{booking, car, customer, engine, engine_with, interval, reservation_in};
use rental_testing::{InMemoryDataStore, Operation, ScriptedGateway};
use std::time::Duration;

fn store_with_booking(status: ReservationStatus, payment: PaymentStatus) -> InMemoryDataStore {
    let store = InMemoryDataStore::new().with_car(car("1", 100));
    store.insert_reservation(reservation_in("5", "1", "2024-03-10", "2024-03-15", status, payment));
    store
}

fn strict() -> EngineConfig {
    EngineConfig {
        availability_policy: AvailabilityPolicy::Strict,
        ..EngineConfig::default()
    }
}

#[tokio::test]
async fn test_shared_boundary_day_conflicts() {
    let store = store_with_booking(ReservationStatus::Confirmed, PaymentStatus::Paid);
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);
    let ctx = customer("7");
    let car_id = CarId::new("1");

    let touching = engine
        .check_availability(&ctx, &car_id, &interval("2024-03-15", "2024-03-20"))
        .await
        .unwrap();
    assert!(!touching.available);
    assert_eq!(touching.conflict_ids(), vec![ReservationId::new("5")]);

    let next_day = engine
        .check_availability(&ctx, &car_id, &interval("2024-03-16", "2024-03-20"))
        .await
        .unwrap();
    assert!(next_day.available);
    assert!(next_day.degraded.is_none());
}

#[tokio::test]
async fn test_conflicting_booking_writes_nothing() {
    let store = store_with_booking(ReservationStatus::Pending, PaymentStatus::Pending);
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);

    let err = engine
        .book_car(&customer("7"), booking("7", "1", "2024-03-15", "2024-03-20"))
        .await
        .unwrap_err();
    assert!(err.is_recoverable());
    match err {
        EngineError::BookingConflict { conflicts, .. } => {
            assert_eq!(conflicts, vec![ReservationId::new("5")]);
        }
        other => panic!("expected BookingConflict, got {other:?}"),
    }
    assert_eq!(store.writes(), 0);
    assert_eq!(store.calls(Operation::FetchCar), 0);

    let ok = engine
        .book_car(&customer("7"), booking("7", "1", "2024-03-16", "2024-03-20"))
        .await
        .unwrap();
    assert_eq!(ok.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_cancelled_bookings_do_not_block() {
    let store = store_with_booking(ReservationStatus::Cancelled, PaymentStatus::Failed);
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);

    let availability = engine
        .check_availability(&customer("7"), &CarId::new("1"), &interval("2024-03-12", "2024-03-13"))
        .await
        .unwrap();
    assert!(availability.available);
}

#[tokio::test]
async fn test_completed_bookings_still_block() {
    let store = store_with_booking(ReservationStatus::Completed, PaymentStatus::Paid);
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);

    let availability = engine
        .check_availability(&customer("7"), &CarId::new("1"), &interval("2024-03-12", "2024-03-13"))
        .await
        .unwrap();
    assert!(!availability.available);
}

#[tokio::test]
async fn test_permissive_policy_assumes_available_on_access_denied() {
    let store = store_with_booking(ReservationStatus::Confirmed, PaymentStatus::Paid);
    store.fail_on(
        Operation::FetchReservationsForCar,
        StoreError::Forbidden("session expired".to_string()),
    );
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);

    let availability = engine
        .check_availability(&customer("7"), &CarId::new("1"), &interval("2024-04-01", "2024-04-02"))
        .await
        .unwrap();
    assert!(availability.available);
    assert_eq!(
        availability.degraded,
        Some(StoreError::Forbidden("session expired".to_string()))
    );
}

#[tokio::test]
async fn test_unreadable_reservations_are_never_assumed_free() {
    let store = store_with_booking(ReservationStatus::Confirmed, PaymentStatus::Paid);
    store.fail_on(
        Operation::FetchReservationsForCar,
        StoreError::Decode("reservation 9 has no valid startDate".to_string()),
    );
    let gateway = ScriptedGateway::approving();
    let engine = engine(&store, &gateway);

    let err = engine
        .check_availability(&customer("7"), &CarId::new("1"), &interval("2024-03-12", "2024-03-13"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::UpstreamUnavailable {
            operation: "fetch_reservations_for_car",
            ..
        }
    ));

    let booked = engine
        .book_car(&customer("7"), booking("7", "1", "2024-03-12", "2024-03-13"))
        .await;
    assert!(booked.is_err());
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn test_missing_collection_means_no_reservations_under_any_policy() {
    let store = InMemoryDataStore::new().with_car(car("1", 100));
    store.fail_on(
        Operation::FetchReservationsForCar,
        StoreError::NotFound("reservations".to_string()),
    );
    let gateway = ScriptedGateway::approving();
    let engine = engine_with(&store, &gateway, strict());

    let reservation = engine
        .book_car(&customer("7"), booking("7", "1", "2024-04-01", "2024-04-02"))
        .await
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Pending);
}

#[tokio::test]
async fn test_strict_policy_propagates_lookup_failures() {
    let store = InMemoryDataStore::new().with_car(car("1", 100));
    let gateway = ScriptedGateway::approving();
    let engine = engine_with(&store, &gateway, strict());

    store.fail_on(
        Operation::FetchReservationsForCar,
        StoreError::Forbidden("denied".to_string()),
    );
    let denied = engine
        .book_car(&customer("7"), booking("7", "1", "2024-04-01", "2024-04-02"))
        .await
        .unwrap_err();
    assert!(matches!(denied, EngineError::Forbidden(_)));

    store.fail_on(
        Operation::FetchReservationsForCar,
        StoreError::Unavailable("502 Bad Gateway".to_string()),
    );
    let down = engine
        .book_car(&customer("7"), booking("7", "1", "2024-04-01", "2024-04-02"))
        .await
        .unwrap_err();
    assert!(matches!(
        down,
        EngineError::UpstreamUnavailable {
            operation: "fetch_reservations_for_car",
            ..
        }
    ));
    assert_eq!(store.writes(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_lookup_times_out_as_failure() {
    let store = InMemoryDataStore::new().with_car(car("1", 100));
    store.delay_on(Operation::FetchReservationsForCar, Duration::from_secs(60));
    let gateway = ScriptedGateway::approving();
    let config = EngineConfig {
        store_timeout_ms: 200,
        ..strict()
    };
    let engine = engine_with(&store, &gateway, config);

    let err = engine
        .check_availability(&customer("7"), &CarId::new("1"), &interval("2024-04-01", "2024-04-02"))
        .await
        .unwrap_err();
    match err {
        EngineError::UpstreamUnavailable { operation, detail } => {
            assert_eq!(operation, "fetch_reservations_for_car");
            assert!(detail.contains("Timed out"));
        }
        other => panic!("expected UpstreamUnavailable, got {other:?}"),
    }
}
