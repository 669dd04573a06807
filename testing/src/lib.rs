//! # Rental Testing
//!
//! Testing utilities for the rental reservation engine.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic timestamps
//! - [`InMemoryDataStore`]: the persistence boundary in memory, with fault injection
//! - [`ScriptedGateway`]: a payment gateway answering from a script
//! - Fixture builders for cars, reservations and payment details
//! - proptest strategies for dates and intervals
//!
//! ## Example
//!
//! ```ignore
//! use rental_testing::{InMemoryDataStore, ScriptedGateway, helpers};
//!
//! #[tokio::test]
//! async fn test_booking_flow() {
//!     let store = InMemoryDataStore::new().with_car(helpers::car("1", 50));
//!     let gateway = ScriptedGateway::approving();
//!     let engine = helpers::engine(&store, &gateway);
//!
//!     let reservation = engine
//!         .book_car(&helpers::customer("7"), helpers::booking("7", "1", "2024-03-10", "2024-03-11"))
//!         .await
//!         .unwrap();
//!     assert_eq!(reservation.total_price, Money::from_units(100));
//! }
//! ```

use chrono::{DateTime, TimeZone, Utc};
use rental_core::environment::Clock;

mod gateway_mocks;
mod store_mocks;

pub use gateway_mocks::{Scripted, ScriptedGateway};
pub use store_mocks::{InMemoryDataStore, Operation};

/// 2025-01-01 00:00:00 UTC
pub(crate) fn test_clock_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use rental_testing::mocks::FixedClock;
    /// use rental_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(super::test_clock_time())
    }
}

/// Fixture builders.
///
/// These unwrap freely: a fixture that cannot be built is a broken test.
#[allow(clippy::unwrap_used, clippy::missing_panics_doc)]
pub mod helpers {
    use super::{InMemoryDataStore, ScriptedGateway, mocks::test_clock};
    use rental_core::{
        AddOns, BookingRequest, Car, CarId, DateInterval, EngineConfig, Money, PaymentDetails,
        PaymentStatus, RentalEngine, RequestContext, Reservation, ReservationId,
        ReservationStatus, SessionToken, UserId,
    };
    use std::sync::Arc;

    /// A car priced at `daily_price` whole units per day
    #[must_use]
    pub fn car(id: &str, daily_price: u64) -> Car {
        Car::new(CarId::new(id), Money::from_units(daily_price))
    }

    /// Parse an interval from `YYYY-MM-DD` bounds
    #[must_use]
    pub fn interval(start: &str, end: &str) -> DateInterval {
        DateInterval::parse(start, end).unwrap()
    }

    /// A stored `pending` / `pending` reservation worth 100
    #[must_use]
    pub fn pending_reservation(id: &str, car_id: &str, start: &str, end: &str) -> Reservation {
        Reservation {
            id: ReservationId::new(id),
            user_id: UserId::new("u1"),
            car_id: CarId::new(car_id),
            interval: interval(start, end),
            total_price: Money::from_units(100),
            status: ReservationStatus::Pending,
            add_ons: AddOns::NONE,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            created_at: super::test_clock_time(),
        }
    }

    /// A stored reservation in the given state
    #[must_use]
    pub fn reservation_in(
        id: &str,
        car_id: &str,
        start: &str,
        end: &str,
        status: ReservationStatus,
        payment_status: PaymentStatus,
    ) -> Reservation {
        Reservation {
            status,
            payment_status,
            ..pending_reservation(id, car_id, start, end)
        }
    }

    /// A booking request without extras
    #[must_use]
    pub fn booking(user_id: &str, car_id: &str, start: &str, end: &str) -> BookingRequest {
        BookingRequest {
            user_id: UserId::new(user_id),
            car_id: CarId::new(car_id),
            interval: interval(start, end),
            add_ons: AddOns::NONE,
            payment_method: None,
        }
    }

    /// A customer request context
    #[must_use]
    pub fn customer(user_id: &str) -> RequestContext {
        RequestContext::customer(SessionToken::new(format!("token-{user_id}")), UserId::new(user_id))
    }

    /// An admin request context
    #[must_use]
    pub fn admin() -> RequestContext {
        RequestContext::admin(SessionToken::new("token-admin"))
    }

    /// Valid card details
    #[must_use]
    pub fn valid_card() -> PaymentDetails {
        PaymentDetails::Card {
            number: "4242 4242 4242 4242".to_string(),
            expiry: "12/30".to_string(),
            cvv: "123".to_string(),
            holder: "Jane Doe".to_string(),
        }
    }

    /// Card details with the given number and otherwise valid fields
    #[must_use]
    pub fn card_with_number(number: &str) -> PaymentDetails {
        PaymentDetails::Card {
            number: number.to_string(),
            expiry: "12/30".to_string(),
            cvv: "123".to_string(),
            holder: "Jane Doe".to_string(),
        }
    }

    /// Engine over the given doubles with a fixed clock and default config
    #[must_use]
    pub fn engine(store: &InMemoryDataStore, gateway: &ScriptedGateway) -> RentalEngine {
        engine_with(store, gateway, EngineConfig::default())
    }

    /// Engine over the given doubles with a fixed clock and `config`
    #[must_use]
    pub fn engine_with(
        store: &InMemoryDataStore,
        gateway: &ScriptedGateway,
        config: EngineConfig,
    ) -> RentalEngine {
        RentalEngine::new(Arc::new(store.clone()), Arc::new(gateway.clone()), config)
            .with_clock(Arc::new(test_clock()))
    }

    /// Install a test tracing subscriber honoring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs it.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;
    use rental_core::DateInterval;

    /// Days between 2020-01-01 and roughly 2030
    pub fn date() -> impl Strategy<Value = NaiveDate> {
        (0i64..3650).prop_map(|offset| {
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN) + Duration::days(offset)
        })
    }

    /// Valid intervals of 1 to 60 days
    pub fn interval() -> impl Strategy<Value = DateInterval> {
        (date(), 0i64..60).prop_filter_map("interval out of range", |(start, len)| {
            DateInterval::new(start, start + Duration::days(len)).ok()
        })
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
