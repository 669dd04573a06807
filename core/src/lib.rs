//! # Rental Core
//!
//! Reservation lifecycle and availability engine for a car-rental marketplace.
//!
//! The crate decides whether a car can be booked for a date range, prices the
//! booking, creates it as `pending`, charges it through an injected payment
//! gateway and moves it through its lifecycle:
//!
//! ```text
//! pending ──▶ confirmed ──▶ completed
//!    │            │
//!    └────────────┴──────▶ cancelled
//! ```
//!
//! ## Components
//!
//! - [`interval`]: inclusive calendar-day ranges and overlap
//! - [`pricing`]: pure price computation with add-on surcharges
//! - [`availability`]: conflict detection against existing reservations
//! - [`lifecycle`]: the reservation state machine and actor rights
//! - [`payment`]: validation and payment orchestration
//! - [`engine`]: the [`RentalEngine`] façade composing all of the above
//!
//! ## Boundaries
//!
//! Persistence and payment are traits ([`DataStore`], [`PaymentGateway`]) so
//! the engine runs unchanged against the REST adapter, in-memory doubles or a
//! real processor. Every data call carries the caller's [`SessionToken`] and
//! runs under a time budget.
//!
//! ## Example
//!
//! ```ignore
//! use rental_core::*;
//!
//! let engine = RentalEngine::new(store, SimulatedGateway::new().shared(), EngineConfig::default());
//! let ctx = RequestContext::customer(session, UserId::new("7"));
//!
//! let reservation = engine
//!     .book_car(&ctx, BookingRequest {
//!         user_id: UserId::new("7"),
//!         car_id: CarId::new("12"),
//!         interval: DateInterval::parse("2024-03-10", "2024-03-12")?,
//!         add_ons: AddOns::NONE,
//!         payment_method: Some(PaymentMethod::Cash),
//!     })
//!     .await?;
//!
//! let receipt = engine
//!     .pay(&ctx, PaymentRequest::new(reservation.id, PaymentMethod::Cash, None))
//!     .await?
//!     .into_receipt()?;
//! ```

pub mod availability;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod interval;
pub mod lifecycle;
pub mod metrics;
pub mod payment;
pub mod pricing;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use availability::{Availability, AvailabilityChecker, AvailabilityPolicy};
pub use config::{Config, EngineConfig, SimulatedGatewayConfig};
pub use engine::RentalEngine;
pub use error::{EngineError, FieldError, PaymentDetailErrors, Result};
pub use gateway::{
    ChargeDecision, ChargeRequest, GatewayCharge, GatewayError, GatewayResult, PaymentGateway,
    SimulatedGateway,
};
pub use interval::DateInterval;
pub use lifecycle::ReservationEvent;
pub use payment::{
    DeclinePolicy, PaymentOrchestrator, PaymentOutcome, PaymentRequest, PaymentResult,
    validate_payment_details,
};
pub use pricing::{AddOnRates, PriceQuote, PricingCalculator};
pub use store::{DataStore, StatusUpdate, StoreError, StoreResult};
pub use types::*;

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = rental_testing::test_clock();
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
