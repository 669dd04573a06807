//! The engine façade.
//!
//! [`RentalEngine`] composes availability, pricing, the lifecycle state
//! machine and payment orchestration behind the operations callers use. It
//! holds no per-request state: the session and the acting principal travel
//! in a [`RequestContext`] on every call.

use crate::availability::{Availability, AvailabilityChecker};
use crate::config::EngineConfig;
use crate::environment::{Clock, SystemClock};
use crate::error::{EngineError, Result};
use crate::gateway::PaymentGateway;
use crate::interval::DateInterval;
use crate::lifecycle::{self, ReservationEvent};
use crate::metrics;
use crate::payment::{PaymentOrchestrator, PaymentRequest, PaymentResult};
use crate::pricing::{PriceQuote, PricingCalculator};
use crate::store::{DataStore, StatusUpdate, StoreError, bounded};
use crate::types::{
    Actor, AddOns, BookingRequest, Car, CarId, NewReservation, RequestContext, Reservation,
    ReservationId, SessionToken, UserId,
};
use std::sync::Arc;

/// Reservation engine
///
/// Cheap to clone; every clone shares the same collaborators.
#[derive(Clone)]
pub struct RentalEngine {
    store: Arc<dyn DataStore>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    pricing: PricingCalculator,
}

impl RentalEngine {
    /// Creates an engine using the system clock
    #[must_use]
    pub fn new(
        store: Arc<dyn DataStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            clock: Arc::new(SystemClock),
            config,
            pricing: PricingCalculator::new(config.rates),
        }
    }

    /// Replaces the clock used to timestamp payment attempts
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether `car_id` is free over `interval`.
    ///
    /// # Errors
    ///
    /// Only under the strict availability policy, when the lookup fails.
    pub async fn check_availability(
        &self,
        ctx: &RequestContext,
        car_id: &CarId,
        interval: &DateInterval,
    ) -> Result<Availability> {
        self.checker().check(&ctx.session, car_id, interval).await
    }

    /// Itemised price for renting `car_id` over `interval`.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidCar`] if the car is unknown or has no usable
    /// price; [`EngineError::UpstreamUnavailable`] if the catalog is unreachable.
    pub async fn quote(
        &self,
        ctx: &RequestContext,
        car_id: &CarId,
        interval: &DateInterval,
        add_ons: AddOns,
    ) -> Result<PriceQuote> {
        let car = self.fetch_car(&ctx.session, car_id).await?;
        self.pricing.quote(&car, interval, add_ons)
    }

    /// Books a car: availability, then price, then a pending reservation.
    ///
    /// Nothing is written unless the availability check passes. A conflict
    /// detected by the store at write time is reported the same way as one
    /// found by the check.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Forbidden`] if a customer books for someone else
    /// - [`EngineError::BookingConflict`] if the interval is taken
    /// - [`EngineError::InvalidCar`] if the car cannot be priced
    /// - [`EngineError::UpstreamUnavailable`] on boundary failure
    pub async fn book_car(
        &self,
        ctx: &RequestContext,
        request: BookingRequest,
    ) -> Result<Reservation> {
        if let Actor::Customer(user_id) = &ctx.actor {
            if *user_id != request.user_id {
                return Err(EngineError::Forbidden(format!(
                    "customer {user_id} may not book on behalf of {}",
                    request.user_id
                )));
            }
        }

        let availability = self
            .check_availability(ctx, &request.car_id, &request.interval)
            .await?;
        if !availability.available {
            tracing::info!(
                car_id = %request.car_id,
                interval = %request.interval,
                conflicts = availability.conflicts.len(),
                "Booking rejected: car already reserved"
            );
            metrics::record_booking_conflict("availability_check");
            return Err(EngineError::BookingConflict {
                car_id: request.car_id,
                conflicts: availability.conflict_ids(),
            });
        }

        let car = self.fetch_car(&ctx.session, &request.car_id).await?;
        let total_price = self
            .pricing
            .compute_price(&car, &request.interval, request.add_ons)?;

        let fields = NewReservation::pending(
            request.user_id,
            request.car_id.clone(),
            request.interval,
            total_price,
            request.add_ons,
            request.payment_method,
        );

        let reservation = match bounded(
            self.config.store_timeout(),
            self.store.create_reservation(&ctx.session, fields),
        )
        .await
        {
            Ok(reservation) => reservation,
            Err(StoreError::Conflict(detail)) => {
                tracing::warn!(
                    car_id = %request.car_id,
                    %detail,
                    "Booking lost a race: overlapping reservation written concurrently"
                );
                metrics::record_booking_conflict("write");
                return Err(EngineError::BookingConflict {
                    car_id: request.car_id,
                    conflicts: Vec::new(),
                });
            }
            Err(error) => return Err(EngineError::from_store("create_reservation", error)),
        };

        tracing::info!(
            reservation_id = %reservation.id,
            car_id = %reservation.car_id,
            user_id = %reservation.user_id,
            interval = %reservation.interval,
            total = %reservation.total_price,
            degraded = availability.degraded.is_some(),
            "Reservation created"
        );
        metrics::record_booking_created(reservation.total_price.cents());

        Ok(reservation)
    }

    /// Runs one payment attempt for a pending reservation.
    ///
    /// A decline is `Ok` with a declined outcome; use
    /// [`PaymentResult::into_receipt`] to turn it into an error.
    ///
    /// # Errors
    ///
    /// See [`PaymentOrchestrator::attempt_payment`].
    pub async fn pay(&self, ctx: &RequestContext, request: PaymentRequest) -> Result<PaymentResult> {
        let result = PaymentOrchestrator::new(
            self.store.as_ref(),
            self.gateway.as_ref(),
            self.clock.as_ref(),
            self.config.store_timeout(),
            self.config.gateway_timeout(),
        )
        .attempt_payment(&ctx.session, &ctx.actor, request)
        .await?;

        let event = if result.is_success() {
            ReservationEvent::PaymentSucceeded
        } else if result.reservation.status.is_terminal() {
            ReservationEvent::PaymentAbandoned
        } else {
            ReservationEvent::PaymentFailed
        };
        metrics::record_transition(event);

        Ok(result)
    }

    /// Cancels a pending or confirmed reservation.
    ///
    /// Payment status is left as is; refunds are handled elsewhere.
    ///
    /// # Errors
    ///
    /// - [`EngineError::ReservationNotFound`] if it does not exist
    /// - [`EngineError::Forbidden`] if a customer cancels someone else's booking
    /// - [`EngineError::InvalidTransition`] if it is already completed or cancelled
    /// - [`EngineError::UpstreamUnavailable`] on boundary failure
    pub async fn cancel(&self, ctx: &RequestContext, id: &ReservationId) -> Result<Reservation> {
        self.apply(ctx, id, ReservationEvent::Cancel).await
    }

    /// Closes a confirmed reservation after the rental.
    ///
    /// # Errors
    ///
    /// As [`RentalEngine::cancel`]; customers may never complete a rental.
    pub async fn complete(&self, ctx: &RequestContext, id: &ReservationId) -> Result<Reservation> {
        self.apply(ctx, id, ReservationEvent::RentalEnded).await
    }

    /// A single reservation.
    ///
    /// # Errors
    ///
    /// [`EngineError::ReservationNotFound`], [`EngineError::Forbidden`] for
    /// another customer's booking, or [`EngineError::UpstreamUnavailable`].
    pub async fn reservation(&self, ctx: &RequestContext, id: &ReservationId) -> Result<Reservation> {
        let reservation = self.fetch_reservation(&ctx.session, id).await?;
        lifecycle::authorize_access(&ctx.actor, &reservation)?;
        Ok(reservation)
    }

    /// All reservations of `user_id`, newest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::Forbidden`] if a customer asks for another user's
    /// bookings; [`EngineError::UpstreamUnavailable`] on boundary failure.
    pub async fn reservations_for_user(
        &self,
        ctx: &RequestContext,
        user_id: &UserId,
    ) -> Result<Vec<Reservation>> {
        if let Actor::Customer(own) = &ctx.actor {
            if own != user_id {
                return Err(EngineError::Forbidden(format!(
                    "customer {own} may not list reservations of {user_id}"
                )));
            }
        }

        let mut reservations = match bounded(
            self.config.store_timeout(),
            self.store.fetch_reservations_for_user(&ctx.session, user_id),
        )
        .await
        {
            Ok(reservations) => reservations,
            Err(StoreError::NotFound(_)) => Vec::new(),
            Err(error) => return Err(EngineError::from_store("fetch_reservations_for_user", error)),
        };

        reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reservations)
    }

    fn checker(&self) -> AvailabilityChecker<'_> {
        AvailabilityChecker::new(
            self.store.as_ref(),
            self.config.availability_policy,
            self.config.store_timeout(),
        )
    }

    async fn apply(
        &self,
        ctx: &RequestContext,
        id: &ReservationId,
        event: ReservationEvent,
    ) -> Result<Reservation> {
        let current = self.fetch_reservation(&ctx.session, id).await?;
        lifecycle::authorize(&ctx.actor, &current, event)?;
        let next = lifecycle::transition(&current, event)?;

        let updated = match bounded(
            self.config.store_timeout(),
            self.store.update_reservation_status(
                &ctx.session,
                id,
                StatusUpdate::transition(&current, &next),
            ),
        )
        .await
        {
            Ok(updated) => updated,
            Err(StoreError::NotFound(_)) => return Err(EngineError::ReservationNotFound(id.clone())),
            Err(error @ StoreError::Conflict(_)) => {
                // Changed since it was read: judge the event against the fresh status
                let fresh = self.fetch_reservation(&ctx.session, id).await?;
                tracing::warn!(
                    reservation_id = %id,
                    %event,
                    read = %current.status,
                    now = %fresh.status,
                    "Reservation changed before the transition was written"
                );
                lifecycle::transition(&fresh, event)?;
                return Err(EngineError::from_store("update_reservation_status", error));
            }
            Err(error) => return Err(EngineError::from_store("update_reservation_status", error)),
        };

        tracing::info!(
            reservation_id = %id,
            %event,
            from = %current.status,
            to = %updated.status,
            actor = ctx.actor.role(),
            "Reservation transitioned"
        );
        metrics::record_transition(event);

        Ok(updated)
    }

    async fn fetch_reservation(
        &self,
        session: &SessionToken,
        id: &ReservationId,
    ) -> Result<Reservation> {
        match bounded(
            self.config.store_timeout(),
            self.store.fetch_reservation(session, id),
        )
        .await
        {
            Ok(Some(reservation)) => Ok(reservation),
            Ok(None) | Err(StoreError::NotFound(_)) => {
                Err(EngineError::ReservationNotFound(id.clone()))
            }
            Err(error) => Err(EngineError::from_store("fetch_reservation", error)),
        }
    }

    async fn fetch_car(&self, session: &SessionToken, car_id: &CarId) -> Result<Car> {
        match bounded(self.config.store_timeout(), self.store.fetch_car(session, car_id)).await {
            Ok(car) => Ok(car),
            Err(StoreError::NotFound(_)) => Err(EngineError::InvalidCar {
                car_id: car_id.clone(),
                reason: "car not found".to_string(),
            }),
            Err(error) => Err(EngineError::from_store("fetch_car", error)),
        }
    }
}
