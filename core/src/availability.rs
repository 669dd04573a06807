//! Availability checking.
//!
//! A car is available for an interval when none of its non-cancelled
//! reservations share a day with it. The check is advisory: two concurrent
//! bookings can both pass it, so the persistence boundary must also reject
//! overlapping writes (surfaced as `BookingConflict` by the engine).

use crate::error::{EngineError, Result};
use crate::interval::DateInterval;
use crate::metrics;
use crate::store::{DataStore, StoreError, bounded};
use crate::types::{CarId, Reservation, ReservationId, SessionToken};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do when the reservation lookup itself fails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityPolicy {
    /// Report the car as available, log a warning and mark the result degraded
    #[default]
    Permissive,
    /// Propagate the failure to the caller
    Strict,
}

impl AvailabilityPolicy {
    /// Parses `permissive` or `strict`
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "permissive" => Some(Self::Permissive),
            "strict" => Some(Self::Strict),
            _ => None,
        }
    }
}

/// Result of an availability check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Availability {
    /// True when nothing conflicts
    pub available: bool,
    /// Non-cancelled reservations sharing at least one day with the request
    pub conflicts: Vec<Reservation>,
    /// Set when the lookup failed and the answer was assumed, not observed
    pub degraded: Option<StoreError>,
}

impl Availability {
    /// Builds the result from the car's existing reservations
    #[must_use]
    pub fn from_existing(candidate: &DateInterval, existing: Vec<Reservation>) -> Self {
        let conflicts: Vec<Reservation> = existing
            .into_iter()
            .filter(|reservation| reservation.blocks_car())
            .filter(|reservation| candidate.overlaps(&reservation.interval))
            .collect();
        Self {
            available: conflicts.is_empty(),
            conflicts,
            degraded: None,
        }
    }

    /// An assumed-available answer after a failed lookup
    #[must_use]
    pub const fn assumed(reason: StoreError) -> Self {
        Self {
            available: true,
            conflicts: Vec::new(),
            degraded: Some(reason),
        }
    }

    /// IDs of the conflicting reservations
    #[must_use]
    pub fn conflict_ids(&self) -> Vec<ReservationId> {
        self.conflicts.iter().map(|r| r.id.clone()).collect()
    }
}

/// Checks car availability against the data boundary
pub struct AvailabilityChecker<'a> {
    store: &'a dyn DataStore,
    policy: AvailabilityPolicy,
    timeout: Duration,
}

impl<'a> AvailabilityChecker<'a> {
    /// Creates a checker over `store`
    #[must_use]
    pub const fn new(store: &'a dyn DataStore, policy: AvailabilityPolicy, timeout: Duration) -> Self {
        Self {
            store,
            policy,
            timeout,
        }
    }

    /// Whether `car_id` is free over `interval`.
    ///
    /// # Errors
    ///
    /// Under [`AvailabilityPolicy::Strict`], returns [`EngineError::Forbidden`]
    /// or [`EngineError::UpstreamUnavailable`] when the lookup fails. Under
    /// [`AvailabilityPolicy::Permissive`] only unreadable reservation data
    /// errors, as [`EngineError::UpstreamUnavailable`]; a missing reservation
    /// collection always means "no reservations".
    pub async fn check(
        &self,
        session: &SessionToken,
        car_id: &CarId,
        interval: &DateInterval,
    ) -> Result<Availability> {
        let lookup = bounded(
            self.timeout,
            self.store.fetch_reservations_for_car(session, car_id, true),
        )
        .await;

        match lookup {
            Ok(existing) => {
                let availability = Availability::from_existing(interval, existing);
                tracing::debug!(
                    car_id = %car_id,
                    interval = %interval,
                    conflicts = availability.conflicts.len(),
                    "Availability checked"
                );
                Ok(availability)
            }
            Err(StoreError::NotFound(detail)) => {
                tracing::warn!(car_id = %car_id, %detail, "No reservations found for car");
                Ok(Availability::assumed(StoreError::NotFound(detail)))
            }
            // The backend answered; an unreadable row may be a conflict
            Err(error @ StoreError::Decode(_)) => {
                tracing::error!(
                    car_id = %car_id,
                    error = %error,
                    "Reservation data for car is unreadable; refusing to assume availability"
                );
                Err(EngineError::from_store("fetch_reservations_for_car", error))
            }
            Err(error) => self.degrade(car_id, error),
        }
    }

    fn degrade(&self, car_id: &CarId, error: StoreError) -> Result<Availability> {
        match self.policy {
            AvailabilityPolicy::Permissive => {
                tracing::warn!(
                    car_id = %car_id,
                    error = %error,
                    "Availability lookup failed; assuming car is available"
                );
                metrics::record_availability_degraded(&error);
                Ok(Availability::assumed(error))
            }
            AvailabilityPolicy::Strict => Err(EngineError::from_store(
                "fetch_reservations_for_car",
                error,
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{AddOns, Money, PaymentStatus, ReservationStatus, UserId};
    use chrono::Utc;

    fn booking(id: &str, start: &str, end: &str, status: ReservationStatus) -> Reservation {
        Reservation {
            id: ReservationId::new(id),
            user_id: UserId::new("u1"),
            car_id: CarId::new("C1"),
            interval: DateInterval::parse(start, end).unwrap(),
            total_price: Money::from_units(100),
            status,
            add_ons: AddOns::NONE,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_inclusive_boundary_conflicts() {
        let existing = vec![booking("1", "2024-03-10", "2024-03-15", ReservationStatus::Confirmed)];

        let touching = DateInterval::parse("2024-03-15", "2024-03-20").unwrap();
        let result = Availability::from_existing(&touching, existing.clone());
        assert!(!result.available);
        assert_eq!(result.conflict_ids(), vec![ReservationId::new("1")]);

        let after = DateInterval::parse("2024-03-16", "2024-03-20").unwrap();
        let result = Availability::from_existing(&after, existing);
        assert!(result.available);
        assert!(result.conflicts.is_empty());
        assert!(result.degraded.is_none());
    }

    #[test]
    fn test_cancelled_reservations_never_block() {
        let existing = vec![
            booking("1", "2024-03-10", "2024-03-15", ReservationStatus::Cancelled),
            booking("2", "2024-03-01", "2024-03-05", ReservationStatus::Pending),
        ];
        let request = DateInterval::parse("2024-03-12", "2024-03-14").unwrap();
        let result = Availability::from_existing(&request, existing);
        assert!(result.available);
    }

    #[test]
    fn test_every_overlapping_booking_is_reported() {
        let existing = vec![
            booking("1", "2024-03-01", "2024-03-05", ReservationStatus::Pending),
            booking("2", "2024-03-05", "2024-03-08", ReservationStatus::Confirmed),
            booking("3", "2024-03-20", "2024-03-22", ReservationStatus::Completed),
        ];
        let request = DateInterval::parse("2024-03-04", "2024-03-06").unwrap();
        let result = Availability::from_existing(&request, existing);
        assert_eq!(
            result.conflict_ids(),
            vec![ReservationId::new("1"), ReservationId::new("2")]
        );
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(AvailabilityPolicy::from_name("Strict"), Some(AvailabilityPolicy::Strict));
        assert_eq!(
            AvailabilityPolicy::from_name(" permissive "),
            Some(AvailabilityPolicy::Permissive)
        );
        assert_eq!(AvailabilityPolicy::from_name("lenient"), None);
        assert_eq!(AvailabilityPolicy::default(), AvailabilityPolicy::Permissive);
    }
}
