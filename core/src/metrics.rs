//! Business metrics for the reservation engine.
//!
//! Recorded through the `metrics` facade; the binary embedding the engine
//! picks the exporter.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `rental_bookings_total{outcome}` - Booking attempts by outcome (created, conflict)
//! - `rental_booked_cents_total` - Value of created bookings in cents
//! - `rental_availability_degraded_total{cause}` - Availability answers assumed after a failed lookup
//! - `rental_payments_total{status}` - Payment attempts by status (succeeded, declined, unknown)
//! - `rental_payment_revenue_cents_total` - Revenue from approved charges in cents
//! - `rental_reconciliation_errors_total{detail}` - Charges whose follow-up writes failed
//! - `rental_transitions_total{event}` - Applied lifecycle transitions
//!
//! ## Histograms
//! - `rental_payment_duration_seconds` - Gateway round-trip time for approved charges

use crate::lifecycle::ReservationEvent;
use crate::payment::DeclinePolicy;
use crate::store::StoreError;
use metrics::{describe_counter, describe_histogram};

/// Registers metric descriptions. Call once at startup.
pub fn register_engine_metrics() {
    describe_counter!(
        "rental_bookings_total",
        "Booking attempts by outcome (created, conflict)"
    );
    describe_counter!(
        "rental_booked_cents_total",
        "Total value of created bookings in cents"
    );
    describe_counter!(
        "rental_availability_degraded_total",
        "Availability answers assumed after a failed reservation lookup"
    );

    describe_counter!(
        "rental_payments_total",
        "Payment attempts by status (succeeded, declined, unknown)"
    );
    describe_counter!(
        "rental_payment_revenue_cents_total",
        "Revenue from approved charges in cents"
    );
    describe_histogram!(
        "rental_payment_duration_seconds",
        "Gateway round-trip time for approved charges"
    );
    describe_counter!(
        "rental_reconciliation_errors_total",
        "Approved charges whose payment record or status update failed"
    );

    describe_counter!(
        "rental_transitions_total",
        "Applied reservation lifecycle transitions by event"
    );

    tracing::info!("Engine metrics registered");
}

// ============================================================================
// Recording
// ============================================================================

/// Record a created booking.
///
/// # Arguments
///
/// * `total_cents` - Booked price in cents
pub fn record_booking_created(total_cents: u64) {
    metrics::counter!("rental_bookings_total", "outcome" => "created").increment(1);
    metrics::counter!("rental_booked_cents_total").increment(total_cents);
    tracing::debug!(total_cents, "Recorded booking_created metric");
}

/// Record a rejected booking.
///
/// # Arguments
///
/// * `detected_at` - `availability_check` or `write`
pub fn record_booking_conflict(detected_at: &'static str) {
    metrics::counter!("rental_bookings_total", "outcome" => "conflict", "detected_at" => detected_at)
        .increment(1);
    tracing::debug!(detected_at, "Recorded booking_conflict metric");
}

/// Record an availability answer assumed after a failed lookup.
pub fn record_availability_degraded(cause: &StoreError) {
    let cause = match cause {
        StoreError::NotFound(_) => "not_found",
        StoreError::Forbidden(_) => "forbidden",
        StoreError::Conflict(_) => "conflict",
        StoreError::Timeout(_) => "timeout",
        StoreError::Unavailable(_) => "unavailable",
        StoreError::Decode(_) => "decode",
    };
    metrics::counter!("rental_availability_degraded_total", "cause" => cause).increment(1);
    tracing::debug!(cause, "Recorded availability_degraded metric");
}

/// Record an approved charge.
///
/// # Arguments
///
/// * `amount_cents` - Charged amount in cents
/// * `duration_secs` - Gateway round-trip time in seconds
pub fn record_payment_succeeded(amount_cents: u64, duration_secs: f64) {
    metrics::counter!("rental_payments_total", "status" => "succeeded").increment(1);
    metrics::counter!("rental_payment_revenue_cents_total").increment(amount_cents);
    metrics::histogram!("rental_payment_duration_seconds").record(duration_secs);
    tracing::debug!(amount_cents, duration_secs, "Recorded payment_succeeded metric");
}

/// Record a declined charge.
pub fn record_payment_declined(policy: DeclinePolicy) {
    let policy = match policy {
        DeclinePolicy::KeepPending => "keep_pending",
        DeclinePolicy::Abandon => "abandon",
    };
    metrics::counter!("rental_payments_total", "status" => "declined", "policy" => policy)
        .increment(1);
    tracing::debug!(policy, "Recorded payment_declined metric");
}

/// Record a charge whose outcome is unknown (gateway timeout or failure).
pub fn record_gateway_failure() {
    metrics::counter!("rental_payments_total", "status" => "unknown").increment(1);
    tracing::debug!("Recorded gateway_failure metric");
}

/// Record an approved charge that could not be reflected in the records.
pub fn record_reconciliation_error(detail: &str) {
    metrics::counter!("rental_reconciliation_errors_total", "detail" => detail.to_owned())
        .increment(1);
    tracing::debug!(detail, "Recorded reconciliation_error metric");
}

/// Record an applied lifecycle transition.
pub fn record_transition(event: ReservationEvent) {
    metrics::counter!("rental_transitions_total", "event" => event.as_str()).increment(1);
    tracing::debug!(%event, "Recorded transition metric");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // Without an installed recorder every call is a no-op; these only check
    // that recording never panics.
    #[test]
    fn test_recording_without_recorder() {
        register_engine_metrics();
        record_booking_created(30_000);
        record_booking_conflict("write");
        record_availability_degraded(&StoreError::Timeout(Duration::from_secs(1)));
        record_payment_succeeded(30_000, 0.2);
        record_payment_declined(DeclinePolicy::KeepPending);
        record_gateway_failure();
        record_reconciliation_error("reservation status not updated");
        record_transition(ReservationEvent::Cancel);
    }
}
