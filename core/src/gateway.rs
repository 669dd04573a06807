//! Payment gateway abstraction.
//!
//! The payment orchestrator charges through an injected [`PaymentGateway`],
//! so its behavior is deterministic under test. [`SimulatedGateway`] stands in
//! for a real processor (Stripe, `PayPal`, ...) during development: it approves
//! a configurable share of charges after a configurable delay.

use crate::types::{Money, PaymentDetails, PaymentMethod, ReservationId};
use futures::future::BoxFuture;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, GatewayError>;

/// The gateway could not give a definitive answer
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// No answer within the time budget; the charge may or may not have happened
    #[error("Gateway timeout")]
    Timeout,
    /// The gateway is unreachable or failed internally
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
}

/// A charge to execute
#[derive(Clone, Debug)]
pub struct ChargeRequest {
    /// Reservation being paid
    pub reservation_id: ReservationId,
    /// Amount to charge
    pub amount: Money,
    /// Payment method
    pub method: PaymentMethod,
    /// Method-specific details, already validated
    pub details: Option<PaymentDetails>,
    /// Caller-supplied deduplication key
    pub idempotency_key: Option<String>,
}

/// The gateway's decision on a charge
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChargeDecision {
    /// Money was taken
    Approved,
    /// Money was not taken
    Declined {
        /// Decline reason
        reason: String,
    },
}

/// Gateway answer for one charge
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayCharge {
    /// Gateway transaction ID, unique per attempt
    pub transaction_id: String,
    /// Approved or declined
    pub decision: ChargeDecision,
}

impl GatewayCharge {
    /// True when money was taken
    #[must_use]
    pub const fn is_approved(&self) -> bool {
        matches!(self.decision, ChargeDecision::Approved)
    }
}

/// Payment gateway trait
///
/// A call eventually returns exactly one answer. Declines are answers, not
/// errors; [`GatewayError`] means the outcome is unknown.
pub trait PaymentGateway: Send + Sync {
    /// Execute a charge
    fn charge(&self, request: ChargeRequest) -> BoxFuture<'_, GatewayResult<GatewayCharge>>;
}

/// Development gateway with a random outcome
#[derive(Clone, Debug)]
pub struct SimulatedGateway {
    success_rate: f64,
    latency: Duration,
}

impl SimulatedGateway {
    /// Approves 90% of charges after 1.5 seconds
    #[must_use]
    pub const fn new() -> Self {
        Self {
            success_rate: 0.9,
            latency: Duration::from_millis(1500),
        }
    }

    /// Share of approved charges, clamped to `0.0..=1.0`
    #[must_use]
    pub fn with_success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        self
    }

    /// Simulated processing delay
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(self) -> Arc<dyn PaymentGateway> {
        Arc::new(self)
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl PaymentGateway for SimulatedGateway {
    fn charge(&self, request: ChargeRequest) -> BoxFuture<'_, GatewayResult<GatewayCharge>> {
        Box::pin(async move {
            tokio::time::sleep(self.latency).await;

            let approved = rand::thread_rng().gen_bool(self.success_rate);
            let transaction_id = format!("trx-{}", uuid::Uuid::new_v4());
            let decision = if approved {
                ChargeDecision::Approved
            } else {
                ChargeDecision::Declined {
                    reason: "Simulated decline".to_string(),
                }
            };

            tracing::info!(
                reservation_id = %request.reservation_id,
                amount = request.amount.cents(),
                method = %request.method,
                transaction_id = %transaction_id,
                approved,
                "Simulated charge processed"
            );

            Ok(GatewayCharge {
                transaction_id,
                decision,
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request() -> ChargeRequest {
        ChargeRequest {
            reservation_id: ReservationId::new("42"),
            amount: Money::from_units(100),
            method: PaymentMethod::Cash,
            details: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn test_always_approving_gateway() {
        let gateway = SimulatedGateway::new()
            .with_success_rate(1.0)
            .with_latency(Duration::ZERO);

        let charge = gateway.charge(request()).await.unwrap();
        assert!(charge.is_approved());
        assert!(charge.transaction_id.starts_with("trx-"));
    }

    #[test]
    fn test_always_declining_gateway() {
        let gateway = SimulatedGateway::new()
            .with_success_rate(0.0)
            .with_latency(Duration::ZERO);

        let charge = tokio_test::block_on(gateway.charge(request())).unwrap();
        assert!(!charge.is_approved());
    }

    #[tokio::test]
    async fn test_transaction_ids_are_unique_per_attempt() {
        let gateway = SimulatedGateway::new()
            .with_success_rate(1.0)
            .with_latency(Duration::ZERO);

        let first = gateway.charge(request()).await.unwrap();
        let second = gateway.charge(request()).await.unwrap();
        assert_ne!(first.transaction_id, second.transaction_id);
    }

    #[test]
    fn test_success_rate_is_clamped() {
        let gateway = SimulatedGateway::new().with_success_rate(7.0);
        assert!((gateway.success_rate - 1.0).abs() < f64::EPSILON);
        let gateway = SimulatedGateway::new().with_success_rate(f64::NAN);
        assert!(gateway.success_rate.abs() < f64::EPSILON);
    }
}
