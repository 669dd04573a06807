//! Scripted payment gateway
//!
//! Answers charges from a queue of scripted responses so payment flows are
//! deterministic. Every request is captured for assertions.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use futures::future::BoxFuture;
use rental_core::gateway::{
    ChargeDecision, ChargeRequest, GatewayCharge, GatewayError, GatewayResult, PaymentGateway,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted gateway response
#[derive(Clone, Debug)]
pub enum Scripted {
    /// Approve the charge
    Approve,
    /// Decline with a reason
    Decline(String),
    /// Fail without a definitive answer
    Fail(GatewayError),
    /// Never answer within any reasonable budget
    Hang,
}

#[derive(Debug, Default)]
struct Inner {
    script: VecDeque<Scripted>,
    fallback: Option<Scripted>,
    requests: Vec<ChargeRequest>,
    next_transaction: u64,
}

/// Gateway double answering from a script.
///
/// When the script runs out, the fallback answer is used (approve by default).
///
/// # Example
///
/// ```
/// use rental_testing::ScriptedGateway;
///
/// let gateway = ScriptedGateway::approving();
/// gateway.push_decline("insufficient funds");
/// assert_eq!(gateway.calls(), 0);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptedGateway {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedGateway {
    /// Gateway approving every charge
    #[must_use]
    pub fn approving() -> Self {
        Self::with_fallback(Scripted::Approve)
    }

    /// Gateway declining every charge
    #[must_use]
    pub fn declining(reason: impl Into<String>) -> Self {
        Self::with_fallback(Scripted::Decline(reason.into()))
    }

    /// Gateway answering `fallback` once the script is exhausted
    #[must_use]
    pub fn with_fallback(fallback: Scripted) -> Self {
        let gateway = Self::default();
        gateway.inner.lock().unwrap().fallback = Some(fallback);
        gateway
    }

    /// Queue a response
    pub fn push(&self, response: Scripted) {
        self.inner.lock().unwrap().script.push_back(response);
    }

    /// Queue an approval
    pub fn push_approve(&self) {
        self.push(Scripted::Approve);
    }

    /// Queue a decline
    pub fn push_decline(&self, reason: impl Into<String>) {
        self.push(Scripted::Decline(reason.into()));
    }

    /// Number of charges received
    #[must_use]
    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    /// Captured charge requests, in arrival order
    #[must_use]
    pub fn requests(&self) -> Vec<ChargeRequest> {
        self.inner.lock().unwrap().requests.clone()
    }
}

impl PaymentGateway for ScriptedGateway {
    fn charge(&self, request: ChargeRequest) -> BoxFuture<'_, GatewayResult<GatewayCharge>> {
        Box::pin(async move {
            let (response, transaction_id) = {
                let mut inner = self.inner.lock().unwrap();
                inner.requests.push(request);
                inner.next_transaction += 1;
                let response = inner
                    .script
                    .pop_front()
                    .or_else(|| inner.fallback.clone())
                    .unwrap_or(Scripted::Approve);
                (response, format!("trx-test-{}", inner.next_transaction))
            };

            match response {
                Scripted::Approve => Ok(GatewayCharge {
                    transaction_id,
                    decision: ChargeDecision::Approved,
                }),
                Scripted::Decline(reason) => Ok(GatewayCharge {
                    transaction_id,
                    decision: ChargeDecision::Declined { reason },
                }),
                Scripted::Fail(error) => Err(error),
                Scripted::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(GatewayError::Timeout)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rental_core::{Money, PaymentMethod, ReservationId};

    fn request() -> ChargeRequest {
        ChargeRequest {
            reservation_id: ReservationId::new("1"),
            amount: Money::from_units(100),
            method: PaymentMethod::Cash,
            details: None,
            idempotency_key: Some("k".to_string()),
        }
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let gateway = ScriptedGateway::approving();
        gateway.push_decline("card blocked");

        let first = gateway.charge(request()).await.unwrap();
        assert_eq!(
            first.decision,
            ChargeDecision::Declined {
                reason: "card blocked".to_string()
            }
        );

        let second = gateway.charge(request()).await.unwrap();
        assert!(second.is_approved());
        assert_ne!(first.transaction_id, second.transaction_id);

        assert_eq!(gateway.calls(), 2);
        assert_eq!(gateway.requests()[0].idempotency_key.as_deref(), Some("k"));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let gateway = ScriptedGateway::approving();
        gateway.push(Scripted::Fail(GatewayError::Unavailable("down".to_string())));
        let result = gateway.charge(request()).await;
        assert_eq!(result, Err(GatewayError::Unavailable("down".to_string())));
    }
}
