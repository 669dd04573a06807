//! Payment orchestration.
//!
//! One call to [`PaymentOrchestrator::attempt_payment`] runs one attempt:
//!
//! 1. Validate payment details (no external call on failure)
//! 2. Re-fetch the reservation and check it can still be paid
//! 3. Charge through the gateway, within a time budget
//! 4. Persist the attempt, then write the new status in a single update
//!    that only applies if the reservation is still in the status read in 2
//!
//! A declined charge is an ordinary result, not an error. A charge that
//! succeeded but could not be recorded or reflected on the reservation is a
//! [`EngineError::ReconciliationError`]: money has moved and the records
//! disagree, so it is logged and counted apart from every other failure.

use crate::environment::Clock;
use crate::error::{EngineError, PaymentDetailErrors, Result};
use crate::gateway::{ChargeDecision, ChargeRequest, GatewayError, PaymentGateway};
use crate::lifecycle::{self, ReservationEvent};
use crate::metrics;
use crate::store::{DataStore, StatusUpdate, StoreError, bounded};
use crate::types::{
    Actor, AttemptOutcome, Money, PaymentAttempt, PaymentDetails, PaymentMethod, PaymentRecord,
    Reservation, ReservationId, SessionToken,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// ============================================================================
// Validation
// ============================================================================

/// Checks payment details for `method` without any external call.
///
/// Card numbers must have 16 digits once whitespace is removed, expiry must
/// be `MM/YY` and the CVV three digits. `PayPal` needs an email address and
/// bank transfers an account number and bank name. Wallets and cash take no
/// details.
///
/// # Errors
///
/// Returns [`EngineError::InvalidPaymentDetails`] listing every rejected field.
pub fn validate_payment_details(
    method: PaymentMethod,
    details: Option<&PaymentDetails>,
) -> Result<()> {
    let mut errors = PaymentDetailErrors::default();

    match (method, details) {
        (
            PaymentMethod::CreditCard,
            Some(PaymentDetails::Card {
                number,
                expiry,
                cvv,
                ..
            }),
        ) => {
            if !is_card_number(number) {
                errors.push("card_number", "card number must contain 16 digits");
            }
            if !is_expiry(expiry) {
                errors.push("expiry", "expiry date must use the MM/YY format");
            }
            if !is_cvv(cvv) {
                errors.push("cvv", "CVV must contain 3 digits");
            }
        }
        (PaymentMethod::PayPal, Some(PaymentDetails::PayPal { email })) => {
            if !is_email(email) {
                errors.push("paypal_email", "a valid PayPal email address is required");
            }
        }
        (
            PaymentMethod::BankTransfer,
            Some(PaymentDetails::BankTransfer {
                account_number,
                bank_name,
            }),
        ) => {
            if account_number.trim().is_empty() {
                errors.push("account_number", "account number is required");
            }
            if bank_name.trim().is_empty() {
                errors.push("bank_name", "bank name is required");
            }
        }
        (PaymentMethod::CreditCard, None) => errors.push("card", "card details are required"),
        (PaymentMethod::PayPal, None) => {
            errors.push("paypal_email", "a valid PayPal email address is required");
        }
        (PaymentMethod::BankTransfer, None) => {
            errors.push("bank_details", "bank details are required");
        }
        (PaymentMethod::GooglePay | PaymentMethod::ApplePay | PaymentMethod::Cash, None) => {}
        (method, Some(_)) => errors.push(
            "details",
            format!("details do not match payment method {method}"),
        ),
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(EngineError::InvalidPaymentDetails(errors))
    }
}

fn is_card_number(number: &str) -> bool {
    let digits: String = number.chars().filter(|c| !c.is_whitespace()).collect();
    digits.len() == 16 && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_expiry(expiry: &str) -> bool {
    let bytes = expiry.as_bytes();
    if bytes.len() != 5 || bytes[2] != b'/' {
        return false;
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return false;
    }
    let month = (bytes[0] - b'0') * 10 + (bytes[1] - b'0');
    (1..=12).contains(&month)
}

fn is_cvv(cvv: &str) -> bool {
    cvv.len() == 3 && cvv.chars().all(|c| c.is_ascii_digit())
}

fn is_email(email: &str) -> bool {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

// ============================================================================
// Requests & results
// ============================================================================

/// What happens to the reservation when the gateway declines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclinePolicy {
    /// Keep the reservation pending so the customer can retry
    #[default]
    KeepPending,
    /// Cancel the reservation
    Abandon,
}

/// One payment attempt requested by a caller
#[derive(Clone, Debug)]
pub struct PaymentRequest {
    /// Reservation to pay
    pub reservation_id: ReservationId,
    /// Amount offered; `None` charges the reservation total
    pub amount: Option<Money>,
    /// Payment method
    pub method: PaymentMethod,
    /// Method-specific details
    pub details: Option<PaymentDetails>,
    /// Forwarded to the gateway and the payment record; not deduplicated here
    pub idempotency_key: Option<String>,
    /// Reservation handling on decline
    pub on_decline: DeclinePolicy,
}

impl PaymentRequest {
    /// Pays the reservation total with `method`
    #[must_use]
    pub const fn new(
        reservation_id: ReservationId,
        method: PaymentMethod,
        details: Option<PaymentDetails>,
    ) -> Self {
        Self {
            reservation_id,
            amount: None,
            method,
            details,
            idempotency_key: None,
            on_decline: DeclinePolicy::KeepPending,
        }
    }

    /// Requires the charged amount to equal `amount`
    #[must_use]
    pub const fn with_amount(mut self, amount: Money) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Attaches a deduplication key
    #[must_use]
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Sets the decline policy
    #[must_use]
    pub const fn on_decline(mut self, policy: DeclinePolicy) -> Self {
        self.on_decline = policy;
        self
    }
}

/// Gateway verdict as seen by the caller
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Charged; the reservation is confirmed
    Succeeded,
    /// Not charged; the reservation is pending (or cancelled on abandon)
    Declined {
        /// Decline reason
        reason: String,
    },
}

/// Outcome of a completed payment attempt
#[derive(Clone, Debug)]
pub struct PaymentResult {
    /// Reservation as written after the attempt
    pub reservation: Reservation,
    /// Approved or declined
    pub outcome: PaymentOutcome,
    /// Gateway transaction ID
    pub transaction_id: String,
    /// Amount charged or attempted
    pub amount: Money,
    /// Method used
    pub method: PaymentMethod,
    /// When the gateway answered
    pub timestamp: DateTime<Utc>,
    /// Persisted payment record
    pub record: PaymentRecord,
}

impl PaymentResult {
    /// True when the charge went through
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, PaymentOutcome::Succeeded)
    }

    /// Converts a decline into an error, for callers that prefer `?`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PaymentDeclined`] when the gateway declined.
    pub fn into_receipt(self) -> Result<Self> {
        match &self.outcome {
            PaymentOutcome::Succeeded => Ok(self),
            PaymentOutcome::Declined { reason } => Err(EngineError::PaymentDeclined {
                reservation_id: self.reservation.id.clone(),
                transaction_id: self.transaction_id.clone(),
                reason: reason.clone(),
            }),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs payment attempts against a data store and a gateway
pub struct PaymentOrchestrator<'a> {
    store: &'a dyn DataStore,
    gateway: &'a dyn PaymentGateway,
    clock: &'a dyn Clock,
    store_timeout: Duration,
    gateway_timeout: Duration,
}

impl<'a> PaymentOrchestrator<'a> {
    /// Creates an orchestrator over the given collaborators
    #[must_use]
    pub const fn new(
        store: &'a dyn DataStore,
        gateway: &'a dyn PaymentGateway,
        clock: &'a dyn Clock,
        store_timeout: Duration,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            clock,
            store_timeout,
            gateway_timeout,
        }
    }

    /// Runs one payment attempt.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidPaymentDetails`] before any external call
    /// - [`EngineError::ReservationNotFound`] if the reservation is gone
    /// - [`EngineError::Forbidden`] if `actor` does not own the reservation
    /// - [`EngineError::InvalidTransition`] if the reservation is not pending
    /// - [`EngineError::AmountMismatch`] if `amount` differs from the total
    /// - [`EngineError::UpstreamUnavailable`] on boundary or gateway failure
    /// - [`EngineError::ReconciliationError`] if the charge succeeded but a
    ///   follow-up write failed
    pub async fn attempt_payment(
        &self,
        session: &SessionToken,
        actor: &Actor,
        request: PaymentRequest,
    ) -> Result<PaymentResult> {
        validate_payment_details(request.method, request.details.as_ref())?;

        let reservation = self.fetch(session, &request.reservation_id).await?;
        lifecycle::authorize_access(actor, &reservation)?;
        let confirmed = lifecycle::transition(&reservation, ReservationEvent::PaymentSucceeded)?;

        let amount = reservation.total_price;
        if let Some(offered) = request.amount {
            if offered != amount {
                return Err(EngineError::AmountMismatch {
                    expected: amount,
                    actual: offered,
                });
            }
        }

        let card_last_four = request.details.as_ref().and_then(PaymentDetails::card_last_four);
        let charge_request = ChargeRequest {
            reservation_id: reservation.id.clone(),
            amount,
            method: request.method,
            details: request.details,
            idempotency_key: request.idempotency_key.clone(),
        };

        let started = Instant::now();
        let charge = match tokio::time::timeout(self.gateway_timeout, self.gateway.charge(charge_request)).await {
            Ok(Ok(charge)) => charge,
            Ok(Err(error)) => return Err(self.outcome_unknown(&reservation, &error)),
            Err(_) => return Err(self.outcome_unknown(&reservation, &GatewayError::Timeout)),
        };
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match &charge.decision {
            ChargeDecision::Approved => AttemptOutcome::Success,
            ChargeDecision::Declined { .. } => AttemptOutcome::Failure,
        };
        let attempt = PaymentAttempt {
            reservation_id: reservation.id.clone(),
            amount,
            method: request.method,
            outcome,
            transaction_id: charge.transaction_id.clone(),
            timestamp: self.clock.now(),
            card_last_four,
            idempotency_key: request.idempotency_key,
        };

        match charge.decision {
            ChargeDecision::Approved => {
                let update = StatusUpdate::transition(&reservation, &confirmed)
                    .with_payment_method(request.method);
                let result = self.settle_success(session, &confirmed, update, attempt).await?;
                metrics::record_payment_succeeded(amount.cents(), elapsed);
                Ok(result)
            }
            ChargeDecision::Declined { reason } => {
                let event = match request.on_decline {
                    DeclinePolicy::KeepPending => ReservationEvent::PaymentFailed,
                    DeclinePolicy::Abandon => ReservationEvent::PaymentAbandoned,
                };
                let next = lifecycle::transition(&reservation, event)?;
                let update = StatusUpdate::transition(&reservation, &next);
                let result = self.settle_decline(session, &next, update, attempt, reason).await?;
                metrics::record_payment_declined(request.on_decline);
                Ok(result)
            }
        }
    }

    async fn fetch(&self, session: &SessionToken, id: &ReservationId) -> Result<Reservation> {
        match bounded(self.store_timeout, self.store.fetch_reservation(session, id)).await {
            Ok(Some(reservation)) => Ok(reservation),
            Ok(None) | Err(StoreError::NotFound(_)) => {
                Err(EngineError::ReservationNotFound(id.clone()))
            }
            Err(error) => Err(EngineError::from_store("fetch_reservation", error)),
        }
    }

    async fn settle_success(
        &self,
        session: &SessionToken,
        confirmed: &Reservation,
        update: StatusUpdate,
        attempt: PaymentAttempt,
    ) -> Result<PaymentResult> {
        let transaction_id = attempt.transaction_id.clone();
        let (amount, method, timestamp) = (attempt.amount, attempt.method, attempt.timestamp);

        let record = bounded(self.store_timeout, self.store.record_payment(session, attempt))
            .await
            .map_err(|error| {
                reconciliation(confirmed, &transaction_id, "payment record not persisted", &error)
            })?;

        let reservation = bounded(
            self.store_timeout,
            self.store.update_reservation_status(session, &confirmed.id, update),
        )
        .await
        .map_err(|error| {
            let detail = match &error {
                StoreError::Conflict(_) => "reservation changed during the charge",
                _ => "reservation status not updated",
            };
            reconciliation(confirmed, &transaction_id, detail, &error)
        })?;

        tracing::info!(
            reservation_id = %reservation.id,
            transaction_id = %transaction_id,
            amount = amount.cents(),
            method = %method,
            "Payment succeeded; reservation confirmed"
        );

        Ok(PaymentResult {
            reservation,
            outcome: PaymentOutcome::Succeeded,
            transaction_id,
            amount,
            method,
            timestamp,
            record,
        })
    }

    async fn settle_decline(
        &self,
        session: &SessionToken,
        next: &Reservation,
        update: StatusUpdate,
        attempt: PaymentAttempt,
        reason: String,
    ) -> Result<PaymentResult> {
        let transaction_id = attempt.transaction_id.clone();
        let (amount, method, timestamp) = (attempt.amount, attempt.method, attempt.timestamp);

        let record = bounded(self.store_timeout, self.store.record_payment(session, attempt))
            .await
            .map_err(|error| EngineError::from_store("record_payment", error))?;

        let reservation = bounded(
            self.store_timeout,
            self.store.update_reservation_status(session, &next.id, update),
        )
        .await
        .map_err(|error| EngineError::from_store("update_reservation_status", error))?;

        tracing::warn!(
            reservation_id = %reservation.id,
            transaction_id = %transaction_id,
            status = %reservation.status,
            %reason,
            "Payment declined"
        );

        Ok(PaymentResult {
            reservation,
            outcome: PaymentOutcome::Declined { reason },
            transaction_id,
            amount,
            method,
            timestamp,
            record,
        })
    }

    fn outcome_unknown(&self, reservation: &Reservation, error: &GatewayError) -> EngineError {
        tracing::error!(
            reservation_id = %reservation.id,
            error = %error,
            timeout_ms = u64::try_from(self.gateway_timeout.as_millis()).unwrap_or(u64::MAX),
            "Gateway gave no answer; charge outcome unknown"
        );
        metrics::record_gateway_failure();
        EngineError::UpstreamUnavailable {
            operation: "gateway_charge",
            detail: error.to_string(),
        }
    }
}

fn reconciliation(
    reservation: &Reservation,
    transaction_id: &str,
    detail: &str,
    cause: &StoreError,
) -> EngineError {
    tracing::error!(
        reservation_id = %reservation.id,
        transaction_id = %transaction_id,
        cause = %cause,
        "Charge succeeded but {detail}; manual reconciliation required"
    );
    metrics::record_reconciliation_error(detail);
    EngineError::ReconciliationError {
        reservation_id: reservation.id.clone(),
        transaction_id: transaction_id.to_string(),
        detail: format!("{detail}: {cause}"),
    }
}
