//! Domain types for the rental reservation engine.
//!
//! Value objects, entities and request types shared by every component of the
//! engine. Entities here are the *normalized* data model: boundary adapters
//! convert whatever the backend returns into these types once, at the edge.

use crate::interval::DateInterval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a backend-assigned identifier
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a car in the catalog
    CarId
);
string_id!(
    /// Identifier of a registered user
    UserId
);
string_id!(
    /// Identifier of a reservation, assigned by the persistence boundary
    ReservationId
);
string_id!(
    /// Identifier of a persisted payment record
    PaymentRecordId
);

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// A non-negative amount of money in cents
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Creates a `Money` value from whole currency units with overflow checking
    #[must_use]
    pub const fn checked_from_units(units: u64) -> Option<Self> {
        match units.checked_mul(100) {
            Some(cents) => Some(Self(cents)),
            None => None,
        }
    }

    /// Creates a `Money` value from whole currency units, saturating on overflow
    #[must_use]
    pub const fn from_units(units: u64) -> Self {
        Self(units.saturating_mul(100))
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Returns the amount in whole currency units (rounded down)
    #[must_use]
    pub const fn units(&self) -> u64 {
        self.0 / 100
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// A rentable car, as read from the catalog.
///
/// The engine never mutates cars.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    /// Car ID
    pub id: CarId,
    /// Brand, for display
    pub brand: String,
    /// Model, for display
    pub model: String,
    /// Price per rental day; `None` when the catalog has no usable price
    pub daily_price: Option<Money>,
    /// Air conditioning
    pub has_ac: bool,
    /// Built-in GPS
    pub has_gps: bool,
    /// A child seat can be added
    pub child_seat_available: bool,
    /// A driver can be booked with the car
    pub driver_available: bool,
}

impl Car {
    /// Creates a car with a daily price and no optional features
    #[must_use]
    pub fn new(id: CarId, daily_price: Money) -> Self {
        Self {
            id,
            brand: String::new(),
            model: String::new(),
            daily_price: Some(daily_price),
            has_ac: false,
            has_gps: false,
            child_seat_available: false,
            driver_available: false,
        }
    }

    /// "Brand Model", or the car ID when the catalog has no names
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.brand, self.model);
        let name = name.trim();
        if name.is_empty() {
            self.id.to_string()
        } else {
            name.to_string()
        }
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// Lifecycle status of a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Created, awaiting payment
    Pending,
    /// Paid
    Confirmed,
    /// Rental period over
    Completed,
    /// Cancelled by the customer, an admin, or an abandoned payment
    Cancelled,
}

impl ReservationStatus {
    /// `completed` and `cancelled` accept no further transitions
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether this status may be stored together with `payment`
    #[must_use]
    pub const fn admits(self, payment: PaymentStatus) -> bool {
        match self {
            Self::Pending => matches!(payment, PaymentStatus::Pending | PaymentStatus::Failed),
            Self::Confirmed | Self::Completed => matches!(payment, PaymentStatus::Paid),
            Self::Cancelled => true,
        }
    }

    /// Stable lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment status recorded on a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// No successful payment yet
    Pending,
    /// Charged
    Paid,
    /// Last attempt was declined
    Failed,
    /// Charge was returned
    Refunded,
}

impl PaymentStatus {
    /// Stable lowercase label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional extras booked with a car
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOns {
    /// Book a driver
    pub with_driver: bool,
    /// Add a child seat
    pub with_child_seat: bool,
    /// Add a GPS unit
    pub with_gps: bool,
}

impl AddOns {
    /// No extras
    pub const NONE: Self = Self {
        with_driver: false,
        with_child_seat: false,
        with_gps: false,
    };

    /// Every extra
    pub const ALL: Self = Self {
        with_driver: true,
        with_child_seat: true,
        with_gps: true,
    };
}

/// A booking record linking a user, a car, a date interval and payment state
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation ID
    pub id: ReservationId,
    /// Customer who booked
    pub user_id: UserId,
    /// Booked car
    pub car_id: CarId,
    /// Rental days, inclusive
    pub interval: DateInterval,
    /// Price computed at booking time
    pub total_price: Money,
    /// Lifecycle status
    pub status: ReservationStatus,
    /// Booked extras
    pub add_ons: AddOns,
    /// Method chosen at booking or payment time
    pub payment_method: Option<PaymentMethod>,
    /// Payment status
    pub payment_status: PaymentStatus,
    /// Creation time, assigned by the persistence boundary
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether `status` and `payment_status` form an allowed combination
    #[must_use]
    pub const fn is_consistent(&self) -> bool {
        self.status.admits(self.payment_status)
    }

    /// Cancelled reservations never block a car
    #[must_use]
    pub fn blocks_car(&self) -> bool {
        self.status != ReservationStatus::Cancelled
    }
}

/// Fields sent to the persistence boundary to create a reservation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    /// Customer
    pub user_id: UserId,
    /// Car
    pub car_id: CarId,
    /// Rental days
    pub interval: DateInterval,
    /// Computed price
    pub total_price: Money,
    /// Always `pending` for a new booking
    pub status: ReservationStatus,
    /// Booked extras
    pub add_ons: AddOns,
    /// Preferred payment method, if already chosen
    pub payment_method: Option<PaymentMethod>,
    /// Always `pending` for a new booking
    pub payment_status: PaymentStatus,
}

impl NewReservation {
    /// A fresh booking in `pending` / `pending`
    #[must_use]
    pub const fn pending(
        user_id: UserId,
        car_id: CarId,
        interval: DateInterval,
        total_price: Money,
        add_ons: AddOns,
        payment_method: Option<PaymentMethod>,
    ) -> Self {
        Self {
            user_id,
            car_id,
            interval,
            total_price,
            status: ReservationStatus::Pending,
            add_ons,
            payment_method,
            payment_status: PaymentStatus::Pending,
        }
    }
}

/// A request to book a car
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// Customer booking the car
    pub user_id: UserId,
    /// Car to book
    pub car_id: CarId,
    /// Rental days
    pub interval: DateInterval,
    /// Requested extras
    pub add_ons: AddOns,
    /// Preferred payment method
    pub payment_method: Option<PaymentMethod>,
}

// ============================================================================
// Payment
// ============================================================================

/// Payment methods offered at checkout
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credit or debit card
    CreditCard,
    /// `PayPal` account
    PayPal,
    /// Google Pay wallet
    GooglePay,
    /// Apple Pay wallet
    ApplePay,
    /// Bank transfer (settles in 1-3 days)
    BankTransfer,
    /// Cash at vehicle pickup
    Cash,
}

impl PaymentMethod {
    /// Every method, in checkout display order
    pub const ALL: [Self; 6] = [
        Self::CreditCard,
        Self::PayPal,
        Self::GooglePay,
        Self::ApplePay,
        Self::BankTransfer,
        Self::Cash,
    ];

    /// Wire identifier used by the backend
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::CreditCard => "creditCard",
            Self::PayPal => "paypal",
            Self::GooglePay => "googlePay",
            Self::ApplePay => "applePay",
            Self::BankTransfer => "bankTransfer",
            Self::Cash => "cash",
        }
    }

    /// Parses a wire identifier
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.code() == code)
    }

    /// Human-readable name
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::CreditCard => "Credit card",
            Self::PayPal => "PayPal",
            Self::GooglePay => "Google Pay",
            Self::ApplePay => "Apple Pay",
            Self::BankTransfer => "Bank transfer",
            Self::Cash => "Cash",
        }
    }

    /// One-line description shown at checkout
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::CreditCard => "Secure payment by bank card",
            Self::PayPal => "Pay with your PayPal account",
            Self::GooglePay => "Pay with your Google Pay account",
            Self::ApplePay => "Pay with your Apple Pay account",
            Self::BankTransfer => "Bank transfer (1-3 days to settle)",
            Self::Cash => "Cash payment when picking up the vehicle",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Method-specific details supplied with a payment
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentDetails {
    /// Card details
    Card {
        /// Card number, spaces allowed
        number: String,
        /// Expiry as `MM/YY`
        expiry: String,
        /// Three-digit security code
        cvv: String,
        /// Name on the card
        holder: String,
    },
    /// `PayPal` account
    PayPal {
        /// Account email
        email: String,
    },
    /// Bank account for a transfer
    BankTransfer {
        /// Account number or IBAN
        account_number: String,
        /// Bank name
        bank_name: String,
    },
}

impl PaymentDetails {
    /// Last four digits of a card number, if these are card details
    #[must_use]
    pub fn card_last_four(&self) -> Option<String> {
        match self {
            Self::Card { number, .. } => {
                let digits: Vec<char> = number.chars().filter(char::is_ascii_digit).collect();
                let start = digits.len().saturating_sub(4);
                Some(digits[start..].iter().collect())
            }
            Self::PayPal { .. } | Self::BankTransfer { .. } => None,
        }
    }
}

// Card numbers and CVVs must never reach logs.
impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Card { expiry, .. } => f
                .debug_struct("Card")
                .field("last_four", &self.card_last_four())
                .field("expiry", expiry)
                .finish_non_exhaustive(),
            Self::PayPal { email } => f.debug_struct("PayPal").field("email", email).finish(),
            Self::BankTransfer { bank_name, .. } => f
                .debug_struct("BankTransfer")
                .field("bank_name", bank_name)
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome of a single payment attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Gateway approved the charge
    Success,
    /// Gateway declined the charge
    Failure,
}

/// One payment attempt against a reservation, handed to the boundary for persistence
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAttempt {
    /// Reservation being paid
    pub reservation_id: ReservationId,
    /// Amount charged
    pub amount: Money,
    /// Method used
    pub method: PaymentMethod,
    /// Gateway outcome
    pub outcome: AttemptOutcome,
    /// Gateway transaction ID
    pub transaction_id: String,
    /// When the gateway answered
    pub timestamp: DateTime<Utc>,
    /// Last four card digits, for card payments
    pub card_last_four: Option<String>,
    /// Caller-supplied deduplication key, forwarded untouched
    pub idempotency_key: Option<String>,
}

/// A payment attempt as persisted by the boundary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Record ID
    pub id: PaymentRecordId,
    /// The persisted attempt
    pub attempt: PaymentAttempt,
}

// ============================================================================
// Session & actors
// ============================================================================

/// Credential passed explicitly into every data-access call
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a bearer token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token, for building an `Authorization` header
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

/// Who is asking for an operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "user_id", rename_all = "snake_case")]
pub enum Actor {
    /// A signed-in customer
    Customer(UserId),
    /// A back-office administrator
    Admin,
    /// Internal triggers such as schedulers
    System,
}

impl Actor {
    /// Label for logs
    #[must_use]
    pub const fn role(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

/// Per-request context: credential plus acting principal
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Credential forwarded to the data boundary
    pub session: SessionToken,
    /// Acting principal
    pub actor: Actor,
}

impl RequestContext {
    /// Context for a customer request
    #[must_use]
    pub fn customer(session: SessionToken, user_id: UserId) -> Self {
        Self {
            session,
            actor: Actor::Customer(user_id),
        }
    }

    /// Context for an admin request
    #[must_use]
    pub const fn admin(session: SessionToken) -> Self {
        Self {
            session,
            actor: Actor::Admin,
        }
    }

    /// Context for an internal trigger
    #[must_use]
    pub const fn system(session: SessionToken) -> Self {
        Self {
            session,
            actor: Actor::System,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_display_and_units() {
        let amount = Money::from_cents(12_345);
        assert_eq!(amount.units(), 123);
        assert_eq!(amount.to_string(), "123.45");
        assert_eq!(Money::from_units(3).cents(), 300);
        assert_eq!(Money::checked_from_units(u64::MAX), None);
    }

    #[test]
    fn test_status_payment_combinations() {
        use PaymentStatus as P;
        use ReservationStatus as S;

        assert!(S::Pending.admits(P::Pending));
        assert!(S::Pending.admits(P::Failed));
        assert!(!S::Pending.admits(P::Paid));
        assert!(S::Confirmed.admits(P::Paid));
        assert!(!S::Confirmed.admits(P::Pending));
        assert!(S::Completed.admits(P::Paid));
        assert!(!S::Completed.admits(P::Refunded));
        for payment in [P::Pending, P::Paid, P::Failed, P::Refunded] {
            assert!(S::Cancelled.admits(payment));
        }
    }

    #[test]
    fn test_payment_method_codes_round_trip() {
        for method in PaymentMethod::ALL {
            assert_eq!(PaymentMethod::from_code(method.code()), Some(method));
        }
        assert_eq!(PaymentMethod::from_code("bitcoin"), None);
    }

    #[test]
    fn test_card_details_never_leak_in_debug() {
        let details = PaymentDetails::Card {
            number: "4242 4242 4242 4242".to_string(),
            expiry: "12/27".to_string(),
            cvv: "123".to_string(),
            holder: "A Driver".to_string(),
        };
        let debug = format!("{details:?}");
        assert!(debug.contains("4242"));
        assert!(!debug.contains("4242 4242"));
        assert!(!debug.contains("123\""));
        assert_eq!(details.card_last_four().as_deref(), Some("4242"));
    }

    #[test]
    fn test_session_token_is_redacted() {
        let token = SessionToken::new("secret-jwt");
        assert_eq!(format!("{token:?}"), "SessionToken(***)");
        assert_eq!(token.expose(), "secret-jwt");
    }

    #[test]
    fn test_car_display_name_falls_back_to_id() {
        let mut car = Car::new(CarId::new("7"), Money::from_units(50));
        assert_eq!(car.display_name(), "7");
        car.brand = "Peugeot".to_string();
        car.model = "208".to_string();
        assert_eq!(car.display_name(), "Peugeot 208");
    }
}
