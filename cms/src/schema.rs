//! Wire shapes of the Strapi REST API.
//!
//! Every field the backend may omit is optional here; [`crate::normalize`]
//! decides what is required. Nothing outside this crate sees these types.

use serde::{Deserialize, Serialize};

/// `{ "data": ..., "meta": ... }`
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    /// Payload; `null` for a missing single entry
    pub data: Option<T>,
    /// Pagination metadata on collection responses
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Response metadata
#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    /// Present on collection responses
    pub pagination: Option<Pagination>,
}

/// Page position of a collection response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page, 1-based
    pub page: u32,
    /// Total number of pages
    pub page_count: u32,
}

/// Entry IDs are numbers in Strapi v4 and strings in some setups
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    /// Numeric ID
    Number(u64),
    /// String ID
    Text(String),
}

impl RawId {
    /// Canonical string form
    #[must_use]
    pub fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

/// `{ "id": ..., "attributes": { ... } }`
#[derive(Debug, Deserialize)]
pub struct Entry<A> {
    /// Entry ID
    pub id: RawId,
    /// Entry fields
    pub attributes: Option<A>,
}

/// A single value or an array of them
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// `{ ... }`
    One(T),
    /// `[ { ... }, ... ]`
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// The single value, or the first element of the array
    pub fn into_first(self) -> Option<T> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.into_iter().next(),
        }
    }
}

/// A populated relation: `{ "data": { "id": 3, ... } }`
#[derive(Debug, Deserialize)]
pub struct Relation {
    /// Related entry, or entries for to-many relations
    pub data: Option<OneOrMany<RelatedEntry>>,
}

/// The part of a related entry the adapter reads
#[derive(Debug, Deserialize)]
pub struct RelatedEntry {
    /// Related entry ID
    pub id: RawId,
}

/// Fields of a reservation entry
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationAttributes {
    /// `YYYY-MM-DD` or an ISO datetime
    pub start_date: Option<String>,
    /// `YYYY-MM-DD` or an ISO datetime
    pub end_date: Option<String>,
    /// Whole currency units, possibly fractional
    pub total_price: Option<f64>,
    /// French or English status label
    pub status: Option<String>,
    /// Driver booked
    pub with_driver: Option<bool>,
    /// Child seat booked
    pub with_child_seat: Option<bool>,
    /// GPS booked
    #[serde(rename = "withGPS")]
    pub with_gps: Option<bool>,
    /// Payment method code
    pub payment_method: Option<String>,
    /// `pending`, `paid`, `failed` or `refunded`
    pub payment_status: Option<String>,
    /// RFC 3339 timestamp
    pub created_at: Option<String>,
    /// Booking user
    pub user: Option<Relation>,
    /// Booked car
    pub car: Option<Relation>,
}

/// Fields of a car entry
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarAttributes {
    /// Brand
    pub brand: Option<String>,
    /// Model
    pub model: Option<String>,
    /// Whole currency units per day
    pub daily_price: Option<f64>,
    /// Air conditioning
    #[serde(rename = "hasAC")]
    pub has_ac: Option<bool>,
    /// Built-in GPS
    #[serde(rename = "hasGPS")]
    pub has_gps: Option<bool>,
    /// Child seat can be added
    pub child_seat_available: Option<bool>,
    /// Driver can be booked
    pub driver_available: Option<bool>,
}

/// Fields of a payment entry; only the ID is read back
#[derive(Debug, Default, Deserialize)]
pub struct PaymentAttributes {}

/// `{ "data": ... }` request body
#[derive(Debug, Serialize)]
pub struct WriteEnvelope<T> {
    /// Payload
    pub data: T,
}

/// Body of `POST /api/reservations`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationPayload {
    /// User ID
    pub user: String,
    /// Car ID
    pub car: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
    /// Whole currency units
    pub total_price: f64,
    /// Status label
    pub status: &'static str,
    /// Driver booked
    pub with_driver: bool,
    /// Child seat booked
    pub with_child_seat: bool,
    /// GPS booked
    #[serde(rename = "withGPS")]
    pub with_gps: bool,
    /// Payment method code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<&'static str>,
    /// Payment status label
    pub payment_status: &'static str,
}

/// Body of `PUT /api/reservations/{id}`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    /// Status label
    pub status: &'static str,
    /// Payment status label, when it changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<&'static str>,
    /// Payment method code, when it changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<&'static str>,
}

/// Body of `POST /api/payments`; never carries a full card number or CVV
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Reservation ID
    pub reservation: String,
    /// Gateway transaction ID
    pub transaction_id: String,
    /// Whole currency units
    pub amount: f64,
    /// Payment method code
    pub payment_method: &'static str,
    /// `success` or `failed`
    pub status: &'static str,
    /// RFC 3339 timestamp
    pub date: String,
    /// Last four card digits
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_last_four: Option<String>,
    /// Caller-supplied deduplication key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}
