//! Conversion between Strapi entries and engine types.
//!
//! The backend stores status labels in French (`en attente`, `confirmée`,
//! `annulée`, `terminée`); older rows and admin edits may use English ones.
//! Both are accepted on read, French is written back.

use crate::schema::{
    CarAttributes, Entry, OneOrMany, PaymentPayload, Relation, ReservationAttributes,
    ReservationPayload, StatusPayload,
};
use chrono::{DateTime, Utc};
use rental_core::store::{StatusUpdate, StoreError, StoreResult};
use rental_core::{
    AddOns, AttemptOutcome, Car, CarId, DateInterval, Money, NewReservation, PaymentAttempt,
    PaymentMethod, PaymentStatus, Reservation, ReservationId, ReservationStatus, UserId,
};

/// Reads a reservation status label
#[must_use]
pub fn parse_status(label: &str) -> Option<ReservationStatus> {
    match label.trim().to_lowercase().as_str() {
        "en attente" | "pending" => Some(ReservationStatus::Pending),
        "confirmée" | "confirmee" | "confirmed" => Some(ReservationStatus::Confirmed),
        "terminée" | "terminee" | "completed" => Some(ReservationStatus::Completed),
        "annulée" | "annulee" | "cancelled" | "canceled" => Some(ReservationStatus::Cancelled),
        _ => None,
    }
}

/// Label written to the backend for `status`
#[must_use]
pub const fn status_label(status: ReservationStatus) -> &'static str {
    match status {
        ReservationStatus::Pending => "en attente",
        ReservationStatus::Confirmed => "confirmée",
        ReservationStatus::Completed => "terminée",
        ReservationStatus::Cancelled => "annulée",
    }
}

/// Reads a payment status label
#[must_use]
pub fn parse_payment_status(label: &str) -> Option<PaymentStatus> {
    match label.trim().to_lowercase().as_str() {
        "pending" => Some(PaymentStatus::Pending),
        "paid" => Some(PaymentStatus::Paid),
        "failed" => Some(PaymentStatus::Failed),
        "refunded" => Some(PaymentStatus::Refunded),
        _ => None,
    }
}

/// Whole units (possibly fractional) to cents; `None` if negative or not finite
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Range checked above the cast
pub fn money_from_units(units: f64) -> Option<Money> {
    let cents = (units * 100.0).round();
    if !cents.is_finite() || cents < 0.0 || cents > u64::MAX as f64 {
        return None;
    }
    Some(Money::from_cents(cents as u64))
}

/// Cents to whole units for the wire
#[must_use]
#[allow(clippy::cast_precision_loss)] // Prices stay far below 2^53 cents
pub fn money_to_units(amount: Money) -> f64 {
    amount.cents() as f64 / 100.0
}

fn related_id(relation: Option<Relation>) -> Option<String> {
    relation
        .and_then(|r| r.data)
        .and_then(OneOrMany::into_first)
        .map(|entry| entry.id.into_string())
}

fn decode(what: impl Into<String>) -> StoreError {
    StoreError::Decode(what.into())
}

/// Reads the fields of a row that conflict detection can do without
struct RowReader<'a> {
    id: &'a str,
    lenient: bool,
    filled: Vec<&'static str>,
}

impl RowReader<'_> {
    /// `value`, or `fallback` when lenient; a decode error otherwise
    fn field<T>(
        &mut self,
        value: Option<T>,
        field: &'static str,
        fallback: impl FnOnce() -> T,
    ) -> StoreResult<T> {
        match value {
            Some(value) => Ok(value),
            None if self.lenient => {
                self.filled.push(field);
                Ok(fallback())
            }
            None => Err(decode(format!("reservation {} has no valid {field}", self.id))),
        }
    }
}

/// Builds a reservation from an entry.
///
/// `user_hint` and `car_hint` fill relations the response did not populate
/// (the filter value of a lookup, or the fields just written).
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when a required field is missing or invalid.
pub fn reservation(
    entry: Entry<ReservationAttributes>,
    user_hint: Option<&UserId>,
    car_hint: Option<&CarId>,
) -> StoreResult<Reservation> {
    read_reservation(entry, user_hint, car_hint, false)
}

/// Builds a reservation for conflict detection.
///
/// Only the ID, dates and status are required: a row that holds a car for
/// some days blocks it whatever else is wrong with it. Missing user, price,
/// payment status or `createdAt` are replaced by placeholders and logged.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when the dates or status cannot be read.
pub fn blocking_reservation(
    entry: Entry<ReservationAttributes>,
    car_id: &CarId,
) -> StoreResult<Reservation> {
    read_reservation(entry, None, Some(car_id), true)
}

fn read_reservation(
    entry: Entry<ReservationAttributes>,
    user_hint: Option<&UserId>,
    car_hint: Option<&CarId>,
    lenient: bool,
) -> StoreResult<Reservation> {
    let id = entry.id.into_string();
    let attributes = entry
        .attributes
        .ok_or_else(|| decode(format!("reservation {id} has no attributes")))?;

    let (Some(start), Some(end)) = (attributes.start_date, attributes.end_date) else {
        return Err(decode(format!("reservation {id} has no dates")));
    };
    let interval = DateInterval::parse(&start, &end)
        .map_err(|e| decode(format!("reservation {id}: {e}")))?;

    let label = attributes.status.unwrap_or_default();
    let status = parse_status(&label)
        .ok_or_else(|| decode(format!("reservation {id} has unknown status '{label}'")))?;

    let mut reader = RowReader {
        id: &id,
        lenient,
        filled: Vec::new(),
    };

    let user_id = reader.field(
        related_id(attributes.user)
            .map(UserId::new)
            .or_else(|| user_hint.cloned()),
        "user",
        || UserId::new(""),
    )?;
    let car_id = reader.field(
        related_id(attributes.car)
            .map(CarId::new)
            .or_else(|| car_hint.cloned()),
        "car",
        || CarId::new(""),
    )?;

    let derived = if matches!(status, ReservationStatus::Confirmed | ReservationStatus::Completed) {
        PaymentStatus::Paid
    } else {
        PaymentStatus::Pending
    };
    let payment_status = match attributes.payment_status.as_deref() {
        Some(label) => reader.field(parse_payment_status(label), "paymentStatus", || derived)?,
        None => derived,
    };

    let total_price = reader.field(
        attributes.total_price.and_then(money_from_units),
        "totalPrice",
        || Money::from_cents(0),
    )?;

    let created_at = reader.field(
        attributes
            .created_at
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc)),
        "createdAt",
        DateTime::<Utc>::default,
    )?;

    if !reader.filled.is_empty() {
        tracing::warn!(
            reservation_id = %id,
            fields = ?reader.filled,
            "Incomplete reservation row kept for conflict detection"
        );
    }

    let reservation = Reservation {
        id: ReservationId::new(id),
        user_id,
        car_id,
        interval,
        total_price,
        status,
        add_ons: AddOns {
            with_driver: attributes.with_driver.unwrap_or(false),
            with_child_seat: attributes.with_child_seat.unwrap_or(false),
            with_gps: attributes.with_gps.unwrap_or(false),
        },
        payment_method: attributes
            .payment_method
            .as_deref()
            .and_then(PaymentMethod::from_code),
        payment_status,
        created_at,
    };

    if !reservation.is_consistent() {
        tracing::warn!(
            reservation_id = %reservation.id,
            status = %reservation.status,
            payment_status = %reservation.payment_status,
            "Stored reservation has an inconsistent payment status"
        );
    }

    Ok(reservation)
}

/// Builds a car from an entry; a missing or zero price becomes `default_daily_price`.
///
/// # Errors
///
/// Returns [`StoreError::Decode`] when the entry has no attributes.
pub fn car(entry: Entry<CarAttributes>, default_daily_price: Money) -> StoreResult<Car> {
    let id = entry.id.into_string();
    let attributes = entry
        .attributes
        .ok_or_else(|| decode(format!("car {id} has no attributes")))?;

    let daily_price = attributes
        .daily_price
        .and_then(money_from_units)
        .filter(|price| !price.is_zero())
        .unwrap_or(default_daily_price);

    Ok(Car {
        id: CarId::new(id),
        brand: attributes.brand.unwrap_or_default(),
        model: attributes.model.unwrap_or_default(),
        daily_price: Some(daily_price),
        has_ac: attributes.has_ac.unwrap_or(false),
        has_gps: attributes.has_gps.unwrap_or(false),
        child_seat_available: attributes.child_seat_available.unwrap_or(false),
        driver_available: attributes.driver_available.unwrap_or(false),
    })
}

/// Body for creating `fields`
#[must_use]
pub fn reservation_payload(fields: &NewReservation) -> ReservationPayload {
    ReservationPayload {
        user: fields.user_id.to_string(),
        car: fields.car_id.to_string(),
        start_date: fields.interval.start().to_string(),
        end_date: fields.interval.end().to_string(),
        total_price: money_to_units(fields.total_price),
        status: status_label(fields.status),
        with_driver: fields.add_ons.with_driver,
        with_child_seat: fields.add_ons.with_child_seat,
        with_gps: fields.add_ons.with_gps,
        payment_method: fields.payment_method.map(PaymentMethod::code),
        payment_status: fields.payment_status.as_str(),
    }
}

/// Body for a status update
#[must_use]
pub fn status_payload(update: &StatusUpdate) -> StatusPayload {
    StatusPayload {
        status: status_label(update.status),
        payment_status: update.payment_status.map(PaymentStatus::as_str),
        payment_method: update.payment_method.map(PaymentMethod::code),
    }
}

/// Body for persisting a payment attempt
#[must_use]
pub fn payment_payload(attempt: &PaymentAttempt) -> PaymentPayload {
    PaymentPayload {
        reservation: attempt.reservation_id.to_string(),
        transaction_id: attempt.transaction_id.clone(),
        amount: money_to_units(attempt.amount),
        payment_method: attempt.method.code(),
        status: match attempt.outcome {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Failure => "failed",
        },
        date: attempt.timestamp.to_rfc3339(),
        card_last_four: attempt.card_last_four.clone(),
        idempotency_key: attempt.idempotency_key.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::schema::{CarAttributes, Entry};

    fn entry(json: &str) -> Entry<ReservationAttributes> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_status_labels_round_trip_in_french() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Completed,
            ReservationStatus::Cancelled,
        ] {
            assert_eq!(parse_status(status_label(status)), Some(status));
            assert_eq!(parse_status(status.as_str()), Some(status));
        }
        assert_eq!(parse_status("Confirmée"), Some(ReservationStatus::Confirmed));
        assert_eq!(parse_status("archived"), None);
    }

    #[test]
    fn test_reservation_from_populated_entry() {
        let reservation = reservation(
            entry(
                r#"{"id":12,"attributes":{
                    "startDate":"2024-03-10","endDate":"2024-03-15","totalPrice":300,
                    "status":"confirmée","withDriver":false,"withChildSeat":true,"withGPS":true,
                    "paymentMethod":"creditCard","paymentStatus":"paid",
                    "createdAt":"2024-03-01T10:00:00.000Z",
                    "user":{"data":[{"id":7}]},"car":{"data":{"id":3}}}}"#,
            ),
            None,
            None,
        )
        .unwrap();

        assert_eq!(reservation.id.as_str(), "12");
        assert_eq!(reservation.user_id.as_str(), "7");
        assert_eq!(reservation.car_id.as_str(), "3");
        assert_eq!(reservation.interval.duration_days(), 6);
        assert_eq!(reservation.total_price, Money::from_units(300));
        assert_eq!(reservation.status, ReservationStatus::Confirmed);
        assert_eq!(reservation.payment_status, PaymentStatus::Paid);
        assert!(reservation.add_ons.with_gps && reservation.add_ons.with_child_seat);
        assert_eq!(reservation.payment_method, Some(PaymentMethod::CreditCard));
    }

    #[test]
    fn test_hints_fill_unpopulated_relations() {
        let raw = r#"{"id":"5","attributes":{
            "startDate":"2024-03-10T00:00:00.000Z","endDate":"2024-03-10T00:00:00.000Z",
            "totalPrice":99.5,"status":"en attente","createdAt":"2024-03-01T10:00:00Z"}}"#;

        let without = reservation(entry(raw), None, None);
        assert!(matches!(without, Err(StoreError::Decode(_))));

        let with = reservation(
            entry(raw),
            Some(&UserId::new("7")),
            Some(&CarId::new("3")),
        )
        .unwrap();
        assert_eq!(with.total_price, Money::from_cents(9_950));
        assert_eq!(with.payment_status, PaymentStatus::Pending);
        assert_eq!(with.payment_method, None);
    }

    #[test]
    fn test_blocking_row_survives_missing_price_and_timestamp() {
        let raw = r#"{"id":2,"attributes":{
            "startDate":"2024-05-01","endDate":"2024-05-02","totalPrice":null,
            "status":"confirmée","paymentStatus":"settled"}}"#;

        assert!(matches!(
            reservation(entry(raw), None, Some(&CarId::new("3"))),
            Err(StoreError::Decode(_))
        ));

        let blocking = blocking_reservation(entry(raw), &CarId::new("3")).unwrap();
        assert_eq!(blocking.id.as_str(), "2");
        assert_eq!(blocking.car_id.as_str(), "3");
        assert_eq!(blocking.status, ReservationStatus::Confirmed);
        assert_eq!(blocking.payment_status, PaymentStatus::Paid);
        assert!(blocking.blocks_car());
        assert_eq!(blocking.interval, DateInterval::parse("2024-05-01", "2024-05-02").unwrap());
    }

    #[test]
    fn test_blocking_row_still_needs_dates_and_status() {
        let no_dates = r#"{"id":4,"attributes":{"status":"confirmée"}}"#;
        let bad_status = r#"{"id":5,"attributes":{"startDate":"2024-05-01","endDate":"2024-05-02","status":"?"}}"#;

        assert!(matches!(
            blocking_reservation(entry(no_dates), &CarId::new("3")),
            Err(StoreError::Decode(_))
        ));
        assert!(matches!(
            blocking_reservation(entry(bad_status), &CarId::new("3")),
            Err(StoreError::Decode(_))
        ));
    }

    #[test]
    fn test_unknown_status_is_a_decode_error() {
        let result = reservation(
            entry(
                r#"{"id":1,"attributes":{"startDate":"2024-03-10","endDate":"2024-03-11",
                "totalPrice":10,"status":"lost","createdAt":"2024-03-01T10:00:00Z"}}"#,
            ),
            Some(&UserId::new("1")),
            Some(&CarId::new("1")),
        );
        assert!(matches!(result, Err(StoreError::Decode(msg)) if msg.contains("lost")));
    }

    #[test]
    fn test_car_price_fallback() {
        let default = Money::from_units(100);
        let parse = |json: &str| -> Car {
            let entry: Entry<CarAttributes> = serde_json::from_str(json).unwrap();
            car(entry, default).unwrap()
        };

        let priced = parse(r#"{"id":1,"attributes":{"brand":"Peugeot","model":"208","dailyPrice":45,"hasAC":true}}"#);
        assert_eq!(priced.daily_price, Some(Money::from_units(45)));
        assert!(priced.has_ac);
        assert_eq!(priced.display_name(), "Peugeot 208");

        let missing = parse(r#"{"id":2,"attributes":{"brand":"Fiat"}}"#);
        assert_eq!(missing.daily_price, Some(default));

        let zero = parse(r#"{"id":3,"attributes":{"dailyPrice":0}}"#);
        assert_eq!(zero.daily_price, Some(default));
    }

    #[test]
    fn test_money_conversion_rejects_nonsense() {
        assert_eq!(money_from_units(12.345), Some(Money::from_cents(1_235)));
        assert_eq!(money_from_units(-1.0), None);
        assert_eq!(money_from_units(f64::NAN), None);
        assert!((money_to_units(Money::from_cents(1_999)) - 19.99).abs() < 1e-9);
    }

    #[test]
    fn test_status_payload_carries_method_only_when_set() {
        let confirm = StatusUpdate {
            expected: ReservationStatus::Pending,
            status: ReservationStatus::Confirmed,
            payment_status: Some(PaymentStatus::Paid),
            payment_method: Some(PaymentMethod::ApplePay),
        };
        let body = serde_json::to_value(status_payload(&confirm)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "status": "confirmée", "paymentStatus": "paid", "paymentMethod": "applePay" })
        );

        let cancel = StatusUpdate {
            payment_status: None,
            payment_method: None,
            status: ReservationStatus::Cancelled,
            ..confirm
        };
        let body = serde_json::to_value(status_payload(&cancel)).unwrap();
        assert_eq!(body, serde_json::json!({ "status": "annulée" }));
    }
}
