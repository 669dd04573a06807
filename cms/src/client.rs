//! Strapi REST client implementing [`DataStore`]

use crate::config::CmsConfig;
use crate::error::CmsError;
use crate::normalize;
use crate::schema::{
    CarAttributes, Entry, Envelope, PaymentAttributes, ReservationAttributes, WriteEnvelope,
};
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use rental_core::{DataStore, StatusUpdate, StoreError, StoreResult};
use rental_core::{
    Car, CarId, Money, NewReservation, PaymentAttempt, PaymentRecord, PaymentRecordId,
    Reservation, ReservationId, ReservationStatus, SessionToken, UserId,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Entries requested per collection page
const PAGE_SIZE: u32 = 100;

/// Upper bound on pages followed for one collection query; larger
/// collections fail rather than come back partial
const MAX_PAGES: u32 = 50;

/// Relations populated on reservation reads and writes
const POPULATE: &str = "user,car";

/// Strapi REST client
#[derive(Clone, Debug)]
pub struct StrapiClient {
    http: Client,
    api_url: String,
    timeout: Duration,
    default_daily_price: Money,
}

impl StrapiClient {
    /// Create a client for the backend described by `config`
    ///
    /// # Errors
    ///
    /// Returns [`CmsError::InvalidBaseUrl`] if the base URL does not parse, or
    /// [`CmsError::ClientBuild`] if the HTTP client cannot be constructed.
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let base = config.base_url.trim_end_matches('/');
        Url::parse(base).map_err(|e| CmsError::InvalidBaseUrl {
            url: config.base_url.clone(),
            reason: e.to_string(),
        })?;

        let http = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| CmsError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            api_url: format!("{base}/api"),
            timeout: config.request_timeout(),
            default_daily_price: config.default_price(),
        })
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(self) -> Arc<dyn DataStore> {
        Arc::new(self)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url)
    }

    /// Sends `request` with the session's bearer token and decodes the body
    async fn execute<T: DeserializeOwned>(
        &self,
        session: &SessionToken,
        request: RequestBuilder,
        operation: &'static str,
    ) -> StoreResult<T> {
        let response = request
            .bearer_auth(session.expose())
            .send()
            .await
            .map_err(|e| self.transport_error(operation, &e))?;

        let status = response.status();
        if status.is_success() {
            let body = response
                .bytes()
                .await
                .map_err(|e| self.transport_error(operation, &e))?;
            return serde_json::from_slice(&body).map_err(|e| {
                tracing::warn!(operation, error = %e, "Undecodable CMS response");
                StoreError::Decode(format!("{operation}: {e}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(operation, status = status.as_u16(), body = %body, "CMS call rejected");
        let detail = format!("{operation}: status {}", status.as_u16());

        Err(match status {
            StatusCode::NOT_FOUND => StoreError::NotFound(detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Forbidden(detail),
            StatusCode::CONFLICT => StoreError::Conflict(detail),
            _ => StoreError::Unavailable(detail),
        })
    }

    fn transport_error(&self, operation: &'static str, error: &reqwest::Error) -> StoreError {
        if error.is_timeout() {
            tracing::warn!(operation, timeout = ?self.timeout, "CMS call timed out");
            StoreError::Timeout(self.timeout)
        } else {
            tracing::warn!(operation, error = %error, "CMS unreachable");
            StoreError::Unavailable(format!("{operation}: {error}"))
        }
    }

    /// Follows pagination of a reservation collection query
    async fn reservation_pages(
        &self,
        session: &SessionToken,
        filters: &[(&str, &str)],
        operation: &'static str,
    ) -> StoreResult<Vec<Entry<ReservationAttributes>>> {
        let mut entries = Vec::new();
        let mut page = 1;

        loop {
            let page_param = page.to_string();
            let page_size = PAGE_SIZE.to_string();
            let request = self
                .http
                .get(self.url("reservations"))
                .query(filters)
                .query(&[
                    ("populate", POPULATE),
                    ("pagination[page]", page_param.as_str()),
                    ("pagination[pageSize]", page_size.as_str()),
                ]);

            let envelope: Envelope<Vec<Entry<ReservationAttributes>>> =
                self.execute(session, request, operation).await?;
            entries.extend(envelope.data.unwrap_or_default());

            let page_count = envelope
                .meta
                .and_then(|meta| meta.pagination)
                .map_or(1, |p| p.page_count);
            if page >= page_count {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!(operation, page_count, max_pages = MAX_PAGES, "Collection exceeds page limit");
                return Err(StoreError::Unavailable(format!(
                    "{operation}: {page_count} pages exceed the limit of {MAX_PAGES}"
                )));
            }
            page += 1;
        }

        Ok(entries)
    }

    async fn reservation_entry(
        &self,
        session: &SessionToken,
        request: RequestBuilder,
        operation: &'static str,
        user_hint: Option<&UserId>,
        car_hint: Option<&CarId>,
    ) -> StoreResult<Option<Reservation>> {
        let envelope: Envelope<Entry<ReservationAttributes>> =
            self.execute(session, request, operation).await?;
        envelope
            .data
            .map(|entry| normalize::reservation(entry, user_hint, car_hint))
            .transpose()
    }
}

impl DataStore for StrapiClient {
    fn fetch_reservations_for_car<'a>(
        &'a self,
        session: &'a SessionToken,
        car_id: &'a CarId,
        exclude_cancelled: bool,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>> {
        Box::pin(async move {
            let cancelled = normalize::status_label(ReservationStatus::Cancelled);
            let mut filters = vec![("filters[car][id][$eq]", car_id.as_str())];
            if exclude_cancelled {
                filters.push(("filters[status][$ne]", cancelled));
            }

            let entries = self
                .reservation_pages(session, &filters, "fetch_reservations_for_car")
                .await?;

            let mut reservations = Vec::with_capacity(entries.len());
            for entry in entries {
                let reservation = normalize::blocking_reservation(entry, car_id)?;
                // The backend filter may be ignored by older setups
                if exclude_cancelled && reservation.status == ReservationStatus::Cancelled {
                    continue;
                }
                reservations.push(reservation);
            }

            tracing::debug!(car_id = %car_id, count = reservations.len(), "Fetched car reservations");
            Ok(reservations)
        })
    }

    fn fetch_reservation<'a>(
        &'a self,
        session: &'a SessionToken,
        id: &'a ReservationId,
    ) -> BoxFuture<'a, StoreResult<Option<Reservation>>> {
        Box::pin(async move {
            let request = self
                .http
                .get(self.url(&format!("reservations/{id}")))
                .query(&[("populate", POPULATE)]);

            match self
                .reservation_entry(session, request, "fetch_reservation", None, None)
                .await
            {
                Err(StoreError::NotFound(_)) => Ok(None),
                other => other,
            }
        })
    }

    fn fetch_reservations_for_user<'a>(
        &'a self,
        session: &'a SessionToken,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, StoreResult<Vec<Reservation>>> {
        Box::pin(async move {
            let filters = [
                ("filters[user][id][$eq]", user_id.as_str()),
                ("sort", "createdAt:desc"),
            ];
            self.reservation_pages(session, &filters, "fetch_reservations_for_user")
                .await?
                .into_iter()
                .map(|entry| normalize::reservation(entry, Some(user_id), None))
                .collect()
        })
    }

    fn fetch_car<'a>(
        &'a self,
        session: &'a SessionToken,
        car_id: &'a CarId,
    ) -> BoxFuture<'a, StoreResult<Car>> {
        Box::pin(async move {
            let request = self.http.get(self.url(&format!("cars/{car_id}")));
            let envelope: Envelope<Entry<CarAttributes>> =
                self.execute(session, request, "fetch_car").await?;
            let entry = envelope
                .data
                .ok_or_else(|| StoreError::NotFound(format!("car {car_id}")))?;
            normalize::car(entry, self.default_daily_price)
        })
    }

    fn create_reservation<'a>(
        &'a self,
        session: &'a SessionToken,
        fields: NewReservation,
    ) -> BoxFuture<'a, StoreResult<Reservation>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.url("reservations"))
                .query(&[("populate", POPULATE)])
                .json(&WriteEnvelope {
                    data: normalize::reservation_payload(&fields),
                });

            let created = self
                .reservation_entry(
                    session,
                    request,
                    "create_reservation",
                    Some(&fields.user_id),
                    Some(&fields.car_id),
                )
                .await?
                .ok_or_else(|| StoreError::Decode("create_reservation: empty response".to_string()))?;

            tracing::debug!(reservation_id = %created.id, "Reservation stored");
            Ok(created)
        })
    }

    fn update_reservation_status<'a>(
        &'a self,
        session: &'a SessionToken,
        id: &'a ReservationId,
        update: StatusUpdate,
    ) -> BoxFuture<'a, StoreResult<Reservation>> {
        Box::pin(async move {
            // Strapi has no conditional update; narrow the window with a fresh read
            let current = self
                .fetch_reservation(session, id)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))?;
            if !update.applies_to(current.status) {
                tracing::warn!(
                    reservation_id = %id,
                    current = %current.status,
                    expected = %update.expected,
                    "Status update refused; reservation changed"
                );
                return Err(StoreError::Conflict(format!(
                    "update_reservation_status: reservation {id} is {}, expected {}",
                    current.status, update.expected
                )));
            }

            let request = self
                .http
                .put(self.url(&format!("reservations/{id}")))
                .query(&[("populate", POPULATE)])
                .json(&WriteEnvelope {
                    data: normalize::status_payload(&update),
                });

            self.reservation_entry(session, request, "update_reservation_status", None, None)
                .await?
                .ok_or_else(|| StoreError::NotFound(format!("reservation {id}")))
        })
    }

    fn record_payment<'a>(
        &'a self,
        session: &'a SessionToken,
        attempt: PaymentAttempt,
    ) -> BoxFuture<'a, StoreResult<PaymentRecord>> {
        Box::pin(async move {
            let request = self
                .http
                .post(self.url("payments"))
                .json(&WriteEnvelope {
                    data: normalize::payment_payload(&attempt),
                });

            let envelope: Envelope<Entry<PaymentAttributes>> =
                self.execute(session, request, "record_payment").await?;
            let entry = envelope
                .data
                .ok_or_else(|| StoreError::Decode("record_payment: empty response".to_string()))?;

            Ok(PaymentRecord {
                id: PaymentRecordId::new(entry.id.into_string()),
                attempt,
            })
        })
    }
}
