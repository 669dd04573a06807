//! Booking demo against a running Strapi backend
//!
//! Books a car for a user and pays for it through the simulated gateway.
//!
//! # Usage
//!
//! ```bash
//! export CMS_BASE_URL=http://localhost:1337
//! export CMS_API_TOKEN=<user JWT>
//! export DEMO_USER_ID=1 DEMO_CAR_ID=3 DEMO_START=2024-03-10 DEMO_END=2024-03-12
//! cargo run --bin booking-demo
//! ```

use rental_cms::{CmsConfig, StrapiClient};
use rental_core::metrics::register_engine_metrics;
use rental_core::{
    AddOns, BookingRequest, CarId, Config, DateInterval, PaymentDetails, PaymentMethod,
    PaymentOutcome, PaymentRequest, RentalEngine, RequestContext, SessionToken, SimulatedGateway,
    UserId,
};
use std::env;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn required(key: &str) -> Result<String, Box<dyn std::error::Error>> {
    env::var(key).map_err(|_| format!("{key} must be set").into())
}

fn flag(key: &str) -> bool {
    env::var(key).is_ok_and(|v| matches!(v.trim(), "1" | "true" | "yes"))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rental_core=debug,rental_cms=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let cms_config = CmsConfig::from_env();
    info!(
        base_url = %cms_config.base_url,
        availability_policy = ?config.engine.availability_policy,
        "Starting booking demo"
    );

    register_engine_metrics();

    let store = StrapiClient::new(&cms_config)?.shared();
    let gateway = SimulatedGateway::new()
        .with_success_rate(config.simulated_gateway.success_rate)
        .with_latency(Duration::from_millis(config.simulated_gateway.latency_ms))
        .shared();
    let engine = RentalEngine::new(store, gateway, config.engine);

    let user_id = UserId::new(required("DEMO_USER_ID")?);
    let car_id = CarId::new(required("DEMO_CAR_ID")?);
    let interval = DateInterval::parse(&required("DEMO_START")?, &required("DEMO_END")?)?;
    let add_ons = AddOns {
        with_driver: flag("DEMO_WITH_DRIVER"),
        with_child_seat: flag("DEMO_WITH_CHILD_SEAT"),
        with_gps: flag("DEMO_WITH_GPS"),
    };
    let ctx = RequestContext::customer(SessionToken::new(required("CMS_API_TOKEN")?), user_id.clone());

    let quote = engine.quote(&ctx, &car_id, &interval, add_ons).await?;
    info!(
        car_id = %car_id,
        days = quote.days,
        base = %quote.base,
        total = %quote.total,
        "Quoted booking"
    );

    let reservation = engine
        .book_car(
            &ctx,
            BookingRequest {
                user_id,
                car_id,
                interval,
                add_ons,
                payment_method: Some(PaymentMethod::CreditCard),
            },
        )
        .await?;
    info!(reservation_id = %reservation.id, total = %reservation.total_price, "Reservation created");

    let card = PaymentDetails::Card {
        number: env::var("DEMO_CARD_NUMBER").unwrap_or_else(|_| "4242 4242 4242 4242".to_string()),
        expiry: "12/30".to_string(),
        cvv: "123".to_string(),
        holder: env::var("DEMO_CARD_HOLDER").unwrap_or_else(|_| "Demo Customer".to_string()),
    };
    let result = engine
        .pay(
            &ctx,
            PaymentRequest::new(reservation.id.clone(), PaymentMethod::CreditCard, Some(card)),
        )
        .await?;

    match &result.outcome {
        PaymentOutcome::Succeeded => info!(
            reservation_id = %result.reservation.id,
            transaction_id = %result.transaction_id,
            status = %result.reservation.status,
            "Payment approved"
        ),
        PaymentOutcome::Declined { reason } => warn!(
            reservation_id = %result.reservation.id,
            transaction_id = %result.transaction_id,
            reason = %reason,
            "Payment declined, reservation stays pending"
        ),
    }

    Ok(())
}
