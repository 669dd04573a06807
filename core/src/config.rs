//! Engine configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::availability::AvailabilityPolicy;
use crate::pricing::AddOnRates;
use crate::types::Money;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reservation engine settings
    pub engine: EngineConfig,
    /// Development payment gateway settings
    pub simulated_gateway: SimulatedGatewayConfig,
}

/// Reservation engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Time budget for each data-store call, in milliseconds (default: 5000)
    pub store_timeout_ms: u64,
    /// Time budget for each gateway charge, in milliseconds (default: 10000)
    pub gateway_timeout_ms: u64,
    /// Daily add-on rates (default: driver 100, child seat 10, GPS 15)
    pub rates: AddOnRates,
    /// Behavior when the availability lookup fails (default: permissive)
    pub availability_policy: AvailabilityPolicy,
}

impl EngineConfig {
    /// Store call budget
    #[must_use]
    pub const fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Gateway call budget
    #[must_use]
    pub const fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 5_000,
            gateway_timeout_ms: 10_000,
            rates: AddOnRates::default(),
            availability_policy: AvailabilityPolicy::default(),
        }
    }
}

/// Development payment gateway settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedGatewayConfig {
    /// Share of approved charges (default: 0.9)
    pub success_rate: f64,
    /// Simulated processing delay in milliseconds (default: 1500)
    pub latency_ms: u64,
}

impl Default for SimulatedGatewayConfig {
    fn default() -> Self {
        Self {
            success_rate: 0.9,
            latency_ms: 1_500,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine_defaults = EngineConfig::default();
        let rate_defaults = engine_defaults.rates;
        let gateway_defaults = SimulatedGatewayConfig::default();

        let parsed = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let rate = |key: &str, default: Money| {
            parsed(key)
                .and_then(Money::checked_from_units)
                .unwrap_or(default)
        };

        Self {
            engine: EngineConfig {
                store_timeout_ms: parsed("RENTAL_STORE_TIMEOUT_MS")
                    .unwrap_or(engine_defaults.store_timeout_ms),
                gateway_timeout_ms: parsed("RENTAL_GATEWAY_TIMEOUT_MS")
                    .unwrap_or(engine_defaults.gateway_timeout_ms),
                rates: AddOnRates {
                    driver_per_day: rate("RENTAL_DRIVER_RATE", rate_defaults.driver_per_day),
                    child_seat_per_day: rate(
                        "RENTAL_CHILD_SEAT_RATE",
                        rate_defaults.child_seat_per_day,
                    ),
                    gps_per_day: rate("RENTAL_GPS_RATE", rate_defaults.gps_per_day),
                },
                availability_policy: lookup("RENTAL_AVAILABILITY_POLICY")
                    .and_then(|s| AvailabilityPolicy::from_name(&s))
                    .unwrap_or(engine_defaults.availability_policy),
            },
            simulated_gateway: SimulatedGatewayConfig {
                success_rate: lookup("SIMULATED_GATEWAY_SUCCESS_RATE")
                    .and_then(|s| s.trim().parse::<f64>().ok())
                    .filter(|rate| (0.0..=1.0).contains(rate))
                    .unwrap_or(gateway_defaults.success_rate),
                latency_ms: parsed("SIMULATED_GATEWAY_LATENCY_MS")
                    .unwrap_or(gateway_defaults.latency_ms),
            },
        }
    }
}
