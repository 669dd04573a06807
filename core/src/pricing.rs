//! Rental pricing.
//!
//! Pricing is a pure function of the car, the interval and the requested
//! extras: no I/O, no clock, no defaults for missing catalog data. A car
//! without a usable daily price is rejected here; any fallback price belongs
//! to the boundary adapter that produced the [`Car`].

use crate::error::{EngineError, Result};
use crate::interval::DateInterval;
use crate::types::{AddOns, Car, Money};
use serde::{Deserialize, Serialize};

/// Per-day surcharges for optional extras
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOnRates {
    /// Driver, per day
    pub driver_per_day: Money,
    /// Child seat, per day
    pub child_seat_per_day: Money,
    /// GPS unit, per day
    pub gps_per_day: Money,
}

impl Default for AddOnRates {
    fn default() -> Self {
        Self {
            driver_per_day: Money::from_units(100),
            child_seat_per_day: Money::from_units(10),
            gps_per_day: Money::from_units(15),
        }
    }
}

/// Itemised price of a rental
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Rental days
    pub days: u32,
    /// Car rate times days
    pub base: Money,
    /// Driver surcharge
    pub driver: Money,
    /// Child seat surcharge
    pub child_seat: Money,
    /// GPS surcharge
    pub gps: Money,
    /// Sum of all lines
    pub total: Money,
}

/// Computes rental prices from a fixed set of add-on rates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PricingCalculator {
    rates: AddOnRates,
}

impl PricingCalculator {
    /// Creates a calculator with the given add-on rates
    #[must_use]
    pub const fn new(rates: AddOnRates) -> Self {
        Self { rates }
    }

    /// Add-on rates in use
    #[must_use]
    pub const fn rates(&self) -> &AddOnRates {
        &self.rates
    }

    /// Total price of renting `car` over `interval` with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCar`] if the car has no positive daily
    /// price or the total overflows.
    pub fn compute_price(&self, car: &Car, interval: &DateInterval, options: AddOns) -> Result<Money> {
        self.quote(car, interval, options).map(|quote| quote.total)
    }

    /// Itemised price of renting `car` over `interval` with `options`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidCar`] if the car has no positive daily
    /// price or any line overflows.
    pub fn quote(&self, car: &Car, interval: &DateInterval, options: AddOns) -> Result<PriceQuote> {
        let daily_price = match car.daily_price {
            Some(price) if !price.is_zero() => price,
            Some(_) => return Err(invalid_car(car, "daily price must be positive")),
            None => return Err(invalid_car(car, "daily price is missing")),
        };
        let days = interval.duration_days();
        let per_day = |enabled: bool, rate: Money| -> Result<Money> {
            if !enabled {
                return Ok(Money::ZERO);
            }
            rate.checked_multiply(days)
                .ok_or_else(|| invalid_car(car, "add-on price overflow"))
        };

        let base = daily_price
            .checked_multiply(days)
            .ok_or_else(|| invalid_car(car, "price overflow"))?;
        let driver = per_day(options.with_driver, self.rates.driver_per_day)?;
        let child_seat = per_day(options.with_child_seat, self.rates.child_seat_per_day)?;
        let gps = per_day(options.with_gps, self.rates.gps_per_day)?;

        let total = [driver, child_seat, gps]
            .into_iter()
            .try_fold(base, Money::checked_add)
            .ok_or_else(|| invalid_car(car, "price overflow"))?;

        Ok(PriceQuote {
            days,
            base,
            driver,
            child_seat,
            gps,
            total,
        })
    }
}

fn invalid_car(car: &Car, reason: &str) -> EngineError {
    EngineError::InvalidCar {
        car_id: car.id.clone(),
        reason: reason.to_string(),
    }
}
