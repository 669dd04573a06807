//! # Rental CMS
//!
//! [`DataStore`](rental_core::DataStore) implementation over the Strapi REST API
//! that backs the rental marketplace.
//!
//! The backend's envelopes, French status labels and loosely typed relations
//! are decoded into strict wire structs ([`schema`]) and normalized once
//! ([`normalize`]); the engine never sees raw JSON.
//!
//! ## Example
//!
//! ```ignore
//! use rental_cms::{CmsConfig, StrapiClient};
//! use rental_core::{Config, RentalEngine, SimulatedGateway};
//!
//! let store = StrapiClient::new(&CmsConfig::from_env())?.shared();
//! let engine = RentalEngine::new(store, SimulatedGateway::new().shared(), Config::from_env().engine);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod schema;

pub use client::StrapiClient;
pub use config::CmsConfig;
pub use error::CmsError;
