//! Error types for the Strapi adapter

use thiserror::Error;

/// Errors raised while setting up the adapter.
///
/// Errors of individual calls are [`rental_core::StoreError`]s.
#[derive(Debug, Error)]
pub enum CmsError {
    /// Base URL cannot be parsed
    #[error("Invalid CMS base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// Configured value
        url: String,
        /// Parser message
        reason: String,
    },

    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
}
