//! `folio-api`: the transport/codec layer between folio and its backend.
//!
//! One logical call `(endpoint, method, body)` becomes one HTTP exchange:
//!
//! 1. body keys are rewritten camelCase → snake_case ([`casing`]),
//! 2. `Content-Type`, the current bearer token ([`TokenSource`]) and any
//!    caller headers are attached,
//! 3. the [`Transport`] executes the exchange,
//! 4. failures are classified into an [`ApiError`](folio_domain::ApiError)
//!    ([`envelope::classify`]), successes are unwrapped from the
//!    `{success, data}` envelope and rewritten snake_case → camelCase.
//!
//! The layer is stateless: no retries, no caching, no de-duplication.
//! Recovery policy (token refresh) belongs to `folio-session`.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use folio_domain::config::ApiConfig;
//! use folio_api::ApiClient;
//!
//! # async fn example() -> Result<(), folio_domain::ApiError> {
//! let client = ApiClient::from_config(&ApiConfig::default())
//!     .map_err(|e| folio_domain::ApiError::network(e.to_string()))?;
//! let portfolios: serde_json::Value = client.get("/api/portfolios").await?;
//! println!("{portfolios}");
//! # Ok(())
//! # }
//! ```

pub mod casing;
pub mod client;
pub mod envelope;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod transport;

// ── Re-exports for ergonomic imports ─────────────────────────────────

pub use client::{ApiClient, RequestOptions, TokenSource};
pub use envelope::Envelope;
pub use transport::{
    from_reqwest, HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError,
};
