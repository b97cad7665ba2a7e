//! `folio-domain`: types shared by every folio crate.
//!
//! - [`error`]: the typed [`ApiError`](error::ApiError) that crosses the
//!   API/session boundary, plus the workspace-wide [`Error`](error::Error).
//! - [`config`]: TOML configuration with serde defaults.
//! - [`trace`]: structured [`TraceEvent`](trace::TraceEvent)s emitted via `tracing`.

pub mod config;
pub mod error;
pub mod trace;

pub use error::{ApiError, Error, Result};
