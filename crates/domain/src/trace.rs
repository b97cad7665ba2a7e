use serde::Serialize;

/// Structured trace events emitted across all folio crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    /// One HTTP exchange. `status` is 0 when no response was received.
    ApiCall {
        method: String,
        endpoint: String,
        status: u16,
        duration_ms: u64,
    },
    SessionTransition {
        from: String,
        to: String,
        reason: String,
    },
    TokenRefreshed {
        /// Whether the server issued a new refresh token alongside the access token.
        rotated: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "folio_event");
    }
}
