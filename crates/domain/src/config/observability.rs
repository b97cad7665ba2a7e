use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Logging
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Logging configuration for the `folio` binary.
///
/// `RUST_LOG`, when set, takes precedence over `log_filter`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `EnvFilter` directive string (e.g. `info,folio_session=debug`).
    #[serde(default = "d_log_filter")]
    pub log_filter: String,

    /// Emit one JSON object per line instead of the compact human format.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: d_log_filter(),
            json_logs: false,
        }
    }
}

fn d_log_filter() -> String {
    "warn".into()
}
