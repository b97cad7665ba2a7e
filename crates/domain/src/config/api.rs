use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Backend connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Origin every endpoint path is appended to (e.g. `https://folio.example.com`).
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Client-side request timeout. `0` leaves timing out to the OS.
    #[serde(default = "d_30000")]
    pub timeout_ms: u64,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            timeout_ms: d_30000(),
            user_agent: d_user_agent(),
        }
    }
}

impl ApiConfig {
    /// `base_url` without trailing slashes, ready for `format!("{base}{path}")`.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "http://localhost:8000".into()
}
fn d_30000() -> u64 {
    30_000
}
fn d_user_agent() -> String {
    format!("folio/{}", env!("CARGO_PKG_VERSION"))
}
