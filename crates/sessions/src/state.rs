use serde::{Deserialize, Serialize};

/// Identifier used when a stored token is kept but the profile could not
/// be fetched.
pub const UNKNOWN_USER_ID: &str = "unknown";

/// The signed-in identity as far as the client knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
}

impl User {
    pub fn new(id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            email,
        }
    }

    /// Identity for a session whose profile lookup failed for a non-auth reason.
    pub fn unresolved(email: Option<String>) -> Self {
        Self::new(UNKNOWN_USER_ID, email)
    }

    pub fn is_unresolved(&self) -> bool {
        self.id == UNKNOWN_USER_ID
    }
}

/// In-memory session state observed by the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub user: Option<User>,
    /// True only while startup restoration is running.
    pub loading: bool,
}

impl SessionState {
    /// `{ user: None, loading: true }`, the state at process start.
    pub fn initial() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn signed_in(user: User) -> Self {
        Self {
            user: Some(user),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            user: None,
            loading: false,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match (&self.user, self.loading) {
            (_, true) => SessionStatus::Initializing,
            (None, false) => SessionStatus::Unauthenticated,
            (Some(user), false) if user.is_unresolved() => SessionStatus::Degraded,
            (Some(_), false) => SessionStatus::Authenticated,
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::initial()
    }
}

/// Coarse view of [`SessionState`].
///
/// `Degraded` is an authenticated session that kept its token through a
/// non-auth failure and carries the [`UNKNOWN_USER_ID`] sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Initializing,
    Authenticated,
    Degraded,
    Unauthenticated,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Degraded => "degraded",
            Self::Unauthenticated => "unauthenticated",
        }
    }

    pub fn is_authenticated(self) -> bool {
        matches!(self, Self::Authenticated | Self::Degraded)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
