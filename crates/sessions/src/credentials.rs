//! The persisted credential record.
//!
//! Three string keys live in the backing [`KeyValueStore`]. They are written
//! and cleared as a group; no code path removes just one of them. Writes that
//! fail to persist surface as `STORAGE_ERROR` [`ApiError`]s.

use std::sync::Arc;

use folio_api::TokenSource;
use folio_domain::ApiError;

use crate::storage::KeyValueStore;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_EMAIL_KEY: &str = "user_email";

const ALL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_EMAIL_KEY];

/// Handle onto the credential keys of a store.
///
/// Cheap to clone; clones share the same store. The session manager is the
/// only writer, the API client only reads the access token.
#[derive(Clone)]
pub struct CredentialRecord {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialRecord {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn access_token(&self) -> Option<String> {
        non_empty(self.store.get(ACCESS_TOKEN_KEY))
    }

    pub fn refresh_token(&self) -> Option<String> {
        non_empty(self.store.get(REFRESH_TOKEN_KEY))
    }

    pub fn email(&self) -> Option<String> {
        non_empty(self.store.get(USER_EMAIL_KEY))
    }

    /// True when all three keys are absent.
    pub fn is_empty(&self) -> bool {
        self.access_token().is_none() && self.refresh_token().is_none() && self.email().is_none()
    }

    /// Persist a freshly minted token pair. The cached email is left alone.
    pub fn store_tokens(&self, access_token: &str, refresh_token: &str) -> Result<(), ApiError> {
        self.store
            .set_many(&[
                (ACCESS_TOKEN_KEY, access_token),
                (REFRESH_TOKEN_KEY, refresh_token),
            ])
            .map_err(storage_error)
    }

    /// Persist the full record after a successful sign-in or sign-up.
    pub fn store_login(
        &self,
        access_token: &str,
        refresh_token: &str,
        email: &str,
    ) -> Result<(), ApiError> {
        self.store
            .set_many(&[
                (ACCESS_TOKEN_KEY, access_token),
                (REFRESH_TOKEN_KEY, refresh_token),
                (USER_EMAIL_KEY, email),
            ])
            .map_err(storage_error)
    }

    /// Remove all three keys.
    pub fn clear(&self) -> Result<(), ApiError> {
        self.store.remove_many(&ALL_KEYS).map_err(storage_error)
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            access_token: self.access_token(),
            refresh_token: self.refresh_token(),
            email: self.email(),
        }
    }
}

impl TokenSource for CredentialRecord {
    fn access_token(&self) -> Option<String> {
        CredentialRecord::access_token(self)
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&self.snapshot(), f)
    }
}

/// Point-in-time copy of the record.
///
/// `Debug` is manually implemented to redact secrets.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct CredentialSnapshot {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub email: Option<String>,
}

impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSnapshot")
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("email", &self.email)
            .finish()
    }
}

fn storage_error(e: folio_domain::Error) -> ApiError {
    ApiError::storage(e.to_string())
}

// An empty string left behind by an older client counts as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
