//! Session lifecycle: startup restoration, refresh-and-retry, and the
//! explicit sign-in / sign-up / sign-out transitions.
//!
//! ```text
//! Initializing ──restore──▶ Authenticated | Degraded | Unauthenticated
//! Unauthenticated ──sign_in / sign_up──▶ Authenticated
//! Authenticated | Degraded ──sign_out──▶ Unauthenticated
//! ```

use std::sync::Arc;

use folio_api::{ApiClient, Method, RequestOptions, Transport};
use folio_domain::config::{ApiConfig, Config};
use folio_domain::error::{ApiError, Result};
use folio_domain::trace::TraceEvent;
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

use crate::credentials::CredentialRecord;
use crate::state::{SessionState, SessionStatus, User};
use crate::storage::{open_store, KeyValueStore};
use crate::types::{
    AuthResponse, LoginRequest, Profile, RefreshRequest, RegisterRequest, TokenPair,
    LOGIN_ENDPOINT, LOGOUT_ENDPOINT, PROFILE_ENDPOINT, REFRESH_ENDPOINT, REGISTER_ENDPOINT,
};

/// Result of [`SessionManager::restore_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Restoration settled. Carries the published state.
    Completed(SessionState),
    /// The caller cancelled before restoration settled. No state was published.
    Cancelled,
}

impl RestoreOutcome {
    pub fn state(&self) -> Option<&SessionState> {
        match self {
            Self::Completed(state) => Some(state),
            Self::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// What restoration decided, before anything is published.
struct Resolution {
    state: SessionState,
    clear_credentials: bool,
    reason: String,
}

impl Resolution {
    fn authenticated(user: User, reason: impl Into<String>) -> Self {
        Self {
            state: SessionState::signed_in(user),
            clear_credentials: false,
            reason: reason.into(),
        }
    }

    fn unauthenticated(clear_credentials: bool, reason: impl Into<String>) -> Self {
        Self {
            state: SessionState::signed_out(),
            clear_credentials,
            reason: reason.into(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Owns the credential record and the published [`SessionState`].
///
/// Transitions are serialized by an async mutex, so a sign-out issued while
/// restoration is in flight waits for restoration to settle or be cancelled.
pub struct SessionManager {
    api: ApiClient,
    credentials: CredentialRecord,
    state: watch::Sender<SessionState>,
    transitions: Mutex<()>,
}

impl SessionManager {
    /// `api` should read its bearer token from `credentials`; see [`connect`](Self::connect).
    pub fn new(api: ApiClient, credentials: CredentialRecord) -> Self {
        let (state, _) = watch::channel(SessionState::initial());
        Self {
            api,
            credentials,
            state,
            transitions: Mutex::new(()),
        }
    }

    /// Wire a client and a credential record over the same store.
    pub fn connect(
        cfg: &ApiConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
    ) -> Self {
        let credentials = CredentialRecord::new(store);
        let api = ApiClient::new(cfg, transport).with_token_source(Arc::new(credentials.clone()));
        Self::new(api, credentials)
    }

    /// Production wiring: reqwest transport plus the configured store.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let transport = Arc::new(folio_api::ReqwestTransport::new(&cfg.api)?);
        let store = open_store(&cfg.storage)?;
        Ok(Self::connect(&cfg.api, transport, store))
    }

    // ── accessors ────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Receiver that sees every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn credentials(&self) -> &CredentialRecord {
        &self.credentials
    }

    // ── restoration ──────────────────────────────────────────────────

    /// Decide whether the stored credentials still represent a session.
    ///
    /// Runs at most once to completion. After that it returns the current
    /// state without touching the network. If `cancel` fires first, nothing
    /// is published and `loading` stays `true`; a later call may try again.
    pub async fn restore_session(&self, cancel: &CancellationToken) -> RestoreOutcome {
        let _guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RestoreOutcome::Cancelled,
            guard = self.transitions.lock() => guard,
        };

        if !self.state.borrow().loading {
            return RestoreOutcome::Completed(self.state());
        }

        let resolution = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            resolution = self.resolve() => Some(resolution),
        };

        let Some(resolution) = resolution.filter(|_| !cancel.is_cancelled()) else {
            tracing::debug!("session restoration cancelled");
            return RestoreOutcome::Cancelled;
        };

        if resolution.clear_credentials {
            if let Err(err) = self.credentials.clear() {
                tracing::warn!(error = %err, "could not clear rejected credentials");
            }
        }
        self.publish(resolution.state.clone(), &resolution.reason);
        RestoreOutcome::Completed(resolution.state)
    }

    async fn resolve(&self) -> Resolution {
        if self.credentials.access_token().is_none() {
            return Resolution::unauthenticated(false, "no stored access token");
        }
        let email = self.credentials.email();

        let err = match self.fetch_profile().await {
            Ok(profile) => {
                let user = User::new(profile.id, email);
                return Resolution::authenticated(user, "profile fetched");
            }
            Err(err) => err,
        };

        if !err.is_unauthorized() {
            tracing::warn!(
                error = %err,
                "profile fetch failed; keeping stored credentials"
            );
            return Resolution::authenticated(
                User::unresolved(email),
                format!("profile unavailable: {}", err.code),
            );
        }

        if self.credentials.refresh_token().is_none() {
            return Resolution::unauthenticated(true, "access token rejected, no refresh token");
        }

        if let Err(err) = self.refresh().await {
            tracing::info!(error = %err, "token refresh failed");
            return Resolution::unauthenticated(true, format!("refresh failed: {}", err.code));
        }

        match self.fetch_profile().await {
            Ok(profile) => Resolution::authenticated(
                User::new(profile.id, email),
                "profile fetched after refresh",
            ),
            Err(err) => {
                tracing::info!(error = %err, "profile fetch failed after refresh");
                Resolution::unauthenticated(
                    true,
                    format!("profile fetch after refresh failed: {}", err.code),
                )
            }
        }
    }

    // ── token refresh ────────────────────────────────────────────────

    /// Exchange the stored refresh token for a new pair and persist it.
    ///
    /// Session state is not touched. Fails without a network call when no
    /// refresh token is stored, and with `STORAGE_ERROR` when the new pair
    /// cannot be persisted.
    pub async fn refresh_tokens(&self) -> std::result::Result<(), ApiError> {
        let _guard = self.transitions.lock().await;
        self.refresh().await
    }

    async fn refresh(&self) -> std::result::Result<(), ApiError> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .ok_or_else(|| ApiError::new(401, "NO_REFRESH_TOKEN", "no refresh token stored"))?;

        let pair: TokenPair = self
            .api
            .post(
                REFRESH_ENDPOINT,
                &RefreshRequest {
                    refresh_token: refresh_token.clone(),
                },
            )
            .await?;

        let rotated = pair.refresh_token.is_some();
        let next_refresh = pair.refresh_token.unwrap_or(refresh_token);
        self.credentials
            .store_tokens(&pair.access_token, &next_refresh)?;

        TraceEvent::TokenRefreshed { rotated }.emit();
        Ok(())
    }

    // ── explicit transitions ─────────────────────────────────────────

    /// Log in and persist the returned credentials.
    ///
    /// On failure the error is returned and nothing is mutated. A response
    /// whose credentials cannot be persisted fails with `STORAGE_ERROR`.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<User, ApiError> {
        let _guard = self.transitions.lock().await;
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let response: AuthResponse = self.api.post(LOGIN_ENDPOINT, &request).await?;
        self.establish(response, email, "signed in")
    }

    /// Register a new account. Same contract as [`sign_in`](Self::sign_in).
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> std::result::Result<User, ApiError> {
        let _guard = self.transitions.lock().await;
        let request = RegisterRequest {
            email: email.to_owned(),
            password: password.to_owned(),
            display_name: display_name.map(str::to_owned),
        };
        let response: AuthResponse = self.api.post(REGISTER_ENDPOINT, &request).await?;
        self.establish(response, email, "signed up")
    }

    fn establish(
        &self,
        response: AuthResponse,
        entered_email: &str,
        reason: &str,
    ) -> std::result::Result<User, ApiError> {
        let email = response
            .user
            .email
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| entered_email.to_owned());

        self.credentials
            .store_login(&response.access_token, &response.refresh_token, &email)?;

        let user = User::new(response.user.id, Some(email));
        self.publish(SessionState::signed_in(user.clone()), reason);
        Ok(user)
    }

    /// Notify the backend, then forget everything locally.
    ///
    /// Always ends signed out; a failed logout call is only logged. Returns
    /// `STORAGE_ERROR` when the stored credentials could not be removed from
    /// disk, so the caller can tell the user they may reappear.
    pub async fn sign_out(&self) -> std::result::Result<(), ApiError> {
        let _guard = self.transitions.lock().await;

        let logout: std::result::Result<Value, ApiError> = self
            .api
            .request(LOGOUT_ENDPOINT, RequestOptions::new(Method::Post))
            .await;
        if let Err(err) = logout {
            tracing::debug!(error = %err, "logout call failed; clearing local session anyway");
        }

        let cleared = self.credentials.clear();
        self.publish(SessionState::signed_out(), "signed out");
        cleared
    }

    // ── profile ──────────────────────────────────────────────────────

    /// `GET /api/auth/profile` with the current token. No retry on 401.
    pub async fn fetch_profile(&self) -> std::result::Result<Profile, ApiError> {
        self.api.get(PROFILE_ENDPOINT).await
    }

    fn publish(&self, next: SessionState, reason: &str) {
        let to = next.status();
        let previous = self.state.send_replace(next);
        TraceEvent::SessionTransition {
            from: previous.status().to_string(),
            to: to.to_string(),
            reason: reason.to_owned(),
        }
        .emit();
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("api", &self.api)
            .field("credentials", &self.credentials)
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_EMAIL_KEY};
    use crate::storage::MemoryStore;
    use folio_api::mock::MockTransport;
    use folio_api::HttpResponse;
    use serde_json::json;

    fn manager(entries: &[(&str, &str)]) -> (Arc<MockTransport>, SessionManager) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryStore::with_entries(entries));
        let mgr = SessionManager::connect(&ApiConfig::default(), transport.clone(), store);
        (transport, mgr)
    }

    fn auth_body(access: &str, refresh: &str) -> Value {
        json!({
            "success": true,
            "data": {
                "access_token": access,
                "refresh_token": refresh,
                "user": { "id": "u1", "email": "a@b.com" }
            }
        })
    }

    #[tokio::test]
    async fn starts_initializing() {
        let (_, mgr) = manager(&[]);
        assert_eq!(mgr.state(), SessionState::initial());
        assert_eq!(mgr.status(), SessionStatus::Initializing);
    }

    #[tokio::test]
    async fn second_restore_does_not_hit_network() {
        let (transport, mgr) = manager(&[(ACCESS_TOKEN_KEY, "a1")]);
        transport.on(
            Method::Get,
            PROFILE_ENDPOINT,
            HttpResponse::json(200, &json!({ "id": "u1" })),
        );

        let cancel = CancellationToken::new();
        let first = mgr.restore_session(&cancel).await;
        let second = mgr.restore_session(&cancel).await;

        assert_eq!(first, second);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_sends_nothing() {
        let (transport, mgr) = manager(&[(ACCESS_TOKEN_KEY, "a1")]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(mgr.restore_session(&cancel).await.is_cancelled());
        assert_eq!(transport.request_count(), 0);
        assert!(mgr.state().loading);
    }

    #[tokio::test]
    async fn refresh_keeps_old_refresh_token_when_not_rotated() {
        let (transport, mgr) = manager(&[(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")]);
        transport.on(
            Method::Post,
            REFRESH_ENDPOINT,
            HttpResponse::json(200, &json!({ "access_token": "a2" })),
        );

        mgr.refresh_tokens().await.unwrap();

        let snapshot = mgr.credentials().snapshot();
        assert_eq!(snapshot.access_token.as_deref(), Some("a2"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("r1"));

        let sent = transport.requests_to(Method::Post, REFRESH_ENDPOINT);
        let body: Value = serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({ "refresh_token": "r1" }));
    }

    #[tokio::test]
    async fn refresh_without_token_is_401_and_offline() {
        let (transport, mgr) = manager(&[(ACCESS_TOKEN_KEY, "a1")]);
        let err = mgr.refresh_tokens().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn sign_in_stores_record_and_publishes_user() {
        let (transport, mgr) = manager(&[]);
        transport.on(Method::Post, LOGIN_ENDPOINT, HttpResponse::json(200, &auth_body("a1", "r1")));
        let mut rx = mgr.subscribe();

        let user = mgr.sign_in("a@b.com", "pw").await.unwrap();

        assert_eq!(user, User::new("u1", Some("a@b.com".into())));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().user.as_ref(), Some(&user));
        assert_eq!(mgr.credentials().access_token().as_deref(), Some("a1"));
        assert_eq!(mgr.credentials().refresh_token().as_deref(), Some("r1"));
        assert_eq!(mgr.credentials().email().as_deref(), Some("a@b.com"));

        let sent = transport.requests_to(Method::Post, LOGIN_ENDPOINT);
        assert!(sent[0].header("authorization").is_none());
        let body: Value = serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(body, json!({ "email": "a@b.com", "password": "pw" }));
    }

    #[tokio::test]
    async fn sign_in_falls_back_to_entered_email() {
        let (transport, mgr) = manager(&[]);
        transport.on(
            Method::Post,
            LOGIN_ENDPOINT,
            HttpResponse::json(
                200,
                &json!({ "access_token": "a1", "refresh_token": "r1", "user": { "id": "u1" } }),
            ),
        );

        let user = mgr.sign_in("typed@b.com", "pw").await.unwrap();
        assert_eq!(user.email.as_deref(), Some("typed@b.com"));
        assert_eq!(mgr.credentials().email().as_deref(), Some("typed@b.com"));
    }

    #[tokio::test]
    async fn failed_sign_in_mutates_nothing() {
        let (transport, mgr) = manager(&[(USER_EMAIL_KEY, "old@b.com")]);
        transport.on(
            Method::Post,
            LOGIN_ENDPOINT,
            HttpResponse::json(
                401,
                &json!({ "error": { "code": "INVALID_CREDENTIALS", "message": "bad password" } }),
            ),
        );

        let err = mgr.sign_in("a@b.com", "nope").await.unwrap_err();

        assert_eq!(err.status, 401);
        assert_eq!(err.code, "INVALID_CREDENTIALS");
        assert_eq!(mgr.state(), SessionState::initial());
        assert!(mgr.credentials().access_token().is_none());
        assert_eq!(mgr.credentials().email().as_deref(), Some("old@b.com"));
    }

    #[tokio::test]
    async fn sign_up_sends_display_name() {
        let (transport, mgr) = manager(&[]);
        transport.on(
            Method::Post,
            REGISTER_ENDPOINT,
            HttpResponse::json(201, &auth_body("a1", "r1")),
        );

        mgr.sign_up("a@b.com", "pw", Some("Ada")).await.unwrap();

        let sent = transport.requests_to(Method::Post, REGISTER_ENDPOINT);
        let body: Value = serde_json::from_slice(sent[0].body.as_ref().unwrap()).unwrap();
        assert_eq!(
            body,
            json!({ "email": "a@b.com", "password": "pw", "display_name": "Ada" })
        );
        assert_eq!(mgr.status(), SessionStatus::Authenticated);
    }

    #[tokio::test]
    async fn failed_sign_up_mutates_nothing() {
        let (transport, mgr) = manager(&[(USER_EMAIL_KEY, "old@b.com")]);
        transport.on(
            Method::Post,
            REGISTER_ENDPOINT,
            HttpResponse::json(
                409,
                &json!({ "error": { "code": "EMAIL_TAKEN", "message": "already registered" } }),
            ),
        );
        let rx = mgr.subscribe();

        let err = mgr.sign_up("a@b.com", "pw", None).await.unwrap_err();

        assert_eq!(err.status, 409);
        assert_eq!(err.code, "EMAIL_TAKEN");
        assert!(!rx.has_changed().unwrap());
        assert_eq!(mgr.state(), SessionState::initial());
        assert!(mgr.credentials().access_token().is_none());
        assert!(mgr.credentials().refresh_token().is_none());
        assert_eq!(mgr.credentials().email().as_deref(), Some("old@b.com"));
    }

    /// Reads succeed, every write fails.
    struct ReadOnlyStore(MemoryStore);

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(folio_domain::Error::Storage("disk is read-only".into()))
        }

        fn remove(&self, _key: &str) -> Result<()> {
            Err(folio_domain::Error::Storage("disk is read-only".into()))
        }
    }

    fn read_only_manager(entries: &[(&str, &str)]) -> (Arc<MockTransport>, SessionManager) {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(ReadOnlyStore(MemoryStore::with_entries(entries)));
        let mgr = SessionManager::connect(&ApiConfig::default(), transport.clone(), store);
        (transport, mgr)
    }

    #[tokio::test]
    async fn sign_in_that_cannot_persist_is_a_storage_error() {
        let (transport, mgr) = read_only_manager(&[]);
        transport.on(Method::Post, LOGIN_ENDPOINT, HttpResponse::json(200, &auth_body("a1", "r1")));
        let rx = mgr.subscribe();

        let err = mgr.sign_in("a@b.com", "pw").await.unwrap_err();

        assert_eq!(err.code, folio_domain::error::STORAGE_ERROR);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(mgr.state(), SessionState::initial());
        assert!(mgr.credentials().is_empty());
    }

    #[tokio::test]
    async fn refresh_that_cannot_persist_is_a_storage_error() {
        let (transport, mgr) =
            read_only_manager(&[(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")]);
        transport.on(
            Method::Post,
            REFRESH_ENDPOINT,
            HttpResponse::json(200, &json!({ "access_token": "a2", "refresh_token": "r2" })),
        );

        let err = mgr.refresh_tokens().await.unwrap_err();

        assert_eq!(err.code, folio_domain::error::STORAGE_ERROR);
        assert_eq!(mgr.credentials().access_token().as_deref(), Some("a1"));
    }

    #[tokio::test]
    async fn sign_out_reports_unremovable_credentials() {
        let (transport, mgr) =
            read_only_manager(&[(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")]);
        transport.on(Method::Post, LOGOUT_ENDPOINT, HttpResponse::empty(204));

        let err = mgr.sign_out().await.unwrap_err();

        assert_eq!(err.code, folio_domain::error::STORAGE_ERROR);
        assert_eq!(mgr.state(), SessionState::signed_out());
    }

    #[tokio::test]
    async fn sign_out_sends_bearer_then_clears() {
        let (transport, mgr) = manager(&[]);
        transport.on(Method::Post, LOGIN_ENDPOINT, HttpResponse::json(200, &auth_body("a1", "r1")));
        transport.on(Method::Post, LOGOUT_ENDPOINT, HttpResponse::empty(204));
        mgr.sign_in("a@b.com", "pw").await.unwrap();

        mgr.sign_out().await.unwrap();

        let sent = transport.requests_to(Method::Post, LOGOUT_ENDPOINT);
        assert_eq!(sent[0].header("authorization"), Some("Bearer a1"));
        assert!(mgr.credentials().is_empty());
        assert_eq!(mgr.state(), SessionState::signed_out());
    }

    #[tokio::test]
    async fn fetch_profile_surfaces_401_without_refresh() {
        let (transport, mgr) = manager(&[(ACCESS_TOKEN_KEY, "a1"), (REFRESH_TOKEN_KEY, "r1")]);
        transport.on(Method::Get, PROFILE_ENDPOINT, HttpResponse::json(401, &json!({})));

        let err = mgr.fetch_profile().await.unwrap_err();

        assert!(err.is_unauthorized());
        assert_eq!(transport.request_count(), 1);
        assert_eq!(mgr.credentials().access_token().as_deref(), Some("a1"));
    }

    #[test]
    fn debug_does_not_leak_tokens() {
        let (_, mgr) = manager(&[
            (ACCESS_TOKEN_KEY, "secret-a"),
            (REFRESH_TOKEN_KEY, "secret-r"),
        ]);
        let debug = format!("{mgr:?}");
        assert!(!debug.contains("secret-a"));
        assert!(!debug.contains("secret-r"));
    }
}
