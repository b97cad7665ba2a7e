//! The request dispatcher: one logical call in, a decoded payload or an
//! [`ApiError`] out.

use std::sync::Arc;
use std::time::Instant;

use folio_domain::config::ApiConfig;
use folio_domain::error::{ApiError, Result};
use folio_domain::trace::TraceEvent;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::casing::{to_local, to_wire};
use crate::envelope::{classify, is_enveloped, unwrap_envelope, Envelope};
use crate::transport::{HttpRequest, Method, ReqwestTransport, Transport};

/// Supplies the current bearer token at call time.
///
/// Read once per request, so a token stored between two calls is picked up
/// by the second one.
pub trait TokenSource: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Per-call options. The body uses the local (camelCase) field names.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `body` and attach it.
    pub fn json<B: Serialize + ?Sized>(self, body: &B) -> std::result::Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::invalid_request(format!("request body: {e}")))?;
        Ok(self.body(value))
    }

    /// Add a header. Caller headers win over the defaults on name conflict.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Decoded response before envelope handling. `body` is `None` for 204
/// and for empty 2xx bodies.
#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: Option<Value>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Stateless JSON client for the folio backend.
///
/// Cloning is cheap: the transport and token source are shared.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    token_source: Option<Arc<dyn TokenSource>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("has_token_source", &self.token_source.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(cfg: &ApiConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: cfg.normalized_base_url().to_owned(),
            transport,
            token_source: None,
        }
    }

    /// Build a client over a fresh [`ReqwestTransport`].
    pub fn from_config(cfg: &ApiConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(cfg)?;
        Ok(Self::new(cfg, Arc::new(transport)))
    }

    pub fn with_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    // ── public request surface ───────────────────────────────────────

    /// Execute one call and decode the (unwrapped, camelCased) payload as `T`.
    ///
    /// A 204 decodes from `null`, so use `()`, `Option<_>` or `Value` for
    /// endpoints without content.
    pub async fn request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> std::result::Result<T, ApiError> {
        let reply = self.dispatch(endpoint, options).await?;
        let status = reply.status;
        let payload = reply.body.map(unwrap_envelope).unwrap_or(Value::Null);
        decode(status, payload)
    }

    /// Like [`request`](Self::request) but without typing the payload.
    pub async fn request_value(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> std::result::Result<Value, ApiError> {
        self.request(endpoint, options).await
    }

    /// Keep the wrapper so `meta` stays reachable. Bare payloads are
    /// presented as a successful envelope with no `meta`.
    pub async fn request_envelope<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> std::result::Result<Envelope<T>, ApiError> {
        let reply = self.dispatch(endpoint, options).await?;
        let status = reply.status;
        match reply.body {
            Some(body) if is_enveloped(&body) => decode(status, body),
            other => Ok(Envelope {
                success: true,
                data: decode(status, other.unwrap_or(Value::Null))?,
                meta: None,
                error: None,
            }),
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> std::result::Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::Get)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> std::result::Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::Post).json(body)?)
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> std::result::Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::Put).json(body)?)
            .await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> std::result::Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::Patch).json(body)?)
            .await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        endpoint: &str,
    ) -> std::result::Result<T, ApiError> {
        self.request(endpoint, RequestOptions::new(Method::Delete)).await
    }

    // ── exchange ─────────────────────────────────────────────────────

    /// Default headers first, then the caller's, replacing same-named defaults.
    fn headers(&self, extra: Vec<(String, String)>) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_owned(), "application/json".to_owned()),
            ("X-Request-Id".to_owned(), Uuid::new_v4().to_string()),
        ];
        if let Some(token) = self.token_source.as_ref().and_then(|s| s.access_token()) {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        }
        for (name, value) in extra {
            headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
            headers.push((name, value));
        }
        headers
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> std::result::Result<Reply, ApiError> {
        let method = options.method;
        let body = match options.body {
            Some(body) => Some(
                serde_json::to_vec(&to_wire(body))
                    .map_err(|e| ApiError::invalid_request(format!("request body: {e}")))?,
            ),
            None => None,
        };

        let request = HttpRequest {
            method,
            url: self.url(endpoint),
            headers: self.headers(options.headers),
            body,
        };

        tracing::debug!(
            method = %method,
            endpoint = endpoint,
            authenticated = request.header("authorization").is_some(),
            "api request"
        );

        let start = Instant::now();
        let result = self.transport.send(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                TraceEvent::ApiCall {
                    method: method.to_string(),
                    endpoint: endpoint.to_owned(),
                    status: 0,
                    duration_ms,
                }
                .emit();
                tracing::warn!(
                    method = %method,
                    endpoint = endpoint,
                    error = %e,
                    "api transport failure"
                );
                return Err(e.into());
            }
        };

        TraceEvent::ApiCall {
            method: method.to_string(),
            endpoint: endpoint.to_owned(),
            status: resp.status,
            duration_ms,
        }
        .emit();

        if !resp.is_success() {
            let err = classify(resp.status, &resp.body);
            tracing::debug!(
                method = %method,
                endpoint = endpoint,
                status = err.status,
                code = %err.code,
                "api error response"
            );
            return Err(err);
        }

        if resp.status == 204 || resp.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Reply {
                status: resp.status,
                body: None,
            });
        }

        let parsed: Value = serde_json::from_slice(&resp.body).map_err(|e| {
            ApiError::invalid_response(resp.status, format!("{endpoint}: body is not JSON: {e}"))
        })?;

        Ok(Reply {
            status: resp.status,
            body: Some(to_local(parsed)),
        })
    }
}

fn decode<T: DeserializeOwned>(status: u16, payload: Value) -> std::result::Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::invalid_response(status, format!("unexpected response shape: {e}")))
}
