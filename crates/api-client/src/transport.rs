//! The raw HTTP seam under [`ApiClient`](crate::ApiClient).
//!
//! A [`Transport`] moves bytes: it knows nothing about envelopes, key
//! casing, or bearer tokens. The production implementation is
//! [`ReqwestTransport`]; tests substitute the `MockTransport` behind the
//! `test-util` feature.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use folio_domain::config::ApiConfig;
use folio_domain::error::{ApiError, Error, Result};
use reqwest::Client;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unsupported HTTP method: {other}")),
        }
    }
}

/// A fully-resolved outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and raw body of a received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn empty(status: u16) -> Self {
        Self::new(status, Vec::new())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("connect: {0}")]
    Connect(String),

    #[error("{0}")]
    Other(String),
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout(msg) => ApiError::timeout(msg),
            TransportError::Connect(msg) | TransportError::Other(msg) => ApiError::network(msg),
        }
    }
}

/// Executes one HTTP exchange.
///
/// Implementations must report every failure to obtain a response as a
/// [`TransportError`]; any received status, including 4xx/5xx, is an `Ok`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reqwest implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Production transport over a pooled `reqwest::Client`.
///
/// Created once and reused for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Build a transport from the shared `ApiConfig`.
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let timeout = (cfg.timeout_ms > 0).then(|| Duration::from_millis(cfg.timeout_ms));
        let mut builder = Client::builder().user_agent(cfg.user_agent.clone());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    /// The configured request timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut rb = self.http.request(method, &request.url);
        for (name, value) in &request.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            rb = rb.body(body);
        }

        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(from_reqwest)?;
        Ok(HttpResponse::new(status, body.to_vec()))
    }
}

/// Convert a `reqwest::Error` into a [`TransportError`].
pub fn from_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Patch".parse::<Method>().unwrap(), Method::Patch);
        assert!("TRACE".parse::<Method>().is_err());
    }

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(Method::default(), Method::Get);
        assert_eq!(Method::Delete.to_string(), "DELETE");
    }

    #[test]
    fn transport_failures_become_network_errors() {
        let err: ApiError = TransportError::Connect("refused".into()).into();
        assert!(err.is_network());
        let err: ApiError = TransportError::Timeout("30s".into()).into();
        assert!(err.is_network());
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn zero_timeout_disables_client_timeout() {
        let cfg = ApiConfig {
            timeout_ms: 0,
            ..ApiConfig::default()
        };
        let transport = ReqwestTransport::new(&cfg).unwrap();
        assert!(transport.timeout().is_none());

        let transport = ReqwestTransport::new(&ApiConfig::default()).unwrap();
        assert_eq!(transport.timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = HttpRequest {
            method: Method::Get,
            url: "http://localhost/api".into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: None,
        };
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert!(req.header("authorization").is_none());
    }

    #[test]
    fn success_range_is_2xx() {
        assert!(HttpResponse::empty(204).is_success());
        assert!(!HttpResponse::empty(304).is_success());
        assert!(!HttpResponse::empty(199).is_success());
    }
}
