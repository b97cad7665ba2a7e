//! Response envelope handling and failure classification.
//!
//! Success bodies may be wrapped as `{success, data, meta?, error?}` or be
//! the bare payload. Failure bodies are `{error: {code, message}}` or
//! anything else (including nothing), in which case the HTTP status alone
//! determines the error.

use folio_domain::error::{ApiError, UNKNOWN};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed view of the wrapper for callers that need `meta` (pagination etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(default = "d_true")]
    pub success: bool,
    pub data: T,
    #[serde(default)]
    pub meta: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

fn d_true() -> bool {
    true
}

/// `{code, message}` as declared by the server. Either half may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

/// Return `data` when the top-level object carries one, else the body itself.
pub fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(data) => data,
            None => Value::Object(map),
        },
        other => other,
    }
}

/// True when the top-level object uses the `{success, data, ...}` wrapper.
pub fn is_enveloped(body: &Value) -> bool {
    body.as_object().is_some_and(|map| map.contains_key("data"))
}

/// Extract `{error: {code, message}}` from a failure body, if there is one.
pub fn parse_error_body(body: &[u8]) -> Option<ErrorDetail> {
    if body.is_empty() {
        return None;
    }
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
}

/// Standard reason phrase for a status code (`Internal Server Error`, ...).
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown Status")
}

/// Turn a non-2xx response into an [`ApiError`].
///
/// Server-declared `code`/`message` are used verbatim; missing parts fall
/// back to `UNKNOWN` and the status reason phrase.
pub fn classify(status: u16, body: &[u8]) -> ApiError {
    let detail = parse_error_body(body).unwrap_or_default();
    ApiError::new(
        status,
        detail.code.unwrap_or_else(|| UNKNOWN.to_owned()),
        detail
            .message
            .unwrap_or_else(|| reason_phrase(status).to_owned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enveloped_body_is_unwrapped() {
        let body = json!({ "success": true, "data": { "a": 1 } });
        assert_eq!(unwrap_envelope(body), json!({ "a": 1 }));
    }

    #[test]
    fn bare_body_is_returned_as_is() {
        let body = json!({ "a": 1 });
        assert_eq!(unwrap_envelope(body), json!({ "a": 1 }));
    }

    #[test]
    fn bare_arrays_and_scalars_are_untouched() {
        assert_eq!(unwrap_envelope(json!([1, 2])), json!([1, 2]));
        assert_eq!(unwrap_envelope(json!("ok")), json!("ok"));
    }

    #[test]
    fn null_data_unwraps_to_null() {
        assert_eq!(unwrap_envelope(json!({ "success": true, "data": null })), Value::Null);
    }

    #[test]
    fn envelope_detection() {
        assert!(is_enveloped(&json!({ "success": true, "data": [] })));
        assert!(!is_enveloped(&json!({ "id": "u1" })));
        assert!(!is_enveloped(&json!([{ "data": 1 }])));
    }

    #[test]
    fn declared_error_is_surfaced_verbatim() {
        let body = br#"{"success":false,"error":{"code":"PORTFOLIO_NOT_FOUND","message":"gone"}}"#;
        let err = classify(404, body);
        assert_eq!(err.status, 404);
        assert_eq!(err.code, "PORTFOLIO_NOT_FOUND");
        assert_eq!(err.message, "gone");
    }

    #[test]
    fn undecodable_body_falls_back_to_unknown_and_reason() {
        let err = classify(502, b"<html>Bad Gateway</html>");
        assert_eq!(err.status, 502);
        assert_eq!(err.code, UNKNOWN);
        assert_eq!(err.message, "Bad Gateway");
    }

    #[test]
    fn empty_body_falls_back_to_unknown_and_reason() {
        let err = classify(500, b"");
        assert_eq!(err.code, UNKNOWN);
        assert_eq!(err.message, "Internal Server Error");
    }

    #[test]
    fn partial_error_detail_fills_missing_half() {
        let err = classify(401, br#"{"error":{"code":"TOKEN_EXPIRED"}}"#);
        assert_eq!(err.code, "TOKEN_EXPIRED");
        assert_eq!(err.message, "Unauthorized");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn json_without_error_field_is_treated_as_absent() {
        let err = classify(422, br#"{"detail":"validation failed"}"#);
        assert_eq!(err.code, UNKNOWN);
        assert_eq!(err.message, "Unprocessable Entity");
    }

    #[test]
    fn typed_envelope_keeps_meta() {
        let body = json!({ "success": true, "data": [1, 2], "meta": { "total": 2 } });
        let env: Envelope<Vec<u32>> = serde_json::from_value(body).unwrap();
        assert!(env.success);
        assert_eq!(env.data, vec![1, 2]);
        assert_eq!(env.meta.unwrap()["total"], 2);
        assert!(env.error.is_none());
    }
}
