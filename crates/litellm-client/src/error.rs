//! # Gateway Error Types
//!
//! ## Error Body Normalization
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  non-2xx body                                    → GatewayError         │
//! │                                                                         │
//! │  {"error": {"message", "type", "code"}}          → Api { .. }           │
//! │  {"error": "<string>"}                           → Api { message }      │
//! │  {"detail": {"error": "<string>"}}               → Api { message }      │
//! │  {"detail": "<string>"}                          → Api { message }      │
//! │  anything else                                   → Opaque { body }      │
//! │                                                                         │
//! │  connect/IO failure → Transport     deadline → Timeout                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Categories
//! - not found: HTTP 404, or a message containing "not found" / "does not exist"
//! - retryable: Transport, Timeout, 429, 5xx
//! - auth failure: 401, 403

use serde_json::Value;
use thiserror::Error;

/// Maximum number of body characters kept in an opaque error.
const MAX_OPAQUE_BODY: usize = 512;

/// Gateway call errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// A non-2xx response with a recognized error body.
    #[error("gateway returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        error_type: Option<String>,
        code: Option<String>,
    },

    /// A non-2xx response with a body of neither known shape.
    #[error("gateway returned {status}: {body}")]
    Opaque { status: u16, body: String },

    /// Connection or I/O failure.
    #[error("gateway request failed: {0}")]
    Transport(String),

    /// The request deadline elapsed.
    #[error("gateway request timed out")]
    Timeout,

    /// A 2xx response could not be decoded.
    #[error("gateway response could not be decoded: {0}")]
    Decode(String),

    /// The endpoint URL is not usable.
    #[error("invalid gateway endpoint '{0}'")]
    InvalidEndpoint(String),
}

impl GatewayError {
    /// Normalizes a non-2xx response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<Value> = serde_json::from_str(body).ok();

        if let Some((message, error_type, code)) = parsed.as_ref().and_then(extract) {
            return GatewayError::Api {
                status,
                message,
                error_type,
                code,
            };
        }

        let mut body = body.trim().to_string();
        if body.len() > MAX_OPAQUE_BODY {
            let cut = (0..=MAX_OPAQUE_BODY)
                .rev()
                .find(|i| body.is_char_boundary(*i))
                .unwrap_or(0);
            body.truncate(cut);
        }
        GatewayError::Opaque { status, body }
    }

    /// HTTP status, if the gateway answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } | GatewayError::Opaque { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true if the entity does not exist on the gateway.
    pub fn is_not_found(&self) -> bool {
        match self {
            GatewayError::Api {
                status, message, ..
            } => {
                let lower = message.to_lowercase();
                *status == 404 || lower.contains("not found") || lower.contains("does not exist")
            }
            GatewayError::Opaque { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Returns true if the master credential was rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Returns true if the same call may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Transport(_) | GatewayError::Timeout => true,
            GatewayError::Api { status, .. } | GatewayError::Opaque { status, .. } => {
                *status == 429 || *status >= 500
            }
            GatewayError::Decode(_) | GatewayError::InvalidEndpoint(_) => false,
        }
    }
}

fn extract(body: &Value) -> Option<(String, Option<String>, Option<String>)> {
    match body.get("error") {
        Some(Value::Object(err)) => {
            let message = err.get("message").map(text)?;
            let error_type = err.get("type").map(text);
            let code = err.get("code").filter(|c| !c.is_null()).map(text);
            return Some((message, error_type, code));
        }
        Some(Value::String(message)) => return Some((message.clone(), None, None)),
        _ => {}
    }

    match body.get("detail") {
        Some(Value::Object(detail)) => detail.get("error").map(|e| (text(e), None, None)),
        Some(Value::String(message)) => Some((message.clone(), None, None)),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Convenience type alias for Results with GatewayError.
pub type GatewayResult<T> = Result<T, GatewayError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_style_body() {
        let err = GatewayError::from_response(
            400,
            r#"{"error":{"message":"Budget exceeded","type":"budget_exceeded","code":"400"}}"#,
        );
        assert_eq!(
            err,
            GatewayError::Api {
                status: 400,
                message: "Budget exceeded".to_string(),
                error_type: Some("budget_exceeded".to_string()),
                code: Some("400".to_string()),
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_detail_style_body() {
        let err = GatewayError::from_response(
            400,
            r#"{"detail":{"error":"Team not found, passed team_id=t-1"}}"#,
        );
        assert!(matches!(err, GatewayError::Api { ref message, .. } if message.starts_with("Team not found")));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_both_shapes_normalize_the_same() {
        let a = GatewayError::from_response(500, r#"{"error":{"message":"boom"}}"#);
        let b = GatewayError::from_response(500, r#"{"detail":{"error":"boom"}}"#);
        assert_eq!(a, b);
        assert!(a.is_retryable());
    }

    #[test]
    fn test_numeric_code() {
        let err = GatewayError::from_response(429, r#"{"error":{"message":"slow down","code":429}}"#);
        assert!(matches!(err, GatewayError::Api { code: Some(ref c), .. } if c == "429"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_opaque_body() {
        let err = GatewayError::from_response(502, "<html>bad gateway</html>");
        assert_eq!(
            err,
            GatewayError::Opaque {
                status: 502,
                body: "<html>bad gateway</html>".to_string()
            }
        );
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_opaque_body_is_truncated() {
        let err = GatewayError::from_response(500, &"x".repeat(2000));
        match err {
            GatewayError::Opaque { body, .. } => assert_eq!(body.len(), MAX_OPAQUE_BODY),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_does_not_exist_message() {
        let err = GatewayError::from_response(400, r#"{"detail":"User does not exist"}"#);
        assert!(err.is_not_found());
    }

    #[test]
    fn test_auth_failure() {
        assert!(GatewayError::from_response(401, "{}").is_auth_failure());
        assert!(GatewayError::from_response(403, "{}").is_auth_failure());
        assert!(!GatewayError::Timeout.is_auth_failure());
        assert!(GatewayError::Timeout.is_retryable());
    }
}
