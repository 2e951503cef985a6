pub mod chat;
pub mod session;

use crate::state::models::PiiDetectionDetails;
use serde::Deserialize;
use std::sync::Mutex;

pub const DEFAULT_BASE_URL: &str = "http://localhost:4000/api";

/// Shown when a block response carries no usable reason text.
pub const DEFAULT_BLOCK_MESSAGE: &str = "Sensitive data found in message.";

/// Connection settings for the Kotwal chat API. The bearer token is
/// installed at login time via the `set_auth_token` command.
pub struct ApiConfig {
    pub base_url: String,
    pub token: Mutex<Option<String>>,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let base_url = std::env::var("KOTWAL_API_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(std::env::var("KOTWAL_API_TOKEN").ok()),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap() = token.filter(|t| !t.is_empty());
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The backend's PII classifier rejected the prompt. Recovered locally;
    /// never surfaced as a raw error.
    #[error("{message}")]
    Blocked {
        message: String,
        details: PiiDetectionDetails,
    },
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("chat API returned an empty response")]
    EmptyResponse,
}

impl serde::Serialize for ApiError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Error body returned by the backend on non-2xx responses. All fields are
/// optional; blocks additionally carry `piiDetails`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ErrorBody {
    pub message: Option<String>,
    pub error: Option<String>,
    pub pii_details: Option<PiiDetectionDetails>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Turns a failed `/chat` response into the error taxonomy. Only an HTTP 400
/// whose `piiDetails.action` equals `"BLOCK"` (case-insensitive) classifies
/// as a sensitive-data rejection; everything else is a generic API failure.
pub fn classify_failure(status: u16, body: ErrorBody) -> ApiError {
    let ErrorBody {
        message,
        error,
        pii_details,
    } = body;

    if status == 400 {
        if let Some(details) = pii_details {
            if details.is_block() {
                let message = non_empty(error)
                    .or_else(|| non_empty(message))
                    .unwrap_or_else(|| DEFAULT_BLOCK_MESSAGE.to_string());
                return ApiError::Blocked { message, details };
            }
            return generic_failure(status, message, error);
        }
    }
    generic_failure(status, message, error)
}

fn generic_failure(status: u16, message: Option<String>, error: Option<String>) -> ApiError {
    let message = non_empty(message)
        .or_else(|| non_empty(error))
        .unwrap_or_else(|| "Failed to get chat response".to_string());
    ApiError::Api { status, message }
}

/// Generic-failure mapping for the endpoints that never classify: the error
/// body's `message`/`error` text, else the endpoint's default.
pub fn plain_failure(status: u16, body: ErrorBody, default_message: &str) -> ApiError {
    let message = non_empty(body.message)
        .or_else(|| non_empty(body.error))
        .unwrap_or_else(|| default_message.to_string());
    ApiError::Api { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: serde_json::Value) -> ErrorBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn block_action_on_400_classifies_as_blocked() {
        let err = classify_failure(
            400,
            body(json!({
                "error": "Your prompt contains an email address.",
                "piiDetails": {"action": "block", "findings": [{"type": "EMAIL"}]}
            })),
        );
        match err {
            ApiError::Blocked { message, details } => {
                assert_eq!(message, "Your prompt contains an email address.");
                assert_eq!(details.findings.unwrap().len(), 1);
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[test]
    fn block_message_prefers_error_then_message_then_default() {
        let err = classify_failure(
            400,
            body(json!({"message": "from message", "piiDetails": {"action": "BLOCK"}})),
        );
        assert!(matches!(err, ApiError::Blocked { ref message, .. } if message == "from message"));

        let err = classify_failure(400, body(json!({"piiDetails": {"action": "BLOCK"}})));
        assert!(
            matches!(err, ApiError::Blocked { ref message, .. } if message == DEFAULT_BLOCK_MESSAGE)
        );
    }

    #[test]
    fn non_block_action_on_400_is_generic() {
        let err = classify_failure(
            400,
            body(json!({"message": "bad request", "piiDetails": {"action": "FLAG"}})),
        );
        assert!(matches!(err, ApiError::Api { status: 400, .. }));
    }

    #[test]
    fn block_shape_on_other_statuses_is_generic() {
        let err = classify_failure(500, body(json!({"piiDetails": {"action": "BLOCK"}})));
        assert!(matches!(err, ApiError::Api { status: 500, .. }));
    }

    #[test]
    fn missing_details_is_generic_with_message_fallbacks() {
        let err = classify_failure(400, body(json!({"error": "only error field"})));
        assert!(matches!(err, ApiError::Api { ref message, .. } if message == "only error field"));

        let err = classify_failure(503, ErrorBody::default());
        assert!(
            matches!(err, ApiError::Api { ref message, .. } if message == "Failed to get chat response")
        );
    }

    #[test]
    fn config_endpoint_joins_paths() {
        let config = ApiConfig {
            base_url: "https://kotwal.example/api".to_string(),
            token: Mutex::new(None),
        };
        assert_eq!(
            config.endpoint("/chat-sessions"),
            "https://kotwal.example/api/chat-sessions"
        );
    }
}
