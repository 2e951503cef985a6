use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    /// Server-side session identifier. Equal to `id` for conversations
    /// created locally; kept separate because hydration distinguishes them.
    pub session_id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One detected item inside a PII classifier verdict.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PiiFinding {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub label: Option<String>,
    pub risk_score: Option<f64>,
    pub layer: Option<String>,
}

/// Structured verdict attached to a blocked `/chat` response. Every field is
/// optional: the classifier payload varies across backend versions and the
/// client must not reject a block for missing metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PiiDetectionDetails {
    pub success: Option<bool>,
    pub safe: Option<bool>,
    pub action: Option<String>,
    pub findings: Option<Vec<PiiFinding>>,
    pub latency_ms: Option<f64>,
    pub reason: Option<Vec<String>>,
    pub risk_level: Option<String>,
    pub risk_score: Option<f64>,
    pub sensitive: Option<bool>,
}

impl PiiDetectionDetails {
    /// The backend signals a hard block with `action: "BLOCK"`, compared
    /// case-insensitively.
    pub fn is_block(&self) -> bool {
        self.action
            .as_deref()
            .is_some_and(|action| action.eq_ignore_ascii_case("BLOCK"))
    }
}

/// A pending sensitive-data warning awaiting a user decision. The creation
/// timestamp (as unix millis) doubles as the dismissal key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitiveDataNotice {
    pub message: String,
    pub details: Option<PiiDetectionDetails>,
    pub user_message: String,
    pub timestamp: DateTime<Utc>,
}

impl SensitiveDataNotice {
    pub fn key(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatModel {
    pub id: String,
    pub name: String,
    pub provider: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_action_is_case_insensitive() {
        for action in ["BLOCK", "block", "Block"] {
            let details = PiiDetectionDetails {
                action: Some(action.to_string()),
                ..Default::default()
            };
            assert!(details.is_block(), "{action} should classify as a block");
        }
    }

    #[test]
    fn other_actions_are_not_blocks() {
        let allow = PiiDetectionDetails {
            action: Some("ALLOW".to_string()),
            ..Default::default()
        };
        assert!(!allow.is_block());
        assert!(!PiiDetectionDetails::default().is_block());
    }

    #[test]
    fn details_tolerate_partial_payloads() {
        let details: PiiDetectionDetails = serde_json::from_value(serde_json::json!({
            "action": "BLOCK",
            "findings": [{"type": "EMAIL", "riskScore": 0.92}],
            "unknownField": true
        }))
        .unwrap();
        assert!(details.is_block());
        let findings = details.findings.unwrap();
        assert_eq!(findings[0].kind.as_deref(), Some("EMAIL"));
        assert_eq!(findings[0].risk_score, Some(0.92));
        assert!(findings[0].label.is_none());
    }
}
