use super::session::{parse_session_payload, parse_sessions_payload, ChatSession};
use super::{classify_failure, plain_failure, ApiConfig, ApiError, ErrorBody};
use crate::state::models::ChatModel;
use chrono::Utc;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    model_id: &'a str,
    message: &'a str,
    session_id: &'a str,
    #[serde(rename = "overridePII", skip_serializing_if = "is_false")]
    override_pii: bool,
}

/// Success body of `POST /chat`. The assistant text has moved between field
/// names across backend versions.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CompletionBody {
    message: Option<String>,
    response: Option<String>,
    content: Option<String>,
}

fn extract_completion(body: CompletionBody) -> Option<String> {
    [body.message, body.response, body.content]
        .into_iter()
        .flatten()
        .find(|text| !text.is_empty())
}

fn with_auth(request: RequestBuilder, config: &ApiConfig) -> RequestBuilder {
    match config.bearer_token() {
        Some(token) => request.header("Authorization", format!("Bearer {token}")),
        None => request,
    }
}

async fn read_failure(resp: reqwest::Response, default_message: &str) -> ApiError {
    let status = resp.status().as_u16();
    let body: ErrorBody = resp.json().await.unwrap_or_default();
    plain_failure(status, body, default_message)
}

/// Sends one user message. A sensitive-data rejection surfaces as
/// [`ApiError::Blocked`]; every other failure is generic.
pub async fn send_chat(
    config: &ApiConfig,
    model_id: &str,
    message: &str,
    session_id: &str,
    override_pii: bool,
) -> Result<String, ApiError> {
    let client = Client::new();
    let body = SendRequest {
        model_id,
        message,
        session_id,
        override_pii,
    };

    let request = client
        .post(config.endpoint("/chat"))
        .header("Content-Type", "application/json")
        .json(&body);
    let resp = with_auth(request, config).send().await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body: ErrorBody = resp.json().await.unwrap_or_default();
        return Err(classify_failure(status, body));
    }

    let data: CompletionBody = resp.json().await?;
    extract_completion(data).ok_or(ApiError::EmptyResponse)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelsBody {
    models: Vec<ChatModel>,
}

pub async fn fetch_models(config: &ApiConfig) -> Result<Vec<ChatModel>, ApiError> {
    let client = Client::new();
    let request = client.get(config.endpoint("/chat-models"));
    let resp = with_auth(request, config).send().await?;

    if !resp.status().is_success() {
        return Err(read_failure(resp, "Failed to load chat models").await);
    }

    let data: ModelsBody = resp.json().await?;
    Ok(data.models)
}

pub async fn fetch_sessions(config: &ApiConfig) -> Result<Vec<ChatSession>, ApiError> {
    let client = Client::new();
    let request = client.get(config.endpoint("/chat-sessions"));
    let resp = with_auth(request, config).send().await?;

    if !resp.status().is_success() {
        return Err(read_failure(resp, "Failed to fetch chat sessions").await);
    }

    let payload: Value = resp.json().await.unwrap_or(Value::Null);
    Ok(parse_sessions_payload(&payload))
}

pub async fn fetch_session(
    config: &ApiConfig,
    session_id: &str,
) -> Result<Option<ChatSession>, ApiError> {
    let client = Client::new();
    let request = client.get(config.endpoint(&format!("/chat-sessions/{session_id}")));
    let resp = with_auth(request, config).send().await?;

    if !resp.status().is_success() {
        return Err(read_failure(resp, "Failed to fetch chat session").await);
    }

    let payload: Value = resp.json().await.unwrap_or(Value::Null);
    Ok(parse_session_payload(&payload, session_id, Utc::now()))
}
