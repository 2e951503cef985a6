//! Normalization of the heterogeneous session payloads the backend returns.
//!
//! The chat API has grown several response shapes over time: message entries
//! tagged with an explicit `role`, legacy paired records with separate
//! `message`/`response` fields, and session envelopes nested under various
//! keys. Each entry is parsed by attempting the tagged shape, then the
//! paired shape, then skipping it; malformed entries never fail the whole
//! payload.

use crate::state::models::{Conversation, Message, Role};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A server-tracked conversation thread, already reduced to the canonical
/// message sequence.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub session_id: String,
    pub title: Option<String>,
    pub messages: Vec<Message>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub message_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaggedEntry {
    id: Option<String>,
    role: Role,
    #[serde(default)]
    content: String,
    timestamp: Option<Value>,
    updated_at: Option<Value>,
    created_at: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairedEntry {
    id: Option<String>,
    message: Option<String>,
    response: Option<String>,
    timestamp: Option<Value>,
    updated_at: Option<Value>,
    created_at: Option<Value>,
}

enum SessionEntry {
    Tagged(TaggedEntry),
    Paired(PairedEntry),
}

/// Attempts the known entry shapes in order. Entries matching neither are
/// dropped by the caller.
fn classify_entry(value: &Value) -> Option<SessionEntry> {
    if !value.is_object() {
        return None;
    }
    if let Ok(tagged) = serde_json::from_value::<TaggedEntry>(value.clone()) {
        return Some(SessionEntry::Tagged(tagged));
    }
    if let Ok(paired) = serde_json::from_value::<PairedEntry>(value.clone()) {
        if paired.message.is_some() || paired.response.is_some() {
            return Some(SessionEntry::Paired(paired));
        }
    }
    None
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

/// Resolution order: explicit `timestamp`, then `updatedAt`, then
/// `createdAt`, then the current time.
fn resolve_timestamp(candidates: [&Option<Value>; 3], now: DateTime<Utc>) -> DateTime<Utc> {
    candidates
        .iter()
        .filter_map(|candidate| candidate.as_ref())
        .find_map(parse_timestamp)
        .unwrap_or(now)
}

/// Reduces raw history entries to the canonical message sequence. Paired
/// records expand into `<baseId>-user` / `<baseId>-assistant` messages;
/// unrecognized entries are skipped silently.
pub fn normalize_session_messages(
    session_id: &str,
    raw: &[Value],
    now: DateTime<Utc>,
) -> Vec<Message> {
    let mut messages = Vec::new();
    for (index, value) in raw.iter().enumerate() {
        let Some(entry) = classify_entry(value) else {
            continue;
        };
        match entry {
            SessionEntry::Tagged(entry) => {
                let timestamp = resolve_timestamp(
                    [&entry.timestamp, &entry.updated_at, &entry.created_at],
                    now,
                );
                messages.push(Message {
                    id: entry.id.unwrap_or_else(|| format!("{session_id}-{index}")),
                    role: entry.role,
                    content: entry.content,
                    timestamp,
                });
            }
            SessionEntry::Paired(entry) => {
                let timestamp = resolve_timestamp(
                    [&entry.timestamp, &entry.updated_at, &entry.created_at],
                    now,
                );
                let base_id = entry.id.unwrap_or_else(|| format!("{session_id}-{index}"));
                if let Some(content) = entry.message {
                    messages.push(Message {
                        id: format!("{base_id}-user"),
                        role: Role::User,
                        content,
                        timestamp,
                    });
                }
                if let Some(content) = entry.response {
                    messages.push(Message {
                        id: format!("{base_id}-assistant"),
                        role: Role::Assistant,
                        content,
                        timestamp,
                    });
                }
            }
        }
    }
    messages
}

fn pick<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| record.get(*key))
}

fn pick_string(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    pick(record, keys)
        .and_then(Value::as_str)
        .map(str::to_string)
        .filter(|s| !s.trim().is_empty())
}

fn pick_timestamp(record: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    pick(record, keys).and_then(parse_timestamp)
}

fn pick_count(record: &Map<String, Value>, keys: &[&str]) -> Option<u64> {
    match pick(record, keys)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn find_array<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter().find_map(|key| record.get(*key)?.as_array())
}

fn summary_from_record(
    record: &Map<String, Value>,
    fallback_session_id: Option<&str>,
) -> Option<ChatSession> {
    let session_id = pick_string(record, &["sessionId", "id", "session_id"])
        .or_else(|| fallback_session_id.map(str::to_string))?;
    Some(ChatSession {
        session_id,
        title: pick_string(record, &["title", "name"]),
        messages: Vec::new(),
        started_at: pick_timestamp(record, &["startedAt", "createdAt"]),
        last_message_at: pick_timestamp(record, &["lastMessageAt", "updatedAt"]),
        message_count: pick_count(record, &["messageCount", "messagesCount", "count"]),
    })
}

/// Parses the `/chat-sessions` list payload: a top-level array, or an array
/// nested under `sessions`, `data`, or `items`. Entries without a session id
/// are dropped.
pub fn parse_sessions_payload(payload: &Value) -> Vec<ChatSession> {
    let entries: &[Value] = match payload {
        Value::Array(entries) => entries,
        Value::Object(record) => match find_array(record, &["sessions", "data", "items"]) {
            Some(entries) => entries,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    entries
        .iter()
        .filter_map(|entry| entry.as_object())
        .filter_map(|record| summary_from_record(record, None))
        .collect()
}

/// Parses a single `/chat-sessions/{id}` payload, tolerating the session
/// record nested under `session`, `data`, `payload`, or `result`, and the
/// message list living at either nesting level.
pub fn parse_session_payload(
    payload: &Value,
    fallback_session_id: &str,
    now: DateTime<Utc>,
) -> Option<ChatSession> {
    let empty = Map::new();
    let (record, messages_source): (&Map<String, Value>, Option<&Vec<Value>>) = match payload {
        Value::Array(entries) => (&empty, Some(entries)),
        Value::Object(top) => {
            let nested = ["session", "data", "payload", "result"]
                .iter()
                .find_map(|key| top.get(*key)?.as_object());
            let record = nested.unwrap_or(top);
            let messages = find_array(top, &["messages", "history", "records", "items", "data"])
                .or_else(|| find_array(record, &["messages", "history", "records", "data"]));
            (record, messages)
        }
        _ => return None,
    };

    let mut session = summary_from_record(record, Some(fallback_session_id))?;
    if let Some(raw) = messages_source {
        session.messages = normalize_session_messages(&session.session_id, raw, now);
    }
    if session.message_count.is_none() && !session.messages.is_empty() {
        session.message_count = Some(session.messages.len() as u64);
    }
    Some(session)
}

/// Maps a normalized session onto the client-side conversation list entry.
/// Untitled sessions fall back to their last-activity time, then to a fixed
/// label.
pub fn session_to_conversation(session: ChatSession, now: DateTime<Utc>) -> Conversation {
    let fallback_title = session
        .last_message_at
        .or(session.started_at)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Previous chat".to_string());
    let title = session
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or(fallback_title);

    Conversation {
        id: session.session_id.clone(),
        session_id: session.session_id,
        title,
        messages: session.messages,
        created_at: session.started_at.unwrap_or(now),
        updated_at: session.last_message_at.unwrap_or(now),
    }
}
