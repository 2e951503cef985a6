use super::{emit_focus_input, emit_state, emit_toast};
use crate::api::{chat::send_chat, ApiConfig, ApiError};
use crate::state::models::{Message, Role, SensitiveDataNotice};
use crate::state::{ChatState, ChatStore, SendMode};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tauri::{AppHandle, State};

/// Fixed presentational pacing before an assistant reply appears.
pub const REPLY_DELAY_MS: u64 = 400;

/// Substituted for the assistant reply on a generic send failure so the
/// conversation stays usable.
pub const FALLBACK_ASSISTANT_REPLY: &str =
    "I'm having trouble reaching the Kotwal API right now, but we can keep chatting if you'd like!";

/// Everything the orchestrator needs to settle a send after the HTTP call
/// resolves against whatever conversation state exists by then.
#[derive(Debug, Clone)]
pub(crate) struct SendAttempt {
    pub conversation_id: String,
    pub session_id: String,
    pub user_message_id: String,
    pub content: String,
    pub mode: SendMode,
}

/// First half of a send: resolve or create the target conversation, append
/// the user message optimistically, clear the input for a normal send, and
/// raise the typing indicator.
pub(crate) fn begin_send(
    state: &mut ChatState,
    content: &str,
    mode: SendMode,
    now: DateTime<Utc>,
) -> SendAttempt {
    let target = state
        .active_conversation()
        .map(|c| (c.id.clone(), c.session_id.clone()));
    let (conversation_id, session_id) = match target {
        Some(ids) => ids,
        None => {
            let id = state.create_conversation(content, now);
            (id.clone(), id)
        }
    };

    let user_message_id = now.timestamp_millis().to_string();
    state.append_message(
        &conversation_id,
        Message {
            id: user_message_id.clone(),
            role: Role::User,
            content: content.to_string(),
            timestamp: now,
        },
        now,
    );

    if mode.clears_input() {
        state.set_input("");
    }
    state.set_typing(true);

    SendAttempt {
        conversation_id,
        session_id,
        user_message_id,
        content: content.to_string(),
        mode,
    }
}

/// Appends the assistant reply and lowers the typing indicator.
pub(crate) fn settle_send_success(
    state: &mut ChatState,
    attempt: &SendAttempt,
    reply: &str,
    now: DateTime<Utc>,
) {
    state.append_message(
        &attempt.conversation_id,
        Message {
            id: (now.timestamp_millis() + 1).to_string(),
            role: Role::Assistant,
            content: reply.to_string(),
            timestamp: now,
        },
        now,
    );
    state.set_typing(false);
}

#[derive(Debug)]
pub(crate) enum FailureKind {
    /// Sensitive-data rejection, recovered locally. `focus_input` is set
    /// when a notice was enqueued and the blocked text restored.
    Blocked { focus_input: bool },
    /// Anything else; the transcript keeps the user message and gets the
    /// canned fallback reply.
    Generic { detail: String },
}

/// Second half of a failed send. A classified block rolls back the
/// optimistic user message; unless the send was an explicit override retry,
/// it also enqueues a notice and restores the blocked text into the input.
pub(crate) fn settle_send_failure(
    state: &mut ChatState,
    attempt: &SendAttempt,
    error: &ApiError,
    now: DateTime<Utc>,
) -> FailureKind {
    match error {
        ApiError::Blocked { message, details } => {
            state.remove_message(&attempt.conversation_id, &attempt.user_message_id, now);
            let mut focus_input = false;
            if !attempt.mode.suppresses_notices() {
                state.push_notice(SensitiveDataNotice {
                    message: message.clone(),
                    details: Some(details.clone()),
                    user_message: attempt.content.clone(),
                    timestamp: now,
                });
                state.set_input(attempt.content.clone());
                focus_input = true;
            }
            state.set_typing(false);
            FailureKind::Blocked { focus_input }
        }
        other => FailureKind::Generic {
            detail: other.to_string(),
        },
    }
}

pub(crate) async fn perform_send(
    app: &AppHandle,
    store: &ChatStore,
    config: &ApiConfig,
    content: String,
    mode: SendMode,
    model_id: &str,
) -> Result<(), String> {
    let attempt = {
        let mut state = store.state.lock().unwrap();
        let attempt = begin_send(&mut state, &content, mode, Utc::now());
        emit_state(app, &state);
        attempt
    };

    let outcome = send_chat(
        config,
        model_id,
        &content,
        &attempt.session_id,
        mode.overrides_block(),
    )
    .await;

    match outcome {
        Ok(reply) => deliver_reply(app, store, &attempt, &reply).await,
        Err(error) => {
            let failure = {
                let mut state = store.state.lock().unwrap();
                let failure = settle_send_failure(&mut state, &attempt, &error, Utc::now());
                emit_state(app, &state);
                failure
            };
            match failure {
                FailureKind::Blocked { focus_input } => {
                    log::warn!(
                        "sensitive data blocked for session {}: {error}",
                        attempt.session_id
                    );
                    if focus_input {
                        emit_focus_input(app);
                    }
                }
                FailureKind::Generic { detail } => {
                    log::error!("failed to fetch chat response: {detail}");
                    emit_toast(app, "Unable to reach Kotwal", &detail);
                    deliver_reply(app, store, &attempt, FALLBACK_ASSISTANT_REPLY).await;
                }
            }
        }
    }
    Ok(())
}

async fn deliver_reply(app: &AppHandle, store: &ChatStore, attempt: &SendAttempt, reply: &str) {
    tokio::time::sleep(Duration::from_millis(REPLY_DELAY_MS)).await;
    let mut state = store.state.lock().unwrap();
    settle_send_success(&mut state, attempt, reply, Utc::now());
    emit_state(app, &state);
}

#[tauri::command]
pub async fn send_message(
    app: AppHandle,
    store: State<'_, ChatStore>,
    config: State<'_, ApiConfig>,
    content: String,
    mode: SendMode,
    model_id: String,
) -> Result<(), String> {
    perform_send(&app, &store, &config, content, mode, &model_id).await
}

#[tauri::command]
pub fn dismiss_notice(
    app: AppHandle,
    store: State<'_, ChatStore>,
    timestamp: i64,
) -> Result<ChatState, String> {
    let mut state = store.state.lock().unwrap();
    state.dismiss_notice(timestamp);
    emit_state(&app, &state);
    Ok(state.clone())
}

#[tauri::command]
pub fn dismiss_all_notices(
    app: AppHandle,
    store: State<'_, ChatStore>,
) -> Result<ChatState, String> {
    let mut state = store.state.lock().unwrap();
    state.dismiss_all_notices();
    emit_state(&app, &state);
    Ok(state.clone())
}

/// Copies the blocked prompt back into the input box for editing. The
/// notice stays pending.
#[tauri::command]
pub fn edit_blocked_prompt(
    app: AppHandle,
    store: State<'_, ChatStore>,
    timestamp: i64,
) -> Result<ChatState, String> {
    let mut state = store.state.lock().unwrap();
    if let Some(user_message) = state.notice(timestamp).map(|n| n.user_message.clone()) {
        state.set_input(user_message);
        emit_state(&app, &state);
        emit_focus_input(&app);
    }
    Ok(state.clone())
}

/// Explicit user consent: resolve the notice, then resend the blocked
/// prompt with the override flag. A second block stays quiet on the notice
/// queue; a stale key (already resolved elsewhere) is a no-op.
#[tauri::command]
pub async fn proceed_with_blocked_prompt(
    app: AppHandle,
    store: State<'_, ChatStore>,
    config: State<'_, ApiConfig>,
    timestamp: i64,
    model_id: String,
) -> Result<(), String> {
    let content = {
        let mut state = store.state.lock().unwrap();
        let taken = state.take_notice(timestamp);
        if taken.is_some() {
            emit_state(&app, &state);
        }
        match taken {
            Some(notice) => notice.user_message,
            None => return Ok(()),
        }
    };
    perform_send(
        &app,
        &store,
        &config,
        content,
        SendMode::RetryWithOverride,
        &model_id,
    )
    .await
}
