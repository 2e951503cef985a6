pub mod chat;
pub mod sessions;

use crate::state::ChatState;
use serde::Serialize;
use tauri::{AppHandle, Emitter};

/// Full state snapshot; the webview re-renders from these.
pub const STATE_EVENT: &str = "chat-state";
/// Request to focus the chat input textarea.
pub const FOCUS_INPUT_EVENT: &str = "chat-input-focus";
/// Transient notification.
pub const TOAST_EVENT: &str = "toast";

#[derive(Debug, Clone, Serialize)]
pub struct ToastEvent {
    pub title: String,
    pub description: String,
}

pub(crate) fn emit_state(app: &AppHandle, state: &ChatState) {
    let _ = app.emit(STATE_EVENT, state.clone());
}

pub(crate) fn emit_toast(app: &AppHandle, title: &str, description: &str) {
    let _ = app.emit(
        TOAST_EVENT,
        ToastEvent {
            title: title.to_string(),
            description: description.to_string(),
        },
    );
}

pub(crate) fn emit_focus_input(app: &AppHandle) {
    let _ = app.emit(FOCUS_INPUT_EVENT, ());
}
