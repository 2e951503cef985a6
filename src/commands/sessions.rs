use super::{emit_state, emit_toast};
use crate::api::{self, ApiConfig};
use crate::api::session::session_to_conversation;
use crate::state::models::ChatModel;
use crate::state::{ChatState, ChatStore};
use chrono::Utc;
use tauri::{AppHandle, State};

/// Shown when the model catalog cannot be fetched; chat stays usable.
pub fn fallback_models() -> Vec<ChatModel> {
    vec![
        ChatModel {
            id: "fallback-mini".to_string(),
            name: "Kotwal Mini".to_string(),
            provider: "Fast".to_string(),
        },
        ChatModel {
            id: "fallback-pro".to_string(),
            name: "Kotwal Pro".to_string(),
            provider: "Balanced".to_string(),
        },
        ChatModel {
            id: "fallback-ultra".to_string(),
            name: "Kotwal Ultra".to_string(),
            provider: "Detailed".to_string(),
        },
    ]
}

#[tauri::command]
pub async fn load_models(
    app: AppHandle,
    config: State<'_, ApiConfig>,
) -> Result<Vec<ChatModel>, String> {
    match api::chat::fetch_models(&config).await {
        Ok(models) if !models.is_empty() => Ok(models),
        Ok(_) => Ok(fallback_models()),
        Err(error) => {
            log::error!("failed to load chat models: {error}");
            emit_toast(&app, "Unable to fetch models", &error.to_string());
            Ok(fallback_models())
        }
    }
}

/// Fetches the server-side session history and merges it into the
/// conversation list. A failure leaves existing state untouched.
#[tauri::command]
pub async fn load_history(
    app: AppHandle,
    store: State<'_, ChatStore>,
    config: State<'_, ApiConfig>,
) -> Result<ChatState, String> {
    match api::chat::fetch_sessions(&config).await {
        Ok(sessions) => {
            let now = Utc::now();
            let mapped = sessions
                .into_iter()
                .map(|session| session_to_conversation(session, now))
                .collect();
            let mut state = store.state.lock().unwrap();
            state.merge_sessions(mapped);
            emit_state(&app, &state);
            Ok(state.clone())
        }
        Err(error) => {
            log::error!("failed to load chat history: {error}");
            emit_toast(&app, "Unable to load history", &error.to_string());
            Ok(store.snapshot())
        }
    }
}

async fn hydrate_session(app: &AppHandle, store: &ChatStore, config: &ApiConfig, session_id: &str) {
    match api::chat::fetch_session(config, session_id).await {
        Ok(Some(session)) => {
            let conversation = session_to_conversation(session, Utc::now());
            let mut state = store.state.lock().unwrap();
            state.adopt_conversation(conversation);
            state.set_active(Some(session_id.to_string()));
            emit_state(app, &state);
        }
        Ok(None) => {
            emit_toast(
                app,
                "Session unavailable",
                "Unable to fetch this chat session. Please try another one.",
            );
        }
        Err(error) => {
            log::error!("failed to load chat session {session_id}: {error}");
            emit_toast(app, "Unable to load chat", &error.to_string());
        }
    }
}

#[tauri::command]
pub async fn open_session(
    app: AppHandle,
    store: State<'_, ChatStore>,
    config: State<'_, ApiConfig>,
    session_id: String,
) -> Result<ChatState, String> {
    hydrate_session(&app, &store, &config, &session_id).await;
    Ok(store.snapshot())
}

/// Activates a conversation; hydrates it from the server when it is unknown
/// locally or its transcript has not been loaded yet.
#[tauri::command]
pub async fn select_conversation(
    app: AppHandle,
    store: State<'_, ChatStore>,
    config: State<'_, ApiConfig>,
    id: String,
) -> Result<ChatState, String> {
    let needs_hydration = {
        let mut state = store.state.lock().unwrap();
        state.set_active(Some(id.clone()));
        emit_state(&app, &state);
        state
            .conversation(&id)
            .map(|c| c.messages.is_empty())
            .unwrap_or(true)
    };
    if needs_hydration {
        hydrate_session(&app, &store, &config, &id).await;
    }
    Ok(store.snapshot())
}

#[tauri::command]
pub fn new_chat(app: AppHandle, store: State<'_, ChatStore>) -> Result<ChatState, String> {
    let mut state = store.state.lock().unwrap();
    state.set_active(None);
    emit_state(&app, &state);
    Ok(state.clone())
}

#[tauri::command]
pub fn set_input_value(store: State<'_, ChatStore>, value: String) -> Result<(), String> {
    store.state.lock().unwrap().set_input(value);
    Ok(())
}

#[tauri::command]
pub fn set_auth_token(config: State<'_, ApiConfig>, token: Option<String>) -> Result<(), String> {
    config.set_token(token);
    Ok(())
}

#[tauri::command]
pub fn snapshot(store: State<'_, ChatStore>) -> Result<ChatState, String> {
    Ok(store.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_catalog_covers_the_three_tiers() {
        let models = fallback_models();
        assert_eq!(models.len(), 3);
        assert!(models.iter().all(|m| m.id.starts_with("fallback-")));
        assert_eq!(models[0].name, "Kotwal Mini");
    }
}
