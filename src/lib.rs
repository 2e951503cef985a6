mod api;
mod commands;
mod state;

use api::ApiConfig;
use state::ChatStore;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .setup(|app| {
            use tauri::Manager;
            app.manage(ApiConfig::from_env());
            app.manage(ChatStore::new());
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::chat::send_message,
            commands::chat::dismiss_notice,
            commands::chat::dismiss_all_notices,
            commands::chat::edit_blocked_prompt,
            commands::chat::proceed_with_blocked_prompt,
            commands::sessions::load_models,
            commands::sessions::load_history,
            commands::sessions::open_session,
            commands::sessions::select_conversation,
            commands::sessions::new_chat,
            commands::sessions::set_input_value,
            commands::sessions::set_auth_token,
            commands::sessions::snapshot,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
