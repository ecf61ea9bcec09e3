pub mod config;
pub mod error;
pub mod models;
pub mod services;

#[cfg(feature = "app")]
mod commands;

#[cfg(feature = "app")]
#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    use config::{AppConfig, CONFIG_FILE_NAME};
    use services::classifier::model_manager::ModelManager;
    use services::events::ScreenEvents;
    use services::grass_service::GrassService;
    use std::sync::Arc;
    use tauri::Manager;

    tracing_subscriber::fmt::init();

    tauri::Builder::default()
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let app_data_dir = app.path().app_data_dir()?;
            std::fs::create_dir_all(&app_data_dir)?;

            let config = AppConfig::load(Some(&app_data_dir.join(CONFIG_FILE_NAME)))?;
            let events: Arc<dyn ScreenEvents> = Arc::new(app.handle().clone());
            let service = GrassService::new(config, events)?;
            let model_manager = ModelManager::new(app_data_dir, service.client().clone());

            app.manage(service.clone());

            // Load once at startup; on failure the screen stays on "Loading model..."
            tauri::async_runtime::spawn(async move {
                let _ = service.load_model(&model_manager).await;
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::classifier::get_screen_state,
            commands::classifier::get_model_status,
            commands::classifier::get_thumbnails,
            commands::classifier::take_photo,
            commands::classifier::select_thumbnail,
            commands::image::get_image_preview,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
