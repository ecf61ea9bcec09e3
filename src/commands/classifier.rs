use crate::error::AppError;
use crate::models::classify_types::{ModelStatus, Prediction};
use crate::models::screen_types::ScreenSnapshot;
use crate::services::camera::DialogCamera;
use crate::services::grass_service::GrassService;
use std::sync::Arc;
use tauri::{AppHandle, State};

#[tauri::command]
pub async fn get_screen_state(service: State<'_, GrassService>) -> Result<ScreenSnapshot, AppError> {
    Ok(service.snapshot())
}

#[tauri::command]
pub async fn get_model_status(service: State<'_, GrassService>) -> Result<ModelStatus, AppError> {
    Ok(service.snapshot().model)
}

#[tauri::command]
pub fn get_thumbnails(service: State<'_, GrassService>) -> Vec<String> {
    service.config().thumbnails.clone()
}

#[tauri::command]
pub async fn take_photo(
    app: AppHandle,
    service: State<'_, GrassService>,
) -> Result<Option<Prediction>, AppError> {
    let camera = Arc::new(DialogCamera::new(app));
    service.take_photo(camera).await
}

#[tauri::command]
pub async fn select_thumbnail(
    service: State<'_, GrassService>,
    index: usize,
) -> Result<Prediction, AppError> {
    service.select_thumbnail(index).await
}
