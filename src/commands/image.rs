use crate::error::AppError;
use crate::services::image_source;
use std::path::Path;

/// Data URI for showing a captured photo; remote images load directly.
#[tauri::command]
pub fn get_image_preview(path: String) -> Result<String, AppError> {
    image_source::preview_data_uri(Path::new(&path))
}
