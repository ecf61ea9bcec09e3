use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Platform camera (or photo picker) behind the "take a photo" action.
///
/// Both calls may block on user interaction, so callers run them off the
/// async executor.
pub trait Camera: Send + Sync {
    fn request_permission(&self) -> PermissionStatus;

    /// `None` when the user cancels.
    fn capture(&self) -> Option<PathBuf>;
}

/// Uses the platform file picker as the capture UI.
#[cfg(feature = "app")]
pub struct DialogCamera {
    app: tauri::AppHandle,
}

#[cfg(feature = "app")]
impl DialogCamera {
    pub fn new(app: tauri::AppHandle) -> Self {
        Self { app }
    }
}

#[cfg(feature = "app")]
impl Camera for DialogCamera {
    fn request_permission(&self) -> PermissionStatus {
        // Desktop pickers need no runtime grant.
        PermissionStatus::Granted
    }

    fn capture(&self) -> Option<PathBuf> {
        use tauri_plugin_dialog::DialogExt;

        self.app
            .dialog()
            .file()
            .add_filter("Images", &["jpg", "jpeg", "png", "webp", "bmp", "gif"])
            .blocking_pick_file()
            .and_then(|file| file.into_path().ok())
    }
}
