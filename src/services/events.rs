use crate::models::screen_types::ScreenSnapshot;
use tracing::{debug, warn};

pub const SCREEN_STATE_EVENT: &str = "screen-state";

/// Receives every screen transition, plus the one blocking alert the flow can raise.
pub trait ScreenEvents: Send + Sync {
    fn screen_changed(&self, snapshot: &ScreenSnapshot);

    fn alert(&self, message: &str);
}

/// Sink for headless use: transitions and alerts only go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEvents;

impl ScreenEvents for LogEvents {
    fn screen_changed(&self, snapshot: &ScreenSnapshot) {
        debug!("Screen phase {:?}", snapshot.phase);
    }

    fn alert(&self, message: &str) {
        warn!("{}", message);
    }
}

#[cfg(feature = "app")]
impl ScreenEvents for tauri::AppHandle {
    fn screen_changed(&self, snapshot: &ScreenSnapshot) {
        use tauri::Emitter;
        if let Err(e) = self.emit(SCREEN_STATE_EVENT, snapshot) {
            warn!("Failed to emit screen state: {}", e);
        }
    }

    fn alert(&self, message: &str) {
        use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
        self.dialog()
            .message(message)
            .kind(MessageDialogKind::Warning)
            .blocking_show();
    }
}
