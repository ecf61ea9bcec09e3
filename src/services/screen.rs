use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::{ModelStatus, Prediction};
use crate::models::screen_types::{OverlayKind, OverlaySnapshot, Phase, ScreenSnapshot};
use crate::services::image_source::ImageSource;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Overlay {
    kind: OverlayKind,
    text: &'static str,
    shown_at: Instant,
    generation: u64,
}

#[derive(Debug, Default)]
struct ScreenState {
    model: ModelStatus,
    classifying: bool,
    image: Option<ImageSource>,
    prediction: Option<Prediction>,
    overlay: Option<Overlay>,
    generation: u64,
    last_error: Option<String>,
}

impl ScreenState {
    fn ensure_idle(&self) -> Result<(), AppError> {
        if !self.model.ready {
            return Err(AppError::new(ErrorKind::ModelNotReady, "Model is not loaded yet"));
        }
        if self.classifying {
            return Err(AppError::new(
                ErrorKind::Busy,
                "A classification is already in progress",
            ));
        }
        Ok(())
    }
}

/// Owns all state of the single screen and the transitions between phases.
///
/// Phases: idle -> loading -> celebrating | warning -> idle. Only one
/// classification may be in flight; starting a new one drops any overlay
/// still on screen.
#[derive(Clone)]
pub struct ScreenController {
    state: Arc<Mutex<ScreenState>>,
    fade_in: Duration,
    hold: Duration,
}

impl ScreenController {
    pub fn new(fade_in: Duration, hold: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(ScreenState::default())),
            fade_in,
            hold,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScreenState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// How long a result overlay stays up.
    pub fn overlay_lifetime(&self) -> Duration {
        self.fade_in + self.hold
    }

    pub fn model_loading(&self) {
        let mut state = self.lock();
        state.model = ModelStatus {
            loading: true,
            ready: false,
            error: None,
        };
    }

    pub fn model_ready(&self) {
        let mut state = self.lock();
        state.model = ModelStatus {
            loading: false,
            ready: true,
            error: None,
        };
    }

    /// The screen stays gated on the model; the message is kept for diagnostics.
    pub fn model_failed(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.model = ModelStatus {
            loading: true,
            ready: false,
            error: Some(message.into()),
        };
    }

    pub fn model_status(&self) -> ModelStatus {
        self.lock().model.clone()
    }

    /// Same gate as [`ScreenController::begin`], without entering loading.
    pub fn check_idle(&self) -> Result<(), AppError> {
        self.lock().ensure_idle()
    }

    pub fn set_image(&self, source: ImageSource) {
        self.lock().image = Some(source);
    }

    pub fn image(&self) -> Option<ImageSource> {
        self.lock().image.clone()
    }

    /// Enter the loading phase, or refuse if no model or already busy.
    pub fn begin(&self) -> Result<(), AppError> {
        let mut state = self.lock();
        state.ensure_idle()?;
        state.classifying = true;
        state.overlay = None;
        state.generation += 1;
        state.last_error = None;
        Ok(())
    }

    /// Leave loading with a result and show its overlay. Returns the overlay
    /// generation to pass to [`ScreenController::expire_overlay`].
    pub fn finish(&self, prediction: Prediction) -> u64 {
        let mut state = self.lock();
        let generation = state.generation;
        state.classifying = false;
        state.overlay = Some(Overlay {
            kind: prediction.verdict.into(),
            text: prediction.verdict.overlay_text(),
            shown_at: Instant::now(),
            generation,
        });
        state.prediction = Some(prediction);
        generation
    }

    pub fn fail(&self, message: impl Into<String>) {
        let mut state = self.lock();
        state.classifying = false;
        state.last_error = Some(message.into());
    }

    /// Drop the overlay if it is still the one from `generation`.
    pub fn expire_overlay(&self, generation: u64) -> bool {
        let mut state = self.lock();
        match &state.overlay {
            Some(overlay) if overlay.generation == generation => {
                state.overlay = None;
                true
            }
            _ => false,
        }
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> ScreenSnapshot {
        let state = self.lock();

        let overlay = state
            .overlay
            .as_ref()
            .filter(|o| now.saturating_duration_since(o.shown_at) < self.overlay_lifetime())
            .map(|o| OverlaySnapshot {
                kind: o.kind,
                text: o.text.to_string(),
                opacity: fade_in_opacity(now.saturating_duration_since(o.shown_at), self.fade_in),
                fade_in_ms: self.fade_in.as_millis() as u64,
                hold_ms: self.hold.as_millis() as u64,
            });

        let phase = if state.classifying {
            Phase::Loading
        } else {
            match overlay.as_ref().map(|o| o.kind) {
                Some(OverlayKind::Celebration) => Phase::Celebrating,
                Some(OverlayKind::Warning) => Phase::Warning,
                None => Phase::Idle,
            }
        };

        ScreenSnapshot {
            phase,
            model: state.model.clone(),
            image: state.image.as_ref().map(|s| s.to_string()),
            prediction: state.prediction.clone(),
            overlay,
            last_error: state.last_error.clone(),
        }
    }
}

/// Linear ramp from 0 to 1 over `fade_in`, then held at 1.
pub fn fade_in_opacity(elapsed: Duration, fade_in: Duration) -> f32 {
    if fade_in.is_zero() || elapsed >= fade_in {
        1.0
    } else {
        elapsed.as_secs_f32() / fade_in.as_secs_f32()
    }
}
