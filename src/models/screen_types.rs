use super::classify_types::{ModelStatus, Prediction, Verdict};
use serde::Serialize;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Loading,
    Celebrating,
    Warning,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OverlayKind {
    Celebration,
    Warning,
}

impl From<Verdict> for OverlayKind {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Grass => OverlayKind::Celebration,
            Verdict::NotGrass => OverlayKind::Warning,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OverlaySnapshot {
    pub kind: OverlayKind,
    pub text: String,
    pub opacity: f32,
    pub fade_in_ms: u64,
    pub hold_ms: u64,
}

/// Everything the screen renders, in one serializable value.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ScreenSnapshot {
    pub phase: Phase,
    pub model: ModelStatus,
    pub image: Option<String>,
    pub prediction: Option<Prediction>,
    pub overlay: Option<OverlaySnapshot>,
    pub last_error: Option<String>,
}

impl ScreenSnapshot {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// The primary action is only offered once the model is ready.
    pub fn can_classify(&self) -> bool {
        self.model.ready && self.phase != Phase::Loading
    }
}
