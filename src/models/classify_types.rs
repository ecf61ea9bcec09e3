use crate::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct ModelStatus {
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Grass,
    NotGrass,
}

impl Verdict {
    pub fn message(&self) -> &'static str {
        match self {
            Verdict::Grass => "You touched grass!",
            Verdict::NotGrass => "This is not grass :(",
        }
    }

    pub fn overlay_text(&self) -> &'static str {
        match self {
            Verdict::Grass => "YOU TOUCHED GRASS !!!",
            Verdict::NotGrass => "Retry, it is not grass",
        }
    }
}

/// Which model output index means "grass".
///
/// The index is fixed by the label order the model was trained with, so it
/// is configuration rather than code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMapping {
    pub labels: Vec<String>,
    pub grass_index: usize,
}

impl Default for ClassMapping {
    fn default() -> Self {
        Self {
            labels: vec!["grass".to_string(), "not_grass".to_string()],
            grass_index: 0,
        }
    }
}

impl ClassMapping {
    pub const CLASS_COUNT: usize = 2;

    pub fn validate(&self) -> Result<(), AppError> {
        if self.labels.len() != Self::CLASS_COUNT {
            return Err(AppError::new(
                ErrorKind::Config,
                format!(
                    "Class mapping needs exactly {} labels, got {}",
                    Self::CLASS_COUNT,
                    self.labels.len()
                ),
            ));
        }
        if self.grass_index >= self.labels.len() {
            return Err(AppError::new(
                ErrorKind::Config,
                format!("grass_index {} is out of range", self.grass_index),
            ));
        }
        Ok(())
    }

    pub fn verdict(&self, class_index: usize) -> Verdict {
        if class_index == self.grass_index {
            Verdict::Grass
        } else {
            Verdict::NotGrass
        }
    }

    pub fn label(&self, class_index: usize) -> String {
        self.labels
            .get(class_index)
            .cloned()
            .unwrap_or_else(|| format!("class_{}", class_index))
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Prediction {
    pub verdict: Verdict,
    pub class_index: usize,
    pub class_name: String,
    pub confidence: f32,
    pub scores: Vec<f32>,
    /// Image reference the prediction was computed for.
    pub source: String,
}

impl Prediction {
    pub fn message(&self) -> &'static str {
        self.verdict.message()
    }
}
