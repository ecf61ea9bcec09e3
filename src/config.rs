use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::ClassMapping;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "touch-grass.json";
pub const MODEL_URL_ENV: &str = "TOUCH_GRASS_MODEL_URL";

const DEFAULT_MODEL_URL: &str = "https://CharlotteZhang13.github.io/onnx/manifest.json";

const DEFAULT_THUMBNAILS: [&str; 6] = [
    "https://th.bing.com/th/id/OIP.x--Qz4d68wGjUD411gAnEgAAAA?rs=1&pid=ImgDetMain",
    "https://th.bing.com/th/id/OIP.y1LAiETgF2mLIWSNxpmk5wHaFj?w=222&h=180&c=7&r=0&o=5&dpr=2.5&pid=1.7",
    "https://th.bing.com/th/id/OIP.8qo_pge6nNWj_imUcBpOLAHaEQ?w=310&h=180&c=7&r=0&o=5&dpr=2.5&pid=1.7",
    "https://th.bing.com/th/id/OIP.8DQ2oMcUvtI0yG914oA32AHaE7?w=281&h=187&c=7&r=0&o=5&dpr=2.5&pid=1.7",
    "https://th.bing.com/th/id/OIP.jsmNHbVwU4hcGGic_OlxxwHaFs?rs=1&pid=ImgDetMain",
    "https://media.istockphoto.com/photos/wide-angle-shot-of-students-and-youth-in-lecture-hall-in-east-asia-picture-id1150261801?k=20&m=1150261801&s=612x612&w=0&h=HETIv04umJUb6_d3tpNERzbVWiCZBgn7xPkK_dOdNzg=",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// `.onnx` file or JSON manifest, as a URL or a local path.
    pub model_url: String,
    pub input_size: u32,
    pub class_mapping: ClassMapping,
    pub fade_in_ms: u64,
    pub hold_ms: u64,
    /// Per-request limit on thumbnail fetches. The model download has none.
    pub fetch_timeout_secs: u64,
    /// Demo row under the photo. Six by default; any non-empty list works.
    pub thumbnails: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_url: DEFAULT_MODEL_URL.to_string(),
            input_size: 180,
            class_mapping: ClassMapping::default(),
            fade_in_ms: 2000,
            hold_ms: 2000,
            fetch_timeout_secs: 30,
            thumbnails: DEFAULT_THUMBNAILS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Reads `path` if it exists, applies the environment override and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    AppError::new(
                        ErrorKind::Config,
                        format!("Failed to read config file {}: {}", p.display(), e),
                    )
                })?;
                Self::from_json(&content)?
            }
            _ => Self::default(),
        };

        if let Ok(url) = std::env::var(MODEL_URL_ENV) {
            if !url.trim().is_empty() {
                config.model_url = url;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, AppError> {
        serde_json::from_str(content).map_err(|e| {
            AppError::new(ErrorKind::Config, format!("Failed to parse config JSON: {}", e))
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.model_url.trim().is_empty() {
            return Err(AppError::new(ErrorKind::Config, "model_url must not be empty"));
        }
        if self.input_size == 0 {
            return Err(AppError::new(ErrorKind::Config, "input_size must be positive"));
        }
        if self.thumbnails.iter().all(|url| url.trim().is_empty()) {
            return Err(AppError::new(ErrorKind::Config, "thumbnails must list at least one URL"));
        }
        self.class_mapping.validate()
    }

    pub fn fade_in(&self) -> Duration {
        Duration::from_millis(self.fade_in_ms)
    }

    pub fn hold(&self) -> Duration {
        Duration::from_millis(self.hold_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
