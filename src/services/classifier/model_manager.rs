use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::ClassMapping;
use crate::services::classifier::inference::{self, Predictor};
use futures::StreamExt;
use ndarray::Array4;
use ort::session::Session;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

pub type OrtModel = Session;

const DEFAULT_MODEL_FILE: &str = "model.onnx";

/// Optional JSON document sitting next to the model file.
#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct ModelManifest {
    pub model: String,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    #[serde(default)]
    pub grass_index: Option<usize>,
    #[serde(default)]
    pub input_size: Option<u32>,
}

/// What the loaded model expects and how to read its output.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSpec {
    pub class_mapping: ClassMapping,
    pub input_size: u32,
}

impl ModelSpec {
    /// Manifest values win over the configured ones.
    pub fn merge(mut self, manifest: &ModelManifest) -> Result<Self, AppError> {
        if let Some(labels) = &manifest.labels {
            self.class_mapping.labels = labels.clone();
        }
        if let Some(idx) = manifest.grass_index {
            self.class_mapping.grass_index = idx;
        }
        if let Some(size) = manifest.input_size {
            self.input_size = size;
        }
        self.class_mapping.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Location {
    Remote(Url),
    Local(PathBuf),
}

impl Location {
    fn parse(raw: &str) -> Result<Self, AppError> {
        let path = Path::new(raw);
        if path.exists() {
            return Ok(Location::Local(path.to_path_buf()));
        }
        match Url::parse(raw) {
            Ok(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| AppError::new(ErrorKind::ModelLoad, format!("Bad file URL {}", raw))),
            Ok(url) => Ok(Location::Remote(url)),
            Err(_) => Ok(Location::Local(path.to_path_buf())),
        }
    }

    fn join(&self, relative: &str) -> Result<Self, AppError> {
        match self {
            Location::Remote(base) => base.join(relative).map(Location::Remote).map_err(|e| {
                AppError::new(
                    ErrorKind::ModelLoad,
                    format!("Failed to resolve model URL {}: {}", relative, e),
                )
            }),
            Location::Local(base) => {
                if let Ok(url) = Url::parse(relative) {
                    if url.scheme() != "file" {
                        return Ok(Location::Remote(url));
                    }
                }
                let dir = base.parent().unwrap_or_else(|| Path::new("."));
                Ok(Location::Local(dir.join(relative)))
            }
        }
    }

    fn is_onnx(&self) -> bool {
        let name = match self {
            Location::Remote(url) => url.path().to_string(),
            Location::Local(path) => path.to_string_lossy().to_string(),
        };
        name.to_ascii_lowercase().ends_with(".onnx")
    }

    fn file_name(&self) -> String {
        let name = match self {
            Location::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .map(|s| s.to_string()),
            Location::Local(path) => path.file_name().map(|n| n.to_string_lossy().to_string()),
        };
        name.filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL_FILE.to_string())
    }
}

/// Fetches the model once and owns the ONNX session.
///
/// The session slot is filled at most once; later loads are no-ops.
#[derive(Clone)]
pub struct ModelManager {
    pub model_dir: PathBuf,
    client: reqwest::Client,
    model: Arc<std::sync::Mutex<Option<OrtModel>>>,
    loading: Arc<Mutex<bool>>,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf, client: reqwest::Client) -> Self {
        Self {
            model_dir: data_dir.join("models"),
            client,
            model: Arc::new(std::sync::Mutex::new(None)),
            loading: Arc::new(Mutex::new(false)),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model.lock().map(|m| m.is_some()).unwrap_or(false)
    }

    pub async fn is_loading(&self) -> bool {
        *self.loading.lock().await
    }

    /// Resolve `model_url`, download the model if needed and open a session.
    pub async fn load(&self, model_url: &str, spec: ModelSpec) -> Result<ModelSpec, AppError> {
        {
            let mut loading = self.loading.lock().await;
            if *loading {
                return Err(AppError::new(ErrorKind::ModelLoad, "Model is already loading"));
            }
            *loading = true;
        }

        let result = self.do_load(model_url, spec).await;

        *self.loading.lock().await = false;
        result
    }

    async fn do_load(&self, model_url: &str, spec: ModelSpec) -> Result<ModelSpec, AppError> {
        let location = Location::parse(model_url)?;

        let (model_location, spec) = if location.is_onnx() {
            (location, spec)
        } else {
            let manifest = self.fetch_manifest(&location).await?;
            debug!("Model manifest: {:?}", manifest);
            let model_location = location.join(&manifest.model)?;
            (model_location, spec.merge(&manifest)?)
        };

        let model_path = match &model_location {
            Location::Local(path) => path.clone(),
            Location::Remote(url) => {
                let dest = self.model_dir.join(model_location.file_name());
                if !dest.exists() {
                    tokio::fs::create_dir_all(&self.model_dir).await.map_err(|e| {
                        AppError::new(
                            ErrorKind::ModelLoad,
                            format!("Failed to create model directory: {}", e),
                        )
                    })?;
                    download_file(&self.client, url.as_str(), &dest).await?;
                } else {
                    info!("Using cached model {}", dest.display());
                }
                dest
            }
        };

        if self.is_ready() {
            return Ok(spec);
        }

        let session = open_session(model_path).await?;

        let mut slot = self
            .model
            .lock()
            .map_err(|_| AppError::new(ErrorKind::ModelLoad, "Model lock poisoned"))?;
        if slot.is_none() {
            *slot = Some(session);
        }

        Ok(spec)
    }

    async fn fetch_manifest(&self, location: &Location) -> Result<ModelManifest, AppError> {
        let content = match location {
            Location::Local(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                AppError::new(
                    ErrorKind::ModelLoad,
                    format!("Failed to read manifest {}: {}", path.display(), e),
                )
            })?,
            Location::Remote(url) => {
                let response = self.client.get(url.as_str()).send().await.map_err(|e| {
                    AppError::new(ErrorKind::ModelLoad, format!("Failed to fetch manifest: {}", e))
                })?;
                if !response.status().is_success() {
                    return Err(AppError::new(
                        ErrorKind::ModelLoad,
                        format!("Failed to fetch manifest {}: HTTP {}", url, response.status()),
                    ));
                }
                response.text().await?
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            AppError::new(ErrorKind::ModelLoad, format!("Failed to parse model manifest: {}", e))
        })
    }
}

impl Predictor for ModelManager {
    fn predict(&self, input: Array4<f32>) -> Result<Vec<f32>, AppError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| AppError::new(ErrorKind::Inference, "Model lock poisoned"))?;
        let session = guard
            .as_mut()
            .ok_or_else(|| AppError::new(ErrorKind::ModelNotReady, "Model not loaded"))?;
        inference::run_inference_with_model(session, input)
    }
}

async fn open_session(model_path: PathBuf) -> Result<OrtModel, AppError> {
    info!("Loading ONNX model from {}", model_path.display());

    tokio::task::spawn_blocking(move || -> Result<Session, AppError> {
        let _ = ort::init().with_name("touch-grass").commit();

        let session = Session::builder()
            .map_err(|e| model_error("Failed to create session builder", e))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| model_error("Failed to set optimization level", e))?
            .with_intra_threads(2)
            .map_err(|e| model_error("Failed to set intra threads", e))?
            .commit_from_file(&model_path)
            .map_err(|e| model_error("Failed to load ONNX model", e))?;

        Ok(session)
    })
    .await
    .map_err(|e| {
        AppError::new(
            ErrorKind::ModelLoad,
            format!("Failed to spawn model loading task: {}", e),
        )
    })?
}

fn model_error(context: &str, err: impl std::fmt::Display) -> AppError {
    AppError::new(ErrorKind::ModelLoad, format!("{}: {}", context, err))
}

/// Stream `url` into `dest`, going through a `.part` file so an interrupted
/// download is never mistaken for a cached model.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), AppError> {
    info!("Downloading model from {}", url);
    let response = client.get(url).send().await.map_err(|e| {
        AppError::new(ErrorKind::ModelLoad, format!("Failed to download {}: {}", url, e))
    })?;

    if !response.status().is_success() {
        return Err(AppError::new(
            ErrorKind::ModelLoad,
            format!("Failed to download {}: HTTP {}", url, response.status()),
        ));
    }

    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;
    let mut last_logged = 0;

    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await.map_err(|e| {
        AppError::new(
            ErrorKind::ModelLoad,
            format!("Failed to create file {}: {}", partial.display(), e),
        )
    })?;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(AppError::new(
                    ErrorKind::ModelLoad,
                    format!("Download of {} interrupted: {}", url, e),
                ));
            }
        };
        downloaded += chunk.len() as u64;
        tokio::io::AsyncWriteExt::write_all(&mut file, &chunk)
            .await
            .map_err(|e| {
                AppError::new(ErrorKind::ModelLoad, format!("Failed to write to file: {}", e))
            })?;

        if total_size > 0 {
            let progress = (downloaded * 100) / total_size;
            if progress >= last_logged + 10 {
                debug!("Model download {}%", progress);
                last_logged = progress;
            }
        }
    }
    tokio::io::AsyncWriteExt::flush(&mut file).await?;
    drop(file);

    tokio::fs::rename(&partial, dest).await?;
    info!("Model saved to {} ({} bytes)", dest.display(), downloaded);
    Ok(())
}
