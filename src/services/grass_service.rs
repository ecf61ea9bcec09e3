use crate::config::AppConfig;
use crate::error::{AppError, ErrorKind};
use crate::models::classify_types::{ClassMapping, Prediction};
use crate::models::screen_types::ScreenSnapshot;
use crate::services::camera::{Camera, PermissionStatus};
use crate::services::classifier::inference::{self, Predictor};
use crate::services::classifier::model_manager::{ModelManager, ModelSpec};
use crate::services::events::ScreenEvents;
use crate::services::image_source::ImageSource;
use crate::services::screen::ScreenController;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

pub const PERMISSION_REQUIRED: &str = "Permission to access camera is required!";

#[derive(Clone)]
struct LoadedModel {
    predictor: Arc<dyn Predictor>,
    spec: ModelSpec,
}

/// Drives acquire -> decode -> resize -> infer -> present for the screen.
#[derive(Clone)]
pub struct GrassService {
    config: Arc<AppConfig>,
    client: reqwest::Client,
    controller: ScreenController,
    model: Arc<OnceLock<LoadedModel>>,
    events: Arc<dyn ScreenEvents>,
}

impl GrassService {
    pub fn new(config: AppConfig, events: Arc<dyn ScreenEvents>) -> Result<Self, AppError> {
        let client = client_builder(&config)
            .build()
            .map_err(|e| AppError::new(ErrorKind::Config, format!("Failed to build HTTP client: {}", e)))?;
        Self::with_client(config, events, client)
    }

    pub fn with_client(
        config: AppConfig,
        events: Arc<dyn ScreenEvents>,
        client: reqwest::Client,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let controller = ScreenController::new(config.fade_in(), config.hold());

        Ok(Self {
            config: Arc::new(config),
            client,
            controller,
            model: Arc::new(OnceLock::new()),
            events,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        self.controller.snapshot()
    }

    pub fn is_ready(&self) -> bool {
        self.model.get().is_some()
    }

    fn publish(&self) {
        self.events.screen_changed(&self.controller.snapshot());
    }

    pub fn default_spec(&self) -> ModelSpec {
        ModelSpec {
            class_mapping: self.config.class_mapping.clone(),
            input_size: self.config.input_size,
        }
    }

    /// One-shot model load. A failure is logged and leaves the screen gated
    /// on the model for the rest of the session.
    pub async fn start<F>(&self, load: F) -> Result<(), AppError>
    where
        F: Future<Output = Result<(Arc<dyn Predictor>, ModelSpec), AppError>>,
    {
        if self.is_ready() {
            info!("Model already loaded, ignoring load request");
            return Ok(());
        }

        self.controller.model_loading();
        self.publish();

        let result = match load.await {
            Ok((predictor, spec)) => self.install_predictor(predictor, spec),
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                info!("Model ready");
                self.controller.model_ready();
            }
            // A concurrent load won the race; its handle stays in place.
            Err(e) if self.is_ready() => {
                warn!("Discarding duplicate model load: {}", e);
                self.controller.model_ready();
            }
            Err(e) => {
                error!("Error loading model: {}", e);
                self.controller.model_failed(e.message.clone());
            }
        }
        self.publish();
        result
    }

    /// Load through [`ModelManager`] from the configured `model_url`.
    pub async fn load_model(&self, manager: &ModelManager) -> Result<(), AppError> {
        let url = self.config.model_url.clone();
        let spec = self.default_spec();
        let manager = manager.clone();
        self.start(async move {
            let spec = manager.load(&url, spec).await?;
            let predictor: Arc<dyn Predictor> = Arc::new(manager);
            Ok((predictor, spec))
        })
        .await
    }

    /// The handle can be set once; it is never replaced.
    pub fn install_predictor(&self, predictor: Arc<dyn Predictor>, spec: ModelSpec) -> Result<(), AppError> {
        spec.class_mapping.validate()?;
        self.model
            .set(LoadedModel { predictor, spec })
            .map_err(|_| AppError::new(ErrorKind::ModelLoad, "Model is already loaded"))
    }

    /// Capture flow: permission, camera UI, then classify the photo.
    ///
    /// `Ok(None)` means the user cancelled the capture.
    pub async fn take_photo(&self, camera: Arc<dyn Camera>) -> Result<Option<Prediction>, AppError> {
        if !self.is_ready() {
            return Err(AppError::new(ErrorKind::ModelNotReady, "Model is not loaded yet"));
        }
        self.controller.check_idle()?;

        let events = self.events.clone();
        let captured = tokio::task::spawn_blocking(move || {
            if camera.request_permission() == PermissionStatus::Denied {
                events.alert(PERMISSION_REQUIRED);
                return Err(AppError::new(ErrorKind::PermissionDenied, PERMISSION_REQUIRED));
            }
            Ok(camera.capture())
        })
        .await
        .map_err(|e| AppError::new(ErrorKind::Other, format!("Camera task failed: {}", e)))??;

        let Some(path) = captured else {
            warn!("No image selected or image picker was canceled");
            return Ok(None);
        };

        let source = ImageSource::Local(path);
        self.controller.set_image(source.clone());
        self.publish();
        self.classify(source).await.map(Some)
    }

    /// Selection flow: show demo thumbnail `index` and classify it.
    pub async fn select_thumbnail(&self, index: usize) -> Result<Prediction, AppError> {
        let url = self.config.thumbnails.get(index).cloned().ok_or_else(|| {
            AppError::new(ErrorKind::Other, format!("No thumbnail at index {}", index))
        })?;

        let source = ImageSource::Remote(url);
        self.controller.set_image(source.clone());
        self.publish();
        self.classify(source).await
    }

    /// Run one classification of `source` through the loaded model.
    pub async fn classify(&self, source: ImageSource) -> Result<Prediction, AppError> {
        let loaded = self
            .model
            .get()
            .cloned()
            .ok_or_else(|| AppError::new(ErrorKind::ModelNotReady, "Model is not loaded yet"))?;

        self.controller.begin()?;
        self.publish();

        match self.run_pipeline(loaded, &source).await {
            Ok(prediction) => {
                info!(
                    "{} -> {} ({:.1}%)",
                    source,
                    prediction.class_name,
                    prediction.confidence * 100.0
                );
                let generation = self.controller.finish(prediction.clone());
                self.publish();
                self.schedule_overlay_reset(generation);
                Ok(prediction)
            }
            Err(e) => {
                error!("Error classifying image {}: {}", source, e);
                self.controller.fail(e.message.clone());
                self.publish();
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, loaded: LoadedModel, source: &ImageSource) -> Result<Prediction, AppError> {
        let bytes = source.fetch(&self.client, self.config.fetch_timeout()).await?;
        let label = source.to_string();

        tokio::task::spawn_blocking(move || {
            let tensor = inference::preprocess_bytes(&bytes, loaded.spec.input_size)?;
            let scores = loaded.predictor.predict(tensor)?;
            interpret_scores(scores, &loaded.spec.class_mapping, label)
        })
        .await
        .map_err(|e| AppError::new(ErrorKind::Inference, format!("Inference task failed: {}", e)))?
    }

    fn schedule_overlay_reset(&self, generation: u64) {
        let this = self.clone();
        let lifetime = self.controller.overlay_lifetime();
        tokio::spawn(async move {
            tokio::time::sleep(lifetime).await;
            if this.controller.expire_overlay(generation) {
                this.publish();
            }
        });
    }
}

/// HTTP client settings shared by the model download and image fetches.
///
/// Only connecting is bounded here. Image fetches add `fetch_timeout_secs`
/// per request; the model download streams for as long as it takes.
pub fn client_builder(config: &AppConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder().connect_timeout(config.fetch_timeout())
}

/// Arg-max over the model output, mapped through the class mapping.
pub fn interpret_scores(
    scores: Vec<f32>,
    mapping: &ClassMapping,
    source: String,
) -> Result<Prediction, AppError> {
    if scores.len() != mapping.labels.len() {
        return Err(AppError::new(
            ErrorKind::Inference,
            format!(
                "Model returned {} scores, expected {}",
                scores.len(),
                mapping.labels.len()
            ),
        ));
    }

    let class_index = inference::argmax(&scores)
        .ok_or_else(|| AppError::new(ErrorKind::Inference, "Model returned no usable scores"))?;
    let confidence = inference::softmax(&scores)[class_index];

    Ok(Prediction {
        verdict: mapping.verdict(class_index),
        class_index,
        class_name: mapping.label(class_index),
        confidence,
        scores,
        source,
    })
}
