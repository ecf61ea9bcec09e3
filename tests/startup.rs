mod common;

use std::sync::Arc;

use common::{ready_service, service_with, FixedPredictor};
use touch_grass_lib::config::AppConfig;
use touch_grass_lib::error::{AppError, ErrorKind};
use touch_grass_lib::models::screen_types::Phase;
use touch_grass_lib::services::classifier::inference::Predictor;
use touch_grass_lib::services::classifier::model_manager::{ModelManager, ModelSpec};
use touch_grass_lib::services::image_source::ImageSource;

#[tokio::test]
async fn successful_load_unlocks_primary_action() {
    let (service, events) = ready_service(AppConfig::default(), FixedPredictor::new(vec![1.0, 0.0])).await;

    let history = events.all();
    assert!(history.first().unwrap().model.loading);
    assert!(!history.first().unwrap().can_classify());

    let snapshot = service.snapshot();
    assert!(snapshot.model.ready);
    assert!(!snapshot.model.loading);
    assert!(snapshot.can_classify());
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(service.is_ready());
}

#[tokio::test]
async fn failed_load_keeps_screen_waiting_for_model() {
    let (service, events) = service_with(AppConfig::default());

    let result = service
        .start(async {
            Err::<(Arc<dyn Predictor>, ModelSpec), AppError>(AppError::new(
                ErrorKind::ModelLoad,
                "HTTP 404",
            ))
        })
        .await;
    assert!(result.is_err());

    let snapshot = events.last();
    assert!(snapshot.model.loading);
    assert!(!snapshot.model.ready);
    assert_eq!(snapshot.model.error.as_deref(), Some("HTTP 404"));
    assert!(!snapshot.can_classify());

    let err = service
        .classify(ImageSource::Local("anything.png".into()))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ModelNotReady);
}

#[tokio::test]
async fn predictor_handle_is_never_replaced() {
    let (service, _events) = ready_service(AppConfig::default(), FixedPredictor::new(vec![1.0, 0.0])).await;

    let err = service
        .install_predictor(FixedPredictor::new(vec![0.0, 1.0]), service.default_spec())
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ModelLoad);
}

#[tokio::test]
async fn second_start_keeps_the_loaded_model() {
    let (service, events) = ready_service(AppConfig::default(), FixedPredictor::new(vec![1.0, 0.0])).await;
    let published = events.all().len();

    let replacement: Arc<dyn Predictor> = FixedPredictor::new(vec![0.0, 1.0]);
    let spec = service.default_spec();
    service
        .start(async move { Ok::<(Arc<dyn Predictor>, ModelSpec), AppError>((replacement, spec)) })
        .await
        .unwrap();

    let snapshot = service.snapshot();
    assert!(snapshot.can_classify());
    assert!(snapshot.model.error.is_none());
    assert_eq!(events.all().len(), published);

    let failing = service
        .start(async {
            Err::<(Arc<dyn Predictor>, ModelSpec), AppError>(AppError::new(ErrorKind::ModelLoad, "HTTP 500"))
        })
        .await;
    assert!(failing.is_ok());
    assert!(service.snapshot().can_classify());
}

#[tokio::test]
async fn model_manager_failure_is_absorbed_by_start() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.model_url = dir.path().join("missing-manifest.json").display().to_string();

    let (service, events) = service_with(config);
    let manager = ModelManager::new(dir.path().to_path_buf(), service.client().clone());

    assert!(service.load_model(&manager).await.is_err());
    assert!(!service.is_ready());
    assert!(events.last().model.error.is_some());
}
