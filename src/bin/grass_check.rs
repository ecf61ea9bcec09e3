use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use touch_grass_lib::{
    config::{AppConfig, CONFIG_FILE_NAME},
    services::{
        classifier::model_manager::ModelManager, events::LogEvents, grass_service::GrassService,
        image_source::ImageSource,
    },
};

/// Check whether a photo shows grass.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Image file path or http(s) URL
    #[arg(value_name = "INPUT", required_unless_present = "demo")]
    pub input: Option<String>,

    /// Classify demo thumbnail N (0-based) instead of INPUT
    #[arg(long, value_name = "N", conflicts_with = "input")]
    pub demo: Option<usize>,

    /// JSON config file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Model URL or path (.onnx or manifest), overrides the config
    #[arg(long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Where downloaded models are cached
    #[arg(long, value_name = "DIR", default_value = ".touch-grass")]
    pub data_dir: PathBuf,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| args.data_dir.join(CONFIG_FILE_NAME));
    let mut config = AppConfig::load(Some(&config_path)).context("loading config")?;
    if let Some(model) = args.model {
        config.model_url = model;
    }

    info!("Model: {}", config.model_url);

    let service = GrassService::new(config, Arc::new(LogEvents))?;
    let manager = ModelManager::new(args.data_dir.clone(), service.client().clone());
    service
        .load_model(&manager)
        .await
        .context("loading model")?;

    let prediction = match (args.demo, args.input) {
        (Some(index), _) => service.select_thumbnail(index).await?,
        (None, Some(input)) => {
            let source = if input.starts_with("http://") || input.starts_with("https://") {
                ImageSource::Remote(input)
            } else {
                ImageSource::Local(PathBuf::from(input))
            };
            service.classify(source).await?
        }
        (None, None) => bail!("nothing to classify"),
    };

    println!("{}", prediction.message());
    println!(
        "{} ({:.1}%)  {}",
        prediction.class_name,
        prediction.confidence * 100.0,
        prediction.verdict.overlay_text()
    );

    Ok(())
}
