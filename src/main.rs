//! platewatch - real-time license plate detection and recognition
//!
//! Plays frames from a video source through a throttled detect+OCR pipeline
//! and emits annotated frames with the last confidently recognized plate.

mod capture;
mod config;
mod overlay;
mod pipeline;
mod vision;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::capture::ImageDirSource;
use crate::config::AppConfig;
use crate::overlay::{FrameSink, NullSink, PngDirSink};
use crate::pipeline::ScanPipeline;
use crate::vision::{CtcRecognizer, OnnxPlateDetector};

/// platewatch - license plate scanning pipeline
#[derive(Parser, Debug)]
#[command(name = "platewatch")]
#[command(about = "Detects and reads license plates from a stream of video frames")]
struct Args {
    /// Config file path (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of frame images to scan
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for annotated output frames
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Plate detection model path
    #[arg(long)]
    detector_model: Option<PathBuf>,

    /// Text recognition model path
    #[arg(long)]
    recognizer_model: Option<PathBuf>,

    /// Minimum milliseconds between detect+OCR cycles
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = load_config_with_overrides(&args);

    let input_dir = config
        .source
        .input_dir
        .clone()
        .context("no input directory: pass --input or set source.input_dir in the config")?;

    info!("platewatch starting");
    info!(
        "Detector: {:?}, recognizer: {:?}, interval: {}ms",
        config.models.detector, config.models.recognizer, config.pipeline.detect_interval_ms
    );

    let detector = Arc::new(
        OnnxPlateDetector::load(&config.models.detector, config.detection.clone())
            .context("failed to initialize plate detector")?,
    );
    let recognizer = Arc::new(
        CtcRecognizer::load(&config.models.recognizer)
            .context("failed to initialize text recognizer")?,
    );

    let mut source = ImageDirSource::open(&input_dir, config.source.fps)
        .context("failed to open frame source")?;
    let mut sink: Box<dyn FrameSink> = match &config.pipeline.output_dir {
        Some(dir) => Box::new(PngDirSink::create(dir.clone())?),
        None => Box::new(NullSink),
    };

    let mut pipeline = ScanPipeline::new(
        detector,
        recognizer,
        config.ocr.clone(),
        &config.pipeline,
    );
    pipeline.run(&mut source, sink.as_mut()).await?;

    if let Some(plate) = pipeline.overlay_handle().read().current() {
        info!("Last accepted plate: {}", plate.label());
    } else {
        info!("No plate was accepted");
    }
    info!("platewatch shutdown complete");

    Ok(())
}

/// Load the config file (explicit path, else the default location, else
/// built-in defaults) and fold in CLI overrides.
fn load_config_with_overrides(args: &Args) -> AppConfig {
    let mut config = match &args.config {
        Some(path) => config::load_config(path).unwrap_or_else(|e| {
            tracing::warn!("Falling back to defaults: {e:#}");
            AppConfig::default()
        }),
        None => config::default_config_path()
            .filter(|p| p.exists())
            .and_then(|p| {
                config::load_config(&p)
                    .map_err(|e| tracing::warn!("Ignoring config at {:?}: {e:#}", p))
                    .ok()
            })
            .unwrap_or_default(),
    };

    if let Some(input) = &args.input {
        config.source.input_dir = Some(input.clone());
    }
    if let Some(output) = &args.output {
        config.pipeline.output_dir = Some(output.clone());
    }
    if let Some(path) = &args.detector_model {
        config.models.detector = path.clone();
    }
    if let Some(path) = &args.recognizer_model {
        config.models.recognizer = path.clone();
    }
    if let Some(interval) = args.interval_ms {
        config.pipeline.detect_interval_ms = interval;
    }

    config
}
