//! Application Configuration
//!
//! Pipeline settings and thresholds stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame source settings
    pub source: SourceSettings,
    /// Model file locations
    pub models: ModelSettings,
    /// Detector thresholds
    pub detection: DetectionSettings,
    /// OCR crop and acceptance settings
    pub ocr: OcrSettings,
    /// Scheduling settings
    pub pipeline: PipelineSettings,
}

/// Frame source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Directory of frame images to play back, or None until set via CLI
    pub input_dir: Option<PathBuf>,
    /// Playback rate for the directory source
    pub fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            input_dir: None,
            fps: 30,
        }
    }
}

/// Model file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Plate detection model (YOLO-style single-class detector)
    pub detector: PathBuf,
    /// Text recognition model (CRNN with CTC output)
    pub recognizer: PathBuf,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            detector: PathBuf::from("models/plate-det.onnx"),
            recognizer: PathBuf::from("models/plate-rec.onnx"),
        }
    }
}

/// Detector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum candidate confidence to keep a box
    pub confidence_threshold: f32,
    /// IoU threshold for non-maximum suppression
    pub iou_threshold: f32,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.35,
            iou_threshold: 0.45,
        }
    }
}

/// OCR crop enhancement and acceptance settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Minimum cleaned text length for an accepted plate
    pub min_text_len: usize,
    /// Minimum recognizer confidence (percent scale) for an accepted plate
    pub min_confidence: f32,
    /// Crops narrower than this are upscaled before recognition
    pub min_crop_width: u32,
    /// Crops shorter than this are upscaled before recognition
    pub min_crop_height: u32,
    /// Upscale factor applied to small crops
    pub upscale_factor: f32,
    /// Contrast factor for the first enhancement pass
    pub contrast_boost: f32,
    /// Brightness delta for the first enhancement pass
    pub brightness_boost: f32,
    /// Contrast factor for the second enhancement pass
    pub final_contrast: f32,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            min_text_len: 5,
            min_confidence: 30.0,
            min_crop_width: 180,
            min_crop_height: 60,
            upscale_factor: 1.8,
            contrast_boost: 1.4,
            brightness_boost: 16.0,
            final_contrast: 1.2,
        }
    }
}

/// Scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Minimum milliseconds between heavy detect+OCR cycles
    pub detect_interval_ms: u64,
    /// Where annotated frames are written, or None for no frame output
    pub output_dir: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            detect_interval_ms: 1200,
            output_dir: None,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let config: AppConfig =
        toml::from_str(&content).with_context(|| format!("invalid config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config file {:?}", path))?;
    Ok(())
}

/// Default config location (`<config dir>/platewatch/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "platewatch")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
