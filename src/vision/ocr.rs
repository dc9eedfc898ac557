//! Text recognition
//!
//! The recognizer is an injected collaborator: an async trait over "image
//! in, text + confidence out", with a CRNN/CTC ONNX implementation shipped.
//! Raw engine output is sanitized to the plate alphabet and gated by the
//! acceptance rules before it may reach the overlay.

use anyhow::{Context, Result};
use async_trait::async_trait;
use image::{imageops::FilterType, RgbaImage};
use ndarray::Array4;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::OcrSettings;
use crate::vision::models::{ModelError, OnnxSession};
use crate::vision::ocr_preprocess::PlateCrop;

/// Characters a plate reading may contain, in CTC dictionary order.
/// Index 0 of the model vocabulary is the CTC blank token.
pub const PLATE_CHARSET: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789- ";

/// Fixed input height of the recognition model
const REC_INPUT_HEIGHT: u32 = 48;
/// Maximum input width of the recognition model
const REC_MAX_WIDTH: u32 = 320;

/// A raw recognition result. Confidence is on a 0-100 percent scale.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

/// Asynchronous text recognition engine
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, crop: &PlateCrop) -> Result<Recognition>;

    /// Release engine resources. Called exactly once at pipeline teardown.
    async fn shutdown(&self) -> Result<()>;
}

/// Uppercase, strip everything outside the plate alphabet, and trim.
/// Uppercasing first means a recognizer that leaks lowercase cannot
/// silently lose characters.
pub fn sanitize_plate_text(raw: &str) -> String {
    raw.to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || *c == '-' || *c == ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Acceptance gate for overwriting the overlay: enough cleaned characters
/// and enough engine confidence (percent scale).
pub fn meets_acceptance(cleaned: &str, confidence: f32, settings: &OcrSettings) -> bool {
    cleaned.len() >= settings.min_text_len && confidence >= settings.min_confidence
}

/// CRNN text recognizer with greedy CTC decoding over the plate charset
pub struct CtcRecognizer {
    session: Arc<Mutex<OnnxSession>>,
    keys: Vec<char>,
}

impl CtcRecognizer {
    pub fn load(model_path: &Path) -> Result<Self> {
        // Blank token at index 0, then the plate alphabet
        let mut keys = vec!['\0'];
        keys.extend(PLATE_CHARSET.chars());

        Ok(Self {
            session: Arc::new(Mutex::new(OnnxSession::load(model_path)?)),
            keys,
        })
    }

    /// Resize the crop to the model's fixed height (width proportional,
    /// capped), normalize `(x / 255 - 0.5) / 0.5`, and lay out as NCHW.
    fn crop_to_tensor(&self, crop: &PlateCrop) -> Result<Array4<f32>> {
        let img = RgbaImage::from_raw(crop.width, crop.height, crop.data.clone())
            .context("crop buffer does not match its dimensions")?;

        let scale = REC_INPUT_HEIGHT as f32 / crop.height as f32;
        let new_width = ((crop.width as f32 * scale) as u32)
            .clamp(1, REC_MAX_WIDTH);
        let resized = image::imageops::resize(&img, new_width, REC_INPUT_HEIGHT, FilterType::Triangle);

        let (w, h) = (new_width as usize, REC_INPUT_HEIGHT as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));
        let raw = resized.as_raw();

        for idx in 0..w * h {
            let px = idx * 4;
            for c in 0..3 {
                tensor[[0, c, idx / w, idx % w]] = (raw[px + c] as f32 / 255.0 - 0.5) / 0.5;
            }
        }

        Ok(tensor)
    }
}

#[async_trait]
impl TextRecognizer for CtcRecognizer {
    async fn recognize(&self, crop: &PlateCrop) -> Result<Recognition> {
        let tensor = self.crop_to_tensor(crop)?;

        // Inference is CPU-bound; keep it off the async workers
        let session = self.session.clone();
        let (shape, data) = tokio::task::spawn_blocking(move || session.lock().run_f32(&tensor))
            .await
            .context("recognition task panicked")??;

        if shape.len() != 3 || shape[0] != 1 {
            return Err(ModelError::UnexpectedShape {
                expected: "[1, T, V]",
                actual: shape,
            }
            .into());
        }
        let timesteps = shape[1] as usize;
        let vocab_size = shape[2] as usize;

        let recognition = decode_ctc(&data, timesteps, vocab_size, &self.keys);
        debug!(
            "CTC decode: {:?} ({:.1}%)",
            recognition.text, recognition.confidence
        );
        Ok(recognition)
    }

    async fn shutdown(&self) -> Result<()> {
        // The ort session frees its resources on drop; nothing extra held.
        Ok(())
    }
}

/// Greedy CTC decode: per-timestep argmax, skipping blanks (index 0) and
/// repeated indices. Confidence is the mean probability of the emitted
/// characters on a percent scale.
pub fn decode_ctc(data: &[f32], timesteps: usize, vocab_size: usize, keys: &[char]) -> Recognition {
    let mut text = String::new();
    let mut char_scores: Vec<f32> = Vec::new();
    let mut last_index = 0usize;

    for t in 0..timesteps {
        let row = &data[t * vocab_size..(t + 1) * vocab_size];
        let mut max_index = 0usize;
        let mut max_value = f32::NEG_INFINITY;
        for (i, v) in row.iter().enumerate() {
            if *v > max_value {
                max_value = *v;
                max_index = i;
            }
        }

        if max_index > 0 && max_index < keys.len() && !(t > 0 && max_index == last_index) {
            text.push(keys[max_index]);
            char_scores.push(max_value);
        }
        last_index = max_index;
    }

    let confidence = if char_scores.is_empty() {
        0.0
    } else {
        char_scores.iter().sum::<f32>() / char_scores.len() as f32 * 100.0
    };

    Recognition { text, confidence }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_invalid_characters() {
        assert_eq!(sanitize_plate_text("NBC*12!34"), "NBC1234");
        assert_eq!(sanitize_plate_text("  AB-12 CD  "), "AB-12 CD");
    }

    #[test]
    fn test_sanitize_uppercases_before_filtering() {
        // Lowercase engine output must survive as uppercase, not vanish
        assert_eq!(sanitize_plate_text("ab-12 cd!"), "AB-12 CD");
    }

    #[test]
    fn test_sanitize_empty_and_symbol_only() {
        assert_eq!(sanitize_plate_text("!!@@##"), "");
        assert_eq!(sanitize_plate_text(""), "");
    }

    #[test]
    fn test_acceptance_rules() {
        let settings = OcrSettings::default();
        assert!(meets_acceptance("NBC1234", 45.0, &settings));
        assert!(!meets_acceptance("AB12", 99.0, &settings)); // too short
        assert!(!meets_acceptance("NBC1234", 29.9, &settings)); // too uncertain
        assert!(meets_acceptance("AB-12", 30.0, &settings)); // boundary values pass
    }

    fn test_keys() -> Vec<char> {
        let mut keys = vec!['\0'];
        keys.extend(PLATE_CHARSET.chars());
        keys
    }

    /// Build a [T, V] probability buffer where each timestep puts `p` on
    /// one vocabulary index and spreads the rest.
    fn logits(steps: &[(usize, f32)], vocab_size: usize) -> Vec<f32> {
        let mut data = vec![0.001f32; steps.len() * vocab_size];
        for (t, (index, p)) in steps.iter().enumerate() {
            data[t * vocab_size + index] = *p;
        }
        data
    }

    #[test]
    fn test_ctc_collapses_blanks_and_repeats() {
        let keys = test_keys();
        let vocab = keys.len();
        // A A <blank> B B -> "AB"
        let a = 1; // 'A'
        let b = 2; // 'B'
        let data = logits(&[(a, 0.9), (a, 0.9), (0, 0.9), (b, 0.8), (b, 0.8)], vocab);

        let rec = decode_ctc(&data, 5, vocab, &keys);
        assert_eq!(rec.text, "AB");
    }

    #[test]
    fn test_ctc_blank_separates_repeated_characters() {
        let keys = test_keys();
        let vocab = keys.len();
        let a = 1;
        // A <blank> A -> "AA"
        let data = logits(&[(a, 0.9), (0, 0.9), (a, 0.9)], vocab);
        let rec = decode_ctc(&data, 3, vocab, &keys);
        assert_eq!(rec.text, "AA");
    }

    #[test]
    fn test_ctc_confidence_is_mean_percent() {
        let keys = test_keys();
        let vocab = keys.len();
        let a = 1;
        let b = 2;
        let data = logits(&[(a, 0.8), (b, 0.6)], vocab);

        let rec = decode_ctc(&data, 2, vocab, &keys);
        assert!((rec.confidence - 70.0).abs() < 0.01);
    }

    #[test]
    fn test_ctc_all_blank_yields_empty() {
        let keys = test_keys();
        let vocab = keys.len();
        let data = logits(&[(0, 0.99), (0, 0.99)], vocab);

        let rec = decode_ctc(&data, 2, vocab, &keys);
        assert!(rec.text.is_empty());
        assert_eq!(rec.confidence, 0.0);
    }
}
