//! Vision Layer
//!
//! Plate detection and text recognition on captured frames: tensor
//! preprocessing, ONNX inference, detection post-processing (decode,
//! threshold, NMS, selection), and OCR crop enhancement.

pub mod detector;
pub mod geometry;
pub mod models;
pub mod ocr;
pub mod ocr_preprocess;
pub mod preprocess;

pub use detector::{OnnxPlateDetector, PlateDetector};
pub use geometry::{BBox, Detection};
pub use ocr::{CtcRecognizer, Recognition, TextRecognizer};
pub use ocr_preprocess::PlateCrop;
