//! Persistent plate overlay
//!
//! Holds the last accepted plate reading and stamps it onto every outgoing
//! frame until a newer reading replaces it. The overlay is last-write-wins
//! and is never cleared automatically, so the plate stays visible across
//! frames where no inference ran at all.

use ab_glyph::FontRef;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::PathBuf;
use tracing::info;

use crate::capture::VideoFrame;
use crate::vision::BBox;

const BOX_COLOR: Rgba<u8> = Rgba([0, 230, 90, 255]);
const BOX_STROKE: i32 = 2;
const LABEL_SCALE: f32 = 18.0;

static FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// The last accepted plate reading
#[derive(Debug, Clone)]
pub struct PlateOverlay {
    pub text: String,
    /// Recognizer confidence, percent scale
    pub confidence: f32,
    /// Display-space box
    pub bbox: BBox,
}

impl PlateOverlay {
    /// Label rendered with the box, e.g. `NBC1234 (45%)`
    pub fn label(&self) -> String {
        format!("{} ({:.0}%)", self.text, self.confidence)
    }
}

/// Holds at most one overlay at a time; no history is kept.
#[derive(Debug, Default)]
pub struct OverlayState {
    current: Option<PlateOverlay>,
}

impl OverlayState {
    /// Replace the overlay atomically (all fields together).
    pub fn accept(&mut self, overlay: PlateOverlay) {
        self.current = Some(overlay);
    }

    pub fn current(&self) -> Option<&PlateOverlay> {
        self.current.as_ref()
    }
}

/// A frame with the overlay stamped in, ready for a sink
#[derive(Debug)]
pub struct AnnotatedFrame {
    pub frame: VideoFrame,
    /// Plate label, when an overlay is alive
    pub label: Option<String>,
}

/// Stroke the overlay box and draw its label into the frame's own pixel
/// buffer. The label sits just above the box, clamped to the frame edge.
pub fn render_onto(frame: &mut VideoFrame, overlay: &PlateOverlay) {
    if !frame.is_ready() {
        return;
    }
    let Some(mut img) =
        RgbaImage::from_raw(frame.width, frame.height, std::mem::take(&mut frame.data))
    else {
        return;
    };

    let w = (overlay.bbox.w.max(1.0)) as u32;
    let h = (overlay.bbox.h.max(1.0)) as u32;
    for inset in 0..BOX_STROKE {
        if w > 2 * inset as u32 && h > 2 * inset as u32 {
            let rect = Rect::at(overlay.bbox.x as i32 + inset, overlay.bbox.y as i32 + inset)
                .of_size(w - 2 * inset as u32, h - 2 * inset as u32);
            draw_hollow_rect_mut(&mut img, rect, BOX_COLOR);
        }
    }

    if let Ok(font) = FontRef::try_from_slice(FONT_DATA) {
        let text_x = overlay.bbox.x.max(0.0) as i32;
        let text_y = (overlay.bbox.y - LABEL_SCALE - 2.0).max(0.0) as i32;
        draw_text_mut(
            &mut img,
            BOX_COLOR,
            text_x,
            text_y,
            LABEL_SCALE,
            &font,
            &overlay.label(),
        );
    }

    frame.data = img.into_raw();
}

/// Destination for annotated frames
pub trait FrameSink: Send {
    fn publish(&mut self, frame: AnnotatedFrame) -> Result<()>;
}

/// Writes annotated frames as numbered PNGs into a directory
pub struct PngDirSink {
    dir: PathBuf,
    index: u64,
}

impl PngDirSink {
    pub fn create(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {:?}", dir))?;
        Ok(Self { dir, index: 0 })
    }
}

impl FrameSink for PngDirSink {
    fn publish(&mut self, annotated: AnnotatedFrame) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.index));
        self.index += 1;

        let img = RgbaImage::from_raw(
            annotated.frame.width,
            annotated.frame.height,
            annotated.frame.data,
        )
        .context("annotated frame buffer does not match its dimensions")?;
        img.save(&path)
            .with_context(|| format!("failed to write frame {:?}", path))?;

        if let Some(label) = annotated.label {
            info!("Wrote {:?} [{}]", path, label);
        }
        Ok(())
    }
}

/// Discards frames; used when no output directory is configured
pub struct NullSink;

impl FrameSink for NullSink {
    fn publish(&mut self, _frame: AnnotatedFrame) -> Result<()> {
        Ok(())
    }
}
