//! Video Capture Layer
//!
//! Abstracts the live video source behind a trait so the pipeline can run
//! against a camera feed, a recorded frame dump, or a synthetic source in
//! tests. The shipped implementation plays back a directory of still images
//! at a fixed rate.

pub mod frame;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::WalkDir;

pub use frame::VideoFrame;

const FRAME_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// A source of video frames. `next_frame` returns `None` when the source is
/// exhausted (a live camera never is; a directory source eventually is).
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>>;
}

/// Plays back a directory of still images in filename order, paced to a
/// target frame rate.
pub struct ImageDirSource {
    pending: VecDeque<PathBuf>,
    frame_delay: Duration,
}

impl ImageDirSource {
    /// Scan `dir` for image files and prepare them for paced playback.
    pub fn open(dir: &Path, fps: u32) -> Result<Self> {
        let mut files: Vec<PathBuf> = WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.path().to_path_buf())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            anyhow::bail!("no frame images found in {:?}", dir);
        }
        info!("Found {} frames in {:?}", files.len(), dir);

        let fps = fps.max(1);
        Ok(Self {
            pending: files.into(),
            frame_delay: Duration::from_secs(1) / fps,
        })
    }
}

#[async_trait]
impl FrameSource for ImageDirSource {
    async fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };

        tokio::time::sleep(self.frame_delay).await;

        let img = image::open(&path)
            .with_context(|| format!("failed to decode frame {:?}", path))?
            .into_rgba8();
        let (width, height) = img.dimensions();
        debug!("Loaded frame {:?} ({}x{})", path, width, height);

        Ok(Some(VideoFrame::new(img.into_raw(), width, height)))
    }
}
