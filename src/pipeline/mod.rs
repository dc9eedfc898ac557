//! Frame-processing pipeline
//!
//! Two interleaved cadences on one loop: every frame is annotated with the
//! current overlay and published, while the expensive detect+OCR path runs
//! at most once per throttle interval as a detached task. A new heavy cycle
//! supersedes any still-pending one, so a stale recognition can never
//! overwrite a newer accepted plate.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{FrameSource, VideoFrame};
use crate::config::{OcrSettings, PipelineSettings};
use crate::overlay::{AnnotatedFrame, FrameSink, OverlayState, PlateOverlay};
use crate::vision::ocr::{meets_acceptance, sanitize_plate_text};
use crate::vision::ocr_preprocess::{crop_region, enhance_for_ocr};
use crate::vision::{PlateDetector, TextRecognizer};

/// Monotonic gate for the heavy path: ready at most once per interval.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when the interval has elapsed since the last successful gate
    /// pass; records `now` as the new reference point when it has.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// The plate scanning pipeline. Detector and recognizer are injected so
/// tests can run against fakes.
pub struct ScanPipeline {
    detector: Arc<dyn PlateDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    overlay: Arc<RwLock<OverlayState>>,
    ocr_settings: OcrSettings,
    throttle: Throttle,
    inflight: Option<(CancellationToken, JoinHandle<()>)>,
}

impl ScanPipeline {
    pub fn new(
        detector: Arc<dyn PlateDetector>,
        recognizer: Arc<dyn TextRecognizer>,
        ocr_settings: OcrSettings,
        pipeline_settings: &PipelineSettings,
    ) -> Self {
        Self {
            detector,
            recognizer,
            overlay: Arc::new(RwLock::new(OverlayState::default())),
            ocr_settings,
            throttle: Throttle::new(Duration::from_millis(pipeline_settings.detect_interval_ms)),
            inflight: None,
        }
    }

    /// Shared handle to the overlay state (read side for UIs and tests).
    pub fn overlay_handle(&self) -> Arc<RwLock<OverlayState>> {
        self.overlay.clone()
    }

    /// Drive the pipeline until the source is exhausted.
    pub async fn run(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
    ) -> Result<()> {
        loop {
            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!("Frame source error: {e:#}");
                    continue;
                }
            };
            if !frame.is_ready() {
                debug!("Skipping unready frame");
                continue;
            }

            if self.throttle.ready(Instant::now()) {
                self.spawn_cycle(frame.clone());
            }

            self.publish(frame, sink);
        }

        // Let the final cycle land before teardown
        if let Some((_, handle)) = self.inflight.take() {
            let _ = handle.await;
        }
        self.recognizer
            .shutdown()
            .await
            .context("recognizer teardown failed")?;
        Ok(())
    }

    /// Redraw path: stamp the current overlay into the frame and hand it to
    /// the sink. Runs every frame whether or not an inference cycle did.
    fn publish(&self, mut frame: VideoFrame, sink: &mut dyn FrameSink) {
        let label = {
            let overlay = self.overlay.read();
            overlay.current().map(|o| {
                crate::overlay::render_onto(&mut frame, o);
                o.label()
            })
        };
        if let Err(e) = sink.publish(AnnotatedFrame { frame, label }) {
            warn!("Frame sink error: {e:#}");
        }
    }

    /// Start a detached heavy cycle, superseding any still-pending one.
    fn spawn_cycle(&mut self, frame: VideoFrame) {
        if let Some((token, _)) = self.inflight.take() {
            token.cancel();
        }
        let token = CancellationToken::new();

        let detector = self.detector.clone();
        let recognizer = self.recognizer.clone();
        let overlay = self.overlay.clone();
        let settings = self.ocr_settings.clone();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) =
                run_cycle(detector, recognizer, overlay, settings, frame, task_token).await
            {
                // Next scheduled cycle retries naturally
                warn!("Detection cycle failed: {e:#}");
            }
        });
        self.inflight = Some((token, handle));
    }
}

/// One heavy cycle: detect, crop, enhance, recognize, and (if accepted and
/// not superseded) overwrite the overlay.
async fn run_cycle(
    detector: Arc<dyn PlateDetector>,
    recognizer: Arc<dyn TextRecognizer>,
    overlay: Arc<RwLock<OverlayState>>,
    settings: OcrSettings,
    frame: VideoFrame,
    token: CancellationToken,
) -> Result<()> {
    let detection = {
        let detector = detector.clone();
        let frame = frame.clone();
        tokio::task::spawn_blocking(move || detector.detect(&frame))
            .await
            .context("detection task panicked")??
    };

    let Some(detection) = detection else {
        debug!("No plate above threshold this cycle");
        return Ok(());
    };

    let Some(mut crop) = crop_region(&frame, &detection.bbox) else {
        debug!("Detected box produced an empty crop");
        return Ok(());
    };
    enhance_for_ocr(&mut crop, &settings);

    let recognition = recognizer.recognize(&crop).await?;

    let text = sanitize_plate_text(&recognition.text);
    if !meets_acceptance(&text, recognition.confidence, &settings) {
        debug!(
            "Rejected reading {:?} ({:.1}%)",
            text, recognition.confidence
        );
        return Ok(());
    }

    // Cancellation is checked under the write lock: the superseding cycle
    // cancels this token before it can run, so observing an uncancelled
    // token here means the newer cycle has not written yet.
    let mut state = overlay.write();
    if token.is_cancelled() {
        debug!("Cycle superseded; discarding recognition result");
        return Ok(());
    }
    info!(
        plate = %text,
        confidence = recognition.confidence,
        "Accepted plate reading"
    );
    state.accept(PlateOverlay {
        text,
        confidence: recognition.confidence,
        bbox: detection.bbox,
    });

    Ok(())
}
