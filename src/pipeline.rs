//! The frame processor: the long-lived worker that turns a stream into
//! monitor state.
//!
//! One iteration pulls a frame, keeps every Nth one, resizes it to the
//! canonical detection resolution, runs the detector, post-processes
//! candidates, updates counts and alerts, annotates, and publishes the
//! frame to the bounded buffer. Per-frame failures are logged and
//! skipped; stream failures go through a bounded reconnect with
//! exponential backoff before the worker gives up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};

use crate::annotate;
use crate::detect::{select_candidates, suppress_overlaps, DetectorBackend, SUPPRESSION_THRESHOLD};
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::state::{snapshot_from_detections, MonitorState};

/// Reconnect policy applied when the stream ends or fails.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    /// Attempts before the worker gives up. Zero disables reconnection.
    pub max_retries: u32,
    /// Delay before the first attempt; doubles per attempt.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_retries: 6,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Frame processor configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Location the processed counts and alerts belong to.
    pub location_id: String,
    /// Keep one frame out of every `sample_interval`.
    pub sample_interval: u64,
    /// Canonical detection width.
    pub width: u32,
    /// Canonical detection height.
    pub height: u32,
    /// IoU above which overlapping boxes are deduplicated.
    pub suppression_threshold: f32,
    /// Sleep after each processed frame.
    pub pace: Duration,
    pub reconnect: ReconnectPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            location_id: "loc:tirumala".to_string(),
            sample_interval: 6,
            width: 1020,
            height: 600,
            suppression_threshold: SUPPRESSION_THRESHOLD,
            pace: Duration::from_millis(100),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// The pipeline worker. Owns the source for its lifetime; shares the
/// detector backend and the monitor state.
pub struct FrameProcessor {
    source: Box<dyn FrameSource>,
    backend: Arc<Mutex<dyn DetectorBackend>>,
    state: Arc<MonitorState>,
    config: PipelineConfig,
    stop: Arc<AtomicBool>,
    frame_count: u64,
}

impl FrameProcessor {
    pub fn new(
        source: Box<dyn FrameSource>,
        backend: Arc<Mutex<dyn DetectorBackend>>,
        state: Arc<MonitorState>,
        config: PipelineConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            backend,
            state,
            config,
            stop,
            frame_count: 0,
        }
    }

    /// Run until the stream is exhausted (reconnects included) or the stop
    /// flag is raised. Consumes the processor; the source is released
    /// exactly once on the way out.
    pub fn run(mut self) -> Result<()> {
        info!(
            "pipeline: starting for {} (sample 1/{}, canonical {}x{})",
            self.config.location_id, self.config.sample_interval, self.config.width, self.config.height
        );
        self.state.set_pipeline_live(true);

        while !self.stop.load(Ordering::SeqCst) {
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    self.handle_frame(frame);
                }
                Ok(None) => {
                    info!("pipeline: stream ended");
                    if !self.reconnect() {
                        break;
                    }
                }
                Err(err) => {
                    warn!("pipeline: stream failure: {:#}", err);
                    if !self.reconnect() {
                        break;
                    }
                }
            }
        }

        self.state.set_pipeline_live(false);
        // Release the source exactly once, on the way out.
        if let Err(err) = self.source.stop() {
            warn!("pipeline: source release failed: {:#}", err);
        }
        info!(
            "pipeline: stopped after {} frames ({} delivered by source)",
            self.frame_count,
            self.source.stats().frames_delivered
        );
        Ok(())
    }

    /// Count the frame, process it if it lands on the sampling interval.
    fn handle_frame(&mut self, frame: Frame) {
        self.frame_count += 1;
        if self.frame_count % self.config.sample_interval != 0 {
            return;
        }
        if let Err(err) = self.process(frame) {
            warn!(
                "pipeline: frame {} dropped: {:#}",
                self.frame_count, err
            );
        }
        // Deliberate pacing: detection output does not need to outrun
        // consumers, and this keeps CPU usage bounded.
        thread::sleep(self.config.pace);
    }

    fn process(&mut self, frame: Frame) -> Result<()> {
        let mut canonical = frame.resize(self.config.width, self.config.height)?;

        let candidates = {
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| anyhow!("detector backend lock poisoned"))?;
            backend
                .detect(canonical.pixels(), canonical.width(), canonical.height())
                .context("detection failed")?
        };

        let detections = suppress_overlaps(
            select_candidates(&candidates, canonical.width(), canonical.height()),
            self.config.suppression_threshold,
        );
        let counts = snapshot_from_detections(&detections);

        let fired = self
            .state
            .record_observation(&self.config.location_id, counts.clone())?;
        if let Some(alert) = fired {
            warn!(
                "pipeline: crowd alert for {}: {}",
                self.config.location_id, alert.message
            );
        }

        annotate::draw_detections(&mut canonical, &detections);
        annotate::draw_counts(&mut canonical, &counts, self.state.threshold()?);

        if self.state.publish_frame(canonical)? {
            debug!("pipeline: frame buffer full, dropped oldest");
        }
        Ok(())
    }

    /// Bounded reconnect with exponential backoff. Marks the pipeline
    /// degraded while retrying; returns true once a frame flows again.
    fn reconnect(&mut self) -> bool {
        self.state.set_pipeline_live(false);
        let policy = self.config.reconnect.clone();
        let mut delay = policy.base_delay;

        for attempt in 1..=policy.max_retries {
            if self.stop.load(Ordering::SeqCst) {
                return false;
            }
            info!(
                "pipeline: reconnect attempt {}/{} in {:?}",
                attempt, policy.max_retries, delay
            );
            thread::sleep(delay);
            delay = (delay * 2).min(policy.max_delay);

            if let Err(err) = self.source.connect() {
                warn!("pipeline: reconnect failed: {:#}", err);
                continue;
            }
            if !self.source.is_healthy() {
                warn!("pipeline: source still unhealthy after reconnect");
                continue;
            }
            // Probe for an actual frame; a source that reconnects but
            // delivers nothing has not recovered.
            match self.source.next_frame() {
                Ok(Some(frame)) => {
                    info!("pipeline: stream recovered on attempt {}", attempt);
                    self.state.set_pipeline_live(true);
                    self.handle_frame(frame);
                    return true;
                }
                Ok(None) => warn!("pipeline: reconnected stream is still exhausted"),
                Err(err) => warn!("pipeline: reconnected stream failed: {:#}", err),
            }
        }
        warn!(
            "pipeline: giving up after {} reconnect attempts",
            policy.max_retries
        );
        false
    }
}
