//! Shared monitor state: the single authoritative holder of counts,
//! alerts, threshold, pending frames, and pipeline liveness.
//!
//! The pipeline is the only writer of counts and frames. Consumers read
//! through `Arc<MonitorState>`; threshold changes and manual alerts are
//! the only externally-initiated writes. Every count update swaps in a
//! complete snapshot so readers never observe a partially-updated map.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};

use crate::alert::{exceeds_threshold, AlertRecord};
use crate::detect::Detection;
use crate::frame::{Frame, FrameBuffer};
use crate::Location;

/// Per-class object counts for one processed frame. Classes with zero
/// detections are absent by construction.
pub type CountSnapshot = BTreeMap<String, u32>;

/// Default crowd threshold (people) above which alerts fire.
pub const DEFAULT_THRESHOLD: u32 = 50;

/// Per-location alert history cap; the oldest record is dropped when the
/// ring is full.
pub const MAX_ALERTS_PER_LOCATION: usize = 256;

/// Build a count snapshot from the surviving detections of one frame.
pub fn snapshot_from_detections(detections: &[Detection]) -> CountSnapshot {
    let mut counts = CountSnapshot::new();
    for detection in detections {
        *counts.entry(detection.label.to_string()).or_insert(0) += 1;
    }
    counts
}

struct LocationEntry {
    location: Location,
    counts: CountSnapshot,
    alerts: VecDeque<AlertRecord>,
}

impl LocationEntry {
    fn push_alert(&mut self, record: AlertRecord) {
        while self.alerts.len() >= MAX_ALERTS_PER_LOCATION {
            self.alerts.pop_front();
        }
        self.alerts.push_back(record);
    }
}

struct StateInner {
    threshold: u32,
    locations: BTreeMap<String, LocationEntry>,
}

/// Thread-safe monitoring state shared between the pipeline, the API
/// server, and the daemon supervisor.
pub struct MonitorState {
    inner: Mutex<StateInner>,
    frames: Mutex<FrameBuffer>,
    pipeline_live: AtomicBool,
}

impl MonitorState {
    pub fn new(locations: Vec<Location>, threshold: u32, frame_capacity: usize) -> Self {
        let mut map = BTreeMap::new();
        for location in locations {
            map.insert(
                location.id.clone(),
                LocationEntry {
                    location,
                    counts: CountSnapshot::new(),
                    alerts: VecDeque::new(),
                },
            );
        }
        Self {
            inner: Mutex::new(StateInner {
                threshold,
                locations: map,
            }),
            frames: Mutex::new(FrameBuffer::new(frame_capacity)),
            pipeline_live: AtomicBool::new(false),
        }
    }

    /// Record one processed frame's counts for a location and evaluate the
    /// crowd policy. Returns the alert that fired, if any.
    pub fn record_observation(
        &self,
        location_id: &str,
        counts: CountSnapshot,
    ) -> Result<Option<AlertRecord>> {
        let mut inner = self.lock_inner()?;
        let threshold = inner.threshold;
        let entry = inner
            .locations
            .get_mut(location_id)
            .ok_or_else(|| anyhow!("unknown location '{}'", location_id))?;

        let person_count = counts.get("person").copied().unwrap_or(0);
        entry.counts = counts;

        if exceeds_threshold(person_count, threshold) {
            let record = AlertRecord::crowd_density(&entry.location, person_count, threshold);
            entry.push_alert(record.clone());
            return Ok(Some(record));
        }
        Ok(None)
    }

    /// Latest counts for a location.
    pub fn current_counts(&self, location_id: &str) -> Result<CountSnapshot> {
        let inner = self.lock_inner()?;
        inner
            .locations
            .get(location_id)
            .map(|entry| entry.counts.clone())
            .ok_or_else(|| anyhow!("unknown location '{}'", location_id))
    }

    /// Ordered alert history for a location, oldest first.
    pub fn alerts(&self, location_id: &str) -> Result<Vec<AlertRecord>> {
        let inner = self.lock_inner()?;
        inner
            .locations
            .get(location_id)
            .map(|entry| entry.alerts.iter().cloned().collect())
            .ok_or_else(|| anyhow!("unknown location '{}'", location_id))
    }

    pub fn threshold(&self) -> Result<u32> {
        Ok(self.lock_inner()?.threshold)
    }

    /// Replace the global threshold and re-evaluate every location's
    /// latest person count against the new value. Returns the alerts that
    /// fired during re-evaluation.
    pub fn set_threshold(&self, new_threshold: u32) -> Result<Vec<AlertRecord>> {
        let mut inner = self.lock_inner()?;
        let old_threshold = inner.threshold;
        inner.threshold = new_threshold;

        let mut fired = Vec::new();
        for entry in inner.locations.values_mut() {
            let person_count = entry.counts.get("person").copied().unwrap_or(0);
            if exceeds_threshold(person_count, new_threshold) {
                let record = AlertRecord::threshold_change(
                    &entry.location,
                    person_count,
                    old_threshold,
                    new_threshold,
                );
                entry.push_alert(record.clone());
                fired.push(record);
            }
        }
        Ok(fired)
    }

    /// Append a manual warning for a location, regardless of counts.
    pub fn raise_manual_alert(&self, location_id: &str) -> Result<AlertRecord> {
        let mut inner = self.lock_inner()?;
        let entry = inner
            .locations
            .get_mut(location_id)
            .ok_or_else(|| anyhow!("unknown location '{}'", location_id))?;
        let record = AlertRecord::manual(&entry.location);
        entry.push_alert(record.clone());
        Ok(record)
    }

    /// Hand an annotated frame to the bounded buffer (drop-oldest).
    pub fn publish_frame(&self, frame: Frame) -> Result<bool> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| anyhow!("frame buffer lock poisoned"))?;
        Ok(frames.push(frame))
    }

    /// Pop the oldest pending annotated frame. None means nothing is
    /// waiting, which is a normal state for consumers to poll through.
    pub fn pop_frame(&self) -> Result<Option<Frame>> {
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| anyhow!("frame buffer lock poisoned"))?;
        Ok(frames.pop())
    }

    pub fn pending_frames(&self) -> Result<usize> {
        let frames = self
            .frames
            .lock()
            .map_err(|_| anyhow!("frame buffer lock poisoned"))?;
        Ok(frames.len())
    }

    /// Liveness flag set by the pipeline: true while frames are flowing,
    /// false while reconnecting or after the worker has stopped.
    pub fn set_pipeline_live(&self, live: bool) {
        self.pipeline_live.store(live, Ordering::SeqCst);
    }

    pub fn pipeline_live(&self) -> bool {
        self.pipeline_live.load(Ordering::SeqCst)
    }

    /// Configured location ids, sorted.
    pub fn location_ids(&self) -> Result<Vec<String>> {
        Ok(self.lock_inner()?.locations.keys().cloned().collect())
    }

    fn lock_inner(&self) -> Result<std::sync::MutexGuard<'_, StateInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow!("monitor state lock poisoned"))
    }
}
