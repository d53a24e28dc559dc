//! Crowdwatch - crowd density monitoring kernel.
//!
//! This crate turns a live video stream into a bounded, thread-safe,
//! consumable monitoring state: the latest annotated frame, current
//! per-class object counts, and a threshold-based crowd alert log.
//!
//! # Architecture
//!
//! - `ingest`: frame sources (synthetic `stub://` streams, GStreamer behind
//!   the `stream-gstreamer` feature)
//! - `detect`: detector backends, raw-output post-processing (confidence
//!   filtering, box math, overlap suppression)
//! - `pipeline`: the frame processor loop (sample, detect, count, alert,
//!   annotate, publish)
//! - `state`: the shared monitor state read by consumers and written by the
//!   pipeline
//! - `alert`: the crowd alert policy and alert records
//! - `api`: a thin HTTP adapter exposing the monitor state
//!
//! Data flows one way: source -> pipeline -> state -> consumers. The
//! pipeline is the only writer of counts and frames; threshold changes and
//! manual alerts are the only external writes, and both go through
//! `MonitorState`.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub mod alert;
pub mod annotate;
pub mod api;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod state;

pub use alert::{AlertRecord, Severity, SAFETY_INSTRUCTIONS};
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectorBackend, NormalizedBox, RawCandidate,
    StubBackend,
};
pub use frame::{Frame, FrameBuffer, DEFAULT_FRAME_CAPACITY};
pub use ingest::{FrameSource, StreamConfig, StreamSource};
pub use pipeline::{FrameProcessor, PipelineConfig, ReconnectPolicy};
pub use state::{CountSnapshot, MonitorState};

/// A monitored location. The registry is fixed at startup; locations are
/// never added or removed while the pipeline runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Stable identifier used in API paths, e.g. "loc:tirumala".
    pub id: String,
    /// Human-readable name used in alert messages, e.g. "Tirumala Temple".
    pub display_name: String,
}

impl Location {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Result<Self> {
        let id = id.into();
        validate_location_id(&id)?;
        Ok(Self {
            id: id.to_lowercase(),
            display_name: display_name.into(),
        })
    }
}

/// A conforming location id is a local identifier, not free-form text.
/// We enforce a positive allowlist pattern to keep API paths and alert
/// bookkeeping unambiguous.
///
/// Allowed: "loc:tirumala", "loc:east_gate", "loc:lot-b"
/// Disallowed: anything with whitespace, slashes, or punctuation outside [_-].
pub fn validate_location_id(id: &str) -> Result<()> {
    // Compile once for hot paths.
    static LOCATION_ID_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = LOCATION_ID_RE.get_or_init(|| regex::Regex::new(r"^loc:[a-z0-9_-]{1,64}$").unwrap());

    let lowered = id.to_lowercase();
    if !re.is_match(&lowered) {
        return Err(anyhow!(
            "location id must match ^loc:[a-z0-9_-]{{1,64}}$, got '{}'",
            id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_ids_follow_allowlist() {
        assert!(validate_location_id("loc:tirumala").is_ok());
        assert!(validate_location_id("LOC:Tirumala").is_ok());
        assert!(validate_location_id("loc:east_gate-2").is_ok());

        assert!(validate_location_id("tirumala").is_err());
        assert!(validate_location_id("loc:").is_err());
        assert!(validate_location_id("loc:two words").is_err());
        assert!(validate_location_id("loc:a/b").is_err());
    }

    #[test]
    fn location_new_lowercases_id() {
        let loc = Location::new("LOC:Tirumala", "Tirumala Temple").unwrap();
        assert_eq!(loc.id, "loc:tirumala");
        assert_eq!(loc.display_name, "Tirumala Temple");
    }
}
