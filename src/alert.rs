//! Crowd alert policy and alert records.
//!
//! The policy itself is pure: a person count and a threshold decide
//! whether an alert fires and how severe it is. Record construction
//! stamps the wall-clock time and the fixed safety instructions; the
//! store appends records, never mutates them.

use chrono::Local;
use serde::Serialize;

use crate::Location;

/// Instructions attached to every alert, regardless of trigger path.
pub const SAFETY_INSTRUCTIONS: [&str; 5] = [
    "Please remain calm and follow the instructions of temple staff",
    "Move towards the nearest exit in an orderly manner",
    "Avoid pushing or rushing",
    "If you feel unwell, inform the nearest staff member",
    "Stay with your group and do not get separated",
];

/// Alert severity. High requires the count to STRICTLY exceed 1.5x the
/// threshold; the exact boundary stays Medium.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Severity {
    Medium,
    High,
}

/// Classify a person count against a threshold.
pub fn severity_for(count: u32, threshold: u32) -> Severity {
    if f64::from(count) > f64::from(threshold) * 1.5 {
        Severity::High
    } else {
        Severity::Medium
    }
}

/// Does this count trigger a crowd-density alert at all?
pub fn exceeds_threshold(count: u32, threshold: u32) -> bool {
    count > threshold
}

/// Structured detail block of an alert. Which fields are present depends
/// on the trigger path; absent fields are omitted from the JSON.
#[derive(Clone, Debug, Serialize)]
pub struct EventDetails {
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crowd_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_threshold: Option<u32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub severity: Severity,
}

/// One append-only alert log entry.
#[derive(Clone, Debug, Serialize)]
pub struct AlertRecord {
    pub time: String,
    pub message: String,
    pub event_details: EventDetails,
    pub safety_instructions: [&'static str; 5],
}

impl AlertRecord {
    /// Alert raised by the pipeline when a processed frame's person count
    /// exceeds the current threshold.
    pub fn crowd_density(location: &Location, count: u32, threshold: u32) -> Self {
        Self {
            time: timestamp(),
            message: format!(
                "High crowd density detected: {} people (threshold: {})",
                count, threshold
            ),
            event_details: EventDetails {
                location: location.display_name.clone(),
                crowd_count: Some(count),
                threshold: Some(threshold),
                old_threshold: None,
                new_threshold: None,
                kind: None,
                severity: severity_for(count, threshold),
            },
            safety_instructions: SAFETY_INSTRUCTIONS,
        }
    }

    /// Alert raised when a threshold change makes an existing count
    /// violate the new value.
    pub fn threshold_change(
        location: &Location,
        count: u32,
        old_threshold: u32,
        new_threshold: u32,
    ) -> Self {
        Self {
            time: timestamp(),
            message: format!(
                "Alert: Current crowd ({} people) exceeds new threshold ({})",
                count, new_threshold
            ),
            event_details: EventDetails {
                location: location.display_name.clone(),
                crowd_count: Some(count),
                threshold: None,
                old_threshold: Some(old_threshold),
                new_threshold: Some(new_threshold),
                kind: None,
                severity: severity_for(count, new_threshold),
            },
            safety_instructions: SAFETY_INSTRUCTIONS,
        }
    }

    /// Operator-initiated warning, raised regardless of counts.
    pub fn manual(location: &Location) -> Self {
        let time = timestamp();
        Self {
            message: format!("Manual warning sent for {} at {}", location.id, time),
            time,
            event_details: EventDetails {
                location: location.display_name.clone(),
                crowd_count: None,
                threshold: None,
                old_threshold: None,
                new_threshold: None,
                kind: Some("Manual Warning".to_string()),
                severity: Severity::Medium,
            },
            safety_instructions: SAFETY_INSTRUCTIONS,
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
