//! Daemon configuration: JSON config file, environment overrides, then
//! validation. Every field has a default so a bare `crowdwatchd` run
//! works against the synthetic stream.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::state::DEFAULT_THRESHOLD;
use crate::Location;

const DEFAULT_API_ADDR: &str = "127.0.0.1:8890";
const DEFAULT_STREAM_URL: &str = "stub://camera";
const DEFAULT_SAMPLE_INTERVAL: u64 = 6;
const DEFAULT_CANONICAL_WIDTH: u32 = 1020;
const DEFAULT_CANONICAL_HEIGHT: u32 = 600;
const DEFAULT_FRAME_CAPACITY: usize = 10;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_LOCATION_ID: &str = "loc:tirumala";
const DEFAULT_LOCATION_NAME: &str = "Tirumala Temple";

#[derive(Debug, Deserialize, Default)]
struct CrowdwatchConfigFile {
    api: Option<ApiConfigFile>,
    stream: Option<StreamConfigFile>,
    detector: Option<DetectorConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    threshold: Option<u32>,
    locations: Option<Vec<LocationConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    sample_interval: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    frame_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct LocationConfigFile {
    id: String,
    display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CrowdwatchConfig {
    pub api_addr: String,
    pub stream: StreamSettings,
    pub detector: DetectorSettings,
    pub pipeline: PipelineSettings,
    pub threshold: u32,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sample_interval: u64,
    pub width: u32,
    pub height: u32,
    pub frame_capacity: usize,
}

impl CrowdwatchConfig {
    /// Load configuration: explicit path, else `CROWDWATCH_CONFIG`, else
    /// defaults; then environment overrides; then validation.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("CROWDWATCH_CONFIG").ok();
        let file_cfg = match explicit_path {
            Some(path) => Some(read_config_file(path)?),
            None => match env_path.as_deref() {
                Some(path) => Some(read_config_file(Path::new(path))?),
                None => None,
            },
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: CrowdwatchConfigFile) -> Result<Self> {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let stream = StreamSettings {
            url: file
                .stream
                .as_ref()
                .and_then(|stream| stream.url.clone())
                .unwrap_or_else(|| DEFAULT_STREAM_URL.to_string()),
            width: file
                .stream
                .as_ref()
                .and_then(|stream| stream.width)
                .unwrap_or(DEFAULT_CANONICAL_WIDTH),
            height: file
                .stream
                .and_then(|stream| stream.height)
                .unwrap_or(DEFAULT_CANONICAL_HEIGHT),
        };
        let detector = DetectorSettings {
            backend: file
                .detector
                .as_ref()
                .and_then(|detector| detector.backend.clone())
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            model_path: file.detector.and_then(|detector| detector.model_path),
        };
        let pipeline = PipelineSettings {
            sample_interval: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.sample_interval)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL),
            width: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.width)
                .unwrap_or(DEFAULT_CANONICAL_WIDTH),
            height: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.height)
                .unwrap_or(DEFAULT_CANONICAL_HEIGHT),
            frame_capacity: file
                .pipeline
                .and_then(|pipeline| pipeline.frame_capacity)
                .unwrap_or(DEFAULT_FRAME_CAPACITY),
        };
        let threshold = file.threshold.unwrap_or(DEFAULT_THRESHOLD);
        let locations = match file.locations {
            Some(entries) => entries
                .into_iter()
                .map(|entry| {
                    let display = entry
                        .display_name
                        .unwrap_or_else(|| display_name_from_id(&entry.id));
                    Location::new(entry.id, display)
                })
                .collect::<Result<Vec<_>>>()?,
            None => vec![Location::new(DEFAULT_LOCATION_ID, DEFAULT_LOCATION_NAME)?],
        };
        Ok(Self {
            api_addr,
            stream,
            detector,
            pipeline,
            threshold,
            locations,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("CROWDWATCH_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("CROWDWATCH_STREAM_URL") {
            if !url.trim().is_empty() {
                self.stream.url = url;
            }
        }
        if let Ok(threshold) = std::env::var("CROWDWATCH_THRESHOLD") {
            self.threshold = threshold
                .parse()
                .map_err(|_| anyhow!("CROWDWATCH_THRESHOLD must be an integer"))?;
        }
        if let Ok(interval) = std::env::var("CROWDWATCH_SAMPLE_INTERVAL") {
            self.pipeline.sample_interval = interval
                .parse()
                .map_err(|_| anyhow!("CROWDWATCH_SAMPLE_INTERVAL must be an integer"))?;
        }
        if let Ok(locations) = std::env::var("CROWDWATCH_LOCATIONS") {
            let ids = split_csv(&locations);
            if !ids.is_empty() {
                self.locations = ids
                    .into_iter()
                    .map(|id| {
                        let display = display_name_from_id(&id);
                        Location::new(id, display)
                    })
                    .collect::<Result<Vec<_>>>()?;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.locations.is_empty() {
            return Err(anyhow!("at least one location must be configured"));
        }
        for location in &self.locations {
            crate::validate_location_id(&location.id)?;
        }
        if self.pipeline.sample_interval == 0 {
            return Err(anyhow!("sample_interval must be at least 1"));
        }
        if self.pipeline.width == 0 || self.pipeline.height == 0 {
            return Err(anyhow!("canonical frame dimensions must be non-zero"));
        }
        if self.pipeline.frame_capacity == 0 {
            return Err(anyhow!("frame_capacity must be at least 1"));
        }
        if self.detector.backend.trim().is_empty() {
            return Err(anyhow!("detector backend must not be empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<CrowdwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// "loc:east_gate" reads as "East Gate" when no display name was given.
fn display_name_from_id(id: &str) -> String {
    let stem = id.strip_prefix("loc:").unwrap_or(id);
    stem.split(['_', '-'])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_the_monitored_deployment() {
        let cfg = CrowdwatchConfig::from_file(CrowdwatchConfigFile::default()).unwrap();
        assert_eq!(cfg.threshold, 50);
        assert_eq!(cfg.pipeline.sample_interval, 6);
        assert_eq!(cfg.pipeline.width, 1020);
        assert_eq!(cfg.pipeline.height, 600);
        assert_eq!(cfg.pipeline.frame_capacity, 10);
        assert_eq!(cfg.locations.len(), 1);
        assert_eq!(cfg.locations[0].id, "loc:tirumala");
        assert_eq!(cfg.locations[0].display_name, "Tirumala Temple");
    }

    #[test]
    fn display_names_derive_from_ids() {
        assert_eq!(display_name_from_id("loc:east_gate"), "East Gate");
        assert_eq!(display_name_from_id("loc:lot-b"), "Lot B");
        assert_eq!(display_name_from_id("loc:tirumala"), "Tirumala");
    }

    #[test]
    fn invalid_location_ids_fail_validation() {
        let mut cfg = CrowdwatchConfig::from_file(CrowdwatchConfigFile::default()).unwrap();
        cfg.locations[0].id = "not a location".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_sample_interval_is_rejected() {
        let mut cfg = CrowdwatchConfig::from_file(CrowdwatchConfigFile::default()).unwrap();
        cfg.pipeline.sample_interval = 0;
        assert!(cfg.validate().is_err());
    }
}
