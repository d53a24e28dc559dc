use std::sync::Mutex;

use tempfile::NamedTempFile;

use crowdwatch::config::CrowdwatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "CROWDWATCH_CONFIG",
        "CROWDWATCH_API_ADDR",
        "CROWDWATCH_STREAM_URL",
        "CROWDWATCH_THRESHOLD",
        "CROWDWATCH_SAMPLE_INTERVAL",
        "CROWDWATCH_LOCATIONS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": { "addr": "0.0.0.0:9100" },
        "stream": { "url": "rtsp://camera-1", "width": 1280, "height": 720 },
        "detector": { "backend": "stub" },
        "pipeline": { "sample_interval": 4, "width": 960, "height": 540, "frame_capacity": 8 },
        "threshold": 75,
        "locations": [
            { "id": "loc:tirumala", "display_name": "Tirumala Temple" },
            { "id": "loc:east_gate" }
        ]
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("CROWDWATCH_CONFIG", file.path());
    std::env::set_var("CROWDWATCH_STREAM_URL", "stub://override");
    std::env::set_var("CROWDWATCH_THRESHOLD", "90");

    let cfg = CrowdwatchConfig::load(None).expect("load config");

    assert_eq!(cfg.api_addr, "0.0.0.0:9100");
    assert_eq!(cfg.stream.url, "stub://override");
    assert_eq!(cfg.stream.width, 1280);
    assert_eq!(cfg.stream.height, 720);
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.pipeline.sample_interval, 4);
    assert_eq!(cfg.pipeline.width, 960);
    assert_eq!(cfg.pipeline.height, 540);
    assert_eq!(cfg.pipeline.frame_capacity, 8);
    assert_eq!(cfg.threshold, 90);
    assert_eq!(cfg.locations.len(), 2);
    assert_eq!(cfg.locations[0].display_name, "Tirumala Temple");
    assert_eq!(cfg.locations[1].id, "loc:east_gate");
    assert_eq!(cfg.locations[1].display_name, "East Gate");

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = CrowdwatchConfig::load(None).expect("load config");

    assert_eq!(cfg.api_addr, "127.0.0.1:8890");
    assert_eq!(cfg.stream.url, "stub://camera");
    assert_eq!(cfg.threshold, 50);
    assert_eq!(cfg.pipeline.sample_interval, 6);
    assert_eq!(cfg.pipeline.frame_capacity, 10);
    assert_eq!(cfg.locations.len(), 1);
    assert_eq!(cfg.locations[0].id, "loc:tirumala");

    clear_env();
}

#[test]
fn location_env_override_replaces_the_registry() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CROWDWATCH_LOCATIONS", "loc:north_gate, loc:lot-b");
    let cfg = CrowdwatchConfig::load(None).expect("load config");

    assert_eq!(cfg.locations.len(), 2);
    assert_eq!(cfg.locations[0].id, "loc:north_gate");
    assert_eq!(cfg.locations[0].display_name, "North Gate");
    assert_eq!(cfg.locations[1].id, "loc:lot-b");

    clear_env();
}

#[test]
fn invalid_location_env_fails_loudly() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CROWDWATCH_LOCATIONS", "front gate");
    assert!(CrowdwatchConfig::load(None).is_err());

    clear_env();
}

#[test]
fn malformed_threshold_env_fails_loudly() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("CROWDWATCH_THRESHOLD", "many");
    assert!(CrowdwatchConfig::load(None).is_err());

    clear_env();
}
