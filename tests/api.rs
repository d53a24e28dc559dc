//! HTTP adapter tests over a real listener bound to an ephemeral port.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use crowdwatch::api::{ApiConfig, ApiServer};
use crowdwatch::state::{CountSnapshot, MonitorState};
use crowdwatch::{Frame, Location};

fn spawn_api(state: Arc<MonitorState>) -> crowdwatch::api::ApiHandle {
    ApiServer::new(
        ApiConfig {
            addr: "127.0.0.1:0".to_string(),
        },
        state,
    )
    .spawn()
    .expect("spawn api")
}

fn monitor_state(threshold: u32) -> Arc<MonitorState> {
    Arc::new(MonitorState::new(
        vec![Location::new("loc:tirumala", "Tirumala Temple").unwrap()],
        threshold,
        10,
    ))
}

fn request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    stream.write_all(raw.as_bytes()).expect("write request");
    let mut response = String::new();
    stream.read_to_string(&mut response).expect("read response");
    response
}

fn get(addr: std::net::SocketAddr, path: &str) -> String {
    request(
        addr,
        &format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path),
    )
}

fn post(addr: std::net::SocketAddr, path: &str, body: &str) -> String {
    request(
        addr,
        &format!(
            "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            path,
            body.len(),
            body
        ),
    )
}

fn person_counts(person: u32) -> CountSnapshot {
    let mut counts = CountSnapshot::new();
    counts.insert("person".to_string(), person);
    counts
}

#[test]
fn health_reports_pipeline_liveness() {
    let state = monitor_state(50);
    state.set_pipeline_live(true);
    let api = spawn_api(state);

    let response = get(api.addr, "/health");
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""status":"ok""#));
    assert!(response.contains(r#""pipeline_live":true"#));

    api.stop().expect("stop api");
}

#[test]
fn counts_round_trip_through_the_api() {
    let state = monitor_state(50);
    state
        .record_observation("loc:tirumala", person_counts(7))
        .unwrap();
    let api = spawn_api(state);

    let response = get(api.addr, "/counts/loc:tirumala");
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""success":true"#));
    assert!(response.contains(r#""person":7"#));

    let missing = get(api.addr, "/counts/loc:nowhere");
    assert!(missing.starts_with("HTTP/1.1 404"));
    assert!(missing.contains("Invalid location"));

    api.stop().expect("stop api");
}

#[test]
fn threshold_change_fires_reevaluation_alert() {
    let state = monitor_state(80);
    state
        .record_observation("loc:tirumala", person_counts(60))
        .unwrap();
    let api = spawn_api(state.clone());

    let response = post(api.addr, "/threshold", r#"{"threshold": 50}"#);
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""threshold":50"#));

    let alerts = get(api.addr, "/alerts/loc:tirumala");
    assert!(alerts.contains(r#""old_threshold":80"#));
    assert!(alerts.contains(r#""new_threshold":50"#));
    assert_eq!(state.threshold().unwrap(), 50);
    assert_eq!(state.alerts("loc:tirumala").unwrap().len(), 1);

    api.stop().expect("stop api");
}

#[test]
fn invalid_threshold_body_leaves_state_untouched() {
    let state = monitor_state(80);
    let api = spawn_api(state.clone());

    let response = post(api.addr, "/threshold", r#"{"threshold": "lots"}"#);
    assert!(response.starts_with("HTTP/1.1 400"));
    assert!(response.contains("Invalid threshold value"));
    assert_eq!(state.threshold().unwrap(), 80);

    let response = post(api.addr, "/threshold", "not json at all");
    assert!(response.starts_with("HTTP/1.1 400"));
    assert_eq!(state.threshold().unwrap(), 80);

    api.stop().expect("stop api");
}

#[test]
fn manual_warning_appends_an_alert() {
    let state = monitor_state(50);
    let api = spawn_api(state.clone());

    let response = post(api.addr, "/warning/loc:tirumala", "");
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.contains(r#""success":true"#));

    let alerts = state.alerts("loc:tirumala").unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].event_details.kind.as_deref(), Some("Manual Warning"));

    let missing = post(api.addr, "/warning/loc:nowhere", "");
    assert!(missing.starts_with("HTTP/1.1 404"));
    assert_eq!(state.alerts("loc:tirumala").unwrap().len(), 1);

    api.stop().expect("stop api");
}

#[test]
fn api_stops_cleanly_after_pipeline_failure() {
    // The accept loop must shut down and join even when the pipeline
    // worker already died; a dead pipeline must not leak the API thread.
    let state = monitor_state(50);
    state.set_pipeline_live(false);
    let api = spawn_api(state);

    let response = get(api.addr, "/health");
    assert!(response.contains(r#""pipeline_live":false"#));

    api.stop().expect("stop api");
}

#[test]
fn unknown_routes_return_not_found() {
    let api = spawn_api(monitor_state(50));

    let response = get(api.addr, "/nope");
    assert!(response.starts_with("HTTP/1.1 404"));

    api.stop().expect("stop api");
}

#[test]
fn video_feed_streams_multipart_jpeg() {
    let state = monitor_state(50);
    let frame = Frame::from_rgb8(vec![128u8; 32 * 24 * 3], 32, 24).unwrap();
    state.publish_frame(frame).unwrap();
    let api = spawn_api(state);

    let mut stream = TcpStream::connect(api.addr).expect("connect");
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .expect("timeout");
    stream
        .write_all(b"GET /video_feed HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .expect("write request");

    let mut received = Vec::new();
    let mut buf = [0u8; 4096];
    while received.len() < 512 {
        match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(_) => break,
        }
    }
    let text = String::from_utf8_lossy(&received);
    assert!(text.contains("multipart/x-mixed-replace"));
    assert!(text.contains("--frame"));
    assert!(text.contains("image/jpeg"));
    // JPEG SOI marker somewhere in the body.
    assert!(received.windows(2).any(|w| w == [0xFF, 0xD8]));

    drop(stream);
    api.stop().expect("stop api");
}
