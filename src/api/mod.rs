//! Consumer-facing HTTP adapter over `MonitorState`.
//!
//! A deliberately small server on a std `TcpListener`: non-blocking
//! accept loop, one request per connection, cooperative shutdown via an
//! atomic flag. All monitoring logic lives in the core; this layer only
//! parses requests and serializes responses.
//!
//! Routes:
//! - `GET /health`              liveness and pipeline status
//! - `GET /counts/<location>`   latest per-class counts
//! - `GET /alerts/<location>`   alert history, oldest first
//! - `POST /threshold`          set the global crowd threshold
//! - `POST /warning/<location>` raise a manual warning
//! - `GET /video_feed`          MJPEG stream of annotated frames

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde_json::json;

use crate::state::MonitorState;

const MAX_REQUEST_BYTES: usize = 8192;
const JPEG_QUALITY: u8 = 80;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8890".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ApiHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("api server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    state: Arc<MonitorState>,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, state: Arc<MonitorState>) -> Self {
        Self { cfg, state }
    }

    pub fn spawn(self) -> Result<ApiHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let state = self.state.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = run_api(listener, state, shutdown_thread) {
                log::error!("monitor api stopped: {}", err);
            }
        });

        log::info!("monitor api listening on {}", addr);
        Ok(ApiHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_api(
    listener: TcpListener,
    state: Arc<MonitorState>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, &state, &shutdown) {
                    log::warn!("monitor api request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    state: &Arc<MonitorState>,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let request = read_request(&mut stream)?;

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => {
            let body = json!({
                "status": "ok",
                "pipeline_live": state.pipeline_live(),
            });
            write_json_response(&mut stream, 200, &body.to_string())
        }
        ("GET", "/video_feed") => {
            // Long-lived connection; stream on its own thread so the
            // accept loop keeps serving.
            let state = state.clone();
            let shutdown = shutdown.clone();
            std::thread::spawn(move || {
                if let Err(err) = stream_video(stream, state, shutdown) {
                    log::debug!("video feed connection closed: {}", err);
                }
            });
            Ok(())
        }
        ("GET", path) if path.starts_with("/counts/") => {
            let location = &path["/counts/".len()..];
            match state.current_counts(location) {
                Ok(counts) => {
                    let body = json!({"success": true, "counts": counts});
                    write_json_response(&mut stream, 200, &body.to_string())
                }
                Err(_) => write_invalid_location(&mut stream),
            }
        }
        ("GET", path) if path.starts_with("/alerts/") => {
            let location = &path["/alerts/".len()..];
            match state.alerts(location) {
                Ok(alerts) => {
                    let body = json!({"success": true, "alerts": alerts});
                    write_json_response(&mut stream, 200, &body.to_string())
                }
                Err(_) => write_invalid_location(&mut stream),
            }
        }
        ("POST", "/threshold") => match parse_threshold(&request.body) {
            Some(threshold) => {
                let fired = state.set_threshold(threshold)?;
                if !fired.is_empty() {
                    log::warn!(
                        "threshold change to {} fired {} alert(s)",
                        threshold,
                        fired.len()
                    );
                }
                let body = json!({"success": true, "threshold": threshold});
                write_json_response(&mut stream, 200, &body.to_string())
            }
            None => write_json_response(
                &mut stream,
                400,
                r#"{"success":false,"error":"Invalid threshold value"}"#,
            ),
        },
        ("POST", path) if path.starts_with("/warning/") => {
            let location = &path["/warning/".len()..];
            match state.raise_manual_alert(location) {
                Ok(_) => write_json_response(&mut stream, 200, r#"{"success":true}"#),
                Err(_) => write_invalid_location(&mut stream),
            }
        }
        ("GET", _) | ("POST", _) => {
            write_json_response(&mut stream, 404, r#"{"success":false,"error":"not_found"}"#)
        }
        _ => write_json_response(
            &mut stream,
            405,
            r#"{"success":false,"error":"method_not_allowed"}"#,
        ),
    }
}

/// The threshold body must be a JSON object with an integer `threshold`.
/// Anything else leaves the state untouched.
fn parse_threshold(body: &[u8]) -> Option<u32> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let threshold = value.get("threshold")?.as_u64()?;
    u32::try_from(threshold).ok()
}

/// Stream annotated frames as multipart/x-mixed-replace MJPEG until the
/// client disconnects or the server shuts down.
fn stream_video(
    mut stream: TcpStream,
    state: Arc<MonitorState>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    stream.write_all(
        b"HTTP/1.1 200 OK\r\n\
          Content-Type: multipart/x-mixed-replace; boundary=frame\r\n\
          Cache-Control: no-store\r\n\r\n",
    )?;

    while !shutdown.load(Ordering::SeqCst) {
        match state.pop_frame()? {
            Some(frame) => {
                let jpeg = frame.encode_jpeg(JPEG_QUALITY)?;
                stream.write_all(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n")?;
                stream.write_all(&jpeg)?;
                stream.write_all(b"\r\n")?;
            }
            None => {
                std::thread::sleep(Duration::from_millis(100));
            }
        }
    }
    Ok(())
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    let header_end = loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break data
                .windows(4)
                .position(|w| w == b"\r\n\r\n")
                .ok_or_else(|| anyhow!("truncated request"))?;
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let header_text = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = header_text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    // Read the body up to Content-Length, continuing past whatever came in
    // with the headers.
    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }
    let mut body: Vec<u8> = data[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("truncated request body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    Ok(HttpRequest {
        method: method.to_string(),
        path,
        body,
    })
}

fn write_invalid_location(stream: &mut TcpStream) -> Result<()> {
    write_json_response(
        stream,
        404,
        r#"{"success":false,"error":"Invalid location"}"#,
    )
}

fn write_json_response(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\nCache-Control: no-store\r\n\r\n",
        status_line = status_line,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body.as_bytes())?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    body: Vec<u8>,
}
