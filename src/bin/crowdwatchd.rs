//! crowdwatchd - crowd density monitoring daemon
//!
//! This daemon:
//! 1. Connects a frame source (synthetic `stub://` or GStreamer)
//! 2. Runs the frame processor on its own worker thread
//! 3. Serves counts, alerts, threshold control, and the MJPEG feed
//!    over the monitor API
//! 4. Stops cooperatively on Ctrl-C

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crowdwatch::{
    api::{ApiConfig, ApiServer},
    config::CrowdwatchConfig,
    state::MonitorState,
    BackendRegistry, FrameProcessor, FrameSource, PipelineConfig, StreamConfig, StreamSource,
    StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to a JSON config file (falls back to CROWDWATCH_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Stream URL override.
    #[arg(long, env = "CROWDWATCH_STREAM_URL")]
    stream_url: Option<String>,
    /// API listen address override.
    #[arg(long, env = "CROWDWATCH_API_ADDR")]
    api_addr: Option<String>,
    /// Crowd threshold override.
    #[arg(long)]
    threshold: Option<u32>,
    /// Detector backend name override.
    #[arg(long)]
    backend: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut cfg = CrowdwatchConfig::load(args.config.as_deref())?;
    if let Some(url) = args.stream_url {
        cfg.stream.url = url;
    }
    if let Some(addr) = args.api_addr {
        cfg.api_addr = addr;
    }
    if let Some(threshold) = args.threshold {
        cfg.threshold = threshold;
    }
    if let Some(backend) = args.backend {
        cfg.detector.backend = backend;
    }

    let registry = build_registry(&cfg)?;
    let backend = registry
        .get(&cfg.detector.backend)
        .ok_or_else(|| {
            anyhow!(
                "detector backend '{}' not available (registered: {:?})",
                cfg.detector.backend,
                registry.list()
            )
        })?;
    {
        let mut guard = backend
            .lock()
            .map_err(|_| anyhow!("detector backend lock poisoned"))?;
        guard.warm_up()?;
    }

    let state = Arc::new(MonitorState::new(
        cfg.locations.clone(),
        cfg.threshold,
        cfg.pipeline.frame_capacity,
    ));

    let mut source = StreamSource::new(StreamConfig {
        url: cfg.stream.url.clone(),
        width: cfg.stream.width,
        height: cfg.stream.height,
        frame_limit: None,
    })?;
    source.connect()?;

    let stop = Arc::new(AtomicBool::new(false));
    let stop_signal = stop.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown requested");
        stop_signal.store(true, Ordering::SeqCst);
    })?;

    let api_handle = ApiServer::new(
        ApiConfig {
            addr: cfg.api_addr.clone(),
        },
        state.clone(),
    )
    .spawn()?;

    let pipeline_cfg = PipelineConfig {
        location_id: cfg.locations[0].id.clone(),
        sample_interval: cfg.pipeline.sample_interval,
        width: cfg.pipeline.width,
        height: cfg.pipeline.height,
        ..PipelineConfig::default()
    };
    let processor = FrameProcessor::new(
        Box::new(source),
        backend,
        state.clone(),
        pipeline_cfg,
        stop.clone(),
    );
    let worker = std::thread::spawn(move || processor.run());

    log::info!(
        "crowdwatchd running: stream={}, backend={}, threshold={}, locations={:?}",
        cfg.stream.url,
        cfg.detector.backend,
        cfg.threshold,
        cfg.locations.iter().map(|l| l.id.as_str()).collect::<Vec<_>>()
    );

    // Supervise: wake periodically for health logging until the worker
    // exits or shutdown is requested.
    let mut last_health_log = Instant::now();
    while !stop.load(Ordering::SeqCst) && !worker.is_finished() {
        std::thread::sleep(Duration::from_millis(200));
        if last_health_log.elapsed() >= Duration::from_secs(5) {
            log::info!(
                "health: pipeline_live={}, pending_frames={}",
                state.pipeline_live(),
                state.pending_frames()?
            );
            last_health_log = Instant::now();
        }
    }
    stop.store(true, Ordering::SeqCst);

    // Stop the API before surfacing any worker error so the accept loop
    // never outlives a failed pipeline.
    let worker_result = worker.join();
    api_handle.stop()?;
    match worker_result {
        Ok(result) => result?,
        Err(_) => return Err(anyhow!("pipeline worker panicked")),
    }
    log::info!("crowdwatchd stopped");
    Ok(())
}

fn build_registry(cfg: &CrowdwatchConfig) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());

    #[cfg(feature = "backend-tract")]
    if let Some(model_path) = &cfg.detector.model_path {
        let backend = crowdwatch::detect::TractBackend::new(
            model_path,
            cfg.pipeline.width,
            cfg.pipeline.height,
        )?;
        registry.register(backend);
    }
    #[cfg(not(feature = "backend-tract"))]
    if cfg.detector.model_path.is_some() {
        log::warn!("model_path configured but the backend-tract feature is not enabled");
    }

    Ok(registry)
}
