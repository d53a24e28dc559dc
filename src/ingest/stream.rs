//! Stream source implementations.
//!
//! `StreamSource` dispatches to a synthetic generator for `stub://` URLs
//! and to a GStreamer pipeline for everything else (behind the
//! `stream-gstreamer` feature).

#[cfg(feature = "stream-gstreamer")]
use anyhow::Context;
use anyhow::{anyhow, Result};
use rand::Rng;
#[cfg(feature = "stream-gstreamer")]
use std::time::{Duration, Instant};

use crate::frame::Frame;
use crate::ingest::{FrameSource, StreamStats};

/// Configuration for a stream source.
#[derive(Clone, Debug)]
pub struct StreamConfig {
    /// Stream URL. `stub://` selects the synthetic backend; anything else
    /// requires the stream-gstreamer feature.
    pub url: String,
    /// Frame width for synthetic frames.
    pub width: u32,
    /// Frame height for synthetic frames.
    pub height: u32,
    /// Synthetic streams end after this many frames; None runs forever.
    pub frame_limit: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: "stub://camera".to_string(),
            width: 1020,
            height: 600,
            frame_limit: None,
        }
    }
}

/// A frame source over a live stream URL.
pub struct StreamSource {
    backend: StreamBackend,
}

enum StreamBackend {
    Synthetic(SyntheticSource),
    #[cfg(feature = "stream-gstreamer")]
    Gstreamer(GstreamerSource),
}

impl StreamSource {
    pub fn new(config: StreamConfig) -> Result<Self> {
        if config.url.starts_with("stub://") {
            Ok(Self {
                backend: StreamBackend::Synthetic(SyntheticSource::new(config)),
            })
        } else {
            #[cfg(feature = "stream-gstreamer")]
            {
                Ok(Self {
                    backend: StreamBackend::Gstreamer(GstreamerSource::new(config)?),
                })
            }
            #[cfg(not(feature = "stream-gstreamer"))]
            {
                anyhow::bail!(
                    "stream URL '{}' requires the stream-gstreamer feature",
                    config.url
                )
            }
        }
    }
}

impl FrameSource for StreamSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.next_frame(),
        }
    }

    fn stop(&mut self) -> Result<()> {
        match &mut self.backend {
            StreamBackend::Synthetic(source) => source.stop(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.stop(),
        }
    }

    fn is_healthy(&self) -> bool {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.is_healthy(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.is_healthy(),
        }
    }

    fn stats(&self) -> StreamStats {
        match &self.backend {
            StreamBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "stream-gstreamer")]
            StreamBackend::Gstreamer(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and model-free runs
// ----------------------------------------------------------------------------

struct SyntheticSource {
    config: StreamConfig,
    frame_count: u64,
    connected: bool,
    stopped: bool,
}

impl SyntheticSource {
    fn new(config: StreamConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            connected: false,
            stopped: false,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.stopped = false;
        log::info!("StreamSource: connected to {} (synthetic)", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected || self.stopped {
            return Err(anyhow!("synthetic source is not connected"));
        }
        if let Some(limit) = self.config.frame_limit {
            if self.frame_count >= limit {
                return Ok(None);
            }
        }
        self.frame_count += 1;

        // Gradient background with per-frame noise so consecutive frames
        // differ, like a real camera feed.
        let width = self.config.width;
        let height = self.config.height;
        let mut rng = rand::thread_rng();
        let mut pixels = vec![0u8; (width * height * 3) as usize];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 3) as usize;
                pixels[idx] = ((x * 255) / width.max(1)) as u8;
                pixels[idx + 1] = ((y * 255) / height.max(1)) as u8;
                pixels[idx + 2] = (self.frame_count % 256) as u8 ^ rng.gen::<u8>() & 0x0F;
            }
        }

        Ok(Some(Frame::from_rgb8(pixels, width, height)?))
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped || !self.connected {
            return Err(anyhow!("synthetic source already stopped"));
        }
        self.stopped = true;
        log::info!("StreamSource: stopped {} (synthetic)", self.config.url);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        self.connected && !self.stopped
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_delivered: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Production stream source using GStreamer
// ----------------------------------------------------------------------------

#[cfg(feature = "stream-gstreamer")]
struct GstreamerSource {
    config: StreamConfig,
    pipeline: gstreamer::Pipeline,
    appsink: gstreamer_app::AppSink,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    last_error: Option<String>,
    stopped: bool,
}

#[cfg(feature = "stream-gstreamer")]
impl GstreamerSource {
    fn new(config: StreamConfig) -> Result<Self> {
        gstreamer::init().context("initialize gstreamer")?;

        let pipeline_description = format!(
            "uridecodebin uri={} ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=appsink sync=false max-buffers=1 drop=true",
            config.url
        );
        let pipeline = gstreamer::parse_launch(&pipeline_description)
            .context("build stream pipeline")?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| anyhow!("stream pipeline is not a Pipeline"))?;

        let appsink = pipeline
            .by_name("appsink")
            .context("appsink element missing from pipeline")?
            .downcast::<gstreamer_app::AppSink>()
            .map_err(|_| anyhow!("appsink element has unexpected type"))?;

        let caps = gstreamer::Caps::builder("video/x-raw")
            .field("format", "RGB")
            .build();
        appsink.set_caps(Some(&caps));
        appsink.set_max_buffers(1);
        appsink.set_drop(true);
        appsink.set_sync(false);

        Ok(Self {
            config,
            pipeline,
            appsink,
            frame_count: 0,
            last_frame_at: None,
            connected_at: None,
            last_error: None,
            stopped: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .context("set stream pipeline to Playing")?;
        self.connected_at = Some(Instant::now());
        self.stopped = false;
        log::info!("StreamSource: connected to {}", self.config.url);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        self.poll_bus();
        if self.appsink.is_eos() {
            return Ok(None);
        }
        if let Some(error) = self.last_error.take() {
            return Err(anyhow!(error));
        }

        let sample = self
            .appsink
            .try_pull_sample(Duration::from_millis(500))
            .context("pull stream sample")?
            .ok_or_else(|| anyhow!("stream stalled"))?;

        let (pixels, width, height) = sample_to_pixels(&sample)?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Ok(Some(Frame::from_rgb8(pixels, width, height)?))
    }

    fn stop(&mut self) -> Result<()> {
        if self.stopped {
            return Err(anyhow!("stream source already stopped"));
        }
        self.pipeline
            .set_state(gstreamer::State::Null)
            .context("set stream pipeline to Null")?;
        self.stopped = true;
        log::info!("StreamSource: stopped {}", self.config.url);
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        if self.stopped || self.last_error.is_some() {
            return false;
        }
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= Duration::from_secs(2)
    }

    fn stats(&self) -> StreamStats {
        StreamStats {
            frames_delivered: self.frame_count,
            url: self.config.url.clone(),
        }
    }

    fn poll_bus(&mut self) {
        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        while let Some(message) = bus.timed_pop(Duration::from_millis(0)) {
            use gstreamer::MessageView;
            match message.view() {
                MessageView::Error(err) => {
                    self.last_error = Some(format!(
                        "gstreamer error from {:?}: {}",
                        err.src().map(|s| s.path_string()),
                        err.error()
                    ));
                }
                MessageView::Eos(..) => {}
                _ => {}
            }
        }
    }
}

#[cfg(feature = "stream-gstreamer")]
fn sample_to_pixels(sample: &gstreamer::Sample) -> Result<(Vec<u8>, u32, u32)> {
    let buffer = sample.buffer().context("stream sample missing buffer")?;
    let caps = sample.caps().context("stream sample missing caps")?;
    let info =
        gstreamer_video::VideoInfo::from_caps(caps).context("parse stream caps as video info")?;

    let width = info.width();
    let height = info.height();
    let row_bytes = (width as usize) * 3;
    let stride = info.stride(0) as usize;

    let map = buffer.map_readable().context("map stream buffer")?;
    let data = map.as_slice();

    if stride == row_bytes {
        return Ok((data.to_vec(), width, height));
    }

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        let end = start + row_bytes;
        pixels.extend_from_slice(
            data.get(start..end)
                .context("stream buffer row is out of bounds")?,
        );
    }

    Ok((pixels, width, height))
}
