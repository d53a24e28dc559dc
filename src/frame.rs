//! Frames and the bounded frame buffer.
//!
//! A `Frame` is a packed RGB8 raster. Frames are created by the ingest
//! layer, resized to the canonical detection resolution by the pipeline,
//! mutated in place by annotation, and then handed to the `FrameBuffer`,
//! which owns them until a consumer pops them or they are evicted.
//!
//! The buffer favors freshness over completeness: when full, the oldest
//! frame is dropped to make room for the new one. Consumers poll at their
//! own pace; an empty buffer is a normal state, not an error.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};
use std::collections::VecDeque;

/// Default capacity of the pending-frame buffer.
pub const DEFAULT_FRAME_CAPACITY: usize = 10;

/// A packed RGB8 raster image.
#[derive(Clone, Debug)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wrap raw RGB8 bytes. The byte length must be exactly width*height*3.
    pub fn from_rgb8(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Resample to a new resolution, returning a fresh frame.
    ///
    /// The pipeline uses this to normalize every sampled frame to the
    /// canonical detection resolution so detector input and annotation
    /// coordinates share one pixel space.
    pub fn resize(&self, width: u32, height: u32) -> Result<Frame> {
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }
        let image = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = imageops::resize(&image, width, height, imageops::FilterType::Triangle);
        Frame::from_rgb8(resized.into_raw(), width, height)
    }

    /// Encode as JPEG for the consumer-facing video feed.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let image = RgbImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let mut out = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
            .encode_image(&image)
            .map_err(|e| anyhow!("JPEG encode failed: {}", e))?;
        Ok(out)
    }
}

/// Bounded FIFO of annotated frames with drop-oldest eviction.
pub struct FrameBuffer {
    buffer: VecDeque<Frame>,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Push a frame, evicting the oldest entry first when full. Never
    /// blocks; returns true when an eviction happened.
    pub fn push(&mut self, frame: Frame) -> bool {
        let mut evicted = false;
        while self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            evicted = true;
        }
        self.buffer.push_back(frame);
        evicted
    }

    /// Pop the oldest pending frame, if any.
    pub fn pop(&mut self) -> Option<Frame> {
        self.buffer.pop_front()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_CAPACITY)
    }
}
