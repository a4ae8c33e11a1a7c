use std::sync::{Arc, PoisonError, RwLock};

use image::{imageops, GrayImage, ImageBuffer, Rgb, Rgba};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("unsupported channel count: {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(u8),
    #[error("frame data is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// A single video frame: interleaved 8-bit pixels in row-major order.
///
/// Color frames are RGB (3 channels) or RGBA (4 channels); single-channel
/// frames are already intensity images. An empty 0x0 frame stands in for
/// "no capture yet".
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), 0, 0, 3, 0)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Converts to a single-channel intensity image.
    pub fn to_gray(&self) -> Result<GrayImage, FrameError> {
        let expected = (self.width as usize) * (self.height as usize) * (self.channels as usize);
        if self.data.len() != expected {
            return Err(FrameError::SizeMismatch {
                expected,
                actual: self.data.len(),
            });
        }

        let (w, h) = (self.width, self.height);
        let gray = match self.channels {
            1 => GrayImage::from_raw(w, h, self.data.clone()),
            3 => ImageBuffer::<Rgb<u8>, &[u8]>::from_raw(w, h, &self.data)
                .map(|img| imageops::grayscale(&img)),
            4 => ImageBuffer::<Rgba<u8>, &[u8]>::from_raw(w, h, &self.data)
                .map(|img| imageops::grayscale(&img)),
            other => return Err(FrameError::UnsupportedChannels(other)),
        };

        gray.ok_or(FrameError::SizeMismatch {
            expected,
            actual: self.data.len(),
        })
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::empty()
    }
}

/// Host-owned frame slot shared with the tracking worker.
///
/// The host overwrites the frame once per tick; the worker only takes a
/// read lock long enough to snapshot it into an intensity image, so a
/// slow detection pass never blocks the host.
#[derive(Clone, Debug, Default)]
pub struct SharedFrame {
    inner: Arc<RwLock<Frame>>,
}

impl SharedFrame {
    pub fn new(frame: Frame) -> Self {
        Self {
            inner: Arc::new(RwLock::new(frame)),
        }
    }

    pub fn replace(&self, frame: Frame) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = frame;
    }

    /// Mutates the frame in place, e.g. to copy a capture into the existing allocation.
    pub fn update<F: FnOnce(&mut Frame)>(&self, f: F) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }

    pub fn to_gray(&self) -> Result<GrayImage, FrameError> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_gray()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (guard.width(), guard.height())
    }

    pub fn index(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .index()
    }
}
