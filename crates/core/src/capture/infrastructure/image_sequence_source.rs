use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};

use crate::capture::domain::frame_source::{CaptureError, FrameSource};
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Plays a list of image files as a camera feed.
///
/// Each file is decoded with the `image` crate into an RGB frame, optionally
/// resized. With `looping` the list repeats until the host stops asking.
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
    frames_read: usize,
    looping: bool,
    resize: Option<(u32, u32)>,
    dimensions: Option<(u32, u32)>,
}

impl ImageSequenceSource {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, CaptureError> {
        if paths.is_empty() {
            return Err(CaptureError::NoInput);
        }
        Ok(Self {
            paths,
            position: 0,
            frames_read: 0,
            looping: false,
            resize: None,
            dimensions: None,
        })
    }

    /// Expands directories into their image files (sorted by name) and keeps
    /// plain files as given.
    pub fn from_inputs(inputs: &[PathBuf]) -> Result<Self, CaptureError> {
        let mut paths = Vec::new();
        for input in inputs {
            if input.is_dir() {
                let mut found: Vec<PathBuf> = fs::read_dir(input)
                    .into_iter()
                    .flatten()
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| is_image(p))
                    .collect();
                found.sort();
                paths.extend(found);
            } else {
                paths.push(input.clone());
            }
        }
        Self::new(paths)
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Scales every frame to `width` x `height`.
    pub fn resized(mut self, size: Option<(u32, u32)>) -> Self {
        self.resize = size;
        self
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn decode(&self, path: &Path) -> Result<Frame, CaptureError> {
        let decoded = image::open(path).map_err(|e| CaptureError::Decode {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut rgb = decoded.to_rgb8();
        if let Some((w, h)) = self.resize {
            if rgb.dimensions() != (w, h) {
                rgb = imageops::resize(&rgb, w, h, FilterType::Triangle);
            }
        }
        let (width, height) = rgb.dimensions();
        Ok(Frame::new(rgb.into_raw(), width, height, 3, self.frames_read))
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError> {
        if self.position >= self.paths.len() {
            if !self.looping {
                return Ok(None);
            }
            self.position = 0;
        }

        let path = self.paths[self.position].clone();
        let frame = self.decode(&path)?;
        log::debug!("Captured frame {} from {}", frame.index(), path.display());

        self.position += 1;
        self.frames_read += 1;
        self.dimensions = Some((frame.width(), frame.height()));
        Ok(Some(frame))
    }

    fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
