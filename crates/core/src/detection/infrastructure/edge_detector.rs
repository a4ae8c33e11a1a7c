/// Baseline detector: every Canny edge pixel is a vertex.
///
/// Pipeline per pass: box smoothing → Canny (low `T`, high `T * R`, Sobel
/// aperture 3) → non-zero pixels in raster order → truncate to capacity.
use image::GrayImage;
use imageproc::edges::canny;
use imageproc::filter::box_filter;
use serde::{Deserialize, Serialize};

use crate::detection::domain::detection_algorithm::{Detection, DetectionAlgorithm, DetectionError};
use crate::shared::constants::{
    EDGE_BLUR_RADIUS, EDGE_KERNEL_SIZE, EDGE_LOW_THRESHOLD, EDGE_THRESHOLD_RATIO,
};
use crate::shared::vertex::Vertex;

/// Smallest side length Canny can produce a non-border edge on.
const MIN_EDGE_FRAME_SIDE: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeDetectorConfig {
    pub low_threshold: f32,
    /// High threshold is `low_threshold * ratio`.
    pub ratio: f32,
    pub kernel_size: u32,
    pub blur_radius: u32,
}

impl Default for EdgeDetectorConfig {
    fn default() -> Self {
        Self {
            low_threshold: EDGE_LOW_THRESHOLD,
            ratio: EDGE_THRESHOLD_RATIO,
            kernel_size: EDGE_KERNEL_SIZE,
            blur_radius: EDGE_BLUR_RADIUS,
        }
    }
}

pub struct EdgeDetector {
    config: EdgeDetectorConfig,
}

impl EdgeDetector {
    pub fn new(config: EdgeDetectorConfig) -> Result<Self, DetectionError> {
        if config.kernel_size != EDGE_KERNEL_SIZE {
            return Err(DetectionError::InvalidParameter(format!(
                "edge kernel size must be {EDGE_KERNEL_SIZE}, got {}",
                config.kernel_size
            )));
        }
        if !config.low_threshold.is_finite() || config.low_threshold < 0.0 {
            return Err(DetectionError::InvalidParameter(format!(
                "edge low threshold must be a non-negative number, got {}",
                config.low_threshold
            )));
        }
        if !config.ratio.is_finite() || config.ratio < 1.0 {
            return Err(DetectionError::InvalidParameter(format!(
                "edge threshold ratio must be >= 1, got {}",
                config.ratio
            )));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &EdgeDetectorConfig {
        &self.config
    }

    pub fn high_threshold(&self) -> f32 {
        self.config.low_threshold * self.config.ratio
    }

    /// Binary edge map: 255 on edges, 0 elsewhere.
    pub fn edge_map(&self, gray: &GrayImage) -> GrayImage {
        let radius = self.config.blur_radius;
        if radius == 0 {
            canny(gray, self.config.low_threshold, self.high_threshold())
        } else {
            let smoothed = box_filter(gray, radius, radius);
            canny(&smoothed, self.config.low_threshold, self.high_threshold())
        }
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self {
            config: EdgeDetectorConfig::default(),
        }
    }
}

impl DetectionAlgorithm for EdgeDetector {
    fn name(&self) -> &'static str {
        "edges"
    }

    fn detect(&mut self, frame: &GrayImage, capacity: usize) -> Result<Detection, DetectionError> {
        let (w, h) = frame.dimensions();
        if w < MIN_EDGE_FRAME_SIDE || h < MIN_EDGE_FRAME_SIDE || capacity == 0 {
            return Ok(Detection::default());
        }

        let edges = self.edge_map(frame);
        Ok(Detection {
            primary: collect_edge_vertices(&edges, capacity),
            secondary: Vec::new(),
        })
    }
}

/// Non-zero pixels of `edges` in raster order, at most `capacity` of them.
pub fn collect_edge_vertices(edges: &GrayImage, capacity: usize) -> Vec<Vertex> {
    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p[0] != 0)
        .take(capacity)
        .map(|(x, y, _)| Vertex::from_pixel(x as i32, y as i32))
        .collect()
}
