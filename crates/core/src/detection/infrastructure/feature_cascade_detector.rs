use std::path::PathBuf;

use image::{imageops, GrayImage};
use imageproc::contrast::equalize_histogram;
use serde::{Deserialize, Serialize};

use crate::detection::domain::detection_algorithm::{Detection, DetectionAlgorithm, DetectionError};
use crate::detection::domain::object_classifier::ObjectClassifier;
use crate::shared::asset_resolver;
use crate::shared::constants::{EYE_CASCADE_NAME, FACE_CASCADE_NAME};
use crate::shared::vertex::Vertex;

use super::haar_cascade::{CascadeParams, HaarCascade};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeDetectorConfig {
    pub params: CascadeParams,
    pub face_cascade: String,
    pub eye_cascade: String,
    /// Checked before the user data and bundled cascade directories.
    pub cascade_dir: Option<PathBuf>,
}

impl Default for CascadeDetectorConfig {
    fn default() -> Self {
        Self {
            params: CascadeParams::default(),
            face_cascade: FACE_CASCADE_NAME.to_string(),
            eye_cascade: EYE_CASCADE_NAME.to_string(),
            cascade_dir: None,
        }
    }
}

/// Face detector with an optional eye pass inside each face.
///
/// Primary vertices are face centers. Secondary vertices are eye centers,
/// translated back into frame coordinates and accumulated across all faces.
pub struct FeatureCascadeDetector {
    primary: Box<dyn ObjectClassifier>,
    secondary: Option<Box<dyn ObjectClassifier>>,
}

impl FeatureCascadeDetector {
    pub fn new(
        primary: Box<dyn ObjectClassifier>,
        secondary: Option<Box<dyn ObjectClassifier>>,
    ) -> Self {
        Self { primary, secondary }
    }

    /// Resolves and loads the Haar cascades named in `config`.
    ///
    /// The eye cascade is only loaded when `include_eyes` is set.
    pub fn from_config(
        config: &CascadeDetectorConfig,
        include_eyes: bool,
    ) -> Result<Self, DetectionError> {
        let dir = config.cascade_dir.as_deref();

        let face_path = asset_resolver::resolve(&config.face_cascade, dir)?;
        let primary = HaarCascade::load(&face_path, config.params)?;

        let secondary = if include_eyes {
            let eye_path = asset_resolver::resolve(&config.eye_cascade, dir)?;
            Some(Box::new(HaarCascade::load(&eye_path, config.params)?) as Box<dyn ObjectClassifier>)
        } else {
            None
        };

        Ok(Self::new(Box::new(primary), secondary))
    }

    pub fn includes_secondary(&self) -> bool {
        self.secondary.is_some()
    }
}

impl DetectionAlgorithm for FeatureCascadeDetector {
    fn name(&self) -> &'static str {
        if self.includes_secondary() {
            "faces_and_eyes"
        } else {
            "faces"
        }
    }

    fn detect(&mut self, frame: &GrayImage, capacity: usize) -> Result<Detection, DetectionError> {
        if capacity == 0 || frame.width() == 0 || frame.height() == 0 {
            return Ok(Detection::default());
        }

        let equalized = equalize_histogram(frame);
        let faces = self.primary.detect_multi_scale(&equalized);

        let mut detection = Detection::default();
        for face in faces.into_iter().take(capacity) {
            let (cx, cy) = face.center();
            detection.primary.push(Vertex::from_pixel(cx, cy));

            let Some(eyes) = &self.secondary else {
                continue;
            };
            if detection.secondary.len() >= capacity {
                continue;
            }
            let Some(roi) = face.clamp_to(equalized.width(), equalized.height()) else {
                continue;
            };

            let crop = imageops::crop_imm(
                &equalized,
                roi.x as u32,
                roi.y as u32,
                roi.width as u32,
                roi.height as u32,
            )
            .to_image();

            let room = capacity - detection.secondary.len();
            for eye in eyes.detect_multi_scale(&crop).into_iter().take(room) {
                let (ex, ey) = eye.center();
                detection
                    .secondary
                    .push(Vertex::from_pixel(roi.x + ex, roi.y + ey));
            }
        }

        Ok(detection)
    }
}
