use image::GrayImage;
use thiserror::Error;

use crate::shared::asset_resolver::AssetResolveError;
use crate::shared::frame::FrameError;
use crate::shared::vertex::Vertex;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("invalid detector parameter: {0}")]
    InvalidParameter(String),
    /// A detector's trained model could not be loaded or is unusable.
    #[error("detection model unusable: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Asset(#[from] AssetResolveError),
    #[error("frame unusable for detection: {0}")]
    Frame(#[from] FrameError),
}

/// Output of one detection pass.
///
/// `secondary` holds points from a chained sub-region pass (eyes inside
/// faces); detectors without such a pass leave it empty.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Detection {
    pub primary: Vec<Vertex>,
    pub secondary: Vec<Vertex>,
}

impl Detection {
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.secondary.is_empty()
    }
}

/// Domain interface for the per-cycle detection strategy.
///
/// Given an intensity frame, produce at most `capacity` primary points and
/// at most `capacity` secondary points, in the detector's scan order.
/// Implementations may keep scratch state between calls, hence `&mut self`.
pub trait DetectionAlgorithm: Send {
    fn name(&self) -> &'static str;

    fn detect(&mut self, frame: &GrayImage, capacity: usize) -> Result<Detection, DetectionError>;
}
