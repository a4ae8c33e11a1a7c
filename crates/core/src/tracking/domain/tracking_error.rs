use thiserror::Error;

use crate::detection::domain::detection_algorithm::DetectionError;

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("vertex capacity must be at least 1")]
    InvalidCapacity,
    #[error("could not start tracking thread: {0}")]
    ThreadUnavailable(#[source] std::io::Error),
    #[error("tracking thread panicked")]
    WorkerPanicked,
    #[error(transparent)]
    Detection(#[from] DetectionError),
}
