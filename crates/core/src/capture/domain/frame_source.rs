use std::path::PathBuf;

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no frames to capture")]
    NoInput,
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Produces frames for the host loop, one per refresh.
///
/// `Ok(None)` means the source is closed; the host stops ticking the
/// tracking session when it sees it.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, CaptureError>;

    /// Frame size, once known.
    fn dimensions(&self) -> Option<(u32, u32)>;
}
