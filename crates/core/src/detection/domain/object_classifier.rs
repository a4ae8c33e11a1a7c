use image::GrayImage;

use crate::shared::region::Region;

/// Domain interface for a trained sliding-window object classifier.
///
/// Returns every grouped match in `image`, in scan order, with coordinates
/// relative to `image`.
pub trait ObjectClassifier: Send {
    fn detect_multi_scale(&self, image: &GrayImage) -> Vec<Region>;
}
