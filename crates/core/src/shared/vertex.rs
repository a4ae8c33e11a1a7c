use serde::{Deserialize, Serialize};

/// A detected 2-D feature point as handed to the renderer.
///
/// Axis convention: `x` holds the pixel **row** and `y` the pixel
/// **column**. The downstream renderer reads vertices this way, so both
/// detectors build vertices through [`Vertex::from_pixel`] only.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f32,
    pub y: f32,
}

impl Vertex {
    /// Builds a vertex from image coordinates (`column`, `row`).
    pub fn from_pixel(column: i32, row: i32) -> Self {
        Self {
            x: row as f32,
            y: column as f32,
        }
    }

    pub fn row(&self) -> f32 {
        self.x
    }

    pub fn column(&self) -> f32 {
        self.y
    }
}
