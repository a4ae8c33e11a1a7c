use image::{Rgb, RgbImage};
use imageproc::drawing::draw_cross_mut;

use crate::shared::vertex::Vertex;
use crate::tracking::domain::vertex_buffer::VertexSnapshot;

pub const PRIMARY_MARKER: Rgb<u8> = Rgb([0, 255, 0]);
pub const SECONDARY_MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Draws a cross marker on `image` for every vertex of `snapshot`.
///
/// Vertices carry the row in `x` and the column in `y`; markers are placed
/// at the pixel the vertex was detected on. Markers partly outside the
/// image are clipped.
pub fn draw_vertex_markers(image: &mut RgbImage, snapshot: &VertexSnapshot) {
    draw_markers(image, &snapshot.primary, PRIMARY_MARKER);
    draw_markers(image, &snapshot.secondary, SECONDARY_MARKER);
}

fn draw_markers(image: &mut RgbImage, vertices: &[Vertex], color: Rgb<u8>) {
    for v in vertices {
        draw_cross_mut(image, color, v.column() as i32, v.row() as i32);
    }
}
