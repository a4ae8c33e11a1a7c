use image::GrayImage;
use ndarray::Array2;

/// Summed-area tables of pixel values and squared pixel values, plus an
/// optional 45° rotated table for tilted Haar features.
///
/// The upright tables are `(height + 1) x (width + 1)` with a zero first row
/// and column, so any rectangle sum is four lookups.
pub struct IntegralImage {
    sum: Array2<u64>,
    sq_sum: Array2<u64>,
    tilted: Option<TiltedTable>,
    width: u32,
    height: u32,
}

/// Rotated summed-area table.
///
/// `T(X, Y)` is the sum of every pixel `(x, y)` with `y < Y` and
/// `|x - X + 1| <= Y - y - 1`: the upward 45° cone whose lowest pixel is
/// `(X - 1, Y - 1)`. Columns are stored with `offset` padding on both sides
/// so the recurrence never reads outside the table for `X` in `0..=width`.
struct TiltedTable {
    table: Array2<i64>,
    offset: usize,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut sum = Array2::<u64>::zeros((h + 1, w + 1));
        let mut sq_sum = Array2::<u64>::zeros((h + 1, w + 1));

        for y in 0..h {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32)[0] as u64;
                row_sum += v;
                row_sq += v * v;
                sum[[y + 1, x + 1]] = sum[[y, x + 1]] + row_sum;
                sq_sum[[y + 1, x + 1]] = sq_sum[[y, x + 1]] + row_sq;
            }
        }

        Self {
            sum,
            sq_sum,
            tilted: None,
            width,
            height,
        }
    }

    /// Upright tables plus the rotated table.
    pub fn with_tilted(image: &GrayImage) -> Self {
        let mut integral = Self::new(image);
        integral.tilted = Some(TiltedTable::new(image));
        integral
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_tilted(&self) -> bool {
        self.tilted.is_some()
    }

    /// Sum of pixels in `[x, x + w) x [y, y + h)`. The rectangle must lie inside the image.
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::lookup(&self.sum, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        Self::lookup(&self.sq_sum, x, y, w, h)
    }

    /// Sum of a rectangle rotated by 45°: top corner at `(x, y)`, `w` pixels
    /// along the down-right diagonal and `h` along the down-left one.
    ///
    /// Requires `x >= h`, `x + w <= width` and `y + w + h <= height`.
    /// Returns 0 when the rotated table was not built.
    pub fn tilted_sum(&self, x: u32, y: u32, w: u32, h: u32) -> i64 {
        let Some(tilted) = &self.tilted else {
            return 0;
        };
        let (x, y, w, h) = (x as usize, y as usize, w as usize, h as usize);
        tilted.at(x, y) - tilted.at(x - h, y + h) - tilted.at(x + w, y + w)
            + tilted.at(x + w - h, y + w + h)
    }

    fn lookup(table: &Array2<u64>, x: u32, y: u32, w: u32, h: u32) -> u64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        (table[[y1, x1]] + table[[y0, x0]]) - (table[[y0, x1]] + table[[y1, x0]])
    }
}

impl TiltedTable {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let offset = h + 1;
        let padded = w + 2 * offset + 1;
        let pixel = |x: isize, y: isize| -> i64 {
            if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
                0
            } else {
                image.get_pixel(x as u32, y as u32)[0] as i64
            }
        };

        // T(X, Y) = T(X-1, Y-1) + T(X+1, Y-1) - T(X, Y-2) + I(X-1, Y-1) + I(X-1, Y-2)
        let mut table = Array2::<i64>::zeros((h + 1, padded));
        for row in 1..=h {
            for col in 0..padded {
                let x = col as isize - offset as isize;
                let y = row as isize;
                let left = if col > 0 { table[[row - 1, col - 1]] } else { 0 };
                let right = if col + 1 < padded {
                    table[[row - 1, col + 1]]
                } else {
                    0
                };
                let above = if row >= 2 { table[[row - 2, col]] } else { 0 };
                table[[row, col]] =
                    left + right - above + pixel(x - 1, y - 1) + pixel(x - 1, y - 2);
            }
        }

        Self { table, offset }
    }

    fn at(&self, x: usize, y: usize) -> i64 {
        self.table[[y, x + self.offset]]
    }
}
