/// Vertices the host allocates for the worker by default.
pub const DEFAULT_MAX_VERTICES: usize = 1000;

pub const EDGE_LOW_THRESHOLD: f32 = 50.0;
pub const EDGE_THRESHOLD_RATIO: f32 = 3.0;
/// Sobel aperture used by the edge detector. Only 3 is supported.
pub const EDGE_KERNEL_SIZE: u32 = 3;
/// Radius of the box filter applied before edge detection (3x3 kernel).
pub const EDGE_BLUR_RADIUS: u32 = 1;

pub const FACE_CASCADE_NAME: &str = "haarcascade_frontalface_alt.xml";
pub const EYE_CASCADE_NAME: &str = "haarcascade_eye_tree_eyeglasses.xml";
pub const BUNDLED_CASCADE_DIR: &str = "cascades";

pub const CASCADE_SCALE_FACTOR: f64 = 1.1;
pub const CASCADE_MIN_NEIGHBORS: usize = 3;

pub const STARTUP_DELAY_MS: u64 = 30;
pub const CYCLE_PAUSE_MS: u64 = 10;
/// One vertex write per `ITEM_INTERVAL_MS` per worker.
pub const ITEM_BUDGET: u32 = 1;
pub const ITEM_INTERVAL_MS: u64 = 10;

/// Host frame refresh rate in frames per second.
pub const DEFAULT_REFRESH_RATE: f32 = 30.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const APP_DIR_NAME: &str = "FanCam";
