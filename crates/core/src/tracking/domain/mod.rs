pub mod throttle;
pub mod tracking_error;
pub mod vertex_buffer;
pub mod worker_state;
