pub mod cycle_logger;
pub mod tracker_config;
pub mod tracking_session;
pub mod vertex_overlay;
