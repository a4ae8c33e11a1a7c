//! Background feature tracking over a live frame.
//!
//! A host owns a [`pipeline::tracking_session::TrackingSession`], overwrites
//! its shared frame once per tick and polls the vertex buffer. A single
//! worker thread per session runs the detection algorithm for the current
//! [`detection::domain::operation_mode::OperationMode`] and publishes whole
//! cycles of vertices.

pub mod capture;
pub mod detection;
pub mod pipeline;
pub mod shared;
pub mod tracking;
