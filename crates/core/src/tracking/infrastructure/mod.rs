pub mod tracking_worker;
pub mod worker_factory;
