use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::detection::domain::detection_algorithm::{DetectionAlgorithm, DetectionError};
use crate::pipeline::cycle_logger::CycleLogger;
use crate::shared::frame::SharedFrame;
use crate::tracking::domain::throttle::ThrottlePolicy;
use crate::tracking::domain::tracking_error::TrackingError;
use crate::tracking::domain::vertex_buffer::VertexBuffer;
use crate::tracking::domain::worker_state::WorkerState;

use super::tracking_worker::TrackingWorker;

pub type WorkerHandle = Arc<TrackingWorker>;

/// Options fixed for the lifetime of one worker.
pub struct WorkerOptions {
    pub throttle: ThrottlePolicy,
    pub logger: Box<dyn CycleLogger>,
}

/// Owner of at most one live tracking worker.
///
/// `create_or_get` is race-free: concurrent callers all receive the same
/// handle and the algorithm is only built by the caller that starts the
/// worker. After `shutdown` the next `create_or_get` starts a fresh worker.
#[derive(Default)]
pub struct WorkerFactory {
    slot: Mutex<Option<WorkerHandle>>,
}

impl WorkerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live worker, starting one if there is none.
    ///
    /// `frame`, `buffer`, `options` and `make_algorithm` are only used when a
    /// new worker is started; an existing worker keeps its original inputs.
    /// A started worker gets `buffer` reset, so a buffer reused from an
    /// earlier worker reports nothing until the new worker publishes.
    pub fn create_or_get<F>(
        &self,
        frame: &SharedFrame,
        buffer: &Arc<VertexBuffer>,
        options: WorkerOptions,
        make_algorithm: F,
    ) -> Result<WorkerHandle, TrackingError>
    where
        F: FnOnce() -> Result<Box<dyn DetectionAlgorithm>, DetectionError>,
    {
        let mut slot = self.lock();
        if let Some(worker) = slot.as_ref() {
            return Ok(Arc::clone(worker));
        }

        let algorithm = make_algorithm()?;
        buffer.reset();
        let worker = Arc::new(TrackingWorker::spawn(
            frame.clone(),
            Arc::clone(buffer),
            algorithm,
            options.throttle,
            options.logger,
        )?);
        *slot = Some(Arc::clone(&worker));
        Ok(worker)
    }

    pub fn current(&self) -> Option<WorkerHandle> {
        self.lock().clone()
    }

    pub fn state(&self) -> WorkerState {
        self.lock()
            .as_ref()
            .map_or(WorkerState::Uninitialized, |worker| worker.state())
    }

    /// Stops and joins the live worker, then releases it.
    pub fn shutdown(&self) -> Result<(), TrackingError> {
        let worker = self.lock().take();
        match worker {
            Some(worker) => worker.ensure_completion(),
            None => Ok(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for WorkerFactory {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Tracking worker did not shut down cleanly: {e}");
        }
    }
}
