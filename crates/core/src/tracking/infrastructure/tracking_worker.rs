use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::detection::domain::detection_algorithm::{Detection, DetectionAlgorithm, DetectionError};
use crate::pipeline::cycle_logger::CycleLogger;
use crate::shared::frame::SharedFrame;
use crate::tracking::domain::throttle::{ItemThrottle, StopSignal, ThrottlePolicy};
use crate::tracking::domain::tracking_error::TrackingError;
use crate::tracking::domain::vertex_buffer::{StagingBuffer, VertexBuffer};
use crate::tracking::domain::worker_state::{AtomicWorkerState, WorkerState};

static NEXT_WORKER_ID: AtomicU64 = AtomicU64::new(1);

/// State shared between the worker thread and its handle.
struct WorkerShared {
    state: AtomicWorkerState,
    stop: StopSignal,
    buffer: Arc<VertexBuffer>,
    last_error: Mutex<Option<String>>,
    cycles: AtomicU64,
}

/// Background detection loop over a host-owned frame.
///
/// Each cycle snapshots the current frame, runs the detection algorithm,
/// writes the result through the item throttle into a staging buffer and
/// publishes it to the [`VertexBuffer`] as a whole.
///
/// Cancellation is cooperative: a stop request is honored between cycles,
/// so the pass in progress finishes and publishes before the thread exits.
/// The startup and inter-cycle pauses end early on a stop request; the
/// per-item pauses do not.
pub struct TrackingWorker {
    id: u64,
    shared: Arc<WorkerShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TrackingWorker {
    /// Starts the worker thread.
    pub fn spawn(
        frame: SharedFrame,
        buffer: Arc<VertexBuffer>,
        algorithm: Box<dyn DetectionAlgorithm>,
        throttle: ThrottlePolicy,
        logger: Box<dyn CycleLogger>,
    ) -> Result<Self, TrackingError> {
        let id = NEXT_WORKER_ID.fetch_add(1, Ordering::Relaxed);
        let shared = Arc::new(WorkerShared {
            state: AtomicWorkerState::new(WorkerState::Running),
            stop: StopSignal::new(),
            buffer,
            last_error: Mutex::new(None),
            cycles: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("tracking-{id}"))
            .spawn(move || {
                let mut algorithm = algorithm;
                let mut logger = logger;
                run(&thread_shared, &frame, algorithm.as_mut(), &throttle, logger.as_mut());
                thread_shared.state.advance(WorkerState::Stopped);
                logger.summary();
            })
            .map_err(TrackingError::ThreadUnavailable)?;

        log::info!("Tracking worker {id} started");
        Ok(Self {
            id,
            shared,
            thread: Mutex::new(Some(handle)),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state.load()
    }

    pub fn buffer(&self) -> &Arc<VertexBuffer> {
        &self.shared.buffer
    }

    /// Asks the loop to exit after the current cycle. Idempotent and non-blocking.
    pub fn request_stop(&self) {
        if self.shared.stop.request() {
            self.shared.state.advance(WorkerState::StopRequested);
            log::debug!("Stop requested for tracking worker {}", self.id);
        }
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.stop.is_requested()
    }

    /// Requests stop and blocks until the thread has exited.
    ///
    /// Safe to call repeatedly and from several threads; later calls return
    /// once the first join has finished.
    pub fn ensure_completion(&self) -> Result<(), TrackingError> {
        self.request_stop();
        let mut thread = self.thread.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(handle) = thread.take() else {
            return Ok(());
        };
        let joined = handle.join();
        self.shared.state.advance(WorkerState::Stopped);
        match joined {
            Ok(()) => {
                log::info!("Tracking worker {} stopped", self.id);
                Ok(())
            }
            Err(_) => {
                log::error!("Tracking worker {} panicked", self.id);
                Err(TrackingError::WorkerPanicked)
            }
        }
    }

    /// Whether the latest cycle's vertices have been published.
    pub fn is_finished(&self) -> bool {
        self.shared.buffer.is_finished()
    }

    /// Message of the most recent failed cycle, cleared by the next successful one.
    pub fn last_error(&self) -> Option<String> {
        self.shared
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.shared.cycles.load(Ordering::Acquire)
    }
}

impl Drop for TrackingWorker {
    fn drop(&mut self) {
        let _ = self.ensure_completion();
    }
}

impl std::fmt::Debug for TrackingWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingWorker")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("cycles", &self.cycles_completed())
            .finish()
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

fn run(
    shared: &WorkerShared,
    frame: &SharedFrame,
    algorithm: &mut dyn DetectionAlgorithm,
    policy: &ThrottlePolicy,
    logger: &mut dyn CycleLogger,
) {
    if shared.stop.pause(policy.startup_delay) {
        return;
    }

    let buffer = &shared.buffer;
    let capacity = buffer.capacity();
    let mut staging = StagingBuffer::new(capacity);
    let mut items = ItemThrottle::new(policy);

    loop {
        buffer.begin_cycle();
        staging.clear();

        let t0 = Instant::now();
        let gray = frame.to_gray();
        logger.timing("snapshot", elapsed_ms(t0));

        let t0 = Instant::now();
        let result = gray
            .map_err(DetectionError::from)
            .and_then(|gray| algorithm.detect(&gray, capacity));
        logger.timing("detect", elapsed_ms(t0));

        let detection = match result {
            Ok(detection) => {
                *shared.last_error.lock().unwrap_or_else(PoisonError::into_inner) = None;
                detection
            }
            Err(e) => {
                log::warn!("{} detection failed: {e}", algorithm.name());
                *shared.last_error.lock().unwrap_or_else(PoisonError::into_inner) =
                    Some(e.to_string());
                Detection::default()
            }
        };

        let t0 = Instant::now();
        for vertex in detection.primary {
            items.admit();
            if !staging.push_primary(vertex) {
                break;
            }
        }
        for vertex in detection.secondary {
            items.admit();
            if !staging.push_secondary(vertex) {
                break;
            }
        }
        logger.metric("vertices", staging.primary_len() as f64);
        logger.metric("secondary_vertices", staging.secondary_len() as f64);
        buffer.publish(&mut staging);
        logger.timing("publish", elapsed_ms(t0));

        let cycle = shared.cycles.fetch_add(1, Ordering::AcqRel) + 1;
        logger.cycle_completed(cycle);

        if shared.stop.pause(policy.cycle_pause) {
            break;
        }
    }
}
