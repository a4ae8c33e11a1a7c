use std::sync::Arc;
use std::time::Duration;

use crate::detection::domain::detection_algorithm::{DetectionAlgorithm, DetectionError};
use crate::detection::domain::operation_mode::OperationMode;
use crate::detection::infrastructure::algorithm_factory;
use crate::pipeline::cycle_logger::StatsCycleLogger;
use crate::pipeline::tracker_config::TrackerConfig;
use crate::shared::frame::{Frame, SharedFrame};
use crate::tracking::domain::tracking_error::TrackingError;
use crate::tracking::domain::vertex_buffer::{VertexBuffer, VertexSnapshot};
use crate::tracking::domain::worker_state::WorkerState;
use crate::tracking::infrastructure::worker_factory::{WorkerFactory, WorkerHandle, WorkerOptions};

/// Builds the detection algorithm for a mode.
pub type AlgorithmBuilder =
    Box<dyn Fn(OperationMode) -> Result<Box<dyn DetectionAlgorithm>, DetectionError> + Send>;

/// Fixed-rate gate over a variable frame delta.
///
/// Accumulates elapsed time and fires at most once per `advance`, carrying
/// the remainder over to the next call.
#[derive(Debug, Clone)]
pub struct RefreshTimer {
    period: Duration,
    accumulated: Duration,
}

impl RefreshTimer {
    /// `rate` in frames per second; non-positive rates fire on every advance.
    pub fn new(rate: f32) -> Self {
        let period = if rate.is_finite() && rate > 0.0 {
            Duration::from_secs_f32(1.0 / rate)
        } else {
            Duration::ZERO
        };
        Self {
            period,
            accumulated: Duration::ZERO,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn advance(&mut self, delta: Duration) -> bool {
        self.accumulated += delta;
        if self.accumulated >= self.period {
            self.accumulated -= self.period;
            true
        } else {
            false
        }
    }
}

/// Host side of tracking: owns the frame slot, the vertex buffer and the
/// worker factory, and drives them from a render or capture loop.
///
/// A mode change stops the live worker and starts a new one with a fresh
/// buffer; a running worker never swaps its algorithm. Once started, the
/// session keeps trying to run a worker for its mode until `shutdown`, even
/// after a mode change whose algorithm failed to build.
pub struct TrackingSession {
    config: TrackerConfig,
    mode: OperationMode,
    frame: SharedFrame,
    buffer: Arc<VertexBuffer>,
    factory: WorkerFactory,
    build: AlgorithmBuilder,
    timer: RefreshTimer,
    stream_active: bool,
    started: bool,
    frames_fed: usize,
}

impl TrackingSession {
    /// Session using the detectors named in `config`.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackingError> {
        let edge = config.edge;
        let cascade = config.cascade.clone();
        let build: AlgorithmBuilder =
            Box::new(move |mode| algorithm_factory::build_algorithm(mode, &edge, &cascade));
        Self::with_builder(config, build)
    }

    pub fn with_builder(config: TrackerConfig, build: AlgorithmBuilder) -> Result<Self, TrackingError> {
        let buffer = Arc::new(VertexBuffer::new(config.max_vertices)?);
        Ok(Self {
            mode: config.mode,
            timer: RefreshTimer::new(config.refresh_rate),
            config,
            frame: SharedFrame::default(),
            buffer,
            factory: WorkerFactory::new(),
            build,
            stream_active: false,
            started: false,
            frames_fed: 0,
        })
    }

    /// Publishes the first frame and starts the worker for the current mode.
    pub fn start(&mut self, first_frame: Frame) -> Result<WorkerHandle, TrackingError> {
        self.frame.replace(first_frame);
        self.frames_fed += 1;
        let worker = self.spawn_worker()?;
        self.stream_active = true;
        self.started = true;
        log::info!(
            "Tracking started in {} mode (capacity {})",
            self.mode,
            self.buffer.capacity()
        );
        Ok(worker)
    }

    /// Replaces the shared frame. Returns the latest snapshot if the worker
    /// has published a cycle that is not being overwritten.
    pub fn tick(&mut self, frame: Frame) -> Option<VertexSnapshot> {
        if !self.stream_active {
            return None;
        }
        self.frame.replace(frame);
        self.frames_fed += 1;
        self.buffer.is_finished().then(|| self.buffer.snapshot())
    }

    /// Rate-gated tick. `next_frame` is only called when the refresh timer
    /// fires; returning `None` ends the stream.
    pub fn advance<F>(&mut self, delta: Duration, next_frame: F) -> Option<VertexSnapshot>
    where
        F: FnOnce() -> Option<Frame>,
    {
        if !self.stream_active || !self.timer.advance(delta) {
            return None;
        }
        match next_frame() {
            Some(frame) => self.tick(frame),
            None => {
                log::info!("Frame source closed after {} frames", self.frames_fed);
                self.stream_active = false;
                None
            }
        }
    }

    /// Moves to the next mode in the cycle and restarts the worker.
    pub fn change_mode(&mut self) -> Result<OperationMode, TrackingError> {
        let next = self.mode.next();
        self.set_mode(next)?;
        Ok(next)
    }

    /// Switches detectors. On a started session the worker is restarted,
    /// and a build error is returned with the session left in `mode` and no
    /// worker; the next `set_mode` or `change_mode` tries again.
    pub fn set_mode(&mut self, mode: OperationMode) -> Result<(), TrackingError> {
        let running = self.factory.current().is_some();
        if mode == self.mode && (running || !self.started) {
            return Ok(());
        }
        self.factory.shutdown()?;
        self.buffer = Arc::new(VertexBuffer::new(self.config.max_vertices)?);
        self.mode = mode;
        log::info!("Switched tracking mode to {mode}");
        if self.started {
            self.spawn_worker()?;
        }
        Ok(())
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn is_stream_active(&self) -> bool {
        self.stream_active
    }

    /// Whether the worker has published its latest cycle.
    pub fn is_finished(&self) -> bool {
        self.buffer.is_finished()
    }

    pub fn snapshot(&self) -> VertexSnapshot {
        self.buffer.snapshot()
    }

    pub fn buffer(&self) -> &Arc<VertexBuffer> {
        &self.buffer
    }

    pub fn worker(&self) -> Option<WorkerHandle> {
        self.factory.current()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.factory.state()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn frames_fed(&self) -> usize {
        self.frames_fed
    }

    /// Stops and joins the worker. The session can be started again.
    pub fn shutdown(&mut self) -> Result<(), TrackingError> {
        self.stream_active = false;
        self.started = false;
        self.factory.shutdown()
    }

    fn spawn_worker(&self) -> Result<WorkerHandle, TrackingError> {
        let options = WorkerOptions {
            throttle: self.config.throttle_policy(),
            logger: Box::new(StatsCycleLogger::default()),
        };
        let mode = self.mode;
        self.factory
            .create_or_get(&self.frame, &self.buffer, options, || (self.build)(mode))
    }
}
