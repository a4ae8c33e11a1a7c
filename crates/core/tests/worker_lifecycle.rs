// Worker lifecycle tests for fancam-core

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use image::GrayImage;

use fancam_core::detection::domain::detection_algorithm::{
    Detection, DetectionAlgorithm, DetectionError,
};
use fancam_core::pipeline::cycle_logger::NullCycleLogger;
use fancam_core::shared::frame::{Frame, SharedFrame};
use fancam_core::shared::vertex::Vertex;
use fancam_core::tracking::domain::throttle::ThrottlePolicy;
use fancam_core::tracking::domain::vertex_buffer::VertexBuffer;
use fancam_core::tracking::domain::worker_state::WorkerState;
use fancam_core::tracking::infrastructure::worker_factory::{WorkerFactory, WorkerOptions};

/// Emits `count` vertices per pass and reports each pass start on `started`.
struct CountingAlgorithm {
    count: usize,
    started: Option<Sender<()>>,
}

impl CountingAlgorithm {
    fn boxed(count: usize) -> Box<dyn DetectionAlgorithm> {
        Box::new(Self {
            count,
            started: None,
        })
    }
}

impl DetectionAlgorithm for CountingAlgorithm {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn detect(&mut self, _frame: &GrayImage, capacity: usize) -> Result<Detection, DetectionError> {
        if let Some(started) = &self.started {
            let _ = started.try_send(());
        }
        Ok(Detection {
            primary: (0..self.count.min(capacity))
                .map(|i| Vertex::from_pixel(i as i32 % 640, i as i32 / 640))
                .collect(),
            secondary: Vec::new(),
        })
    }
}

fn frame() -> SharedFrame {
    SharedFrame::new(Frame::new(vec![10; 32 * 32 * 3], 32, 32, 3, 0))
}

fn unthrottled() -> WorkerOptions {
    WorkerOptions {
        throttle: ThrottlePolicy::unthrottled(),
        logger: Box::new(NullCycleLogger),
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_concurrent_requests_return_same_worker() {
    let factory = Arc::new(WorkerFactory::new());
    let frame = frame();
    let buffer = Arc::new(VertexBuffer::new(16).unwrap());
    let builds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let frame = frame.clone();
            let buffer = Arc::clone(&buffer);
            let builds = Arc::clone(&builds);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                factory
                    .create_or_get(&frame, &buffer, unthrottled(), || {
                        builds.fetch_add(1, Ordering::SeqCst);
                        Ok(CountingAlgorithm::boxed(1))
                    })
                    .unwrap()
            })
        })
        .collect();

    let workers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    for worker in &workers[1..] {
        assert!(Arc::ptr_eq(&workers[0], worker));
    }
    factory.shutdown().unwrap();
}

#[test]
fn test_stop_mid_write_publishes_whole_cycle() {
    let factory = WorkerFactory::new();
    let buffer = Arc::new(VertexBuffer::new(1000).unwrap());
    let (started_tx, started_rx) = crossbeam_channel::bounded(1);
    // 1000 writes at 10 per ms: the pass takes ~100 ms
    let options = WorkerOptions {
        throttle: ThrottlePolicy {
            item_budget: 10,
            item_interval: Duration::from_millis(1),
            ..ThrottlePolicy::unthrottled()
        },
        logger: Box::new(NullCycleLogger),
    };

    let worker = factory
        .create_or_get(&frame(), &buffer, options, || {
            Ok(Box::new(CountingAlgorithm {
                count: 1000,
                started: Some(started_tx),
            }))
        })
        .unwrap();

    started_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    worker.request_stop();
    assert!(!worker.is_finished());
    worker.ensure_completion().unwrap();

    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(worker.is_finished());
    assert_eq!(worker.cycles_completed(), 1);
    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.count(), 1000);
    assert_eq!(snapshot.cycle, 1);
}

#[test]
fn test_recreate_after_shutdown_starts_fresh_worker() {
    let factory = WorkerFactory::new();
    let frame = frame();
    let buffer = Arc::new(VertexBuffer::new(8).unwrap());

    let first = factory
        .create_or_get(&frame, &buffer, unthrottled(), || Ok(CountingAlgorithm::boxed(3)))
        .unwrap();
    wait_until(|| buffer.cycle() > 0 && buffer.count() == 3);

    first.request_stop();
    first.ensure_completion().unwrap();
    factory.shutdown().unwrap();
    assert_eq!(factory.state(), WorkerState::Uninitialized);

    let fresh_buffer = Arc::new(VertexBuffer::new(8).unwrap());
    let second = factory
        .create_or_get(&frame, &fresh_buffer, unthrottled(), || {
            Ok(CountingAlgorithm::boxed(5))
        })
        .unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(second.state(), WorkerState::Running);
    assert!(Arc::ptr_eq(second.buffer(), &fresh_buffer));

    wait_until(|| fresh_buffer.cycle() > 0 && fresh_buffer.count() == 5);
    // the old buffer is no longer written
    assert_eq!(buffer.count(), 3);
    factory.shutdown().unwrap();
}

#[test]
fn test_recreate_with_same_buffer_hides_previous_cycle() {
    let factory = WorkerFactory::new();
    let frame = frame();
    let buffer = Arc::new(VertexBuffer::new(8).unwrap());

    factory
        .create_or_get(&frame, &buffer, unthrottled(), || Ok(CountingAlgorithm::boxed(3)))
        .unwrap();
    wait_until(|| buffer.cycle() > 0 && buffer.count() == 3);
    factory.shutdown().unwrap();
    assert!(buffer.is_finished());

    let delayed = WorkerOptions {
        throttle: ThrottlePolicy {
            startup_delay: Duration::from_secs(5),
            ..ThrottlePolicy::unthrottled()
        },
        logger: Box::new(NullCycleLogger),
    };
    let second = factory
        .create_or_get(&frame, &buffer, delayed, || Ok(CountingAlgorithm::boxed(5)))
        .unwrap();

    // still in its startup delay: nothing from the old worker may show through
    assert_eq!(buffer.count(), 0);
    assert_eq!(buffer.cycle(), 0);
    assert!(!buffer.is_finished());
    assert!(!second.is_finished());

    factory.shutdown().unwrap();
    assert_eq!(buffer.cycle(), 0);
}

#[test]
fn test_host_reads_only_whole_cycles() {
    let factory = WorkerFactory::new();
    let buffer = Arc::new(VertexBuffer::new(200).unwrap());
    let options = WorkerOptions {
        throttle: ThrottlePolicy {
            item_budget: 50,
            item_interval: Duration::from_millis(1),
            ..ThrottlePolicy::unthrottled()
        },
        logger: Box::new(NullCycleLogger),
    };
    factory
        .create_or_get(&frame(), &buffer, options, || Ok(CountingAlgorithm::boxed(200)))
        .unwrap();

    let deadline = Instant::now() + Duration::from_millis(200);
    while Instant::now() < deadline {
        let snapshot = buffer.snapshot();
        assert!(
            snapshot.count() == 0 || snapshot.count() == 200,
            "saw a partial cycle of {} vertices",
            snapshot.count()
        );
    }
    factory.shutdown().unwrap();
}

#[test]
fn test_shared_frame_outlives_worker() {
    let factory = WorkerFactory::new();
    let frame = frame();
    let buffer = Arc::new(VertexBuffer::new(4).unwrap());
    factory
        .create_or_get(&frame, &buffer, unthrottled(), || Ok(CountingAlgorithm::boxed(1)))
        .unwrap();

    for i in 0..20 {
        frame.replace(Frame::new(vec![i as u8; 16 * 16], 16, 16, 1, i));
        thread::sleep(Duration::from_millis(1));
    }

    factory.shutdown().unwrap();
    assert_eq!(frame.index(), 19);
}
