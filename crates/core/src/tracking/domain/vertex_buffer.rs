use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::shared::vertex::Vertex;

use super::tracking_error::TrackingError;

/// One published detection cycle.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct VertexSnapshot {
    pub primary: Vec<Vertex>,
    pub secondary: Vec<Vertex>,
    /// Number of cycles published so far, this one included. 0 before the first publish.
    pub cycle: u64,
}

impl VertexSnapshot {
    pub fn count(&self) -> usize {
        self.primary.len()
    }

    pub fn secondary_count(&self) -> usize {
        self.secondary.len()
    }
}

/// Fixed-capacity vertex store shared between a worker and the host.
///
/// The worker fills a private [`StagingBuffer`] and publishes it as a whole,
/// so readers always see one complete cycle. The completion flag is cleared
/// when a cycle starts and set after its publish.
#[derive(Debug)]
pub struct VertexBuffer {
    capacity: usize,
    published: Mutex<VertexSnapshot>,
    completed: AtomicBool,
}

impl VertexBuffer {
    pub fn new(capacity: usize) -> Result<Self, TrackingError> {
        if capacity == 0 {
            return Err(TrackingError::InvalidCapacity);
        }
        Ok(Self {
            capacity,
            published: Mutex::new(VertexSnapshot::default()),
            completed: AtomicBool::new(false),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn snapshot(&self) -> VertexSnapshot {
        self.lock().clone()
    }

    /// Primary vertex count of the last published cycle.
    pub fn count(&self) -> usize {
        self.lock().primary.len()
    }

    pub fn cycle(&self) -> u64 {
        self.lock().cycle
    }

    /// Whether the most recent cycle has been published and no new one has started.
    pub fn is_finished(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Drops published vertices and the cycle count ahead of a new writer.
    pub(crate) fn reset(&self) {
        *self.lock() = VertexSnapshot::default();
        self.completed.store(false, Ordering::Release);
    }

    pub(crate) fn begin_cycle(&self) {
        self.completed.store(false, Ordering::Release);
    }

    /// Swaps the staged vertices in as the new published cycle.
    ///
    /// The staging buffer receives the previous cycle's storage, cleared.
    pub(crate) fn publish(&self, staging: &mut StagingBuffer) {
        {
            let mut published = self.lock();
            std::mem::swap(&mut published.primary, &mut staging.primary);
            std::mem::swap(&mut published.secondary, &mut staging.secondary);
            published.cycle += 1;
        }
        staging.clear();
        self.completed.store(true, Ordering::Release);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VertexSnapshot> {
        self.published.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker-private write side of a [`VertexBuffer`]. Pushes beyond capacity are dropped.
#[derive(Debug)]
pub struct StagingBuffer {
    capacity: usize,
    primary: Vec<Vertex>,
    secondary: Vec<Vertex>,
}

impl StagingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            primary: Vec::with_capacity(capacity),
            secondary: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns false when the vertex did not fit.
    pub fn push_primary(&mut self, vertex: Vertex) -> bool {
        if self.primary.len() >= self.capacity {
            return false;
        }
        self.primary.push(vertex);
        true
    }

    pub fn push_secondary(&mut self, vertex: Vertex) -> bool {
        if self.secondary.len() >= self.capacity {
            return false;
        }
        self.secondary.push(vertex);
        true
    }

    pub fn primary_len(&self) -> usize {
        self.primary.len()
    }

    pub fn secondary_len(&self) -> usize {
        self.secondary.len()
    }

    pub fn clear(&mut self) {
        self.primary.clear();
        self.secondary.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(i: i32) -> Vertex {
        Vertex::from_pixel(i, i)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(matches!(VertexBuffer::new(0), Err(TrackingError::InvalidCapacity)));
    }

    #[test]
    fn test_new_buffer_is_empty_and_unfinished() {
        let buffer = VertexBuffer::new(10).unwrap();
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.cycle(), 0);
        assert!(!buffer.is_finished());
    }

    #[test]
    fn test_staging_drops_pushes_beyond_capacity() {
        let mut staging = StagingBuffer::new(2);
        assert!(staging.push_primary(v(0)));
        assert!(staging.push_primary(v(1)));
        assert!(!staging.push_primary(v(2)));
        assert_eq!(staging.primary_len(), 2);
    }

    #[test]
    fn test_publish_replaces_whole_cycle() {
        let buffer = VertexBuffer::new(4).unwrap();
        let mut staging = StagingBuffer::new(4);

        buffer.begin_cycle();
        for i in 0..3 {
            staging.push_primary(v(i));
        }
        staging.push_secondary(v(9));
        buffer.publish(&mut staging);

        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.primary, vec![v(0), v(1), v(2)]);
        assert_eq!(snapshot.secondary, vec![v(9)]);
        assert_eq!(snapshot.cycle, 1);
        assert!(buffer.is_finished());
        assert_eq!(staging.primary_len(), 0);
        assert_eq!(staging.secondary_len(), 0);

        buffer.begin_cycle();
        staging.push_primary(v(5));
        assert!(!buffer.is_finished());
        // staged writes are invisible until publish
        assert_eq!(buffer.count(), 3);

        buffer.publish(&mut staging);
        assert_eq!(buffer.snapshot().primary, vec![v(5)]);
        assert!(buffer.snapshot().secondary.is_empty());
        assert_eq!(buffer.cycle(), 2);
    }

    #[test]
    fn test_reset_forgets_published_cycle() {
        let buffer = VertexBuffer::new(4).unwrap();
        let mut staging = StagingBuffer::new(4);
        buffer.begin_cycle();
        staging.push_primary(v(1));
        staging.push_secondary(v(2));
        buffer.publish(&mut staging);

        buffer.reset();

        assert_eq!(buffer.snapshot(), VertexSnapshot::default());
        assert!(!buffer.is_finished());
        assert_eq!(buffer.capacity(), 4);
    }

    #[test]
    fn test_snapshot_serializes_vertices() {
        let snapshot = VertexSnapshot {
            primary: vec![Vertex::from_pixel(1, 2)],
            secondary: vec![],
            cycle: 7,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["cycle"], 7);
        assert_eq!(json["primary"][0]["x"], 2.0);
        assert_eq!(json["primary"][0]["y"], 1.0);
    }
}
