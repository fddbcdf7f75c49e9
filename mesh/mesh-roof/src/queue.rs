//! Time-ordered collision queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::collision::CollisionKind;

/// A queued collision candidate.
#[derive(Debug, Clone, Copy)]
pub struct QueueEntry {
    /// Simulation time of the candidate.
    pub time: f64,
    /// Kind of the candidate at insertion.
    pub kind: CollisionKind,
    /// Insertion order, used to break exact ties.
    pub sequence: u64,
    /// Index of the candidate in the collision arena.
    pub collision: usize,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap behavior (earliest time = highest priority)
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.kind.rank().cmp(&self.kind.rank()))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Min-heap of collision candidates keyed by time.
///
/// Candidates at equal times pop merges first, then splits, then boundary
/// hits, then in insertion order. Stale candidates are not removed here;
/// the simulation re-checks each one as it reaches the front.
#[derive(Debug, Default)]
pub struct EventQueue {
    heap: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl EventQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue collision `collision` at `time`; returns its sequence number.
    pub fn push(&mut self, time: f64, kind: CollisionKind, collision: usize) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(QueueEntry {
            time,
            kind,
            sequence,
            collision,
        });
        sequence
    }

    /// Remove and return the earliest candidate.
    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.heap.pop()
    }

    /// Number of queued candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(2.0, CollisionKind::Merge, 0);
        queue.push(0.5, CollisionKind::Split, 1);
        queue.push(1.0, CollisionKind::Boundary, 2);

        assert_eq!(queue.len(), 3);
        let order: Vec<usize> = std::iter::from_fn(|| queue.pop().map(|e| e.collision)).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_times_break_by_kind_then_sequence() {
        let mut queue = EventQueue::new();
        queue.push(1.0, CollisionKind::Boundary, 0);
        queue.push(1.0, CollisionKind::Split, 1);
        queue.push(1.0, CollisionKind::Merge, 2);
        queue.push(1.0, CollisionKind::Merge, 3);

        let order: Vec<usize> = std::iter::from_fn(|| queue.pop().map(|e| e.collision)).collect();
        assert_eq!(order, vec![2, 3, 1, 0]);
    }
}
