//! Stream admission: the only shared mutable resource across conversations.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Hard ceiling on simultaneously streaming conversations.
pub const MAX_STREAMING_CONVERSATIONS: usize = 5;

/// Atomic admission check for streaming slots.
///
/// `try_acquire`/`release` only — no queuing, no fairness. A caller refused
/// admission decides for itself whether to queue, retry, or surface the
/// refusal. Every other piece of engine state is owned by exactly one
/// conversation; this counter is the one cross-conversation resource.
#[derive(Debug)]
pub struct StreamGate {
    active: AtomicUsize,
    capacity: usize,
}

impl StreamGate {
    /// A gate with an explicit capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            active: AtomicUsize::new(0),
            capacity,
        }
    }

    /// Claim a slot. Returns `false` when the gate is saturated.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.capacity).then_some(active + 1)
            })
            .is_ok()
    }

    /// Return a slot. Saturates at zero rather than underflowing.
    pub fn release(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                active.checked_sub(1)
            });
    }

    /// Slots currently claimed.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Total slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for StreamGate {
    fn default() -> Self {
        Self::new(MAX_STREAMING_CONVERSATIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn acquires_up_to_capacity() {
        let gate = StreamGate::default();
        for _ in 0..MAX_STREAMING_CONVERSATIONS {
            assert!(gate.try_acquire());
        }
        assert!(!gate.try_acquire());
        assert_eq!(gate.active(), 5);
    }

    #[test]
    fn release_reopens_a_slot() {
        let gate = StreamGate::new(2);
        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        gate.release();
        assert!(gate.try_acquire());
    }

    #[test]
    fn release_saturates_at_zero() {
        let gate = StreamGate::new(1);
        gate.release();
        assert_eq!(gate.active(), 0);
        assert!(gate.try_acquire());
        assert_eq!(gate.active(), 1);
    }

    #[test]
    fn contended_acquires_never_exceed_capacity() {
        let gate = Arc::new(StreamGate::new(5));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = Arc::clone(&gate);
            handles.push(std::thread::spawn(move || {
                usize::from(gate.try_acquire())
            }));
        }
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 5);
        assert_eq!(gate.active(), 5);
    }
}
