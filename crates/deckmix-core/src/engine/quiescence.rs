//! Quiescence barrier for structural changes
//!
//! The control thread raises the request epoch. At a block boundary where
//! the command ring is empty, the audio thread copies the request epoch
//! into the acknowledged epoch. Once they match, everything queued before
//! the request has been applied and the control thread may swap shared
//! tables.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct QuiescenceBarrier {
    requested: AtomicU64,
    acknowledged: AtomicU64,
}

impl QuiescenceBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the audio thread to confirm an idle block boundary; returns the epoch
    pub fn request(&self) -> u64 {
        self.requested.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// True once the latest request has been acknowledged
    pub fn is_quiescent(&self) -> bool {
        self.acknowledged.load(Ordering::Acquire) >= self.requested.load(Ordering::Acquire)
    }

    /// Audio thread, at a block boundary
    ///
    /// Acknowledges an outstanding request when `queue_empty`; returns the
    /// epoch acknowledged, if any.
    pub fn acknowledge(&self, queue_empty: bool) -> Option<u64> {
        if !queue_empty {
            return None;
        }
        let requested = self.requested.load(Ordering::Acquire);
        if self.acknowledged.load(Ordering::Relaxed) < requested {
            self.acknowledged.store(requested, Ordering::Release);
            Some(requested)
        } else {
            None
        }
    }

    pub fn requested_epoch(&self) -> u64 {
        self.requested.load(Ordering::Acquire)
    }

    pub fn acknowledged_epoch(&self) -> u64 {
        self.acknowledged.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_barrier_is_quiescent() {
        assert!(QuiescenceBarrier::new().is_quiescent());
    }

    #[test]
    fn test_request_waits_for_empty_queue() {
        let barrier = QuiescenceBarrier::new();
        let epoch = barrier.request();
        assert!(!barrier.is_quiescent());

        assert_eq!(barrier.acknowledge(false), None);
        assert!(!barrier.is_quiescent());

        assert_eq!(barrier.acknowledge(true), Some(epoch));
        assert!(barrier.is_quiescent());

        // Nothing outstanding: no repeat acknowledgement
        assert_eq!(barrier.acknowledge(true), None);
    }
}
