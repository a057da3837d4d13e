//! Closed, finite FIFO of targets for one root's scan phase.
//!
//! All targets are enqueued before any worker starts and the sending side
//! is dropped immediately, so a take either yields the next target or
//! reports that the queue is drained. There are no late enqueues and no
//! re-delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, unbounded};

use treecensus_core::Target;

/// Statistics for the work queue.
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total targets enqueued.
    pub enqueued: AtomicU64,
    /// Total targets taken by workers.
    pub dequeued: AtomicU64,
}

impl QueueStats {
    /// Targets not yet taken.
    pub fn remaining(&self) -> u64 {
        self.enqueued
            .load(Ordering::Relaxed)
            .saturating_sub(self.dequeued.load(Ordering::Relaxed))
    }
}

/// Work queue shared by a root's workers.
#[derive(Debug, Clone)]
pub struct WorkQueue {
    receiver: Receiver<Target>,
    stats: Arc<QueueStats>,
}

impl WorkQueue {
    /// Fill a queue with every target and close it.
    pub fn closed<I>(targets: I) -> Self
    where
        I: IntoIterator<Item = Target>,
    {
        let (sender, receiver) = unbounded();
        let stats = Arc::new(QueueStats::default());

        for target in targets {
            // The receiver is alive in this scope, so the send cannot fail.
            if sender.send(target).is_ok() {
                stats.enqueued.fetch_add(1, Ordering::Relaxed);
            }
        }
        drop(sender);

        Self { receiver, stats }
    }

    /// Take the next target, or `None` once the queue is drained.
    ///
    /// Each target is delivered to exactly one caller.
    pub fn take(&self) -> Option<Target> {
        let target = self.receiver.try_recv().ok()?;
        self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
        Some(target)
    }

    /// Number of targets still queued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Check if the queue is drained.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Queue statistics.
    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }
}
