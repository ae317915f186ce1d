//! Shutdown coordination between a termination signal and the poll loop.
//!
//! The coordinator is created before the process can receive its
//! termination signal. When the signal arrives, whichever thread observes
//! it calls [`ShutdownCoordinator::shutdown`]: the request is recorded
//! once, the client is woken once, and the caller blocks until the loop
//! has finished its offset-committing cleanup. Only the waker is held
//! here; subscribe, poll and close stay confined to the loop thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::client::Wakeup;
use crate::poll_loop::{JoinCell, LoopReport, RunningLoop};

/// One-shot coordinator that wakes the poll loop and waits for it to exit.
pub struct ShutdownCoordinator {
    triggered: AtomicBool,
    waker: Arc<dyn Wakeup>,
    join: Arc<JoinCell>,
}

impl ShutdownCoordinator {
    /// Capture the wake handle and join cell of a running loop.
    pub fn new(running: &RunningLoop) -> Self {
        Self {
            triggered: AtomicBool::new(false),
            waker: running.waker(),
            join: running.join_cell(),
        }
    }

    /// Request cancellation and wait for the loop to finish cleanup.
    ///
    /// The first caller wakes the client, blocks until `run` has returned,
    /// and receives the loop's report. Concurrent or repeated calls are
    /// no-ops that return `None` immediately: exactly one wakeup, exactly
    /// one join wait.
    ///
    /// The wait is unbounded. If the client's `close` blocks indefinitely
    /// (broker unreachable while committing), so does this call; the
    /// commit-before-exit guarantee is deliberate.
    pub fn shutdown(&self) -> Option<LoopReport> {
        if self.triggered.swap(true, Ordering::SeqCst) {
            debug!("shutdown already requested, ignoring");
            return None;
        }

        info!("shutdown requested, waking consumer");
        self.waker.wakeup();
        let report = self.join.wait();
        info!("poll loop drained and closed");
        Some(report)
    }

    /// Whether shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}
