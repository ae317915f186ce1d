//! The consume-and-process cycle.
//!
//! [`PollLoop::run`] drives a blocking client: poll, hand each record to
//! the handler in delivery order, repeat, until a wakeup or an
//! unrecoverable error breaks the cycle. Cleanup (an offset-committing
//! `close`) runs exactly once on every exit path.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::client::{ConsumerClient, PollOutcome, Wakeup};
use crate::errors::{ClientError, HandlerError};
use crate::handler::MessageHandler;
use crate::message::Message;

// ---------------------------------------------------------------------------
// Loop state
// ---------------------------------------------------------------------------

/// Lifecycle state of a poll loop.
///
/// Transitions only move forward: `Running → CancelRequested → Stopped`,
/// with the middle step skipped on error exits. `Stopped` is terminal and
/// means `close` has returned and no further poll will be issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LoopState {
    Running = 0,
    CancelRequested = 1,
    Stopped = 2,
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::CancelRequested => write!(f, "cancel_requested"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

fn decode_state(raw: u8) -> LoopState {
    match raw {
        0 => LoopState::Running,
        1 => LoopState::CancelRequested,
        _ => LoopState::Stopped,
    }
}

/// Cross-thread view of a loop's [`LoopState`].
///
/// Written by the loop thread, readable from anywhere. `fetch_max` keeps
/// the forward-only invariant even under racing writers.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(LoopState::Running as u8)))
    }

    /// The current state.
    pub fn get(&self) -> LoopState {
        decode_state(self.0.load(Ordering::SeqCst))
    }

    /// Advance to `to`; never moves backward.
    fn advance(&self, to: LoopState) {
        let prev = self.0.fetch_max(to as u8, Ordering::SeqCst);
        if prev < to as u8 {
            info!(from = %decode_state(prev), to = %to, "loop state transition");
        }
    }
}

// ---------------------------------------------------------------------------
// Exit reason and report
// ---------------------------------------------------------------------------

/// Why a poll loop exited.
#[derive(Debug, Clone)]
pub enum ExitReason {
    /// A wakeup aborted the poll; the graceful shutdown path.
    Cancelled,

    /// The client failed to subscribe, poll, or stay connected.
    ClientFailed(ClientError),

    /// The handler reported a fatal error, or the loop thread panicked.
    HandlerFailed(HandlerError),
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::ClientFailed(e) => write!(f, "client error: {}", e),
            Self::HandlerFailed(e) => write!(f, "handler error: {}", e),
        }
    }
}

/// Summary of one completed loop run.
#[derive(Debug, Clone)]
pub struct LoopReport {
    /// Why the loop exited.
    pub exit: ExitReason,

    /// Poll batches received, counting empty ones.
    pub batches: u64,

    /// Records successfully handed to the handler.
    pub messages_processed: u64,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// The loop itself
// ---------------------------------------------------------------------------

/// Static parameters for a poll loop.
#[derive(Debug, Clone)]
pub struct PollLoopConfig {
    /// Topics passed to `subscribe` before the first poll.
    pub topics: Vec<String>,

    /// Timeout handed to each blocking poll call.
    pub poll_timeout: Duration,
}

/// Owns the consume-and-process cycle for one client/handler pair.
///
/// The client handle never leaves this struct: subscribe, poll and close
/// all happen on whichever thread calls [`run`](Self::run), which is the
/// only way the non-thread-safe client contract can be honored.
pub struct PollLoop<C, H> {
    client: C,
    handler: H,
    config: PollLoopConfig,
    state: StateCell,
    batches: u64,
    processed: u64,
}

impl<C, H> PollLoop<C, H>
where
    C: ConsumerClient,
    H: MessageHandler,
{
    pub fn new(client: C, handler: H, config: PollLoopConfig) -> Self {
        Self {
            client,
            handler,
            config,
            state: StateCell::new(),
            batches: 0,
            processed: 0,
        }
    }

    /// Cross-thread view of the loop's state.
    pub fn state_cell(&self) -> StateCell {
        self.state.clone()
    }

    /// Run the cycle on the current thread until cancellation or an
    /// unrecoverable error, then close the client and report.
    ///
    /// Errors never propagate past this call: the report and the logs
    /// carry the outcome.
    pub fn run(mut self) -> LoopReport {
        let started_at = Utc::now();
        info!(
            topics = ?self.config.topics,
            timeout_ms = self.config.poll_timeout.as_millis() as u64,
            "starting poll loop"
        );

        let exit = self.cycle();

        // Cleanup is unconditional: every exit path commits and closes,
        // exactly once.
        match self.client.close() {
            Ok(()) => info!("consumer closed, offsets committed"),
            Err(e) => error!(error = %e, "consumer close failed"),
        }
        self.state.advance(LoopState::Stopped);

        let report = LoopReport {
            exit,
            batches: self.batches,
            messages_processed: self.processed,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            batches = report.batches,
            messages = report.messages_processed,
            exit = %report.exit,
            "poll loop finished"
        );
        report
    }

    fn cycle(&mut self) -> ExitReason {
        if let Err(e) = self.client.subscribe(&self.config.topics) {
            error!(error = %e, "subscribe failed");
            return ExitReason::ClientFailed(e);
        }

        loop {
            match self.client.poll(self.config.poll_timeout) {
                PollOutcome::Batch(batch) => {
                    self.batches += 1;
                    if let Some(fatal) = self.handle_batch(batch) {
                        return ExitReason::HandlerFailed(fatal);
                    }
                }
                PollOutcome::Cancelled => {
                    self.state.advance(LoopState::CancelRequested);
                    info!("cancellation requested, exiting poll loop");
                    return ExitReason::Cancelled;
                }
                PollOutcome::Failed(e) => {
                    error!(error = %e, "unexpected client error in poll loop");
                    return ExitReason::ClientFailed(e);
                }
            }
        }
    }

    /// Hand every record of a batch to the handler, in delivery order.
    ///
    /// Returns the error that aborts the loop, if any. Non-fatal handler
    /// errors are logged and the next record is attempted.
    fn handle_batch(&mut self, batch: Vec<Message>) -> Option<HandlerError> {
        for message in batch {
            match self.handler.handle(&message) {
                Ok(()) => self.processed += 1,
                Err(e) if e.is_fatal() => {
                    error!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "fatal handler error, aborting loop"
                    );
                    return Some(e);
                }
                Err(e) => {
                    warn!(
                        partition = message.partition,
                        offset = message.offset,
                        error = %e,
                        "handler failed, skipping record"
                    );
                }
            }
        }
        None
    }

    /// Run the cycle on a dedicated worker thread.
    ///
    /// The client's waker is captured before the client moves to the new
    /// thread, so cancellation stays available to the spawning side.
    pub fn spawn(self) -> io::Result<RunningLoop>
    where
        C: 'static,
        H: 'static,
    {
        let waker = self.client.waker();
        let state = self.state.clone();
        let handle = thread::Builder::new()
            .name("poll-loop".into())
            .spawn(move || self.run())?;

        Ok(RunningLoop {
            waker,
            state,
            join: Arc::new(JoinCell::new(handle)),
        })
    }
}

// ---------------------------------------------------------------------------
// Running-loop handle
// ---------------------------------------------------------------------------

/// Handle to a poll loop running on its worker thread.
pub struct RunningLoop {
    waker: Arc<dyn Wakeup>,
    state: StateCell,
    join: Arc<JoinCell>,
}

impl RunningLoop {
    /// The client's cross-thread wake handle.
    pub fn waker(&self) -> Arc<dyn Wakeup> {
        self.waker.clone()
    }

    /// Current state of the loop.
    pub fn state(&self) -> LoopState {
        self.state.get()
    }

    /// Block until `run` has returned, and get its report.
    ///
    /// Any number of threads may wait; exactly one performs the underlying
    /// join. A panicked loop thread is reported as a fatal handler error
    /// rather than propagating the panic to waiters.
    pub fn wait(&self) -> LoopReport {
        self.join.wait()
    }

    pub(crate) fn join_cell(&self) -> Arc<JoinCell> {
        self.join.clone()
    }
}

/// Join-once cell: many waiters, one underlying `JoinHandle::join`.
pub(crate) struct JoinCell {
    handle: Mutex<Option<thread::JoinHandle<LoopReport>>>,
    report: Mutex<Option<LoopReport>>,
    done: Condvar,
}

impl JoinCell {
    fn new(handle: thread::JoinHandle<LoopReport>) -> Self {
        Self {
            handle: Mutex::new(Some(handle)),
            report: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    pub(crate) fn wait(&self) -> LoopReport {
        let taken = lock(&self.handle).take();
        if let Some(handle) = taken {
            let report = match handle.join() {
                Ok(report) => report,
                Err(_) => {
                    error!("poll loop thread panicked");
                    let now = Utc::now();
                    LoopReport {
                        exit: ExitReason::HandlerFailed(HandlerError::Fatal(
                            "poll loop thread panicked".into(),
                        )),
                        batches: 0,
                        messages_processed: 0,
                        started_at: now,
                        finished_at: now,
                    }
                }
            };
            let mut slot = lock(&self.report);
            *slot = Some(report.clone());
            self.done.notify_all();
            report
        } else {
            // Another thread is joining; wait for it to publish the report.
            let mut slot = lock(&self.report);
            loop {
                if let Some(report) = slot.as_ref() {
                    return report.clone();
                }
                slot = self.done.wait(slot).unwrap_or_else(|e| e.into_inner());
            }
        }
    }
}

/// Lock, recovering the inner value if another thread panicked while
/// holding the guard.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_cell_only_moves_forward() {
        let cell = StateCell::new();
        assert_eq!(cell.get(), LoopState::Running);

        cell.advance(LoopState::CancelRequested);
        assert_eq!(cell.get(), LoopState::CancelRequested);

        // Attempting to go back to Running is a no-op.
        cell.advance(LoopState::Running);
        assert_eq!(cell.get(), LoopState::CancelRequested);

        cell.advance(LoopState::Stopped);
        assert_eq!(cell.get(), LoopState::Stopped);
        cell.advance(LoopState::CancelRequested);
        assert_eq!(cell.get(), LoopState::Stopped);
    }

    #[test]
    fn test_state_and_exit_display() {
        assert_eq!(LoopState::Running.to_string(), "running");
        assert_eq!(LoopState::CancelRequested.to_string(), "cancel_requested");
        assert_eq!(LoopState::Stopped.to_string(), "stopped");

        assert_eq!(ExitReason::Cancelled.to_string(), "cancelled");
        let exit = ExitReason::HandlerFailed(HandlerError::Fatal("boom".into()));
        assert_eq!(exit.to_string(), "handler error: fatal handler error: boom");
    }
}
