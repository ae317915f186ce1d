//! The consumer-client seam.
//!
//! The broker/transport client is an external collaborator. It must
//! provide a blocking `poll(timeout)` that can be aborted from another
//! thread via [`Wakeup::wakeup`], plus `subscribe` and an
//! offset-committing `close`. Apart from the waker, a client handle is not
//! safe for concurrent use: the poll loop owns it and confines every other
//! call to its own thread.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::ClientError;
use crate::message::Message;

/// Cross-thread handle that aborts an in-flight (or the next) poll.
///
/// This is the only client operation the
/// [`ShutdownCoordinator`](crate::shutdown::ShutdownCoordinator) is
/// allowed to reach.
pub trait Wakeup: Send + Sync {
    /// Cause one in-flight or upcoming `poll` to return
    /// [`PollOutcome::Cancelled`] instead of data.
    fn wakeup(&self);
}

/// Outcome of a single blocking poll call.
///
/// A tagged result rather than exception unwinding: the loop branches
/// three ways and never unwinds through client internals.
#[derive(Debug)]
pub enum PollOutcome {
    /// A finite batch of records, possibly empty, in delivery order.
    Batch(Vec<Message>),

    /// The poll was aborted by a wakeup.
    Cancelled,

    /// The poll failed for any other reason.
    Failed(ClientError),
}

/// A pull-based consumer client.
///
/// Everything except the waker returned by [`waker`](Self::waker) must be
/// called from the thread that runs the poll loop.
pub trait ConsumerClient: Send {
    /// Subscribe to the given topics. Called once, before the first poll.
    fn subscribe(&mut self, topics: &[String]) -> Result<(), ClientError>;

    /// Block until records arrive, `timeout` elapses (empty batch), or a
    /// wakeup aborts the call.
    fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// A handle that can abort a blocked poll from any thread.
    fn waker(&self) -> Arc<dyn Wakeup>;

    /// Commit consumed offsets synchronously, then release the connection.
    ///
    /// The poll loop calls this exactly once, on every exit path.
    fn close(&mut self) -> Result<(), ClientError>;
}
