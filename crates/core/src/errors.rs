//! Error types for the StreamDrain core library.
//!
//! Client and handler failures are separate `thiserror` enums. Variants
//! carry string detail rather than boxed sources so they stay `Clone` and
//! can travel inside a [`LoopReport`](crate::poll_loop::LoopReport).

use thiserror::Error;

// ---------------------------------------------------------------------------
// Client errors
// ---------------------------------------------------------------------------

/// Errors raised by a [`ConsumerClient`](crate::client::ConsumerClient).
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Subscribing to the given topics failed.
    #[error("subscribe failed for topics {topics:?}: {detail}")]
    SubscribeFailed { topics: Vec<String>, detail: String },

    /// A poll call failed for a reason other than cancellation.
    #[error("poll failed: {0}")]
    PollFailed(String),

    /// The connection to the broker was lost.
    #[error("broker connection lost: {0}")]
    ConnectionLost(String),

    /// Committing offsets during close failed.
    #[error("offset commit failed: {0}")]
    CommitFailed(String),

    /// An operation was issued after the client was closed.
    #[error("consumer client already closed")]
    AlreadyClosed,
}

// ---------------------------------------------------------------------------
// Handler errors
// ---------------------------------------------------------------------------

/// Errors raised by a [`MessageHandler`](crate::handler::MessageHandler).
///
/// `Failed` is logged and the loop moves on to the next message; `Fatal`
/// aborts the loop through the same cleanup path as cancellation.
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// Processing this message failed; the loop continues.
    #[error("message handling failed: {0}")]
    Failed(String),

    /// Processing failed in a way that makes continuing unsafe.
    #[error("fatal handler error: {0}")]
    Fatal(String),
}

impl HandlerError {
    /// Whether this error aborts the poll loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HandlerError::Fatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = ClientError::SubscribeFailed {
            topics: vec!["orders".into()],
            detail: "unknown topic".into(),
        };
        assert!(err.to_string().contains("orders"));
        assert!(err.to_string().contains("unknown topic"));

        let err = ClientError::PollFailed("timed out waiting for metadata".into());
        assert_eq!(err.to_string(), "poll failed: timed out waiting for metadata");

        let err = ClientError::AlreadyClosed;
        assert_eq!(err.to_string(), "consumer client already closed");
    }

    #[test]
    fn test_handler_error_fatality() {
        assert!(!HandlerError::Failed("bad payload".into()).is_fatal());
        assert!(HandlerError::Fatal("database gone".into()).is_fatal());
    }
}
