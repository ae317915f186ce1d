//! The pluggable message-handler seam.

use crate::errors::HandlerError;
use crate::message::Message;

/// Processes one record at a time, synchronously.
///
/// The loop does not advance to the next record until `handle` returns.
/// Failures are logged, not retried; return [`HandlerError::Fatal`] to
/// abort the loop instead of skipping the record.
pub trait MessageHandler: Send {
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError>;
}

impl<F> MessageHandler for F
where
    F: FnMut(&Message) -> Result<(), HandlerError> + Send,
{
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError> {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_as_handler() {
        let mut count = 0usize;
        let mut handler = |_message: &Message| {
            count += 1;
            Ok(())
        };

        let message = Message {
            key: None,
            value: "hello".into(),
            partition: 0,
            offset: 0,
        };
        handler.handle(&message).unwrap();
        handler.handle(&message).unwrap();
        drop(handler);
        assert_eq!(count, 2);
    }
}
