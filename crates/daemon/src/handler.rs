//! Record logging, the daemon's message handler.

use streamdrain_core::{HandlerError, Message, MessageHandler};
use tracing::info;

/// Logs every record's key/value and partition/offset.
pub struct LogHandler;

impl MessageHandler for LogHandler {
    fn handle(&mut self, message: &Message) -> Result<(), HandlerError> {
        info!(
            key = message.key.as_deref().unwrap_or("-"),
            partition = message.partition,
            offset = message.offset,
            value = %message.value,
            "record received"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_handler_accepts_records() {
        let mut handler = LogHandler;
        let message = Message {
            key: Some("key-0".into()),
            value: "demo record #0".into(),
            partition: 0,
            offset: 0,
        };
        assert!(handler.handle(&message).is_ok());

        let keyless = Message {
            key: None,
            value: "demo record #1".into(),
            partition: 1,
            offset: 0,
        };
        assert!(handler.handle(&keyless).is_ok());
    }
}
