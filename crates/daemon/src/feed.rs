//! Synthetic record feed for the in-process topic.
//!
//! Stands in for an external producer so the daemon has something to
//! consume. Records are spread round-robin across the configured
//! partitions at a fixed interval.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use streamdrain_core::memory::MemoryProducer;
use tracing::{debug, info};

use crate::config::FeedConfig;

/// Background producer thread.
pub struct DemoFeed {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DemoFeed {
    /// Start producing records at the configured interval.
    pub fn start(producer: MemoryProducer, config: &FeedConfig) -> io::Result<DemoFeed> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let interval = Duration::from_millis(config.interval_ms);
        let partitions = config.partitions.max(1) as u64;

        let handle = thread::Builder::new().name("demo-feed".into()).spawn(move || {
            let mut sequence: u64 = 0;
            while !stop_flag.load(Ordering::SeqCst) {
                let partition = (sequence % partitions) as i32;
                let offset = producer.send(
                    Some(format!("key-{}", partition)),
                    format!("demo record #{}", sequence),
                    partition,
                );
                debug!(partition, offset, "produced demo record");
                sequence += 1;
                thread::sleep(interval);
            }
            info!(produced = sequence, "demo feed stopped");
        })?;

        Ok(DemoFeed {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the feed to stop and wait for the thread to exit.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamdrain_core::MemoryTopic;

    #[test]
    fn test_feed_produces_and_stops() {
        let topic = MemoryTopic::new("demo_records");
        let config = FeedConfig {
            enabled: true,
            interval_ms: 1,
            partitions: 2,
        };

        let feed = DemoFeed::start(topic.producer(), &config).unwrap();
        std::thread::sleep(Duration::from_millis(50));
        feed.stop();

        // Something was produced and spread across both partitions; exact
        // counts depend on scheduling.
        use streamdrain_core::{ConsumerClient, PollOutcome};
        let mut client = topic.client(1024);
        client.subscribe(&["demo_records".to_string()]).unwrap();
        match client.poll(Duration::from_millis(10)) {
            PollOutcome::Batch(batch) => {
                assert!(!batch.is_empty());
                assert!(batch.iter().any(|m| m.partition == 0));
                assert!(batch.iter().any(|m| m.partition == 1));
            }
            other => panic!("expected a batch, got {:?}", other),
        }
    }
}
