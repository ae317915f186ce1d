//! Termination-signal handling for the consumer daemon.
//!
//! The poll loop itself is not signal-aware. The task that observes the
//! signal hands control to the shutdown coordinator, which wakes the
//! consumer and waits for it to drain; this module only decides *when*
//! that happens.

use tracing::{info, warn};

/// Wait until the process is asked to terminate.
///
/// Resolves on SIGINT (Ctrl+C) or SIGTERM on unix, Ctrl+C elsewhere.
pub async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let ctrl_c = tokio::signal::ctrl_c();
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "failed to register SIGTERM handler, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                info!("received Ctrl+C, initiating shutdown");
                return;
            }
        };

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), initiating shutdown");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, initiating shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received Ctrl+C, initiating shutdown");
    }
}
