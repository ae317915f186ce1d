//! StreamDrain reference consumer daemon.
//!
//! Wires the cancellable poll loop to an in-process topic: a demo feed
//! produces records, a log handler consumes them, and SIGINT/SIGTERM
//! triggers the wake-and-drain shutdown path before the process exits.

mod config;
mod daemon;
mod feed;
mod handler;
mod signals;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use streamdrain_core::{ExitReason, MemoryTopic, PollLoop, PollLoopConfig, ShutdownCoordinator};

use crate::config::DaemonConfig;
use crate::daemon::PidFile;
use crate::feed::DemoFeed;
use crate::handler::LogHandler;

/// StreamDrain, a cancellable polling consumer daemon.
#[derive(Parser)]
#[command(name = "streamdrain-daemon", version, about)]
struct Cli {
    /// Path to the daemon config file.
    #[arg(short, long, default_value = "streamdrain.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the consumer.
    Start {
        /// Log to stderr instead of the data-dir log file.
        #[arg(long)]
        foreground: bool,
    },

    /// Stop a running daemon.
    Stop,

    /// Check daemon status.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config =
        DaemonConfig::load_or_default(&cli.config).context("failed to load daemon config")?;
    config.validate().context("invalid daemon config")?;

    match cli.command {
        Commands::Start { foreground } => cmd_start(config, foreground).await,
        Commands::Stop => {
            let _guard = init_tracing(&config.daemon.log_level, None);
            cmd_stop(&config)
        }
        Commands::Status => cmd_status(&config),
    }
}

/// Initialize tracing, optionally into a non-blocking file writer.
///
/// The returned guard must stay alive for the process lifetime, or
/// buffered log lines are lost.
fn init_tracing(level: &str, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "streamdrain.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            None
        }
    }
}

/// Start the consumer and run until a termination signal or a loop error.
async fn cmd_start(config: DaemonConfig, foreground: bool) -> Result<()> {
    let data_dir = config.daemon.data_dir.clone();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let _log_guard = if foreground {
        init_tracing(&config.daemon.log_level, None)
    } else {
        init_tracing(&config.daemon.log_level, Some(&data_dir))
    };

    let pid_file = PidFile::in_dir(&data_dir);
    if let Some(pid) = pid_file.running_pid()? {
        anyhow::bail!("daemon is already running (PID {})", pid);
    }
    pid_file.write()?;

    // The in-process topic plus its demo feed stand in for a broker.
    let topic = MemoryTopic::new(config.topic.name.clone());
    let feed = if config.feed.enabled {
        Some(
            DemoFeed::start(topic.producer(), &config.feed)
                .context("failed to start demo feed")?,
        )
    } else {
        None
    };

    // Install the signal listener before the loop starts so a termination
    // request can never slip past it.
    let termination = tokio::spawn(signals::wait_for_termination());

    let client = topic.client(config.topic.max_batch);
    let poll_loop = PollLoop::new(
        client,
        LogHandler,
        PollLoopConfig {
            topics: vec![topic.name().to_string()],
            poll_timeout: Duration::from_millis(config.daemon.poll_timeout_ms),
        },
    );

    let running = poll_loop.spawn().context("failed to spawn poll loop")?;
    let coordinator = Arc::new(ShutdownCoordinator::new(&running));

    // On the termination signal: wake the consumer, then block (off the
    // runtime) until it has drained, committed and closed.
    let signal_coordinator = coordinator.clone();
    tokio::spawn(async move {
        let _ = termination.await;
        let _ = tokio::task::spawn_blocking(move || signal_coordinator.shutdown()).await;
    });

    info!(topic = %config.topic.name, "consumer daemon started");

    // Wait for the loop to finish, whether through the shutdown path or on
    // its own error path.
    let report = tokio::task::spawn_blocking(move || running.wait())
        .await
        .context("failed to join poll loop")?;

    if let Some(feed) = feed {
        feed.stop();
    }
    pid_file.remove()?;

    match &report.exit {
        ExitReason::Cancelled => {
            let uptime = report.finished_at - report.started_at;
            info!(
                batches = report.batches,
                messages = report.messages_processed,
                uptime_secs = uptime.num_seconds(),
                "consumer gracefully shut down"
            );
            Ok(())
        }
        other => {
            error!(exit = %other, "consumer exited abnormally");
            anyhow::bail!("consumer exited abnormally: {}", other)
        }
    }
}

/// Stop a running daemon via its PID file.
fn cmd_stop(config: &DaemonConfig) -> Result<()> {
    match daemon::stop_daemon(&config.daemon.data_dir)? {
        true => println!("✓ Daemon stopped gracefully"),
        false => println!("Daemon is not running"),
    }
    Ok(())
}

/// Show daemon status.
fn cmd_status(config: &DaemonConfig) -> Result<()> {
    let pid_file = PidFile::in_dir(&config.daemon.data_dir);
    match pid_file.running_pid()? {
        Some(pid) => println!("● Running (PID {})", pid),
        None => println!("○ Not running"),
    }
    Ok(())
}
