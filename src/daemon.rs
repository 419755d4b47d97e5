//! Background monitoring loop.
//!
//! Alternates between sleeping for the configured interval and running one
//! full [`Monitor`] pass. A pass always runs to completion; a stop request
//! is honored between passes.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{Result, StockwatchError};
use crate::checker::SessionFactory;
use crate::monitor::Monitor;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Seconds between passes (default: 60)
    pub interval_secs: u64,
    /// Whether to run a pass immediately on start
    pub update_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            update_on_start: true,
        }
    }
}

impl DaemonConfig {
    /// Parse interval string like "90s", "5m", "1h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '60s', '5m', '1h'", s))
        }?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon<F: SessionFactory> {
    monitor: Arc<Monitor<F>>,
    config: DaemonConfig,
    shutdown: Arc<Notify>,
}

impl<F: SessionFactory> Daemon<F> {
    pub fn new(monitor: Monitor<F>, config: DaemonConfig) -> Self {
        Self {
            monitor: Arc::new(monitor),
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        read_pid().map(process_exists).unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    /// Run the daemon until SIGINT/SIGTERM or [`stop`](Self::stop).
    pub async fn run(&self) -> Result<()> {
        if Self::is_running() {
            return Err(StockwatchError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| StockwatchError::Other(format!("Failed to write PID file: {}", e)))?;

        spawn_signal_listener(self.shutdown.clone());

        info!(
            interval = %DaemonConfig::format_interval(self.config.interval_secs),
            pid = std::process::id(),
            "stockwatch daemon started"
        );

        self.run_loop().await;

        info!("Daemon shutting down");
        remove_pid_file();
        Ok(())
    }

    /// Idle/Running cycle without PID file bookkeeping.
    pub async fn run_loop(&self) {
        if self.config.update_on_start {
            info!("Running initial pass");
            self.run_pass().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.interval_secs.max(1)));
        // A pass longer than the interval delays the next one instead of bunching them up
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await;

        loop {
            // A stop that arrived during the last pass wins over an overdue tick
            tokio::select! {
                biased;
                _ = self.shutdown.notified() => break,
                _ = timer.tick() => {}
            }
            self.run_pass().await;
        }
    }

    /// One pass in its own task so that neither an error nor a panic ends the loop.
    async fn run_pass(&self) {
        let start = Utc::now();
        let monitor = self.monitor.clone();

        match tokio::spawn(async move { monitor.run_pass().await }).await {
            Ok(Ok(report)) => {
                let elapsed = Utc::now().signed_duration_since(start);
                info!(
                    notified = report.notified,
                    updated = report.updated,
                    elapsed_secs = elapsed.num_milliseconds() as f64 / 1000.0,
                    "Pass finished"
                );
            }
            Ok(Err(e)) => error!(error = %e, "Monitoring pass failed"),
            Err(e) => error!(error = %e, "Monitoring pass aborted"),
        }
    }

    /// Ask the loop to stop after the current pass.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }
}

fn spawn_signal_listener(shutdown: Arc<Notify>) {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(error = %e, "Failed to install signal handlers");
                    return;
                }
            };

        loop {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    #[cfg(windows)]
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(()).is_err() {
                break;
            }
        }
    });

    tokio::spawn(handle_signals(rx, shutdown, || {
        remove_pid_file();
        std::process::exit(130)
    }));
}

/// First signal stops the loop after the current pass; a second one runs `force`.
async fn handle_signals(
    mut signals: mpsc::UnboundedReceiver<()>,
    shutdown: Arc<Notify>,
    force: impl FnOnce() + Send + 'static,
) {
    if signals.recv().await.is_none() {
        return;
    }
    info!("Shutdown requested, finishing current pass (signal again to exit now)");
    shutdown.notify_one();

    if signals.recv().await.is_none() {
        return;
    }
    warn!("Second shutdown signal, exiting without finishing the pass");
    force();
}

/// Get the PID file path
pub fn pid_file_path() -> Option<PathBuf> {
    dirs::runtime_dir()
        .or_else(dirs::cache_dir)
        .map(|d| d.join("stockwatch").join("daemon.pid"))
}

fn remove_pid_file() {
    if let Some(pid_path) = pid_file_path() {
        let _ = fs::remove_file(pid_path);
    }
}

fn read_pid() -> Option<u32> {
    let pid_path = pid_file_path()?;
    fs::read_to_string(pid_path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(windows)]
fn process_exists(pid: u32) -> bool {
    use std::process::Command;
    Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid)])
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
        .unwrap_or(false)
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> std::result::Result<(), String> {
    let pid_path = pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid = read_pid().ok_or_else(|| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .map_err(|e| format!("Failed to send signal: {}", e))?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .map_err(|e| format!("Failed to stop process: {}", e))?;

    if status.success() {
        // The daemon removes its own PID file once the current pass is done
        Ok(())
    } else {
        Err(format!("Failed to stop daemon (PID {})", pid))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match read_pid() {
        Some(pid) if process_exists(pid) => format!("Daemon is running (PID: {})", pid),
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
