//! Periodic sync runs in the foreground.
//!
//! Each run opens its own session; a failed run is logged and the next one
//! happens on schedule. SIGINT or SIGTERM (Ctrl-C on Windows) ends the loop
//! between runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::app::{AppContext, Result, RssImapError};

#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Seconds between runs (default: 3600 = 1 hour)
    pub interval_secs: u64,
    /// Whether to sync immediately on start
    pub run_on_start: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            run_on_start: true,
        }
    }
}

/// Parse interval string like "1h", "30m", "90s", "1d"
pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
    let s = s.trim().to_lowercase();

    let (digits, unit, multiplier) = if let Some(hours) = s.strip_suffix('h') {
        (hours, "hours", 3600)
    } else if let Some(minutes) = s.strip_suffix('m') {
        (minutes, "minutes", 60)
    } else if let Some(days) = s.strip_suffix('d') {
        (days, "days", 86400)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, "seconds", 1)
    } else {
        let secs = s
            .parse::<u64>()
            .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))?;
        return positive(secs);
    };

    let secs = digits
        .parse::<u64>()
        .map_err(|_| format!("Invalid {}: {}", unit, digits))?
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Interval too large: {}", s))?;
    positive(secs)
}

fn positive(secs: u64) -> std::result::Result<u64, String> {
    if secs == 0 {
        return Err("Interval must be greater than zero".to_string());
    }
    Ok(secs)
}

/// Format interval for display
pub fn format_interval(secs: u64) -> String {
    if secs >= 86400 && secs % 86400 == 0 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 && secs % 3600 == 0 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 && secs % 60 == 0 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

pub struct Watcher {
    ctx: Arc<AppContext>,
    config: WatchConfig,
    shutdown: Arc<Notify>,
}

impl Watcher {
    pub fn new(ctx: Arc<AppContext>, config: WatchConfig) -> Self {
        Self {
            ctx,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle that ends the loop when notified.
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    pub async fn run(&self) -> Result<()> {
        if self.config.interval_secs == 0 {
            return Err(RssImapError::Other(
                "Watch interval must be greater than zero".to_string(),
            ));
        }

        spawn_signal_listener(self.shutdown.clone());

        info!(
            "Watching feeds (interval: {}, PID: {})",
            format_interval(self.config.interval_secs),
            std::process::id()
        );

        if self.config.run_on_start {
            info!("Running initial sync...");
            self.run_once().await;
        }

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // Skip the first immediate tick

        loop {
            tokio::select! {
                _ = timer.tick() => {}
                _ = self.shutdown.notified() => break,
            }

            info!("Running scheduled sync...");
            self.run_once().await;
        }

        info!("Watch stopped");
        Ok(())
    }

    async fn run_once(&self) {
        let start = Instant::now();

        match self.ctx.sync().await {
            Ok(report) => {
                for outcome in report.feeds.iter().filter(|o| o.appended > 0 || o.error.is_some()) {
                    info!("  {}", outcome);
                }
                info!(
                    "Sync complete: {} ({:.1}s)",
                    report,
                    start.elapsed().as_secs_f64()
                );
            }
            Err(e) => error!("Sync failed: {}", e),
        }
    }
}

fn spawn_signal_listener(shutdown: Arc<Notify>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!("Failed to set up signal handlers: {}", e);
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
        }
        info!("Shutting down...");
        shutdown.notify_one();
    });

    #[cfg(windows)]
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down...");
            shutdown.notify_one();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::fetcher::StaticFetcher;

    #[test]
    fn test_parse_interval() {
        assert_eq!(parse_interval("1h").unwrap(), 3600);
        assert_eq!(parse_interval("30m").unwrap(), 1800);
        assert_eq!(parse_interval("1d").unwrap(), 86400);
        assert_eq!(parse_interval("90s").unwrap(), 90);
        assert_eq!(parse_interval("3600").unwrap(), 3600);
        assert_eq!(parse_interval(" 6H ").unwrap(), 21600);
        assert!(parse_interval("invalid").is_err());
        assert!(parse_interval("0m").is_err());
        assert!(parse_interval("0").is_err());
    }

    #[test]
    fn test_parse_interval_overflow() {
        let huge = format!("{}h", u64::MAX / 60);
        assert_eq!(
            parse_interval(&huge).unwrap_err(),
            format!("Interval too large: {}", huge)
        );
        assert!(parse_interval(&format!("{}d", u64::MAX)).is_err());
        assert_eq!(parse_interval(&format!("{}s", u64::MAX)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(3600), "1h");
        assert_eq!(format_interval(1800), "30m");
        assert_eq!(format_interval(86400), "1d");
        assert_eq!(format_interval(90), "90s");
        assert_eq!(format_interval(7200), "2h");
    }

    #[tokio::test]
    async fn test_shutdown_ends_loop() {
        let ctx = AppContext::with_fetcher(Settings::default(), Arc::new(StaticFetcher::new()));
        let watcher = Watcher::new(
            Arc::new(ctx),
            WatchConfig {
                interval_secs: 3600,
                run_on_start: false,
            },
        );

        watcher.shutdown_handle().notify_one();
        tokio::time::timeout(Duration::from_secs(5), watcher.run())
            .await
            .expect("watch loop should stop")
            .unwrap();
    }
}
