use std::sync::Arc;

use crate::app::{AppContext, Result};
use crate::config::Resolved;
use crate::pipeline::SyncReport;
use crate::watch::{WatchConfig, Watcher};

pub async fn sync(ctx: &AppContext) -> Result<()> {
    let report = ctx.sync().await?;
    print_report(&report);
    Ok(())
}

pub async fn list_feeds(ctx: &AppContext) -> Result<()> {
    let resolved = ctx.resolve_feeds().await?;
    print_feeds(&resolved);
    Ok(())
}

pub async fn watch(ctx: AppContext, interval_secs: u64, no_initial_run: bool) -> Result<()> {
    let config = WatchConfig {
        interval_secs,
        run_on_start: !no_initial_run,
    };
    Watcher::new(Arc::new(ctx), config).run().await
}

pub fn print_report(report: &SyncReport) {
    if report.feeds.is_empty() {
        println!("No feeds configured");
        return;
    }

    for outcome in &report.feeds {
        if outcome.error.is_some() {
            eprintln!("  ! {}", outcome);
        } else {
            println!("  {}", outcome);
        }
    }
    println!("Sync complete: {}", report);
}

pub fn print_feeds(resolved: &Resolved) {
    if resolved.feeds.is_empty() {
        println!("No feeds");
    }

    for feed in &resolved.feeds {
        println!(
            "{}\n  {}\n  folder: {}\n  subject: {}",
            feed.name,
            feed.url,
            feed.folder(),
            feed.subject_template
        );
    }

    for error in &resolved.rejected {
        eprintln!("  ! {}", error);
    }
}
