pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::watch::parse_interval;

#[derive(Parser)]
#[command(name = "rss-imap", version)]
#[command(about = "Mirror RSS/Atom feeds into IMAP folders", long_about = None)]
pub struct Cli {
    /// Settings file (default: ~/.config/rss-imap/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Fetch every configured feed and append new items (default)
    Sync,
    /// Show the feeds resolved from the control folder
    Feeds,
    /// Sync repeatedly until interrupted
    Watch {
        /// Time between runs (e.g., "1h", "30m", "90s", "1d")
        #[arg(short, long, default_value = "1h", value_parser = parse_interval)]
        interval: u64,

        /// Wait one interval before the first run
        #[arg(long)]
        no_initial_run: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_is_default() {
        let cli = Cli::try_parse_from(["rss-imap"]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.config, None);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["rss-imap", "feeds", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.command, Some(Commands::Feeds));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_watch_interval() {
        let cli = Cli::try_parse_from(["rss-imap", "watch", "-i", "30m", "--no-initial-run"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Watch {
                interval: 1800,
                no_initial_run: true
            })
        );

        let cli = Cli::try_parse_from(["rss-imap", "watch"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Watch {
                interval: 3600,
                no_initial_run: false
            })
        );

        assert!(Cli::try_parse_from(["rss-imap", "watch", "-i", "soon"]).is_err());
    }
}
