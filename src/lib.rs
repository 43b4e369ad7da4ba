//! # rss-imap
//!
//! Mirrors RSS/Atom feeds into folders of an IMAP mailbox, one message per
//! feed item, without ever appending the same item twice.
//!
//! ## Architecture
//!
//! ```text
//! control folder → ConfigResolver → feeds
//! feed → Fetcher → Normalizer → Translator ─→ DedupFilter → append
//! ```
//!
//! Feed definitions live in the mailbox itself: messages in a control
//! folder (`.config`) whose subject contains `rss-imap` carry YAML
//! documents such as
//!
//! ```yaml
//! Configuration:
//!   FolderTemplate: 'RSS/{name}'
//! Items:
//!   - Name: Rust Blog
//!     URL: https://blog.rust-lang.org/feed.xml
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export IMAP_HOST=imap.example.com IMAP_USER=me IMAP_PASS=secret
//!
//! # Show the configured feeds
//! rss-imap feeds
//!
//! # Deliver new items once
//! rss-imap sync
//!
//! # Keep syncing every 30 minutes
//! rss-imap watch --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together settings,
/// fetcher, store connection and pipeline.
pub mod app;

/// Command-line interface using clap.
///
/// - `sync` - Deliver new items once (default)
/// - `feeds` - Show resolved feed definitions
/// - `watch --interval <1h>` - Sync periodically
pub mod cli;

/// Settings file, environment overrides and feed definition resolution.
pub mod config;

/// Batched Message-ID existence checks.
pub mod dedup;

/// Core domain models: [`FeedConfig`](domain::FeedConfig),
/// [`RawEntry`](domain::RawEntry), [`FeedItem`](domain::FeedItem).
pub mod domain;

/// HTTP fetching of feed documents.
pub mod fetcher;

/// Feed parsing.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0
/// into [`RawEntry`](domain::RawEntry) values.
pub mod normalizer;

/// Concurrent fetch/translate producers feeding a single store consumer.
pub mod pipeline;

/// IMAP and in-memory message stores behind one session type.
pub mod store;

/// Entry → message translation and message identity.
pub mod translator;

/// Periodic sync loop with graceful shutdown.
pub mod watch;
