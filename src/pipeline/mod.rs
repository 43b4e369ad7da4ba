//! One synchronization run.
//!
//! ```text
//! producer (per feed): fetch → normalize → translate ─┐
//!                                                     ├─ Work::Batch ─→ consumer: ensure folder → dedup → append
//! orchestrator: join producers, then Work::Done ──────┘
//! ```
//!
//! Producers run concurrently and never touch the store. The consumer owns
//! the [`StoreSession`] for the whole run and handles one batch at a time,
//! so feeds sharing a folder are deduplicated against each other's appends.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::app::{Result, RssImapError};
use crate::dedup::{DedupFallback, DedupFilter};
use crate::domain::{FeedConfig, FeedItem, FeedState, RawEntry};
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::store::{MailStore, StoreSession};
use crate::translator::translate;

/// Translated items of one feed, ready for delivery.
#[derive(Debug)]
pub struct FeedBatch {
    /// Position of the feed in the run's feed list.
    pub index: usize,
    pub feed: Arc<FeedConfig>,
    pub items: Vec<FeedItem>,
}

/// Message on the producer → consumer channel.
#[derive(Debug)]
pub enum Work {
    Batch(FeedBatch),
    /// Every producer has finished.
    Done,
}

/// What happened to one feed during a run.
#[derive(Debug, Clone)]
pub struct FeedOutcome {
    pub feed: Arc<FeedConfig>,
    pub state: FeedState,
    /// Entries the feed document contained.
    pub fetched: usize,
    /// Entries that could not be translated.
    pub rejected: usize,
    /// Items already in the folder, or repeated within the batch.
    pub duplicates: usize,
    pub appended: usize,
    pub error: Option<String>,
}

impl FeedOutcome {
    fn pending(feed: Arc<FeedConfig>) -> Self {
        Self {
            feed,
            state: FeedState::Pending,
            fetched: 0,
            rejected: 0,
            duplicates: 0,
            appended: 0,
            error: None,
        }
    }

    fn fail(&mut self, error: impl ToString) {
        self.state = FeedState::Failed;
        self.error = Some(error.to_string());
    }
}

impl fmt::Display for FeedOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({} fetched, {} rejected, {} duplicates, {} appended)",
            self.feed.name,
            self.state.label(),
            self.fetched,
            self.rejected,
            self.duplicates,
            self.appended
        )?;
        if let Some(error) = &self.error {
            write!(f, ": {}", error)?;
        }
        Ok(())
    }
}

/// Per-feed outcomes of a run, in feed list order.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub feeds: Vec<FeedOutcome>,
}

impl SyncReport {
    pub fn appended(&self) -> usize {
        self.feeds.iter().map(|f| f.appended).sum()
    }

    pub fn failed(&self) -> usize {
        self.feeds
            .iter()
            .filter(|f| f.state == FeedState::Failed)
            .count()
    }

    pub fn outcome(&self, name: &str) -> Option<&FeedOutcome> {
        self.feeds.iter().find(|f| f.feed.name == name)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} feeds, {} items appended, {} feeds failed",
            self.feeds.len(),
            self.appended(),
            self.failed()
        )
    }
}

/// Producer-side result for one feed.
struct Production {
    index: usize,
    state: FeedState,
    fetched: usize,
    rejected: usize,
    error: Option<String>,
}

/// Consumer-side result for one batch.
struct Delivery {
    index: usize,
    state: FeedState,
    duplicates: usize,
    appended: usize,
    error: Option<String>,
}

pub struct SyncPipeline {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    dedup: DedupFilter,
    fallback: DedupFallback,
}

impl SyncPipeline {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, fallback: DedupFallback) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            dedup: DedupFilter::new(),
            fallback,
        }
    }

    /// Fetch every feed and deliver its new items.
    ///
    /// The session is handed back when the run ends; logging out is up to
    /// the caller. Feed-level failures are reported, not returned.
    pub async fn run<S>(
        &self,
        session: StoreSession<S>,
        feeds: Vec<FeedConfig>,
    ) -> Result<(StoreSession<S>, SyncReport)>
    where
        S: MailStore + 'static,
    {
        let feeds: Vec<Arc<FeedConfig>> = feeds.into_iter().map(Arc::new).collect();
        let mut outcomes: Vec<FeedOutcome> =
            feeds.iter().cloned().map(FeedOutcome::pending).collect();

        let (tx, rx) = unbounded_channel();
        let consumer = tokio::spawn(consume(session, rx, self.dedup, self.fallback));

        let producers: Vec<_> = feeds
            .iter()
            .enumerate()
            .map(|(index, feed)| {
                tokio::spawn(produce(
                    index,
                    Arc::clone(feed),
                    Arc::clone(&self.fetcher),
                    self.normalizer.clone(),
                    tx.clone(),
                ))
            })
            .collect();

        for (index, handle) in producers.into_iter().enumerate() {
            match handle.await {
                Ok(production) => apply_production(&mut outcomes[production.index], production),
                Err(e) => {
                    error!("Producer for {} panicked: {}", outcomes[index].feed.name, e);
                    outcomes[index].fail(format!("producer task failed: {}", e));
                }
            }
        }

        // The consumer only stops on Done, so the receiver is still open
        if tx.send(Work::Done).is_err() {
            error!("Store consumer stopped before all batches were sent");
        }
        drop(tx);

        let (session, deliveries) = consumer
            .await
            .map_err(|e| RssImapError::Other(format!("Store consumer task failed: {}", e)))?;

        for delivery in deliveries {
            apply_delivery(&mut outcomes[delivery.index], delivery);
        }

        for outcome in outcomes.iter_mut().filter(|o| !o.state.is_terminal()) {
            outcome.fail("batch was never delivered");
        }

        Ok((session, SyncReport { feeds: outcomes }))
    }
}

fn apply_production(outcome: &mut FeedOutcome, production: Production) {
    outcome.state = production.state;
    outcome.fetched = production.fetched;
    outcome.rejected = production.rejected;
    outcome.error = production.error;
}

fn apply_delivery(outcome: &mut FeedOutcome, delivery: Delivery) {
    outcome.state = delivery.state;
    outcome.duplicates = delivery.duplicates;
    outcome.appended = delivery.appended;
    if delivery.error.is_some() {
        outcome.error = delivery.error;
    }
}

async fn produce(
    index: usize,
    feed: Arc<FeedConfig>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    tx: UnboundedSender<Work>,
) -> Production {
    let mut production = Production {
        index,
        state: FeedState::Pending,
        fetched: 0,
        rejected: 0,
        error: None,
    };

    info!("Fetching feed {} ({})", feed.name, feed.url);
    let entries = match fetch_entries(fetcher.as_ref(), &normalizer, &feed.url).await {
        Ok(entries) => entries,
        Err(e) => {
            error!("Fetching feed {} failed: {}", feed.name, e);
            production.state = FeedState::Failed;
            production.error = Some(e.to_string());
            return production;
        }
    };
    production.fetched = entries.len();

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        match translate(&feed, entry) {
            Ok(item) => items.push(item),
            Err(e) => {
                warn!(feed = %feed.name, entry = ?e.entry, "Dropping entry: {}", e);
                production.rejected += 1;
            }
        }
    }

    if items.is_empty() {
        info!("Feed {} has no items to deliver", feed.name);
        production.state = FeedState::Skipped;
        return production;
    }

    debug!("Feed {}: {} items translated", feed.name, items.len());
    let batch = FeedBatch { index, feed, items };
    if tx.send(Work::Batch(batch)).is_err() {
        production.state = FeedState::Failed;
        production.error = Some("store consumer stopped".to_string());
        return production;
    }

    production.state = FeedState::Fetched;
    production
}

async fn fetch_entries(
    fetcher: &(dyn Fetcher + Send + Sync),
    normalizer: &Normalizer,
    url: &str,
) -> Result<Vec<RawEntry>> {
    let body = fetcher.fetch(url).await?;
    normalizer.normalize(&body)
}

async fn consume<S: MailStore>(
    mut session: StoreSession<S>,
    mut rx: UnboundedReceiver<Work>,
    dedup: DedupFilter,
    fallback: DedupFallback,
) -> (StoreSession<S>, Vec<Delivery>) {
    let mut deliveries = Vec::new();

    while let Some(work) = rx.recv().await {
        match work {
            Work::Batch(batch) => deliveries.push(deliver(&mut session, batch, dedup, fallback).await),
            Work::Done => break,
        }
    }

    (session, deliveries)
}

/// Deliver one batch. Any store error ends the batch; items appended before
/// it stay appended.
async fn deliver<S: MailStore>(
    session: &mut StoreSession<S>,
    batch: FeedBatch,
    dedup: DedupFilter,
    fallback: DedupFallback,
) -> Delivery {
    let FeedBatch { index, feed, items } = batch;
    let mut delivery = Delivery {
        index,
        state: FeedState::Fetched,
        duplicates: 0,
        appended: 0,
        error: None,
    };

    if let Err(e) = deliver_items(session, &feed, items, dedup, fallback, &mut delivery).await {
        error!("Delivering feed {} failed: {}", feed.name, e);
        delivery.state = FeedState::Failed;
        delivery.error = Some(e.to_string());
    }

    delivery
}

async fn deliver_items<S: MailStore>(
    session: &mut StoreSession<S>,
    feed: &FeedConfig,
    mut items: Vec<FeedItem>,
    dedup: DedupFilter,
    fallback: DedupFallback,
    delivery: &mut Delivery,
) -> Result<()> {
    let folder = feed.folder();
    session.create_and_subscribe(&folder).await?;

    // Repeated ids within the batch: first wins
    let mut seen = HashSet::new();
    let before = items.len();
    items.retain(|item| seen.insert(item.message_id.clone()));
    delivery.duplicates = before - items.len();

    let ids: Vec<String> = items.iter().map(|item| item.message_id.clone()).collect();
    let existing = match dedup.existing(session, &folder, &ids).await {
        Ok(existing) => existing,
        Err(e) => match fallback {
            DedupFallback::Skip => return Err(e.into()),
            DedupFallback::DeliverAll => {
                warn!("{}; delivering all {} items of {}", e, ids.len(), feed.name);
                HashSet::new()
            }
        },
    };

    let wanted: Vec<FeedItem> = items
        .into_iter()
        .filter(|item| !existing.contains(&item.message_id))
        .collect();
    delivery.duplicates += ids.len() - wanted.len();
    delivery.state = FeedState::Filtered;

    for item in wanted {
        let bytes = item.message.to_bytes()?;
        session.append(&folder, &bytes).await?;
        info!(
            feed = %feed.name,
            subject = %item.subject(),
            message_id = %item.message_id,
            "Appended item to {}", folder
        );
        delivery.appended += 1;
    }

    delivery.state = FeedState::Delivered;
    Ok(())
}
