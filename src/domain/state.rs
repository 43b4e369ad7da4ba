use serde::{Deserialize, Serialize};

/// Progress of one feed through a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedState {
    Pending,
    Fetched,
    Filtered,
    Delivered,
    /// The fetch produced no items.
    Skipped,
    Failed,
}

impl FeedState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Skipped | Self::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Filtered => "filtered",
            Self::Delivered => "delivered",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}
