pub mod entry;
pub mod feed;
pub mod item;
pub mod state;

pub use entry::{EntryDate, RawEntry};
pub use feed::FeedConfig;
pub use item::{FeedItem, RenderedMessage};
pub use state::FeedState;
