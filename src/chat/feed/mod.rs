//! Live message feeds.

pub mod backoff;
pub mod live_feed;

pub use backoff::{Backoff, with_jitter};
pub use live_feed::{FeedEvent, FeedState, LiveFeed};
