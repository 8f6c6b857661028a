//! Entities module - story data types and the feed they arrive in
//!
//! Plain data, no playback logic. The engine in `core` consumes these.

pub mod feed;
pub mod story;

pub use feed::{StoryGroup, group_starts, load_feed, parse_feed};
pub use story::{Media, MediaKind, Story, StoryId, format_time_ago};
