//! Story records - the unit of ephemeral content played by the engine.
//!
//! Field names follow the feed JSON (`camelCase`, `type`/`duration` inside
//! `media`, `timestamp`/`isViewed` accepted as aliases) so a feed can be
//! deserialized straight into these types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 3_600_000;

/// Session-stable story identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Media kind of a story
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// Media reference with its display duration.
///
/// For images `duration_ms` is the full-progress time. For videos it is the
/// declared duration; actual playback length is only observed through the
/// renderer's "video ended" report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl Media {
    pub fn image(url: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
            duration_ms,
        }
    }

    pub fn video(url: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
            duration_ms,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

/// One story of the viewing session.
///
/// Author fields are opaque references; inside a feed group they are
/// omitted and filled in from the group when the feed is flattened.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: StoryId,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, alias = "avatar")]
    pub avatar_ref: String,
    /// Unix timestamp in milliseconds
    #[serde(default, alias = "timestamp")]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub media: Media,
    #[serde(default, alias = "isViewed")]
    pub viewed: bool,
}

impl Story {
    pub fn new(id: impl Into<String>, media: Media) -> Self {
        Self {
            id: StoryId::new(id),
            user_id: String::new(),
            username: String::new(),
            avatar_ref: String::new(),
            created_at: 0,
            caption: None,
            media,
            viewed: false,
        }
    }

    /// Set author identity (builder style)
    pub fn by(mut self, user_id: &str, username: &str, avatar_ref: &str) -> Self {
        self.user_id = user_id.to_string();
        self.username = username.to_string();
        self.avatar_ref = avatar_ref.to_string();
        self
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn created(mut self, created_at_ms: i64) -> Self {
        self.created_at = created_at_ms;
        self
    }

    /// Relative age label ("3h", "12m", "now") as shown next to the author.
    pub fn time_ago(&self, now_ms: i64) -> String {
        format_time_ago(self.created_at, now_ms)
    }
}

/// Compact relative time: whole hours, else whole minutes, else "now".
///
/// Timestamps in the future count as "now".
pub fn format_time_ago(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms).max(0);
    let hours = diff / MS_PER_HOUR;
    let minutes = diff / MS_PER_MINUTE;

    if hours > 0 {
        format!("{}h", hours)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        "now".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_ago_labels() {
        let now = 10 * MS_PER_HOUR;
        assert_eq!(format_time_ago(now - 3 * MS_PER_HOUR - 5, now), "3h");
        assert_eq!(format_time_ago(now - 59 * MS_PER_MINUTE, now), "59m");
        assert_eq!(format_time_ago(now - 30_000, now), "now");
        // Clock skew: future timestamps are "now"
        assert_eq!(format_time_ago(now + MS_PER_HOUR, now), "now");
    }

    #[test]
    fn test_deserialize_feed_shape() {
        let json = r#"{
            "id": "1_1",
            "timestamp": 1700000000000,
            "media": { "url": "a.jpg", "type": "image", "duration": 5000 },
            "isViewed": true,
            "caption": "Just chilling"
        }"#;
        let story: Story = serde_json::from_str(json).unwrap();
        assert_eq!(story.id.as_str(), "1_1");
        assert_eq!(story.created_at, 1_700_000_000_000);
        assert_eq!(story.media.kind, MediaKind::Image);
        assert_eq!(story.media.duration(), Duration::from_millis(5000));
        assert!(story.viewed);
        assert_eq!(story.caption.as_deref(), Some("Just chilling"));
        assert!(story.user_id.is_empty());
    }

    #[test]
    fn test_builder() {
        let story = Story::new("s", Media::video("clip.mp4", 8000))
            .by("user_1", "alice", "alice.jpg")
            .with_caption("hi")
            .created(42);
        assert!(story.media.is_video());
        assert_eq!(story.username, "alice");
        assert_eq!(story.created_at, 42);
        assert!(!story.viewed);
    }
}
