//! Story feed: stories grouped by author, flattened into one playback order.
//!
//! Feed JSON is an array of groups:
//! `[{ "userId", "username", "avatar", "stories": [{ "id", "timestamp", "media", "isViewed", "caption" }] }]`
//!
//! Groups play back to back, so the viewer's "next group" step is just the
//! next cursor position in the flattened queue.

use anyhow::{Context, Result, bail, ensure};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::story::Story;
use crate::utils::media::kind_for_url;

/// Stories of one author in display order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryGroup {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub avatar: String,
    pub stories: Vec<Story>,
}

impl StoryGroup {
    /// True when every story of the author was viewed (renderer draws a grey ring).
    pub fn all_viewed(&self) -> bool {
        self.stories.iter().all(|s| s.viewed)
    }
}

/// Flatten groups into playback order, stamping author identity on each story.
pub fn flatten(groups: Vec<StoryGroup>) -> Vec<Story> {
    groups
        .into_iter()
        .flat_map(|group| {
            let StoryGroup { user_id, username, avatar, stories } = group;
            stories.into_iter().map(move |mut story| {
                if story.user_id.is_empty() {
                    story.user_id = user_id.clone();
                }
                if story.username.is_empty() {
                    story.username = username.clone();
                }
                if story.avatar_ref.is_empty() {
                    story.avatar_ref = avatar.clone();
                }
                story
            })
        })
        .collect()
}

/// Regroup consecutive stories by author (for the story list / seen rings).
pub fn group_by_author(stories: &[Story]) -> Vec<StoryGroup> {
    let mut groups: Vec<StoryGroup> = Vec::new();
    for story in stories {
        match groups.last_mut() {
            Some(group) if group.user_id == story.user_id => group.stories.push(story.clone()),
            _ => groups.push(StoryGroup {
                user_id: story.user_id.clone(),
                username: story.username.clone(),
                avatar: story.avatar_ref.clone(),
                stories: vec![story.clone()],
            }),
        }
    }
    groups
}

/// Flat index of each author group's first story, in group order.
///
/// Groups are runs of consecutive stories with the same `user_id`, as
/// produced by `flatten`.
pub fn group_starts(stories: &[Story]) -> Vec<usize> {
    stories
        .iter()
        .enumerate()
        .filter(|(idx, story)| *idx == 0 || stories[idx - 1].user_id != story.user_id)
        .map(|(idx, _)| idx)
        .collect()
}

/// Reject stories the engine cannot play: zero durations, duplicate ids, empty urls.
pub fn validate(stories: &[Story]) -> Result<()> {
    let mut seen = HashSet::new();
    for (idx, story) in stories.iter().enumerate() {
        ensure!(
            story.media.duration_ms > 0,
            "story {} (#{}) has zero duration",
            story.id,
            idx
        );
        ensure!(
            !story.media.url.trim().is_empty(),
            "story {} (#{}) has no media url",
            story.id,
            idx
        );
        if let Some(kind) = kind_for_url(&story.media.url)
            && kind != story.media.kind
        {
            warn!("story {} declared {} but url looks like {}", story.id, story.media.kind, kind);
        }
        if !seen.insert(&story.id) {
            bail!("duplicate story id {} (#{})", story.id, idx);
        }
    }
    Ok(())
}

/// Parse and validate feed JSON
pub fn parse_feed(json: &str) -> Result<Vec<Story>> {
    let groups: Vec<StoryGroup> = serde_json::from_str(json).context("Invalid story feed JSON")?;
    let stories = flatten(groups);
    validate(&stories)?;
    Ok(stories)
}

/// Load and validate a feed file
pub fn load_feed(path: &Path) -> Result<Vec<Story>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read story feed: {}", path.display()))?;
    let stories = parse_feed(&json).with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded {} stories from {}", stories.len(), path.display());
    Ok(stories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::story::{Media, MediaKind};

    const FEED: &str = r#"[
        {
            "userId": "user_1",
            "username": "alonearyan",
            "avatar": "men/11.jpg",
            "stories": [
                { "id": "1_1", "timestamp": 1, "media": { "url": "a.jpg", "type": "image", "duration": 5000 }, "isViewed": false },
                { "id": "1_2", "timestamp": 2, "media": { "url": "b.mp4", "type": "video", "duration": 8000 }, "isViewed": false }
            ]
        },
        {
            "userId": "user_2",
            "username": "navneet",
            "avatar": "men/32.jpg",
            "stories": [
                { "id": "2_1", "timestamp": 3, "media": { "url": "c.jpg", "type": "image", "duration": 5000 }, "isViewed": true, "caption": "sunset" }
            ]
        }
    ]"#;

    #[test]
    fn test_parse_flattens_in_order() {
        let stories = parse_feed(FEED).unwrap();
        let ids: Vec<&str> = stories.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["1_1", "1_2", "2_1"]);
        assert_eq!(stories[1].username, "alonearyan");
        assert_eq!(stories[1].media.kind, MediaKind::Video);
        assert_eq!(stories[2].avatar_ref, "men/32.jpg");
        assert_eq!(stories[2].caption.as_deref(), Some("sunset"));
    }

    #[test]
    fn test_regroup_and_seen_ring() {
        let mut stories = parse_feed(FEED).unwrap();
        let groups = group_by_author(&stories);
        assert_eq!(groups.len(), 2);
        assert!(!groups[0].all_viewed());
        assert!(groups[1].all_viewed());

        stories[0].viewed = true;
        stories[1].viewed = true;
        assert!(group_by_author(&stories)[0].all_viewed());
    }

    #[test]
    fn test_group_starts() {
        let stories = parse_feed(FEED).unwrap();
        assert_eq!(group_starts(&stories), vec![0, 2]);
        assert!(group_starts(&[]).is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_duration() {
        let stories = vec![Story::new("a", Media::image("a.jpg", 0))];
        let err = validate(&stories).unwrap_err();
        assert!(err.to_string().contains("zero duration"));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let stories = vec![
            Story::new("a", Media::image("a.jpg", 1000)),
            Story::new("a", Media::image("b.jpg", 1000)),
        ];
        assert!(validate(&stories).is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_feed("{ not json").is_err());
    }
}
