//! Look-ahead media preloader.
//!
//! Fire-and-forget: `request()` queues a fetch on the worker pool and returns
//! at once; the outcome shows up later in `poll()`. Requests are never
//! cancelled. The consumer keys outcomes by story id and drops the ones it no
//! longer cares about.
//!
//! A successful fetch lands in the shared `MediaCache`, where the renderer
//! picks it up for instant display. Media already cached resolves without
//! touching the pool.

use crossbeam_channel::{Receiver, Sender};
use log::{debug, trace};
use std::sync::Arc;
use std::time::Duration;

use super::media_cache::{MediaCache, WarmMedia};
use super::media_source::MediaSource;
use super::workers::Workers;
use crate::entities::{Story, StoryId};

/// Result of one preload request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreloadOutcome {
    pub story_id: StoryId,
    pub result: Result<(), String>,
}

impl PreloadOutcome {
    pub fn ready(story_id: StoryId) -> Self {
        Self { story_id, result: Ok(()) }
    }

    pub fn failed(story_id: StoryId, reason: impl Into<String>) -> Self {
        Self {
            story_id,
            result: Err(reason.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.result.is_ok()
    }
}

/// Preload seam used by the engine
pub trait Preload: Send {
    /// Start warming `story`'s media. Must not block.
    fn request(&mut self, story: &Story);

    /// Outcomes that arrived since the last poll, in arrival order.
    fn poll(&mut self) -> Vec<PreloadOutcome>;
}

pub struct MediaPreloader {
    workers: Arc<Workers>,
    source: Arc<dyn MediaSource>,
    cache: Arc<MediaCache>,
    tx: Sender<PreloadOutcome>,
    rx: Receiver<PreloadOutcome>,
}

impl MediaPreloader {
    pub fn new(workers: Arc<Workers>, source: Arc<dyn MediaSource>, cache: Arc<MediaCache>) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            workers,
            source,
            cache,
            tx,
            rx,
        }
    }

    /// Shared cache this preloader fills
    pub fn cache(&self) -> Arc<MediaCache> {
        Arc::clone(&self.cache)
    }

    /// Block up to `timeout` for the next outcome, then drain the rest.
    pub fn wait(&mut self, timeout: Duration) -> Vec<PreloadOutcome> {
        let mut outcomes = Vec::new();
        if let Ok(first) = self.rx.recv_timeout(timeout) {
            outcomes.push(first);
            outcomes.extend(self.rx.try_iter());
        }
        outcomes
    }
}

impl Preload for MediaPreloader {
    fn request(&mut self, story: &Story) {
        let story_id = story.id.clone();
        let media = story.media.clone();

        if self.cache.contains(&media.url) {
            trace!("Preload {}: already cached", story_id);
            let _ = self.tx.send(PreloadOutcome::ready(story_id));
            return;
        }

        debug!("Preload {}: fetching {}", story_id, media.url);
        let source = Arc::clone(&self.source);
        let cache = Arc::clone(&self.cache);
        let tx = self.tx.clone();
        self.workers.execute(move || {
            let outcome = match source.fetch(&media) {
                Ok(bytes) => {
                    cache.insert(WarmMedia::new(&media.url, media.kind, bytes));
                    PreloadOutcome::ready(story_id)
                }
                Err(e) => PreloadOutcome::failed(story_id, format!("{:#}", e)),
            };
            // Receiver gone means the session was torn down; nothing to report to.
            let _ = tx.send(outcome);
        });
    }

    fn poll(&mut self) -> Vec<PreloadOutcome> {
        self.rx.try_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::media_source::FileSource;
    use crate::entities::Media;
    use std::fs;
    use std::path::PathBuf;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("storyplay_preload_{}_{}", name, std::process::id()));
        let _ = fs::create_dir_all(&dir);
        dir
    }

    fn preloader(root: &PathBuf) -> MediaPreloader {
        MediaPreloader::new(
            Arc::new(Workers::new(1)),
            Arc::new(FileSource::new(root)),
            Arc::new(MediaCache::new(8)),
        )
    }

    #[test]
    fn test_success_fills_cache() {
        let root = temp_root("ok");
        fs::write(root.join("next.jpg"), b"img").unwrap();
        let mut p = preloader(&root);

        let story = Story::new("s1", Media::image("next.jpg", 5000));
        p.request(&story);
        let outcomes = p.wait(Duration::from_secs(5));

        assert_eq!(outcomes, vec![PreloadOutcome::ready(StoryId::new("s1"))]);
        assert!(p.cache().contains("next.jpg"));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_failure_is_reported_not_raised() {
        let root = temp_root("fail");
        let mut p = preloader(&root);

        p.request(&Story::new("gone", Media::image("missing.jpg", 5000)));
        let outcomes = p.wait(Duration::from_secs(5));

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].is_ready());
        assert!(p.cache().is_empty());
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_cached_media_resolves_immediately() {
        let root = temp_root("cached");
        let mut p = preloader(&root);
        p.cache().insert(WarmMedia::new("warm.jpg", crate::entities::MediaKind::Image, vec![1]));

        p.request(&Story::new("w", Media::image("warm.jpg", 5000)));
        assert_eq!(p.poll(), vec![PreloadOutcome::ready(StoryId::new("w"))]);
        let _ = fs::remove_dir_all(&root);
    }
}
