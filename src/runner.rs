//! Application runner - plays a story feed in real time without a window.
//!
//! The loop wakes on a tick channel and on stdin lines, feeds wall-clock
//! elapsed time into the engine, pumps queued commands and preload outcomes,
//! then lets the headless renderer load the active media and report back.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, select};
use log::{debug, info, trace, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::cli::Args;
use crate::config::{EngineSettings, SETTINGS_FILE};
use crate::core::engine::PlaybackEngine;
use crate::core::engine_events::{Command, SessionClosedEvent};
use crate::core::event_bus::EventBus;
use crate::core::input::{InputEvent, KeyEvent};
use crate::core::media_cache::MediaCache;
use crate::core::media_source::{FileSource, MediaSource};
use crate::core::preloader::MediaPreloader;
use crate::core::workers::Workers;
use crate::entities::feed::group_by_author;
use crate::entities::{StoryId, load_feed};
use crate::paths::{self, PathConfig};

/// Run a playback session for the feed named in `args`.
///
/// Returns once the session closes: the last story finished or `q` was read.
pub fn run_app(args: Args, path_config: &PathConfig) -> Result<()> {
    let settings_path = paths::config_file(SETTINGS_FILE, path_config);
    let mut settings = EngineSettings::load_or_init(&settings_path);
    if let Some(ms) = args.tick_ms {
        settings.tick_interval_ms = ms;
    }
    if args.unmuted {
        settings.start_muted = false;
    }
    debug!("Settings: {:?}", settings);

    let stories = load_feed(&args.feed)?;
    let media_root = match args.media_root.clone() {
        Some(root) => root,
        None => feed_dir(&args.feed)?,
    };
    info!(
        "Feed {}: {} stories, media root {}",
        args.feed.display(),
        stories.len(),
        media_root.display()
    );

    let workers = Arc::new(Workers::new(settings.preload_worker_count()));
    let cache = Arc::new(MediaCache::new(settings.preload_cache_entries));
    let source: Arc<dyn MediaSource> = Arc::new(FileSource::new(media_root));
    let preloader = MediaPreloader::new(workers, Arc::clone(&source), Arc::clone(&cache));

    let bus = EventBus::new();
    let _closed = bus.subscribe::<SessionClosedEvent, _>(|e| {
        println!("-- closed ({:?})", e.reason);
    });

    let mut engine = PlaybackEngine::open(stories, args.start, &settings, bus.clone(), Box::new(preloader));
    let mut renderer = HeadlessRenderer::new(Arc::clone(&cache), source);

    let ticker = crossbeam_channel::tick(settings.tick_interval());
    let mut lines = spawn_stdin_reader();
    let mut last = Instant::now();

    renderer.sync(&mut engine, Duration::ZERO);
    while engine.is_visible() {
        let mut stdin_closed = false;
        select! {
            recv(ticker) -> _ => {}
            recv(lines) -> msg => match msg {
                Ok(line) => {
                    let events = parse_input_line(&line);
                    if events.is_empty() && !line.trim().is_empty() {
                        warn!("Unrecognized input: {:?}", line.trim());
                    }
                    for event in events {
                        bus.emit(event);
                    }
                }
                Err(_) => stdin_closed = true,
            },
        }
        if stdin_closed {
            debug!("stdin closed, playing on");
            lines = crossbeam_channel::never();
        }

        let now = Instant::now();
        let elapsed = now - last;
        last = now;

        engine.pump();
        engine.advance(elapsed);
        renderer.sync(&mut engine, elapsed);
    }

    for group in group_by_author(engine.queue().stories()) {
        info!(
            "{}: {}/{} viewed{}",
            group.username,
            group.stories.iter().filter(|s| s.viewed).count(),
            group.stories.len(),
            if group.all_viewed() { " (seen)" } else { "" }
        );
    }

    let stats = cache.stats();
    info!(
        "Session {} finished (cache hits {}, misses {}, hit rate {:.0}%)",
        engine.session_id(),
        stats.hits(),
        stats.misses(),
        stats.hit_rate() * 100.0
    );
    Ok(())
}

fn feed_dir(feed: &std::path::Path) -> Result<PathBuf> {
    let dir = match feed.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => std::env::current_dir().context("Failed to resolve working directory")?,
    };
    Ok(dir)
}

/// Forward stdin lines to a channel; the sender drops at EOF.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let spawned = thread::Builder::new().name("storyplay-stdin".into()).spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    if let Err(e) = spawned {
        warn!("Failed to spawn stdin reader, keyboard disabled: {}", e);
        return crossbeam_channel::never();
    }
    rx
}

/// Translate one line of terminal input into raw input events.
///
/// - `n` / `space`: ArrowRight / Space (next)
/// - `b`: ArrowLeft (previous)
/// - `p`: KeyP (pause toggle)
/// - `m`: mute button, `q`: close button
/// - digits: select that story
/// - `g N`: open author group N at its first story; `]` / `[`: next / previous author
/// - `swipe DX`: a horizontal swipe of DX pixels
/// - anything else that looks like a key code (`ArrowLeft`, `KeyM`) passes through
pub fn parse_input_line(line: &str) -> Vec<InputEvent> {
    let line = line.trim();
    let key = |code: &str| vec![InputEvent::Key(KeyEvent::new(code))];

    match line {
        "n" => return key("ArrowRight"),
        "space" => return key("Space"),
        "b" => return key("ArrowLeft"),
        "p" => return key("KeyP"),
        "m" => return vec![InputEvent::Button(Command::ToggleMute)],
        "q" => return vec![InputEvent::Button(Command::Close)],
        "]" => return vec![InputEvent::Button(Command::NextGroup)],
        "[" => return vec![InputEvent::Button(Command::PrevGroup)],
        _ => {}
    }

    if let Some(group) = line.strip_prefix("g ").and_then(|n| n.trim().parse::<usize>().ok()) {
        return vec![InputEvent::Button(Command::SelectGroup(group))];
    }

    if let Ok(index) = line.parse::<usize>() {
        return vec![InputEvent::Button(Command::Select(index))];
    }
    if let Some(dx) = line.strip_prefix("swipe ").and_then(|dx| dx.trim().parse::<f32>().ok()) {
        return vec![
            InputEvent::SwipeStart { x: 0.0 },
            InputEvent::SwipeMove { x: dx },
            InputEvent::SwipeEnd { x: None },
        ];
    }
    if line.chars().next().is_some_and(|c| c.is_ascii_uppercase()) && line.chars().all(|c| c.is_ascii_alphanumeric()) {
        return key(line);
    }
    Vec::new()
}

/// Stand-in for a display surface: loads the active media and plays videos
/// by the wall clock, reporting load/failure/end to the engine.
struct HeadlessRenderer {
    cache: Arc<MediaCache>,
    source: Arc<dyn MediaSource>,
    /// Story and activation currently on screen
    shown: Option<(StoryId, u64)>,
    /// Active video's playhead, while its media is loaded
    playhead: Option<Duration>,
    last_line: Option<(Option<usize>, bool, bool)>,
}

impl HeadlessRenderer {
    fn new(cache: Arc<MediaCache>, source: Arc<dyn MediaSource>) -> Self {
        Self {
            cache,
            source,
            shown: None,
            playhead: None,
            last_line: None,
        }
    }

    fn sync(&mut self, engine: &mut PlaybackEngine, elapsed: Duration) {
        if !engine.is_visible() {
            return;
        }
        let Some(story) = engine.active_story().cloned() else {
            return;
        };

        let showing = (story.id.clone(), engine.activation());
        if self.shown.as_ref() != Some(&showing) {
            self.shown = Some(showing);
            self.playhead = None;

            let loaded = match self.cache.get(&story.media.url) {
                Some(warm) => {
                    trace!("{} served from cache ({} bytes)", story.id, warm.size());
                    Ok(())
                }
                None => self.source.fetch(&story.media).map(|bytes| {
                    trace!("{} loaded cold ({} bytes)", story.id, bytes.len());
                }),
            };
            match loaded {
                Ok(()) => {
                    engine.on_media_loaded(&story.id);
                    if story.media.is_video() {
                        self.playhead = Some(Duration::ZERO);
                    }
                }
                Err(e) => {
                    warn!("{:#}", e);
                    engine.on_media_failed(&story.id);
                }
            }
        } else if let Some(playhead) = self.playhead.as_mut() {
            if !engine.is_paused() && !engine.is_errored() {
                *playhead += elapsed;
                if *playhead >= story.media.duration() {
                    self.playhead = None;
                    engine.on_video_ended(&story.id);
                }
            }
        }

        self.print_status(engine);
    }

    fn print_status(&mut self, engine: &PlaybackEngine) {
        let snap = engine.snapshot();
        let key = (snap.active_index, snap.paused, snap.errored);
        if self.last_line == Some(key) || !snap.visible {
            return;
        }
        self.last_line = Some(key);

        let Some(story) = snap.active_story else {
            return;
        };
        let total = engine.queue().len();
        let index = snap.active_index.map_or(0, |i| i + 1);
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        let mut flags = Vec::new();
        if snap.paused {
            flags.push("paused");
        }
        if snap.muted && story.media.is_video() {
            flags.push("muted");
        }
        if snap.errored {
            flags.push("failed to load");
        }

        println!(
            "[{}/{}] {} {} · {} · {}{}{}",
            index,
            total,
            story.username,
            story.time_ago(now_ms),
            story.media.kind,
            story.media.url,
            story.caption.as_deref().map(|c| format!(" \"{}\"", c)).unwrap_or_default(),
            if flags.is_empty() { String::new() } else { format!(" ({})", flags.join(", ")) }
        );
    }
}
