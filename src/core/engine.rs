//! Story playback engine - queue cursor, clock, pause/mute/error state.
//!
//! **Architecture**: one engine per viewing session. It owns the queue, the
//! clock, the input subscription and the preloader handle. Everything else
//! talks to it through commands, clock signals, renderer reports and
//! preload outcomes, all handled sequentially on the caller's thread.
//!
//! # States
//!
//! `Playing`, `Paused`, `Closed` (terminal). `errored` is an orthogonal flag:
//! it can sit on top of either live state and only suppresses timer-driven
//! advance. Mute is likewise independent of pause.
//!
//! # Timing Model
//!
//! Progress is accumulated from clock deltas, never recomputed from wall
//! time. A resumed story runs a clock over the remaining duration and scales
//! its deltas to the remaining span, so pause/resume cycles never change the
//! total active time a story needs to reach 100%.
//!
//! # Preloading
//!
//! Exactly one look-ahead: whenever the cursor moves, the story after it is
//! requested. Outcomes for anything but the latest request are stale.
//!
//! # Resources
//!
//! The clock and the input subscription are released on `close()`, when the
//! last story completes, and in `Drop`, whichever comes first.

use crossbeam_channel::Receiver;
use log::{debug, info, trace, warn};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

use super::clock::{ClockSignal, PlaybackClock};
use super::engine_events::{CloseReason, Command, PlaybackSnapshot, SessionClosedEvent};
use super::event_bus::{EventBus, Subscription};
use super::input::{InputDispatcher, InputEvent};
use super::preloader::{Preload, PreloadOutcome};
use super::queue::StoryQueue;
use crate::config::EngineSettings;
use crate::entities::{Story, StoryId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Playing,
    Paused,
    Closed,
}

/// Playback state manager for one story session
pub struct PlaybackEngine {
    session: Uuid,
    queue: StoryQueue,
    clock: PlaybackClock,
    preloader: Box<dyn Preload>,
    bus: EventBus,

    /// Commands produced by the input subscription, in arrival order
    commands: Receiver<Command>,
    /// Keyboard/swipe listener; None once detached
    input: Option<Subscription>,

    progress: f64,
    /// Fraction of the story the live clock run covers (1.0 unless resumed)
    span_scale: f64,
    paused: bool,
    muted: bool,
    errored: bool,
    visible: bool,
    media_ready: bool,
    /// Story starts so far; renderers key per-activation work on it
    activation: u64,

    /// Cursor position the current look-ahead was requested from
    lookahead_from: Option<usize>,
    /// Story id of the most recent preload request
    pending_preload: Option<StoryId>,
    last_preload: Option<PreloadOutcome>,
}

impl PlaybackEngine {
    /// Open a session over `stories`, starting at `start_index`.
    ///
    /// Attaches the input listener to `bus`, activates the start story
    /// (viewed flag, look-ahead preload, clock) and publishes the first
    /// snapshot. An empty story list yields an already closed session.
    pub fn open(
        stories: Vec<Story>,
        start_index: usize,
        settings: &EngineSettings,
        bus: EventBus,
        preloader: Box<dyn Preload>,
    ) -> Self {
        let session = Uuid::new_v4();
        let queue = StoryQueue::new(stories, start_index);

        let (tx, commands) = crossbeam_channel::unbounded();
        let dispatcher = Mutex::new(InputDispatcher::new(
            settings.key_bindings(),
            settings.swipe_threshold_px,
        ));
        let input = bus.subscribe::<InputEvent, _>(move |event| {
            let command = dispatcher.lock().unwrap_or_else(|e| e.into_inner()).handle(event);
            if let Some(command) = command {
                let _ = tx.send(command);
            }
        });

        let mut engine = Self {
            session,
            queue,
            clock: PlaybackClock::new(settings.tick_interval()),
            preloader,
            bus,
            commands,
            input: Some(input),
            progress: 0.0,
            span_scale: 1.0,
            paused: false,
            muted: settings.start_muted,
            errored: false,
            visible: true,
            media_ready: false,
            activation: 0,
            lookahead_from: None,
            pending_preload: None,
            last_preload: None,
        };

        if engine.queue.is_empty() {
            warn!("Story session {} opened with no stories", session);
            engine.shutdown(CloseReason::Empty);
            return engine;
        }

        info!(
            "Story session {} opened: {} stories, starting at {}",
            session,
            engine.queue.len(),
            engine.queue.active_index().unwrap_or(0)
        );
        engine.activate();
        engine
    }

    // === Commands ===

    /// Apply a command. Everything is ignored once closed.
    pub fn dispatch(&mut self, command: Command) {
        if !self.visible {
            trace!("{:?} ignored: session closed", command);
            return;
        }
        match command {
            Command::Next => self.next(),
            Command::Prev => self.prev(),
            Command::TogglePause => self.toggle_pause(),
            Command::ToggleMute => self.toggle_mute(),
            Command::Close => self.close(),
            Command::Select(index) => self.select(index),
            Command::SelectGroup(group) => self.select_group(group),
            Command::NextGroup => self.next_group(),
            Command::PrevGroup => self.prev_group(),
        }
    }

    /// Manual advance. At the last story this is a no-op (never closes).
    pub fn next(&mut self) {
        if !self.visible {
            return;
        }
        if self.queue.advance().is_some() {
            self.activate();
        } else {
            trace!("Next ignored: already at last story");
        }
    }

    /// Step back one story. No-op at the first story.
    pub fn prev(&mut self) {
        if !self.visible {
            return;
        }
        if self.queue.retreat().is_some() {
            self.activate();
        } else {
            trace!("Prev ignored: already at first story");
        }
    }

    /// Jump to `index` and (re)start playback there. Out of bounds is a no-op.
    pub fn select(&mut self, index: usize) {
        if !self.visible {
            return;
        }
        if self.queue.jump_to(index).is_some() {
            self.activate();
        } else {
            trace!("Select({}) ignored: {} stories", index, self.queue.len());
        }
    }

    /// Open author group `group` at its first story.
    pub fn select_group(&mut self, group: usize) {
        match self.queue.group_start(group) {
            Some(start) => self.select(start),
            None => trace!("SelectGroup({}) ignored: no such group", group),
        }
    }

    /// Jump to the first story of the next author. No-op in the last group.
    pub fn next_group(&mut self) {
        match self.queue.next_group_start() {
            Some(start) => self.select(start),
            None => trace!("NextGroup ignored: already in last group"),
        }
    }

    /// Jump to the first story of the previous author. No-op in the first group.
    pub fn prev_group(&mut self) {
        match self.queue.prev_group_start() {
            Some(start) => self.select(start),
            None => trace!("PrevGroup ignored: already in first group"),
        }
    }

    pub fn toggle_pause(&mut self) {
        if !self.visible {
            return;
        }
        if self.paused {
            self.paused = false;
            if !self.errored {
                self.start_clock();
            }
            debug!("Resumed at {:.1}%", self.progress);
        } else {
            self.clock.stop();
            self.paused = true;
            debug!("Paused at {:.1}%", self.progress);
        }
        self.publish();
    }

    pub fn toggle_mute(&mut self) {
        if !self.visible {
            return;
        }
        self.muted = !self.muted;
        trace!("Muted: {}", self.muted);
        self.publish();
    }

    /// End the session: stop the clock, detach input.
    pub fn close(&mut self) {
        self.shutdown(CloseReason::Requested);
    }

    // === Time & event sources ===

    /// Feed elapsed playback time, tick by tick.
    ///
    /// Completing a story mid-call starts the next story's clock and the
    /// rest of `elapsed` keeps flowing into it.
    pub fn advance(&mut self, elapsed: Duration) {
        let interval = self.clock.interval();
        let mut left = elapsed;
        while self.visible && self.clock.is_running() && !left.is_zero() {
            let step = left.min(interval);
            left -= step;
            for signal in self.clock.advance(step) {
                self.on_clock_signal(signal);
            }
        }
    }

    /// React to one clock signal. Signals of an old generation, or arriving
    /// while paused, errored or closed, are dropped.
    pub fn on_clock_signal(&mut self, signal: ClockSignal) {
        if !self.visible || self.paused || self.errored {
            trace!("Clock signal {:?} dropped: not playing", signal);
            return;
        }
        if signal.generation() != self.clock.generation() {
            trace!("Stale clock signal {:?} (live gen {})", signal, self.clock.generation());
            return;
        }
        match signal {
            ClockSignal::Tick { delta, .. } => {
                self.progress = (self.progress + delta * self.span_scale).clamp(0.0, 100.0);
                self.publish();
            }
            ClockSignal::Complete { .. } => self.complete_active(),
        }
    }

    /// Drain queued input commands and preload outcomes. Returns commands applied.
    pub fn pump(&mut self) -> usize {
        for outcome in self.preloader.poll() {
            self.on_preload_outcome(outcome);
        }

        let mut handled = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.dispatch(command);
            handled += 1;
        }
        handled
    }

    // === Renderer reports ===

    /// Active media finished loading
    pub fn on_media_loaded(&mut self, story_id: &StoryId) {
        if !self.is_active(story_id) {
            trace!("Load report for inactive story {} ignored", story_id);
            return;
        }
        if !self.media_ready {
            self.media_ready = true;
            self.publish();
        }
    }

    /// Active media failed to load: flag it and stop the timer for this story.
    pub fn on_media_failed(&mut self, story_id: &StoryId) {
        if !self.is_active(story_id) {
            trace!("Failure report for inactive story {} ignored", story_id);
            return;
        }
        if self.errored {
            return;
        }
        warn!("Media for story {} failed to load", story_id);
        self.errored = true;
        self.clock.stop();
        self.publish();
    }

    /// Active video reached its end; treated like the clock completing.
    pub fn on_video_ended(&mut self, story_id: &StoryId) {
        if !self.is_active(story_id) || self.paused || self.errored {
            trace!("Video end for {} ignored", story_id);
            return;
        }
        let is_video = self.queue.current().is_some_and(|s| s.media.is_video());
        if !is_video {
            trace!("Video end for non-video story {} ignored", story_id);
            return;
        }
        self.clock.stop();
        self.complete_active();
    }

    // === Observable state ===

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            session: self.session,
            active_index: self.queue.active_index(),
            active_story: self.queue.current().cloned(),
            progress_percent: self.progress,
            paused: self.paused,
            muted: self.muted,
            errored: self.errored,
            visible: self.visible,
            media_ready: self.media_ready,
            activation: self.activation,
        }
    }

    pub fn state(&self) -> PlaybackState {
        if !self.visible {
            PlaybackState::Closed
        } else if self.paused {
            PlaybackState::Paused
        } else {
            PlaybackState::Playing
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session
    }

    pub fn active_index(&self) -> Option<usize> {
        self.queue.active_index()
    }

    pub fn active_story(&self) -> Option<&Story> {
        self.queue.current()
    }

    pub fn queue(&self) -> &StoryQueue {
        &self.queue
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn progress_percent(&self) -> f64 {
        self.progress
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_errored(&self) -> bool {
        self.errored
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_media_ready(&self) -> bool {
        self.media_ready
    }

    /// Number of story starts so far (re-selecting the active story counts)
    pub fn activation(&self) -> u64 {
        self.activation
    }

    /// True while the keyboard/swipe listener is attached
    pub fn is_input_attached(&self) -> bool {
        self.input.is_some()
    }

    /// Latest outcome for the current look-ahead request
    pub fn last_preload(&self) -> Option<&PreloadOutcome> {
        self.last_preload.as_ref()
    }

    // === Internals ===

    fn is_active(&self, story_id: &StoryId) -> bool {
        self.visible && self.queue.current().is_some_and(|s| &s.id == story_id)
    }

    /// Cursor moved: reset per-story state, preload ahead, start playing.
    fn activate(&mut self) {
        self.clock.stop();
        self.progress = 0.0;
        self.span_scale = 1.0;
        self.paused = false;
        self.errored = false;
        self.media_ready = false;
        self.activation += 1;

        let first_view = self.queue.mark_active_viewed();
        if let Some(story) = self.queue.current() {
            if first_view {
                debug!("Story {} viewed for the first time", story.id);
            }
            debug!(
                "Active story {} ({}/{}, {} {}ms)",
                story.id,
                self.queue.active_index().map_or(0, |i| i + 1),
                self.queue.len(),
                story.media.kind,
                story.media.duration_ms
            );
        }

        self.request_preload();
        self.start_clock();
        self.publish();
    }

    /// Start a clock run over the part of the active story not yet played.
    fn start_clock(&mut self) {
        let Some(story) = self.queue.current() else {
            return;
        };
        let remaining = remaining_ms(story.media.duration_ms, self.progress);
        self.span_scale = (100.0 - self.progress) / 100.0;
        self.clock.start(Duration::from_millis(remaining));
    }

    fn request_preload(&mut self) {
        let from = self.queue.active_index();
        if from == self.lookahead_from {
            trace!("Cursor unchanged, look-ahead already requested");
            return;
        }
        self.lookahead_from = from;
        let Some(next) = self.queue.peek_next() else {
            return;
        };
        self.pending_preload = Some(next.id.clone());
        self.last_preload = None;
        self.preloader.request(next);
    }

    fn on_preload_outcome(&mut self, outcome: PreloadOutcome) {
        if !self.visible {
            return;
        }
        if self.pending_preload.as_ref() != Some(&outcome.story_id) {
            trace!("Stale preload outcome for {} discarded", outcome.story_id);
            return;
        }
        match &outcome.result {
            Ok(()) => debug!("Preloaded story {}", outcome.story_id),
            Err(e) => warn!("Preload of story {} failed: {}", outcome.story_id, e),
        }
        self.last_preload = Some(outcome);
    }

    /// Active story reached 100% (timer or video end).
    fn complete_active(&mut self) {
        self.progress = 100.0;
        if self.queue.advance().is_some() {
            self.activate();
        } else {
            self.shutdown(CloseReason::Exhausted);
        }
    }

    /// Release clock and listener, enter Closed. Idempotent.
    fn shutdown(&mut self, reason: CloseReason) {
        if !self.visible {
            return;
        }
        self.clock.stop();
        self.input.take();
        self.visible = false;
        info!("Story session {} closed ({:?})", self.session, reason);
        self.publish();
        self.bus.emit(SessionClosedEvent {
            session: self.session,
            reason,
        });
    }

    fn publish(&self) {
        self.bus.emit(self.snapshot());
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.visible {
            debug!("Story session {} dropped while open, releasing", self.session);
        }
        self.clock.stop();
        self.input.take();
    }
}

/// Remaining play time of a story at `progress` percent, in whole ms (min 1).
fn remaining_ms(duration_ms: u64, progress: f64) -> u64 {
    let remaining = duration_ms as f64 * (1.0 - progress / 100.0);
    remaining.round().max(1.0) as u64
}
