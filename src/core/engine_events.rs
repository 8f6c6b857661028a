//! Playback commands and the events the engine publishes.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::Story;

// === Commands (input -> engine) ===

/// Normalized playback command, whatever channel it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Next,
    Prev,
    TogglePause,
    ToggleMute,
    Close,
    Select(usize),
    /// Open author group N at its first story
    SelectGroup(usize),
    NextGroup,
    PrevGroup,
}

// === Engine -> renderer ===

/// Observable playback state, published after every tick and transition.
#[derive(Clone, Debug, PartialEq)]
pub struct PlaybackSnapshot {
    pub session: Uuid,
    pub active_index: Option<usize>,
    pub active_story: Option<Story>,
    pub progress_percent: f64,
    pub paused: bool,
    pub muted: bool,
    pub errored: bool,
    pub visible: bool,
    /// Renderer reported the active media as loaded
    pub media_ready: bool,
    /// Bumped every time a story (re)starts, including re-selecting the same one
    pub activation: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// Explicit close command
    Requested,
    /// Last story finished on the timer
    Exhausted,
    /// Nothing to play
    Empty,
}

#[derive(Clone, Debug)]
pub struct SessionClosedEvent {
    pub session: Uuid,
    pub reason: CloseReason,
}
