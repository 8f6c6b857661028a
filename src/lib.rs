//! STORYPLAY - ephemeral story playback engine
//!
//! Re-exports all modules for use by the binary target.

// Core engine (queue, clock, input, preloading, events)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod paths;
pub mod runner;
pub mod utils;

// Re-export commonly used types from core
pub use core::engine::{PlaybackEngine, PlaybackState};
pub use core::engine_events::{CloseReason, Command, PlaybackSnapshot, SessionClosedEvent};
pub use core::event_bus::EventBus;

// Re-export entities
pub use config::EngineSettings;
pub use entities::{Media, MediaKind, Story, StoryGroup, StoryId};
