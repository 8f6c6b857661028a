//! Core engine modules - queue, clock, input, preloading, events
//!
//! These modules form the playback engine, independent of any display.

pub mod clock;
pub mod engine;
pub mod engine_events;
pub mod event_bus;
pub mod input;
pub mod media_cache;
pub mod media_source;
pub mod preloader;
pub mod queue;
pub mod workers;

// Re-exports for convenience
pub use clock::{ClockSignal, PlaybackClock};
pub use engine::{PlaybackEngine, PlaybackState};
pub use event_bus::{EventBus, Subscription};
pub use input::{InputDispatcher, InputEvent, KeyBindings, KeyEvent};
pub use media_cache::{CacheStats, MediaCache};
pub use media_source::{FileSource, MediaSource};
pub use preloader::{MediaPreloader, Preload, PreloadOutcome};
pub use queue::StoryQueue;
pub use workers::Workers;
