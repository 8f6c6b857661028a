//! Input dispatcher - keyboard, swipe and button input normalized to `Command`s.
//!
//! The dispatcher only translates; it never touches the queue or the engine.
//! The only state it carries between calls is the in-progress swipe.
//!
//! Keys use DOM-style codes ("ArrowRight", "Space", "KeyP"). With modifiers
//! held the combo string ("Ctrl+Shift+KeyP") is looked up first and the bare
//! key is only tried when no modifier is down.

use log::trace;
use std::collections::HashMap;

use super::engine_events::Command;

/// Minimum horizontal travel (logical px) for a swipe to count
pub const DEFAULT_SWIPE_THRESHOLD: f32 = 50.0;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: String,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyEvent {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ..Default::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn has_modifiers(&self) -> bool {
        self.ctrl || self.shift || self.alt
    }

    /// Binding key string, e.g. "Ctrl+Shift+KeyP"
    pub fn combo(&self) -> String {
        let mut combo = String::new();
        if self.ctrl {
            combo.push_str("Ctrl+");
        }
        if self.shift {
            combo.push_str("Shift+");
        }
        if self.alt {
            combo.push_str("Alt+");
        }
        combo.push_str(&self.code);
        combo
    }
}

/// Raw input as delivered by the app shell
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    SwipeStart { x: f32 },
    SwipeMove { x: f32 },
    /// End of gesture; `x` may be absent (touchend carries no point)
    SwipeEnd { x: Option<f32> },
    /// Explicit UI control, passed through unchanged
    Button(Command),
}

/// Key -> command table
#[derive(Clone, Debug, Default)]
pub struct KeyBindings {
    bindings: HashMap<String, Command>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Right/Space advance, Left goes back, P toggles pause
    pub fn with_defaults() -> Self {
        let mut keys = Self::new();
        keys.bind("ArrowRight", Command::Next);
        keys.bind("Space", Command::Next);
        keys.bind("ArrowLeft", Command::Prev);
        keys.bind("KeyP", Command::TogglePause);
        keys
    }

    pub fn bind(&mut self, key: &str, command: Command) {
        self.bindings.insert(key.to_string(), command);
    }

    pub fn unbind(&mut self, key: &str) {
        self.bindings.remove(key);
    }

    pub fn get(&self, key: &str) -> Option<Command> {
        self.bindings.get(key).copied()
    }

    pub fn lookup(&self, key: &KeyEvent) -> Option<Command> {
        if key.has_modifiers() {
            return self.get(&key.combo());
        }
        self.get(&key.code)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[derive(Clone, Copy, Debug)]
struct Gesture {
    start_x: f32,
    last_x: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct InputDispatcher {
    keys: KeyBindings,
    swipe_threshold: f32,
    gesture: Option<Gesture>,
}

impl Default for InputDispatcher {
    fn default() -> Self {
        Self::new(KeyBindings::with_defaults(), DEFAULT_SWIPE_THRESHOLD)
    }
}

impl InputDispatcher {
    pub fn new(keys: KeyBindings, swipe_threshold: f32) -> Self {
        Self {
            keys,
            swipe_threshold: swipe_threshold.abs(),
            gesture: None,
        }
    }

    pub fn swipe_threshold(&self) -> f32 {
        self.swipe_threshold
    }

    pub fn keys(&self) -> &KeyBindings {
        &self.keys
    }

    /// Translate one raw event. Most events produce no command.
    pub fn handle(&mut self, event: &InputEvent) -> Option<Command> {
        let command = match event {
            InputEvent::Key(key) => self.handle_key(key),
            InputEvent::SwipeStart { x } => {
                self.begin_swipe(*x);
                None
            }
            InputEvent::SwipeMove { x } => {
                self.track_swipe(*x);
                None
            }
            InputEvent::SwipeEnd { x } => self.end_swipe(*x),
            InputEvent::Button(command) => Some(*command),
        };
        if let Some(cmd) = command {
            trace!("Input {:?} -> {:?}", event, cmd);
        }
        command
    }

    pub fn handle_key(&self, key: &KeyEvent) -> Option<Command> {
        self.keys.lookup(key)
    }

    /// Gesture start; a new start discards any unfinished gesture
    pub fn begin_swipe(&mut self, x: f32) {
        self.gesture = Some(Gesture { start_x: x, last_x: None });
    }

    pub fn track_swipe(&mut self, x: f32) {
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.last_x = Some(x);
        }
    }

    /// Finish the gesture. Uses `x` if given, else the last tracked point.
    pub fn end_swipe(&mut self, x: Option<f32>) -> Option<Command> {
        let gesture = self.gesture.take()?;
        let end_x = x.or(gesture.last_x)?;
        classify_swipe(end_x - gesture.start_x, self.swipe_threshold)
    }

    pub fn is_swiping(&self) -> bool {
        self.gesture.is_some()
    }
}

/// Horizontal displacement -> command. Finger moving left (negative) is Next.
pub fn classify_swipe(dx: f32, threshold: f32) -> Option<Command> {
    if dx < -threshold {
        Some(Command::Next)
    } else if dx > threshold {
        Some(Command::Prev)
    } else {
        None
    }
}
