//! Engine settings, persisted as `storyplay.json` in the config directory.
//!
//! Every field has a default, so partial or older files load fine.

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::core::clock::DEFAULT_TICK_INTERVAL;
use crate::core::engine_events::Command;
use crate::core::input::{DEFAULT_SWIPE_THRESHOLD, KeyBindings};
use crate::core::media_cache::DEFAULT_CACHE_ENTRIES;

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "storyplay.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub tick_interval_ms: u64,     // Progress tick cadence (default 100)
    pub swipe_threshold_px: f32,   // Min horizontal travel for a swipe (default 50)
    pub start_muted: bool,         // Videos start muted (default true)
    pub preload_cache_entries: usize,
    pub preload_workers: usize,    // 0 = auto

    /// Extra/overriding key bindings, e.g. `{ "KeyM": "ToggleMute" }`
    pub key_bindings: BTreeMap<String, Command>,
    /// Default keys to drop
    pub unbound_keys: Vec<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL.as_millis() as u64,
            swipe_threshold_px: DEFAULT_SWIPE_THRESHOLD,
            start_muted: true,
            preload_cache_entries: DEFAULT_CACHE_ENTRIES,
            preload_workers: 0,
            key_bindings: BTreeMap::new(),
            unbound_keys: Vec::new(),
        }
    }
}

impl EngineSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Default bindings minus `unbound_keys`, plus `key_bindings`
    pub fn key_bindings(&self) -> KeyBindings {
        let mut keys = KeyBindings::with_defaults();
        for key in &self.unbound_keys {
            keys.unbind(key);
        }
        for (key, command) in &self.key_bindings {
            keys.bind(key, *command);
        }
        keys
    }

    /// Worker threads for preloading (auto: a quarter of the cores, 1..=4)
    pub fn preload_worker_count(&self) -> usize {
        if self.preload_workers == 0 {
            (num_cpus::get() / 4).clamp(1, 4)
        } else {
            self.preload_workers
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse settings: {}", path.display()))
    }

    /// Load settings; a missing file gives defaults, a broken one is logged and ignored
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                info!("Settings loaded from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("{:#}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Like `load_or_default`, but a missing file is created with the defaults
    /// so there is something to edit.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::load_or_default(path);
        }
        let settings = Self::default();
        match settings.save(path) {
            Ok(()) => info!("Default settings written to {}", path.display()),
            Err(e) => warn!("{:#}", e),
        }
        settings
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write settings: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let s: EngineSettings = serde_json::from_str(r#"{ "tick_interval_ms": 50 }"#).unwrap();
        assert_eq!(s.tick_interval(), Duration::from_millis(50));
        assert_eq!(s.swipe_threshold_px, 50.0);
        assert!(s.start_muted);
    }

    #[test]
    fn test_key_binding_overrides() {
        let s: EngineSettings = serde_json::from_str(
            r#"{ "key_bindings": { "KeyM": "ToggleMute", "Escape": "Close" }, "unbound_keys": ["Space"] }"#,
        )
        .unwrap();
        let keys = s.key_bindings();
        assert_eq!(keys.get("KeyM"), Some(Command::ToggleMute));
        assert_eq!(keys.get("Escape"), Some(Command::Close));
        assert_eq!(keys.get("Space"), None);
        assert_eq!(keys.get("ArrowRight"), Some(Command::Next));
    }

    #[test]
    fn test_load_or_init_writes_defaults_once() {
        let dir = std::env::temp_dir().join(format!("storyplay_settings_init_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(SETTINGS_FILE);

        assert_eq!(EngineSettings::load_or_init(&path), EngineSettings::default());
        assert!(path.exists());
        assert_eq!(EngineSettings::load(&path).unwrap(), EngineSettings::default());

        // Existing file is read, not overwritten
        std::fs::write(&path, r#"{ "start_muted": false }"#).unwrap();
        assert!(!EngineSettings::load_or_init(&path).start_muted);
        assert!(!EngineSettings::load(&path).unwrap().start_muted);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_save_load_and_fallbacks() {
        let dir = std::env::temp_dir().join(format!("storyplay_settings_{}", std::process::id()));
        let _ = std::fs::create_dir_all(&dir);
        let path = dir.join(SETTINGS_FILE);

        // Missing file -> defaults
        let _ = std::fs::remove_file(&path);
        assert_eq!(EngineSettings::load_or_default(&path), EngineSettings::default());

        let mut s = EngineSettings::default();
        s.start_muted = false;
        s.preload_workers = 2;
        s.save(&path).unwrap();
        let loaded = EngineSettings::load(&path).unwrap();
        assert!(!loaded.start_muted);
        assert_eq!(loaded.preload_worker_count(), 2);

        // Broken file -> defaults, no error
        std::fs::write(&path, "{ nope").unwrap();
        assert!(EngineSettings::load(&path).is_err());
        assert_eq!(EngineSettings::load_or_default(&path), EngineSettings::default());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
