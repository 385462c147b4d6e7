//! Keyboard state exposed to entity scripts, double-buffered per frame.
//!
//! - **Level-triggered (down):** `is_down(key)` is true every frame the key is
//!   physically held. Used for continuous actions like walking.
//!
//! - **Edge-triggered (pressed / released):** `is_pressed(key)` is true only on
//!   the first frame the key is seen held. It compares the live `current` set
//!   against `previous`, the copy taken by `rotate()` at the end of the prior
//!   frame. `previous` is never aliased to the live set, so key events that
//!   arrive mid-frame cannot make a press disappear before scripts see it.
//!
//! Key names are host key names (`"arrowleft"`, `"a"`, `" "`), compared
//! case-insensitively.

use std::collections::HashSet;

pub struct InputTracker {
    current: HashSet<String>,
    previous: HashSet<String>,
}

impl InputTracker {
    pub fn new() -> Self {
        Self {
            current: HashSet::new(),
            previous: HashSet::new(),
        }
    }

    pub fn key_down(&mut self, key: &str) {
        self.current.insert(normalize_key(key));
    }

    pub fn key_up(&mut self, key: &str) {
        self.current.remove(&normalize_key(key));
    }

    /// Drop every held key, e.g. when the host loses focus.
    pub fn release_all(&mut self) {
        self.current.clear();
    }

    pub fn is_down(&self, key: &str) -> bool {
        self.current.contains(&normalize_key(key))
    }

    pub fn is_pressed(&self, key: &str) -> bool {
        let key = normalize_key(key);
        self.current.contains(&key) && !self.previous.contains(&key)
    }

    pub fn is_released(&self, key: &str) -> bool {
        let key = normalize_key(key);
        !self.current.contains(&key) && self.previous.contains(&key)
    }

    /// Copy the live state into the previous-frame buffer. Called once per
    /// frame, after render.
    pub fn rotate(&mut self) {
        self.previous.clone_from(&self.current);
    }

    /// Held keys in sorted order, for logs and debugging.
    pub fn held_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.current.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for InputTracker {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalize_key(key: &str) -> String {
    key.to_lowercase()
}
