use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Keys the viewer binds. Anything else is dropped at the window boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    W,
    A,
    S,
    D,
    Space,
    LeftShift,
    LeftControl,
    Escape,
    Comma,
    F1,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad6,
    Numpad8,
}

/// "Is this key currently held" query, sampled once per frame.
pub trait HeldKeys {
    fn is_held(&self, key: Key) -> bool;
}

/// Held-key set maintained from press/release events.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    held: HashSet<Key>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a press or release. Returns true only on a press edge
    /// (released → pressed), which is what tap actions key off.
    pub fn update(&mut self, key: Key, pressed: bool) -> bool {
        if pressed {
            let edge = self.held.insert(key);
            if edge {
                tracing::trace!(?key, "key down");
            }
            edge
        } else {
            if self.held.remove(&key) {
                tracing::trace!(?key, "key up");
            }
            false
        }
    }

    /// Forget every held key, e.g. when the window loses focus and release
    /// events will not arrive.
    pub fn clear(&mut self) {
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

impl HeldKeys for KeySet {
    fn is_held(&self, key: Key) -> bool {
        self.held.contains(&key)
    }
}
