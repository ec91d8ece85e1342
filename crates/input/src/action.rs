use crate::key::Key;
use serde::{Deserialize, Serialize};

/// A discrete action triggered by a single tap of a key.
///
/// Actions are dispatched from press edges, never from per-frame polling, so
/// one physical keypress yields exactly one action at any frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Advance the draw mode: filled → wireframe → points → filled.
    CycleDrawMode,
    /// Show or hide the on-screen HUD.
    ToggleHud,
}

/// Tap-key → action table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMap {
    bindings: Vec<(Key, Action)>,
}

impl Default for ActionMap {
    fn default() -> Self {
        Self {
            bindings: vec![(Key::Comma, Action::CycleDrawMode), (Key::F1, Action::ToggleHud)],
        }
    }
}

impl ActionMap {
    /// Action bound to `key`, if any.
    pub fn action_for(&self, key: Key) -> Option<Action> {
        self.bindings
            .iter()
            .find(|(bound, _)| *bound == key)
            .map(|(_, action)| *action)
    }

    /// Resolve a key event. Only press edges produce an action.
    pub fn on_key(&self, key: Key, press_edge: bool) -> Option<Action> {
        if !press_edge {
            return None;
        }
        let action = self.action_for(key);
        if let Some(action) = action {
            tracing::debug!(?key, ?action, "tap action");
        }
        action
    }
}
