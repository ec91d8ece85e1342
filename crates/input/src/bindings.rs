use crate::action::ActionMap;
use crate::key::{HeldKeys, Key};
use serde::{Deserialize, Serialize};

/// Six held keys that move something along three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveKeys {
    pub left: Key,
    pub right: Key,
    pub down: Key,
    pub up: Key,
    pub forward: Key,
    pub backward: Key,
}

impl MoveKeys {
    /// Signed axis state from held keys: x = right − left, y = up − down,
    /// z = forward − backward. Each component is −1, 0 or 1.
    pub fn axes(&self, keys: &impl HeldKeys) -> [f32; 3] {
        let axis = |negative: Key, positive: Key| {
            let mut v = 0.0;
            if keys.is_held(negative) {
                v -= 1.0;
            }
            if keys.is_held(positive) {
                v += 1.0;
            }
            v
        };
        [
            axis(self.left, self.right),
            axis(self.down, self.up),
            axis(self.backward, self.forward),
        ]
    }
}

/// Every key the viewer listens to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub camera: MoveKeys,
    pub light: MoveKeys,
    /// Held to multiply movement speed.
    pub boost: Key,
    /// Held to request shutdown.
    pub quit: Key,
    pub actions: ActionMap,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            camera: MoveKeys {
                left: Key::A,
                right: Key::D,
                down: Key::LeftShift,
                up: Key::Space,
                forward: Key::W,
                backward: Key::S,
            },
            light: MoveKeys {
                left: Key::Numpad4,
                right: Key::Numpad6,
                down: Key::Numpad8,
                up: Key::Numpad2,
                forward: Key::Numpad1,
                backward: Key::Numpad3,
            },
            boost: Key::LeftControl,
            quit: Key::Escape,
            actions: ActionMap::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::KeySet;

    #[test]
    fn opposite_keys_cancel() {
        let bindings = KeyBindings::default();
        let mut keys = KeySet::new();
        keys.update(Key::A, true);
        keys.update(Key::D, true);
        keys.update(Key::W, true);
        assert_eq!(bindings.camera.axes(&keys), [0.0, 0.0, 1.0]);
    }

    #[test]
    fn nothing_held_is_zero() {
        let bindings = KeyBindings::default();
        let keys = KeySet::new();
        assert_eq!(bindings.light.axes(&keys), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn light_keys_use_numpad() {
        let bindings = KeyBindings::default();
        let mut keys = KeySet::new();
        keys.update(Key::Numpad6, true);
        keys.update(Key::Numpad2, true);
        keys.update(Key::Numpad3, true);
        assert_eq!(bindings.light.axes(&keys), [1.0, 1.0, -1.0]);
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let bindings: KeyBindings = serde_json::from_str(r#"{ "boost": "LeftShift" }"#).unwrap();
        assert_eq!(bindings.boost, Key::LeftShift);
        assert_eq!(bindings.camera, KeyBindings::default().camera);
        assert_eq!(bindings.quit, Key::Escape);
    }
}
