use sceneview_input::Key;
use winit::keyboard::KeyCode;

/// Translate a physical key into a viewer key. Unbound keys are dropped here.
pub fn viewer_key(code: KeyCode) -> Option<Key> {
    let key = match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::Space => Key::Space,
        KeyCode::ShiftLeft => Key::LeftShift,
        KeyCode::ControlLeft => Key::LeftControl,
        KeyCode::Escape => Key::Escape,
        KeyCode::Comma => Key::Comma,
        KeyCode::F1 => Key::F1,
        KeyCode::Numpad1 => Key::Numpad1,
        KeyCode::Numpad2 => Key::Numpad2,
        KeyCode::Numpad3 => Key::Numpad3,
        KeyCode::Numpad4 => Key::Numpad4,
        KeyCode::Numpad6 => Key::Numpad6,
        KeyCode::Numpad8 => Key::Numpad8,
        _ => return None,
    };
    Some(key)
}
