use crate::camera::Camera;
use glam::{Vec2, Vec3};
use sceneview_common::DrawMode;
use sceneview_input::{Action, HeldKeys, KeyBindings};

/// Everything the renderer reads and the input handlers write, for one window.
#[derive(Debug, Clone)]
pub struct FrameState {
    pub camera: Camera,
    pub light_position: Vec3,
    pub last_cursor: Vec2,
    pub aspect_ratio: f32,
    pub draw_mode: DrawMode,
    /// Seconds between the start of the previous frame and this one.
    pub elapsed_seconds: f32,
    pub show_hud: bool,
    close_requested: bool,
}

impl FrameState {
    /// State for a `width × height` framebuffer. The cursor reference starts
    /// at the screen centre.
    pub fn new(camera: Camera, light_position: Vec3, width: f32, height: f32) -> Self {
        Self {
            camera,
            light_position,
            last_cursor: Vec2::new(width / 2.0, height / 2.0),
            aspect_ratio: width / height.max(1.0),
            draw_mode: DrawMode::Filled,
            elapsed_seconds: 0.0,
            show_hud: true,
            close_requested: false,
        }
    }

    /// Start a new frame `elapsed_seconds` after the previous one started.
    pub fn begin_frame(&mut self, elapsed_seconds: f32) {
        self.elapsed_seconds = elapsed_seconds.max(0.0);
    }

    /// Cursor moved to `position` (window pixels, y down).
    pub fn on_cursor_moved(&mut self, position: Vec2) {
        let previous = self.last_cursor;
        self.camera.observe_cursor(previous, position);
        self.last_cursor = position;
    }

    /// Framebuffer resized.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            // minimised; keep the last usable ratio
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
    }

    /// Apply a tap action.
    pub fn on_action(&mut self, action: Action) {
        match action {
            Action::CycleDrawMode => {
                self.draw_mode = self.draw_mode.next();
                tracing::info!(mode = self.draw_mode.label(), "draw mode");
            }
            Action::ToggleHud => self.show_hud = !self.show_hud,
        }
    }

    /// Integrate held-key motion for this frame. Camera keys move along the
    /// camera basis, light keys along world axes, both with the same step.
    pub fn apply_held_keys(&mut self, keys: &impl HeldKeys, bindings: &KeyBindings) {
        let step = self
            .camera
            .step(self.elapsed_seconds, keys.is_held(bindings.boost));

        self.camera.translate(bindings.camera.axes(keys), step);
        self.light_position += Vec3::from_array(bindings.light.axes(keys)) * step;

        if keys.is_held(bindings.quit) && !self.close_requested {
            tracing::info!("close requested");
            self.close_requested = true;
        }
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    /// Checked once per loop iteration, after the current frame is finished.
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneview_input::{Key, KeySet};

    fn assert_near(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a} != {b}");
    }

    fn frame() -> FrameState {
        FrameState::new(Camera::default(), Vec3::ZERO, 1024.0, 768.0)
    }

    #[test]
    fn forward_then_boosted_forward() {
        let bindings = KeyBindings::default();
        let mut state = frame();
        let mut keys = KeySet::new();
        keys.update(Key::W, true);

        state.begin_frame(1.0);
        state.apply_held_keys(&keys, &bindings);
        assert_near(state.camera.position, Vec3::new(0.0, 0.0, 1.0));

        keys.update(Key::LeftControl, true);
        state.begin_frame(0.5);
        state.apply_held_keys(&keys, &bindings);
        assert_near(state.camera.position, Vec3::new(0.0, 0.0, -3.5));
    }

    #[test]
    fn no_keys_no_motion() {
        let bindings = KeyBindings::default();
        let mut state = frame();
        state.begin_frame(0.25);
        state.apply_held_keys(&KeySet::new(), &bindings);
        assert_eq!(state.camera.position, Camera::default().position);
        assert_eq!(state.light_position, Vec3::ZERO);
        assert!(!state.close_requested());
    }

    #[test]
    fn light_moves_on_world_axes_with_camera_step() {
        let bindings = KeyBindings::default();
        let mut state = frame();
        // turn the camera so its basis differs from world axes
        state.camera.turn(450.0, 0.0);
        let mut keys = KeySet::new();
        keys.update(Key::Numpad6, true);
        keys.update(Key::Numpad1, true);
        state.begin_frame(1.0);
        state.apply_held_keys(&keys, &bindings);
        assert_near(state.light_position, Vec3::new(3.0, 0.0, 3.0));
        assert_eq!(state.camera.position, Camera::default().position);
    }

    #[test]
    fn cursor_priming_then_turning() {
        let mut state = frame();
        let yaw = state.camera.yaw();
        state.on_cursor_moved(Vec2::new(10.0, 10.0));
        assert_eq!(state.camera.yaw(), yaw);
        assert_eq!(state.last_cursor, Vec2::new(10.0, 10.0));

        state.on_cursor_moved(Vec2::new(20.0, 10.0));
        assert!((state.camera.yaw() - (yaw + 1.0)).abs() < 1e-5);
    }

    #[test]
    fn escape_requests_close() {
        let bindings = KeyBindings::default();
        let mut state = frame();
        let mut keys = KeySet::new();
        keys.update(Key::Escape, true);
        state.begin_frame(0.016);
        state.apply_held_keys(&keys, &bindings);
        assert!(state.close_requested());
    }

    #[test]
    fn resize_updates_aspect_and_ignores_zero() {
        let mut state = frame();
        assert!((state.aspect_ratio - 4.0 / 3.0).abs() < 1e-6);
        state.on_resize(1920, 1080);
        assert!((state.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
        state.on_resize(0, 1080);
        assert!((state.aspect_ratio - 16.0 / 9.0).abs() < 1e-6);
    }

    #[test]
    fn actions_cycle_mode_and_toggle_hud() {
        let mut state = frame();
        state.on_action(Action::CycleDrawMode);
        assert_eq!(state.draw_mode, DrawMode::Wireframe);
        state.on_action(Action::CycleDrawMode);
        state.on_action(Action::CycleDrawMode);
        assert_eq!(state.draw_mode, DrawMode::Filled);
        assert!(state.show_hud);
        state.on_action(Action::ToggleHud);
        assert!(!state.show_hud);
    }
}
