use glam::{Mat4, Vec2, Vec3};

/// Pitch limit in degrees. Looking straight up or down would make the view
/// basis degenerate.
pub const PITCH_LIMIT: f32 = 89.0;

/// Free-fly camera. Yaw and pitch are in degrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    look_direction: Vec3,
    pub up: Vec3,
    yaw: f32,
    pitch: f32,
    pub speed: f32,
    pub turn_sensitivity: f32,
    /// Speed multiplier while the boost key is held.
    pub boost_multiplier: f32,
    primed: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, 4.0), Vec3::NEG_Z, Vec3::Y, 3.0, 0.1)
    }
}

impl Camera {
    /// A camera at `position` looking along `look_direction`. Yaw and pitch
    /// are derived from the direction, with pitch clamped to the limit, so
    /// the first turn continues from where the camera already looks.
    pub fn new(
        position: Vec3,
        look_direction: Vec3,
        up: Vec3,
        speed: f32,
        turn_sensitivity: f32,
    ) -> Self {
        let direction = look_direction.normalize_or(Vec3::NEG_Z);
        let mut camera = Self {
            position,
            look_direction: direction,
            up,
            yaw: direction.z.atan2(direction.x).to_degrees(),
            pitch: direction.y.clamp(-1.0, 1.0).asin().to_degrees().clamp(-PITCH_LIMIT, PITCH_LIMIT),
            speed,
            turn_sensitivity,
            boost_multiplier: 3.0,
            primed: false,
        };
        camera.rebuild_direction();
        camera
    }

    pub fn look_direction(&self) -> Vec3 {
        self.look_direction
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Whether a cursor position has been observed yet.
    pub fn is_primed(&self) -> bool {
        self.primed
    }

    /// Feed one cursor observation, given the previous one.
    ///
    /// The first observation only primes the camera: there is no earlier
    /// position to diff against, so yaw and pitch stay put. Later
    /// observations turn by `(current − previous)` scaled by the sensitivity,
    /// with screen y pointing down.
    pub fn observe_cursor(&mut self, previous: Vec2, current: Vec2) {
        if !self.primed {
            self.primed = true;
            tracing::debug!(x = current.x, y = current.y, "camera primed");
            return;
        }
        self.turn(current.x - previous.x, previous.y - current.y);
    }

    /// Turn by raw cursor deltas (x right, y up).
    pub fn turn(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.turn_sensitivity;
        self.pitch = (self.pitch + dy * self.turn_sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.rebuild_direction();
    }

    fn rebuild_direction(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.look_direction = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
    }

    /// Distance covered this frame.
    pub fn step(&self, elapsed_seconds: f32, boosted: bool) -> f32 {
        let step = self.speed * elapsed_seconds;
        if boosted { step * self.boost_multiplier } else { step }
    }

    /// Translate along the camera basis. `axes` is (sideways, upwards,
    /// forwards), each scaled by `step`.
    pub fn translate(&mut self, axes: [f32; 3], step: f32) {
        let sideways = self.look_direction.cross(self.up).normalize_or_zero();
        let delta =
            sideways * axes[0] + self.up * axes[1] + self.look_direction * axes[2];
        self.position += delta * step;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.look_direction, self.up)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a} != {b}");
    }

    #[test]
    fn default_camera_looks_down_negative_z() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 4.0));
        assert_near(cam.look_direction(), Vec3::NEG_Z);
        let view = cam.view_matrix();
        assert!(!view.col(0).x.is_nan());
    }

    #[test]
    fn first_observation_only_primes() {
        let mut cam = Camera::default();
        let before = cam.clone();
        cam.observe_cursor(Vec2::new(512.0, 384.0), Vec2::new(9000.0, -400.0));
        assert!(cam.is_primed());
        assert_eq!(cam.yaw(), before.yaw());
        assert_eq!(cam.pitch(), before.pitch());
        assert_eq!(cam.look_direction(), before.look_direction());
    }

    #[test]
    fn later_observations_turn_by_scaled_delta() {
        let mut cam = Camera::default();
        cam.observe_cursor(Vec2::ZERO, Vec2::new(100.0, 100.0));
        cam.observe_cursor(Vec2::new(100.0, 100.0), Vec2::new(130.0, 80.0));
        // dx = 30, dy = 100 - 80 = 20, sensitivity 0.1
        assert!((cam.yaw() - (-90.0 + 3.0)).abs() < 1e-4);
        assert!((cam.pitch() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn pitch_is_clamped_and_direction_stays_unit() {
        let mut cam = Camera::default();
        cam.observe_cursor(Vec2::ZERO, Vec2::ZERO);
        let deltas = [
            (0.0, 5000.0),
            (12.0, -3.0),
            (-700.0, -90000.0),
            (3.5, 17.25),
            (0.0, 1780.0),
            (-1.0, -1781.0),
        ];
        let mut cursor = Vec2::ZERO;
        for (dx, dy) in deltas {
            let next = cursor + Vec2::new(dx, -dy);
            cam.observe_cursor(cursor, next);
            cursor = next;
            assert!(cam.pitch() <= PITCH_LIMIT && cam.pitch() >= -PITCH_LIMIT);
            assert!((cam.look_direction().length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn pitch_hits_both_limits() {
        let mut cam = Camera::default();
        cam.turn(0.0, 10_000.0);
        assert_eq!(cam.pitch(), PITCH_LIMIT);
        cam.turn(0.0, -100_000.0);
        assert_eq!(cam.pitch(), -PITCH_LIMIT);
    }

    #[test]
    fn configured_direction_sets_yaw_and_pitch() {
        let directions = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Z,
            Vec3::new(1.0, 1.0, -1.0),
            Vec3::new(-0.3, -0.8, 0.2),
        ];
        for direction in directions {
            let mut cam = Camera::new(Vec3::ZERO, direction, Vec3::Y, 3.0, 0.1);
            assert_near(cam.look_direction(), direction.normalize());

            let before = cam.look_direction();
            cam.observe_cursor(Vec2::ZERO, Vec2::ZERO);
            cam.observe_cursor(Vec2::ZERO, Vec2::new(1.0, 0.0));
            let turned = before.angle_between(cam.look_direction()).to_degrees();
            assert!(turned < 0.11, "one pixel turned {turned} degrees from {direction}");
        }
    }

    #[test]
    fn steep_direction_is_clamped_to_pitch_limit() {
        let cam = Camera::new(Vec3::ZERO, Vec3::Y, Vec3::Y, 3.0, 0.1);
        assert_eq!(cam.pitch(), PITCH_LIMIT);
        assert!((cam.look_direction().y - PITCH_LIMIT.to_radians().sin()).abs() < 1e-5);
        assert!(!cam.view_matrix().col(0).x.is_nan());
    }

    #[test]
    fn translate_moves_along_basis() {
        let mut cam = Camera::default();
        cam.translate([1.0, 0.0, 0.0], 2.0);
        // look −Z × up +Y = +X
        assert_near(cam.position, Vec3::new(2.0, 0.0, 4.0));
        cam.translate([0.0, -1.0, 0.0], 1.0);
        assert_near(cam.position, Vec3::new(2.0, -1.0, 4.0));
    }

    #[test]
    fn boost_multiplies_step() {
        let cam = Camera::default();
        assert_eq!(cam.step(0.5, false), 1.5);
        assert_eq!(cam.step(0.5, true), 4.5);
    }
}
