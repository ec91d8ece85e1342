use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Rendering style applied uniformly to every drawable in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DrawMode {
    #[default]
    Filled,
    Wireframe,
    Points,
}

impl DrawMode {
    /// The mode selected by the next tap of the cycle key.
    pub fn next(self) -> Self {
        match self {
            DrawMode::Filled => DrawMode::Wireframe,
            DrawMode::Wireframe => DrawMode::Points,
            DrawMode::Points => DrawMode::Filled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DrawMode::Filled => "filled",
            DrawMode::Wireframe => "wireframe",
            DrawMode::Points => "points",
        }
    }
}

/// Spatial transform: position, rotation, scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Translation followed by a uniform scale, the placement used for scene objects.
    pub fn from_position_scale(position: Vec3, scale: f32) -> Self {
        Self {
            position,
            scale: Vec3::splat(scale),
            ..Self::default()
        }
    }

    /// Model matrix applying scale, then rotation, then translation.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draw_mode_cycles_through_all_three() {
        let mut mode = DrawMode::default();
        assert_eq!(mode, DrawMode::Filled);
        mode = mode.next();
        assert_eq!(mode, DrawMode::Wireframe);
        mode = mode.next();
        assert_eq!(mode, DrawMode::Points);
        mode = mode.next();
        assert_eq!(mode, DrawMode::Filled);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn matrix_scales_before_translating() {
        let t = Transform::from_position_scale(Vec3::new(-1.0, 0.301, 0.0), 0.3);
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(-0.7, 0.301, 0.0)).length() < 1e-6);
    }

    #[test]
    fn partial_transform_deserializes_with_defaults() {
        let t: Transform = serde_json::from_str(r#"{ "position": [1.0, 2.0, 3.0] }"#).unwrap();
        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::ONE);
    }
}
