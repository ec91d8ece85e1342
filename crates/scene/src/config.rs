//! Scene description loaded at startup.
//!
//! Every field has a default, so a missing or partial file yields the stock
//! scene: two textured cubes, a light marker and a skybox, all read from
//! `assets/` relative to the working directory.

use crate::camera::Camera;
use crate::frame::FrameState;
use glam::Vec3;
use sceneview_common::Transform;
use sceneview_input::KeyBindings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read scene file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid scene file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scene configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// MSAA sample count: 1 or 4.
    pub msaa_samples: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "sceneview".into(),
            width: 1024,
            height: 768,
            msaa_samples: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub position: Vec3,
    pub look_direction: Vec3,
    pub up: Vec3,
    pub speed: f32,
    /// Degrees per cursor pixel.
    pub turn_sensitivity: f32,
    pub boost_multiplier: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 4.0),
            look_direction: Vec3::NEG_Z,
            up: Vec3::Y,
            speed: 3.0,
            turn_sensitivity: 0.1,
            boost_multiplier: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 30.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectConfig {
    pub model: PathBuf,
    #[serde(default)]
    pub transform: Transform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    pub position: Vec3,
    /// Marker mesh drawn at the light position.
    pub marker: PathBuf,
    pub marker_scale: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            marker: PathBuf::from("assets/models/light_marker.obj"),
            marker_scale: 0.1,
        }
    }
}

/// Six cubemap faces in +X, −X, +Y, −Y, +Z, −Z order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyboxConfig {
    pub faces: [PathBuf; 6],
}

impl Default for SkyboxConfig {
    fn default() -> Self {
        let face = |name: &str| PathBuf::from(format!("assets/textures/skybox/{name}.ppm"));
        Self {
            faces: [
                face("right"),
                face("left"),
                face("top"),
                face("bottom"),
                face("front"),
                face("back"),
            ],
        }
    }
}

/// Vertex + fragment source file pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPaths {
    fn stock(name: &str) -> Self {
        Self {
            vertex: PathBuf::from(format!("assets/shaders/{name}.vert.wgsl")),
            fragment: PathBuf::from(format!("assets/shaders/{name}.frag.wgsl")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub object: ShaderPaths,
    pub light: ShaderPaths,
    pub skybox: ShaderPaths,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            object: ShaderPaths::stock("object"),
            light: ShaderPaths::stock("light"),
            skybox: ShaderPaths::stock("skybox"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub projection: ProjectionConfig,
    pub light: LightConfig,
    pub objects: Vec<ObjectConfig>,
    pub skybox: SkyboxConfig,
    pub shaders: ShaderConfig,
    pub keys: KeyBindings,
}

impl Default for SceneConfig {
    fn default() -> Self {
        let object = |model: &str, x: f32| ObjectConfig {
            model: PathBuf::from(model),
            transform: Transform::from_position_scale(Vec3::new(x, 0.301, 0.0), 0.3),
        };
        Self {
            window: WindowConfig::default(),
            camera: CameraConfig::default(),
            projection: ProjectionConfig::default(),
            light: LightConfig::default(),
            objects: vec![
                object("assets/models/crate.obj", -1.0),
                object("assets/models/checker_cube.obj", 1.0),
            ],
            skybox: SkyboxConfig::default(),
            shaders: ShaderConfig::default(),
            keys: KeyBindings::default(),
        }
    }
}

impl SceneConfig {
    /// Read and validate a scene file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), objects = config.objects.len(), "loaded scene");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if self.window.width == 0 || self.window.height == 0 {
            return invalid(format!(
                "window size {}x{} must be non-zero",
                self.window.width, self.window.height
            ));
        }
        if !matches!(self.window.msaa_samples, 1 | 4) {
            return invalid(format!(
                "msaa_samples must be 1 or 4, got {}",
                self.window.msaa_samples
            ));
        }
        if self.camera.speed <= 0.0 || self.camera.boost_multiplier <= 0.0 {
            return invalid("camera speed and boost multiplier must be positive".into());
        }
        let (look, up) = (self.camera.look_direction, self.camera.up);
        if look.length_squared() == 0.0 {
            return invalid("camera look direction must be non-zero".into());
        }
        if up.length_squared() == 0.0 {
            return invalid("camera up vector must be non-zero".into());
        }
        if look.normalize().cross(up.normalize()).length_squared() < 1e-6 {
            return invalid(format!("camera up {up} is parallel to look direction {look}"));
        }
        let p = &self.projection;
        if !(p.near > 0.0 && p.near < p.far) {
            return invalid(format!("projection needs 0 < near < far, got {} / {}", p.near, p.far));
        }
        if !(p.fov_y_degrees > 0.0 && p.fov_y_degrees < 180.0) {
            return invalid(format!("fov_y_degrees {} out of (0, 180)", p.fov_y_degrees));
        }
        Ok(())
    }

    /// Resolve every relative asset path against `base`. Absolute paths are
    /// left alone.
    pub fn with_base_dir(mut self, base: &Path) -> Self {
        let rebase = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        for object in &mut self.objects {
            rebase(&mut object.model);
        }
        rebase(&mut self.light.marker);
        self.skybox.faces.iter_mut().for_each(rebase);
        for shader in [&mut self.shaders.object, &mut self.shaders.light, &mut self.shaders.skybox] {
            rebase(&mut shader.vertex);
            rebase(&mut shader.fragment);
        }
        self
    }

    /// Build the camera described by this scene.
    pub fn camera(&self) -> Camera {
        let c = &self.camera;
        let mut camera = Camera::new(c.position, c.look_direction, c.up, c.speed, c.turn_sensitivity);
        camera.boost_multiplier = c.boost_multiplier;
        camera
    }

    /// Initial frame state for a framebuffer of the given size.
    pub fn frame_state(&self, width: u32, height: u32) -> FrameState {
        FrameState::new(self.camera(), self.light.position, width as f32, height as f32)
    }
}
