//! CPU-side staging of everything a scene needs before upload.
//!
//! Loading happens in full before any device object exists, so a bad file
//! aborts startup before a window or device is created.

use crate::RenderError;
use crate::shader::{self, ShaderError, ShaderSource};
use crate::skybox::check_faces;
use sceneview_assets::{FlattenedMesh, PixelImage, PositionMesh};
use sceneview_common::Transform;
use sceneview_scene::SceneConfig;
use sceneview_scene::config::{ProjectionConfig, ShaderPaths};

pub struct StagedObject {
    pub mesh: FlattenedMesh,
    pub transform: Transform,
}

pub struct ShaderSet {
    pub object: ShaderSource,
    pub light: ShaderSource,
    pub skybox: ShaderSource,
}

impl ShaderSet {
    pub fn load(object: &ShaderPaths, light: &ShaderPaths, skybox: &ShaderPaths) -> Result<Self, ShaderError> {
        let read = |paths: &ShaderPaths| ShaderSource::from_files(&paths.vertex, &paths.fragment);
        Ok(Self {
            object: read(object)?,
            light: read(light)?,
            skybox: read(skybox)?,
        })
    }

    /// Compile and link every program without a device.
    pub fn check(&self) -> Result<(), ShaderError> {
        for source in [&self.object, &self.light, &self.skybox] {
            shader::link(source)?;
        }
        Ok(())
    }
}

/// A fully decoded scene, ready for [`SceneRenderer::new`].
///
/// [`SceneRenderer::new`]: crate::SceneRenderer::new
pub struct SceneAssets {
    pub objects: Vec<StagedObject>,
    pub light_marker: PositionMesh,
    pub light_marker_scale: f32,
    /// +X, −X, +Y, −Y, +Z, −Z.
    pub skybox_faces: [PixelImage; 6],
    pub shaders: ShaderSet,
    pub projection: ProjectionConfig,
}

impl SceneAssets {
    /// Read, parse and decode every file the scene names.
    pub fn load(config: &SceneConfig) -> Result<Self, RenderError> {
        let shaders = ShaderSet::load(&config.shaders.object, &config.shaders.light, &config.shaders.skybox)?;

        let objects = config
            .objects
            .iter()
            .map(|object| -> Result<_, RenderError> {
                Ok(StagedObject {
                    mesh: FlattenedMesh::load(&object.model)?,
                    transform: object.transform,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let light_marker = PositionMesh::load(&config.light.marker)?;

        let faces = config
            .skybox
            .faces
            .iter()
            .map(PixelImage::load)
            .collect::<Result<Vec<_>, _>>()?;
        let skybox_faces: [PixelImage; 6] = faces
            .try_into()
            .map_err(|_| RenderError::Cubemap("expected six faces".into()))?;
        check_faces(&skybox_faces)?;

        tracing::info!(
            objects = objects.len(),
            vertices = objects.iter().map(|o| o.mesh.vertex_count()).sum::<usize>(),
            marker_vertices = light_marker.vertex_count(),
            skybox_size = skybox_faces[0].width(),
            "scene assets loaded"
        );
        Ok(Self {
            objects,
            light_marker,
            light_marker_scale: config.light.marker_scale,
            skybox_faces,
            shaders,
            projection: config.projection.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sceneview_assets::AssetError;
    use std::path::{Path, PathBuf};

    fn repo_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    /// The stock scene with paths resolved against the repository root.
    pub(crate) fn stock_config() -> SceneConfig {
        SceneConfig::default().with_base_dir(&repo_root())
    }

    #[test]
    fn shipped_scene_loads() {
        let assets = SceneAssets::load(&stock_config()).unwrap();
        assert_eq!(assets.objects.len(), 2);
        for object in &assets.objects {
            assert_eq!(object.mesh.vertex_count() % 3, 0);
            assert!(object.mesh.diffuse().is_some());
        }
        assert!(assets.light_marker.vertex_count() > 0);
        assert_eq!(assets.light_marker_scale, 0.1);
        assets.shaders.check().unwrap();
    }

    #[test]
    fn missing_model_names_the_file() {
        let mut config = stock_config();
        config.objects[1].model = repo_root().join("assets/models/nope.obj");
        match SceneAssets::load(&config) {
            Err(RenderError::Asset(err)) => {
                assert!(matches!(err, AssetError::Obj { .. }));
                assert!(err.path().ends_with("nope.obj"));
            }
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected an asset error"),
        }
    }

    #[test]
    fn missing_shader_is_a_shader_error() {
        let mut config = stock_config();
        config.shaders.light.fragment = PathBuf::from("/nonexistent/light.frag.wgsl");
        assert!(matches!(
            SceneAssets::load(&config),
            Err(RenderError::Shader(ShaderError::Io { .. }))
        ));
    }

    #[test]
    fn missing_skybox_face_fails() {
        let mut config = stock_config();
        config.skybox.faces[4] = PathBuf::from("/nonexistent/front.ppm");
        assert!(matches!(SceneAssets::load(&config), Err(RenderError::Asset(_))));
    }
}
