//! Renderer-agnostic GPU layer.
//!
//! Scene code owns device objects through handles and draws through the
//! [`GpuBackend`] trait; a concrete API plugs in behind it.
//!
//! # Invariants
//! - A device object is released exactly once, by the handle that owns it.
//! - Handles are move-only. A moved-from handle is empty and releases nothing.
//! - Attribute slots are fixed: position 0, normal 1, texcoord 2, tangent 3.
//! - Every uniform a program bundle uses is resolved when the bundle is built;
//!   an unknown name fails construction.
//! - The skybox is drawn last with a less-or-equal depth test, and the depth
//!   test is back to less once it is done.

pub mod backend;
pub mod drawable;
pub mod handle;
pub mod program;
pub mod recording;
pub mod renderer;
pub mod scene;
pub mod shader;
pub mod skybox;

pub use backend::{
    AttributeSlot, BufferId, DepthFunc, DeviceState, Gpu, GpuBackend, PolygonMode, ProgramId, TextureDimension,
    TextureId, TextureUnit, Topology,
};
pub use drawable::{Mesh, PointCloud};
pub use handle::{
    AttributeBuffer, Cubemap, DiffuseTexture, NormalBuffer, NormalMapTexture, PositionBuffer, TangentBuffer,
    TexCoordBuffer, Texture2d,
};
pub use program::{LightProgram, ObjectProgram, Program, SkyboxProgram, UniformLocation, UniformValue};
pub use recording::RecordingBackend;
pub use renderer::{SceneObject, SceneRenderer};
pub use scene::SceneAssets;
pub use shader::{ProgramLayout, ShaderError, ShaderSource, ShaderStage};
pub use skybox::Skybox;

use sceneview_assets::AssetError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error("invalid skybox: {0}")]
    Cubemap(String),
}

pub fn crate_info() -> &'static str {
    "sceneview-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_keep_their_source_message() {
        let err: RenderError = ShaderError::UnknownUniform {
            program: "object".into(),
            name: "tex".into(),
        }
        .into();
        assert_eq!(err.to_string(), "program `object` has no uniform named `tex`");
    }
}
