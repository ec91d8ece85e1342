//! Asset loading: decoded images, parsed OBJ models and GPU-ready flattened meshes.
//!
//! Everything here is CPU-side. GPU upload consumes the values produced by this
//! crate and may drop them afterwards; the device keeps its own copy.
//!
//! # Invariants
//! - A decoded image has 3 or 4 channels. Anything else is a load error.
//! - A model references at most one material.
//! - Flattened attribute sequences all have length 3 × triangle count.

pub mod image;
pub mod mesh;
pub mod obj;

pub use image::{PixelFormat, PixelImage};
pub use mesh::{FlattenedMesh, MeshError, MeshGeometry, PositionMesh, flatten, flatten_positions};
pub use obj::{FaceVertex, MaterialRef, RawMeshData, RawShape};

use std::path::PathBuf;

/// Errors from asset loading. All of them are fatal for the viewer.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode image {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: ::image::ImageError,
    },
    #[error(
        "image {} has {channels} channels; only 3 (RGB) or 4 (RGBA) are supported",
        path.display()
    )]
    UnsupportedChannels { path: PathBuf, channels: u8 },
    #[error("failed to parse model {}: {source}", path.display())]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },
    #[error("model {} declares {count} materials; at most 1 is supported", path.display())]
    MultipleMaterials { path: PathBuf, count: usize },
    #[error("model {}: {source}", path.display())]
    Mesh {
        path: PathBuf,
        #[source]
        source: MeshError,
    },
}

impl AssetError {
    /// The file the failure is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            AssetError::Io { path, .. }
            | AssetError::Image { path, .. }
            | AssetError::UnsupportedChannels { path, .. }
            | AssetError::Obj { path, .. }
            | AssetError::MultipleMaterials { path, .. }
            | AssetError::Mesh { path, .. } => path,
        }
    }
}

pub fn crate_info() -> &'static str {
    "sceneview-assets v0.1.0"
}
