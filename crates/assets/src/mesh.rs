use crate::AssetError;
use crate::image::PixelImage;
use crate::obj::{FaceVertex, RawMeshData};
use glam::{Vec2, Vec3};
use std::path::Path;

/// Errors from turning indexed faces into flat attribute streams.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("shape `{shape}` has non-triangular faces")]
    NotTriangulated { shape: String },
    #[error("shape `{shape}` face {face} has no {attribute} index")]
    MissingAttribute {
        shape: String,
        face: usize,
        attribute: &'static str,
    },
    #[error("shape `{shape}` face {face}: {attribute} index {index} out of range (len {len})")]
    IndexOutOfRange {
        shape: String,
        face: usize,
        attribute: &'static str,
        index: u32,
        len: usize,
    },
}

/// Non-indexed triangle-list attribute streams. All three have equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshGeometry {
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
}

impl MeshGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

fn fetch<T: Copy>(
    data: &[T],
    index: Option<u32>,
    attribute: &'static str,
    shape: &str,
    face: usize,
) -> Result<T, MeshError> {
    let index = index.ok_or_else(|| MeshError::MissingAttribute {
        shape: shape.to_owned(),
        face,
        attribute,
    })?;
    data.get(index as usize)
        .copied()
        .ok_or_else(|| MeshError::IndexOutOfRange {
            shape: shape.to_owned(),
            face,
            attribute,
            index,
            len: data.len(),
        })
}

/// Visit every face corner in shape → face → corner order.
fn for_each_corner(
    raw: &RawMeshData,
    mut visit: impl FnMut(&str, usize, &FaceVertex) -> Result<(), MeshError>,
) -> Result<(), MeshError> {
    for shape in &raw.shapes {
        for (face_index, face) in shape.faces.iter().enumerate() {
            for corner in face {
                visit(&shape.name, face_index, corner)?;
            }
        }
    }
    Ok(())
}

/// Expand indexed faces into position/normal/texcoord streams.
///
/// Each triangle contributes three independent vertex records, even where it
/// shares corners with its neighbours. Output vertex k is the k-th face
/// corner in traversal order.
pub fn flatten(raw: &RawMeshData) -> Result<MeshGeometry, MeshError> {
    let count = raw.face_count() * 3;
    let mut geometry = MeshGeometry {
        vertices: Vec::with_capacity(count),
        normals: Vec::with_capacity(count),
        tex_coords: Vec::with_capacity(count),
    };
    for_each_corner(raw, |shape, face, corner| {
        geometry
            .vertices
            .push(fetch(&raw.positions, Some(corner.position), "position", shape, face)?);
        geometry
            .normals
            .push(fetch(&raw.normals, corner.normal, "normal", shape, face)?);
        geometry
            .tex_coords
            .push(fetch(&raw.tex_coords, corner.tex_coord, "texcoord", shape, face)?);
        Ok(())
    })?;
    Ok(geometry)
}

/// Position-only traversal, for markers drawn without lighting or texture.
pub fn flatten_positions(raw: &RawMeshData) -> Result<Vec<Vec3>, MeshError> {
    let mut vertices = Vec::with_capacity(raw.face_count() * 3);
    for_each_corner(raw, |shape, face, corner| {
        vertices.push(fetch(&raw.positions, Some(corner.position), "position", shape, face)?);
        Ok(())
    })?;
    Ok(vertices)
}

/// A model ready for upload: flat attribute streams plus its diffuse texture.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenedMesh {
    geometry: MeshGeometry,
    diffuse: Option<PixelImage>,
}

impl FlattenedMesh {
    /// Parse, flatten and decode the diffuse texture of a model file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        Self::build(&RawMeshData::load(path)?)
    }

    /// Flatten a parsed model and decode its material's diffuse texture, if any.
    pub fn build(raw: &RawMeshData) -> Result<Self, AssetError> {
        let geometry = flatten(raw).map_err(|source| AssetError::Mesh {
            path: raw.path.clone(),
            source,
        })?;
        let diffuse = raw.diffuse_texture().map(PixelImage::load).transpose()?;
        Ok(Self { geometry, diffuse })
    }

    pub fn from_parts(geometry: MeshGeometry, diffuse: Option<PixelImage>) -> Self {
        Self { geometry, diffuse }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.geometry.vertices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.geometry.normals
    }

    pub fn tex_coords(&self) -> &[Vec2] {
        &self.geometry.tex_coords
    }

    pub fn diffuse(&self) -> Option<&PixelImage> {
        self.diffuse.as_ref()
    }

    pub fn vertex_count(&self) -> usize {
        self.geometry.vertex_count()
    }
}

/// A model reduced to positions only.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionMesh {
    vertices: Vec<Vec3>,
}

impl PositionMesh {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        Self::build(&RawMeshData::load(path)?)
    }

    pub fn build(raw: &RawMeshData) -> Result<Self, AssetError> {
        let vertices = flatten_positions(raw).map_err(|source| AssetError::Mesh {
            path: raw.path.clone(),
            source,
        })?;
        Ok(Self { vertices })
    }

    pub fn from_vertices(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}
