use crate::AssetError;
use crate::mesh::MeshError;
use glam::{Vec2, Vec3};
use std::path::{Path, PathBuf};

/// One corner of a face: indices into the model's attribute arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceVertex {
    pub position: u32,
    pub normal: Option<u32>,
    pub tex_coord: Option<u32>,
}

impl FaceVertex {
    pub fn new(position: u32, normal: u32, tex_coord: u32) -> Self {
        Self {
            position,
            normal: Some(normal),
            tex_coord: Some(tex_coord),
        }
    }
}

/// A named group of triangles.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawShape {
    pub name: String,
    pub faces: Vec<[FaceVertex; 3]>,
}

/// The single material a model may reference.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MaterialRef {
    pub name: String,
    /// Diffuse texture, already resolved against the model's directory.
    pub diffuse_texture: Option<PathBuf>,
}

/// A parsed model: shared attribute arrays plus indexed, triangulated faces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawMeshData {
    /// File the model came from, used to attribute errors.
    pub path: PathBuf,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub tex_coords: Vec<Vec2>,
    pub shapes: Vec<RawShape>,
    pub material: Option<MaterialRef>,
}

impl RawMeshData {
    /// Parse a Wavefront OBJ file and its material library.
    ///
    /// Faces are triangulated by the parser. A model declaring more than one
    /// material is rejected; a missing material library only loses the texture.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        };
        let (models, materials) = tobj::load_obj(path, &options).map_err(|source| AssetError::Obj {
            path: path.to_path_buf(),
            source,
        })?;

        let materials = match materials {
            Ok(materials) => materials,
            Err(e) => {
                tracing::warn!(path = %path.display(), "material library unavailable: {e}");
                Vec::new()
            }
        };
        if materials.len() > 1 {
            return Err(AssetError::MultipleMaterials {
                path: path.to_path_buf(),
                count: materials.len(),
            });
        }
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        let material = materials.into_iter().next().map(|m| MaterialRef {
            diffuse_texture: m
                .diffuse_texture
                .filter(|tex| !tex.trim().is_empty())
                .map(|tex| base_dir.join(tex.trim())),
            name: m.name,
        });

        let mut raw = RawMeshData {
            path: path.to_path_buf(),
            material,
            ..Default::default()
        };
        for model in &models {
            raw.append_model(model).map_err(|source| AssetError::Mesh {
                path: path.to_path_buf(),
                source,
            })?;
        }

        tracing::info!(
            path = %path.display(),
            shapes = raw.shapes.len(),
            faces = raw.face_count(),
            textured = raw.diffuse_texture().is_some(),
            "parsed model"
        );
        Ok(raw)
    }

    /// Total triangle count across all shapes.
    pub fn face_count(&self) -> usize {
        self.shapes.iter().map(|s| s.faces.len()).sum()
    }

    pub fn diffuse_texture(&self) -> Option<&Path> {
        self.material
            .as_ref()
            .and_then(|m| m.diffuse_texture.as_deref())
    }

    /// Merge one parser model into the shared arrays, rebasing its indices.
    fn append_model(&mut self, model: &tobj::Model) -> Result<(), MeshError> {
        let mesh = &model.mesh;
        if mesh.face_arities.iter().any(|&arity| arity != 3) || mesh.indices.len() % 3 != 0 {
            return Err(MeshError::NotTriangulated {
                shape: model.name.clone(),
            });
        }

        let position_base = self.positions.len() as u32;
        let normal_base = self.normals.len() as u32;
        let tex_base = self.tex_coords.len() as u32;

        self.positions.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2])),
        );
        self.normals.extend(
            mesh.normals
                .chunks_exact(3)
                .map(|n| Vec3::new(n[0], n[1], n[2])),
        );
        self.tex_coords.extend(
            mesh.texcoords
                .chunks_exact(2)
                .map(|t| Vec2::new(t[0], t[1])),
        );

        let corner = |i: usize| FaceVertex {
            position: position_base + mesh.indices[i],
            normal: mesh.normal_indices.get(i).map(|n| normal_base + n),
            tex_coord: mesh.texcoord_indices.get(i).map(|t| tex_base + t),
        };
        let faces = (0..mesh.indices.len() / 3)
            .map(|f| [corner(3 * f), corner(3 * f + 1), corner(3 * f + 2)])
            .collect();

        self.shapes.push(RawShape {
            name: model.name.clone(),
            faces,
        });
        Ok(())
    }
}
