use crate::backend::{Gpu, GpuBackend, PolygonMode, TextureUnit, Topology};
use crate::handle::{DiffuseTexture, NormalBuffer, PositionBuffer, TexCoordBuffer};
use sceneview_assets::{FlattenedMesh, PositionMesh};
use sceneview_common::DrawMode;

/// Polygon mode and topology for one draw, then the draw itself.
pub(crate) fn draw_in_mode(gpu: &dyn GpuBackend, mode: DrawMode, vertex_count: u32) {
    gpu.set_polygon_mode(match mode {
        DrawMode::Wireframe => PolygonMode::Line,
        _ => PolygonMode::Fill,
    });
    let topology = match mode {
        DrawMode::Points => Topology::Points,
        _ => Topology::Triangles,
    };
    gpu.draw_arrays(topology, vertex_count);
}

/// A textured, lit model on the device.
pub struct Mesh {
    gpu: Gpu,
    vertices: PositionBuffer,
    normals: NormalBuffer,
    tex_coords: TexCoordBuffer,
    texture: Option<DiffuseTexture>,
}

impl Mesh {
    /// Upload a flattened model. The CPU copy can be dropped afterwards.
    pub fn upload(gpu: &Gpu, mesh: &FlattenedMesh) -> Self {
        let texture = mesh.diffuse().map(|image| DiffuseTexture::new(gpu, image));
        tracing::debug!(
            vertices = mesh.vertex_count(),
            textured = texture.is_some(),
            "uploaded mesh"
        );
        Self {
            gpu: gpu.clone(),
            vertices: PositionBuffer::new(gpu, mesh.vertices()),
            normals: NormalBuffer::new(gpu, mesh.normals()),
            tex_coords: TexCoordBuffer::new(gpu, mesh.tex_coords()),
            texture,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len()
    }

    pub fn is_textured(&self) -> bool {
        self.texture.is_some()
    }

    /// Bind all three streams and the texture, then draw. An untextured mesh
    /// clears the diffuse unit so it never samples a stale texture.
    pub fn draw(&self, mode: DrawMode) {
        self.vertices.bind();
        self.normals.bind();
        self.tex_coords.bind();
        match &self.texture {
            Some(texture) => texture.bind(),
            None => self.gpu.bind_texture(TextureUnit::Diffuse, None),
        }
        draw_in_mode(self.gpu.as_ref(), mode, self.vertex_count());
    }
}

/// Position-only geometry, used for the light marker.
pub struct PointCloud {
    gpu: Gpu,
    vertices: PositionBuffer,
}

impl PointCloud {
    pub fn upload(gpu: &Gpu, mesh: &PositionMesh) -> Self {
        Self {
            gpu: gpu.clone(),
            vertices: PositionBuffer::new(gpu, mesh.vertices()),
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertices.len()
    }

    pub fn draw(&self, mode: DrawMode) {
        self.vertices.bind();
        draw_in_mode(self.gpu.as_ref(), mode, self.vertex_count());
    }
}
