use crate::RenderError;
use crate::backend::{DepthFunc, Gpu};
use crate::drawable::draw_in_mode;
use crate::handle::{Cubemap, PositionBuffer};
use glam::Vec3;
use sceneview_assets::PixelImage;
use sceneview_common::DrawMode;

const fn v(x: f32, y: f32, z: f32) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Unit cube as 12 triangles, two per face.
#[rustfmt::skip]
pub const SKYBOX_VERTICES: [Vec3; 36] = [
    v(-1.0,  1.0, -1.0), v(-1.0, -1.0, -1.0), v( 1.0, -1.0, -1.0),
    v( 1.0, -1.0, -1.0), v( 1.0,  1.0, -1.0), v(-1.0,  1.0, -1.0),

    v(-1.0, -1.0,  1.0), v(-1.0, -1.0, -1.0), v(-1.0,  1.0, -1.0),
    v(-1.0,  1.0, -1.0), v(-1.0,  1.0,  1.0), v(-1.0, -1.0,  1.0),

    v( 1.0, -1.0, -1.0), v( 1.0, -1.0,  1.0), v( 1.0,  1.0,  1.0),
    v( 1.0,  1.0,  1.0), v( 1.0,  1.0, -1.0), v( 1.0, -1.0, -1.0),

    v(-1.0, -1.0,  1.0), v(-1.0,  1.0,  1.0), v( 1.0,  1.0,  1.0),
    v( 1.0,  1.0,  1.0), v( 1.0, -1.0,  1.0), v(-1.0, -1.0,  1.0),

    v(-1.0,  1.0, -1.0), v( 1.0,  1.0, -1.0), v( 1.0,  1.0,  1.0),
    v( 1.0,  1.0,  1.0), v(-1.0,  1.0,  1.0), v(-1.0,  1.0, -1.0),

    v(-1.0, -1.0, -1.0), v(-1.0, -1.0,  1.0), v( 1.0, -1.0, -1.0),
    v( 1.0, -1.0, -1.0), v(-1.0, -1.0,  1.0), v( 1.0, -1.0,  1.0),
];

/// Check that six faces can form a cubemap: square, all the same size.
pub fn check_faces(faces: &[PixelImage; 6]) -> Result<(), RenderError> {
    let size = faces[0].width();
    for (index, face) in faces.iter().enumerate() {
        if face.width() != face.height() {
            return Err(RenderError::Cubemap(format!(
                "face {index} is {}x{}, faces must be square",
                face.width(),
                face.height()
            )));
        }
        if face.width() != size {
            return Err(RenderError::Cubemap(format!(
                "face {index} is {0}x{0}, face 0 is {size}x{size}",
                face.width()
            )));
        }
    }
    Ok(())
}

/// Environment cube drawn behind everything else.
pub struct Skybox {
    gpu: Gpu,
    vertices: PositionBuffer,
    cubemap: Cubemap,
}

impl Skybox {
    /// Upload the cube geometry and six faces in +X, −X, +Y, −Y, +Z, −Z order.
    pub fn new(gpu: &Gpu, faces: &[PixelImage; 6]) -> Result<Self, RenderError> {
        check_faces(faces)?;
        Ok(Self {
            gpu: gpu.clone(),
            vertices: PositionBuffer::new(gpu, &SKYBOX_VERTICES),
            cubemap: Cubemap::new(gpu, faces),
        })
    }

    /// Draw at maximum depth. The depth test is relaxed to less-or-equal for
    /// the draw and restored afterwards, whatever the mode.
    pub fn draw(&self, mode: DrawMode) {
        self.vertices.bind();
        self.cubemap.bind();
        self.gpu.set_depth_func(DepthFunc::LessEqual);
        draw_in_mode(self.gpu.as_ref(), mode, SKYBOX_VERTICES.len() as u32);
        self.gpu.set_depth_func(DepthFunc::Less);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuBackend, PolygonMode, Topology};
    use crate::recording::{GpuCall, RecordingBackend};
    use std::rc::Rc;

    fn faces(size: u32) -> [PixelImage; 6] {
        std::array::from_fn(|i| PixelImage::solid(size, size, [i as u8 * 40, 0, 0, 255]))
    }

    fn gpu() -> (Rc<RecordingBackend>, Gpu) {
        let recorder = Rc::new(RecordingBackend::new());
        let gpu: Gpu = recorder.clone();
        (recorder, gpu)
    }

    #[test]
    fn cube_has_every_face_at_unit_distance() {
        for vertex in SKYBOX_VERTICES {
            assert_eq!(vertex.abs().max_element(), 1.0);
        }
        for axis in 0..3 {
            for sign in [-1.0, 1.0] {
                let on_face = SKYBOX_VERTICES.iter().filter(|v| v[axis] == sign).count();
                assert!(on_face >= 6, "face {axis}/{sign} has {on_face} vertices");
            }
        }
    }

    #[test]
    fn triangles_face_inward() {
        // counter-clockwise seen from the centre, so back-face culling keeps them
        for triangle in SKYBOX_VERTICES.chunks(3) {
            let [a, b, c] = [triangle[0], triangle[1], triangle[2]];
            let normal = (b - a).cross(c - a);
            assert!(normal.dot(a + b + c) < 0.0, "{a} {b} {c} faces outward");
        }
    }

    #[test]
    fn every_mode_draws_36_vertices_between_depth_switches() {
        let (rec, gpu) = gpu();
        let skybox = Skybox::new(&gpu, &faces(4)).unwrap();
        for mode in [DrawMode::Filled, DrawMode::Wireframe, DrawMode::Points] {
            rec.clear_calls();
            skybox.draw(mode);
            let calls = rec.calls();
            let draw_at = calls
                .iter()
                .position(|c| matches!(c, GpuCall::Draw(_)))
                .unwrap();
            let GpuCall::Draw(draw) = calls[draw_at] else { unreachable!() };
            assert_eq!(draw.vertex_count, 36);
            assert_eq!(draw.state.depth_func, DepthFunc::LessEqual);
            assert_eq!(
                draw.topology,
                if mode == DrawMode::Points { Topology::Points } else { Topology::Triangles }
            );
            assert_eq!(
                draw.state.polygon_mode,
                if mode == DrawMode::Wireframe { PolygonMode::Line } else { PolygonMode::Fill }
            );
            assert_eq!(calls.last(), Some(&GpuCall::DepthFunc(DepthFunc::Less)));
            assert!(draw.state.texture(crate::backend::TextureUnit::Diffuse).is_some());
        }
    }

    #[test]
    fn depth_is_restored_after_the_draw() {
        let (rec, gpu) = gpu();
        let skybox = Skybox::new(&gpu, &faces(1)).unwrap();
        skybox.draw(DrawMode::Filled);
        gpu.draw_arrays(Topology::Triangles, 3);
        let draws = rec.draws();
        assert_eq!(draws[1].state.depth_func, DepthFunc::Less);
    }

    #[test]
    fn mismatched_faces_are_rejected() {
        let (rec, gpu) = gpu();
        let mut bad = faces(4);
        bad[3] = PixelImage::solid(4, 2, [0; 4]);
        assert!(matches!(Skybox::new(&gpu, &bad), Err(RenderError::Cubemap(_))));

        let mut bad = faces(4);
        bad[5] = PixelImage::solid(8, 8, [0; 4]);
        assert!(Skybox::new(&gpu, &bad).is_err());
        assert_eq!(rec.live_textures(), 0);
        assert_eq!(rec.live_buffers(), 0);
    }
}
