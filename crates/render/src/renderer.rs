use crate::RenderError;
use crate::backend::{DepthFunc, Gpu};
use crate::drawable::{Mesh, PointCloud};
use crate::program::{LightProgram, ObjectProgram, SkyboxProgram};
use crate::scene::SceneAssets;
use crate::skybox::Skybox;
use glam::{Mat3, Mat4, Vec3};
use sceneview_common::Transform;
use sceneview_scene::FrameState;
use sceneview_scene::config::ProjectionConfig;

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// An uploaded model and where it sits in the world.
pub struct SceneObject {
    pub mesh: Mesh,
    pub transform: Transform,
}

/// Owns every device object of a scene and draws it once per frame:
/// objects, then the light marker, then the skybox.
pub struct SceneRenderer {
    gpu: Gpu,
    object_program: ObjectProgram,
    light_program: LightProgram,
    skybox_program: SkyboxProgram,
    objects: Vec<SceneObject>,
    light_marker: PointCloud,
    light_marker_scale: f32,
    skybox: Skybox,
    projection: ProjectionConfig,
}

impl SceneRenderer {
    /// Build programs first, then upload geometry and textures.
    pub fn new(gpu: &Gpu, assets: &SceneAssets) -> Result<Self, RenderError> {
        let object_program = ObjectProgram::new(gpu, &assets.shaders.object)?;
        let light_program = LightProgram::new(gpu, &assets.shaders.light)?;
        let skybox_program = SkyboxProgram::new(gpu, &assets.shaders.skybox)?;

        let skybox = Skybox::new(gpu, &assets.skybox_faces)?;
        let objects = assets
            .objects
            .iter()
            .map(|staged| SceneObject {
                mesh: Mesh::upload(gpu, &staged.mesh),
                transform: staged.transform,
            })
            .collect();
        let light_marker = PointCloud::upload(gpu, &assets.light_marker);

        gpu.set_depth_func(DepthFunc::Less);
        Ok(Self {
            gpu: gpu.clone(),
            object_program,
            light_program,
            skybox_program,
            objects,
            light_marker,
            light_marker_scale: assets.light_marker_scale,
            skybox,
            projection: assets.projection.clone(),
        })
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut [SceneObject] {
        &mut self.objects
    }

    pub fn projection_matrix(&self, aspect_ratio: f32) -> Mat4 {
        let p = &self.projection;
        Mat4::perspective_rh(p.fov_y_degrees.to_radians(), aspect_ratio, p.near, p.far)
    }

    /// Model matrix of the light marker: translate to the light, then shrink.
    pub fn light_model_matrix(&self, light_position: Vec3) -> Mat4 {
        Mat4::from_translation(light_position) * Mat4::from_scale(Vec3::splat(self.light_marker_scale))
    }

    /// Issue one frame's draws.
    pub fn render(&self, frame: &FrameState) {
        self.gpu.clear(CLEAR_COLOR);

        let view = frame.camera.view_matrix();
        let projection = self.projection_matrix(frame.aspect_ratio);
        let mode = frame.draw_mode;

        let objects = &self.object_program;
        objects.use_program();
        objects.set_view(view);
        objects.set_projection(projection);
        objects.set_camera_position(frame.camera.position);
        objects.set_light_position(frame.light_position);
        for object in &self.objects {
            objects.set_model(object.transform.matrix());
            object.mesh.draw(mode);
        }

        let light = &self.light_program;
        light.use_program();
        light.set_view(view);
        light.set_projection(projection);
        light.set_model(self.light_model_matrix(frame.light_position));
        self.light_marker.draw(mode);

        // rotation only, so the sky stays put as the camera moves
        let sky = &self.skybox_program;
        sky.use_program();
        sky.set_view(Mat4::from_mat3(Mat3::from_mat4(view)));
        sky.set_projection(projection);
        self.skybox.draw(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{PolygonMode, Topology};
    use crate::program::UniformValue;
    use crate::recording::{GpuCall, RecordingBackend};
    use crate::scene::tests::stock_config;
    use sceneview_common::DrawMode;
    use std::rc::Rc;

    fn setup() -> (Rc<RecordingBackend>, SceneRenderer, FrameState) {
        let config = stock_config();
        let assets = SceneAssets::load(&config).unwrap();
        let recorder = Rc::new(RecordingBackend::new());
        let gpu: Gpu = recorder.clone();
        let renderer = SceneRenderer::new(&gpu, &assets).unwrap();
        let frame = config.frame_state(1024, 768);
        recorder.clear_calls();
        (recorder, renderer, frame)
    }

    #[test]
    fn frame_clears_then_draws_objects_light_skybox() {
        let (rec, renderer, frame) = setup();
        renderer.render(&frame);

        let calls = rec.calls();
        assert_eq!(calls[0], GpuCall::Clear(CLEAR_COLOR));

        let draws = rec.draws();
        assert_eq!(draws.len(), renderer.objects().len() + 2);
        let programs: Vec<_> = draws.iter().map(|d| d.state.program).collect();
        let object = renderer.object_program.program().raw();
        let light = renderer.light_program.program().raw();
        let sky = renderer.skybox_program.program().raw();
        assert_eq!(programs, vec![object, object, light, sky]);

        let sky_draw = draws[3];
        assert_eq!(sky_draw.vertex_count, 36);
        assert_eq!(sky_draw.state.depth_func, DepthFunc::LessEqual);
        assert_eq!(rec.state().depth_func, DepthFunc::Less);
        for draw in &draws[..3] {
            assert_eq!(draw.state.depth_func, DepthFunc::Less);
        }
    }

    #[test]
    fn uniforms_follow_the_frame_state() {
        let (rec, renderer, mut frame) = setup();
        frame.light_position = Vec3::new(0.5, 1.0, -2.0);
        renderer.render(&frame);

        let object = renderer.object_program.program().raw().unwrap();
        let light = renderer.light_program.program().raw().unwrap();
        let sky = renderer.skybox_program.program().raw().unwrap();

        assert_eq!(
            rec.uniform(object, "camera_position"),
            Some(UniformValue::Vec3(frame.camera.position))
        );
        assert_eq!(
            rec.uniform(object, "light_position"),
            Some(UniformValue::Vec3(frame.light_position))
        );
        // last object drawn is the second default object
        assert_eq!(
            rec.uniform(object, "model"),
            Some(UniformValue::Mat4(renderer.objects()[1].transform.matrix()))
        );
        assert_eq!(
            rec.uniform(light, "model"),
            Some(UniformValue::Mat4(
                Mat4::from_translation(frame.light_position) * Mat4::from_scale(Vec3::splat(0.1))
            ))
        );

        let Some(UniformValue::Mat4(sky_view)) = rec.uniform(sky, "view") else {
            panic!("skybox view not set");
        };
        assert_eq!(sky_view.w_axis, glam::Vec4::W);
        assert_eq!(Mat3::from_mat4(sky_view), Mat3::from_mat4(frame.camera.view_matrix()));
    }

    #[test]
    fn draw_mode_applies_to_every_draw() {
        let (rec, renderer, mut frame) = setup();
        frame.draw_mode = DrawMode::Points;
        renderer.render(&frame);
        assert!(rec.draws().iter().all(|d| d.topology == Topology::Points));

        rec.clear_calls();
        frame.draw_mode = DrawMode::Wireframe;
        renderer.render(&frame);
        assert!(
            rec.draws()
                .iter()
                .all(|d| d.topology == Topology::Triangles && d.state.polygon_mode == PolygonMode::Line)
        );
    }

    #[test]
    fn projection_uses_configured_fov_and_aspect() {
        let (rec, renderer, mut frame) = setup();
        frame.on_resize(1600, 900);
        renderer.render(&frame);
        let object = renderer.object_program.program().raw().unwrap();
        let expected = Mat4::perspective_rh(30f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        let Some(UniformValue::Mat4(projection)) = rec.uniform(object, "projection") else {
            panic!("projection not set");
        };
        assert!(projection.abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn dropping_the_renderer_releases_every_object() {
        let (rec, renderer, frame) = setup();
        renderer.render(&frame);
        assert_eq!(rec.live_programs(), 3);
        // three streams per object, the marker, the skybox cube
        assert_eq!(rec.live_buffers(), 3 * renderer.objects().len() + 2);
        drop(renderer);
        assert_eq!(rec.live_buffers(), 0);
        assert_eq!(rec.live_textures(), 0);
        assert_eq!(rec.live_programs(), 0);
    }

    #[test]
    fn device_link_failure_is_reported() {
        let config = stock_config();
        let assets = SceneAssets::load(&config).unwrap();
        let recorder = Rc::new(RecordingBackend::new());
        recorder.reject_programs("no");
        let gpu: Gpu = recorder.clone();
        assert!(matches!(
            SceneRenderer::new(&gpu, &assets),
            Err(RenderError::Shader(crate::ShaderError::Link { .. }))
        ));
        assert_eq!(recorder.live_buffers(), 0);
    }
}
