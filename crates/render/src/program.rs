use crate::backend::{Gpu, ProgramId, TextureUnit};
use crate::handle::{Owned, misuse};
use crate::shader::{self, ProgramLayout, ShaderError, ShaderSource, UniformKind, UniformSlot};
use glam::{Mat4, Vec3, Vec4};

/// A value for one uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Uint(u32),
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    /// Points a texture uniform at a texture unit.
    Sampler(TextureUnit),
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        UniformValue::Uint(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        UniformValue::Mat4(v)
    }
}

impl From<TextureUnit> for UniformValue {
    fn from(unit: TextureUnit) -> Self {
        UniformValue::Sampler(unit)
    }
}

impl UniformValue {
    /// Whether this value can be stored in `slot`.
    pub fn fits(&self, slot: UniformSlot) -> bool {
        match (self, slot) {
            (UniformValue::Sampler(_), UniformSlot::Texture { .. }) => true,
            (value, UniformSlot::Block { kind, .. }) => matches!(
                (value, kind),
                (UniformValue::Uint(_), UniformKind::Uint)
                    | (UniformValue::Int(_), UniformKind::Int)
                    | (UniformValue::Float(_), UniformKind::Float)
                    | (UniformValue::Vec3(_), UniformKind::Vec3)
                    | (UniformValue::Vec4(_), UniformKind::Vec4)
                    | (UniformValue::Mat4(_), UniformKind::Mat4)
            ),
            _ => false,
        }
    }

    /// Write the value into a uniform block staging buffer at `offset`.
    /// Samplers have no block representation and write nothing.
    pub fn write_into(&self, block: &mut [u8], offset: u32) {
        let cols;
        let bytes: &[u8] = match self {
            UniformValue::Uint(v) => bytemuck::bytes_of(v),
            UniformValue::Int(v) => bytemuck::bytes_of(v),
            UniformValue::Float(v) => bytemuck::bytes_of(v),
            UniformValue::Vec3(v) => bytemuck::bytes_of(v),
            UniformValue::Vec4(v) => bytemuck::bytes_of(v),
            UniformValue::Mat4(m) => {
                cols = m.to_cols_array();
                bytemuck::cast_slice(&cols)
            }
            UniformValue::Sampler(_) => return,
        };
        let start = offset as usize;
        match block.get_mut(start..start + bytes.len()) {
            Some(dst) => dst.copy_from_slice(bytes),
            None => tracing::error!(offset, len = bytes.len(), "uniform write past end of block"),
        }
    }
}

/// A resolved uniform: which program, and where in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformLocation {
    pub program: ProgramId,
    pub slot: UniformSlot,
}

/// An owned, linked shader program.
#[derive(Default)]
pub struct Program {
    owned: Option<Owned<ProgramId>>,
    layout: ProgramLayout,
}

impl Program {
    /// Compile, link and upload a program.
    pub fn new(gpu: &Gpu, source: &ShaderSource) -> Result<Self, ShaderError> {
        let layout = shader::link(source)?;
        let id = gpu.create_program(source, &layout)?;
        tracing::info!(
            program = %layout.name,
            inputs = layout.vertex_inputs.len(),
            uniforms = layout.uniform_names().count(),
            "linked program"
        );
        Ok(Self {
            owned: Some(Owned::new(gpu, id)),
            layout,
        })
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn layout(&self) -> &ProgramLayout {
        &self.layout
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    pub fn raw(&self) -> Option<ProgramId> {
        self.owned.as_ref().map(|o| o.id)
    }

    /// Make this the active program.
    #[track_caller]
    pub fn use_program(&self) {
        match &self.owned {
            Some(owned) => owned.gpu.use_program(owned.id),
            None => misuse("use of an empty program handle"),
        }
    }

    /// Resolve a uniform by name. A name the program does not declare is an
    /// error, not a silently ignored location.
    pub fn uniform(&self, name: &str) -> Result<UniformLocation, ShaderError> {
        let unknown = || ShaderError::UnknownUniform {
            program: self.layout.name.clone(),
            name: name.to_owned(),
        };
        let program = self.raw().ok_or_else(unknown)?;
        let slot = self.layout.uniform(name).ok_or_else(unknown)?;
        Ok(UniformLocation { program, slot })
    }

    /// Store a uniform value. The location must come from this program and
    /// the value must match the uniform's type.
    #[track_caller]
    pub fn set(&self, location: UniformLocation, value: impl Into<UniformValue>) {
        let value = value.into();
        let Some(owned) = &self.owned else {
            return misuse("set on an empty program handle");
        };
        if location.program != owned.id {
            return misuse("uniform location belongs to another program");
        }
        if !value.fits(location.slot) {
            tracing::error!(program = %self.layout.name, ?value, slot = ?location.slot, "uniform type mismatch");
            return misuse("uniform type mismatch");
        }
        owned.gpu.set_uniform(&location, value);
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Lit, textured program for scene objects.
pub struct ObjectProgram {
    program: Program,
    model: UniformLocation,
    view: UniformLocation,
    projection: UniformLocation,
    camera_position: UniformLocation,
    light_position: UniformLocation,
}

impl ObjectProgram {
    pub fn new(gpu: &Gpu, source: &ShaderSource) -> Result<Self, ShaderError> {
        let program = Program::new(gpu, source)?;
        let tex = program.uniform("tex")?;
        program.use_program();
        program.set(tex, TextureUnit::Diffuse);
        Ok(Self {
            model: program.uniform("model")?,
            view: program.uniform("view")?,
            projection: program.uniform("projection")?,
            camera_position: program.uniform("camera_position")?,
            light_position: program.uniform("light_position")?,
            program,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn use_program(&self) {
        self.program.use_program();
    }

    pub fn set_model(&self, model: Mat4) {
        self.program.set(self.model, model);
    }

    pub fn set_view(&self, view: Mat4) {
        self.program.set(self.view, view);
    }

    pub fn set_projection(&self, projection: Mat4) {
        self.program.set(self.projection, projection);
    }

    pub fn set_camera_position(&self, position: Vec3) {
        self.program.set(self.camera_position, position);
    }

    pub fn set_light_position(&self, position: Vec3) {
        self.program.set(self.light_position, position);
    }
}

/// Unlit program for the light marker.
pub struct LightProgram {
    program: Program,
    model: UniformLocation,
    view: UniformLocation,
    projection: UniformLocation,
}

impl LightProgram {
    pub fn new(gpu: &Gpu, source: &ShaderSource) -> Result<Self, ShaderError> {
        let program = Program::new(gpu, source)?;
        Ok(Self {
            model: program.uniform("model")?,
            view: program.uniform("view")?,
            projection: program.uniform("projection")?,
            program,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn use_program(&self) {
        self.program.use_program();
    }

    pub fn set_model(&self, model: Mat4) {
        self.program.set(self.model, model);
    }

    pub fn set_view(&self, view: Mat4) {
        self.program.set(self.view, view);
    }

    pub fn set_projection(&self, projection: Mat4) {
        self.program.set(self.projection, projection);
    }
}

/// Cubemap-sampling program for the skybox.
pub struct SkyboxProgram {
    program: Program,
    view: UniformLocation,
    projection: UniformLocation,
}

impl SkyboxProgram {
    pub fn new(gpu: &Gpu, source: &ShaderSource) -> Result<Self, ShaderError> {
        let program = Program::new(gpu, source)?;
        let skybox = program.uniform("skybox")?;
        program.use_program();
        program.set(skybox, TextureUnit::Diffuse);
        Ok(Self {
            view: program.uniform("view")?,
            projection: program.uniform("projection")?,
            program,
        })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn use_program(&self) {
        self.program.use_program();
    }

    /// `view` should already have its translation stripped.
    pub fn set_view(&self, view: Mat4) {
        self.program.set(self.view, view);
    }

    pub fn set_projection(&self, projection: Mat4) {
        self.program.set(self.projection, projection);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::TextureDimension;
    use crate::recording::{GpuCall, RecordingBackend};
    use crate::shader::tests::{lit_source, stock_light, stock_object, stock_skybox};
    use std::rc::Rc;

    fn gpu() -> (Rc<RecordingBackend>, Gpu) {
        let recorder = Rc::new(RecordingBackend::new());
        let gpu: Gpu = recorder.clone();
        (recorder, gpu)
    }

    #[test]
    fn unknown_uniform_is_an_error() {
        let (_rec, gpu) = gpu();
        let program = Program::new(&gpu, &lit_source()).unwrap();
        match program.uniform("modle") {
            Err(ShaderError::UnknownUniform { program, name }) => {
                assert_eq!(program, "lit");
                assert_eq!(name, "modle");
            }
            other => panic!("expected unknown uniform, got {other:?}"),
        }
        assert!(Program::default().uniform("model").is_err());
    }

    #[test]
    fn set_forwards_typed_values() {
        let (rec, gpu) = gpu();
        let program = Program::new(&gpu, &lit_source()).unwrap();
        let view = program.uniform("view").unwrap();
        rec.clear_calls();

        program.set(view, Mat4::IDENTITY);
        assert_eq!(
            rec.calls(),
            vec![GpuCall::SetUniform {
                program: program.raw().unwrap(),
                slot: view.slot,
                value: UniformValue::Mat4(Mat4::IDENTITY),
            }]
        );
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "uniform type mismatch")]
    fn mismatched_value_panics_in_debug() {
        let (_rec, gpu) = gpu();
        let program = Program::new(&gpu, &lit_source()).unwrap();
        let view = program.uniform("view").unwrap();
        program.set(view, 1.0_f32);
    }

    #[test]
    fn object_program_points_its_sampler_at_unit_zero() {
        let (rec, gpu) = gpu();
        let object = ObjectProgram::new(&gpu, &stock_object()).unwrap();
        let id = object.program().raw().unwrap();
        let calls = rec.calls();
        let use_at = calls.iter().position(|c| *c == GpuCall::UseProgram(id)).unwrap();
        assert_eq!(
            calls[use_at + 1],
            GpuCall::SetUniform {
                program: id,
                slot: UniformSlot::Texture {
                    binding: 0,
                    dimension: TextureDimension::D2
                },
                value: UniformValue::Sampler(TextureUnit::Diffuse),
            }
        );
    }

    #[test]
    fn bundles_resolve_against_shipped_shaders() {
        let (rec, gpu) = gpu();
        let object = ObjectProgram::new(&gpu, &stock_object()).unwrap();
        let light = LightProgram::new(&gpu, &stock_light()).unwrap();
        let skybox = SkyboxProgram::new(&gpu, &stock_skybox()).unwrap();
        assert_eq!(rec.live_programs(), 3);
        assert_eq!(
            skybox.program().layout().uniform("skybox"),
            Some(UniformSlot::Texture {
                binding: 0,
                dimension: TextureDimension::Cube
            })
        );
        drop((object, light, skybox));
        assert_eq!(rec.live_programs(), 0);
    }

    #[test]
    fn light_program_needs_its_matrices() {
        let (_rec, gpu) = gpu();
        // the skybox program has no model matrix
        match LightProgram::new(&gpu, &stock_skybox()) {
            Err(ShaderError::UnknownUniform { name, .. }) => assert_eq!(name, "model"),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected unknown uniform"),
        }
    }

    #[test]
    fn block_values_land_at_their_offsets() {
        let mut block = vec![0u8; 32];
        UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)).write_into(&mut block, 16);
        let floats = floats_of(&block);
        assert_eq!(&floats[4..7], &[1.0, 2.0, 3.0]);
        assert_eq!(floats[0], 0.0);

        // out of range writes are dropped, not panics
        UniformValue::Mat4(Mat4::IDENTITY).write_into(&mut block, 16);
        UniformValue::Sampler(TextureUnit::Diffuse).write_into(&mut block, 0);
        assert_eq!(floats_of(&block)[4], 1.0);
    }

    fn floats_of(block: &[u8]) -> Vec<f32> {
        block
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }
}
