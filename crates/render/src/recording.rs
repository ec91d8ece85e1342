//! A headless backend that records every call.
//!
//! Used to validate a scene without a window and to test draw sequences.
//! Releasing an object twice, or one it never created, panics.

use crate::backend::{
    AttributeSlot, BufferId, DepthFunc, DeviceState, GpuBackend, PolygonMode, ProgramId, TextureDimension,
    TextureId, TextureUnit, Topology,
};
use crate::program::{UniformLocation, UniformValue};
use crate::shader::{ProgramLayout, ShaderError, ShaderSource, UniformSlot};
use sceneview_assets::PixelImage;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// A draw call with the state it was issued under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRecord {
    pub topology: Topology,
    pub vertex_count: u32,
    pub state: DeviceState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateBuffer {
        id: BufferId,
        slot: AttributeSlot,
        bytes: usize,
    },
    DestroyBuffer(BufferId),
    CreateTexture {
        id: TextureId,
        dimension: TextureDimension,
        width: u32,
        height: u32,
    },
    DestroyTexture(TextureId),
    CreateProgram {
        id: ProgramId,
        name: String,
    },
    DestroyProgram(ProgramId),
    UseProgram(ProgramId),
    SetUniform {
        program: ProgramId,
        slot: UniformSlot,
        value: UniformValue,
    },
    BindAttribute {
        slot: AttributeSlot,
        buffer: BufferId,
    },
    BindTexture {
        unit: TextureUnit,
        texture: Option<TextureId>,
    },
    PolygonMode(PolygonMode),
    DepthFunc(DepthFunc),
    Clear([f32; 4]),
    Draw(DrawRecord),
}

#[derive(Default)]
struct Recorder {
    next_id: u32,
    calls: Vec<GpuCall>,
    state: DeviceState,
    buffers: BTreeSet<BufferId>,
    textures: BTreeMap<TextureId, TextureDimension>,
    programs: BTreeMap<ProgramId, ProgramLayout>,
    buffer_destroys: usize,
    texture_destroys: usize,
    program_destroys: usize,
    reject_programs: Option<String>,
}

impl Recorder {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct RecordingBackend {
    inner: RefCell<Recorder>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `create_program` fail with `log`, as a driver would
    /// on a device-specific link failure.
    pub fn reject_programs(&self, log: impl Into<String>) {
        self.inner.borrow_mut().reject_programs = Some(log.into());
    }

    pub fn calls(&self) -> Vec<GpuCall> {
        self.inner.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.borrow_mut().calls.clear();
    }

    pub fn draws(&self) -> Vec<DrawRecord> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::Draw(draw) => Some(*draw),
                _ => None,
            })
            .collect()
    }

    pub fn state(&self) -> DeviceState {
        self.inner.borrow().state
    }

    /// The last value stored for `name` in `program`, if any.
    pub fn uniform(&self, program: ProgramId, name: &str) -> Option<UniformValue> {
        let inner = self.inner.borrow();
        let slot = inner.programs.get(&program)?.uniform(name)?;
        inner.calls.iter().rev().find_map(|call| match call {
            GpuCall::SetUniform { program: p, slot: s, value } if *p == program && *s == slot => Some(*value),
            _ => None,
        })
    }

    pub fn live_buffers(&self) -> usize {
        self.inner.borrow().buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.inner.borrow().textures.len()
    }

    pub fn live_programs(&self) -> usize {
        self.inner.borrow().programs.len()
    }

    pub fn buffer_destroys(&self) -> usize {
        self.inner.borrow().buffer_destroys
    }

    pub fn texture_destroys(&self) -> usize {
        self.inner.borrow().texture_destroys
    }

    pub fn program_destroys(&self) -> usize {
        self.inner.borrow().program_destroys
    }

    fn record(&self, call: GpuCall) {
        self.inner.borrow_mut().calls.push(call);
    }
}

impl GpuBackend for RecordingBackend {
    fn create_buffer(&self, slot: AttributeSlot, bytes: &[u8]) -> BufferId {
        let mut inner = self.inner.borrow_mut();
        let id = BufferId(inner.next_id());
        inner.buffers.insert(id);
        inner.calls.push(GpuCall::CreateBuffer {
            id,
            slot,
            bytes: bytes.len(),
        });
        id
    }

    fn destroy_buffer(&self, id: BufferId) {
        let mut inner = self.inner.borrow_mut();
        assert!(inner.buffers.remove(&id), "release of dead {id}");
        inner.buffer_destroys += 1;
        inner.state.forget_buffer(id);
        inner.calls.push(GpuCall::DestroyBuffer(id));
    }

    fn create_texture_2d(&self, _unit: TextureUnit, image: &PixelImage) -> TextureId {
        let mut inner = self.inner.borrow_mut();
        let id = TextureId(inner.next_id());
        inner.textures.insert(id, TextureDimension::D2);
        inner.calls.push(GpuCall::CreateTexture {
            id,
            dimension: TextureDimension::D2,
            width: image.width(),
            height: image.height(),
        });
        id
    }

    fn create_cubemap(&self, faces: &[PixelImage; 6]) -> TextureId {
        let mut inner = self.inner.borrow_mut();
        let id = TextureId(inner.next_id());
        inner.textures.insert(id, TextureDimension::Cube);
        inner.calls.push(GpuCall::CreateTexture {
            id,
            dimension: TextureDimension::Cube,
            width: faces[0].width(),
            height: faces[0].height(),
        });
        id
    }

    fn destroy_texture(&self, id: TextureId) {
        let mut inner = self.inner.borrow_mut();
        assert!(inner.textures.remove(&id).is_some(), "release of dead {id}");
        inner.texture_destroys += 1;
        inner.state.forget_texture(id);
        inner.calls.push(GpuCall::DestroyTexture(id));
    }

    fn create_program(&self, source: &ShaderSource, layout: &ProgramLayout) -> Result<ProgramId, ShaderError> {
        let mut inner = self.inner.borrow_mut();
        if let Some(log) = &inner.reject_programs {
            return Err(ShaderError::Link {
                program: source.name.clone(),
                log: log.clone(),
            });
        }
        let id = ProgramId(inner.next_id());
        inner.programs.insert(id, layout.clone());
        inner.calls.push(GpuCall::CreateProgram {
            id,
            name: source.name.clone(),
        });
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) {
        let mut inner = self.inner.borrow_mut();
        assert!(inner.programs.remove(&id).is_some(), "release of dead {id}");
        inner.program_destroys += 1;
        inner.state.forget_program(id);
        inner.calls.push(GpuCall::DestroyProgram(id));
    }

    fn use_program(&self, id: ProgramId) {
        let mut inner = self.inner.borrow_mut();
        assert!(inner.programs.contains_key(&id), "use of dead {id}");
        inner.state.program = Some(id);
        inner.calls.push(GpuCall::UseProgram(id));
    }

    fn set_uniform(&self, location: &UniformLocation, value: UniformValue) {
        self.record(GpuCall::SetUniform {
            program: location.program,
            slot: location.slot,
            value,
        });
    }

    fn bind_attribute(&self, slot: AttributeSlot, buffer: BufferId) {
        let mut inner = self.inner.borrow_mut();
        assert!(inner.buffers.contains(&buffer), "bind of dead {buffer}");
        inner.state.attributes[slot as usize] = Some(buffer);
        inner.calls.push(GpuCall::BindAttribute { slot, buffer });
    }

    fn bind_texture(&self, unit: TextureUnit, texture: Option<TextureId>) {
        let mut inner = self.inner.borrow_mut();
        if let Some(id) = texture {
            assert!(inner.textures.contains_key(&id), "bind of dead {id}");
        }
        inner.state.textures[unit.index()] = texture;
        inner.calls.push(GpuCall::BindTexture { unit, texture });
    }

    fn set_polygon_mode(&self, mode: PolygonMode) {
        let mut inner = self.inner.borrow_mut();
        inner.state.polygon_mode = mode;
        inner.calls.push(GpuCall::PolygonMode(mode));
    }

    fn set_depth_func(&self, func: DepthFunc) {
        let mut inner = self.inner.borrow_mut();
        inner.state.depth_func = func;
        inner.calls.push(GpuCall::DepthFunc(func));
    }

    fn clear(&self, color: [f32; 4]) {
        self.record(GpuCall::Clear(color));
    }

    fn draw_arrays(&self, topology: Topology, vertex_count: u32) {
        let mut inner = self.inner.borrow_mut();
        let state = inner.state;
        inner.calls.push(GpuCall::Draw(DrawRecord {
            topology,
            vertex_count,
            state,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_across_kinds() {
        let backend = RecordingBackend::new();
        let a = backend.create_buffer(AttributeSlot::Position, &[0; 12]);
        let t = backend.create_texture_2d(TextureUnit::Diffuse, &PixelImage::solid(1, 1, [0; 4]));
        let b = backend.create_buffer(AttributeSlot::Normal, &[0; 12]);
        assert_ne!(a, b);
        assert_ne!(a.0, t.0);
        assert_eq!(backend.live_buffers(), 2);
    }

    #[test]
    #[should_panic(expected = "release of dead")]
    fn double_release_panics() {
        let backend = RecordingBackend::new();
        let id = backend.create_buffer(AttributeSlot::Position, &[]);
        backend.destroy_buffer(id);
        backend.destroy_buffer(id);
    }

    #[test]
    fn destroyed_objects_leave_the_bound_state() {
        let backend = RecordingBackend::new();
        let id = backend.create_buffer(AttributeSlot::Position, &[0; 12]);
        backend.bind_attribute(AttributeSlot::Position, id);
        backend.destroy_buffer(id);
        assert_eq!(backend.state().attribute(AttributeSlot::Position), None);
    }

    #[test]
    fn rejected_programs_report_a_link_error() {
        let backend = RecordingBackend::new();
        backend.reject_programs("out of registers");
        let source = ShaderSource::new("p", "", "");
        let err = backend.create_program(&source, &ProgramLayout::default()).unwrap_err();
        assert!(err.to_string().contains("out of registers"));
        assert_eq!(backend.live_programs(), 0);
    }
}
