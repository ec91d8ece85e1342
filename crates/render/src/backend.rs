//! The seam between the scene renderer and a concrete GPU API.
//!
//! The renderer talks to the device the way a classic immediate-mode API
//! does: create objects, set state, issue draws. Implementations translate
//! that into whatever their API wants.

use crate::program::{UniformLocation, UniformValue};
use crate::shader::{ProgramLayout, ShaderError, ShaderSource};
use sceneview_assets::PixelImage;
use std::rc::Rc;

/// Shared handle to the device. Every resource handle holds one so it can
/// release itself on drop.
pub type Gpu = Rc<dyn GpuBackend>;

macro_rules! raw_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

raw_id!(
    /// Device-side vertex attribute buffer.
    BufferId
);
raw_id!(
    /// Device-side 2D texture or cubemap.
    TextureId
);
raw_id!(
    /// Device-side linked shader program.
    ProgramId
);

/// Fixed vertex attribute slots. Shader input `@location(n)` reads slot `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeSlot {
    Position = 0,
    Normal = 1,
    TexCoord = 2,
    Tangent = 3,
}

impl AttributeSlot {
    pub const ALL: [AttributeSlot; 4] = [
        AttributeSlot::Position,
        AttributeSlot::Normal,
        AttributeSlot::TexCoord,
        AttributeSlot::Tangent,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    /// Float components per element.
    pub fn components(self) -> u32 {
        match self {
            AttributeSlot::TexCoord => 2,
            _ => 3,
        }
    }
}

/// Texture units. A sampler uniform is pointed at a unit; textures are bound
/// to units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureUnit {
    Diffuse = 0,
    /// Reserved for the normal-mapped ground pass.
    NormalMap = 1,
}

impl TextureUnit {
    pub const COUNT: usize = 2;

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureDimension {
    D2,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    Points,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PolygonMode {
    #[default]
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
}

/// Current binding state of the device, as set by the `bind_*`/`set_*` calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceState {
    pub program: Option<ProgramId>,
    pub attributes: [Option<BufferId>; 4],
    pub textures: [Option<TextureId>; TextureUnit::COUNT],
    pub polygon_mode: PolygonMode,
    pub depth_func: DepthFunc,
}

impl DeviceState {
    pub fn attribute(&self, slot: AttributeSlot) -> Option<BufferId> {
        self.attributes[slot as usize]
    }

    pub fn texture(&self, unit: TextureUnit) -> Option<TextureId> {
        self.textures[unit.index()]
    }

    /// Forget every reference to a destroyed buffer.
    pub fn forget_buffer(&mut self, id: BufferId) {
        for slot in &mut self.attributes {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    pub fn forget_texture(&mut self, id: TextureId) {
        for unit in &mut self.textures {
            if *unit == Some(id) {
                *unit = None;
            }
        }
    }

    pub fn forget_program(&mut self, id: ProgramId) {
        if self.program == Some(id) {
            self.program = None;
        }
    }
}

/// A GPU device driven through create/bind/draw calls.
///
/// Methods take `&self`: the device is shared by every handle, and
/// implementations keep their mutable state behind interior mutability.
/// Only one thread ever touches it.
pub trait GpuBackend {
    fn create_buffer(&self, slot: AttributeSlot, bytes: &[u8]) -> BufferId;
    fn destroy_buffer(&self, id: BufferId);

    /// Upload a 2D image. The upload goes through `unit`.
    fn create_texture_2d(&self, unit: TextureUnit, image: &PixelImage) -> TextureId;
    /// Upload six square faces of equal size, +X, −X, +Y, −Y, +Z, −Z.
    fn create_cubemap(&self, faces: &[PixelImage; 6]) -> TextureId;
    fn destroy_texture(&self, id: TextureId);

    fn create_program(
        &self,
        source: &ShaderSource,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, ShaderError>;
    fn destroy_program(&self, id: ProgramId);

    fn use_program(&self, id: ProgramId);
    /// Store a uniform value in the program named by `location`. Values are
    /// type-checked by the caller.
    fn set_uniform(&self, location: &UniformLocation, value: UniformValue);
    fn bind_attribute(&self, slot: AttributeSlot, buffer: BufferId);
    /// Bind `texture` to `unit`, or clear the unit.
    fn bind_texture(&self, unit: TextureUnit, texture: Option<TextureId>);
    fn set_polygon_mode(&self, mode: PolygonMode);
    fn set_depth_func(&self, func: DepthFunc);

    /// Clear colour and depth for a new frame.
    fn clear(&self, color: [f32; 4]);
    /// Draw `vertex_count` vertices from the bound attributes with the
    /// current program and state.
    fn draw_arrays(&self, topology: Topology, vertex_count: u32);
}
