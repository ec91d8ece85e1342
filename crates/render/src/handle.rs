//! Owning handles for device buffers and textures.
//!
//! A handle is either empty or owns exactly one device object, which it
//! releases when dropped. Handles cannot be copied; [`take`] moves the object
//! into a new handle and leaves the source empty, so an object is released
//! exactly once whichever way ownership travels.
//!
//! [`take`]: AttributeBuffer::take

use crate::backend::{AttributeSlot, BufferId, Gpu, GpuBackend, ProgramId, TextureId, TextureUnit};
use glam::{Vec2, Vec3};
use sceneview_assets::PixelImage;
use std::marker::PhantomData;

/// A device object id that knows how to release itself.
pub(crate) trait DeviceObject: Copy + std::fmt::Display {
    fn release(self, gpu: &dyn GpuBackend);
}

impl DeviceObject for BufferId {
    fn release(self, gpu: &dyn GpuBackend) {
        gpu.destroy_buffer(self);
    }
}

impl DeviceObject for TextureId {
    fn release(self, gpu: &dyn GpuBackend) {
        gpu.destroy_texture(self);
    }
}

impl DeviceObject for ProgramId {
    fn release(self, gpu: &dyn GpuBackend) {
        gpu.destroy_program(self);
    }
}

/// The non-empty part of a handle. Releases its object on drop.
pub(crate) struct Owned<Id: DeviceObject> {
    pub(crate) gpu: Gpu,
    pub(crate) id: Id,
}

impl<Id: DeviceObject> Owned<Id> {
    pub(crate) fn new(gpu: &Gpu, id: Id) -> Self {
        Self { gpu: gpu.clone(), id }
    }
}

impl<Id: DeviceObject> Drop for Owned<Id> {
    fn drop(&mut self) {
        tracing::trace!(object = %self.id, "release");
        self.id.release(self.gpu.as_ref());
    }
}

/// Handle misuse, such as binding an empty handle, is a programming error:
/// loud in debug builds, logged and skipped otherwise.
#[track_caller]
pub(crate) fn misuse(what: &str) {
    tracing::error!("{what}");
    if cfg!(debug_assertions) {
        panic!("{what}");
    }
}

/// Compile-time description of one vertex attribute stream.
pub trait Attribute {
    const SLOT: AttributeSlot;
    type Element: bytemuck::Pod;
}

pub struct PositionAttribute;
pub struct NormalAttribute;
pub struct TexCoordAttribute;
pub struct TangentAttribute;

impl Attribute for PositionAttribute {
    const SLOT: AttributeSlot = AttributeSlot::Position;
    type Element = Vec3;
}

impl Attribute for NormalAttribute {
    const SLOT: AttributeSlot = AttributeSlot::Normal;
    type Element = Vec3;
}

impl Attribute for TexCoordAttribute {
    const SLOT: AttributeSlot = AttributeSlot::TexCoord;
    type Element = Vec2;
}

impl Attribute for TangentAttribute {
    const SLOT: AttributeSlot = AttributeSlot::Tangent;
    type Element = Vec3;
}

/// One attribute stream on the device, bound to a fixed slot.
pub struct AttributeBuffer<A: Attribute> {
    owned: Option<Owned<BufferId>>,
    len: u32,
    _attribute: PhantomData<A>,
}

pub type PositionBuffer = AttributeBuffer<PositionAttribute>;
pub type NormalBuffer = AttributeBuffer<NormalAttribute>;
pub type TexCoordBuffer = AttributeBuffer<TexCoordAttribute>;
pub type TangentBuffer = AttributeBuffer<TangentAttribute>;

impl<A: Attribute> Default for AttributeBuffer<A> {
    fn default() -> Self {
        Self {
            owned: None,
            len: 0,
            _attribute: PhantomData,
        }
    }
}

impl<A: Attribute> AttributeBuffer<A> {
    /// Upload `data` into a new device buffer.
    pub fn new(gpu: &Gpu, data: &[A::Element]) -> Self {
        let id = gpu.create_buffer(A::SLOT, bytemuck::cast_slice(data));
        Self {
            owned: Some(Owned::new(gpu, id)),
            len: element_count(data.len()),
            _attribute: PhantomData,
        }
    }

    /// Attach the buffer to its slot for subsequent draws.
    #[track_caller]
    pub fn bind(&self) {
        match &self.owned {
            Some(owned) => owned.gpu.bind_attribute(A::SLOT, owned.id),
            None => misuse("bind on an empty attribute buffer handle"),
        }
    }

    /// Element count.
    pub fn len(&self) -> u32 {
        self.len
    }

    /// True when the handle owns nothing.
    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    pub fn raw(&self) -> Option<BufferId> {
        self.owned.as_ref().map(|o| o.id)
    }

    /// Move the buffer out, leaving this handle empty.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Element count as drawn. Counts past `u32::MAX` cannot be drawn and are
/// reported as misuse, saturating in release builds.
fn element_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or_else(|_| {
        misuse("attribute buffer holds more than u32::MAX elements");
        u32::MAX
    })
}

/// Which unit a 2D texture samples from.
pub trait TextureKind {
    const UNIT: TextureUnit;
}

pub struct Diffuse;
pub struct NormalMap;

impl TextureKind for Diffuse {
    const UNIT: TextureUnit = TextureUnit::Diffuse;
}

impl TextureKind for NormalMap {
    const UNIT: TextureUnit = TextureUnit::NormalMap;
}

pub struct Texture2d<K: TextureKind> {
    owned: Option<Owned<TextureId>>,
    _kind: PhantomData<K>,
}

pub type DiffuseTexture = Texture2d<Diffuse>;
pub type NormalMapTexture = Texture2d<NormalMap>;

impl<K: TextureKind> Default for Texture2d<K> {
    fn default() -> Self {
        Self {
            owned: None,
            _kind: PhantomData,
        }
    }
}

impl<K: TextureKind> Texture2d<K> {
    pub fn new(gpu: &Gpu, image: &PixelImage) -> Self {
        let id = gpu.create_texture_2d(K::UNIT, image);
        Self {
            owned: Some(Owned::new(gpu, id)),
            _kind: PhantomData,
        }
    }

    /// Bind to this kind's texture unit.
    #[track_caller]
    pub fn bind(&self) {
        match &self.owned {
            Some(owned) => owned.gpu.bind_texture(K::UNIT, Some(owned.id)),
            None => misuse("bind on an empty texture handle"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    pub fn raw(&self) -> Option<TextureId> {
        self.owned.as_ref().map(|o| o.id)
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Six-faced cube texture, sampled by direction.
#[derive(Default)]
pub struct Cubemap {
    owned: Option<Owned<TextureId>>,
}

impl Cubemap {
    /// Upload faces in +X, −X, +Y, −Y, +Z, −Z order.
    pub fn new(gpu: &Gpu, faces: &[PixelImage; 6]) -> Self {
        let id = gpu.create_cubemap(faces);
        Self {
            owned: Some(Owned::new(gpu, id)),
        }
    }

    /// Bind to the diffuse unit, where the skybox sampler reads.
    #[track_caller]
    pub fn bind(&self) {
        match &self.owned {
            Some(owned) => owned.gpu.bind_texture(TextureUnit::Diffuse, Some(owned.id)),
            None => misuse("bind on an empty cubemap handle"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_none()
    }

    pub fn raw(&self) -> Option<TextureId> {
        self.owned.as_ref().map(|o| o.id)
    }

    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{GpuCall, RecordingBackend};
    use std::rc::Rc;

    fn gpu() -> (Rc<RecordingBackend>, Gpu) {
        let recorder = Rc::new(RecordingBackend::new());
        let gpu: Gpu = recorder.clone();
        (recorder, gpu)
    }

    #[test]
    fn element_count_fits_draw_range() {
        assert_eq!(element_count(0), 0);
        assert_eq!(element_count(36), 36);
        assert_eq!(element_count(u32::MAX as usize), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    #[should_panic(expected = "more than u32::MAX")]
    fn oversized_element_count_is_misuse() {
        element_count(u32::MAX as usize + 1);
    }

    #[test]
    fn drop_releases_exactly_once() {
        let (rec, gpu) = gpu();
        {
            let buffer = PositionBuffer::new(&gpu, &[Vec3::ZERO, Vec3::X, Vec3::Y]);
            assert_eq!(buffer.len(), 3);
            assert_eq!(rec.live_buffers(), 1);
        }
        assert_eq!(rec.live_buffers(), 0);
        assert_eq!(rec.buffer_destroys(), 1);
    }

    #[test]
    fn take_moves_ownership_and_empties_source() {
        let (rec, gpu) = gpu();
        let mut a = NormalBuffer::new(&gpu, &[Vec3::Z]);
        let id = a.raw();
        let b = a.take();
        assert!(a.is_empty());
        assert_eq!(b.raw(), id);

        drop(a);
        assert_eq!(rec.buffer_destroys(), 0);
        drop(b);
        assert_eq!(rec.buffer_destroys(), 1);
        assert_eq!(rec.live_buffers(), 0);
    }

    #[test]
    fn move_assignment_releases_previous_target() {
        let (rec, gpu) = gpu();
        let mut target = TexCoordBuffer::new(&gpu, &[Vec2::ZERO]);
        let mut source = TexCoordBuffer::new(&gpu, &[Vec2::ONE, Vec2::X]);
        let source_id = source.raw();
        assert_ne!(target.raw(), source_id);

        target = source.take();
        assert_eq!(rec.buffer_destroys(), 1);
        assert_eq!(target.raw(), source_id);
        assert!(source.is_empty());
        drop((target, source));
        assert_eq!(rec.live_buffers(), 0);
        assert_eq!(rec.buffer_destroys(), 2);
    }

    #[test]
    fn self_take_keeps_the_object() {
        let (rec, gpu) = gpu();
        let mut buffer = PositionBuffer::new(&gpu, &[Vec3::ONE]);
        let id = buffer.raw();
        buffer = buffer.take();
        assert_eq!(buffer.raw(), id);
        assert_eq!(rec.live_buffers(), 1);
        assert_eq!(rec.buffer_destroys(), 0);
    }

    #[test]
    fn default_handles_own_nothing() {
        let (rec, _gpu) = gpu();
        let buffer = TangentBuffer::default();
        let texture = DiffuseTexture::default();
        let cubemap = Cubemap::default();
        assert!(buffer.is_empty() && texture.is_empty() && cubemap.is_empty());
        drop((buffer, texture, cubemap));
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn binding_targets_fixed_slots_and_units() {
        let (rec, gpu) = gpu();
        let tex_coords = TexCoordBuffer::new(&gpu, &[Vec2::ZERO]);
        let diffuse = DiffuseTexture::new(&gpu, &PixelImage::solid(1, 1, [255; 4]));
        let normal_map = NormalMapTexture::new(&gpu, &PixelImage::solid(1, 1, [128; 4]));
        rec.clear_calls();

        tex_coords.bind();
        diffuse.bind();
        normal_map.bind();
        let calls = rec.calls();
        assert_eq!(
            calls[0],
            GpuCall::BindAttribute {
                slot: AttributeSlot::TexCoord,
                buffer: tex_coords.raw().unwrap()
            }
        );
        assert_eq!(
            calls[1],
            GpuCall::BindTexture {
                unit: TextureUnit::Diffuse,
                texture: diffuse.raw()
            }
        );
        assert_eq!(
            calls[2],
            GpuCall::BindTexture {
                unit: TextureUnit::NormalMap,
                texture: normal_map.raw()
            }
        );
    }

    #[test]
    fn textures_release_on_drop() {
        let (rec, gpu) = gpu();
        let faces: [PixelImage; 6] = std::array::from_fn(|_| PixelImage::solid(2, 2, [0, 0, 255, 255]));
        let mut cubemap = Cubemap::new(&gpu, &faces);
        let moved = cubemap.take();
        drop(cubemap);
        assert_eq!(rec.live_textures(), 1);
        drop(moved);
        assert_eq!(rec.live_textures(), 0);
        assert_eq!(rec.texture_destroys(), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "empty attribute buffer")]
    fn binding_an_empty_buffer_panics_in_debug() {
        PositionBuffer::default().bind();
    }
}
