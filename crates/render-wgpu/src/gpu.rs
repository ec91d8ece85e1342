use crate::pipeline::{GpuProgram, PipelineKey, TargetFormat, stride};
use crate::targets::Targets;
use sceneview_assets::PixelImage;
use sceneview_render::program::{UniformLocation, UniformValue};
use sceneview_render::shader::{ProgramLayout, ShaderError, ShaderSource, UniformSlot};
use sceneview_render::{
    AttributeSlot, BufferId, DepthFunc, DeviceState, GpuBackend, PolygonMode, ProgramId, TextureDimension,
    TextureId, TextureUnit, Topology,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroU64;
use std::rc::Rc;
use wgpu::util::DeviceExt;

const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

struct GpuBuffer {
    buffer: wgpu::Buffer,
    vertices: u32,
}

struct GpuTexture {
    view: wgpu::TextureView,
    dimension: TextureDimension,
}

/// A draw recorded between `clear` and `encode`, with everything it read
/// from the device state captured.
struct DrawCommand {
    key: PipelineKey,
    uniform_offset: u32,
    vertex_buffers: Vec<Rc<GpuBuffer>>,
    textures: Vec<(u32, Rc<GpuTexture>)>,
    vertex_count: u32,
}

#[derive(Default)]
struct Frame {
    clear: Option<[f32; 4]>,
    uniforms: Vec<u8>,
    draws: Vec<DrawCommand>,
}

struct Inner {
    next_id: u32,
    state: DeviceState,
    buffers: HashMap<BufferId, Rc<GpuBuffer>>,
    textures: HashMap<TextureId, Rc<GpuTexture>>,
    programs: HashMap<ProgramId, GpuProgram>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    frame: Frame,
    targets: Targets,
    uniform_buffer: Option<wgpu::Buffer>,
    warned_line_mode: bool,
}

impl Inner {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// [`GpuBackend`] on top of wgpu.
///
/// Calls between [`GpuBackend::clear`] and [`WgpuBackend::encode`] are
/// recorded with a snapshot of the bound state, then replayed into a
/// single render pass. Pipelines are built on first use per program,
/// topology, polygon mode and depth test.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: TargetFormat,
    line_mode: bool,
    uniform_align: usize,
    repeat_sampler: wgpu::Sampler,
    clamp_sampler: wgpu::Sampler,
    fallback_2d: Rc<GpuTexture>,
    fallback_cube: Rc<GpuTexture>,
    inner: RefCell<Inner>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, target: TargetFormat, width: u32, height: u32) -> Self {
        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!(%error, "uncaptured wgpu error");
        }));

        let line_mode = device.features().contains(wgpu::Features::POLYGON_MODE_LINE);
        let uniform_align = device.limits().min_uniform_buffer_offset_alignment as usize;

        let repeat_sampler = device.create_sampler(&sampler_descriptor("repeat_sampler", TextureDimension::D2));
        let clamp_sampler = device.create_sampler(&sampler_descriptor("clamp_sampler", TextureDimension::Cube));

        let white = PixelImage::solid(1, 1, [255; 4]);
        let fallback_2d = Rc::new(GpuTexture {
            view: upload_layers(&device, &queue, "fallback_2d", std::slice::from_ref(&white), TextureDimension::D2),
            dimension: TextureDimension::D2,
        });
        let white_faces: [PixelImage; 6] = std::array::from_fn(|_| white.clone());
        let fallback_cube = Rc::new(GpuTexture {
            view: upload_layers(&device, &queue, "fallback_cube", &white_faces, TextureDimension::Cube),
            dimension: TextureDimension::Cube,
        });

        let targets = Targets::new(&device, target, width, height);
        tracing::info!(
            format = ?target.color,
            samples = target.sample_count,
            line_mode,
            "wgpu backend ready"
        );

        Self {
            device,
            queue,
            target,
            line_mode,
            uniform_align,
            repeat_sampler,
            clamp_sampler,
            fallback_2d,
            fallback_cube,
            inner: RefCell::new(Inner {
                next_id: 0,
                state: DeviceState::default(),
                buffers: HashMap::new(),
                textures: HashMap::new(),
                programs: HashMap::new(),
                pipelines: HashMap::new(),
                frame: Frame::default(),
                targets,
                uniform_buffer: None,
                warned_line_mode: false,
            }),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn target_format(&self) -> TargetFormat {
        self.target
    }

    /// Recreate the depth and multisample targets for a new surface size.
    pub fn resize(&self, width: u32, height: u32) {
        let mut inner = self.inner.borrow_mut();
        if !inner.targets.matches(width, height) {
            inner.targets = Targets::new(&self.device, self.target, width, height);
        }
    }

    /// Replay the recorded frame into one render pass targeting `target`.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let frame = std::mem::take(&mut inner.frame);

        for draw in &frame.draws {
            if inner.pipelines.contains_key(&draw.key) {
                continue;
            }
            if let Some(program) = inner.programs.get(&draw.key.program) {
                tracing::debug!(program = %program.layout.name, key = ?draw.key, "building pipeline");
                let pipeline = program.create_pipeline(&self.device, draw.key, self.target);
                inner.pipelines.insert(draw.key, pipeline);
            }
        }

        if !frame.uniforms.is_empty() {
            let needed = frame.uniforms.len() as u64;
            if inner.uniform_buffer.as_ref().is_none_or(|b| b.size() < needed) {
                inner.uniform_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("frame_uniforms"),
                    size: needed.next_power_of_two(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }));
            }
            if let Some(buffer) = &inner.uniform_buffer {
                self.queue.write_buffer(buffer, 0, &frame.uniforms);
            }
        }

        let mut uniform_groups: HashMap<ProgramId, wgpu::BindGroup> = HashMap::new();
        let mut texture_groups = Vec::with_capacity(frame.draws.len());
        for draw in &frame.draws {
            let Some(program) = inner.programs.get(&draw.key.program) else {
                texture_groups.push(None);
                continue;
            };
            uniform_groups
                .entry(draw.key.program)
                .or_insert_with(|| self.uniform_group(program, inner.uniform_buffer.as_ref()));
            texture_groups.push(Some(self.texture_group(program, draw)));
        }

        let (view, resolve_target) = match &inner.targets.msaa {
            Some(msaa) => (msaa, Some(target)),
            None => (target, None),
        };
        let [r, g, b, a] = frame.clear.unwrap_or([0.0, 0.0, 0.0, 1.0]).map(f64::from);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("scene_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &inner.targets.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });

        for (draw, textures) in frame.draws.iter().zip(&texture_groups) {
            let (Some(pipeline), Some(program), Some(uniforms), Some(textures)) = (
                inner.pipelines.get(&draw.key),
                inner.programs.get(&draw.key.program),
                uniform_groups.get(&draw.key.program),
                textures,
            ) else {
                tracing::warn!(key = ?draw.key, "program destroyed before its draw was encoded");
                continue;
            };
            let dynamic = [draw.uniform_offset];
            let offsets: &[u32] = if program.has_uniforms() { &dynamic } else { &[] };

            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, uniforms, offsets);
            pass.set_bind_group(1, textures, &[]);
            for (index, buffer) in draw.vertex_buffers.iter().enumerate() {
                pass.set_vertex_buffer(index as u32, buffer.buffer.slice(..));
            }
            pass.draw(0..draw.vertex_count, 0..1);
        }
    }

    fn uniform_group(&self, program: &GpuProgram, buffer: Option<&wgpu::Buffer>) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry> = match (&program.layout.uniform_block, buffer) {
            (Some(block), Some(buffer)) => vec![wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer,
                    offset: 0,
                    size: NonZeroU64::new(block.size as u64),
                }),
            }],
            _ => Vec::new(),
        };
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_uniforms", program.layout.name)),
            layout: &program.uniform_group,
            entries: &entries,
        })
    }

    fn texture_group(&self, program: &GpuProgram, draw: &DrawCommand) -> wgpu::BindGroup {
        let sampler = if program.samples_cubemap() {
            &self.clamp_sampler
        } else {
            &self.repeat_sampler
        };
        let entries: Vec<wgpu::BindGroupEntry> = draw
            .textures
            .iter()
            .map(|(binding, texture)| wgpu::BindGroupEntry {
                binding: *binding,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            })
            .chain(program.layout.samplers.iter().map(|&binding| wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::Sampler(sampler),
            }))
            .collect();
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{}_textures", program.layout.name)),
            layout: &program.texture_group,
            entries: &entries,
        })
    }

    fn fallback(&self, dimension: TextureDimension) -> Rc<GpuTexture> {
        match dimension {
            TextureDimension::D2 => self.fallback_2d.clone(),
            TextureDimension::Cube => self.fallback_cube.clone(),
        }
    }

    fn insert_texture(&self, view: wgpu::TextureView, dimension: TextureDimension) -> TextureId {
        let mut inner = self.inner.borrow_mut();
        let id = TextureId(inner.next_id());
        inner.textures.insert(id, Rc::new(GpuTexture { view, dimension }));
        id
    }
}

impl GpuBackend for WgpuBackend {
    fn create_buffer(&self, slot: AttributeSlot, bytes: &[u8]) -> BufferId {
        let mut inner = self.inner.borrow_mut();
        let id = BufferId(inner.next_id());
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{slot:?}_{id}")),
            contents: bytes,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let vertices = (bytes.len() as u64 / stride(slot)) as u32;
        inner.buffers.insert(id, Rc::new(GpuBuffer { buffer, vertices }));
        id
    }

    fn destroy_buffer(&self, id: BufferId) {
        let mut inner = self.inner.borrow_mut();
        if inner.buffers.remove(&id).is_none() {
            tracing::warn!(%id, "destroy of unknown buffer");
        }
        inner.state.forget_buffer(id);
    }

    fn create_texture_2d(&self, unit: TextureUnit, image: &PixelImage) -> TextureId {
        let label = format!("{unit:?}_texture");
        let view = upload_layers(
            &self.device,
            &self.queue,
            &label,
            std::slice::from_ref(image),
            TextureDimension::D2,
        );
        self.insert_texture(view, TextureDimension::D2)
    }

    fn create_cubemap(&self, faces: &[PixelImage; 6]) -> TextureId {
        let view = upload_layers(&self.device, &self.queue, "cubemap", faces, TextureDimension::Cube);
        self.insert_texture(view, TextureDimension::Cube)
    }

    fn destroy_texture(&self, id: TextureId) {
        let mut inner = self.inner.borrow_mut();
        if inner.textures.remove(&id).is_none() {
            tracing::warn!(%id, "destroy of unknown texture");
        }
        inner.state.forget_texture(id);
    }

    fn create_program(&self, source: &ShaderSource, layout: &ProgramLayout) -> Result<ProgramId, ShaderError> {
        let id = ProgramId(self.inner.borrow_mut().next_id());
        let probe_key = PipelineKey {
            program: id,
            topology: Topology::Triangles,
            polygon_mode: PolygonMode::Fill,
            depth_func: DepthFunc::Less,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = GpuProgram::new(&self.device, source, layout);
        let probe = program.create_pipeline(&self.device, probe_key, self.target);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(ShaderError::Link {
                program: source.name.clone(),
                log: error.to_string(),
            });
        }

        let mut inner = self.inner.borrow_mut();
        inner.programs.insert(id, program);
        inner.pipelines.insert(probe_key, probe);
        Ok(id)
    }

    fn destroy_program(&self, id: ProgramId) {
        let mut inner = self.inner.borrow_mut();
        if inner.programs.remove(&id).is_none() {
            tracing::warn!(%id, "destroy of unknown program");
        }
        inner.pipelines.retain(|key, _| key.program != id);
        inner.state.forget_program(id);
    }

    fn use_program(&self, id: ProgramId) {
        let mut inner = self.inner.borrow_mut();
        if !inner.programs.contains_key(&id) {
            tracing::warn!(%id, "use of unknown program");
            return;
        }
        inner.state.program = Some(id);
    }

    fn set_uniform(&self, location: &UniformLocation, value: UniformValue) {
        let mut inner = self.inner.borrow_mut();
        let Some(program) = inner.programs.get_mut(&location.program) else {
            tracing::warn!(program = %location.program, "uniform set on unknown program");
            return;
        };
        match (location.slot, value) {
            (UniformSlot::Block { offset, .. }, value) => value.write_into(&mut program.staging, offset),
            (UniformSlot::Texture { binding, .. }, UniformValue::Sampler(unit)) => program.set_unit(binding, unit),
            (UniformSlot::Texture { binding, .. }, value) => {
                tracing::warn!(binding, ?value, "non-sampler value for a texture uniform");
            }
        }
    }

    fn bind_attribute(&self, slot: AttributeSlot, buffer: BufferId) {
        self.inner.borrow_mut().state.attributes[slot.index() as usize] = Some(buffer);
    }

    fn bind_texture(&self, unit: TextureUnit, texture: Option<TextureId>) {
        self.inner.borrow_mut().state.textures[unit.index()] = texture;
    }

    fn set_polygon_mode(&self, mode: PolygonMode) {
        self.inner.borrow_mut().state.polygon_mode = mode;
    }

    fn set_depth_func(&self, func: DepthFunc) {
        self.inner.borrow_mut().state.depth_func = func;
    }

    fn clear(&self, color: [f32; 4]) {
        let mut inner = self.inner.borrow_mut();
        inner.frame = Frame {
            clear: Some(color),
            ..Frame::default()
        };
    }

    fn draw_arrays(&self, topology: Topology, vertex_count: u32) {
        if vertex_count == 0 {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let state = inner.state;
        let Some(program_id) = state.program else {
            tracing::warn!("draw with no program in use");
            return;
        };
        let Some(program) = inner.programs.get(&program_id) else {
            tracing::warn!(program = %program_id, "draw with unknown program");
            return;
        };

        let mut vertex_buffers = Vec::with_capacity(program.layout.vertex_inputs.len());
        for &slot in &program.layout.vertex_inputs {
            match state.attribute(slot).and_then(|id| inner.buffers.get(&id)) {
                Some(buffer) if buffer.vertices >= vertex_count => vertex_buffers.push(buffer.clone()),
                Some(buffer) => {
                    tracing::warn!(
                        program = %program.layout.name,
                        ?slot,
                        available = buffer.vertices,
                        vertex_count,
                        "attribute buffer too short, draw skipped"
                    );
                    return;
                }
                None => {
                    tracing::warn!(program = %program.layout.name, ?slot, "attribute not bound, draw skipped");
                    return;
                }
            }
        }

        let textures = program
            .layout
            .textures
            .iter()
            .map(|binding| {
                let unit = program.unit_for(binding.binding);
                let bound = state
                    .texture(unit)
                    .and_then(|id| inner.textures.get(&id))
                    .filter(|texture| texture.dimension == binding.dimension);
                let texture = bound.cloned().unwrap_or_else(|| self.fallback(binding.dimension));
                (binding.binding, texture)
            })
            .collect();

        let polygon_mode = if state.polygon_mode == PolygonMode::Line && !self.line_mode {
            if !inner.warned_line_mode {
                tracing::warn!("adapter lacks line polygon mode, wireframe draws filled");
                inner.warned_line_mode = true;
            }
            PolygonMode::Fill
        } else {
            state.polygon_mode
        };

        let uniform_offset = if program.has_uniforms() {
            let offset = align_to(inner.frame.uniforms.len(), self.uniform_align);
            inner.frame.uniforms.resize(offset, 0);
            inner.frame.uniforms.extend_from_slice(&program.staging);
            offset as u32
        } else {
            0
        };

        inner.frame.draws.push(DrawCommand {
            key: PipelineKey {
                program: program_id,
                topology,
                polygon_mode,
                depth_func: state.depth_func,
            },
            uniform_offset,
            vertex_buffers,
            textures,
            vertex_count,
        });
    }
}

/// 2D textures repeat and minify nearest; cubemaps clamp and filter
/// linearly both ways.
fn sampler_descriptor(label: &str, dimension: TextureDimension) -> wgpu::SamplerDescriptor<'_> {
    let (address_mode, min_filter) = match dimension {
        TextureDimension::D2 => (wgpu::AddressMode::Repeat, wgpu::FilterMode::Nearest),
        TextureDimension::Cube => (wgpu::AddressMode::ClampToEdge, wgpu::FilterMode::Linear),
    };
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode,
        address_mode_v: address_mode,
        address_mode_w: address_mode,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    }
}

fn align_to(len: usize, align: usize) -> usize {
    len.div_ceil(align.max(1)) * align.max(1)
}

/// Concatenate layers as tightly packed RGBA8, layer after layer.
fn layer_bytes(layers: &[PixelImage]) -> Vec<u8> {
    layers.iter().flat_map(|layer| layer.to_rgba8()).collect()
}

fn upload_layers(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    layers: &[PixelImage],
    dimension: TextureDimension,
) -> wgpu::TextureView {
    let (width, height) = layers.first().map_or((1, 1), |l| (l.width(), l.height()));
    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers.len() as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        wgpu::util::TextureDataOrder::LayerMajor,
        &layer_bytes(layers),
    );
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        dimension: Some(crate::pipeline::view_dimension(dimension)),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_offsets_round_up_to_alignment() {
        assert_eq!(align_to(0, 256), 0);
        assert_eq!(align_to(1, 256), 256);
        assert_eq!(align_to(224, 256), 256);
        assert_eq!(align_to(512, 256), 512);
        assert_eq!(align_to(5, 0), 5);
    }

    #[test]
    fn diffuse_sampler_minifies_nearest_cubemap_linear() {
        let diffuse = sampler_descriptor("d", TextureDimension::D2);
        assert_eq!(diffuse.min_filter, wgpu::FilterMode::Nearest);
        assert_eq!(diffuse.address_mode_u, wgpu::AddressMode::Repeat);

        let cube = sampler_descriptor("c", TextureDimension::Cube);
        assert_eq!(cube.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(cube.address_mode_w, wgpu::AddressMode::ClampToEdge);
    }

    #[test]
    fn layers_pack_in_order() {
        let red = PixelImage::solid(2, 2, [255, 0, 0, 255]);
        let blue = PixelImage::solid(2, 2, [0, 0, 255, 255]);
        let bytes = layer_bytes(&[red, blue]);
        assert_eq!(bytes.len(), 2 * 2 * 2 * 4);
        assert_eq!(&bytes[..4], &[255, 0, 0, 255]);
        assert_eq!(&bytes[16..20], &[0, 0, 255, 255]);
    }
}
