use sceneview_render::shader::{ProgramLayout, ShaderSource};
use sceneview_render::{AttributeSlot, DepthFunc, PolygonMode, ProgramId, TextureDimension, Topology};
use std::num::NonZeroU64;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Everything that selects a distinct render pipeline for a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub topology: Topology,
    pub polygon_mode: PolygonMode,
    pub depth_func: DepthFunc,
}

/// Fixed-function target parameters shared by every pipeline.
#[derive(Debug, Clone, Copy)]
pub struct TargetFormat {
    pub color: wgpu::TextureFormat,
    pub sample_count: u32,
}

/// Device objects behind one linked program.
pub struct GpuProgram {
    pub layout: ProgramLayout,
    pub vertex_module: wgpu::ShaderModule,
    pub fragment_module: wgpu::ShaderModule,
    pub uniform_group: wgpu::BindGroupLayout,
    pub texture_group: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    /// CPU copy of the uniform block, snapshotted into each draw.
    pub staging: Vec<u8>,
    /// Texture binding → unit it samples. Unset bindings sample unit 0.
    pub sampler_units: Vec<(u32, sceneview_render::TextureUnit)>,
}

impl GpuProgram {
    pub fn new(device: &wgpu::Device, source: &ShaderSource, layout: &ProgramLayout) -> Self {
        let module = |stage: &str, code: &str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(&format!("{}_{stage}", layout.name)),
                source: wgpu::ShaderSource::Wgsl(code.into()),
            })
        };
        let vertex_module = module("vertex", &source.vertex);
        let fragment_module = module("fragment", &source.fragment);

        let uniform_entries: Vec<wgpu::BindGroupLayoutEntry> = layout
            .uniform_block
            .iter()
            .map(|block| wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(block.size as u64),
                },
                count: None,
            })
            .collect();
        let uniform_group = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}_uniforms", layout.name)),
            entries: &uniform_entries,
        });

        let texture_entries: Vec<wgpu::BindGroupLayoutEntry> = layout
            .textures
            .iter()
            .map(|texture| wgpu::BindGroupLayoutEntry {
                binding: texture.binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: view_dimension(texture.dimension),
                    multisampled: false,
                },
                count: None,
            })
            .chain(layout.samplers.iter().map(|&binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            }))
            .collect();
        let texture_group = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{}_textures", layout.name)),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{}_pipeline_layout", layout.name)),
            bind_group_layouts: &[&uniform_group, &texture_group],
            push_constant_ranges: &[],
        });

        Self {
            layout: layout.clone(),
            vertex_module,
            fragment_module,
            uniform_group,
            texture_group,
            pipeline_layout,
            staging: vec![0; layout.block_size() as usize],
            sampler_units: Vec::new(),
        }
    }

    pub fn has_uniforms(&self) -> bool {
        self.layout.uniform_block.is_some()
    }

    pub fn unit_for(&self, binding: u32) -> sceneview_render::TextureUnit {
        self.sampler_units
            .iter()
            .find(|(b, _)| *b == binding)
            .map_or(sceneview_render::TextureUnit::Diffuse, |(_, unit)| *unit)
    }

    pub fn set_unit(&mut self, binding: u32, unit: sceneview_render::TextureUnit) {
        match self.sampler_units.iter_mut().find(|(b, _)| *b == binding) {
            Some(entry) => entry.1 = unit,
            None => self.sampler_units.push((binding, unit)),
        }
    }

    /// Cube textures need clamped sampling to hide face seams.
    pub fn samples_cubemap(&self) -> bool {
        self.layout
            .textures
            .iter()
            .any(|t| t.dimension == TextureDimension::Cube)
    }

    pub fn create_pipeline(
        &self,
        device: &wgpu::Device,
        key: PipelineKey,
        target: TargetFormat,
    ) -> wgpu::RenderPipeline {
        let attributes: Vec<[wgpu::VertexAttribute; 1]> = self
            .layout
            .vertex_inputs
            .iter()
            .map(|&slot| {
                [wgpu::VertexAttribute {
                    format: vertex_format(slot),
                    offset: 0,
                    shader_location: slot.index(),
                }]
            })
            .collect();
        let buffers: Vec<wgpu::VertexBufferLayout> = self
            .layout
            .vertex_inputs
            .iter()
            .zip(&attributes)
            .map(|(&slot, attribute)| wgpu::VertexBufferLayout {
                array_stride: stride(slot),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attribute,
            })
            .collect();

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&format!(
                "{}_{:?}_{:?}_{:?}",
                self.layout.name, key.topology, key.polygon_mode, key.depth_func
            )),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.vertex_module,
                entry_point: Some(&self.layout.vertex_entry),
                compilation_options: Default::default(),
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.fragment_module,
                entry_point: Some(&self.layout.fragment_entry),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target.color,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: match key.topology {
                    Topology::Triangles => wgpu::PrimitiveTopology::TriangleList,
                    Topology::Points => wgpu::PrimitiveTopology::PointList,
                },
                polygon_mode: match key.polygon_mode {
                    PolygonMode::Fill => wgpu::PolygonMode::Fill,
                    PolygonMode::Line => wgpu::PolygonMode::Line,
                },
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: cull_mode(key.topology),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: match key.depth_func {
                    DepthFunc::Less => wgpu::CompareFunction::Less,
                    DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
                },
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: target.sample_count,
                ..Default::default()
            },
            multiview: None,
            cache: None,
        })
    }
}

/// Back faces of triangles are culled, wireframe included. Points are never
/// culled.
pub fn cull_mode(topology: Topology) -> Option<wgpu::Face> {
    match topology {
        Topology::Triangles => Some(wgpu::Face::Back),
        Topology::Points => None,
    }
}

pub fn view_dimension(dimension: TextureDimension) -> wgpu::TextureViewDimension {
    match dimension {
        TextureDimension::D2 => wgpu::TextureViewDimension::D2,
        TextureDimension::Cube => wgpu::TextureViewDimension::Cube,
    }
}

pub fn vertex_format(slot: AttributeSlot) -> wgpu::VertexFormat {
    match slot.components() {
        2 => wgpu::VertexFormat::Float32x2,
        _ => wgpu::VertexFormat::Float32x3,
    }
}

pub fn stride(slot: AttributeSlot) -> wgpu::BufferAddress {
    slot.components() as wgpu::BufferAddress * 4
}
