use crate::pipeline::{DEPTH_FORMAT, TargetFormat};

/// Depth buffer and optional multisampled colour buffer sized to the surface.
pub struct Targets {
    pub depth: wgpu::TextureView,
    /// Present when rendering with more than one sample; resolves into the
    /// surface texture.
    pub msaa: Option<wgpu::TextureView>,
    pub width: u32,
    pub height: u32,
}

impl Targets {
    pub fn new(device: &wgpu::Device, format: TargetFormat, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let attachment = |label: &str, texture_format: wgpu::TextureFormat| {
            device
                .create_texture(&wgpu::TextureDescriptor {
                    label: Some(label),
                    size: wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: format.sample_count,
                    dimension: wgpu::TextureDimension::D2,
                    format: texture_format,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
                .create_view(&Default::default())
        };
        let depth = attachment("depth_target", DEPTH_FORMAT);
        let msaa = (format.sample_count > 1).then(|| attachment("msaa_color_target", format.color));
        Self {
            depth,
            msaa,
            width,
            height,
        }
    }

    pub fn matches(&self, width: u32, height: u32) -> bool {
        self.width == width.max(1) && self.height == height.max(1)
    }
}
