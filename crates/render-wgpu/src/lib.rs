//! wgpu backend for the scene renderer.
//!
//! Implements [`sceneview_render::GpuBackend`] by recording each frame's
//! state changes and draws, then encoding them into a single render pass.
//!
//! # Invariants
//! - Vertex attribute slot `n` feeds shader `@location(n)`.
//! - The uniform block lives at `@group(0) @binding(0)`; textures and
//!   samplers live in group 1.
//! - Wireframe falls back to filled polygons on adapters without line mode.

mod gpu;
mod pipeline;
mod targets;

pub use gpu::WgpuBackend;
pub use pipeline::{DEPTH_FORMAT, TargetFormat};

/// Optional features the backend uses when the adapter offers them.
pub fn wanted_features(adapter: &wgpu::Adapter) -> wgpu::Features {
    adapter.features() & wgpu::Features::POLYGON_MODE_LINE
}

/// `requested` if both the colour format and the depth format support
/// that many samples, else 1.
pub fn supported_sample_count(adapter: &wgpu::Adapter, color: wgpu::TextureFormat, requested: u32) -> u32 {
    let supported = |format| {
        adapter
            .get_texture_format_features(format)
            .flags
            .sample_count_supported(requested)
    };
    if requested > 1 && supported(color) && supported(DEPTH_FORMAT) {
        requested
    } else {
        if requested > 1 {
            tracing::warn!(requested, ?color, "multisampling unsupported, rendering with one sample");
        }
        1
    }
}
