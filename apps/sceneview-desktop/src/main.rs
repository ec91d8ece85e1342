mod hud;
mod keymap;

use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec2;
use hud::{HudStats, draw_hud};
use sceneview_input::KeySet;
use sceneview_render::{Gpu, SceneAssets, SceneRenderer};
use sceneview_render_wgpu::{TargetFormat, WgpuBackend};
use sceneview_scene::{FrameState, SceneConfig};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::{CursorGrabMode, Window, WindowId};

#[derive(Parser)]
#[command(name = "sceneview-desktop", about = "Fly around a lit, textured 3D scene")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Scene description (JSON). The built-in scene is used when omitted.
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Directory relative asset paths are resolved against
    #[arg(long)]
    root: Option<PathBuf>,

    /// Window width, overriding the scene
    #[arg(long)]
    width: Option<u32>,

    /// Window height, overriding the scene
    #[arg(long)]
    height: Option<u32>,

    /// MSAA sample count (1 or 4), overriding the scene
    #[arg(long)]
    msaa: Option<u32>,
}

fn load_config(cli: &Cli) -> Result<SceneConfig> {
    let mut config = match &cli.scene {
        Some(path) => SceneConfig::load(path).with_context(|| format!("loading scene {}", path.display()))?,
        None => SceneConfig::default(),
    };
    if let Some(width) = cli.width {
        config.window.width = width;
    }
    if let Some(height) = cli.height {
        config.window.height = height;
    }
    if let Some(msaa) = cli.msaa {
        config.window.msaa_samples = msaa;
    }
    config.validate().context("invalid scene settings")?;
    if let Some(root) = &cli.root {
        config = config.with_base_dir(root);
    }
    Ok(config)
}

/// Everything that exists only while the window is open.
struct GpuContext {
    renderer: SceneRenderer,
    backend: Rc<WgpuBackend>,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    egui_winit: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
    adapter_name: String,
    window: Arc<Window>,
}

struct Viewer {
    config: SceneConfig,
    /// Decoded before the window opens; consumed by the upload.
    assets: Option<SceneAssets>,
    frame: FrameState,
    keys: KeySet,
    /// Integrated relative mouse motion. The cursor is grabbed, so absolute
    /// positions stop changing at the window edge.
    virtual_cursor: Vec2,
    last_frame: Instant,
    egui_ctx: EguiContext,
    gpu: Option<GpuContext>,
    fatal: Option<anyhow::Error>,
}

impl Viewer {
    fn new(config: SceneConfig, assets: SceneAssets) -> Self {
        let frame = config.frame_state(config.window.width, config.window.height);
        Self {
            virtual_cursor: frame.last_cursor,
            frame,
            config,
            assets: Some(assets),
            keys: KeySet::new(),
            last_frame: Instant::now(),
            egui_ctx: EguiContext::default(),
            gpu: None,
            fatal: None,
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<GpuContext> {
        let window_config = &self.config.window;
        let attrs = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(PhysicalSize::new(window_config.width, window_config.height));
        let window = Arc::new(event_loop.create_window(attrs).context("creating window")?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone()).context("creating surface")?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("no compatible GPU adapter")?;
        let info = adapter.get_info();
        tracing::info!(
            adapter = %info.name,
            backend = info.backend.to_str(),
            driver = %info.driver_info,
            "GPU selected"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("sceneview_device"),
                required_features: sceneview_render_wgpu::wanted_features(&adapter),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .context("creating device")?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or(caps.formats.first())
            .copied()
            .context("surface reports no formats")?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sample_count =
            sceneview_render_wgpu::supported_sample_count(&adapter, format, window_config.msaa_samples);
        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);
        let backend = Rc::new(WgpuBackend::new(
            device,
            queue,
            TargetFormat {
                color: format,
                sample_count,
            },
            surface_config.width,
            surface_config.height,
        ));

        let assets = self.assets.take().context("scene already uploaded")?;
        let gpu: Gpu = backend.clone();
        let renderer = SceneRenderer::new(&gpu, &assets).context("uploading scene")?;
        drop(assets);

        if window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
            .is_err()
        {
            tracing::warn!("cursor grab unavailable, mouse look stops at the window edge");
        }
        window.set_cursor_visible(false);
        self.frame.on_resize(surface_config.width, surface_config.height);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Ok(GpuContext {
            renderer,
            backend,
            surface,
            surface_config,
            egui_winit,
            egui_renderer,
            adapter_name: info.name,
            window,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.frame.on_resize(size.width, size.height);
        let Some(gpu) = &mut self.gpu else {
            return;
        };
        if size.width == 0 || size.height == 0 {
            return;
        }
        gpu.surface_config.width = size.width;
        gpu.surface_config.height = size.height;
        gpu.surface.configure(gpu.backend.device(), &gpu.surface_config);
        gpu.backend.resize(size.width, size.height);
    }

    /// One iteration: time, held keys, draws, HUD, present.
    fn redraw(&mut self) -> Result<()> {
        let now = Instant::now();
        self.frame.begin_frame((now - self.last_frame).as_secs_f32());
        self.last_frame = now;
        self.frame.apply_held_keys(&self.keys, &self.config.keys);

        let Some(gpu) = &mut self.gpu else {
            return Ok(());
        };
        let output = match gpu.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(gpu.backend.device(), &gpu.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timeout, frame skipped");
                return Ok(());
            }
            Err(e) => anyhow::bail!("surface error: {e}"),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        gpu.renderer.render(&self.frame);

        let device = gpu.backend.device();
        let queue = gpu.backend.queue();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });
        gpu.backend.encode(&mut encoder, &view);

        let raw_input = gpu.egui_winit.take_egui_input(&gpu.window);
        let stats = HudStats {
            adapter: &gpu.adapter_name,
            objects: gpu.renderer.objects().len(),
            samples: gpu.backend.target_format().sample_count,
        };
        let full_output = self.egui_ctx.run(raw_input, |ctx| draw_hud(ctx, &self.frame, &stats));
        gpu.egui_winit
            .handle_platform_output(&gpu.window, full_output.platform_output);
        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [gpu.surface_config.width, gpu.surface_config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        for (id, image_delta) in &full_output.textures_delta.set {
            gpu.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        gpu.egui_renderer
            .update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("hud_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            gpu.egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            gpu.egui_renderer.free_texture(id);
        }

        output.present();
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        tracing::error!("{err:#}");
        self.fatal = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.gpu.is_some() {
            return;
        }
        match self.open(event_loop) {
            Ok(gpu) => {
                self.last_frame = Instant::now();
                self.gpu = Some(gpu);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if let Some(gpu) = &mut self.gpu {
            let response = gpu.egui_winit.on_window_event(&gpu.window, &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => self.frame.request_close(),
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::Focused(false) => self.keys.clear(),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                let Some(key) = keymap::viewer_key(code) else {
                    return;
                };
                let edge = self.keys.update(key, state == ElementState::Pressed);
                if let Some(action) = self.config.keys.actions.on_key(key, edge) {
                    self.frame.on_action(action);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Err(err) = self.redraw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: winit::event::DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta } = event {
            self.virtual_cursor += Vec2::new(delta.0 as f32, delta.1 as f32);
            self.frame.on_cursor_moved(self.virtual_cursor);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.frame.close_requested() {
            event_loop.exit();
            return;
        }
        if let Some(gpu) = &self.gpu {
            gpu.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    tracing::info!("sceneview-desktop starting");

    let config = load_config(&cli)?;
    let assets = SceneAssets::load(&config).context("loading scene assets")?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(config, assets);
    event_loop.run_app(&mut viewer)?;

    match viewer.fatal.take() {
        Some(err) => Err(err),
        None => {
            tracing::info!("sceneview-desktop exiting");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_before_validation() {
        let cli = Cli::parse_from(["sceneview-desktop", "--width", "640", "--msaa", "1"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.window.width, 640);
        assert_eq!(config.window.msaa_samples, 1);

        let cli = Cli::parse_from(["sceneview-desktop", "--msaa", "8"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn root_rebases_default_assets() {
        let cli = Cli::parse_from(["sceneview-desktop", "--root", "/opt/scenes"]);
        let config = load_config(&cli).unwrap();
        assert!(config.objects[0].model.starts_with("/opt/scenes"));
    }
}
