use anyhow::Context;
use clap::{Parser, Subcommand};
use sceneview_assets::{FlattenedMesh, PixelImage, RawMeshData, flatten_positions};
use sceneview_render::shader::{self, ShaderSource, UniformSlot};
use sceneview_render::{Gpu, RecordingBackend, SceneAssets, SceneRenderer};
use sceneview_scene::SceneConfig;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sceneview-cli", about = "Inspect sceneview models, shaders and scenes")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Parse a model and report its shapes, material and flattened size
    Inspect {
        /// Wavefront OBJ file
        model: PathBuf,
    },
    /// Compile and link a vertex/fragment pair and list its interface
    CheckShaders {
        vertex: PathBuf,
        fragment: PathBuf,
    },
    /// Load a scene and render one frame on a recording device
    Check {
        /// Scene description (JSON); the built-in scene when omitted
        scene: Option<PathBuf>,
        /// Directory relative asset paths are resolved against
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("sceneview-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("assets: {}", sceneview_assets::crate_info());
            println!("render: {}", sceneview_render::crate_info());
        }
        Commands::Inspect { model } => inspect(&model)?,
        Commands::CheckShaders { vertex, fragment } => check_shaders(&vertex, &fragment)?,
        Commands::Check { scene, root } => {
            let mut config = match &scene {
                Some(path) => SceneConfig::load(path).with_context(|| format!("loading scene {}", path.display()))?,
                None => SceneConfig::default(),
            };
            if let Some(root) = &root {
                config = config.with_base_dir(root);
            }
            let report = check_scene(&config)?;
            println!(
                "scene OK: {} objects, {} draws per frame, {} buffers, {} textures, {} programs",
                report.objects, report.draws, report.buffers, report.textures, report.programs
            );
        }
    }

    Ok(())
}

fn describe_image(image: &PixelImage) -> String {
    format!("{}x{} {:?}", image.width(), image.height(), image.format())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let raw = RawMeshData::load(path)?;
    println!("{}", path.display());
    println!(
        "  attributes: {} positions, {} normals, {} tex coords",
        raw.positions.len(),
        raw.normals.len(),
        raw.tex_coords.len()
    );
    for shape in &raw.shapes {
        println!("  shape {:?}: {} triangles", shape.name, shape.faces.len());
    }
    match &raw.material {
        Some(material) => println!("  material {:?}", material.name),
        None => println!("  no material"),
    }

    match FlattenedMesh::build(&raw) {
        Ok(mesh) => {
            println!("  flattened: {} vertices", mesh.vertex_count());
            match (raw.diffuse_texture(), mesh.diffuse()) {
                (Some(texture), Some(image)) => {
                    println!("  diffuse: {} ({})", texture.display(), describe_image(image))
                }
                _ => println!("  diffuse: none"),
            }
        }
        // markers only need positions
        Err(err) => {
            println!("  not drawable lit: {err}");
            let vertices = flatten_positions(&raw).with_context(|| format!("model {}", path.display()))?;
            println!("  position-only: {} vertices", vertices.len());
        }
    }
    Ok(())
}

fn check_shaders(vertex: &Path, fragment: &Path) -> anyhow::Result<()> {
    let source = ShaderSource::from_files(vertex, fragment)?;
    let layout = shader::link(&source)?;
    println!("program {} linked", layout.name);
    println!(
        "  entry points: {} / {}",
        layout.vertex_entry, layout.fragment_entry
    );
    let inputs: Vec<String> = layout
        .vertex_inputs
        .iter()
        .map(|slot| format!("{slot:?}@{}", slot.index()))
        .collect();
    println!("  vertex inputs: {}", inputs.join(", "));
    if let Some(block) = &layout.uniform_block {
        println!("  uniform block: {} bytes", block.size);
    }
    for name in layout.uniform_names() {
        match layout.uniform(name) {
            Some(UniformSlot::Block { offset, kind }) => println!("    {name}: {kind:?} at {offset}"),
            Some(UniformSlot::Texture { binding, dimension }) => {
                println!("    {name}: {dimension:?} texture at binding {binding}")
            }
            None => {}
        }
    }
    Ok(())
}

struct CheckReport {
    objects: usize,
    draws: usize,
    buffers: usize,
    textures: usize,
    programs: usize,
}

/// Load every asset, upload to a recording device, draw one frame and
/// confirm that dropping the scene releases everything it created.
fn check_scene(config: &SceneConfig) -> anyhow::Result<CheckReport> {
    config.validate()?;
    let assets = SceneAssets::load(config).context("loading scene assets")?;

    let recorder = Rc::new(RecordingBackend::new());
    let gpu: Gpu = recorder.clone();
    let renderer = SceneRenderer::new(&gpu, &assets).context("uploading scene")?;
    renderer.render(&config.frame_state(config.window.width, config.window.height));

    let report = CheckReport {
        objects: renderer.objects().len(),
        draws: recorder.draws().len(),
        buffers: recorder.live_buffers(),
        textures: recorder.live_textures(),
        programs: recorder.live_programs(),
    };
    drop(renderer);

    let leaked = recorder.live_buffers() + recorder.live_textures() + recorder.live_programs();
    anyhow::ensure!(leaked == 0, "{leaked} device objects outlived the scene");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
    }

    #[test]
    fn stock_scene_checks_clean() {
        let config = SceneConfig::default().with_base_dir(&repo_root());
        let report = check_scene(&config).unwrap();
        assert_eq!(report.objects, 2);
        // two objects, the light marker and the skybox
        assert_eq!(report.draws, 4);
        assert_eq!(report.programs, 3);
    }

    #[test]
    fn missing_asset_fails_the_check() {
        let mut config = SceneConfig::default().with_base_dir(&repo_root());
        config.light.marker = repo_root().join("assets/models/missing.obj");
        let err = check_scene(&config).err().unwrap();
        assert!(format!("{err:#}").contains("missing.obj"));
    }

    #[test]
    fn shipped_models_inspect() {
        inspect(&repo_root().join("assets/models/crate.obj")).unwrap();
        inspect(&repo_root().join("assets/models/light_marker.obj")).unwrap();
    }
}
