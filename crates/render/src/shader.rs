//! WGSL program compilation, linking and reflection.
//!
//! A program is a vertex source plus a fragment source. Each stage is parsed
//! and validated on its own; linking then checks that the stages agree and
//! records the resource layout the renderer uses to resolve uniform names.
//!
//! Resource conventions:
//! - scalar/vector/matrix uniforms live in one struct at `@group(0) @binding(0)`
//! - textures and samplers live in `@group(1)`
//! - vertex inputs use `@location(n)` with `n` an [`AttributeSlot`]

use crate::backend::{AttributeSlot, TextureDimension};
use naga::{AddressSpace, Binding, ImageClass, ImageDimension, Module, ScalarKind, TypeInner};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

pub const UNIFORM_GROUP: u32 = 0;
pub const UNIFORM_BINDING: u32 = 0;
pub const TEXTURE_GROUP: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

/// Shader failures. All of them are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("failed to read {stage} shader {}: {source}", path.display())]
    Io {
        stage: ShaderStage,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{stage} shader of `{program}` failed to compile:\n{log}")]
    Compile {
        program: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("program `{program}` failed to link: {log}")]
    Link { program: String, log: String },
    #[error("program `{program}` has no uniform named `{name}`")]
    UnknownUniform { program: String, name: String },
}

/// Source text of one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    /// Used in logs and errors.
    pub name: String,
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    pub fn new(name: impl Into<String>, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Read both stages from disk. The program is named after the vertex
    /// file, up to its first dot.
    pub fn from_files(vertex: impl AsRef<Path>, fragment: impl AsRef<Path>) -> Result<Self, ShaderError> {
        let (vertex, fragment) = (vertex.as_ref(), fragment.as_ref());
        let read = |stage, path: &Path| {
            std::fs::read_to_string(path).map_err(|source| ShaderError::Io {
                stage,
                path: path.to_path_buf(),
                source,
            })
        };
        let name = vertex
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.split('.').next())
            .unwrap_or("program")
            .to_owned();
        Ok(Self {
            name,
            vertex: read(ShaderStage::Vertex, vertex)?,
            fragment: read(ShaderStage::Fragment, fragment)?,
        })
    }
}

/// Type of a member of the uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformKind {
    Uint,
    Int,
    Float,
    Vec3,
    Vec4,
    Mat4,
    /// Present in the block but not settable from the renderer.
    Unsupported,
}

impl UniformKind {
    pub fn size(self) -> u32 {
        match self {
            UniformKind::Uint | UniformKind::Int | UniformKind::Float => 4,
            UniformKind::Vec3 => 12,
            UniformKind::Vec4 => 16,
            UniformKind::Mat4 => 64,
            UniformKind::Unsupported => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMember {
    pub name: String,
    pub offset: u32,
    pub kind: UniformKind,
}

/// The uniform struct at `@group(0) @binding(0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    /// Struct size in bytes, including trailing padding.
    pub size: u32,
    pub members: Vec<BlockMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureBinding {
    pub name: String,
    pub binding: u32,
    pub dimension: TextureDimension,
}

/// Where a named uniform lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    Block { offset: u32, kind: UniformKind },
    /// A texture in group 1. Setting it selects the texture unit it samples.
    Texture { binding: u32, dimension: TextureDimension },
}

/// Reflected interface of a linked program.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramLayout {
    pub name: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
    /// Attribute slots the vertex stage reads, ascending.
    pub vertex_inputs: Vec<AttributeSlot>,
    pub uniform_block: Option<UniformBlock>,
    pub textures: Vec<TextureBinding>,
    /// Sampler bindings in group 1, ascending.
    pub samplers: Vec<u32>,
}

impl ProgramLayout {
    pub fn uniform(&self, name: &str) -> Option<UniformSlot> {
        let member = self
            .uniform_block
            .iter()
            .flat_map(|block| &block.members)
            .find(|m| m.name == name)
            .map(|m| UniformSlot::Block {
                offset: m.offset,
                kind: m.kind,
            });
        member.or_else(|| {
            self.textures
                .iter()
                .find(|t| t.name == name)
                .map(|t| UniformSlot::Texture {
                    binding: t.binding,
                    dimension: t.dimension,
                })
        })
    }

    pub fn uniform_names(&self) -> impl Iterator<Item = &str> {
        self.uniform_block
            .iter()
            .flat_map(|block| block.members.iter().map(|m| m.name.as_str()))
            .chain(self.textures.iter().map(|t| t.name.as_str()))
    }

    pub fn block_size(&self) -> u32 {
        self.uniform_block.as_ref().map_or(0, |b| b.size)
    }
}

/// Render an error and its sources on one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut log = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        log.push_str(": ");
        log.push_str(&inner.to_string());
        source = inner.source();
    }
    log
}

/// Parse and validate one stage.
pub fn compile(program: &str, stage: ShaderStage, source: &str) -> Result<Module, ShaderError> {
    let compile_error = |log| ShaderError::Compile {
        program: program.to_owned(),
        stage,
        log,
    };
    let module = naga::front::wgsl::parse_str(source).map_err(|e| compile_error(e.emit_to_string(source)))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    )
    .validate(&module)
    .map_err(|e| compile_error(error_chain(e.as_inner())))?;
    Ok(module)
}

/// Compile both stages and check that they fit together.
pub fn link(source: &ShaderSource) -> Result<ProgramLayout, ShaderError> {
    let vertex = compile(&source.name, ShaderStage::Vertex, &source.vertex)?;
    let fragment = compile(&source.name, ShaderStage::Fragment, &source.fragment)?;
    let link_error = |log: String| ShaderError::Link {
        program: source.name.clone(),
        log,
    };

    let vs_entry = vertex
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Vertex)
        .ok_or_else(|| link_error("vertex source has no @vertex entry point".into()))?;
    let fs_entry = fragment
        .entry_points
        .iter()
        .find(|ep| ep.stage == naga::ShaderStage::Fragment)
        .ok_or_else(|| link_error("fragment source has no @fragment entry point".into()))?;

    let mut inputs = BTreeSet::new();
    for arg in &vs_entry.function.arguments {
        collect_locations(&vertex, arg.binding.as_ref(), arg.ty, &mut inputs);
    }
    let vertex_inputs = inputs
        .into_iter()
        .map(|location| {
            AttributeSlot::from_index(location)
                .ok_or_else(|| link_error(format!("vertex input @location({location}) has no attribute slot")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut varyings = BTreeSet::new();
    if let Some(result) = &vs_entry.function.result {
        collect_locations(&vertex, result.binding.as_ref(), result.ty, &mut varyings);
    }
    let mut fragment_inputs = BTreeSet::new();
    for arg in &fs_entry.function.arguments {
        collect_locations(&fragment, arg.binding.as_ref(), arg.ty, &mut fragment_inputs);
    }
    if let Some(missing) = fragment_inputs.difference(&varyings).next() {
        return Err(link_error(format!(
            "fragment input @location({missing}) is not written by the vertex stage"
        )));
    }

    let vs_resources = reflect_resources(&vertex).map_err(&link_error)?;
    let fs_resources = reflect_resources(&fragment).map_err(&link_error)?;

    let uniform_block = match (vs_resources.block, fs_resources.block) {
        (Some(a), Some(b)) if a != b => {
            return Err(link_error("uniform block layout differs between stages".into()));
        }
        (a, b) => a.or(b),
    };

    let mut textures = vs_resources.textures;
    for texture in fs_resources.textures {
        match textures.iter().find(|t| t.binding == texture.binding) {
            Some(existing) if *existing != texture => {
                return Err(link_error(format!(
                    "texture binding {} declared differently in each stage",
                    texture.binding
                )));
            }
            Some(_) => {}
            None => textures.push(texture),
        }
    }
    textures.sort_by_key(|t| t.binding);

    let samplers: BTreeSet<u32> = vs_resources.samplers.into_iter().chain(fs_resources.samplers).collect();
    if let Some(clash) = textures.iter().find(|t| samplers.contains(&t.binding)) {
        return Err(link_error(format!(
            "binding {} in group {TEXTURE_GROUP} is used by both a texture and a sampler",
            clash.binding
        )));
    }

    Ok(ProgramLayout {
        name: source.name.clone(),
        vertex_entry: vs_entry.name.clone(),
        fragment_entry: fs_entry.name.clone(),
        vertex_inputs,
        uniform_block,
        textures,
        samplers: samplers.into_iter().collect(),
    })
}

fn collect_locations(
    module: &Module,
    binding: Option<&Binding>,
    ty: naga::Handle<naga::Type>,
    out: &mut BTreeSet<u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            out.insert(*location);
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(module, member.binding.as_ref(), member.ty, out);
                }
            }
        }
    }
}

#[derive(Default)]
struct Resources {
    block: Option<UniformBlock>,
    textures: Vec<TextureBinding>,
    samplers: Vec<u32>,
}

fn reflect_resources(module: &Module) -> Result<Resources, String> {
    let mut resources = Resources::default();
    for (_, var) in module.global_variables.iter() {
        let Some(binding) = &var.binding else {
            continue;
        };
        let name = var.name.clone().unwrap_or_default();
        let inner = &module.types[var.ty].inner;
        match var.space {
            AddressSpace::Uniform => {
                if (binding.group, binding.binding) != (UNIFORM_GROUP, UNIFORM_BINDING) {
                    return Err(format!(
                        "uniform `{name}` must be at @group({UNIFORM_GROUP}) @binding({UNIFORM_BINDING})"
                    ));
                }
                resources.block = Some(reflect_block(module, inner).ok_or_else(|| format!("uniform `{name}` must be a struct"))?);
            }
            AddressSpace::Handle => {
                if binding.group != TEXTURE_GROUP {
                    return Err(format!("`{name}` must be in @group({TEXTURE_GROUP})"));
                }
                match inner {
                    TypeInner::Image {
                        dim,
                        arrayed: false,
                        class: ImageClass::Sampled { kind: ScalarKind::Float, multi: false },
                    } => {
                        let dimension = match dim {
                            ImageDimension::D2 => TextureDimension::D2,
                            ImageDimension::Cube => TextureDimension::Cube,
                            other => return Err(format!("texture `{name}` has unsupported dimension {other:?}")),
                        };
                        resources.textures.push(TextureBinding {
                            name,
                            binding: binding.binding,
                            dimension,
                        });
                    }
                    TypeInner::Sampler { comparison: false } => resources.samplers.push(binding.binding),
                    _ => return Err(format!("`{name}` is not a filterable float texture or sampler")),
                }
            }
            _ => return Err(format!("`{name}` uses an unsupported address space")),
        }
    }
    Ok(resources)
}

fn reflect_block(module: &Module, inner: &TypeInner) -> Option<UniformBlock> {
    let TypeInner::Struct { members, span } = inner else {
        return None;
    };
    let members = members
        .iter()
        .map(|m| BlockMember {
            name: m.name.clone().unwrap_or_default(),
            offset: m.offset,
            kind: uniform_kind(&module.types[m.ty].inner),
        })
        .collect();
    Some(UniformBlock { size: *span, members })
}

fn uniform_kind(inner: &TypeInner) -> UniformKind {
    use naga::VectorSize;
    match inner {
        TypeInner::Scalar(scalar) => match scalar.kind {
            ScalarKind::Uint => UniformKind::Uint,
            ScalarKind::Sint => UniformKind::Int,
            ScalarKind::Float => UniformKind::Float,
            _ => UniformKind::Unsupported,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Tri => UniformKind::Vec3,
            VectorSize::Quad => UniformKind::Vec4,
            VectorSize::Bi => UniformKind::Unsupported,
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            ..
        } => UniformKind::Mat4,
        _ => UniformKind::Unsupported,
    }
}
