use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for sceneview")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, shaders, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Compile and link every shader pair under assets/shaders
    Shaders,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            run_fmt()?;
            run_clippy()?;
            run_tests()?;
            run_shaders()?;
            run_doc()?;
        }
        Commands::Fmt => run_fmt()?,
        Commands::Clippy => run_clippy()?,
        Commands::Test => run_tests()?,
        Commands::Shaders => run_shaders()?,
        Commands::Doc => run_doc()?,
        Commands::Build => cargo("build", &["build", "--workspace"])?,
    }

    Ok(())
}

fn cargo(what: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {}", args.join(" "));
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {what} failed");
    }
    Ok(())
}

fn run_fmt() -> Result<()> {
    cargo("fmt check", &["fmt", "--all", "--", "--check"])
}

fn run_clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn run_tests() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn run_doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

/// `<name>.vert.wgsl` files under `dir` paired with their `<name>.frag.wgsl`.
fn shader_pairs(dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
    let mut pairs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let vertex = entry?.path();
        let Some(name) = vertex
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_suffix(".vert.wgsl"))
        else {
            continue;
        };
        let fragment = dir.join(format!("{name}.frag.wgsl"));
        if !fragment.exists() {
            anyhow::bail!("{} has no matching fragment shader", vertex.display());
        }
        pairs.push((vertex, fragment));
    }
    pairs.sort();
    Ok(pairs)
}

fn run_shaders() -> Result<()> {
    let pairs = shader_pairs(Path::new("assets/shaders"))?;
    if pairs.is_empty() {
        anyhow::bail!("no shaders found under assets/shaders");
    }
    for (vertex, fragment) in &pairs {
        let (Some(vertex), Some(fragment)) = (vertex.to_str(), fragment.to_str()) else {
            anyhow::bail!("non UTF-8 shader path");
        };
        cargo(
            "shader check",
            &["run", "--quiet", "-p", "sceneview-cli", "--", "check-shaders", vertex, fragment],
        )?;
    }
    Ok(())
}
