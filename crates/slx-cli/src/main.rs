use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use slx_backend_core::{BackendRegistry, EmitOptions, ShaderStage};
use slx_backend_glsl::{GlslBackend, GlslVersion};
use slx_backend_hlsl::HlslBackend;
use slx_parser::preprocessor::{preprocess, FileProvider};

/// slx - shading-language translator
#[derive(Parser)]
#[command(version, about)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input file
    filename: Option<PathBuf>,

    /// Entry point of the shader
    entryname: Option<String>,

    /// Generate a vertex shader
    #[arg(long)]
    vs: bool,

    /// Generate a fragment shader (default)
    #[arg(long)]
    fs: bool,

    /// Generate a compute shader
    #[arg(long)]
    cs: bool,

    /// Generate GLSL (default)
    #[arg(long)]
    glsl: bool,

    /// Generate HLSL
    #[arg(long)]
    hlsl: bool,

    /// Generate legacy HLSL
    #[arg(long)]
    legacyhlsl: bool,

    /// Generate MSL
    #[arg(long)]
    metal: bool,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the typed AST to stderr before emitting
    #[arg(long)]
    dump_ast: bool,

    /// List all available target backends and exit
    #[arg(long)]
    list_targets: bool,
}

impl Cli {
    fn stage(&self) -> ShaderStage {
        if self.vs {
            ShaderStage::Vertex
        } else if self.cs {
            ShaderStage::Compute
        } else {
            ShaderStage::Fragment
        }
    }

    fn target(&self) -> &'static str {
        if self.hlsl {
            "hlsl"
        } else if self.legacyhlsl {
            "legacyhlsl"
        } else if self.metal {
            "metal"
        } else {
            "glsl"
        }
    }
}

/// Reads include files relative to the root file's directory.
struct FsFileProvider {
    base: PathBuf,
}

impl FileProvider for FsFileProvider {
    fn read_file(&self, file_name: &str) -> Option<String> {
        std::fs::read_to_string(self.base.join(file_name)).ok()
    }
}

fn build_registry() -> BackendRegistry {
    let mut registry = BackendRegistry::with_builtins();
    registry.register(Box::new(GlslBackend::new(GlslVersion::V140)));
    registry.register(Box::new(HlslBackend::new()));
    registry.register(Box::new(HlslBackend::legacy()));
    registry
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    env_logger::try_init().ok();

    let cli = Cli::parse();

    if cli.list_targets {
        let registry = build_registry();
        for target in registry.list_targets() {
            println!("{target}");
        }
        return Ok(());
    }

    let input = cli
        .filename
        .clone()
        .ok_or_else(|| miette::miette!("FILENAME is required (use --list-targets to list backends)"))?;
    let entry = cli
        .entryname
        .clone()
        .ok_or_else(|| miette::miette!("ENTRYNAME is required"))?;

    // 1. Preprocess: splice includes into one buffer with #line markers.
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let provider = FsFileProvider {
        base: input
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf(),
    };
    let buffer = preprocess(&file_name, &provider)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to preprocess {}", input.display()))?;

    // 2. Parse and type.
    let mut module = slx_parser::parse(&buffer, &file_name)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("parsing failed, aborting")?;

    if cli.dump_ast {
        eprintln!("{}", slx_ast::dump_module(&module));
    }

    // 3. Backend dispatch.
    let registry = build_registry();
    let target = cli.target();
    let backend = registry.find(target).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{target}' (available: {available})")
    })?;

    let options = EmitOptions::new(cli.stage(), entry);
    let text = backend
        .emit(&mut module, &options)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("translation failed, aborting")?;

    // 4. Write output.
    match &cli.output {
        Some(path) => std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["slx", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.filename.clone().unwrap(), PathBuf::from("shader.sl"));
        assert_eq!(cli.entryname.clone().unwrap(), "main");
        assert_eq!(cli.stage(), ShaderStage::Fragment);
        assert_eq!(cli.target(), "glsl");
        assert!(cli.output.is_none());
        assert!(!cli.dump_ast);
        assert!(!cli.list_targets);
    }

    #[test]
    fn cli_stage_selection() {
        let cli = Cli::try_parse_from(["slx", "--vs", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.stage(), ShaderStage::Vertex);
        let cli = Cli::try_parse_from(["slx", "--fs", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.stage(), ShaderStage::Fragment);
        let cli = Cli::try_parse_from(["slx", "--cs", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.stage(), ShaderStage::Compute);
    }

    #[test]
    fn cli_language_selection() {
        let cli = Cli::try_parse_from(["slx", "--hlsl", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.target(), "hlsl");
        let cli = Cli::try_parse_from(["slx", "--legacyhlsl", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.target(), "legacyhlsl");
        let cli = Cli::try_parse_from(["slx", "--metal", "shader.sl", "main"]).unwrap();
        assert_eq!(cli.target(), "metal");
    }

    #[test]
    fn cli_output_flag() {
        let cli =
            Cli::try_parse_from(["slx", "shader.sl", "main", "-o", "out.glsl"]).unwrap();
        assert_eq!(cli.output.unwrap(), PathBuf::from("out.glsl"));
    }

    #[test]
    fn cli_list_targets_requires_no_positionals() {
        let cli = Cli::try_parse_from(["slx", "--list-targets"]).unwrap();
        assert!(cli.list_targets);
        assert!(cli.filename.is_none());
    }

    #[test]
    fn registry_has_expected_targets() {
        let registry = build_registry();
        assert!(registry.find("glsl").is_some());
        assert!(registry.find("hlsl").is_some());
        assert!(registry.find("legacyhlsl").is_some());
        assert!(registry.find("ast-dump").is_some());
        // No Metal backend is registered; dispatch reports it unknown.
        assert!(registry.find("metal").is_none());
    }

    #[test]
    fn unknown_target_error_lists_available() {
        let registry = build_registry();
        assert!(registry.find("metal").is_none());
        let available = registry.list_targets().join(", ");
        assert!(available.contains("glsl"));
        assert!(available.contains("legacyhlsl"));
    }
}
