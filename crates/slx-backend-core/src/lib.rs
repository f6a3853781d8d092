#![warn(missing_docs)]
//! Backend trait and dispatch for the SLX translator.
//!
//! Defines the [`Backend`] trait that the textual emitters implement,
//! along with [`EmitOptions`], [`BackendError`], a [`BackendRegistry`] for
//! CLI dispatch, and the [`CodeWriter`] the emitters build their output
//! with.

use std::fmt::{self, Debug};

use slx_ast::Module;

/// The shader stage an emitter targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Fragment (pixel) shader.
    Fragment,
    /// Compute shader.
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vertex => "vertex",
            Self::Fragment => "fragment",
            Self::Compute => "compute",
        })
    }
}

/// Options passed to a backend.
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// The stage being emitted.
    pub stage: ShaderStage,
    /// Name of the entry-point function in the module.
    pub entry_point: String,
    /// Text prepended verbatim to the output.
    pub header: Option<String>,
}

impl EmitOptions {
    /// Creates options for an entry point at a stage.
    pub fn new(stage: ShaderStage, entry_point: impl Into<String>) -> Self {
        Self {
            stage,
            entry_point: entry_point.into(),
            header: None,
        }
    }
}

/// Errors that can occur during emission.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The named entry point does not exist in the module.
    #[error("entry point '{0}' not found")]
    UnknownEntryPoint(String),
    /// The module uses a construct this backend cannot express.
    #[error("unsupported: {0}")]
    Unsupported(String),
    /// A general backend error.
    #[error("{0}")]
    Other(String),
}

/// A backend that emits a typed module as target-dialect source text.
///
/// Emitters may rewrite parts of the module (semantic translation, field
/// reordering) before walking it, which is why the module is mutable.
pub trait Backend: Debug + Send + Sync {
    /// Human-readable name (e.g. "HLSL").
    fn name(&self) -> &str;

    /// Target identifiers this backend handles (for CLI dispatch).
    fn targets(&self) -> &[&str];

    /// Emits the module as a single text buffer.
    fn emit(&self, module: &mut Module, options: &EmitOptions) -> Result<String, BackendError>;
}

/// Registry of available backends, used for CLI target dispatch.
pub struct BackendRegistry {
    backends: Vec<Box<dyn Backend>>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    /// Creates a registry pre-populated with the built-in AST dump.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(AstDumpBackend));
        registry
    }

    /// Registers a backend.
    pub fn register(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Finds a backend that handles the given target identifier.
    pub fn find(&self, target: &str) -> Option<&dyn Backend> {
        self.backends
            .iter()
            .find(|b| b.targets().contains(&target))
            .map(|b| &**b)
    }

    /// Lists all supported target identifiers.
    pub fn list_targets(&self) -> Vec<&str> {
        self.backends
            .iter()
            .flat_map(|b| b.targets().iter().copied())
            .collect()
    }
}

/// Built-in backend that dumps the typed AST as text using
/// [`slx_ast::dump_module`].
#[derive(Debug)]
pub struct AstDumpBackend;

impl Backend for AstDumpBackend {
    fn name(&self) -> &str {
        "AST Dump"
    }

    fn targets(&self) -> &[&str] {
        &["ast-dump", "ast"]
    }

    fn emit(&self, module: &mut Module, _options: &EmitOptions) -> Result<String, BackendError> {
        Ok(slx_ast::dump_module(module))
    }
}

/// An indenting text writer the emitters build their output with.
///
/// Lines are begun at an indent level, extended with [`write`](Self::write),
/// and finished with one of the `end_line` forms.
#[derive(Debug, Default)]
pub struct CodeWriter {
    buffer: String,
}

impl CodeWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new line at the given indent level.
    pub fn begin_line(&mut self, indent: usize) {
        for _ in 0..indent {
            self.buffer.push_str("    ");
        }
    }

    /// Appends text to the current line.
    pub fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    /// Finishes the current line.
    pub fn end_line(&mut self) {
        self.buffer.push('\n');
    }

    /// Appends `suffix` and finishes the current line.
    pub fn end_line_with(&mut self, suffix: &str) {
        self.buffer.push_str(suffix);
        self.buffer.push('\n');
    }

    /// Writes a complete line at the given indent level.
    pub fn write_line(&mut self, indent: usize, line: &str) {
        self.begin_line(indent);
        self.buffer.push_str(line);
        self.end_line();
    }

    /// Returns the accumulated output.
    pub fn finish(self) -> String {
        self.buffer
    }

    /// The output built so far.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shader_stage() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
        assert_eq!(format!("{}", ShaderStage::Compute), "compute");
    }

    #[test]
    fn emit_options_new() {
        let options = EmitOptions::new(ShaderStage::Fragment, "main");
        assert_eq!(options.stage, ShaderStage::Fragment);
        assert_eq!(options.entry_point, "main");
        assert!(options.header.is_none());
    }

    #[test]
    fn backend_error_display() {
        let err = BackendError::UnknownEntryPoint("main".into());
        assert_eq!(format!("{err}"), "entry point 'main' not found");
        let err = BackendError::Unsupported("geometry shaders".into());
        assert_eq!(format!("{err}"), "unsupported: geometry shaders");
    }

    #[test]
    fn registry_find_builtin() {
        let registry = BackendRegistry::with_builtins();
        assert!(registry.find("ast-dump").is_some());
        assert!(registry.find("ast").is_some());
        assert!(registry.find("nonexistent").is_none());
    }

    #[test]
    fn registry_custom_backend() {
        #[derive(Debug)]
        struct TestBackend;
        impl Backend for TestBackend {
            fn name(&self) -> &str {
                "test"
            }
            fn targets(&self) -> &[&str] {
                &["test-target"]
            }
            fn emit(
                &self,
                _module: &mut Module,
                _options: &EmitOptions,
            ) -> Result<String, BackendError> {
                Ok(String::new())
            }
        }

        let mut registry = BackendRegistry::new();
        registry.register(Box::new(TestBackend));
        assert!(registry.find("test-target").is_some());
        assert_eq!(registry.list_targets(), vec!["test-target"]);
    }

    #[test]
    fn ast_dump_backend_runs() {
        let mut module = Module::new();
        let options = EmitOptions::new(ShaderStage::Vertex, "main");
        let out = AstDumpBackend.emit(&mut module, &options).unwrap();
        assert!(out.contains("Module:"));
    }

    #[test]
    fn code_writer_indents_lines() {
        let mut writer = CodeWriter::new();
        writer.write_line(0, "struct S {");
        writer.begin_line(1);
        writer.write("float x");
        writer.end_line_with(";");
        writer.write_line(0, "};");
        assert_eq!(writer.finish(), "struct S {\n    float x;\n};\n");
    }
}
