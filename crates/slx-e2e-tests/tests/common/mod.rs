use std::collections::HashMap;

use slx_ast::Module;
use slx_backend_core::{Backend, BackendError, EmitOptions, ShaderStage};

/// Parse SL source and emit it with the given backend.
#[allow(dead_code)]
pub fn translate(
    source: &str,
    backend: &dyn Backend,
    stage: ShaderStage,
    entry: &str,
) -> String {
    let mut module = slx_parser::parse(source, "test.sl").expect("parse failed");
    backend
        .emit(&mut module, &EmitOptions::new(stage, entry))
        .expect("emit failed")
}

/// Parse SL source and emit it, returning the backend error on failure.
#[allow(dead_code)]
pub fn try_translate(
    source: &str,
    backend: &dyn Backend,
    stage: ShaderStage,
    entry: &str,
) -> Result<String, BackendError> {
    let mut module = slx_parser::parse(source, "test.sl").expect("parse failed");
    backend.emit(&mut module, &EmitOptions::new(stage, entry))
}

/// Run the include preprocessor over an in-memory file set, then parse.
#[allow(dead_code)]
pub fn preprocess_and_parse(files: &[(&str, &str)], root: &str) -> Module {
    let provider: HashMap<String, String> = files
        .iter()
        .map(|&(name, content)| (name.to_string(), content.to_string()))
        .collect();
    let buffer = slx_parser::preprocess(root, &provider).expect("preprocess failed");
    slx_parser::parse(&buffer, root).expect("parse failed")
}
