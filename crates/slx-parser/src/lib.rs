//! Frontend for the SLX shading-language translator.
//!
//! Parses SL source text into a typed [`slx_ast::Module`]:
//! the include preprocessor splices `#include` directives into one buffer
//! with `#line` markers, the tokenizer produces a single-lookahead token
//! stream, and the recursive-descent parser builds the AST while running
//! overload resolution, implicit-conversion ranking, and member/swizzle
//! typing.

mod intrinsics;
mod lexer;
mod parser;
pub mod preprocessor;
mod typer;

pub use lexer::{Diagnostic, Lexer, Token};
pub use preprocessor::{preprocess, FileProvider, PreprocessError};
pub use typer::{binary_op_result_type, cast_rank};

/// A fatal frontend diagnostic. Only the first error of a compilation is
/// reported; the productions unwind as soon as it is recorded.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{file}({line}) : {message}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// Parses a preprocessed source buffer into a typed module.
///
/// `file_name` seeds error reporting and node origins until the first
/// `#line` directive overrides it.
pub fn parse(source: &str, file_name: &str) -> Result<slx_ast::Module, ParseError> {
    parser::Parser::new(source, file_name).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_formatting() {
        let err = ParseError {
            file: "shader.sl".to_string(),
            line: 12,
            message: "Undeclared identifier 'foo'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "shader.sl(12) : Undeclared identifier 'foo'"
        );
    }

    #[test]
    fn preprocess_then_parse_tracks_origins() {
        let mut files = std::collections::HashMap::new();
        files.insert(
            "main.sl".to_string(),
            "#include \"common.sl\"\nfloat4 entry() { return color; }\n".to_string(),
        );
        files.insert("common.sl".to_string(), "float4 color;\n".to_string());

        let buffer = preprocess("main.sl", &files).unwrap();
        let module = parse(&buffer, "main.sl").unwrap();

        let decl = module
            .declarations
            .iter()
            .map(|(_, d)| d)
            .find(|d| module.interner.get(d.name) == "color")
            .unwrap();
        assert_eq!(module.interner.get(decl.origin.file), "common.sl");
        assert_eq!(decl.origin.line, 1);

        let function = module
            .functions
            .iter()
            .map(|(_, f)| f)
            .find(|f| module.interner.get(f.name) == "entry")
            .unwrap();
        assert_eq!(module.interner.get(function.origin.file), "main.sl");
        assert_eq!(function.origin.line, 2);
    }

    #[test]
    fn parse_error_carries_position() {
        let source = "float x;\nfloat x = ;\n";
        let err = parse(source, "bad.sl").unwrap_err();
        assert_eq!(err.file, "bad.sl");
        assert_eq!(err.line, 2);
    }
}
