//! The include preprocessor.
//!
//! Splices `#include "file"` directives into a single logical buffer,
//! marking every file boundary with a `#line N "path"` directive so the
//! tokenizer can attribute positions to the original files. A file name
//! that was already opened during this compilation (case-insensitive) is
//! never reopened, which gives every file an implicit include guard.

use std::fmt::Write as _;

/// Source of include-file content. The CLI supplies a filesystem-backed
/// provider; tests supply in-memory maps.
pub trait FileProvider {
    /// Returns the content of `file_name`, or `None` if it cannot be read.
    fn read_file(&self, file_name: &str) -> Option<String>;
}

impl<S: std::hash::BuildHasher> FileProvider for std::collections::HashMap<String, String, S> {
    fn read_file(&self, file_name: &str) -> Option<String> {
        self.get(file_name).cloned()
    }
}

/// Errors produced while splicing includes.
#[derive(Debug, thiserror::Error)]
pub enum PreprocessError {
    #[error("{includer}({line}) : could not read included file '{file}'")]
    UnreadableFile {
        file: String,
        includer: String,
        line: u32,
    },
    #[error("{file}({line}) : expected '\"' after #include")]
    MissingQuote { file: String, line: u32 },
    #[error("{file}({line}) : expected '\"' before end of line in #include")]
    UnterminatedFileName { file: String, line: u32 },
}

/// Runs the preprocessor over `file_name`, reading it (and everything it
/// includes) through `provider`.
pub fn preprocess(
    file_name: &str,
    provider: &dyn FileProvider,
) -> Result<String, PreprocessError> {
    let root = provider
        .read_file(file_name)
        .ok_or_else(|| PreprocessError::UnreadableFile {
            file: file_name.to_string(),
            includer: file_name.to_string(),
            line: 0,
        })?;
    let mut pp = Preprocessor {
        provider,
        opened: vec![file_name.to_string()],
        out: String::new(),
    };
    pp.splice(file_name, &root)?;
    Ok(pp.out)
}

struct Preprocessor<'a> {
    provider: &'a dyn FileProvider,
    opened: Vec<String>,
    out: String,
}

impl Preprocessor<'_> {
    fn splice(&mut self, file_name: &str, content: &str) -> Result<(), PreprocessError> {
        let _ = writeln!(self.out, "#line 1 \"{file_name}\"");

        let mut line = 0u32;
        for text in content.lines() {
            line += 1;
            let trimmed = text.trim_start();
            let Some(rest) = trimmed.strip_prefix("#include") else {
                self.out.push_str(text);
                self.out.push('\n');
                continue;
            };
            if !rest.starts_with(char::is_whitespace) {
                // Not the directive (e.g. an identifier starting with it).
                self.out.push_str(text);
                self.out.push('\n');
                continue;
            }

            let rest = rest.trim_start();
            let Some(rest) = rest.strip_prefix('"') else {
                return Err(PreprocessError::MissingQuote {
                    file: file_name.to_string(),
                    line,
                });
            };
            let Some(end) = rest.find('"') else {
                return Err(PreprocessError::UnterminatedFileName {
                    file: file_name.to_string(),
                    line,
                });
            };
            let included = &rest[..end];

            self.open(included, file_name, line)?;
            // Resume the including file on the line after the directive.
            let _ = writeln!(self.out, "#line {} \"{file_name}\"", line + 1);
        }
        Ok(())
    }

    fn open(&mut self, file_name: &str, includer: &str, line: u32) -> Result<(), PreprocessError> {
        if self
            .opened
            .iter()
            .any(|o| o.eq_ignore_ascii_case(file_name))
        {
            return Ok(());
        }
        let content =
            self.provider
                .read_file(file_name)
                .ok_or_else(|| PreprocessError::UnreadableFile {
                    file: file_name.to_string(),
                    includer: includer.to_string(),
                    line,
                })?;
        self.opened.push(file_name.to_string());
        self.splice(file_name, &content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn provider(files: &[(&str, &str)]) -> HashMap<String, String> {
        files
            .iter()
            .map(|&(name, content)| (name.to_string(), content.to_string()))
            .collect()
    }

    #[test]
    fn plain_file_gets_a_line_marker() {
        let files = provider(&[("main.sl", "float x;\n")]);
        let out = preprocess("main.sl", &files).unwrap();
        assert_eq!(out, "#line 1 \"main.sl\"\nfloat x;\n");
    }

    #[test]
    fn include_is_spliced_with_markers() {
        let files = provider(&[
            ("main.sl", "#include \"lib.sl\"\nfloat y;\n"),
            ("lib.sl", "float x;\n"),
        ]);
        let out = preprocess("main.sl", &files).unwrap();
        assert_eq!(
            out,
            "#line 1 \"main.sl\"\n\
             #line 1 \"lib.sl\"\n\
             float x;\n\
             #line 2 \"main.sl\"\n\
             float y;\n"
        );
    }

    #[test]
    fn nested_includes() {
        let files = provider(&[
            ("a.sl", "#include \"b.sl\"\nfloat a;\n"),
            ("b.sl", "#include \"c.sl\"\nfloat b;\n"),
            ("c.sl", "float c;\n"),
        ]);
        let out = preprocess("a.sl", &files).unwrap();
        let order: Vec<_> = ["float c;", "float b;", "float a;"]
            .iter()
            .map(|s| out.find(s).unwrap())
            .collect();
        assert!(order[0] < order[1] && order[1] < order[2]);
    }

    #[test]
    fn duplicate_include_is_dropped_case_insensitively() {
        let files = provider(&[
            (
                "main.sl",
                "#include \"lib.sl\"\n#include \"LIB.SL\"\nfloat y;\n",
            ),
            ("lib.sl", "float x;\n"),
        ]);
        let out = preprocess("main.sl", &files).unwrap();
        assert_eq!(out.matches("float x;").count(), 1);
    }

    #[test]
    fn self_include_is_dropped() {
        let files = provider(&[("main.sl", "#include \"main.sl\"\nfloat y;\n")]);
        let out = preprocess("main.sl", &files).unwrap();
        assert_eq!(out.matches("float y;").count(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let files = provider(&[("main.sl", "#include \"nope.sl\"\n")]);
        let err = preprocess("main.sl", &files).unwrap_err();
        assert!(matches!(err, PreprocessError::UnreadableFile { .. }));
        assert!(err.to_string().contains("nope.sl"));
    }

    #[test]
    fn missing_quote_is_an_error() {
        let files = provider(&[("main.sl", "#include lib.sl\n")]);
        let err = preprocess("main.sl", &files).unwrap_err();
        assert!(matches!(err, PreprocessError::MissingQuote { line: 1, .. }));
    }

    #[test]
    fn unterminated_name_is_an_error() {
        let files = provider(&[("main.sl", "#include \"lib.sl\n")]);
        let err = preprocess("main.sl", &files).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::UnterminatedFileName { line: 1, .. }
        ));
    }
}
