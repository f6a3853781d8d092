//! The tokenizer: a single-lookahead lexer over preprocessed source text.
//!
//! In addition to the enumerated multi-character tokens, every printable
//! ASCII character is a valid token ([`Token::Symbol`]). `#line`
//! directives update the tracked position without producing a token;
//! `#pragma` directives are skipped. Errors are sticky: only the first
//! diagnostic of a compilation is recorded and logged.

use slx_ast::{BaseType, ImageFormat};

/// A lexical token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Token {
    /// A single printable ASCII character.
    Symbol(u8),

    // Built-in type keywords.
    Float,
    Float2,
    Float3,
    Float4,
    Float2x2,
    Float3x3,
    Float4x4,
    Float4x3,
    Float4x2,
    Half,
    Half2,
    Half3,
    Half4,
    Half2x2,
    Half3x3,
    Half4x4,
    Half4x3,
    Half4x2,
    Bool,
    Bool2,
    Bool3,
    Bool4,
    Int,
    Int2,
    Int3,
    Int4,
    Uint,
    Uint2,
    Uint3,
    Uint4,
    Texture1D,
    Texture2D,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    Texture2DMS,
    Texture1DArray,
    Texture2DArray,
    Texture2DMSArray,
    RwTexture1D,
    RwTexture2D,
    RwTexture3D,
    SamplerState,

    // Reserved words.
    If,
    Else,
    For,
    While,
    Break,
    True,
    False,
    Void,
    Struct,
    CBuffer,
    TBuffer,
    Return,
    Continue,
    Discard,
    Const,
    Static,
    Inline,
    Uniform,
    In,
    Out,
    InOut,
    Register,

    /// An image-format keyword (`RGBA32F` .. `R8UI`).
    ImageFormat(ImageFormat),

    // Multi-character operators.
    LessEqual,
    GreaterEqual,
    EqualEqual,
    NotEqual,
    PlusPlus,
    MinusMinus,
    PlusEqual,
    MinusEqual,
    TimesEqual,
    DivideEqual,
    AndAnd,
    BarBar,

    // Value-carrying tokens.
    FloatLiteral,
    HalfLiteral,
    IntLiteral,
    Identifier,

    EndOfStream,
}

impl Token {
    /// Maps a type keyword to its base type.
    pub fn base_type(self) -> Option<BaseType> {
        Some(match self {
            Self::Float => BaseType::Float,
            Self::Float2 => BaseType::Float2,
            Self::Float3 => BaseType::Float3,
            Self::Float4 => BaseType::Float4,
            Self::Float2x2 => BaseType::Float2x2,
            Self::Float3x3 => BaseType::Float3x3,
            Self::Float4x4 => BaseType::Float4x4,
            Self::Float4x3 => BaseType::Float4x3,
            Self::Float4x2 => BaseType::Float4x2,
            Self::Half => BaseType::Half,
            Self::Half2 => BaseType::Half2,
            Self::Half3 => BaseType::Half3,
            Self::Half4 => BaseType::Half4,
            Self::Half2x2 => BaseType::Half2x2,
            Self::Half3x3 => BaseType::Half3x3,
            Self::Half4x4 => BaseType::Half4x4,
            Self::Half4x3 => BaseType::Half4x3,
            Self::Half4x2 => BaseType::Half4x2,
            Self::Bool => BaseType::Bool,
            Self::Bool2 => BaseType::Bool2,
            Self::Bool3 => BaseType::Bool3,
            Self::Bool4 => BaseType::Bool4,
            Self::Int => BaseType::Int,
            Self::Int2 => BaseType::Int2,
            Self::Int3 => BaseType::Int3,
            Self::Int4 => BaseType::Int4,
            Self::Uint => BaseType::Uint,
            Self::Uint2 => BaseType::Uint2,
            Self::Uint3 => BaseType::Uint3,
            Self::Uint4 => BaseType::Uint4,
            Self::Texture1D => BaseType::Texture1D,
            Self::Texture2D => BaseType::Texture2D,
            Self::Texture3D => BaseType::Texture3D,
            Self::TextureCube => BaseType::TextureCube,
            Self::TextureCubeArray => BaseType::TextureCubeArray,
            Self::Texture2DMS => BaseType::Texture2DMS,
            Self::Texture1DArray => BaseType::Texture1DArray,
            Self::Texture2DArray => BaseType::Texture2DArray,
            Self::Texture2DMSArray => BaseType::Texture2DMSArray,
            Self::RwTexture1D => BaseType::RwTexture1D,
            Self::RwTexture2D => BaseType::RwTexture2D,
            Self::RwTexture3D => BaseType::RwTexture3D,
            Self::SamplerState => BaseType::SamplerState,
            _ => return None,
        })
    }

    fn from_keyword(word: &str) -> Option<Token> {
        Some(match word {
            "float" => Self::Float,
            "float2" => Self::Float2,
            "float3" => Self::Float3,
            "float4" => Self::Float4,
            "float2x2" => Self::Float2x2,
            "float3x3" => Self::Float3x3,
            "float4x4" => Self::Float4x4,
            "float4x3" => Self::Float4x3,
            "float4x2" => Self::Float4x2,
            "half" => Self::Half,
            "half2" => Self::Half2,
            "half3" => Self::Half3,
            "half4" => Self::Half4,
            "half2x2" => Self::Half2x2,
            "half3x3" => Self::Half3x3,
            "half4x4" => Self::Half4x4,
            "half4x3" => Self::Half4x3,
            "half4x2" => Self::Half4x2,
            "bool" => Self::Bool,
            "bool2" => Self::Bool2,
            "bool3" => Self::Bool3,
            "bool4" => Self::Bool4,
            "int" => Self::Int,
            "int2" => Self::Int2,
            "int3" => Self::Int3,
            "int4" => Self::Int4,
            "uint" => Self::Uint,
            "uint2" => Self::Uint2,
            "uint3" => Self::Uint3,
            "uint4" => Self::Uint4,
            "Texture1D" => Self::Texture1D,
            "Texture2D" => Self::Texture2D,
            "Texture3D" => Self::Texture3D,
            "TextureCube" => Self::TextureCube,
            "TextureCubeArray" => Self::TextureCubeArray,
            "Texture2DMS" => Self::Texture2DMS,
            "Texture1DArray" => Self::Texture1DArray,
            "Texture2DArray" => Self::Texture2DArray,
            "Texture2DMSArray" => Self::Texture2DMSArray,
            "RWTexture1D" => Self::RwTexture1D,
            "RWTexture2D" => Self::RwTexture2D,
            "RWTexture3D" => Self::RwTexture3D,
            "SamplerState" => Self::SamplerState,
            "if" => Self::If,
            "else" => Self::Else,
            "for" => Self::For,
            "while" => Self::While,
            "break" => Self::Break,
            "true" => Self::True,
            "false" => Self::False,
            "void" => Self::Void,
            "struct" => Self::Struct,
            "cbuffer" => Self::CBuffer,
            "tbuffer" => Self::TBuffer,
            "return" => Self::Return,
            "continue" => Self::Continue,
            "discard" => Self::Discard,
            "const" => Self::Const,
            "static" => Self::Static,
            "inline" => Self::Inline,
            "uniform" => Self::Uniform,
            "in" => Self::In,
            "out" => Self::Out,
            "inout" => Self::InOut,
            "register" => Self::Register,
            _ => return Some(Self::ImageFormat(ImageFormat::from_keyword(word)?)),
        })
    }

    /// A human-readable description of a token kind, for diagnostics.
    pub fn describe(self) -> String {
        match self {
            Self::Symbol(c) => (c as char).to_string(),
            Self::ImageFormat(f) => f.keyword().to_string(),
            Self::FloatLiteral => "float literal".to_string(),
            Self::HalfLiteral => "half literal".to_string(),
            Self::IntLiteral => "int literal".to_string(),
            Self::Identifier => "identifier".to_string(),
            Self::EndOfStream => "end of stream".to_string(),
            Self::LessEqual => "<=".to_string(),
            Self::GreaterEqual => ">=".to_string(),
            Self::EqualEqual => "==".to_string(),
            Self::NotEqual => "!=".to_string(),
            Self::PlusPlus => "++".to_string(),
            Self::MinusMinus => "--".to_string(),
            Self::PlusEqual => "+=".to_string(),
            Self::MinusEqual => "-=".to_string(),
            Self::TimesEqual => "*=".to_string(),
            Self::DivideEqual => "/=".to_string(),
            Self::AndAnd => "&&".to_string(),
            Self::BarBar => "||".to_string(),
            token => {
                if let Some(base) = token.base_type() {
                    return base.description().name.to_string();
                }
                match token {
                    Self::If => "if",
                    Self::Else => "else",
                    Self::For => "for",
                    Self::While => "while",
                    Self::Break => "break",
                    Self::True => "true",
                    Self::False => "false",
                    Self::Void => "void",
                    Self::Struct => "struct",
                    Self::CBuffer => "cbuffer",
                    Self::TBuffer => "tbuffer",
                    Self::Return => "return",
                    Self::Continue => "continue",
                    Self::Discard => "discard",
                    Self::Const => "const",
                    Self::Static => "static",
                    Self::Inline => "inline",
                    Self::Uniform => "uniform",
                    Self::In => "in",
                    Self::Out => "out",
                    Self::InOut => "inout",
                    Self::Register => "register",
                    _ => "?",
                }
                .to_string()
            }
        }
    }
}

/// The first diagnostic of a compilation.
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// The tokenizer. Holds a read-only view of the preprocessed buffer plus
/// one token of lookahead.
pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    file: String,
    line: u32,
    token_line: u32,
    token: Token,
    float_value: f32,
    int_value: i32,
    identifier: String,
    error: bool,
    diagnostic: Option<Diagnostic>,
}

impl<'a> Lexer<'a> {
    /// The file name is only used for error reporting; `#line` directives
    /// in the buffer override it.
    pub fn new(source: &'a str, file_name: &str) -> Self {
        let mut lexer = Self {
            src: source.as_bytes(),
            pos: 0,
            file: file_name.to_string(),
            line: 1,
            token_line: 1,
            token: Token::EndOfStream,
            float_value: 0.0,
            int_value: 0,
            identifier: String::new(),
            error: false,
            diagnostic: None,
        };
        lexer.next();
        lexer
    }

    /// The current token.
    pub fn token(&self) -> Token {
        self.token
    }

    pub fn float_value(&self) -> f32 {
        self.float_value
    }

    pub fn int_value(&self) -> i32 {
        self.int_value
    }

    /// The text of the current `Identifier` token.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Line where the current token began.
    pub fn line(&self) -> u32 {
        self.token_line
    }

    /// File the tokenizer is currently attributing positions to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Reports an error at the current position. Only the first error of
    /// a compilation is recorded; the rest are suppressed to avoid
    /// cascades.
    pub fn report_error(&mut self, message: String) {
        if self.error {
            return;
        }
        self.error = true;
        log::error!("{}({}) : {}", self.file, self.line, message);
        self.diagnostic = Some(Diagnostic {
            file: self.file.clone(),
            line: self.line,
            message,
        });
    }

    /// Returns the recorded diagnostic, if any.
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }

    /// A readable description of the current token, for "near '...'"
    /// messages.
    pub fn token_text(&self) -> String {
        match self.token {
            Token::Identifier => self.identifier.clone(),
            Token::FloatLiteral | Token::HalfLiteral => format!("{:?}", self.float_value),
            Token::IntLiteral => format!("{}", self.int_value),
            token => token.describe(),
        }
    }

    fn peek(&self, offset: usize) -> u8 {
        *self.src.get(self.pos + offset).unwrap_or(&0)
    }

    /// Advances to the next token in the stream.
    pub fn next(&mut self) {
        loop {
            self.skip_whitespace();
            if self.starts_with(b"//") {
                self.skip_to_end_of_line();
                continue;
            }
            if self.starts_with(b"/*") {
                if !self.skip_block_comment() {
                    self.token = Token::EndOfStream;
                    return;
                }
                continue;
            }
            if self.starts_with(b"#pragma") {
                self.skip_to_end_of_line();
                continue;
            }
            if self.starts_with(b"#line") {
                self.scan_line_directive();
                continue;
            }
            break;
        }

        self.token_line = self.line;

        if self.pos >= self.src.len() {
            self.token = Token::EndOfStream;
            return;
        }

        let c = self.peek(0);
        match c {
            b'<' if self.peek(1) == b'=' => self.take(Token::LessEqual, 2),
            b'>' if self.peek(1) == b'=' => self.take(Token::GreaterEqual, 2),
            b'=' if self.peek(1) == b'=' => self.take(Token::EqualEqual, 2),
            b'!' if self.peek(1) == b'=' => self.take(Token::NotEqual, 2),
            b'+' if self.peek(1) == b'+' => self.take(Token::PlusPlus, 2),
            b'-' if self.peek(1) == b'-' => self.take(Token::MinusMinus, 2),
            b'+' if self.peek(1) == b'=' => self.take(Token::PlusEqual, 2),
            b'-' if self.peek(1) == b'=' => self.take(Token::MinusEqual, 2),
            b'*' if self.peek(1) == b'=' => self.take(Token::TimesEqual, 2),
            b'/' if self.peek(1) == b'=' => self.take(Token::DivideEqual, 2),
            b'&' if self.peek(1) == b'&' => self.take(Token::AndAnd, 2),
            b'|' if self.peek(1) == b'|' => self.take(Token::BarBar, 2),
            b'0'..=b'9' => self.scan_number(),
            b'.' if self.peek(1).is_ascii_digit() => self.scan_number(),
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.scan_identifier(),
            c if c.is_ascii_graphic() => self.take(Token::Symbol(c), 1),
            c => {
                self.report_error(format!("Syntax error: unknown character '\\x{c:02x}'"));
                self.take(Token::EndOfStream, 1);
            }
        }
    }

    fn take(&mut self, token: Token, len: usize) {
        self.token = token;
        self.pos += len;
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.src[self.pos..].starts_with(prefix)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.src.len() {
            let c = self.src[self.pos];
            if c == b'\n' {
                self.line += 1;
            } else if !c.is_ascii_whitespace() {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_to_end_of_line(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos] != b'\n' {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> bool {
        self.pos += 2;
        while self.pos < self.src.len() {
            if self.starts_with(b"*/") {
                self.pos += 2;
                return true;
            }
            if self.src[self.pos] == b'\n' {
                self.line += 1;
            }
            self.pos += 1;
        }
        self.report_error("Syntax error: unterminated comment".to_string());
        false
    }

    /// Handles `#line N ["file"]`: updates the position without producing
    /// a token. The directive numbers the line that follows it.
    fn scan_line_directive(&mut self) {
        self.pos += b"#line".len();
        while self.pos < self.src.len() && matches!(self.src[self.pos], b' ' | b'\t') {
            self.pos += 1;
        }

        let digits_start = self.pos;
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos == digits_start {
            self.report_error("Syntax error: expected line number after #line".to_string());
            self.skip_to_end_of_line();
            return;
        }
        let text = std::str::from_utf8(&self.src[digits_start..self.pos]).unwrap_or("0");
        let line: u32 = text.parse().unwrap_or(0);

        while self.pos < self.src.len() && matches!(self.src[self.pos], b' ' | b'\t') {
            self.pos += 1;
        }
        if self.pos < self.src.len() && self.src[self.pos] == b'"' {
            self.pos += 1;
            let name_start = self.pos;
            while self.pos < self.src.len()
                && self.src[self.pos] != b'"'
                && self.src[self.pos] != b'\n'
            {
                self.pos += 1;
            }
            if self.pos >= self.src.len() || self.src[self.pos] != b'"' {
                self.report_error(
                    "Syntax error: expected '\"' after file name near #line".to_string(),
                );
                return;
            }
            self.file = String::from_utf8_lossy(&self.src[name_start..self.pos]).into_owned();
            self.pos += 1;
        }

        self.skip_to_end_of_line();
        if self.pos < self.src.len() {
            self.pos += 1; // the directive's newline
        }
        self.line = line;
    }

    fn scan_number(&mut self) {
        let start = self.pos;
        let mut is_float = false;

        while self.peek(0).is_ascii_digit() {
            self.pos += 1;
        }
        if self.peek(0) == b'.' && self.peek(1) != b'.' {
            is_float = true;
            self.pos += 1;
            while self.peek(0).is_ascii_digit() {
                self.pos += 1;
            }
        }
        if matches!(self.peek(0), b'e' | b'E') {
            let mut lookahead = 1;
            if matches!(self.peek(1), b'+' | b'-') {
                lookahead = 2;
            }
            if self.peek(lookahead).is_ascii_digit() {
                is_float = true;
                self.pos += lookahead;
                while self.peek(0).is_ascii_digit() {
                    self.pos += 1;
                }
            }
        }

        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        match self.peek(0) {
            b'h' | b'H' => {
                self.pos += 1;
                self.float_value = self.parse_float(&text);
                self.token = Token::HalfLiteral;
            }
            b'f' | b'F' => {
                self.pos += 1;
                self.float_value = self.parse_float(&text);
                self.token = Token::FloatLiteral;
            }
            _ if is_float => {
                self.float_value = self.parse_float(&text);
                self.token = Token::FloatLiteral;
            }
            _ => {
                match text.parse::<i64>() {
                    Ok(v) => self.int_value = v as i32,
                    Err(_) => {
                        self.report_error(format!("Syntax error: malformed number '{text}'"));
                        self.int_value = 0;
                    }
                }
                self.token = Token::IntLiteral;
            }
        }
    }

    fn parse_float(&mut self, text: &str) -> f32 {
        match text.parse() {
            Ok(v) => v,
            Err(_) => {
                self.report_error(format!("Syntax error: malformed number '{text}'"));
                0.0
            }
        }
    }

    fn scan_identifier(&mut self) {
        let src = self.src;
        let start = self.pos;
        while matches!(self.peek(0), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&src[start..self.pos]).unwrap_or("");
        match Token::from_keyword(word) {
            Some(token) => self.token = token,
            None => {
                self.identifier.clear();
                self.identifier.push_str(word);
                self.token = Token::Identifier;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(src, "test.sl");
        let mut out = Vec::new();
        while lexer.token() != Token::EndOfStream {
            out.push(lexer.token());
            lexer.next();
        }
        out
    }

    #[test]
    fn keywords_and_symbols() {
        assert_eq!(
            tokens("float4 x;"),
            vec![Token::Float4, Token::Identifier, Token::Symbol(b';')]
        );
        assert_eq!(
            tokens("cbuffer { }"),
            vec![Token::CBuffer, Token::Symbol(b'{'), Token::Symbol(b'}')]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            tokens("a <= b == c && d || e"),
            vec![
                Token::Identifier,
                Token::LessEqual,
                Token::Identifier,
                Token::EqualEqual,
                Token::Identifier,
                Token::AndAnd,
                Token::Identifier,
                Token::BarBar,
                Token::Identifier,
            ]
        );
        assert_eq!(
            tokens("x += 1; y--;"),
            vec![
                Token::Identifier,
                Token::PlusEqual,
                Token::IntLiteral,
                Token::Symbol(b';'),
                Token::Identifier,
                Token::MinusMinus,
                Token::Symbol(b';'),
            ]
        );
    }

    #[test]
    fn number_literals() {
        let lexer = Lexer::new("42", "t");
        assert_eq!(lexer.token(), Token::IntLiteral);
        assert_eq!(lexer.int_value(), 42);

        let lexer = Lexer::new("1.5", "t");
        assert_eq!(lexer.token(), Token::FloatLiteral);
        assert_eq!(lexer.float_value(), 1.5);

        let lexer = Lexer::new(".25", "t");
        assert_eq!(lexer.token(), Token::FloatLiteral);
        assert_eq!(lexer.float_value(), 0.25);

        let lexer = Lexer::new("2.0h", "t");
        assert_eq!(lexer.token(), Token::HalfLiteral);
        assert_eq!(lexer.float_value(), 2.0);

        let lexer = Lexer::new("3.0f", "t");
        assert_eq!(lexer.token(), Token::FloatLiteral);

        let mut lexer = Lexer::new("1e3", "t");
        assert_eq!(lexer.token(), Token::FloatLiteral);
        assert_eq!(lexer.float_value(), 1000.0);

        lexer.next();
        assert_eq!(lexer.token(), Token::EndOfStream);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("a // comment\n b /* block\n comment */ c"),
            vec![Token::Identifier, Token::Identifier, Token::Identifier]
        );
    }

    #[test]
    fn unterminated_comment_is_an_error() {
        let mut lexer = Lexer::new("/* never closed", "t");
        assert!(lexer.diagnostic().is_some());
        assert_eq!(lexer.token(), Token::EndOfStream);
        lexer.next();
        assert_eq!(lexer.token(), Token::EndOfStream);
    }

    #[test]
    fn pragma_is_skipped() {
        assert_eq!(
            tokens("#pragma anything at all\nfloat"),
            vec![Token::Float]
        );
    }

    #[test]
    fn line_directive_updates_position() {
        let lexer = Lexer::new("#line 10 \"other.sl\"\nx", "test.sl");
        assert_eq!(lexer.token(), Token::Identifier);
        assert_eq!(lexer.line(), 10);
        assert_eq!(lexer.file(), "other.sl");
    }

    #[test]
    fn line_numbers_track_newlines() {
        let mut lexer = Lexer::new("a\nb\n\nc", "t");
        assert_eq!(lexer.line(), 1);
        lexer.next();
        assert_eq!(lexer.line(), 2);
        lexer.next();
        assert_eq!(lexer.line(), 4);
    }

    #[test]
    fn image_format_keywords() {
        assert_eq!(
            tokens("RGBA32F R8UI"),
            vec![
                Token::ImageFormat(ImageFormat::Rgba32F),
                Token::ImageFormat(ImageFormat::R8Ui),
            ]
        );
    }

    #[test]
    fn errors_are_sticky() {
        let mut lexer = Lexer::new("@", "t");
        lexer.report_error("first".to_string());
        lexer.report_error("second".to_string());
        assert_eq!(lexer.diagnostic().unwrap().message, "first");
    }

    #[test]
    fn unknown_character_is_an_error() {
        let lexer = Lexer::new("\x01", "t");
        assert!(lexer.diagnostic().is_some());
    }
}
