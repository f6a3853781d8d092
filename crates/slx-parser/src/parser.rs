//! The recursive-descent parser with embedded semantic analysis.
//!
//! Each expression production fills in the inferred type of the node it
//! creates; overload resolution, implicit-conversion checks, and member/
//! swizzle typing happen during the parse. The first error aborts the
//! compilation: productions return a failure sentinel that unwinds to the
//! driver, and the diagnostic recorded on the tokenizer becomes the
//! [`ParseError`](crate::ParseError).

use slx_ast::{
    Argument, ArgumentModifier, Attribute, AttributeKind, BaseType, BufferDecl, Callee,
    Declaration, Expression, ExpressionKind, FunctionDecl, Handle, Intrinsic, Literal, Module,
    Name, NumericType, Origin, SamplerStateDecl, StateAssignment, StateValue, Statement,
    StatementKind, StructDecl, StructField, Type, TypeFlags, UnaryOp, CONDITIONAL_PRIORITY,
};
use slx_ast::BinaryOp;

use crate::intrinsics::{is_intrinsic, INTRINSICS, METHODS};
use crate::lexer::{Lexer, Token};
use crate::typer::{binary_op_result_type, cast_rank, compare_candidates, Candidate, CompareResult};
use crate::ParseError;

/// Failure sentinel returned by productions; the diagnostic itself lives
/// on the tokenizer.
pub(crate) struct ParseFail;

type PResult<T> = Result<T, ParseFail>;

/// A scope-stack entry. `name == None` is the sentinel that marks the
/// start of a lexical scope.
struct ScopeEntry {
    name: Option<Name>,
    ty: Type,
}

// ---------------------------------------------------------------------------
// Sampler-state tables
// ---------------------------------------------------------------------------

struct EffectStateValue {
    name: &'static str,
    value: i32,
}

enum EffectStateValues {
    Enum(&'static [EffectStateValue]),
    Float,
    Color,
}

struct EffectState {
    name: &'static str,
    d3d_render_state: i32,
    values: EffectStateValues,
}

const TEXTURE_FILTERING_VALUES: &[EffectStateValue] = &[
    EffectStateValue { name: "Point", value: 0 },
    EffectStateValue { name: "Linear", value: 1 },
    EffectStateValue { name: "Mipmap_Nearest", value: 2 },
    EffectStateValue { name: "Mipmap_Best", value: 3 },
    EffectStateValue { name: "Anisotropic", value: 4 },
];

const TEXTURE_ADDRESSING_VALUES: &[EffectStateValue] = &[
    EffectStateValue { name: "Wrap", value: 1 },
    EffectStateValue { name: "Mirror", value: 2 },
    EffectStateValue { name: "Clamp", value: 3 },
    EffectStateValue { name: "Border", value: 4 },
    EffectStateValue { name: "MirrorOnce", value: 5 },
];

const COMPARISON_VALUES: &[EffectStateValue] = &[
    EffectStateValue { name: "Never", value: 1 },
    EffectStateValue { name: "Less", value: 2 },
    EffectStateValue { name: "Equal", value: 3 },
    EffectStateValue { name: "LessEqual", value: 4 },
    EffectStateValue { name: "Greater", value: 5 },
    EffectStateValue { name: "NotEqual", value: 6 },
    EffectStateValue { name: "GreaterEqual", value: 7 },
    EffectStateValue { name: "Always", value: 8 },
];

const SAMPLER_STATES: &[EffectState] = &[
    EffectState { name: "AddressU", d3d_render_state: 1, values: EffectStateValues::Enum(TEXTURE_ADDRESSING_VALUES) },
    EffectState { name: "AddressV", d3d_render_state: 2, values: EffectStateValues::Enum(TEXTURE_ADDRESSING_VALUES) },
    EffectState { name: "AddressW", d3d_render_state: 3, values: EffectStateValues::Enum(TEXTURE_ADDRESSING_VALUES) },
    EffectState { name: "BorderColor", d3d_render_state: 4, values: EffectStateValues::Color },
    EffectState { name: "MagFilter", d3d_render_state: 5, values: EffectStateValues::Enum(TEXTURE_FILTERING_VALUES) },
    EffectState { name: "MinFilter", d3d_render_state: 6, values: EffectStateValues::Enum(TEXTURE_FILTERING_VALUES) },
    EffectState { name: "MipMapLodBias", d3d_render_state: 7, values: EffectStateValues::Float },
    EffectState { name: "MinMipLevel", d3d_render_state: 8, values: EffectStateValues::Float },
    EffectState { name: "MaxMipLevel", d3d_render_state: 9, values: EffectStateValues::Float },
    EffectState { name: "MaxAnisotropy", d3d_render_state: 10, values: EffectStateValues::Float },
    EffectState { name: "ComparisonFunction", d3d_render_state: 11, values: EffectStateValues::Enum(COMPARISON_VALUES) },
];

fn find_sampler_state(name: &str) -> Option<&'static EffectState> {
    SAMPLER_STATES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

fn find_state_value(name: &str, values: &'static [EffectStateValue]) -> Option<&'static EffectStateValue> {
    values.iter().find(|v| v.name.eq_ignore_ascii_case(name))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

pub(crate) struct Parser<'a> {
    lexer: Lexer<'a>,
    module: Module,
    user_types: Vec<Handle<StructDecl>>,
    buffers: Vec<Handle<BufferDecl>>,
    functions: Vec<Handle<FunctionDecl>>,
    variables: Vec<ScopeEntry>,
    num_globals: usize,
    allow_undeclared: bool,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, file_name: &str) -> Self {
        Self {
            lexer: Lexer::new(source, file_name),
            module: Module::new(),
            user_types: Vec::new(),
            buffers: Vec::new(),
            functions: Vec::new(),
            variables: Vec::new(),
            num_globals: 0,
            allow_undeclared: false,
        }
    }

    /// Parses the whole translation unit.
    pub(crate) fn parse(mut self) -> Result<Module, ParseError> {
        let mut last: Option<Handle<Statement>> = None;
        while !self.accept(Token::EndOfStream) {
            match self.parse_top_level() {
                Ok(Some(statement)) => {
                    match last {
                        None => self.module.root = Some(statement),
                        Some(prev) => self.module.statements[prev].next = Some(statement),
                    }
                    last = Some(statement);
                }
                Ok(None) => {}
                Err(ParseFail) => return Err(self.into_error()),
            }
        }
        debug_assert_eq!(
            self.variables.len(),
            self.num_globals,
            "scope stack must be balanced after parsing"
        );
        Ok(self.module)
    }

    fn into_error(self) -> ParseError {
        match self.lexer.diagnostic() {
            Some(diag) => ParseError {
                file: diag.file.clone(),
                line: diag.line,
                message: diag.message.clone(),
            },
            None => ParseError {
                file: self.lexer.file().to_string(),
                line: self.lexer.line(),
                message: "parse error".to_string(),
            },
        }
    }

    // -- token helpers ------------------------------------------------------

    fn origin(&mut self) -> Origin {
        Origin {
            file: self.module.interner.intern(self.lexer.file()),
            line: self.lexer.line(),
        }
    }

    fn error(&mut self, message: String) -> ParseFail {
        self.lexer.report_error(message);
        ParseFail
    }

    fn accept(&mut self, token: Token) -> bool {
        if self.lexer.token() == token {
            self.lexer.next();
            return true;
        }
        false
    }

    fn expect(&mut self, token: Token) -> PResult<()> {
        if self.accept(token) {
            return Ok(());
        }
        let near = self.lexer.token_text();
        Err(self.error(format!(
            "Syntax error: expected '{}' near '{}'",
            token.describe(),
            near
        )))
    }

    /// Accepts a word that is only a keyword in specific contexts (like
    /// interpolation modifiers), without it being a token of its own.
    fn accept_word(&mut self, word: &str) -> bool {
        if self.lexer.token() == Token::Identifier && self.lexer.identifier() == word {
            self.lexer.next();
            return true;
        }
        false
    }

    fn accept_identifier(&mut self) -> Option<Name> {
        if self.lexer.token() == Token::Identifier {
            let name = self.module.interner.intern(self.lexer.identifier());
            self.lexer.next();
            return Some(name);
        }
        None
    }

    fn expect_identifier(&mut self) -> PResult<Name> {
        match self.accept_identifier() {
            Some(name) => Ok(name),
            None => {
                let near = self.lexer.token_text();
                Err(self.error(format!("Syntax error: expected identifier near '{near}'")))
            }
        }
    }

    fn accept_float(&mut self) -> Option<f32> {
        if self.lexer.token() == Token::FloatLiteral {
            let value = self.lexer.float_value();
            self.lexer.next();
            return Some(value);
        }
        None
    }

    fn accept_half(&mut self) -> Option<f32> {
        if self.lexer.token() == Token::HalfLiteral {
            let value = self.lexer.float_value();
            self.lexer.next();
            return Some(value);
        }
        None
    }

    fn accept_int(&mut self) -> Option<i32> {
        if self.lexer.token() == Token::IntLiteral {
            let value = self.lexer.int_value();
            self.lexer.next();
            return Some(value);
        }
        None
    }

    fn check_end_of_stream(&mut self, end: Token) -> PResult<()> {
        if self.accept(Token::EndOfStream) {
            return Err(self.error(format!(
                "Unexpected end of file while looking for '{}'",
                end.describe()
            )));
        }
        Ok(())
    }

    // -- scopes and registries ----------------------------------------------

    fn begin_scope(&mut self) {
        // A nameless entry is the sentinel for a new scope level.
        self.variables.push(ScopeEntry {
            name: None,
            ty: Type::default(),
        });
    }

    fn end_scope(&mut self) {
        while let Some(entry) = self.variables.pop() {
            if entry.name.is_none() {
                return;
            }
        }
        unreachable!("scope stack underflow");
    }

    fn declare_variable(&mut self, name: Name, ty: Type) {
        if self.variables.len() == self.num_globals {
            self.num_globals += 1;
        }
        self.variables.push(ScopeEntry {
            name: Some(name),
            ty,
        });
    }

    /// Looks a variable up from the innermost scope outwards. The second
    /// component is `true` when the entry is a global.
    fn find_variable(&self, name: Name) -> Option<(Type, bool)> {
        for (index, entry) in self.variables.iter().enumerate().rev() {
            if entry.name == Some(name) {
                return Some((entry.ty.clone(), index < self.num_globals));
            }
        }
        None
    }

    fn find_user_type(&self, name: Name) -> Option<Handle<StructDecl>> {
        self.user_types
            .iter()
            .copied()
            .find(|&s| self.module.structs[s].name == name)
    }

    fn find_buffer(&self, name: Name) -> Option<Handle<BufferDecl>> {
        self.buffers
            .iter()
            .copied()
            .find(|&b| self.module.buffers[b].name == Some(name))
    }

    fn is_function_name(&self, name: Name) -> bool {
        if self
            .functions
            .iter()
            .any(|&f| self.module.functions[f].name == name)
        {
            return true;
        }
        is_intrinsic(self.module.interner.get(name))
    }

    fn types_equal(&self, lhs: &Type, rhs: &Type) -> bool {
        cast_rank(&self.module, lhs, rhs) == 0
    }

    /// Finds a registered function with the same signature (name, return
    /// type, argument types/modifiers/semantics), for matching a forward
    /// declaration to its definition.
    fn find_function_signature(&self, candidate: Handle<FunctionDecl>) -> Option<Handle<FunctionDecl>> {
        let cand = &self.module.functions[candidate];
        'outer: for &f in &self.functions {
            let existing = &self.module.functions[f];
            if existing.name != cand.name
                || !self.types_equal(&existing.return_type, &cand.return_type)
            {
                continue;
            }
            let mut lhs = existing.arguments;
            let mut rhs = cand.arguments;
            loop {
                match (lhs, rhs) {
                    (None, None) => return Some(f),
                    (Some(a), Some(b)) => {
                        let a = &self.module.arguments[a];
                        let b = &self.module.arguments[b];
                        if !self.types_equal(&a.ty, &b.ty)
                            || a.modifier != b.modifier
                            || a.semantic != b.semantic
                        {
                            continue 'outer;
                        }
                        lhs = a.next;
                        rhs = b.next;
                    }
                    _ => continue 'outer,
                }
            }
        }
        None
    }

    // -- type parsing -------------------------------------------------------

    fn accept_type_modifier(&mut self, flags: &mut TypeFlags) -> bool {
        if self.accept(Token::Const) {
            *flags |= TypeFlags::CONST;
            return true;
        }
        if self.accept(Token::Static) {
            *flags |= TypeFlags::STATIC;
            return true;
        }
        // uniform and inline are accepted and ignored; in this language
        // every function is inline and every global is uniform.
        if self.accept(Token::Uniform) || self.accept(Token::Inline) {
            return true;
        }
        false
    }

    fn accept_interpolation_modifier(&mut self, flags: &mut TypeFlags) -> bool {
        if self.accept_word("linear") {
            *flags |= TypeFlags::LINEAR;
            return true;
        }
        if self.accept_word("centroid") {
            *flags |= TypeFlags::CENTROID;
            return true;
        }
        if self.accept_word("nointerpolation") {
            *flags |= TypeFlags::NO_INTERPOLATION;
            return true;
        }
        if self.accept_word("noperspective") {
            *flags |= TypeFlags::NO_PERSPECTIVE;
            return true;
        }
        if self.accept_word("sample") {
            *flags |= TypeFlags::SAMPLE;
            return true;
        }
        false
    }

    fn accept_type(&mut self, allow_void: bool) -> PResult<Option<Type>> {
        let mut flags = TypeFlags::EMPTY;
        loop {
            if !self.accept_type_modifier(&mut flags) && !self.accept_interpolation_modifier(&mut flags)
            {
                break;
            }
        }

        let token = self.lexer.token();
        if let Some(base) = token.base_type() {
            self.lexer.next();
            let mut ty = Type::new(base);
            ty.flags = flags;

            if ty.is_read_texture() {
                let mut has_sampler = false;
                if self.accept(Token::Symbol(b'<')) {
                    ty.sampler_type = self.lexer.token().base_type().unwrap_or(BaseType::Void);
                    self.lexer.next();
                    has_sampler = true;

                    if base.is_multisampled_texture() {
                        self.expect(Token::Symbol(b','))?;
                        if let Some(count) = self.accept_int() {
                            if !(1..=128).contains(&count) {
                                return Err(self.error(
                                    "Sample counts are only supported in the range [1-128]"
                                        .to_string(),
                                ));
                            }
                            ty.sample_count = count as u8;
                        }
                    }
                }
                if has_sampler {
                    self.expect(Token::Symbol(b'>'))?;
                }
            } else if ty.is_write_texture() {
                self.expect(Token::Symbol(b'<'))?;
                let Token::ImageFormat(format) = self.lexer.token() else {
                    let near = self.lexer.token_text();
                    return Err(
                        self.error(format!("Syntax error: expected image format near '{near}'"))
                    );
                };
                self.lexer.next();
                ty.format = Some(format);
                ty.sampler_type = format.sampler_type();
                self.expect(Token::Symbol(b'>'))?;
            }

            return Ok(Some(ty));
        }

        if allow_void && self.accept(Token::Void) {
            let mut ty = Type::new(BaseType::Void);
            ty.flags = flags;
            return Ok(Some(ty));
        }

        if token == Token::Identifier {
            let name = self.module.interner.intern(self.lexer.identifier());
            if self.find_user_type(name).is_some() {
                self.lexer.next();
                let mut ty = Type::new(BaseType::UserDefined);
                ty.name = Some(name);
                ty.flags = flags;
                return Ok(Some(ty));
            }
        }

        Ok(None)
    }

    fn expect_type(&mut self, allow_void: bool) -> PResult<Type> {
        match self.accept_type(allow_void)? {
            Some(ty) => Ok(ty),
            None => Err(self.error("Expected type".to_string())),
        }
    }

    /// Handles a declaration like `float2 name[5]`. `allow_unsized_array`
    /// permits leaving the bounds out (`name[]`).
    fn accept_declaration(&mut self, allow_unsized_array: bool) -> PResult<Option<(Type, Name)>> {
        let Some(mut ty) = self.accept_type(false)? else {
            return Ok(None);
        };
        let name = self.expect_identifier()?;

        if self.accept(Token::Symbol(b'[')) {
            ty.array = true;
            if self.accept(Token::Symbol(b']')) {
                if !allow_unsized_array {
                    return Err(self.error("Syntax error: expected array dimensions".to_string()));
                }
            } else {
                ty.array_size = Some(self.parse_expression()?);
                self.expect(Token::Symbol(b']'))?;
            }
        }
        Ok(Some((ty, name)))
    }

    fn expect_declaration(&mut self, allow_unsized_array: bool) -> PResult<(Type, Name)> {
        if let Some(decl) = self.accept_declaration(allow_unsized_array)? {
            return Ok(decl);
        }
        if self.accept_type(false)?.is_none() {
            return Err(self.error("Expected type".to_string()));
        }
        Err(self.error("Expected declaration".to_string()))
    }

    // -- top level ----------------------------------------------------------

    fn parse_top_level(&mut self) -> PResult<Option<Handle<Statement>>> {
        let attributes = self.parse_attribute_block()?;
        let origin = self.origin();

        let mut statement: Option<Handle<Statement>> = None;

        if self.accept(Token::Struct) {
            statement = Some(self.parse_struct_declaration(origin)?);
        } else if self.accept(Token::CBuffer) || self.accept(Token::TBuffer) {
            statement = Some(self.parse_buffer_declaration(origin)?);
        } else if let Some(ty) = self.accept_type(true)? {
            let name = self.expect_identifier()?;

            if self.accept(Token::Symbol(b'(')) {
                return self.parse_function_declaration(origin, ty, name, attributes);
            }
            statement = Some(self.parse_global_declaration(origin, ty, name)?);
        }

        if let Some(statement) = statement {
            self.module.statements[statement].attributes = attributes;
        }

        self.expect(Token::Symbol(b';'))?;
        Ok(statement)
    }

    fn parse_struct_declaration(&mut self, origin: Origin) -> PResult<Handle<Statement>> {
        let name = self.expect_identifier()?;
        if self.find_user_type(name).is_some() || self.find_buffer(name).is_some() {
            let text = self.module.interner.get(name).to_string();
            return Err(self.error(format!("struct {text} already defined")));
        }

        self.expect(Token::Symbol(b'{'))?;

        let structure = self.module.structs.append(StructDecl {
            name,
            fields: None,
            origin,
        });
        self.user_types.push(structure);

        let mut last_field: Option<Handle<StructField>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            self.check_end_of_stream(Token::Symbol(b'}'))?;
            let field = self.parse_field_declaration()?;
            match last_field {
                None => self.module.structs[structure].fields = Some(field),
                Some(prev) => self.module.fields[prev].next = Some(field),
            }
            last_field = Some(field);
        }

        Ok(self.add_statement(StatementKind::Struct(structure), origin))
    }

    fn parse_field_declaration(&mut self) -> PResult<Handle<StructField>> {
        let origin = self.origin();
        let (ty, name) = self.expect_declaration(false)?;
        let mut semantic = None;
        if self.accept(Token::Symbol(b':')) {
            semantic = Some(self.expect_identifier()?);
        }
        self.expect(Token::Symbol(b';'))?;
        Ok(self.module.fields.append(StructField {
            name,
            ty,
            semantic,
            sv_semantic: None,
            hidden: false,
            next: None,
            origin,
        }))
    }

    fn parse_buffer_declaration(&mut self, origin: Origin) -> PResult<Handle<Statement>> {
        let name = self.accept_identifier();
        if let Some(name) = name {
            if self.find_buffer(name).is_some() || self.find_user_type(name).is_some() {
                let text = self.module.interner.get(name).to_string();
                return Err(self.error(format!("buffer {text} already defined")));
            }
        }

        let buffer = self.module.buffers.append(BufferDecl {
            name,
            register_name: None,
            fields: None,
            origin,
        });

        // Optional register assignment.
        if self.accept(Token::Symbol(b':')) {
            self.expect(Token::Register)?;
            self.expect(Token::Symbol(b'('))?;
            let register = self.expect_identifier()?;
            self.expect(Token::Symbol(b')'))?;
            self.module.buffers[buffer].register_name = Some(register);
        }

        self.expect(Token::Symbol(b'{'))?;
        let mut last_field: Option<Handle<Declaration>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            self.check_end_of_stream(Token::Symbol(b'}'))?;
            let Some(field) = self.try_parse_declaration()? else {
                return Err(self.error("Expected variable declaration".to_string()));
            };

            // Chain every declarator of the field into the buffer's list.
            let mut cursor = Some(field);
            while let Some(h) = cursor {
                self.module.declarations[h].buffer = Some(buffer);
                match last_field {
                    None => self.module.buffers[buffer].fields = Some(h),
                    Some(prev) => self.module.declarations[prev].next = Some(h),
                }
                last_field = Some(h);
                cursor = self.module.declarations[h].next;
            }

            self.expect(Token::Symbol(b';'))?;
        }

        self.buffers.push(buffer);
        Ok(self.add_statement(StatementKind::Buffer(buffer), origin))
    }

    fn parse_function_declaration(
        &mut self,
        origin: Origin,
        return_type: Type,
        name: Name,
        attributes: Option<Handle<Attribute>>,
    ) -> PResult<Option<Handle<Statement>>> {
        let mut fn_return = Type::new(return_type.base);
        fn_return.name = return_type.name;

        let function = self.module.functions.append(FunctionDecl {
            name,
            return_type: fn_return,
            semantic: None,
            sv_semantic: None,
            arguments: None,
            num_arguments: 0,
            num_output_arguments: 0,
            body: None,
            defined: false,
            forward: None,
            origin,
        });

        self.begin_scope();

        let (arguments, num_arguments, num_output_arguments) = self.parse_argument_list()?;
        {
            let f = &mut self.module.functions[function];
            f.arguments = arguments;
            f.num_arguments = num_arguments;
            f.num_output_arguments = num_output_arguments;
        }

        let declaration = self.find_function_signature(function);

        // Return-value semantic.
        if self.accept(Token::Symbol(b':')) {
            let semantic = self.expect_identifier()?;
            self.module.functions[function].semantic = Some(semantic);
        }

        // Forward declaration.
        if self.accept(Token::Symbol(b';')) {
            let mut statement = None;
            if declaration.is_none() {
                self.functions.push(function);
                let handle = self.add_statement(StatementKind::Function(function), origin);
                self.module.statements[handle].attributes = attributes;
                statement = Some(handle);
            }
            self.end_scope();
            return Ok(statement);
        }

        if let Some(declaration) = declaration {
            let existing = &self.module.functions[declaration];
            if existing.forward.is_some() || existing.defined {
                return Err(self.error("Duplicate function definition".to_string()));
            }
            self.module.functions[declaration].forward = Some(function);
        } else {
            self.functions.push(function);
        }

        self.expect(Token::Symbol(b'{'))?;
        let return_type = self.module.functions[function].return_type.clone();
        let body = self.parse_block(&return_type)?;
        {
            let f = &mut self.module.functions[function];
            f.body = body;
            f.defined = true;
        }

        self.end_scope();

        // No semicolon after a function definition.
        let handle = self.add_statement(StatementKind::Function(function), origin);
        self.module.statements[handle].attributes = attributes;
        Ok(Some(handle))
    }

    fn parse_global_declaration(
        &mut self,
        origin: Origin,
        ty: Type,
        name: Name,
    ) -> PResult<Handle<Statement>> {
        let declaration = self.module.declarations.append(Declaration {
            name,
            ty,
            register_name: None,
            semantic: None,
            assignment: None,
            buffer: None,
            sampler_state: None,
            hidden: false,
            next: None,
            origin,
        });

        let base = self.module.declarations[declaration].ty.base;
        if base.is_read_texture() {
            if !self.accept(Token::Symbol(b':')) {
                return Err(self.error(
                    "Syntax error! Expected input register for texture declaration".to_string(),
                ));
            }
            self.expect(Token::Register)?;
            self.expect(Token::Symbol(b'('))?;
            let register = self.expect_identifier()?;
            self.expect(Token::Symbol(b')'))?;
            self.module.declarations[declaration].register_name = Some(register);
        } else if base.is_write_texture() {
            if !self.accept(Token::Symbol(b':')) {
                return Err(self.error(
                    "Syntax error! Expected input register for rw texture declaration".to_string(),
                ));
            }
            let register = self.expect_identifier()?;
            self.module.declarations[declaration].register_name = Some(register);
        } else if self.accept(Token::Symbol(b'[')) {
            // Array suffix; the bounds may be omitted.
            if !self.accept(Token::Symbol(b']')) {
                let size = self.parse_expression()?;
                self.module.declarations[declaration].ty.array_size = Some(size);
                self.expect(Token::Symbol(b']'))?;
            }
            self.module.declarations[declaration].ty.array = true;
        }

        let declared_ty = self.module.declarations[declaration].ty.clone();
        self.declare_variable(name, declared_ty);

        self.parse_declaration_assignment(declaration)?;

        if base.is_sampler() {
            self.parse_sampler_state(declaration)?;
        }

        Ok(self.add_statement(StatementKind::Declaration(declaration), origin))
    }

    // -- statements ---------------------------------------------------------

    fn add_statement(&mut self, kind: StatementKind, origin: Origin) -> Handle<Statement> {
        self.module.statements.append(Statement {
            kind,
            attributes: None,
            hidden: false,
            next: None,
            origin,
        })
    }

    fn parse_statement_or_block(
        &mut self,
        return_type: &Type,
        scoped: bool,
    ) -> PResult<Option<Handle<Statement>>> {
        if scoped {
            self.begin_scope();
        }
        let statement = if self.accept(Token::Symbol(b'{')) {
            self.parse_block(return_type)?
        } else {
            self.parse_statement(return_type)?
        };
        if scoped {
            self.end_scope();
        }
        Ok(statement)
    }

    fn parse_block(&mut self, return_type: &Type) -> PResult<Option<Handle<Statement>>> {
        let mut first: Option<Handle<Statement>> = None;
        let mut last: Option<Handle<Statement>> = None;
        while !self.accept(Token::Symbol(b'}')) {
            self.check_end_of_stream(Token::Symbol(b'}'))?;
            if let Some(statement) = self.parse_statement(return_type)? {
                match last {
                    None => first = Some(statement),
                    Some(prev) => self.module.statements[prev].next = Some(statement),
                }
                last = Some(statement);
            }
        }
        Ok(first)
    }

    fn parse_statement(&mut self, return_type: &Type) -> PResult<Option<Handle<Statement>>> {
        let origin = self.origin();

        // Empty statement.
        if self.accept(Token::Symbol(b';')) {
            return Ok(None);
        }

        // Attributes are supported on if and for statements only.
        let attributes = self.parse_attribute_block()?;

        if self.accept(Token::If) {
            self.expect(Token::Symbol(b'('))?;
            let condition = self.parse_expression()?;
            self.expect(Token::Symbol(b')'))?;
            let body = self.parse_statement_or_block(return_type, true)?;
            let else_body = if self.accept(Token::Else) {
                self.parse_statement_or_block(return_type, true)?
            } else {
                None
            };
            let statement = self.add_statement(
                StatementKind::If {
                    condition,
                    body,
                    else_body,
                },
                origin,
            );
            self.module.statements[statement].attributes = attributes;
            return Ok(Some(statement));
        }

        if self.accept(Token::For) {
            self.expect(Token::Symbol(b'('))?;
            self.begin_scope();
            let Some(initialization) = self.try_parse_declaration()? else {
                return Err(self.error("Expected declaration".to_string()));
            };
            self.expect(Token::Symbol(b';'))?;
            let condition = if self.lexer.token() != Token::Symbol(b';') {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(Token::Symbol(b';'))?;
            let increment = if self.lexer.token() != Token::Symbol(b')') {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(Token::Symbol(b')'))?;
            let body = self.parse_statement_or_block(return_type, true)?;
            self.end_scope();
            let statement = self.add_statement(
                StatementKind::For {
                    initialization,
                    condition,
                    increment,
                    body,
                },
                origin,
            );
            self.module.statements[statement].attributes = attributes;
            return Ok(Some(statement));
        }

        if self.accept(Token::Symbol(b'{')) {
            self.begin_scope();
            let body = self.parse_block(return_type)?;
            self.end_scope();
            return Ok(Some(self.add_statement(StatementKind::Block { body }, origin)));
        }

        if self.accept(Token::Discard) {
            let statement = self.add_statement(StatementKind::Discard, origin);
            self.expect(Token::Symbol(b';'))?;
            return Ok(Some(statement));
        }

        if self.accept(Token::Break) {
            let statement = self.add_statement(StatementKind::Break, origin);
            self.expect(Token::Symbol(b';'))?;
            return Ok(Some(statement));
        }

        if self.accept(Token::Continue) {
            let statement = self.add_statement(StatementKind::Continue, origin);
            self.expect(Token::Symbol(b';'))?;
            return Ok(Some(statement));
        }

        if self.accept(Token::Return) {
            let value = if self.accept(Token::Symbol(b';')) {
                None
            } else {
                let value = self.parse_expression()?;
                self.expect(Token::Symbol(b';'))?;
                Some(value)
            };
            return Ok(Some(self.add_statement(StatementKind::Return(value), origin)));
        }

        if let Some(declaration) = self.try_parse_declaration()? {
            self.expect(Token::Symbol(b';'))?;
            return Ok(Some(
                self.add_statement(StatementKind::Declaration(declaration), origin),
            ));
        }

        let expression = self.parse_expression()?;
        self.expect(Token::Symbol(b';'))?;
        Ok(Some(
            self.add_statement(StatementKind::Expression(expression), origin),
        ))
    }

    /// Parses a local declaration with comma-separated declarators. An
    /// array suffix mutates the shared base type, so it carries over to
    /// the following declarators.
    fn try_parse_declaration(&mut self) -> PResult<Option<Handle<Declaration>>> {
        let origin = self.origin();
        let Some(mut ty) = self.accept_type(false)? else {
            return Ok(None);
        };

        let mut first: Option<Handle<Declaration>> = None;
        let mut last: Option<Handle<Declaration>> = None;
        loop {
            let name = self.expect_identifier()?;

            if self.accept(Token::Symbol(b'[')) {
                ty.array = true;
                if !self.accept(Token::Symbol(b']')) {
                    ty.array_size = Some(self.parse_expression()?);
                    self.expect(Token::Symbol(b']'))?;
                }
            }

            let declaration = self.module.declarations.append(Declaration {
                name,
                ty: ty.clone(),
                register_name: None,
                semantic: None,
                assignment: None,
                buffer: None,
                sampler_state: None,
                hidden: false,
                next: None,
                origin,
            });

            self.declare_variable(name, ty.clone());
            self.parse_declaration_assignment(declaration)?;

            if first.is_none() {
                first = Some(declaration);
            }
            if let Some(prev) = last {
                self.module.declarations[prev].next = Some(declaration);
            }
            last = Some(declaration);

            if !self.accept(Token::Symbol(b',')) {
                break;
            }
        }

        Ok(first)
    }

    fn parse_declaration_assignment(&mut self, declaration: Handle<Declaration>) -> PResult<()> {
        if !self.accept(Token::Symbol(b'=')) {
            return Ok(());
        }
        if self.module.declarations[declaration].ty.array {
            // Array initializer list, trailing comma allowed.
            self.expect(Token::Symbol(b'{'))?;
            let (values, _) = self.parse_expression_list(Token::Symbol(b'}'), true)?;
            self.module.declarations[declaration].assignment = values;
        } else {
            let value = self.parse_expression()?;
            self.module.declarations[declaration].assignment = Some(value);
        }
        Ok(())
    }

    // -- expressions --------------------------------------------------------

    fn add_expression(&mut self, kind: ExpressionKind, ty: Type, origin: Origin) -> Handle<Expression> {
        self.module.expressions.append(Expression {
            kind,
            ty,
            origin,
            next: None,
        })
    }

    fn check_type_cast(&mut self, src: &Type, dst: &Type) -> PResult<()> {
        if cast_rank(&self.module, src, dst) == -1 {
            let src_name = self.module.type_name(src).to_string();
            let dst_name = self.module.type_name(dst).to_string();
            return Err(self.error(format!(
                "Cannot implicitly convert from '{src_name}' to '{dst_name}'"
            )));
        }
        Ok(())
    }

    fn parse_expression(&mut self) -> PResult<Handle<Expression>> {
        let expression = self.parse_binary_expression(0)?;

        if let Some(op) = self.accept_assign() {
            let value = self.parse_expression()?;
            let lhs_ty = self.module.expressions[expression].ty.clone();
            let rhs_ty = self.module.expressions[value].ty.clone();
            self.check_type_cast(&rhs_ty, &lhs_ty)?;

            let origin = self.module.expressions[expression].origin;
            // The result type should strictly be a reference, but the
            // value type is sufficient for how it is consumed.
            return Ok(self.add_expression(
                ExpressionKind::Binary {
                    op,
                    left: expression,
                    right: value,
                },
                lhs_ty,
                origin,
            ));
        }

        Ok(expression)
    }

    fn accept_assign(&mut self) -> Option<BinaryOp> {
        if self.accept(Token::Symbol(b'=')) {
            Some(BinaryOp::Assign)
        } else if self.accept(Token::PlusEqual) {
            Some(BinaryOp::AddAssign)
        } else if self.accept(Token::MinusEqual) {
            Some(BinaryOp::SubtractAssign)
        } else if self.accept(Token::TimesEqual) {
            Some(BinaryOp::MultiplyAssign)
        } else if self.accept(Token::DivideEqual) {
            Some(BinaryOp::DivideAssign)
        } else {
            None
        }
    }

    fn accept_binary_operator(&mut self, priority: i32) -> Option<BinaryOp> {
        let op = match self.lexer.token() {
            Token::AndAnd => BinaryOp::And,
            Token::BarBar => BinaryOp::Or,
            Token::Symbol(b'+') => BinaryOp::Add,
            Token::Symbol(b'-') => BinaryOp::Subtract,
            Token::Symbol(b'*') => BinaryOp::Multiply,
            Token::Symbol(b'/') => BinaryOp::Divide,
            Token::Symbol(b'<') => BinaryOp::Less,
            Token::Symbol(b'>') => BinaryOp::Greater,
            Token::LessEqual => BinaryOp::LessEqual,
            Token::GreaterEqual => BinaryOp::GreaterEqual,
            Token::EqualEqual => BinaryOp::Equal,
            Token::NotEqual => BinaryOp::NotEqual,
            Token::Symbol(b'&') => BinaryOp::BitAnd,
            Token::Symbol(b'|') => BinaryOp::BitOr,
            Token::Symbol(b'^') => BinaryOp::BitXor,
            _ => return None,
        };
        if op.priority() > priority {
            self.lexer.next();
            return Some(op);
        }
        None
    }

    fn accept_unary_operator(&mut self, pre: bool) -> Option<UnaryOp> {
        let op = match self.lexer.token() {
            Token::PlusPlus => {
                if pre {
                    UnaryOp::PreIncrement
                } else {
                    UnaryOp::PostIncrement
                }
            }
            Token::MinusMinus => {
                if pre {
                    UnaryOp::PreDecrement
                } else {
                    UnaryOp::PostDecrement
                }
            }
            Token::Symbol(b'-') if pre => UnaryOp::Negate,
            Token::Symbol(b'+') if pre => UnaryOp::Positive,
            Token::Symbol(b'!') if pre => UnaryOp::Not,
            Token::Symbol(b'~') if pre => UnaryOp::BitNot,
            _ => return None,
        };
        self.lexer.next();
        Some(op)
    }

    fn parse_binary_expression(&mut self, priority: i32) -> PResult<Handle<Expression>> {
        let origin = self.origin();

        let mut needs_end_paren = false;
        let mut expression = self.parse_terminal_expression(&mut needs_end_paren)?;

        // An open parenthesis resets the priority.
        let priority = if needs_end_paren { 0 } else { priority };

        loop {
            if let Some(op) = self.accept_binary_operator(priority) {
                let right = self.parse_binary_expression(op.priority())?;

                let lhs_ty = self.module.expressions[expression].ty.clone();
                let rhs_ty = self.module.expressions[right].ty.clone();
                let Some(result_ty) = binary_op_result_type(op, &lhs_ty, &rhs_ty) else {
                    let lhs_name = self.module.type_name(&lhs_ty).to_string();
                    let rhs_name = self.module.type_name(&rhs_ty).to_string();
                    return Err(self.error(format!(
                        "binary '{}' : no global operator found which takes types '{lhs_name}' and '{rhs_name}' (or there is no acceptable conversion)",
                        op.symbol()
                    )));
                };

                expression = self.add_expression(
                    ExpressionKind::Binary {
                        op,
                        left: expression,
                        right,
                    },
                    result_ty,
                    origin,
                );
            } else if CONDITIONAL_PRIORITY > priority && self.accept(Token::Symbol(b'?')) {
                let if_true = self.parse_binary_expression(CONDITIONAL_PRIORITY)?;
                self.expect(Token::Symbol(b':'))?;
                let if_false = self.parse_binary_expression(CONDITIONAL_PRIORITY)?;

                // Both branches must have compatible types.
                let true_ty = self.module.expressions[if_true].ty.clone();
                let false_ty = self.module.expressions[if_false].ty.clone();
                if cast_rank(&self.module, &true_ty, &false_ty) == -1 {
                    let src_name = self.module.type_name(&false_ty).to_string();
                    let dst_name = self.module.type_name(&true_ty).to_string();
                    return Err(self.error(format!(
                        "':' no possible conversion from '{src_name}' to '{dst_name}'"
                    )));
                }

                expression = self.add_expression(
                    ExpressionKind::Conditional {
                        condition: expression,
                        if_true,
                        if_false,
                    },
                    true_ty,
                    origin,
                );
            } else {
                break;
            }

            if needs_end_paren {
                self.expect(Token::Symbol(b')'))?;
                needs_end_paren = false;
            }
        }

        if needs_end_paren {
            self.expect(Token::Symbol(b')'))?;
        }
        Ok(expression)
    }

    fn parse_partial_constructor(&mut self, ty: Type, origin: Origin) -> PResult<Handle<Expression>> {
        let (args, _) = self.parse_expression_list(Token::Symbol(b')'), false)?;
        let mut expr_ty = ty.clone();
        expr_ty.flags = TypeFlags::CONST;
        Ok(self.add_expression(ExpressionKind::Constructor { ty, args }, expr_ty, origin))
    }

    fn parse_terminal_expression(&mut self, needs_end_paren: &mut bool) -> PResult<Handle<Expression>> {
        let origin = self.origin();

        *needs_end_paren = false;

        if let Some(op) = self.accept_unary_operator(true) {
            let operand = self.parse_terminal_expression(needs_end_paren)?;
            let operand_ty = self.module.expressions[operand].ty.clone();

            if op == UnaryOp::BitNot && !operand_ty.base.is_integer() {
                let type_name = self.module.type_name(&operand_ty).to_string();
                return Err(self.error(format!(
                    "unary '~' : no global operator found which takes type '{type_name}' (or there is no acceptable conversion)"
                )));
            }

            let result_ty = if op == UnaryOp::Not {
                let mut ty = Type::new(BaseType::Bool);
                ty.flags = operand_ty.flags & TypeFlags::CONST;
                ty
            } else {
                operand_ty
            };

            return Ok(self.add_expression(
                ExpressionKind::Unary { op, expr: operand },
                result_ty,
                origin,
            ));
        }

        let mut expression;

        if self.accept(Token::Symbol(b'(')) {
            if let Some(ty) = self.accept_type(false)? {
                // A constructor in parentheses, like `(float2(...))`.
                if self.accept(Token::Symbol(b'(')) {
                    *needs_end_paren = true;
                    return self.parse_partial_constructor(ty, origin);
                }
                // A cast; it applies to the whole expression that follows.
                self.expect(Token::Symbol(b')'))?;
                let value = self.parse_expression()?;
                return Ok(self.add_expression(ExpressionKind::Cast { expr: value }, ty, origin));
            }

            expression = self.parse_expression()?;
            self.expect(Token::Symbol(b')'))?;
        } else if let Some(value) = self.accept_float() {
            let mut ty = Type::new(BaseType::Float);
            ty.flags = TypeFlags::CONST;
            return Ok(self.add_expression(
                ExpressionKind::Literal(Literal::Float(value)),
                ty,
                origin,
            ));
        } else if let Some(value) = self.accept_half() {
            let mut ty = Type::new(BaseType::Half);
            ty.flags = TypeFlags::CONST;
            return Ok(self.add_expression(
                ExpressionKind::Literal(Literal::Half(value)),
                ty,
                origin,
            ));
        } else if let Some(value) = self.accept_int() {
            let mut ty = Type::new(BaseType::Int);
            ty.flags = TypeFlags::CONST;
            return Ok(self.add_expression(
                ExpressionKind::Literal(Literal::Int(value)),
                ty,
                origin,
            ));
        } else if self.accept(Token::True) {
            let mut ty = Type::new(BaseType::Bool);
            ty.flags = TypeFlags::CONST;
            return Ok(self.add_expression(
                ExpressionKind::Literal(Literal::Bool(true)),
                ty,
                origin,
            ));
        } else if self.accept(Token::False) {
            let mut ty = Type::new(BaseType::Bool);
            ty.flags = TypeFlags::CONST;
            return Ok(self.add_expression(
                ExpressionKind::Literal(Literal::Bool(false)),
                ty,
                origin,
            ));
        } else if let Some(ty) = self.accept_type(false)? {
            // Type constructor.
            self.expect(Token::Symbol(b'('))?;
            expression = self.parse_partial_constructor(ty, origin)?;
        } else {
            expression = self.parse_identifier_expression(origin)?;
        }

        // Postfix operators, applied in a loop until none matches.
        let mut done = false;
        while !done {
            done = true;

            while let Some(op) = self.accept_unary_operator(false) {
                let ty = self.module.expressions[expression].ty.clone();
                expression = self.add_expression(
                    ExpressionKind::Unary {
                        op,
                        expr: expression,
                    },
                    ty,
                    origin,
                );
                done = false;
            }

            // Member access and method calls.
            while self.accept(Token::Symbol(b'.')) {
                let field = self.expect_identifier()?;

                if self.accept(Token::Symbol(b'(')) {
                    let (args, num_args) =
                        self.parse_expression_list(Token::Symbol(b')'), false)?;
                    let object_ty = self.module.expressions[expression].ty.clone();
                    let arg_types = self.collect_argument_types(args);
                    let method = self.match_method_call(&object_ty, field, &arg_types)?;
                    expression = self.add_expression(
                        ExpressionKind::Method {
                            object: expression,
                            method,
                            args,
                            num_args,
                        },
                        method.return_type.clone(),
                        origin,
                    );
                } else {
                    let object_ty = self.module.expressions[expression].ty.clone();
                    let (member_ty, swizzle) = self.member_type(&object_ty, field)?;
                    expression = self.add_expression(
                        ExpressionKind::Member {
                            object: expression,
                            field,
                            swizzle,
                        },
                        member_ty,
                        origin,
                    );
                }
                done = false;
            }

            // Array access.
            while self.accept(Token::Symbol(b'[')) {
                let index = self.parse_expression()?;
                self.expect(Token::Symbol(b']'))?;
                let base_ty = self.module.expressions[expression].ty.clone();
                let element_ty = self.index_result_type(&base_ty)?;
                expression = self.add_expression(
                    ExpressionKind::Index {
                        base: expression,
                        index,
                    },
                    element_ty,
                    origin,
                );
                done = false;
            }

            // Function calls can only follow an identifier, not an
            // arbitrary expression.
            if self.accept(Token::Symbol(b'(')) {
                done = false;
                let (args, num_args) = self.parse_expression_list(Token::Symbol(b')'), false)?;

                let head = self.module.expressions[expression].kind.clone();
                let ExpressionKind::Identifier { name, .. } = head else {
                    return Err(self.error("Expected function identifier".to_string()));
                };

                let arg_types = self.collect_argument_types(args);
                let callee = self.match_function_call(name, &arg_types)?;
                let return_type = match callee {
                    Callee::User(f) => self.module.functions[f].return_type.clone(),
                    Callee::Intrinsic(i) => i.return_type.clone(),
                };
                expression = self.add_expression(
                    ExpressionKind::Call {
                        callee,
                        args,
                        num_args,
                    },
                    return_type,
                    origin,
                );
            }
        }

        Ok(expression)
    }

    fn parse_identifier_expression(&mut self, origin: Origin) -> PResult<Handle<Expression>> {
        let name = self.expect_identifier()?;

        let mut global = false;
        let mut ty = Type::new(BaseType::Unknown);
        let mut undeclared = false;

        if let Some((found, is_global)) = self.find_variable(name) {
            ty = found;
            global = is_global;
        } else if self.is_function_name(name) {
            // Functions are always global scope; the call postfix fills
            // in the type.
            global = true;
        } else if self.find_buffer(name).is_some() {
            global = true;
            ty = Type::new(BaseType::Buffer);
            ty.name = Some(name);
        } else {
            undeclared = true;
        }

        if undeclared {
            if self.allow_undeclared {
                let mut ty = Type::new(BaseType::Bool);
                ty.flags = TypeFlags::CONST;
                return Ok(self.add_expression(
                    ExpressionKind::Literal(Literal::Bool(false)),
                    ty,
                    origin,
                ));
            }
            let text = self.module.interner.get(name).to_string();
            return Err(self.error(format!("Undeclared identifier '{text}'")));
        }

        Ok(self.add_expression(ExpressionKind::Identifier { name, global }, ty, origin))
    }

    fn collect_argument_types(&self, args: Option<Handle<Expression>>) -> Vec<Type> {
        let mut types = Vec::new();
        let mut cursor = args;
        while let Some(h) = cursor {
            types.push(self.module.expressions[h].ty.clone());
            cursor = self.module.expressions[h].next;
        }
        types
    }

    fn parse_expression_list(
        &mut self,
        end: Token,
        allow_trailing_comma: bool,
    ) -> PResult<(Option<Handle<Expression>>, u32)> {
        let mut first: Option<Handle<Expression>> = None;
        let mut last: Option<Handle<Expression>> = None;
        let mut count = 0u32;

        while !self.accept(end) {
            self.check_end_of_stream(end)?;
            if count > 0 {
                self.expect(Token::Symbol(b','))?;
            }
            if allow_trailing_comma && self.accept(end) {
                break;
            }
            let expression = self.parse_expression()?;
            match last {
                None => first = Some(expression),
                Some(prev) => self.module.expressions[prev].next = Some(expression),
            }
            last = Some(expression);
            count += 1;
        }

        Ok((first, count))
    }

    fn parse_argument_list(
        &mut self,
    ) -> PResult<(Option<Handle<Argument>>, u32, u32)> {
        let origin = self.origin();

        let mut first: Option<Handle<Argument>> = None;
        let mut last: Option<Handle<Argument>> = None;
        let mut count = 0u32;
        let mut output_count = 0u32;

        while !self.accept(Token::Symbol(b')')) {
            self.check_end_of_stream(Token::Symbol(b')'))?;
            if count > 0 {
                self.expect(Token::Symbol(b','))?;
            }

            let modifier = if self.accept(Token::Uniform) {
                ArgumentModifier::Uniform
            } else if self.accept(Token::In) {
                ArgumentModifier::In
            } else if self.accept(Token::Out) {
                ArgumentModifier::Out
            } else if self.accept(Token::InOut) {
                ArgumentModifier::Inout
            } else if self.accept(Token::Const) {
                ArgumentModifier::Const
            } else {
                ArgumentModifier::None
            };

            let (ty, name) = self.expect_declaration(true)?;
            self.declare_variable(name, ty.clone());

            let mut semantic = None;
            if self.accept(Token::Symbol(b':')) {
                semantic = Some(self.expect_identifier()?);
            }

            let mut default_value = None;
            if self.accept(Token::Symbol(b'=')) {
                default_value = Some(self.parse_expression()?);
            }

            let argument = self.module.arguments.append(Argument {
                name,
                ty,
                modifier,
                semantic,
                sv_semantic: None,
                default_value,
                next: None,
                origin,
            });

            match last {
                None => first = Some(argument),
                Some(prev) => self.module.arguments[prev].next = Some(argument),
            }
            last = Some(argument);

            count += 1;
            if matches!(modifier, ArgumentModifier::Out | ArgumentModifier::Inout) {
                output_count += 1;
            }
        }

        Ok((first, count, output_count))
    }

    // -- overload resolution ------------------------------------------------

    fn match_function_call(&mut self, name: Name, arg_types: &[Type]) -> PResult<Callee> {
        let mut matched: Option<Candidate> = None;
        let mut name_matches = false;

        // User-defined functions with the given name.
        for &f in &self.functions {
            if self.module.functions[f].name != name {
                continue;
            }
            name_matches = true;
            let candidate = Candidate::User(f);
            if compare_candidates(&self.module, arg_types, candidate, matched)
                == CompareResult::FirstBetter
            {
                matched = Some(candidate);
            }
        }

        // Intrinsics with the given name.
        let name_text = self.module.interner.get(name).to_string();
        for intrinsic in INTRINSICS.iter() {
            if intrinsic.name != name_text {
                continue;
            }
            name_matches = true;
            let candidate = Candidate::Intrinsic(intrinsic);
            if compare_candidates(&self.module, arg_types, candidate, matched)
                == CompareResult::FirstBetter
            {
                matched = Some(candidate);
            }
        }

        match matched {
            Some(candidate) => Ok(candidate.callee()),
            None if name_matches => Err(self.error(format!(
                "'{name_text}' no overloaded function matched all of the arguments"
            ))),
            None => Err(self.error(format!("Undeclared identifier '{name_text}'"))),
        }
    }

    fn match_method_call(
        &mut self,
        object_ty: &Type,
        name: Name,
        arg_types: &[Type],
    ) -> PResult<&'static Intrinsic> {
        let name_text = self.module.interner.get(name).to_string();

        let mut matched: Option<&'static Intrinsic> = None;
        let mut name_matches = false;

        for method in METHODS.iter() {
            // Skip methods that aren't defined for this object type.
            if method.method_owner() != object_ty.base {
                continue;
            }
            if method.name != name_text {
                continue;
            }
            name_matches = true;

            // A method whose return family matches the texture's element
            // family wins outright.
            let has_return_match = object_ty.base.is_read_texture()
                && object_ty.sampler_type as usize + 3 == method.args[0].sampler_type as usize;

            let result = compare_candidates(
                &self.module,
                arg_types,
                Candidate::Intrinsic(method),
                matched.map(Candidate::Intrinsic),
            );
            if result == CompareResult::FirstBetter || has_return_match {
                matched = Some(method);
            }
        }

        match matched {
            Some(method) => Ok(method),
            None if name_matches => Err(self.error(format!(
                "'{name_text}' no overloaded function matched all of the arguments"
            ))),
            None => Err(self.error(format!("Undeclared identifier '{name_text}'"))),
        }
    }

    // -- member and index typing --------------------------------------------

    /// Resolves `object.field`: a struct or buffer member, a vector
    /// swizzle, or a matrix element sequence. The boolean marks swizzles
    /// (including matrix element accesses).
    fn member_type(&mut self, object_ty: &Type, field: Name) -> PResult<(Type, bool)> {
        let field_text = self.module.interner.get(field).to_string();

        if object_ty.base == BaseType::UserDefined {
            let Some(structure) = object_ty.name.and_then(|n| self.find_user_type(n)) else {
                return Err(self.member_error(&field_text));
            };
            let mut cursor = self.module.structs[structure].fields;
            while let Some(h) = cursor {
                let member = &self.module.fields[h];
                if member.name == field {
                    return Ok((member.ty.clone(), false));
                }
                cursor = member.next;
            }
            return Err(self.member_error(&field_text));
        }

        if object_ty.base == BaseType::Buffer {
            let Some(buffer) = object_ty.name.and_then(|n| self.find_buffer(n)) else {
                return Err(self.member_error(&field_text));
            };
            let mut cursor = self.module.buffers[buffer].fields;
            while let Some(h) = cursor {
                let member = &self.module.declarations[h];
                if member.name == field {
                    return Ok((member.ty.clone(), false));
                }
                cursor = member.next;
            }
            return Err(self.member_error(&field_text));
        }

        let desc = object_ty.base.description();
        if desc.numeric == NumericType::NaN {
            // No non-numeric type allows member access.
            return Err(self.member_error(&field_text));
        }

        let mut swizzle_length = 0usize;

        if desc.dimensions <= 1 {
            // A swizzle over the scalar/vector component sets.
            for c in field_text.chars() {
                if !matches!(c, 'x' | 'y' | 'z' | 'w' | 'r' | 'g' | 'b' | 'a') {
                    return Err(self.error(format!("Invalid swizzle '{field_text}'")));
                }
                swizzle_length += 1;
            }
        } else {
            // Matrix element access: a sequence of `_mRC` (zero-based) or
            // `_RC` (one-based) selectors.
            let bytes = field_text.as_bytes();
            let mut i = 0;
            while i < bytes.len() && bytes[i] == b'_' {
                i += 1;
                let mut base = 1i32;
                if bytes.get(i) == Some(&b'm') {
                    base = 0;
                    i += 1;
                }
                let (Some(&r), Some(&c)) = (bytes.get(i), bytes.get(i + 1)) else {
                    return Err(self.member_error(&field_text));
                };
                if !r.is_ascii_digit() || !c.is_ascii_digit() {
                    return Err(self.member_error(&field_text));
                }
                let row = (r - b'0') as i32 - base;
                let column = (c - b'0') as i32 - base;
                if row >= desc.height as i32 || column >= desc.components as i32 {
                    return Err(self.member_error(&field_text));
                }
                swizzle_length += 1;
                i += 2;
            }
            if i != bytes.len() || swizzle_length == 0 {
                return Err(self.member_error(&field_text));
            }
        }

        if swizzle_length > 4 {
            return Err(self.error(format!("Invalid swizzle '{field_text}'")));
        }

        let base = swizzled_type(desc.numeric, swizzle_length);
        Ok((Type::new(base), true))
    }

    fn member_error(&mut self, field: &str) -> ParseFail {
        self.error(format!("Couldn't access '{field}'"))
    }

    /// The element type of `base[index]`: arrays yield their element
    /// type, vectors their scalar, matrices their row vector.
    fn index_result_type(&mut self, base_ty: &Type) -> PResult<Type> {
        if base_ty.array {
            let mut element = base_ty.clone();
            element.array = false;
            element.array_size = None;
            return Ok(element);
        }

        use BaseType::*;
        let element = match base_ty.base {
            Float2 | Float3 | Float4 => Float,
            Float2x2 => Float2,
            Float3x3 => Float3,
            Float4x4 => Float4,
            Float4x3 => Float3,
            Float4x2 => Float2,
            Half2 | Half3 | Half4 => Half,
            Half2x2 => Half2,
            Half3x3 => Half3,
            Half4x4 => Half4,
            Half4x3 => Half3,
            Half4x2 => Half2,
            Int2 | Int3 | Int4 => Int,
            Uint2 | Uint3 | Uint4 => Uint,
            _ => {
                return Err(self.error(
                    "array, matrix, vector, or indexable object type expected in index expression"
                        .to_string(),
                ))
            }
        };
        Ok(Type::new(element))
    }

    // -- attributes ---------------------------------------------------------

    /// Parses zero or more `[attr, ...]` blocks into one attribute chain.
    fn parse_attribute_block(&mut self) -> PResult<Option<Handle<Attribute>>> {
        let mut first: Option<Handle<Attribute>> = None;
        let mut last: Option<Handle<Attribute>> = None;

        while self.accept(Token::Symbol(b'[')) {
            loop {
                let origin = self.origin();
                let identifier = self.expect_identifier()?;
                let text = self.module.interner.get(identifier).to_string();

                let kind = match text.as_str() {
                    "unroll" => AttributeKind::Unroll,
                    "flatten" => AttributeKind::Flatten,
                    "branch" => AttributeKind::Branch,
                    "nofastmath" => AttributeKind::NoFastMath,
                    "numthreads" => AttributeKind::NumThreads,
                    _ => AttributeKind::Unknown,
                };

                let mut args = None;
                let mut num_args = 0;
                if kind == AttributeKind::NumThreads {
                    self.expect(Token::Symbol(b'('))?;
                    let (list, count) = self.parse_expression_list(Token::Symbol(b')'), false)?;
                    args = list;
                    num_args = count;
                    if num_args != 3 {
                        return Err(self.error(
                            "Syntax Error! numThreads expects three integral expressions"
                                .to_string(),
                        ));
                    }
                }

                let attribute = self.module.attributes.append(Attribute {
                    kind,
                    args,
                    num_args,
                    next: None,
                    origin,
                });
                match last {
                    None => first = Some(attribute),
                    Some(prev) => self.module.attributes[prev].next = Some(attribute),
                }
                last = Some(attribute);

                if !self.accept(Token::Symbol(b',')) {
                    break;
                }
            }
            self.expect(Token::Symbol(b']'))?;
        }

        Ok(first)
    }

    // -- sampler states -----------------------------------------------------

    fn parse_sampler_state(&mut self, declaration: Handle<Declaration>) -> PResult<()> {
        let origin = self.origin();

        if self.accept(Token::Symbol(b'{')) {
            let sampler_state = self.module.sampler_states.append(SamplerStateDecl {
                assignments: None,
                num_assignments: 0,
                origin,
            });

            let mut last: Option<Handle<StateAssignment>> = None;
            while !self.accept(Token::Symbol(b'}')) {
                self.check_end_of_stream(Token::Symbol(b'}'))?;
                let assignment = self.parse_state_assignment()?;
                match last {
                    None => self.module.sampler_states[sampler_state].assignments = Some(assignment),
                    Some(prev) => self.module.state_assignments[prev].next = Some(assignment),
                }
                last = Some(assignment);
                self.module.sampler_states[sampler_state].num_assignments += 1;
            }

            self.module.declarations[declaration].sampler_state = Some(sampler_state);
        } else if self.accept(Token::Symbol(b':')) {
            self.expect(Token::Register)?;
            self.expect(Token::Symbol(b'('))?;
            let register = self.expect_identifier()?;
            self.expect(Token::Symbol(b')'))?;
            self.module.declarations[declaration].register_name = Some(register);
        }

        Ok(())
    }

    fn parse_state_assignment(&mut self) -> PResult<Handle<StateAssignment>> {
        let origin = self.origin();

        if self.lexer.token() != Token::Identifier {
            let near = self.lexer.token_text();
            return Err(self.error(format!("Syntax error: expected identifier near '{near}'")));
        }
        let Some(state) = find_sampler_state(self.lexer.identifier()) else {
            let near = self.lexer.identifier().to_string();
            return Err(self.error(format!("Syntax error: unexpected identifier '{near}'")));
        };
        self.lexer.next();

        self.expect(Token::Symbol(b'='))?;

        let value = match &state.values {
            EffectStateValues::Float => {
                let Some(value) = self.accept_float().or_else(|| self.accept_half()) else {
                    let near = self.lexer.token_text();
                    return Err(self.error(format!(
                        "Syntax error: expected float or half near '{near}'"
                    )));
                };
                StateValue::Float(value)
            }
            EffectStateValues::Color => {
                self.expect(Token::Float4)?;
                self.expect(Token::Symbol(b'('))?;
                let mut color = [0.0f32; 4];
                for (i, slot) in color.iter_mut().enumerate() {
                    if i > 0 {
                        self.expect(Token::Symbol(b','))?;
                    }
                    *slot = match self.accept_float().or_else(|| self.accept_half()) {
                        Some(v) => v,
                        None => match self.accept_int() {
                            Some(v) => v as f32,
                            None => {
                                let near = self.lexer.token_text();
                                return Err(self.error(format!(
                                    "Syntax error: expected float or half near '{near}'"
                                )));
                            }
                        },
                    };
                }
                self.expect(Token::Symbol(b')'))?;
                StateValue::Color(color)
            }
            EffectStateValues::Enum(values) => {
                if self.lexer.token() != Token::Identifier {
                    let near = self.lexer.token_text();
                    return Err(
                        self.error(format!("Syntax error: expected identifier near '{near}'"))
                    );
                }
                let Some(state_value) = find_state_value(self.lexer.identifier(), *values) else {
                    let near = self.lexer.identifier().to_string();
                    return Err(self.error(format!(
                        "Syntax error: unexpected value '{near}' for state '{}'",
                        state.name
                    )));
                };
                self.lexer.next();
                StateValue::Enum {
                    name: state_value.name,
                    value: state_value.value,
                }
            }
        };

        self.expect(Token::Symbol(b';'))?;

        Ok(self.module.state_assignments.append(StateAssignment {
            state_name: state.name,
            d3d_render_state: state.d3d_render_state,
            value,
            next: None,
            origin,
        }))
    }
}

/// The vector type produced by a swizzle of the given length over the
/// given family.
fn swizzled_type(numeric: NumericType, length: usize) -> BaseType {
    use BaseType::*;
    const FLOAT: [BaseType; 4] = [Float, Float2, Float3, Float4];
    const HALF: [BaseType; 4] = [Half, Half2, Half3, Half4];
    const BOOL: [BaseType; 4] = [Bool, Bool2, Bool3, Bool4];
    const INT: [BaseType; 4] = [Int, Int2, Int3, Int4];
    const UINT: [BaseType; 4] = [Uint, Uint2, Uint3, Uint4];

    match numeric {
        NumericType::Float => FLOAT[length - 1],
        NumericType::Half => HALF[length - 1],
        NumericType::Bool => BOOL[length - 1],
        NumericType::Int => INT[length - 1],
        NumericType::Uint => UINT[length - 1],
        NumericType::NaN => Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn parse_ok(source: &str) -> Module {
        match parse(source, "test.sl") {
            Ok(module) => module,
            Err(err) => panic!("expected parse to succeed, got: {err}"),
        }
    }

    fn parse_err(source: &str) -> ParseError {
        match parse(source, "test.sl") {
            Ok(_) => panic!("expected parse to fail"),
            Err(err) => err,
        }
    }

    /// Walks every expression checking the expression-type invariant.
    /// Identifier nodes that were the syntactic head of a call are left
    /// untyped by the grammar (the call node carries the type instead).
    fn assert_all_expressions_typed(module: &Module) {
        for (_, expr) in module.expressions.iter() {
            if matches!(expr.kind, ExpressionKind::Identifier { .. })
                && expr.ty.base == BaseType::Unknown
            {
                continue;
            }
            assert_ne!(
                expr.ty.base,
                BaseType::Unknown,
                "untyped expression: {:?}",
                expr.kind
            );
        }
    }

    #[test]
    fn struct_with_swizzle_types_as_float3() {
        let module = parse_ok(
            "struct V { float4 pos; };\n\
             float3 f(V v) { return v.pos.xyz; }\n",
        );
        assert_all_expressions_typed(&module);

        let swizzle = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Member { swizzle: true, .. } => Some(e),
                _ => None,
            })
            .expect("swizzle expression");
        assert_eq!(swizzle.ty.base, BaseType::Float3);
    }

    #[test]
    fn overload_prefers_exact_int() {
        let module = parse_ok(
            "float f(float x) { return x; }\n\
             int f(int x) { return x; }\n\
             void main() { f(1); }\n",
        );
        let call = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Call { callee: Callee::User(f), .. } => Some(*f),
                _ => None,
            })
            .expect("call expression");
        assert_eq!(module.functions[call].return_type.base, BaseType::Int);
    }

    #[test]
    fn overload_prefers_exact_float() {
        let module = parse_ok(
            "float f(float x) { return x; }\n\
             int f(int x) { return x; }\n\
             void main() { f(1.0); }\n",
        );
        let call = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Call { callee: Callee::User(f), .. } => Some(*f),
                _ => None,
            })
            .expect("call expression");
        assert_eq!(module.functions[call].return_type.base, BaseType::Float);
    }

    #[test]
    fn bitwise_on_float_is_rejected() {
        let err = parse_err("void main() { float x; x = x & 1; }");
        assert!(err.message.contains("binary '&'"));
        assert!(err.message.contains("no global operator"));
    }

    #[test]
    fn swizzle_length_bound() {
        let err = parse_err("void main() { float4 v; v.xyzwx; }");
        assert!(err.message.contains("Invalid swizzle"));
    }

    #[test]
    fn swizzle_rejects_bad_characters() {
        let err = parse_err("void main() { float4 v; v.xq; }");
        assert!(err.message.contains("Invalid swizzle"));
    }

    #[test]
    fn numthreads_requires_three_arguments() {
        let err = parse_err("[numthreads(8,8)] void cs() {}");
        assert!(err.message.contains("numThreads expects three integral expressions"));
    }

    #[test]
    fn numthreads_with_three_arguments_parses() {
        let module = parse_ok("[numthreads(8,8,1)] void cs() {}");
        let attr = module
            .attributes
            .iter()
            .map(|(_, a)| a)
            .find(|a| a.kind == AttributeKind::NumThreads)
            .expect("numthreads attribute");
        assert_eq!(attr.num_args, 3);
    }

    #[test]
    fn forward_declaration_links_to_definition() {
        let module = parse_ok("void f(int x);\nvoid f(int x) {}\nvoid main() { f(1); }");
        let forwards: Vec<_> = module
            .functions
            .iter()
            .filter(|(_, f)| f.forward.is_some())
            .collect();
        assert_eq!(forwards.len(), 1);
        let (_, decl) = forwards[0];
        let definition = &module.functions[decl.forward.unwrap()];
        assert!(definition.defined);
        assert!(!decl.defined);
    }

    #[test]
    fn duplicate_definition_is_rejected() {
        let err = parse_err("void f(int x) {}\nvoid f(int x) {}");
        assert_eq!(err.message, "Duplicate function definition");
    }

    #[test]
    fn duplicate_struct_is_rejected() {
        let err = parse_err("struct S { float x; };\nstruct S { float y; };");
        assert!(err.message.contains("already defined"));
    }

    #[test]
    fn undeclared_identifier_is_rejected() {
        let err = parse_err("void main() { x = 1.0; }");
        assert!(err.message.contains("Undeclared identifier 'x'"));
    }

    #[test]
    fn implicit_conversion_failure_is_reported() {
        let err = parse_err(
            "struct S { float x; };\n\
             void main() { S s; float f; f = s; }",
        );
        assert!(err.message.contains("Cannot implicitly convert"));
    }

    #[test]
    fn intrinsic_overloads_pick_exact_width() {
        let module = parse_ok("float3 f(float3 v) { return normalize(v); }");
        let call = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Call { callee: Callee::Intrinsic(i), .. } => Some(*i),
                _ => None,
            })
            .expect("intrinsic call");
        assert_eq!(call.name, "normalize");
        assert_eq!(call.return_type.base, BaseType::Float3);
    }

    #[test]
    fn dot_returns_scalar_of_family() {
        let module = parse_ok("float f(float3 a, float3 b) { return dot(a, b); }");
        let call = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Call { callee: Callee::Intrinsic(i), .. } => Some(*i),
                _ => None,
            })
            .expect("intrinsic call");
        assert_eq!(call.return_type.base, BaseType::Float);
    }

    #[test]
    fn mul_matrix_vector_form() {
        let module = parse_ok(
            "float4x4 m;\n\
             float4 f(float4 v) { return mul(v, m); }",
        );
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn texture_sample_method() {
        let module = parse_ok(
            "Texture2D tex : register(t0);\n\
             SamplerState samp : register(s0);\n\
             float4 main(float2 uv) { return tex.Sample(samp, uv); }",
        );
        let method = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Method { method, .. } => Some(*method),
                _ => None,
            })
            .expect("method call");
        assert_eq!(method.name, "Sample");
        // Element family defaults to float, so the float4 row wins.
        assert_eq!(method.return_type.base, BaseType::Float4);
    }

    #[test]
    fn typed_texture_sample_picks_family_row() {
        let module = parse_ok(
            "Texture2D<int> tex : register(t0);\n\
             SamplerState samp : register(s0);\n\
             int4 main(float2 uv) { return tex.Sample(samp, uv); }",
        );
        let method = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Method { method, .. } => Some(*method),
                _ => None,
            })
            .expect("method call");
        assert_eq!(method.return_type.base, BaseType::Int4);
    }

    #[test]
    fn method_on_wrong_object_is_rejected() {
        let err = parse_err("void main() { float4 v; v.Sample(v, v); }");
        assert!(err.message.contains("Undeclared identifier 'Sample'"));
    }

    #[test]
    fn matrix_element_access() {
        let module = parse_ok("float f(float4x4 m) { return m._m00; }");
        assert_all_expressions_typed(&module);

        let module = parse_ok("float2 f(float4x4 m) { return m._11_22; }");
        let member = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Member { swizzle: true, .. } => Some(e),
                _ => None,
            })
            .expect("matrix access");
        assert_eq!(member.ty.base, BaseType::Float2);
    }

    #[test]
    fn matrix_element_out_of_bounds() {
        let err = parse_err("float f(float4x2 m) { return m._m30; }");
        assert!(err.message.contains("Couldn't access"));
    }

    #[test]
    fn array_access_types() {
        let module = parse_ok(
            "float f(float4 v, float4x3 m, float arr[4]) {\n\
             return v[0] + m[1].x + arr[2];\n\
             }",
        );
        let index_types: Vec<_> = module
            .expressions
            .iter()
            .filter_map(|(_, e)| match &e.kind {
                ExpressionKind::Index { .. } => Some(e.ty.base),
                _ => None,
            })
            .collect();
        assert!(index_types.contains(&BaseType::Float));
        assert!(index_types.contains(&BaseType::Float3));
    }

    #[test]
    fn indexing_a_scalar_is_rejected() {
        let err = parse_err("void main() { float x; x[0]; }");
        assert!(err.message.contains("index expression"));
    }

    #[test]
    fn conditional_requires_compatible_branches() {
        let err = parse_err(
            "struct S { float x; };\n\
             void main() { S s; float f; bool b; b ? f : s; }",
        );
        assert!(err.message.contains("no possible conversion"));
    }

    #[test]
    fn conditional_types_as_true_branch() {
        let module = parse_ok("float f(bool b) { return b ? 1.0 : 0; }");
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn cbuffer_members_are_global_variables() {
        let module = parse_ok(
            "cbuffer Globals { float4x4 worldViewProj; };\n\
             float4 main(float4 p) { return mul(p, worldViewProj); }",
        );
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn buffer_member_access() {
        let module = parse_ok(
            "cbuffer Globals { float scale; };\n\
             float main(float x) { return x * Globals.scale; }",
        );
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn duplicate_buffer_name_is_rejected() {
        let err = parse_err("cbuffer B { float x; };\ncbuffer B { float y; };");
        assert!(err.message.contains("already defined"));
    }

    #[test]
    fn scope_shadowing_resolves_innermost() {
        let module = parse_ok(
            "float x;\n\
             float f() { float x; { int x; } return x; }",
        );
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn out_of_scope_variable_is_rejected() {
        let err = parse_err("void f() { { float y; } y = 1.0; }");
        assert!(err.message.contains("Undeclared identifier 'y'"));
    }

    #[test]
    fn for_loop_scopes_its_variable() {
        let err = parse_err(
            "void f() { for (int i = 0; i < 4; ++i) { } i = 1; }",
        );
        assert!(err.message.contains("Undeclared identifier 'i'"));
    }

    #[test]
    fn for_loop_parses_with_empty_condition() {
        let module = parse_ok("void f() { for (int i = 0;;) { break; } }");
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn default_arguments_permit_shorter_calls() {
        let module = parse_ok(
            "float f(float a, float b = 2.0) { return a + b; }\n\
             float main() { return f(1.0); }",
        );
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn sampler_state_block() {
        let module = parse_ok(
            "SamplerState samp {\n\
                 AddressU = Wrap;\n\
                 MinFilter = Linear;\n\
                 MipMapLodBias = 0.5;\n\
                 BorderColor = float4(0, 0, 0, 1);\n\
             };",
        );
        let (_, state) = module.sampler_states.iter().next().expect("sampler state");
        assert_eq!(state.num_assignments, 4);
    }

    #[test]
    fn unknown_sampler_state_is_rejected() {
        let err = parse_err("SamplerState samp { Nonsense = 1.0; };");
        assert!(err.message.contains("unexpected identifier"));
    }

    #[test]
    fn unknown_sampler_state_value_is_rejected() {
        let err = parse_err("SamplerState samp { AddressU = Sideways; };");
        assert!(err.message.contains("unexpected value"));
    }

    #[test]
    fn write_texture_requires_format() {
        let module = parse_ok("RWTexture2D<RG32F> img : u0;");
        let (_, decl) = module.declarations.iter().next().unwrap();
        assert_eq!(decl.ty.sampler_type, BaseType::Float2);
    }

    #[test]
    fn read_texture_requires_register() {
        let err = parse_err("Texture2D tex;");
        assert!(err.message.contains("Expected input register"));
    }

    #[test]
    fn multisampled_texture_sample_count_bounds() {
        let err = parse_err("Texture2DMS<float4, 256> tex : register(t0);");
        assert!(err.message.contains("[1-128]"));
    }

    #[test]
    fn function_call_needs_identifier_head() {
        let err = parse_err("void main() { float4 v; (v.x)(1); }");
        assert!(err.message.contains("Expected function identifier"));
    }

    #[test]
    fn comma_declarations_share_array_suffix() {
        let module = parse_ok("void f() { float a[2], b; }");
        let arrays: Vec<_> = module
            .declarations
            .iter()
            .map(|(_, d)| d.ty.array)
            .collect();
        // The array suffix mutates the shared base type.
        assert_eq!(arrays, vec![true, true]);
    }

    #[test]
    fn cast_applies_to_rest_of_expression() {
        let module = parse_ok("float f(int i) { return (float)i + 1.0; }");
        let cast = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Cast { .. } => Some(e),
                _ => None,
            })
            .expect("cast expression");
        assert_eq!(cast.ty.base, BaseType::Float);
    }

    #[test]
    fn unary_bitnot_requires_integer() {
        let err = parse_err("void main() { float x; ~x; }");
        assert!(err.message.contains("unary '~'"));
        let module = parse_ok("int f(int x) { return ~x; }");
        assert_all_expressions_typed(&module);
    }

    #[test]
    fn logical_not_yields_bool() {
        let module = parse_ok("bool f(float x) { return !x; }");
        let unary = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Unary { op: UnaryOp::Not, .. } => Some(e),
                _ => None,
            })
            .expect("not expression");
        assert_eq!(unary.ty.base, BaseType::Bool);
    }

    #[test]
    fn comparison_width_follows_operands() {
        let module = parse_ok("bool3 f(float3 a, float3 b) { return a < b; }");
        let cmp = module
            .expressions
            .iter()
            .find_map(|(_, e)| match &e.kind {
                ExpressionKind::Binary { op: BinaryOp::Less, .. } => Some(e),
                _ => None,
            })
            .expect("comparison");
        assert_eq!(cmp.ty.base, BaseType::Bool3);
    }

    #[test]
    fn line_directives_attribute_origins() {
        let module = parse_ok("#line 40 \"included.sl\"\nfloat x;\n");
        let (_, decl) = module.declarations.iter().next().unwrap();
        assert_eq!(module.interner.get(decl.origin.file), "included.sl");
        assert_eq!(decl.origin.line, 40);
    }

    #[test]
    fn stray_semicolons_are_allowed() {
        parse_ok(";;float x;;");
    }
}
