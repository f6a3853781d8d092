//! HLSL emitter.
//!
//! Walks a typed module and prints HLSL source. The modern mode
//! translates legacy semantics to system-value semantics, splits sampled
//! textures into a `Texture*`/`SamplerState` pair, and wraps cbuffer
//! fields in a generated struct; the legacy mode passes declarations
//! through untouched.

use slx_ast::{
    ArgumentModifier, AttributeKind, BaseType, Callee, Declaration, Expression, ExpressionKind,
    Handle, Intrinsic, Literal, Module, Name, Statement, StatementKind, StructField, Type,
    TypeFlags,
};
use slx_backend_core::{Backend, BackendError, CodeWriter, EmitOptions, ShaderStage};

/// Register class an annotation binds to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegisterClass {
    ConstantBuffer,
    ShaderResource,
    Sampler,
    UnorderedAccess,
}

/// The HLSL backend. `legacy` selects the shader-model-3 style output
/// without semantic translation or texture/sampler splitting.
#[derive(Debug, Default)]
pub struct HlslBackend {
    legacy: bool,
    /// Register names mapped to constant-buffer slots by position.
    pub constant_buffer_slots: Vec<String>,
    /// Register names mapped to texture/sampler slots by position.
    pub texture_slots: Vec<String>,
}

impl HlslBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn legacy() -> Self {
        Self {
            legacy: true,
            ..Self::default()
        }
    }
}

impl Backend for HlslBackend {
    fn name(&self) -> &str {
        if self.legacy {
            "Legacy HLSL"
        } else {
            "HLSL"
        }
    }

    fn targets(&self) -> &[&str] {
        if self.legacy {
            &["legacyhlsl"]
        } else {
            &["hlsl"]
        }
    }

    fn emit(&self, module: &mut Module, options: &EmitOptions) -> Result<String, BackendError> {
        let mut emitter = Emitter {
            module,
            writer: CodeWriter::new(),
            legacy: self.legacy,
            stage: options.stage,
            entry_point: options.entry_point.clone(),
            constant_buffer_slots: &self.constant_buffer_slots,
            texture_slots: &self.texture_slots,
            inside_buffer: false,
        };
        emitter.run(options.header.as_deref())
    }
}

const TEXTURE_POSTFIX: &str = "_texture";
const SAMPLER_POSTFIX: &str = "_sampler";

/// Maps a source semantic to its system-value form for the stage.
fn translate_semantic(semantic: &str, output: bool, stage: ShaderStage) -> Option<&'static str> {
    match stage {
        ShaderStage::Vertex => {
            if output {
                if semantic == "POSITION" {
                    return Some("SV_Position");
                }
            } else if semantic == "INSTANCE_ID" {
                return Some("SV_InstanceID");
            }
            None
        }
        ShaderStage::Fragment => {
            if output {
                match semantic {
                    "DEPTH" => Some("SV_Depth"),
                    "COLOR" => Some("SV_Target"),
                    "COLOR0" => Some("SV_Target0"),
                    "COLOR0_1" | "COLOR1" => Some("SV_Target1"),
                    "COLOR2" => Some("SV_Target2"),
                    "COLOR3" => Some("SV_Target3"),
                    _ => None,
                }
            } else {
                match semantic {
                    "VPOS" => Some("SV_Position"),
                    "VFACE" => Some("SV_IsFrontFace"),
                    _ => None,
                }
            }
        }
        ShaderStage::Compute => None,
    }
}

fn format_float(value: f32) -> String {
    format!("{value:?}")
}

struct Emitter<'a> {
    module: &'a mut Module,
    writer: CodeWriter,
    legacy: bool,
    stage: ShaderStage,
    entry_point: String,
    constant_buffer_slots: &'a [String],
    texture_slots: &'a [String],
    inside_buffer: bool,
}

impl Emitter<'_> {
    fn run(&mut self, header: Option<&str>) -> Result<String, BackendError> {
        if !self.legacy {
            self.translate_entry_semantics()?;
        }

        if let Some(header) = header {
            self.writer.write_line(0, header);
        }

        self.output_statements(0, self.module.root);
        Ok(std::mem::take(&mut self.writer).finish())
    }

    fn name(&self, name: Name) -> &str {
        self.module.interner.get(name)
    }

    fn type_name(&self, ty: &Type) -> String {
        self.module.type_name(ty).to_string()
    }

    // -- semantic translation -----------------------------------------------

    fn intern_semantic(&mut self, semantic: &'static str) -> Name {
        self.module.interner.intern(semantic)
    }

    fn translate_entry_semantics(&mut self) -> Result<(), BackendError> {
        let Some(function) = self.module.find_function(&self.entry_point) else {
            return Err(BackendError::UnknownEntryPoint(self.entry_point.clone()));
        };

        // Return-value semantic.
        if let Some(semantic) = self.module.functions[function].semantic {
            let text = self.name(semantic).to_string();
            if let Some(sv) = translate_semantic(&text, true, self.stage) {
                let sv = self.intern_semantic(sv);
                self.module.functions[function].sv_semantic = Some(sv);
            }
        }

        // Fields of the returned struct; SV-annotated fields move to the
        // end of the struct to avoid linkage problems.
        let return_type = self.module.functions[function].return_type.clone();
        if return_type.base == BaseType::UserDefined {
            if let Some(name) = return_type.name {
                let name = self.name(name).to_string();
                if let Some(structure) = self.module.find_struct(&name) {
                    self.translate_struct_fields(structure, true, false);

                    let mut plain = Vec::new();
                    let mut sv = Vec::new();
                    let mut cursor = self.module.structs[structure].fields;
                    while let Some(h) = cursor {
                        if self.module.fields[h].sv_semantic.is_some() {
                            sv.push(h);
                        } else {
                            plain.push(h);
                        }
                        cursor = self.module.fields[h].next;
                    }
                    self.relink_fields(structure, plain.into_iter().chain(sv));
                }
            }
        }

        // Argument semantics, and fields of struct-typed arguments.
        let mut cursor = self.module.functions[function].arguments;
        while let Some(argument) = cursor {
            let output = self.module.arguments[argument].modifier == ArgumentModifier::Out;
            if let Some(semantic) = self.module.arguments[argument].semantic {
                let text = self.name(semantic).to_string();
                if let Some(sv) = translate_semantic(&text, output, self.stage) {
                    let sv = self.intern_semantic(sv);
                    self.module.arguments[argument].sv_semantic = Some(sv);
                }
            }

            let arg_ty = self.module.arguments[argument].ty.clone();
            if arg_ty.base == BaseType::UserDefined {
                if let Some(name) = arg_ty.name {
                    let name = self.name(name).to_string();
                    if let Some(structure) = self.module.find_struct(&name) {
                        self.translate_struct_fields(structure, output, true);
                    }
                }
            }

            cursor = self.module.arguments[argument].next;
        }

        Ok(())
    }

    fn translate_struct_fields(
        &mut self,
        structure: Handle<slx_ast::StructDecl>,
        output: bool,
        hide_pixel_position: bool,
    ) {
        let mut cursor = self.module.structs[structure].fields;
        while let Some(h) = cursor {
            if let Some(semantic) = self.module.fields[h].semantic {
                let text = self.name(semantic).to_string();
                self.module.fields[h].hidden = false;

                // The rasterizer position is not readable as a plain
                // pixel input.
                if hide_pixel_position
                    && self.stage == ShaderStage::Fragment
                    && !output
                    && text.eq_ignore_ascii_case("POSITION")
                {
                    self.module.fields[h].hidden = true;
                }

                if let Some(sv) = translate_semantic(&text, output, self.stage) {
                    let sv = self.intern_semantic(sv);
                    self.module.fields[h].sv_semantic = Some(sv);
                }
            }
            cursor = self.module.fields[h].next;
        }
    }

    fn relink_fields(
        &mut self,
        structure: Handle<slx_ast::StructDecl>,
        order: impl Iterator<Item = Handle<StructField>>,
    ) {
        let handles: Vec<_> = order.collect();
        self.module.structs[structure].fields = handles.first().copied();
        for pair in handles.windows(2) {
            self.module.fields[pair[0]].next = Some(pair[1]);
        }
        if let Some(&tail) = handles.last() {
            self.module.fields[tail].next = None;
        }
    }

    // -- statements ---------------------------------------------------------

    fn output_statements(&mut self, indent: usize, first: Option<Handle<Statement>>) {
        let mut cursor = first;
        while let Some(statement) = cursor {
            cursor = self.module.statements[statement].next;
            if self.module.statements[statement].hidden {
                continue;
            }

            self.output_attributes(indent, self.module.statements[statement].attributes);

            match self.module.statements[statement].kind.clone() {
                StatementKind::Declaration(declaration) => {
                    self.writer.begin_line(indent);
                    self.output_declaration_chain(declaration);
                    self.writer.end_line_with(";");
                }
                StatementKind::Struct(structure) => {
                    let name = self.name(self.module.structs[structure].name).to_string();
                    self.writer.write_line(indent, &format!("struct {name} {{"));
                    let mut field = self.module.structs[structure].fields;
                    while let Some(h) = field {
                        field = self.module.fields[h].next;
                        if self.module.fields[h].hidden {
                            continue;
                        }
                        let f = self.module.fields[h].clone();
                        self.writer.begin_line(indent + 1);
                        let semantic = f.sv_semantic.or(f.semantic);
                        self.output_declaration(&f.ty, f.name, semantic, None, None);
                        self.writer.end_line_with(";");
                    }
                    self.writer.write_line(indent, "};");
                }
                StatementKind::Buffer(buffer) => {
                    self.output_buffer(indent, buffer);
                }
                StatementKind::Function(function) => {
                    self.output_function(indent, function);
                }
                StatementKind::Expression(expression) => {
                    self.writer.begin_line(indent);
                    self.output_expression(expression);
                    self.writer.end_line_with(";");
                }
                StatementKind::Return(value) => match value {
                    Some(value) => {
                        self.writer.begin_line(indent);
                        self.writer.write("return ");
                        self.output_expression(value);
                        self.writer.end_line_with(";");
                    }
                    None => self.writer.write_line(indent, "return;"),
                },
                StatementKind::Discard => self.writer.write_line(indent, "discard;"),
                StatementKind::Break => self.writer.write_line(indent, "break;"),
                StatementKind::Continue => self.writer.write_line(indent, "continue;"),
                StatementKind::If {
                    condition,
                    body,
                    else_body,
                } => {
                    self.writer.begin_line(indent);
                    self.writer.write("if (");
                    self.output_expression(condition);
                    self.writer.end_line_with(") {");
                    self.output_statements(indent + 1, body);
                    self.writer.write_line(indent, "}");
                    if else_body.is_some() {
                        self.writer.write_line(indent, "else {");
                        self.output_statements(indent + 1, else_body);
                        self.writer.write_line(indent, "}");
                    }
                }
                StatementKind::For {
                    initialization,
                    condition,
                    increment,
                    body,
                } => {
                    self.writer.begin_line(indent);
                    self.writer.write("for (");
                    self.output_declaration_chain(initialization);
                    self.writer.write("; ");
                    if let Some(condition) = condition {
                        self.output_expression(condition);
                    }
                    self.writer.write("; ");
                    if let Some(increment) = increment {
                        self.output_expression(increment);
                    }
                    self.writer.end_line_with(") {");
                    self.output_statements(indent + 1, body);
                    self.writer.write_line(indent, "}");
                }
                StatementKind::Block { body } => {
                    self.writer.write_line(indent, "{");
                    self.output_statements(indent + 1, body);
                    self.writer.write_line(indent, "}");
                }
            }
        }
    }

    fn output_attributes(&mut self, indent: usize, first: Option<Handle<slx_ast::Attribute>>) {
        let mut cursor = first;
        while let Some(attribute) = cursor {
            let kind = self.module.attributes[attribute].kind;
            let args = self.module.attributes[attribute].args;
            cursor = self.module.attributes[attribute].next;

            if kind == AttributeKind::NumThreads && self.stage == ShaderStage::Compute {
                let args = self.module.expression_list(args);
                if args.len() == 3 {
                    self.writer.begin_line(indent);
                    self.writer.write("[numthreads(");
                    for (i, &arg) in args.iter().enumerate() {
                        if i > 0 {
                            self.writer.write(", ");
                        }
                        self.output_expression(arg);
                    }
                    self.writer.end_line_with(")]");
                }
                continue;
            }

            let name = match kind {
                AttributeKind::Unroll => "unroll",
                AttributeKind::Branch => "branch",
                AttributeKind::Flatten => "flatten",
                _ => continue,
            };
            self.writer.write_line(indent, &format!("[{name}]"));
        }
    }

    fn output_buffer(&mut self, indent: usize, buffer: Handle<slx_ast::BufferDecl>) {
        let name = match self.module.buffers[buffer].name {
            Some(n) => self.name(n).to_string(),
            None => "Globals".to_string(),
        };

        if !self.legacy {
            self.writer.write_line(indent, &format!("struct {name}Type {{"));
        }

        self.inside_buffer = true;
        let mut field = self.module.buffers[buffer].fields;
        while let Some(h) = field {
            field = self.module.declarations[h].next;
            if self.module.declarations[h].hidden {
                continue;
            }
            let d = self.module.declarations[h].clone();
            self.writer.begin_line(indent + 1);
            self.output_declaration(&d.ty, d.name, None, d.register_name, d.assignment);
            self.writer.end_line_with(";");
        }
        self.inside_buffer = false;

        if !self.legacy {
            self.writer.write_line(indent, "};");
            self.writer.begin_line(indent);
            self.writer.write(&format!("cbuffer cb_{name}"));
            let register = self.module.buffers[buffer].register_name;
            self.output_register(register, RegisterClass::ConstantBuffer);
            self.writer.end_line_with(" {");
            self.writer
                .write_line(indent + 1, &format!("{name}Type {name};"));
            self.writer.write_line(indent, "};");
        }
    }

    fn output_function(&mut self, indent: usize, function: Handle<slx_ast::FunctionDecl>) {
        let f = self.module.functions[function].clone();
        let return_type_name = self.type_name(&f.return_type);
        let function_name = self.name(f.name).to_string();

        self.writer.begin_line(indent);
        self.writer.write(&format!("{return_type_name} {function_name}("));
        self.output_arguments(f.arguments);

        if !f.defined {
            // Forward declaration.
            self.writer.end_line_with(");");
            return;
        }

        let semantic = f.sv_semantic.or(f.semantic);
        match semantic {
            Some(semantic) => {
                let text = self.name(semantic).to_string();
                self.writer.write(&format!(") : {text} {{"));
            }
            None => self.writer.write(") {"),
        }
        self.writer.end_line();

        self.output_statements(indent + 1, f.body);
        self.writer.write_line(indent, "};");
    }

    fn output_arguments(&mut self, first: Option<Handle<slx_ast::Argument>>) {
        let mut cursor = first;
        let mut count = 0;
        while let Some(argument) = cursor {
            let a = self.module.arguments[argument].clone();
            cursor = a.next;

            if count > 0 {
                self.writer.write(", ");
            }
            count += 1;

            match a.modifier {
                ArgumentModifier::In => self.writer.write("in "),
                ArgumentModifier::Out => self.writer.write("out "),
                ArgumentModifier::Inout => self.writer.write("inout "),
                ArgumentModifier::Uniform => self.writer.write("uniform "),
                _ => {}
            }

            let semantic = a.sv_semantic.or(a.semantic);
            self.output_declaration(&a.ty, a.name, semantic, None, a.default_value);

            // A sampled texture argument implies a paired sampler.
            if !self.legacy && a.ty.is_read_texture() {
                let name = self.name(a.name).to_string();
                self.writer
                    .write(&format!(", SamplerState {name}{SAMPLER_POSTFIX}"));
            }
        }
    }

    // -- declarations -------------------------------------------------------

    fn output_declaration_chain(&mut self, declaration: Handle<Declaration>) {
        let d = self.module.declarations[declaration].clone();

        if !self.legacy && d.ty.is_read_texture() {
            self.output_texture_declaration(&d);
            return;
        }

        self.output_declaration_type(&d.ty);
        self.output_declaration_body(&d.ty, d.name, d.semantic, d.register_name, d.assignment);

        let mut cursor = d.next;
        while let Some(h) = cursor {
            let d = self.module.declarations[h].clone();
            self.writer.write(", ");
            self.output_declaration_body(&d.ty, d.name, d.semantic, d.register_name, d.assignment);
            cursor = d.next;
        }
    }

    fn output_texture_declaration(&mut self, declaration: &Declaration) {
        let name = self.name(declaration.name).to_string();
        let texture_type = self.type_name(&declaration.ty);
        let sampler_element = declaration.ty.sampler_type.description().name;

        if declaration.ty.base == BaseType::Texture2DMS {
            self.writer.write(&format!("Texture2DMS<float4> {name}"));
            self.output_register(declaration.register_name, RegisterClass::ShaderResource);
            return;
        }

        self.writer
            .write(&format!("{texture_type}<{sampler_element}> {name}{TEXTURE_POSTFIX}"));
        self.output_register(declaration.register_name, RegisterClass::ShaderResource);
        self.writer
            .write(&format!("; SamplerState {name}{SAMPLER_POSTFIX}"));
        self.output_register(declaration.register_name, RegisterClass::Sampler);
    }

    fn output_declaration(
        &mut self,
        ty: &Type,
        name: Name,
        semantic: Option<Name>,
        register_name: Option<Name>,
        assignment: Option<Handle<Expression>>,
    ) {
        self.output_declaration_type(ty);
        self.output_declaration_body(ty, name, semantic, register_name, assignment);
    }

    fn output_declaration_type(&mut self, ty: &Type) {
        if ty.flags.contains(TypeFlags::CONST) {
            self.writer.write("const ");
        }
        if ty.flags.contains(TypeFlags::STATIC) {
            self.writer.write("static ");
        }
        if ty.flags.contains(TypeFlags::CENTROID) {
            self.writer.write("centroid ");
        }
        if ty.flags.contains(TypeFlags::LINEAR) {
            self.writer.write("linear ");
        }
        if ty.flags.contains(TypeFlags::NO_INTERPOLATION) {
            self.writer.write("nointerpolation ");
        }
        if ty.flags.contains(TypeFlags::NO_PERSPECTIVE) {
            self.writer.write("noperspective ");
        }
        if ty.flags.contains(TypeFlags::SAMPLE) {
            self.writer.write("sample ");
        }

        let type_name = self.type_name(ty);
        if !self.legacy && (ty.is_read_texture() || ty.is_write_texture()) {
            let element = ty.sampler_type.description().name;
            if ty.base.is_multisampled_texture() && ty.sample_count != 0 {
                self.writer
                    .write(&format!("{type_name}<{element}, {}> ", ty.sample_count));
            } else {
                self.writer.write(&format!("{type_name}<{element}> "));
            }
        } else {
            self.writer.write(&format!("{type_name} "));
        }
    }

    fn output_declaration_body(
        &mut self,
        ty: &Type,
        name: Name,
        semantic: Option<Name>,
        register_name: Option<Name>,
        assignment: Option<Handle<Expression>>,
    ) {
        let name_text = self.name(name).to_string();
        if !self.legacy && ty.is_read_texture() {
            self.writer.write(&format!("{name_text}{TEXTURE_POSTFIX}"));
        } else {
            self.writer.write(&name_text);
        }

        if ty.array {
            self.writer.write("[");
            if let Some(size) = ty.array_size {
                self.output_expression(size);
            }
            self.writer.write("]");
        }

        if let Some(semantic) = semantic {
            let text = self.name(semantic).to_string();
            self.writer.write(&format!(" : {text}"));
        }

        if let Some(register_name) = register_name {
            if self.inside_buffer {
                let text = self.name(register_name).to_string();
                self.writer.write(&format!(" : packoffset({text})"));
            } else if ty.is_read_texture() {
                self.output_register(Some(register_name), RegisterClass::ShaderResource);
            } else if ty.is_write_texture() {
                self.output_register(Some(register_name), RegisterClass::UnorderedAccess);
            } else {
                let text = self.name(register_name).to_string();
                self.writer.write(&format!(" : register({text})"));
            }
        }

        if assignment.is_some() && !ty.is_read_texture() {
            self.writer.write(" = ");
            if ty.array {
                self.writer.write("{ ");
                self.output_expression_list(assignment);
                self.writer.write(" }");
            } else if let Some(assignment) = assignment {
                self.output_expression(assignment);
            }
        }
    }

    fn register_index(&self, register_name: &str, class: RegisterClass) -> Option<u32> {
        let slots = match class {
            RegisterClass::ConstantBuffer => self.constant_buffer_slots,
            _ => self.texture_slots,
        };
        if let Some(index) = slots.iter().position(|s| s == register_name) {
            return Some(index as u32);
        }

        let named_prefix = match class {
            RegisterClass::ConstantBuffer => "ConstantBuffer",
            _ => "Texture",
        };
        if let Some(digits) = register_name.strip_prefix(named_prefix) {
            return digits.parse().ok();
        }

        // Conventional register names like b0 / t3 / s1 / u2.
        let mut chars = register_name.chars();
        match (chars.next(), chars.as_str()) {
            (Some(c), digits) if c.is_ascii_alphabetic() && !digits.is_empty() => {
                digits.parse().ok()
            }
            _ => None,
        }
    }

    fn output_register(&mut self, register_name: Option<Name>, class: RegisterClass) {
        let Some(register_name) = register_name else {
            return;
        };
        if class == RegisterClass::UnorderedAccess {
            return;
        }
        let text = self.name(register_name).to_string();
        match self.register_index(&text, class) {
            Some(index) => {
                let prefix = match class {
                    RegisterClass::ConstantBuffer => 'b',
                    RegisterClass::ShaderResource => 't',
                    RegisterClass::Sampler => 's',
                    RegisterClass::UnorderedAccess => 'u',
                };
                self.writer.write(&format!(" : register({prefix}{index})"));
            }
            None => log::error!("Undefined register use {text}"),
        }
    }

    // -- expressions --------------------------------------------------------

    fn output_expression_list(&mut self, first: Option<Handle<Expression>>) {
        let mut cursor = first;
        let mut count = 0;
        while let Some(expression) = cursor {
            if count > 0 {
                self.writer.write(", ");
            }
            self.output_expression(expression);
            cursor = self.module.expressions[expression].next;
            count += 1;
        }
    }

    /// Looks up whether a global identifier is a field of a named cbuffer;
    /// modern output nests those inside the generated wrapper struct.
    fn buffer_prefix(&self, name: Name) -> Option<String> {
        if self.legacy {
            return None;
        }
        for (_, buffer) in self.module.buffers.iter() {
            let Some(buffer_name) = buffer.name else {
                continue;
            };
            let mut field = buffer.fields;
            while let Some(h) = field {
                if self.module.declarations[h].name == name {
                    return Some(self.module.interner.get(buffer_name).to_string());
                }
                field = self.module.declarations[h].next;
            }
        }
        None
    }

    fn output_expression(&mut self, expression: Handle<Expression>) {
        let kind = self.module.expressions[expression].kind.clone();
        let ty = self.module.expressions[expression].ty.clone();

        match kind {
            ExpressionKind::Identifier { name, global } => {
                let text = self.name(name).to_string();
                let buffer = if global { self.buffer_prefix(name) } else { None };
                if !self.legacy
                    && ty.is_read_texture()
                    && !ty.base.is_multisampled_texture()
                {
                    self.writer.write(&format!(
                        "{text}{TEXTURE_POSTFIX}, {text}{SAMPLER_POSTFIX}"
                    ));
                } else if let Some(buffer) = buffer {
                    self.writer.write(&format!("{buffer}.{text}"));
                } else {
                    self.writer.write(&text);
                }
            }
            ExpressionKind::Cast { expr } => {
                self.writer.write("(");
                self.output_declaration_type(&ty);
                self.writer.write(")(");
                self.output_expression(expr);
                self.writer.write(")");
            }
            ExpressionKind::Constructor { ty: ctor_ty, args } => {
                if ctor_ty.is_read_texture() {
                    log::error!(
                        "Texture type {} is not constructable",
                        self.module.type_name(&ctor_ty)
                    );
                }
                let name = self.type_name(&ctor_ty);
                self.writer.write(&format!("{name}("));
                self.output_expression_list(args);
                self.writer.write(")");
            }
            ExpressionKind::Literal(literal) => match literal {
                Literal::Float(v) | Literal::Half(v) => self.writer.write(&format_float(v)),
                Literal::Int(v) => self.writer.write(&v.to_string()),
                Literal::Bool(v) => self.writer.write(if v { "true" } else { "false" }),
            },
            ExpressionKind::Unary { op, expr } => {
                self.writer.write("(");
                if op.is_postfix() {
                    self.output_expression(expr);
                    self.writer.write(op.symbol());
                } else {
                    self.writer.write(op.symbol());
                    self.output_expression(expr);
                }
                self.writer.write(")");
            }
            ExpressionKind::Binary { op, left, right } => {
                self.writer.write("(");
                self.output_expression(left);
                self.writer.write(&format!(" {} ", op.symbol()));
                self.output_expression(right);
                self.writer.write(")");
            }
            ExpressionKind::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                self.writer.write("((");
                self.output_expression(condition);
                self.writer.write(")?(");
                self.output_expression(if_true);
                self.writer.write("):(");
                self.output_expression(if_false);
                self.writer.write("))");
            }
            ExpressionKind::Member { object, field, .. } => {
                let text = self.name(field).to_string();
                self.writer.write("(");
                self.output_expression(object);
                self.writer.write(&format!(").{text}"));
            }
            ExpressionKind::Index { base, index } => {
                self.output_expression(base);
                self.writer.write("[");
                self.output_expression(index);
                self.writer.write("]");
            }
            ExpressionKind::Call { callee, args, .. } => {
                let name = match callee {
                    Callee::User(f) => self.name(self.module.functions[f].name).to_string(),
                    Callee::Intrinsic(i) => i.name.to_string(),
                };
                self.writer.write(&format!("{name}("));
                self.output_expression_list(args);
                self.writer.write(")");
            }
            ExpressionKind::Method {
                object,
                method,
                args,
                ..
            } => {
                self.output_method_call(object, method, args);
            }
        }
    }

    /// The bare texture name of a method-call object (`name_texture` in
    /// modern mode).
    fn output_texture_object(&mut self, object: Handle<Expression>) -> String {
        match self.module.expressions[object].kind.clone() {
            ExpressionKind::Identifier { name, .. } => {
                let text = self.name(name).to_string();
                if self.legacy {
                    text
                } else {
                    format!("{text}{TEXTURE_POSTFIX}")
                }
            }
            _ => {
                log::error!("texture method object is not an identifier");
                "<texture>".to_string()
            }
        }
    }

    fn output_method_call(
        &mut self,
        object: Handle<Expression>,
        method: &'static Intrinsic,
        args: Option<Handle<Expression>>,
    ) {
        let texture = self.output_texture_object(object);
        let sampler = texture
            .strip_suffix(TEXTURE_POSTFIX)
            .map(|base| format!("{base}{SAMPLER_POSTFIX}"))
            .unwrap_or_else(|| texture.clone());
        let args = self.module.expression_list(args);

        if self.legacy {
            self.output_legacy_method_call(method, &texture, &args);
            return;
        }

        match method.name {
            "Sample" => {
                // The explicit sampler argument is used as-is.
                self.writer.write(&format!("{texture}.Sample("));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            "SampleLod" => {
                self.writer.write(&format!("{texture}.SampleLevel({sampler}, "));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            "SampleLodOffset" => {
                self.writer.write(&format!("{texture}.SampleLevel({sampler}, "));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            "Gather" => {
                // A constant component selects the typed gather.
                let function = match args.get(1).and_then(|&c| self.module.expression_value(c)) {
                    Some(0) => "GatherRed",
                    Some(1) => "GatherGreen",
                    Some(2) => "GatherBlue",
                    Some(3) => "GatherAlpha",
                    _ => "Gather",
                };
                self.writer.write(&format!("{texture}.{function}({sampler}, "));
                if let Some(&coord) = args.first() {
                    self.output_expression(coord);
                }
                self.writer.write(")");
            }
            other => {
                self.writer.write(&format!("{texture}.{other}("));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
        }
    }

    /// Shader-model-3 style sampling calls.
    fn output_legacy_method_call(
        &mut self,
        method: &'static Intrinsic,
        texture: &str,
        args: &[Handle<Expression>],
    ) {
        let dimension = match method.method_owner() {
            BaseType::Texture1D | BaseType::Texture1DArray => "1D",
            BaseType::Texture3D => "3D",
            BaseType::TextureCube | BaseType::TextureCubeArray => "CUBE",
            _ => "2D",
        };

        match method.name {
            "Sample" => {
                // Sample(sampler, coord) -> tex2D(sampler, coord); the
                // legacy model binds the texture through the sampler.
                self.writer.write(&format!("tex{dimension}("));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            "SampleLod" | "SampleLodOffset" => {
                // tex2Dlod takes a float4 with the LOD in w.
                let fill = match method.method_owner() {
                    BaseType::Texture1D => ", 0.0, 0.0, ",
                    BaseType::Texture2D | BaseType::Texture1DArray => ", 0.0, ",
                    _ => ", ",
                };
                self.writer.write(&format!("tex{dimension}lod({texture}, float4("));
                if let Some(&coord) = args.first() {
                    self.output_expression(coord);
                }
                self.writer.write(fill);
                if let Some(&lod) = args.get(1) {
                    self.output_expression(lod);
                }
                self.writer.write("))");
            }
            _ => {
                self.writer.write(&format!("tex{dimension}({texture}, "));
                if let Some(&coord) = args.first() {
                    self.output_expression(coord);
                }
                self.writer.write(")");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit(source: &str, stage: ShaderStage, entry: &str, legacy: bool) -> String {
        let mut module = slx_parser::parse(source, "test.sl").expect("parse");
        let backend = if legacy {
            HlslBackend::legacy()
        } else {
            HlslBackend::new()
        };
        let options = EmitOptions::new(stage, entry);
        backend.emit(&mut module, &options).expect("emit")
    }

    #[test]
    fn semantic_translation_for_vertex_output() {
        let out = emit(
            "struct Output { float4 pos : POSITION; float2 uv : TEXCOORD0; };\n\
             Output main(float4 p : POSITION) { Output o; o.pos = p; o.uv = p.xy; return o; }",
            ShaderStage::Vertex,
            "main",
            false,
        );
        assert!(out.contains("SV_Position"));
        // SV fields move to the end of the struct.
        let sv = out.find("SV_Position").unwrap();
        let uv = out.find("TEXCOORD0").unwrap();
        assert!(uv < sv);
    }

    #[test]
    fn pixel_color_output_becomes_sv_target() {
        let out = emit(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
            false,
        );
        assert!(out.contains(") : SV_Target {"));
    }

    #[test]
    fn legacy_mode_keeps_source_semantics() {
        let out = emit(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
            true,
        );
        assert!(out.contains(") : COLOR {"));
        assert!(!out.contains("SV_Target"));
    }

    #[test]
    fn texture_declaration_expands_to_pair() {
        let out = emit(
            "Texture2D albedo : register(t0);\n\
             SamplerState samp : register(s0);\n\
             float4 main(float2 uv : TEXCOORD0) : COLOR { return albedo.Sample(samp, uv); }",
            ShaderStage::Fragment,
            "main",
            false,
        );
        assert!(out.contains("Texture2D<float> albedo_texture : register(t0)"));
        assert!(out.contains("SamplerState albedo_sampler : register(s0)"));
        assert!(out.contains("albedo_texture.Sample(samp, "));
    }

    #[test]
    fn cbuffer_is_wrapped_in_modern_mode() {
        let out = emit(
            "cbuffer Globals : register(b0) { float4x4 worldViewProj; };\n\
             float4 main(float4 p : POSITION) : POSITION { return mul(p, Globals.worldViewProj); }",
            ShaderStage::Vertex,
            "main",
            false,
        );
        assert!(out.contains("struct GlobalsType {"));
        assert!(out.contains("cbuffer cb_Globals : register(b0) {"));
        assert!(out.contains("GlobalsType Globals;"));
    }

    #[test]
    fn legacy_cbuffer_is_flat() {
        let out = emit(
            "cbuffer Globals { float4x4 worldViewProj; };\n\
             float4 main(float4 p) : POSITION { return mul(p, worldViewProj); }",
            ShaderStage::Vertex,
            "main",
            true,
        );
        assert!(!out.contains("struct GlobalsType"));
        assert!(out.contains("float4x4 worldViewProj;"));
    }

    #[test]
    fn unqualified_buffer_field_gets_prefixed() {
        let out = emit(
            "cbuffer Globals { float scale; };\n\
             float main(float x : TEXCOORD0) : COLOR { return x * scale; }",
            ShaderStage::Fragment,
            "main",
            false,
        );
        assert!(out.contains("Globals.scale"));
    }

    #[test]
    fn statements_round_trip() {
        let out = emit(
            "float main(float x : TEXCOORD0) : COLOR {\n\
                 float total = 0.0;\n\
                 for (int i = 0; i < 4; ++i) { total += x; }\n\
                 if (total > 1.0) { total = 1.0; } else { total += 0.5; }\n\
                 return total;\n\
             }",
            ShaderStage::Fragment,
            "main",
            false,
        );
        assert!(out.contains("for (int i = 0; (i < 4); (++i)) {"));
        assert!(out.contains("if ((total > 1.0)) {"));
        assert!(out.contains("else {"));
        assert!(out.contains("(total += 0.5);"));
    }

    #[test]
    fn numthreads_is_emitted_for_compute() {
        let out = emit(
            "[numthreads(8, 8, 1)] void main() { }",
            ShaderStage::Compute,
            "main",
            false,
        );
        assert!(out.contains("[numthreads(8, 8, 1)]"));
    }

    #[test]
    fn float_literals_keep_a_decimal_point() {
        let out = emit(
            "float main(float x : TEXCOORD0) : COLOR { return x * 2.0; }",
            ShaderStage::Fragment,
            "main",
            false,
        );
        assert!(out.contains("2.0"));
    }

    #[test]
    fn unknown_entry_point_is_an_error() {
        let mut module = slx_parser::parse("float4 f() { return float4(0.0, 0.0, 0.0, 0.0); }", "t")
            .unwrap();
        let err = HlslBackend::new()
            .emit(&mut module, &EmitOptions::new(ShaderStage::Vertex, "main"))
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownEntryPoint(_)));
    }

    #[test]
    fn legacy_sample_maps_to_tex2d() {
        let out = emit(
            "Texture2D albedo : register(t0);\n\
             SamplerState samp : register(s0);\n\
             float4 main(float2 uv : TEXCOORD0) : COLOR { return albedo.Sample(samp, uv); }",
            ShaderStage::Fragment,
            "main",
            true,
        );
        assert!(out.contains("tex2D(samp, uv)"));
    }
}
