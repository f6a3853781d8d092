//! GLSL emitter.
//!
//! Walks a typed module and prints GLSL source: HLSL-style vector and
//! matrix types map to vec/mat types, sampled textures collapse into
//! combined samplers, cbuffers become uniform blocks, and a generated
//! `main` routes the entry point's semantic-annotated inputs and outputs
//! through stage globals.

use slx_ast::{
    ArgumentModifier, AttributeKind, BaseType, Callee, Declaration, Expression, ExpressionKind,
    FunctionDecl, Handle, Intrinsic, Literal, Module, Name, Statement, StatementKind, Type,
    TypeFlags,
};
use slx_backend_core::{Backend, BackendError, CodeWriter, EmitOptions, ShaderStage};

/// Output language version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GlslVersion {
    /// OpenGL 2.0.
    V110,
    /// OpenGL 3.1.
    #[default]
    V140,
    /// OpenGL 3.2.
    V150,
    V430,
    /// OpenGL ES 2.0.
    V100Es,
    /// OpenGL ES 3.0.
    V300Es,
}

impl GlslVersion {
    fn header(self) -> &'static str {
        match self {
            Self::V110 => "#version 110",
            Self::V140 => "#version 140",
            Self::V150 => "#version 150",
            Self::V430 => "#version 430",
            Self::V100Es => "#version 100",
            Self::V300Es => "#version 300 es",
        }
    }

    fn is_es(self) -> bool {
        matches!(self, Self::V100Es | Self::V300Es)
    }

    /// attribute/varying qualifiers and gl_FragColor instead of in/out
    /// globals and declared outputs.
    fn is_legacy(self) -> bool {
        matches!(self, Self::V110 | Self::V100Es)
    }

    fn supports_uniform_blocks(self) -> bool {
        !self.is_legacy()
    }
}

/// Emitter options.
#[derive(Clone, Debug)]
pub struct GlslOptions {
    /// Prefix for generated uniform-block names.
    pub constant_buffer_prefix: String,
}

impl Default for GlslOptions {
    fn default() -> Self {
        Self {
            constant_buffer_prefix: "cb_".to_string(),
        }
    }
}

/// The GLSL backend.
#[derive(Debug, Default)]
pub struct GlslBackend {
    pub version: GlslVersion,
    pub options: GlslOptions,
}

impl GlslBackend {
    pub fn new(version: GlslVersion) -> Self {
        Self {
            version,
            options: GlslOptions::default(),
        }
    }
}

impl Backend for GlslBackend {
    fn name(&self) -> &str {
        "GLSL"
    }

    fn targets(&self) -> &[&str] {
        &["glsl"]
    }

    fn emit(&self, module: &mut Module, options: &EmitOptions) -> Result<String, BackendError> {
        let clip_function = choose_unique_name(module, "clip");
        let rcp_function = choose_unique_name(module, "rcp");
        let sincos_function = choose_unique_name(module, "sincos");
        let mut emitter = Emitter {
            module,
            writer: CodeWriter::new(),
            version: self.version,
            stage: options.stage,
            entry_point: options.entry_point.clone(),
            constant_buffer_prefix: self.options.constant_buffer_prefix.clone(),
            clip_function,
            rcp_function,
            sincos_function,
        };
        emitter.run(options.header.as_deref())
    }
}

/// Picks `base`, or `base1`, `base2`, ... until the name is unused in the
/// module's intern pool.
fn choose_unique_name(module: &Module, base: &str) -> String {
    if !module.interner.contains(base) {
        return base.to_string();
    }
    for i in 1..1024 {
        let candidate = format!("{base}{i}");
        if !module.interner.contains(&candidate) {
            return candidate;
        }
    }
    base.to_string()
}

/// GLSL names that are not reserved in the source language.
const RESERVED_WORDS: &[&str] = &["input", "output", "precision", "texture", "main", "mix"];

fn safe_identifier(name: &str) -> String {
    if RESERVED_WORDS.contains(&name) {
        format!("{name}_")
    } else {
        name.to_string()
    }
}

fn format_float(value: f32) -> String {
    format!("{value:?}")
}

/// Where a semantic-annotated value lives at a stage boundary.
struct StageVar {
    name: String,
    builtin: bool,
}

struct Emitter<'a> {
    module: &'a mut Module,
    writer: CodeWriter,
    version: GlslVersion,
    stage: ShaderStage,
    entry_point: String,
    constant_buffer_prefix: String,
    clip_function: String,
    rcp_function: String,
    sincos_function: String,
}

impl Emitter<'_> {
    fn run(&mut self, header: Option<&str>) -> Result<String, BackendError> {
        let Some(entry) = self.module.find_function(&self.entry_point) else {
            return Err(BackendError::UnknownEntryPoint(self.entry_point.clone()));
        };

        self.writer.write_line(0, self.version.header());
        if self.version.is_es() {
            self.writer.write_line(0, "precision highp float;");
        }
        if let Some(header) = header {
            self.writer.write_line(0, header);
        }

        self.output_helper_functions();
        self.output_stage_globals(entry);
        self.output_statements(0, self.module.root);
        self.output_entry_caller(entry);

        Ok(std::mem::take(&mut self.writer).finish())
    }

    fn name(&self, name: Name) -> String {
        safe_identifier(self.module.interner.get(name))
    }

    /// Runs an output closure against a scratch writer and returns the
    /// text it produced.
    fn capture(&mut self, f: impl FnOnce(&mut Self)) -> String {
        let saved = std::mem::take(&mut self.writer);
        f(self);
        std::mem::replace(&mut self.writer, saved).finish()
    }

    // -- helpers ------------------------------------------------------------

    fn output_helper_functions(&mut self) {
        if self.module.interner.contains("clip") {
            let name = self.clip_function.clone();
            self.writer
                .write_line(0, &format!("void {name}(float v) {{ if (v < 0.0) discard; }}"));
            for n in 2..=4 {
                self.writer.write_line(
                    0,
                    &format!(
                        "void {name}(vec{n} v) {{ if (any(lessThan(v, vec{n}(0.0)))) discard; }}"
                    ),
                );
            }
        }
        if self.module.interner.contains("rcp") {
            let name = self.rcp_function.clone();
            self.writer
                .write_line(0, &format!("float {name}(float v) {{ return 1.0 / v; }}"));
            for n in 2..=4 {
                self.writer.write_line(
                    0,
                    &format!("vec{n} {name}(vec{n} v) {{ return vec{n}(1.0) / v; }}"),
                );
            }
        }
        if self.module.interner.contains("sincos") {
            let name = self.sincos_function.clone();
            self.writer.write_line(
                0,
                &format!(
                    "void {name}(float v, out float s, out float c) {{ s = sin(v); c = cos(v); }}"
                ),
            );
            for n in 2..=4 {
                self.writer.write_line(
                    0,
                    &format!(
                        "void {name}(vec{n} v, out vec{n} s, out vec{n} c) {{ s = sin(v); c = cos(v); }}"
                    ),
                );
            }
        }
    }

    // -- stage globals and entry caller -------------------------------------

    fn input_qualifier(&self) -> &'static str {
        if self.version.is_legacy() {
            match self.stage {
                ShaderStage::Vertex => "attribute",
                _ => "varying",
            }
        } else {
            "in"
        }
    }

    fn output_qualifier(&self) -> &'static str {
        if self.version.is_legacy() {
            "varying"
        } else {
            "out"
        }
    }

    fn input_var(&self, semantic: &str) -> StageVar {
        match self.stage {
            ShaderStage::Vertex => match semantic {
                "INSTANCE_ID" => StageVar {
                    name: "gl_InstanceID".to_string(),
                    builtin: true,
                },
                _ => StageVar {
                    name: format!("vertex_{semantic}"),
                    builtin: false,
                },
            },
            ShaderStage::Fragment => match semantic {
                "VPOS" => StageVar {
                    name: "gl_FragCoord".to_string(),
                    builtin: true,
                },
                "VFACE" => StageVar {
                    name: "gl_FrontFacing".to_string(),
                    builtin: true,
                },
                _ => StageVar {
                    name: format!("frag_{semantic}"),
                    builtin: false,
                },
            },
            ShaderStage::Compute => StageVar {
                name: format!("in_{semantic}"),
                builtin: false,
            },
        }
    }

    fn output_var(&self, semantic: &str) -> StageVar {
        match self.stage {
            ShaderStage::Vertex => match semantic {
                "POSITION" => StageVar {
                    name: "gl_Position".to_string(),
                    builtin: true,
                },
                _ => StageVar {
                    name: format!("frag_{semantic}"),
                    builtin: false,
                },
            },
            ShaderStage::Fragment => match semantic {
                "DEPTH" => StageVar {
                    name: "gl_FragDepth".to_string(),
                    builtin: true,
                },
                _ if self.version.is_legacy() => StageVar {
                    name: "gl_FragColor".to_string(),
                    builtin: true,
                },
                _ => StageVar {
                    name: format!("out_{semantic}"),
                    builtin: false,
                },
            },
            ShaderStage::Compute => StageVar {
                name: format!("out_{semantic}"),
                builtin: false,
            },
        }
    }

    /// Fields of a struct that participate in stage I/O.
    fn semantic_fields(&self, ty: &Type) -> Vec<(Name, Type, String)> {
        let mut out = Vec::new();
        let Some(name) = ty.name else { return out };
        let name = self.module.interner.get(name).to_string();
        let Some(structure) = self.module.find_struct(&name) else {
            return out;
        };
        let mut cursor = self.module.structs[structure].fields;
        while let Some(h) = cursor {
            let field = &self.module.fields[h];
            if let Some(semantic) = field.semantic {
                if !field.hidden {
                    out.push((
                        field.name,
                        field.ty.clone(),
                        self.module.interner.get(semantic).to_string(),
                    ));
                }
            }
            cursor = field.next;
        }
        out
    }

    /// Declares the in/out globals the entry caller routes through.
    fn output_stage_globals(&mut self, entry: Handle<FunctionDecl>) {
        let function = self.module.functions[entry].clone();

        let mut cursor = function.arguments;
        while let Some(h) = cursor {
            let argument = self.module.arguments[h].clone();
            cursor = argument.next;

            let output = matches!(
                argument.modifier,
                ArgumentModifier::Out | ArgumentModifier::Inout
            );

            if argument.modifier == ArgumentModifier::Uniform {
                let type_name = self.type_name(&argument.ty);
                let name = self.name(argument.name);
                self.writer
                    .write_line(0, &format!("uniform {type_name} {name};"));
                continue;
            }

            if argument.ty.base == BaseType::UserDefined {
                for (_, field_ty, semantic) in self.semantic_fields(&argument.ty) {
                    self.declare_stage_var(&field_ty, &semantic, output);
                }
            } else if let Some(semantic) = argument.semantic {
                let semantic = self.module.interner.get(semantic).to_string();
                self.declare_stage_var(&argument.ty.clone(), &semantic, output);
            }
        }

        // Return value.
        if function.return_type.base == BaseType::UserDefined {
            for (_, field_ty, semantic) in self.semantic_fields(&function.return_type) {
                self.declare_stage_var(&field_ty, &semantic, true);
            }
        } else if let Some(semantic) = function.semantic {
            let semantic = self.module.interner.get(semantic).to_string();
            self.declare_stage_var(&function.return_type.clone(), &semantic, true);
        }
    }

    fn declare_stage_var(&mut self, ty: &Type, semantic: &str, output: bool) {
        let var = if output {
            self.output_var(semantic)
        } else {
            self.input_var(semantic)
        };
        if var.builtin {
            return;
        }
        let qualifier = if output {
            self.output_qualifier()
        } else {
            self.input_qualifier()
        };
        let type_name = self.type_name(ty);
        self.writer
            .write_line(0, &format!("{qualifier} {type_name} {};", var.name));
    }

    fn output_entry_caller(&mut self, entry: Handle<FunctionDecl>) {
        let function = self.module.functions[entry].clone();
        let entry_name = self.name(function.name);

        if self.stage == ShaderStage::Compute {
            self.output_compute_layout(entry);
        }

        self.writer.write_line(0, "void main() {");

        // Locals for the arguments, loaded from the stage inputs.
        let mut call_args = Vec::new();
        let mut outputs = Vec::new();
        let mut cursor = function.arguments;
        while let Some(h) = cursor {
            let argument = self.module.arguments[h].clone();
            cursor = argument.next;
            let name = self.name(argument.name);

            if argument.modifier == ArgumentModifier::Uniform {
                // Routed through the global uniform of the same name.
                call_args.push(name);
                continue;
            }

            let output = matches!(
                argument.modifier,
                ArgumentModifier::Out | ArgumentModifier::Inout
            );
            let type_name = self.type_name(&argument.ty);
            self.writer
                .write_line(1, &format!("{type_name} {name};"));

            if !output || argument.modifier == ArgumentModifier::Inout {
                if argument.ty.base == BaseType::UserDefined {
                    for (field, _, semantic) in self.semantic_fields(&argument.ty) {
                        let field = self.name(field);
                        let var = self.input_var(&semantic);
                        self.writer
                            .write_line(1, &format!("{name}.{field} = {};", var.name));
                    }
                } else if let Some(semantic) = argument.semantic {
                    let semantic = self.module.interner.get(semantic).to_string();
                    let var = self.input_var(&semantic);
                    self.writer.write_line(1, &format!("{name} = {};", var.name));
                }
            }
            if output {
                outputs.push((name.clone(), argument.ty.clone(), argument.semantic));
            }
            call_args.push(name);
        }

        // Call the entry point.
        let args = call_args.join(", ");
        if function.return_type.base == BaseType::Void {
            self.writer.write_line(1, &format!("{entry_name}({args});"));
        } else {
            let return_type = self.type_name(&function.return_type.clone());
            self.writer
                .write_line(1, &format!("{return_type} result_ = {entry_name}({args});"));
            self.store_outputs("result_", &function.return_type, function.semantic);
        }

        // Out-parameter values.
        for (name, ty, semantic) in outputs {
            self.store_outputs(&name, &ty, semantic);
        }

        self.writer.write_line(0, "}");
    }

    fn store_outputs(&mut self, source: &str, ty: &Type, semantic: Option<Name>) {
        if ty.base == BaseType::UserDefined {
            for (field, _, semantic) in self.semantic_fields(ty) {
                let field = self.name(field);
                let var = self.output_var(&semantic);
                self.writer
                    .write_line(1, &format!("{} = {source}.{field};", var.name));
            }
        } else if let Some(semantic) = semantic {
            let semantic = self.module.interner.get(semantic).to_string();
            let var = self.output_var(&semantic);
            self.writer.write_line(1, &format!("{} = {source};", var.name));
        }
    }

    fn output_compute_layout(&mut self, entry: Handle<FunctionDecl>) {
        // numthreads lives on the statement wrapping the entry function.
        let mut attribute = None;
        for (_, statement) in self.module.statements.iter() {
            if let StatementKind::Function(f) = &statement.kind {
                if *f == entry {
                    attribute = statement.attributes;
                    break;
                }
            }
        }

        let mut cursor = attribute;
        while let Some(h) = cursor {
            let attr = &self.module.attributes[h];
            cursor = attr.next;
            if attr.kind != AttributeKind::NumThreads {
                continue;
            }
            let args = self.module.expression_list(attr.args);
            let sizes: Vec<i32> = args
                .iter()
                .map(|&a| self.module.expression_value(a).unwrap_or(1))
                .collect();
            if let [x, y, z] = sizes[..] {
                self.writer.write_line(
                    0,
                    &format!(
                        "layout(local_size_x = {x}, local_size_y = {y}, local_size_z = {z}) in;"
                    ),
                );
            }
        }
    }

    // -- types --------------------------------------------------------------

    fn type_name(&self, ty: &Type) -> String {
        use BaseType::*;
        match ty.base {
            Void => "void".to_string(),
            Float | Half => "float".to_string(),
            Float2 | Half2 => "vec2".to_string(),
            Float3 | Half3 => "vec3".to_string(),
            Float4 | Half4 => "vec4".to_string(),
            Float2x2 | Half2x2 => "mat2".to_string(),
            Float3x3 | Half3x3 => "mat3".to_string(),
            Float4x4 | Half4x4 => "mat4".to_string(),
            Float4x3 | Half4x3 => "mat4x3".to_string(),
            Float4x2 | Half4x2 => "mat4x2".to_string(),
            Bool => "bool".to_string(),
            Bool2 => "bvec2".to_string(),
            Bool3 => "bvec3".to_string(),
            Bool4 => "bvec4".to_string(),
            Int => "int".to_string(),
            Int2 => "ivec2".to_string(),
            Int3 => "ivec3".to_string(),
            Int4 => "ivec4".to_string(),
            Uint => "uint".to_string(),
            Uint2 => "uvec2".to_string(),
            Uint3 => "uvec3".to_string(),
            Uint4 => "uvec4".to_string(),
            Texture1D => "sampler1D".to_string(),
            Texture2D => "sampler2D".to_string(),
            Texture3D => "sampler3D".to_string(),
            TextureCube => "samplerCube".to_string(),
            TextureCubeArray => "samplerCubeArray".to_string(),
            Texture2DMS => "sampler2DMS".to_string(),
            Texture1DArray => "sampler1DArray".to_string(),
            Texture2DArray => "sampler2DArray".to_string(),
            Texture2DMSArray => "sampler2DMSArray".to_string(),
            RwTexture1D => "image1D".to_string(),
            RwTexture2D => "image2D".to_string(),
            RwTexture3D => "image3D".to_string(),
            SamplerState => "sampler".to_string(),
            UserDefined | Buffer => match ty.name {
                Some(name) => self.name(name),
                None => "void".to_string(),
            },
            Unknown => "void".to_string(),
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

            match self.module.statements[statement].kind.clone() {
                StatementKind::Declaration(declaration) => {
                    // Sampler-state objects have no GLSL counterpart.
                    if self.module.declarations[declaration].ty.base == BaseType::SamplerState {
                        continue;
                    }
                    self.writer.begin_line(indent);
                    if indent == 0 {
                        self.output_global_declaration(declaration);
                    } else {
                        self.output_declaration_chain(declaration);
                    }
                    self.writer.end_line_with(";");
                }
                StatementKind::Struct(structure) => {
                    let s = self.module.structs[structure].clone();
                    let name = self.name(s.name);
                    self.writer.write_line(indent, &format!("struct {name} {{"));
                    let mut field = s.fields;
                    while let Some(h) = field {
                        let f = self.module.fields[h].clone();
                        field = f.next;
                        if f.hidden {
                            continue;
                        }
                        let type_name = self.type_name(&f.ty);
                        let field_name = self.name(f.name);
                        self.writer
                            .write_line(indent + 1, &format!("{type_name} {field_name};"));
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

    fn output_buffer(&mut self, indent: usize, buffer: Handle<slx_ast::BufferDecl>) {
        let b = self.module.buffers[buffer].clone();
        let blocks = self.version.supports_uniform_blocks();

        if blocks {
            let name = match b.name {
                Some(n) => self.name(n),
                None => "Globals".to_string(),
            };
            let prefix = self.constant_buffer_prefix.clone();
            self.writer
                .write_line(indent, &format!("layout(std140) uniform {prefix}{name} {{"));
        }

        let field_indent = if blocks { indent + 1 } else { indent };
        let mut field = b.fields;
        while let Some(h) = field {
            let d = self.module.declarations[h].clone();
            field = d.next;
            if d.hidden {
                continue;
            }
            let type_name = self.type_name(&d.ty);
            let name = self.name(d.name);
            self.writer.begin_line(field_indent);
            if !blocks {
                self.writer.write("uniform ");
            }
            self.writer.write(&format!("{type_name} {name}"));
            if d.ty.array {
                self.writer.write("[");
                if let Some(size) = d.ty.array_size {
                    self.output_expression(size);
                }
                self.writer.write("]");
            }
            self.writer.end_line_with(";");
        }

        if blocks {
            self.writer.write_line(indent, "};");
        }
    }

    fn output_function(&mut self, indent: usize, function: Handle<FunctionDecl>) {
        let f = self.module.functions[function].clone();
        let return_type = self.type_name(&f.return_type);
        let name = self.name(f.name);
        self.writer.begin_line(indent);
        self.writer.write(&format!("{return_type} {name}("));

        let mut count = 0;
        let mut cursor = f.arguments;
        while let Some(h) = cursor {
            let argument = self.module.arguments[h].clone();
            cursor = argument.next;
            // Sampler-state parameters disappear with combined samplers.
            if argument.ty.base == BaseType::SamplerState {
                continue;
            }
            if count > 0 {
                self.writer.write(", ");
            }
            count += 1;
            match argument.modifier {
                ArgumentModifier::Out => self.writer.write("out "),
                ArgumentModifier::Inout => self.writer.write("inout "),
                _ => {}
            }
            let type_name = self.type_name(&argument.ty);
            let arg_name = self.name(argument.name);
            self.writer.write(&format!("{type_name} {arg_name}"));
            if argument.ty.array {
                self.writer.write("[");
                if let Some(size) = argument.ty.array_size {
                    self.output_expression(size);
                }
                self.writer.write("]");
            }
        }

        if !f.defined {
            // Forward declarations become prototypes.
            self.writer.end_line_with(");");
            return;
        }
        self.writer.end_line_with(") {");
        self.output_statements(indent + 1, f.body);
        self.writer.write_line(indent, "}");
    }

    fn output_global_declaration(&mut self, declaration: Handle<Declaration>) {
        let d = self.module.declarations[declaration].clone();
        if d.ty.is_read_texture() || d.ty.is_write_texture() {
            let type_name = self.type_name(&d.ty);
            let name = self.name(d.name);
            self.writer.write(&format!("uniform {type_name} {name}"));
            return;
        }
        if !d.ty.flags.contains(TypeFlags::STATIC) && !d.ty.flags.contains(TypeFlags::CONST) {
            self.writer.write("uniform ");
        }
        self.output_declaration_chain(declaration);
    }

    fn output_declaration_chain(&mut self, declaration: Handle<Declaration>) {
        let d = self.module.declarations[declaration].clone();
        if d.ty.flags.contains(TypeFlags::CONST) {
            self.writer.write("const ");
        }
        let type_name = self.type_name(&d.ty);
        self.writer.write(&format!("{type_name} "));
        self.output_declarator(&d);

        let mut cursor = d.next;
        while let Some(h) = cursor {
            let d = self.module.declarations[h].clone();
            self.writer.write(", ");
            self.output_declarator(&d);
            cursor = d.next;
        }
    }

    fn output_declarator(&mut self, declaration: &Declaration) {
        let name = self.name(declaration.name);
        self.writer.write(&name);
        if declaration.ty.array {
            self.writer.write("[");
            if let Some(size) = declaration.ty.array_size {
                self.output_expression(size);
            }
            self.writer.write("]");
        }
        if let Some(assignment) = declaration.assignment {
            self.writer.write(" = ");
            if declaration.ty.array {
                let type_name = self.type_name(&declaration.ty);
                self.writer.write(&format!("{type_name}[]("));
                self.output_expression_list(Some(assignment));
                self.writer.write(")");
            } else {
                self.output_expression(assignment);
            }
        }
    }

    // -- expressions --------------------------------------------------------

    fn output_expression_list(&mut self, first: Option<Handle<Expression>>) {
        let mut cursor = first;
        let mut count = 0;
        while let Some(expression) = cursor {
            cursor = self.module.expressions[expression].next;
            // Sampler arguments vanish along with sampler parameters.
            if self.module.expressions[expression].ty.base == BaseType::SamplerState {
                continue;
            }
            if count > 0 {
                self.writer.write(", ");
            }
            self.output_expression(expression);
            count += 1;
        }
    }

    fn output_expression(&mut self, expression: Handle<Expression>) {
        let kind = self.module.expressions[expression].kind.clone();
        let ty = self.module.expressions[expression].ty.clone();

        match kind {
            ExpressionKind::Identifier { name, .. } => {
                let text = self.name(name);
                self.writer.write(&text);
            }
            ExpressionKind::Cast { expr } => {
                // Constructor-style cast.
                let type_name = self.type_name(&ty);
                self.writer.write(&format!("{type_name}("));
                self.output_expression(expr);
                self.writer.write(")");
            }
            ExpressionKind::Constructor { ty: ctor_ty, args } => {
                let type_name = self.type_name(&ctor_ty);
                self.writer.write(&format!("{type_name}("));
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
            ExpressionKind::Member {
                object,
                field,
                swizzle,
            } => {
                let object_ty = self.module.expressions[object].ty.clone();
                if object_ty.base == BaseType::Buffer {
                    // Uniform-block members are globals in GLSL.
                    let text = self.name(field);
                    self.writer.write(&text);
                } else if swizzle && object_ty.base.description().dimensions == 2 {
                    self.output_matrix_access(object, field);
                } else {
                    let text = self.name(field);
                    self.writer.write("(");
                    self.output_expression(object);
                    self.writer.write(&format!(").{text}"));
                }
            }
            ExpressionKind::Index { base, index } => {
                self.output_expression(base);
                self.writer.write("[");
                self.output_expression(index);
                self.writer.write("]");
            }
            ExpressionKind::Call { callee, args, .. } => {
                self.output_call(callee, args);
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

    /// Matrix element sequences (`_m00`, `_11_22`) become index chains;
    /// multi-element selections construct a vector.
    fn output_matrix_access(&mut self, object: Handle<Expression>, field: Name) {
        let text = self.module.interner.get(field).to_string();
        let object_text = self.capture(|e| e.output_expression(object));

        let mut elements = Vec::new();
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() && bytes[i] == b'_' {
            i += 1;
            let mut base = 1i32;
            if bytes.get(i) == Some(&b'm') {
                base = 0;
                i += 1;
            }
            let (Some(&r), Some(&c)) = (bytes.get(i), bytes.get(i + 1)) else {
                log::error!("malformed matrix access '{text}'");
                break;
            };
            let row = (r - b'0') as i32 - base;
            let column = (c - b'0') as i32 - base;
            elements.push(format!("({object_text})[{row}][{column}]"));
            i += 2;
        }

        match elements.len() {
            1 => self.writer.write(&elements[0]),
            n => self
                .writer
                .write(&format!("vec{n}({})", elements.join(", "))),
        }
    }

    fn output_call(&mut self, callee: Callee, args: Option<Handle<Expression>>) {
        let name = match callee {
            Callee::User(f) => {
                let name = self.name(self.module.functions[f].name);
                self.writer.write(&format!("{name}("));
                self.output_expression_list(args);
                self.writer.write(")");
                return;
            }
            Callee::Intrinsic(i) => i.name,
        };

        let args = self.module.expression_list(args);
        match name {
            "mul" => {
                // Column-vector convention: mul(a, b) is b * a.
                self.writer.write("(");
                if let Some(&b) = args.get(1) {
                    self.output_expression(b);
                }
                self.writer.write(" * ");
                if let Some(&a) = args.first() {
                    self.output_expression(a);
                }
                self.writer.write(")");
            }
            "saturate" => {
                self.writer.write("clamp(");
                if let Some(&a) = args.first() {
                    self.output_expression(a);
                }
                self.writer.write(", 0.0, 1.0)");
            }
            "mad" => {
                self.writer.write("(");
                if let Some(&a) = args.first() {
                    self.output_expression(a);
                }
                self.writer.write(" * ");
                if let Some(&b) = args.get(1) {
                    self.output_expression(b);
                }
                self.writer.write(" + ");
                if let Some(&c) = args.get(2) {
                    self.output_expression(c);
                }
                self.writer.write(")");
            }
            "tex2Dcmp" => {
                let sample = self.sample_function("");
                self.writer.write(&format!("{sample}("));
                if let Some(&tex) = args.first() {
                    self.output_expression(tex);
                }
                self.writer.write(", (");
                if let Some(&coord) = args.get(1) {
                    self.output_expression(coord);
                }
                self.writer.write(").xyz)");
            }
            _ => {
                let mapped = match name {
                    "lerp" => "mix",
                    "frac" => "fract",
                    "rsqrt" => "inversesqrt",
                    "ddx" => "dFdx",
                    "ddy" => "dFdy",
                    "fmod" => "mod",
                    "atan2" => "atan",
                    "clip" => {
                        let helper = self.clip_function.clone();
                        self.write_plain_call(&helper, &args);
                        return;
                    }
                    "rcp" => {
                        let helper = self.rcp_function.clone();
                        self.write_plain_call(&helper, &args);
                        return;
                    }
                    "sincos" => {
                        let helper = self.sincos_function.clone();
                        self.write_plain_call(&helper, &args);
                        return;
                    }
                    other => other,
                };
                self.write_plain_call(mapped, &args);
            }
        }
    }

    fn write_plain_call(&mut self, name: &str, args: &[Handle<Expression>]) {
        self.writer.write(&format!("{name}("));
        for (i, &arg) in args.iter().enumerate() {
            if i > 0 {
                self.writer.write(", ");
            }
            self.output_expression(arg);
        }
        self.writer.write(")");
    }

    fn sample_function(&self, dimension: &str) -> String {
        if self.version.is_legacy() {
            format!("texture{dimension}")
        } else {
            "texture".to_string()
        }
    }

    fn legacy_dimension(owner: BaseType) -> &'static str {
        match owner {
            BaseType::Texture1D | BaseType::Texture1DArray => "1D",
            BaseType::Texture3D => "3D",
            BaseType::TextureCube | BaseType::TextureCubeArray => "Cube",
            _ => "2D",
        }
    }

    fn output_method_call(
        &mut self,
        object: Handle<Expression>,
        method: &'static Intrinsic,
        args: Option<Handle<Expression>>,
    ) {
        let texture = self.capture(|e| e.output_expression(object));
        let args = self.module.expression_list(args);
        let dimension = Self::legacy_dimension(method.method_owner());

        match method.name {
            "Sample" => {
                // The sampler argument folds into the combined sampler.
                let function = self.sample_function(dimension);
                self.writer.write(&format!("{function}({texture}, "));
                if let Some(&coord) = args.get(1) {
                    self.output_expression(coord);
                }
                self.writer.write(")");
            }
            "SampleLod" => {
                let function = if self.version.is_legacy() {
                    format!("texture{dimension}Lod")
                } else {
                    "textureLod".to_string()
                };
                self.writer.write(&format!("{function}({texture}, "));
                if let Some(&coord) = args.first() {
                    self.output_expression(coord);
                }
                self.writer.write(", ");
                if let Some(&lod) = args.get(1) {
                    self.output_expression(lod);
                }
                self.writer.write(")");
            }
            "SampleLodOffset" => {
                self.writer.write(&format!("textureLodOffset({texture}, "));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            "Gather" => {
                self.writer.write(&format!("textureGather({texture}, "));
                for (i, &arg) in args.iter().enumerate() {
                    if i > 0 {
                        self.writer.write(", ");
                    }
                    self.output_expression(arg);
                }
                self.writer.write(")");
            }
            other => {
                self.writer.write(&format!("{other}({texture}, "));
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emit_with(source: &str, stage: ShaderStage, entry: &str, version: GlslVersion) -> String {
        let mut module = slx_parser::parse(source, "test.sl").expect("parse");
        let backend = GlslBackend::new(version);
        backend
            .emit(&mut module, &EmitOptions::new(stage, entry))
            .expect("emit")
    }

    fn emit(source: &str, stage: ShaderStage, entry: &str) -> String {
        emit_with(source, stage, entry, GlslVersion::V140)
    }

    const VERTEX_SHADER: &str = "\
        cbuffer Globals { float4x4 worldViewProj; };\n\
        struct Input { float4 position : POSITION; float2 uv : TEXCOORD0; };\n\
        struct Output { float4 position : POSITION; float2 uv : TEXCOORD0; };\n\
        Output main(Input input) {\n\
            Output output;\n\
            output.position = mul(input.position, worldViewProj);\n\
            output.uv = input.uv;\n\
            return output;\n\
        }\n";

    #[test]
    fn version_header_comes_first() {
        let out = emit(VERTEX_SHADER, ShaderStage::Vertex, "main");
        assert!(out.starts_with("#version 140\n"));
    }

    #[test]
    fn vertex_wrapper_routes_semantics() {
        let out = emit(VERTEX_SHADER, ShaderStage::Vertex, "main");
        assert!(out.contains("in vec4 vertex_POSITION;"));
        assert!(out.contains("in vec2 vertex_TEXCOORD0;"));
        assert!(out.contains("out vec2 frag_TEXCOORD0;"));
        assert!(out.contains("void main() {"));
        assert!(out.contains("gl_Position = result_.position;"));
        assert!(out.contains("frag_TEXCOORD0 = result_.uv;"));
    }

    #[test]
    fn reserved_identifiers_are_sanitized() {
        let out = emit(VERTEX_SHADER, ShaderStage::Vertex, "main");
        assert!(out.contains("input_"));
        assert!(out.contains("output_"));
        assert!(!out.contains(" input;"));
    }

    #[test]
    fn cbuffer_becomes_uniform_block() {
        let out = emit(VERTEX_SHADER, ShaderStage::Vertex, "main");
        assert!(out.contains("layout(std140) uniform cb_Globals {"));
        assert!(out.contains("mat4 worldViewProj;"));
    }

    #[test]
    fn legacy_version_uses_plain_uniforms() {
        let out = emit_with(VERTEX_SHADER, ShaderStage::Vertex, "main", GlslVersion::V110);
        assert!(out.contains("uniform mat4 worldViewProj;"));
        assert!(!out.contains("layout(std140)"));
        assert!(out.contains("attribute vec4 vertex_POSITION;"));
        assert!(out.contains("varying vec2 frag_TEXCOORD0;"));
    }

    #[test]
    fn mul_swaps_operands() {
        let out = emit(VERTEX_SHADER, ShaderStage::Vertex, "main");
        assert!(out.contains("(worldViewProj * "));
    }

    #[test]
    fn fragment_shader_declares_color_output() {
        let out = emit(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("in vec2 frag_TEXCOORD0;"));
        assert!(out.contains("out vec4 out_COLOR;"));
        assert!(out.contains("out_COLOR = result_;"));
    }

    #[test]
    fn legacy_fragment_uses_gl_fragcolor() {
        let out = emit_with(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
            GlslVersion::V110,
        );
        assert!(out.contains("gl_FragColor = result_;"));
    }

    #[test]
    fn intrinsics_map_to_glsl_names() {
        let out = emit(
            "float4 main(float2 uv : TEXCOORD0) : COLOR {\n\
                 float a = lerp(0.0, 1.0, uv.x);\n\
                 float b = frac(uv.y) + rsqrt(uv.x) + saturate(uv.y);\n\
                 float c = fmod(a, b) + ddx(a) + ddy(b);\n\
                 return float4(a, b, c, 1.0);\n\
             }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("mix("));
        assert!(out.contains("fract("));
        assert!(out.contains("inversesqrt("));
        assert!(out.contains("clamp(uv.y, 0.0, 1.0)")
            || out.contains("clamp((uv).y, 0.0, 1.0)"));
        assert!(out.contains("mod("));
        assert!(out.contains("dFdx("));
        assert!(out.contains("dFdy("));
    }

    #[test]
    fn texture_sample_becomes_combined_sampler() {
        let out = emit(
            "Texture2D albedo : register(t0);\n\
             SamplerState samp : register(s0);\n\
             float4 main(float2 uv : TEXCOORD0) : COLOR { return albedo.Sample(samp, uv); }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("uniform sampler2D albedo;"));
        assert!(!out.contains("SamplerState"));
        assert!(out.contains("texture(albedo, uv)"));
    }

    #[test]
    fn sample_lod_maps_to_texture_lod() {
        let out = emit(
            "Texture2D albedo : register(t0);\n\
             float4 main(float2 uv : TEXCOORD0) : COLOR { return albedo.SampleLod(uv, 2.0); }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("textureLod(albedo, uv, 2.0)"));
    }

    #[test]
    fn clip_generates_a_helper() {
        let out = emit(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { clip(uv.x); return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
        );
        // "clip" itself is in the intern pool, so the helper shifts to a
        // fresh name and the call site follows it.
        assert!(out.contains("void clip1(float v) { if (v < 0.0) discard; }"));
        assert!(out.contains("clip1((uv).x)"));
    }

    #[test]
    fn helper_names_avoid_collisions() {
        let out = emit(
            "float clip;\n\
             float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, clip, 1.0); }",
            ShaderStage::Fragment,
            "main",
        );
        // The user symbol keeps its name; the generated helper moves away.
        assert!(out.contains("void clip1(float v)"));
        assert!(out.contains("float4(uv, clip, 1.0)")
            || out.contains("vec4(uv, clip, 1.0)"));
    }

    #[test]
    fn matrix_element_access_becomes_indexing() {
        let out = emit(
            "float4x4 m;\n\
             float main(float2 uv : TEXCOORD0) : COLOR { return m._m00 + m._12; }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("(m)[0][0]"));
        assert!(out.contains("(m)[0][1]"));
    }

    #[test]
    fn compute_layout_from_numthreads() {
        let out = emit(
            "[numthreads(8, 4, 1)] void main() { }",
            ShaderStage::Compute,
            "main",
        );
        assert!(out
            .contains("layout(local_size_x = 8, local_size_y = 4, local_size_z = 1) in;"));
    }

    #[test]
    fn buffer_member_access_flattens() {
        let out = emit(
            "cbuffer Globals { float scale; };\n\
             float main(float x : TEXCOORD0) : COLOR { return x * Globals.scale; }",
            ShaderStage::Fragment,
            "main",
        );
        assert!(out.contains("(x * scale)"));
    }

    #[test]
    fn es_version_adds_precision() {
        let out = emit_with(
            "float4 main(float2 uv : TEXCOORD0) : COLOR { return float4(uv, 0.0, 1.0); }",
            ShaderStage::Fragment,
            "main",
            GlslVersion::V300Es,
        );
        assert!(out.starts_with("#version 300 es\nprecision highp float;\n"));
    }

    #[test]
    fn unknown_entry_point_is_an_error() {
        let mut module = slx_parser::parse("float f() { return 1.0; }", "t").unwrap();
        let err = GlslBackend::new(GlslVersion::V140)
            .emit(&mut module, &EmitOptions::new(ShaderStage::Vertex, "main"))
            .unwrap_err();
        assert!(matches!(err, BackendError::UnknownEntryPoint(_)));
    }
}
