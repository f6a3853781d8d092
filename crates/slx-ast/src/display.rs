//! Display implementations and a text dump for debugging.

use std::fmt;

use crate::arena::Handle;
use crate::decl::ArgumentModifier;
use crate::expr::{BinaryOp, Callee, Expression, ExpressionKind, Literal, UnaryOp};
use crate::stmt::{AttributeKind, Statement, StatementKind};
use crate::types::{BaseType, NumericType, Type};
use crate::Module;

impl fmt::Display for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description().name)
    }
}

impl fmt::Display for NumericType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Float => "float",
            Self::Half => "half",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Uint => "uint",
            Self::NaN => "non-numeric",
        })
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl fmt::Display for ArgumentModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "",
            Self::In => "in",
            Self::Out => "out",
            Self::Inout => "inout",
            Self::Uniform => "uniform",
            Self::Const => "const",
        })
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Unroll => "unroll",
            Self::Flatten => "flatten",
            Self::Branch => "branch",
            Self::NoFastMath => "nofastmath",
            Self::NumThreads => "numthreads",
        })
    }
}

fn format_type(module: &Module, ty: &Type) -> String {
    let mut out = String::new();
    if ty.is_const() {
        out.push_str("const ");
    }
    out.push_str(module.type_name(ty));
    if ty.is_read_texture() || ty.is_write_texture() {
        out.push_str(&format!("<{}>", ty.sampler_type));
    }
    if ty.array {
        out.push_str("[]");
    }
    out
}

fn format_expr(module: &Module, handle: Handle<Expression>) -> String {
    let expr = &module.expressions[handle];
    let expr_ty = expr.ty.clone();
    match &expr.kind {
        ExpressionKind::Literal(Literal::Float(v)) => format!("{v:?}f"),
        ExpressionKind::Literal(Literal::Half(v)) => format!("{v:?}h"),
        ExpressionKind::Literal(Literal::Int(v)) => format!("{v}"),
        ExpressionKind::Literal(Literal::Bool(v)) => format!("{v}"),
        ExpressionKind::Identifier { name, .. } => module.interner.get(*name).to_string(),
        ExpressionKind::Cast { expr } => {
            format!("({})({expr:?})", format_type(module, &expr_ty))
        }
        ExpressionKind::Constructor { ty, .. } => {
            format!("{}(...)", module.type_name(ty))
        }
        ExpressionKind::Unary { op, expr } => format!("{op}{expr:?}"),
        ExpressionKind::Binary { op, left, right } => format!("({left:?} {op} {right:?})"),
        ExpressionKind::Conditional {
            condition,
            if_true,
            if_false,
        } => format!("({condition:?} ? {if_true:?} : {if_false:?})"),
        ExpressionKind::Member { object, field, .. } => {
            format!("{object:?}.{}", module.interner.get(*field))
        }
        ExpressionKind::Index { base, index } => format!("{base:?}[{index:?}]"),
        ExpressionKind::Call { callee, .. } => match callee {
            Callee::User(f) => format!("call {}", module.interner.get(module.functions[*f].name)),
            Callee::Intrinsic(i) => format!("call {}", i.name),
        },
        ExpressionKind::Method { method, object, .. } => {
            format!("{object:?}.{}(...)", method.name)
        }
    }
}

fn write_statement(out: &mut String, module: &Module, handle: Handle<Statement>, indent: usize) {
    let pad = " ".repeat(indent);
    let stmt = &module.statements[handle];
    match &stmt.kind {
        StatementKind::Declaration(decl) => {
            let mut cursor = Some(*decl);
            while let Some(d) = cursor {
                let decl = &module.declarations[d];
                out.push_str(&format!(
                    "{pad}var {}: {}\n",
                    module.interner.get(decl.name),
                    format_type(module, &decl.ty)
                ));
                cursor = decl.next;
            }
        }
        StatementKind::Struct(s) => {
            let structure = &module.structs[*s];
            out.push_str(&format!(
                "{pad}struct {} {{\n",
                module.interner.get(structure.name)
            ));
            let mut cursor = structure.fields;
            while let Some(f) = cursor {
                let field = &module.fields[f];
                let semantic = match field.semantic {
                    Some(s) => format!(" : {}", module.interner.get(s)),
                    None => String::new(),
                };
                out.push_str(&format!(
                    "{pad}    {}: {}{semantic}\n",
                    module.interner.get(field.name),
                    format_type(module, &field.ty)
                ));
                cursor = field.next;
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        StatementKind::Buffer(b) => {
            let buffer = &module.buffers[*b];
            let name = match buffer.name {
                Some(n) => module.interner.get(n),
                None => "_",
            };
            out.push_str(&format!("{pad}cbuffer {name} {{\n"));
            let mut cursor = buffer.fields;
            while let Some(d) = cursor {
                let field = &module.declarations[d];
                out.push_str(&format!(
                    "{pad}    {}: {}\n",
                    module.interner.get(field.name),
                    format_type(module, &field.ty)
                ));
                cursor = field.next;
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        StatementKind::Function(f) => {
            let function = &module.functions[*f];
            let args: Vec<_> = module
                .argument_list(function.arguments)
                .into_iter()
                .map(|a| {
                    let arg = &module.arguments[a];
                    format!(
                        "{}: {}",
                        module.interner.get(arg.name),
                        format_type(module, &arg.ty)
                    )
                })
                .collect();
            out.push_str(&format!(
                "{pad}fn {}({}) -> {}",
                module.interner.get(function.name),
                args.join(", "),
                format_type(module, &function.return_type)
            ));
            if function.defined {
                out.push_str(" {\n");
                let mut cursor = function.body;
                while let Some(s) = cursor {
                    write_statement(out, module, s, indent + 4);
                    cursor = module.statements[s].next;
                }
                out.push_str(&format!("{pad}}}\n"));
            } else {
                out.push_str(";  // forward\n");
            }
        }
        StatementKind::Expression(e) => {
            out.push_str(&format!(
                "{pad}{}  [{}]\n",
                format_expr(module, *e),
                format_type(module, &module.expressions[*e].ty)
            ));
        }
        StatementKind::Return(value) => match value {
            Some(v) => out.push_str(&format!("{pad}return {}\n", format_expr(module, *v))),
            None => out.push_str(&format!("{pad}return\n")),
        },
        StatementKind::Discard => out.push_str(&format!("{pad}discard\n")),
        StatementKind::Break => out.push_str(&format!("{pad}break\n")),
        StatementKind::Continue => out.push_str(&format!("{pad}continue\n")),
        StatementKind::If {
            condition,
            body,
            else_body,
        } => {
            out.push_str(&format!("{pad}if {} {{\n", format_expr(module, *condition)));
            let mut cursor = *body;
            while let Some(s) = cursor {
                write_statement(out, module, s, indent + 4);
                cursor = module.statements[s].next;
            }
            if else_body.is_some() {
                out.push_str(&format!("{pad}}} else {{\n"));
                let mut cursor = *else_body;
                while let Some(s) = cursor {
                    write_statement(out, module, s, indent + 4);
                    cursor = module.statements[s].next;
                }
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        StatementKind::For { body, .. } => {
            out.push_str(&format!("{pad}for {{\n"));
            let mut cursor = *body;
            while let Some(s) = cursor {
                write_statement(out, module, s, indent + 4);
                cursor = module.statements[s].next;
            }
            out.push_str(&format!("{pad}}}\n"));
        }
        StatementKind::Block { body } => {
            out.push_str(&format!("{pad}{{\n"));
            let mut cursor = *body;
            while let Some(s) = cursor {
                write_statement(out, module, s, indent + 4);
                cursor = module.statements[s].next;
            }
            out.push_str(&format!("{pad}}}\n"));
        }
    }
}

/// Produces a human-readable text dump of a [`Module`] for debugging.
pub fn dump_module(module: &Module) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Module: {} statements, {} expressions, {} strings\n",
        module.statements.len(),
        module.expressions.len(),
        module.interner.len()
    ));
    let mut cursor = module.root;
    while let Some(handle) = cursor {
        write_statement(&mut out, module, handle, 0);
        cursor = module.statements[handle].next;
    }
    out
}
