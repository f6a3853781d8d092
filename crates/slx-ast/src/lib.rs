//! Typed AST for the SLX shading-language translator.
//!
//! All nodes live in per-kind arenas owned by a [`Module`] and reference
//! each other through integer [`Handle`]s; sibling lists (statements,
//! fields, arguments, expression lists) are intrusive singly-linked
//! chains of handles. Identifiers and file names are interned, so name
//! equality is handle equality.

pub mod arena;
mod decl;
mod display;
mod expr;
mod intern;
mod stmt;
mod types;

pub use arena::{Arena, Handle};
pub use decl::{
    Argument, ArgumentModifier, BufferDecl, Declaration, FunctionDecl, Intrinsic,
    SamplerStateDecl, StateAssignment, StateValue, StructDecl, StructField,
};
pub use display::dump_module;
pub use expr::{
    BinaryOp, Callee, Expression, ExpressionKind, Literal, UnaryOp, CONDITIONAL_PRIORITY,
};
pub use intern::{Interner, Name};
pub use stmt::{Attribute, AttributeKind, Statement, StatementKind};
pub use types::{
    BaseType, ImageFormat, ImageFormatDescription, NumericType, Type, TypeDescription, TypeFlags,
};

/// Source position a node originated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Origin {
    pub file: Name,
    pub line: u32,
}

/// A parsed, typed translation unit: the arenas for every node kind, the
/// intern pool, and the head of the top-level statement list.
#[derive(Clone, Debug, Default)]
pub struct Module {
    pub interner: Interner,
    pub expressions: Arena<Expression>,
    pub statements: Arena<Statement>,
    pub declarations: Arena<Declaration>,
    pub structs: Arena<StructDecl>,
    pub fields: Arena<StructField>,
    pub buffers: Arena<BufferDecl>,
    pub functions: Arena<FunctionDecl>,
    pub arguments: Arena<Argument>,
    pub attributes: Arena<Attribute>,
    pub sampler_states: Arena<SamplerStateDecl>,
    pub state_assignments: Arena<StateAssignment>,
    /// First top-level statement.
    pub root: Option<Handle<Statement>>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// The display name of a type: the interned name for user-defined
    /// types and buffers, the table name otherwise.
    pub fn type_name<'a>(&'a self, ty: &Type) -> &'a str {
        match ty.base {
            BaseType::UserDefined | BaseType::Buffer => match ty.name {
                Some(name) => self.interner.get(name),
                None => ty.base.description().name,
            },
            base => base.description().name,
        }
    }

    /// Evaluates a constant integer expression, if it is one.
    ///
    /// Covers int literals, unary `+`/`-`/`!`, and the four arithmetic
    /// binary operators; anything else (including named constants) is
    /// reported as unknown.
    pub fn expression_value(&self, expr: Handle<Expression>) -> Option<i32> {
        match &self.expressions[expr].kind {
            ExpressionKind::Literal(Literal::Int(v)) => Some(*v),
            ExpressionKind::Unary { op, expr } => {
                let v = self.expression_value(*expr)?;
                match op {
                    UnaryOp::Negate => Some(-v),
                    UnaryOp::Positive => Some(v),
                    UnaryOp::Not => Some(i32::from(v == 0)),
                    _ => None,
                }
            }
            ExpressionKind::Binary { op, left, right } => {
                let a = self.expression_value(*left)?;
                let b = self.expression_value(*right)?;
                match op {
                    BinaryOp::Add => Some(a.wrapping_add(b)),
                    BinaryOp::Subtract => Some(a.wrapping_sub(b)),
                    BinaryOp::Multiply => Some(a.wrapping_mul(b)),
                    BinaryOp::Divide if b != 0 => Some(a / b),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Finds a function by source name. Forward declarations resolve to
    /// their definition when one exists.
    pub fn find_function(&self, name: &str) -> Option<Handle<FunctionDecl>> {
        for (handle, function) in self.functions.iter() {
            if self.interner.get(function.name) == name {
                return Some(function.forward.unwrap_or(handle));
            }
        }
        None
    }

    /// Finds a global struct by source name.
    pub fn find_struct(&self, name: &str) -> Option<Handle<StructDecl>> {
        for (handle, structure) in self.structs.iter() {
            if self.interner.get(structure.name) == name {
                return Some(handle);
            }
        }
        None
    }

    /// Finds a cbuffer/tbuffer by source name.
    pub fn find_buffer(&self, name: &str) -> Option<Handle<BufferDecl>> {
        for (handle, buffer) in self.buffers.iter() {
            if buffer.name.map(|n| self.interner.get(n)) == Some(name) {
                return Some(handle);
            }
        }
        None
    }

    /// Collects a linked expression list into a vector of handles.
    pub fn expression_list(&self, head: Option<Handle<Expression>>) -> Vec<Handle<Expression>> {
        let mut out = Vec::new();
        let mut cursor = head;
        while let Some(h) = cursor {
            out.push(h);
            cursor = self.expressions[h].next;
        }
        out
    }

    /// Collects a linked argument list into a vector of handles.
    pub fn argument_list(&self, head: Option<Handle<Argument>>) -> Vec<Handle<Argument>> {
        let mut out = Vec::new();
        let mut cursor = head;
        while let Some(h) = cursor {
            out.push(h);
            cursor = self.arguments[h].next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(module: &mut Module) -> Origin {
        Origin {
            file: module.interner.intern("test.sl"),
            line: 1,
        }
    }

    fn int_literal(module: &mut Module, v: i32) -> Handle<Expression> {
        let origin = origin(module);
        let mut ty = Type::new(BaseType::Int);
        ty.flags = TypeFlags::CONST;
        module.expressions.append(Expression {
            kind: ExpressionKind::Literal(Literal::Int(v)),
            ty,
            origin,
            next: None,
        })
    }

    #[test]
    fn expression_value_literals_and_arithmetic() {
        let mut module = Module::new();
        let four = int_literal(&mut module, 4);
        let three = int_literal(&mut module, 3);
        let origin = origin(&mut module);
        let product = module.expressions.append(Expression {
            kind: ExpressionKind::Binary {
                op: BinaryOp::Multiply,
                left: four,
                right: three,
            },
            ty: Type::new(BaseType::Int),
            origin,
            next: None,
        });
        assert_eq!(module.expression_value(product), Some(12));

        let negated = module.expressions.append(Expression {
            kind: ExpressionKind::Unary {
                op: UnaryOp::Negate,
                expr: product,
            },
            ty: Type::new(BaseType::Int),
            origin,
            next: None,
        });
        assert_eq!(module.expression_value(negated), Some(-12));
    }

    #[test]
    fn expression_value_unknown_for_identifiers() {
        let mut module = Module::new();
        let name = module.interner.intern("N");
        let origin = origin(&mut module);
        let ident = module.expressions.append(Expression {
            kind: ExpressionKind::Identifier {
                name,
                global: true,
            },
            ty: Type::new(BaseType::Int),
            origin,
            next: None,
        });
        assert_eq!(module.expression_value(ident), None);
    }

    #[test]
    fn expression_value_division_by_zero_is_unknown() {
        let mut module = Module::new();
        let one = int_literal(&mut module, 1);
        let zero = int_literal(&mut module, 0);
        let origin = origin(&mut module);
        let quotient = module.expressions.append(Expression {
            kind: ExpressionKind::Binary {
                op: BinaryOp::Divide,
                left: one,
                right: zero,
            },
            ty: Type::new(BaseType::Int),
            origin,
            next: None,
        });
        assert_eq!(module.expression_value(quotient), None);
    }

    #[test]
    fn type_name_lookup() {
        let mut module = Module::new();
        assert_eq!(module.type_name(&Type::new(BaseType::Float3)), "float3");

        let mut user = Type::new(BaseType::UserDefined);
        user.name = Some(module.interner.intern("VertexInput"));
        assert_eq!(module.type_name(&user), "VertexInput");
    }

    #[test]
    fn expression_list_walk() {
        let mut module = Module::new();
        let a = int_literal(&mut module, 1);
        let b = int_literal(&mut module, 2);
        module.expressions[a].next = Some(b);
        let list = module.expression_list(Some(a));
        assert_eq!(list, vec![a, b]);
        assert!(module.expression_list(None).is_empty());
    }
}
