//! Statement and attribute nodes.

use crate::arena::Handle;
use crate::decl::{BufferDecl, Declaration, FunctionDecl, StructDecl};
use crate::expr::Expression;
use crate::Origin;

/// Kind of a `[...]` attribute.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum AttributeKind {
    #[default]
    Unknown,
    Unroll,
    Flatten,
    Branch,
    NoFastMath,
    NumThreads,
}

/// A single attribute; several attached to one statement chain through
/// `next`.
#[derive(Clone, Debug)]
pub struct Attribute {
    pub kind: AttributeKind,
    /// Argument expression list (`numthreads(x, y, z)`).
    pub args: Option<Handle<Expression>>,
    pub num_args: u32,
    pub next: Option<Handle<Attribute>>,
    pub origin: Origin,
}

/// A statement node. Top-level constructs (structs, buffers, functions,
/// global declarations) are statements too, exactly as in the grammar.
#[derive(Clone, Debug)]
pub struct Statement {
    pub kind: StatementKind,
    pub attributes: Option<Handle<Attribute>>,
    /// Suppressed by a backend (e.g. a pixel-stage POSITION input).
    pub hidden: bool,
    pub next: Option<Handle<Statement>>,
    pub origin: Origin,
}

#[derive(Clone, Debug)]
pub enum StatementKind {
    Declaration(Handle<Declaration>),
    Struct(Handle<StructDecl>),
    Buffer(Handle<BufferDecl>),
    Function(Handle<FunctionDecl>),
    Expression(Handle<Expression>),
    Return(Option<Handle<Expression>>),
    Discard,
    Break,
    Continue,
    If {
        condition: Handle<Expression>,
        body: Option<Handle<Statement>>,
        else_body: Option<Handle<Statement>>,
    },
    For {
        initialization: Handle<Declaration>,
        condition: Option<Handle<Expression>>,
        increment: Option<Handle<Expression>>,
        body: Option<Handle<Statement>>,
    },
    Block {
        body: Option<Handle<Statement>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_kind_default() {
        assert_eq!(AttributeKind::default(), AttributeKind::Unknown);
    }

    #[test]
    fn statement_kind_shapes() {
        let stmt = StatementKind::Block { body: None };
        assert!(matches!(stmt, StatementKind::Block { body: None }));
        assert!(matches!(StatementKind::Discard, StatementKind::Discard));
    }
}
