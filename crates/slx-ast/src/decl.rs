//! Declarations: variables, structs, buffers, functions, and the
//! intrinsic signature record.

use crate::arena::Handle;
use crate::expr::Expression;
use crate::intern::Name;
use crate::stmt::Statement;
use crate::types::{BaseType, Type, TypeFlags};
use crate::Origin;

/// A variable declaration (global, local, or buffer field).
///
/// Comma-separated declarators sharing one base type are chained through
/// `next`.
#[derive(Clone, Debug)]
pub struct Declaration {
    pub name: Name,
    pub ty: Type,
    pub register_name: Option<Name>,
    pub semantic: Option<Name>,
    /// Initializer; for array declarations this heads an expression list.
    pub assignment: Option<Handle<Expression>>,
    /// The cbuffer/tbuffer this declaration is a field of.
    pub buffer: Option<Handle<BufferDecl>>,
    /// Sampler-state block attached to a `SamplerState` declaration.
    pub sampler_state: Option<Handle<SamplerStateDecl>>,
    pub hidden: bool,
    pub next: Option<Handle<Declaration>>,
    pub origin: Origin,
}

/// A struct declaration.
#[derive(Clone, Debug)]
pub struct StructDecl {
    pub name: Name,
    pub fields: Option<Handle<StructField>>,
    pub origin: Origin,
}

/// A single field of a struct.
#[derive(Clone, Debug)]
pub struct StructField {
    pub name: Name,
    pub ty: Type,
    pub semantic: Option<Name>,
    /// System-value semantic substituted by a backend.
    pub sv_semantic: Option<Name>,
    pub hidden: bool,
    pub next: Option<Handle<StructField>>,
    pub origin: Origin,
}

/// A cbuffer/tbuffer declaration. The name is optional; anonymous buffers
/// cannot be member-accessed.
#[derive(Clone, Debug)]
pub struct BufferDecl {
    pub name: Option<Name>,
    pub register_name: Option<Name>,
    pub fields: Option<Handle<Declaration>>,
    pub origin: Origin,
}

/// Parameter passing modifier.
#[derive(Clone, Copy, Debug, Default, Hash, Eq, PartialEq)]
pub enum ArgumentModifier {
    #[default]
    None,
    In,
    Out,
    Inout,
    Uniform,
    Const,
}

/// A formal function parameter.
#[derive(Clone, Debug)]
pub struct Argument {
    pub name: Name,
    pub ty: Type,
    pub modifier: ArgumentModifier,
    pub semantic: Option<Name>,
    pub sv_semantic: Option<Name>,
    pub default_value: Option<Handle<Expression>>,
    pub next: Option<Handle<Argument>>,
    pub origin: Origin,
}

/// A function declaration or definition.
#[derive(Clone, Debug)]
pub struct FunctionDecl {
    pub name: Name,
    pub return_type: Type,
    pub semantic: Option<Name>,
    pub sv_semantic: Option<Name>,
    pub arguments: Option<Handle<Argument>>,
    pub num_arguments: u32,
    pub num_output_arguments: u32,
    /// Body statement list; `None` until (and unless) a definition is seen.
    pub body: Option<Handle<Statement>>,
    /// `true` once a definition (even an empty one) has been parsed.
    pub defined: bool,
    /// For a forward declaration, the later definition it resolved to.
    pub forward: Option<Handle<FunctionDecl>>,
    pub origin: Origin,
}

/// A sampler-state block `{ AddressU = Wrap; ... }`.
#[derive(Clone, Debug)]
pub struct SamplerStateDecl {
    pub assignments: Option<Handle<StateAssignment>>,
    pub num_assignments: u32,
    pub origin: Origin,
}

/// The value assigned to a sampler state.
#[derive(Clone, Copy, Debug)]
pub enum StateValue {
    Enum { name: &'static str, value: i32 },
    Float(f32),
    Color([f32; 4]),
}

/// One `Name = value;` entry inside a sampler-state block.
#[derive(Clone, Debug)]
pub struct StateAssignment {
    pub state_name: &'static str,
    pub d3d_render_state: i32,
    pub value: StateValue,
    pub next: Option<Handle<StateAssignment>>,
    pub origin: Origin,
}

/// A built-in function or texture-method signature.
///
/// Intrinsics live in static tables rather than the module arenas; a
/// resolved call stores a `&'static` reference to its row. For texture
/// methods, `args[0].sampler_type` carries the four-component return type
/// used for the return-match bonus and `args[1].sampler_type` carries the
/// owning texture type used as the self-type filter.
#[derive(Clone, Debug)]
pub struct Intrinsic {
    pub name: &'static str,
    pub return_type: Type,
    pub num_args: usize,
    pub args: [Type; 4],
}

impl Intrinsic {
    /// Builds a signature; intrinsic parameters are const.
    pub fn new(name: &'static str, return_type: BaseType, args: &[BaseType]) -> Self {
        assert!(args.len() <= 4);
        let mut arg_types = [
            Type::new(BaseType::Unknown),
            Type::new(BaseType::Unknown),
            Type::new(BaseType::Unknown),
            Type::new(BaseType::Unknown),
        ];
        for (slot, &base) in arg_types.iter_mut().zip(args) {
            let mut ty = Type::new(base);
            ty.flags = TypeFlags::CONST;
            *slot = ty;
        }
        Self {
            name,
            return_type: Type::new(return_type),
            num_args: args.len(),
            args: arg_types,
        }
    }

    /// The parameter types of this signature.
    pub fn arg_types(&self) -> &[Type] {
        &self.args[..self.num_args]
    }

    /// The texture type a method is bound to.
    pub fn method_owner(&self) -> BaseType {
        self.args[1].sampler_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_signature() {
        let dot = Intrinsic::new("dot", BaseType::Float, &[BaseType::Float3, BaseType::Float3]);
        assert_eq!(dot.num_args, 2);
        assert_eq!(dot.return_type.base, BaseType::Float);
        assert_eq!(dot.arg_types().len(), 2);
        assert_eq!(dot.arg_types()[1].base, BaseType::Float3);
        assert!(dot.args[0].flags.contains(TypeFlags::CONST));
    }

    #[test]
    fn intrinsic_zero_args() {
        let i = Intrinsic::new("f", BaseType::Void, &[]);
        assert!(i.arg_types().is_empty());
    }

    #[test]
    fn argument_modifier_default() {
        assert_eq!(ArgumentModifier::default(), ArgumentModifier::None);
    }
}
