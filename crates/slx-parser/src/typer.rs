//! Semantic analysis tables and algorithms: the implicit-conversion
//! lattice, overload comparison, and binary-operator result typing.

use slx_ast::{
    Argument, BaseType, Callee, FunctionDecl, Handle, Intrinsic, Module, NumericType, Type,
    TypeFlags,
};

/// Implicit conversion cost between numeric families. Rows are the source
/// family, columns the destination, in the order Float, Half, Bool, Int,
/// Uint. Lower is better; 0 is exact.
#[rustfmt::skip]
pub(crate) const NUMERIC_TYPE_RANK: [[i32; 5]; 5] = [
    //F  H  B  I  U
    [ 0, 4, 4, 4, 4 ], // Float
    [ 1, 0, 4, 4, 4 ], // Half
    [ 5, 5, 0, 5, 5 ], // Bool
    [ 5, 5, 4, 0, 3 ], // Int
    [ 5, 5, 4, 2, 0 ], // Uint
];

fn numeric_index(n: NumericType) -> usize {
    match n {
        NumericType::Float => 0,
        NumericType::Half => 1,
        NumericType::Bool => 2,
        NumericType::Int => 3,
        NumericType::Uint => 4,
        NumericType::NaN => unreachable!("NaN has no conversion rank"),
    }
}

/// Computes the cost of implicitly converting `src` to `dst`.
///
/// The result is −1 when no conversion exists; otherwise a small integer
/// where bit 0 marks a scalar promotion, bit 4 marks a truncation, and
/// bits 1..4 carry the numeric-family rank:
///
/// 1. exact match
/// 2. scalar dimension promotion (scalar → vector/matrix)
/// 3. conversion
/// 4. conversion + promotion
/// 5. truncation
/// 6. conversion + truncation
pub fn cast_rank(module: &Module, src: &Type, dst: &Type) -> i32 {
    if src.array != dst.array {
        return -1;
    }

    if src.array {
        let src_size = src.array_size.and_then(|h| module.expression_value(h));
        let dst_size = dst.array_size.and_then(|h| module.expression_value(h));
        if let (Some(a), Some(b)) = (src_size, dst_size) {
            if a != b {
                return -1;
            }
        }
    }

    if src.base == BaseType::UserDefined && dst.base == BaseType::UserDefined {
        return if src.name == dst.name { 0 } else { -1 };
    }

    if src.base == dst.base {
        if src.base.is_read_texture() || src.base.is_write_texture() {
            return if src.sampler_type == dst.sampler_type {
                0
            } else {
                -1
            };
        }
        return 0;
    }

    let src_desc = src.base.description();
    let dst_desc = dst.base.description();
    if src_desc.numeric == NumericType::NaN || dst_desc.numeric == NumericType::NaN {
        return -1;
    }

    // Result bits: T R R R P (T = truncation, R = family rank, P = promotion).
    let mut result =
        NUMERIC_TYPE_RANK[numeric_index(src_desc.numeric)][numeric_index(dst_desc.numeric)] << 1;

    if src_desc.dimensions == 0 && dst_desc.dimensions > 0 {
        // Scalar dimension promotion.
        result |= 1;
    } else if (src_desc.dimensions == dst_desc.dimensions
        && (src_desc.components > dst_desc.components || src_desc.height > dst_desc.height))
        || (src_desc.dimensions > 0 && dst_desc.dimensions == 0)
    {
        // Truncation.
        result |= 1 << 4;
    } else if src_desc.dimensions != dst_desc.dimensions
        || src_desc.components != dst_desc.components
        || src_desc.height != dst_desc.height
    {
        return -1;
    }

    result
}

/// A candidate for overload resolution: a user function or an intrinsic
/// table row.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Candidate {
    User(Handle<FunctionDecl>),
    Intrinsic(&'static Intrinsic),
}

impl Candidate {
    pub(crate) fn callee(self) -> Callee {
        match self {
            Self::User(f) => Callee::User(f),
            Self::Intrinsic(i) => Callee::Intrinsic(i),
        }
    }

    pub(crate) fn return_type(self, module: &Module) -> Type {
        match self {
            Self::User(f) => module.functions[f].return_type.clone(),
            Self::Intrinsic(i) => i.return_type.clone(),
        }
    }
}

/// Computes the per-argument cast ranks of a call against a candidate.
/// Returns `false` (candidate non-viable) when an argument has no
/// conversion or a trailing parameter has no default value.
pub(crate) fn call_cast_ranks(
    module: &Module,
    arg_types: &[Type],
    candidate: Candidate,
    ranks: &mut Vec<i32>,
) -> bool {
    ranks.clear();
    match candidate {
        Candidate::User(f) => {
            let function = &module.functions[f];
            if (function.num_arguments as usize) < arg_types.len() {
                return false;
            }
            let mut cursor: Option<Handle<Argument>> = function.arguments;
            for arg_ty in arg_types {
                let Some(h) = cursor else { return false };
                let param = &module.arguments[h];
                let rank = cast_rank(module, arg_ty, &param.ty);
                if rank == -1 {
                    return false;
                }
                ranks.push(rank);
                cursor = param.next;
            }
            // Parameters beyond the supplied arguments must have defaults.
            while let Some(h) = cursor {
                let param = &module.arguments[h];
                if param.default_value.is_none() {
                    return false;
                }
                cursor = param.next;
            }
            true
        }
        Candidate::Intrinsic(intrinsic) => {
            if intrinsic.num_args < arg_types.len() {
                return false;
            }
            // Intrinsic parameters never carry defaults.
            if intrinsic.num_args != arg_types.len() {
                return false;
            }
            for (arg_ty, param_ty) in arg_types.iter().zip(intrinsic.arg_types()) {
                let rank = cast_rank(module, arg_ty, param_ty);
                if rank == -1 {
                    return false;
                }
                ranks.push(rank);
            }
            true
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CompareResult {
    Equal,
    FirstBetter,
    SecondBetter,
}

/// Compares a candidate against the best match found so far by sorting
/// each rank vector descending and comparing lexicographically; the first
/// strictly smaller position wins.
pub(crate) fn compare_candidates(
    module: &Module,
    arg_types: &[Type],
    first: Candidate,
    second: Option<Candidate>,
) -> CompareResult {
    let mut ranks1 = Vec::with_capacity(arg_types.len());
    let mut ranks2 = Vec::with_capacity(arg_types.len());

    let first_viable = call_cast_ranks(module, arg_types, first, &mut ranks1);
    let second_viable = second
        .map(|c| call_cast_ranks(module, arg_types, c, &mut ranks2))
        .unwrap_or(false);

    // Both candidates have to be viable to be comparable.
    if !(first_viable && second_viable) {
        return if first_viable {
            CompareResult::FirstBetter
        } else if second_viable {
            CompareResult::SecondBetter
        } else {
            CompareResult::Equal
        };
    }

    ranks1.sort_unstable_by(|a, b| b.cmp(a));
    ranks2.sort_unstable_by(|a, b| b.cmp(a));

    for (r1, r2) in ranks1.iter().zip(&ranks2) {
        if r1 < r2 {
            return CompareResult::FirstBetter;
        }
        if r2 < r1 {
            return CompareResult::SecondBetter;
        }
    }

    CompareResult::Equal
}

/// Result type of `lhs op rhs` for the non-comparison operators, keyed by
/// the numeric sub-range of [`BaseType`]. `Unknown` means the combination
/// is not allowed. Several entries look inconsistent (`float + float2x2`
/// yielding `Float2x2` without a broadcast); the table is kept exactly as
/// the backend compilers expect it.
#[rustfmt::skip]
mod lookup {
    use slx_ast::BaseType;
    use slx_ast::BaseType::*;

    const U: BaseType = Unknown;

    pub(super) const BINARY_OP_TYPE_LOOKUP: [[BaseType; 30]; 30] = [
        [ // float
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Float, Float2, Float3, Float4,
            Float, Float2, Float3, Float4,
            Float, Float2, Float3, Float4,
        ],
        [ // float2
            Float2, Float2, Float2, Float2, U, U, U, U, U,
            Float2, Float2, Float2, Float2, U, U, U, U, U,
            Float2, Float2, Float2, Float2,
            Float2, Float2, Float2, Float2,
            Float2, Float2, Float2, Float2,
        ],
        [ // float3
            Float3, Float2, Float3, Float3, U, U, U, U, U,
            Float3, Float2, Float3, Float3, U, U, U, U, U,
            Float3, Float2, Float3, Float3,
            Float3, Float2, Float3, Float3,
            Float3, Float2, Float3, Float3,
        ],
        [ // float4
            Float4, Float2, Float3, Float4, U, U, U, U, U,
            Float4, Float2, Float3, Float4, U, U, U, U, U,
            Float4, Float2, Float3, Float4,
            Float4, Float2, Float3, Float4,
            Float4, Float2, Float3, Float4,
        ],
        [ // float2x2
            Float2x2, U, U, U, Float2x2, U, U, U, U,
            Float2x2, U, U, U, Float2x2, U, U, U, U,
            Float2x2, U, U, U,
            Float2x2, U, U, U,
            Float2x2, U, U, U,
        ],
        [ // float3x3
            Float3x3, U, U, U, U, Float3x3, U, U, U,
            Float3x3, U, U, U, U, Float3x3, U, U, U,
            Float3x3, U, U, U,
            Float3x3, U, U, U,
            Float3x3, U, U, U,
        ],
        [ // float4x4
            Float4x4, U, U, U, U, U, Float4x4, U, U,
            Float4x4, U, U, U, U, U, Float4x4, U, U,
            Float4x4, U, U, U,
            Float4x4, U, U, U,
            Float4x4, U, U, U,
        ],
        [ // float4x3
            Float4x3, U, U, U, U, U, U, Float4x3, U,
            Float4x3, U, U, U, U, U, U, Float4x3, U,
            Float4x3, U, U, U,
            Float4x3, U, U, U,
            Float4x3, U, U, U,
        ],
        [ // float4x2
            Float4x2, U, U, U, U, U, U, U, Float4x2,
            Float4x2, U, U, U, U, U, U, U, Float4x2,
            Float4x2, U, U, U,
            Float4x2, U, U, U,
            Float4x2, U, U, U,
        ],
        [ // half
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Half, Half2, Half3, Half4,
            Half, Half2, Half3, Half4,
            Half, Half2, Half3, Half4,
        ],
        [ // half2
            Float2, Float2, Float2, Float2, U, U, U, U, U,
            Half2, Half2, Half2, Half2, U, U, U, U, U,
            Half2, Half2, Half2, Half2,
            Half2, Half2, Half2, Half2,
            Half2, Half2, Half2, Half2,
        ],
        [ // half3
            Float3, Float2, Float3, Float3, U, U, U, U, U,
            Half3, Half2, Half3, Half3, U, U, U, U, U,
            Half3, Half2, Half3, Half3,
            Half3, Half2, Half3, Half3,
            Half3, Half2, Half3, Half3,
        ],
        [ // half4
            Float4, Float2, Float3, Float4, U, U, U, U, U,
            Half4, Half2, Half3, Half4, U, U, U, U, U,
            Half4, Half2, Half3, Half4,
            Half4, Half2, Half3, Half4,
            Half4, Half2, Half3, Half4,
        ],
        [ // half2x2
            Float2x2, U, U, U, Float2x2, U, U, U, U,
            Half2x2, U, U, U, Half2x2, U, U, U, U,
            Half2x2, U, U, U,
            Half2x2, U, U, U,
            Half2x2, U, U, U,
        ],
        [ // half3x3
            Float3x3, U, U, U, U, Float3x3, U, U, U,
            Half3x3, U, U, U, U, Half3x3, U, U, U,
            Half3x3, U, U, U,
            Half3x3, U, U, U,
            Half3x3, U, U, U,
        ],
        [ // half4x4
            Float4x4, U, U, U, U, U, Float4x4, U, U,
            Half4x4, U, U, U, U, U, Half4x4, U, U,
            Half4x4, U, U, U,
            Half4x4, U, U, U,
            Half4x4, U, U, U,
        ],
        [ // half4x3
            Float4x3, U, U, U, U, U, U, Float4x3, U,
            Half4x3, U, U, U, U, U, U, Half4x3, U,
            Half4x3, U, U, U,
            Half4x3, U, U, U,
            Half4x3, U, U, U,
        ],
        [ // half4x2
            Float4x2, U, U, U, U, U, U, U, Float4x2,
            Half4x2, U, U, U, U, U, U, U, Half4x2,
            Half4x2, U, U, U,
            Half4x2, U, U, U,
            Half4x2, U, U, U,
        ],
        [ // bool
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Int, Int2, Int3, Int4,
            Int, Int2, Int3, Int4,
            Uint, Uint2, Uint3, Uint4,
        ],
        [ // bool2
            Float2, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half2, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Int2, Int2, Int3, Int4,
            Int2, Int2, Int3, Int4,
            Uint2, Uint2, Uint3, Uint4,
        ],
        [ // bool3
            Float3, Float3, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half3, Half3, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Int3, Int2, Int3, Int4,
            Int3, Int2, Int3, Int4,
            Uint3, Uint2, Uint3, Uint4,
        ],
        [ // bool4
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Int, Int2, Int3, Int4,
            Int, Int2, Int3, Int4,
            Uint, Uint2, Uint3, Uint4,
        ],
        [ // int
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Int, Int2, Int2, Int2,
            Int, Int2, Int3, Int4,
            Uint, Uint2, Uint3, Uint4,
        ],
        [ // int2
            Float2, Float2, Float2, Float2, U, U, U, U, U,
            Half2, Half2, Half2, Half2, U, U, U, U, U,
            Int2, Int2, Int2, Int2,
            Int2, Int2, Int2, Int2,
            Uint2, Uint2, Uint2, Uint2,
        ],
        [ // int3
            Float3, Float2, Float3, Float3, U, U, U, U, U,
            Half3, Half2, Half3, Half3, U, U, U, U, U,
            Int3, Int2, Int3, Int3,
            Int3, Int2, Int3, Int3,
            Uint3, Uint2, Uint3, Uint3,
        ],
        [ // int4
            Float4, Float2, Float3, Float4, U, U, U, U, U,
            Half4, Half2, Half3, Half4, U, U, U, U, U,
            Int4, Int2, Int3, Int4,
            Int4, Int2, Int3, Int4,
            Uint4, Uint2, Uint3, Uint4,
        ],
        [ // uint
            Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2,
            Half, Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2,
            Uint, Uint2, Uint3, Uint4,
            Uint, Uint2, Uint3, Uint4,
            Uint, Uint2, Uint3, Uint4,
        ],
        [ // uint2
            Float2, Float2, Float2, Float2, U, U, U, U, U,
            Half2, Half2, Half2, Half2, U, U, U, U, U,
            Uint2, Uint2, Uint2, Uint2,
            Uint2, Uint2, Uint2, Uint2,
            Uint2, Uint2, Uint2, Uint2,
        ],
        [ // uint3
            Float3, Float2, Float3, Float3, U, U, U, U, U,
            Half3, Half2, Half3, Half3, U, U, U, U, U,
            Uint3, Uint2, Uint3, Uint3,
            Uint3, Uint2, Uint3, Uint3,
            Uint3, Uint2, Uint3, Uint3,
        ],
        [ // uint4
            Float4, Float2, Float3, Float4, U, U, U, U, U,
            Half4, Half2, Half3, Half4, U, U, U, U, U,
            Uint4, Uint2, Uint3, Uint4,
            Uint4, Uint2, Uint3, Uint4,
            Uint4, Uint2, Uint3, Uint4,
        ],
    ];
}

use slx_ast::BinaryOp;

/// Computes the result type of `lhs op rhs`, or `None` when the operator
/// does not apply to the operand types.
///
/// Comparison and logical operators produce a bool whose width is the
/// larger operand's component count; everything else goes through the
/// lookup table. The result is const exactly when both operands are.
pub fn binary_op_result_type(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    if !lhs.base.is_numeric() || lhs.array || !rhs.base.is_numeric() || rhs.array {
        return None;
    }

    if op.is_bitwise() && (!lhs.base.is_integer() || !rhs.base.is_integer()) {
        return None;
    }

    let base = if op.is_boolean() {
        let components = lhs
            .base
            .description()
            .components
            .max(rhs.base.description().components);
        BaseType::from_index(BaseType::Bool as usize + components as usize - 1)?
    } else {
        let row = lhs.base as usize - BaseType::FIRST_NUMERIC as usize;
        let col = rhs.base as usize - BaseType::FIRST_NUMERIC as usize;
        lookup::BINARY_OP_TYPE_LOOKUP[row][col]
    };

    if base == BaseType::Unknown {
        return None;
    }

    let mut result = Type::new(base);
    result.flags = (lhs.flags & rhs.flags) & TypeFlags::CONST;
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(base: BaseType) -> Type {
        Type::new(base)
    }

    #[test]
    fn rank_is_zero_on_identity() {
        let module = Module::new();
        for base in [
            BaseType::Float,
            BaseType::Half3,
            BaseType::Bool2,
            BaseType::Int4,
            BaseType::Uint,
            BaseType::Float4x3,
        ] {
            assert_eq!(cast_rank(&module, &ty(base), &ty(base)), 0);
        }
    }

    #[test]
    fn rank_float_half_asymmetry() {
        let module = Module::new();
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Float), &ty(BaseType::Half)),
            4 << 1
        );
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Half), &ty(BaseType::Float)),
            1 << 1
        );
    }

    #[test]
    fn rank_int_uint_asymmetry() {
        let module = Module::new();
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Int), &ty(BaseType::Uint)),
            3 << 1
        );
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Uint), &ty(BaseType::Int)),
            2 << 1
        );
    }

    #[test]
    fn scalar_promotion_sets_low_bit() {
        let module = Module::new();
        let rank = cast_rank(&module, &ty(BaseType::Float), &ty(BaseType::Float4));
        assert_eq!(rank & 1, 1);
        assert!(rank >= 0);

        let converted = cast_rank(&module, &ty(BaseType::Int), &ty(BaseType::Float3));
        assert_eq!(converted & 1, 1);
        assert!(converted > rank);
    }

    #[test]
    fn truncation_sets_high_bit() {
        let module = Module::new();
        let rank = cast_rank(&module, &ty(BaseType::Float4), &ty(BaseType::Float));
        assert_eq!(rank & (1 << 4), 1 << 4);

        let narrowed = cast_rank(&module, &ty(BaseType::Float4), &ty(BaseType::Float2));
        assert_eq!(narrowed & (1 << 4), 1 << 4);
    }

    #[test]
    fn vector_widening_has_no_conversion() {
        let module = Module::new();
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Float2), &ty(BaseType::Float4)),
            -1
        );
    }

    #[test]
    fn texture_rank_requires_matching_sampler_type() {
        let module = Module::new();
        let mut a = ty(BaseType::Texture2D);
        a.sampler_type = BaseType::Float4;
        let mut b = ty(BaseType::Texture2D);
        b.sampler_type = BaseType::Float4;
        assert_eq!(cast_rank(&module, &a, &b), 0);
        b.sampler_type = BaseType::Float;
        assert_eq!(cast_rank(&module, &a, &b), -1);
    }

    #[test]
    fn array_mismatch_has_no_conversion() {
        let module = Module::new();
        let mut arr = ty(BaseType::Float);
        arr.array = true;
        assert_eq!(cast_rank(&module, &arr, &ty(BaseType::Float)), -1);
        assert_eq!(cast_rank(&module, &ty(BaseType::Float), &arr), -1);
        assert_eq!(cast_rank(&module, &arr, &arr), 0);
    }

    #[test]
    fn void_has_no_conversion() {
        let module = Module::new();
        assert_eq!(
            cast_rank(&module, &ty(BaseType::Void), &ty(BaseType::Float)),
            -1
        );
    }

    #[test]
    fn comparison_yields_bool_of_max_width() {
        let lhs = ty(BaseType::Float3);
        let rhs = ty(BaseType::Float);
        let result = binary_op_result_type(BinaryOp::Less, &lhs, &rhs).unwrap();
        assert_eq!(result.base, BaseType::Bool3);

        let result = binary_op_result_type(BinaryOp::Equal, &rhs, &rhs).unwrap();
        assert_eq!(result.base, BaseType::Bool);
    }

    #[test]
    fn bitwise_requires_integers() {
        assert!(binary_op_result_type(
            BinaryOp::BitAnd,
            &ty(BaseType::Float),
            &ty(BaseType::Int)
        )
        .is_none());
        assert!(binary_op_result_type(
            BinaryOp::BitAnd,
            &ty(BaseType::Int),
            &ty(BaseType::Uint)
        )
        .is_some());
    }

    #[test]
    fn arithmetic_uses_lookup_table() {
        let result =
            binary_op_result_type(BinaryOp::Add, &ty(BaseType::Int), &ty(BaseType::Float2))
                .unwrap();
        assert_eq!(result.base, BaseType::Float2);

        let result =
            binary_op_result_type(BinaryOp::Multiply, &ty(BaseType::Half), &ty(BaseType::Float))
                .unwrap();
        assert_eq!(result.base, BaseType::Float);

        assert!(binary_op_result_type(
            BinaryOp::Add,
            &ty(BaseType::Float2),
            &ty(BaseType::Float3x3)
        )
        .is_none());
    }

    #[test]
    fn constness_propagates_only_when_both_const() {
        let mut const_float = ty(BaseType::Float);
        const_float.flags = TypeFlags::CONST;
        let plain = ty(BaseType::Float);

        let both = binary_op_result_type(BinaryOp::Add, &const_float, &const_float).unwrap();
        assert!(both.is_const());
        let mixed = binary_op_result_type(BinaryOp::Add, &const_float, &plain).unwrap();
        assert!(!mixed.is_const());
    }

    #[test]
    fn matrices_are_rejected_by_comparisons_against_arrays() {
        let mut arr = ty(BaseType::Float);
        arr.array = true;
        assert!(binary_op_result_type(BinaryOp::Add, &arr, &ty(BaseType::Float)).is_none());
    }
}
