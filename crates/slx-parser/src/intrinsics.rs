//! The intrinsic-function and texture-method tables.
//!
//! Every numeric intrinsic exists once per vector width and per numeric
//! family so that overload resolution picks a precise width. Texture
//! methods encode their owning texture type in the second argument's
//! sampler type and the four-component return type in the first
//! argument's sampler type; method matching uses those as the self-type
//! filter and the return-match bonus.

use std::sync::LazyLock;

use slx_ast::BaseType::{self, *};
use slx_ast::Intrinsic;

pub(crate) static INTRINSICS: LazyLock<Vec<Intrinsic>> = LazyLock::new(build_intrinsics);
pub(crate) static METHODS: LazyLock<Vec<Intrinsic>> = LazyLock::new(build_methods);

/// Returns `true` if any intrinsic has the given name.
pub(crate) fn is_intrinsic(name: &str) -> bool {
    INTRINSICS.iter().any(|i| i.name == name)
}

const FLOAT_VECTORS: [BaseType; 4] = [Float, Float2, Float3, Float4];
const HALF_VECTORS: [BaseType; 4] = [Half, Half2, Half3, Half4];

/// One variant per float/half vector width, unary.
fn float1(table: &mut Vec<Intrinsic>, name: &'static str) {
    for ty in FLOAT_VECTORS.into_iter().chain(HALF_VECTORS) {
        table.push(Intrinsic::new(name, ty, &[ty]));
    }
}

/// One variant per float/half vector width, binary.
fn float2(table: &mut Vec<Intrinsic>, name: &'static str) {
    for ty in FLOAT_VECTORS.into_iter().chain(HALF_VECTORS) {
        table.push(Intrinsic::new(name, ty, &[ty, ty]));
    }
}

/// One variant per float/half vector width, ternary.
fn float3(table: &mut Vec<Intrinsic>, name: &'static str) {
    for ty in FLOAT_VECTORS.into_iter().chain(HALF_VECTORS) {
        table.push(Intrinsic::new(name, ty, &[ty, ty, ty]));
    }
}

fn build_intrinsics() -> Vec<Intrinsic> {
    let mut t = Vec::new();

    float1(&mut t, "abs");
    float1(&mut t, "acos");

    for arg in [
        Float, Float2, Float3, Float4, Float2x2, Float3x3, Float4x4, Float4x3, Float4x2, Half,
        Half2, Half3, Half4, Half2x2, Half3x3, Half4x4, Half4x3, Half4x2, Bool, Int, Int2, Int3,
        Int4, Uint, Uint2, Uint3, Uint4,
    ] {
        t.push(Intrinsic::new("any", Bool, &[arg]));
    }

    float1(&mut t, "asin");
    float1(&mut t, "atan");
    float2(&mut t, "atan2");
    float3(&mut t, "clamp");
    float1(&mut t, "cos");

    float3(&mut t, "lerp");
    float3(&mut t, "smoothstep");

    float1(&mut t, "floor");
    float1(&mut t, "ceil");
    float1(&mut t, "frac");

    float2(&mut t, "fmod");

    for arg in FLOAT_VECTORS.into_iter().chain(HALF_VECTORS) {
        t.push(Intrinsic::new("clip", Void, &[arg]));
    }

    for (ret, arg) in [(Float, FLOAT_VECTORS), (Half, HALF_VECTORS)] {
        for ty in arg {
            t.push(Intrinsic::new("dot", ret, &[ty, ty]));
        }
    }

    t.push(Intrinsic::new("cross", Float3, &[Float3, Float3]));

    for (ret, args) in [(Float, FLOAT_VECTORS), (Half, HALF_VECTORS)] {
        for ty in args {
            t.push(Intrinsic::new("length", ret, &[ty]));
        }
    }

    float2(&mut t, "max");
    float2(&mut t, "min");

    float2(&mut t, "mul");
    t.push(Intrinsic::new("mul", Float2, &[Float2, Float2x2]));
    t.push(Intrinsic::new("mul", Float3, &[Float3, Float3x3]));
    t.push(Intrinsic::new("mul", Float4, &[Float4, Float4x4]));
    t.push(Intrinsic::new("mul", Float2, &[Float2x2, Float2]));
    t.push(Intrinsic::new("mul", Float3, &[Float3x3, Float3]));
    t.push(Intrinsic::new("mul", Float4, &[Float4x4, Float4]));
    t.push(Intrinsic::new("mul", Float3, &[Float4, Float4x3]));
    t.push(Intrinsic::new("mul", Float2, &[Float4, Float4x2]));

    for ty in [Float2x2, Float3x3, Float4x4, Half2x2, Half3x3, Half4x4] {
        t.push(Intrinsic::new("transpose", ty, &[ty]));
    }

    float1(&mut t, "normalize");
    float2(&mut t, "pow");
    float1(&mut t, "saturate");
    float1(&mut t, "sin");
    float1(&mut t, "sqrt");
    float1(&mut t, "rsqrt");
    float1(&mut t, "rcp");
    float1(&mut t, "exp");
    float1(&mut t, "exp2");
    float1(&mut t, "log");
    float1(&mut t, "log2");

    float1(&mut t, "ddx");
    float1(&mut t, "ddy");

    float1(&mut t, "sign");
    float2(&mut t, "step");
    float2(&mut t, "reflect");

    float1(&mut t, "isnan");
    float1(&mut t, "isinf");

    t.push(Intrinsic::new("asuint", Uint, &[Float]));
    t.push(Intrinsic::new("asint", Int, &[Float]));
    t.push(Intrinsic::new("asfloat", Float, &[Uint]));
    t.push(Intrinsic::new("asfloat", Float, &[Int]));

    t.push(Intrinsic::new("tex2Dcmp", Float4, &[Texture2D, Float4]));

    t.push(Intrinsic::new("sincos", Void, &[Float, Float, Float]));
    t.push(Intrinsic::new("sincos", Void, &[Float2, Float, Float2]));
    t.push(Intrinsic::new("sincos", Void, &[Float3, Float, Float3]));
    t.push(Intrinsic::new("sincos", Void, &[Float4, Float, Float4]));
    t.push(Intrinsic::new("sincos", Void, &[Half, Half, Half]));
    t.push(Intrinsic::new("sincos", Void, &[Half2, Half2, Half2]));
    t.push(Intrinsic::new("sincos", Void, &[Half3, Half3, Half3]));
    t.push(Intrinsic::new("sincos", Void, &[Half4, Half4, Half4]));

    float3(&mut t, "mad");

    t
}

/// Return-type families for the texture methods, four components wide.
const METHOD_RETURNS: [BaseType; 4] = [Float4, Half4, Int4, Uint4];

/// Adds one method row per return family.
fn method(table: &mut Vec<Intrinsic>, name: &'static str, owner: BaseType, args: &[BaseType]) {
    for ret in METHOD_RETURNS {
        let mut intrinsic = Intrinsic::new(name, ret, args);
        intrinsic.args[0].sampler_type = ret;
        intrinsic.args[1].sampler_type = owner;
        table.push(intrinsic);
    }
}

fn build_methods() -> Vec<Intrinsic> {
    let mut t = Vec::new();

    for (owner, coord) in [
        (Texture1D, Float),
        (Texture2D, Float2),
        (Texture3D, Float3),
        (Texture1DArray, Float2),
        (Texture2DArray, Float3),
        (TextureCube, Float3),
        (TextureCubeArray, Float4),
    ] {
        method(&mut t, "Sample", owner, &[SamplerState, coord]);
    }

    for (owner, coord) in [
        (Texture1D, Float),
        (Texture2D, Float2),
        (Texture3D, Float3),
        (Texture1DArray, Float2),
        (Texture2DArray, Float3),
        (TextureCube, Float3),
        (TextureCubeArray, Float4),
    ] {
        method(&mut t, "SampleLod", owner, &[coord, Float]);
    }

    for (owner, coord, offset) in [
        (Texture1D, Float, Int),
        (Texture2D, Float2, Int2),
        (Texture3D, Float3, Int3),
        (Texture1DArray, Float2, Int2),
        (Texture2DArray, Float3, Int3),
    ] {
        method(&mut t, "SampleLodOffset", owner, &[coord, Float, offset]);
    }

    for (owner, coord) in [
        (Texture2D, Float2),
        (Texture2DArray, Float3),
        (TextureCube, Float3),
        (TextureCubeArray, Float4),
    ] {
        method(&mut t, "Gather", owner, &[coord, Int]);
    }

    t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsics_cover_both_families_per_width() {
        let abs: Vec<_> = INTRINSICS.iter().filter(|i| i.name == "abs").collect();
        assert_eq!(abs.len(), 8);
        assert!(abs.iter().any(|i| i.return_type.base == Float3));
        assert!(abs.iter().any(|i| i.return_type.base == Half4));
    }

    #[test]
    fn any_returns_scalar_bool() {
        let any: Vec<_> = INTRINSICS.iter().filter(|i| i.name == "any").collect();
        assert_eq!(any.len(), 27);
        assert!(any.iter().all(|i| i.return_type.base == Bool));
    }

    #[test]
    fn mul_has_matrix_forms() {
        let muls: Vec<_> = INTRINSICS.iter().filter(|i| i.name == "mul").collect();
        assert_eq!(muls.len(), 16);
        assert!(muls
            .iter()
            .any(|i| i.arg_types()[0].base == Float4 && i.arg_types()[1].base == Float4x3
                && i.return_type.base == Float3));
    }

    #[test]
    fn dot_returns_scalar() {
        assert!(INTRINSICS
            .iter()
            .filter(|i| i.name == "dot")
            .all(|i| matches!(i.return_type.base, Float | Half)));
    }

    #[test]
    fn is_intrinsic_lookup() {
        assert!(is_intrinsic("lerp"));
        assert!(is_intrinsic("tex2Dcmp"));
        assert!(!is_intrinsic("Sample")); // methods are a separate table
        assert!(!is_intrinsic("bogus"));
    }

    #[test]
    fn methods_encode_owner_and_return_family() {
        let sample_2d: Vec<_> = METHODS
            .iter()
            .filter(|m| m.name == "Sample" && m.method_owner() == Texture2D)
            .collect();
        assert_eq!(sample_2d.len(), 4);
        for m in &sample_2d {
            assert_eq!(m.args[0].sampler_type, m.return_type.base);
            assert_eq!(m.arg_types()[0].base, SamplerState);
            assert_eq!(m.arg_types()[1].base, Float2);
        }
    }

    #[test]
    fn sample_lod_takes_coord_then_lod() {
        let row = METHODS
            .iter()
            .find(|m| m.name == "SampleLod" && m.method_owner() == TextureCube)
            .unwrap();
        assert_eq!(row.arg_types()[0].base, Float3);
        assert_eq!(row.arg_types()[1].base, Float);
    }

    #[test]
    fn gather_rows_exist_for_cube_arrays() {
        assert!(METHODS
            .iter()
            .any(|m| m.name == "Gather" && m.method_owner() == TextureCubeArray));
    }
}
