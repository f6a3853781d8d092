mod common;

use slx_backend_core::ShaderStage;
use slx_backend_glsl::{GlslBackend, GlslVersion};
use slx_backend_hlsl::HlslBackend;

const SKINNED_VERTEX_SHADER: &str = r#"
cbuffer Transforms : register(b0) {
    float4x4 worldViewProj;
    float4x4 world;
};

struct VertexInput {
    float4 position : POSITION;
    float3 normal : NORMAL;
    float2 uv : TEXCOORD0;
};

struct VertexOutput {
    float4 position : POSITION;
    float3 normal : TEXCOORD1;
    float2 uv : TEXCOORD0;
};

VertexOutput vs_main(VertexInput input) {
    VertexOutput output;
    output.position = mul(input.position, Transforms.worldViewProj);
    output.normal = normalize(mul(float4(input.normal, 0.0), Transforms.world).xyz);
    output.uv = input.uv;
    return output;
}
"#;

const LIT_PIXEL_SHADER: &str = r#"
Texture2D albedo : register(t0);
SamplerState albedoSampler : register(s0);

cbuffer Lighting : register(b0) {
    float3 lightDir;
    float ambient;
};

float4 ps_main(float3 normal : TEXCOORD1, float2 uv : TEXCOORD0) : COLOR {
    float ndotl = saturate(dot(normalize(normal), Lighting.lightDir));
    float4 base = albedo.Sample(albedoSampler, uv);
    return base * (ndotl + Lighting.ambient);
}
"#;

#[test]
fn vertex_shader_translates_to_glsl() {
    let out = common::translate(
        SKINNED_VERTEX_SHADER,
        &GlslBackend::new(GlslVersion::V140),
        ShaderStage::Vertex,
        "vs_main",
    );
    assert!(out.starts_with("#version 140"));
    assert!(out.contains("layout(std140) uniform cb_Transforms {"));
    assert!(out.contains("in vec4 vertex_POSITION;"));
    assert!(out.contains("in vec3 vertex_NORMAL;"));
    assert!(out.contains("out vec3 frag_TEXCOORD1;"));
    assert!(out.contains("gl_Position"));
    // HLSL mul becomes a flipped GLSL multiply.
    assert!(out.contains("(worldViewProj * "));
}

#[test]
fn vertex_shader_translates_to_hlsl() {
    let out = common::translate(
        SKINNED_VERTEX_SHADER,
        &HlslBackend::new(),
        ShaderStage::Vertex,
        "vs_main",
    );
    assert!(out.contains("struct TransformsType {"));
    assert!(out.contains("cbuffer cb_Transforms : register(b0) {"));
    assert!(out.contains("SV_Position"));
    assert!(out.contains("VertexOutput vs_main("));
}

#[test]
fn pixel_shader_translates_to_glsl() {
    let out = common::translate(
        LIT_PIXEL_SHADER,
        &GlslBackend::new(GlslVersion::V140),
        ShaderStage::Fragment,
        "ps_main",
    );
    assert!(out.contains("uniform sampler2D albedo;"));
    assert!(out.contains("texture(albedo, "));
    assert!(out.contains("clamp("));
    assert!(out.contains("out vec4 out_COLOR;"));
}

#[test]
fn pixel_shader_translates_to_hlsl() {
    let out = common::translate(
        LIT_PIXEL_SHADER,
        &HlslBackend::new(),
        ShaderStage::Fragment,
        "ps_main",
    );
    assert!(out.contains("Texture2D<float> albedo_texture : register(t0)"));
    assert!(out.contains("SamplerState albedo_sampler : register(s0)"));
    assert!(out.contains(") : SV_Target {"));
    assert!(out.contains("albedo_texture.Sample(albedoSampler, "));
}

#[test]
fn pixel_shader_translates_to_legacy_hlsl() {
    let out = common::translate(
        LIT_PIXEL_SHADER,
        &HlslBackend::legacy(),
        ShaderStage::Fragment,
        "ps_main",
    );
    assert!(out.contains(") : COLOR {"));
    assert!(!out.contains("SV_Target"));
    assert!(out.contains("tex2D(albedoSampler, "));
}

#[test]
fn compute_shader_translates_to_both_dialects() {
    let source = "[numthreads(64, 1, 1)] void cs_main() { int idx = 0; idx = idx + 1; }";

    let hlsl = common::translate(
        source,
        &HlslBackend::new(),
        ShaderStage::Compute,
        "cs_main",
    );
    assert!(hlsl.contains("[numthreads(64, 1, 1)]"));

    let glsl = common::translate(
        source,
        &GlslBackend::new(GlslVersion::V430),
        ShaderStage::Compute,
        "cs_main",
    );
    assert!(glsl.starts_with("#version 430"));
    assert!(glsl.contains("layout(local_size_x = 64, local_size_y = 1, local_size_z = 1) in;"));
}

#[test]
fn includes_splice_across_files() {
    let module = common::preprocess_and_parse(
        &[
            (
                "main.sl",
                "#include \"common.sl\"\nfloat4 main(float2 uv : TEXCOORD0) : COLOR { return tint; }\n",
            ),
            ("common.sl", "float4 tint;\n"),
        ],
        "main.sl",
    );
    let tint = module
        .declarations
        .iter()
        .map(|(_, d)| d)
        .find(|d| module.interner.get(d.name) == "tint")
        .expect("tint declaration");
    assert_eq!(module.interner.get(tint.origin.file), "common.sl");
}

#[test]
fn half_types_collapse_to_float_in_glsl() {
    let out = common::translate(
        "half4 main(half2 uv : TEXCOORD0) : COLOR { half h = 0.5h; return half4(uv, h, 1.0h); }",
        &GlslBackend::new(GlslVersion::V140),
        ShaderStage::Fragment,
        "main",
    );
    assert!(out.contains("vec4 main_(vec2 "));
    assert!(out.contains("float h = 0.5;"));
}

#[test]
fn function_overloads_survive_translation() {
    let source = r#"
float2 scale(float2 v, float s) { return v * s; }
float3 scale(float3 v, float s) { return v * s; }

float4 main(float2 uv : TEXCOORD0) : COLOR {
    float2 a = scale(uv, 2.0);
    float3 b = scale(float3(uv, 1.0), 0.5);
    return float4(a, b.z, 1.0);
}
"#;
    let out = common::translate(
        source,
        &HlslBackend::new(),
        ShaderStage::Fragment,
        "main",
    );
    assert!(out.contains("float2 scale(float2 v, float s)"));
    assert!(out.contains("float3 scale(float3 v, float s)"));
}
