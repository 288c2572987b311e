//! Default GPU shader for SDF text
//!
//! Renderers are free to supply their own pipeline; this source documents the
//! sampling contract the atlas pages expect: a 3-channel median-of-medians
//! distance sample, a foreground color, a premultiply flag and a gamma value.

/// WGSL shader for drawing atlas quads.
///
/// Vertex input is one quad per [`CharPlacement`](crate::CharPlacement):
/// `dst_rect` corners as positions, `src_tex_coords` corners as UVs. The
/// fragment stage reconstructs the signed distance as the median of the three
/// channels and anti-aliases over a screen-space width derived from the UV
/// footprint.
pub const SDF_TEXT_SHADER: &str = r#"
struct Globals {
    transform: mat4x4<f32>,
    fg_color: vec4<f32>,
    premultiply: f32,
    gamma: f32,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var<uniform> globals: Globals;
@group(0) @binding(1) var atlas_texture: texture_2d<f32>;
@group(0) @binding(2) var atlas_sampler: sampler;

struct VertexInput {
    @location(0) position: vec2<f32>,
    @location(1) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = globals.transform * vec4<f32>(in.position, 0.0, 1.0);
    out.tex_coord = in.tex_coord;
    return out;
}

fn median3(r: f32, g: f32, b: f32) -> f32 {
    return max(min(r, g), min(max(r, g), b));
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    // Texel-space coordinates drive the anti-aliasing width.
    let texel_uv = in.tex_coord * vec2<f32>(textureDimensions(atlas_texture));
    let field = textureSample(atlas_texture, atlas_sampler, in.tex_coord).rgb;

    // Signed distance in texels, zero on the glyph edge.
    let sig_dist = median3(field.r, field.g, field.b) - 0.5;

    let k_thickness = 0.125;
    let k_normalization = k_thickness * 0.5 * sqrt(2.0);
    let afwidth = min(k_normalization * length(fwidth(texel_uv)), 0.5);
    let opacity = smoothstep(-afwidth, afwidth, sig_dist);

    // Gamma applies always; premultiplication is opt-in.
    let alpha = pow(globals.fg_color.a * opacity, 1.0 / globals.gamma);
    let rgb = mix(globals.fg_color.rgb, globals.fg_color.rgb * alpha, globals.premultiply);
    return vec4<f32>(rgb, alpha);
}
"#;
