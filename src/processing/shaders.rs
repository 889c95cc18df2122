//! WGSL bodies of the four stage programs.
//!
//! Each body is appended to [`super::optics::wgsl_prelude`], which supplies the
//! shared constants, helpers and the full-screen `vs_main`. Fragment
//! coordinates map 1:1 onto texel rows, so the bottom-up row order of the
//! uploaded source is preserved through every pass.

pub const LENS_ABERRATION_WGSL: &str = r#"
struct Params {
    width: f32,
    height: f32,
    field_curvature: f32,
    edge_softness: f32,
    coma: f32,
    coma_anamorph: f32,
    ca: f32,
    vignette: f32,
    decenter_x: f32,
    decenter_y: f32,
    veil: f32,
    global_soft: f32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var src_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: Params;

fn fetch(uv: vec2<f32>) -> vec3<f32> {
    return to_linear(textureSampleLevel(src_tex, src_sampler, uv, 0.0).rgb);
}

fn cross_blur(uv: vec2<f32>, texel: vec2<f32>, radius_px: f32) -> vec3<f32> {
    let o = texel * radius_px;
    var c = fetch(uv);
    c += fetch(uv + vec2<f32>(o.x, 0.0));
    c += fetch(uv - vec2<f32>(o.x, 0.0));
    c += fetch(uv + vec2<f32>(0.0, o.y));
    c += fetch(uv - vec2<f32>(0.0, o.y));
    return c / 5.0;
}

fn lens_sample(uv: vec2<f32>, texel: vec2<f32>, dir: vec2<f32>, edge: f32) -> vec3<f32> {
    let curvature = params.field_curvature * edge * edge;
    let soft_px = params.global_soft * GLOBAL_SOFT_PX
        + edge * params.edge_softness * EDGE_SOFT_PX
        + curvature * CURVATURE_SOFT_PX;
    let soft_mix = clamp(
        params.global_soft + edge * params.edge_softness + curvature * CURVATURE_MIX,
        0.0,
        1.0,
    );
    var col = mix(fetch(uv), cross_blur(uv, texel, soft_px), soft_mix);

    let smear = dir * texel * (params.coma * edge * COMA_PX);
    let tail = 0.5 * (fetch(uv + smear * 0.5) + fetch(uv + smear));
    col = mix(col, tail, clamp(edge * params.coma, 0.0, 1.0));
    return col;
}

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    let texel = 1.0 / res;
    let uv = pos.xy / res;
    let lens = radial(uv, res, vec2<f32>(params.decenter_x, params.decenter_y), params.coma_anamorph);
    let edge = edge_mask(lens.r);

    let ca_offset = lens.dir * texel * (params.ca * edge * CA_PX);
    var col = vec3<f32>(
        lens_sample(uv + ca_offset, texel, lens.dir, edge).r,
        lens_sample(uv, texel, lens.dir, edge).g,
        lens_sample(uv - ca_offset, texel, lens.dir, edge).b,
    );

    let falloff = smoothstep(VIGNETTE_INNER, VIGNETTE_OUTER, lens.r);
    col *= max(1.0 - params.vignette * VIGNETTE_DEPTH * falloff, 0.0);

    let y = perceptual_luma(col);
    let lift = smoothstep(VEIL_LO, VEIL_HI, y) * params.veil * y * mix(VEIL_CENTER_WEIGHT, 1.0, edge);
    col += (vec3<f32>(1.0) - col) * clamp(lift * VEIL_LIFT, 0.0, 1.0);

    let alpha = textureSampleLevel(src_tex, src_sampler, uv, 0.0).a;
    return vec4<f32>(col, alpha);
}
"#;

pub const HIGHLIGHT_EXTRACT_WGSL: &str = r#"
struct Params {
    width: f32,
    height: f32,
    bloom: f32,
    bloom_warmth: f32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(2)
var<uniform> params: Params;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let last = vec2<i32>(textureDimensions(src_tex)) - vec2<i32>(1);
    let origin = vec2<i32>(pos.xy) * 2;
    var rgb = vec3<f32>(0.0);
    var energy = 0.0;
    for (var i = 0; i < 4; i++) {
        let p = min(origin + vec2<i32>(i % 2, i / 2), last);
        let c = textureLoad(src_tex, p, 0).rgb;
        let y = perceptual_luma(c);
        let m = highlight_mask(y);
        rgb += c * m;
        energy += m * y;
    }
    let tint = max(vec3<f32>(1.0) + WARM_TINT * params.bloom_warmth, vec3<f32>(0.0));
    return vec4<f32>(rgb * 0.25 * params.bloom * tint, energy * 0.25);
}
"#;

pub const SEPARABLE_BLUR_WGSL: &str = r#"
struct Params {
    width: f32,
    height: f32,
    dir_x: f32,
    dir_y: f32,
    step: f32,
    _pad0: f32,
    _pad1: f32,
    _pad2: f32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var src_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: Params;

fn tap(uv: vec2<f32>) -> vec4<f32> {
    return textureSampleLevel(src_tex, src_sampler, uv, 0.0);
}

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    let uv = pos.xy / res;
    let o = vec2<f32>(params.dir_x, params.dir_y) / res * params.step;
    var c = tap(uv) * BLUR_W0;
    c += (tap(uv + o) + tap(uv - o)) * BLUR_W1;
    c += (tap(uv + o * 2.0) + tap(uv - o * 2.0)) * BLUR_W2;
    c += (tap(uv + o * 3.0) + tap(uv - o * 3.0)) * BLUR_W3;
    c += (tap(uv + o * 4.0) + tap(uv - o * 4.0)) * BLUR_W4;
    return c;
}
"#;

pub const COMPOSITE_WGSL: &str = r#"
struct Params {
    width: f32,
    height: f32,
    veil: f32,
    halation: f32,
    decenter_x: f32,
    decenter_y: f32,
    coma_anamorph: f32,
    _pad0: f32,
};

@group(0) @binding(0)
var base_tex: texture_2d<f32>;
@group(0) @binding(1)
var tight_tex: texture_2d<f32>;
@group(0) @binding(2)
var wide_tex: texture_2d<f32>;
@group(0) @binding(3)
var layer_sampler: sampler;
@group(0) @binding(4)
var<uniform> params: Params;

@fragment
fn fs_main(@builtin(position) pos: vec4<f32>) -> @location(0) vec4<f32> {
    let res = vec2<f32>(params.width, params.height);
    let uv = pos.xy / res;
    let base = textureLoad(base_tex, vec2<i32>(pos.xy), 0);
    let tight = textureSampleLevel(tight_tex, layer_sampler, uv, 0.0);
    let wide = textureSampleLevel(wide_tex, layer_sampler, uv, 0.0);
    let lens = radial(uv, res, vec2<f32>(params.decenter_x, params.decenter_y), params.coma_anamorph);
    let edge = edge_mask(lens.r);

    var col = screen(base.rgb, tight.rgb * TIGHT_WEIGHT);
    col = screen(col, wide.rgb * (WIDE_BASE + params.veil * WIDE_VEIL));
    col = screen(col, HALATION_TINT * (wide.a * params.halation * edge * HALATION_GAIN));
    return vec4<f32>(to_gamma(clamp(col, vec3<f32>(0.0), vec3<f32>(1.0))), base.a);
}
"#;
