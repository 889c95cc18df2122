//! Calibration constants and scalar optics shared by the GPU kernels and the
//! CPU reference pipeline.
//!
//! The WGSL prelude is generated from the same constants so both backends
//! agree on thresholds, tap weights and gains.

pub const GAMMA: f32 = 2.2;
pub const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];
/// Floor applied before `pow` so zero channels stay well-defined.
pub const POW_FLOOR: f32 = 1e-7;

/// Decenter of ±1 moves the optical centre by this fraction of the frame.
pub const DECENTER_SHIFT: f32 = 0.15;
pub const ANAMORPH_SQUEEZE: f32 = 0.6;
pub const EDGE_INNER: f32 = 0.35;
pub const EDGE_OUTER: f32 = 1.0;

pub const GLOBAL_SOFT_PX: f32 = 3.0;
pub const EDGE_SOFT_PX: f32 = 6.0;
pub const CURVATURE_SOFT_PX: f32 = 8.0;
pub const CURVATURE_MIX: f32 = 0.75;
pub const COMA_PX: f32 = 18.0;
pub const CA_PX: f32 = 4.0;

pub const VIGNETTE_INNER: f32 = 0.25;
pub const VIGNETTE_OUTER: f32 = 1.15;
pub const VIGNETTE_DEPTH: f32 = 0.75;

pub const VEIL_LO: f32 = 0.2;
pub const VEIL_HI: f32 = 0.9;
pub const VEIL_LIFT: f32 = 0.6;
pub const VEIL_CENTER_WEIGHT: f32 = 0.5;

pub const HIGHLIGHT_LO: f32 = 0.70;
pub const HIGHLIGHT_HI: f32 = 0.95;
pub const WARM_TINT: [f32; 3] = [0.3, 0.1, -0.25];

/// Centre tap followed by the four one-sided taps of the 9-tap kernel.
pub const BLUR_WEIGHTS: [f32; 5] = [0.227_027, 0.194_594_6, 0.121_621_6, 0.054_054, 0.016_216];
pub const TIGHT_STEP: f32 = 1.0;
pub const WIDE_STEP: f32 = 3.0;

pub const TIGHT_WEIGHT: f32 = 0.9;
pub const WIDE_BASE: f32 = 0.25;
pub const WIDE_VEIL: f32 = 0.75;
pub const HALATION_TINT: [f32; 3] = [1.12, 1.05, 0.92];
pub const HALATION_GAIN: f32 = 1.5;

pub type Rgb = [f32; 3];

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

pub fn mix3(a: Rgb, b: Rgb, t: f32) -> Rgb {
    [mix(a[0], b[0], t), mix(a[1], b[1], t), mix(a[2], b[2], t)]
}

pub fn to_linear(c: f32) -> f32 {
    c.max(POW_FLOOR).powf(GAMMA)
}

pub fn to_gamma(c: f32) -> f32 {
    c.max(POW_FLOOR).powf(1.0 / GAMMA)
}

pub fn luma(c: Rgb) -> f32 {
    c[0] * LUMA[0] + c[1] * LUMA[1] + c[2] * LUMA[2]
}

/// Luma of a linear-light colour, re-encoded to the gamma domain.
pub fn perceptual_luma(c: Rgb) -> f32 {
    to_gamma(luma(c))
}

pub fn edge_mask(r: f32) -> f32 {
    smoothstep(EDGE_INNER, EDGE_OUTER, r)
}

pub fn highlight_mask(perceptual: f32) -> f32 {
    smoothstep(HIGHLIGHT_LO, HIGHLIGHT_HI, perceptual)
}

pub fn warm_tint(warmth: f32) -> Rgb {
    [
        (1.0 + WARM_TINT[0] * warmth).max(0.0),
        (1.0 + WARM_TINT[1] * warmth).max(0.0),
        (1.0 + WARM_TINT[2] * warmth).max(0.0),
    ]
}

pub fn vignette_gain(vignette: f32, r: f32) -> f32 {
    (1.0 - vignette * VIGNETTE_DEPTH * smoothstep(VIGNETTE_INNER, VIGNETTE_OUTER, r)).max(0.0)
}

/// Screen blend `1 - (1 - a)(1 - b)`, written so that `b == 0` returns `a` exactly.
pub fn screen(a: f32, b: f32) -> f32 {
    let b = b.clamp(0.0, 1.0);
    a + b * (1.0 - a)
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Position of a pixel relative to the optical centre.
pub struct Radial {
    /// Normalised radius; the frame corner of an undecentered lens is 1.
    pub r: f32,
    /// Unit vector pointing away from the optical centre, in pixels.
    pub dir: [f32; 2],
}

/// `uv` has its origin at the bottom-left texel, `res` is the target size in pixels.
pub fn radial(uv: [f32; 2], res: [f32; 2], decenter: [f32; 2], anamorph: f32) -> Radial {
    let center = [
        0.5 + decenter[0] * DECENTER_SHIFT,
        0.5 + decenter[1] * DECENTER_SHIFT,
    ];
    let d = [(uv[0] - center[0]) * res[0], (uv[1] - center[1]) * res[1]];
    let dist = (d[0] * d[0] + d[1] * d[1]).sqrt();
    let dir = if dist > 1e-5 {
        [d[0] / dist, d[1] / dist]
    } else {
        [0.0, 0.0]
    };
    let squeezed_y = d[1] * (1.0 + anamorph * ANAMORPH_SQUEEZE);
    let half_diag = 0.5 * (res[0] * res[0] + res[1] * res[1]).sqrt();
    let r = (d[0] * d[0] + squeezed_y * squeezed_y).sqrt() / half_diag.max(1e-5);
    Radial { r, dir }
}

/// Constants and helper functions prepended to every stage's WGSL body.
pub fn wgsl_prelude() -> String {
    let scalars = [
        ("GAMMA", GAMMA),
        ("POW_FLOOR", POW_FLOOR),
        ("DECENTER_SHIFT", DECENTER_SHIFT),
        ("ANAMORPH_SQUEEZE", ANAMORPH_SQUEEZE),
        ("EDGE_INNER", EDGE_INNER),
        ("EDGE_OUTER", EDGE_OUTER),
        ("GLOBAL_SOFT_PX", GLOBAL_SOFT_PX),
        ("EDGE_SOFT_PX", EDGE_SOFT_PX),
        ("CURVATURE_SOFT_PX", CURVATURE_SOFT_PX),
        ("CURVATURE_MIX", CURVATURE_MIX),
        ("COMA_PX", COMA_PX),
        ("CA_PX", CA_PX),
        ("VIGNETTE_INNER", VIGNETTE_INNER),
        ("VIGNETTE_OUTER", VIGNETTE_OUTER),
        ("VIGNETTE_DEPTH", VIGNETTE_DEPTH),
        ("VEIL_LO", VEIL_LO),
        ("VEIL_HI", VEIL_HI),
        ("VEIL_LIFT", VEIL_LIFT),
        ("VEIL_CENTER_WEIGHT", VEIL_CENTER_WEIGHT),
        ("HIGHLIGHT_LO", HIGHLIGHT_LO),
        ("HIGHLIGHT_HI", HIGHLIGHT_HI),
        ("BLUR_W0", BLUR_WEIGHTS[0]),
        ("BLUR_W1", BLUR_WEIGHTS[1]),
        ("BLUR_W2", BLUR_WEIGHTS[2]),
        ("BLUR_W3", BLUR_WEIGHTS[3]),
        ("BLUR_W4", BLUR_WEIGHTS[4]),
        ("TIGHT_WEIGHT", TIGHT_WEIGHT),
        ("WIDE_BASE", WIDE_BASE),
        ("WIDE_VEIL", WIDE_VEIL),
        ("HALATION_GAIN", HALATION_GAIN),
    ];
    let vectors = [
        ("LUMA", LUMA),
        ("WARM_TINT", WARM_TINT),
        ("HALATION_TINT", HALATION_TINT),
    ];

    let mut out = String::new();
    for (name, value) in scalars {
        out.push_str(&format!("const {name}: f32 = {};\n", wgsl_float(value)));
    }
    for (name, [x, y, z]) in vectors {
        out.push_str(&format!(
            "const {name}: vec3<f32> = vec3<f32>({}, {}, {});\n",
            wgsl_float(x),
            wgsl_float(y),
            wgsl_float(z)
        ));
    }
    out.push_str(PRELUDE_FUNCTIONS);
    out
}

/// Formats `value` as a WGSL abstract-float literal (always with a decimal point or exponent).
fn wgsl_float(value: f32) -> String {
    let text = format!("{value:?}");
    if text.contains('.') || text.contains('e') {
        text
    } else {
        format!("{text}.0")
    }
}

const PRELUDE_FUNCTIONS: &str = r#"
struct Radial {
    r: f32,
    dir: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index & 1u) * 4 - 1);
    let y = f32(i32(index >> 1u) * 4 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

fn to_linear(c: vec3<f32>) -> vec3<f32> {
    return pow(max(c, vec3<f32>(POW_FLOOR)), vec3<f32>(GAMMA));
}

fn to_gamma(c: vec3<f32>) -> vec3<f32> {
    return pow(max(c, vec3<f32>(POW_FLOOR)), vec3<f32>(1.0 / GAMMA));
}

fn luma(c: vec3<f32>) -> f32 {
    return dot(c, LUMA);
}

fn perceptual_luma(c: vec3<f32>) -> f32 {
    return pow(max(luma(c), POW_FLOOR), 1.0 / GAMMA);
}

fn edge_mask(r: f32) -> f32 {
    return smoothstep(EDGE_INNER, EDGE_OUTER, r);
}

fn highlight_mask(y: f32) -> f32 {
    return smoothstep(HIGHLIGHT_LO, HIGHLIGHT_HI, y);
}

fn screen(a: vec3<f32>, b: vec3<f32>) -> vec3<f32> {
    let l = clamp(b, vec3<f32>(0.0), vec3<f32>(1.0));
    return a + l * (vec3<f32>(1.0) - a);
}

fn radial(uv: vec2<f32>, res: vec2<f32>, decenter: vec2<f32>, anamorph: f32) -> Radial {
    let center = vec2<f32>(0.5) + decenter * DECENTER_SHIFT;
    let d = (uv - center) * res;
    let dist = length(d);
    var dir = vec2<f32>(0.0);
    if (dist > 1e-5) {
        dir = d / dist;
    }
    let squeezed = vec2<f32>(d.x, d.y * (1.0 + anamorph * ANAMORPH_SQUEEZE));
    let half_diag = 0.5 * length(res);
    var result: Radial;
    result.r = length(squeezed) / max(half_diag, 1e-5);
    result.dir = dir;
    return result;
}
"#;
