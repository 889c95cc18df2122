use serde::Serialize;
use serde_json::{Map, Value};

/// Partial, loosely-typed parameter map as stored in lens profiles.
pub type ParamMap = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamKey {
    FieldCurvature,
    EdgeSoftness,
    Coma,
    ComaAnamorph,
    ChromaticAberration,
    Bloom,
    BloomWarmth,
    Vignette,
    DecenterX,
    DecenterY,
    Veil,
    GlobalSoftness,
    Halation,
}

#[derive(Clone, Copy, Debug)]
/// Profile key, range and default of one lens parameter.
pub struct ParamDef {
    pub key: ParamKey,
    pub name: &'static str,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl ParamDef {
    const fn new(key: ParamKey, name: &'static str, min: f32, max: f32) -> Self {
        Self {
            key,
            name,
            min,
            max,
            default: 0.0,
        }
    }

    /// Clamps `value` into range; NaN collapses to the minimum.
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.min
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Profile key used for the decenter 2-vector (`[x, y]` or `{"x", "y"}`).
pub const DECENTER_KEY: &str = "decenter";

pub const PARAM_DEFS: [ParamDef; 13] = [
    ParamDef::new(ParamKey::FieldCurvature, "fieldCurvature", 0.0, 1.2),
    ParamDef::new(ParamKey::EdgeSoftness, "edgeSoftness", 0.0, 1.0),
    ParamDef::new(ParamKey::Coma, "coma", 0.0, 1.0),
    ParamDef::new(ParamKey::ComaAnamorph, "comaAnamorph", 0.0, 1.0),
    ParamDef::new(ParamKey::ChromaticAberration, "ca", 0.0, 1.0),
    ParamDef::new(ParamKey::Bloom, "bloom", 0.0, 1.0),
    ParamDef::new(ParamKey::BloomWarmth, "bloomWarmth", -1.0, 1.0),
    ParamDef::new(ParamKey::Vignette, "vignette", 0.0, 1.2),
    ParamDef::new(ParamKey::DecenterX, "asymX", -1.0, 1.0),
    ParamDef::new(ParamKey::DecenterY, "asymY", -1.0, 1.0),
    ParamDef::new(ParamKey::Veil, "veil", 0.0, 1.0),
    ParamDef::new(ParamKey::GlobalSoftness, "globalSoft", 0.0, 0.6),
    ParamDef::new(ParamKey::Halation, "halation", 0.0, 0.6),
];

/// `PARAM_DEFS` is laid out in `ParamKey` declaration order.
pub fn param_def(key: ParamKey) -> &'static ParamDef {
    &PARAM_DEFS[key as usize]
}

pub fn param_def_by_name(name: &str) -> Option<&'static ParamDef> {
    PARAM_DEFS.iter().find(|def| def.name == name)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
/// Fully resolved lens parameter vector handed to every stage.
pub struct LensParams {
    pub field_curvature: f32,
    pub edge_softness: f32,
    pub coma: f32,
    pub coma_anamorph: f32,
    #[serde(rename = "ca")]
    pub chromatic_aberration: f32,
    pub bloom: f32,
    pub bloom_warmth: f32,
    pub vignette: f32,
    pub decenter: [f32; 2],
    pub veil: f32,
    #[serde(rename = "globalSoft")]
    pub global_softness: f32,
    pub halation: f32,
}

impl Default for LensParams {
    fn default() -> Self {
        let mut params = Self {
            field_curvature: 0.0,
            edge_softness: 0.0,
            coma: 0.0,
            coma_anamorph: 0.0,
            chromatic_aberration: 0.0,
            bloom: 0.0,
            bloom_warmth: 0.0,
            vignette: 0.0,
            decenter: [0.0, 0.0],
            veil: 0.0,
            global_softness: 0.0,
            halation: 0.0,
        };
        for def in &PARAM_DEFS {
            params.set(def.key, def.default);
        }
        params
    }
}

impl LensParams {
    pub fn get(&self, key: ParamKey) -> f32 {
        match key {
            ParamKey::FieldCurvature => self.field_curvature,
            ParamKey::EdgeSoftness => self.edge_softness,
            ParamKey::Coma => self.coma,
            ParamKey::ComaAnamorph => self.coma_anamorph,
            ParamKey::ChromaticAberration => self.chromatic_aberration,
            ParamKey::Bloom => self.bloom,
            ParamKey::BloomWarmth => self.bloom_warmth,
            ParamKey::Vignette => self.vignette,
            ParamKey::DecenterX => self.decenter[0],
            ParamKey::DecenterY => self.decenter[1],
            ParamKey::Veil => self.veil,
            ParamKey::GlobalSoftness => self.global_softness,
            ParamKey::Halation => self.halation,
        }
    }

    /// Sets `key`, clamped to its declared range.
    pub fn set(&mut self, key: ParamKey, value: f32) {
        let value = param_def(key).clamp(value);
        let slot = match key {
            ParamKey::FieldCurvature => &mut self.field_curvature,
            ParamKey::EdgeSoftness => &mut self.edge_softness,
            ParamKey::Coma => &mut self.coma,
            ParamKey::ComaAnamorph => &mut self.coma_anamorph,
            ParamKey::ChromaticAberration => &mut self.chromatic_aberration,
            ParamKey::Bloom => &mut self.bloom,
            ParamKey::BloomWarmth => &mut self.bloom_warmth,
            ParamKey::Vignette => &mut self.vignette,
            ParamKey::DecenterX => &mut self.decenter[0],
            ParamKey::DecenterY => &mut self.decenter[1],
            ParamKey::Veil => &mut self.veil,
            ParamKey::GlobalSoftness => &mut self.global_softness,
            ParamKey::Halation => &mut self.halation,
        };
        *slot = value;
    }

    /// Resolves a partial profile map over the declared defaults.
    ///
    /// Missing or non-numeric entries keep their default; numeric entries are
    /// clamped. Nothing is inferred from other keys.
    pub fn resolve(map: &ParamMap) -> Self {
        let mut params = Self::default();
        for (name, value) in map {
            if name == DECENTER_KEY {
                continue;
            }
            let Some(def) = param_def_by_name(name) else {
                tracing::debug!(key = %name, "ignoring unknown lens parameter");
                continue;
            };
            if let Some(v) = coerce_number(value) {
                params.set(def.key, v);
            }
        }
        if let Some(value) = map.get(DECENTER_KEY) {
            let (x, y) = coerce_vec2(value);
            if let Some(x) = x {
                params.set(ParamKey::DecenterX, x);
            }
            if let Some(y) = y {
                params.set(ParamKey::DecenterY, y);
            }
        }
        params
    }

    /// Serializes back into a profile map that resolves to the same values.
    pub fn to_map(&self) -> ParamMap {
        let mut map = ParamMap::new();
        for def in &PARAM_DEFS {
            map.insert(def.name.to_string(), Value::from(f64::from(self.get(def.key))));
        }
        map
    }
}

fn coerce_number(value: &Value) -> Option<f32> {
    match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse::<f32>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn coerce_vec2(value: &Value) -> (Option<f32>, Option<f32>) {
    match value {
        Value::Array(items) => (
            items.first().and_then(coerce_number),
            items.get(1).and_then(coerce_number),
        ),
        Value::Object(fields) => (
            fields.get("x").and_then(coerce_number),
            fields.get("y").and_then(coerce_number),
        ),
        _ => (None, None),
    }
}
