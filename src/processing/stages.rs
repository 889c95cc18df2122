use crate::error::{LensError, LensResult};
use crate::params::{LensParams, ParamKey};

use super::optics::wgsl_prelude;
use super::shaders::{
    COMPOSITE_WGSL, HIGHLIGHT_EXTRACT_WGSL, LENS_ABERRATION_WGSL, SEPARABLE_BLUR_WGSL,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    LensAberration,
    HighlightExtract,
    SeparableBlur,
    Composite,
}

impl StageKind {
    pub const ALL: [StageKind; 4] = [
        StageKind::LensAberration,
        StageKind::HighlightExtract,
        StageKind::SeparableBlur,
        StageKind::Composite,
    ];

    pub fn descriptor(self) -> &'static StageDescriptor {
        &STAGE_DESCRIPTORS[self as usize]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Source of one `f32` in a stage's uniform block.
pub enum UniformSlot {
    OutputWidth,
    OutputHeight,
    Param(ParamKey),
    DirectionX,
    DirectionY,
    Step,
    Zero,
}

/// Per-pass values that are not lens parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassUniforms {
    pub width: u32,
    pub height: u32,
    pub direction: [f32; 2],
    pub step: f32,
}

#[derive(Debug)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub label: &'static str,
    pub body: &'static str,
    /// Number of sampled textures, bound at 0..inputs.
    pub inputs: u32,
    /// WGSL `Params` fields in declaration order, with the value each receives.
    pub uniforms: &'static [(&'static str, UniformSlot)],
    pub output_format: wgpu::TextureFormat,
}

const INTERMEDIATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub static STAGE_DESCRIPTORS: [StageDescriptor; 4] = [
    StageDescriptor {
        kind: StageKind::LensAberration,
        label: "lens_aberration",
        body: LENS_ABERRATION_WGSL,
        inputs: 1,
        uniforms: &[
            ("width", UniformSlot::OutputWidth),
            ("height", UniformSlot::OutputHeight),
            ("field_curvature", UniformSlot::Param(ParamKey::FieldCurvature)),
            ("edge_softness", UniformSlot::Param(ParamKey::EdgeSoftness)),
            ("coma", UniformSlot::Param(ParamKey::Coma)),
            ("coma_anamorph", UniformSlot::Param(ParamKey::ComaAnamorph)),
            ("ca", UniformSlot::Param(ParamKey::ChromaticAberration)),
            ("vignette", UniformSlot::Param(ParamKey::Vignette)),
            ("decenter_x", UniformSlot::Param(ParamKey::DecenterX)),
            ("decenter_y", UniformSlot::Param(ParamKey::DecenterY)),
            ("veil", UniformSlot::Param(ParamKey::Veil)),
            ("global_soft", UniformSlot::Param(ParamKey::GlobalSoftness)),
        ],
        output_format: INTERMEDIATE_FORMAT,
    },
    StageDescriptor {
        kind: StageKind::HighlightExtract,
        label: "highlight_extract",
        body: HIGHLIGHT_EXTRACT_WGSL,
        inputs: 1,
        uniforms: &[
            ("width", UniformSlot::OutputWidth),
            ("height", UniformSlot::OutputHeight),
            ("bloom", UniformSlot::Param(ParamKey::Bloom)),
            ("bloom_warmth", UniformSlot::Param(ParamKey::BloomWarmth)),
        ],
        output_format: INTERMEDIATE_FORMAT,
    },
    StageDescriptor {
        kind: StageKind::SeparableBlur,
        label: "separable_blur",
        body: SEPARABLE_BLUR_WGSL,
        inputs: 1,
        uniforms: &[
            ("width", UniformSlot::OutputWidth),
            ("height", UniformSlot::OutputHeight),
            ("dir_x", UniformSlot::DirectionX),
            ("dir_y", UniformSlot::DirectionY),
            ("step", UniformSlot::Step),
            ("_pad0", UniformSlot::Zero),
            ("_pad1", UniformSlot::Zero),
            ("_pad2", UniformSlot::Zero),
        ],
        output_format: INTERMEDIATE_FORMAT,
    },
    StageDescriptor {
        kind: StageKind::Composite,
        label: "composite",
        body: COMPOSITE_WGSL,
        inputs: 3,
        uniforms: &[
            ("width", UniformSlot::OutputWidth),
            ("height", UniformSlot::OutputHeight),
            ("veil", UniformSlot::Param(ParamKey::Veil)),
            ("halation", UniformSlot::Param(ParamKey::Halation)),
            ("decenter_x", UniformSlot::Param(ParamKey::DecenterX)),
            ("decenter_y", UniformSlot::Param(ParamKey::DecenterY)),
            ("coma_anamorph", UniformSlot::Param(ParamKey::ComaAnamorph)),
            ("_pad0", UniformSlot::Zero),
        ],
        output_format: OUTPUT_FORMAT,
    },
];

impl StageDescriptor {
    pub fn source(&self) -> String {
        let mut src = wgsl_prelude();
        src.push_str(self.body);
        src
    }

    /// Uniform block size in bytes, rounded up to a 16-byte multiple.
    pub fn uniform_size(&self) -> u64 {
        let floats = self.uniforms.len().div_ceil(4) * 4;
        (floats * std::mem::size_of::<f32>()) as u64
    }

    /// Fails unless the declared slots name the WGSL `Params` fields exactly, in order.
    pub fn check_uniform_layout(&self) -> LensResult<()> {
        let declared = declared_uniform_fields(self.body).ok_or_else(|| LensError::StageCompile {
            stage: self.label,
            diagnostic: "no `struct Params` block in stage source".into(),
        })?;
        let expected: Vec<&str> = self.uniforms.iter().map(|(name, _)| *name).collect();
        if declared != expected {
            return Err(LensError::StageCompile {
                stage: self.label,
                diagnostic: format!(
                    "uniform layout mismatch: shader declares {declared:?}, stage binds {expected:?}"
                ),
            });
        }
        Ok(())
    }

    pub fn pack_uniforms(&self, pass: &PassUniforms, params: &LensParams) -> Vec<f32> {
        let mut values: Vec<f32> = self
            .uniforms
            .iter()
            .map(|(_, slot)| match *slot {
                UniformSlot::OutputWidth => pass.width as f32,
                UniformSlot::OutputHeight => pass.height as f32,
                UniformSlot::Param(key) => params.get(key),
                UniformSlot::DirectionX => pass.direction[0],
                UniformSlot::DirectionY => pass.direction[1],
                UniformSlot::Step => pass.step,
                UniformSlot::Zero => 0.0,
            })
            .collect();
        values.resize(self.uniforms.len().div_ceil(4) * 4, 0.0);
        values
    }
}

/// Field names of the WGSL `struct Params` block, in declaration order.
pub fn declared_uniform_fields(wgsl: &str) -> Option<Vec<String>> {
    let start = wgsl.find("struct Params")?;
    let rest = &wgsl[start..];
    let open = rest.find('{')?;
    let close = rest.find('}')?;
    let body = rest.get(open + 1..close)?;
    let fields = body
        .lines()
        .map(|line| line.split("//").next().unwrap_or("").trim())
        .flat_map(|line| line.split(','))
        .filter_map(|field| {
            let (name, _ty) = field.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();
    Some(fields)
}

/// A compiled render pipeline plus the bind group layout its passes use.
pub struct StageProgram {
    pub kind: StageKind,
    pub label: &'static str,
    pub pipeline: wgpu::RenderPipeline,
    pub bgl: wgpu::BindGroupLayout,
}

impl StageProgram {
    pub fn compile(device: &wgpu::Device, desc: &'static StageDescriptor) -> LensResult<Self> {
        desc.check_uniform_layout()?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let entries = bind_group_layout_entries(desc.inputs);
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source().into()),
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: desc.output_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            let diagnostic = err.to_string();
            tracing::error!(stage = desc.label, %diagnostic, "stage failed to compile");
            return Err(LensError::StageCompile {
                stage: desc.label,
                diagnostic,
            });
        }

        tracing::debug!(stage = desc.label, "stage compiled");
        Ok(Self {
            kind: desc.kind,
            label: desc.label,
            pipeline,
            bgl,
        })
    }

    pub fn descriptor(&self) -> &'static StageDescriptor {
        self.kind.descriptor()
    }
}

/// `inputs` filterable textures, then a linear sampler, then the uniform block.
fn bind_group_layout_entries(inputs: u32) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries: Vec<wgpu::BindGroupLayoutEntry> = (0..inputs)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        })
        .collect();
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: inputs,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: inputs + 1,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    });
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_are_indexed_by_kind() {
        for kind in StageKind::ALL {
            assert_eq!(kind.descriptor().kind, kind);
        }
    }

    #[test]
    fn every_stage_binds_exactly_the_declared_params_fields() {
        for desc in &STAGE_DESCRIPTORS {
            desc.check_uniform_layout()
                .unwrap_or_else(|err| panic!("{}: {err}", desc.label));
            assert_eq!(desc.uniform_size() % 16, 0, "{}", desc.label);
        }
    }

    #[test]
    fn missing_field_is_a_construction_error() {
        static BROKEN: StageDescriptor = StageDescriptor {
            kind: StageKind::SeparableBlur,
            label: "broken_blur",
            body: SEPARABLE_BLUR_WGSL,
            inputs: 1,
            uniforms: &[
                ("width", UniformSlot::OutputWidth),
                ("height", UniformSlot::OutputHeight),
                ("dir_x", UniformSlot::DirectionX),
                ("dir_y", UniformSlot::DirectionY),
            ],
            output_format: INTERMEDIATE_FORMAT,
        };
        let err = BROKEN.check_uniform_layout().unwrap_err();
        assert!(matches!(err, LensError::StageCompile { stage: "broken_blur", .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn parses_params_fields_ignoring_comments() {
        let src = "struct Params {\n    a: f32, // first\n    b: f32,\n    c: vec2<f32>,\n};\nfn f() {}";
        assert_eq!(
            declared_uniform_fields(src),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(declared_uniform_fields("fn main() {}"), None);
    }

    #[test]
    fn packs_params_and_pass_values_in_slot_order() {
        let mut params = LensParams::default();
        params.set(ParamKey::Veil, 0.4);
        params.set(ParamKey::Halation, 0.2);
        params.set(ParamKey::DecenterY, -0.5);
        let pass = PassUniforms {
            width: 640,
            height: 480,
            direction: [0.0, 0.0],
            step: 1.0,
        };
        let packed = StageKind::Composite.descriptor().pack_uniforms(&pass, &params);
        assert_eq!(packed, vec![640.0, 480.0, 0.4, 0.2, 0.0, -0.5, 0.0, 0.0]);

        let pass = PassUniforms {
            width: 320,
            height: 240,
            direction: [0.0, 1.0],
            step: 3.0,
        };
        let packed = StageKind::SeparableBlur.descriptor().pack_uniforms(&pass, &params);
        assert_eq!(&packed[..5], &[320.0, 240.0, 0.0, 1.0, 3.0]);
    }
}
