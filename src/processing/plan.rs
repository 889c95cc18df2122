//! The static per-frame pass sequence and the targets it reads and writes.

use crate::error::{LensError, LensResult};

use super::optics::{TIGHT_STEP, WIDE_STEP};
use super::stages::StageKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetId {
    Source,
    Aberrated,
    HalfA,
    HalfB,
    HalfC,
    HalfD,
    Final,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetScale {
    Full,
    Half,
}

impl TargetScale {
    pub fn dims(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            TargetScale::Full => (width, height),
            TargetScale::Half => (width.div_ceil(2).max(1), height.div_ceil(2).max(1)),
        }
    }
}

impl TargetId {
    pub const ALL: [TargetId; 7] = [
        TargetId::Source,
        TargetId::Aberrated,
        TargetId::HalfA,
        TargetId::HalfB,
        TargetId::HalfC,
        TargetId::HalfD,
        TargetId::Final,
    ];

    pub fn label(self) -> &'static str {
        match self {
            TargetId::Source => "source",
            TargetId::Aberrated => "aberrated",
            TargetId::HalfA => "half_a",
            TargetId::HalfB => "half_b",
            TargetId::HalfC => "half_c",
            TargetId::HalfD => "half_d",
            TargetId::Final => "final",
        }
    }

    pub fn scale(self) -> TargetScale {
        match self {
            TargetId::Source | TargetId::Aberrated | TargetId::Final => TargetScale::Full,
            _ => TargetScale::Half,
        }
    }

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            TargetId::Source | TargetId::Final => wgpu::TextureFormat::Rgba8Unorm,
            _ => wgpu::TextureFormat::Rgba16Float,
        }
    }

    pub fn usage(self) -> wgpu::TextureUsages {
        match self {
            TargetId::Source => wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            TargetId::Final => {
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC
            }
            _ => wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        }
    }
}

#[derive(Debug)]
pub struct PassSpec {
    pub label: &'static str,
    pub stage: StageKind,
    pub inputs: &'static [TargetId],
    pub output: TargetId,
    pub direction: [f32; 2],
    pub step: f32,
}

const HORIZONTAL: [f32; 2] = [1.0, 0.0];
const VERTICAL: [f32; 2] = [0.0, 1.0];

/// Tight bloom ping-pongs A→B→C; the wide veil reuses C and lands back in A.
pub static FRAME_PLAN: [PassSpec; 7] = [
    PassSpec {
        label: "lens",
        stage: StageKind::LensAberration,
        inputs: &[TargetId::Source],
        output: TargetId::Aberrated,
        direction: [0.0, 0.0],
        step: 0.0,
    },
    PassSpec {
        label: "extract",
        stage: StageKind::HighlightExtract,
        inputs: &[TargetId::Aberrated],
        output: TargetId::HalfA,
        direction: [0.0, 0.0],
        step: 0.0,
    },
    PassSpec {
        label: "tight_h",
        stage: StageKind::SeparableBlur,
        inputs: &[TargetId::HalfA],
        output: TargetId::HalfB,
        direction: HORIZONTAL,
        step: TIGHT_STEP,
    },
    PassSpec {
        label: "tight_v",
        stage: StageKind::SeparableBlur,
        inputs: &[TargetId::HalfB],
        output: TargetId::HalfC,
        direction: VERTICAL,
        step: TIGHT_STEP,
    },
    PassSpec {
        label: "wide_h",
        stage: StageKind::SeparableBlur,
        inputs: &[TargetId::HalfC],
        output: TargetId::HalfD,
        direction: HORIZONTAL,
        step: WIDE_STEP,
    },
    PassSpec {
        label: "wide_v",
        stage: StageKind::SeparableBlur,
        inputs: &[TargetId::HalfD],
        output: TargetId::HalfA,
        direction: VERTICAL,
        step: WIDE_STEP,
    },
    PassSpec {
        label: "composite",
        stage: StageKind::Composite,
        inputs: &[TargetId::Aberrated, TargetId::HalfC, TargetId::HalfA],
        output: TargetId::Final,
        direction: [0.0, 0.0],
        step: 0.0,
    },
];

/// Checks that no pass reads its own output, every input was written earlier
/// in the frame (the source is written by the upload), stage arity and
/// output format agree with the target, and the plan ends in the final target.
pub fn validate_plan(plan: &[PassSpec]) -> LensResult<()> {
    let mut written = vec![TargetId::Source];
    for pass in plan {
        let desc = pass.stage.descriptor();
        if pass.inputs.len() != desc.inputs as usize {
            return Err(LensError::StageCompile {
                stage: desc.label,
                diagnostic: format!(
                    "pass `{}` binds {} inputs, stage expects {}",
                    pass.label,
                    pass.inputs.len(),
                    desc.inputs
                ),
            });
        }
        if pass.output == TargetId::Source {
            return Err(LensError::Aliasing {
                pass: pass.label,
                target: pass.output.label(),
            });
        }
        if pass.inputs.contains(&pass.output) {
            return Err(LensError::Aliasing {
                pass: pass.label,
                target: pass.output.label(),
            });
        }
        if let Some(unwritten) = pass.inputs.iter().find(|id| !written.contains(*id)) {
            return Err(LensError::TargetIncomplete {
                target: unwritten.label(),
                reason: format!("read by `{}` before any pass writes it", pass.label),
            });
        }
        if pass.output.format() != desc.output_format {
            return Err(LensError::TargetIncomplete {
                target: pass.output.label(),
                reason: format!(
                    "stage `{}` renders {:?}, target is {:?}",
                    desc.label,
                    desc.output_format,
                    pass.output.format()
                ),
            });
        }
        if !written.contains(&pass.output) {
            written.push(pass.output);
        }
    }
    match plan.last() {
        Some(last) if last.output == TargetId::Final => Ok(()),
        _ => Err(LensError::TargetIncomplete {
            target: TargetId::Final.label(),
            reason: "frame plan never writes the final target".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_plan_is_valid() {
        validate_plan(&FRAME_PLAN).expect("static frame plan should validate");
    }

    #[test]
    fn half_targets_round_up() {
        assert_eq!(TargetScale::Half.dims(5, 3), (3, 2));
        assert_eq!(TargetScale::Half.dims(1, 1), (1, 1));
        assert_eq!(TargetScale::Full.dims(5, 3), (5, 3));
    }

    #[test]
    fn tight_and_wide_blurs_stay_distinct_layers() {
        let composite = FRAME_PLAN.last().expect("plan not empty");
        assert_eq!(composite.inputs.len(), 3);
        assert_ne!(composite.inputs[1], composite.inputs[2]);
        let steps: Vec<f32> = FRAME_PLAN
            .iter()
            .filter(|pass| pass.stage == StageKind::SeparableBlur)
            .map(|pass| pass.step)
            .collect();
        assert_eq!(steps, vec![TIGHT_STEP, TIGHT_STEP, WIDE_STEP, WIDE_STEP]);
        assert!(WIDE_STEP > TIGHT_STEP);
    }

    #[test]
    fn rejects_self_read() {
        let plan = [PassSpec {
            label: "feedback",
            stage: StageKind::SeparableBlur,
            inputs: &[TargetId::HalfA],
            output: TargetId::HalfA,
            direction: HORIZONTAL,
            step: 1.0,
        }];
        let err = validate_plan(&plan).unwrap_err();
        assert!(matches!(
            err,
            LensError::Aliasing {
                pass: "feedback",
                target: "half_a"
            }
        ));
    }

    #[test]
    fn rejects_read_before_write() {
        let plan = [PassSpec {
            label: "early_blur",
            stage: StageKind::SeparableBlur,
            inputs: &[TargetId::HalfB],
            output: TargetId::HalfC,
            direction: VERTICAL,
            step: 1.0,
        }];
        let err = validate_plan(&plan).unwrap_err();
        assert!(matches!(err, LensError::TargetIncomplete { target: "half_b", .. }));
    }

    #[test]
    fn rejects_wrong_output_format_and_missing_final() {
        let plan = [PassSpec {
            label: "lens_to_final",
            stage: StageKind::LensAberration,
            inputs: &[TargetId::Source],
            output: TargetId::Final,
            direction: [0.0, 0.0],
            step: 0.0,
        }];
        assert!(validate_plan(&plan).is_err());
        assert!(validate_plan(&FRAME_PLAN[..6]).is_err());
    }
}
