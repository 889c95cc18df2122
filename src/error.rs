pub type LensResult<T> = Result<T, LensError>;

#[derive(thiserror::Error, Debug, Clone)]
pub enum LensError {
    #[error("gpu context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("stage `{stage}` failed to compile: {diagnostic}")]
    StageCompile {
        stage: &'static str,
        diagnostic: String,
    },

    #[error("render target `{target}` incomplete: {reason}")]
    TargetIncomplete {
        target: &'static str,
        reason: String,
    },

    #[error("invalid raster dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("pass `{pass}` would read and write target `{target}`")]
    Aliasing {
        pass: &'static str,
        target: &'static str,
    },

    #[error("readback failed: {0}")]
    Readback(String),

    #[error("pipeline unusable after earlier failure: {0}")]
    Poisoned(String),
}

impl LensError {
    pub fn context(msg: impl Into<String>) -> Self {
        Self::ContextUnavailable(msg.into())
    }

    pub fn readback(msg: impl Into<String>) -> Self {
        Self::Readback(msg.into())
    }

    /// Whether this error leaves the pipeline instance unusable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ContextUnavailable(_)
                | Self::StageCompile { .. }
                | Self::TargetIncomplete { .. }
                | Self::Poisoned(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage_and_target() {
        let err = LensError::StageCompile {
            stage: "lens_aberration",
            diagnostic: "unknown identifier".into(),
        };
        let text = err.to_string();
        assert!(text.contains("lens_aberration"));
        assert!(text.contains("unknown identifier"));

        let err = LensError::Aliasing {
            pass: "composite",
            target: "aberrated",
        };
        assert!(err.to_string().contains("aberrated"));
    }

    #[test]
    fn only_device_and_kernel_failures_are_fatal() {
        assert!(LensError::context("no adapter").is_fatal());
        assert!(
            LensError::TargetIncomplete {
                target: "final",
                reason: "oom".into()
            }
            .is_fatal()
        );
        assert!(
            !LensError::InvalidDimensions {
                width: 0,
                height: 4
            }
            .is_fatal()
        );
        assert!(!LensError::readback("map failed").is_fatal());
    }
}
