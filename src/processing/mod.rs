pub mod cpu;
pub mod gpu_pipeline;
pub mod optics;
pub mod plan;
pub mod readback;
mod shaders;
pub mod stages;
pub mod surfaces;

use image::RgbaImage;

use crate::error::LensResult;
use crate::params::{LensParams, ParamMap};

/// A backend that runs the frame plan over one raster at a time.
pub trait LensRenderer {
    fn name(&self) -> &'static str;

    /// (Re)allocates resources for `width`×`height`; idempotent for an unchanged size.
    fn ensure(&mut self, width: u32, height: u32) -> bool;

    fn render_resolved(&mut self, source: &RgbaImage, params: &LensParams) -> LensResult<RgbaImage>;

    /// Resolves a partial profile map over the defaults, then renders.
    fn render(&mut self, source: &RgbaImage, params: &ParamMap) -> LensResult<RgbaImage> {
        self.render_resolved(source, &LensParams::resolve(params))
    }
}
