pub mod config;
pub mod error;
pub mod export;
pub mod params;
pub mod processing;
pub mod profiles;

pub use error::{LensError, LensResult};
pub use params::{LensParams, ParamKey, ParamMap};
pub use processing::LensRenderer;
pub use processing::cpu::CpuPipeline;
pub use processing::gpu_pipeline::{GpuOptions, LensPipeline};
pub use profiles::ProfileLibrary;
