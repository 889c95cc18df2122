use std::sync::{
    OnceLock,
    atomic::{AtomicBool, Ordering},
};

use image::RgbaImage;

use crate::error::{LensError, LensResult};
use crate::params::LensParams;

use super::LensRenderer;
use super::plan::{FRAME_PLAN, PassSpec, TargetId, validate_plan};
use super::readback::{self, RowOrder};
use super::stages::{PassUniforms, StageKind, StageProgram};
use super::surfaces::{SurfacePool, Target};

pub const DEBUG_ALLOW_CPU_FALLBACK_ENV: &str = "LENS_EMULATOR_DEBUG_ALLOW_CPU_FALLBACK";

static ADAPTER_PRESENT: OnceLock<bool> = OnceLock::new();
static GPU_FALLBACK_REPORTED: AtomicBool = AtomicBool::new(false);

#[derive(Clone, Debug)]
/// Adapter selection for [`LensPipeline::new`].
pub struct GpuOptions {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::PRIMARY,
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
/// Snapshot of the adapter backing a pipeline.
pub struct RuntimeStatus {
    pub available: bool,
    pub adapter_name: Option<String>,
    pub adapter_backend: Option<String>,
    pub max_texture_dimension: u32,
}

struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    adapter_backend: String,
}

/// Whether any adapter can be acquired. Probed once per process.
pub fn is_available() -> bool {
    *ADAPTER_PRESENT.get_or_init(|| {
        let options = GpuOptions::default();
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });
        pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: options.power_preference,
            force_fallback_adapter: options.force_fallback_adapter,
            compatible_surface: None,
        }))
        .is_some()
    })
}

pub fn allow_debug_cpu_fallback() -> bool {
    std::env::var(DEBUG_ALLOW_CPU_FALLBACK_ENV)
        .ok()
        .map(|raw| debug_fallback_truthy(&raw))
        .unwrap_or(false)
}

fn debug_fallback_truthy(raw: &str) -> bool {
    let norm = raw.trim().to_ascii_lowercase();
    norm == "1" || norm == "true" || norm == "yes" || norm == "on"
}

pub fn report_gpu_fallback_once(err: &LensError) {
    if !GPU_FALLBACK_REPORTED.swap(true, Ordering::Relaxed) {
        tracing::warn!(
            error = %err,
            "gpu pipeline unavailable; set {}=1 to enable debug CPU fallback",
            DEBUG_ALLOW_CPU_FALLBACK_ENV
        );
    }
}

fn init_gpu_context(options: &GpuOptions) -> LensResult<GpuContext> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: options.backends,
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: options.power_preference,
        force_fallback_adapter: options.force_fallback_adapter,
        compatible_surface: None,
    }))
    .ok_or_else(|| LensError::context("no compatible adapter"))?;
    let adapter_info = adapter.get_info();
    let adapter_name = adapter_info.name;
    let adapter_backend = adapter_info.backend.to_string();
    let adapter_driver = if adapter_info.driver.trim().is_empty() {
        "unknown".to_string()
    } else {
        adapter_info.driver
    };
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("lens_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .map_err(|err| LensError::context(err.to_string()))?;
    device.on_uncaptured_error(Box::new(|err| {
        tracing::error!(error = %err, "uncaptured gpu error");
    }));

    tracing::info!(
        adapter = %adapter_name,
        backend = %adapter_backend,
        driver = %adapter_driver,
        "gpu context ready"
    );
    Ok(GpuContext {
        device,
        queue,
        adapter_name,
        adapter_backend,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    Idle,
    Allocated,
    Uploaded,
    Rendered,
    ReadBack,
}

struct PassSlot {
    spec: &'static PassSpec,
    uniforms: wgpu::Buffer,
    bind_group: Option<wgpu::BindGroup>,
}

struct Draw<'a> {
    slot: &'a PassSlot,
    stage: &'a StageProgram,
    target: &'a Target,
    bind_group: &'a wgpu::BindGroup,
}

/// GPU lens pipeline: owns the device, the compiled stages and every target.
pub struct LensPipeline {
    ctx: GpuContext,
    sampler: wgpu::Sampler,
    stages: Vec<StageProgram>,
    passes: Vec<PassSlot>,
    surfaces: SurfacePool,
    bound_generation: u64,
    state: FrameState,
    poisoned: Option<String>,
}

impl LensPipeline {
    /// Acquires a device and compiles every stage. Any stage failure fails construction.
    pub fn new(options: &GpuOptions) -> LensResult<Self> {
        validate_plan(&FRAME_PLAN)?;
        let ctx = init_gpu_context(options)?;
        let stages = StageKind::ALL
            .iter()
            .map(|kind| StageProgram::compile(&ctx.device, kind.descriptor()))
            .collect::<LensResult<Vec<_>>>()?;
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("lens_linear_clamp"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        // One uniform buffer per pass: all writes land before the single submit.
        let passes = FRAME_PLAN
            .iter()
            .map(|spec| PassSlot {
                spec,
                uniforms: ctx.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(spec.label),
                    size: spec.stage.descriptor().uniform_size(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                bind_group: None,
            })
            .collect();

        Ok(Self {
            ctx,
            sampler,
            stages,
            passes,
            surfaces: SurfacePool::new(),
            bound_generation: 0,
            state: FrameState::Idle,
            poisoned: None,
        })
    }

    pub fn runtime_status(&self) -> RuntimeStatus {
        RuntimeStatus {
            available: self.poisoned.is_none(),
            adapter_name: Some(self.ctx.adapter_name.clone()),
            adapter_backend: Some(self.ctx.adapter_backend.clone()),
            max_texture_dimension: self.ctx.device.limits().max_texture_dimension_2d,
        }
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    /// Allocates targets for `width`×`height` and rebinds every pass.
    pub fn try_ensure(&mut self, width: u32, height: u32) -> LensResult<()> {
        self.check_poisoned()?;
        let result = self.allocate(width, height);
        self.settle(&result);
        result
    }

    fn allocate(&mut self, width: u32, height: u32) -> LensResult<()> {
        self.surfaces.ensure(&self.ctx.device, width, height)?;
        if self.bound_generation != self.surfaces.generation() {
            self.rebuild_bind_groups()?;
        }
        self.state = FrameState::Allocated;
        Ok(())
    }

    fn rebuild_bind_groups(&mut self) -> LensResult<()> {
        for slot in &mut self.passes {
            let stage = &self.stages[slot.spec.stage as usize];
            let mut entries: Vec<wgpu::BindGroupEntry> =
                Vec::with_capacity(slot.spec.inputs.len() + 2);
            for (binding, &id) in slot.spec.inputs.iter().enumerate() {
                entries.push(wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(&self.surfaces.target(id)?.view),
                });
            }
            let next = slot.spec.inputs.len() as u32;
            entries.push(wgpu::BindGroupEntry {
                binding: next,
                resource: wgpu::BindingResource::Sampler(&self.sampler),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: next + 1,
                resource: slot.uniforms.as_entire_binding(),
            });
            slot.bind_group = Some(self.ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(slot.spec.label),
                layout: &stage.bgl,
                entries: &entries,
            }));
        }
        self.bound_generation = self.surfaces.generation();
        tracing::debug!(generation = self.bound_generation, "rebound pass inputs");
        Ok(())
    }

    fn check_poisoned(&self) -> LensResult<()> {
        match &self.poisoned {
            Some(reason) => Err(LensError::Poisoned(reason.clone())),
            None => Ok(()),
        }
    }

    /// Resets to idle on failure; fatal failures poison the instance.
    fn settle<T>(&mut self, result: &LensResult<T>) {
        if let Err(err) = result {
            self.state = FrameState::Idle;
            if err.is_fatal() && self.poisoned.is_none() {
                tracing::error!(error = %err, "lens pipeline poisoned");
                self.poisoned = Some(err.to_string());
            }
        }
    }

    fn run_frame(&mut self, source: &RgbaImage, params: &LensParams) -> LensResult<RgbaImage> {
        let (width, height) = source.dimensions();
        self.allocate(width, height)?;
        self.upload(source)?;

        let draws = self.frame_draws()?;
        let (buffer, layout) = self.surfaces.readback()?;
        let final_target = self.surfaces.target(TargetId::Final)?;

        // Nothing below may return early until the scope is popped.
        let device = &self.ctx.device;
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("lens_frame"),
        });
        for draw in &draws {
            let spec = draw.slot.spec;
            let pass = PassUniforms {
                width: draw.target.width,
                height: draw.target.height,
                direction: spec.direction,
                step: spec.step,
            };
            let values = draw.stage.descriptor().pack_uniforms(&pass, params);
            self.ctx.queue.write_buffer(&draw.slot.uniforms, 0, f32s_as_bytes(&values));

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(spec.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &draw.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rpass.set_pipeline(&draw.stage.pipeline);
            rpass.set_bind_group(0, draw.bind_group, &[]);
            rpass.draw(0..3, 0..1);
            tracing::trace!(pass = spec.label, "encoded pass");
        }

        readback::encode_copy(&mut encoder, &final_target.texture, buffer, &layout);
        self.ctx.queue.submit([encoder.finish()]);
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(LensError::TargetIncomplete {
                target: "frame",
                reason: err.to_string(),
            });
        }
        self.state = FrameState::Rendered;

        let pixels = readback::map_blocking(device, buffer, &layout, RowOrder::BottomUp)?;
        self.state = FrameState::ReadBack;
        RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| LensError::readback("readback size does not match raster"))
    }

    /// Resolves every pass's target, stage and bind group up front.
    fn frame_draws(&self) -> LensResult<Vec<Draw<'_>>> {
        let mut draws = Vec::with_capacity(self.passes.len());
        for slot in &self.passes {
            let bind_group = slot.bind_group.as_ref().ok_or_else(|| LensError::TargetIncomplete {
                target: slot.spec.output.label(),
                reason: format!("pass `{}` has no bind group", slot.spec.label),
            })?;
            draws.push(Draw {
                slot,
                stage: &self.stages[slot.spec.stage as usize],
                target: self.surfaces.target(slot.spec.output)?,
                bind_group,
            });
        }
        Ok(draws)
    }

    /// Writes the source rows bottom-up into the source target.
    fn upload(&mut self, source: &RgbaImage) -> LensResult<()> {
        let (width, height) = source.dimensions();
        let target = self.surfaces.target(TargetId::Source)?;
        let bottom_up = readback::flipped(source.as_raw(), width as usize * 4);
        self.ctx.queue.write_texture(
            target.texture.as_image_copy(),
            &bottom_up,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width.saturating_mul(4)),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.state = FrameState::Uploaded;
        Ok(())
    }
}

impl LensRenderer for LensPipeline {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn ensure(&mut self, width: u32, height: u32) -> bool {
        match self.try_ensure(width, height) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(width, height, error = %err, "ensure failed");
                false
            }
        }
    }

    fn render_resolved(&mut self, source: &RgbaImage, params: &LensParams) -> LensResult<RgbaImage> {
        self.check_poisoned()?;
        let result = self.run_frame(source, params);
        self.settle(&result);
        if let Err(err) = &result {
            tracing::warn!(error = %err, "render failed");
        }
        result
    }
}

fn f32s_as_bytes(values: &[f32]) -> &[u8] {
    // f32 has no invalid bit patterns; reinterpreting as bytes is safe.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}
