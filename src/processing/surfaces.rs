use crate::error::{LensError, LensResult};

use super::plan::TargetId;
use super::readback::ReadbackLayout;

pub struct Target {
    pub id: TargetId,
    pub width: u32,
    pub height: u32,
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Owns every render target of the pipeline at one allocated size.
///
/// All targets and the readback buffer are replaced together when the
/// requested size changes; contents never survive a reallocation.
#[derive(Default)]
pub struct SurfacePool {
    size: Option<(u32, u32)>,
    targets: Vec<Target>,
    readback: Option<(wgpu::Buffer, ReadbackLayout)>,
    generation: u64,
}

impl SurfacePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Bumped on every reallocation; bindings built for an older generation are stale.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `Ok(true)` when targets were (re)allocated, `Ok(false)` when the size is unchanged.
    pub fn ensure(&mut self, device: &wgpu::Device, width: u32, height: u32) -> LensResult<bool> {
        if width == 0 || height == 0 {
            return Err(LensError::InvalidDimensions { width, height });
        }
        let max_dim = device.limits().max_texture_dimension_2d;
        if width > max_dim || height > max_dim {
            return Err(LensError::InvalidDimensions { width, height });
        }
        if self.size == Some((width, height)) {
            return Ok(false);
        }

        self.release();
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let targets: Vec<Target> = TargetId::ALL
            .iter()
            .map(|&id| {
                let (w, h) = id.scale().dims(width, height);
                let texture = device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(id.label()),
                    size: wgpu::Extent3d {
                        width: w,
                        height: h,
                        depth_or_array_layers: 1,
                    },
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: id.format(),
                    usage: id.usage(),
                    view_formats: &[],
                });
                let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
                Target {
                    id,
                    width: w,
                    height: h,
                    texture,
                    view,
                }
            })
            .collect();
        let layout = ReadbackLayout::new(width, height);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lens_readback"),
            size: layout.buffer_size(),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let oom = pollster::block_on(device.pop_error_scope());
        if let Some(err) = validation.or(oom) {
            tracing::error!(width, height, error = %err, "render target allocation failed");
            return Err(LensError::TargetIncomplete {
                target: "surfaces",
                reason: err.to_string(),
            });
        }

        tracing::info!(width, height, "allocated render targets");
        self.targets = targets;
        self.readback = Some((buffer, layout));
        self.size = Some((width, height));
        self.generation += 1;
        Ok(true)
    }

    pub fn target(&self, id: TargetId) -> LensResult<&Target> {
        self.targets
            .iter()
            .find(|target| target.id == id)
            .ok_or_else(|| LensError::TargetIncomplete {
                target: id.label(),
                reason: "targets not allocated".into(),
            })
    }

    pub fn readback(&self) -> LensResult<(&wgpu::Buffer, ReadbackLayout)> {
        self.readback
            .as_ref()
            .map(|(buffer, layout)| (buffer, *layout))
            .ok_or_else(|| LensError::readback("readback buffer not allocated"))
    }

    pub fn release(&mut self) {
        for target in self.targets.drain(..) {
            target.texture.destroy();
        }
        if let Some((buffer, _)) = self.readback.take() {
            buffer.destroy();
        }
        self.size = None;
    }
}
