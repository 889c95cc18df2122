//! Reference implementation of the frame plan on the CPU.
//!
//! Every stage mirrors its WGSL kernel: the same constants, the same
//! bottom-up texel convention and clamp-to-edge bilinear sampling. Used by
//! tests, for debugging and as the opt-in fallback when no adapter exists.

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{LensError, LensResult};
use crate::params::LensParams;

use super::LensRenderer;
use super::optics::{
    self, BLUR_WEIGHTS, CA_PX, COMA_PX, CURVATURE_MIX, CURVATURE_SOFT_PX, EDGE_SOFT_PX,
    GLOBAL_SOFT_PX, HALATION_GAIN, HALATION_TINT, Rgb, TIGHT_WEIGHT, VEIL_CENTER_WEIGHT, VEIL_HI,
    VEIL_LIFT, VEIL_LO, WIDE_BASE, WIDE_VEIL,
};
use super::plan::{FRAME_PLAN, PassSpec, TargetId, validate_plan};
use super::readback::{ReadbackLayout, RowOrder, flipped, unpad_rows};
use super::stages::StageKind;

type Texel = [f32; 4];

/// Largest plane edge accepted; matches the common GPU 2D texture limit.
pub const MAX_PLANE_DIMENSION: u32 = 16384;

#[derive(Clone, Debug, Default)]
struct Plane {
    width: u32,
    height: u32,
    texels: Vec<Texel>,
}

impl Plane {
    fn try_new(width: u32, height: u32) -> Option<Self> {
        let len = (width as usize).checked_mul(height as usize)?;
        let mut texels = Vec::new();
        texels.try_reserve_exact(len).ok()?;
        texels.resize(len, [0.0; 4]);
        Some(Self {
            width,
            height,
            texels,
        })
    }

    fn load(&self, x: i64, y: i64) -> Texel {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Linear filtering with clamp-to-edge addressing, like the GPU sampler.
    fn sample(&self, uv: [f32; 2]) -> Texel {
        let x = uv[0] * self.width as f32 - 0.5;
        let y = uv[1] * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let p00 = self.load(x0, y0);
        let p10 = self.load(x0 + 1, y0);
        let p01 = self.load(x0, y0 + 1);
        let p11 = self.load(x0 + 1, y0 + 1);
        std::array::from_fn(|i| {
            let bottom = optics::mix(p00[i], p10[i], fx);
            let top = optics::mix(p01[i], p11[i], fx);
            optics::mix(bottom, top, fy)
        })
    }

    fn render_rows<F>(&mut self, shade: F)
    where
        F: Fn(u32, u32) -> Texel + Sync,
    {
        let width = self.width as usize;
        self.texels
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, texel) in row.iter_mut().enumerate() {
                    *texel = shade(x as u32, y as u32);
                }
            });
    }
}

/// CPU mirror of [`super::gpu_pipeline::LensPipeline`].
#[derive(Default)]
pub struct CpuPipeline {
    size: Option<(u32, u32)>,
    planes: Vec<Plane>,
}

impl CpuPipeline {
    pub fn new() -> LensResult<Self> {
        validate_plan(&FRAME_PLAN)?;
        Ok(Self::default())
    }

    pub fn try_ensure(&mut self, width: u32, height: u32) -> LensResult<()> {
        if width == 0 || height == 0 || width > MAX_PLANE_DIMENSION || height > MAX_PLANE_DIMENSION {
            return Err(LensError::InvalidDimensions { width, height });
        }
        if self.size == Some((width, height)) {
            return Ok(());
        }
        self.planes = TargetId::ALL
            .iter()
            .map(|id| {
                let (w, h) = id.scale().dims(width, height);
                Plane::try_new(w, h)
            })
            .collect::<Option<Vec<_>>>()
            .ok_or(LensError::InvalidDimensions { width, height })?;
        self.size = Some((width, height));
        tracing::debug!(width, height, "allocated cpu planes");
        Ok(())
    }

    fn plane(&self, id: TargetId) -> &Plane {
        &self.planes[id as usize]
    }

    fn upload(&mut self, source: &RgbaImage) {
        let row_bytes = source.width() as usize * 4;
        let bottom_up = flipped(source.as_raw(), row_bytes);
        let plane = &mut self.planes[TargetId::Source as usize];
        for (texel, px) in plane.texels.iter_mut().zip(bottom_up.chunks_exact(4)) {
            *texel = std::array::from_fn(|i| f32::from(px[i]) / 255.0);
        }
    }

    fn run_pass(&mut self, pass: &PassSpec, params: &LensParams) {
        let mut out = std::mem::take(&mut self.planes[pass.output as usize]);
        let inputs: Vec<&Plane> = pass.inputs.iter().map(|&id| self.plane(id)).collect();
        match pass.stage {
            StageKind::LensAberration => lens_aberration(inputs[0], &mut out, params),
            StageKind::HighlightExtract => highlight_extract(inputs[0], &mut out, params),
            StageKind::SeparableBlur => separable_blur(inputs[0], &mut out, pass.direction, pass.step),
            StageKind::Composite => composite(inputs[0], inputs[1], inputs[2], &mut out, params),
        }
        self.planes[pass.output as usize] = out;
    }

    fn read_final(&self) -> LensResult<RgbaImage> {
        let plane = self.plane(TargetId::Final);
        let layout = ReadbackLayout::new(plane.width, plane.height);
        let mut padded = vec![0_u8; layout.buffer_size() as usize];
        let stride = layout.padded_bytes_per_row as usize;
        for (y, row) in plane.texels.chunks(plane.width as usize).enumerate() {
            for (x, texel) in row.iter().enumerate() {
                let offset = y * stride + x * 4;
                for (i, &c) in texel.iter().enumerate() {
                    padded[offset + i] = (c.clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }
        let pixels = unpad_rows(&padded, &layout, RowOrder::BottomUp)?;
        RgbaImage::from_raw(plane.width, plane.height, pixels)
            .ok_or_else(|| LensError::readback("final plane does not match raster size"))
    }
}

impl LensRenderer for CpuPipeline {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn ensure(&mut self, width: u32, height: u32) -> bool {
        match self.try_ensure(width, height) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(width, height, error = %err, "cpu ensure failed");
                false
            }
        }
    }

    fn render_resolved(&mut self, source: &RgbaImage, params: &LensParams) -> LensResult<RgbaImage> {
        self.try_ensure(source.width(), source.height())?;
        self.upload(source);
        for pass in &FRAME_PLAN {
            tracing::trace!(pass = pass.label, "cpu pass");
            self.run_pass(pass, params);
        }
        self.read_final()
    }
}

fn uv_at(x: u32, y: u32, res: [f32; 2]) -> [f32; 2] {
    [(x as f32 + 0.5) / res[0], (y as f32 + 0.5) / res[1]]
}

fn offset(uv: [f32; 2], d: [f32; 2], scale: f32) -> [f32; 2] {
    [uv[0] + d[0] * scale, uv[1] + d[1] * scale]
}

fn rgb(t: Texel) -> Rgb {
    [t[0], t[1], t[2]]
}

fn lens_aberration(src: &Plane, out: &mut Plane, p: &LensParams) {
    let res = [out.width as f32, out.height as f32];
    let texel = [1.0 / res[0], 1.0 / res[1]];
    let fetch = |uv: [f32; 2]| -> Rgb { rgb(src.sample(uv)).map(optics::to_linear) };
    let cross_blur = |uv: [f32; 2], radius_px: f32| -> Rgb {
        let o = [texel[0] * radius_px, texel[1] * radius_px];
        let taps = [
            fetch(uv),
            fetch([uv[0] + o[0], uv[1]]),
            fetch([uv[0] - o[0], uv[1]]),
            fetch([uv[0], uv[1] + o[1]]),
            fetch([uv[0], uv[1] - o[1]]),
        ];
        std::array::from_fn(|i| taps.iter().map(|t| t[i]).sum::<f32>() / 5.0)
    };
    let lens_sample = |uv: [f32; 2], dir: [f32; 2], edge: f32| -> Rgb {
        let curvature = p.field_curvature * edge * edge;
        let soft_px = p.global_softness * GLOBAL_SOFT_PX
            + edge * p.edge_softness * EDGE_SOFT_PX
            + curvature * CURVATURE_SOFT_PX;
        let soft_mix =
            (p.global_softness + edge * p.edge_softness + curvature * CURVATURE_MIX).clamp(0.0, 1.0);
        let col = optics::mix3(fetch(uv), cross_blur(uv, soft_px), soft_mix);

        let smear = [
            dir[0] * texel[0] * p.coma * edge * COMA_PX,
            dir[1] * texel[1] * p.coma * edge * COMA_PX,
        ];
        let near = fetch(offset(uv, smear, 0.5));
        let far = fetch(offset(uv, smear, 1.0));
        let tail = std::array::from_fn(|i| 0.5 * (near[i] + far[i]));
        optics::mix3(col, tail, (edge * p.coma).clamp(0.0, 1.0))
    };

    out.render_rows(|x, y| {
        let uv = uv_at(x, y, res);
        let lens = optics::radial(uv, res, p.decenter, p.coma_anamorph);
        let edge = optics::edge_mask(lens.r);
        let ca = [
            lens.dir[0] * texel[0] * p.chromatic_aberration * edge * CA_PX,
            lens.dir[1] * texel[1] * p.chromatic_aberration * edge * CA_PX,
        ];
        let mut col = [
            lens_sample(offset(uv, ca, 1.0), lens.dir, edge)[0],
            lens_sample(uv, lens.dir, edge)[1],
            lens_sample(offset(uv, ca, -1.0), lens.dir, edge)[2],
        ];

        let gain = optics::vignette_gain(p.vignette, lens.r);
        col = col.map(|c| c * gain);

        let luma = optics::perceptual_luma(col);
        let lift = optics::smoothstep(VEIL_LO, VEIL_HI, luma)
            * p.veil
            * luma
            * optics::mix(VEIL_CENTER_WEIGHT, 1.0, edge);
        let lift = (lift * VEIL_LIFT).clamp(0.0, 1.0);
        col = col.map(|c| c + (1.0 - c) * lift);

        [col[0], col[1], col[2], src.sample(uv)[3]]
    });
}

fn highlight_extract(src: &Plane, out: &mut Plane, p: &LensParams) {
    let tint = optics::warm_tint(p.bloom_warmth);
    out.render_rows(|x, y| {
        let origin = (x as i64 * 2, y as i64 * 2);
        let mut acc = [0.0_f32; 3];
        let mut energy = 0.0;
        for i in 0..4 {
            let c = rgb(src.load(origin.0 + i % 2, origin.1 + i / 2));
            let luma = optics::perceptual_luma(c);
            let m = optics::highlight_mask(luma);
            for ch in 0..3 {
                acc[ch] += c[ch] * m;
            }
            energy += m * luma;
        }
        [
            acc[0] * 0.25 * p.bloom * tint[0],
            acc[1] * 0.25 * p.bloom * tint[1],
            acc[2] * 0.25 * p.bloom * tint[2],
            energy * 0.25,
        ]
    });
}

fn separable_blur(src: &Plane, out: &mut Plane, direction: [f32; 2], step: f32) {
    let res = [out.width as f32, out.height as f32];
    let o = [direction[0] / res[0] * step, direction[1] / res[1] * step];
    out.render_rows(|x, y| {
        let uv = uv_at(x, y, res);
        let mut acc = src.sample(uv).map(|c| c * BLUR_WEIGHTS[0]);
        for (k, &w) in BLUR_WEIGHTS.iter().enumerate().skip(1) {
            let plus = src.sample(offset(uv, o, k as f32));
            let minus = src.sample(offset(uv, o, -(k as f32)));
            for i in 0..4 {
                acc[i] += (plus[i] + minus[i]) * w;
            }
        }
        acc
    });
}

fn composite(base: &Plane, tight: &Plane, wide: &Plane, out: &mut Plane, p: &LensParams) {
    let res = [out.width as f32, out.height as f32];
    let wide_weight = WIDE_BASE + p.veil * WIDE_VEIL;
    out.render_rows(|x, y| {
        let uv = uv_at(x, y, res);
        let b = base.load(x as i64, y as i64);
        let t = tight.sample(uv);
        let w = wide.sample(uv);
        let lens = optics::radial(uv, res, p.decenter, p.coma_anamorph);
        let edge = optics::edge_mask(lens.r);
        let halation = w[3] * p.halation * edge * HALATION_GAIN;

        let col: Rgb = std::array::from_fn(|i| {
            let c = optics::screen(b[i], t[i] * TIGHT_WEIGHT);
            let c = optics::screen(c, w[i] * wide_weight);
            let c = optics::screen(c, HALATION_TINT[i] * halation);
            optics::to_gamma(c.clamp(0.0, 1.0))
        });
        [col[0], col[1], col[2], b[3]]
    });
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba};
    use serde_json::json;

    use super::*;
    use crate::params::{ParamKey, ParamMap};

    fn render(img: &RgbaImage, params: &LensParams) -> RgbaImage {
        let mut pipeline = CpuPipeline::new().expect("cpu pipeline");
        pipeline.render_resolved(img, params).expect("cpu render")
    }

    fn with(pairs: &[(ParamKey, f32)]) -> LensParams {
        let mut params = LensParams::default();
        for &(key, value) in pairs {
            params.set(key, value);
        }
        params
    }

    fn luma(px: &Rgba<u8>) -> f32 {
        0.2126 * f32::from(px[0]) + 0.7152 * f32::from(px[1]) + 0.0722 * f32::from(px[2])
    }

    fn max_channel_diff(a: &RgbaImage, b: &RgbaImage) -> u8 {
        a.pixels()
            .zip(b.pixels())
            .flat_map(|(p, q)| (0..4).map(move |i| p[i].abs_diff(q[i])))
            .max()
            .unwrap_or(0)
    }

    fn test_pattern(width: u32, height: u32) -> RgbaImage {
        ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([
                ((x * 7 + y * 3) % 256) as u8,
                ((x * 11 + y * 5) % 256) as u8,
                ((x * 13 + y * 17) % 256) as u8,
                255,
            ])
        })
    }

    #[test]
    fn defaults_are_identity_within_rounding() {
        let img = test_pattern(37, 23);
        let out = render(&img, &LensParams::default());
        assert_eq!(out.dimensions(), img.dimensions());
        assert!(max_channel_diff(&img, &out) <= 1);
    }

    #[test]
    fn alpha_passes_through() {
        let img = ImageBuffer::from_fn(8, 8, |x, y| Rgba([200, 100, 50, (x * 30 + y) as u8]));
        let out = render(&img, &with(&[(ParamKey::Vignette, 1.0), (ParamKey::Bloom, 1.0)]));
        for (a, b) in img.pixels().zip(out.pixels()) {
            assert_eq!(a[3], b[3]);
        }
    }

    #[test]
    fn vignette_darkens_corner_monotonically_and_spares_centre() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]));
        let corners: Vec<f32> = [0.0, 0.6, 1.2]
            .iter()
            .map(|&v| {
                let out = render(&img, &with(&[(ParamKey::Vignette, v)]));
                assert_eq!(out.get_pixel(32, 32)[1], 128);
                luma(out.get_pixel(0, 0))
            })
            .collect();
        assert!(corners[0] > corners[1], "{corners:?}");
        assert!(corners[1] > corners[2], "{corners:?}");
    }

    #[test]
    fn chromatic_aberration_separates_channels_only_off_axis() {
        let img = ImageBuffer::from_fn(64, 64, |x, _| {
            let v = if (x / 8) % 2 == 0 { 255 } else { 0 };
            Rgba([v, v, v, 255])
        });

        let flat = render(&img, &LensParams::default());
        for px in flat.pixels() {
            assert!(px[0] == px[1] && px[1] == px[2]);
        }

        let split = render(&img, &with(&[(ParamKey::ChromaticAberration, 1.0)]));
        let centre = split.get_pixel(32, 32);
        assert!(centre[0] == centre[1] && centre[1] == centre[2]);
        let widest = split
            .enumerate_pixels()
            .filter(|(x, y, _)| *x < 8 || *x >= 56 || *y < 8 || *y >= 56)
            .map(|(_, _, px)| px[0].abs_diff(px[2]))
            .max()
            .unwrap_or(0);
        assert!(widest > 20, "max |r-b| in outer ring was {widest}");
    }

    #[test]
    fn bloom_brightens_neighbours_monotonically() {
        let mut img = RgbaImage::from_pixel(32, 32, Rgba([40, 40, 40, 255]));
        img.put_pixel(16, 16, Rgba([255, 255, 255, 255]));
        let neighbour: Vec<f32> = [0.0, 0.3, 1.0]
            .iter()
            .map(|&b| luma(render(&img, &with(&[(ParamKey::Bloom, b)])).get_pixel(18, 16)))
            .collect();
        assert!(neighbour[0] < neighbour[1], "{neighbour:?}");
        assert!(neighbour[1] < neighbour[2], "{neighbour:?}");
    }

    #[test]
    fn below_threshold_image_gets_no_bloom() {
        let img = ImageBuffer::from_fn(24, 24, |x, y| {
            Rgba([(x * 7) as u8, (y * 7) as u8, ((x + y) * 3) as u8, 255])
        });
        assert!(img.pixels().all(|px| px[0] <= 170 && px[1] <= 170 && px[2] <= 170));
        let plain = render(&img, &LensParams::default());
        let bloomed = render(
            &img,
            &with(&[
                (ParamKey::Bloom, 1.0),
                (ParamKey::BloomWarmth, 1.0),
                (ParamKey::Halation, 0.6),
            ]),
        );
        assert_eq!(plain.as_raw(), bloomed.as_raw());
    }

    #[test]
    fn veil_widens_the_glow() {
        let mut img = RgbaImage::from_pixel(48, 48, Rgba([20, 20, 20, 255]));
        for (x, y) in [(16, 16), (17, 16), (16, 17), (17, 17)] {
            img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
        let clear = render(&img, &with(&[(ParamKey::Bloom, 1.0)]));
        let veiled = render(&img, &with(&[(ParamKey::Bloom, 1.0), (ParamKey::Veil, 1.0)]));
        let (px, py) = (26, 16);
        assert!(luma(veiled.get_pixel(px, py)) > luma(clear.get_pixel(px, py)));
    }

    #[test]
    fn mid_gray_end_to_end() {
        let img = RgbaImage::from_pixel(4, 4, Rgba([128, 128, 128, 255]));
        let mut pipeline = CpuPipeline::new().expect("cpu pipeline");
        let out = pipeline.render(&img, &ParamMap::new()).expect("render");
        assert_eq!(out.dimensions(), (4, 4));
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            let px = out.get_pixel(x, y);
            assert!(px.0.iter().zip([128, 128, 128, 255]).all(|(a, b)| a.abs_diff(b) <= 2));
        }
        assert!(luma(out.get_pixel(0, 0)) <= 128.0 + 0.5);
    }

    #[test]
    fn resize_then_restore_is_idempotent() {
        let mut pipeline = CpuPipeline::new().expect("cpu pipeline");
        let params = LensParams::resolve(match &json!({ "coma": 0.5, "bloom": 0.7, "vignette": 0.4 }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        });
        let large = test_pattern(16, 12);
        let small = test_pattern(8, 8);
        let first = pipeline.render_resolved(&large, &params).expect("first");
        let resized = pipeline.render_resolved(&small, &params).expect("resized");
        assert_eq!(resized.dimensions(), (8, 8));
        let restored = pipeline.render_resolved(&large, &params).expect("restored");
        assert_eq!(first.as_raw(), restored.as_raw());
    }

    #[test]
    fn zero_sized_input_is_rejected() {
        let mut pipeline = CpuPipeline::new().expect("cpu pipeline");
        let err = pipeline
            .render_resolved(&RgbaImage::new(0, 4), &LensParams::default())
            .unwrap_err();
        assert!(matches!(err, LensError::InvalidDimensions { width: 0, height: 4 }));
        assert!(!pipeline.ensure(3, 0));
    }

    #[test]
    fn oversized_planes_are_rejected_without_panicking() {
        let mut pipeline = CpuPipeline::new().expect("cpu pipeline");
        assert!(!pipeline.ensure(u32::MAX, u32::MAX));
        assert!(matches!(
            pipeline.try_ensure(MAX_PLANE_DIMENSION + 1, 4),
            Err(LensError::InvalidDimensions { height: 4, .. })
        ));
        assert!(pipeline.ensure(4, 4));
    }

    fn checkerboard(size: u32, cell: u32) -> RgbaImage {
        ImageBuffer::from_fn(size, size, |x, y| {
            let v = if ((x / cell) + (y / cell)) % 2 == 0 { 255 } else { 0 };
            Rgba([v, v, v, 255])
        })
    }

    fn outer_ring_max_diff(a: &RgbaImage, b: &RgbaImage, band: u32) -> u8 {
        let (w, h) = a.dimensions();
        a.enumerate_pixels()
            .filter(|(x, y, _)| *x < band || *y < band || *x >= w - band || *y >= h - band)
            .map(|(x, y, p)| {
                let q = b.get_pixel(x, y);
                (0..3).map(|i| p[i].abs_diff(q[i])).max().unwrap_or(0)
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn edge_effects_change_the_rim_and_leave_the_centre_alone() {
        let img = checkerboard(64, 3);
        let plain = render(&img, &LensParams::default());
        for (key, value) in [
            (ParamKey::Coma, 1.0),
            (ParamKey::EdgeSoftness, 1.0),
            (ParamKey::FieldCurvature, 1.2),
        ] {
            let out = render(&img, &with(&[(key, value)]));
            assert_eq!(out.get_pixel(32, 32), plain.get_pixel(32, 32), "{key:?}");
            let rim = outer_ring_max_diff(&plain, &out, 12);
            assert!(rim > 20, "{key:?}: rim diff was {rim}");
        }
    }

    #[test]
    fn global_softness_reaches_the_centre() {
        let img = checkerboard(64, 3);
        let plain = render(&img, &LensParams::default());
        let soft = render(&img, &with(&[(ParamKey::GlobalSoftness, 0.6)]));
        let diff = plain.get_pixel(32, 32)[1].abs_diff(soft.get_pixel(32, 32)[1]);
        assert!(diff > 10, "centre diff was {diff}");
    }

    #[test]
    fn anamorph_squeeze_stretches_vignette_vertically() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]));
        let round = render(&img, &with(&[(ParamKey::Vignette, 1.0)]));
        let side = luma(round.get_pixel(4, 32));
        let top = luma(round.get_pixel(32, 4));
        assert!((side - top).abs() <= 1.0, "side {side} top {top}");

        let oval = render(&img, &with(&[(ParamKey::Vignette, 1.0), (ParamKey::ComaAnamorph, 1.0)]));
        assert!(luma(oval.get_pixel(32, 4)) + 10.0 < luma(oval.get_pixel(4, 32)));
    }

    #[test]
    fn decenter_moves_the_vignette_falloff() {
        let img = RgbaImage::from_pixel(64, 64, Rgba([128, 128, 128, 255]));
        let centred = render(&img, &with(&[(ParamKey::Vignette, 1.0)]));
        let left = luma(centred.get_pixel(2, 32));
        let right = luma(centred.get_pixel(61, 32));
        assert!((left - right).abs() <= 1.0, "left {left} right {right}");

        let shifted = render(&img, &with(&[(ParamKey::Vignette, 1.0), (ParamKey::DecenterX, 1.0)]));
        let left = luma(shifted.get_pixel(2, 32));
        let right = luma(shifted.get_pixel(61, 32));
        assert!(left + 5.0 < right, "left {left} right {right}");
    }

    #[test]
    fn bloom_warmth_tints_the_glow() {
        let mut img = RgbaImage::from_pixel(32, 32, Rgba([40, 40, 40, 255]));
        for (x, y) in [(16, 16), (17, 16), (16, 17), (17, 17)] {
            img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
        let neutral = render(&img, &with(&[(ParamKey::Bloom, 1.0)]));
        let px = neutral.get_pixel(18, 16);
        assert_eq!(px[0], px[2]);

        let warm = render(&img, &with(&[(ParamKey::Bloom, 1.0), (ParamKey::BloomWarmth, 1.0)]));
        let px = warm.get_pixel(18, 16);
        assert!(px[0] > px[2] + 3, "glow {px:?}");
    }

    #[test]
    fn halation_brightens_near_rim_highlights() {
        let mut img = RgbaImage::from_pixel(64, 64, Rgba([40, 40, 40, 255]));
        for y in 2..8 {
            for x in 2..8 {
                img.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let plain = render(&img, &LensParams::default());
        let halo = render(&img, &with(&[(ParamKey::Halation, 0.6)]));
        let before = luma(plain.get_pixel(9, 4));
        let after = luma(halo.get_pixel(9, 4));
        assert!(after > before + 2.0, "before {before} after {after}");
        let px = halo.get_pixel(9, 4);
        assert!(px[0] >= px[2]);
    }
}
