use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use lens_emulator::processing::gpu_pipeline;
use lens_emulator::{CpuPipeline, GpuOptions, LensParams, LensPipeline, LensRenderer};

const SYNTHETIC_SIZE: (u32, u32) = (1920, 1280);

fn median_ms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) * 0.5
    } else {
        sorted[mid]
    }
}

/// Gradient with a grid of bright points so the bloom chain has work to do.
fn synthetic_frame(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if x % 97 < 3 && y % 89 < 3 {
            return Rgba([255, 250, 240, 255]);
        }
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, 96, 255])
    })
}

fn probe_params() -> LensParams {
    LensParams {
        field_curvature: 0.4,
        edge_softness: 0.3,
        coma: 0.5,
        coma_anamorph: 0.2,
        chromatic_aberration: 0.3,
        bloom: 0.6,
        bloom_warmth: 0.4,
        vignette: 0.5,
        decenter: [0.05, -0.03],
        veil: 0.3,
        global_softness: 0.2,
        halation: 0.4,
    }
}

fn time_renders(renderer: &mut dyn LensRenderer, source: &RgbaImage, params: &LensParams, runs: usize) -> Result<Vec<f64>> {
    // First frame allocates surfaces; keep it out of the samples.
    renderer
        .render_resolved(source, params)
        .with_context(|| format!("{} warm-up render failed", renderer.name()))?;
    let mut samples = Vec::with_capacity(runs);
    for _ in 0..runs {
        let t0 = Instant::now();
        let _out = renderer
            .render_resolved(source, params)
            .with_context(|| format!("{} render failed", renderer.name()))?;
        samples.push(t0.elapsed().as_secs_f64() * 1000.0);
    }
    Ok(samples)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args();
    let _bin = args.next();
    let input = args.next().filter(|a| a != "-").map(PathBuf::from);
    let runs = args
        .next()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(10)
        .max(1);

    let source = match &input {
        Some(path) => image::open(path)
            .with_context(|| format!("decoding {}", path.display()))?
            .into_rgba8(),
        None => synthetic_frame(SYNTHETIC_SIZE.0, SYNTHETIC_SIZE.1),
    };
    let params = probe_params();
    eprintln!(
        "Probing {}x{} over {} runs",
        source.width(),
        source.height(),
        runs
    );

    println!("METRIC width={}", source.width());
    println!("METRIC height={}", source.height());

    if gpu_pipeline::is_available() {
        let mut gpu = LensPipeline::new(&GpuOptions::default()).context("gpu pipeline init")?;
        let status = gpu.runtime_status();
        let samples = time_renders(&mut gpu, &source, &params, runs)?;
        println!(
            "METRIC gpu_adapter={}",
            status.adapter_name.as_deref().unwrap_or("n/a")
        );
        println!("METRIC gpu_frame_ms_median={:.2}", median_ms(&samples));
    } else {
        println!("METRIC gpu_frame_ms_median=n/a");
    }

    let mut cpu = CpuPipeline::new().context("cpu pipeline init")?;
    let samples = time_renders(&mut cpu, &source, &params, runs)?;
    println!("METRIC cpu_frame_ms_median={:.2}", median_ms(&samples));

    Ok(())
}
