use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use serde_json::Value;

use lens_emulator::config::AppConfig;
use lens_emulator::export;
use lens_emulator::processing::gpu_pipeline::{self, GpuOptions, LensPipeline};
use lens_emulator::{CpuPipeline, LensError, LensParams, LensRenderer, ParamMap, ProfileLibrary};

const BACKEND_ENV: &str = "LENS_EMULATOR_BACKEND";

#[derive(Parser, Debug)]
#[command(name = "lens-emulator", version, about = "Render an image through a simulated lens")]
struct Cli {
    /// Input image.
    input: Option<PathBuf>,

    /// Output PNG path (defaults to a name derived from the profile).
    output: Option<PathBuf>,

    /// Lens profile name from the profile library.
    #[arg(long, short)]
    profile: Option<String>,

    /// Profile library JSON (object of named parameter maps).
    #[arg(long)]
    profiles: Option<PathBuf>,

    /// Override one parameter, e.g. `--set coma=0.4` or `--set decenter=[0.1,0]`.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Export before (left) and after (right) halves in one image.
    #[arg(long)]
    split: bool,

    /// List profile names and exit.
    #[arg(long)]
    list: bool,

    /// Print the resolved parameters as JSON.
    #[arg(long)]
    dump: bool,

    /// Renderer: auto, gpu or cpu (cpu needs the debug fallback flag).
    #[arg(long)]
    backend: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Backend {
    Auto,
    Gpu,
    Cpu,
}

fn parse_backend(value: &str) -> Backend {
    match value.trim().to_ascii_lowercase().as_str() {
        "cpu" => Backend::Cpu,
        "auto" => Backend::Auto,
        "gpu" | "gpu_pipeline" | "wgpu" => Backend::Gpu,
        _ => Backend::Auto,
    }
}

fn resolve_backend(cli: Option<&str>, env: Option<&str>, config: &AppConfig) -> Backend {
    if let Some(raw) = cli {
        return parse_backend(raw);
    }
    if let Some(raw) = env {
        return parse_backend(raw);
    }
    if let Some(raw) = config.backend.as_deref() {
        return parse_backend(raw);
    }
    Backend::Auto
}

fn effective_backend(requested: Backend, allow_debug_cpu_fallback: bool) -> Backend {
    if requested == Backend::Cpu && !allow_debug_cpu_fallback {
        Backend::Gpu
    } else {
        requested
    }
}

/// `KEY=VALUE` where VALUE is JSON when it parses, else a plain string.
fn parse_override(raw: &str) -> Result<(String, Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("override `{raw}` is not KEY=VALUE"))?;
    let value = value.trim();
    let parsed = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.trim().to_string(), parsed))
}

fn open_renderer(backend: Backend, allow_debug_cpu_fallback: bool) -> Option<Box<dyn LensRenderer>> {
    if backend == Backend::Cpu {
        return Some(Box::new(CpuPipeline::default()));
    }
    match LensPipeline::new(&GpuOptions::default()) {
        Ok(pipeline) => {
            let status = pipeline.runtime_status();
            tracing::info!(
                adapter = status.adapter_name.as_deref().unwrap_or("n/a"),
                backend = status.adapter_backend.as_deref().unwrap_or("n/a"),
                "renderer = gpu"
            );
            Some(Box::new(pipeline))
        }
        Err(err) => {
            gpu_pipeline::report_gpu_fallback_once(&err);
            if allow_debug_cpu_fallback {
                tracing::info!("renderer = cpu (debug fallback)");
                Some(Box::new(CpuPipeline::default()))
            } else {
                None
            }
        }
    }
}

fn render_or_source(renderer: Option<&mut Box<dyn LensRenderer>>, source: &RgbaImage, params: &LensParams) -> RgbaImage {
    let Some(renderer) = renderer else {
        eprintln!("lens-emulator: no renderer available; writing the unmodified source");
        return source.clone();
    };
    match renderer.render_resolved(source, params) {
        Ok(out) => out,
        Err(err) => {
            report_render_failure(renderer.name(), &err);
            source.clone()
        }
    }
}

fn report_render_failure(name: &str, err: &LensError) {
    tracing::error!(renderer = name, error = %err, "render failed");
    eprintln!("lens-emulator: {name} render failed ({err}); writing the unmodified source");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load();

    let profiles_path = cli.profiles.clone().unwrap_or_else(|| config.profiles_path());
    let library = match ProfileLibrary::load(&profiles_path) {
        Ok(library) => library,
        Err(err) if cli.profile.is_none() && !cli.list => {
            tracing::debug!(error = %err, "no profile library; using defaults");
            ProfileLibrary::default()
        }
        Err(err) => return Err(err).context("loading lens profiles"),
    };

    if cli.list {
        for name in library.names() {
            println!("{name}");
        }
        return Ok(());
    }

    let profile_name = cli
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .or_else(|| library.default_name().map(str::to_string));
    let mut live: ParamMap = match profile_name.as_deref() {
        Some(name) => match library.get(name) {
            Some(map) => map.clone(),
            None if cli.profile.is_some() => {
                anyhow::bail!("unknown profile `{name}` in {}", profiles_path.display())
            }
            None => ParamMap::new(),
        },
        None => ParamMap::new(),
    };
    for raw in &cli.overrides {
        let (key, value) = parse_override(raw)?;
        live.insert(key, value);
    }
    let params = LensParams::resolve(&live);

    if cli.dump {
        println!(
            "{}",
            serde_json::to_string_pretty(&params).context("serializing parameters")?
        );
    }
    let Some(input) = cli.input.as_ref() else {
        if cli.dump {
            return Ok(());
        }
        anyhow::bail!("usage: lens-emulator <input> [output] [--profile NAME]");
    };

    let source = image::open(input)
        .with_context(|| format!("decoding {}", input.display()))?
        .into_rgba8();

    let env_backend = std::env::var(BACKEND_ENV).ok();
    let requested = resolve_backend(cli.backend.as_deref(), env_backend.as_deref(), &config);
    let allow_debug_cpu_fallback = gpu_pipeline::allow_debug_cpu_fallback();
    let backend = effective_backend(requested, allow_debug_cpu_fallback);
    if requested == Backend::Cpu && backend != Backend::Cpu {
        eprintln!(
            "lens-emulator: cpu backend requires {}=1; using gpu policy",
            gpu_pipeline::DEBUG_ALLOW_CPU_FALLBACK_ENV
        );
    }
    let mut renderer = open_renderer(backend, allow_debug_cpu_fallback);
    let rendered = render_or_source(renderer.as_mut(), &source, &params);

    let split = cli.split || config.split_default.unwrap_or(false);
    let output = if split {
        export::compose_split(&source, &rendered).context("before/after sizes differ")?
    } else {
        rendered
    };
    let out_path = cli
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(export::default_output_name(profile_name.as_deref(), split)));
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    output
        .save_with_format(&out_path, image::ImageFormat::Png)
        .with_context(|| format!("write png '{}'", out_path.display()))?;
    eprintln!("wrote {}", out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_backend_handles_supported_values() {
        assert_eq!(parse_backend("cpu"), Backend::Cpu);
        assert_eq!(parse_backend(" AUTO "), Backend::Auto);
        assert_eq!(parse_backend("gpu"), Backend::Gpu);
        assert_eq!(parse_backend("wgpu"), Backend::Gpu);
        assert_eq!(parse_backend("unknown"), Backend::Auto);
    }

    #[test]
    fn backend_sources_are_ranked_cli_env_config() {
        let config = AppConfig {
            backend: Some("cpu".into()),
            ..Default::default()
        };
        assert_eq!(resolve_backend(Some("gpu"), Some("cpu"), &config), Backend::Gpu);
        assert_eq!(resolve_backend(None, Some("gpu"), &config), Backend::Gpu);
        assert_eq!(resolve_backend(None, None, &config), Backend::Cpu);
        assert_eq!(resolve_backend(None, None, &AppConfig::default()), Backend::Auto);
    }

    #[test]
    fn cpu_backend_requires_debug_fallback_flag() {
        assert_eq!(effective_backend(Backend::Cpu, false), Backend::Gpu);
        assert_eq!(effective_backend(Backend::Cpu, true), Backend::Cpu);
        assert_eq!(effective_backend(Backend::Auto, false), Backend::Auto);
    }

    #[test]
    fn overrides_parse_json_values() {
        assert_eq!(parse_override("coma=0.4").expect("parse"), ("coma".into(), serde_json::json!(0.4)));
        assert_eq!(
            parse_override("decenter=[0.1, -0.2]").expect("parse"),
            ("decenter".into(), serde_json::json!([0.1, -0.2]))
        );
        assert_eq!(parse_override("veil=high").expect("parse").1, serde_json::json!("high"));
        assert!(parse_override("coma").is_err());
    }

    #[test]
    fn cli_accepts_split_and_overrides() {
        let cli = Cli::try_parse_from([
            "lens-emulator",
            "in.png",
            "--profile",
            "Helios 44",
            "--set",
            "coma=0.5",
            "--set",
            "veil=0.2",
            "--split",
        ])
        .expect("parse");
        assert_eq!(cli.input, Some(PathBuf::from("in.png")));
        assert_eq!(cli.overrides.len(), 2);
        assert!(cli.split);
        assert!(!cli.dump);
    }

    #[test]
    fn missing_renderer_writes_source() {
        let source = RgbaImage::from_pixel(2, 2, image::Rgba([9, 8, 7, 255]));
        let out = render_or_source(None, &source, &LensParams::default());
        assert_eq!(out.as_raw(), source.as_raw());
    }
}
