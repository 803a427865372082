//! Headless Lumen renderer.
//!
//! Runs the progressive ray tracer on the demo scene and writes the final
//! image as a PNG. Ticks the refinement loop on a fixed interval until a
//! per-pixel pass converges or the timeout expires; whatever is in the
//! raster at that point is saved.

mod scene;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use lumen_renderer::{
    render_blocking, RasterBuffer, RayTracer, RenderConfig, RenderContext, RenderState,
    SimpleIntegrator, TileSettings,
};

/// Render the Lumen demo scene to a PNG.
#[derive(Parser, Debug)]
#[command(name = "lumen", version, about)]
struct Args {
    /// Output PNG path
    #[arg(short, long, default_value = "lumen.png")]
    output: PathBuf,

    /// Image width in pixels
    #[arg(short = 'W', long, default_value_t = 640)]
    width: u32,

    /// Image height in pixels
    #[arg(short = 'H', long, default_value_t = 480)]
    height: u32,

    /// Level of detail of the first pass (overrides the config file)
    #[arg(long)]
    lod: Option<u32>,

    /// JSON render config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Worker threads, 0 for one per core (overrides the config file)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Interval between refinement ticks
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Give up refining after this long and save what is there
    #[arg(long, default_value_t = 60_000)]
    timeout_ms: u64,

    /// Render one per-pixel pass on the rayon pool instead of refining
    #[arg(long)]
    oneshot: bool,
}

fn load_config(args: &Args) -> Result<RenderConfig> {
    let mut config = match &args.config {
        Some(path) => RenderConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(lod) = args.lod {
        config.initial_lod = lod;
    }
    if let Some(threads) = args.threads {
        config.worker_threads = threads;
    }
    Ok(config)
}

fn render_progressive(tracer: &mut RayTracer, tick: Duration, timeout: Duration) -> RasterBuffer {
    let started = Instant::now();
    tracer.start();

    let mut last_state = tracer.state();
    while !tracer.is_converged() {
        if started.elapsed() >= timeout {
            log::warn!(
                "Timed out after {:?} at LOD {}, saving partial image",
                timeout,
                tracer.level_of_detail()
            );
            break;
        }

        thread::sleep(tick);
        let state = tracer.tick();
        if state != last_state {
            if let RenderState::Converged { lod, .. } = state {
                log::info!("LOD {} converged after {:.2?}", lod, started.elapsed());
            }
            last_state = state;
        }
    }

    tracer.image().clone()
}

fn save_png(raster: &RasterBuffer, path: &Path) -> Result<()> {
    let pixels = raster.to_top_left_rows();
    let image = image::RgbaImage::from_raw(raster.width(), raster.height(), pixels)
        .context("Raster size does not match its pixel data")?;
    image
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let scene =
        scene::demo_scene(args.width, args.height).context("Failed to build demo scene")?;

    log::info!("Starting Lumen ({}x{})", args.width, args.height);
    let started = Instant::now();

    let raster = if args.oneshot {
        let context = RenderContext::new(
            Arc::new(scene),
            Arc::new(SimpleIntegrator::new(config.shadow_epsilon)),
            TileSettings::from(&config),
        );
        render_blocking(&context, 1, config.gamma_correct)
    } else {
        let mut tracer = RayTracer::new(scene, config).context("Failed to start workers")?;
        let raster = render_progressive(
            &mut tracer,
            Duration::from_millis(args.tick_ms),
            Duration::from_millis(args.timeout_ms),
        );
        let stats = tracer.stats();
        log::info!(
            "Final pass {}: {}/{} tiles at LOD {}",
            stats.generation,
            stats.merged,
            stats.expected,
            stats.lod
        );
        raster
    };

    save_png(&raster, &args.output)?;
    log::info!("Wrote {} in {:.2?}", args.output.display(), started.elapsed());
    Ok(())
}
