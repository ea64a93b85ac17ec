//! # lottie-inspect
//!
//! Loads a Lottie document and prints its timing, size and the resolved
//! state of every drawable layer at a chosen progress.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lottie_core::{CompositionLoader, LoaderConfig, ResolvedLayer, TransformResolver};
use lottie_player::{CompositionModel, FileResourceLoader, LoadHandle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "lottie-inspect")]
#[command(about = "Print composition metadata and resolved layer transforms")]
#[command(version)]
struct Cli {
    /// Lottie JSON document
    input: PathBuf,

    /// Progress to resolve, 0.0 to 1.0
    #[arg(short, long, default_value_t = 0.0)]
    progress: f32,

    /// Loader configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the pixel budget for scale-to-fit
    #[arg(long)]
    max_pixels: Option<u32>,

    /// Load on a worker thread and give up after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<LoaderConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => LoaderConfig::default(),
    };
    if let Some(max_pixels) = cli.max_pixels {
        config.max_pixels = max_pixels;
    }

    tracing::debug!(?config, "loader configuration");
    let loader = CompositionLoader::new(config);
    let mut model = match cli.timeout_ms {
        Some(ms) => load_in_background(loader, &cli.input, Duration::from_millis(ms))?,
        None => loader
            .load_from_path(&cli.input)
            .with_context(|| format!("loading {}", cli.input.display()))?,
    };

    model.set_progress(cli.progress);
    print_summary(&model);

    let frame = TransformResolver.resolve(&model);
    println!();
    println!("frame {:.2} (progress {:.3})", frame.frame, frame.progress);
    for layer in &frame.layers {
        print_layer(layer, "  ");
        if let Some(matte) = &layer.matte {
            println!("    matte {:?} from:", matte.matte_type);
            print_layer(&matte.source, "      ");
        }
    }
    Ok(())
}

fn load_in_background(
    loader: CompositionLoader,
    input: &std::path::Path,
    timeout: Duration,
) -> Result<CompositionModel> {
    let dir = input.parent().map(PathBuf::from).unwrap_or_default();
    let Some(name) = input.file_name().and_then(|n| n.to_str()) else {
        bail!("{} is not a file name", input.display());
    };

    let (tx, rx) = crossbeam_channel::bounded(1);
    let background = lottie_player::BackgroundLoader::new(loader, FileResourceLoader::new(dir));
    let handle: LoadHandle = background.load_resource(name, move |model: CompositionModel| {
        let _ = tx.send(model);
    });

    if !handle.wait_timeout(timeout) {
        handle.cancel();
        bail!("loading {} timed out after {:?}", input.display(), timeout);
    }
    rx.try_recv()
        .with_context(|| format!("loading {} failed, see log", input.display()))
}

fn print_summary(model: &CompositionModel) {
    println!(
        "frames {}..{} @ {} fps, duration {} ms",
        model.start_frame(),
        model.end_frame(),
        model.frame_rate(),
        model.duration_ms()
    );
    match model.bounds() {
        Some(bounds) => println!(
            "bounds {}x{} (scale {:.4})",
            bounds.width,
            bounds.height,
            model.scale()
        ),
        None => println!("bounds unset"),
    }
    println!(
        "{} layers, masks: {}, mattes: {}",
        model.len(),
        model.has_masks(),
        model.has_mattes()
    );
}

fn print_layer(layer: &ResolvedLayer, indent: &str) {
    let origin = layer.transform.translation;
    println!(
        "{indent}{} {:<16} alpha {:>3} origin ({:.2}, {:.2}) masks {}",
        layer.id,
        layer.name.as_deref().unwrap_or("-"),
        layer.alpha(),
        origin.x,
        origin.y,
        layer.masks.len()
    );
}
