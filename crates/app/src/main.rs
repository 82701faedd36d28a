use std::f32::consts::TAU;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use preset_visualiser_core::{
    AppConfig, AudioEngine, ComponentRegistry, ManualHost, PresetConfig, PresetLoader, Surface,
    TickOutcome, Visualiser, VisualiserError,
};
use tracing_subscriber::EnvFilter;

/// Frames between synthetic kick drums.
const BEAT_PERIOD: u32 = 15;

fn main() -> preset_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            preset,
            frames,
            output,
            config,
        } => run_render(&preset, frames, &output, config.as_deref()),
        Commands::Validate { preset } => run_validate(&preset),
    }
}

fn run_render(
    preset: &Path,
    frames: u32,
    output: &Path,
    config: Option<&Path>,
) -> preset_visualiser_core::Result<()> {
    let config = match config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };
    tracing::info!(?preset, frames, ?output, "rendering preset");

    let audio = AudioEngine::with_sample_rate(config.audio.sample_rate);
    let analysis = audio.start()?;
    let mut vis = Visualiser::new(
        ManualHost::new(),
        analysis,
        ComponentRegistry::with_builtins(),
        &config,
    )?;
    vis.load_preset(PresetConfig::from_path(preset)?)?;

    // Headless: nothing fetches remote resources, so mark them all loaded.
    let pending: Vec<String> = vis.gate().pending().map(str::to_string).collect();
    for key in &pending {
        tracing::debug!(key, "skipping resource fetch");
        vis.resource_loaded(key);
    }
    vis.start();

    let mut rendered = 0;
    for frame in 0..frames {
        audio.push_samples(&synthetic_block(
            frame,
            config.audio.block_size,
            config.audio.sample_rate,
        ))?;

        let Some(token) = vis.host_mut().take_request() else {
            tracing::warn!(frame, "no frame requested, stopping early");
            break;
        };
        if vis.on_frame(token)? == TickOutcome::Rendered {
            rendered += 1;
        }
    }
    vis.stop();

    let last = vis
        .host()
        .last_frame()
        .ok_or_else(|| VisualiserError::msg("no frame was rendered"))?;
    write_png(last, output)?;
    tracing::info!(rendered, ?output, "wrote final frame");
    Ok(())
}

fn run_validate(preset: &Path) -> preset_visualiser_core::Result<()> {
    let config = PresetConfig::from_path(preset)?;
    let registry = ComponentRegistry::with_builtins();
    let tree = PresetLoader::new(&registry).build(&config)?;
    tracing::info!(nodes = tree.len(), "preset is valid");

    println!("{}", tree.to_config()?.to_json_pretty()?);
    Ok(())
}

/// A quiet hum with a loud decaying burst every [`BEAT_PERIOD`] frames.
fn synthetic_block(frame: u32, block_size: usize, sample_rate: u32) -> Vec<f32> {
    let kick = frame % BEAT_PERIOD == 0;
    let start = frame as usize * block_size;
    (0..block_size)
        .map(|i| {
            let t = (start + i) as f32 / sample_rate as f32;
            if kick {
                let decay = 1.0 - i as f32 / block_size as f32;
                0.9 * decay * (TAU * 60.0 * t).sin()
            } else {
                0.02 * (TAU * 220.0 * t).sin()
            }
        })
        .collect()
}

fn write_png(frame: &Surface, path: &Path) -> preset_visualiser_core::Result<()> {
    let (width, height) = frame.dimensions();
    let bytes = frame
        .pixels()
        .iter()
        .flat_map(|px| px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
        .collect::<Vec<u8>>();

    let image = image::RgbaImage::from_raw(width, height, bytes)
        .ok_or_else(|| VisualiserError::msg("frame buffer does not match its dimensions"))?;
    image
        .save(path)
        .map_err(|err| VisualiserError::msg(format!("failed to write {}: {err}", path.display())))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive preset visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a preset headlessly against a synthetic beat and save the last frame.
    Render {
        /// Preset JSON file.
        #[arg(short, long)]
        preset: PathBuf,
        /// Number of ticks to run.
        #[arg(short, long, default_value_t = 60)]
        frames: u32,
        /// PNG file receiving the final frame.
        #[arg(short, long)]
        output: PathBuf,
        /// Optional application config (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load a preset and print its normalized form.
    Validate {
        /// Preset JSON file.
        #[arg(short, long)]
        preset: PathBuf,
    },
}
