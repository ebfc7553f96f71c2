//! PaddyScan CLI - paddy-rice field detection from Sentinel-2 time series

mod manifest;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use manifest::Manifest;
use paddyscan_algorithms::bands::Window;
use paddyscan_algorithms::config::PipelineConfig;
use paddyscan_algorithms::export::GeoJsonDirectorySink;
use paddyscan_algorithms::pipeline::DetectionPipeline;
use paddyscan_core::io::{read_geotiff, write_geotiff};
use paddyscan_core::Raster;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "paddyscan")]
#[command(author, version, about = "Paddy-rice field detection", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full detection pipeline
    Run {
        /// Pipeline configuration (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scene manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Validate a configuration and print the effective values
    CheckConfig {
        /// Pipeline configuration (TOML)
        config: PathBuf,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Write the composite bands and indices of one window
    Indices {
        /// Pipeline configuration (TOML); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Scene manifest (TOML)
        #[arg(short, long)]
        manifest: PathBuf,
        /// planting or growth
        #[arg(short, long)]
        window: Window,
        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::from_path(p)
            .with_context(|| format!("Failed to load configuration {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn write_raster<T: paddyscan_core::RasterElement>(raster: &Raster<T>, path: &Path) -> Result<()> {
    write_geotiff(raster, path).with_context(|| format!("Failed to write {}", path.display()))
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Commands ───────────────────────────────────────────────────────────

fn run(config: Option<PathBuf>, manifest: PathBuf, output: PathBuf) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let pipeline = DetectionPipeline::new(config)?;
    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let pb = spinner("Loading inputs...");
    let inputs = Manifest::from_path(&manifest)?.load_inputs()?;
    pb.finish_and_clear();

    let start = Instant::now();
    let pb = spinner("Running detection...");
    let sink = GeoJsonDirectorySink::new(output.join("fields"))?;
    let result = pipeline.run_and_export(inputs, sink);
    pb.finish_and_clear();
    let out = result.context("Detection failed")?;
    let elapsed = start.elapsed();

    write_raster(&out.mask, &output.join("mask.tif"))?;
    write_raster(&out.classification.probability, &output.join("probability.tif"))?;
    let report = output.join("report.json");
    out.summary
        .write_json(&report)
        .with_context(|| format!("Failed to write {}", report.display()))?;

    let s = &out.summary;
    println!("Fields: {}", s.field_count);
    println!("Field area: {:.2} {}", s.field_area, s.unit_label);
    println!("Detected area: {:.2} {}", s.detected_area, s.unit_label);
    println!(
        "Validation: accuracy {:.4}, kappa {:.4} on {} test samples",
        s.validation.accuracy, s.validation.kappa, s.samples.test
    );
    if let Some(export) = &s.export {
        println!(
            "Exported {} fields in {} chunks",
            export.exported_fields(),
            export.chunk_count()
        );
        for failure in &export.failed {
            warn!("{}", failure.to_error());
        }
    }
    done("Report", &report, elapsed);
    Ok(())
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = load_config(Some(&path))?;
    println!("{}", config.to_toml_string()?);
    info!("{} is valid", path.display());
    Ok(())
}

fn raster_info(input: PathBuf) -> Result<()> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(&input).context("Failed to read raster")?;
    pb.finish_and_clear();

    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();
    let (gx, gy) = raster.ground_cell_size();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {} ({:.2} x {:.2} m)", raster.cell_size(), gx, gy);
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = raster.crs() {
        println!("CRS: {}", crs);
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn indices(config: Option<PathBuf>, manifest: PathBuf, window: Window, output: PathBuf) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let pipeline = DetectionPipeline::new(config)?;
    fs::create_dir_all(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let pb = spinner("Loading scenes...");
    let scenes = Manifest::from_path(&manifest)?.load_scenes()?;
    pb.finish_and_clear();

    let start = Instant::now();
    let scenes = pipeline.prepare_scenes(scenes)?;
    let range = match window {
        Window::Planting => pipeline.config().imagery.planting,
        Window::Growth => pipeline.config().imagery.growth,
    };
    let composite = paddyscan_algorithms::composite::build_composite(&scenes, &range, window)?;
    let elapsed = start.elapsed();

    for (name, band) in composite.bands.iter() {
        let path = output.join(format!("{name}.tif"));
        write_raster(band, &path)?;
        info!("{} -> {}", name, path.display());
    }
    done(&format!("{} composite", window), &output, elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run {
            config,
            manifest,
            output,
        } => run(config, manifest, output),
        Commands::CheckConfig { config } => check_config(config),
        Commands::Info { input } => raster_info(input),
        Commands::Indices {
            config,
            manifest,
            window,
            output,
        } => indices(config, manifest, window, output),
    }
}
