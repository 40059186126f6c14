use anyhow::{Context, Result, bail};
use blob_order::core_modules::blob_detector::blob_detector::isolate_largest;
use blob_order::parallel_pipeline::ParallelPipeline;
use blob_order::pipeline::{OrderedBlob, PipelineConfig, SortReport, SortingPipeline};
use clap::{Args, Parser, Subcommand};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;
use log::{error, info};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "order_tester")]
#[command(about = "Number the blobs of an image top-to-bottom, left-to-right")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort the blobs of one image and print their reading order.
    Sort(SortArgs),

    /// Keep only the largest blob of an image and save it as a mask.
    Largest {
        /// Path to the input image.
        #[arg(long)]
        input: PathBuf,

        /// Where to write the single-blob mask (PNG).
        #[arg(long)]
        output: PathBuf,

        /// Treat bright pixels as foreground instead of dark ones.
        #[arg(long)]
        no_invert: bool,
    },

    /// Sort many images concurrently, one JSON report per image.
    Batch(BatchArgs),
}

#[derive(Debug, Clone, Args)]
struct ConfigArgs {
    /// JSON pipeline configuration; missing fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the horizontal bridging width in pixels.
    #[arg(long)]
    bridge_width: Option<u32>,
}

impl ConfigArgs {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(width) = self.bridge_width {
            config.bridge_width = width;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Args)]
struct SortArgs {
    /// Path to the input image.
    #[arg(long)]
    input: PathBuf,

    /// Write a copy of the input with bounding boxes and centroids drawn on it.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write the sort report as JSON.
    #[arg(long)]
    json: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
struct BatchArgs {
    /// Directory that receives one `<stem>.json` report per input.
    #[arg(long)]
    out_dir: PathBuf,

    /// Worker count; defaults to the number of logical CPUs.
    #[arg(long)]
    workers: Option<usize>,

    #[command(flatten)]
    config: ConfigArgs,

    /// Images to sort.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Sort(args) => run_sort(&args),
        Commands::Largest {
            input,
            output,
            no_invert,
        } => run_largest(&input, &output, !no_invert),
        Commands::Batch(args) => run_batch(&args).await,
    }
}

fn run_sort(args: &SortArgs) -> Result<()> {
    let pipeline = SortingPipeline::new(args.config.resolve()?)?;
    let image = image::open(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;

    let report = pipeline.sort_image(&image)?;
    for blob in &report.blobs {
        println!("{}", describe(blob));
    }
    info!(
        "{}: {} blobs in {} rows",
        args.input.display(),
        report.blobs.len(),
        report.row_bands
    );

    if let Some(json) = &args.json {
        write_report(json, &report)?;
    }
    if let Some(output) = &args.output {
        let mut canvas = image.to_rgb8();
        annotate(&mut canvas, &report.blobs);
        canvas
            .save(output)
            .with_context(|| format!("writing {}", output.display()))?;
        info!("annotated image saved to {}", output.display());
    }
    Ok(())
}

fn run_largest(input: &Path, output: &Path, invert: bool) -> Result<()> {
    let pipeline = SortingPipeline::new(PipelineConfig {
        invert,
        ..PipelineConfig::default()
    })?;
    let image = image::open(input).with_context(|| format!("reading {}", input.display()))?;

    let largest = isolate_largest(&pipeline.binarize(&image));
    info!(
        "largest blob covers {} pixels",
        largest.foreground_count()
    );
    largest
        .into_gray()
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

async fn run_batch(args: &BatchArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let pipeline = match args.workers {
        Some(workers) => ParallelPipeline::with_workers(config, workers)?,
        None => ParallelPipeline::new(config)?,
    };
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    let results = pipeline.sort_paths(&args.inputs).await;
    pipeline.shutdown().await;

    let mut failures = 0;
    for (input, result) in args.inputs.iter().zip(results) {
        match result {
            Ok(report) => {
                let stem = input
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "report".to_string());
                let target = args.out_dir.join(format!("{stem}.json"));
                write_report(&target, &report)?;
                info!("{}: {} blobs -> {}", input.display(), report.blobs.len(), target.display());
            }
            Err(e) => {
                error!("{}: {e}", input.display());
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{failures} of {} images failed", args.inputs.len());
    }
    Ok(())
}

fn describe(blob: &OrderedBlob) -> String {
    let r = &blob.bounding_rect;
    format!(
        "#{:<3} row {:<2} box ({}, {}, {}x{}) centroid ({:.1}, {:.1})",
        blob.rank, blob.row_band, r.x, r.y, r.width, r.height, blob.centroid.x, blob.centroid.y
    )
}

fn write_report(path: &Path, report: &SortReport) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), report)?;
    Ok(())
}

/// Draws every blob's bounding box in green and its centroid in red.
fn annotate(canvas: &mut RgbImage, blobs: &[OrderedBlob]) {
    for blob in blobs {
        let r = &blob.bounding_rect;
        let rect = Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height);
        draw_hollow_rect_mut(canvas, rect, Rgb([0, 255, 0]));
        draw_cross_mut(
            canvas,
            Rgb([255, 0, 0]),
            blob.centroid.x.round() as i32,
            blob.centroid.y.round() as i32,
        );
    }
}
