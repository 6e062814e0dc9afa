use anyhow::{Context, Result};
use burn_ndarray::NdArray;
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod progress_bar;

use progress_bar::BarProgressCallback;

use coreg_core::image::Image;
use coreg_io::{read_image, write_image, write_transform};
use coreg_registration::{
    CoRegistrationPipeline, ConsoleProgressCallback, PipelineConfig, PipelineOutput, ProgressCallback,
};

type Backend = NdArray<f32>;

const TRANSFORM_FILE: &str = "mri_to_ct_transform.tfm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Nrrd,
    Nifti,
}

impl OutputFormat {
    /// NIfTI compression is selected by the `.gz` suffix.
    fn extension(self, compressed: bool) -> &'static str {
        match (self, compressed) {
            (OutputFormat::Nrrd, _) => "nrrd",
            (OutputFormat::Nifti, true) => "nii.gz",
            (OutputFormat::Nifti, false) => "nii",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "coreg")]
#[command(about = "Rigidly register an MRI volume onto a CT volume and report body-mask overlap")]
struct Cli {
    /// Fixed CT volume (.nii, .nii.gz or .nrrd)
    ct: PathBuf,

    /// Moving MRI volume (.nii, .nii.gz or .nrrd)
    mri: PathBuf,

    /// Directory receiving the aligned volumes, QC masks and transform
    #[arg(short, long, default_value = "coreg_output")]
    output: PathBuf,

    /// TOML file with pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for metric sampling (deterministic runs)
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum optimizer iterations
    #[arg(long)]
    iterations: Option<usize>,

    /// Fraction of CT voxels sampled per metric evaluation
    #[arg(long)]
    sampling: Option<f64>,

    /// Histogram bins per axis
    #[arg(long)]
    bins: Option<usize>,

    /// Optimizer learning rate
    #[arg(long)]
    learning_rate: Option<f64>,

    /// Wall-clock budget for the optimizer, in seconds
    #[arg(long)]
    time_limit: Option<f64>,

    /// Format of the written volumes
    #[arg(long, value_enum, default_value_t = OutputFormat::Nrrd)]
    format: OutputFormat,

    /// Write uncompressed volumes
    #[arg(long)]
    no_compress: bool,

    /// Show a progress bar instead of per-iteration log lines
    #[arg(long)]
    progress_bar: bool,

    /// Log every n-th optimizer iteration
    #[arg(long, default_value_t = 10)]
    log_interval: usize,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = load_config(&cli)?;
    run(&cli, config)
}

/// Settings from the optional TOML file with command line overrides applied.
fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            toml::from_str::<PipelineConfig>(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    let metric = &mut config.registration.metric;
    if let Some(seed) = cli.seed {
        metric.seed = Some(seed);
    }
    if let Some(sampling) = cli.sampling {
        metric.sampling_percentage = sampling;
    }
    if let Some(bins) = cli.bins {
        metric.histogram_bins = bins;
    }

    let optimizer = &mut config.registration.optimizer;
    if let Some(iterations) = cli.iterations {
        optimizer.max_iterations = iterations;
    }
    if let Some(rate) = cli.learning_rate {
        optimizer.learning_rate = rate;
    }
    if let Some(limit) = cli.time_limit {
        optimizer.time_limit_secs = Some(limit);
    }

    config.validate().context("Invalid pipeline configuration")?;
    Ok(config)
}

fn run(cli: &Cli, config: PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let device = Default::default();

    info!("Loading CT from {}", cli.ct.display());
    let ct = read_image::<Backend, _>(&cli.ct, &device)
        .with_context(|| format!("Failed to load CT {}", cli.ct.display()))?;
    info!("Loading MRI from {}", cli.mri.display());
    let mri = read_image::<Backend, _>(&cli.mri, &device)
        .with_context(|| format!("Failed to load MRI {}", cli.mri.display()))?;

    let callback: Arc<dyn ProgressCallback> = if cli.progress_bar {
        Arc::new(BarProgressCallback::new(config.registration.optimizer.max_iterations)?)
    } else {
        Arc::new(ConsoleProgressCallback::new(cli.log_interval))
    };
    let pipeline = CoRegistrationPipeline::new(config)?.with_callback(callback);
    let output = pipeline.run(&ct, &mri)?;

    fs::create_dir_all(&cli.output)
        .with_context(|| format!("Failed to create output directory {}", cli.output.display()))?;
    write_outputs(&cli.output, &output, cli.format, !cli.no_compress, &device)?;

    let report = &output.quality.report;
    if report.is_degenerate() {
        warn!("Overlap could not be measured: {:?}", report.warnings);
    }
    info!("Dice: {:.4}", report.dice());
    info!("Jaccard: {:.4}", report.jaccard());
    info!("Finished in {:.1?}", start.elapsed());
    Ok(())
}

fn write_outputs(
    dir: &Path,
    output: &PipelineOutput<Backend>,
    format: OutputFormat,
    compressed: bool,
    device: &<Backend as burn::tensor::backend::Backend>::Device,
) -> Result<()> {
    let save = |image: &Image<Backend, 3>, name: &str| -> Result<()> {
        let path = dir.join(format!("{}.{}", name, format.extension(compressed)));
        write_image(image, &path, compressed).with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
        Ok(())
    };

    save(&output.ct_fixed, "CT_fixed")?;
    save(&output.mri_aligned, "MRI_aligned")?;
    save(&output.quality.ct_mask.to_image::<Backend>(device), "QC_mask_CT_body")?;
    save(&output.quality.mri_mask.to_image::<Backend>(device), "QC_mask_MRI_body")?;

    let transform_path = dir.join(TRANSFORM_FILE);
    write_transform(&transform_path, &output.registration.transform)?;
    info!("Wrote {}", transform_path.display());
    Ok(())
}
