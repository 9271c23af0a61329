//! Command-line arguments and how they become an [`AnalysisConfig`].

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use seedmorph_pipeline::{AnalysisConfig, IqrPolicy};

use crate::error::CliError;

/// Measure grain morphology across a directory of images.
///
/// Every `.png`, `.jpg` and `.jpeg` file in the input directory is run
/// through the detector, each confident detection is traced and
/// measured, per-image outliers are dropped, and the surviving grains
/// are written to one tab-separated table.
#[derive(Debug, Parser)]
#[command(name = "seedmorph", version)]
pub struct Cli {
    /// Directory containing the grain images.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Path of the tab-separated result table to write.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Detector model file (JSON).
    #[arg(short, long)]
    pub weights: PathBuf,

    /// Overwrite the output file without asking.
    #[arg(short, long)]
    pub force: bool,

    /// Analysis configuration file (JSON).
    #[arg(long, conflicts_with = "config_json")]
    pub config: Option<PathBuf>,

    /// Analysis configuration as a JSON string.
    ///
    /// Keys that are left out keep their defaults. Individual flags
    /// below override values given here.
    #[arg(long)]
    pub config_json: Option<String>,

    /// Skip detections scoring below this confidence.
    #[arg(long)]
    pub min_score: Option<f64>,

    /// Discard traced contours with fewer vertices than this.
    #[arg(long)]
    pub min_vertices: Option<usize>,

    /// Contour smoothing tolerance in pixels (0 measures the raw trace).
    #[arg(long)]
    pub smoothing_tolerance: Option<f64>,

    /// How quartiles are computed across the outlier filter passes.
    #[arg(long, value_enum)]
    pub iqr_policy: Option<Policy>,

    /// Write per-image diagnostics as JSON to this path.
    #[arg(long)]
    pub diagnostics_json: Option<PathBuf>,

    /// Print a per-image diagnostics report to stderr when done.
    #[arg(long)]
    pub report: bool,

    /// Log at debug level (overridden by `RUST_LOG`).
    #[arg(short, long)]
    pub verbose: bool,
}

/// Outlier filter policy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Bounds computed once from all rows of an image.
    FixedBounds,
    /// Bounds recomputed after each measurement's pass.
    Sequential,
}

impl From<Policy> for IqrPolicy {
    fn from(policy: Policy) -> Self {
        match policy {
            Policy::FixedBounds => Self::FixedBounds,
            Policy::Sequential => Self::Sequential,
        }
    }
}

/// Build the analysis configuration from CLI arguments.
///
/// The base comes from `--config` or `--config-json` (defaults when
/// neither is given); individual flags then override single fields.
/// The result is validated before it is returned.
pub fn config_from_cli(cli: &Cli) -> Result<AnalysisConfig, CliError> {
    let mut config = if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| CliError::ConfigParse {
            origin: path.display().to_string(),
            source,
        })?
    } else if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|source| CliError::ConfigParse {
            origin: "--config-json".to_string(),
            source,
        })?
    } else {
        AnalysisConfig::default()
    };

    if let Some(score) = cli.min_score {
        config.min_detection_score = score;
    }
    if let Some(vertices) = cli.min_vertices {
        config.min_contour_vertices = vertices;
    }
    if let Some(tolerance) = cli.smoothing_tolerance {
        config.smoothing_tolerance = tolerance;
    }
    if let Some(policy) = cli.iqr_policy {
        config.iqr_policy = policy.into();
    }

    config.validate()?;
    Ok(config)
}
