//! seedmorph: measure grain morphology across a directory of images.
//!
//! Runs every image in the input directory through the detector named
//! by the weights file, measures each confident detection, drops
//! per-image outliers, and writes one tab-separated table.
//!
//! # Usage
//!
//! ```text
//! seedmorph --input images/ --output traits.tsv --weights model.json
//! ```
//!
//! Exit status is non-zero when the arguments or configuration are
//! unusable, when there is nothing to analyse, or when every image
//! failed.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod error;
mod input;
mod output;

use std::path::Path;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use seedmorph_pipeline::{BatchAnalyzer, Clock, DetectorModel};

use crate::cli::{Cli, config_from_cli};
use crate::error::CliError;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    // Everything that can be checked up front is, before any image is read.
    if !cli.input.is_dir() {
        return Err(CliError::MissingInput(cli.input.clone()));
    }
    if !cli.weights.is_file() {
        return Err(CliError::MissingWeights(cli.weights.clone()));
    }
    let config = config_from_cli(cli)?;
    let detector = load_detector(&cli.weights)?;
    output::check_output(&cli.output, cli.force)?;

    let images = input::discover_images(&cli.input, &config)?;
    if images.is_empty() {
        return Err(CliError::NoImages(cli.input.clone()));
    }
    tracing::info!(
        images = images.len(),
        input = %cli.input.display(),
        "starting analysis",
    );
    tracing::debug!(?config, ?detector, "analysis settings");

    let mut batch = BatchAnalyzer::new(&detector, &config, &StdClock)?;
    for image in &images {
        match std::fs::read(&image.path) {
            Ok(bytes) => {
                batch.push_image(&image.name, &bytes);
            }
            Err(e) => batch.record_failure(&image.name, &e.to_string()),
        }
    }
    let result = batch.finish()?;
    let summary = &result.summary;

    if summary.images_analysed() == 0 {
        return Err(CliError::AllImagesFailed(summary.failures.len()));
    }

    let table = seedmorph_export::to_tsv(&result.rows)?;
    output::write_file(&cli.output, table.as_bytes())?;
    tracing::info!(
        rows = result.rows.len(),
        analysed = summary.images_analysed(),
        failed = summary.failures.len(),
        output = %cli.output.display(),
        "wrote result table",
    );

    if let Some(ref path) = cli.diagnostics_json {
        let json = serde_json::to_string_pretty(summary).map_err(CliError::Diagnostics)?;
        output::write_file(path, json.as_bytes())?;
        tracing::info!(path = %path.display(), "wrote diagnostics");
    }
    if cli.report {
        eprintln!("{}", summary.report());
    }

    Ok(())
}

/// Read and parse the detector model file.
fn load_detector(path: &Path) -> Result<DetectorModel, CliError> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CliError::Weights {
        path: path.to_path_buf(),
        source,
    })
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}
