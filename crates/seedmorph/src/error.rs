//! Errors that end a run with a non-zero exit status.

use std::path::PathBuf;

use seedmorph_export::TsvError;
use seedmorph_pipeline::PipelineError;

/// A fatal error. Per-image problems never become one of these; they
/// are logged and the batch moves on.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// The input directory does not exist or is not a directory.
    #[error("input directory {} does not exist", .0.display())]
    MissingInput(PathBuf),

    /// The detector model file does not exist.
    #[error("weights file {} does not exist", .0.display())]
    MissingWeights(PathBuf),

    /// The output path names a directory.
    #[error("output path {} is a directory", .0.display())]
    OutputIsDirectory(PathBuf),

    /// The output file exists and overwriting was not confirmed.
    #[error("output file {} already exists; pass --force to overwrite", .0.display())]
    OutputExists(PathBuf),

    /// The user answered no to the overwrite prompt.
    #[error("not overwriting {}", .0.display())]
    OverwriteDeclined(PathBuf),

    /// A file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file or directory could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        /// The file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Analysis configuration could not be parsed.
    #[error("failed to parse configuration from {origin}: {source}")]
    ConfigParse {
        /// File path or flag the JSON came from.
        origin: String,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The detector model file is not a valid model.
    #[error("failed to load detector model {}: {source}", path.display())]
    Weights {
        /// The model file.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The input directory holds no image files.
    #[error("no image files found in {}", .0.display())]
    NoImages(PathBuf),

    /// Every image in the batch failed.
    #[error("all {0} images failed; nothing was measured")]
    AllImagesFailed(usize),

    /// Analysis pipeline error.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Result table could not be serialized.
    #[error(transparent)]
    Table(#[from] TsvError),

    /// Diagnostics could not be serialized.
    #[error("failed to serialize diagnostics: {0}")]
    Diagnostics(serde_json::Error),
}
