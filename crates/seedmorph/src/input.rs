//! Input discovery: which files in the input directory are images.

use std::path::{Path, PathBuf};

use seedmorph_pipeline::AnalysisConfig;

use crate::error::CliError;

/// One image to analyse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// File name, used as the row identifier in the result table.
    pub name: String,
    /// Full path.
    pub path: PathBuf,
}

/// List the image files directly inside `dir`, sorted by file name.
///
/// A file qualifies when it is a regular file (or a link to one) whose
/// name carries one of `config.image_extensions`. Subdirectories are not
/// searched. Names that are not valid UTF-8 are skipped with a warning.
pub fn discover_images(dir: &Path, config: &AnalysisConfig) -> Result<Vec<ImageFile>, CliError> {
    let read_err = |source| CliError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(read_err)? {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            tracing::warn!(path = %path.display(), "skipping file with non-UTF-8 name");
            continue;
        };
        if config.accepts_file_name(&name) {
            images.push(ImageFile { name, path });
        }
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(images)
}
