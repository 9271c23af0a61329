//! Output handling: overwrite policy and writing files.

use std::io::{BufRead, IsTerminal, Write};
use std::path::Path;

use crate::error::CliError;

/// Decide whether writing to `path` may go ahead.
///
/// A missing file is always fine. An existing file is overwritten when
/// `force` is set, or when stdin is a terminal and the user confirms.
/// Without a terminal to ask on, an existing file is an error.
pub fn check_output(path: &Path, force: bool) -> Result<(), CliError> {
    if path.is_dir() {
        return Err(CliError::OutputIsDirectory(path.to_path_buf()));
    }
    if !path.exists() || force {
        return Ok(());
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::OutputExists(path.to_path_buf()));
    }

    let confirmed = confirm_overwrite(
        path,
        &mut std::io::stdin().lock(),
        &mut std::io::stderr().lock(),
    )
    .map_err(|source| CliError::Read {
        path: "<stdin>".into(),
        source,
    })?;

    if confirmed {
        Ok(())
    } else {
        Err(CliError::OverwriteDeclined(path.to_path_buf()))
    }
}

/// Ask on `prompt` whether to overwrite `path` and read the answer from
/// `answer`. Only `y` or `yes` (any case) counts as consent; end of
/// input counts as no.
pub fn confirm_overwrite<R: BufRead, W: Write>(
    path: &Path,
    answer: &mut R,
    prompt: &mut W,
) -> std::io::Result<bool> {
    write!(
        prompt,
        "Output file {} already exists. Overwrite? [y/N] ",
        path.display()
    )?;
    prompt.flush()?;

    let mut line = String::new();
    answer.read_line(&mut line)?;
    let reply = line.trim();
    Ok(reply.eq_ignore_ascii_case("y") || reply.eq_ignore_ascii_case("yes"))
}

/// Write `contents` to `path`, creating missing parent directories.
pub fn write_file(path: &Path, contents: &[u8]) -> Result<(), CliError> {
    let write_err = |source| CliError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, contents).map_err(write_err)
}
