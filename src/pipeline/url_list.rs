//! Plain-text tile URL lists
//!
//! One URL per line. Blank lines and lines starting with `#` are ignored on
//! read.

use std::fs;
use std::path::Path;

use crate::pipeline::error::PipelineError;

pub fn write_url_list(path: &Path, urls: &[String]) -> Result<(), PipelineError> {
    let io_err = |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
    }

    let mut contents = urls.join("\n");
    contents.push('\n');
    fs::write(path, contents).map_err(io_err)
}

pub fn read_url_list(path: &Path) -> Result<Vec<String>, PipelineError> {
    let contents = fs::read_to_string(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
