//! Locations of tilestitch's own files (config and logs)
//!
//! Tile caches and outputs are not stored here; they live wherever the config
//! or the command line points, relative to the working directory by default.

use std::path::PathBuf;
use std::sync::OnceLock;

const DATA_DIR_NAME: &str = ".tilestitch";

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Pin the data directory for this process.
///
/// Call once from `main` before anything reads a path. `None` keeps
/// `~/.tilestitch`. Later calls are ignored.
pub fn init_data_dir(custom_path: Option<PathBuf>) {
    let requested = custom_path.unwrap_or_else(home_data_dir);
    if let Err(rejected) = DATA_DIR.set(requested) {
        tracing::debug!(
            ignored = %rejected.display(),
            current = %data_dir().display(),
            "Data directory already set"
        );
    }
}

fn home_data_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DATA_DIR_NAME),
        None => PathBuf::from(DATA_DIR_NAME),
    }
}

pub fn data_dir() -> PathBuf {
    DATA_DIR.get().cloned().unwrap_or_else(home_data_dir)
}

/// `<data dir>/config.toml`, the fallback config file
pub fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Target of `--log-file`
pub fn log_file_path() -> PathBuf {
    logs_dir().join("tilestitch.log")
}
