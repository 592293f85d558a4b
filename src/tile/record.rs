use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::tile::name::{parse_tile_name, TileIdentity, TILE_EXTENSION};

/// A discovered tile and the state of its cached copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub identity: TileIdentity,
    pub source_url: String,
    pub local_path: PathBuf,
    /// True once the cached copy is known to be on disk
    pub fetched: bool,
}

impl TileRecord {
    /// Build a record for `url` cached under `cache_dir`.
    ///
    /// Returns `None` when the URL's final segment is not a tile name.
    pub fn for_url(url: &str, cache_dir: &Path) -> Option<Self> {
        let file_name = canonical_file_name(url)?;
        let identity = parse_tile_name(&file_name)?;
        Some(Self {
            identity,
            source_url: url.to_string(),
            local_path: cache_dir.join(file_name),
            fetched: false,
        })
    }

    pub fn mark_fetched(mut self) -> Self {
        self.fetched = true;
        self
    }
}

/// Final path segment of `url`, with `.png` appended when missing.
///
/// Returns `None` for URLs that do not parse or that end in `/`.
pub fn canonical_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.last()?;
    if segment.is_empty() || segment == "." || segment == ".." {
        return None;
    }

    if segment.ends_with(TILE_EXTENSION) {
        Some(segment.to_string())
    } else {
        Some(format!("{segment}{TILE_EXTENSION}"))
    }
}
