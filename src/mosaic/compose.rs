use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use image::{imageops, DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use serde::Serialize;

use crate::mosaic::error::ComposeError;
use crate::tile::{parse_tile_name, SessionPrefix, TileIdentity, TileRecord};

/// Default upper bound on canvas size (RGBA, so 4 bytes per pixel)
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 1 << 29;

/// Dimensions of the output image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
}

impl CanvasSpec {
    /// Tight bounding box of `tiles`, or `None` when there are none
    pub fn bounding<'a>(tiles: impl IntoIterator<Item = &'a TileIdentity>) -> Option<(u64, u64)> {
        tiles.into_iter().fold(None, |acc, tile| {
            let (w, h) = acc.unwrap_or((0, 0));
            Some((w.max(tile.right()), h.max(tile.bottom())))
        })
    }

    /// Validate a bounding box against the raster limits
    pub fn fit(width: u64, height: u64, max_pixels: u64) -> Result<Self, ComposeError> {
        let too_large = ComposeError::CanvasTooLarge {
            width,
            height,
            limit: max_pixels,
        };
        let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
            return Err(too_large);
        };
        if width.saturating_mul(height) > max_pixels {
            return Err(too_large);
        }
        Ok(Self {
            width: w,
            height: h,
        })
    }
}

impl fmt::Display for CanvasSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    pub max_canvas_pixels: u64,
    /// Color left where no tile was placed
    pub background: [u8; 4],
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
            background: [0, 0, 0, 0],
        }
    }
}

/// A tile file in the cache together with its decoded name
#[derive(Debug, Clone)]
pub struct CachedTile {
    pub identity: TileIdentity,
    pub path: PathBuf,
}

impl From<&TileRecord> for CachedTile {
    fn from(record: &TileRecord) -> Self {
        Self {
            identity: record.identity.clone(),
            path: record.local_path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    ZeroExtent,
    Unreadable(String),
    Undecodable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ZeroExtent => write!(f, "zero width or height"),
            SkipReason::Unreadable(msg) => write!(f, "unreadable: {msg}"),
            SkipReason::Undecodable(msg) => write!(f, "undecodable: {msg}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedTile {
    pub file: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComposeReport {
    pub canvas: CanvasSpec,
    pub placed: usize,
    pub skipped: Vec<SkippedTile>,
    /// Prefixes of the composed tiles; more than one means the cache mixes
    /// tile sets
    pub prefixes: BTreeSet<SessionPrefix>,
    pub output: PathBuf,
}

impl ComposeReport {
    pub fn has_mixed_prefixes(&self) -> bool {
        self.prefixes.len() > 1
    }
}

/// Every tile file in `cache_dir`, sorted by file name.
///
/// Entries whose names are not tile names are ignored. A missing directory is
/// the same as an empty one.
pub fn scan_cache(cache_dir: &Path) -> Result<Vec<CachedTile>, ComposeError> {
    let read_err = |source| ComposeError::ReadCache {
        path: cache_dir.to_path_buf(),
        source,
    };
    let entries = match fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(read_err(e)),
    };

    let mut tiles = Vec::new();
    for entry in entries {
        let entry = entry.map_err(read_err)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(identity) = entry.file_name().to_str().and_then(parse_tile_name) else {
            continue;
        };
        tiles.push(CachedTile { identity, path });
    }

    tiles.sort_by(|a, b| a.path.file_name().cmp(&b.path.file_name()));
    Ok(tiles)
}

/// Compose every tile in `cache_dir` into one PNG at `output`
pub fn compose(
    cache_dir: &Path,
    output: &Path,
    options: &ComposeOptions,
) -> Result<ComposeReport, ComposeError> {
    let tiles = scan_cache(cache_dir)?;
    tracing::info!(cache_dir = %cache_dir.display(), tiles = tiles.len(), "Scanned tile cache");
    compose_tiles(tiles, cache_dir, output, options)
}

/// Compose `tiles` in order; later tiles overwrite earlier ones where they
/// overlap.
///
/// The canvas covers every tile with an area, including tiles whose file turns
/// out to be missing or corrupt; their rectangles keep the background.
pub fn compose_tiles(
    tiles: Vec<CachedTile>,
    cache_dir: &Path,
    output: &Path,
    options: &ComposeOptions,
) -> Result<ComposeReport, ComposeError> {
    let mut skipped = Vec::new();
    let mut placeable = Vec::with_capacity(tiles.len());
    for tile in tiles {
        if tile.identity.has_area() {
            placeable.push(tile);
        } else {
            tracing::warn!(file = %tile.path.display(), "Skipping tile with zero extent");
            skipped.push(SkippedTile {
                file: tile.path,
                reason: SkipReason::ZeroExtent,
            });
        }
    }

    let no_tiles = || ComposeError::NoTilesFound {
        cache_dir: cache_dir.to_path_buf(),
    };
    let (width, height) = CanvasSpec::bounding(placeable.iter().map(|t| &t.identity))
        .ok_or_else(no_tiles)?;
    let canvas = CanvasSpec::fit(width, height, options.max_canvas_pixels)?;

    let prefixes: BTreeSet<SessionPrefix> =
        placeable.iter().map(|t| t.identity.prefix.clone()).collect();
    if prefixes.len() > 1 {
        tracing::warn!(
            cache_dir = %cache_dir.display(),
            prefixes = ?prefixes.iter().map(SessionPrefix::as_str).collect::<Vec<_>>(),
            "Cache holds tiles from more than one tile set"
        );
    }
    tracing::info!(canvas = %canvas, tiles = placeable.len(), "Composing mosaic");

    let mut image = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba(options.background));
    let mut placed = 0;
    for tile in &placeable {
        match place_tile(&mut image, tile) {
            Ok(()) => placed += 1,
            Err(reason) => {
                tracing::warn!(file = %tile.path.display(), reason = %reason, "Skipping tile");
                skipped.push(SkippedTile {
                    file: tile.path.clone(),
                    reason,
                });
            }
        }
    }

    if placed == 0 {
        return Err(no_tiles());
    }

    write_png(image, output)?;
    tracing::info!(output = %output.display(), placed, skipped = skipped.len(), "Mosaic saved");

    Ok(ComposeReport {
        canvas,
        placed,
        skipped,
        prefixes,
        output: output.to_path_buf(),
    })
}

/// Copy one tile's pixels onto the canvas at its declared offset
fn place_tile(canvas: &mut RgbaImage, tile: &CachedTile) -> Result<(), SkipReason> {
    let decoded = ImageReader::open(&tile.path)
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| SkipReason::Unreadable(e.to_string()))?
        .decode()
        .map_err(|e| SkipReason::Undecodable(e.to_string()))?;
    let pixels = decoded.into_rgba8();

    let id = &tile.identity;
    let (x, y) = (i64::from(id.x), i64::from(id.y));
    if (pixels.width(), pixels.height()) == (id.width, id.height) {
        imageops::replace(canvas, &pixels, x, y);
        return Ok(());
    }

    tracing::warn!(
        file = %tile.path.display(),
        declared = %format!("{}x{}", id.width, id.height),
        actual = %format!("{}x{}", pixels.width(), pixels.height()),
        "Tile size differs from its name"
    );
    let clipped = imageops::crop_imm(
        &pixels,
        0,
        0,
        pixels.width().min(id.width),
        pixels.height().min(id.height),
    )
    .to_image();
    imageops::replace(canvas, &clipped, x, y);
    Ok(())
}

/// Encode `image` as PNG next to `output`, then rename it into place
fn write_png(image: RgbaImage, output: &Path) -> Result<(), ComposeError> {
    let write_err = |source| ComposeError::WriteOutput {
        path: output.to_path_buf(),
        source,
    };

    let parent = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".mosaic-")
        .suffix(".png")
        .tempfile_in(&parent)
        .map_err(write_err)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        DynamicImage::ImageRgba8(image).write_to(&mut writer, ImageFormat::Png)?;
        writer.flush().map_err(write_err)?;
    }
    tmp.persist(output).map_err(|e| write_err(e.error))?;
    Ok(())
}
