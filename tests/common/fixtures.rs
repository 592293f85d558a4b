//! Deterministic tile fixtures
//!
//! Every fixture tile has a per-pixel pattern derived from its seed and
//! coordinates, so a misplaced or mixed-up tile shows up in pixel checks.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Prefix used by fixture tiles
pub const PREFIX: &str = "abcdef0123456789abcdef0123456789";

/// A second tile set, for prefix mismatch scenarios
pub const OTHER_PREFIX: &str = "99999999999999999999999999999999";

/// Wire name of a fixture tile
pub fn tile_name(prefix: &str, x: u32, y: u32, width: u32, height: u32) -> String {
    format!("{prefix}-{x}-{y}-{width}-{height}")
}

/// Patterned tile image plus its PNG encoding
pub fn png_tile(width: u32, height: u32, seed: u8) -> (RgbaImage, Vec<u8>) {
    let image = RgbaImage::from_fn(width, height, |i, j| {
        Rgba([seed, (i % 256) as u8, (j % 256) as u8, 255])
    });

    let mut png = Vec::new();
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .expect("Failed to encode fixture tile");
    (image, png)
}

/// Assert that `tile` appears verbatim in `mosaic` at `(x, y)`
pub fn assert_region_matches(mosaic: &RgbaImage, tile: &RgbaImage, x: u32, y: u32) {
    for (i, j, pixel) in tile.enumerate_pixels() {
        assert_eq!(
            mosaic.get_pixel(x + i, y + j),
            pixel,
            "pixel ({i}, {j}) of tile at ({x}, {y}) differs"
        );
    }
}

/// Contents of every file in `dir`, keyed by file name
pub fn snapshot_dir(dir: &Path) -> BTreeMap<String, Vec<u8>> {
    std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            let bytes = std::fs::read(entry.path()).expect("Failed to read file");
            (name, bytes)
        })
        .collect()
}
