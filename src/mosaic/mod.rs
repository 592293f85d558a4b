//! Mosaic assembly from the tile cache
//!
//! Every tile is decoded to 8-bit RGBA before it is pasted, and the mosaic is
//! written as 8-bit RGBA PNG. Tiles that already are 8-bit RGBA come through
//! byte for byte; 16-bit, grayscale or palette tiles are converted, so their
//! pixels are not preserved exactly.

pub mod compose;
pub mod error;

pub use compose::{
    compose, compose_tiles, scan_cache, CachedTile, CanvasSpec, ComposeOptions, ComposeReport,
    SkipReason, SkippedTile,
};
pub use error::ComposeError;
