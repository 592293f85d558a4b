//! Tile identity and naming

pub mod name;
pub mod record;

pub use name::{parse_tile_name, parse_wire_name, SessionPrefix, TileIdentity, TILE_EXTENSION};
pub use record::{canonical_file_name, TileRecord};
