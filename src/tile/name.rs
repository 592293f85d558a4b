//! Tile name codec
//!
//! Tiles carry their placement in their name:
//! `<32 hex prefix>-<x>-<y>-<width>-<height>` on the wire, with a `.png`
//! extension once stored in the local cache.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const TILE_NAME_PATTERN: &str = r"^([a-f0-9]{32})-(\d+)-(\d+)-(\d+)-(\d+)(\.png)?$";

/// Extension used for tiles in the local cache
pub const TILE_EXTENSION: &str = ".png";

fn tile_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TILE_NAME_PATTERN).expect("tile name pattern is valid"))
}

/// The 32-hex-character identifier shared by every tile of one tile set
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionPrefix(String);

impl SessionPrefix {
    pub const LEN: usize = 32;

    /// Validate a prefix: exactly 32 lowercase hex digits
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == Self::LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionPrefix {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid tile prefix: {value}"))
    }
}

impl From<SessionPrefix> for String {
    fn from(prefix: SessionPrefix) -> Self {
        prefix.0
    }
}

/// Placement metadata decoded from a tile name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIdentity {
    pub prefix: SessionPrefix,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileIdentity {
    /// Name as served by the tile server (no extension)
    pub fn wire_name(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.prefix, self.x, self.y, self.width, self.height
        )
    }

    /// Name used for the cached copy
    pub fn file_name(&self) -> String {
        format!("{}{}", self.wire_name(), TILE_EXTENSION)
    }

    /// A tile with a zero extent cannot be placed
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Right edge, widened so `x + width` never overflows
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.width)
    }

    /// Bottom edge, widened so `y + height` never overflows
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.height)
    }
}

impl fmt::Display for TileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_name())
    }
}

/// Parse a tile file name, with or without the `.png` extension.
///
/// Returns `None` for anything that is not a tile name, including names whose
/// numbers do not fit in a `u32`. Zero extents are accepted here; callers that
/// place tiles decide what to do with them.
pub fn parse_tile_name(name: &str) -> Option<TileIdentity> {
    let caps = tile_name_regex().captures(name)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    Some(TileIdentity {
        prefix: SessionPrefix(caps.get(1)?.as_str().to_string()),
        x: number(2)?,
        y: number(3)?,
        width: number(4)?,
        height: number(5)?,
    })
}

/// Parse a tile name as it appears in a URL path (extension not allowed)
pub fn parse_wire_name(name: &str) -> Option<TileIdentity> {
    if name.ends_with(TILE_EXTENSION) {
        return None;
    }
    parse_tile_name(name)
}
