pub mod browser;
pub mod config;
pub mod fetch;
pub mod mosaic;
pub mod observe;
pub mod pipeline;
pub mod tile;
pub mod util;

pub use browser::{BrowserEvent, BrowserSession, DriverSession, HarSession, SessionError};
pub use config::Config;
pub use fetch::{FetchReport, TileFetcher};
pub use mosaic::{compose, CanvasSpec, ComposeError, ComposeReport};
pub use observe::{Observation, Observer};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use tile::{parse_tile_name, SessionPrefix, TileIdentity, TileRecord};
