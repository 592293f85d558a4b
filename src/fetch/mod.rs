//! Idempotent tile download into the local cache

pub mod error;
pub mod fetcher;

pub use error::{FetchError, FetchFailureReason};
pub use fetcher::{FetchFailure, FetchOptions, FetchReport, FetchSource, FetchedFile, TileFetcher};
