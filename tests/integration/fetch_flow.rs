//! Integration tests for the tile fetcher
//!
//! Tests the flow: URL list -> TileFetcher -> cache directory contents

use tempfile::TempDir;
use tilestitch::fetch::{FetchFailureReason, FetchOptions, FetchSource, TileFetcher};

use super::common::fixtures::{png_tile, snapshot_dir, tile_name, PREFIX};
use super::common::tile_server::TileServer;

async fn server_with_tiles(count: u32) -> (TileServer, Vec<String>) {
    let server = TileServer::start().await;
    let urls = (0..count)
        .map(|i| {
            let (_, png) = png_tile(8, 8, i as u8);
            server.add_tile(&tile_name(PREFIX, i * 8, 0, 8, 8), png)
        })
        .collect();
    (server, urls)
}

/// A second fetch of the same list issues no requests and leaves the cache untouched
#[tokio::test]
async fn test_refetch_uses_cache() {
    let (server, urls) = server_with_tiles(3).await;
    let cache = TempDir::new().unwrap();

    let fetcher = TileFetcher::new(cache.path(), FetchOptions::default()).unwrap();
    let first = fetcher.fetch_all(&urls).await.unwrap();
    assert_eq!(first.downloaded_count(), 3);
    assert_eq!(server.requests(), 3);
    let before = snapshot_dir(cache.path());

    let second = fetcher.fetch_all(&urls).await.unwrap();
    assert_eq!(second.downloaded_count(), 0);
    assert_eq!(second.cached_count(), 3);
    assert_eq!(server.requests(), 3, "cached tiles must not be requested");
    assert_eq!(snapshot_dir(cache.path()), before);
}

/// Cached files carry the tile name with a .png extension
#[tokio::test]
async fn test_cache_file_names() {
    let (_server, urls) = server_with_tiles(2).await;
    let cache = TempDir::new().unwrap();

    let fetcher = TileFetcher::new(cache.path(), FetchOptions::default()).unwrap();
    let report = fetcher.fetch_all(&urls).await.unwrap();
    assert!(report.is_complete());

    let names: Vec<String> = snapshot_dir(cache.path()).into_keys().collect();
    assert_eq!(
        names,
        vec![
            format!("{}.png", tile_name(PREFIX, 0, 0, 8, 8)),
            format!("{}.png", tile_name(PREFIX, 8, 0, 8, 8)),
        ]
    );

    let records = report.tile_records();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.fetched));
}

/// Missing tiles are reported individually and do not stop the batch
#[tokio::test]
async fn test_http_errors_are_aggregated() {
    let (server, mut urls) = server_with_tiles(2).await;
    let missing = server.url_for(&tile_name(PREFIX, 100, 100, 8, 8));
    urls.insert(1, missing.clone());
    let cache = TempDir::new().unwrap();

    let fetcher = TileFetcher::new(cache.path(), FetchOptions::default()).unwrap();
    let report = fetcher.fetch_all(&urls).await.unwrap();

    assert_eq!(report.downloaded_count(), 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].url, missing);
    assert_eq!(report.failed[0].reason, FetchFailureReason::HttpStatus(404));

    // No partial or empty file is left for the failed tile
    let files = snapshot_dir(cache.path());
    assert_eq!(files.len(), 2);
    assert!(files.values().all(|bytes| !bytes.is_empty()));
}

/// A URL sharing its file with a failed download fails too
#[tokio::test]
async fn test_duplicate_of_failed_download_is_failed() {
    let server = TileServer::start().await;
    let missing = server.url_for(&tile_name(PREFIX, 0, 0, 8, 8));
    let variant = format!("{missing}?v=2");
    let cache = TempDir::new().unwrap();

    let fetcher = TileFetcher::new(cache.path(), FetchOptions::default()).unwrap();
    let report = fetcher
        .fetch_all(&[missing.clone(), variant.clone()])
        .await
        .unwrap();

    assert_eq!(server.requests(), 1);
    assert!(report.succeeded.is_empty());
    assert!(report.tile_records().is_empty());
    let failed: Vec<_> = report
        .failed
        .iter()
        .map(|f| (f.url.clone(), f.reason.clone()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (missing, FetchFailureReason::HttpStatus(404)),
            (variant, FetchFailureReason::HttpStatus(404)),
        ]
    );
    assert!(snapshot_dir(cache.path()).is_empty());
}

/// URLs mapping to the same file are downloaded once, even with many workers
#[tokio::test]
async fn test_duplicate_urls_single_request() {
    let (server, urls) = server_with_tiles(3).await;
    let mut repeated = urls.clone();
    repeated.extend(urls.iter().cloned());
    repeated.push(format!("{}?cache-bust=1", urls[0]));
    let cache = TempDir::new().unwrap();

    let options = FetchOptions {
        concurrency: 8,
        ..FetchOptions::default()
    };
    let fetcher = TileFetcher::new(cache.path(), options).unwrap();
    let report = fetcher.fetch_all(&repeated).await.unwrap();

    assert_eq!(server.requests(), 3);
    assert_eq!(report.succeeded.len(), repeated.len());
    assert_eq!(report.downloaded_count(), 3);
    assert!(report
        .succeeded
        .iter()
        .skip(3)
        .all(|f| f.source == FetchSource::Cache));
}

/// A cancelled fetcher starts no downloads
#[tokio::test]
async fn test_cancelled_fetch_issues_no_requests() {
    let (server, urls) = server_with_tiles(3).await;
    let cache = TempDir::new().unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    cancel.cancel();
    let fetcher = TileFetcher::new(cache.path(), FetchOptions::default())
        .unwrap()
        .with_cancellation(cancel);
    let report = fetcher.fetch_all(&urls).await.unwrap();

    assert_eq!(server.requests(), 0);
    assert_eq!(report.cancelled, urls);
    assert!(snapshot_dir(cache.path()).is_empty());
}
