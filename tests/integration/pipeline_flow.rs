//! Integration tests for full pipeline runs
//!
//! Tests the flow: MockSession -> Observer -> TileFetcher -> compose -> PNG on disk

use std::path::Path;
use std::time::Duration;

use image::{Rgba, RgbaImage};
use reqwest::Url;
use tempfile::TempDir;
use tilestitch::browser::mock::{MockEventBuilder, MockSession};
use tilestitch::{Config, Pipeline, PipelineError};

use super::common::fixtures::{
    assert_region_matches, png_tile, snapshot_dir, tile_name, OTHER_PREFIX, PREFIX,
};
use super::common::tile_server::TileServer;

fn test_config(workspace: &Path) -> Config {
    Config::default()
        .with_cache_dir(workspace.join("tiles"))
        .with_output(workspace.join("mosaic.png"))
        .with_window(Duration::from_millis(100))
}

fn target(server: &TileServer) -> Url {
    Url::parse(&format!("{}/viewer", server.base_url())).unwrap()
}

fn read_output(path: &Path) -> RgbaImage {
    image::open(path).expect("Failed to open mosaic").into_rgba8()
}

/// Three tiles of a 2x2 grid end up at their offsets; the missing quadrant is background
#[tokio::test]
async fn test_run_composes_observed_tiles() {
    let server = TileServer::start().await;
    let mut tiles = Vec::new();
    for (seed, (x, y)) in [(0, 0), (64, 0), (0, 64)].into_iter().enumerate() {
        let (image, png) = png_tile(64, 64, seed as u8 + 1);
        server.add_tile(&tile_name(PREFIX, x, y, 64, 64), png);
        tiles.push((image, x, y));
    }

    let events = MockEventBuilder::new(server.base_url())
        .page_loaded()
        .response("/viewer/app.js")
        .tile(PREFIX, 0, 0, 64, 64)
        .tile(PREFIX, 64, 0, 64, 64)
        .tile(PREFIX, 0, 0, 64, 64)
        .tile(PREFIX, 0, 64, 64, 64)
        .build();
    let session = MockSession::new().with_events(events);

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));
    let summary = pipeline
        .run(&session, &target(&server))
        .await
        .expect("Run should succeed");

    assert_eq!(session.opened_targets(), vec![target(&server)]);
    assert_eq!(summary.observation.urls.len(), 3);
    assert_eq!(summary.fetch.downloaded_count(), 3);
    assert_eq!(summary.compose.placed, 3);
    assert_eq!(summary.compose.canvas.to_string(), "128x128");

    let mosaic = read_output(&workspace.path().join("mosaic.png"));
    assert_eq!(mosaic.dimensions(), (128, 128));
    for (image, x, y) in &tiles {
        assert_region_matches(&mosaic, image, *x, *y);
    }
    for i in 64..128 {
        for j in 64..128 {
            assert_eq!(mosaic.get_pixel(i, j), &Rgba([0, 0, 0, 0]));
        }
    }
}

/// No tile traffic: nothing is requested and nothing is written
#[tokio::test]
async fn test_run_without_tiles_is_discovery_empty() {
    let server = TileServer::start().await;
    let events = MockEventBuilder::new(server.base_url())
        .page_loaded()
        .response("/viewer/app.js")
        .response("/viewer/thumb.png")
        .build();
    let session = MockSession::new().with_events(events);

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));
    let err = pipeline.run(&session, &target(&server)).await.unwrap_err();

    assert!(matches!(err, PipelineError::DiscoveryEmpty));
    assert_eq!(err.exit_code(), 2);
    assert_eq!(server.requests(), 0);
    assert!(!workspace.path().join("tiles").exists());
    assert!(!workspace.path().join("mosaic.png").exists());
}

/// A second run against the same cache downloads nothing
#[tokio::test]
async fn test_rerun_is_served_from_cache() {
    let server = TileServer::start().await;
    let mut builder = MockEventBuilder::new(server.base_url()).page_loaded();
    for x in [0, 32, 64] {
        let (_, png) = png_tile(32, 16, x as u8);
        server.add_tile(&tile_name(PREFIX, x, 0, 32, 16), png);
        builder = builder.tile(PREFIX, x, 0, 32, 16);
    }
    let events = builder.build();

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));

    let first = pipeline
        .run(&MockSession::new().with_events(events.clone()), &target(&server))
        .await
        .unwrap();
    assert_eq!(first.fetch.downloaded_count(), 3);
    let cached = snapshot_dir(&workspace.path().join("tiles"));

    let second = pipeline
        .run(&MockSession::new().with_events(events), &target(&server))
        .await
        .unwrap();
    assert_eq!(second.fetch.downloaded_count(), 0);
    assert_eq!(second.fetch.cached_count(), 3);
    assert_eq!(server.requests(), 3);
    assert_eq!(snapshot_dir(&workspace.path().join("tiles")), cached);
    assert_eq!(second.compose.canvas.to_string(), "96x16");
}

/// Every download fails: the run ends with no tiles found
#[tokio::test]
async fn test_run_with_only_failed_fetches() {
    let server = TileServer::start().await;
    let events = MockEventBuilder::new(server.base_url())
        .page_loaded()
        .tile(PREFIX, 0, 0, 16, 16)
        .tile(PREFIX, 16, 0, 16, 16)
        .build();
    let session = MockSession::new().with_events(events);

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));
    let err = pipeline.run(&session, &target(&server)).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoTilesFound { .. }));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(server.requests(), 2);
    assert!(!workspace.path().join("mosaic.png").exists());
}

/// Tiles from a second tile set are still collected but reported
#[tokio::test]
async fn test_prefix_mismatch_is_reported() {
    let server = TileServer::start().await;
    let (_, first) = png_tile(16, 16, 1);
    let (_, second) = png_tile(16, 16, 2);
    server.add_tile(&tile_name(PREFIX, 0, 0, 16, 16), first);
    server.add_tile(&tile_name(OTHER_PREFIX, 16, 0, 16, 16), second);

    let events = MockEventBuilder::new(server.base_url())
        .page_loaded()
        .tile(PREFIX, 0, 0, 16, 16)
        .tile(OTHER_PREFIX, 16, 0, 16, 16)
        .build();
    let session = MockSession::new().with_events(events);

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));
    let observation = pipeline
        .discover(&session, &target(&server))
        .await
        .unwrap();

    assert_eq!(observation.prefix.as_ref().map(|p| p.as_str()), Some(PREFIX));
    assert!(observation.has_prefix_mismatch());
    assert!(observation.foreign_prefixes.contains(OTHER_PREFIX));
    assert_eq!(observation.urls.len(), 2);
}

/// Discovery alone never touches the cache
#[tokio::test]
async fn test_discover_does_not_fetch() {
    let server = TileServer::start().await;
    let events = MockEventBuilder::new(server.base_url())
        .page_loaded()
        .tile(PREFIX, 0, 0, 16, 16)
        .build();
    let session = MockSession::new().with_events(events);

    let workspace = TempDir::new().unwrap();
    let pipeline = Pipeline::new(test_config(workspace.path()));
    let observation = pipeline
        .discover(&session, &target(&server))
        .await
        .unwrap();

    assert_eq!(observation.urls, vec![server.url_for(&tile_name(PREFIX, 0, 0, 16, 16))]);
    assert_eq!(server.requests(), 0);
    assert!(!workspace.path().join("tiles").exists());
}
