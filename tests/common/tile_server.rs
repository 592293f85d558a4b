//! In-process tile server
//!
//! Serves registered tiles under `/tiles/{name}` and counts every request it
//! receives, hits and misses alike.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;

#[derive(Clone, Default)]
struct ServerState {
    tiles: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    requests: Arc<AtomicUsize>,
}

pub struct TileServer {
    addr: SocketAddr,
    state: ServerState,
}

impl TileServer {
    pub async fn start() -> Self {
        let state = ServerState::default();
        let app = Router::new()
            .route("/tiles/{name}", get(serve_tile))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind tile server");
        let addr = listener.local_addr().expect("Tile server has no address");

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("tile server stopped: {e}");
            }
        });

        Self { addr, state }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Register a tile and return its URL
    pub fn add_tile(&self, name: &str, body: Vec<u8>) -> String {
        self.state.tiles.lock().insert(name.to_string(), body);
        self.url_for(name)
    }

    /// URL for `name`, whether or not it is registered
    pub fn url_for(&self, name: &str) -> String {
        format!("{}/tiles/{}", self.base_url(), name)
    }

    /// Number of requests served so far
    pub fn requests(&self) -> usize {
        self.state.requests.load(Ordering::SeqCst)
    }
}

async fn serve_tile(State(state): State<ServerState>, Path(name): Path<String>) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    let body = state.tiles.lock().get(&name).cloned();
    match body {
        Some(bytes) => (StatusCode::OK, [(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
