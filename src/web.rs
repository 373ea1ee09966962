use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::Configuration;
use crate::scan;
use crate::selection::{self, BatchSelection, PhotoSelection};

#[derive(Clone)]
pub struct AppState {
    cfg: Arc<Configuration>,
    rng: Arc<Mutex<StdRng>>,
}

impl AppState {
    /// Seeds the shuffle source from `shuffle-seed` when set, otherwise from the OS.
    pub fn new(cfg: Configuration) -> Self {
        let rng = selection::shuffle_rng(cfg.shuffle_seed);
        Self {
            cfg: Arc::new(cfg),
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/photos", get(latest_batch))
        .route("/api/photos-order", get(rotating_window))
        .route("/api/photos-shuffle", get(random_selection));

    if state.cfg.serve_photos {
        let photos = ServeDir::new(&state.cfg.photo_library_path);
        let prefix = state.cfg.url_prefix.trim_end_matches('/');
        router = if prefix.is_empty() {
            router.fallback_service(photos)
        } else {
            router.nest_service(prefix, photos)
        };
    }

    router
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `state` on `bind_addr` until `cancel` fires.
pub async fn serve(
    state: AppState,
    bind_addr: SocketAddr,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind gallery listener on {bind_addr}"))?;
    info!(
        %bind_addr,
        root = %state.cfg.photo_library_path.display(),
        "gallery server listening"
    );
    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
        .context("gallery server exited")?;
    info!("gallery server stopped");
    Ok(())
}

async fn latest_batch(State(state): State<AppState>) -> Json<BatchSelection> {
    let records = scan::scan_or_empty(&state.cfg, SystemTime::now()).await;
    let selection = selection::sequential_batch(&records, state.cfg.batch_size);
    debug!(
        total = selection.total,
        batch = ?selection.batch_index,
        "batch selection"
    );
    Json(selection)
}

// Raw pairs rather than a typed struct: a malformed or repeated `offset`
// must still produce a 200 response.
async fn rotating_window(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Json<PhotoSelection> {
    let raw = params
        .iter()
        .find(|(key, _)| key == "offset")
        .map(|(_, value)| value.as_str());
    let offset = parse_offset(raw);
    let records = scan::scan_or_empty(&state.cfg, SystemTime::now()).await;
    let selection = selection::rotation(&records, offset, state.cfg.rotation_window);
    debug!(total = selection.total, offset, "rotation selection");
    Json(selection)
}

async fn random_selection(State(state): State<AppState>) -> Json<PhotoSelection> {
    let records = scan::scan_or_empty(&state.cfg, SystemTime::now()).await;
    let selection = {
        let mut rng = state.rng.lock();
        selection::shuffle(&records, state.cfg.shuffle_count, &mut *rng)
    };
    debug!(total = selection.total, "shuffle selection");
    Json(selection)
}

/// Lenient integer parse: an optional sign and the leading digits count,
/// anything unparsable (or out of range) is offset 0.
fn parse_offset(raw: Option<&str>) -> i64 {
    let Some(raw) = raw.map(str::trim) else {
        return 0;
    };
    let digits_end = raw
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && matches!(c, '+' | '-'))))
        .map_or(raw.len(), |(i, _)| i);
    raw[..digits_end].parse().unwrap_or(0)
}
