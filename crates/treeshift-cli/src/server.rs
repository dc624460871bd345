//! HTTP upload/migrate shim
//!
//! - `POST /api/upload`: JSON body, or a multipart form with a `file` part,
//!   responds with its structure summary
//! - `POST /api/migrate`: `{"jsonData", "userChoices"}`, runs a migration
//! - `GET /api/store`: current target contents
//!
//! Migrations are serialized: one run at a time writes to the shared store.

use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use treeshift_core::{
    CollectionRef, Config, DecisionMap, MigrationError, MigrationReport, Migrator, Sampler,
    Summary,
};
use treeshift_store::MemoryStore;
use treeshift_tree::{Node, TreePath};
use warp::http::StatusCode;
use warp::hyper::body::{Buf, Bytes};
use warp::multipart::FormData;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
const MAX_BODY: u64 = 32 * 1024 * 1024;

/// Body of `POST /api/migrate`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MigrateRequest {
    json_data: Value,
    #[serde(default)]
    user_choices: BTreeMap<String, String>,
}

struct Shared {
    store: MemoryStore,
    target: Option<PathBuf>,
    config: Config,
    run_lock: Mutex<()>,
}

/// State shared by all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<Shared>,
}

impl AppState {
    pub(crate) fn new(store: MemoryStore, target: Option<PathBuf>, config: Config) -> Self {
        Self {
            inner: Arc::new(Shared {
                store,
                target,
                config,
                run_lock: Mutex::new(()),
            }),
        }
    }

    fn structure(&self, body: &[u8]) -> Result<Summary, MigrationError> {
        let tree = Node::from_slice(body)
            .map_err(|e| MigrationError::malformed(format!("upload is not valid JSON: {e}")))?;
        Ok(Sampler::new(self.inner.config.sampler).sample_node(&tree))
    }

    async fn migrate(&self, body: &[u8]) -> Result<MigrationReport, MigrationError> {
        let request: MigrateRequest = serde_json::from_slice(body)
            .map_err(|e| MigrationError::malformed(format!("invalid migrate request: {e}")))?;
        let decisions = DecisionMap::from_raw(request.user_choices)?;

        let _run = self.inner.run_lock.lock().await;
        let outcome = Migrator::new(self.inner.config.migration)
            .migrate_tree(
                Node::from(request.json_data),
                &self.inner.store,
                CollectionRef::root(),
                &decisions,
                TreePath::root(),
            )
            .await;

        if let Some(path) = &self.inner.target {
            if let Err(e) = self.inner.store.save(path).await {
                tracing::error!(file = %path.display(), error = %e, "failed to persist store");
                if outcome.is_ok() {
                    return Err(MigrationError::store_io(TreePath::root(), None, e));
                }
            }
        }
        outcome
    }
}

fn status_of(err: &MigrationError) -> StatusCode {
    match err {
        MigrationError::MalformedInput(_) => StatusCode::BAD_REQUEST,
        MigrationError::TypeClassification { .. }
        | MigrationError::MissingClassification { .. }
        | MigrationError::DepthExceeded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        MigrationError::StoreIo { .. } if err.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
        MigrationError::StoreIo { .. } | MigrationError::Config(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_reply(err: &MigrationError) -> Response {
    let status = status_of(err);
    tracing::warn!(status = status.as_u16(), error = %err, "request failed");
    let body = json!({
        "error": err.to_string(),
        "path": err.path().map(TreePath::render),
    });
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

async fn upload(body: Bytes, state: AppState) -> Result<Response, Infallible> {
    Ok(match state.structure(&body) {
        Ok(structure) => warp::reply::json(&json!({ "structure": structure })).into_response(),
        Err(e) => error_reply(&e),
    })
}

/// Contents of the `file` part of an upload form
async fn file_part(mut form: FormData) -> Result<Vec<u8>, MigrationError> {
    let malformed = |e: warp::Error| MigrationError::malformed(format!("invalid upload form: {e}"));
    while let Some(part) = form.try_next().await.map_err(malformed)? {
        if part.name() != "file" {
            continue;
        }
        return part
            .stream()
            .try_fold(Vec::new(), |mut data, mut buf| async move {
                while buf.has_remaining() {
                    let chunk = buf.chunk();
                    let n = chunk.len();
                    data.extend_from_slice(chunk);
                    buf.advance(n);
                }
                Ok(data)
            })
            .await
            .map_err(malformed);
    }
    Err(MigrationError::malformed("upload form has no 'file' part"))
}

async fn upload_form(form: FormData, state: AppState) -> Result<Response, Infallible> {
    let structure = match file_part(form).await {
        Ok(body) => state.structure(&body),
        Err(e) => Err(e),
    };
    Ok(match structure {
        Ok(structure) => warp::reply::json(&json!({ "structure": structure })).into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn migrate(body: Bytes, state: AppState) -> Result<Response, Infallible> {
    Ok(match state.migrate(&body).await {
        Ok(report) => warp::reply::json(&json!({
            "message": "Migration completed successfully!",
            "report": report,
        }))
        .into_response(),
        Err(e) => error_reply(&e),
    })
}

async fn store(state: AppState) -> Result<Response, Infallible> {
    Ok(warp::reply::json(&state.inner.store.snapshot()).into_response())
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes
pub(crate) fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let upload_form = warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::multipart::form().max_length(MAX_BODY))
        .and(with_state(state.clone()))
        .and_then(upload_form);

    let upload = warp::path!("api" / "upload")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(upload);

    let migrate = warp::path!("api" / "migrate")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .and_then(migrate);

    let store = warp::path!("api" / "store")
        .and(warp::get())
        .and(with_state(state))
        .and_then(store);

    upload_form
        .or(upload)
        .or(migrate)
        .or(store)
        .with(warp::trace::request())
}

/// Serve until ctrl-c
pub(crate) async fn serve(port: u16, state: AppState) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let (bound, server) = warp::serve(routes(state)).try_bind_with_graceful_shutdown(addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
        }
    })?;
    tracing::info!(addr = %bound, "Server running on port {}", bound.port());
    server.await;
    tracing::info!("server stopped");
    Ok(())
}
