use crate::{
    app::{AppError, HighlightService, SearchRequest},
    config::ServerConfig,
    highlights::{HighlightPage, SearchResult},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Multipart, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::signal;

/// Multipart field carrying the CSV file.
const UPLOAD_FIELD: &str = "file";

#[derive(Clone)]
struct SharedState {
    service: Arc<HighlightService>,
}

pub fn router(service: Arc<HighlightService>, server: &ServerConfig) -> Router {
    let shared_state = Arc::new(SharedState { service });

    Router::new()
        .route("/", get(root))
        .route("/highlights", post(store_highlights).get(list_highlights))
        .route("/highlights/count", get(count_highlights))
        .route("/highlights/clear", delete(clear_highlights))
        .route("/search", post(search))
        .layer(DefaultBodyLimit::max(server.max_upload_bytes))
        .layer(tower_http::cors::CorsLayer::very_permissive())
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutting down");
}

async fn start_app(service: Arc<HighlightService>, server: ServerConfig) -> anyhow::Result<()> {
    let app = router(service, &server);

    let listener = tokio::net::TcpListener::bind(&server.listen).await?;
    log::info!("listening on {}", server.listen);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Run the HTTP server until a shutdown signal arrives.
pub fn start_daemon(service: HighlightService, server: ServerConfig) -> anyhow::Result<()> {
    // keep a handle outside the runtime so the blocking HTTP client is
    // dropped after the runtime is gone
    let service = Arc::new(service);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(start_app(service.clone(), server));
    drop(runtime);

    result
}

/// Error response carrying the action that failed, e.g. "storing highlights".
#[derive(Debug)]
struct HttpError {
    error: AppError,
    action: Option<&'static str>,
}

impl HttpError {
    /// Attach the failed action to internal errors of a handler.
    fn during(action: &'static str) -> impl Fn(AppError) -> HttpError {
        move |error| HttpError {
            error,
            action: Some(action),
        }
    }
}

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> axum::response::Response {
        let (status, detail) = match &self.error {
            AppError::NotFound => (StatusCode::NOT_FOUND, self.error.to_string()),
            err if err.is_client_error() => (StatusCode::BAD_REQUEST, err.to_string()),
            err => {
                log::error!("{} failed: {err:?}", self.action.unwrap_or("request"));
                let detail = match self.action {
                    Some(action) => format!("Error {action}: {err}"),
                    None => err.to_string(),
                };
                (StatusCode::INTERNAL_SERVER_ERROR, detail)
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl<E> From<E> for HttpError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        Self {
            error: err.into(),
            action: None,
        }
    }
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "Highlights API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "POST /highlights": "Store highlights with embeddings",
            "POST /search": "Perform semantic search on highlights",
            "GET /highlights": "List stored highlights with pagination",
            "GET /highlights/count": "Count stored highlights",
            "DELETE /highlights/clear": "Delete all stored highlights",
        },
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreResponse {
    pub message: String,
    pub count: usize,
}

async fn store_highlights(
    State(state): State<Arc<SharedState>>,
    mut multipart: Multipart,
) -> Result<Json<StoreResponse>, HttpError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::InvalidUpload(err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::InvalidUpload(err.body_text()))?;
        upload = Some((filename, data));
    }

    let (filename, data) = upload.ok_or_else(|| {
        AppError::InvalidUpload(format!("missing multipart field '{UPLOAD_FIELD}'"))
    })?;

    log::debug!("upload: {filename} ({} bytes)", data.len());

    let service = state.service.clone();
    let count = tokio::task::block_in_place(move || service.import_csv(&filename, &data))
        .map_err(HttpError::during("storing highlights"))?;

    Ok(Json(StoreResponse {
        message: format!("Successfully stored {count} highlights"),
        count,
    }))
}

async fn search(
    State(state): State<Arc<SharedState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<SearchResult>>, HttpError> {
    let Json(payload) = payload.map_err(|err| AppError::InvalidRequest(err.body_text()))?;
    log::debug!("payload: {payload:?}");

    let service = state.service.clone();
    tokio::task::block_in_place(move || service.search(payload))
        .map(Json)
        .map_err(HttpError::during("performing search"))
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_page_limit")]
    pub limit: usize,
}

fn default_page_limit() -> usize {
    10
}

async fn list_highlights(
    State(state): State<Arc<SharedState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<HighlightPage>, HttpError> {
    let Query(params) = params.map_err(|err| AppError::InvalidRequest(err.body_text()))?;
    let service = state.service.clone();
    tokio::task::block_in_place(move || service.list(params.skip, params.limit))
        .map(Json)
        .map_err(HttpError::during("listing highlights"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

async fn count_highlights(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<CountResponse>, HttpError> {
    let service = state.service.clone();
    tokio::task::block_in_place(move || service.count())
        .map(|count| Json(CountResponse { count }))
        .map_err(HttpError::during("counting highlights"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn clear_highlights(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<MessageResponse>, HttpError> {
    let service = state.service.clone();
    tokio::task::block_in_place(move || service.clear())
        .map_err(HttpError::during("clearing highlights"))?;

    Ok(Json(MessageResponse {
        message: "All highlights cleared successfully".to_string(),
    }))
}
