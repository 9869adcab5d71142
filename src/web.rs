//! The single-page web surface.
//!
//! One [`Session`] is shared by every request. Downloads run on their own task so a
//! closed browser tab does not cancel them, and progress is published through a
//! `watch` channel that `/api/progress` reads without touching the session lock.

use crate::error::{DownloadError, ExtractionError};
use crate::metadata::{self, LookupResult};
use crate::orchestrator;
use crate::progress::{ProgressPipeline, ProgressSnapshot};
use crate::session::Session;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use vidgrab_extractor::Extractor;

const INDEX_HTML: &str = include_str!("../assets/index.html");

pub const MUXER_MISSING: &str = "FFmpeg not found. Merging capabilities are limited.";

#[derive(Clone)]
pub struct AppState {
    service: Arc<dyn Extractor>,
    session: Arc<Mutex<Session>>,
    progress: Arc<watch::Sender<ProgressSnapshot>>,
    progress_rx: watch::Receiver<ProgressSnapshot>,
    muxer: Option<PathBuf>,
}

impl AppState {
    pub fn new(service: Arc<dyn Extractor>, muxer: Option<PathBuf>) -> Self {
        let (progress, progress_rx) = watch::channel(ProgressSnapshot::default());

        Self {
            service,
            session: Arc::new(Mutex::new(Session::new())),
            progress: Arc::new(progress),
            progress_rx,
            muxer,
        }
    }

    async fn run_download(&self, url: String) -> Result<DownloadResponse, DownloadError> {
        let mut pipeline = ProgressPipeline::new(&*self.progress);
        let outcome = orchestrator::run_download(
            self.service.as_ref(),
            &url,
            self.muxer.as_deref(),
            &mut pipeline,
        )
        .await;

        let mut session = self.session.lock().await;
        let artifact = session.finish_download(&mut pipeline, outcome)?;

        Ok(DownloadResponse {
            file_name: artifact.file_name.clone(),
            size: artifact.size(),
        })
    }

    /// Releases the download slot after the download task died without reporting back.
    async fn abandon_download(&self, failure: tokio::task::JoinError) -> ApiError {
        let message = format!("download task failed: {}", failure);
        error!("{}", message);

        let mut pipeline = ProgressPipeline::new(&*self.progress);
        let mut session = self.session.lock().await;
        let outcome = Err(DownloadError::Service(message.clone()));
        let _ = session.finish_download(&mut pipeline, outcome);

        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(error: DownloadError) -> Self {
        let status = match error {
            DownloadError::Busy => StatusCode::CONFLICT,
            DownloadError::NoLookup => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, error.to_string())
    }
}

impl From<ExtractionError> for ApiError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Busy => Self::new(StatusCode::CONFLICT, error.to_string()),
            other => {
                warn!("Metadata lookup failed: {}", other);
                Self::new(StatusCode::UNPROCESSABLE_ENTITY, ExtractionError::USER_MESSAGE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Serialize)]
struct StatusResponse {
    ffmpeg_found: bool,
    ffmpeg_path: Option<PathBuf>,
    warning: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    url: String,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    #[serde(flatten)]
    lookup: LookupResult,
    duration_label: String,
    views_label: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct DownloadResponse {
    file_name: String,
    size: usize,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/search", post(search))
        .route("/api/download", post(download))
        .route("/api/progress", get(progress))
        .route("/api/file", get(file))
        .with_state(state)
}

/// Serves the web UI on `bind` until Ctrl+C.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        ffmpeg_found: state.muxer.is_some(),
        ffmpeg_path: state.muxer.clone(),
        warning: state.muxer.is_none().then_some(MUXER_MISSING),
    })
}

async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    if state.session.lock().await.in_flight() {
        return Err(ExtractionError::Busy.into());
    }

    let fetched = metadata::fetch(state.service.as_ref(), &request.url).await;
    let lookup = state
        .session
        .lock()
        .await
        .finish_search(&request.url, fetched)?
        .clone();
    state.progress.send_replace(ProgressSnapshot::default());

    Ok(Json(SearchResponse {
        duration_label: lookup.duration_label(),
        views_label: lookup.views_label(),
        lookup,
    }))
}

async fn download(State(state): State<AppState>) -> ApiResult<Json<DownloadResponse>> {
    let url = state.session.lock().await.begin_download()?;

    let task_state = state.clone();
    let task = tokio::spawn(async move { task_state.run_download(url).await });

    match task.await {
        Ok(result) => Ok(Json(result?)),
        Err(e) => Err(state.abandon_download(e).await),
    }
}

async fn progress(State(state): State<AppState>) -> Json<ProgressSnapshot> {
    Json(state.progress_rx.borrow().clone())
}

async fn file(State(state): State<AppState>) -> ApiResult<Response> {
    let session = state.session.lock().await;
    let artifact = session
        .artifact()
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "nothing has been downloaded yet"))?;

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("video/mp4"));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.file_name.replace(['"', '\\'], "_")
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((StatusCode::OK, headers, artifact.bytes.clone()).into_response())
}
