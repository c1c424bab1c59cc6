//! Interview Proctoring API Server
//!
//! REST API for the interview UI: call lifecycle, live proctoring alerts and
//! stored feedback.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub mod settings;
mod routes;

pub use settings::{HttpConfig, LoggingConfig, ServerConfig, StorageConfig};

use alerting::ProctoringStatus;
use camera_capture::SyntheticCamera;
use interview::{CallStatus, InterviewError, LifecycleCoordinator, LoopbackSession};
use landmarks::FaceMeshLoader;
use storage::{FeedbackRepository, StorageError};

/// API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Interview(#[from] InterviewError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for ApiError {
    fn from(e: ::config::ConfigError) -> Self {
        ApiError::Config(e.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => ApiError::NotFound("record".to_string()),
            StorageError::InvalidRecord(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Interview(InterviewError::InvalidState(_)) => StatusCode::CONFLICT,
            ApiError::Interview(InterviewError::InvalidRequest(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Interview(InterviewError::Session(_)) => StatusCode::BAD_GATEWAY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub coordinator: LifecycleCoordinator,
    /// In-process voice session; also the injection point for session messages
    pub session: Arc<LoopbackSession>,
    pub repository: Arc<FeedbackRepository>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the collaborators described by `config`
    pub fn new(config: &ServerConfig) -> Self {
        let camera = Arc::new(SyntheticCamera::new());
        let loader = Arc::new(FaceMeshLoader::new(config.model.clone()));
        let session = Arc::new(LoopbackSession::new());
        let repository = Arc::new(FeedbackRepository::with_capacity(config.storage.max_feedback_records));
        let coordinator = LifecycleCoordinator::new(
            config.coordinator.clone(),
            camera,
            loader,
            session.clone(),
            repository.clone(),
        );

        Self {
            coordinator,
            session,
            repository,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: ComponentStatus,
    pub metrics: SystemMetrics,
}

/// Component status
#[derive(Debug, Serialize)]
pub struct ComponentStatus {
    pub call: CallStatus,
    pub proctoring: ProctoringStatus,
}

/// System metrics
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemMetrics {
    pub feedback_count: usize,
    pub session_listeners: usize,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/call", get(routes::call::get_call))
        .route("/api/v1/call/start", post(routes::call::start_call))
        .route("/api/v1/call/stop", post(routes::call::stop_call))
        .route("/api/v1/call/message", post(routes::call::post_message))
        .route("/api/v1/call/remote-end", post(routes::call::remote_end))
        .route("/api/v1/proctoring", get(routes::proctoring::get_proctoring))
        .route("/api/v1/feedback/:id", get(routes::feedback::get_feedback))
        .route(
            "/api/v1/interviews/:id/feedback",
            get(routes::feedback::list_for_interview),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        components: ComponentStatus {
            call: state.coordinator.status(),
            proctoring: state.coordinator.board().snapshot().status,
        },
        metrics: SystemMetrics {
            feedback_count: state.repository.count(),
            session_listeners: state.session.listener_count(),
        },
    };

    Json(response)
}

/// Initialize logging
pub fn init_logging(config: &LoggingConfig) -> Result<(), ApiError> {
    let level: Level = config
        .level
        .parse()
        .map_err(|_| ApiError::Config(format!("invalid log level '{}'", config.level)))?;

    let builder = FmtSubscriber::builder().with_max_level(level).with_target(true);
    let result = if config.json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    result.map_err(|e| ApiError::Logging(e.to_string()))
}

/// Run the server until Ctrl-C, then end any call still in progress
pub async fn run_server(config: ServerConfig) -> Result<(), ApiError> {
    let state = Arc::new(AppState::new(&config));
    let coordinator = state.coordinator.clone();
    let app = create_router(state);

    info!("Starting API server on {}", config.server.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        })
        .await?;

    if matches!(coordinator.status(), CallStatus::Connecting | CallStatus::Active) {
        coordinator.stop_call().await;
    }
    Ok(())
}
