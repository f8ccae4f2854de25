use crate::catalog::{Catalog, CatalogError, CatalogRef, CatalogSummary};
use crate::conversation::{ConversationError, ConversationManager};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use coach_core::config::ServerConfig;
use coach_core::errors::CompletionError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Application state shared with all routes
#[derive(Clone)]
pub struct AppState {
    conversations: Arc<ConversationManager>,
    catalog: CatalogRef,
}

impl AppState {
    pub fn new(conversations: ConversationManager, catalog: CatalogRef) -> Self {
        Self {
            conversations: Arc::new(conversations),
            catalog,
        }
    }
}

/// Request model for the initial analysis
#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub resume: String,
    pub job_description: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

/// Request model for a follow-up turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ItemContentResponse {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Error type for HTTP server
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Validation(message) => {
                debug!(error = %message, "Rejected request");
                (StatusCode::BAD_REQUEST, message)
            }
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::ServiceUnavailable(message) => (StatusCode::SERVICE_UNAVAILABLE, message),
            Self::Internal(e) => {
                error!(error = ?e, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<ConversationError> for ApiError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Validation(message) => Self::Validation(message),
            ConversationError::NotFound(_) => Self::NotFound(
                "Session not found or expired. Please start a new analysis.".to_string(),
            ),
            ConversationError::Completion(e) => {
                warn!(kind = e.kind(), "Completion service unavailable");
                Self::ServiceUnavailable(match e {
                    CompletionError::Unconfigured(_) => {
                        "LLM service is unavailable. Check API Key configuration.".to_string()
                    }
                    CompletionError::Upstream(_) | CompletionError::Timeout => {
                        "LLM service is temporarily unavailable. Please try again later."
                            .to_string()
                    }
                })
            }
            ConversationError::Store(e) => Self::Internal(e.into()),
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Build the router for the four recognized operations
pub fn app_router(state: AppState, cors: bool) -> Router {
    let router = Router::new()
        .route("/analyze", post(analyze).fallback(not_found))
        .route("/chat", post(chat).fallback(not_found))
        .route("/items", get(list_items).fallback(not_found))
        .route("/items/:id", get(get_item).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Start the HTTP server and run until Ctrl-C
pub async fn run_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = app_router(state, config.cors);

    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.http_addr, e))?;
    info!("Starting HTTP server on {}", config.http_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server failed: {}", e))
}

/// Handler for the initial analysis
async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let Json(request) = payload?;

    let created = state
        .conversations
        .create_session(&request.resume, &request.job_description)
        .await?;

    Ok(Json(AnalyzeResponse {
        analysis: created.initial_feedback,
        session_id: created.session_id,
    }))
}

/// Handler for follow-up questions
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = payload?;

    let answer = state
        .conversations
        .continue_session(&request.session_id, &request.question)
        .await?;

    Ok(Json(ChatResponse { answer }))
}

async fn list_items(State(state): State<AppState>) -> Result<Json<Vec<CatalogSummary>>, ApiError> {
    Ok(Json(state.catalog.list().await?))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ItemContentResponse>, ApiError> {
    match state.catalog.get(&id).await? {
        Some(item) => Ok(Json(ItemContentResponse {
            id: item.id,
            content: item.content,
        })),
        None => {
            warn!(item_id = %id, "Catalog item not found");
            Err(ApiError::NotFound(format!(
                "Default item content not found for ID: {}",
                id
            )))
        }
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}
