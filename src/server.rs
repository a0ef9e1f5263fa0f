//! HTTP API for document question answering.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Service banner, version, and endpoint list |
//! | `GET`  | `/health` | Liveness check |
//! | `GET`  | `/health/detailed` | Component status; initializes the service if needed |
//! | `GET`  | `/test` | Builds and searches a two-passage index |
//! | `POST` | `/hackrx/run` | Answer questions about a document (bearer auth) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "questions must not be empty" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::pipeline::QueryService;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    service: Arc<QueryService>,
    /// Bearer token required by `POST /hackrx/run`.
    api_token: Arc<str>,
}

impl AppState {
    pub fn new(service: Arc<QueryService>, api_token: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            api_token: api_token.into(),
        }
    }
}

/// Starts the HTTP server on `[server].bind`.
///
/// Refuses to start without an API token, so the query endpoint is never
/// served unauthenticated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let api_token = config
        .server
        .api_token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("server.api_token (or DOCQUERY_API_TOKEN) must be set to serve")
        })?;
    let bind_addr = config.server.bind.clone();
    let service = Arc::new(QueryService::new(config.clone())?);

    let app = build_router(AppState::new(service, api_token));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        backend = %config.retrieval.backend,
        "docquery server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/health/detailed", get(handle_health_detailed))
        .route("/test", get(handle_self_test))
        .route("/hackrx/run", post(handle_run))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid or missing API token")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("error processing queries: {0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message: self.to_string(),
            },
        };
        if matches!(self, ApiError::Unauthorized) {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], Json(body)).into_response()
        } else {
            (status, Json(body)).into_response()
        }
    }
}

fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    match token {
        Some(token) if token == expected => Ok(()),
        _ => Err(ApiError::Unauthorized),
    }
}

// ============ GET / ============

async fn handle_root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Document query-retrieval service is running",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "detailed_health": "/health/detailed",
            "self_test": "/test",
            "main_api": "/hackrx/run",
        }
    }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    message: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        message: "System is operational",
    })
}

// ============ GET /health/detailed ============

async fn handle_health_detailed(State(state): State<AppState>) -> Json<serde_json::Value> {
    let config = state.service.config();
    let components = |initialized: bool| {
        serde_json::json!({
            "server": "running",
            "system_initialized": initialized,
            "backend": config.retrieval.backend,
            "embedding_provider": config.embedding.provider,
            "answer_provider": config.answer.provider,
        })
    };

    match state.service.ensure_ready().await {
        Ok(()) => Json(serde_json::json!({
            "status": "healthy",
            "components": components(true),
        })),
        Err(e) => {
            tracing::error!(error = %e, "service initialization failed");
            let mut detail = components(false);
            detail["error_details"] = serde_json::Value::String(format!("{:#}", e));
            Json(serde_json::json!({
                "status": "unhealthy",
                "error": e.to_string(),
                "components": detail,
            }))
        }
    }
}

// ============ GET /test ============

async fn handle_self_test(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.service.self_test().await {
        Ok(report) => Json(serde_json::json!({
            "status": "success",
            "message": "System test completed successfully",
            "test_results": report,
        })),
        Err(e) => Json(serde_json::json!({
            "status": "error",
            "message": format!("System test failed: {:#}", e),
        })),
    }
}

// ============ POST /hackrx/run ============

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub documents: String,
    pub questions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answers: Vec<String>,
}

/// Handler for `POST /hackrx/run`.
///
/// Returns one answer per question, in question order. Document problems
/// surface as placeholder-driven answers rather than errors.
async fn handle_run(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    authorize(&headers, &state.api_token)?;

    if request.documents.trim().is_empty() {
        return Err(ApiError::BadRequest("documents must not be empty".to_string()));
    }
    if request.questions.is_empty() {
        return Err(ApiError::BadRequest("questions must not be empty".to_string()));
    }

    let answers = state
        .service
        .answer(&request.documents, &request.questions)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "query processing failed");
            ApiError::Internal(format!("{:#}", e))
        })?;

    Ok(Json(QueryResponse { answers }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize() {
        let mut headers = HeaderMap::new();
        assert!(authorize(&headers, "secret").is_err());
        headers.insert(header::AUTHORIZATION, "Bearer wrong".parse().unwrap());
        assert!(authorize(&headers, "secret").is_err());
        headers.insert(header::AUTHORIZATION, "Basic secret".parse().unwrap());
        assert!(authorize(&headers, "secret").is_err());
        headers.insert(header::AUTHORIZATION, "Bearer secret".parse().unwrap());
        assert!(authorize(&headers, "secret").is_ok());
    }

    #[test]
    fn test_unauthorized_response_shape() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[tokio::test]
    async fn test_serve_requires_token() {
        let config = Config::default();
        let err = run_server(&config).await.unwrap_err();
        assert!(err.to_string().contains("api_token"));
    }
}
