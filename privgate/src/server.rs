// privgate/src/server.rs
//! The HTTP control API.
//!
//! A thin layer over the engine: every route delegates to `privgate-core`
//! and maps its errors onto HTTP statuses. `StorageUnavailable` surfaces as
//! 503 so ingest clients know to hold the file and retry rather than drop it.
//!
//! License: MIT OR Apache-2.0

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use base64::prelude::{Engine, BASE64_STANDARD};
use log::{error, info};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use privgate_core::{
    AuditFilter, FileMetadata, IngestionPipeline, OwnerIdentity, PrivacyError, PrivacyLevel,
    PrivacyRule, StatsSnapshot,
};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IngestionPipeline>,
}

/// An API failure: HTTP status plus a JSON error body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<PrivacyError> for ApiError {
    fn from(err: PrivacyError) -> Self {
        let status = match &err {
            PrivacyError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PrivacyError::RuleNotFound(_) => StatusCode::NOT_FOUND,
            PrivacyError::InvalidGlob(_, _)
            | PrivacyError::InvalidLevel(_)
            | PrivacyError::InvalidOwner(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Internal error serving request: {err}");
        }
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Builds the control-API router over a shared pipeline.
pub fn build_router(pipeline: Arc<IngestionPipeline>) -> Router {
    let state = AppState { pipeline };
    // The control panel is served from another origin on the same host.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/audit", get(query_audit))
        .route("/audit/offline", put(set_offline))
        .route("/audit/prune", post(prune_audit))
        .route("/rules", get(list_rules).post(create_rule))
        .route("/rules/{id}", put(update_rule))
        .route("/overrides", get(list_overrides))
        .route("/overrides/{*path}", put(put_override).delete(delete_override))
        .route("/ingest", post(ingest))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    run_id: String,
    audit_offline: bool,
    last_audit_id: u64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let audit = state.pipeline.audit();
    Json(HealthResponse {
        status: "ok",
        run_id: state.pipeline.run_id().to_string(),
        audit_offline: audit.is_offline(),
        last_audit_id: audit.last_id(),
    })
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.pipeline.stats())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AuditQuery {
    /// Exclusive id cursor.
    since: Option<u64>,
    path: Option<String>,
    owner: Option<String>,
    /// Minimum level, e.g. `RESTRICTED`.
    level: Option<String>,
    limit: Option<usize>,
}

async fn query_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<privgate_core::AuditRecord>>, ApiError> {
    let owner = query
        .owner
        .as_deref()
        .map(str::parse::<OwnerIdentity>)
        .transpose()?;
    let min_level = query
        .level
        .as_deref()
        .map(str::parse::<PrivacyLevel>)
        .transpose()?;
    let filter = AuditFilter {
        since_id: query.since,
        path: query.path,
        owner,
        min_level,
        limit: query.limit,
    };
    Ok(Json(state.pipeline.audit().query(&filter)?))
}

#[derive(Deserialize)]
struct OfflineRequest {
    offline: bool,
}

async fn set_offline(
    State(state): State<AppState>,
    Json(request): Json<OfflineRequest>,
) -> StatusCode {
    state.pipeline.audit().set_offline(request.offline);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct PruneRequest {
    /// Records older than this many hours are removed.
    older_than_hours: i64,
}

#[derive(Serialize)]
struct PruneResponse {
    removed: usize,
}

async fn prune_audit(
    State(state): State<AppState>,
    Json(request): Json<PruneRequest>,
) -> Result<Json<PruneResponse>, ApiError> {
    if request.older_than_hours < 0 {
        return Err(ApiError::bad_request("older_than_hours must be non-negative"));
    }
    let cutoff = chrono::Utc::now() - chrono::Duration::hours(request.older_than_hours);
    let removed = state.pipeline.audit().prune_older_than(cutoff)?;
    Ok(Json(PruneResponse { removed }))
}

#[derive(Serialize)]
struct RulesResponse {
    rules: Vec<PrivacyRule>,
}

async fn list_rules(State(state): State<AppState>) -> Json<RulesResponse> {
    Json(RulesResponse { rules: state.pipeline.policy().rules() })
}

#[derive(Deserialize)]
struct RuleRequest {
    pattern: String,
    level: PrivacyLevel,
    #[serde(default)]
    priority: i32,
}

async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<RuleRequest>,
) -> Result<(StatusCode, Json<PrivacyRule>), ApiError> {
    let rule = state
        .pipeline
        .policy()
        .add_rule(&request.pattern, request.level, request.priority)?;
    Ok((StatusCode::CREATED, Json(rule)))
}

async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<RuleRequest>,
) -> Result<Json<PrivacyRule>, ApiError> {
    let rule = state
        .pipeline
        .policy()
        .update_rule(id, &request.pattern, request.level, request.priority)?;
    Ok(Json(rule))
}

async fn list_overrides(
    State(state): State<AppState>,
) -> Json<std::collections::HashMap<String, PrivacyLevel>> {
    Json(state.pipeline.policy().overrides())
}

#[derive(Deserialize)]
struct OverrideRequest {
    level: PrivacyLevel,
}

/// Wildcard captures arrive without their leading slash; override keys are
/// absolute paths.
fn absolute(path: String) -> String {
    if path.starts_with('/') {
        path
    } else {
        format!("/{path}")
    }
}

async fn put_override(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Json(request): Json<OverrideRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .pipeline
        .policy()
        .set_override(&absolute(path), request.level)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_override(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.pipeline.policy().clear_override(&absolute(path))? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

/// Content arrives either as `content` (text) or `content_b64` (arbitrary
/// bytes, base64); exactly one must be present. Binary files only survive
/// the JSON transport in the base64 form.
#[derive(Deserialize)]
struct IngestRequest {
    path: String,
    content: Option<String>,
    content_b64: Option<String>,
    #[serde(default)]
    metadata: FileMetadata,
}

impl IngestRequest {
    fn decode_content(&self) -> Result<Vec<u8>, ApiError> {
        match (&self.content, &self.content_b64) {
            (Some(text), None) => Ok(text.clone().into_bytes()),
            (None, Some(encoded)) => BASE64_STANDARD
                .decode(encoded)
                .map_err(|e| ApiError::bad_request(format!("invalid content_b64: {e}"))),
            _ => Err(ApiError::bad_request(
                "exactly one of `content` and `content_b64` is required",
            )),
        }
    }
}

#[derive(Serialize)]
struct IngestResponse {
    audit_id: u64,
    owner: OwnerIdentity,
    level: PrivacyLevel,
    action: privgate_core::Action,
    detections: usize,
    /// Lossy text rendering of the transformed bytes.
    content: String,
    /// Exact transformed bytes, base64.
    content_b64: String,
}

async fn ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    let content = request.decode_content()?;
    let result = state
        .pipeline
        .process(&request.path, &request.metadata, &content)?;
    info!(
        "Ingested {}: owner={} level={} action={}.",
        request.path, result.owner, result.level, result.action
    );
    Ok(Json(IngestResponse {
        audit_id: result.audit_id,
        owner: result.owner,
        level: result.level,
        action: result.action,
        detections: result.detections,
        content: String::from_utf8_lossy(&result.transformed).into_owned(),
        content_b64: BASE64_STANDARD.encode(&result.transformed),
    }))
}
