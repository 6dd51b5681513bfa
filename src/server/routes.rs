//! Route handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use super::{ApiError, AppState};
use crate::credentials::{DeleteApiRequest, StoreApiRequest};
use crate::error::IntegrationError;
use crate::integrations::github::{DeployRequest, status_report_file};
use crate::integrations::gmail::check_inbox;
use crate::pipeline::ChatInput;
use crate::pipeline::responder::EMPTY_MESSAGE;
use crate::store::traits::Collection;

const MEMORY_LIMIT: usize = 10;
const INCOMING_LIMIT: usize = 50;

/// Build the Axum router with every API route.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/status", get(status))
        .route("/requests/{id}", get(get_request))
        .route("/memory", get(memory))
        .route("/incoming-requests", get(incoming_requests))
        .route("/store-api", post(store_api))
        .route("/delete-api", post(delete_api))
        .route("/brain-apis", get(brain_apis))
        .route("/gmail-check", post(gmail_check))
        .route("/github-deploy", post(github_deploy))
        .route("/check-system", get(check_system))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Info ────────────────────────────────────────────────────────────────

async fn index() -> impl IntoResponse {
    Json(json!({
        "name": "سُروح",
        "message": "نظام سُروح شغال. أهلاً أبو شام!",
        "version": env!("CARGO_PKG_VERSION"),
        "flow": ["secretary", "brain", "smart_core", "bots"],
    }))
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "surooh"
    }))
}

async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let ai = state.secretary.brain_enabled();
    Json(json!({
        "status": "active",
        "secretary": true,
        "brain": ai,
        "smart_core": ai,
        "bots": ai,
        "storage": state.store.backend_name(),
        "gmail": state.gmail.is_some(),
        "github": state.github.is_some(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Chat and records ────────────────────────────────────────────────────

async fn chat(
    State(state): State<AppState>,
    Json(input): Json<ChatInput>,
) -> Result<impl IntoResponse, ApiError> {
    if input.message.trim().is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "response": EMPTY_MESSAGE,
                "error": "message is required",
            })),
        )
            .into_response());
    }

    let reply = state.secretary.process(input).await?;
    Ok(Json(reply).into_response())
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    match state.store.get(Collection::BrainAnalysis, &id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::NotFound("Request not found".into())),
    }
}

async fn memory(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let requests = state.store.list(Collection::Requests, MEMORY_LIMIT).await?;
    let analyses = state
        .store
        .list(Collection::BrainAnalysis, MEMORY_LIMIT)
        .await?;
    Ok(Json(json!({
        "storage": state.store.backend_name(),
        "total_requests": state.store.count(Collection::Requests).await?,
        "total_analyses": state.store.count(Collection::BrainAnalysis).await?,
        "requests": requests,
        "analyses": analyses,
    })))
}

async fn incoming_requests(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let requests = state.store.list(Collection::Requests, INCOMING_LIMIT).await?;
    Ok(Json(json!({
        "success": true,
        "total": state.store.count(Collection::Requests).await?,
        "requests": requests,
    })))
}

// ── Stored credentials ──────────────────────────────────────────────────

async fn store_api(
    State(state): State<AppState>,
    Json(body): Json<StoreApiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state.credentials.store(body).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("تم حفظ {} API في النظام", record.api_type),
        "api_id": record.id,
    })))
}

async fn delete_api(
    State(state): State<AppState>,
    Json(body): Json<DeleteApiRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.credentials.delete(&body.api_id).await?;
    let api_type = body.api_type.as_deref().unwrap_or("الـ");
    Ok(Json(json!({
        "success": true,
        "message": format!("تم حذف {api_type} API من النظام"),
    })))
}

async fn brain_apis(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let apis = state.credentials.list().await?;
    Ok(Json(json!({
        "success": true,
        "total": apis.len(),
        "stored_apis": apis,
    })))
}

// ── Integrations ────────────────────────────────────────────────────────

async fn gmail_check(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let config = state.gmail.as_ref().ok_or_else(|| IntegrationError::NotConfigured {
        integration: "Gmail".into(),
    })?;
    let inbox = check_inbox(config).await?;
    Ok(Json(json!({
        "success": true,
        "message": "تم قراءة Gmail بنجاح!",
        "gmail_address": inbox.gmail_address,
        "total_emails": inbox.total_emails,
        "emails": inbox.emails,
    })))
}

/// An empty body uploads a status report.
async fn github_deploy(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let github = state.github.as_ref().ok_or_else(|| IntegrationError::NotConfigured {
        integration: "GitHub".into(),
    })?;

    let request: DeployRequest = if body.iter().all(u8::is_ascii_whitespace) {
        DeployRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("Invalid deploy request: {e}")))?
    };

    let files = match request.files {
        Some(files) if !files.is_empty() => files,
        _ => vec![status_report_file(Utc::now())],
    };
    info!(files = files.len(), "GitHub deploy requested");

    let report = github.deploy(files, request.message.as_deref()).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(report)))
}

#[derive(Debug, Deserialize)]
struct CheckSystemQuery {
    port: Option<u16>,
}

/// Probe a local HTTP service.
async fn check_system(
    State(state): State<AppState>,
    Query(query): Query<CheckSystemQuery>,
) -> impl IntoResponse {
    let port = query.port.unwrap_or(state.port);
    let url = format!("http://localhost:{port}/");

    let (active, http_status) = match state.probe.get(&url).send().await {
        Ok(response) => (true, Some(response.status().as_u16())),
        Err(e) => {
            debug!(port, error = %e, "Probe failed");
            (false, None)
        }
    };

    Json(json!({
        "port": port,
        "status": if active { "active" } else { "inactive" },
        "http_status": http_status,
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::SuroohConfig;
    use crate::store::memory::MemoryStore;

    fn app() -> Router {
        let config = SuroohConfig::from_lookup(&|_| None).unwrap();
        let state = AppState::new(&config, Arc::new(MemoryStore::new()), None).unwrap();
        api_routes(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn status_reports_disabled_features() {
        let (status, body) = send(app(), Request::get("/status").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "active");
        assert_eq!(body["secretary"], true);
        assert_eq!(body["brain"], false);
        assert_eq!(body["storage"], "memory");
        assert_eq!(body["gmail"], false);
    }

    #[tokio::test]
    async fn empty_chat_message_is_bad_request() {
        let (status, body) = send(app(), post_json("/chat", json!({ "message": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["response"], EMPTY_MESSAGE);
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let (status, body) = send(
            app(),
            Request::get("/requests/12345").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Request not found");
    }

    #[tokio::test]
    async fn unconfigured_integrations_are_unavailable() {
        let (status, body) = send(app(), post_json("/gmail-check", json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Gmail is not configured");

        let (status, _) = send(app(), post_json("/github-deploy", json!({}))).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn delete_unknown_credential_is_not_found() {
        let (status, body) = send(
            app(),
            post_json("/delete-api", json!({ "apiId": "missing", "apiType": "openai" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn store_api_without_key_is_bad_request() {
        let (status, _) = send(
            app(),
            post_json("/store-api", json!({ "apiType": "openai", "endpoint": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cors_headers_are_present() {
        let response = app()
            .oneshot(
                Request::get("/health")
                    .header("origin", "http://dashboard.local")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "*"
        );
    }
}
