//! REST and SSE handlers for the dashboard
//!
//! Lead CRUD, the emission control endpoints, stats, health, metrics and
//! the `/api/events` observer stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};

use crate::broadcast::{BroadcastHub, LeadEvent};
use crate::error::{Error, ErrorCategory, LeadPulseErrorTrait};
use crate::metrics;
use crate::models::{Lead, LeadQuery, LeadSource, LeadUpdate, NewLead, PropertyType};
use crate::storage::StorageError;

use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub is_fetching: bool,
    pub observers: usize,
}

/// Handler failure rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(err.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        if let Error::Storage(StorageError::NotFound { .. }) = &self.0 {
            return StatusCode::NOT_FOUND;
        }
        match self.0.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                category = self.0.category().as_str(),
                recoverable = self.0.is_recoverable(),
                error = %self.0,
                "request failed"
            );
        }
        (status, Json(ErrorResponse::new(self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Lead endpoints
        .route("/api/leads", get(list_leads).post(create_lead))
        .route(
            "/api/leads/{id}",
            get(get_lead).put(update_lead).delete(delete_lead),
        )
        .route("/api/test-db", get(test_db))
        // Emission control
        .route("/api/start-fetching", post(start_fetching))
        .route("/api/stop-fetching", post(stop_fetching))
        .route("/api/fetching-status", get(fetching_status))
        // Observers
        .route("/api/events", get(event_stream))
        // Dashboard
        .route("/api/stats", get(get_stats))
        .route("/api/health", get(health_check))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

// ============================================================================
// Lead Handlers
// ============================================================================

async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<LeadQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = state.repository.list(&query).await?;
    Ok(Json(page))
}

async fn create_lead(
    State(state): State<AppState>,
    Json(request): Json<NewLead>,
) -> ApiResult<impl IntoResponse> {
    let lead = request.into_lead().map_err(StorageError::Validation)?;
    state.repository.insert(&lead).await?;
    tracing::info!(id = %lead.id, name = %lead.name, "lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Lead>> {
    state
        .repository
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| StorageError::not_found(id).into())
}

async fn update_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<LeadUpdate>,
) -> ApiResult<Json<Lead>> {
    let lead = state.repository.update(&id, update).await?;
    tracing::info!(id = %lead.id, "lead updated");
    Ok(Json(lead))
}

async fn delete_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state.repository.delete(&id).await? {
        return Err(StorageError::not_found(id).into());
    }
    tracing::info!(%id, "lead deleted");
    Ok(Json(ApiResponse::success(json!({ "id": id }))))
}

/// Write, read back and delete a probe record
async fn test_db(State(state): State<AppState>) -> Response {
    let mut probe = Lead::new("Test Lead", "1234567890");
    probe.address = "Test Address".to_string();
    probe.city = "Test City".to_string();
    probe.source = LeadSource::Website;
    probe.price = 1_000_000.0;
    probe.property_type = PropertyType::Apartment;
    probe.locality = "Test Locality".to_string();

    let outcome = async {
        state.repository.insert(&probe).await?;
        let saved = state.repository.get(&probe.id).await?;
        state.repository.delete(&probe.id).await?;
        Ok::<_, StorageError>(saved)
    }
    .await;

    match outcome {
        Ok(saved) => Json(json!({
            "status": "success",
            "message": "Database connection is working",
            "testData": saved,
        }))
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "database self-test failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "error",
                    "message": "Database connection failed",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Emission Control Handlers
// ============================================================================

async fn start_fetching(State(state): State<AppState>) -> impl IntoResponse {
    let was_enabled = state.context.set_enabled(true);
    tracing::info!(was_enabled, "fetching started");
    Json(json!({ "status": "started" }))
}

async fn stop_fetching(State(state): State<AppState>) -> impl IntoResponse {
    let was_enabled = state.context.set_enabled(false);
    tracing::info!(was_enabled, "fetching stopped");
    Json(json!({ "status": "stopped" }))
}

async fn fetching_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "isFetching": state.context.is_enabled() }))
}

// ============================================================================
// Observer Stream
// ============================================================================

/// Logs the disconnect and refreshes the gauge when the stream is dropped
struct ObserverGuard {
    hub: Arc<BroadcastHub>,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        // the receiver is dropped before this guard
        let remaining = self.hub.observer_count();
        metrics::set_observers(remaining);
        tracing::info!(observers = remaining, "observer disconnected");
    }
}

fn to_sse(result: Result<LeadEvent, BroadcastStreamRecvError>) -> Option<Event> {
    match result {
        Ok(event) => match event.payload_json() {
            Ok(data) => Some(Event::default().event(event.name()).data(data)),
            Err(e) => {
                let err = Error::from(e);
                tracing::warn!(
                    category = err.category().as_str(),
                    error = %err,
                    event = event.name(),
                    "failed to encode event"
                );
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            tracing::warn!(missed, "observer lagging, events dropped");
            Some(Event::default().event("lagged").data(json!({ "missed": missed }).to_string()))
        }
    }
}

async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    let observers = state.hub.observer_count();
    metrics::set_observers(observers);
    tracing::info!(observers, "observer connected");

    let guard = ObserverGuard {
        hub: state.hub.clone(),
    };
    let events = BroadcastStream::new(receiver)
        .filter_map(|result| async move { to_sse(result) })
        .map(move |event| {
            let _ = &guard;
            Ok::<_, Infallible>(event)
        });

    Sse::new(events).keep_alive(KeepAlive::default())
}

// ============================================================================
// Dashboard Handlers
// ============================================================================

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.context.stats_snapshot().await)
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        is_fetching: state.context.is_enabled(),
        observers: state.hub.observer_count(),
    })
}

async fn prometheus_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Tests
// ============================================================================
