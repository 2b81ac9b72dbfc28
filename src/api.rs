use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    clients::health::HealthChecker,
    models::{
        health::HealthStatus, message::Message, response::ApiResponse, view::ResolvedView,
    },
    pipeline::ResolutionPipeline,
    seen_state::SeenUpdate,
    separator::menu_slice,
};

pub struct AppState {
    pub pipeline: Arc<ResolutionPipeline>,
    pub health_checker: HealthChecker,
    pub render_limit: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesBody {
    pub view: ResolvedView,
    pub menu_notifications: Vec<Message>,
    pub has_priority_notifications: bool,
    pub has_unseen_announcements: bool,
}

#[derive(Debug, Serialize)]
pub struct SeenChange {
    pub changed: bool,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<SeenUpdate> for SeenChange {
    fn from(update: SeenUpdate) -> Self {
        match update {
            SeenUpdate::Unchanged => Self {
                changed: false,
                persisted: true,
                error: None,
            },
            SeenUpdate::Persisted => Self {
                changed: true,
                persisted: true,
                error: None,
            },
            SeenUpdate::PersistFailed(e) => Self {
                changed: true,
                persisted: false,
                error: Some(e.to_string()),
            },
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/messages", get(get_messages))
        .route("/messages/refresh", post(refresh_messages))
        .route("/messages/seen", post(mark_all_seen))
        .route("/messages/{id}/dismiss", post(dismiss_message))
        .route("/messages/{id}/restore", post(restore_message))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_api_server(
    port: u16,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = router(state);

    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!(address = %addr, "Messages API server started");

    axum::serve(listener, app).await?;

    Ok(())
}

fn messages_body(view: Arc<ResolvedView>, render_limit: usize) -> MessagesBody {
    MessagesBody {
        menu_notifications: menu_slice(&view.unseen_by_category.notifications, render_limit),
        has_priority_notifications: view.has_priority_notifications(),
        has_unseen_announcements: view.has_unseen_announcements(),
        view: ResolvedView::clone(&view),
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_checker.check_all().await;

    let status_code = match health.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn get_messages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.pipeline.current_view().await {
        Some(view) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                messages_body(view, state.render_limit),
                "Messages resolved".to_string(),
            )),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(
                format!("resolution status is {}", state.pipeline.status().await),
                "No messages available".to_string(),
            )),
        ),
    }
}

async fn refresh_messages(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.pipeline.request_refresh().await {
        Ok(view) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                messages_body(view, state.render_limit),
                "Messages refreshed".to_string(),
            )),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::error(
                e.to_string(),
                "Messages could not be refreshed".to_string(),
            )),
        ),
    }
}

async fn dismiss_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let change = SeenChange::from(state.pipeline.dismiss(&id).await);
    Json(ApiResponse::success(change, format!("Message {} dismissed", id)))
}

async fn restore_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let change = SeenChange::from(state.pipeline.restore(&id).await);
    Json(ApiResponse::success(change, format!("Message {} restored", id)))
}

async fn mark_all_seen(
    State(state): State<Arc<AppState>>,
    Json(ids): Json<Vec<String>>,
) -> impl IntoResponse {
    let change = SeenChange::from(state.pipeline.mark_all_seen(&ids).await);
    Json(ApiResponse::success(
        change,
        format!("{} messages marked seen", ids.len()),
    ))
}
