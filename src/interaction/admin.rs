//! Operational HTTP routes: a health probe and manual scheduler triggers.
//!
//! The trigger routes are only mounted when an admin token is configured and require
//! `Authorization: Bearer <token>`.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::{base::types::Res, schedule::reminder::ReminderScheduler};

#[derive(Clone)]
pub struct AdminState {
    pub scheduler: ReminderScheduler,
    pub token: String,
}

/// The health route, plus the trigger routes when `token` is set.
pub fn routes(scheduler: ReminderScheduler, token: Option<String>) -> Router {
    let health = Router::new().route("/health", get(health));

    let Some(token) = token.filter(|token| !token.is_empty()) else {
        info!("No admin token configured; admin routes are disabled.");
        return health;
    };

    let admin = Router::new()
        .route("/api/admin/trigger/daily-prompts", post(trigger_daily_prompts))
        .route("/api/admin/trigger/reminders/:tier", post(trigger_reminders))
        .route("/api/admin/trigger/daily-reset", post(trigger_daily_reset))
        .with_state(AdminState { scheduler, token });

    health.merge(admin)
}

async fn health() -> &'static str {
    "ok"
}

/// Extracts the token of an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get("authorization")?.to_str().ok()?.strip_prefix("Bearer ").map(str::trim)
}

fn authorize(state: &AdminState, headers: &HeaderMap) -> Result<(), Response> {
    if bearer_token(headers) == Some(state.token.as_str()) {
        Ok(())
    } else {
        warn!("Rejected an unauthorized admin request.");
        Err(StatusCode::UNAUTHORIZED.into_response())
    }
}

fn respond<T: Serialize>(result: Res<T>) -> Response {
    match result {
        Ok(report) => Json(report).into_response(),
        Err(err) => {
            error!("Admin trigger failed: {:#}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "trigger failed").into_response()
        }
    }
}

#[instrument(skip_all)]
async fn trigger_daily_prompts(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }

    respond(state.scheduler.trigger_daily_prompts().await)
}

#[instrument(skip(state, headers))]
async fn trigger_reminders(State(state): State<AdminState>, Path(tier): Path<u32>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }

    respond(state.scheduler.trigger_reminders(tier).await)
}

#[instrument(skip_all)]
async fn trigger_daily_reset(State(state): State<AdminState>, headers: HeaderMap) -> Response {
    if let Err(response) = authorize(&state, &headers) {
        return response;
    }

    respond(state.scheduler.trigger_daily_reset().await)
}
