//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub cache: CacheCheck,
    pub chat: CheckResult,
}

#[derive(Serialize)]
pub struct CacheCheck {
    pub status: String,
    pub entries: usize,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
}

/// Liveness probe - always returns healthy if the server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: medsearch_common::VERSION.to_string(),
    })
}

/// Readiness probe
///
/// The upstream registries are public and unauthenticated, so readiness
/// reports internal state only: the query cache and whether the chat
/// surface is configured.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let chat_status = if state.grounding.is_some() {
        "up"
    } else {
        "disabled"
    };

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: HealthChecks {
            cache: CacheCheck {
                status: "up".to_string(),
                entries: state.cache.len().await,
            },
            chat: CheckResult {
                status: chat_status.to_string(),
            },
        },
    })
}
