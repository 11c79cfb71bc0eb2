//! Chat handler
//!
//! Stateless by design: the caller resends the registry data and the
//! conversation history with every request, and nothing about the
//! conversation is stored server side.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::AppState;
use medsearch_common::{
    auth::AuthContext,
    errors::Result,
    models::{ChatTurn, DrugRecord, SourceRef, TrialRecord},
    AppError,
};

/// Chat request body
#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub query: String,

    #[serde(default)]
    pub clinical_trials_data: Vec<TrialRecord>,

    #[serde(default)]
    pub fda_data: Vec<DrugRecord>,

    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

/// Chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub sources: Vec<SourceRef>,
}

/// Answer a question grounded in the supplied registry data
pub async fn chat(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatResponse>> {
    let start = Instant::now();

    let grounding = state.grounding.as_ref().ok_or_else(|| AppError::ServiceUnavailable {
        message: "Chat is not configured on this deployment".to_string(),
    })?;

    let answer = grounding
        .answer(
            &body.query,
            &body.clinical_trials_data,
            &body.fda_data,
            &body.chat_history,
        )
        .await?;

    tracing::info!(
        trials_supplied = body.clinical_trials_data.len(),
        drugs_supplied = body.fda_data.len(),
        history_turns = body.chat_history.len(),
        sources = answer.sources.len(),
        latency_ms = start.elapsed().as_millis() as u64,
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        "Chat completed"
    );

    Ok(Json(ChatResponse {
        response: answer.response,
        sources: answer.sources,
    }))
}
