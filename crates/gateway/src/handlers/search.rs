//! Search handler

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use medsearch_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    models::{DrugRecord, SearchType, SourceError, TrialRecord},
};

/// Search request body
#[derive(Debug, Deserialize, Validate)]
pub struct SearchRequest {
    #[validate(length(min = 1, max = 200, message = "keyword must be 1 to 200 characters"))]
    pub keyword: String,

    #[serde(rename = "searchType", default)]
    pub search_type: SearchType,
}

/// Search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub clinical_trials: Vec<TrialRecord>,
    pub fda_data: Vec<DrugRecord>,
    pub total_clinical_trials: usize,
    pub total_fda_data: usize,
    pub partial: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<SourceError>,
    pub fetched_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// Run a keyword search across the configured registries
pub async fn search(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(body): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start = Instant::now();

    body.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("keyword".to_string()),
    })?;

    let result = state.engine.search(&body.keyword, body.search_type).await?;

    let processing_time_ms = start.elapsed().as_millis() as u64;

    tracing::info!(
        keyword = %body.keyword,
        search_type = body.search_type.as_str(),
        trials = result.trials.len(),
        drugs = result.drugs.len(),
        partial = result.partial,
        latency_ms = processing_time_ms,
        user_id = %auth.user_id,
        request_id = %auth.request_id,
        "Search completed"
    );

    Ok(Json(SearchResponse {
        total_clinical_trials: result.trials.len(),
        total_fda_data: result.drugs.len(),
        clinical_trials: result.trials,
        fda_data: result.drugs,
        partial: result.partial,
        errors: result.errors,
        fetched_at: result.fetched_at,
        processing_time_ms,
    }))
}
