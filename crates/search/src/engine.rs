//! Aggregation engine
//!
//! Fans a validated keyword out to the adapters selected by the search
//! type, concurrently and each under its own timeout, then merges the
//! responses under the partial-failure policy: one failed source degrades
//! the result, every invoked source failing fails the request.

use chrono::Utc;
use medsearch_common::{
    config::AppConfig,
    errors::Result,
    metrics,
    models::{SearchResult, SearchType, SourceError},
    AppError,
};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{cache_key, QueryCache};
use crate::providers::{DrugProvider, ProviderResponse, TrialsProvider};

/// Orchestrates fan-out, merge, and caching for search requests
pub struct AggregationEngine {
    trials: Arc<dyn TrialsProvider>,
    drugs: Arc<dyn DrugProvider>,
    cache: Arc<QueryCache>,
    trials_timeout: Duration,
    fda_timeout: Duration,
}

impl AggregationEngine {
    /// Create a new engine over the given adapters and cache
    pub fn new(
        trials: Arc<dyn TrialsProvider>,
        drugs: Arc<dyn DrugProvider>,
        cache: Arc<QueryCache>,
        config: &AppConfig,
    ) -> Self {
        Self {
            trials,
            drugs,
            cache,
            trials_timeout: config.trials_timeout(),
            fda_timeout: config.fda_timeout(),
        }
    }

    /// Run a keyword search, serving from the cache when possible
    ///
    /// Returns `Validation` for a blank keyword and `SearchFailed` when
    /// every invoked adapter failed. A result with `partial == true` still
    /// succeeds and is cached.
    pub async fn search(&self, keyword: &str, search_type: SearchType) -> Result<SearchResult> {
        let keyword = keyword.trim().to_string();
        if keyword.is_empty() {
            return Err(AppError::Validation {
                message: "Keyword must not be empty".to_string(),
                field: Some("keyword".to_string()),
            });
        }

        let start = std::time::Instant::now();
        let key = cache_key(&keyword, search_type);

        let trials = Arc::clone(&self.trials);
        let drugs = Arc::clone(&self.drugs);
        let trials_timeout = self.trials_timeout;
        let fda_timeout = self.fda_timeout;

        let result = self
            .cache
            .get_or_fetch(key, async move {
                fetch_merged(trials, drugs, keyword, search_type, trials_timeout, fda_timeout)
                    .await
            })
            .await?;

        metrics::record_search(
            start.elapsed().as_secs_f64(),
            search_type.as_str(),
            result.trials.len() + result.drugs.len(),
            result.partial,
        );

        Ok(result)
    }
}

/// Fan out to the selected adapters and merge their responses
async fn fetch_merged(
    trials: Arc<dyn TrialsProvider>,
    drugs: Arc<dyn DrugProvider>,
    keyword: String,
    search_type: SearchType,
    trials_timeout: Duration,
    fda_timeout: Duration,
) -> Result<SearchResult> {
    let trials_fut = async {
        if !search_type.includes_trials() {
            return None;
        }
        Some(fetch_with_timeout(trials.as_ref(), &keyword, trials_timeout).await)
    };

    let drugs_fut = async {
        if !search_type.includes_drugs() {
            return None;
        }
        Some(fetch_drugs_with_timeout(drugs.as_ref(), &keyword, fda_timeout).await)
    };

    let (trials_resp, drugs_resp) = tokio::join!(trials_fut, drugs_fut);

    let mut invoked = 0usize;
    let mut errors: Vec<SourceError> = Vec::new();
    let mut trial_records = Vec::new();
    let mut drug_records = Vec::new();

    if let Some(resp) = trials_resp {
        invoked += 1;
        trial_records = resp.records;
        if let Some(error) = resp.error {
            metrics::record_provider_error(&error.source);
            errors.push(error);
        }
    }

    if let Some(resp) = drugs_resp {
        invoked += 1;
        drug_records = resp.records;
        if let Some(error) = resp.error {
            metrics::record_provider_error(&error.source);
            errors.push(error);
        }
    }

    if invoked > 0 && errors.len() == invoked {
        let message = errors
            .iter()
            .map(|e| format!("{}: {}", e.source, e.message))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(AppError::SearchFailed { message });
    }

    let partial = !errors.is_empty();
    if partial {
        tracing::warn!(
            keyword,
            search_type = search_type.as_str(),
            failed_sources = errors.len(),
            "Search degraded to partial result"
        );
    }

    Ok(SearchResult {
        trials: trial_records,
        drugs: drug_records,
        fetched_at: Utc::now(),
        partial,
        errors,
    })
}

async fn fetch_with_timeout(
    provider: &dyn TrialsProvider,
    keyword: &str,
    limit: Duration,
) -> ProviderResponse<medsearch_common::models::TrialRecord> {
    match tokio::time::timeout(limit, provider.fetch(keyword)).await {
        Ok(resp) => resp,
        Err(_) => ProviderResponse::failed(
            provider.source(),
            format!("timeout after {}s", limit.as_secs()),
        ),
    }
}

async fn fetch_drugs_with_timeout(
    provider: &dyn DrugProvider,
    keyword: &str,
    limit: Duration,
) -> ProviderResponse<medsearch_common::models::DrugRecord> {
    match tokio::time::timeout(limit, provider.fetch(keyword)).await {
        Ok(resp) => resp,
        Err(_) => ProviderResponse::failed(
            provider.source(),
            format!("timeout after {}s", limit.as_secs()),
        ),
    }
}
