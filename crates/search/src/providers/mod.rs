//! Provider adapters for the upstream registries
//!
//! Each adapter owns upstream-specific querying, pagination draining, and
//! field mapping into the normalized record shape. Adapters never return
//! `Err`: an upstream failure becomes a `SourceError` inside the response
//! so the aggregation engine can apply its partial-success policy.

pub mod fda;
pub mod trials;

use async_trait::async_trait;
use medsearch_common::models::{DrugRecord, SourceError, TrialRecord};

pub use fda::OpenFdaClient;
pub use trials::ClinicalTrialsClient;

/// Outcome of one adapter fetch: records plus an optional failure
#[derive(Debug, Clone)]
pub struct ProviderResponse<T> {
    pub records: Vec<T>,
    pub error: Option<SourceError>,
}

impl<T> ProviderResponse<T> {
    /// Successful fetch (possibly empty)
    pub fn ok(records: Vec<T>) -> Self {
        Self {
            records,
            error: None,
        }
    }

    /// Failed fetch; no records, failure captured as data
    pub fn failed(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            error: Some(SourceError::new(source, message)),
        }
    }
}

/// Trials registry adapter contract
#[async_trait]
pub trait TrialsProvider: Send + Sync {
    async fn fetch(&self, keyword: &str) -> ProviderResponse<TrialRecord>;

    /// Source name surfaced in wire-level errors
    fn source(&self) -> &'static str {
        medsearch_common::SOURCE_CLINICAL_TRIALS
    }
}

/// Drug label registry adapter contract
#[async_trait]
pub trait DrugProvider: Send + Sync {
    async fn fetch(&self, keyword: &str) -> ProviderResponse<DrugRecord>;

    /// Source name surfaced in wire-level errors
    fn source(&self) -> &'static str {
        medsearch_common::SOURCE_FDA
    }
}
