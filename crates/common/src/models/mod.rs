//! Normalized record types shared across the MedSearch services
//!
//! Upstream registries leave almost every field optional. The provider
//! adapters apply the empty-string default exactly once, at this boundary,
//! so no consumer ever sees a null field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which upstream registries a search should hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    ClinicalTrials,
    Fda,
    Both,
}

impl Default for SearchType {
    fn default() -> Self {
        SearchType::Both
    }
}

impl SearchType {
    /// Whether the trials registry adapter should be invoked
    pub fn includes_trials(&self) -> bool {
        matches!(self, SearchType::ClinicalTrials | SearchType::Both)
    }

    /// Whether the drug label registry adapter should be invoked
    pub fn includes_drugs(&self) -> bool {
        matches!(self, SearchType::Fda | SearchType::Both)
    }

    /// Stable string form, used in cache keys and metrics labels
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::ClinicalTrials => "clinical_trials",
            SearchType::Fda => "fda",
            SearchType::Both => "both",
        }
    }
}

/// Normalized clinical trial record (ClinicalTrials.gov field names)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrialRecord {
    pub nct_id: String,
    pub brief_title: String,
    pub overall_status: String,
    /// Comma-joined condition list
    pub conditions: String,
    pub organization: String,
    /// Comma-joined names of drug-type interventions
    pub intervention_drug: String,
    pub eligibility_criteria: String,
    /// Comma-joined primary outcome measures
    pub primary_outcomes: String,
    /// Comma-joined phase list
    pub phases: String,
    pub start_date: String,
    pub completion_date: String,
}

/// Normalized drug label record (openFDA NDC field names)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrugRecord {
    pub brand_name: String,
    pub generic_name: String,
    pub manufacturer_name: String,
    pub dosage_form: String,
    /// Comma-joined administration routes
    pub route: String,
    pub product_type: String,
    pub application_number: String,
    pub product_id: String,
}

/// A single provider adapter failure, folded into the search response as data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceError {
    pub source: String,
    pub message: String,
}

impl SourceError {
    pub fn new(source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            message: message.into(),
        }
    }
}

/// Merged result of a fan-out search
///
/// `partial` is true iff at least one invoked adapter failed while at least
/// one other succeeded or returned empty. A result where every invoked
/// adapter failed is never constructed; that case surfaces as
/// `AppError::SearchFailed` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub trials: Vec<TrialRecord>,
    pub drugs: Vec<DrugRecord>,
    pub fetched_at: DateTime<Utc>,
    pub partial: bool,
    pub errors: Vec<SourceError>,
}

/// Chat participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Wire value expected by chat-completions style backends
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior turn of a chat conversation, supplied by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SourceRef>,
}

/// Kind of record a chat source points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Trial,
    Drug,
}

/// A grounded citation attached to a chat answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    #[serde(rename = "type")]
    pub kind: SourceType,
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}
