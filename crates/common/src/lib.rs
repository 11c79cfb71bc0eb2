//! MedSearch Common Library
//!
//! Shared code for the MedSearch services including:
//! - Normalized record types and wire models
//! - Error types and handling
//! - Configuration management
//! - Bearer token verification
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{
    ChatTurn, DrugRecord, Role, SearchResult, SearchType, SourceError, SourceRef, SourceType,
    TrialRecord,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Source name used for the clinical trials registry adapter
pub const SOURCE_CLINICAL_TRIALS: &str = "clinical_trials";

/// Source name used for the drug label registry adapter
pub const SOURCE_FDA: &str = "fda";
