//! MedSearch Search Library
//!
//! Fans a keyword query out to the upstream registries, normalizes their
//! responses, merges them under a partial-failure policy, and caches the
//! merged result.

pub mod cache;
pub mod engine;
pub mod providers;

pub use cache::{QueryCache, QueryCacheConfig};
pub use engine::AggregationEngine;
pub use providers::{DrugProvider, ProviderResponse, TrialsProvider};
