//! Grounded answer engine
//!
//! Builds the system prompt and bounded context, forwards the trimmed
//! conversation to the generation backend, and extracts citations from the
//! answer. A citation is only emitted when it resolves to a record the
//! caller actually supplied; identifiers the backend invented are dropped.

use medsearch_common::{
    config::GenerationConfig,
    errors::Result,
    metrics,
    models::{ChatTurn, DrugRecord, SourceRef, SourceType, TrialRecord},
    AppError,
};
use regex_lite::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::context::{render_context, trim_history, ContextLimits};
use crate::generator::{ChatGenerator, GenerationMessage};

const SYSTEM_PROMPT: &str = "You are a medical research assistant. Answer strictly from the \
registry data below. When you reference a clinical trial, cite its NCT number; when you \
reference a drug product, use its brand name exactly as listed. If the supplied data does \
not answer the question, say so plainly instead of speculating. This is research \
information, not medical advice.";

/// A grounded chat answer with its resolved citations
#[derive(Debug, Clone, PartialEq)]
pub struct ChatAnswer {
    pub response: String,
    pub sources: Vec<SourceRef>,
}

/// Stateless chat engine over caller-supplied registry data
pub struct GroundingEngine {
    generator: Arc<dyn ChatGenerator>,
    limits: ContextLimits,
}

impl GroundingEngine {
    /// Create a new engine over the given generation backend
    pub fn new(generator: Arc<dyn ChatGenerator>, config: &GenerationConfig) -> Self {
        Self {
            generator,
            limits: ContextLimits::from(config),
        }
    }

    /// Answer `query` grounded in the supplied records
    ///
    /// All-or-nothing: a backend failure surfaces as an error, never as a
    /// degraded answer.
    pub async fn answer(
        &self,
        query: &str,
        trials: &[TrialRecord],
        drugs: &[DrugRecord],
        history: &[ChatTurn],
    ) -> Result<ChatAnswer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation {
                message: "Query must not be empty".to_string(),
                field: Some("query".to_string()),
            });
        }

        let system = format!(
            "{}\n\n{}",
            SYSTEM_PROMPT,
            render_context(trials, drugs, &self.limits)
        );

        let mut messages = Vec::new();
        for turn in trim_history(history, self.limits.max_history_turns) {
            messages.push(GenerationMessage::new(turn.role.as_str(), turn.content.clone()));
        }
        messages.push(GenerationMessage::new("user", query));

        let start = std::time::Instant::now();
        let outcome = self.generator.generate(&system, &messages).await;
        metrics::record_generation(
            start.elapsed().as_secs_f64(),
            self.generator.model_name(),
            outcome.is_ok(),
        );
        let response = outcome?;

        // Only records that made it into the context are citable.
        let cited_trials = bounded(trials, self.limits.max_context_records);
        let cited_drugs = bounded(drugs, self.limits.max_context_records);
        let sources = extract_sources(&response, cited_trials, cited_drugs);

        tracing::debug!(
            sources = sources.len(),
            response_chars = response.chars().count(),
            "Chat answer generated"
        );

        Ok(ChatAnswer { response, sources })
    }
}

fn bounded<T>(records: &[T], cap: usize) -> &[T] {
    &records[..records.len().min(cap)]
}

fn nct_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"NCT\d{8}").expect("static pattern"))
}

/// Extract citations from the answer text
///
/// Trial citations come from NCT identifiers in the text, drug citations
/// from brand name mentions. Both are resolved against the supplied
/// records; unresolved mentions are dropped and duplicates collapsed.
fn extract_sources(
    response: &str,
    trials: &[TrialRecord],
    drugs: &[DrugRecord],
) -> Vec<SourceRef> {
    let mut sources = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for found in nct_pattern().find_iter(response) {
        let id = found.as_str();
        let Some(trial) = trials.iter().find(|t| t.nct_id == id) else {
            tracing::warn!(nct_id = id, "Dropping citation of a trial not in supplied data");
            continue;
        };
        if seen.insert(format!("trial:{}", id)) {
            sources.push(SourceRef {
                kind: SourceType::Trial,
                id: id.to_string(),
                name: trial.brief_title.clone(),
                url: Some(format!("https://clinicaltrials.gov/study/{}", id)),
            });
        }
    }

    let response_lower = response.to_lowercase();
    for drug in drugs {
        if drug.brand_name.is_empty() {
            continue;
        }
        if !response_lower.contains(&drug.brand_name.to_lowercase()) {
            continue;
        }
        let id = if drug.product_id.is_empty() {
            drug.brand_name.clone()
        } else {
            drug.product_id.clone()
        };
        if seen.insert(format!("drug:{}", id)) {
            sources.push(SourceRef {
                kind: SourceType::Drug,
                id,
                name: drug.brand_name.clone(),
                url: None,
            });
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use medsearch_common::config::AppConfig;
    use medsearch_common::models::Role;
    use std::sync::Mutex;

    /// Returns a canned answer and records what it was asked
    struct ScriptedGenerator {
        answer: String,
        captured: Mutex<Option<(String, Vec<GenerationMessage>)>>,
    }

    impl ScriptedGenerator {
        fn new(answer: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.to_string(),
                captured: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl ChatGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            system: &str,
            messages: &[GenerationMessage],
        ) -> Result<String> {
            *self.captured.lock().unwrap() = Some((system.to_string(), messages.to_vec()));
            Ok(self.answer.clone())
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl ChatGenerator for FailingGenerator {
        async fn generate(&self, _: &str, _: &[GenerationMessage]) -> Result<String> {
            Err(AppError::GenerationError {
                message: "backend down".to_string(),
            })
        }

        fn model_name(&self) -> &str {
            "failing"
        }
    }

    fn engine(generator: Arc<dyn ChatGenerator>) -> GroundingEngine {
        GroundingEngine::new(generator, &AppConfig::default().generation)
    }

    fn trial(id: &str, title: &str) -> TrialRecord {
        TrialRecord {
            nct_id: id.to_string(),
            brief_title: title.to_string(),
            ..Default::default()
        }
    }

    fn drug(brand: &str, product_id: &str) -> DrugRecord {
        DrugRecord {
            brand_name: brand.to_string(),
            product_id: product_id.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_cited_trial_resolves_with_url() {
        let generator = ScriptedGenerator::new("NCT01234567 studied this condition.");
        let engine = engine(generator);
        let trials = [trial("NCT01234567", "A Relevant Study")];

        let answer = engine.answer("what trials?", &trials, &[], &[]).await.unwrap();

        assert_eq!(answer.sources.len(), 1);
        let source = &answer.sources[0];
        assert_eq!(source.kind, SourceType::Trial);
        assert_eq!(source.id, "NCT01234567");
        assert_eq!(source.name, "A Relevant Study");
        assert_eq!(
            source.url.as_deref(),
            Some("https://clinicaltrials.gov/study/NCT01234567")
        );
    }

    #[tokio::test]
    async fn test_hallucinated_trial_id_dropped() {
        let generator = ScriptedGenerator::new("See NCT01234567 and NCT99999999.");
        let engine = engine(generator);
        let trials = [trial("NCT01234567", "A Relevant Study")];

        let answer = engine.answer("what trials?", &trials, &[], &[]).await.unwrap();

        assert_eq!(answer.sources.len(), 1);
        assert_eq!(answer.sources[0].id, "NCT01234567");
    }

    #[tokio::test]
    async fn test_drug_mention_cited_case_insensitively() {
        let generator = ScriptedGenerator::new("COSENTYX is approved for this indication.");
        let engine = engine(generator);
        let drugs = [drug("Cosentyx", "0078-0639")];

        let answer = engine.answer("which drug?", &[], &drugs, &[]).await.unwrap();

        assert_eq!(answer.sources.len(), 1);
        let source = &answer.sources[0];
        assert_eq!(source.kind, SourceType::Drug);
        assert_eq!(source.id, "0078-0639");
        assert_eq!(source.name, "Cosentyx");
        assert!(source.url.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_mentions_collapse() {
        let generator =
            ScriptedGenerator::new("NCT01234567 is key. NCT01234567 also reports outcomes.");
        let engine = engine(generator);
        let trials = [trial("NCT01234567", "A Study")];

        let answer = engine.answer("summary?", &trials, &[], &[]).await.unwrap();
        assert_eq!(answer.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_answer_without_mentions_has_no_sources() {
        let generator = ScriptedGenerator::new("The supplied data does not cover that.");
        let engine = engine(generator);
        let trials = [trial("NCT01234567", "A Study")];

        let answer = engine.answer("unrelated?", &trials, &[], &[]).await.unwrap();
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn test_history_trimmed_to_most_recent_turns() {
        let generator = ScriptedGenerator::new("ok");
        let engine = engine(generator.clone());

        let history: Vec<ChatTurn> = (0..15)
            .map(|i| ChatTurn {
                role: if i % 2 == 0 { Role::User } else { Role::Assistant },
                content: format!("turn {}", i),
                sources: Vec::new(),
            })
            .collect();

        engine.answer("latest?", &[], &[], &history).await.unwrap();

        let captured = generator.captured.lock().unwrap();
        let (_, messages) = captured.as_ref().unwrap();
        // 10 history turns plus the current query.
        assert_eq!(messages.len(), 11);
        assert_eq!(messages[0].content, "turn 5");
        assert_eq!(messages[10].content, "latest?");
    }

    #[tokio::test]
    async fn test_context_rendered_into_system_prompt() {
        let generator = ScriptedGenerator::new("ok");
        let engine = engine(generator.clone());
        let trials = [trial("NCT01234567", "A Relevant Study")];
        let drugs = [drug("Cosentyx", "0078-0639")];

        engine.answer("tell me", &trials, &drugs, &[]).await.unwrap();

        let captured = generator.captured.lock().unwrap();
        let (system, _) = captured.as_ref().unwrap();
        assert!(system.contains("NCT01234567"));
        assert!(system.contains("Cosentyx"));
        assert!(system.contains("not medical advice"));
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let engine = engine(ScriptedGenerator::new("ok"));
        match engine.answer("  ", &[], &[], &[]).await {
            Err(AppError::Validation { field, .. }) => {
                assert_eq!(field.as_deref(), Some("query"));
            }
            other => panic!("expected Validation, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_backend_failure_is_all_or_nothing() {
        let engine = engine(Arc::new(FailingGenerator));
        match engine.answer("query", &[], &[], &[]).await {
            Err(AppError::GenerationError { message }) => {
                assert_eq!(message, "backend down");
            }
            other => panic!("expected GenerationError, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_only_context_visible_records_citable() {
        // Records beyond the context cap are not rendered, so a citation
        // of one cannot be verified and is dropped.
        let generator = ScriptedGenerator::new("See NCT00000011.");
        let engine = engine(generator);
        let trials: Vec<TrialRecord> = (0..12)
            .map(|i| trial(&format!("NCT{:08}", i), "Study"))
            .collect();

        let answer = engine.answer("what trials?", &trials, &[], &[]).await.unwrap();
        assert!(answer.sources.is_empty());
    }
}
