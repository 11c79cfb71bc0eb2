//! Bounded context rendering
//!
//! The caller may supply arbitrarily many records and history turns; the
//! rendered context must stay within a fixed budget regardless. Record
//! counts, free-text field length, and history depth are each capped by
//! configuration.

use medsearch_common::config::GenerationConfig;
use medsearch_common::models::{ChatTurn, DrugRecord, TrialRecord};
use std::fmt::Write;

/// Context budget knobs, lifted from the generation configuration
#[derive(Debug, Clone)]
pub struct ContextLimits {
    /// Maximum records rendered per result set
    pub max_context_records: usize,
    /// Character budget for long free-text fields
    pub max_field_chars: usize,
    /// Most recent history turns kept
    pub max_history_turns: usize,
}

impl From<&GenerationConfig> for ContextLimits {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            max_context_records: config.max_context_records,
            max_field_chars: config.max_field_chars,
            max_history_turns: config.max_history_turns,
        }
    }
}

/// Truncate on a character boundary, marking the cut with an ellipsis
pub fn truncate_field(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push('…');
    truncated
}

/// Keep only the most recent `max_turns` turns
pub fn trim_history(history: &[ChatTurn], max_turns: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(max_turns);
    &history[start..]
}

/// Render the supplied records into the grounding context
///
/// Output size is bounded by the limits no matter how much data the
/// caller sends.
pub fn render_context(
    trials: &[TrialRecord],
    drugs: &[DrugRecord],
    limits: &ContextLimits,
) -> String {
    if trials.is_empty() && drugs.is_empty() {
        return "No registry data was supplied for this conversation.".to_string();
    }

    let mut context = String::new();

    if !trials.is_empty() {
        let shown = trials.len().min(limits.max_context_records);
        let _ = writeln!(
            context,
            "Clinical trials ({} of {} supplied):",
            shown,
            trials.len()
        );
        for trial in &trials[..shown] {
            render_trial(&mut context, trial, limits.max_field_chars);
        }
    }

    if !drugs.is_empty() {
        if !context.is_empty() {
            context.push('\n');
        }
        let shown = drugs.len().min(limits.max_context_records);
        let _ = writeln!(
            context,
            "FDA drug products ({} of {} supplied):",
            shown,
            drugs.len()
        );
        for drug in &drugs[..shown] {
            render_drug(&mut context, drug);
        }
    }

    context
}

fn render_trial(out: &mut String, trial: &TrialRecord, max_field_chars: usize) {
    let _ = writeln!(
        out,
        "- {}: {} [{}]",
        or_unknown(&trial.nct_id),
        or_unknown(&trial.brief_title),
        or_unknown(&trial.overall_status)
    );
    if !trial.conditions.is_empty() {
        let _ = writeln!(out, "  Conditions: {}", trial.conditions);
    }
    if !trial.intervention_drug.is_empty() {
        let _ = writeln!(out, "  Drug interventions: {}", trial.intervention_drug);
    }
    if !trial.phases.is_empty() {
        let _ = writeln!(out, "  Phases: {}", trial.phases);
    }
    if !trial.organization.is_empty() {
        let _ = writeln!(out, "  Sponsor: {}", trial.organization);
    }
    if !trial.primary_outcomes.is_empty() {
        let _ = writeln!(
            out,
            "  Primary outcomes: {}",
            truncate_field(&trial.primary_outcomes, max_field_chars)
        );
    }
    if !trial.eligibility_criteria.is_empty() {
        let _ = writeln!(
            out,
            "  Eligibility: {}",
            truncate_field(&trial.eligibility_criteria, max_field_chars)
        );
    }
    if !trial.start_date.is_empty() || !trial.completion_date.is_empty() {
        let _ = writeln!(
            out,
            "  Dates: {} to {}",
            or_unknown(&trial.start_date),
            or_unknown(&trial.completion_date)
        );
    }
}

fn render_drug(out: &mut String, drug: &DrugRecord) {
    let _ = writeln!(
        out,
        "- {} ({})",
        or_unknown(&drug.brand_name),
        or_unknown(&drug.generic_name)
    );
    if !drug.manufacturer_name.is_empty() {
        let _ = writeln!(out, "  Manufacturer: {}", drug.manufacturer_name);
    }
    if !drug.dosage_form.is_empty() || !drug.route.is_empty() {
        let _ = writeln!(
            out,
            "  Form: {}; route: {}",
            or_unknown(&drug.dosage_form),
            or_unknown(&drug.route)
        );
    }
    if !drug.product_type.is_empty() {
        let _ = writeln!(out, "  Type: {}", drug.product_type);
    }
    if !drug.product_id.is_empty() {
        let _ = writeln!(out, "  Product NDC: {}", drug.product_id);
    }
}

fn or_unknown(value: &str) -> &str {
    if value.is_empty() {
        "unknown"
    } else {
        value
    }
}
