//! ClinicalTrials.gov API v2 adapter
//!
//! Queries `GET {base}/studies?query.term=...` and drains `nextPageToken`
//! pagination up to a configured page cap. Every upstream field is
//! optional; the mapping applies the empty-string default once, here.

use async_trait::async_trait;
use medsearch_common::{config::TrialsConfig, errors::Result, models::TrialRecord, AppError};
use serde::Deserialize;
use std::time::Duration;

use super::{ProviderResponse, TrialsProvider};

/// HTTP client for the ClinicalTrials.gov study registry
pub struct ClinicalTrialsClient {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    max_pages: usize,
}

// Upstream response shapes; only the fields we map are declared.

#[derive(Debug, Deserialize)]
struct StudiesPage {
    #[serde(default)]
    studies: Vec<Study>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Study {
    #[serde(rename = "protocolSection", default)]
    protocol_section: ProtocolSection,
}

#[derive(Debug, Default, Deserialize)]
struct ProtocolSection {
    #[serde(rename = "identificationModule", default)]
    identification: IdentificationModule,
    #[serde(rename = "statusModule", default)]
    status: StatusModule,
    #[serde(rename = "conditionsModule", default)]
    conditions: ConditionsModule,
    #[serde(rename = "armsInterventionsModule", default)]
    arms_interventions: ArmsInterventionsModule,
    #[serde(rename = "eligibilityModule", default)]
    eligibility: EligibilityModule,
    #[serde(rename = "outcomesModule", default)]
    outcomes: OutcomesModule,
    #[serde(rename = "designModule", default)]
    design: DesignModule,
}

#[derive(Debug, Default, Deserialize)]
struct IdentificationModule {
    #[serde(rename = "nctId")]
    nct_id: Option<String>,
    #[serde(rename = "briefTitle")]
    brief_title: Option<String>,
    organization: Option<Organization>,
}

#[derive(Debug, Default, Deserialize)]
struct Organization {
    #[serde(rename = "fullName")]
    full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatusModule {
    #[serde(rename = "overallStatus")]
    overall_status: Option<String>,
    #[serde(rename = "startDateStruct")]
    start_date: Option<DateStruct>,
    #[serde(rename = "completionDateStruct")]
    completion_date: Option<DateStruct>,
}

#[derive(Debug, Default, Deserialize)]
struct DateStruct {
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConditionsModule {
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArmsInterventionsModule {
    #[serde(default)]
    interventions: Vec<Intervention>,
}

#[derive(Debug, Deserialize)]
struct Intervention {
    #[serde(rename = "type")]
    kind: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EligibilityModule {
    #[serde(rename = "eligibilityCriteria")]
    eligibility_criteria: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutcomesModule {
    #[serde(rename = "primaryOutcomes", default)]
    primary_outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    measure: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DesignModule {
    #[serde(default)]
    phases: Vec<String>,
}

impl ClinicalTrialsClient {
    /// Create a new client from configuration
    pub fn new(config: &TrialsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
            max_pages: config.max_pages.max(1),
        })
    }

    async fn fetch_page(&self, keyword: &str, page_token: Option<&str>) -> Result<StudiesPage> {
        let url = format!("{}/studies", self.base_url);
        let page_size = self.page_size.to_string();

        let mut query: Vec<(&str, &str)> =
            vec![("query.term", keyword), ("pageSize", &page_size)];
        if let Some(token) = page_token {
            query.push(("pageToken", token));
        }

        let response = self.client.get(&url).query(&query).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Internal {
                message: format!("HTTP {}", response.status().as_u16()),
            });
        }

        Ok(response.json::<StudiesPage>().await?)
    }
}

#[async_trait]
impl TrialsProvider for ClinicalTrialsClient {
    async fn fetch(&self, keyword: &str) -> ProviderResponse<TrialRecord> {
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        for page_index in 0..self.max_pages {
            match self.fetch_page(keyword, page_token.as_deref()).await {
                Ok(page) => {
                    records.extend(page.studies.into_iter().map(map_study));
                    page_token = page.next_page_token;
                    if page_token.is_none() {
                        break;
                    }
                }
                Err(e) => {
                    // A mid-drain failure keeps what was already fetched;
                    // only a first-page failure counts as a source failure.
                    if records.is_empty() {
                        tracing::warn!(keyword, error = %e, "Clinical trials fetch failed");
                        return ProviderResponse::failed(self.source(), e.to_string());
                    }
                    tracing::warn!(
                        keyword,
                        page = page_index,
                        fetched = records.len(),
                        error = %e,
                        "Clinical trials pagination aborted, returning partial drain"
                    );
                    break;
                }
            }
        }

        tracing::debug!(keyword, records = records.len(), "Clinical trials fetched");
        ProviderResponse::ok(records)
    }
}

/// Map one upstream study to the normalized record shape
fn map_study(study: Study) -> TrialRecord {
    let section = study.protocol_section;

    let intervention_drug = section
        .arms_interventions
        .interventions
        .iter()
        .filter(|i| i.kind.as_deref().is_some_and(|k| k.eq_ignore_ascii_case("drug")))
        .filter_map(|i| i.name.clone())
        .collect::<Vec<_>>()
        .join(", ");

    let primary_outcomes = section
        .outcomes
        .primary_outcomes
        .into_iter()
        .filter_map(|o| o.measure)
        .collect::<Vec<_>>()
        .join(", ");

    TrialRecord {
        nct_id: section.identification.nct_id.unwrap_or_default(),
        brief_title: section.identification.brief_title.unwrap_or_default(),
        overall_status: section.status.overall_status.unwrap_or_default(),
        conditions: section.conditions.conditions.join(", "),
        organization: section
            .identification
            .organization
            .and_then(|o| o.full_name)
            .unwrap_or_default(),
        intervention_drug,
        eligibility_criteria: section
            .eligibility
            .eligibility_criteria
            .unwrap_or_default(),
        primary_outcomes,
        phases: section.design.phases.join(", "),
        start_date: section
            .status
            .start_date
            .and_then(|d| d.date)
            .unwrap_or_default(),
        completion_date: section
            .status
            .completion_date
            .and_then(|d| d.date)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_study_json() -> &'static str {
        r#"{
            "protocolSection": {
                "identificationModule": {
                    "nctId": "NCT04267848",
                    "briefTitle": "Secukinumab in Psoriatic Arthritis",
                    "organization": {"fullName": "Novartis"}
                },
                "statusModule": {
                    "overallStatus": "COMPLETED",
                    "startDateStruct": {"date": "2020-03-01"},
                    "completionDateStruct": {"date": "2022-09-15"}
                },
                "conditionsModule": {"conditions": ["Psoriatic Arthritis", "Psoriasis"]},
                "armsInterventionsModule": {
                    "interventions": [
                        {"type": "DRUG", "name": "Secukinumab"},
                        {"type": "OTHER", "name": "Placebo"}
                    ]
                },
                "eligibilityModule": {"eligibilityCriteria": "Adults 18 years and older"},
                "outcomesModule": {"primaryOutcomes": [{"measure": "ACR20 response"}]},
                "designModule": {"phases": ["PHASE3"]}
            }
        }"#
    }

    #[test]
    fn test_map_study_full() {
        let study: Study = serde_json::from_str(sample_study_json()).unwrap();
        let record = map_study(study);

        assert_eq!(record.nct_id, "NCT04267848");
        assert_eq!(record.brief_title, "Secukinumab in Psoriatic Arthritis");
        assert_eq!(record.overall_status, "COMPLETED");
        assert_eq!(record.conditions, "Psoriatic Arthritis, Psoriasis");
        assert_eq!(record.organization, "Novartis");
        assert_eq!(record.intervention_drug, "Secukinumab");
        assert_eq!(record.primary_outcomes, "ACR20 response");
        assert_eq!(record.phases, "PHASE3");
        assert_eq!(record.start_date, "2020-03-01");
        assert_eq!(record.completion_date, "2022-09-15");
    }

    #[test]
    fn test_map_study_missing_fields_default_empty() {
        let study: Study = serde_json::from_str(r#"{"protocolSection": {}}"#).unwrap();
        let record = map_study(study);

        assert_eq!(record.nct_id, "");
        assert_eq!(record.brief_title, "");
        assert_eq!(record.conditions, "");
        assert_eq!(record.intervention_drug, "");
        assert_eq!(record.phases, "");
    }

    #[test]
    fn test_map_study_missing_protocol_section() {
        let study: Study = serde_json::from_str("{}").unwrap();
        let record = map_study(study);
        assert_eq!(record, TrialRecord::default());
    }

    #[test]
    fn test_page_parses_next_token() {
        let page: StudiesPage = serde_json::from_str(
            r#"{"studies": [], "nextPageToken": "abc123"}"#,
        )
        .unwrap();
        assert_eq!(page.next_page_token.as_deref(), Some("abc123"));
        assert!(page.studies.is_empty());
    }
}
