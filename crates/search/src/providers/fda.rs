//! openFDA drug NDC directory adapter
//!
//! Queries `GET {base}/drug/ndc.json?search=...` matching the keyword
//! against brand and generic names, draining `skip` pagination up to a
//! configured record cap. openFDA reports zero matches as HTTP 404 with a
//! NOT_FOUND body; that is an empty success, not a source failure.

use async_trait::async_trait;
use medsearch_common::{config::FdaConfig, errors::Result, models::DrugRecord, AppError};
use serde::Deserialize;
use std::time::Duration;

use super::{DrugProvider, ProviderResponse};

/// HTTP client for the openFDA NDC directory
pub struct OpenFdaClient {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
    max_records: usize,
}

#[derive(Debug, Deserialize)]
struct NdcPage {
    #[serde(default)]
    results: Vec<NdcProduct>,
}

#[derive(Debug, Default, Deserialize)]
struct NdcProduct {
    brand_name: Option<String>,
    generic_name: Option<String>,
    labeler_name: Option<String>,
    dosage_form: Option<String>,
    #[serde(default)]
    route: Vec<String>,
    product_type: Option<String>,
    application_number: Option<String>,
    product_id: Option<String>,
    product_ndc: Option<String>,
}

impl OpenFdaClient {
    /// Create a new client from configuration
    pub fn new(config: &FdaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, 1000),
            max_records: config.max_records.max(1),
        })
    }

    /// Fetch one page; `Ok(None)` means openFDA's 404 "no matches" answer
    async fn fetch_page(&self, keyword: &str, skip: usize) -> Result<Option<NdcPage>> {
        let url = format!("{}/drug/ndc.json", self.base_url);
        let search = format!(
            "brand_name:\"{kw}\" OR generic_name:\"{kw}\"",
            kw = keyword
        );
        let limit = self.page_size.to_string();
        let skip = skip.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("search", search.as_str()),
                ("limit", limit.as_str()),
                ("skip", skip.as_str()),
            ])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        if !response.status().is_success() {
            return Err(AppError::Internal {
                message: format!("HTTP {}", response.status().as_u16()),
            });
        }

        Ok(Some(response.json::<NdcPage>().await?))
    }
}

#[async_trait]
impl DrugProvider for OpenFdaClient {
    async fn fetch(&self, keyword: &str) -> ProviderResponse<DrugRecord> {
        let mut records: Vec<DrugRecord> = Vec::new();
        let mut skip = 0;

        while records.len() < self.max_records {
            match self.fetch_page(keyword, skip).await {
                Ok(Some(page)) => {
                    let fetched = page.results.len();
                    records.extend(page.results.into_iter().map(map_product));
                    // A short page means the result set is drained.
                    if fetched < self.page_size {
                        break;
                    }
                    skip += fetched;
                }
                Ok(None) => break,
                Err(e) => {
                    if records.is_empty() {
                        tracing::warn!(keyword, error = %e, "FDA fetch failed");
                        return ProviderResponse::failed(self.source(), e.to_string());
                    }
                    tracing::warn!(
                        keyword,
                        fetched = records.len(),
                        error = %e,
                        "FDA pagination aborted, returning partial drain"
                    );
                    break;
                }
            }
        }

        records.truncate(self.max_records);
        tracing::debug!(keyword, records = records.len(), "FDA data fetched");
        ProviderResponse::ok(records)
    }
}

/// Map one NDC product to the normalized record shape
fn map_product(product: NdcProduct) -> DrugRecord {
    DrugRecord {
        brand_name: product.brand_name.unwrap_or_default(),
        generic_name: product.generic_name.unwrap_or_default(),
        manufacturer_name: product.labeler_name.unwrap_or_default(),
        dosage_form: product.dosage_form.unwrap_or_default(),
        route: product.route.join(", "),
        product_type: product.product_type.unwrap_or_default(),
        application_number: product.application_number.unwrap_or_default(),
        // product_ndc is the stable public identifier; product_id is an
        // internal composite that not every record carries.
        product_id: product
            .product_ndc
            .or(product.product_id)
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_product_full() {
        let product: NdcProduct = serde_json::from_str(
            r#"{
                "brand_name": "Cosentyx",
                "generic_name": "secukinumab",
                "labeler_name": "Novartis Pharmaceuticals Corporation",
                "dosage_form": "INJECTION, SOLUTION",
                "route": ["SUBCUTANEOUS"],
                "product_type": "HUMAN PRESCRIPTION DRUG",
                "application_number": "BLA125504",
                "product_ndc": "0078-0639"
            }"#,
        )
        .unwrap();

        let record = map_product(product);
        assert_eq!(record.brand_name, "Cosentyx");
        assert_eq!(record.generic_name, "secukinumab");
        assert_eq!(record.manufacturer_name, "Novartis Pharmaceuticals Corporation");
        assert_eq!(record.route, "SUBCUTANEOUS");
        assert_eq!(record.product_id, "0078-0639");
    }

    #[test]
    fn test_map_product_missing_fields_default_empty() {
        let product: NdcProduct = serde_json::from_str("{}").unwrap();
        let record = map_product(product);
        assert_eq!(record, DrugRecord::default());
    }

    #[test]
    fn test_map_product_joins_multiple_routes() {
        let product: NdcProduct =
            serde_json::from_str(r#"{"route": ["ORAL", "TOPICAL"]}"#).unwrap();
        let record = map_product(product);
        assert_eq!(record.route, "ORAL, TOPICAL");
    }

    #[test]
    fn test_map_product_prefers_product_ndc() {
        let product: NdcProduct = serde_json::from_str(
            r#"{"product_ndc": "0078-0639", "product_id": "0078-0639_deadbeef"}"#,
        )
        .unwrap();
        assert_eq!(map_product(product).product_id, "0078-0639");
    }
}
