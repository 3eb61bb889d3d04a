use serde_json::{Map, Value};

use crate::{BoxFuture, Error, RECONCILIATION, Reconciliation, ReconciliationService, Result};
use aisle_config::LlmProviderConfig;
use aisle_domain::{CatalogRecord, Record, WebRecord};
use aisle_providers::llm;

const TEMPERATURE: f32 = 0.2;
const SYSTEM_PROMPT: &str =
	"You are a product information reconciler. Compare and reconcile product data from different sources.";

pub struct LlmReconciler {
	cfg: LlmProviderConfig,
}
impl LlmReconciler {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}

	async fn reconcile_records(
		&self,
		catalog: &[CatalogRecord],
		web: &[WebRecord],
		criteria: &[String],
	) -> Result<Reconciliation> {
		let prompt = reconcile_prompt(catalog, web, criteria)?;
		let messages = [llm::system_message(SYSTEM_PROMPT), llm::user_message(&prompt)];
		let object = llm::complete_json(&self.cfg, &messages, Some(TEMPERATURE))
			.await
			.map_err(|err| Error::from_provider(RECONCILIATION, err))?;

		Ok(parse_reconciliation(object))
	}
}

impl ReconciliationService for LlmReconciler {
	fn reconcile<'a>(
		&'a self,
		catalog: &'a [CatalogRecord],
		web: &'a [WebRecord],
		criteria: &'a [String],
	) -> BoxFuture<'a, Result<Reconciliation>> {
		Box::pin(self.reconcile_records(catalog, web, criteria))
	}
}

/// Reads a reconciler reply. Object-valued conflicts and recommendations are kept
/// as compact JSON strings.
pub fn parse_reconciliation(mut object: Map<String, Value>) -> Reconciliation {
	let records = match object.remove("reconciled_results") {
		Some(Value::Array(items)) => items,
		_ => Vec::new(),
	};

	Reconciliation {
		records,
		conflicts: notes(object.get("conflicts")),
		recommendations: notes(object.get("recommendations")),
	}
}

fn reconcile_prompt(catalog: &[CatalogRecord], web: &[WebRecord], criteria: &[String]) -> Result<String> {
	// The model only sees catalog identity, never the derived product URL.
	let catalog = catalog
		.iter()
		.map(|record| Record::LocalCorpus(CatalogRecord { url: None, ..record.clone() }))
		.collect::<Vec<_>>();
	let web = web.iter().cloned().map(Record::WebSearch).collect::<Vec<_>>();
	let catalog_json = serde_json::to_string_pretty(&catalog)
		.map_err(|err| Error::malformed(RECONCILIATION, err.to_string()))?;
	let web_json =
		serde_json::to_string_pretty(&web).map_err(|err| Error::malformed(RECONCILIATION, err.to_string()))?;
	let focus = if criteria.is_empty() { "price and quality".to_string() } else { criteria.join(", ") };

	Ok(format!(
		"Reconcile product search results from the private catalog and web search.
Private catalog results (source: local_corpus, have uniq_id, NO urls): {catalog_json}
Web search results (source: web_search, have urls, NO uniq_id): {web_json}

Compare prices, availability, and other information. Return a JSON object with:
- reconciled_results: array of the best products with reconciled information
- conflicts: array of conflicts found (price differences, availability issues)
- recommendations: array of recommendations based on the comparison

Requirements:
1. Products from local_corpus MUST keep 'uniq_id' and the exact 'title', MUST NOT include 'url', and set source=\"local_corpus\".
2. Products from web_search MUST keep 'url' and the exact 'title', MUST NOT include 'uniq_id' or 'doc_id', and set source=\"web_search\".
3. A product found in both sources becomes TWO entries, one per source.

Focus on: {focus}"
	))
}

fn notes(value: Option<&Value>) -> Vec<String> {
	let Some(Value::Array(items)) = value else {
		return Vec::new();
	};

	items
		.iter()
		.filter_map(|item| match item {
			Value::String(text) => Some(text.trim().to_string()),
			Value::Null => None,
			other => Some(other.to_string()),
		})
		.filter(|text| !text.is_empty())
		.collect()
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn reads_records_and_renders_object_notes() {
		let object = match json!({
			"reconciled_results": [{ "title": "A" }, "junk"],
			"conflicts": [{ "product": "A", "issue": "price differs" }, "", null],
			"recommendations": ["Buy A"]
		}) {
			Value::Object(map) => map,
			_ => panic!("Expected object."),
		};
		let reconciliation = parse_reconciliation(object);

		assert_eq!(reconciliation.records.len(), 2);
		assert_eq!(reconciliation.conflicts.len(), 1);
		assert!(reconciliation.conflicts[0].starts_with('{'));
		assert!(reconciliation.conflicts[0].contains(r#""issue":"price differs""#));
		assert_eq!(reconciliation.recommendations, vec!["Buy A".to_string()]);
	}

	#[test]
	fn missing_results_is_empty() {
		let reconciliation = parse_reconciliation(Map::new());

		assert!(reconciliation.records.is_empty());
		assert!(reconciliation.conflicts.is_empty());
	}

	#[test]
	fn prompt_hides_derived_urls() {
		let record = CatalogRecord {
			uniq_id: "u1".to_string(),
			doc_id: String::new(),
			title: "Polish".to_string(),
			brand: String::new(),
			category: String::new(),
			price: Some(9.0),
			ingredients: String::new(),
			score: 0.1,
			snippet: String::new(),
			url: Some("https://shop.example/u1".to_string()),
		};
		let prompt = reconcile_prompt(&[record], &[], &[]).expect("Prompt should render.");

		assert!(prompt.contains("\"uniq_id\": \"u1\""));
		assert!(!prompt.contains("https://shop.example/u1"));
		assert!(prompt.ends_with("Focus on: price and quality"));
	}
}
