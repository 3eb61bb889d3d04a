use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::{BoxFuture, Error, RETRIEVAL_PLANNER, Result, RetrievalPlanner};
use aisle_config::LlmProviderConfig;
use aisle_domain::{Intent, RetrievalPlan, SearchParams, SourceKind, price};
use aisle_providers::llm;

const TEMPERATURE: f32 = 0.2;
const DEFAULT_FIELDS: [&str; 4] = ["title", "brand", "price", "category"];
const SYSTEM_PROMPT: &str = r#"You are a retrieval strategist for a product recommendation system.
Given a task and constraints, create a retrieval plan.

Available sources:
- "private": internal product catalog with structured data (title, brand, category, price, ingredients, description).
- "live": web search for current prices, availability, reviews, comparisons, and deals.

Private catalog records always carry "uniq_id". Web results carry "url" and never "uniq_id".

Return a JSON object with:
- sources: array of "private" and/or "live"
- fields_to_retrieve: field names needed to answer (include "uniq_id" when "private" is used)
- comparison_criteria: criteria for ranking products, such as ["price", "brand reputation"]
- search_params: { query, brand, category, max_price, min_price, must_contain, n_results, rerank }
- use_web_for: what web search should be used for, when "live" is in sources"#;

pub struct LlmRetrievalPlanner {
	cfg: LlmProviderConfig,
	n_results: u32,
}
impl LlmRetrievalPlanner {
	pub fn new(cfg: LlmProviderConfig, n_results: u32) -> Self {
		Self { cfg, n_results }
	}

	async fn plan_intent(&self, intent: &Intent) -> Result<RetrievalPlan> {
		let constraints = serde_json::to_string_pretty(&intent.constraints)
			.map_err(|err| Error::malformed(RETRIEVAL_PLANNER, err.to_string()))?;
		let prompt = format!(
			"Task: {}\n\nOriginal query: {}\n\nConstraints:\n{constraints}\n\nCreate a retrieval plan.",
			intent.task, intent.extracted_query
		);
		let messages = [llm::system_message(SYSTEM_PROMPT), llm::user_message(&prompt)];
		let object = llm::complete_json(&self.cfg, &messages, Some(TEMPERATURE))
			.await
			.map_err(|err| Error::from_provider(RETRIEVAL_PLANNER, err))?;

		Ok(parse_plan(object, intent, self.n_results))
	}
}

impl RetrievalPlanner for LlmRetrievalPlanner {
	fn plan<'a>(&'a self, intent: &'a Intent) -> BoxFuture<'a, Result<RetrievalPlan>> {
		Box::pin(self.plan_intent(intent))
	}
}

/// Reads a planner reply, filling every absent field with its default.
///
/// An explicit empty `sources` array is honored and yields a plan that retrieves nothing.
pub fn parse_plan(object: Map<String, Value>, intent: &Intent, default_n_results: u32) -> RetrievalPlan {
	let sources = match object.get("sources") {
		Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).filter_map(source_kind).collect(),
		_ => BTreeSet::from([SourceKind::Private]),
	};
	let fields_to_retrieve = match object.get("fields_to_retrieve") {
		Some(Value::Array(items)) => strings(items),
		_ => DEFAULT_FIELDS.iter().map(|field| field.to_string()).collect(),
	};
	let comparison_criteria = match object.get("comparison_criteria") {
		Some(Value::Array(items)) => strings(items),
		_ => Vec::new(),
	};
	let empty = Map::new();
	let params = match object.get("search_params") {
		Some(Value::Object(map)) => map,
		_ => &empty,
	};
	let search_params = SearchParams {
		query: text(params, "query").unwrap_or_else(|| intent.extracted_query.clone()),
		brand: text(params, "brand"),
		category: text(params, "category"),
		max_price: params.get("max_price").and_then(price::parse_price),
		min_price: params.get("min_price").and_then(price::parse_price),
		must_contain: text(params, "must_contain"),
		n_results: params
			.get("n_results")
			.and_then(Value::as_u64)
			.filter(|n| *n > 0)
			.map(|n| n.min(u32::MAX as u64) as u32)
			.unwrap_or(default_n_results),
		rerank: params.get("rerank").and_then(Value::as_bool).unwrap_or(true),
	};
	let mut plan = RetrievalPlan {
		sources,
		fields_to_retrieve,
		comparison_criteria,
		search_params,
		use_web_for: object.get("use_web_for").and_then(Value::as_str).unwrap_or_default().trim().to_string(),
	};

	plan.enforce_identity_field();

	plan
}

fn source_kind(raw: &str) -> Option<SourceKind> {
	match raw.trim().to_ascii_lowercase().as_str() {
		"private" => Some(SourceKind::Private),
		"live" => Some(SourceKind::Live),
		_ => None,
	}
}

fn strings(items: &[Value]) -> Vec<String> {
	items
		.iter()
		.filter_map(Value::as_str)
		.map(str::trim)
		.filter(|item| !item.is_empty())
		.map(str::to_string)
		.collect()
}

fn text(map: &Map<String, Value>, key: &str) -> Option<String> {
	map.get(key).and_then(Value::as_str).map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use aisle_domain::plan::IDENTITY_FIELD;

	fn object(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("Expected object."),
		}
	}

	#[test]
	fn empty_reply_uses_defaults() {
		let intent = Intent::fallback("steel cleaner");
		let plan = parse_plan(Map::new(), &intent, 7);

		assert_eq!(plan.sources, BTreeSet::from([SourceKind::Private]));
		assert_eq!(plan.search_params.query, "steel cleaner");
		assert_eq!(plan.search_params.n_results, 7);
		assert!(plan.search_params.rerank);
		assert_eq!(plan.fields_to_retrieve.last().map(String::as_str), Some(IDENTITY_FIELD));
	}

	#[test]
	fn reads_filters_and_sources() {
		let intent = Intent::fallback("ignored");
		let plan = parse_plan(
			object(json!({
				"sources": ["private", "live", "carrier pigeon"],
				"fields_to_retrieve": ["title", "price"],
				"search_params": {
					"query": "eco cleaner",
					"max_price": "$20",
					"brand": " ",
					"n_results": 0,
					"rerank": false
				},
				"use_web_for": "current prices"
			})),
			&intent,
			5,
		);

		assert_eq!(plan.sources, BTreeSet::from([SourceKind::Private, SourceKind::Live]));
		assert_eq!(plan.search_params.max_price, Some(20.0));
		assert_eq!(plan.search_params.brand, None);
		assert_eq!(plan.search_params.n_results, 5);
		assert!(!plan.search_params.rerank);
		assert_eq!(plan.web_query(), "eco cleaner current prices");
		assert!(plan.fields_to_retrieve.iter().any(|field| field == IDENTITY_FIELD));
	}

	#[test]
	fn explicit_empty_sources_are_kept() {
		let plan = parse_plan(object(json!({ "sources": [] })), &Intent::fallback("x"), 5);

		assert!(plan.sources.is_empty());
		assert!(!plan.fields_to_retrieve.iter().any(|field| field == IDENTITY_FIELD));
	}
}
