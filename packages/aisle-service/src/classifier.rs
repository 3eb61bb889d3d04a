use std::collections::BTreeSet;

use serde_json::{Map, Value};

use crate::{BoxFuture, Error, INTENT_CLASSIFIER, IntentClassifier, Result};
use aisle_config::LlmProviderConfig;
use aisle_domain::{Intent, Route};
use aisle_providers::llm;

const TEMPERATURE: f32 = 0.1;
const SYSTEM_PROMPT: &str = r#"You are an intent classifier for a product recommendation system.
Analyze the user's query and extract:
1. The main task (what they want to do).
2. Constraints: budget (max_price, min_price), material, brand, category, must_contain, or other filters.
3. Safety flags: any concerning content such as self-harm, harmful products, or inappropriate requests.
4. Route: "search" for product queries, "general" for conversational queries, "unsafe" for flagged content.

Return a JSON object with:
- route: "search" | "general" | "unsafe"
- extracted_query: cleaned search query
- task: brief description of the task
- constraints: object of filters (use null for missing values)
- safety_flags: array of safety concerns (empty array if none)

Example:
{
  "route": "search",
  "extracted_query": "eco-friendly stainless steel cleaner under $20",
  "task": "Find eco-friendly stainless steel cleaner within budget",
  "constraints": { "max_price": 20.0, "material": "stainless steel", "must_contain": "eco-friendly" },
  "safety_flags": []
}"#;

pub struct LlmIntentClassifier {
	cfg: LlmProviderConfig,
}
impl LlmIntentClassifier {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}

	async fn classify_text(&self, user_text: &str) -> Result<Intent> {
		if user_text.trim().is_empty() {
			return Ok(Intent::fallback(""));
		}

		let messages = [llm::system_message(SYSTEM_PROMPT), llm::user_message(user_text)];
		let object = llm::complete_json(&self.cfg, &messages, Some(TEMPERATURE))
			.await
			.map_err(|err| Error::from_provider(INTENT_CLASSIFIER, err))?;

		Ok(parse_intent(object, user_text))
	}
}

impl IntentClassifier for LlmIntentClassifier {
	fn classify<'a>(&'a self, user_text: &'a str) -> BoxFuture<'a, Result<Intent>> {
		Box::pin(self.classify_text(user_text))
	}
}

/// Reads a classifier reply leniently; every field has a fallback.
pub fn parse_intent(object: Map<String, Value>, user_text: &str) -> Intent {
	let route = object.get("route").and_then(Value::as_str).map(Route::parse_lenient).unwrap_or(Route::General);
	let extracted_query = object
		.get("extracted_query")
		.and_then(Value::as_str)
		.map(str::trim)
		.filter(|query| !query.is_empty())
		.unwrap_or(user_text)
		.to_string();
	let task = object.get("task").and_then(Value::as_str).unwrap_or_default().trim().to_string();
	let constraints = match object.get("constraints") {
		Some(Value::Object(map)) => map
			.iter()
			.filter(|(_, value)| !matches!(value, Value::Array(_) | Value::Object(_)))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect(),
		_ => Map::new(),
	};
	let safety_flags = match object.get("safety_flags") {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(Value::as_str)
			.map(str::trim)
			.filter(|flag| !flag.is_empty())
			.map(str::to_string)
			.collect(),
		_ => BTreeSet::new(),
	};

	Intent { route, extracted_query, task, constraints, safety_flags }
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn object(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("Expected object."),
		}
	}

	#[test]
	fn unknown_route_becomes_general() {
		let intent = parse_intent(object(json!({ "route": "shopping" })), "soap");

		assert_eq!(intent.route, Route::General);
		assert_eq!(intent.extracted_query, "soap");
	}

	#[test]
	fn reads_constraints_and_flags() {
		let intent = parse_intent(
			object(json!({
				"route": "search",
				"extracted_query": "steel cleaner",
				"task": "Find a cleaner",
				"constraints": { "max_price": 20.0, "brand": null, "tags": ["a"] },
				"safety_flags": ["", "none-really", 3]
			})),
			"ignored",
		);

		assert_eq!(intent.route, Route::Search);
		assert_eq!(intent.extracted_query, "steel cleaner");
		assert_eq!(intent.constraint_number("max_price"), Some(20.0));
		assert!(intent.constraints.contains_key("brand"));
		assert!(!intent.constraints.contains_key("tags"));
		assert_eq!(intent.safety_flags.len(), 1);
	}

	#[tokio::test]
	async fn blank_text_skips_the_model() {
		let cfg = LlmProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://127.0.0.1:9".to_string(),
			api_key: "key".to_string(),
			path: "/v1/chat/completions".to_string(),
			model: "m".to_string(),
			temperature: 0.1,
			timeout_ms: 100,
			default_headers: Map::new(),
		};
		let intent = LlmIntentClassifier::new(cfg).classify("   ").await.expect("Blank text is not an error.");

		assert_eq!(intent, Intent::fallback(""));
	}
}
