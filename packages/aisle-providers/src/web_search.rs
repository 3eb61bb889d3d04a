use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result, payload};

/// One organic result from the web index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebHit {
	pub title: String,
	pub url: String,
	pub snippet: String,
	pub score: Option<f32>,
}

pub async fn search(
	cfg: &aisle_config::WebSearchProviderConfig,
	query: &str,
	max_results: u32,
) -> Result<Vec<WebHit>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&request_body(cfg, query, max_results))
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let hits = parse_search_response(json)?;

	tracing::debug!(query, count = hits.len(), "Web search returned results.");

	Ok(hits)
}

fn request_body(cfg: &aisle_config::WebSearchProviderConfig, query: &str, max_results: u32) -> Value {
	let mut body = serde_json::json!({
		"query": query,
		"max_results": max_results,
		"topic": "general",
	});

	if !cfg.include_domains.is_empty() {
		body["include_domains"] = serde_json::json!(cfg.include_domains);
	}
	if !cfg.exclude_domains.is_empty() {
		body["exclude_domains"] = serde_json::json!(cfg.exclude_domains);
	}
	if let Some(days) = cfg.recency_days {
		body["days"] = serde_json::json!(days);
	}

	body
}

fn parse_search_response(json: Value) -> Result<Vec<WebHit>> {
	let object = payload::decode_object(json)?;
	let results = object
		.get("results")
		.and_then(Value::as_array)
		.ok_or_else(|| Error::invalid_response("Web search response is missing results array."))?;

	Ok(results.iter().filter_map(Value::as_object).map(hit_from_object).collect())
}

fn hit_from_object(item: &Map<String, Value>) -> WebHit {
	let text = |key: &str| item.get(key).and_then(Value::as_str).unwrap_or_default().to_string();
	let snippet = item
		.get("content")
		.or_else(|| item.get("snippet"))
		.and_then(Value::as_str)
		.unwrap_or_default()
		.to_string();

	WebHit {
		title: text("title"),
		url: text("url"),
		snippet,
		score: item.get("score").and_then(Value::as_f64).map(|score| score as f32),
	}
}
