use serde::{Deserialize, Serialize};

use crate::{BoxFuture, Error, RawWebRecord, Result, WEB_SEARCH, WebSearchClient};
use aisle_config::WebSearchProviderConfig;
use aisle_providers::web_search;

/// Per-call overrides for the configured web search limits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebScope {
	#[serde(default)]
	pub include_domains: Vec<String>,
	#[serde(default)]
	pub exclude_domains: Vec<String>,
	#[serde(default)]
	pub recency_days: Option<u32>,
}

/// Live web search through a Tavily-compatible endpoint.
pub struct TavilyWebSearch {
	cfg: WebSearchProviderConfig,
}
impl TavilyWebSearch {
	pub fn new(cfg: WebSearchProviderConfig) -> Self {
		Self { cfg }
	}
}

impl WebSearchClient for TavilyWebSearch {
	fn search<'a>(&'a self, query: &'a str, n_results: u32) -> BoxFuture<'a, Result<Vec<RawWebRecord>>> {
		Box::pin(search_records(&self.cfg, query, n_results))
	}

	fn search_scoped<'a>(
		&'a self,
		query: &'a str,
		n_results: u32,
		scope: &'a WebScope,
	) -> BoxFuture<'a, Result<Vec<RawWebRecord>>> {
		Box::pin(async move {
			let cfg = scoped_config(&self.cfg, scope);

			search_records(&cfg, query, n_results).await
		})
	}
}

async fn search_records(
	cfg: &WebSearchProviderConfig,
	query: &str,
	n_results: u32,
) -> Result<Vec<RawWebRecord>> {
	let hits = web_search::search(cfg, query, n_results)
		.await
		.map_err(|err| Error::from_provider(WEB_SEARCH, err))?;

	Ok(hits
		.into_iter()
		.map(|hit| RawWebRecord {
			title: hit.title,
			url: Some(hit.url),
			snippet: hit.snippet,
			score: hit.score,
			uniq_id: None,
			doc_id: None,
		})
		.collect())
}

/// Non-empty scope lists and a set recency replace the configured values.
fn scoped_config(cfg: &WebSearchProviderConfig, scope: &WebScope) -> WebSearchProviderConfig {
	let mut scoped = cfg.clone();
	let domains = |list: &[String]| {
		list.iter()
			.map(|domain| domain.trim())
			.filter(|domain| !domain.is_empty())
			.map(str::to_string)
			.collect::<Vec<_>>()
	};
	let include = domains(&scope.include_domains);
	let exclude = domains(&scope.exclude_domains);

	if !include.is_empty() {
		scoped.include_domains = include;
	}
	if !exclude.is_empty() {
		scoped.exclude_domains = exclude;
	}
	if scope.recency_days.is_some() {
		scoped.recency_days = scope.recency_days;
	}

	scoped
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn cfg() -> WebSearchProviderConfig {
		WebSearchProviderConfig {
			provider_id: "tavily".to_string(),
			api_base: "http://127.0.0.1:1".to_string(),
			api_key: "key".to_string(),
			path: "/search".to_string(),
			timeout_ms: 1_000,
			default_headers: Map::new(),
			include_domains: vec!["amazon.com".to_string()],
			exclude_domains: vec!["pinterest.com".to_string()],
			recency_days: Some(30),
		}
	}

	#[test]
	fn empty_scope_keeps_configured_limits() {
		assert_eq!(scoped_config(&cfg(), &WebScope::default()).include_domains, vec!["amazon.com"]);
		assert_eq!(scoped_config(&cfg(), &WebScope::default()).recency_days, Some(30));
	}

	#[test]
	fn scope_replaces_configured_limits() {
		let scope = WebScope {
			include_domains: vec![" target.com ".to_string(), " ".to_string()],
			exclude_domains: Vec::new(),
			recency_days: Some(7),
		};
		let scoped = scoped_config(&cfg(), &scope);

		assert_eq!(scoped.include_domains, vec!["target.com"]);
		assert_eq!(scoped.exclude_domains, vec!["pinterest.com"]);
		assert_eq!(scoped.recency_days, Some(7));
	}
}
