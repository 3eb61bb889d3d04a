use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub catalog: Catalog,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	/// Streamable HTTP endpoint of the catalog and web search tools.
	#[serde(default = "default_mcp_bind")]
	pub mcp_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub llm: LlmProviderConfig,
	pub embedding: EmbeddingProviderConfig,
	pub web_search: WebSearchProviderConfig,
}

/// OpenAI-compatible chat completion endpoint shared by every reasoning stage.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
	#[serde(default)]
	pub include_domains: Vec<String>,
	#[serde(default)]
	pub exclude_domains: Vec<String>,
	pub recency_days: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
	pub qdrant: Qdrant,
	pub source: CatalogSource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	/// Named vector to query. Unset for collections with a single unnamed vector.
	pub vector_name: Option<String>,
	pub vector_dim: u32,
}

/// Raw catalog export the index was built from. Product URLs are resolved from it by id.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogSource {
	pub csv_path: PathBuf,
	#[serde(default = "default_id_column")]
	pub id_column: String,
	#[serde(default = "default_url_column")]
	pub url_column: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub n_results: u32,
	pub candidate_multiplier: u32,
	pub web_n_results: u32,
	pub reconcile_catalog_limit: u32,
	pub fallback_catalog_cap: u32,
	pub fallback_web_cap: u32,
	pub snippet_chars: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			n_results: 5,
			candidate_multiplier: 2,
			web_n_results: 3,
			reconcile_catalog_limit: 3,
			fallback_catalog_cap: 5,
			fallback_web_cap: 3,
			snippet_chars: 300,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	pub stage_timeout_ms: u64,
	pub answer_record_limit: u32,
	pub max_web_urls: u32,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self { stage_timeout_ms: 30_000, answer_record_limit: 5, max_web_urls: 5 }
	}
}

fn default_mcp_bind() -> String {
	"127.0.0.1:9091".to_string()
}

fn default_id_column() -> String {
	"uniq_id".to_string()
}

fn default_url_column() -> String {
	"product_url".to_string()
}
