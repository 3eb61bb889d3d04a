use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use color_eyre::Result;
use rmcp::{
	ErrorData, ServerHandler,
	handler::server::router::tool::ToolRouter,
	model::{CallToolResult, JsonObject, ServerCapabilities, ServerInfo},
	transport::streamable_http_server::{
		StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
	},
};
use serde_json::Value;
use tokio::net::TcpListener;

use aisle_domain::SearchParams;
use aisle_service::{CatalogSearchClient, RawCatalogRecord, RawWebRecord, WebScope, WebSearchClient};

pub const TOOL_RAG_SEARCH: &str = "rag_search";
pub const TOOL_WEB_SEARCH: &str = "web_search";

const DEFAULT_WEB_N_RESULTS: u32 = 5;

#[derive(Clone)]
pub struct AisleMcp {
	catalog: Arc<dyn CatalogSearchClient>,
	web: Arc<dyn WebSearchClient>,
	default_n_results: u32,
	tool_router: ToolRouter<Self>,
}
impl AisleMcp {
	pub fn new(
		catalog: Arc<dyn CatalogSearchClient>,
		web: Arc<dyn WebSearchClient>,
		default_n_results: u32,
	) -> Self {
		Self { catalog, web, default_n_results, tool_router: Self::tool_router() }
	}

	pub fn tool_names(&self) -> Vec<String> {
		self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect()
	}
}

#[rmcp::tool_router]
impl AisleMcp {
	#[rmcp::tool(
		name = "rag_search",
		description = "Search the private product catalog. Filters by brand, category, price range and required text, then optionally reranks by similarity to the query.",
		input_schema = rag_search_schema()
	)]
	pub async fn rag_search(&self, params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let search = search_params(params, self.default_n_results)?;
		let records = self
			.catalog
			.search(&search)
			.await
			.map_err(|err| ErrorData::internal_error(format!("Catalog search failed: {err}"), None))?;

		tracing::info!(query = %search.query, count = records.len(), "Served rag_search.");

		Ok(CallToolResult::structured(serde_json::json!({
			"query": search.query,
			"results": records.iter().map(catalog_result).collect::<Vec<_>>(),
		})))
	}

	#[rmcp::tool(
		name = "web_search",
		description = "Search the live web for product pages, reviews and prices.",
		input_schema = web_search_schema()
	)]
	pub async fn web_search(&self, mut params: JsonObject) -> Result<CallToolResult, ErrorData> {
		let query = take_required_string(&mut params, "query")?;
		let n_results = take_optional_u32(&mut params, "n_results")?.unwrap_or(DEFAULT_WEB_N_RESULTS);
		let scope = WebScope {
			include_domains: take_string_list(&mut params, "include_domains")?,
			exclude_domains: take_string_list(&mut params, "exclude_domains")?,
			recency_days: take_optional_u32(&mut params, "recency_days")?,
		};
		let records = self
			.web
			.search_scoped(&query, n_results, &scope)
			.await
			.map_err(|err| ErrorData::internal_error(format!("Web search failed: {err}"), None))?;

		tracing::info!(query = %query, count = records.len(), "Served web_search.");

		Ok(CallToolResult::structured(serde_json::json!({
			"query": query,
			"results": records.iter().map(web_result).collect::<Vec<_>>(),
		})))
	}
}

#[rmcp::tool_handler]
impl ServerHandler for AisleMcp {
	fn get_info(&self) -> ServerInfo {
		ServerInfo {
			instructions: Some(
				"Product catalog and live web search tools for shopping questions.".to_string(),
			),
			capabilities: ServerCapabilities::builder().enable_tools().build(),
			..Default::default()
		}
	}
}

pub async fn serve_mcp(bind_addr: SocketAddr, mcp: AisleMcp) -> Result<()> {
	let session_manager: Arc<LocalSessionManager> = Default::default();
	let service = StreamableHttpService::new(
		move || Ok(mcp.clone()),
		session_manager,
		StreamableHttpServerConfig::default(),
	);
	let router = Router::new().fallback_service(service);
	let listener = TcpListener::bind(bind_addr).await?;

	axum::serve(listener, router).await?;

	Ok(())
}

/// Builds catalog search parameters from tool arguments. `n_results` and `rerank`
/// default to the configured result count and `true`.
pub fn search_params(mut params: JsonObject, default_n_results: u32) -> Result<SearchParams, ErrorData> {
	let mut search = SearchParams::for_query(take_required_string(&mut params, "query")?);

	search.n_results = take_optional_u32(&mut params, "n_results")?.unwrap_or(default_n_results);
	search.brand = take_optional_string(&mut params, "brand")?;
	search.category = take_optional_string(&mut params, "category")?;
	search.max_price = take_optional_f64(&mut params, "max_price")?;
	search.min_price = take_optional_f64(&mut params, "min_price")?;
	search.must_contain = take_optional_string(&mut params, "must_contain")?;
	search.rerank = match params.remove("rerank") {
		None | Some(Value::Null) => true,
		Some(Value::Bool(rerank)) => rerank,
		Some(_) => return Err(ErrorData::invalid_params("rerank must be a boolean.", None)),
	};

	Ok(search)
}

fn catalog_result(record: &RawCatalogRecord) -> Value {
	let price = match &record.price {
		Some(Value::String(text)) => Value::String(text.clone()),
		Some(Value::Number(number)) => Value::String(number.to_string()),
		_ => Value::String(String::new()),
	};

	serde_json::json!({
		"uniq_id": record.uniq_id.clone().or_else(|| record.doc_id.clone()).unwrap_or_default(),
		"doc_id": record.doc_id.clone().unwrap_or_default(),
		"title": record.title,
		"brand": record.brand,
		"category": record.category,
		"price": price,
		"ingredients": record.ingredients,
		"score": record.score,
		"snippet": record.snippet,
	})
}

fn web_result(record: &RawWebRecord) -> Value {
	serde_json::json!({
		"title": record.title,
		"url": record.url.clone().unwrap_or_default(),
		"snippet": record.snippet,
		"score": record.score,
	})
}

fn take_required_string(params: &mut JsonObject, key: &str) -> Result<String, ErrorData> {
	take_optional_string(params, key)?
		.ok_or_else(|| ErrorData::invalid_params(format!("{key} is required."), None))
}

/// Blank strings count as absent.
fn take_optional_string(params: &mut JsonObject, key: &str) -> Result<Option<String>, ErrorData> {
	match params.remove(key) {
		None | Some(Value::Null) => Ok(None),
		Some(Value::String(text)) => {
			let text = text.trim();

			Ok((!text.is_empty()).then(|| text.to_string()))
		},
		Some(_) => Err(ErrorData::invalid_params(format!("{key} must be a string."), None)),
	}
}

fn take_optional_u32(params: &mut JsonObject, key: &str) -> Result<Option<u32>, ErrorData> {
	match params.remove(key) {
		None | Some(Value::Null) => Ok(None),
		Some(value) => value
			.as_u64()
			.and_then(|number| u32::try_from(number).ok())
			.map(Some)
			.ok_or_else(|| {
				ErrorData::invalid_params(format!("{key} must be a non-negative integer."), None)
			}),
	}
}

fn take_optional_f64(params: &mut JsonObject, key: &str) -> Result<Option<f64>, ErrorData> {
	match params.remove(key) {
		None | Some(Value::Null) => Ok(None),
		Some(value) => value
			.as_f64()
			.filter(|number| number.is_finite())
			.map(Some)
			.ok_or_else(|| ErrorData::invalid_params(format!("{key} must be a number."), None)),
	}
}

fn take_string_list(params: &mut JsonObject, key: &str) -> Result<Vec<String>, ErrorData> {
	let invalid = || ErrorData::invalid_params(format!("{key} must be a list of strings."), None);

	match params.remove(key) {
		None | Some(Value::Null) => Ok(Vec::new()),
		Some(Value::Array(items)) => items
			.into_iter()
			.map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
			.collect(),
		Some(_) => Err(invalid()),
	}
}

fn rag_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["query"],
		"properties": {
			"query": { "type": "string" },
			"n_results": { "type": ["integer", "null"] },
			"brand": { "type": ["string", "null"] },
			"category": { "type": ["string", "null"] },
			"max_price": { "type": ["number", "null"] },
			"min_price": { "type": ["number", "null"] },
			"must_contain": { "type": ["string", "null"] },
			"rerank": { "type": ["boolean", "null"] }
		}
	}))
}

fn web_search_schema() -> Arc<JsonObject> {
	Arc::new(rmcp::object!({
		"type": "object",
		"additionalProperties": false,
		"required": ["query"],
		"properties": {
			"query": { "type": "string" },
			"n_results": { "type": ["integer", "null"] },
			"include_domains": { "type": ["array", "null"], "items": { "type": "string" } },
			"exclude_domains": { "type": ["array", "null"], "items": { "type": "string" } },
			"recency_days": { "type": ["integer", "null"] }
		}
	}))
}
