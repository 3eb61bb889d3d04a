use std::{
	collections::HashSet,
	fs,
	path::{Path, PathBuf},
	time::Instant,
};

use clap::Parser;
use color_eyre::eyre;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use aisle_catalog::{qdrant::QdrantCatalog, urls::ProductUrls};
use aisle_domain::Route;
use aisle_service::{AisleService, PipelineState, Stage};

#[derive(Debug, Parser)]
#[command(
	version = aisle_cli::VERSION,
	rename_all = "kebab",
	styles = aisle_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	#[arg(long, short = 'd', value_name = "FILE")]
	pub dataset: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct EvalDataset {
	pub name: Option<String>,
	pub queries: Vec<EvalQuery>,
}

#[derive(Debug, Deserialize)]
pub struct EvalQuery {
	pub id: Option<String>,
	pub query: String,
	pub expected_route: Option<Route>,
	#[serde(default)]
	pub expected_uniq_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EvalOutput {
	pub dataset: EvalDatasetInfo,
	pub summary: EvalSummary,
	pub queries: Vec<QueryReport>,
}

#[derive(Debug, Serialize)]
pub struct EvalDatasetInfo {
	pub name: String,
	pub query_count: usize,
}

#[derive(Debug, Serialize)]
pub struct EvalSummary {
	/// Share of queries with an expected route whose classified route matched.
	pub route_accuracy: f64,
	/// Mean over queries that list expected ids.
	pub avg_recall_at_k: f64,
	pub latency_ms_p50: f64,
	pub latency_ms_p95: f64,
	pub fallback_count: usize,
}

#[derive(Debug, Serialize)]
pub struct QueryReport {
	pub id: String,
	pub query: String,
	pub turn_id: Uuid,
	pub route: Option<Route>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub route_match: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub recall_at_k: Option<f64>,
	pub expected_uniq_ids: Vec<String>,
	pub retrieved_uniq_ids: Vec<String>,
	pub record_count: usize,
	pub conflict_count: usize,
	pub visited: Vec<Stage>,
	pub fallbacks: Vec<Stage>,
	pub latency_ms: f64,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = aisle_config::load(&args.config)?;

	init_tracing(&config);

	let dataset = load_dataset(&args.dataset)?;
	let source = &config.catalog.source;
	let urls = ProductUrls::from_csv_path(&source.csv_path, &source.id_column, &source.url_column)?;
	let catalog = QdrantCatalog::new(&config.catalog.qdrant)?;
	let service = AisleService::new(config, catalog, urls);
	let output = evaluate(&service, &dataset).await;
	let json = serde_json::to_string_pretty(&output)?;

	println!("{json}");

	Ok(())
}

fn init_tracing(config: &aisle_config::Config) {
	let filter = log_filter(&config.service.log_level);

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn log_filter(directive: &str) -> EnvFilter {
	EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

pub fn load_dataset(path: &Path) -> color_eyre::Result<EvalDataset> {
	let raw = fs::read_to_string(path)?;
	let dataset: EvalDataset = serde_json::from_str(&raw)?;

	if dataset.queries.is_empty() {
		return Err(eyre::eyre!("Dataset must include at least one query."));
	}

	Ok(dataset)
}

/// Runs every query through the traced pipeline, one at a time.
pub async fn evaluate(service: &AisleService, dataset: &EvalDataset) -> EvalOutput {
	let mut reports = Vec::with_capacity(dataset.queries.len());

	for (index, query) in dataset.queries.iter().enumerate() {
		let id = query.id.clone().unwrap_or_else(|| format!("q{}", index + 1));
		let start = Instant::now();
		let state = service.pipeline.run_traced(query.query.trim()).await;
		let latency_ms = start.elapsed().as_secs_f64() * 1_000.0;

		tracing::debug!(query_id = %id, latency_ms, "Evaluated query.");

		reports.push(report(id, query, state, latency_ms));
	}

	EvalOutput {
		dataset: EvalDatasetInfo {
			name: dataset.name.clone().unwrap_or_else(|| "eval".to_string()),
			query_count: reports.len(),
		},
		summary: summarize(&reports),
		queries: reports,
	}
}

fn report(id: String, query: &EvalQuery, state: PipelineState, latency_ms: f64) -> QueryReport {
	let route = state.intent.as_ref().map(|intent| intent.route);
	let route_match = query.expected_route.map(|expected| route == Some(expected));
	let retrieved_uniq_ids = state
		.result
		.as_ref()
		.map(|result| {
			unique_ids(result.records.iter().filter_map(|record| record.citation()).map(str::to_string))
		})
		.unwrap_or_default();
	let expected: HashSet<&str> = query.expected_uniq_ids.iter().map(String::as_str).collect();
	let recall_at_k = recall(&retrieved_uniq_ids, &expected);

	QueryReport {
		id,
		query: query.query.clone(),
		turn_id: state.turn_id,
		route,
		route_match,
		recall_at_k,
		expected_uniq_ids: query.expected_uniq_ids.clone(),
		retrieved_uniq_ids,
		record_count: state.result.as_ref().map_or(0, |result| result.records.len()),
		conflict_count: state.result.as_ref().map_or(0, |result| result.conflicts.len()),
		visited: state.visited,
		fallbacks: state.fallbacks,
		latency_ms,
	}
}

fn unique_ids<I>(iter: I) -> Vec<String>
where
	I: Iterator<Item = String>,
{
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for id in iter {
		if seen.insert(id.clone()) {
			out.push(id);
		}
	}

	out
}

/// `None` when nothing is expected, so such queries stay out of the average.
fn recall(retrieved: &[String], expected: &HashSet<&str>) -> Option<f64> {
	if expected.is_empty() {
		return None;
	}

	let relevant = retrieved.iter().filter(|id| expected.contains(id.as_str())).count();

	Some(relevant as f64 / expected.len() as f64)
}

fn summarize(reports: &[QueryReport]) -> EvalSummary {
	let routed = reports.iter().filter_map(|r| r.route_match).collect::<Vec<_>>();
	let route_accuracy = mean(routed.iter().map(|matched| if *matched { 1.0 } else { 0.0 }));
	let avg_recall_at_k = mean(reports.iter().filter_map(|r| r.recall_at_k));
	let fallback_count = reports.iter().map(|r| r.fallbacks.len()).sum();

	let mut sorted = reports.iter().map(|r| r.latency_ms).collect::<Vec<_>>();

	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

	EvalSummary {
		route_accuracy,
		avg_recall_at_k,
		latency_ms_p50: percentile(&sorted, 0.50),
		latency_ms_p95: percentile(&sorted, 0.95),
		fallback_count,
	}
}

fn mean<I>(values: I) -> f64
where
	I: Iterator<Item = f64>,
{
	let (sum, count) = values.fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

	if count == 0 { 0.0 } else { sum / count as f64 }
}

fn percentile(values: &[f64], percentile: f64) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let clamped = percentile.clamp(0.0, 1.0);
	let pos = clamped * (values.len() as f64 - 1.0);
	let lower = pos.floor() as usize;
	let upper = pos.ceil() as usize;

	if lower == upper {
		values[lower]
	} else {
		let weight = pos - lower as f64;
		values[lower] * (1.0 - weight) + values[upper] * weight
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use aisle_config::Config;
	use aisle_testkit::{
		Harness, StubCatalog, StubClassifier,
		fixtures::{catalog_raw, intent},
	};

	fn query(text: &str, route: Option<Route>, expected: &[&str]) -> EvalQuery {
		EvalQuery {
			id: None,
			query: text.to_string(),
			expected_route: route,
			expected_uniq_ids: expected.iter().map(|id| id.to_string()).collect(),
		}
	}

	fn config() -> Config {
		let raw = r#"
[service]
http_bind = "127.0.0.1:0"
log_level = "info"

[providers.llm]
provider_id = "test"
api_base = "http://127.0.0.1:1"
api_key = "key"
path = "/chat/completions"
model = "m"
temperature = 0.1
timeout_ms = 1000

[providers.embedding]
provider_id = "test"
api_base = "http://127.0.0.1:1"
api_key = "key"
path = "/embeddings"
model = "m"
dimensions = 4
timeout_ms = 1000

[providers.web_search]
provider_id = "tavily"
api_base = "http://127.0.0.1:1"
api_key = "key"
path = "/search"
timeout_ms = 1000

[catalog.qdrant]
url = "http://127.0.0.1:6334"
collection = "products"
vector_dim = 4

[catalog.source]
csv_path = "catalog.csv"
"#;

		toml::from_str(raw).expect("Test config parses.")
	}

	#[test]
	fn unparseable_log_level_falls_back_to_info() {
		assert_eq!(log_filter("aisle=loud").to_string(), "info");
		assert_eq!(log_filter("debug").to_string(), "debug");
	}

	#[test]
	fn recall_ignores_queries_without_expectations() {
		let retrieved = vec!["a".to_string(), "b".to_string()];

		assert_eq!(recall(&retrieved, &HashSet::new()), None);
		assert_eq!(recall(&retrieved, &HashSet::from(["a", "c"])), Some(0.5));
	}

	#[test]
	fn unique_ids_keep_first_occurrence_order() {
		let ids = ["b", "a", "b", "c"].into_iter().map(str::to_string);

		assert_eq!(unique_ids(ids), vec!["b", "a", "c"]);
	}

	#[test]
	fn percentile_interpolates_between_ranks() {
		let sorted = [10.0, 20.0, 30.0, 40.0];

		assert_eq!(percentile(&sorted, 0.0), 10.0);
		assert_eq!(percentile(&sorted, 0.5), 25.0);
		assert_eq!(percentile(&[], 0.95), 0.0);
	}

	#[test]
	fn dataset_requires_queries() {
		let path = std::env::temp_dir().join(format!("aisle-eval-{}.json", Uuid::new_v4()));

		fs::write(&path, r#"{"name":"empty","queries":[]}"#).expect("Failed to write dataset.");

		let result = load_dataset(&path);

		fs::remove_file(&path).ok();

		assert!(result.is_err());
	}

	#[tokio::test]
	async fn evaluate_reports_route_accuracy_and_recall() {
		let harness = Harness::new()
			.with_classifier(StubClassifier::returning(intent(Route::Search, "steel cleaner")))
			.with_catalog(StubCatalog::returning(vec![
				catalog_raw("u1", "Steel Polish", "12.50"),
				catalog_raw("u2", "Steel Wipes", "6"),
			]));
		let service = AisleService::with_collaborators(config(), harness.collaborators());
		let dataset = EvalDataset {
			name: Some("smoke".to_string()),
			queries: vec![
				query("steel cleaner", Some(Route::Search), &["u1", "u9"]),
				query("steel cleaner", Some(Route::General), &[]),
			],
		};
		let output = evaluate(&service, &dataset).await;

		assert_eq!(output.dataset.query_count, 2);
		assert_eq!(output.queries[0].id, "q1");
		assert_eq!(output.queries[0].retrieved_uniq_ids, vec!["u1", "u2"]);
		assert_eq!(output.queries[0].recall_at_k, Some(0.5));
		assert_eq!(output.queries[1].recall_at_k, None);
		assert_eq!(output.summary.route_accuracy, 0.5);
		assert_eq!(output.summary.avg_recall_at_k, 0.5);
		assert_eq!(output.summary.fallback_count, 0);
	}
}
