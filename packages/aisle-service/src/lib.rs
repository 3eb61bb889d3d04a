pub mod answer;
pub mod ask;
pub mod catalog_search;
pub mod classifier;
pub mod comparison;
pub mod pipeline;
pub mod planner;
pub mod provenance;
pub mod reconciler;
pub mod retriever;
pub mod synthesizer;
pub mod time_serde;
pub mod web;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use serde_json::Value;

pub use answer::{Answer, CRISIS_MESSAGE, NO_RESULTS_MESSAGE};
pub use ask::{AskRequest, AskResponse};
pub use catalog_search::{CatalogSearch, CatalogSearchOutcome, HttpEmbedding};
pub use classifier::LlmIntentClassifier;
pub use comparison::{ComparisonRow, ComparisonTable};
pub use pipeline::{PipelineController, PipelineSettings, PipelineState, Stage};
pub use planner::LlmRetrievalPlanner;
pub use provenance::{RawCatalogRecord, RawWebRecord};
pub use reconciler::LlmReconciler;
pub use retriever::{Retriever, RetrieverSettings};
pub use synthesizer::LlmAnswerSynthesizer;
pub use web::{TavilyWebSearch, WebScope};

use aisle_catalog::{qdrant::QdrantCatalog, urls::ProductUrls};
use aisle_config::Config;
use aisle_domain::{CatalogRecord, IndexHit, Intent, Record, RetrievalPlan, SearchParams, WebRecord};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub const INTENT_CLASSIFIER: &str = "intent_classifier";
pub const RETRIEVAL_PLANNER: &str = "retrieval_planner";
pub const CATALOG_SEARCH: &str = "catalog_search";
pub const WEB_SEARCH: &str = "web_search";
pub const RECONCILIATION: &str = "reconciliation";
pub const ANSWER_SYNTHESIZER: &str = "answer_synthesizer";
pub const EMBEDDING: &str = "embedding";
pub const CATALOG_INDEX: &str = "catalog_index";

pub trait IntentClassifier
where
	Self: Send + Sync,
{
	fn classify<'a>(&'a self, user_text: &'a str) -> BoxFuture<'a, Result<Intent>>;
}

pub trait RetrievalPlanner
where
	Self: Send + Sync,
{
	fn plan<'a>(&'a self, intent: &'a Intent) -> BoxFuture<'a, Result<RetrievalPlan>>;
}

pub trait CatalogSearchClient
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, params: &'a SearchParams) -> BoxFuture<'a, Result<Vec<RawCatalogRecord>>>;
}

pub trait WebSearchClient
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: &'a str, n_results: u32) -> BoxFuture<'a, Result<Vec<RawWebRecord>>>;

	/// Searches with per-call domain and recency limits. Clients without such controls
	/// ignore `scope`.
	fn search_scoped<'a>(
		&'a self,
		query: &'a str,
		n_results: u32,
		scope: &'a WebScope,
	) -> BoxFuture<'a, Result<Vec<RawWebRecord>>> {
		let _ = scope;

		self.search(query, n_results)
	}
}

/// Maps a catalog `uniq_id` to its canonical product URL.
pub trait ProductUrlLookup
where
	Self: Send + Sync,
{
	fn resolve(&self, uniq_id: &str) -> Option<String>;
}

pub trait ReconciliationService
where
	Self: Send + Sync,
{
	fn reconcile<'a>(
		&'a self,
		catalog: &'a [CatalogRecord],
		web: &'a [WebRecord],
		criteria: &'a [String],
	) -> BoxFuture<'a, Result<Reconciliation>>;
}

pub trait AnswerSynthesizer
where
	Self: Send + Sync,
{
	fn synthesize<'a>(&'a self, request: SynthesisRequest<'a>) -> BoxFuture<'a, Result<Synthesis>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait CatalogIndex
where
	Self: Send + Sync,
{
	fn nearest<'a>(&'a self, vector: &'a [f32], limit: u32) -> BoxFuture<'a, Result<Vec<IndexHit>>>;
}

/// Untrusted output of the reconciliation service.
///
/// `records` are raw entries; nothing in them is believed until matched back to a
/// retrieved record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
	pub records: Vec<Value>,
	pub conflicts: Vec<String>,
	pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct SynthesisRequest<'a> {
	pub task: &'a str,
	pub records: &'a [Record],
	pub conflicts: &'a [String],
	pub recommendations: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
	pub answer: String,
	pub grounded: bool,
	pub issues: Vec<String>,
}

#[derive(Clone)]
pub struct Collaborators {
	pub classifier: Arc<dyn IntentClassifier>,
	pub planner: Arc<dyn RetrievalPlanner>,
	pub catalog: Arc<dyn CatalogSearchClient>,
	pub web: Arc<dyn WebSearchClient>,
	pub urls: Arc<dyn ProductUrlLookup>,
	pub reconciler: Arc<dyn ReconciliationService>,
	pub synthesizer: Arc<dyn AnswerSynthesizer>,
}
impl Collaborators {
	/// The network-backed collaborators described by `cfg`.
	pub fn from_config(cfg: &Config, catalog: QdrantCatalog, urls: ProductUrls) -> Self {
		let llm = &cfg.providers.llm;
		let search = CatalogSearch::new(
			Arc::new(catalog),
			Arc::new(HttpEmbedding::new(cfg.providers.embedding.clone())),
			cfg.retrieval.candidate_multiplier,
			cfg.retrieval.snippet_chars as usize,
		);

		Self {
			classifier: Arc::new(LlmIntentClassifier::new(llm.clone())),
			planner: Arc::new(LlmRetrievalPlanner::new(llm.clone(), cfg.retrieval.n_results)),
			catalog: Arc::new(search),
			web: Arc::new(TavilyWebSearch::new(cfg.providers.web_search.clone())),
			urls: Arc::new(urls),
			reconciler: Arc::new(LlmReconciler::new(llm.clone())),
			synthesizer: Arc::new(LlmAnswerSynthesizer::new(llm.clone())),
		}
	}
}

pub struct AisleService {
	pub cfg: Config,
	pub pipeline: PipelineController,
}
impl AisleService {
	pub fn new(cfg: Config, catalog: QdrantCatalog, urls: ProductUrls) -> Self {
		let collaborators = Collaborators::from_config(&cfg, catalog, urls);

		Self::with_collaborators(cfg, collaborators)
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		let pipeline = PipelineController::new(collaborators, PipelineSettings::from_config(&cfg));

		Self { cfg, pipeline }
	}
}

impl ProductUrlLookup for ProductUrls {
	fn resolve(&self, uniq_id: &str) -> Option<String> {
		ProductUrls::resolve(self, uniq_id).map(str::to_string)
	}
}

impl CatalogIndex for QdrantCatalog {
	fn nearest<'a>(&'a self, vector: &'a [f32], limit: u32) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		Box::pin(async move {
			QdrantCatalog::nearest(self, vector, limit)
				.await
				.map_err(|err| Error::from_catalog(CATALOG_INDEX, err))
		})
	}
}

/// Bounds one collaborator call by `timeout`.
pub(crate) async fn timed<T, F>(collaborator: &'static str, timeout: Duration, fut: F) -> Result<T>
where
	F: Future<Output = Result<T>>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(result) => result,
		Err(_) => Err(Error::Timeout { collaborator, timeout_ms: timeout.as_millis() as u64 }),
	}
}
