//! Hand-written collaborator doubles with call counters and failure switches.

use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use aisle_catalog::urls::ProductUrls;
use aisle_domain::{CatalogRecord, IndexHit, Intent, RetrievalPlan, Route, SearchParams, SourceKind, WebRecord};
use aisle_service::{
	ANSWER_SYNTHESIZER, AnswerSynthesizer, BoxFuture, CATALOG_INDEX, CATALOG_SEARCH, CatalogIndex,
	CatalogSearchClient, Collaborators, EMBEDDING, EmbeddingProvider, Error, INTENT_CLASSIFIER,
	IntentClassifier, PipelineController, PipelineSettings, RECONCILIATION, RETRIEVAL_PLANNER,
	RawCatalogRecord, RawWebRecord, Reconciliation, ReconciliationService, Result, RetrievalPlanner,
	Retriever, RetrieverSettings, Synthesis, SynthesisRequest, WEB_SEARCH, WebScope, WebSearchClient,
};

use crate::fixtures;

fn unavailable(collaborator: &'static str) -> Error {
	Error::unavailable(collaborator, "stubbed outage")
}

fn bump(calls: &Arc<AtomicUsize>) {
	calls.fetch_add(1, Ordering::SeqCst);
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

pub struct StubClassifier {
	intent: Option<Intent>,
	pub calls: Arc<AtomicUsize>,
}
impl StubClassifier {
	pub fn returning(intent: Intent) -> Self {
		Self { intent: Some(intent), calls: Arc::new(AtomicUsize::new(0)) }
	}

	pub fn failing() -> Self {
		Self { intent: None, calls: Arc::new(AtomicUsize::new(0)) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl IntentClassifier for StubClassifier {
	fn classify<'a>(&'a self, _user_text: &'a str) -> BoxFuture<'a, Result<Intent>> {
		bump(&self.calls);

		Box::pin(async move { self.intent.clone().ok_or_else(|| unavailable(INTENT_CLASSIFIER)) })
	}
}

pub struct StubPlanner {
	plan: Option<RetrievalPlan>,
	pub calls: Arc<AtomicUsize>,
	pub seen: Mutex<Vec<Intent>>,
}
impl StubPlanner {
	pub fn returning(plan: RetrievalPlan) -> Self {
		Self { plan: Some(plan), calls: Arc::new(AtomicUsize::new(0)), seen: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { plan: None, calls: Arc::new(AtomicUsize::new(0)), seen: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl RetrievalPlanner for StubPlanner {
	fn plan<'a>(&'a self, intent: &'a Intent) -> BoxFuture<'a, Result<RetrievalPlan>> {
		bump(&self.calls);
		lock(&self.seen).push(intent.clone());

		Box::pin(async move { self.plan.clone().ok_or_else(|| unavailable(RETRIEVAL_PLANNER)) })
	}
}

pub struct StubCatalog {
	records: Option<Vec<RawCatalogRecord>>,
	pub calls: Arc<AtomicUsize>,
	pub queries: Mutex<Vec<SearchParams>>,
}
impl StubCatalog {
	pub fn returning(records: Vec<RawCatalogRecord>) -> Self {
		Self { records: Some(records), calls: Arc::new(AtomicUsize::new(0)), queries: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { records: None, calls: Arc::new(AtomicUsize::new(0)), queries: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl CatalogSearchClient for StubCatalog {
	fn search<'a>(&'a self, params: &'a SearchParams) -> BoxFuture<'a, Result<Vec<RawCatalogRecord>>> {
		bump(&self.calls);
		lock(&self.queries).push(params.clone());

		Box::pin(async move { self.records.clone().ok_or_else(|| unavailable(CATALOG_SEARCH)) })
	}
}

pub struct StubWeb {
	records: Option<Vec<RawWebRecord>>,
	delay: Option<Duration>,
	pub calls: Arc<AtomicUsize>,
	pub queries: Mutex<Vec<(String, u32)>>,
	/// Scopes passed to `search_scoped`, in call order.
	pub scopes: Mutex<Vec<WebScope>>,
}
impl StubWeb {
	pub fn returning(records: Vec<RawWebRecord>) -> Self {
		Self::with_records(Some(records))
	}

	pub fn failing() -> Self {
		Self::with_records(None)
	}

	fn with_records(records: Option<Vec<RawWebRecord>>) -> Self {
		Self {
			records,
			delay: None,
			calls: Arc::new(AtomicUsize::new(0)),
			queries: Mutex::new(Vec::new()),
			scopes: Mutex::new(Vec::new()),
		}
	}

	/// Answers only after `delay`, for timeout tests.
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl WebSearchClient for StubWeb {
	fn search<'a>(&'a self, query: &'a str, n_results: u32) -> BoxFuture<'a, Result<Vec<RawWebRecord>>> {
		bump(&self.calls);
		lock(&self.queries).push((query.to_string(), n_results));

		Box::pin(async move {
			if let Some(delay) = self.delay {
				tokio::time::sleep(delay).await;
			}

			self.records.clone().ok_or_else(|| unavailable(WEB_SEARCH))
		})
	}

	fn search_scoped<'a>(
		&'a self,
		query: &'a str,
		n_results: u32,
		scope: &'a WebScope,
	) -> BoxFuture<'a, Result<Vec<RawWebRecord>>> {
		lock(&self.scopes).push(scope.clone());

		self.search(query, n_results)
	}
}

pub struct StubReconciler {
	output: Option<Reconciliation>,
	pub calls: Arc<AtomicUsize>,
	/// Catalog record count offered on each call.
	pub offered: Mutex<Vec<usize>>,
}
impl StubReconciler {
	pub fn returning(output: Reconciliation) -> Self {
		Self { output: Some(output), calls: Arc::new(AtomicUsize::new(0)), offered: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { output: None, calls: Arc::new(AtomicUsize::new(0)), offered: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl ReconciliationService for StubReconciler {
	fn reconcile<'a>(
		&'a self,
		catalog: &'a [CatalogRecord],
		_web: &'a [WebRecord],
		_criteria: &'a [String],
	) -> BoxFuture<'a, Result<Reconciliation>> {
		bump(&self.calls);
		lock(&self.offered).push(catalog.len());

		Box::pin(async move { self.output.clone().ok_or_else(|| unavailable(RECONCILIATION)) })
	}
}

pub struct StubSynthesizer {
	synthesis: Option<Synthesis>,
	pub calls: Arc<AtomicUsize>,
	/// Record count offered on each call.
	pub offered: Mutex<Vec<usize>>,
}
impl StubSynthesizer {
	pub fn returning(synthesis: Synthesis) -> Self {
		Self { synthesis: Some(synthesis), calls: Arc::new(AtomicUsize::new(0)), offered: Mutex::new(Vec::new()) }
	}

	pub fn answering(answer: &str) -> Self {
		Self::returning(Synthesis { answer: answer.to_string(), grounded: true, issues: Vec::new() })
	}

	pub fn failing() -> Self {
		Self { synthesis: None, calls: Arc::new(AtomicUsize::new(0)), offered: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl AnswerSynthesizer for StubSynthesizer {
	fn synthesize<'a>(&'a self, request: SynthesisRequest<'a>) -> BoxFuture<'a, Result<Synthesis>> {
		bump(&self.calls);
		lock(&self.offered).push(request.records.len());

		Box::pin(async move { self.synthesis.clone().ok_or_else(|| unavailable(ANSWER_SYNTHESIZER)) })
	}
}

/// Bag-of-words embedding over a fixed vocabulary, plus a constant bias term.
pub struct KeywordEmbedding {
	vocabulary: Vec<String>,
	fail_from_call: Option<usize>,
	pub calls: Arc<AtomicUsize>,
}
impl KeywordEmbedding {
	pub fn new(vocabulary: &[&str]) -> Self {
		Self {
			vocabulary: vocabulary.iter().map(|word| word.to_lowercase()).collect(),
			fail_from_call: None,
			calls: Arc::new(AtomicUsize::new(0)),
		}
	}

	/// Fails every call from the `call`-th onwards (1-based).
	pub fn failing_from(mut self, call: usize) -> Self {
		self.fail_from_call = Some(call);

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		let text = text.to_lowercase();
		let mut vector =
			self.vocabulary.iter().map(|word| if text.contains(word) { 1.0 } else { 0.0 }).collect::<Vec<_>>();

		vector.push(0.1);

		vector
	}
}

impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		Box::pin(async move {
			if self.fail_from_call.is_some_and(|from| call >= from) {
				return Err(unavailable(EMBEDDING));
			}

			Ok(texts.iter().map(|text| self.vector(text)).collect())
		})
	}
}

/// Similarity index returning canned hits in order.
pub struct StubIndex {
	hits: Option<Vec<IndexHit>>,
	pub calls: Arc<AtomicUsize>,
	pub limits: Mutex<Vec<u32>>,
}
impl StubIndex {
	pub fn returning(hits: Vec<IndexHit>) -> Self {
		Self { hits: Some(hits), calls: Arc::new(AtomicUsize::new(0)), limits: Mutex::new(Vec::new()) }
	}

	pub fn failing() -> Self {
		Self { hits: None, calls: Arc::new(AtomicUsize::new(0)), limits: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl CatalogIndex for StubIndex {
	fn nearest<'a>(&'a self, _vector: &'a [f32], limit: u32) -> BoxFuture<'a, Result<Vec<IndexHit>>> {
		bump(&self.calls);
		lock(&self.limits).push(limit);

		Box::pin(async move {
			let hits = self.hits.as_ref().ok_or_else(|| unavailable(CATALOG_INDEX))?;

			Ok(hits.iter().take(limit as usize).cloned().collect())
		})
	}
}

/// One stub per collaborator, kept so tests can assert on call counts.
pub struct Harness {
	pub classifier: Arc<StubClassifier>,
	pub planner: Arc<StubPlanner>,
	pub catalog: Arc<dyn CatalogSearchClient>,
	pub catalog_stub: Arc<StubCatalog>,
	pub web: Arc<StubWeb>,
	pub urls: Arc<ProductUrls>,
	pub reconciler: Arc<StubReconciler>,
	pub synthesizer: Arc<StubSynthesizer>,
}
impl Harness {
	/// A catalog-only search turn over an empty catalog.
	pub fn new() -> Self {
		let catalog_stub = Arc::new(StubCatalog::returning(Vec::new()));

		Self {
			classifier: Arc::new(StubClassifier::returning(fixtures::intent(Route::Search, "steel cleaner"))),
			planner: Arc::new(StubPlanner::returning(fixtures::plan(&[SourceKind::Private], "steel cleaner"))),
			catalog: catalog_stub.clone(),
			catalog_stub,
			web: Arc::new(StubWeb::returning(Vec::new())),
			urls: Arc::new(ProductUrls::default()),
			reconciler: Arc::new(StubReconciler::failing()),
			synthesizer: Arc::new(StubSynthesizer::answering("Try the steel polish.")),
		}
	}

	pub fn with_classifier(mut self, classifier: StubClassifier) -> Self {
		self.classifier = Arc::new(classifier);

		self
	}

	pub fn with_planner(mut self, planner: StubPlanner) -> Self {
		self.planner = Arc::new(planner);

		self
	}

	pub fn with_catalog(mut self, catalog: StubCatalog) -> Self {
		let catalog = Arc::new(catalog);

		self.catalog = catalog.clone();
		self.catalog_stub = catalog;

		self
	}

	/// Replaces the catalog client with a real one, such as `CatalogSearch` over stubs.
	pub fn with_catalog_client(mut self, catalog: Arc<dyn CatalogSearchClient>) -> Self {
		self.catalog = catalog;

		self
	}

	pub fn with_web(mut self, web: StubWeb) -> Self {
		self.web = Arc::new(web);

		self
	}

	pub fn with_urls(mut self, urls: ProductUrls) -> Self {
		self.urls = Arc::new(urls);

		self
	}

	pub fn with_reconciler(mut self, reconciler: StubReconciler) -> Self {
		self.reconciler = Arc::new(reconciler);

		self
	}

	pub fn with_synthesizer(mut self, synthesizer: StubSynthesizer) -> Self {
		self.synthesizer = Arc::new(synthesizer);

		self
	}

	pub fn collaborators(&self) -> Collaborators {
		Collaborators {
			classifier: self.classifier.clone(),
			planner: self.planner.clone(),
			catalog: self.catalog.clone(),
			web: self.web.clone(),
			urls: self.urls.clone(),
			reconciler: self.reconciler.clone(),
			synthesizer: self.synthesizer.clone(),
		}
	}

	pub fn controller(&self) -> PipelineController {
		self.controller_with(PipelineSettings::default())
	}

	pub fn controller_with(&self, settings: PipelineSettings) -> PipelineController {
		PipelineController::new(self.collaborators(), settings)
	}

	pub fn retriever(&self) -> Retriever {
		self.retriever_with(RetrieverSettings::default())
	}

	pub fn retriever_with(&self, settings: RetrieverSettings) -> Retriever {
		Retriever::new(self.catalog.clone(), self.web.clone(), self.urls.clone(), self.reconciler.clone(), settings)
	}
}
impl Default for Harness {
	fn default() -> Self {
		Self::new()
	}
}
