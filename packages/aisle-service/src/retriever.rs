//! Multi-source retrieval and reconciliation.

use std::{sync::Arc, time::Duration};

use crate::{
	CATALOG_SEARCH, CatalogSearchClient, ProductUrlLookup, RECONCILIATION, ReconciliationService,
	WEB_SEARCH, WebSearchClient, provenance, timed,
};
use aisle_config::Config;
use aisle_domain::{CatalogRecord, ReconciledResult, Record, RetrievalPlan, SourceKind, WebRecord};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverSettings {
	pub web_n_results: u32,
	pub reconcile_catalog_limit: usize,
	pub fallback_catalog_cap: usize,
	pub fallback_web_cap: usize,
	pub timeout: Duration,
}
impl RetrieverSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			web_n_results: cfg.retrieval.web_n_results,
			reconcile_catalog_limit: cfg.retrieval.reconcile_catalog_limit as usize,
			fallback_catalog_cap: cfg.retrieval.fallback_catalog_cap as usize,
			fallback_web_cap: cfg.retrieval.fallback_web_cap as usize,
			timeout: Duration::from_millis(cfg.pipeline.stage_timeout_ms),
		}
	}
}
impl Default for RetrieverSettings {
	fn default() -> Self {
		Self {
			web_n_results: 3,
			reconcile_catalog_limit: 3,
			fallback_catalog_cap: 5,
			fallback_web_cap: 3,
			timeout: Duration::from_secs(30),
		}
	}
}

pub struct Retriever {
	catalog: Arc<dyn CatalogSearchClient>,
	web: Arc<dyn WebSearchClient>,
	urls: Arc<dyn ProductUrlLookup>,
	reconciler: Arc<dyn ReconciliationService>,
	settings: RetrieverSettings,
}
impl Retriever {
	pub fn new(
		catalog: Arc<dyn CatalogSearchClient>,
		web: Arc<dyn WebSearchClient>,
		urls: Arc<dyn ProductUrlLookup>,
		reconciler: Arc<dyn ReconciliationService>,
		settings: RetrieverSettings,
	) -> Self {
		Self { catalog, web, urls, reconciler, settings }
	}

	/// Fetches the planned sources concurrently and merges them.
	///
	/// Never fails: an unavailable source contributes nothing, and a failed or
	/// degenerate reconciliation falls back to capped concatenation.
	pub async fn retrieve(&self, plan: &RetrievalPlan) -> ReconciledResult {
		let catalog = async {
			if plan.wants(SourceKind::Private) { self.fetch_catalog(plan).await } else { Vec::new() }
		};
		let web = async {
			if plan.wants(SourceKind::Live) { self.fetch_web(plan).await } else { Vec::new() }
		};
		let (catalog, web) = tokio::join!(catalog, web);

		match (catalog.is_empty(), web.is_empty()) {
			(true, true) => ReconciledResult::empty(),
			(false, false) => self.reconcile(plan, catalog, web).await,
			_ => ReconciledResult::from_records(
				catalog.into_iter().map(Record::LocalCorpus).chain(web.into_iter().map(Record::WebSearch)).collect(),
			),
		}
	}

	async fn fetch_catalog(&self, plan: &RetrievalPlan) -> Vec<CatalogRecord> {
		match timed(CATALOG_SEARCH, self.settings.timeout, self.catalog.search(&plan.search_params)).await {
			Ok(raws) => provenance::catalog_records(raws, self.urls.as_ref()),
			Err(err) => {
				tracing::warn!(error = %err, query = %plan.search_params.query, "Catalog search failed.");

				Vec::new()
			},
		}
	}

	async fn fetch_web(&self, plan: &RetrievalPlan) -> Vec<WebRecord> {
		let query = plan.web_query();

		match timed(WEB_SEARCH, self.settings.timeout, self.web.search(&query, self.settings.web_n_results))
			.await
		{
			Ok(raws) => provenance::web_records(raws),
			Err(err) => {
				tracing::warn!(error = %err, query = %query, "Web search failed.");

				Vec::new()
			},
		}
	}

	async fn reconcile(
		&self,
		plan: &RetrievalPlan,
		catalog: Vec<CatalogRecord>,
		web: Vec<WebRecord>,
	) -> ReconciledResult {
		let offered = &catalog[..catalog.len().min(self.settings.reconcile_catalog_limit)];
		let reconciliation = timed(
			RECONCILIATION,
			self.settings.timeout,
			self.reconciler.reconcile(offered, &web, &plan.comparison_criteria),
		)
		.await;
		let reconciliation = match reconciliation {
			Ok(reconciliation) => reconciliation,
			Err(err) => {
				tracing::warn!(error = %err, "Reconciliation failed. Concatenating sources.");

				return ReconciledResult::from_records(self.concatenate(catalog, web));
			},
		};
		let mut records = provenance::revalidate(reconciliation.records, &catalog, &web);

		if records.is_empty() {
			tracing::info!("Reconciliation kept no records. Concatenating sources.");

			records = self.concatenate(catalog, web);
		}

		ReconciledResult {
			records,
			conflicts: reconciliation.conflicts,
			recommendations: reconciliation.recommendations,
		}
	}

	fn concatenate(&self, catalog: Vec<CatalogRecord>, web: Vec<WebRecord>) -> Vec<Record> {
		catalog
			.into_iter()
			.take(self.settings.fallback_catalog_cap)
			.map(Record::LocalCorpus)
			.chain(web.into_iter().take(self.settings.fallback_web_cap).map(Record::WebSearch))
			.collect()
	}
}
