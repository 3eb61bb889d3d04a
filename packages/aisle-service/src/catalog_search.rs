//! Semantic catalog search: widened similarity query, metadata filters, and an
//! optional embedding rerank.

use std::sync::Arc;

use crate::{
	BoxFuture, CatalogIndex, CatalogSearchClient, EMBEDDING, EmbeddingProvider,
	Error, RawCatalogRecord, Result,
};
use aisle_config::EmbeddingProviderConfig;
use aisle_domain::{CatalogFilter, FilterImpact, IndexHit, SearchParams};
use aisle_providers::embedding;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSearchOutcome {
	pub records: Vec<RawCatalogRecord>,
	pub impact: FilterImpact,
}

pub struct CatalogSearch {
	index: Arc<dyn CatalogIndex>,
	embedder: Arc<dyn EmbeddingProvider>,
	candidate_multiplier: u32,
	snippet_chars: usize,
}
impl CatalogSearch {
	pub fn new(
		index: Arc<dyn CatalogIndex>,
		embedder: Arc<dyn EmbeddingProvider>,
		candidate_multiplier: u32,
		snippet_chars: usize,
	) -> Self {
		Self { index, embedder, candidate_multiplier: candidate_multiplier.max(1), snippet_chars }
	}

	pub async fn run(&self, params: &SearchParams) -> Result<CatalogSearchOutcome> {
		let query = params.query.trim();

		if query.is_empty() || params.n_results == 0 {
			return Ok(CatalogSearchOutcome::default());
		}

		let vector = self.embed_one(query).await?;
		let limit = params.n_results.saturating_mul(self.candidate_multiplier);
		let hits = self.index.nearest(&vector, limit).await?;
		let (mut hits, impact) = CatalogFilter::from_params(params).apply(hits);

		if hits.is_empty() {
			tracing::info!(query, diagnostic = %impact.describe(), "Catalog search filtered to empty.");
		} else if params.rerank && hits.len() > 1 {
			hits = self.rerank(query, &vector, hits).await;
		}

		hits.truncate(params.n_results as usize);

		let records = hits.iter().map(|hit| self.to_record(hit)).collect();

		Ok(CatalogSearchOutcome { records, impact })
	}

	async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];

		self.embedder
			.embed(&texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::malformed(EMBEDDING, "No embedding returned for the query."))
	}

	/// Orders hits by cosine similarity to the query, descending. Keeps the index
	/// order when document embeddings are unavailable.
	async fn rerank(&self, query: &str, query_vector: &[f32], hits: Vec<IndexHit>) -> Vec<IndexHit> {
		let documents = hits.iter().map(|hit| hit.document.clone()).collect::<Vec<_>>();
		let vectors = match self.embedder.embed(&documents).await {
			Ok(vectors) if vectors.len() == hits.len() => vectors,
			Ok(vectors) => {
				tracing::warn!(
					query,
					expected = hits.len(),
					got = vectors.len(),
					"Rerank embedding count mismatch."
				);

				return hits;
			},
			Err(err) => {
				tracing::warn!(query, error = %err, "Rerank embedding failed.");

				return hits;
			},
		};
		let mut scored = hits
			.into_iter()
			.zip(vectors.iter().map(|vector| cosine(query_vector, vector)))
			.collect::<Vec<_>>();

		scored.sort_by(|a, b| b.1.total_cmp(&a.1));

		scored.into_iter().map(|(hit, _)| hit).collect()
	}

	fn to_record(&self, hit: &IndexHit) -> RawCatalogRecord {
		let meta = &hit.metadata;
		let uniq_id = if meta.uniq_id.trim().is_empty() { &meta.doc_id } else { &meta.uniq_id };

		RawCatalogRecord {
			uniq_id: Some(uniq_id.clone()).filter(|id| !id.trim().is_empty()),
			doc_id: Some(meta.doc_id.clone()).filter(|id| !id.trim().is_empty()),
			title: meta.title.clone(),
			brand: meta.brand.clone(),
			category: meta.category.clone(),
			price: Some(serde_json::Value::String(meta.price.clone())),
			ingredients: meta.ingredients.clone(),
			score: Some(hit.distance),
			snippet: hit.document.chars().take(self.snippet_chars).collect(),
			url: None,
		}
	}
}

impl CatalogSearchClient for CatalogSearch {
	fn search<'a>(&'a self, params: &'a SearchParams) -> BoxFuture<'a, Result<Vec<RawCatalogRecord>>> {
		Box::pin(async move {
			let outcome = self.run(params).await?;

			tracing::debug!(
				query = %params.query,
				pre = outcome.impact.candidate_count_pre,
				post = outcome.impact.candidate_count_post,
				returned = outcome.records.len(),
				"Catalog search finished."
			);

			Ok(outcome.records)
		})
	}
}

/// Embedding provider backed by the configured HTTP endpoint.
pub struct HttpEmbedding {
	cfg: EmbeddingProviderConfig,
}
impl HttpEmbedding {
	pub fn new(cfg: EmbeddingProviderConfig) -> Self {
		Self { cfg }
	}
}

impl EmbeddingProvider for HttpEmbedding {
	fn embed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			embedding::embed(&self.cfg, texts).await.map_err(|err| Error::from_provider(EMBEDDING, err))
		})
	}
}

pub(crate) fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot = a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
	use super::cosine;

	#[test]
	fn cosine_handles_zero_vectors() {
		assert_eq!(cosine(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
		assert!((cosine(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
		assert!(cosine(&[1.0, 0.0], &[-1.0, 0.0]) < 0.0);
	}
}
