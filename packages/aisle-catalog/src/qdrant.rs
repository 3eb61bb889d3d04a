use std::collections::HashMap;

use qdrant_client::qdrant::{Query, QueryPointsBuilder, ScoredPoint, Value, value::Kind};

use aisle_domain::{CatalogMetadata, IndexHit};

use crate::Result;

/// Payload key holding the text each catalog vector was embedded from.
pub const DOCUMENT_KEY: &str = "document";

/// Read-only view of the catalog collection.
pub struct QdrantCatalog {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_name: Option<String>,
	pub vector_dim: u32,
}
impl QdrantCatalog {
	pub fn new(cfg: &aisle_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_name: cfg.vector_name.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	/// Nearest neighbours of `vector`, closest first.
	pub async fn nearest(&self, vector: &[f32], limit: u32) -> Result<Vec<IndexHit>> {
		if vector.len() != self.vector_dim as usize {
			return Err(crate::Error::InvalidArgument(format!(
				"Query vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut request = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.with_payload(true)
			.limit(limit as u64);

		if let Some(name) = &self.vector_name {
			request = request.using(name.clone());
		}

		let response = self.client.query(request).await?;

		Ok(response.result.iter().map(hit_from_point).collect())
	}
}

/// Converts a scored point. Cosine similarity becomes a distance so lower is closer.
pub fn hit_from_point(point: &ScoredPoint) -> IndexHit {
	let payload = &point.payload;

	IndexHit {
		document: payload_text(payload, DOCUMENT_KEY),
		metadata: CatalogMetadata {
			uniq_id: payload_text(payload, "uniq_id"),
			doc_id: payload_text(payload, "doc_id"),
			title: payload_text(payload, "title"),
			brand: payload_text(payload, "brand"),
			category: payload_text(payload, "category"),
			price: payload_text(payload, "price"),
			ingredients: payload_text(payload, "ingredients"),
		},
		distance: 1.0 - point.score,
	}
}

fn payload_text(payload: &HashMap<String, Value>, key: &str) -> String {
	let Some(value) = payload.get(key) else {
		return String::new();
	};

	match &value.kind {
		Some(Kind::StringValue(text)) => text.clone(),
		Some(Kind::DoubleValue(number)) => number.to_string(),
		Some(Kind::IntegerValue(number)) => number.to_string(),
		_ => String::new(),
	}
}
