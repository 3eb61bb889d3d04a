use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::intent::Intent;

pub const DEFAULT_N_RESULTS: u32 = 5;
pub const IDENTITY_FIELD: &str = "uniq_id";

const MINIMAL_FIELDS: [&str; 5] = ["title", "brand", "price", "category", IDENTITY_FIELD];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
	/// The semantically indexed catalog.
	Private,
	/// Live web search.
	Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
	pub query: String,
	#[serde(default)]
	pub brand: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub max_price: Option<f64>,
	#[serde(default)]
	pub min_price: Option<f64>,
	#[serde(default)]
	pub must_contain: Option<String>,
	#[serde(default = "default_n_results")]
	pub n_results: u32,
	#[serde(default = "default_rerank")]
	pub rerank: bool,
}
impl SearchParams {
	pub fn for_query(query: impl Into<String>) -> Self {
		Self {
			query: query.into(),
			brand: None,
			category: None,
			max_price: None,
			min_price: None,
			must_contain: None,
			n_results: DEFAULT_N_RESULTS,
			rerank: true,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalPlan {
	pub sources: BTreeSet<SourceKind>,
	pub fields_to_retrieve: Vec<String>,
	#[serde(default)]
	pub comparison_criteria: Vec<String>,
	pub search_params: SearchParams,
	#[serde(default)]
	pub use_web_for: String,
}
impl RetrievalPlan {
	/// Catalog-only plan built straight from the intent's constraints.
	pub fn minimal(intent: &Intent, n_results: u32) -> Self {
		Self {
			sources: BTreeSet::from([SourceKind::Private]),
			fields_to_retrieve: MINIMAL_FIELDS.iter().map(|field| field.to_string()).collect(),
			comparison_criteria: Vec::new(),
			search_params: SearchParams {
				query: intent.extracted_query.clone(),
				brand: intent.constraint_text("brand"),
				category: intent.constraint_text("category"),
				max_price: intent.constraint_number("max_price"),
				min_price: intent.constraint_number("min_price"),
				must_contain: intent.constraint_text("must_contain"),
				n_results,
				rerank: true,
			},
			use_web_for: String::new(),
		}
	}

	pub fn wants(&self, source: SourceKind) -> bool {
		self.sources.contains(&source)
	}

	/// Catalog plans must always ask for the record identity.
	pub fn enforce_identity_field(&mut self) {
		if self.wants(SourceKind::Private)
			&& !self.fields_to_retrieve.iter().any(|field| field == IDENTITY_FIELD)
		{
			self.fields_to_retrieve.push(IDENTITY_FIELD.to_string());
		}
	}

	pub fn web_query(&self) -> String {
		let base = self.search_params.query.trim();
		let purpose = self.use_web_for.trim();

		if purpose.is_empty() { base.to_string() } else { format!("{base} {purpose}") }
	}
}

fn default_n_results() -> u32 {
	DEFAULT_N_RESULTS
}

fn default_rerank() -> bool {
	true
}
