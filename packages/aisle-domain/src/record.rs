use serde::{Deserialize, Serialize};

pub const LOCAL_CORPUS: &str = "local_corpus";
pub const WEB_SEARCH: &str = "web_search";

/// Which source a record came from. Decides the identity fields it may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
	LocalCorpus,
	WebSearch,
}
impl Provenance {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw.trim() {
			LOCAL_CORPUS => Some(Self::LocalCorpus),
			WEB_SEARCH => Some(Self::WebSearch),
			_ => None,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::LocalCorpus => LOCAL_CORPUS,
			Self::WebSearch => WEB_SEARCH,
		}
	}
}

/// A catalog product. `uniq_id` is never empty; `url` is only ever set from the
/// product URL lookup keyed by `uniq_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
	pub uniq_id: String,
	#[serde(default)]
	pub doc_id: String,
	pub title: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub price: Option<f64>,
	#[serde(default)]
	pub ingredients: String,
	/// Similarity distance, lower is closer.
	pub score: f32,
	#[serde(default)]
	pub snippet: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub url: Option<String>,
}
impl CatalogRecord {
	/// `uniq_id`, or `doc_id` when the former is blank.
	pub fn citation(&self) -> Option<&str> {
		[self.uniq_id.as_str(), self.doc_id.as_str()].into_iter().find(|id| !id.trim().is_empty())
	}
}

/// A live web result. Never carries catalog identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebRecord {
	pub title: String,
	pub url: String,
	#[serde(default)]
	pub snippet: String,
	/// Provider relevance, higher is better.
	#[serde(default)]
	pub score: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum Record {
	LocalCorpus(CatalogRecord),
	WebSearch(WebRecord),
}
impl Record {
	pub fn provenance(&self) -> Provenance {
		match self {
			Self::LocalCorpus(_) => Provenance::LocalCorpus,
			Self::WebSearch(_) => Provenance::WebSearch,
		}
	}

	pub fn title(&self) -> &str {
		match self {
			Self::LocalCorpus(record) => &record.title,
			Self::WebSearch(record) => &record.title,
		}
	}

	pub fn url(&self) -> Option<&str> {
		match self {
			Self::LocalCorpus(record) => record.url.as_deref(),
			Self::WebSearch(record) => Some(record.url.as_str()),
		}
	}

	pub fn citation(&self) -> Option<&str> {
		match self {
			Self::LocalCorpus(record) => record.citation(),
			Self::WebSearch(_) => None,
		}
	}

	pub fn as_catalog(&self) -> Option<&CatalogRecord> {
		match self {
			Self::LocalCorpus(record) => Some(record),
			Self::WebSearch(_) => None,
		}
	}

	pub fn as_web(&self) -> Option<&WebRecord> {
		match self {
			Self::LocalCorpus(_) => None,
			Self::WebSearch(record) => Some(record),
		}
	}

	/// Field invariants that the type alone cannot express.
	pub fn is_well_formed(&self) -> bool {
		match self {
			Self::LocalCorpus(record) =>
				!record.uniq_id.trim().is_empty()
					&& record.url.as_deref().map(|url| !url.trim().is_empty()).unwrap_or(true),
			Self::WebSearch(record) => !record.url.trim().is_empty(),
		}
	}
}

/// Output of retrieval: validated records plus the reconciliation annotations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciledResult {
	pub records: Vec<Record>,
	#[serde(default)]
	pub conflicts: Vec<String>,
	#[serde(default)]
	pub recommendations: Vec<String>,
}
impl ReconciledResult {
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn from_records(records: Vec<Record>) -> Self {
		Self { records, conflicts: Vec::new(), recommendations: Vec::new() }
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn catalog_records(&self) -> impl Iterator<Item = &CatalogRecord> {
		self.records.iter().filter_map(Record::as_catalog)
	}

	pub fn web_records(&self) -> impl Iterator<Item = &WebRecord> {
		self.records.iter().filter_map(Record::as_web)
	}
}
