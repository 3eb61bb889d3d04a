use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{plan::SearchParams, price};

/// Structured payload stored next to each catalog vector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogMetadata {
	#[serde(default)]
	pub uniq_id: String,
	#[serde(default)]
	pub doc_id: String,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub category: String,
	/// Raw price cell; may be empty or unparseable.
	#[serde(default)]
	pub price: String,
	#[serde(default)]
	pub ingredients: String,
}

/// One nearest-neighbour candidate from the similarity index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
	pub document: String,
	pub metadata: CatalogMetadata,
	pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterDrop {
	Brand,
	Category,
	MaxPrice,
	MinPrice,
	MustContain,
}
impl FilterDrop {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Brand => "brand",
			Self::Category => "category",
			Self::MaxPrice => "max_price",
			Self::MinPrice => "min_price",
			Self::MustContain => "must_contain",
		}
	}
}

/// Metadata filters applied after the similarity query.
///
/// Brand and category match the structured fields only. `must_contain` matches the indexed
/// document text. All text matches are case-insensitive substring checks. A price bound only
/// drops a record whose price parses and violates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
	pub brand: Option<String>,
	pub category: Option<String>,
	pub max_price: Option<f64>,
	pub min_price: Option<f64>,
	pub must_contain: Option<String>,
}
impl CatalogFilter {
	pub fn from_params(params: &SearchParams) -> Self {
		Self {
			brand: non_blank(params.brand.as_deref()),
			category: non_blank(params.category.as_deref()),
			max_price: params.max_price,
			min_price: params.min_price,
			must_contain: non_blank(params.must_contain.as_deref()),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.brand.is_none()
			&& self.category.is_none()
			&& self.max_price.is_none()
			&& self.min_price.is_none()
			&& self.must_contain.is_none()
	}

	/// Returns the first filter the hit fails.
	pub fn check(&self, hit: &IndexHit) -> Result<(), FilterDrop> {
		let meta = &hit.metadata;

		if let Some(brand) = &self.brand
			&& !contains_ignore_case(&meta.brand, brand)
		{
			return Err(FilterDrop::Brand);
		}
		if let Some(category) = &self.category
			&& !contains_ignore_case(&meta.category, category)
		{
			return Err(FilterDrop::Category);
		}

		let price = price::parse_price_text(&meta.price);

		if let (Some(max), Some(price)) = (self.max_price, price)
			&& price > max
		{
			return Err(FilterDrop::MaxPrice);
		}
		if let (Some(min), Some(price)) = (self.min_price, price)
			&& price < min
		{
			return Err(FilterDrop::MinPrice);
		}
		if let Some(needle) = &self.must_contain
			&& !contains_ignore_case(&hit.document, needle)
		{
			return Err(FilterDrop::MustContain);
		}

		Ok(())
	}

	/// Keeps hits that pass every filter, preserving order.
	pub fn apply(&self, hits: Vec<IndexHit>) -> (Vec<IndexHit>, FilterImpact) {
		let candidate_count_pre = hits.len();
		let mut drops = BTreeMap::new();
		let mut kept = Vec::with_capacity(hits.len());

		for hit in hits {
			match self.check(&hit) {
				Ok(()) => kept.push(hit),
				Err(reason) => *drops.entry(reason).or_insert(0) += 1,
			}
		}

		let impact = FilterImpact { candidate_count_pre, candidate_count_post: kept.len(), drops };

		(kept, impact)
	}
}

/// How many candidates each filter removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterImpact {
	pub candidate_count_pre: usize,
	pub candidate_count_post: usize,
	pub drops: BTreeMap<FilterDrop, usize>,
}
impl FilterImpact {
	pub fn dropped_total(&self) -> usize {
		self.candidate_count_pre.saturating_sub(self.candidate_count_post)
	}

	/// Human-readable summary of which filters removed candidates.
	pub fn describe(&self) -> String {
		if self.candidate_count_pre == 0 {
			return "similarity index returned no candidates".to_string();
		}
		if self.drops.is_empty() {
			return format!("{} of {} candidates kept", self.candidate_count_post, self.candidate_count_pre);
		}

		let reasons = self
			.drops
			.iter()
			.map(|(reason, count)| format!("{}={count}", reason.as_str()))
			.collect::<Vec<_>>()
			.join(", ");

		format!(
			"{} of {} candidates kept; dropped by {reasons}",
			self.candidate_count_post, self.candidate_count_pre
		)
	}
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|text| !text.is_empty()).map(str::to_string)
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
	haystack.to_lowercase().contains(&needle.to_lowercase())
}
