//! Provenance rules for records crossing the service boundary.
//!
//! Catalog records always carry a `uniq_id` and only ever a URL derived from it.
//! Web records always carry a URL and never catalog identity. Anything the
//! reconciliation service hands back is re-checked against what was retrieved.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ProductUrlLookup;
use aisle_domain::{CatalogRecord, Provenance, Record, WebRecord, price};

/// Distance assigned to catalog records that arrive without a score.
pub const UNSCORED_DISTANCE: f32 = 1.0;

/// A catalog result as returned by a search client, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCatalogRecord {
	#[serde(default)]
	pub uniq_id: Option<String>,
	#[serde(default)]
	pub doc_id: Option<String>,
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub category: String,
	#[serde(default)]
	pub price: Option<Value>,
	#[serde(default)]
	pub ingredients: String,
	#[serde(default)]
	pub score: Option<f32>,
	#[serde(default)]
	pub snippet: String,
	#[serde(default)]
	pub url: Option<String>,
}

/// A web result as returned by a search client, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWebRecord {
	#[serde(default)]
	pub title: String,
	#[serde(default)]
	pub url: Option<String>,
	#[serde(default)]
	pub snippet: String,
	#[serde(default)]
	pub score: Option<f32>,
	#[serde(default)]
	pub uniq_id: Option<String>,
	#[serde(default)]
	pub doc_id: Option<String>,
}

/// Normalizes one catalog result.
///
/// A blank `uniq_id` is replaced by `doc_id`; with neither the record is dropped.
/// Any URL on the raw record is discarded in favor of the lookup.
pub fn normalize_catalog(raw: RawCatalogRecord, urls: &dyn ProductUrlLookup) -> Option<CatalogRecord> {
	let doc_id = non_blank(raw.doc_id.as_deref());
	let Some(uniq_id) = non_blank(raw.uniq_id.as_deref()).or_else(|| doc_id.clone()) else {
		tracing::warn!(title = %raw.title, "Dropping catalog record without identity.");

		return None;
	};
	let url = urls.resolve(&uniq_id).filter(|url| !url.trim().is_empty());

	if let Some(stray) = non_blank(raw.url.as_deref())
		&& url.as_deref() != Some(stray.as_str())
	{
		tracing::debug!(uniq_id = %uniq_id, stray_url = %stray, "Discarding catalog record URL.");
	}

	Some(CatalogRecord {
		uniq_id,
		doc_id: doc_id.unwrap_or_default(),
		title: raw.title,
		brand: raw.brand,
		category: raw.category,
		price: raw.price.as_ref().and_then(price::parse_price),
		ingredients: raw.ingredients,
		score: raw.score.unwrap_or(UNSCORED_DISTANCE),
		snippet: raw.snippet,
		url,
	})
}

/// Normalizes one web result. Records without a URL are dropped.
pub fn normalize_web(raw: RawWebRecord) -> Option<WebRecord> {
	let Some(url) = non_blank(raw.url.as_deref()) else {
		tracing::warn!(title = %raw.title, "Dropping web record without URL.");

		return None;
	};

	if raw.uniq_id.is_some() || raw.doc_id.is_some() {
		tracing::debug!(url = %url, "Stripping catalog identity from web record.");
	}

	Some(WebRecord { title: raw.title, url, snippet: raw.snippet, score: raw.score })
}

pub fn catalog_records(raws: Vec<RawCatalogRecord>, urls: &dyn ProductUrlLookup) -> Vec<CatalogRecord> {
	raws.into_iter().filter_map(|raw| normalize_catalog(raw, urls)).collect()
}

pub fn web_records(raws: Vec<RawWebRecord>) -> Vec<WebRecord> {
	raws.into_iter().filter_map(normalize_web).collect()
}

/// Infers the origin of an untrusted merged entry.
///
/// An explicit `source` tag wins. Otherwise an entry with identity but no URL is
/// catalog, one with a URL but no identity is web, and anything else is unknown.
pub fn classify(entry: &Map<String, Value>) -> Option<Provenance> {
	if let Some(source) = entry.get("source").and_then(Value::as_str).and_then(Provenance::parse) {
		return Some(source);
	}

	let has_identity = text_field(entry, "uniq_id").is_some();
	let has_url = text_field(entry, "url").is_some();

	match (has_identity, has_url) {
		(true, false) => Some(Provenance::LocalCorpus),
		(false, true) => Some(Provenance::WebSearch),
		_ => None,
	}
}

/// Re-validates merged entries against the records that were actually retrieved.
///
/// Entries are matched within their classified source, first by the identity they
/// carry (`uniq_id`/`doc_id` or `url`) and then by title, and replaced by the
/// retrieved record. Unclassifiable or unmatched entries are dropped, as are
/// repeats of a record already emitted.
pub fn revalidate(entries: Vec<Value>, catalog: &[CatalogRecord], web: &[WebRecord]) -> Vec<Record> {
	let catalog_by_title = first_by_title(catalog.iter().map(|record| (record.title.as_str(), record)));
	let web_by_title = first_by_title(web.iter().map(|record| (record.title.as_str(), record)));
	let total = entries.len();
	let mut seen = HashSet::new();
	let mut records = Vec::new();

	for entry in entries {
		let Value::Object(entry) = entry else {
			continue;
		};
		let title = entry.get("title").and_then(Value::as_str).map(str::trim);
		let record = match classify(&entry) {
			Some(Provenance::LocalCorpus) => catalog_by_identity(&entry, catalog)
				.or_else(|| title.and_then(|title| catalog_by_title.get(title).copied()))
				.map(|record| Record::LocalCorpus(record.clone())),
			Some(Provenance::WebSearch) => web_by_url(&entry, web)
				.or_else(|| title.and_then(|title| web_by_title.get(title).copied()))
				.map(|record| Record::WebSearch(record.clone())),
			None => None,
		};
		let Some(record) = record else {
			continue;
		};
		let key = match &record {
			Record::LocalCorpus(record) => record.uniq_id.clone(),
			Record::WebSearch(record) => record.url.clone(),
		};

		if seen.insert((record.provenance(), key)) {
			records.push(record);
		}
	}

	if records.len() < total {
		tracing::warn!(
			merged = total,
			kept = records.len(),
			"Dropped merged records that could not be matched to retrieved records."
		);
	}

	records
}

fn catalog_by_identity<'a>(entry: &Map<String, Value>, catalog: &'a [CatalogRecord]) -> Option<&'a CatalogRecord> {
	let ids = [text_field(entry, "uniq_id"), text_field(entry, "doc_id")];

	ids.into_iter().flatten().find_map(|id| {
		catalog.iter().find(|record| record.uniq_id.trim() == id || record.doc_id.trim() == id)
	})
}

fn web_by_url<'a>(entry: &Map<String, Value>, web: &'a [WebRecord]) -> Option<&'a WebRecord> {
	let url = text_field(entry, "url")?;

	web.iter().find(|record| record.url.trim() == url)
}

fn first_by_title<'a, T>(items: impl Iterator<Item = (&'a str, &'a T)>) -> HashMap<&'a str, &'a T> {
	let mut by_title = HashMap::new();

	for (title, item) in items {
		by_title.entry(title.trim()).or_insert(item);
	}

	by_title
}

fn text_field(entry: &Map<String, Value>, key: &str) -> Option<String> {
	non_blank(entry.get(key).and_then(Value::as_str))
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;
	use aisle_catalog::urls::ProductUrls;

	fn urls() -> ProductUrls {
		ProductUrls::from_pairs([("u1", "https://shop.example/u1")])
	}

	fn catalog(uniq_id: &str, title: &str) -> CatalogRecord {
		CatalogRecord {
			uniq_id: uniq_id.to_string(),
			doc_id: String::new(),
			title: title.to_string(),
			brand: String::new(),
			category: String::new(),
			price: None,
			ingredients: String::new(),
			score: 0.2,
			snippet: String::new(),
			url: None,
		}
	}

	fn web(url: &str, title: &str) -> WebRecord {
		WebRecord { title: title.to_string(), url: url.to_string(), snippet: String::new(), score: None }
	}

	fn as_object(value: Value) -> Map<String, Value> {
		match value {
			Value::Object(map) => map,
			_ => panic!("Expected object."),
		}
	}

	#[test]
	fn catalog_identity_falls_back_to_doc_id() {
		let raw = RawCatalogRecord {
			uniq_id: Some("  ".to_string()),
			doc_id: Some("d9".to_string()),
			title: "Brush".to_string(),
			..RawCatalogRecord::default()
		};
		let record = normalize_catalog(raw, &urls()).expect("Record should survive.");

		assert_eq!(record.uniq_id, "d9");
		assert_eq!(record.doc_id, "d9");
	}

	#[test]
	fn catalog_without_identity_is_dropped() {
		let raw = RawCatalogRecord { title: "Ghost".to_string(), ..RawCatalogRecord::default() };

		assert!(normalize_catalog(raw, &urls()).is_none());
	}

	#[test]
	fn catalog_url_comes_only_from_lookup() {
		let stray = RawCatalogRecord {
			uniq_id: Some("u2".to_string()),
			url: Some("https://elsewhere.example/x".to_string()),
			..RawCatalogRecord::default()
		};
		let derived = RawCatalogRecord {
			uniq_id: Some("u1".to_string()),
			url: Some("https://elsewhere.example/y".to_string()),
			price: Some(json!("$4.50")),
			..RawCatalogRecord::default()
		};

		assert_eq!(normalize_catalog(stray, &urls()).and_then(|record| record.url), None);

		let record = normalize_catalog(derived, &urls()).expect("Record should survive.");

		assert_eq!(record.url.as_deref(), Some("https://shop.example/u1"));
		assert_eq!(record.price, Some(4.5));
		assert_eq!(record.score, UNSCORED_DISTANCE);
	}

	#[test]
	fn web_requires_url() {
		let kept = RawWebRecord {
			title: "Review".to_string(),
			url: Some("https://reviews.example/a".to_string()),
			uniq_id: Some("u1".to_string()),
			..RawWebRecord::default()
		};
		let dropped = RawWebRecord { title: "No link".to_string(), ..RawWebRecord::default() };

		assert_eq!(web_records(vec![kept, dropped]).len(), 1);
	}

	#[test]
	fn classification_prefers_explicit_source() {
		let tagged = as_object(json!({ "source": "web_search", "uniq_id": "u1" }));
		let catalog_like = as_object(json!({ "uniq_id": "u1" }));
		let web_like = as_object(json!({ "url": "https://a.example" }));
		let ambiguous = as_object(json!({ "uniq_id": "u1", "url": "https://a.example" }));

		assert_eq!(classify(&tagged), Some(Provenance::WebSearch));
		assert_eq!(classify(&catalog_like), Some(Provenance::LocalCorpus));
		assert_eq!(classify(&web_like), Some(Provenance::WebSearch));
		assert_eq!(classify(&ambiguous), None);
	}

	#[test]
	fn revalidation_restores_retrieved_records() {
		let catalog = vec![catalog("u1", "Steel Polish")];
		let web = vec![web("https://reviews.example/a", "Polish Review")];
		let merged = vec![
			json!({ "source": "local_corpus", "title": "Steel Polish", "url": "https://fake.example" }),
			json!({ "source": "web_search", "title": "Polish Review", "uniq_id": "u1" }),
			json!({ "source": "web_search", "title": "Invented Product", "url": "https://x.example" }),
			json!({ "source": "local_corpus", "title": "Steel Polish" }),
			json!("not an object"),
		];
		let records = revalidate(merged, &catalog, &web);

		assert_eq!(records.len(), 2);
		assert_eq!(records[0], Record::LocalCorpus(catalog[0].clone()));
		assert_eq!(records[1], Record::WebSearch(web[0].clone()));
	}
}
