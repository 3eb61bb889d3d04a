//! Record and plan builders shared by integration tests.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use aisle_domain::{
	CatalogMetadata, IndexHit, Intent, RetrievalPlan, Route, SearchParams, SourceKind,
};
use aisle_service::{RawCatalogRecord, RawWebRecord};

pub fn catalog_raw(uniq_id: &str, title: &str, price: &str) -> RawCatalogRecord {
	RawCatalogRecord {
		uniq_id: Some(uniq_id.to_string()),
		doc_id: Some(format!("doc-{uniq_id}")),
		title: title.to_string(),
		brand: "Acme".to_string(),
		category: "Cleaning".to_string(),
		price: Some(Value::String(price.to_string())),
		ingredients: String::new(),
		score: Some(0.2),
		snippet: format!("{title} snippet"),
		url: None,
	}
}

pub fn web_raw(title: &str, url: &str) -> RawWebRecord {
	RawWebRecord {
		title: title.to_string(),
		url: Some(url.to_string()),
		snippet: format!("{title} review"),
		score: Some(0.8),
		uniq_id: None,
		doc_id: None,
	}
}

pub fn index_hit(uniq_id: &str, title: &str, document: &str, price: &str, distance: f32) -> IndexHit {
	IndexHit {
		document: document.to_string(),
		metadata: CatalogMetadata {
			uniq_id: uniq_id.to_string(),
			doc_id: format!("doc-{uniq_id}"),
			title: title.to_string(),
			brand: "Acme".to_string(),
			category: "Cleaning".to_string(),
			price: price.to_string(),
			ingredients: String::new(),
		},
		distance,
	}
}

pub fn intent(route: Route, query: &str) -> Intent {
	Intent {
		route,
		extracted_query: query.to_string(),
		task: format!("Find {query}"),
		constraints: Map::new(),
		safety_flags: BTreeSet::new(),
	}
}

pub fn plan(sources: &[SourceKind], query: &str) -> RetrievalPlan {
	RetrievalPlan {
		sources: sources.iter().copied().collect(),
		fields_to_retrieve: vec!["title".to_string(), "price".to_string(), "uniq_id".to_string()],
		comparison_criteria: vec!["price".to_string()],
		search_params: SearchParams::for_query(query),
		use_web_for: String::new(),
	}
}
