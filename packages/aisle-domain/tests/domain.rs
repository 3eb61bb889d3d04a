use std::collections::BTreeSet;

use serde_json::{Map, json};

use aisle_domain::{
	CatalogFilter, CatalogMetadata, CatalogRecord, FilterDrop, IndexHit, Intent, Provenance,
	ReconciledResult, Record, RetrievalPlan, Route, SearchParams, SourceKind, WebRecord,
};

fn hit(uniq_id: &str, brand: &str, price: &str, document: &str) -> IndexHit {
	IndexHit {
		document: document.to_string(),
		metadata: CatalogMetadata {
			uniq_id: uniq_id.to_string(),
			doc_id: uniq_id.to_string(),
			title: format!("Product {uniq_id}"),
			brand: brand.to_string(),
			category: "Home & Kitchen | Cleaning".to_string(),
			price: price.to_string(),
			ingredients: String::new(),
		},
		distance: 0.2,
	}
}

fn catalog_record(uniq_id: &str) -> CatalogRecord {
	CatalogRecord {
		uniq_id: uniq_id.to_string(),
		doc_id: uniq_id.to_string(),
		title: "EcoClean X".to_string(),
		brand: "Eco".to_string(),
		category: "Cleaning".to_string(),
		price: Some(12.5),
		ingredients: String::new(),
		score: 0.1,
		snippet: String::new(),
		url: None,
	}
}

#[test]
fn max_price_excludes_only_violating_numeric_prices() {
	let filter = CatalogFilter { max_price: Some(20.0), ..Default::default() };
	let hits = vec![
		hit("a", "Eco", "15", "steel cleaner"),
		hit("b", "Eco", "25", "steel cleaner"),
		hit("c", "Eco", "call for price", "steel cleaner"),
		hit("d", "Eco", "", "steel cleaner"),
		hit("e", "Eco", "$1,299.00", "steel cleaner"),
	];
	let (kept, impact) = filter.apply(hits);
	let ids: Vec<&str> = kept.iter().map(|hit| hit.metadata.uniq_id.as_str()).collect();

	assert_eq!(ids, vec!["a", "c", "d"]);
	assert_eq!(impact.candidate_count_pre, 5);
	assert_eq!(impact.candidate_count_post, 3);
	assert_eq!(impact.drops.get(&FilterDrop::MaxPrice), Some(&2));
}

#[test]
fn min_price_keeps_unparseable_prices() {
	let filter = CatalogFilter { min_price: Some(10.0), ..Default::default() };

	assert_eq!(filter.check(&hit("a", "Eco", "$9.99", "x")), Err(FilterDrop::MinPrice));
	assert_eq!(filter.check(&hit("b", "Eco", "$10.00", "x")), Ok(()));
	assert_eq!(filter.check(&hit("c", "Eco", "ten", "x")), Ok(()));
}

#[test]
fn text_filters_are_case_insensitive_substrings() {
	let filter = CatalogFilter {
		brand: Some("method".to_string()),
		category: Some("cleaning".to_string()),
		must_contain: Some("ECO-FRIENDLY".to_string()),
		..Default::default()
	};

	assert_eq!(filter.check(&hit("a", "Method Products", "5", "An eco-friendly spray")), Ok(()));
	assert_eq!(
		filter.check(&hit("b", "Lysol", "5", "An eco-friendly spray")),
		Err(FilterDrop::Brand)
	);
	assert_eq!(
		filter.check(&hit("c", "Method", "5", "A harsh spray")),
		Err(FilterDrop::MustContain)
	);
}

#[test]
fn brand_filter_ignores_document_text() {
	let filter = CatalogFilter { brand: Some("method".to_string()), ..Default::default() };

	assert_eq!(
		filter.check(&hit("a", "Lysol", "5", "Works better than Method sprays")),
		Err(FilterDrop::Brand)
	);
}

#[test]
fn blank_filter_params_are_ignored() {
	let mut params = SearchParams::for_query("cleaner");

	params.brand = Some("  ".to_string());
	params.must_contain = Some(String::new());

	let filter = CatalogFilter::from_params(&params);

	assert!(filter.is_empty());
}

#[test]
fn filter_impact_names_the_emptying_filter() {
	let filter = CatalogFilter { brand: Some("acme".to_string()), ..Default::default() };
	let (kept, impact) = filter.apply(vec![hit("a", "Eco", "1", "x"), hit("b", "Eco", "1", "x")]);

	assert!(kept.is_empty());
	assert_eq!(impact.dropped_total(), 2);
	assert!(impact.describe().contains("brand=2"), "{}", impact.describe());
}

#[test]
fn minimal_plan_carries_intent_constraints() {
	let mut constraints = Map::new();

	constraints.insert("max_price".to_string(), json!("$20"));
	constraints.insert("brand".to_string(), json!("Method"));
	constraints.insert("material".to_string(), json!("stainless steel"));

	let intent = Intent {
		route: Route::Search,
		extracted_query: "steel cleaner".to_string(),
		task: "Find a cleaner".to_string(),
		constraints,
		safety_flags: BTreeSet::new(),
	};
	let plan = RetrievalPlan::minimal(&intent, 5);

	assert_eq!(plan.sources, BTreeSet::from([SourceKind::Private]));
	assert!(plan.fields_to_retrieve.iter().any(|field| field == "uniq_id"));
	assert_eq!(plan.search_params.query, "steel cleaner");
	assert_eq!(plan.search_params.max_price, Some(20.0));
	assert_eq!(plan.search_params.brand.as_deref(), Some("Method"));
	assert_eq!(plan.search_params.category, None);
	assert!(plan.search_params.rerank);
}

#[test]
fn identity_field_is_added_for_catalog_plans_only() {
	let mut plan = RetrievalPlan::minimal(&Intent::fallback("soap"), 5);

	plan.fields_to_retrieve = vec!["title".to_string()];
	plan.enforce_identity_field();

	assert_eq!(plan.fields_to_retrieve, vec!["title".to_string(), "uniq_id".to_string()]);

	plan.sources = BTreeSet::from([SourceKind::Live]);
	plan.fields_to_retrieve = vec!["title".to_string()];
	plan.enforce_identity_field();

	assert_eq!(plan.fields_to_retrieve, vec!["title".to_string()]);
}

#[test]
fn web_query_appends_purpose() {
	let mut plan = RetrievalPlan::minimal(&Intent::fallback("steel cleaner"), 5);

	assert_eq!(plan.web_query(), "steel cleaner");

	plan.use_web_for = "current prices".to_string();

	assert_eq!(plan.web_query(), "steel cleaner current prices");
}

#[test]
fn plan_deserializes_with_search_defaults() {
	let plan: RetrievalPlan = serde_json::from_value(json!({
		"sources": ["private", "live"],
		"fields_to_retrieve": ["title"],
		"search_params": { "query": "cleaner" }
	}))
	.expect("Plan must deserialize.");

	assert!(plan.wants(SourceKind::Live));
	assert_eq!(plan.search_params.n_results, 5);
	assert!(plan.search_params.rerank);
	assert!(plan.use_web_for.is_empty());
}

#[test]
fn route_parsing_is_lenient() {
	assert_eq!(Route::parse_lenient("SEARCH"), Route::Search);
	assert_eq!(Route::parse_lenient("unsafe"), Route::Unsafe);
	assert_eq!(Route::parse_lenient("shopping"), Route::General);
}

#[test]
fn records_serialize_with_source_tag() {
	let catalog = Record::LocalCorpus(catalog_record("u1"));
	let web = Record::WebSearch(WebRecord {
		title: "EcoClean X".to_string(),
		url: "http://x".to_string(),
		snippet: String::new(),
		score: Some(0.7),
	});
	let catalog_json = serde_json::to_value(&catalog).expect("Serialize failed.");
	let web_json = serde_json::to_value(&web).expect("Serialize failed.");

	assert_eq!(catalog_json["source"], "local_corpus");
	assert_eq!(catalog_json["uniq_id"], "u1");
	assert!(catalog_json.get("url").is_none());
	assert_eq!(web_json["source"], "web_search");
	assert!(web_json.get("uniq_id").is_none());
	assert!(web_json.get("doc_id").is_none());

	let back: Record = serde_json::from_value(catalog_json).expect("Deserialize failed.");

	assert_eq!(back, catalog);
	assert_eq!(back.provenance(), Provenance::LocalCorpus);
}

#[test]
fn citation_prefers_uniq_id_then_doc_id() {
	let mut record = catalog_record("u1");

	assert_eq!(record.citation(), Some("u1"));

	record.uniq_id = String::new();
	record.doc_id = "d1".to_string();

	assert_eq!(record.citation(), Some("d1"));
	assert!(!Record::LocalCorpus(record).is_well_formed());
}

#[test]
fn reconciled_result_splits_by_provenance() {
	let result = ReconciledResult::from_records(vec![
		Record::LocalCorpus(catalog_record("u1")),
		Record::WebSearch(WebRecord {
			title: "Other".to_string(),
			url: "http://y".to_string(),
			snippet: String::new(),
			score: None,
		}),
	]);

	assert_eq!(result.catalog_records().count(), 1);
	assert_eq!(result.web_records().count(), 1);
	assert!(result.conflicts.is_empty());
}
