use std::sync::Arc;

use aisle_domain::{FilterDrop, SearchParams, SourceKind};
use aisle_service::CatalogSearch;
use aisle_testkit::{
	Harness, KeywordEmbedding, StubIndex,
	fixtures::{index_hit, plan},
};

const VOCABULARY: [&str; 3] = ["steel", "cleaner", "glass"];

fn search(index: &Arc<StubIndex>, embedder: KeywordEmbedding, snippet_chars: usize) -> CatalogSearch {
	CatalogSearch::new(index.clone(), Arc::new(embedder), 2, snippet_chars)
}

fn params(query: &str, n_results: u32, rerank: bool) -> SearchParams {
	SearchParams { n_results, rerank, ..SearchParams::for_query(query) }
}

#[tokio::test]
async fn scenario_a_price_bound_keeps_cheaper_record() {
	let index = Arc::new(StubIndex::returning(vec![
		index_hit("u15", "Budget Cleaner", "steel cleaner budget", "15", 0.1),
		index_hit("u25", "Premium Cleaner", "steel cleaner premium", "25", 0.2),
	]));
	let catalog = Arc::new(search(&index, KeywordEmbedding::new(&VOCABULARY), 300));
	let harness = Harness::new().with_catalog_client(catalog);
	let mut cheap = plan(&[SourceKind::Private], "steel cleaner");

	cheap.search_params.max_price = Some(20.0);

	let result = harness.retriever().retrieve(&cheap).await;

	assert_eq!(result.records.len(), 1);

	let record = result.records[0].as_catalog().expect("Catalog record.");

	assert_eq!(record.uniq_id, "u15");
	assert_eq!(record.price, Some(15.0));
}

#[tokio::test]
async fn requests_twice_the_result_count() {
	let index = Arc::new(StubIndex::returning(Vec::new()));
	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&params("steel", 3, true))
		.await
		.expect("Search should succeed.");

	assert!(outcome.records.is_empty());
	assert_eq!(*index.limits.lock().expect("Lock limits."), vec![6]);
}

#[tokio::test]
async fn unparseable_prices_survive_price_bounds() {
	let index = Arc::new(StubIndex::returning(vec![
		index_hit("u1", "Mystery", "steel cleaner", "call for price", 0.1),
		index_hit("u2", "Cheap", "steel cleaner", "$4.00", 0.2),
		index_hit("u3", "Pricey", "steel cleaner", "$40.00", 0.3),
	]));
	let mut bounded = params("steel cleaner", 5, false);

	bounded.min_price = Some(5.0);
	bounded.max_price = Some(30.0);

	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&bounded)
		.await
		.expect("Search should succeed.");
	let ids = outcome.records.iter().filter_map(|record| record.uniq_id.as_deref()).collect::<Vec<_>>();

	assert_eq!(ids, vec!["u1"]);
	assert_eq!(outcome.impact.drops.get(&FilterDrop::MinPrice), Some(&1));
	assert_eq!(outcome.impact.drops.get(&FilterDrop::MaxPrice), Some(&1));
}

#[tokio::test]
async fn rerank_orders_by_query_similarity() {
	let hits = vec![
		index_hit("glass", "Glass Cleaner", "glass cleaner", "5", 0.1),
		index_hit("steel", "Steel Spray", "steel cleaner spray", "6", 0.2),
	];
	let index = Arc::new(StubIndex::returning(hits));
	let reranked = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&params("steel cleaner", 5, true))
		.await
		.expect("Search should succeed.");
	let plain = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&params("steel cleaner", 5, false))
		.await
		.expect("Search should succeed.");

	assert_eq!(reranked.records[0].uniq_id.as_deref(), Some("steel"));
	assert_eq!(plain.records[0].uniq_id.as_deref(), Some("glass"));
}

#[tokio::test]
async fn rerank_failure_keeps_index_order() {
	let index = Arc::new(StubIndex::returning(vec![
		index_hit("glass", "Glass Cleaner", "glass cleaner", "5", 0.1),
		index_hit("steel", "Steel Spray", "steel cleaner spray", "6", 0.2),
	]));
	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY).failing_from(2), 300)
		.run(&params("steel cleaner", 5, true))
		.await
		.expect("Rerank failure is not fatal.");

	assert_eq!(outcome.records[0].uniq_id.as_deref(), Some("glass"));
}

#[tokio::test]
async fn query_embedding_failure_is_an_error() {
	let index = Arc::new(StubIndex::returning(Vec::new()));
	let result = search(&index, KeywordEmbedding::new(&VOCABULARY).failing_from(1), 300)
		.run(&params("steel", 5, true))
		.await;

	assert!(result.is_err_and(|err| err.is_collaborator_failure()));
	assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn filtered_to_empty_reports_the_filter() {
	let index = Arc::new(StubIndex::returning(vec![
		index_hit("u1", "Spray", "steel cleaner", "5", 0.1),
		index_hit("u2", "Wipe", "steel wipe", "6", 0.2),
	]));
	let mut branded = params("steel", 5, true);

	branded.brand = Some("Nobody".to_string());

	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&branded)
		.await
		.expect("Empty is not an error.");

	assert!(outcome.records.is_empty());
	assert_eq!(outcome.impact.candidate_count_pre, 2);
	assert_eq!(outcome.impact.drops.get(&FilterDrop::Brand), Some(&2));
	assert!(outcome.impact.describe().contains("brand=2"));
}

#[tokio::test]
async fn truncates_results_and_snippets() {
	let hits = (1..=5)
		.map(|idx| index_hit(&format!("u{idx}"), "Item", "steel cleaner for kitchens", "5", idx as f32 / 10.0))
		.collect();
	let index = Arc::new(StubIndex::returning(hits));
	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY), 5)
		.run(&params("steel", 2, false))
		.await
		.expect("Search should succeed.");

	assert_eq!(outcome.records.len(), 2);
	assert_eq!(outcome.records[0].snippet, "steel");
	assert_eq!(outcome.records[1].score, Some(0.2));
	assert_eq!(outcome.impact.candidate_count_pre, 4);
}

#[tokio::test]
async fn blank_query_skips_the_index() {
	let index = Arc::new(StubIndex::returning(vec![index_hit("u1", "Spray", "steel", "5", 0.1)]));
	let outcome = search(&index, KeywordEmbedding::new(&VOCABULARY), 300)
		.run(&params("   ", 5, true))
		.await
		.expect("Blank query is not an error.");

	assert!(outcome.records.is_empty());
	assert_eq!(index.calls(), 0);
}
