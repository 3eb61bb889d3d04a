use std::{
	env, fs,
	sync::atomic::{AtomicU64, Ordering},
};

use aisle_catalog::{Error, urls::ProductUrls};

const CATALOG_CSV: &str = "\
Uniq Id,Product Name,Product Url,Selling Price
u1,EcoClean X,https://shop.example/u1,$15.00
u2,Steel Shine,https://shop.example/u2,$25.00
u3,No Link,,$9.00
u1,Duplicate,https://shop.example/dup,$1.00
";

#[test]
fn resolves_by_normalized_headers() {
	let urls = ProductUrls::from_reader(CATALOG_CSV.as_bytes(), "uniq_id", "product_url")
		.expect("Failed to load URLs.");

	assert_eq!(urls.len(), 2);
	assert_eq!(urls.resolve("u1"), Some("https://shop.example/u1"));
	assert_eq!(urls.resolve(" u2 "), Some("https://shop.example/u2"));
	assert_eq!(urls.resolve("u3"), None);
	assert_eq!(urls.resolve("missing"), None);
}

#[test]
fn missing_column_is_rejected() {
	let err = ProductUrls::from_reader(CATALOG_CSV.as_bytes(), "uniq_id", "image_url")
		.expect_err("Expected missing column error.");

	assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn loads_from_disk() {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let mut path = env::temp_dir();

	path.push(format!(
		"aisle_catalog_urls_{}_{}.csv",
		std::process::id(),
		COUNTER.fetch_add(1, Ordering::SeqCst)
	));

	fs::write(&path, CATALOG_CSV).expect("Failed to write catalog CSV.");

	let result = ProductUrls::from_csv_path(&path, "uniq_id", "product_url");

	fs::remove_file(&path).expect("Failed to remove catalog CSV.");

	let urls = result.expect("Failed to load URLs.");

	assert_eq!(urls.resolve("u2"), Some("https://shop.example/u2"));
}

#[test]
fn pairs_keep_first_url_per_id() {
	let urls = ProductUrls::from_pairs([("u1", "http://a"), ("u1", "http://b")]);

	assert_eq!(urls.resolve("u1"), Some("http://a"));
	assert!(!urls.is_empty());
}
