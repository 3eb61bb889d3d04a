//! Side-by-side rendering of reconciled records.

use serde::Serialize;

use aisle_domain::Record;

const NOT_AVAILABLE: &str = "N/A";
const NO_PRODUCTS: &str = "No products found.";
const HEADERS: [&str; 8] = ["Source", "Title", "Brand", "Category", "Price", "Unique ID", "URL", "Score"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonRow {
	pub source: String,
	pub title: String,
	pub brand: String,
	pub category: String,
	pub price: String,
	pub unique_id: String,
	pub url: String,
	pub score: String,
}
impl ComparisonRow {
	fn from_record(record: &Record) -> Self {
		match record {
			Record::LocalCorpus(record) => Self {
				source: "Local Catalog".to_string(),
				title: cell(&record.title),
				brand: cell(&record.brand),
				category: cell(&record.category),
				price: record.price.map(|price| format!("{price:.2}")).unwrap_or_else(not_available),
				unique_id: cell(&record.uniq_id),
				url: record.url.as_deref().map(cell).unwrap_or_else(not_available),
				score: format!("{:.3}", record.score),
			},
			Record::WebSearch(record) => Self {
				source: "Web Search".to_string(),
				title: cell(&record.title),
				brand: not_available(),
				category: not_available(),
				price: not_available(),
				unique_id: not_available(),
				url: cell(&record.url),
				score: record.score.map(|score| format!("{score:.3}")).unwrap_or_else(not_available),
			},
		}
	}

	fn cells(&self) -> [&str; 8] {
		[
			&self.source,
			&self.title,
			&self.brand,
			&self.category,
			&self.price,
			&self.unique_id,
			&self.url,
			&self.score,
		]
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonTable {
	pub rows: Vec<ComparisonRow>,
}
impl ComparisonTable {
	/// Catalog rows first, then web rows, each in input order.
	pub fn from_records(records: &[Record]) -> Self {
		let catalog = records.iter().filter(|record| record.as_catalog().is_some());
		let web = records.iter().filter(|record| record.as_web().is_some());

		Self { rows: catalog.chain(web).map(ComparisonRow::from_record).collect() }
	}

	pub fn is_empty(&self) -> bool {
		self.rows.is_empty()
	}

	pub fn to_markdown(&self) -> String {
		if self.is_empty() {
			return NO_PRODUCTS.to_string();
		}

		let mut lines = Vec::with_capacity(self.rows.len() + 2);

		lines.push(format!("| {} |", HEADERS.join(" | ")));
		lines.push(format!("|{}|", vec!["---"; HEADERS.len()].join("|")));

		for row in &self.rows {
			let cells = row.cells().map(|text| text.replace('|', "\\|"));

			lines.push(format!("| {} |", cells.join(" | ")));
		}

		lines.join("\n")
	}

	/// Numbered blocks for speech output; `N/A` fields are omitted.
	pub fn to_plain_text(&self) -> String {
		if self.is_empty() {
			return NO_PRODUCTS.to_string();
		}

		let mut lines = vec!["Product Comparison Table:".to_string(), String::new()];

		for (idx, row) in self.rows.iter().enumerate() {
			lines.push(format!("Product {}:", idx + 1));
			lines.push(format!("  Source: {}", row.source));
			lines.push(format!("  Title: {}", row.title));

			let optional = [
				("Brand", row.brand.clone()),
				("Category", row.category.clone()),
				("Price", format!("${}", row.price)),
				("Unique ID", row.unique_id.clone()),
				("URL", row.url.clone()),
			];

			for (label, value) in optional {
				if !value.ends_with(NOT_AVAILABLE) {
					lines.push(format!("  {label}: {value}"));
				}
			}

			lines.push(String::new());
		}

		lines.join("\n")
	}
}

fn cell(text: &str) -> String {
	let text = text.trim();

	if text.is_empty() { not_available() } else { text.to_string() }
}

fn not_available() -> String {
	NOT_AVAILABLE.to_string()
}

#[cfg(test)]
mod tests {
	use super::*;
	use aisle_domain::{CatalogRecord, WebRecord};

	fn records() -> Vec<Record> {
		vec![
			Record::WebSearch(WebRecord {
				title: "Deal | Today".to_string(),
				url: "https://deals.example/1".to_string(),
				snippet: String::new(),
				score: None,
			}),
			Record::LocalCorpus(CatalogRecord {
				uniq_id: "u1".to_string(),
				doc_id: String::new(),
				title: "Steel Polish".to_string(),
				brand: "Acme".to_string(),
				category: String::new(),
				price: Some(9.0),
				ingredients: String::new(),
				score: 0.25,
				snippet: String::new(),
				url: None,
			}),
		]
	}

	#[test]
	fn catalog_rows_come_first() {
		let table = ComparisonTable::from_records(&records());

		assert_eq!(table.rows[0].source, "Local Catalog");
		assert_eq!(table.rows[0].score, "0.250");
		assert_eq!(table.rows[0].category, "N/A");
		assert_eq!(table.rows[1].source, "Web Search");
	}

	#[test]
	fn markdown_escapes_pipes() {
		let markdown = ComparisonTable::from_records(&records()).to_markdown();
		let lines = markdown.lines().collect::<Vec<_>>();

		assert_eq!(lines.len(), 4);
		assert_eq!(lines[0], "| Source | Title | Brand | Category | Price | Unique ID | URL | Score |");
		assert!(lines[3].contains("Deal \\| Today"));
	}

	#[test]
	fn plain_text_skips_missing_fields() {
		let text = ComparisonTable::from_records(&records()).to_plain_text();

		assert!(text.starts_with("Product Comparison Table:\n\nProduct 1:\n  Source: Local Catalog"));
		assert!(text.contains("  Price: $9.00"));
		assert!(!text.contains("Category"));
		assert!(text.contains("Product 2:\n  Source: Web Search\n  Title: Deal | Today\n  URL: https://deals.example/1"));
	}

	#[test]
	fn empty_table_renders_placeholder() {
		let table = ComparisonTable::from_records(&[]);

		assert_eq!(table.to_markdown(), "No products found.");
		assert_eq!(table.to_plain_text(), "No products found.");
	}
}
