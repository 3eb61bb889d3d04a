use serde::{Deserialize, Serialize};

use crate::Synthesis;
use aisle_domain::{ReconciledResult, Record};

pub const NO_RESULTS_MESSAGE: &str = "I couldn't find any suitable products matching your criteria. Try adjusting your filters or search terms.";
pub const CRISIS_MESSAGE: &str = "I'm really sorry you're going through this, and I can't help with this request. You don't have to handle it alone.\n\n- Call or text 988 to reach the Suicide & Crisis Lifeline (US), available 24/7.\n- Text HOME to 741741 to reach the Crisis Text Line.\n- If you are in immediate danger, call 911 or your local emergency number.";

const NOT_AVAILABLE: &str = "N/A";

/// What the pipeline tells the user for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
	pub final_answer: String,
	#[serde(default)]
	pub citations: Vec<String>,
	#[serde(default)]
	pub web_urls: Vec<String>,
	#[serde(default)]
	pub grounded: Option<bool>,
}
impl Answer {
	pub fn crisis() -> Self {
		Self::message(CRISIS_MESSAGE)
	}

	pub fn no_results() -> Self {
		Self::message(NO_RESULTS_MESSAGE)
	}

	fn message(text: &str) -> Self {
		Self { final_answer: text.to_string(), citations: Vec::new(), web_urls: Vec::new(), grounded: None }
	}
}

/// Deterministic single-record answer built from the top candidate.
pub fn fallback_answer(records: &[Record]) -> Answer {
	let Some(top) = records.first() else {
		return Answer::no_results();
	};
	let catalog = top.as_catalog();
	let title = non_blank(top.title()).unwrap_or("Product");
	let brand = catalog.and_then(|record| non_blank(&record.brand)).unwrap_or(NOT_AVAILABLE);
	let category = catalog.and_then(|record| non_blank(&record.category)).unwrap_or(NOT_AVAILABLE);
	let price = catalog
		.and_then(|record| record.price)
		.map(|price| format!("${price:.2}"))
		.unwrap_or_else(|| NOT_AVAILABLE.to_string());
	let mut text = format!(
		"My top recommendation is **{title}**.\n- Brand: {brand}\n- Category: {category}\n- Price: {price}"
	);
	let citation = top.citation().map(str::to_string);
	let url = top.url().map(str::to_string);

	if let Some(citation) = &citation {
		text.push_str(&format!("\n\nCitation (private DB uniq_id): {citation}"));
	}
	if let Some(url) = &url {
		text.push_str(&format!("\n\nSource: {url}"));
	}

	Answer {
		final_answer: text,
		citations: citation.into_iter().collect(),
		web_urls: url.into_iter().collect(),
		grounded: Some(true),
	}
}

/// Final answer from a successful synthesis over `result`.
pub fn compose_answer(result: &ReconciledResult, synthesis: Synthesis, max_web_urls: usize) -> Answer {
	let mut text = synthesis.answer.trim().to_string();

	if !synthesis.grounded {
		text.push_str(&format!(
			"\n\n[Note: Some claims may not be fully verified. Issues: {}]",
			synthesis.issues.join(", ")
		));
	}

	let citations = result.records.iter().filter_map(Record::citation).map(str::to_string).collect::<Vec<_>>();
	let web_urls = result.records.iter().filter_map(Record::url).map(str::to_string).collect::<Vec<_>>();

	if !web_urls.is_empty() && !text.to_lowercase().contains("http") {
		text.push_str("\n\n**Web Sources:**\n");

		for url in web_urls.iter().take(max_web_urls) {
			text.push_str(&format!("- {url}\n"));
		}
	}

	Answer { final_answer: text, citations, web_urls, grounded: Some(synthesis.grounded) }
}

fn non_blank(text: &str) -> Option<&str> {
	let text = text.trim();

	if text.is_empty() { None } else { Some(text) }
}
