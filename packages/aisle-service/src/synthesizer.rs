use serde_json::{Map, Value};

use crate::{ANSWER_SYNTHESIZER, AnswerSynthesizer, BoxFuture, Error, Result, Synthesis, SynthesisRequest};
use aisle_config::LlmProviderConfig;
use aisle_providers::llm;

const ANSWER_TEMPERATURE: f32 = 0.3;
const GROUNDING_TEMPERATURE: f32 = 0.1;
const GROUNDING_UNAVAILABLE: &str = "grounding check unavailable";
const SYSTEM_PROMPT: &str = r#"You are a product recommendation assistant. Synthesize a concise, well-cited recommendation from search results.

Requirements:
1. Be concise and actionable.
2. Cite catalog products by uniq_id (or doc_id).
3. Ground every claim in the provided data.
4. Highlight key features, prices, and why you recommend them.
5. Mention conflicts or limitations.
6. Never recommend harmful or inappropriate products.
7. Include product links whenever a record has a url.

Citation format:
- Catalog products: [uniq_id: <id>], plus the product URL when present
- Web results: [Source: <url>]"#;
const GROUNDING_PROMPT: &str =
	"You are a fact-checker. Verify whether the recommendation is grounded in the provided data.";

pub struct LlmAnswerSynthesizer {
	cfg: LlmProviderConfig,
}
impl LlmAnswerSynthesizer {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}

	async fn synthesize_request(&self, request: SynthesisRequest<'_>) -> Result<Synthesis> {
		let records = serde_json::to_string_pretty(request.records)
			.map_err(|err| Error::malformed(ANSWER_SYNTHESIZER, err.to_string()))?;
		let prompt = answer_prompt(&request, &records);
		let messages = [llm::system_message(SYSTEM_PROMPT), llm::user_message(&prompt)];
		let answer = llm::complete_text(&self.cfg, &messages, Some(ANSWER_TEMPERATURE))
			.await
			.map_err(|err| Error::from_provider(ANSWER_SYNTHESIZER, err))?;

		if answer.trim().is_empty() {
			return Err(Error::malformed(ANSWER_SYNTHESIZER, "Empty recommendation."));
		}

		let (grounded, issues) = match self.check_grounding(&answer, &records).await {
			Ok(object) => parse_grounding(&object),
			Err(err) => {
				tracing::warn!(error = %err, "Grounding check failed.");

				(false, vec![GROUNDING_UNAVAILABLE.to_string()])
			},
		};

		Ok(Synthesis { answer, grounded, issues })
	}

	async fn check_grounding(&self, answer: &str, records: &str) -> Result<Map<String, Value>> {
		let prompt = format!(
			"Recommendation:\n{answer}\n\nAvailable products:\n{records}\n\nDoes the recommendation only use information from the available products? Return JSON: {{\"grounded\": true/false, \"issues\": [array of ungrounded claims]}}"
		);
		let messages = [llm::system_message(GROUNDING_PROMPT), llm::user_message(&prompt)];

		llm::complete_json(&self.cfg, &messages, Some(GROUNDING_TEMPERATURE))
			.await
			.map_err(|err| Error::from_provider(ANSWER_SYNTHESIZER, err))
	}
}

impl AnswerSynthesizer for LlmAnswerSynthesizer {
	fn synthesize<'a>(&'a self, request: SynthesisRequest<'a>) -> BoxFuture<'a, Result<Synthesis>> {
		Box::pin(self.synthesize_request(request))
	}
}

/// `grounded` defaults to true when the checker omits it.
pub fn parse_grounding(object: &Map<String, Value>) -> (bool, Vec<String>) {
	let grounded = object.get("grounded").and_then(Value::as_bool).unwrap_or(true);
	let issues = match object.get("issues") {
		Some(Value::Array(items)) => items
			.iter()
			.filter_map(|item| match item {
				Value::String(text) => Some(text.trim().to_string()),
				Value::Null => None,
				other => Some(other.to_string()),
			})
			.filter(|issue| !issue.is_empty())
			.collect(),
		_ => Vec::new(),
	};

	(grounded, issues)
}

fn answer_prompt(request: &SynthesisRequest<'_>, records: &str) -> String {
	let mut prompt = format!("Task: {}\n\nProduct search results:\n{records}\n\n", request.task);

	if !request.conflicts.is_empty() {
		prompt.push_str(&format!("Conflicts found:\n- {}\n\n", request.conflicts.join("\n- ")));
	}
	if !request.recommendations.is_empty() {
		prompt.push_str(&format!(
			"Additional recommendations:\n- {}\n\n",
			request.recommendations.join("\n- ")
		));
	}

	prompt.push_str(
		"Synthesize a concise recommendation. Include your top recommendation(s) with product names, key features (brand, category, price), why you recommend them, citations, links for every product that has a url, and any important limitations.",
	);

	prompt
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn grounding_defaults_to_true() {
		assert_eq!(parse_grounding(&Map::new()), (true, Vec::new()));
	}

	#[test]
	fn grounding_reads_issues() {
		let object = match json!({ "grounded": false, "issues": ["price invented", null, ""] }) {
			Value::Object(map) => map,
			_ => panic!("Expected object."),
		};

		assert_eq!(parse_grounding(&object), (false, vec!["price invented".to_string()]));
	}

	#[test]
	fn prompt_lists_conflicts_only_when_present() {
		let conflicts = vec!["Price differs".to_string()];
		let request = SynthesisRequest { task: "Find soap", records: &[], conflicts: &conflicts, recommendations: &[] };
		let prompt = answer_prompt(&request, "[]");

		assert!(prompt.starts_with("Task: Find soap"));
		assert!(prompt.contains("Conflicts found:\n- Price differs"));
		assert!(!prompt.contains("Additional recommendations"));
	}
}
