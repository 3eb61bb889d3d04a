use serde::{Deserialize, Serialize};

use crate::{AisleService, ComparisonTable, Error, PipelineState, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
	pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
	pub final_answer: String,
	pub citations: Vec<String>,
	pub web_urls: Vec<String>,
	pub grounded: Option<bool>,
	pub safety_flags: Vec<String>,
	/// Markdown comparison of the records behind the answer.
	pub comparison: String,
}
impl AskResponse {
	pub fn from_state(state: PipelineState) -> Self {
		let safety_flags = state.safety_flags();
		let comparison = state
			.result
			.as_ref()
			.map(|result| ComparisonTable::from_records(&result.records))
			.unwrap_or_default()
			.to_markdown();
		let answer = state.into_answer();

		Self {
			final_answer: answer.final_answer,
			citations: answer.citations,
			web_urls: answer.web_urls,
			grounded: answer.grounded,
			safety_flags,
			comparison,
		}
	}
}

impl AisleService {
	pub async fn ask(&self, req: AskRequest) -> Result<AskResponse> {
		Ok(AskResponse::from_state(self.ask_traced(req).await?))
	}

	pub async fn ask_traced(&self, req: AskRequest) -> Result<PipelineState> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		Ok(self.pipeline.run_traced(query).await)
	}
}
