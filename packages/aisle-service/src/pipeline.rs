//! Per-turn state machine: classify, plan, retrieve, synthesize.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	ANSWER_SYNTHESIZER, AnswerSynthesizer, Collaborators, INTENT_CLASSIFIER, IntentClassifier,
	RETRIEVAL_PLANNER, RetrievalPlanner, Retriever, RetrieverSettings, SynthesisRequest,
	answer::{self, Answer},
	timed,
};
use aisle_config::Config;
use aisle_domain::{DEFAULT_N_RESULTS, Intent, ReconciledResult, RetrievalPlan, Route};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Classify,
	Plan,
	Retrieve,
	Synthesize,
	SafetyExit,
	Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
	pub n_results: u32,
	pub answer_record_limit: usize,
	pub max_web_urls: usize,
	pub timeout: Duration,
	pub retriever: RetrieverSettings,
}
impl PipelineSettings {
	pub fn from_config(cfg: &Config) -> Self {
		Self {
			n_results: cfg.retrieval.n_results,
			answer_record_limit: cfg.pipeline.answer_record_limit as usize,
			max_web_urls: cfg.pipeline.max_web_urls as usize,
			timeout: Duration::from_millis(cfg.pipeline.stage_timeout_ms),
			retriever: RetrieverSettings::from_config(cfg),
		}
	}
}
impl Default for PipelineSettings {
	fn default() -> Self {
		Self {
			n_results: DEFAULT_N_RESULTS,
			answer_record_limit: 5,
			max_web_urls: 5,
			timeout: Duration::from_secs(30),
			retriever: RetrieverSettings::default(),
		}
	}
}

/// Everything one turn produced, in stage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
	pub turn_id: Uuid,
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	pub user_text: String,
	/// Terminal stage once the turn has finished.
	pub stage: Stage,
	pub visited: Vec<Stage>,
	/// Stages whose collaborator failed and were answered by a fallback.
	pub fallbacks: Vec<Stage>,
	pub intent: Option<Intent>,
	pub plan: Option<RetrievalPlan>,
	pub result: Option<ReconciledResult>,
	pub answer: Option<Answer>,
}
impl PipelineState {
	fn new(user_text: &str) -> Self {
		Self {
			turn_id: Uuid::new_v4(),
			started_at: OffsetDateTime::now_utc(),
			user_text: user_text.to_string(),
			stage: Stage::Classify,
			visited: Vec::new(),
			fallbacks: Vec::new(),
			intent: None,
			plan: None,
			result: None,
			answer: None,
		}
	}

	pub fn route(&self) -> Option<Route> {
		self.intent.as_ref().map(|intent| intent.route)
	}

	pub fn safety_flags(&self) -> Vec<String> {
		self.intent.as_ref().map(|intent| intent.safety_flags.iter().cloned().collect()).unwrap_or_default()
	}

	pub fn into_answer(self) -> Answer {
		self.answer.unwrap_or_else(Answer::no_results)
	}

	fn intent_or_default(&self) -> Intent {
		self.intent.clone().unwrap_or_else(|| Intent::fallback(&self.user_text))
	}
}

pub struct PipelineController {
	classifier: Arc<dyn IntentClassifier>,
	planner: Arc<dyn RetrievalPlanner>,
	retriever: Retriever,
	synthesizer: Arc<dyn AnswerSynthesizer>,
	settings: PipelineSettings,
}
impl PipelineController {
	pub fn new(collaborators: Collaborators, settings: PipelineSettings) -> Self {
		let retriever = Retriever::new(
			collaborators.catalog,
			collaborators.web,
			collaborators.urls,
			collaborators.reconciler,
			settings.retriever.clone(),
		);

		Self {
			classifier: collaborators.classifier,
			planner: collaborators.planner,
			retriever,
			synthesizer: collaborators.synthesizer,
			settings,
		}
	}

	pub fn retriever(&self) -> &Retriever {
		&self.retriever
	}

	pub async fn run(&self, user_text: &str) -> Answer {
		self.run_traced(user_text).await.into_answer()
	}

	pub async fn run_traced(&self, user_text: &str) -> PipelineState {
		let mut state = PipelineState::new(user_text);

		while state.stage != Stage::Done {
			state.visited.push(state.stage);
			state.stage = match state.stage {
				Stage::Classify => self.classify(&mut state).await,
				Stage::Plan => self.plan(&mut state).await,
				Stage::Retrieve => self.retrieve(&mut state).await,
				Stage::Synthesize => self.synthesize(&mut state).await,
				Stage::SafetyExit | Stage::Done => {
					state.answer = Some(Answer::crisis());

					Stage::Done
				},
			};
		}

		tracing::info!(
			turn_id = %state.turn_id,
			route = state.route().map(Route::as_str).unwrap_or("none"),
			fallbacks = state.fallbacks.len(),
			"Pipeline turn finished."
		);

		state
	}

	async fn classify(&self, state: &mut PipelineState) -> Stage {
		let classified =
			timed(INTENT_CLASSIFIER, self.settings.timeout, self.classifier.classify(&state.user_text)).await;
		let intent = match classified {
			Ok(intent) => intent,
			Err(err) => {
				tracing::warn!(turn_id = %state.turn_id, error = %err, "Intent classification failed.");
				state.fallbacks.push(Stage::Classify);

				Intent::fallback(&state.user_text)
			},
		};
		let next = if intent.route == Route::Unsafe { Stage::SafetyExit } else { Stage::Plan };

		state.intent = Some(intent);

		next
	}

	async fn plan(&self, state: &mut PipelineState) -> Stage {
		let intent = state.intent_or_default();
		let planned = timed(RETRIEVAL_PLANNER, self.settings.timeout, self.planner.plan(&intent)).await;
		let mut plan = match planned {
			Ok(plan) => plan,
			Err(err) => {
				tracing::warn!(turn_id = %state.turn_id, error = %err, "Retrieval planning failed.");
				state.fallbacks.push(Stage::Plan);

				RetrievalPlan::minimal(&intent, self.settings.n_results)
			},
		};

		plan.enforce_identity_field();

		state.plan = Some(plan);

		Stage::Retrieve
	}

	async fn retrieve(&self, state: &mut PipelineState) -> Stage {
		let plan = match state.plan.clone() {
			Some(plan) => plan,
			None => RetrievalPlan::minimal(&state.intent_or_default(), self.settings.n_results),
		};

		state.result = Some(self.retriever.retrieve(&plan).await);

		Stage::Synthesize
	}

	async fn synthesize(&self, state: &mut PipelineState) -> Stage {
		let result = state.result.clone().unwrap_or_default();

		if result.is_empty() {
			state.answer = Some(Answer::no_results());

			return Stage::Done;
		}

		let intent = state.intent_or_default();
		let task = if intent.task.trim().is_empty() { intent.extracted_query.as_str() } else { intent.task.as_str() };
		let top = &result.records[..result.records.len().min(self.settings.answer_record_limit)];
		let request = SynthesisRequest {
			task,
			records: top,
			conflicts: &result.conflicts,
			recommendations: &result.recommendations,
		};
		let synthesis = timed(ANSWER_SYNTHESIZER, self.settings.timeout, self.synthesizer.synthesize(request))
			.await
			.and_then(|synthesis| {
				if synthesis.answer.trim().is_empty() {
					Err(crate::Error::malformed(ANSWER_SYNTHESIZER, "Empty recommendation."))
				} else {
					Ok(synthesis)
				}
			});
		let answer = match synthesis {
			Ok(synthesis) => answer::compose_answer(&result, synthesis, self.settings.max_web_urls),
			Err(err) => {
				tracing::warn!(turn_id = %state.turn_id, error = %err, "Answer synthesis failed.");
				state.fallbacks.push(Stage::Synthesize);

				answer::fallback_answer(&result.records)
			},
		};

		state.answer = Some(answer);

		Stage::Done
	}
}
