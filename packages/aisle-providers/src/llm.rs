use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::{Error, Result, payload};

const JSON_ATTEMPTS: usize = 3;

/// Chat completion that must answer with a JSON object.
///
/// Replies that do not decode to an object are retried before giving up.
pub async fn complete_json(
	cfg: &aisle_config::LlmProviderConfig,
	messages: &[Value],
	temperature: Option<f32>,
) -> Result<Map<String, Value>> {
	let client = client(cfg)?;
	let body = chat_body(cfg, messages, temperature, true);
	let mut last_err = Error::invalid_response("Chat response is not a JSON object.");

	for attempt in 1..=JSON_ATTEMPTS {
		let json = send(&client, cfg, &body).await?;

		match message_content(json).and_then(payload::decode_object) {
			Ok(object) => return Ok(object),
			Err(err) => {
				tracing::warn!(attempt, model = %cfg.model, error = %err, "Chat JSON decode failed.");

				last_err = err;
			},
		}
	}

	Err(last_err)
}

/// Chat completion returning free text.
pub async fn complete_text(
	cfg: &aisle_config::LlmProviderConfig,
	messages: &[Value],
	temperature: Option<f32>,
) -> Result<String> {
	let client = client(cfg)?;
	let body = chat_body(cfg, messages, temperature, false);
	let json = send(&client, cfg, &body).await?;
	let text = payload::decode_text(message_content(json)?)?;

	Ok(text.trim().to_string())
}

pub fn system_message(content: &str) -> Value {
	serde_json::json!({ "role": "system", "content": content })
}

pub fn user_message(content: &str) -> Value {
	serde_json::json!({ "role": "user", "content": content })
}

fn client(cfg: &aisle_config::LlmProviderConfig) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?)
}

fn chat_body(
	cfg: &aisle_config::LlmProviderConfig,
	messages: &[Value],
	temperature: Option<f32>,
	json_mode: bool,
) -> Value {
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": temperature.unwrap_or(cfg.temperature),
		"messages": messages,
	});

	if json_mode {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	body
}

async fn send(client: &Client, cfg: &aisle_config::LlmProviderConfig, body: &Value) -> Result<Value> {
	let res = client
		.post(crate::endpoint(&cfg.api_base, &cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(body)
		.send()
		.await?;

	Ok(res.error_for_status()?.json().await?)
}

/// Pulls `choices[0].message.content`, falling back to the whole body for providers that
/// answer with the object directly.
fn message_content(json: Value) -> Result<Value> {
	if let Some(content) = json
		.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
	{
		if content.is_null() {
			return Err(Error::invalid_response("Chat response content is null."));
		}

		return Ok(content.clone());
	}
	if json.is_object() && json.get("choices").is_none() {
		return Ok(json);
	}

	Err(Error::invalid_response("Chat response is missing message content."))
}
