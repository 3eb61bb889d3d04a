//! The one place where loosely shaped service responses become JSON objects.
//!
//! Reasoning and search services answer with a bare object, a tool-call envelope whose
//! `content` is a list of text fragments, the fragment list alone, or a JSON document
//! embedded in a string. Every shape decodes to an object or fails with
//! [`Error::InvalidResponse`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::{Error, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Payload {
	Envelope { content: Vec<Fragment> },
	Fragments(Vec<Fragment>),
	Text(String),
	Object(Map<String, Value>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
	Text { text: String },
	Raw(String),
}
impl Fragment {
	fn into_text(self) -> String {
		match self {
			Self::Text { text } | Self::Raw(text) => text,
		}
	}
}

/// Decodes any known response shape into a JSON object.
pub fn decode_object(value: Value) -> Result<Map<String, Value>> {
	let payload: Payload = serde_json::from_value(value)
		.map_err(|err| Error::invalid_response(format!("Unrecognized payload shape: {err}.")))?;

	match payload {
		Payload::Object(map) => Ok(map),
		Payload::Text(text) => parse_embedded(&text),
		Payload::Envelope { content } | Payload::Fragments(content) => {
			let text = fragments_text(content)
				.ok_or_else(|| Error::invalid_response("Payload has no text fragments."))?;

			parse_embedded(&text)
		},
	}
}

/// Joins fragment text into one string, as chat APIs return content parts.
pub fn decode_text(value: Value) -> Result<String> {
	let payload: Payload = serde_json::from_value(value)
		.map_err(|err| Error::invalid_response(format!("Unrecognized payload shape: {err}.")))?;

	match payload {
		Payload::Text(text) => Ok(text),
		Payload::Envelope { content } | Payload::Fragments(content) =>
			fragments_text(content).ok_or_else(|| Error::invalid_response("Payload has no text.")),
		Payload::Object(_) => Err(Error::invalid_response("Expected text, found an object.")),
	}
}

fn fragments_text(content: Vec<Fragment>) -> Option<String> {
	let parts: Vec<String> = content
		.into_iter()
		.map(Fragment::into_text)
		.filter(|text| !text.trim().is_empty())
		.collect();

	if parts.is_empty() { None } else { Some(parts.concat()) }
}

fn parse_embedded(text: &str) -> Result<Map<String, Value>> {
	let trimmed = strip_code_fence(text.trim());

	match serde_json::from_str::<Value>(trimmed) {
		Ok(Value::Object(map)) => Ok(map),
		Ok(_) => Err(Error::invalid_response("Embedded JSON is not an object.")),
		Err(err) => Err(Error::invalid_response(format!("Embedded text is not valid JSON: {err}."))),
	}
}

fn strip_code_fence(text: &str) -> &str {
	let Some(rest) = text.strip_prefix("```") else {
		return text;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);

	rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn decodes_bare_object() {
		let map = decode_object(serde_json::json!({ "results": [] })).expect("decode failed");

		assert!(map.contains_key("results"));
	}

	#[test]
	fn decodes_envelope_fragments() {
		let value = serde_json::json!({
			"content": [{ "type": "text", "text": "{\"results\": [1]}" }]
		});
		let map = decode_object(value).expect("decode failed");

		assert_eq!(map["results"], serde_json::json!([1]));
	}

	#[test]
	fn decodes_fragment_list_and_string() {
		let list = serde_json::json!(["{\"a\": 1}"]);
		let text = serde_json::json!("```json\n{\"a\": 2}\n```");

		assert_eq!(decode_object(list).expect("decode failed")["a"], 1);
		assert_eq!(decode_object(text).expect("decode failed")["a"], 2);
	}

	#[test]
	fn rejects_non_object_payloads() {
		assert!(decode_object(serde_json::json!(42)).is_err());
		assert!(decode_object(serde_json::json!("[1, 2]")).is_err());
		assert!(decode_object(serde_json::json!({ "content": [] })).is_err());
	}

	#[test]
	fn decodes_text_parts() {
		let parts = serde_json::json!([{ "text": "Hello " }, { "text": "world" }]);

		assert_eq!(decode_text(parts).expect("decode failed"), "Hello world");
		assert!(decode_text(serde_json::json!({ "a": 1 })).is_err());
	}
}
