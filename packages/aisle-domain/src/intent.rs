use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::price;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
	Search,
	General,
	Unsafe,
}
impl Route {
	/// Unknown labels fall back to [`Route::General`].
	pub fn parse_lenient(raw: &str) -> Self {
		match raw.trim().to_ascii_lowercase().as_str() {
			"search" => Self::Search,
			"unsafe" => Self::Unsafe,
			_ => Self::General,
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Search => "search",
			Self::General => "general",
			Self::Unsafe => "unsafe",
		}
	}
}

/// Structured reading of one user turn.
///
/// `safety_flags` are informational: the pipeline branches on `route` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
	pub route: Route,
	pub extracted_query: String,
	pub task: String,
	#[serde(default)]
	pub constraints: Map<String, Value>,
	#[serde(default)]
	pub safety_flags: BTreeSet<String>,
}
impl Intent {
	/// The intent used when classification is unavailable.
	pub fn fallback(user_text: &str) -> Self {
		Self {
			route: Route::General,
			extracted_query: user_text.to_string(),
			task: String::new(),
			constraints: Map::new(),
			safety_flags: BTreeSet::new(),
		}
	}

	/// A non-blank string constraint.
	pub fn constraint_text(&self, key: &str) -> Option<String> {
		match self.constraints.get(key)? {
			Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
			_ => None,
		}
	}

	/// A numeric constraint; numeric strings such as `"$20"` are accepted.
	pub fn constraint_number(&self, key: &str) -> Option<f64> {
		self.constraints.get(key).and_then(price::parse_price)
	}
}
