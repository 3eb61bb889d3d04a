use serde_json::Value;

/// Parses a catalog price cell such as `"$1,299.00"`, `"$12.99"` or `12.99`.
///
/// Anything that does not parse to a finite number is treated as "no price".
pub fn parse_price(value: &Value) -> Option<f64> {
	match value {
		Value::Number(number) => number.as_f64().filter(|price| price.is_finite()),
		Value::String(text) => parse_price_text(text),
		_ => None,
	}
}

pub fn parse_price_text(text: &str) -> Option<f64> {
	let trimmed = text.trim().trim_start_matches('$').trim();

	if trimmed.is_empty() {
		return None;
	}

	// Thousands separators only; whitespace inside the number still fails.
	let digits = trimmed.replace(',', "");

	digits.parse::<f64>().ok().filter(|price| price.is_finite())
}
