use std::{collections::HashMap, io, path::Path};

use crate::{Error, Result};

/// Product page URLs keyed by catalog `uniq_id`, loaded once from the catalog export.
///
/// Header names are compared after lowercasing and replacing spaces with underscores, so
/// `Uniq Id` matches `uniq_id`.
#[derive(Debug, Clone, Default)]
pub struct ProductUrls {
	by_id: HashMap<String, String>,
}
impl ProductUrls {
	pub fn from_csv_path(path: &Path, id_column: &str, url_column: &str) -> Result<Self> {
		let reader = csv::Reader::from_path(path)?;
		let urls = Self::from_csv(reader, id_column, url_column)?;

		tracing::info!(path = %path.display(), count = urls.len(), "Loaded product URLs.");

		Ok(urls)
	}

	pub fn from_reader<R>(reader: R, id_column: &str, url_column: &str) -> Result<Self>
	where
		R: io::Read,
	{
		Self::from_csv(csv::Reader::from_reader(reader), id_column, url_column)
	}

	pub fn from_pairs<I, K, V>(pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let mut by_id = HashMap::new();

		for (id, url) in pairs {
			by_id.entry(id.into()).or_insert_with(|| url.into());
		}

		Self { by_id }
	}

	pub fn resolve(&self, uniq_id: &str) -> Option<&str> {
		self.by_id.get(uniq_id.trim()).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.by_id.len()
	}

	pub fn is_empty(&self) -> bool {
		self.by_id.is_empty()
	}

	fn from_csv<R>(mut reader: csv::Reader<R>, id_column: &str, url_column: &str) -> Result<Self>
	where
		R: io::Read,
	{
		let headers = reader.headers()?.clone();
		let id_index = column_index(&headers, id_column)?;
		let url_index = column_index(&headers, url_column)?;
		let mut by_id = HashMap::new();
		let mut skipped = 0_usize;

		for row in reader.records() {
			let row = row?;
			let id = row.get(id_index).map(str::trim).unwrap_or_default();
			let url = row.get(url_index).map(str::trim).unwrap_or_default();

			if id.is_empty() || url.is_empty() {
				skipped += 1;

				continue;
			}

			by_id.entry(id.to_string()).or_insert_with(|| url.to_string());
		}

		if skipped > 0 {
			tracing::debug!(skipped, "Catalog rows without id or URL were skipped.");
		}

		Ok(Self { by_id })
	}
}

fn column_index(headers: &csv::StringRecord, column: &str) -> Result<usize> {
	let wanted = normalize_header(column);

	headers
		.iter()
		.position(|header| normalize_header(header) == wanted)
		.ok_or_else(|| Error::InvalidArgument(format!("Catalog CSV has no {column} column.")))
}

fn normalize_header(header: &str) -> String {
	header.trim().to_lowercase().replace(' ', "_")
}
