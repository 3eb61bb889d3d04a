mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Catalog, CatalogSource, Config, EmbeddingProviderConfig, LlmProviderConfig, Pipeline,
	Providers, Qdrant, Retrieval, Service, WebSearchProviderConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.service.mcp_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.mcp_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.catalog.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match catalog.qdrant.vector_dim."
				.to_string(),
		});
	}
	if !cfg.providers.llm.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.llm.temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	for (label, key) in [
		("llm", &cfg.providers.llm.api_key),
		("embedding", &cfg.providers.embedding.api_key),
		("web_search", &cfg.providers.web_search.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	let source = &cfg.catalog.source;

	if source.id_column.trim().is_empty() || source.url_column.trim().is_empty() {
		return Err(Error::Validation {
			message: "catalog.source.id_column and catalog.source.url_column must be non-empty."
				.to_string(),
		});
	}
	if source.id_column == source.url_column {
		return Err(Error::Validation {
			message: "catalog.source.id_column must differ from catalog.source.url_column."
				.to_string(),
		});
	}

	let retrieval = &cfg.retrieval;

	for (label, value) in [
		("retrieval.n_results", retrieval.n_results),
		("retrieval.candidate_multiplier", retrieval.candidate_multiplier),
		("retrieval.web_n_results", retrieval.web_n_results),
		("retrieval.reconcile_catalog_limit", retrieval.reconcile_catalog_limit),
		("retrieval.fallback_catalog_cap", retrieval.fallback_catalog_cap),
		("retrieval.fallback_web_cap", retrieval.fallback_web_cap),
		("pipeline.answer_record_limit", cfg.pipeline.answer_record_limit),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if cfg.pipeline.stage_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "pipeline.stage_timeout_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.catalog.qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.catalog.qdrant.vector_name = None;
	}

	let web = &mut cfg.providers.web_search;

	web.include_domains.retain(|domain| !domain.trim().is_empty());
	web.exclude_domains.retain(|domain| !domain.trim().is_empty());
}
