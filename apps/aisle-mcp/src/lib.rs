pub mod server;

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use clap::Parser;
use color_eyre::{Result, eyre};
use tracing_subscriber::EnvFilter;

use aisle_catalog::qdrant::QdrantCatalog;
use aisle_config::Config;
use aisle_service::{CatalogSearch, HttpEmbedding, TavilyWebSearch};

use crate::server::AisleMcp;

#[derive(Debug, Parser)]
#[command(
	version = aisle_cli::VERSION,
	rename_all = "kebab",
	styles = aisle_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> Result<()> {
	let config = aisle_config::load(&args.config)?;

	init_tracing(&config);

	let bind_addr = loopback_bind(&config.service.mcp_bind)?;
	let mcp = tools_from_config(&config)?;

	tracing::info!(%bind_addr, "MCP server listening.");

	server::serve_mcp(bind_addr, mcp).await
}

fn init_tracing(config: &Config) {
	let filter = EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// The tools are unauthenticated, so they are only served on a loopback address.
fn loopback_bind(mcp_bind: &str) -> Result<SocketAddr> {
	let bind_addr: SocketAddr = mcp_bind
		.parse()
		.map_err(|err| eyre::eyre!("service.mcp_bind must be a valid socket address: {err}"))?;

	if !bind_addr.ip().is_loopback() {
		return Err(eyre::eyre!("service.mcp_bind must be a loopback address."));
	}

	Ok(bind_addr)
}

fn tools_from_config(config: &Config) -> Result<AisleMcp> {
	let catalog = QdrantCatalog::new(&config.catalog.qdrant)?;
	let search = CatalogSearch::new(
		Arc::new(catalog),
		Arc::new(HttpEmbedding::new(config.providers.embedding.clone())),
		config.retrieval.candidate_multiplier,
		config.retrieval.snippet_chars as usize,
	);
	let web = TavilyWebSearch::new(config.providers.web_search.clone());

	Ok(AisleMcp::new(Arc::new(search), Arc::new(web), config.retrieval.n_results))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn mcp_bind_must_be_loopback() {
		let err = loopback_bind("0.0.0.0:9091").expect_err("Wildcard bind must be rejected.");

		assert!(err.to_string().contains("loopback"), "Unexpected error: {err}");
	}

	#[test]
	fn mcp_bind_must_parse() {
		let err = loopback_bind("localhost").expect_err("Host without port must be rejected.");

		assert!(err.to_string().contains("valid socket address"), "Unexpected error: {err}");
	}

	#[test]
	fn loopback_bind_is_accepted() {
		assert_eq!(loopback_bind("127.0.0.1:9091").expect("Loopback bind parses.").port(), 9091);
		assert!(loopback_bind("[::1]:9091").is_ok());
	}
}
