use std::sync::Arc;

use aisle_catalog::{qdrant::QdrantCatalog, urls::ProductUrls};
use aisle_service::AisleService;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<AisleService>,
}
impl AppState {
	/// Loads the product URL table eagerly and connects the catalog index.
	pub fn new(config: aisle_config::Config) -> color_eyre::Result<Self> {
		let source = &config.catalog.source;
		let urls = ProductUrls::from_csv_path(&source.csv_path, &source.id_column, &source.url_column)?;

		tracing::info!(path = %source.csv_path.display(), products = urls.len(), "Product URL table loaded.");

		let catalog = QdrantCatalog::new(&config.catalog.qdrant)?;

		Ok(Self::from_service(AisleService::new(config, catalog, urls)))
	}

	pub fn from_service(service: AisleService) -> Self {
		Self { service: Arc::new(service) }
	}
}
