pub mod catalog;
pub mod intent;
pub mod plan;
pub mod price;
pub mod record;

pub use catalog::{CatalogFilter, CatalogMetadata, FilterDrop, FilterImpact, IndexHit};
pub use intent::{Intent, Route};
pub use plan::{DEFAULT_N_RESULTS, RetrievalPlan, SearchParams, SourceKind};
pub use record::{CatalogRecord, Provenance, ReconciledResult, Record, WebRecord};
