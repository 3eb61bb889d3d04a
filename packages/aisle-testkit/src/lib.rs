pub mod fixtures;
pub mod stubs;

mod error;

pub use error::{Error, Result};
pub use stubs::{
	Harness, KeywordEmbedding, StubCatalog, StubClassifier, StubIndex, StubPlanner, StubReconciler,
	StubSynthesizer, StubWeb,
};

use std::{env, thread, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{CreateCollectionBuilder, Distance, PointStruct, UpsertPointsBuilder, VectorParamsBuilder},
};
use tokio::{runtime::Builder, time};
use uuid::Uuid;

pub fn env_qdrant_url() -> Option<String> {
	env::var("AISLE_QDRANT_URL").ok()
}

/// A throwaway catalog collection, dropped on cleanup or drop.
pub struct TestCollection {
	url: String,
	name: String,
	client: Qdrant,
	cleaned: bool,
}
impl TestCollection {
	pub async fn create(url: &str, vector_dim: u64) -> Result<Self> {
		let client = Qdrant::from_url(url).build()?;
		let name = format!("aisle_test_{}", Uuid::new_v4().simple());
		let builder = CreateCollectionBuilder::new(name.clone())
			.vectors_config(VectorParamsBuilder::new(vector_dim, Distance::Cosine));

		time::timeout(Duration::from_secs(10), client.create_collection(builder))
			.await
			.map_err(|_| Error::Message("Qdrant create_collection timed out.".to_string()))??;

		Ok(Self { url: url.to_string(), name, client, cleaned: false })
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// Inserts one point per `(vector, payload)` with sequential ids.
	pub async fn seed(&self, points: Vec<(Vec<f32>, Vec<(&str, String)>)>) -> Result<()> {
		let points = points
			.into_iter()
			.enumerate()
			.map(|(idx, (vector, fields))| {
				let mut payload = Payload::new();

				for (key, value) in fields {
					payload.insert(key, value);
				}

				PointStruct::new(idx as u64 + 1, vector, payload)
			})
			.collect::<Vec<_>>();

		self.client.upsert_points(UpsertPointsBuilder::new(self.name.clone(), points).wait(true)).await?;

		Ok(())
	}

	pub async fn cleanup(mut self) -> Result<()> {
		self.cleaned = true;

		drop_collection(&self.client, &self.name).await
	}
}
impl Drop for TestCollection {
	fn drop(&mut self) {
		if self.cleaned {
			return;
		}

		let url = self.url.clone();
		let name = self.name.clone();
		let cleanup_thread = thread::spawn(move || {
			let runtime = match Builder::new_current_thread().enable_all().build() {
				Ok(runtime) => runtime,
				Err(err) => {
					eprintln!("Test collection cleanup failed: {err}.");

					return;
				},
			};
			let result = runtime.block_on(async {
				let client = Qdrant::from_url(&url).build()?;

				drop_collection(&client, &name).await
			});

			if let Err(err) = result {
				eprintln!("Test collection cleanup failed: {err}.");
			}
		});
		let _ = cleanup_thread.join();
	}
}

async fn drop_collection(client: &Qdrant, name: &str) -> Result<()> {
	time::timeout(Duration::from_secs(10), client.delete_collection(name.to_string()))
		.await
		.map_err(|_| Error::Message(format!("Timed out deleting Qdrant collection {name:?}.")))??;

	Ok(())
}
