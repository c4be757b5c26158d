pub mod backlinks;
pub mod batch;
pub mod links;
pub mod process;
pub mod render;
pub mod search;
pub mod sync;

mod error;

pub use backlinks::{BacklinkResult, LinkType, SourceType};
pub use error::{Error, Result};
pub use process::ProcessReport;
pub use search::SearchRequest;
pub use sync::{Document, DocumentSource, FrontMatter, SyncOutcome, SyncReport};

use std::{future::Future, pin::Pin, sync::Arc};

use recall_config::{Config, EmbeddingProviderConfig, ProviderConfig};
use recall_providers::{embedding, rerank};
use recall_storage::{db::Db, models::StoreStats, queries};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// One vector per text, in input order.
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	/// `(original_index, relevance_score)` pairs, best first, at most `top_k` of them.
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_k: usize,
	) -> BoxFuture<'a, Result<Vec<(usize, f32)>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(embedding: Arc<dyn EmbeddingProvider>, rerank: Arc<dyn RerankProvider>) -> Self {
		Self { embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider }
	}
}

pub struct RecallService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl RecallService {
	pub fn new(cfg: Config, db: Db) -> Self {
		Self { cfg, db, providers: Providers::default() }
	}

	pub fn with_providers(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}

	/// Embeds a probe text to check that the embedding provider accepts our credentials.
	pub async fn validate_providers(&self) -> Result<()> {
		let vec = self.embed_query("test").await?;
		let expected = self.cfg.providers.embedding.dimensions as usize;

		if vec.len() != expected {
			return Err(Error::Provider {
				message: format!(
					"Embedding provider returned {} dimensions, expected {expected}.",
					vec.len()
				),
			});
		}

		tracing::info!(
			provider_id = %self.cfg.providers.embedding.provider_id,
			model = %self.cfg.providers.embedding.model,
			"Embedding provider is reachable."
		);

		Ok(())
	}

	pub async fn stats(&self) -> Result<StoreStats> {
		Ok(queries::stats(&self.db).await?)
	}

	pub(crate) async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let mut vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != 1 {
			return Err(Error::Provider {
				message: format!("Expected one query embedding, got {}.", vectors.len()),
			});
		}

		Ok(vectors.swap_remove(0))
	}
}

struct DefaultProviders;
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_k: usize,
	) -> BoxFuture<'a, Result<Vec<(usize, f32)>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs, top_k).await?) })
	}
}
