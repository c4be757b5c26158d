use std::time::Duration;

use time::OffsetDateTime;

use recall_chunking::{Chunk, ChunkingConfig};
use recall_storage::{
	backlinks,
	models::{MemoryRecord, NewEmbedding},
	queries,
	search::{self, SimilarityQuery},
};

use crate::{RecallService, Result, batch};

/// Outcome of a pass over the pending memories.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessReport {
	pub processed: usize,
	pub failed: usize,
}

impl RecallService {
	/// Rebuilds the memory's embeddings and refreshes its semantic backlinks. Returns the number
	/// of chunks stored.
	///
	/// Old embeddings are removed first. When embedding fails the memory is left without
	/// embeddings and stays pending, so the next pass retries it.
	pub async fn process(&self, record: &MemoryRecord) -> Result<usize> {
		queries::delete_embeddings(&self.db, record.id).await?;

		let chunks = self.chunk_body(&record.body);

		if chunks.is_empty() {
			queries::mark_processed(&self.db, record.id, OffsetDateTime::now_utc()).await?;
			tracing::info!(memory_id = record.id, name = %record.name, "Processed empty memory.");

			return Ok(0);
		}

		let texts = chunks.iter().map(|chunk| chunk.text.clone()).collect::<Vec<_>>();
		let vectors = batch::embed_all(
			self.providers.embedding.as_ref(),
			&self.cfg.providers.embedding,
			&texts,
			self.cfg.batching.batch_size,
			Duration::from_millis(self.cfg.batching.inter_batch_delay_ms),
		)
		.await?;

		for (chunk, vec) in chunks.into_iter().zip(vectors.iter()) {
			queries::insert_embedding(
				&self.db,
				&NewEmbedding {
					memory_id: record.id,
					chunk_text: chunk.text,
					chunk_index: chunk.chunk_index,
					vec: vec.clone(),
				},
			)
			.await?;
		}

		let linked = self.discover_backlinks(record.id, &vectors[0]).await;

		queries::mark_processed(&self.db, record.id, OffsetDateTime::now_utc()).await?;
		tracing::info!(
			memory_id = record.id,
			name = %record.name,
			chunks = vectors.len(),
			linked,
			"Processed memory."
		);

		Ok(vectors.len())
	}

	/// Processes every stale memory. A failing memory is logged and left pending; the pass moves
	/// on to the next one.
	pub async fn process_all_pending(&self) -> Result<ProcessReport> {
		let pending = queries::list_pending(&self.db).await?;
		let mut report = ProcessReport::default();

		for record in &pending {
			match self.process(record).await {
				Ok(_) => report.processed += 1,
				Err(err) => {
					report.failed += 1;

					tracing::error!(
						memory_id = record.id,
						name = %record.name,
						error = %err,
						"Failed to process memory."
					);
				},
			}
		}

		if !pending.is_empty() {
			tracing::info!(
				processed = report.processed,
				failed = report.failed,
				"Finished processing pending memories."
			);
		}

		Ok(report)
	}

	fn chunk_body(&self, body: &str) -> Vec<Chunk> {
		let cfg = ChunkingConfig {
			max_chars: self.cfg.chunking.max_chars,
			min_chars: self.cfg.chunking.min_chars,
			overlap_chars: self.cfg.chunking.overlap_chars,
		};

		if self.cfg.chunking.markdown {
			recall_chunking::split_markdown(body, &cfg)
		} else {
			recall_chunking::split_text(body, &cfg)
		}
	}

	// Edges are best effort: each failure is logged and skipped. Returns the edges written.
	async fn discover_backlinks(&self, memory_id: i64, representative: &[f32]) -> usize {
		let query = SimilarityQuery {
			vec: representative,
			threshold: self.cfg.backlinks.discovery_threshold,
			limit: self.cfg.backlinks.discovery_limit as usize,
			exclude_id: memory_id,
			tag_filters: &[],
			require_all: false,
		};
		let neighbors = match search::similarity_search(&self.db, &query).await {
			Ok(neighbors) => neighbors,
			Err(err) => {
				tracing::warn!(memory_id, error = %err, "Backlink discovery failed.");

				return 0;
			},
		};
		let mut linked = 0;

		for neighbor in neighbors {
			match backlinks::upsert_backlink(
				&self.db,
				memory_id,
				neighbor.record.id,
				neighbor.similarity,
			)
			.await
			{
				Ok(()) => linked += 1,
				Err(err) => tracing::warn!(
					memory_id,
					neighbor_id = neighbor.record.id,
					error = %err,
					"Failed to store backlink."
				),
			}
		}

		linked
	}
}
