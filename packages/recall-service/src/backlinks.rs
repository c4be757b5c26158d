use std::collections::HashSet;

use unicode_segmentation::UnicodeSegmentation;

use recall_storage::{
	backlinks,
	models::{MemoryRecord, ScoredMemory},
	queries,
};

use crate::{
	Error, RecallService, Result,
	links::{self, LinkKind},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkType {
	Explicit,
	Semantic,
}
impl LinkType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Explicit => "explicit",
			Self::Semantic => "semantic",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceType {
	Wiki,
	Markdown,
	Embedding,
}
impl SourceType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Wiki => "wiki",
			Self::Markdown => "markdown",
			Self::Embedding => "embedding",
		}
	}
}
impl From<LinkKind> for SourceType {
	fn from(kind: LinkKind) -> Self {
		match kind {
			LinkKind::Wiki => Self::Wiki,
			LinkKind::Markdown => Self::Markdown,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct BacklinkResult {
	pub record: MemoryRecord,
	pub snippet: String,
	pub link_type: LinkType,
	pub relevance_score: f32,
	pub source_type: SourceType,
}

impl RecallService {
	/// Memories joined to `name` by a stored semantic edge scoring at least `min_similarity`,
	/// best first.
	pub async fn semantic_backlinks(
		&self,
		name: &str,
		min_similarity: f32,
	) -> Result<Vec<ScoredMemory>> {
		let record = self.require_memory(name).await?;

		self.semantic_neighbors(&record, min_similarity).await
	}

	/// Memories whose content links to `name`, ordered by name.
	pub async fn explicit_backlinks(&self, name: &str) -> Result<Vec<BacklinkResult>> {
		let snippet_chars = self.cfg.backlinks.snippet_chars;
		let mut results = Vec::new();

		for record in queries::list_memories(&self.db).await? {
			if record.name == name {
				continue;
			}

			let Some(link) = links::extract_links(&record.content)
				.into_iter()
				.find(|link| links::links_to(link, name))
			else {
				continue;
			};

			results.push(BacklinkResult {
				snippet: snippet(&record.body, snippet_chars),
				link_type: LinkType::Explicit,
				relevance_score: 1.0,
				source_type: link.kind.into(),
				record,
			});
		}

		Ok(results)
	}

	/// Explicit backlinks followed by semantic ones above the display threshold.
	///
	/// A memory reached both ways is listed once, as explicit. With a non-blank `query` the
	/// candidates are reranked and rescored by the rerank provider; if reranking fails the
	/// combined order is kept. A `limit` of zero keeps every result.
	pub async fn enhanced_backlinks(
		&self,
		name: &str,
		query: &str,
		limit: usize,
	) -> Result<Vec<BacklinkResult>> {
		let target = self.require_memory(name).await?;
		let mut results = match self.explicit_backlinks(&target.name).await {
			Ok(results) => results,
			Err(err) => {
				tracing::warn!(name = %target.name, error = %err, "Explicit backlink scan failed.");

				Vec::new()
			},
		};
		let mut seen = results.iter().map(|result| result.record.id).collect::<HashSet<_>>();

		match self.semantic_neighbors(&target, self.cfg.backlinks.display_threshold).await {
			Ok(neighbors) => {
				for neighbor in neighbors {
					if !seen.insert(neighbor.record.id) {
						continue;
					}

					results.push(BacklinkResult {
						snippet: snippet(&neighbor.record.body, self.cfg.backlinks.snippet_chars),
						link_type: LinkType::Semantic,
						relevance_score: neighbor.similarity,
						source_type: SourceType::Embedding,
						record: neighbor.record,
					});
				}
			},
			Err(err) => {
				tracing::warn!(
					name = %target.name,
					error = %err,
					"Semantic backlink lookup failed."
				);
			},
		}

		let query = query.trim();

		if !query.is_empty() && !results.is_empty() {
			results = self.rerank_backlinks(query, results, limit).await;
		}
		if limit > 0 {
			results.truncate(limit);
		}

		Ok(results)
	}

	async fn rerank_backlinks(
		&self,
		query: &str,
		results: Vec<BacklinkResult>,
		limit: usize,
	) -> Vec<BacklinkResult> {
		let docs = results.iter().map(rerank_document).collect::<Vec<_>>();
		let top_k = if limit == 0 { docs.len() } else { limit.min(docs.len()) };
		let rerank_cfg = &self.cfg.providers.rerank;
		let ranked = match self.providers.rerank.rerank(rerank_cfg, query, &docs, top_k).await {
			Ok(ranked) => ranked,
			Err(err) => {
				tracing::warn!(error = %err, "Rerank failed. Keeping the original order.");

				return results;
			},
		};
		let mut slots = results.into_iter().map(Some).collect::<Vec<_>>();
		let mut reranked = Vec::with_capacity(ranked.len());

		for (index, score) in ranked {
			let Some(mut result) = slots.get_mut(index).and_then(Option::take) else {
				continue;
			};

			result.relevance_score = score;

			reranked.push(result);
		}

		reranked
	}

	pub(crate) async fn require_memory(&self, name: &str) -> Result<MemoryRecord> {
		queries::get_memory_by_name(&self.db, name)
			.await?
			.ok_or_else(|| Error::NotFound { message: format!("Memory {name} does not exist.") })
	}

	async fn semantic_neighbors(
		&self,
		record: &MemoryRecord,
		min_similarity: f32,
	) -> Result<Vec<ScoredMemory>> {
		let edges = backlinks::backlinks_for(&self.db, record.id, min_similarity).await?;
		let mut neighbors = Vec::with_capacity(edges.len());

		for edge in edges {
			let other_id = edge.other(record.id);

			match queries::get_memory(&self.db, other_id).await? {
				Some(other) => neighbors
					.push(ScoredMemory { record: other, similarity: edge.similarity_score }),
				None => tracing::warn!(
					memory_id = record.id,
					neighbor_id = other_id,
					"Skipping backlink to a missing memory."
				),
			}
		}

		Ok(neighbors)
	}
}

/// The first `max_chars` graphemes of the trimmed body, with `...` when cut.
pub(crate) fn snippet(body: &str, max_chars: usize) -> String {
	let mut graphemes = body.trim().graphemes(true);
	let head = graphemes.by_ref().take(max_chars).collect::<String>();

	if graphemes.next().is_some() { format!("{head}...") } else { head }
}

fn rerank_document(result: &BacklinkResult) -> String {
	if result.record.title.is_empty() {
		result.snippet.clone()
	} else {
		format!("{}\n\n{}", result.record.title, result.snippet)
	}
}
