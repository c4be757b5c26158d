use recall_storage::{
	models::{ScoredMemory, TagFilter},
	search::{self, SimilarityQuery},
};

use crate::{Error, RecallService, Result};

pub const DEFAULT_LIMIT: usize = 10;

/// Score reported for tag-only results, which have no similarity to compute.
pub const TAG_ONLY_SCORE: f32 = 1.0;

#[derive(Clone, Debug, Default)]
pub struct SearchRequest {
	pub query: String,
	pub tag_filters: Vec<TagFilter>,
	/// Combine tag filters with AND instead of OR.
	pub require_all: bool,
	/// Zero selects [`DEFAULT_LIMIT`].
	pub limit: usize,
}
impl SearchRequest {
	pub fn new(query: impl Into<String>) -> Self {
		Self { query: query.into(), ..Default::default() }
	}
}

impl RecallService {
	/// Semantic search over stored chunks, optionally restricted by tags.
	///
	/// A blank query with tag filters lists the matching memories, newest first, each scored
	/// [`TAG_ONLY_SCORE`]. A blank query without filters matches nothing.
	pub async fn search(&self, req: &SearchRequest) -> Result<Vec<ScoredMemory>> {
		if req.tag_filters.iter().any(|filter| filter.key.trim().is_empty()) {
			return Err(Error::InvalidRequest {
				message: "Tag filter keys must be non-empty.".to_string(),
			});
		}

		let limit = if req.limit == 0 { DEFAULT_LIMIT } else { req.limit };
		let query = req.query.trim();

		if query.is_empty() {
			if req.tag_filters.is_empty() {
				return Ok(Vec::new());
			}

			let records =
				search::tag_only_search(&self.db, &req.tag_filters, req.require_all, limit).await?;

			return Ok(records
				.into_iter()
				.map(|record| ScoredMemory { record, similarity: TAG_ONLY_SCORE })
				.collect());
		}

		let vec = self.embed_query(query).await?;
		let results = search::similarity_search(
			&self.db,
			&SimilarityQuery {
				vec: &vec,
				threshold: self.cfg.search.threshold,
				limit,
				exclude_id: -1,
				tag_filters: &req.tag_filters,
				require_all: req.require_all,
			},
		)
		.await?;

		tracing::debug!(
			results = results.len(),
			filters = req.tag_filters.len(),
			"Searched memories."
		);

		Ok(results)
	}
}
