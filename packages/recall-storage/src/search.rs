use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite};

use crate::{
	Error, Result,
	db::Db,
	models::{MEMORY_COLUMNS, MemoryRecord, MemoryRow, ScoredMemory, TagFilter},
	queries, vector,
};

#[derive(Clone, Debug)]
pub struct SimilarityQuery<'a> {
	pub vec: &'a [f32],
	/// Results must score strictly above this.
	pub threshold: f32,
	pub limit: usize,
	/// Memory id to leave out; ignored when negative.
	pub exclude_id: i64,
	pub tag_filters: &'a [TagFilter],
	pub require_all: bool,
}

/// Nearest memories by cosine similarity of their best-matching chunk, best first.
pub async fn similarity_search(db: &Db, query: &SimilarityQuery<'_>) -> Result<Vec<ScoredMemory>> {
	if query.vec.len() != db.vector_dim as usize {
		return Err(Error::InvalidArgument(format!(
			"Query vector has {} dimensions, expected {}.",
			query.vec.len(),
			db.vector_dim
		)));
	}
	if query.limit == 0 {
		return Ok(Vec::new());
	}

	let mut builder = QueryBuilder::<Sqlite>::new("SELECT e.memory_id, e.vector FROM embeddings e");

	if query.exclude_id >= 0 || !query.tag_filters.is_empty() {
		builder.push(" WHERE 1 = 1");
	}
	if query.exclude_id >= 0 {
		builder.push(" AND e.memory_id <> ").push_bind(query.exclude_id);
	}
	if !query.tag_filters.is_empty() {
		builder.push(" AND ");
		push_tag_filters(&mut builder, "e.memory_id", query.tag_filters, query.require_all);
	}

	let rows: Vec<(i64, Vec<u8>)> = builder.build_query_as().fetch_all(&db.pool).await?;
	let mut best: HashMap<i64, f32> = HashMap::new();

	for (memory_id, blob) in rows {
		let Some(vec) = vector::decode(&blob) else {
			tracing::warn!(memory_id, "Skipping corrupt stored vector.");

			continue;
		};
		let similarity = vector::cosine_similarity(query.vec, &vec);

		if similarity <= query.threshold {
			continue;
		}

		best.entry(memory_id)
			.and_modify(|score| *score = score.max(similarity))
			.or_insert(similarity);
	}

	let mut ranked: Vec<(i64, f32)> = best.into_iter().collect();

	ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
	ranked.truncate(query.limit);

	let mut results = Vec::with_capacity(ranked.len());

	for (memory_id, similarity) in ranked {
		// A memory deleted since the scan simply drops out.
		if let Some(record) = queries::get_memory(db, memory_id).await? {
			results.push(ScoredMemory { record, similarity });
		}
	}

	Ok(results)
}

/// Memories matching the tag filters, most recently modified first. No similarity is computed.
pub async fn tag_only_search(
	db: &Db,
	tag_filters: &[TagFilter],
	require_all: bool,
	limit: usize,
) -> Result<Vec<MemoryRecord>> {
	let mut builder =
		QueryBuilder::<Sqlite>::new(format!("SELECT {MEMORY_COLUMNS} FROM memories m"));

	if !tag_filters.is_empty() {
		builder.push(" WHERE ");
		push_tag_filters(&mut builder, "m.id", tag_filters, require_all);
	}

	builder
		.push(" ORDER BY m.modified DESC, m.id DESC LIMIT ")
		.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));

	let rows: Vec<MemoryRow> = builder.build_query_as().fetch_all(&db.pool).await?;

	rows.into_iter().map(MemoryRecord::try_from).collect()
}

fn push_tag_filters(
	builder: &mut QueryBuilder<'_, Sqlite>,
	memory_column: &str,
	filters: &[TagFilter],
	require_all: bool,
) {
	let joiner = if require_all { " AND " } else { " OR " };

	builder.push("(");

	for (idx, filter) in filters.iter().enumerate() {
		if idx > 0 {
			builder.push(joiner);
		}

		builder
			.push("EXISTS (SELECT 1 FROM tags t WHERE t.memory_id = ")
			.push(memory_column)
			.push(" AND t.tag_name = ")
			.push_bind(filter.key.clone());

		if let Some(value) = filter.exact_value() {
			builder.push(" AND t.tag_value = ").push_bind(value.to_string());
		}

		builder.push(")");
	}

	builder.push(")");
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn tag_filters_join_with_and_or() {
		let filters =
			vec![TagFilter::with_value("status", "done"), TagFilter::has_key("project")];
		let mut all = QueryBuilder::<Sqlite>::new("");

		push_tag_filters(&mut all, "m.id", &filters, true);

		let sql = all.sql();

		assert_eq!(sql.matches("EXISTS").count(), 2);
		assert!(sql.contains(") AND EXISTS"));
		assert_eq!(sql.matches("t.tag_value").count(), 1);

		let mut any = QueryBuilder::<Sqlite>::new("");

		push_tag_filters(&mut any, "m.id", &filters, false);

		assert!(any.sql().contains(") OR EXISTS"));
	}
}
