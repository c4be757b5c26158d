use time::OffsetDateTime;

use crate::{
	Error, Result,
	db::Db,
	models::{
		self, MEMORY_COLUMNS, MemoryInput, MemoryRecord, MemoryRow, NewEmbedding, StoreStats,
		StoredEmbedding,
	},
	vector,
};

/// Inserts the memory or, when `name` already exists, updates its mutable fields. Returns the id.
///
/// `last_processed` is left untouched; a newer `modified` makes the memory stale.
pub async fn upsert_memory(db: &Db, memory: &MemoryInput) -> Result<i64> {
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO memories (name, title, description, content, body, created, modified, content_hash)
VALUES (?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT(name) DO UPDATE SET
	title = excluded.title,
	description = excluded.description,
	content = excluded.content,
	body = excluded.body,
	modified = excluded.modified,
	content_hash = excluded.content_hash
RETURNING id",
	)
	.bind(memory.name.as_str())
	.bind(memory.title.as_str())
	.bind(memory.description.as_str())
	.bind(memory.content.as_str())
	.bind(memory.body.as_str())
	.bind(models::to_nanos(memory.created)?)
	.bind(models::to_nanos(memory.modified)?)
	.bind(memory.content_hash.as_str())
	.fetch_one(&db.pool)
	.await?;

	Ok(id)
}

pub async fn get_memory(db: &Db, id: i64) -> Result<Option<MemoryRecord>> {
	let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?");
	let row: Option<MemoryRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&db.pool).await?;

	row.map(MemoryRecord::try_from).transpose()
}

pub async fn get_memory_by_name(db: &Db, name: &str) -> Result<Option<MemoryRecord>> {
	let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE name = ?");
	let row: Option<MemoryRow> = sqlx::query_as(&sql).bind(name).fetch_optional(&db.pool).await?;

	row.map(MemoryRecord::try_from).transpose()
}

pub async fn list_memories(db: &Db) -> Result<Vec<MemoryRecord>> {
	let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories ORDER BY name");
	let rows: Vec<MemoryRow> = sqlx::query_as(&sql).fetch_all(&db.pool).await?;

	rows.into_iter().map(MemoryRecord::try_from).collect()
}

/// Memories that were never processed or changed since their last processing.
pub async fn list_pending(db: &Db) -> Result<Vec<MemoryRecord>> {
	let sql = format!(
		"\
SELECT {MEMORY_COLUMNS}
FROM memories
WHERE last_processed IS NULL OR modified > last_processed
ORDER BY id"
	);
	let rows: Vec<MemoryRow> = sqlx::query_as(&sql).fetch_all(&db.pool).await?;

	rows.into_iter().map(MemoryRecord::try_from).collect()
}

/// Sets `last_processed`, never earlier than the memory's `modified`.
pub async fn mark_processed(db: &Db, memory_id: i64, at: OffsetDateTime) -> Result<()> {
	let result =
		sqlx::query("UPDATE memories SET last_processed = MAX(?, modified) WHERE id = ?")
			.bind(models::to_nanos(at)?)
			.bind(memory_id)
			.execute(&db.pool)
			.await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Memory {memory_id} does not exist.")));
	}

	Ok(())
}

/// Removes the memory with its embeddings, tags and every backlink edge touching it.
pub async fn delete_memory(db: &Db, memory_id: i64) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	sqlx::query("DELETE FROM embeddings WHERE memory_id = ?")
		.bind(memory_id)
		.execute(&mut *tx)
		.await?;
	sqlx::query("DELETE FROM tags WHERE memory_id = ?").bind(memory_id).execute(&mut *tx).await?;
	sqlx::query("DELETE FROM semantic_backlinks WHERE memory_a_id = ? OR memory_b_id = ?")
		.bind(memory_id)
		.bind(memory_id)
		.execute(&mut *tx)
		.await?;

	let result =
		sqlx::query("DELETE FROM memories WHERE id = ?").bind(memory_id).execute(&mut *tx).await?;

	if result.rows_affected() == 0 {
		return Err(Error::NotFound(format!("Memory {memory_id} does not exist.")));
	}

	tx.commit().await?;

	Ok(())
}

pub async fn delete_embeddings(db: &Db, memory_id: i64) -> Result<u64> {
	let result = sqlx::query("DELETE FROM embeddings WHERE memory_id = ?")
		.bind(memory_id)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

pub async fn insert_embedding(db: &Db, embedding: &NewEmbedding) -> Result<()> {
	if embedding.vec.len() != db.vector_dim as usize {
		return Err(Error::InvalidArgument(format!(
			"Embedding for memory {} has {} dimensions, expected {}.",
			embedding.memory_id,
			embedding.vec.len(),
			db.vector_dim
		)));
	}
	if embedding.vec.iter().any(|value| !value.is_finite()) {
		return Err(Error::InvalidArgument(format!(
			"Embedding for memory {} contains non-finite values.",
			embedding.memory_id
		)));
	}

	let chunk_index = i64::try_from(embedding.chunk_index)
		.map_err(|_| Error::InvalidArgument("Chunk index is out of range.".to_string()))?;

	sqlx::query(
		"\
INSERT INTO embeddings (memory_id, chunk_text, chunk_index, embedding_dim, vector)
VALUES (?, ?, ?, ?, ?)",
	)
	.bind(embedding.memory_id)
	.bind(embedding.chunk_text.as_str())
	.bind(chunk_index)
	.bind(i64::from(db.vector_dim))
	.bind(vector::encode(&embedding.vec))
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn list_embeddings(db: &Db, memory_id: i64) -> Result<Vec<StoredEmbedding>> {
	let rows: Vec<(i64, String, i64, Vec<u8>)> = sqlx::query_as(
		"\
SELECT memory_id, chunk_text, chunk_index, vector
FROM embeddings
WHERE memory_id = ?
ORDER BY chunk_index",
	)
	.bind(memory_id)
	.fetch_all(&db.pool)
	.await?;

	rows.into_iter()
		.map(|(memory_id, chunk_text, chunk_index, blob)| {
			let vec = vector::decode(&blob).ok_or_else(|| {
				Error::InvalidArgument(format!("Stored vector for memory {memory_id} is corrupt."))
			})?;

			Ok(StoredEmbedding { memory_id, chunk_text, chunk_index: chunk_index as usize, vec })
		})
		.collect()
}

/// Replaces the memory's tag rows. Values are compared as strings by tag filters.
pub async fn replace_tags(db: &Db, memory_id: i64, tags: &[(String, String)]) -> Result<()> {
	let mut tx = db.pool.begin().await?;

	sqlx::query("DELETE FROM tags WHERE memory_id = ?").bind(memory_id).execute(&mut *tx).await?;

	for (name, value) in tags {
		sqlx::query(
			"\
INSERT INTO tags (memory_id, tag_name, tag_value)
VALUES (?, ?, ?)
ON CONFLICT(memory_id, tag_name) DO UPDATE SET tag_value = excluded.tag_value",
		)
		.bind(memory_id)
		.bind(name.as_str())
		.bind(value.as_str())
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	Ok(())
}

pub async fn list_tags(db: &Db, memory_id: i64) -> Result<Vec<(String, String)>> {
	let rows = sqlx::query_as(
		"SELECT tag_name, tag_value FROM tags WHERE memory_id = ? ORDER BY tag_name",
	)
	.bind(memory_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn stats(db: &Db) -> Result<StoreStats> {
	let (memories, pending, embeddings, backlinks): (i64, i64, i64, i64) = sqlx::query_as(
		"\
SELECT
	(SELECT count(*) FROM memories),
	(SELECT count(*) FROM memories WHERE last_processed IS NULL OR modified > last_processed),
	(SELECT count(*) FROM embeddings),
	(SELECT count(*) FROM semantic_backlinks)",
	)
	.fetch_one(&db.pool)
	.await?;

	Ok(StoreStats { memories, pending, embeddings, backlinks })
}
