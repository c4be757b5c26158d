use crate::{Error, Result, db::Db, models::SemanticBacklink};

/// Stores the undirected edge under `(min, max)`. A repeated pair overwrites the score.
pub async fn upsert_backlink(db: &Db, id_a: i64, id_b: i64, score: f32) -> Result<()> {
	if id_a == id_b {
		return Err(Error::InvalidArgument(format!("Memory {id_a} cannot link to itself.")));
	}
	if !score.is_finite() {
		return Err(Error::InvalidArgument(format!(
			"Backlink score between {id_a} and {id_b} is not finite."
		)));
	}

	let (low, high) = (id_a.min(id_b), id_a.max(id_b));

	sqlx::query(
		"\
INSERT INTO semantic_backlinks (memory_a_id, memory_b_id, similarity_score)
VALUES (?, ?, ?)
ON CONFLICT(memory_a_id, memory_b_id) DO UPDATE SET similarity_score = excluded.similarity_score",
	)
	.bind(low)
	.bind(high)
	.bind(score)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Edges touching `memory_id` scoring at least `min_similarity`, best first.
pub async fn backlinks_for(
	db: &Db,
	memory_id: i64,
	min_similarity: f32,
) -> Result<Vec<SemanticBacklink>> {
	let rows: Vec<(i64, i64, f32)> = sqlx::query_as(
		"\
SELECT memory_a_id, memory_b_id, similarity_score
FROM semantic_backlinks
WHERE (memory_a_id = ? OR memory_b_id = ?) AND similarity_score >= ?
ORDER BY similarity_score DESC, memory_a_id, memory_b_id",
	)
	.bind(memory_id)
	.bind(memory_id)
	.bind(min_similarity)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|(memory_a_id, memory_b_id, similarity_score)| SemanticBacklink {
			memory_a_id,
			memory_b_id,
			similarity_score,
		})
		.collect())
}
