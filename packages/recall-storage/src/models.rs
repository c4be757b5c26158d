use time::OffsetDateTime;

use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryRecord {
	pub id: i64,
	pub name: String,
	pub title: String,
	pub description: String,
	/// Content with front matter stripped; the chunked text.
	pub body: String,
	/// Raw content including front matter.
	pub content: String,
	pub created: OffsetDateTime,
	pub modified: OffsetDateTime,
	pub last_processed: Option<OffsetDateTime>,
	pub content_hash: String,
}
impl MemoryRecord {
	pub fn is_stale(&self) -> bool {
		match self.last_processed {
			None => true,
			Some(last_processed) => self.modified > last_processed,
		}
	}
}

/// Fields written by [`crate::queries::upsert_memory`]. The id is assigned by the store.
#[derive(Clone, Debug)]
pub struct MemoryInput {
	pub name: String,
	pub title: String,
	pub description: String,
	pub body: String,
	pub content: String,
	pub created: OffsetDateTime,
	pub modified: OffsetDateTime,
	pub content_hash: String,
}

#[derive(Clone, Debug)]
pub struct NewEmbedding {
	pub memory_id: i64,
	pub chunk_text: String,
	pub chunk_index: usize,
	pub vec: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct StoredEmbedding {
	pub memory_id: i64,
	pub chunk_text: String,
	pub chunk_index: usize,
	pub vec: Vec<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SemanticBacklink {
	pub memory_a_id: i64,
	pub memory_b_id: i64,
	pub similarity_score: f32,
}
impl SemanticBacklink {
	/// The side of the edge that is not `memory_id`.
	pub fn other(&self, memory_id: i64) -> i64 {
		if self.memory_a_id == memory_id { self.memory_b_id } else { self.memory_a_id }
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFilter {
	pub key: String,
	pub value: Option<String>,
	/// Match the exact value rather than only the key's presence. An empty value matches on the
	/// key alone.
	pub check_value: bool,
}
impl TagFilter {
	pub fn has_key(key: impl Into<String>) -> Self {
		Self { key: key.into(), value: None, check_value: false }
	}

	pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self { key: key.into(), value: Some(value.into()), check_value: true }
	}

	pub(crate) fn exact_value(&self) -> Option<&str> {
		self.value.as_deref().filter(|value| self.check_value && !value.is_empty())
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScoredMemory {
	pub record: MemoryRecord,
	pub similarity: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
	pub memories: i64,
	pub pending: i64,
	pub embeddings: i64,
	pub backlinks: i64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct MemoryRow {
	pub id: i64,
	pub name: String,
	pub title: String,
	pub description: String,
	pub body: String,
	pub content: String,
	pub created: i64,
	pub modified: i64,
	pub last_processed: Option<i64>,
	pub content_hash: String,
}
impl TryFrom<MemoryRow> for MemoryRecord {
	type Error = Error;

	fn try_from(row: MemoryRow) -> Result<Self> {
		Ok(Self {
			id: row.id,
			name: row.name,
			title: row.title,
			description: row.description,
			body: row.body,
			content: row.content,
			created: from_nanos(row.created)?,
			modified: from_nanos(row.modified)?,
			last_processed: row.last_processed.map(from_nanos).transpose()?,
			content_hash: row.content_hash,
		})
	}
}

pub(crate) const MEMORY_COLUMNS: &str = "\
id, name, title, description, body, content, created, modified, last_processed, content_hash";

/// Timestamps are stored as Unix nanoseconds.
pub(crate) fn to_nanos(ts: OffsetDateTime) -> Result<i64> {
	i64::try_from(ts.unix_timestamp_nanos())
		.map_err(|_| Error::InvalidArgument(format!("Timestamp {ts:?} is out of range.")))
}

pub(crate) fn from_nanos(nanos: i64) -> Result<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(|err| {
		Error::InvalidArgument(format!("Stored timestamp {nanos} is invalid: {err}."))
	})
}
