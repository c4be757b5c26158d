use serde_json::{Map, Value};
use time::OffsetDateTime;

use recall_storage::{models::MemoryInput, queries};

use crate::{BoxFuture, Error, RecallService, Result};

/// The document store the memories are read from.
pub trait DocumentSource
where
	Self: Send + Sync,
{
	fn list<'a>(&'a self) -> BoxFuture<'a, Result<Vec<String>>>;

	fn read_with_metadata<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Document>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrontMatter {
	pub title: String,
	pub description: String,
	pub tags: Map<String, Value>,
	pub created: OffsetDateTime,
	pub modified: OffsetDateTime,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
	pub name: String,
	/// Raw content including front matter.
	pub content: String,
	pub body: String,
	pub front_matter: FrontMatter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
	Synced { memory_id: i64 },
	Unchanged { memory_id: i64 },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
	pub synced: usize,
	pub unchanged: usize,
	pub failed: usize,
}

impl RecallService {
	/// Copies one document into the store and processes it when its content changed.
	///
	/// Tag and processing failures are logged; the memory then stays pending for the next pass.
	pub async fn sync_memory(
		&self,
		source: &dyn DocumentSource,
		name: &str,
	) -> Result<SyncOutcome> {
		let name = name.trim();

		if name.is_empty() {
			return Err(Error::InvalidRequest { message: "Memory name is required.".to_string() });
		}

		let doc = source.read_with_metadata(name).await?;
		let content_hash = content_hash(&doc.content);

		if let Some(existing) = queries::get_memory_by_name(&self.db, name).await?
			&& existing.content_hash == content_hash
		{
			tracing::debug!(memory_id = existing.id, name, "Memory content is unchanged.");

			return Ok(SyncOutcome::Unchanged { memory_id: existing.id });
		}

		let memory_id = queries::upsert_memory(
			&self.db,
			&MemoryInput {
				name: name.to_string(),
				title: doc.front_matter.title,
				description: doc.front_matter.description,
				body: doc.body,
				content: doc.content,
				created: doc.front_matter.created,
				modified: doc.front_matter.modified,
				content_hash,
			},
		)
		.await?;
		let tags = doc
			.front_matter
			.tags
			.iter()
			.map(|(key, value)| (key.clone(), tag_value(value)))
			.collect::<Vec<_>>();

		if let Err(err) = queries::replace_tags(&self.db, memory_id, &tags).await {
			tracing::warn!(memory_id, name, error = %err, "Failed to store memory tags.");
		}

		let record = queries::get_memory(&self.db, memory_id).await?.ok_or_else(|| {
			Error::NotFound { message: format!("Memory {name} vanished during sync.") }
		})?;

		if let Err(err) = self.process(&record).await {
			tracing::warn!(memory_id, name, error = %err, "Failed to process synced memory.");
		}

		Ok(SyncOutcome::Synced { memory_id })
	}

	/// Syncs every document the source lists. One failing document does not stop the rest.
	pub async fn sync_all(&self, source: &dyn DocumentSource) -> Result<SyncReport> {
		let names = source.list().await?;
		let mut report = SyncReport::default();

		for name in &names {
			match self.sync_memory(source, name).await {
				Ok(SyncOutcome::Synced { .. }) => report.synced += 1,
				Ok(SyncOutcome::Unchanged { .. }) => report.unchanged += 1,
				Err(err) => {
					report.failed += 1;

					tracing::warn!(name = %name, error = %err, "Failed to sync memory.");
				},
			}
		}

		tracing::info!(
			synced = report.synced,
			unchanged = report.unchanged,
			failed = report.failed,
			"Synced memories."
		);

		Ok(report)
	}

	/// Removes the memory with its embeddings, tags and backlink edges.
	pub async fn delete_memory(&self, name: &str) -> Result<()> {
		let record = self.require_memory(name).await?;

		queries::delete_memory(&self.db, record.id).await?;
		tracing::info!(memory_id = record.id, name = %record.name, "Deleted memory.");

		Ok(())
	}
}

/// Hex blake3 digest of the raw content.
pub fn content_hash(content: &str) -> String {
	blake3::hash(content.as_bytes()).to_hex().to_string()
}

// Filters compare tag values as strings.
fn tag_value(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
