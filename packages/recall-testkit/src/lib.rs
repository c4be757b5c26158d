mod error;

pub use error::{Error, Result};

use std::{
	env, fs,
	io::ErrorKind,
	path::{Path, PathBuf},
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use serde_json::Map;

use recall_config::{
	ApiKey, Backlinks, Batching, Chunking, Config, EmbeddingProviderConfig, ProviderConfig,
	Providers, Search, Service, Storage,
};

/// A database file in the temp directory, removed on cleanup or drop.
pub struct TestDatabase {
	path: PathBuf,
	cleaned: bool,
}
impl TestDatabase {
	pub fn new() -> Result<Self> {
		static COUNTER: AtomicU64 = AtomicU64::new(0);

		let nanos = SystemTime::now()
			.duration_since(UNIX_EPOCH)
			.map_err(|err| Error::Message(format!("System clock is before the epoch: {err}.")))?
			.as_nanos();
		let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
		let mut path = env::temp_dir();

		path.push(format!("recall_test_{nanos}_{}_{ordinal}.db", std::process::id()));

		Ok(Self { path, cleaned: false })
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn storage_config(&self, vector_dim: u32) -> Storage {
		Storage { path: self.path.display().to_string(), pool_max_conns: 4, vector_dim }
	}

	pub fn cleanup(mut self) -> Result<()> {
		self.cleanup_inner()
	}

	fn cleanup_inner(&mut self) -> Result<()> {
		if self.cleaned {
			return Ok(());
		}

		self.cleaned = true;

		for suffix in ["", "-wal", "-shm", "-journal"] {
			let mut path = self.path.clone().into_os_string();

			path.push(suffix);

			match fs::remove_file(&path) {
				Ok(()) => {},
				Err(err) if err.kind() == ErrorKind::NotFound => {},
				Err(err) => return Err(err.into()),
			}
		}

		Ok(())
	}
}
impl Drop for TestDatabase {
	fn drop(&mut self) {
		if let Err(err) = self.cleanup_inner() {
			eprintln!("Test database cleanup failed: {err}.");
		}
	}
}

/// Storage settings for a private in-memory database.
pub fn memory_storage(vector_dim: u32) -> Storage {
	Storage { path: ":memory:".to_string(), pool_max_conns: 1, vector_dim }
}

/// A complete config pointing both providers at `api_base`, with an in-memory store.
pub fn test_config(api_base: &str, vector_dim: u32) -> Config {
	Config {
		service: Service { log_level: "debug".to_string() },
		storage: memory_storage(vector_dim),
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: api_base.to_string(),
				api_key: ApiKey::Inline("test-key".to_string()),
				path: "/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: vector_dim,
				timeout_ms: 5_000,
				default_headers: Map::new(),
			},
			rerank: ProviderConfig {
				provider_id: "test".to_string(),
				api_base: api_base.to_string(),
				api_key: ApiKey::Inline("test-key".to_string()),
				path: "/rerank".to_string(),
				model: "test-rerank".to_string(),
				timeout_ms: 5_000,
				default_headers: Map::new(),
			},
		},
		chunking: Chunking::default(),
		batching: Batching { batch_size: 50, inter_batch_delay_ms: 0 },
		search: Search::default(),
		backlinks: Backlinks::default(),
	}
}

/// A unit vector whose cosine similarity with the first axis is `similarity`.
pub fn vector_at(dim: usize, similarity: f32) -> Vec<f32> {
	assert!(dim >= 2, "Vectors need at least two dimensions.");

	let mut vec = vec![0.0; dim];

	vec[0] = similarity;
	vec[1] = (1.0 - similarity * similarity).max(0.0).sqrt();

	vec
}

/// The first axis, the reference direction for [`vector_at`].
pub fn axis(dim: usize) -> Vec<f32> {
	vector_at(dim, 1.0)
}
