use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub batching: Batching,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub backlinks: Backlinks,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { log_level: "info".to_string() }
	}
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	/// Database file, or `:memory:` for a private in-memory database.
	pub path: String,
	#[serde(default = "default_pool_max_conns")]
	pub pool_max_conns: u32,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
}

/// Either the key itself or a file holding it.
///
/// `load` replaces the `File` form with the trimmed file content.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiKey {
	Inline(String),
	File { path: PathBuf },
}
impl ApiKey {
	/// The resolved key, or an empty string for a file reference that was never read.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Inline(key) => key,
			Self::File { .. } => "",
		}
	}
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	#[serde(default = "default_provider_id")]
	pub provider_id: String,
	#[serde(default = "default_api_base")]
	pub api_base: String,
	pub api_key: ApiKey,
	#[serde(default = "default_embedding_path")]
	pub path: String,
	#[serde(default = "default_embedding_model")]
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
	#[serde(default = "default_provider_id")]
	pub provider_id: String,
	#[serde(default = "default_api_base")]
	pub api_base: String,
	pub api_key: ApiKey,
	#[serde(default = "default_rerank_path")]
	pub path: String,
	#[serde(default = "default_rerank_model")]
	pub model: String,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Chunking {
	pub max_chars: usize,
	pub min_chars: usize,
	pub overlap_chars: usize,
	/// Use the markdown-aware splitter.
	pub markdown: bool,
}
impl Default for Chunking {
	fn default() -> Self {
		Self { max_chars: 1_000, min_chars: 100, overlap_chars: 100, markdown: true }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Batching {
	pub batch_size: usize,
	pub inter_batch_delay_ms: u64,
}
impl Default for Batching {
	fn default() -> Self {
		Self { batch_size: 50, inter_batch_delay_ms: 200 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub threshold: f32,
}
impl Default for Search {
	fn default() -> Self {
		Self { threshold: 0.1 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Backlinks {
	/// Minimum similarity for creating an edge while processing a memory.
	pub discovery_threshold: f32,
	pub discovery_limit: u32,
	/// Minimum similarity for listing semantic backlinks.
	pub display_threshold: f32,
	pub snippet_chars: usize,
}
impl Default for Backlinks {
	fn default() -> Self {
		Self {
			discovery_threshold: 0.5,
			discovery_limit: 20,
			display_threshold: 0.1,
			snippet_chars: 200,
		}
	}
}

fn default_pool_max_conns() -> u32 {
	4
}

fn default_provider_id() -> String {
	"voyage".to_string()
}

fn default_api_base() -> String {
	"https://api.voyageai.com/v1".to_string()
}

fn default_embedding_path() -> String {
	"/embeddings".to_string()
}

fn default_rerank_path() -> String {
	"/rerank".to_string()
}

fn default_embedding_model() -> String {
	"voyage-3.5".to_string()
}

fn default_rerank_model() -> String {
	"rerank-lite-1".to_string()
}

fn default_timeout_ms() -> u64 {
	30_000
}
