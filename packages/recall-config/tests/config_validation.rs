use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use recall_config::{ApiKey, Config, Error};

const MINIMAL_CONFIG_TOML: &str = r#"
[storage]
path       = ":memory:"
vector_dim = 4

[providers.embedding]
api_key    = "embed-key"
dimensions = 4

[providers.rerank]
api_key = "rerank-key"
"#;

fn temp_path(suffix: &str) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("recall_config_test_{nanos}_{pid}_{ordinal}.{suffix}"));

	path
}

fn write_temp_config(payload: &str) -> PathBuf {
	let path = temp_path("toml");

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_str(payload: &str) -> recall_config::Result<Config> {
	let path = write_temp_config(payload);
	let result = recall_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn base_config() -> Config {
	toml::from_str(MINIMAL_CONFIG_TOML).expect("Failed to parse test config.")
}

fn assert_validation(cfg: &Config, expected: &str) {
	let err = recall_config::validate(cfg).expect_err("Expected validation error.");

	assert!(matches!(err, Error::Validation { .. }), "Unexpected error kind: {err:?}");
	assert!(err.to_string().contains(expected), "Unexpected error: {err}");
}

#[test]
fn minimal_config_gets_defaults() {
	let cfg = load_str(MINIMAL_CONFIG_TOML).expect("Expected minimal config to load.");

	assert_eq!(cfg.service.log_level, "info");
	assert_eq!(cfg.storage.pool_max_conns, 4);
	assert_eq!(cfg.providers.embedding.model, "voyage-3.5");
	assert_eq!(cfg.providers.embedding.path, "/embeddings");
	assert_eq!(cfg.providers.rerank.model, "rerank-lite-1");
	assert_eq!(cfg.providers.rerank.path, "/rerank");
	assert_eq!(cfg.providers.rerank.timeout_ms, 30_000);
	assert_eq!(
		(cfg.chunking.max_chars, cfg.chunking.min_chars, cfg.chunking.overlap_chars),
		(1_000, 100, 100)
	);
	assert!(cfg.chunking.markdown);
	assert_eq!(cfg.batching.batch_size, 50);
	assert_eq!(cfg.batching.inter_batch_delay_ms, 200);
	assert_eq!(cfg.search.threshold, 0.1);
	assert_eq!(cfg.backlinks.discovery_threshold, 0.5);
	assert_eq!(cfg.backlinks.discovery_limit, 20);
	assert_eq!(cfg.backlinks.display_threshold, 0.1);
	assert_eq!(cfg.backlinks.snippet_chars, 200);
}

#[test]
fn recall_example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../recall.example.toml");

	recall_config::load(&path).expect("Expected recall.example.toml to be a valid config.");
}

#[test]
fn api_key_can_be_read_from_file() {
	let key_path = temp_path("key");

	fs::write(&key_path, "  file-secret\n").expect("Failed to write key file.");

	let payload = MINIMAL_CONFIG_TOML.replace(
		"api_key    = \"embed-key\"",
		&format!("api_key    = {{ path = {:?} }}", key_path.display().to_string()),
	);
	let result = load_str(&payload);

	fs::remove_file(&key_path).expect("Failed to remove key file.");

	let cfg = result.expect("Expected config with key file to load.");

	assert_eq!(cfg.providers.embedding.api_key.as_str(), "file-secret");
	assert_eq!(cfg.providers.rerank.api_key.as_str(), "rerank-key");
}

#[test]
fn missing_api_key_file_is_reported() {
	let payload = MINIMAL_CONFIG_TOML.replace(
		"api_key = \"rerank-key\"",
		"api_key = { path = \"/nonexistent/recall/key\" }",
	);
	let err = load_str(&payload).expect_err("Expected api key read error.");

	assert!(matches!(err, Error::ReadApiKey { label: "rerank", .. }), "Unexpected error: {err:?}");
}

#[test]
fn blank_api_key_is_rejected() {
	let mut cfg = base_config();

	cfg.providers.rerank.api_key = ApiKey::Inline("   ".to_string());

	assert_validation(&cfg, "Provider rerank api_key must be non-empty.");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let mut cfg = base_config();

	cfg.storage.vector_dim = 8;

	assert_validation(&cfg, "providers.embedding.dimensions must match storage.vector_dim.");

	cfg.storage.vector_dim = 0;
	cfg.providers.embedding.dimensions = 0;

	assert_validation(&cfg, "providers.embedding.dimensions must be greater than zero.");
}

#[test]
fn chunking_config_requires_valid_bounds() {
	let mut cfg = base_config();

	cfg.chunking.overlap_chars = cfg.chunking.max_chars;

	assert_validation(&cfg, "chunking.overlap_chars must be less than chunking.max_chars.");

	let mut cfg = base_config();

	cfg.chunking.min_chars = cfg.chunking.max_chars + 1;

	assert_validation(&cfg, "chunking.min_chars must not exceed chunking.max_chars.");

	let mut cfg = base_config();

	cfg.chunking.max_chars = 0;

	assert_validation(&cfg, "chunking.max_chars must be greater than zero.");
}

#[test]
fn batch_size_must_be_positive() {
	let mut cfg = base_config();

	cfg.batching.batch_size = 0;

	assert_validation(&cfg, "batching.batch_size must be greater than zero.");
}

#[test]
fn thresholds_must_be_finite_and_in_range() {
	let mut cfg = base_config();

	cfg.search.threshold = f32::NAN;

	assert_validation(&cfg, "search.threshold must be a finite number.");

	let mut cfg = base_config();

	cfg.backlinks.discovery_threshold = 1.5;

	assert_validation(&cfg, "backlinks.discovery_threshold must be in the range -1.0-1.0.");
}

#[test]
fn api_base_trailing_slash_is_trimmed() {
	let payload = MINIMAL_CONFIG_TOML.replace(
		"api_key    = \"embed-key\"",
		"api_key    = \"embed-key\"\napi_base = \"http://localhost:9/v1/\"",
	);
	let cfg = load_str(&payload).expect("Expected config to load.");

	assert_eq!(cfg.providers.embedding.api_base, "http://localhost:9/v1");
}

#[test]
fn missing_config_file_is_reported() {
	let err = recall_config::load(&temp_path("toml")).expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }), "Unexpected error: {err:?}");
}
