mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	ApiKey, Backlinks, Batching, Chunking, Config, EmbeddingProviderConfig, ProviderConfig,
	Providers, Search, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	resolve_api_keys(&mut cfg)?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.path.trim().is_empty() {
		return Err(Error::Validation { message: "storage.path must be non-empty.".to_string() });
	}
	if cfg.storage.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.vector_dim.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("rerank", &cfg.providers.rerank.api_key)]
	{
		if key.as_str().trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.chunking.max_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.min_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.min_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.min_chars > cfg.chunking.max_chars {
		return Err(Error::Validation {
			message: "chunking.min_chars must not exceed chunking.max_chars.".to_string(),
		});
	}
	if cfg.chunking.overlap_chars >= cfg.chunking.max_chars {
		return Err(Error::Validation {
			message: "chunking.overlap_chars must be less than chunking.max_chars.".to_string(),
		});
	}
	if cfg.batching.batch_size == 0 {
		return Err(Error::Validation {
			message: "batching.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.backlinks.discovery_limit == 0 {
		return Err(Error::Validation {
			message: "backlinks.discovery_limit must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("search.threshold", cfg.search.threshold),
		("backlinks.discovery_threshold", cfg.backlinks.discovery_threshold),
		("backlinks.display_threshold", cfg.backlinks.display_threshold),
	] {
		if !value.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(-1.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range -1.0-1.0."),
			});
		}
	}

	Ok(())
}

fn resolve_api_keys(cfg: &mut Config) -> Result<()> {
	for (label, key) in [
		("embedding", &mut cfg.providers.embedding.api_key),
		("rerank", &mut cfg.providers.rerank.api_key),
	] {
		if let ApiKey::File { path } = key {
			let raw = fs::read_to_string(&*path)
				.map_err(|err| Error::ReadApiKey { label, path: path.clone(), source: err })?;

			*key = ApiKey::Inline(raw.trim().to_string());
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}

	for api_base in [&mut cfg.providers.embedding.api_base, &mut cfg.providers.rerank.api_base] {
		let trimmed = api_base.trim_end_matches('/').len();

		api_base.truncate(trimmed);
	}
}
