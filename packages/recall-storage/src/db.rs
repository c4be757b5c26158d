use std::str::FromStr;

use sqlx::{
	SqlitePool,
	sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{Result, schema};

pub const IN_MEMORY_PATH: &str = ":memory:";

pub struct Db {
	pub pool: SqlitePool,
	/// Length every stored vector must have.
	pub vector_dim: u32,
}
impl Db {
	pub async fn connect(cfg: &recall_config::Storage) -> Result<Self> {
		let in_memory = cfg.path == IN_MEMORY_PATH;
		let options = if in_memory {
			SqliteConnectOptions::from_str("sqlite::memory:")?
		} else {
			SqliteConnectOptions::new().filename(&cfg.path).create_if_missing(true)
		}
		.foreign_keys(true);
		// Each in-memory connection is its own database, so keep exactly one alive forever.
		let pool_options = if in_memory {
			SqlitePoolOptions::new()
				.max_connections(1)
				.min_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
		} else {
			SqlitePoolOptions::new().max_connections(cfg.pool_max_conns)
		};
		let pool = pool_options.connect_with(options).await?;

		tracing::info!(path = %cfg.path, vector_dim = cfg.vector_dim, "Opened memory store.");

		Ok(Self { pool, vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		for statement in schema::statements() {
			sqlx::query(statement).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}
}
