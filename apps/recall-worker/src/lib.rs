pub mod worker;

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use recall_service::RecallService;
use recall_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = recall_cli::VERSION,
	rename_all = "kebab",
	styles = recall_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Run a single pass over the pending memories and exit.
	#[arg(long)]
	pub once: bool,
	/// Pause between passes.
	#[arg(long, value_name = "MS", default_value_t = 5_000)]
	pub interval_ms: u64,
	/// Embed a probe text before the first pass and fail fast on bad credentials.
	#[arg(long)]
	pub check_providers: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = recall_config::load(&args.config)?;

	init_tracing(&config);

	let db = Db::connect(&config.storage).await?;

	db.ensure_schema().await?;

	let service = RecallService::new(config, db);

	if args.check_providers {
		service.validate_providers().await?;
	}

	let options = worker::WorkerOptions {
		once: args.once,
		interval: Duration::from_millis(args.interval_ms),
	};

	worker::run_worker(&service, &options).await
}

fn init_tracing(config: &recall_config::Config) {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_worker_flags() {
		let args = Args::try_parse_from(["recall-worker", "-c", "recall.toml", "--once"])
			.expect("Failed to parse args.");

		assert_eq!(args.config, PathBuf::from("recall.toml"));
		assert!(args.once);
		assert_eq!(args.interval_ms, 5_000);
		assert!(!args.check_providers);

		let args = Args::try_parse_from([
			"recall-worker",
			"--config",
			"recall.toml",
			"--interval-ms",
			"250",
		])
		.expect("Failed to parse args.");

		assert!(!args.once);
		assert_eq!(args.interval_ms, 250);
	}

	#[test]
	fn config_is_required() {
		assert!(Args::try_parse_from(["recall-worker", "--once"]).is_err());
	}
}
