use std::time::Duration;

use color_eyre::Result;

use recall_service::{ProcessReport, RecallService};

#[derive(Clone, Debug)]
pub struct WorkerOptions {
	pub once: bool,
	pub interval: Duration,
}

/// Processes pending memories until stopped, or once when `options.once` is set.
///
/// A failed pass is logged and retried after the interval.
pub async fn run_worker(service: &RecallService, options: &WorkerOptions) -> Result<()> {
	tracing::info!(
		once = options.once,
		interval_ms = options.interval.as_millis() as u64,
		"Worker started."
	);

	loop {
		match run_pass(service).await {
			Ok(report) if options.once => {
				tracing::info!(
					processed = report.processed,
					failed = report.failed,
					"Single pass finished."
				);

				return Ok(());
			},
			Ok(_) => {},
			Err(err) if options.once => return Err(err),
			Err(err) => tracing::error!(error = %err, "Processing pass failed."),
		}

		tokio::time::sleep(options.interval).await;
	}
}

pub async fn run_pass(service: &RecallService) -> Result<ProcessReport> {
	Ok(service.process_all_pending().await?)
}
