use std::time::Duration;

use recall_config::EmbeddingProviderConfig;

use crate::{EmbeddingProvider, Error, Result};

/// Embeds `texts` in consecutive batches of `batch_size`, pausing `inter_batch_delay` between
/// batches.
///
/// The output is aligned with `texts`. The first failing batch aborts the call and nothing
/// embedded so far is returned.
pub async fn embed_all(
	provider: &dyn EmbeddingProvider,
	cfg: &EmbeddingProviderConfig,
	texts: &[String],
	batch_size: usize,
	inter_batch_delay: Duration,
) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}
	if batch_size == 0 {
		return Err(Error::InvalidRequest {
			message: "Batch size must be greater than zero.".to_string(),
		});
	}

	let batches = texts.len().div_ceil(batch_size);
	let mut vectors = Vec::with_capacity(texts.len());

	for (batch_idx, batch) in texts.chunks(batch_size).enumerate() {
		if batch_idx > 0 && !inter_batch_delay.is_zero() {
			tokio::time::sleep(inter_batch_delay).await;
		}

		let embedded = provider.embed(cfg, batch).await?;

		if embedded.len() != batch.len() {
			return Err(Error::Provider {
				message: format!(
					"Embedding batch {} returned {} vectors for {} texts.",
					batch_idx + 1,
					embedded.len(),
					batch.len()
				),
			});
		}

		tracing::debug!(batch = batch_idx + 1, batches, size = batch.len(), "Embedded batch.");

		vectors.extend(embedded);
	}

	Ok(vectors)
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	};

	use serde_json::Map;

	use super::*;
	use crate::BoxFuture;
	use recall_config::ApiKey;

	struct SpyEmbedding {
		batches: Arc<Mutex<Vec<usize>>>,
		fail_on: Option<usize>,
		calls: AtomicUsize,
	}
	impl SpyEmbedding {
		fn new(fail_on: Option<usize>) -> Self {
			Self { batches: Arc::new(Mutex::new(Vec::new())), fail_on, calls: AtomicUsize::new(0) }
		}
	}
	impl EmbeddingProvider for SpyEmbedding {
		fn embed<'a>(
			&'a self,
			_cfg: &'a EmbeddingProviderConfig,
			texts: &'a [String],
		) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
			let call = self.calls.fetch_add(1, Ordering::SeqCst);

			self.batches.lock().expect("Failed to lock batches.").push(texts.len());

			let fail = self.fail_on == Some(call);
			let vectors =
				texts.iter().map(|text| vec![text.len() as f32, call as f32]).collect::<Vec<_>>();

			Box::pin(async move {
				if fail {
					return Err(Error::Provider { message: "Rate limited.".to_string() });
				}

				Ok(vectors)
			})
		}
	}

	fn cfg() -> EmbeddingProviderConfig {
		EmbeddingProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://127.0.0.1:9".to_string(),
			api_key: ApiKey::Inline("test-key".to_string()),
			path: "/embeddings".to_string(),
			model: "test-embed".to_string(),
			dimensions: 2,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		}
	}

	fn texts(count: usize) -> Vec<String> {
		(0..count).map(|idx| "x".repeat(idx + 1)).collect()
	}

	#[tokio::test(start_paused = true)]
	async fn splits_into_batches_and_keeps_order() {
		let provider = SpyEmbedding::new(None);
		let input = texts(7);
		let started = tokio::time::Instant::now();
		let vectors = embed_all(&provider, &cfg(), &input, 3, Duration::from_millis(200))
			.await
			.expect("Failed to embed texts.");

		assert_eq!(vectors.len(), 7);
		assert_eq!(*provider.batches.lock().expect("Failed to lock batches."), vec![3, 3, 1]);

		for (idx, vec) in vectors.iter().enumerate() {
			assert_eq!(vec[0], (idx + 1) as f32);
			assert_eq!(vec[1], (idx / 3) as f32);
		}

		// Two pauses between three batches, none after the last.
		let elapsed = started.elapsed();

		assert!(elapsed >= Duration::from_millis(400));
		assert!(elapsed < Duration::from_millis(600));
	}

	#[tokio::test]
	async fn failing_batch_returns_no_partial_result() {
		let provider = SpyEmbedding::new(Some(1));
		let result = embed_all(&provider, &cfg(), &texts(5), 2, Duration::ZERO).await;

		assert!(matches!(result, Err(Error::Provider { .. })));
		assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
	}

	#[tokio::test]
	async fn empty_input_makes_no_calls() {
		let provider = SpyEmbedding::new(None);
		let vectors =
			embed_all(&provider, &cfg(), &[], 50, Duration::ZERO).await.expect("Failed to embed.");

		assert!(vectors.is_empty());
		assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn zero_batch_size_is_rejected() {
		let provider = SpyEmbedding::new(None);
		let result = embed_all(&provider, &cfg(), &texts(1), 0, Duration::ZERO).await;

		assert!(matches!(result, Err(Error::InvalidRequest { .. })));
	}
}
