use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};

/// Reranks `docs` against `query`.
///
/// Returns `(original_index, relevance_score)` pairs, best first.
pub async fn rerank(
	cfg: &recall_config::ProviderConfig,
	query: &str,
	docs: &[String],
	top_k: usize,
) -> Result<Vec<(usize, f32)>> {
	if docs.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"query": query,
		"documents": docs,
		"model": cfg.model,
		"top_k": top_k,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(cfg.api_key.as_str(), &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let raw = res.error_for_status()?.text().await?;
	let json: Value = serde_json::from_str(&raw)?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<(usize, f32)>> {
	let results = json
		.get("data")
		.or_else(|| json.get("results"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing data array.".to_string(),
		})?;
	let mut ranked = Vec::with_capacity(results.len());

	for item in results {
		let index = item.get("index").and_then(|v| v.as_u64()).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result missing index.".to_string() }
		})? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result missing relevance_score.".to_string(),
			})? as f32;

		if index >= doc_count {
			return Err(Error::InvalidResponse {
				message: format!("Rerank index {index} is out of range for {doc_count} documents."),
			});
		}

		ranked.push((index, score));
	}

	ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

	Ok(ranked)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn orders_results_by_score() {
		let json = serde_json::json!({
			"data": [
				{ "index": 1, "relevance_score": 0.2, "document": "b" },
				{ "index": 0, "relevance_score": 0.9, "document": "a" }
			]
		});
		let ranked = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(ranked, vec![(0, 0.9), (1, 0.2)]);
	}

	#[test]
	fn accepts_results_key_and_score_field() {
		let json = serde_json::json!({ "results": [{ "index": 0, "score": 0.5 }] });

		assert_eq!(parse_rerank_response(json, 1).expect("parse failed"), vec![(0, 0.5)]);
	}

	#[test]
	fn rejects_out_of_range_index() {
		let json = serde_json::json!({ "data": [{ "index": 3, "relevance_score": 0.5 }] });

		assert!(matches!(parse_rerank_response(json, 2), Err(Error::InvalidResponse { .. })));
	}
}
