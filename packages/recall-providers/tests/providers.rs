use std::{
	future::IntoFuture,
	sync::{Arc, Mutex},
};

use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode},
	response::IntoResponse,
	routing,
};
use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};
use tokio::{
	net::TcpListener,
	sync::{oneshot, oneshot::Sender},
};

use recall_config::{ApiKey, EmbeddingProviderConfig, ProviderConfig};
use recall_providers::Error;

#[derive(Clone, Default)]
struct Recorded {
	requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}
impl Recorded {
	fn push(&self, headers: &HeaderMap, payload: Value) {
		let auth = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);

		self.requests.lock().expect("Failed to lock requests.").push((auth, payload));
	}

	fn take(&self) -> Vec<(Option<String>, Value)> {
		std::mem::take(&mut *self.requests.lock().expect("Failed to lock requests."))
	}
}

async fn start_server(recorded: Recorded) -> (String, Sender<()>) {
	let app = Router::new()
		.route("/embeddings", routing::post(embed_handler))
		.route("/rerank", routing::post(rerank_handler))
		.route("/broken/embeddings", routing::post(broken_handler))
		.with_state(recorded);
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind stub server.");
	let addr = listener.local_addr().expect("Failed to read stub server address.");
	let (tx, rx) = oneshot::channel();
	let server = axum::serve(listener, app).with_graceful_shutdown(async move {
		let _ = rx.await;
	});

	tokio::spawn(async move {
		let _ = server.into_future().await;
	});

	(format!("http://{addr}"), tx)
}

async fn embed_handler(
	State(recorded): State<Recorded>,
	headers: HeaderMap,
	Json(payload): Json<Value>,
) -> impl IntoResponse {
	let inputs =
		payload.get("input").and_then(|value| value.as_array()).cloned().unwrap_or_default();

	recorded.push(&headers, payload);

	// Reverse order to check that the client sorts by index.
	let data: Vec<_> = inputs
		.iter()
		.enumerate()
		.rev()
		.map(|(index, input)| {
			let len = input.as_str().map(str::len).unwrap_or_default() as f32;

			serde_json::json!({ "index": index, "embedding": [len, index as f32] })
		})
		.collect();

	Json(serde_json::json!({ "data": data, "usage": { "total_tokens": inputs.len() } }))
}

async fn rerank_handler(
	State(recorded): State<Recorded>,
	headers: HeaderMap,
	Json(payload): Json<Value>,
) -> impl IntoResponse {
	recorded.push(&headers, payload);

	Json(serde_json::json!({
		"data": [
			{ "index": 2, "relevance_score": 0.4, "document": "c" },
			{ "index": 0, "relevance_score": 0.9, "document": "a" }
		]
	}))
}

async fn broken_handler() -> impl IntoResponse {
	StatusCode::TOO_MANY_REQUESTS
}

fn embedding_cfg(api_base: &str) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "stub".to_string(),
		api_base: api_base.to_string(),
		api_key: ApiKey::Inline("embed-secret".to_string()),
		path: "/embeddings".to_string(),
		model: "stub-embed".to_string(),
		dimensions: 2,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

fn rerank_cfg(api_base: &str) -> ProviderConfig {
	ProviderConfig {
		provider_id: "stub".to_string(),
		api_base: api_base.to_string(),
		api_key: ApiKey::Inline("rerank-secret".to_string()),
		path: "/rerank".to_string(),
		model: "stub-rerank".to_string(),
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		recall_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut default_headers = Map::new();

	default_headers.insert("x-retries".to_string(), Value::from(3));

	let err = recall_providers::auth_headers("secret", &default_headers)
		.expect_err("Expected invalid header config.");

	assert!(matches!(err, Error::InvalidConfig { .. }));
}

#[tokio::test]
async fn embed_posts_inputs_and_preserves_order() {
	let recorded = Recorded::default();
	let (api_base, shutdown) = start_server(recorded.clone()).await;
	let cfg = embedding_cfg(&api_base);
	let texts = vec!["a".to_string(), "bbb".to_string(), "cc".to_string()];
	let vectors =
		recall_providers::embedding::embed(&cfg, &texts).await.expect("Failed to embed texts.");

	assert_eq!(vectors, vec![vec![1.0, 0.0], vec![3.0, 1.0], vec![2.0, 2.0]]);

	let requests = recorded.take();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].0.as_deref(), Some("Bearer embed-secret"));
	assert_eq!(requests[0].1["model"], "stub-embed");
	assert_eq!(requests[0].1["input"], serde_json::json!(["a", "bbb", "cc"]));

	let _ = shutdown.send(());
}

#[tokio::test]
async fn embed_one_is_a_single_element_batch() {
	let recorded = Recorded::default();
	let (api_base, shutdown) = start_server(recorded.clone()).await;
	let cfg = embedding_cfg(&api_base);
	let vector = recall_providers::embedding::embed_one(&cfg, "four")
		.await
		.expect("Failed to embed text.");

	assert_eq!(vector, vec![4.0, 0.0]);
	assert_eq!(recorded.take()[0].1["input"], serde_json::json!(["four"]));

	let _ = shutdown.send(());
}

#[tokio::test]
async fn embed_surfaces_http_errors() {
	let recorded = Recorded::default();
	let (api_base, shutdown) = start_server(recorded.clone()).await;
	let mut cfg = embedding_cfg(&api_base);

	cfg.path = "/broken/embeddings".to_string();

	let err = recall_providers::embedding::embed(&cfg, &["x".to_string()])
		.await
		.expect_err("Expected HTTP error.");

	assert!(matches!(err, Error::Reqwest(_)), "Unexpected error: {err:?}");

	let _ = shutdown.send(());
}

#[tokio::test]
async fn empty_batches_skip_the_network() {
	// Nothing listens here; any request would fail.
	let cfg = embedding_cfg("http://127.0.0.1:9");
	let vectors = recall_providers::embedding::embed(&cfg, &[]).await.expect("Expected no-op.");

	assert!(vectors.is_empty());

	let ranked = recall_providers::rerank::rerank(&rerank_cfg("http://127.0.0.1:9"), "q", &[], 3)
		.await
		.expect("Expected no-op.");

	assert!(ranked.is_empty());
}

#[tokio::test]
async fn rerank_posts_query_and_returns_ranked_indexes() {
	let recorded = Recorded::default();
	let (api_base, shutdown) = start_server(recorded.clone()).await;
	let cfg = rerank_cfg(&api_base);
	let docs = vec!["a".to_string(), "b".to_string(), "c".to_string()];
	let ranked = recall_providers::rerank::rerank(&cfg, "query", &docs, 2)
		.await
		.expect("Failed to rerank documents.");

	assert_eq!(ranked, vec![(0, 0.9), (2, 0.4)]);

	let requests = recorded.take();

	assert_eq!(requests[0].0.as_deref(), Some("Bearer rerank-secret"));
	assert_eq!(requests[0].1["query"], "query");
	assert_eq!(requests[0].1["top_k"], 2);
	assert_eq!(requests[0].1["model"], "stub-rerank");
	assert_eq!(requests[0].1["documents"], serde_json::json!(["a", "b", "c"]));

	let _ = shutdown.send(());
}
