use crate::domain::ports::Embedder;
use crate::utils::error::{Result, ScurveError};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Sentence embeddings served over HTTP.
///
/// Sends `{"inputs": text}` (plus `"model"` when configured) and accepts the
/// response shapes of the common embedding servers:
/// - `[[f32, ...]]` or `[f32, ...]` (text-embeddings-inference)
/// - `{"embedding": [...]}` / `{"embeddings": [[...]]}`
/// - `{"data": [{"embedding": [...]}]}` (OpenAI-compatible)
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: Option<String>,
}

impl HttpEmbedder {
    pub fn new(endpoint: impl Into<String>, model: Option<String>, timeout_seconds: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model,
        })
    }
}

fn as_vector(value: &Value) -> Option<Vec<f32>> {
    let items = value.as_array()?;
    items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}

pub(crate) fn parse_embedding(value: &Value) -> Option<Vec<f32>> {
    match value {
        Value::Array(items) => match items.first() {
            Some(Value::Array(_)) => as_vector(&items[0]),
            Some(_) => as_vector(value),
            None => None,
        },
        Value::Object(map) => {
            if let Some(embedding) = map.get("embedding") {
                as_vector(embedding)
            } else if let Some(embeddings) = map.get("embeddings") {
                embeddings.get(0).and_then(as_vector)
            } else {
                map.get("data")
                    .and_then(|data| data.get(0))
                    .and_then(|first| first.get("embedding"))
                    .and_then(as_vector)
            }
        }
        _ => None,
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut body = serde_json::json!({ "inputs": text });
        if let Some(model) = &self.model {
            body["model"] = Value::String(model.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ScurveError::connection(format!("Embedding service unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScurveError::connection(format!(
                "Embedding service returned status {}",
                status
            )));
        }

        let payload: Value = response.json().await?;
        match parse_embedding(&payload) {
            Some(vector) if !vector.is_empty() => {
                tracing::debug!("Encoded query into {} dimensions", vector.len());
                Ok(vector)
            }
            _ => Err(ScurveError::connection(
                "Embedding service returned no usable vector",
            )),
        }
    }
}
