use crate::domain::model::SearchHit;
use crate::domain::ports::VectorSearch;
use crate::utils::error::{Result, ScurveError};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ElasticsearchSettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub index: String,
    pub vector_field: String,
    pub source_fields: Vec<String>,
    pub verify_certs: bool,
    pub timeout_seconds: u64,
}

impl Default for ElasticsearchSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            index: "aerospace_index".to_string(),
            vector_field: "vector".to_string(),
            source_fields: vec![
                "cpc_subgroup_id".to_string(),
                "date_published".to_string(),
            ],
            verify_certs: true,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: HitsEnvelope,
}

#[derive(Debug, Default, Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// kNN search against an Elasticsearch dense-vector field.
pub struct ElasticsearchIndex {
    client: Client,
    settings: ElasticsearchSettings,
}

impl ElasticsearchIndex {
    pub fn new(settings: ElasticsearchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .danger_accept_invalid_certs(!settings.verify_certs)
            .build()?;
        Ok(Self { client, settings })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.settings.url.trim_end_matches('/'), path);
        let builder = self.client.request(method, url);
        match &self.settings.username {
            Some(user) => builder.basic_auth(user, self.settings.password.as_ref()),
            None => builder,
        }
    }

    fn knn_body(&self, vector: &[f32], k: usize, num_candidates: usize) -> serde_json::Value {
        serde_json::json!({
            "knn": {
                "field": self.settings.vector_field,
                "query_vector": vector,
                "k": k,
                "num_candidates": num_candidates,
            },
            "size": k,
            "_source": self.settings.source_fields,
        })
    }
}

#[async_trait]
impl VectorSearch for ElasticsearchIndex {
    async fn knn(&self, vector: &[f32], k: usize, num_candidates: usize) -> Result<Vec<SearchHit>> {
        let path = format!("{}/_search", self.settings.index);
        tracing::debug!(
            "kNN search on {} (k={}, num_candidates={})",
            self.settings.index,
            k,
            num_candidates
        );

        let response = self
            .request(Method::POST, &path)
            .json(&self.knn_body(vector, k, num_candidates))
            .send()
            .await
            .map_err(|e| ScurveError::connection(format!("Elasticsearch unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScurveError::connection(format!(
                "Elasticsearch search failed ({}): {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.hits.hits)
    }

    async fn ping(&self) -> Result<()> {
        let response = self
            .request(Method::GET, "")
            .send()
            .await
            .map_err(|e| ScurveError::connection(format!("Elasticsearch unreachable: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ScurveError::connection(format!(
                "Elasticsearch ping failed with status {}",
                response.status()
            )))
        }
    }
}
