use crate::config::SolrConfig;
use crate::error::TransportError;
use std::time::Duration;

/// Backend Transport (spec §4.5): a single lazily-initialized HTTP client
/// posting JSON envelopes to the search backend's update endpoint.
///
/// Mirrors `flow-client::Client`'s pattern of wrapping one shared
/// `reqwest::Client` and a small "build request, inspect status, bail on
/// non-2xx" helper (`api_exec`), adapted here to the Solr-style update API.
#[async_trait::async_trait]
pub trait SearchBackend: Send + Sync {
    async fn post_add_batch(&self, body: String) -> Result<(), TransportError>;
    async fn post_delete_batch(&self, body: String) -> Result<(), TransportError>;
    async fn delete_by_query(&self, query: String) -> Result<(), TransportError>;
    async fn commit(&self) -> Result<(), TransportError>;
    /// A commit issued with the long call timeout, used after
    /// `deleteDataSource`'s delete-by-query (spec §4.7).
    async fn commit_long(&self) -> Result<(), TransportError>;
    async fn optimize(&self) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct HttpSearchBackend {
    http: reqwest::Client,
    config: SolrConfig,
}

impl HttpSearchBackend {
    pub fn new(config: SolrConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.danger_accept_invalid_certs)
            .build()?;
        Ok(HttpSearchBackend { http, config })
    }

    async fn post(&self, body: String, timeout: Option<Duration>) -> Result<(), TransportError> {
        let mut request = self
            .http
            .post(&self.config.update_url)
            .header("Content-Type", "application/json")
            .header("User-Agent", "unionindex/0.1")
            .body(body);

        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            request = request.basic_auth(user, Some(pass));
        }
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.as_u16() < 300 {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), %body, "search backend request failed");
            Err(TransportError::Http { status: status.as_u16(), body })
        }
    }
}

#[async_trait::async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn post_add_batch(&self, body: String) -> Result<(), TransportError> {
        self.post(body, self.config.request_timeout()).await
    }

    async fn post_delete_batch(&self, body: String) -> Result<(), TransportError> {
        self.post(body, self.config.request_timeout()).await
    }

    async fn delete_by_query(&self, query: String) -> Result<(), TransportError> {
        let body = serde_json::json!({ "delete": { "query": query } }).to_string();
        self.post(body, Some(self.config.long_call_timeout())).await
    }

    async fn commit(&self) -> Result<(), TransportError> {
        self.post(r#"{"commit":{}}"#.to_string(), self.config.request_timeout()).await
    }

    async fn commit_long(&self) -> Result<(), TransportError> {
        self.post(r#"{"commit":{}}"#.to_string(), Some(self.config.long_call_timeout())).await
    }

    async fn optimize(&self) -> Result<(), TransportError> {
        self.post(r#"{"optimize":{}}"#.to_string(), Some(self.config.long_call_timeout()))
            .await
    }
}
