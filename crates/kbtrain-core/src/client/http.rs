use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use super::{ImportSelection, KnowledgeService, ServiceError, TrainReceipt};
use crate::config::ServiceConfig;
use crate::knowledge::{KnowledgeSource, NodeId, SourceId};

/// JSON-over-HTTP client for the knowledge-base service.
///
/// Endpoints, relative to the base URL:
/// - `GET  /agents/{agent}/knowledge-sources`
/// - `POST /agents/{agent}/knowledge-sources/remove`
/// - `POST /agents/{agent}/knowledge-sources/import`
/// - `POST /agents/{agent}/train`
pub struct HttpKnowledgeService {
    base_url: String,
    api_key: String,
    client: Client,
}

impl HttpKnowledgeService {
    /// Creates a client for `base_url`. An empty key sends no auth header.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    /// Creates a client from configuration, applying the request timeout.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        if config.base_url.trim().is_empty() {
            return Err(ServiceError::MissingConfig("service.base_url".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key_or_env().unwrap_or_default(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds `{base}/agents/{agent_id}/{tail..}`, percent-encoding each
    /// segment so an agent id can never change the path.
    fn agent_url(&self, agent_id: &str, tail: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::MissingConfig(format!("service.base_url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::MissingConfig(format!("service.base_url: {}", self.base_url))
            })?
            .pop_if_empty()
            .push("agents")
            .push(agent_id)
            .extend(tail);
        Ok(url)
    }

    fn sources_url(&self, agent_id: &str, tail: &[&str]) -> Result<Url, ServiceError> {
        let mut segments = vec!["knowledge-sources"];
        segments.extend_from_slice(tail);
        self.agent_url(agent_id, &segments)
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        // Only add authorization if api_key is not empty
        if self.api_key.is_empty() {
            req
        } else {
            req.header("authorization", format!("Bearer {}", self.api_key))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ServiceError> {
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }

    async fn post_json<B, T>(&self, url: Url, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.post(url, body).await?;
        response
            .json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }

    async fn post<B>(&self, url: Url, body: &B) -> Result<Response, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let req = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(body);
        let response = self.authorize(req).send().await?;
        check_status(response).await
    }
}

async fn check_status(response: Response) -> Result<Response, ServiceError> {
    let status = response.status();

    if status == 429 {
        return Err(ServiceError::RateLimited);
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(ServiceError::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

#[derive(Debug, Serialize)]
struct RemoveRequest<'a> {
    ids: &'a [SourceId],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TrainRequest<'a> {
    leaf_ids: &'a [NodeId],
}

#[async_trait]
impl KnowledgeService for HttpKnowledgeService {
    async fn list_knowledge_sources(
        &self,
        agent_id: &str,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        self.get_json(self.sources_url(agent_id, &[])?).await
    }

    async fn remove_knowledge_sources(
        &self,
        agent_id: &str,
        ids: &[SourceId],
    ) -> Result<(), ServiceError> {
        let url = self.sources_url(agent_id, &["remove"])?;
        self.post(url, &RemoveRequest { ids }).await?;
        Ok(())
    }

    async fn import_sources(
        &self,
        agent_id: &str,
        selection: &ImportSelection,
    ) -> Result<Vec<KnowledgeSource>, ServiceError> {
        let url = self.sources_url(agent_id, &["import"])?;
        self.post_json(url, selection).await
    }

    async fn train_agent(
        &self,
        agent_id: &str,
        leaf_ids: &[NodeId],
    ) -> Result<TrainReceipt, ServiceError> {
        let url = self.agent_url(agent_id, &["train"])?;
        self.post_json(url, &TrainRequest { leaf_ids }).await
    }
}
