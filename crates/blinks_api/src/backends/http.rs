use async_trait::async_trait;
use blinks_core::{
    Blink, BlinksApi, Error, Page, Result, SearchRequest, SearchTask, StartedSearch, TaskId, VoteReceipt, VoteType,
};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::config::ApiConfig;
use crate::raw;

#[derive(Serialize)]
struct VoteRequest {
    #[serde(rename = "type")]
    vote: VoteType,
}

/// REST backend speaking the blinks JSON API.
pub struct HttpBackend {
    client: Arc<Client>,
    base: Url,
}

impl HttpBackend {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client: Arc::new(client),
            base: config.base()?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidInput(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// Sends the request and returns the body of a 2xx response.
    async fn send(&self, request: RequestBuilder, what: &str) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }
        if !status.is_success() {
            tracing::debug!("⚠️ {} returned {}: {}", what, status, body);
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("client", &"<reqwest::Client>")
            .field("base", &self.base.as_str())
            .finish()
    }
}

#[async_trait]
impl BlinksApi for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_blinks(&self, page: Page) -> Result<Vec<Blink>> {
        let url = self.endpoint("api/blinks")?;
        let request = self
            .client
            .get(url)
            .query(&[("page", page.page), ("limit", page.limit)]);
        let body = self.send(request, "blink list").await?;
        raw::parse_blink_list(&body)
    }

    async fn get_blink(&self, id: &str) -> Result<Blink> {
        let url = self.endpoint(&format!("api/blinks/{}", id))?;
        let body = self.send(self.client.get(url), &format!("blink {}", id)).await?;
        raw::parse_blink(&body)
    }

    async fn submit_vote(&self, id: &str, vote: VoteType) -> Result<VoteReceipt> {
        let url = self.endpoint(&format!("api/blinks/{}/vote", id))?;
        let request = self.client.post(url).json(&VoteRequest { vote });
        let body = self.send(request, &format!("vote on blink {}", id)).await?;
        raw::parse_vote_receipt(&body)
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<StartedSearch> {
        request.validate()?;
        let url = self.endpoint("api/search")?;
        let body = self.send(self.client.post(url).json(request), "search start").await?;
        raw::parse_started_search(&body)
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<SearchTask> {
        let url = self.endpoint(&format!("api/search/{}", task_id))?;
        let body = self.send(self.client.get(url), &format!("task {}", task_id)).await?;
        raw::parse_task_status(task_id, &body)
    }
}
