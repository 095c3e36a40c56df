use async_trait::async_trait;
use crate::types::{Blink, Page, SearchRequest, SearchTask, StartedSearch, TaskId, VoteReceipt, VoteType};
use crate::Result;

#[async_trait]
pub trait BlinksApi: Send + Sync {
    /// Name of the backend, used in log lines
    fn name(&self) -> &str;

    /// Fetch one page of blinks
    async fn list_blinks(&self, page: Page) -> Result<Vec<Blink>>;

    /// Fetch a single blink by id
    async fn get_blink(&self, id: &str) -> Result<Blink>;

    /// Submit a vote and return the authoritative tallies
    async fn submit_vote(&self, id: &str, vote: VoteType) -> Result<VoteReceipt>;

    /// Start a topic search task
    async fn start_search(&self, request: &SearchRequest) -> Result<StartedSearch>;

    /// Read the current status of a search task
    async fn task_status(&self, task_id: &TaskId) -> Result<SearchTask>;
}
