use async_trait::async_trait;
use blinks_core::{
    Blink, BlinksApi, Error, Page, Result, SearchRequest, SearchResult, SearchTask, StartedSearch, TaskId,
    TaskStatus, UserVote, VoteReceipt, VoteType,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

struct MemoryTask {
    request: SearchRequest,
    reads: u32,
}

pub struct MemoryStore {
    blinks: Vec<Blink>,
    votes: HashMap<String, UserVote>,
    tasks: HashMap<TaskId, MemoryTask>,
    offline: bool,
}

impl MemoryStore {
    pub fn new(blinks: Vec<Blink>) -> Self {
        Self {
            blinks,
            votes: HashMap::new(),
            tasks: HashMap::new(),
            offline: false,
        }
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            return Err(Error::Unavailable("memory backend is offline".to_string()));
        }
        Ok(())
    }

    fn list(&self, page: Page) -> Vec<Blink> {
        let mut blinks = self.blinks.clone();
        blinks.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        let skip = (page.page as usize - 1).saturating_mul(page.limit as usize);
        blinks.into_iter().skip(skip).take(page.limit as usize).collect()
    }

    fn vote(&mut self, id: &str, vote: VoteType) -> Result<VoteReceipt> {
        let previous = self.votes.get(id).copied().unwrap_or_default();
        let blink = self
            .blinks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| Error::NotFound(format!("blink {}", id)))?;

        blink.votes = blink.votes.after_vote(previous, vote);
        self.votes.insert(id.to_string(), vote.into());

        Ok(VoteReceipt {
            blink: blink.clone(),
            user_vote: Some(vote.into()),
        })
    }

    fn matching(&self, topic: &str) -> Vec<Blink> {
        let topic = topic.trim().to_lowercase();
        self.blinks
            .iter()
            .filter(|b| {
                b.title.to_lowercase().contains(&topic)
                    || b.summary.to_lowercase().contains(&topic)
                    || b.category.as_deref().map(|c| c.to_lowercase() == topic).unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Each read moves the task one step: pending, in progress, completed.
    fn advance(&mut self, task_id: &TaskId) -> Result<SearchTask> {
        let (reads, topic) = {
            let task = self
                .tasks
                .get_mut(task_id)
                .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;
            task.reads += 1;
            (task.reads, task.request.topic.clone())
        };

        let task = match reads {
            1 => SearchTask {
                task_id: task_id.clone(),
                status: TaskStatus::Pending,
                message: format!("Queued search for \"{}\"", topic),
                result: None,
            },
            2 => SearchTask {
                task_id: task_id.clone(),
                status: TaskStatus::InProgress,
                message: format!("Collecting sources for \"{}\"", topic),
                result: None,
            },
            _ => {
                let blinks = self.matching(&topic);
                SearchTask {
                    task_id: task_id.clone(),
                    status: TaskStatus::Completed,
                    message: format!("Found {} blinks", blinks.len()),
                    result: Some(SearchResult { blinks }),
                }
            }
        };
        Ok(task)
    }
}

/// In-process backend. Tallies votes for a single anonymous reader.
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_blinks(Vec::new())
    }

    pub fn with_blinks(blinks: Vec<Blink>) -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::new(blinks))),
        }
    }

    /// Loads blinks from a JSON array on disk.
    pub async fn from_seed_file(path: &Path) -> Result<Self> {
        let body = tokio::fs::read_to_string(path).await?;
        let blinks: Vec<Blink> = serde_json::from_str(&body)?;
        tracing::info!("🌱 Seeded memory backend with {} blinks from {}", blinks.len(), path.display());
        Ok(Self::with_blinks(blinks))
    }

    /// While offline every call fails as if the network were down.
    pub async fn set_offline(&self, offline: bool) {
        self.store.write().await.offline = offline;
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlinksApi for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn list_blinks(&self, page: Page) -> Result<Vec<Blink>> {
        let store = self.store.read().await;
        store.check_online()?;
        Ok(store.list(page))
    }

    async fn get_blink(&self, id: &str) -> Result<Blink> {
        let store = self.store.read().await;
        store.check_online()?;
        store
            .blinks
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blink {}", id)))
    }

    async fn submit_vote(&self, id: &str, vote: VoteType) -> Result<VoteReceipt> {
        let mut store = self.store.write().await;
        store.check_online()?;
        store.vote(id, vote)
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<StartedSearch> {
        request.validate()?;
        let mut store = self.store.write().await;
        store.check_online()?;
        let task_id = TaskId::new(uuid::Uuid::new_v4().to_string());
        store.tasks.insert(
            task_id.clone(),
            MemoryTask {
                request: request.clone(),
                reads: 0,
            },
        );
        Ok(StartedSearch {
            task_id,
            message: format!("Search for \"{}\" started", request.topic),
        })
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<SearchTask> {
        let mut store = self.store.write().await;
        store.check_online()?;
        store.advance(task_id)
    }
}
