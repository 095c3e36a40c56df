#![allow(dead_code)]

use async_trait::async_trait;
use blinks_api::MemoryBackend;
use blinks_core::{
    Blink, BlinkKind, BlinksApi, Error, Page, Result, SearchRequest, SearchResult, SearchTask, StartedSearch,
    TaskId, TaskStatus, VoteCounts, VoteReceipt, VoteType,
};
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub fn blink(id: &str, positive: u64, negative: u64) -> Blink {
    Blink {
        id: id.to_string(),
        title: format!("Blink {}", id),
        summary: format!("Summary for {}", id),
        content: None,
        image_url: None,
        category: Some("World".to_string()),
        kind: BlinkKind::News,
        published_at: Utc::now(),
        votes: VoteCounts::new(positive, negative),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteFailure {
    Status,
    EmptyPayload,
    Network,
}

/// Memory backend whose vote submissions can be held back or made to fail.
pub struct GatedApi {
    inner: MemoryBackend,
    gate: Option<Arc<Semaphore>>,
    failure: Mutex<Option<VoteFailure>>,
    pub vote_calls: AtomicUsize,
}

impl GatedApi {
    pub fn new(blinks: Vec<Blink>) -> Self {
        Self {
            inner: MemoryBackend::with_blinks(blinks),
            gate: None,
            failure: Mutex::new(None),
            vote_calls: AtomicUsize::new(0),
        }
    }

    /// Votes block until `release` hands out a permit.
    pub fn gated(blinks: Vec<Blink>) -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::new(blinks)
        }
    }

    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    pub fn fail_votes(&self, failure: Option<VoteFailure>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn vote_calls(&self) -> usize {
        self.vote_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlinksApi for GatedApi {
    fn name(&self) -> &str {
        "gated"
    }

    async fn list_blinks(&self, page: Page) -> Result<Vec<Blink>> {
        self.inner.list_blinks(page).await
    }

    async fn get_blink(&self, id: &str) -> Result<Blink> {
        self.inner.get_blink(id).await
    }

    async fn submit_vote(&self, id: &str, vote: VoteType) -> Result<VoteReceipt> {
        self.vote_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| Error::Unavailable(e.to_string()))?
                .forget();
        }
        let failure = *self.failure.lock().unwrap();
        match failure {
            Some(VoteFailure::Status) => Err(Error::Status {
                status: 500,
                body: "internal error".to_string(),
            }),
            Some(VoteFailure::EmptyPayload) => Err(Error::EmptyPayload),
            Some(VoteFailure::Network) => Err(Error::Unavailable("connection reset".to_string())),
            None => self.inner.submit_vote(id, vote).await,
        }
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<StartedSearch> {
        self.inner.start_search(request).await
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<SearchTask> {
        self.inner.task_status(task_id).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Status(TaskStatus),
    Fail,
}

/// Search backend that replays a fixed status script per started task.
/// Once a script runs out the task reports `pending` forever.
#[derive(Default)]
pub struct ScriptedApi {
    scripts: Mutex<VecDeque<Vec<Step>>>,
    remaining: Mutex<HashMap<TaskId, VecDeque<Step>>>,
    calls: Mutex<HashMap<TaskId, usize>>,
    started: AtomicUsize,
    pub refuse_start: AtomicBool,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, steps: Vec<Step>) -> Self {
        self.scripts.lock().unwrap().push_back(steps);
        self
    }

    pub fn calls(&self, task_id: &TaskId) -> usize {
        self.calls.lock().unwrap().get(task_id).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl BlinksApi for ScriptedApi {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn list_blinks(&self, _page: Page) -> Result<Vec<Blink>> {
        Ok(Vec::new())
    }

    async fn get_blink(&self, id: &str) -> Result<Blink> {
        Err(Error::NotFound(format!("blink {}", id)))
    }

    async fn submit_vote(&self, id: &str, _vote: VoteType) -> Result<VoteReceipt> {
        Err(Error::NotFound(format!("blink {}", id)))
    }

    async fn start_search(&self, request: &SearchRequest) -> Result<StartedSearch> {
        if self.refuse_start.load(Ordering::SeqCst) {
            return Err(Error::Status {
                status: 503,
                body: "search unavailable".to_string(),
            });
        }
        let n = self.started.fetch_add(1, Ordering::SeqCst) + 1;
        let task_id = TaskId::new(format!("task-{}", n));
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        self.remaining
            .lock()
            .unwrap()
            .insert(task_id.clone(), script.into_iter().collect());
        Ok(StartedSearch {
            task_id,
            message: format!("Searching {}", request.topic),
        })
    }

    async fn task_status(&self, task_id: &TaskId) -> Result<SearchTask> {
        *self.calls.lock().unwrap().entry(task_id.clone()).or_insert(0) += 1;
        let step = self
            .remaining
            .lock()
            .unwrap()
            .get_mut(task_id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(Step::Status(TaskStatus::Pending));

        match step {
            Step::Fail => Err(Error::Unavailable("network blip".to_string())),
            Step::Status(status) => Ok(SearchTask {
                task_id: task_id.clone(),
                status,
                message: format!("status {}", status),
                result: (status == TaskStatus::Completed).then(|| SearchResult {
                    blinks: vec![blink("found", 0, 0)],
                }),
            }),
        }
    }
}
