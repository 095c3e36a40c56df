//! Polling of backend search tasks.

use blinks_core::{BlinksApi, Result, SearchRequest, SearchTask, TaskId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::logging::Logger;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval: Duration,
    /// Consecutive failed polls after which the loop stops. `None` polls forever.
    pub max_consecutive_failures: Option<u32>,
}

impl PollerConfig {
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, max: Option<u32>) -> Self {
        self.max_consecutive_failures = max;
        self
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_failures: Some(DEFAULT_MAX_CONSECUTIVE_FAILURES),
        }
    }
}

/// What a consumer of the poller gets to see.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollState {
    pub task_id: Option<TaskId>,
    /// Message returned when the task was started
    pub started_message: String,
    /// Latest status read from the backend
    pub task: Option<SearchTask>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub polls: u32,
    pub finished: bool,
    pub gave_up: bool,
    pub cancelled: bool,
    generation: u64,
}

impl PollState {
    /// True once nothing more will change for the current task.
    pub fn is_settled(&self) -> bool {
        self.task_id.is_none() || self.finished || self.cancelled
    }
}

pub struct TaskPoller {
    api: Arc<dyn BlinksApi>,
    config: PollerConfig,
    state: Arc<watch::Sender<PollState>>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl TaskPoller {
    pub fn new(api: Arc<dyn BlinksApi>, config: PollerConfig) -> Self {
        let (state, _) = watch::channel(PollState::default());
        Self {
            api,
            config,
            state: Arc::new(state),
            handle: None,
            generation: 0,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Starts a search and begins polling it.
    ///
    /// Any loop still running for an earlier search is cancelled first. If the
    /// backend refuses to start the task, the error is returned and nothing is
    /// polled.
    pub async fn start(&mut self, request: SearchRequest) -> Result<TaskId> {
        request.validate()?;
        self.cancel();

        let logger = Logger::new().with_prefix("🔎");
        let started = match self.api.start_search(&request).await {
            Ok(started) => started,
            Err(e) => {
                logger.error(&format!("Failed to start search for \"{}\": {}", request.topic, e));
                return Err(e);
            }
        };

        self.generation += 1;
        let generation = self.generation;
        let task_id = started.task_id.clone();
        self.state.send_replace(PollState {
            task_id: Some(task_id.clone()),
            started_message: started.message,
            generation,
            ..Default::default()
        });

        let logger = logger.with_prefix(format!("[{}]", task_id));
        logger.info(&format!("Started search for \"{}\", polling every {:?}", request.topic, self.config.interval));

        self.handle = Some(tokio::spawn(run(
            self.api.clone(),
            task_id.clone(),
            self.config.clone(),
            self.state.clone(),
            generation,
            logger,
        )));
        Ok(task_id)
    }

    /// Stops the current loop, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            let was_running = !handle.is_finished();
            handle.abort();
            if was_running {
                let generation = self.generation;
                self.state.send_if_modified(|state| {
                    if state.generation != generation || state.finished {
                        return false;
                    }
                    state.cancelled = true;
                    true
                });
                tracing::debug!("🛑 Cancelled poll loop");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    pub fn current(&self) -> PollState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    /// Resolves once the current task is settled and returns the final state.
    pub async fn wait(&self) -> PollState {
        let mut rx = self.state.subscribe();
        loop {
            {
                let state = rx.borrow_and_update();
                if state.is_settled() {
                    return state.clone();
                }
            }
            if rx.changed().await.is_err() {
                return self.current();
            }
        }
    }
}

impl Drop for TaskPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run(
    api: Arc<dyn BlinksApi>,
    task_id: TaskId,
    config: PollerConfig,
    state: Arc<watch::Sender<PollState>>,
    generation: u64,
    logger: Logger,
) {
    let mut ticker = interval_at(Instant::now() + config.interval, config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        ticker.tick().await;

        match api.task_status(&task_id).await {
            Ok(task) => {
                failures = 0;
                let task = task.normalized();
                let terminal = task.status.is_terminal();
                logger.info(&format!("{} {}: {}", task.status.icon(), task.status, task.message));

                publish(&state, generation, |s| {
                    s.polls += 1;
                    s.task = Some(task);
                    s.last_error = None;
                    s.consecutive_failures = 0;
                    s.finished = terminal;
                });
                if terminal {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                let gave_up = config
                    .max_consecutive_failures
                    .map(|max| failures >= max)
                    .unwrap_or(false);
                logger.warn(&format!("⚠️ Poll attempt failed ({} in a row): {}", failures, e));

                let message = e.to_string();
                publish(&state, generation, |s| {
                    s.polls += 1;
                    s.last_error = Some(message);
                    s.consecutive_failures = failures;
                    s.finished = gave_up;
                    s.gave_up = gave_up;
                });
                if gave_up {
                    logger.error(&format!("Giving up after {} consecutive failed polls", failures));
                    break;
                }
            }
        }
    }
}

fn publish(state: &watch::Sender<PollState>, generation: u64, update: impl FnOnce(&mut PollState)) {
    state.send_if_modified(|s| {
        if s.generation != generation {
            return false;
        }
        update(s);
        true
    });
}
