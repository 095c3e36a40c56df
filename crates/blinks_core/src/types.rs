use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Positive,
    Negative,
}

impl VoteType {
    pub fn opposite(self) -> Self {
        match self {
            VoteType::Positive => VoteType::Negative,
            VoteType::Negative => VoteType::Positive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Positive => "positive",
            VoteType::Negative => "negative",
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VoteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "up" | "+" => Ok(VoteType::Positive),
            "negative" | "down" | "-" => Ok(VoteType::Negative),
            other => Err(Error::InvalidInput(format!("Unknown vote type: {}", other))),
        }
    }
}

/// The local user's current vote on a blink. Never persisted server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVote {
    #[default]
    None,
    Positive,
    Negative,
}

impl UserVote {
    pub fn as_vote_type(self) -> Option<VoteType> {
        match self {
            UserVote::None => None,
            UserVote::Positive => Some(VoteType::Positive),
            UserVote::Negative => Some(VoteType::Negative),
        }
    }
}

impl From<VoteType> for UserVote {
    fn from(vote: VoteType) -> Self {
        match vote {
            VoteType::Positive => UserVote::Positive,
            VoteType::Negative => UserVote::Negative,
        }
    }
}

impl fmt::Display for UserVote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_vote_type() {
            Some(vote) => vote.fmt(f),
            None => f.write_str("none"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VoteCounts {
    pub positive: u64,
    pub negative: u64,
}

impl VoteCounts {
    pub fn new(positive: u64, negative: u64) -> Self {
        Self { positive, negative }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative
    }

    /// Tallies after moving from `previous` to `next`.
    ///
    /// A switch from the opposite direction moves one unit between buckets
    /// (the decrement saturates at zero). A first vote only adds one unit.
    /// Repeating the current direction leaves the tallies untouched.
    pub fn after_vote(&self, previous: UserVote, next: VoteType) -> VoteCounts {
        if previous.as_vote_type() == Some(next) {
            return *self;
        }

        let mut counts = *self;
        if previous.as_vote_type() == Some(next.opposite()) {
            match next.opposite() {
                VoteType::Positive => counts.positive = counts.positive.saturating_sub(1),
                VoteType::Negative => counts.negative = counts.negative.saturating_sub(1),
            }
        }
        match next {
            VoteType::Positive => counts.positive += 1,
            VoteType::Negative => counts.negative += 1,
        }
        counts
    }
}

impl fmt::Display for VoteCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "👍 {} 👎 {}", self.positive, self.negative)
    }
}

/// Client-side vote state for one blink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteState {
    pub blink_id: String,
    pub counts: VoteCounts,
    pub user_vote: UserVote,
}

impl VoteState {
    pub fn for_blink(blink: &Blink) -> Self {
        Self {
            blink_id: blink.id.clone(),
            counts: blink.votes,
            user_vote: UserVote::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlinkKind {
    #[default]
    News,
    Rumor,
}

/// A summarized news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blink {
    pub id: String,
    pub title: String,
    pub summary: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub kind: BlinkKind,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub votes: VoteCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Result<Self> {
        if page == 0 || limit == 0 {
            return Err(Error::InvalidInput("page and limit must be at least 1".to_string()));
        }
        Ok(Self { page, limit })
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Authoritative answer to a vote submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub blink: Blink,
    #[serde(default)]
    pub user_vote: Option<UserVote>,
}

/// Backend-assigned identifier for a search task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    #[serde(alias = "in-progress", alias = "processing", alias = "running")]
    InProgress,
    #[serde(alias = "done", alias = "complete")]
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }

    pub fn icon(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "⏳",
            TaskStatus::InProgress => "🔄",
            TaskStatus::Completed => "✅",
            TaskStatus::Error => "❌",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub blinks: Vec<Blink>,
}

/// A long-running topic search owned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTask {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Option<SearchResult>,
}

impl SearchTask {
    /// Drops a result payload attached to a non-completed status.
    pub fn normalized(mut self) -> Self {
        if self.status != TaskStatus::Completed {
            self.result = None;
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    pub topic: String,
    #[serde(default)]
    pub constraints: BTreeMap<String, String>,
}

impl SearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            constraints: BTreeMap::new(),
        }
    }

    pub fn with_constraint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(key.into(), value.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(Error::InvalidInput("Search topic must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedSearch {
    pub task_id: TaskId,
    #[serde(default)]
    pub message: String,
}
