//! Server-side wire shapes and their mapping onto the domain types.
//!
//! The backend is not consistent about field names (`_id` vs `id`,
//! `createdAt` vs `created_at`), so every alias seen in the wild is accepted
//! here and nowhere else.

use blinks_core::{
    Blink, BlinkKind, Error, Result, SearchResult, SearchTask, StartedSearch, TaskId, TaskStatus, UserVote,
    VoteCounts, VoteReceipt,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawVotes {
    #[serde(default)]
    positive: i64,
    #[serde(default)]
    negative: i64,
}

impl From<RawVotes> for VoteCounts {
    fn from(raw: RawVotes) -> Self {
        VoteCounts::new(raw.positive.max(0) as u64, raw.negative.max(0) as u64)
    }
}

#[derive(Debug, Deserialize)]
struct RawBlink {
    #[serde(alias = "_id")]
    id: RawId,
    title: String,
    #[serde(default, alias = "description", alias = "aiSummary")]
    summary: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, alias = "image", alias = "imageUrl")]
    image_url: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default, rename = "type", alias = "kind")]
    kind: Option<String>,
    #[serde(default, alias = "createdAt", alias = "created_at", alias = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    votes: Option<RawVotes>,
    #[serde(default, alias = "userVote")]
    user_vote: Option<UserVote>,
}

impl RawBlink {
    fn into_blink(self) -> Blink {
        let kind = match self.kind.as_deref().map(str::to_lowercase).as_deref() {
            Some("rumor") | Some("rumors") | Some("rumour") => BlinkKind::Rumor,
            _ => BlinkKind::News,
        };
        Blink {
            id: self.id.into_string(),
            title: self.title,
            summary: self.summary.unwrap_or_default(),
            content: self.content,
            image_url: self.image_url,
            category: self.category.or_else(|| self.categories.into_iter().next()),
            kind,
            published_at: self.published_at.unwrap_or_else(Utc::now),
            votes: self.votes.unwrap_or_default().into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawVoteResponse {
    Wrapped {
        #[serde(alias = "article", alias = "data")]
        blink: RawBlink,
        #[serde(default, alias = "userVote")]
        user_vote: Option<UserVote>,
    },
    Bare(RawBlink),
}

#[derive(Debug, Deserialize)]
struct RawStartedSearch {
    #[serde(alias = "taskId")]
    task_id: RawId,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSearchResult {
    List(Vec<RawBlink>),
    Object {
        #[serde(default, alias = "articles")]
        blinks: Vec<RawBlink>,
    },
}

#[derive(Debug, Deserialize)]
struct RawTaskStatus {
    status: TaskStatus,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "resultPayload", alias = "results")]
    result: Option<RawSearchResult>,
}

fn parse<T: DeserializeOwned>(value: Value, what: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::MalformedResponse(format!("{}: {}", what, e)))
}

fn parse_body(body: &str, what: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Err(Error::EmptyPayload);
    }
    serde_json::from_str(body).map_err(|e| Error::MalformedResponse(format!("{}: {}", what, e)))
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn parse_blink_list(body: &str) -> Result<Vec<Blink>> {
    let value = parse_body(body, "blink list")?;
    if !value.is_array() {
        return Err(Error::MalformedResponse(format!(
            "blink list: expected array, got {}",
            shape(&value)
        )));
    }
    let raw: Vec<RawBlink> = parse(value, "blink list")?;
    Ok(raw.into_iter().map(RawBlink::into_blink).collect())
}

pub fn parse_blink(body: &str) -> Result<Blink> {
    let value = parse_body(body, "blink")?;
    let raw: RawBlink = parse(value, "blink")?;
    Ok(raw.into_blink())
}

pub fn parse_vote_receipt(body: &str) -> Result<VoteReceipt> {
    let value = parse_body(body, "vote")?;
    if value.is_null() || value.as_object().map(|o| o.is_empty()).unwrap_or(false) {
        return Err(Error::EmptyPayload);
    }
    let (blink, user_vote) = match parse::<RawVoteResponse>(value, "vote")? {
        RawVoteResponse::Wrapped { blink, user_vote } => {
            let user_vote = user_vote.or(blink.user_vote);
            (blink, user_vote)
        }
        RawVoteResponse::Bare(blink) => {
            let user_vote = blink.user_vote;
            (blink, user_vote)
        }
    };
    // Tallies are authoritative after a vote, so they must be present.
    if blink.votes.is_none() {
        return Err(Error::MalformedResponse("vote: response carries no tallies".to_string()));
    }
    Ok(VoteReceipt {
        blink: blink.into_blink(),
        user_vote,
    })
}

pub fn parse_started_search(body: &str) -> Result<StartedSearch> {
    let value = parse_body(body, "search start")?;
    let raw: RawStartedSearch = parse(value, "search start")?;
    Ok(StartedSearch {
        task_id: TaskId::new(raw.task_id.into_string()),
        message: raw.message.unwrap_or_default(),
    })
}

pub fn parse_task_status(task_id: &TaskId, body: &str) -> Result<SearchTask> {
    let value = parse_body(body, "task status")?;
    let raw: RawTaskStatus = parse(value, "task status")?;
    let result = raw.result.map(|r| {
        let blinks = match r {
            RawSearchResult::List(blinks) => blinks,
            RawSearchResult::Object { blinks } => blinks,
        };
        SearchResult {
            blinks: blinks.into_iter().map(RawBlink::into_blink).collect(),
        }
    });
    let task = SearchTask {
        task_id: task_id.clone(),
        status: raw.status,
        message: raw.message.unwrap_or_default(),
        result,
    };
    Ok(task.normalized())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_maps_raw_field_names() {
        let body = r#"[
            {"_id": "42", "title": "Rates cut", "description": "Central bank moves",
             "image": "https://img/1.png", "categories": ["Economy"], "createdAt": "2024-05-01T10:00:00Z",
             "votes": {"positive": 10, "negative": 2}},
            {"id": 7, "title": "Whisper", "type": "rumor", "created_at": "2024-05-02T10:00:00Z"}
        ]"#;
        let blinks = parse_blink_list(body).unwrap();
        assert_eq!(blinks.len(), 2);
        assert_eq!(blinks[0].id, "42");
        assert_eq!(blinks[0].summary, "Central bank moves");
        assert_eq!(blinks[0].category.as_deref(), Some("Economy"));
        assert_eq!(blinks[0].votes, VoteCounts::new(10, 2));
        assert_eq!(blinks[1].id, "7");
        assert_eq!(blinks[1].kind, BlinkKind::Rumor);
        assert_eq!(blinks[1].votes, VoteCounts::default());
    }

    #[test]
    fn test_list_rejects_object() {
        let err = parse_blink_list(r#"{"error": "boom"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(ref m) if m.contains("expected array, got object")));
    }

    #[test]
    fn test_negative_tallies_are_clamped() {
        let blink = parse_blink(r#"{"id": "1", "title": "t", "votes": {"positive": -3, "negative": 4}}"#).unwrap();
        assert_eq!(blink.votes, VoteCounts::new(0, 4));
    }

    #[test]
    fn test_vote_receipt_shapes() {
        let wrapped = parse_vote_receipt(
            r#"{"blink": {"id": "42", "title": "t", "votes": {"positive": 11, "negative": 2}}, "userVote": "positive"}"#,
        )
        .unwrap();
        assert_eq!(wrapped.blink.votes, VoteCounts::new(11, 2));
        assert_eq!(wrapped.user_vote, Some(UserVote::Positive));

        let bare = parse_vote_receipt(r#"{"id": "42", "title": "t", "votes": {"positive": 11, "negative": 2}}"#).unwrap();
        assert_eq!(bare.user_vote, None);
    }

    #[test]
    fn test_vote_receipt_without_tallies_is_malformed() {
        let err = parse_vote_receipt(r#"{"id": "42", "title": "t"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));

        let err = parse_vote_receipt(r#"{"blink": {"id": "42", "title": "t"}, "userVote": "positive"}"#).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[test]
    fn test_vote_receipt_empty_payload() {
        assert!(matches!(parse_vote_receipt(""), Err(Error::EmptyPayload)));
        assert!(matches!(parse_vote_receipt("null"), Err(Error::EmptyPayload)));
        assert!(matches!(parse_vote_receipt("{}"), Err(Error::EmptyPayload)));
    }

    #[test]
    fn test_task_status_payload_only_when_completed() {
        let id = TaskId::new("t-1");
        let running = parse_task_status(&id, r#"{"status": "in_progress", "message": "Reading", "result": []}"#).unwrap();
        assert_eq!(running.status, TaskStatus::InProgress);
        assert!(running.result.is_none());

        let done = parse_task_status(
            &id,
            r#"{"status": "completed", "message": "Done", "result": {"blinks": [{"id": "1", "title": "x"}]}}"#,
        )
        .unwrap();
        assert_eq!(done.result.unwrap().blinks.len(), 1);
    }

    #[test]
    fn test_started_search_accepts_camel_case() {
        let started = parse_started_search(r#"{"taskId": "abc", "message": "queued"}"#).unwrap();
        assert_eq!(started.task_id.as_str(), "abc");
        assert_eq!(started.message, "queued");
    }
}
