//! Optimistic vote synchronization.
//!
//! A vote is shown locally the moment it is cast, then sent to the backend.
//! The backend's answer replaces the local tallies; a failure restores the
//! exact state from before the vote. Only one request per blink may be in
//! flight; further votes on that blink are dropped until it resolves.

use blinks_core::{Blink, BlinkStore, BlinksApi, UserVote, VoteState, VoteType};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

use crate::logging::Logger;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A vote for this blink is still waiting on the backend
    InFlight,
    /// The reader already voted this way
    SameVote,
    /// Neither tracked nor present in the store
    UnknownBlink,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IgnoreReason::InFlight => "a vote is already in flight",
            IgnoreReason::SameVote => "already voted that way",
            IgnoreReason::UnknownBlink => "unknown blink",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Ignored(IgnoreReason),
    Confirmed(VoteState),
    RolledBack { state: VoteState, reason: String },
}

impl VoteOutcome {
    pub fn state(&self) -> Option<&VoteState> {
        match self {
            VoteOutcome::Ignored(_) => None,
            VoteOutcome::Confirmed(state) => Some(state),
            VoteOutcome::RolledBack { state, .. } => Some(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteEvent {
    Optimistic(VoteState),
    Confirmed(VoteState),
    RolledBack(VoteState),
}

struct Entry {
    state: VoteState,
    in_flight: bool,
}

#[derive(Clone)]
pub struct VoteSynchronizer {
    api: Arc<dyn BlinksApi>,
    store: BlinkStore,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    events: broadcast::Sender<VoteEvent>,
}

impl VoteSynchronizer {
    pub fn new(api: Arc<dyn BlinksApi>, store: BlinkStore) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            api,
            store,
            entries: Arc::new(Mutex::new(HashMap::new())),
            events,
        }
    }

    /// Starts tracking `blink`, or refreshes its tallies if it is tracked and idle.
    /// The reader's own vote is kept across refreshes.
    pub async fn track(&self, blink: &Blink) {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&blink.id) {
            Some(entry) if !entry.in_flight => entry.state.counts = blink.votes,
            Some(_) => {}
            None => {
                entries.insert(
                    blink.id.clone(),
                    Entry {
                        state: VoteState::for_blink(blink),
                        in_flight: false,
                    },
                );
            }
        }
    }

    pub async fn state(&self, blink_id: &str) -> Option<VoteState> {
        self.entries.lock().await.get(blink_id).map(|e| e.state.clone())
    }

    pub async fn is_in_flight(&self, blink_id: &str) -> bool {
        self.entries
            .lock()
            .await
            .get(blink_id)
            .map(|e| e.in_flight)
            .unwrap_or(false)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoteEvent> {
        self.events.subscribe()
    }

    /// Casts `vote` on `blink_id`.
    ///
    /// The request and its reconciliation run on a spawned task, so dropping
    /// the returned future never leaves the blink stuck in flight.
    pub async fn vote(&self, blink_id: &str, vote: VoteType) -> VoteOutcome {
        let logger = Self::logger(blink_id);

        let untracked = !self.entries.lock().await.contains_key(blink_id);
        let candidate = if untracked { self.store.get(blink_id).await } else { None };

        let (snapshot, optimistic) = {
            let mut entries = self.entries.lock().await;
            if let Some(blink) = candidate {
                entries.entry(blink_id.to_string()).or_insert_with(|| Entry {
                    state: VoteState::for_blink(&blink),
                    in_flight: false,
                });
            }
            let Some(entry) = entries.get_mut(blink_id) else {
                logger.debug("vote ignored: unknown blink");
                return VoteOutcome::Ignored(IgnoreReason::UnknownBlink);
            };

            if entry.in_flight {
                logger.debug("vote ignored: request already in flight");
                return VoteOutcome::Ignored(IgnoreReason::InFlight);
            }
            if entry.state.user_vote == UserVote::from(vote) {
                logger.debug(&format!("vote ignored: already voted {}", vote));
                return VoteOutcome::Ignored(IgnoreReason::SameVote);
            }

            let snapshot = entry.state.clone();
            entry.state = VoteState {
                blink_id: snapshot.blink_id.clone(),
                counts: snapshot.counts.after_vote(snapshot.user_vote, vote),
                user_vote: vote.into(),
            };
            entry.in_flight = true;
            (snapshot, entry.state.clone())
        };

        logger.debug(&format!("optimistic {} vote: {}", vote, optimistic.counts));
        let _ = self.events.send(VoteEvent::Optimistic(optimistic));

        let settle = tokio::spawn({
            let sync = self.clone();
            let blink_id = blink_id.to_string();
            let snapshot = snapshot.clone();
            async move { sync.settle(&blink_id, vote, snapshot).await }
        });

        match settle.await {
            Ok(outcome) => outcome,
            Err(e) => self.roll_back(blink_id, vote, snapshot, e.to_string()).await,
        }
    }

    fn logger(blink_id: &str) -> Logger {
        Logger::new().with_prefix("🗳️").with_prefix(format!("[{}]", blink_id))
    }

    async fn settle(&self, blink_id: &str, vote: VoteType, snapshot: VoteState) -> VoteOutcome {
        let receipt = match self.api.submit_vote(blink_id, vote).await {
            Ok(receipt) => receipt,
            Err(e) => return self.roll_back(blink_id, vote, snapshot, e.to_string()).await,
        };

        let confirmed = VoteState {
            blink_id: blink_id.to_string(),
            counts: receipt.blink.votes,
            user_vote: receipt.user_vote.unwrap_or_else(|| vote.into()),
        };
        {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(blink_id.to_string()).or_insert_with(|| Entry {
                state: snapshot.clone(),
                in_flight: true,
            });
            entry.in_flight = false;
            entry.state = confirmed.clone();
        }

        self.store.upsert(receipt.blink).await;
        Self::logger(blink_id).info(&format!(
            "✅ {} vote confirmed by {}: {}",
            vote,
            self.api.name(),
            confirmed.counts
        ));
        let _ = self.events.send(VoteEvent::Confirmed(confirmed.clone()));
        VoteOutcome::Confirmed(confirmed)
    }

    async fn roll_back(&self, blink_id: &str, vote: VoteType, snapshot: VoteState, reason: String) -> VoteOutcome {
        {
            let mut entries = self.entries.lock().await;
            let entry = entries.entry(blink_id.to_string()).or_insert_with(|| Entry {
                state: snapshot.clone(),
                in_flight: true,
            });
            entry.in_flight = false;
            entry.state = snapshot.clone();
        }

        Self::logger(blink_id).warn(&format!(
            "↩️ {} vote failed, rolled back to {}: {}",
            vote, snapshot.counts, reason
        ));
        let _ = self.events.send(VoteEvent::RolledBack(snapshot.clone()));
        VoteOutcome::RolledBack { state: snapshot, reason }
    }
}
