pub mod logging;
pub mod poller;
pub mod vote;

pub use logging::{init_logging, Logger};
pub use poller::{PollState, PollerConfig, TaskPoller};
pub use vote::{IgnoreReason, VoteEvent, VoteOutcome, VoteSynchronizer};

pub mod prelude {
    pub use super::poller::{PollState, PollerConfig, TaskPoller};
    pub use super::vote::{VoteOutcome, VoteSynchronizer};
    pub use blinks_core::{Error, Result};
}
