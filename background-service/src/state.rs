use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tweetwatch_core::{SearchFilter, SearchResult};

/// Counters describing how the running subscription is doing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollStats {
    pub polls: u64,
    pub failed_polls: u64,
    pub notifications_sent: u64,
    pub notify_failures: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
}

/// Read-only copy of the controller state handed to callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub stopping: bool,
    pub filter: Option<SearchFilter>,
    pub last_result: Option<SearchResult>,
    pub cached_search_terms: Option<Vec<String>>,
    pub stats: PollStats,
}

impl StatusSnapshot {
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[derive(Debug, Default)]
pub struct ControllerState {
    pub(crate) running: bool,
    /// Set between a stop request and the cancelled loop exiting.
    pub(crate) stopping: bool,
    /// Bumped on every start so a finished loop only resets its own run.
    pub(crate) generation: u64,
    pub(crate) cancel: Option<CancellationToken>,
    pub(crate) task: Option<JoinHandle<()>>,
    pub(crate) filter: Option<SearchFilter>,
    pub(crate) last_result: Option<SearchResult>,
    pub(crate) cached_search_terms: Option<Vec<String>>,
    pub(crate) stats: PollStats,
}

impl ControllerState {
    pub(crate) fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.running,
            stopping: self.stopping,
            filter: self.filter.clone(),
            last_result: self.last_result.clone(),
            cached_search_terms: self.cached_search_terms.clone(),
            stats: self.stats.clone(),
        }
    }

    /// Idle means no loop is running and no cancelled loop is still draining.
    pub(crate) fn is_idle(&self) -> bool {
        !self.running && !self.stopping
    }

    pub(crate) fn finish(&mut self, generation: u64) {
        if self.generation == generation {
            self.running = false;
            self.stopping = false;
            self.cancel = None;
            self.task = None;
        }
    }
}

/// Controller state behind the single lock shared with the poll loop.
pub type SharedState = Arc<Mutex<ControllerState>>;

pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(ControllerState::default()))
}
