//! Debounced, race-resolving tree build state machine.
//!
//! The coordinator is pure: it never sleeps or performs IO. Callers feed it URL edits, timer
//! ticks, and responses, and dispatch the [`BuildRequest`]s it hands back. See
//! [`crate::app::builder`] for the async driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::app::tree::TreeModel;
use crate::domain::errors::DomainError;
use crate::domain::model::DomNode;

/// Delay between the last URL edit and the build request it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(700);

/// A build request handed to the transport, tagged for staleness checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub seq: u64,
    pub url: String,
}

/// Phase of the authoring session's tree build.
#[derive(Debug, Clone)]
pub enum BuildState {
    Idle,
    PendingDebounce { url: String },
    Fetching { seq: u64, url: String },
    Ready(Arc<TreeModel>),
    Failed(DomainError),
}

impl BuildState {
    pub fn is_settled(&self) -> bool {
        matches!(self, BuildState::Ready(_) | BuildState::Failed(_))
    }
}

/// What happened to a build response on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Applied,
    Discarded,
}

/// Cloneable view of the coordinator for publication to observers.
#[derive(Debug, Clone)]
pub struct BuildSnapshot {
    pub state: BuildState,
    /// Latest successfully built tree, if it is still current.
    pub tree: Option<Arc<TreeModel>>,
    /// Highest sequence number issued so far.
    pub issued: u64,
    /// Sequence number of the last applied response.
    pub applied: u64,
}

impl Default for BuildSnapshot {
    fn default() -> Self {
        Self {
            state: BuildState::Idle,
            tree: None,
            issued: 0,
            applied: 0,
        }
    }
}

#[derive(Debug)]
pub struct TreeBuildCoordinator {
    debounce: Duration,
    state: BuildState,
    current_url: String,
    deadline: Option<Instant>,
    issued: u64,
    // Responses at or below this sequence were outstanding when the URL was cleared.
    retired: u64,
    applied: u64,
    tree: Option<Arc<TreeModel>>,
}

impl Default for TreeBuildCoordinator {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl TreeBuildCoordinator {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            state: BuildState::Idle,
            current_url: String::new(),
            deadline: None,
            issued: 0,
            retired: 0,
            applied: 0,
            tree: None,
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn tree(&self) -> Option<Arc<TreeModel>> {
        self.tree.clone()
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// When the pending debounce timer fires, if one is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Highest sequence number issued so far.
    pub fn issued(&self) -> u64 {
        self.issued
    }

    pub fn snapshot(&self) -> BuildSnapshot {
        BuildSnapshot {
            state: self.state.clone(),
            tree: self.tree.clone(),
            issued: self.issued,
            applied: self.applied,
        }
    }

    /// Record a URL edit and (re)arm the debounce timer.
    pub fn url_changed(&mut self, url: impl Into<String>, now: Instant) {
        let url = url.into();
        tracing::debug!(url = %url, "url changed, debounce restarted");
        self.current_url = url.clone();
        self.deadline = Some(now + self.debounce);
        self.state = BuildState::PendingDebounce { url };
    }

    /// Issue a build if the debounce timer has elapsed by `now`.
    pub fn fire_due(&mut self, now: Instant) -> Option<BuildRequest> {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                self.issue()
            }
            _ => None,
        }
    }

    /// Issue a build immediately, cancelling any pending debounce.
    pub fn rebuild(&mut self) -> Option<BuildRequest> {
        self.deadline = None;
        self.issue()
    }

    /// Apply or discard the response to request `seq`.
    ///
    /// Only a response to the highest issued request may update state; anything else is a
    /// late answer to a superseded request and is dropped silently.
    pub fn on_response(
        &mut self,
        seq: u64,
        result: Result<DomNode, DomainError>,
    ) -> ResponseOutcome {
        if seq != self.issued || seq <= self.retired {
            tracing::debug!(seq, highest = self.issued, "stale build response discarded");
            return ResponseOutcome::Discarded;
        }

        self.applied = seq;
        let settled = match result.and_then(TreeModel::new) {
            Ok(tree) => {
                tracing::debug!(seq, nodes = tree.len(), "tree snapshot applied");
                let tree = Arc::new(tree);
                self.tree = Some(Arc::clone(&tree));
                BuildState::Ready(tree)
            }
            Err(err) => {
                tracing::warn!(seq, error = %err, "tree build failed");
                self.tree = None;
                BuildState::Failed(err)
            }
        };

        // A newer edit is still debouncing; keep showing that.
        if self.deadline.is_none() {
            self.state = settled;
        }
        ResponseOutcome::Applied
    }

    fn issue(&mut self) -> Option<BuildRequest> {
        // Read the URL at fire time, not when the timer was armed.
        let url = self.current_url.trim();
        if url.is_empty() {
            tracing::debug!("empty url, no build issued");
            self.retired = self.issued;
            self.tree = None;
            self.state = BuildState::Idle;
            return None;
        }

        self.issued += 1;
        let request = BuildRequest {
            seq: self.issued,
            url: url.to_owned(),
        };
        tracing::debug!(seq = request.seq, url = %request.url, "build request issued");
        self.state = BuildState::Fetching {
            seq: request.seq,
            url: request.url.clone(),
        };
        Some(request)
    }
}
