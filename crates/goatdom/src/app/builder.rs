//! Async driver running a [`TreeBuildCoordinator`] on its own task.
//!
//! Commands and build responses are processed one at a time on a single task, so the
//! coordinator needs no locking. Fetches run as spawned tasks and are never cancelled; their
//! results come back tagged with the sequence number they were issued under.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::app::coordinator::{BuildRequest, BuildSnapshot, BuildState, TreeBuildCoordinator};
use crate::domain::errors::DomainError;
use crate::domain::model::DomNode;

/// Remote service that turns a URL into a parsed document tree.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn build_tree(&self, url: &str) -> Result<DomNode, DomainError>;
}

#[derive(Debug, Clone)]
enum Command {
    SetUrl(String),
    Rebuild,
}

type Response = (u64, Result<DomNode, DomainError>);

/// Published after every command, response, or timer tick the loop handles.
#[derive(Debug, Clone, Default)]
pub struct BuilderStatus {
    /// Number of commands the loop has consumed so far.
    pub commands_processed: u64,
    pub build: BuildSnapshot,
}

impl BuilderStatus {
    fn is_quiescent(&self) -> bool {
        match &self.build.state {
            BuildState::Idle => true,
            state => state.is_settled() && self.build.applied == self.build.issued,
        }
    }
}

/// Handle to a running tree builder task.
pub struct TreeBuilder {
    commands: mpsc::UnboundedSender<Command>,
    sent: u64,
    status: watch::Receiver<BuilderStatus>,
    task: JoinHandle<()>,
}

impl TreeBuilder {
    /// Spawn the builder loop on the current tokio runtime.
    pub fn spawn(source: Arc<dyn TreeSource>, debounce: Duration) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(BuilderStatus::default());
        let coordinator = TreeBuildCoordinator::new(debounce);
        let task = tokio::spawn(run(coordinator, source, command_rx, status_tx));
        Self {
            commands,
            sent: 0,
            status,
            task,
        }
    }

    /// Forward a URL edit; the build is issued once edits pause for the debounce window.
    pub fn set_url(&mut self, url: impl Into<String>) -> Result<(), DomainError> {
        self.send(Command::SetUrl(url.into()))
    }

    /// Build the current URL now, without waiting for the debounce window.
    pub fn rebuild(&mut self) -> Result<(), DomainError> {
        self.send(Command::Rebuild)
    }

    /// Latest published build snapshot.
    pub fn snapshot(&self) -> BuildSnapshot {
        self.status.borrow().build.clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<BuilderStatus> {
        self.status.clone()
    }

    /// Wait until every command sent so far has been handled and the resulting build, if
    /// any, has been applied. Resolves immediately with an idle snapshot when nothing was
    /// issued.
    pub async fn settled(&mut self) -> Result<BuildSnapshot, DomainError> {
        let target = self.sent;
        let status = self
            .status
            .wait_for(|status| status.commands_processed >= target && status.is_quiescent())
            .await
            .map_err(|_| DomainError::SessionClosed)?;
        Ok(status.build.clone())
    }

    /// Stop the builder loop. Outstanding fetches finish on their own and are ignored.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(err) = task.await {
            tracing::warn!(error = %err, "tree builder task ended abnormally");
        }
    }

    fn send(&mut self, command: Command) -> Result<(), DomainError> {
        self.commands
            .send(command)
            .map_err(|_| DomainError::SessionClosed)?;
        self.sent += 1;
        Ok(())
    }
}

async fn run(
    mut coordinator: TreeBuildCoordinator,
    source: Arc<dyn TreeSource>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<BuilderStatus>,
) {
    let (response_tx, mut responses) = mpsc::unbounded_channel::<Response>();
    let mut commands_processed = 0u64;

    loop {
        let deadline = coordinator.deadline();
        let timer = async move {
            match deadline {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;

            command = commands.recv() => {
                match command {
                    Some(Command::SetUrl(url)) => coordinator.url_changed(url, Instant::now()),
                    Some(Command::Rebuild) => {
                        if let Some(request) = coordinator.rebuild() {
                            dispatch(&source, request, &response_tx);
                        }
                    }
                    None => break,
                }
                commands_processed += 1;
            }
            Some((seq, result)) = responses.recv() => {
                coordinator.on_response(seq, result);
            }
            () = timer => {
                if let Some(request) = coordinator.fire_due(Instant::now()) {
                    dispatch(&source, request, &response_tx);
                }
            }
        }

        status.send_replace(BuilderStatus {
            commands_processed,
            build: coordinator.snapshot(),
        });
    }

    tracing::debug!(issued = coordinator.issued(), "tree builder stopped");
}

fn dispatch(
    source: &Arc<dyn TreeSource>,
    request: BuildRequest,
    responses: &mpsc::UnboundedSender<Response>,
) {
    let source = Arc::clone(source);
    let responses = responses.clone();
    tokio::spawn(async move {
        let result = source.build_tree(&request.url).await;
        // The builder may have stopped; the answer is then irrelevant.
        let _ = responses.send((request.seq, result));
    });
}
