//! Session workflow controller.
//!
//! One submission runs submit → clone → analyze → (endpoints) against the
//! gateway, one stage at a time. The current [`SessionState`] lives in a
//! `watch` channel: views subscribe to it and the controller is its only
//! writer. Every submission bumps a generation counter in the same update that
//! resets the state, and every later write compares generations inside the
//! channel's lock, so a superseded workflow can never touch the newer state.

use crate::error::{Operation, SessionError};
use crate::gateway::Gateway;
use crate::snapshot::ProjectSnapshot;
use crate::types::{RepoRequest, RepositoryReference};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Idle,
    Submitting,
    Cloning,
    Analyzing,
    ParsingEndpoints,
    Error,
}

impl Stage {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Stage::Submitting | Stage::Cloning | Stage::Analyzing | Stage::ParsingEndpoints
        )
    }

    pub fn allows(self, next: Stage) -> bool {
        match (self, next) {
            (_, Stage::Submitting) => true,
            (Stage::Submitting, Stage::Cloning)
            | (Stage::Cloning, Stage::Analyzing)
            | (Stage::Analyzing, Stage::ParsingEndpoints)
            | (Stage::Analyzing, Stage::Idle)
            | (Stage::ParsingEndpoints, Stage::Idle) => true,
            (from, Stage::Error) => from.is_active(),
            _ => false,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::Idle => "Idle",
            Stage::Submitting => "Submitting...",
            Stage::Cloning => "Cloning...",
            Stage::Analyzing => "Analyzing...",
            Stage::ParsingEndpoints => "Parsing endpoints...",
            Stage::Error => "Failed",
        }
    }
}

/// What views see: the snapshot plus the workflow's position and messages.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionState {
    pub generation: u64,
    pub stage: Stage,
    pub repo_url: Option<String>,
    pub snapshot: ProjectSnapshot,
    pub notice: Option<String>,
    pub error: Option<SessionError>,
    pub warning: Option<SessionError>,
}

impl SessionState {
    fn started(repo_url: &str) -> Self {
        Self {
            stage: Stage::Submitting,
            repo_url: Some(repo_url.to_string()),
            ..Self::default()
        }
    }

    /// A submission refused before any call, so it never passes through `Submitting`.
    fn rejected(repo_url: &str, error: SessionError) -> Self {
        Self {
            stage: Stage::Error,
            repo_url: Some(repo_url.to_string()),
            error: Some(error),
            ..Self::default()
        }
    }

    pub fn is_busy(&self) -> bool {
        self.stage.is_active()
    }

    fn transition(&mut self, next: Stage) -> bool {
        if !self.stage.allows(next) {
            warn!(generation = self.generation, from = ?self.stage, to = ?next, "illegal stage transition");
            return false;
        }
        self.stage = next;
        true
    }
}

#[derive(Debug, Clone)]
pub enum WorkflowOutcome {
    Completed {
        snapshot: ProjectSnapshot,
        warning: Option<SessionError>,
    },
    Failed(SessionError),
    /// A newer submission took over; nothing from this one was kept.
    Superseded { generation: u64 },
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEvent {
    Selected(String),
    Cleared,
}

/// Wakes a view only when the repository name changes.
pub struct RepoSubscription {
    receiver: watch::Receiver<SessionState>,
    last: Option<String>,
}

impl RepoSubscription {
    pub fn current(&self) -> Option<&str> {
        self.last.as_deref()
    }

    /// `None` once the controller is gone.
    pub async fn next_change(&mut self) -> Option<RepoEvent> {
        loop {
            self.receiver.changed().await.ok()?;
            let current = self
                .receiver
                .borrow_and_update()
                .snapshot
                .repo_name()
                .map(str::to_string);
            if current == self.last {
                continue;
            }
            self.last = current.clone();
            return Some(match current {
                Some(name) => RepoEvent::Selected(name),
                None => RepoEvent::Cleared,
            });
        }
    }
}

pub struct SessionController<G: Gateway> {
    gateway: Arc<G>,
    state: watch::Sender<SessionState>,
}

impl<G: Gateway> SessionController<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { gateway, state }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn repo_subscription(&self) -> RepoSubscription {
        let receiver = self.state.subscribe();
        let last = receiver.borrow().snapshot.repo_name().map(str::to_string);
        RepoSubscription { receiver, last }
    }

    /// Run the whole workflow for `repo_url`, replacing any workflow in flight.
    pub async fn submit(&self, repo_url: &str) -> WorkflowOutcome {
        let reference = match RepositoryReference::parse(repo_url) {
            Ok(reference) => reference,
            Err(error) => {
                let generation = self.begin(SessionState::rejected(repo_url, error.clone()));
                warn!(generation, error = %error, "repository URL rejected");
                return WorkflowOutcome::Failed(error);
            }
        };
        let generation = self.begin(SessionState::started(repo_url));
        info!(generation, repo_url, "workflow started");
        let request = RepoRequest::public(&reference);

        let ack = match self.gateway.submit(&request).await {
            Ok(ack) => ack,
            Err(error) => return self.fail(generation, error),
        };
        let advanced = self.commit(generation, |state| {
            state.notice = Some(format!("Success: {}", ack.message));
            state.transition(Stage::Cloning);
        });
        if advanced.is_none() {
            return self.superseded(generation);
        }

        let cloned = match self.gateway.clone_repository(&request).await {
            Ok(cloned) => cloned,
            Err(error) => return self.fail(generation, error),
        };
        let repo_name = cloned.repo_name;
        let advanced = self.commit(generation, |state| {
            state.snapshot.assign_repo(repo_name.clone());
            state.transition(Stage::Analyzing);
        });
        if advanced.is_none() {
            return self.superseded(generation);
        }
        info!(generation, repo = %repo_name, "repository cloned");

        let classification = match self.gateway.analyze(&repo_name).await {
            Ok(classification) => classification,
            Err(error) => return self.fail(generation, error),
        };
        let is_spring_boot = classification.is_spring_boot;
        let next = if is_spring_boot {
            Stage::ParsingEndpoints
        } else {
            Stage::Idle
        };
        let Some(snapshot) = self.commit(generation, |state| {
            state.snapshot.apply_classification(classification);
            state.transition(next);
        }) else {
            return self.superseded(generation);
        };
        info!(generation, repo = %repo_name, is_spring_boot, "project classified");

        if !is_spring_boot {
            return WorkflowOutcome::Completed {
                snapshot,
                warning: None,
            };
        }

        match self.gateway.endpoints(&repo_name).await {
            Ok(endpoints) => {
                let Some(snapshot) = self.commit(generation, |state| {
                    state.snapshot.merge_endpoints(endpoints);
                    state.transition(Stage::Idle);
                }) else {
                    return self.superseded(generation);
                };
                let counts = snapshot.counts();
                info!(
                    generation,
                    repo = %repo_name,
                    endpoints = counts.endpoints_count,
                    controllers = counts.controllers_count,
                    "workflow completed"
                );
                WorkflowOutcome::Completed {
                    snapshot,
                    warning: None,
                }
            }
            Err(error) => {
                let warning = error.into_enrichment_warning(Operation::Endpoints);
                let Some(snapshot) = self.commit(generation, |state| {
                    state.warning = Some(warning.clone());
                    state.transition(Stage::Idle);
                }) else {
                    return self.superseded(generation);
                };
                warn!(generation, repo = %repo_name, error = %warning, "endpoint enrichment failed");
                WorkflowOutcome::Completed {
                    snapshot,
                    warning: Some(warning),
                }
            }
        }
    }

    /// Replace the state with `next` under a fresh generation, in one update.
    fn begin(&self, next: SessionState) -> u64 {
        let mut generation = 0;
        self.state.send_modify(|state| {
            generation = state.generation + 1;
            *state = SessionState { generation, ..next };
        });
        generation
    }

    /// Apply `update` only if `generation` is still current. Returns the
    /// resulting snapshot, or `None` when the write was dropped as stale.
    fn commit<F>(&self, generation: u64, update: F) -> Option<ProjectSnapshot>
    where
        F: FnOnce(&mut SessionState),
    {
        let mut snapshot = None;
        self.state.send_if_modified(|state| {
            if state.generation != generation {
                debug!(generation, current = state.generation, "dropping stale response");
                return false;
            }
            update(state);
            snapshot = Some(state.snapshot.clone());
            true
        });
        snapshot
    }

    fn fail(&self, generation: u64, error: SessionError) -> WorkflowOutcome {
        let recorded = self.commit(generation, |state| {
            state.error = Some(error.clone());
            state.transition(Stage::Error);
        });
        if recorded.is_none() {
            return self.superseded(generation);
        }
        warn!(generation, kind = ?error.kind(), error = %error, "workflow failed");
        WorkflowOutcome::Failed(error)
    }

    fn superseded(&self, generation: u64) -> WorkflowOutcome {
        info!(generation, "workflow superseded");
        WorkflowOutcome::Superseded { generation }
    }
}
