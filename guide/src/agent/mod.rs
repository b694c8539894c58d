//! The orchestration cycle and the operations that drive it.
//!
//! An [`Agent`] owns the transient runtime state and composes the scheduler,
//! the plan validator and the grounding ranker with its collaborators. At most
//! one planner cycle runs at a time; triggers arriving mid-cycle are dropped.

mod cycle;
mod dispatch;
mod error;
mod executor;
mod handle;
mod planner;
mod runtime;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::io::clock::Clock;
use crate::io::config::GuideConfig;
use crate::io::memory::{MemoryPatch, MemoryStore, SessionMemory};
use crate::io::model::ModelClient;
use crate::io::prompt::Prompts;
use crate::io::search::{OptionOverrides, SearchProvider};
use crate::io::surface::{Surface, SurfaceCommand, Tab, TabId};
use crate::scheduler::Scheduler;

pub use cycle::CycleOutcome;
pub use error::{AgentError, ToolError};
pub use handle::{AgentCommand, AgentHandle, spawn};
pub use runtime::{AgentStatus, StatusEvent, StatusNote, StatusSnapshot};

use runtime::Runtime;

const EVENT_CAPACITY: usize = 64;

/// External systems the agent talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub memory: Arc<dyn MemoryStore>,
    pub surface: Arc<dyn Surface>,
    pub model: Arc<dyn ModelClient>,
    pub search: Arc<dyn SearchProvider>,
}

/// Arguments of the `start` command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub goal: String,
    #[serde(default)]
    pub tab_id: Option<TabId>,
    #[serde(default)]
    pub options: OptionOverrides,
}

impl StartRequest {
    pub fn new(goal: &str) -> Self {
        Self {
            goal: goal.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }
}

/// "Scan completed" notification from the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScanEvent {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Navigation or content change reported for a tab.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChange {
    pub tab_id: TabId,
    pub url: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub struct Agent {
    config: GuideConfig,
    scheduler: Scheduler,
    prompts: Prompts,
    memory: Arc<dyn MemoryStore>,
    surface: Arc<dyn Surface>,
    model: Arc<dyn ModelClient>,
    search: Arc<dyn SearchProvider>,
    clock: Arc<dyn Clock>,
    runtime: Mutex<Runtime>,
    processing: AtomicBool,
    events: broadcast::Sender<StatusEvent>,
}

impl Agent {
    pub fn new(
        config: GuideConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AgentError> {
        config
            .validate()
            .map_err(|err| AgentError::Configuration(format!("{err:#}")))?;
        let prompts = Prompts::new(
            config.cycle.max_plan_steps,
            config.cycle.max_tool_loops,
            config.cycle.snapshot_prompt_limit,
        )
        .map_err(AgentError::prompt)?;
        let scheduler = Scheduler::new(config.scheduler.clone(), Arc::clone(&clock));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let runtime = Runtime {
            options: config.search,
            ..Runtime::default()
        };
        Ok(Self {
            config,
            scheduler,
            prompts,
            memory: collaborators.memory,
            surface: collaborators.surface,
            model: collaborators.model,
            search: collaborators.search,
            clock,
            runtime: Mutex::new(runtime),
            processing: AtomicBool::new(false),
            events,
        })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Receive a [`StatusEvent`] after every state transition.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.with_runtime(|runtime| runtime.snapshot())
    }

    /// Whether a planner cycle is in flight.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Begin a new session bound to a tab and run the first planner cycle.
    ///
    /// An active session is stopped first. Failing to resolve a tab fails the
    /// call; failures inside the cycle land in the returned status instead.
    #[instrument(skip_all, fields(tab_id = ?request.tab_id))]
    pub async fn start(&self, request: StartRequest) -> Result<StatusSnapshot, AgentError> {
        let goal = request.goal.trim().to_string();
        if goal.is_empty() {
            return Err(AgentError::Configuration(
                "agent requires a non-empty goal to start".to_string(),
            ));
        }
        if self.with_runtime(|runtime| runtime.active) {
            debug!("existing session detected; stopping before restart");
            self.stop(false).await;
        }

        let tab = self.resolve_tab(request.tab_id).await?;
        let persisted = self.load_memory().await?;
        let options = persisted.options.merged(&request.options);
        let session_id = Uuid::new_v4().to_string();

        self.memory
            .save_state(MemoryPatch {
                session_id: Some(session_id.clone()),
                user_goal: Some(goal.clone()),
                current_url: Some(tab.url.clone()),
                step_plan: Some(Vec::new()),
                options: Some(options),
                ..MemoryPatch::default()
            })
            .await
            .map_err(AgentError::persistence)?;

        if let Err(err) = self.ensure_injected(tab.id).await {
            warn!(tab_id = tab.id, error = %err, "surface injection failed; continuing");
        }

        self.with_runtime(|runtime| {
            runtime.begin_session(tab.id, tab.url.clone(), goal.clone(), session_id.clone(), options);
        });

        if let Err(err) = self
            .send(
                tab.id,
                &SurfaceCommand::ShowOverlay {
                    reason: "agent-start".to_string(),
                },
            )
            .await
        {
            debug!(error = %err, "overlay activation failed");
        }

        self.broadcast(None);
        info!(%session_id, %goal, tab_id = tab.id, "session started");
        if self.run_cycle("agent-start").await == CycleOutcome::Skipped {
            debug!("initial planner cycle skipped; a previous cycle is still running");
        }
        Ok(self.status())
    }

    /// Deactivate the session. An in-flight cycle finishes its current batch.
    #[instrument(skip(self))]
    pub async fn stop(&self, manual: bool) -> StatusSnapshot {
        let tab = self.with_runtime(|runtime| {
            runtime.stop();
            runtime.tab_id
        });
        self.broadcast(None);
        if let Some(tab) = tab
            && let Err(err) = self.send(tab, &SurfaceCommand::HideOverlay { manual }).await
        {
            debug!(error = %err, "overlay hide failed");
        }
        info!(manual, "session stopped");
        self.status()
    }

    /// Clear persisted memory, bucket usage, and session fields.
    #[instrument(skip(self))]
    pub async fn reset(&self) -> Result<StatusSnapshot, AgentError> {
        self.memory
            .reset_state()
            .await
            .map_err(AgentError::persistence)?;
        self.scheduler.clear();
        self.with_runtime(Runtime::reset);
        self.broadcast(None);
        info!("agent reset");
        Ok(self.status())
    }

    /// Resume after the surface finished a scan, if the agent is waiting.
    #[instrument(skip_all)]
    pub async fn handle_scan_event(&self, event: ScanEvent) -> CycleOutcome {
        if !self.with_runtime(|runtime| runtime.is_resumable()) {
            debug!(status = self.status().status.as_str(), "scan event ignored");
            return CycleOutcome::Skipped;
        }
        let reason = event.reason.unwrap_or_else(|| "scan-event".to_string());
        self.run_cycle(&reason).await
    }

    /// Resume after the bound tab changed, if the agent is waiting.
    #[instrument(skip_all, fields(tab_id = change.tab_id))]
    pub async fn handle_page_change(&self, change: PageChange) -> CycleOutcome {
        let resumable = self.with_runtime(|runtime| {
            let matches = runtime.tab_id == Some(change.tab_id);
            if matches && runtime.is_resumable() {
                runtime.current_url = Some(change.url.clone());
                true
            } else {
                false
            }
        });
        if !resumable {
            debug!(url = %change.url, "page change ignored");
            return CycleOutcome::Skipped;
        }
        let reason = change.reason.unwrap_or_else(|| "page-change".to_string());
        self.run_cycle(&reason).await
    }

    fn with_runtime<R>(&self, f: impl FnOnce(&mut Runtime) -> R) -> R {
        let mut runtime = self.runtime.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut runtime)
    }

    fn broadcast(&self, note: Option<StatusNote>) {
        let event = StatusEvent {
            status: self.status(),
            note,
        };
        let _ = self.events.send(event);
    }

    async fn resolve_tab(&self, preferred: Option<TabId>) -> Result<Tab, AgentError> {
        if let Some(tab_id) = preferred {
            match self.surface.get_tab(tab_id).await {
                Ok(tab) => return Ok(tab),
                Err(err) => {
                    warn!(tab_id, error = %err, "preferred tab lookup failed; using active tab");
                }
            }
        }
        self.surface.active_tab().await.map_err(|err| {
            AgentError::Configuration(format!("no active tab available for agent: {err}"))
        })
    }

    async fn load_memory(&self) -> Result<SessionMemory, AgentError> {
        self.memory.load().await.map_err(AgentError::persistence)
    }

    /// Record a diagnostic; failures to persist it are logged only.
    async fn record_diagnostic(&self, tool: Option<&str>, error: &AgentError) {
        let message = error.to_string();
        if let Err(err) = self.memory.push_diagnostic(tool, Some(&message)).await {
            warn!(error = %format!("{err:#}"), "failed to persist diagnostic");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Rig;

    #[tokio::test]
    async fn start_during_inflight_cycle_leaves_session_running() {
        let rig = Rig::new();
        rig.agent.processing.store(true, Ordering::Release);

        let status = rig
            .agent
            .start(StartRequest::new("Save my settings"))
            .await
            .expect("start");

        assert_eq!(status.status, AgentStatus::Running);
        assert!(status.active);
        assert!(rig.model.requests().is_empty());
        assert!(rig.agent.is_processing());
    }
}
