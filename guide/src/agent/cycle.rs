//! One planner cycle: capture, plan, validate, execute.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, instrument, warn};

use crate::core::grounding::select_best;
use crate::core::plan::entry_id;
use crate::core::snapshot::Element;
use crate::core::step::{Action, Step};
use crate::io::surface::{SurfaceCommand, TabId};

use super::error::{AgentError, ToolError};
use super::runtime::{AgentStatus, StatusNote};
use super::Agent;

const ASK_USER_FALLBACK: &str = "Agent requested assistance.";

/// How a cycle trigger was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Not run: the agent was inactive, not waiting, or already processing.
    Skipped,
    /// A `wait` or `ask_user` step stopped the batch.
    Halted,
    /// Every step ran.
    Completed,
    /// The cycle failed; the runtime is in `Error`.
    Failed,
}

/// Whether step execution may go on with the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Halt,
}

/// Non-blocking hold on the `processing` flag, released on drop.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

impl Agent {
    /// Run one planner cycle unless the agent is inactive or already busy.
    #[instrument(skip(self))]
    pub(crate) async fn run_cycle(&self, reason: &str) -> CycleOutcome {
        if !self.with_runtime(|runtime| runtime.active) {
            debug!("planner cycle skipped: agent inactive");
            return CycleOutcome::Skipped;
        }
        let Some(guard) = CycleGuard::try_acquire(&self.processing) else {
            debug!("planner cycle skipped: already processing");
            return CycleOutcome::Skipped;
        };

        self.with_runtime(|runtime| {
            runtime.awaiting_interrupt = false;
            runtime.status = AgentStatus::Running;
        });
        self.broadcast(Some(StatusNote::Reason(reason.to_string())));
        debug!("planner cycle started");

        let outcome = match self.cycle_body().await {
            Ok(flow) => {
                self.with_runtime(|runtime| {
                    if runtime.active {
                        if flow == Flow::Continue {
                            runtime.awaiting_interrupt = true;
                        }
                        runtime.status = AgentStatus::Waiting;
                    }
                });
                match flow {
                    Flow::Continue => CycleOutcome::Completed,
                    Flow::Halt => CycleOutcome::Halted,
                }
            }
            Err(err) => {
                let message = err.to_string();
                error!(kind = err.kind(), error = %message, "planner cycle failed");
                self.with_runtime(|runtime| {
                    runtime.status = AgentStatus::Error;
                    runtime.last_error = Some(message.clone());
                });
                self.record_diagnostic(err.tool(), &err).await;
                self.broadcast(Some(StatusNote::Error(message)));
                CycleOutcome::Failed
            }
        };

        drop(guard);
        self.broadcast(None);
        let status = self.status();
        debug!(
            status = status.status.as_str(),
            awaiting_interrupt = status.awaiting_interrupt,
            ?outcome,
            "planner cycle finished"
        );
        outcome
    }

    async fn cycle_body(&self) -> Result<Flow, AgentError> {
        let bound_tab = self.with_runtime(|runtime| runtime.tab_id);
        let tab = self.resolve_tab(bound_tab).await?;
        self.with_runtime(|runtime| {
            runtime.tab_id = Some(tab.id);
            runtime.current_url = Some(tab.url.clone());
        });

        let memory = self.load_memory().await?;
        debug!(session_id = ?memory.session_id, "memory loaded for planner cycle");
        let snapshot = self.capture_snapshot(tab.id).await?;
        debug!(
            elements = snapshot.elements.len(),
            mutation_version = snapshot.mutation_version,
            "snapshot ready for planner"
        );

        let (steps, elements) = self.run_planner(tab.id, memory, snapshot.elements).await?;
        info!(steps = steps.len(), "planner returned steps");
        self.memory
            .update_plan(&steps, 0)
            .await
            .map_err(AgentError::persistence)?;

        self.execute_steps(tab.id, &steps, elements).await
    }

    /// Execute validated steps in order, stopping at the first halt.
    async fn execute_steps(
        &self,
        tab: TabId,
        steps: &[Step],
        mut elements: Vec<Element>,
    ) -> Result<Flow, AgentError> {
        for (index, step) in steps.iter().enumerate() {
            debug!(index, action = step.action.as_str(), "executing plan step");
            if self.execute_step(tab, step, &mut elements).await? == Flow::Halt {
                debug!(index, "execution halted waiting for external event");
                return Ok(Flow::Halt);
            }
            self.memory
                .mark_step_complete(&entry_id(index), None)
                .await
                .map_err(AgentError::persistence)?;
        }
        Ok(Flow::Continue)
    }

    async fn execute_step(
        &self,
        tab: TabId,
        step: &Step,
        elements: &mut Vec<Element>,
    ) -> Result<Flow, AgentError> {
        if step.action != Action::Ground {
            return self.execute_leaf(tab, step, elements).await;
        }
        let instruction = match step.instruction() {
            "" => self
                .with_runtime(|runtime| runtime.goal.clone())
                .unwrap_or_default(),
            instruction => instruction.to_string(),
        };
        let grounded = self.run_executor(tab, &instruction, elements).await?;
        for nested in &grounded {
            if self.execute_leaf(tab, nested, elements).await? == Flow::Halt {
                return Ok(Flow::Halt);
            }
        }
        Ok(Flow::Continue)
    }

    /// Execute a step that needs no executor round trip.
    async fn execute_leaf(
        &self,
        tab: TabId,
        step: &Step,
        elements: &mut Vec<Element>,
    ) -> Result<Flow, AgentError> {
        match step.action {
            Action::GetDomSnapshot => {
                *elements = self.capture_snapshot(tab).await?.elements;
            }
            Action::Search => {
                let (goal, options) =
                    self.with_runtime(|runtime| (runtime.goal.clone(), runtime.options));
                let query = step
                    .message
                    .clone()
                    .or_else(|| step.text.clone())
                    .or(goal)
                    .unwrap_or_default();
                self.run_search(&query, &options).await?;
            }
            Action::Highlight | Action::Pulse => {
                let Some(target_id) = resolve_target(step, elements) else {
                    warn!(action = step.action.as_str(), "step has no resolvable target; skipped");
                    return Ok(Flow::Continue);
                };
                let command = if step.action == Action::Highlight {
                    SurfaceCommand::Highlight {
                        target_id,
                        message: step.message.clone(),
                    }
                } else {
                    SurfaceCommand::Pulse {
                        target_id,
                        message: step.message.clone(),
                    }
                };
                self.dispatch_visual(tab, step.action.as_str(), &command).await?;
            }
            Action::Scroll => {
                let command = SurfaceCommand::Scroll {
                    direction: step.direction.unwrap_or_default(),
                    target_id: step.target_id.clone(),
                };
                self.dispatch_visual(tab, "scroll", &command).await?;
            }
            Action::Wait => {
                self.with_runtime(|runtime| {
                    runtime.awaiting_interrupt = true;
                    runtime.status = AgentStatus::Waiting;
                });
                self.broadcast(None);
                return Ok(Flow::Halt);
            }
            Action::AskUser => {
                self.with_runtime(|runtime| {
                    runtime.awaiting_interrupt = false;
                    runtime.status = AgentStatus::Waiting;
                });
                let message = step
                    .message
                    .clone()
                    .unwrap_or_else(|| ASK_USER_FALLBACK.to_string());
                self.broadcast(Some(StatusNote::Message(message)));
                return Ok(Flow::Halt);
            }
            Action::Ground => {
                warn!("nested ground step skipped");
            }
            Action::Type => {
                debug!("type step acknowledged; the agent never types for the user");
            }
            Action::Noop => {}
        }
        Ok(Flow::Continue)
    }

    pub(super) async fn dispatch_visual(
        &self,
        tab: TabId,
        tool: &'static str,
        command: &SurfaceCommand,
    ) -> Result<(), AgentError> {
        self.with_runtime(|runtime| runtime.last_tool = Some(tool.to_string()));
        self.send(tab, command)
            .await
            .map_err(|source| ToolError::Surface { tool, source })?;
        Ok(())
    }
}

/// Explicit target of a visual step, else the best grounding match for its
/// instruction.
fn resolve_target(step: &Step, elements: &[Element]) -> Option<String> {
    if let Some(target_id) = step.target_id.as_deref().filter(|id| !id.is_empty()) {
        return Some(target_id.to_string());
    }
    select_best(step.instruction(), elements).map(|ranked| ranked.element.id.clone())
}
