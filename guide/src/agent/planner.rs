//! Planner sub-loop: ask for a plan, run tool calls, validate the answer.

use std::sync::Arc;

use tracing::{debug, error, instrument, warn};

use crate::core::payload::{parse_json_payload, preview};
use crate::core::snapshot::Element;
use crate::core::step::Step;
use crate::core::tools::function_declarations;
use crate::core::validator::validate_plan;
use crate::io::memory::SessionMemory;
use crate::io::model::{GenerateRequest, ModelResponse, Role};
use crate::io::prompt::{PLANNER_USER_PROMPT, PlannerContext};
use crate::io::surface::TabId;

use super::error::AgentError;
use super::Agent;

const PREVIEW_CHARS: usize = 240;

impl Agent {
    /// Run the planner until it answers with a usable plan.
    ///
    /// Each round of tool calls is followed by a fresh memory load and
    /// snapshot. A round of tool calls beyond `max_tool_loops` fails the
    /// cycle. Returns the validated steps and the latest snapshot elements.
    #[instrument(skip_all)]
    pub(super) async fn run_planner(
        &self,
        tab: TabId,
        mut memory: SessionMemory,
        mut elements: Vec<Element>,
    ) -> Result<(Vec<Step>, Vec<Element>), AgentError> {
        let max_tool_loops = self.config.cycle.max_tool_loops;
        let mut tool_loops = 0;

        loop {
            let (url, runtime_goal) =
                self.with_runtime(|runtime| (runtime.current_url.clone(), runtime.goal.clone()));
            let goal = memory.user_goal.clone().or(runtime_goal).unwrap_or_default();
            let context = self
                .prompts
                .render_planner_context(&PlannerContext {
                    url: url.as_deref(),
                    goal: &goal,
                    plan: &memory.step_plan,
                    search: memory.last_search.as_ref(),
                    elements: &elements,
                })
                .map_err(AgentError::prompt)?;
            debug!(
                elements = elements.len(),
                plan_size = memory.step_plan.len(),
                tool_loops,
                "planner invocation prepared"
            );

            let response = self
                .generate(
                    Role::Planner,
                    self.prompts.planner_system(),
                    PLANNER_USER_PROMPT,
                    context,
                )
                .await?;

            if !response.function_calls.is_empty() {
                if tool_loops >= max_tool_loops {
                    return Err(AgentError::ToolLoopExceeded(max_tool_loops));
                }
                debug!(
                    calls = response.function_calls.len(),
                    tool_loops, "planner issued tool calls"
                );
                for call in &response.function_calls {
                    self.execute_tool_call(tab, call).await?;
                }
                memory = self.load_memory().await?;
                elements = self.capture_snapshot(tab).await?.elements;
                tool_loops += 1;
                continue;
            }

            let text = response.text_payload().ok_or_else(|| {
                AgentError::PlannerOutputInvalid("planner returned no JSON payload".to_string())
            })?;
            let payload = parse_json_payload(text).map_err(|err| {
                error!(error = %err, preview = %preview(text, PREVIEW_CHARS), "planner JSON parse failed");
                AgentError::PlannerOutputInvalid(format!("planner JSON parse failed: {err}"))
            })?;
            let validation = validate_plan(&payload, self.config.cycle.max_plan_steps);
            if !validation.is_usable() {
                return Err(AgentError::PlannerOutputInvalid(validation.summary()));
            }
            if !validation.errors.is_empty() {
                warn!(issues = %validation.summary(), "planner plan accepted with warnings");
            }
            return Ok((validation.steps, elements));
        }
    }

    /// Send one request for `role` through the scheduler and note the model used.
    pub(super) async fn generate(
        &self,
        role: Role,
        system_prompt: &str,
        user_prompt: &str,
        context: String,
    ) -> Result<ModelResponse, AgentError> {
        let tools = function_declarations();
        let limited = self
            .scheduler
            .with_limit(role, |model| {
                let request = GenerateRequest {
                    model,
                    system_prompt: system_prompt.to_string(),
                    user_prompt: user_prompt.to_string(),
                    context: context.clone(),
                    tools: tools.clone(),
                };
                let client = Arc::clone(&self.model);
                async move { client.generate(role, &request).await }
            })
            .await?;
        debug!(model = %limited.model, %role, "model response received");
        self.with_runtime(|runtime| runtime.last_model = Some(limited.model.clone()));
        Ok(limited.value)
    }
}
