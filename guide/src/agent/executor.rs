//! Executor sub-flow: turn one instruction into concrete steps.

use tracing::{debug, info, instrument};

use crate::core::grounding::fallback_steps;
use crate::core::payload::{parse_json_payload, preview};
use crate::core::snapshot::Element;
use crate::core::step::Step;
use crate::core::validator::validate_plan;
use crate::io::model::{ModelResponse, Role};
use crate::io::prompt::EXECUTOR_USER_PROMPT;
use crate::io::surface::TabId;

use super::error::AgentError;
use super::Agent;

const PREVIEW_CHARS: usize = 240;

impl Agent {
    /// Ask the executor model for steps resolving `instruction`, falling back
    /// to deterministic grounding when its answer is unusable.
    #[instrument(skip(self, elements))]
    pub(super) async fn run_executor(
        &self,
        tab: TabId,
        instruction: &str,
        elements: &[Element],
    ) -> Result<Vec<Step>, AgentError> {
        let context = self
            .prompts
            .render_executor_context(instruction, elements)
            .map_err(AgentError::prompt)?;
        debug!(elements = elements.len(), "executor request prepared");

        let response = self
            .generate(
                Role::Executor,
                self.prompts.executor_system(),
                EXECUTOR_USER_PROMPT,
                context,
            )
            .await?;

        for call in &response.function_calls {
            self.execute_tool_call(tab, call).await?;
        }

        if let Some(steps) = self.executor_steps(&response) {
            debug!(steps = steps.len(), "executor returned steps");
            return Ok(steps);
        }
        let steps = fallback_steps(instruction, elements);
        info!(
            action = ?steps.first().map(|step| step.action),
            "executor output unusable; using grounding fallback"
        );
        Ok(steps)
    }

    fn executor_steps(&self, response: &ModelResponse) -> Option<Vec<Step>> {
        let text = response.text_payload()?;
        let payload = match parse_json_payload(text) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, preview = %preview(text, PREVIEW_CHARS), "executor JSON parse failed");
                return None;
            }
        };
        let validation = validate_plan(&payload, self.config.cycle.max_plan_steps);
        if !validation.is_usable() {
            debug!(issues = %validation.summary(), "executor plan rejected");
            return None;
        }
        Some(validation.steps)
    }
}
