//! Error taxonomy of the orchestration cycle.

use thiserror::Error;

use crate::core::tools::ToolArgsError;
use crate::io::search::SearchError;
use crate::io::surface::SurfaceError;
use crate::scheduler::SchedulerError;

/// Failures of agent operations and planner cycles.
///
/// `Configuration` is fatal to the triggering call only. Everything else that
/// escapes a cycle moves the runtime to `Error` and is recorded as a
/// diagnostic.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error("planner output invalid: {0}")]
    PlannerOutputInvalid(String),
    #[error("planner exceeded {0} rounds of tool calls")]
    ToolLoopExceeded(u32),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error("snapshot capture failed: {0}")]
    Snapshot(#[source] SurfaceError),
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("prompt rendering failed: {0}")]
    Prompt(String),
    #[error("agent command loop has shut down")]
    Shutdown,
}

impl AgentError {
    pub(crate) fn persistence(err: anyhow::Error) -> Self {
        AgentError::Persistence(format!("{err:#}"))
    }

    pub(crate) fn prompt(err: minijinja::Error) -> Self {
        AgentError::Prompt(err.to_string())
    }

    /// Short machine-friendly name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentError::Configuration(_) => "configuration",
            AgentError::Tool(_) => "tool",
            AgentError::PlannerOutputInvalid(_) => "planner_output_invalid",
            AgentError::ToolLoopExceeded(_) => "tool_loop_exceeded",
            AgentError::Scheduler(_) => "scheduler",
            AgentError::Snapshot(_) => "snapshot",
            AgentError::Persistence(_) => "persistence",
            AgentError::Prompt(_) => "prompt",
            AgentError::Shutdown => "shutdown",
        }
    }

    /// Tool involved in the failure, if it came from a tool call or visual step.
    pub fn tool(&self) -> Option<&str> {
        match self {
            AgentError::Tool(err) => Some(err.tool()),
            _ => None,
        }
    }
}

/// Failures of a single tool call or visual step.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    InvalidArgs(#[from] ToolArgsError),
    #[error("unsupported tool call: {0}")]
    Unsupported(String),
    #[error("{tool} dispatch failed: {source}")]
    Surface {
        tool: &'static str,
        #[source]
        source: SurfaceError,
    },
    #[error(transparent)]
    Search(#[from] SearchError),
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::InvalidArgs(err) => err.tool(),
            ToolError::Unsupported(name) => name,
            ToolError::Surface { tool, .. } => tool,
            ToolError::Search(_) => "search",
        }
    }
}
