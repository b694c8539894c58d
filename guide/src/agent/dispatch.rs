//! Tool dispatch and delivery of commands to the execution surface.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::snapshot::PageSnapshot;
use crate::core::step::ScrollDirection;
use crate::core::tools::{ToolArgsError, ToolName, parse_tool_args, validate_tool_args};
use crate::io::memory::MemoryPatch;
use crate::io::model::FunctionCall;
use crate::io::search::{OptionOverrides, SearchOptions, SearchResult, TimeRange};
use crate::io::surface::{SurfaceCommand, SurfaceError, SurfaceReply, TabId};

use super::error::{AgentError, ToolError};
use super::runtime::StatusNote;
use super::Agent;

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    time_range: Option<TimeRange>,
    #[serde(default)]
    max_results: Option<u32>,
    #[serde(default)]
    chunks_per_source: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetArgs {
    target_id: String,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrollArgs {
    direction: ScrollDirection,
    #[serde(default)]
    target_id: Option<String>,
}

fn typed_args<T: DeserializeOwned>(tool: ToolName, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|err| {
        ToolError::InvalidArgs(ToolArgsError::Malformed {
            tool: tool.to_string(),
            reason: err.to_string(),
        })
    })
}

impl Agent {
    /// Execute one model tool call against the bound tab.
    #[instrument(skip_all, fields(tool = %call.name))]
    pub(crate) async fn execute_tool_call(
        &self,
        tab: TabId,
        call: &FunctionCall,
    ) -> Result<(), AgentError> {
        let tool = ToolName::parse(&call.name)
            .ok_or_else(|| ToolError::Unsupported(call.name.clone()))?;
        let args = parse_tool_args(tool.as_str(), &call.args).map_err(ToolError::from)?;
        validate_tool_args(tool, &args).map_err(ToolError::from)?;
        debug!(%args, "executing tool call");

        match tool {
            ToolName::Search => {
                let args: SearchArgs = typed_args(tool, args)?;
                let options = self
                    .with_runtime(|runtime| runtime.options)
                    .merged(&OptionOverrides {
                        time_range: args.time_range,
                        max_results: args.max_results,
                        chunks_per_source: args.chunks_per_source,
                    });
                self.run_search(&args.query, &options).await?;
            }
            ToolName::GetDomSnapshot => {
                self.with_runtime(|runtime| runtime.last_tool = Some(tool.to_string()));
                self.capture_snapshot(tab).await?;
            }
            ToolName::Highlight | ToolName::Pulse => {
                let args: TargetArgs = typed_args(tool, args)?;
                let command = if tool == ToolName::Highlight {
                    SurfaceCommand::Highlight {
                        target_id: args.target_id,
                        message: args.message,
                    }
                } else {
                    SurfaceCommand::Pulse {
                        target_id: args.target_id,
                        message: args.message,
                    }
                };
                self.dispatch_visual(tab, tool.as_str(), &command).await?;
            }
            ToolName::Scroll => {
                let args: ScrollArgs = typed_args(tool, args)?;
                let command = SurfaceCommand::Scroll {
                    direction: args.direction,
                    target_id: args.target_id,
                };
                self.dispatch_visual(tab, tool.as_str(), &command).await?;
            }
        }
        Ok(())
    }

    /// Search the web and persist the result as the session's latest search.
    pub(crate) async fn run_search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchResult, AgentError> {
        self.with_runtime(|runtime| runtime.last_tool = Some("search".to_string()));
        let result = self
            .search
            .search(query, options)
            .await
            .map_err(ToolError::from)?;
        self.memory
            .save_state(MemoryPatch {
                last_search: Some(result.clone()),
                ..MemoryPatch::default()
            })
            .await
            .map_err(AgentError::persistence)?;
        debug!(query, hits = result.results.len(), "search stored");
        self.broadcast(Some(StatusNote::Search(result.query.clone())));
        Ok(result)
    }

    /// Capture a fresh snapshot and record its metadata.
    pub(crate) async fn capture_snapshot(&self, tab: TabId) -> Result<PageSnapshot, AgentError> {
        let snapshot = match self
            .send(tab, &SurfaceCommand::CaptureSnapshot)
            .await
            .map_err(AgentError::Snapshot)?
        {
            SurfaceReply::Snapshot(snapshot) => snapshot,
            SurfaceReply::Ack => {
                return Err(AgentError::Snapshot(SurfaceError::Snapshot(
                    "surface returned no snapshot".to_string(),
                )));
            }
        };
        let meta = snapshot.meta();
        self.with_runtime(|runtime| runtime.last_snapshot = Some(meta));
        self.memory
            .save_state(MemoryPatch {
                last_snapshot_meta: Some(meta),
                ..MemoryPatch::default()
            })
            .await
            .map_err(AgentError::persistence)?;
        debug!(
            raw_count = meta.raw_count,
            llm_count = meta.llm_count,
            mutation_version = meta.mutation_version,
            "snapshot metadata recorded"
        );
        Ok(snapshot)
    }

    /// Send a command, reinjecting and retrying once if the surface is not ready.
    pub(crate) async fn send(
        &self,
        tab: TabId,
        command: &SurfaceCommand,
    ) -> Result<SurfaceReply, SurfaceError> {
        debug!(tab_id = tab, command = command.kind(), "sending surface command");
        match self.surface.dispatch(tab, command).await {
            Err(SurfaceError::NotReady) => {
                warn!(
                    tab_id = tab,
                    command = command.kind(),
                    "surface not ready; reinjecting"
                );
                self.ensure_injected(tab).await?;
                self.clock
                    .sleep(self.config.cycle.surface_retry_delay())
                    .await;
                self.surface.dispatch(tab, command).await
            }
            other => other,
        }
    }

    /// Inject the page-side agent. Pages that refuse injection are tolerated.
    pub(crate) async fn ensure_injected(&self, tab: TabId) -> Result<(), SurfaceError> {
        match self.surface.inject(tab).await {
            Err(SurfaceError::Inaccessible(reason)) => {
                warn!(tab_id = tab, %reason, "page refused injection");
                Ok(())
            }
            other => other,
        }
    }
}
