//! Transient runtime state owned by the agent, and the status views built
//! from it.

use serde::Serialize;

use crate::core::snapshot::SnapshotMeta;
use crate::io::search::SearchOptions;
use crate::io::surface::TabId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Idle,
    Running,
    Waiting,
    Stopped,
    Error,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Running => "running",
            AgentStatus::Waiting => "waiting",
            AgentStatus::Stopped => "stopped",
            AgentStatus::Error => "error",
        }
    }
}

/// Mutable state of the agent. Only the agent's own operations touch it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Runtime {
    pub status: AgentStatus,
    pub active: bool,
    pub awaiting_interrupt: bool,
    pub tab_id: Option<TabId>,
    pub current_url: Option<String>,
    pub goal: Option<String>,
    pub session_id: Option<String>,
    pub options: SearchOptions,
    pub last_model: Option<String>,
    pub last_tool: Option<String>,
    pub last_error: Option<String>,
    pub last_snapshot: Option<SnapshotMeta>,
}

impl Runtime {
    pub fn begin_session(
        &mut self,
        tab_id: TabId,
        url: String,
        goal: String,
        session_id: String,
        options: SearchOptions,
    ) {
        self.tab_id = Some(tab_id);
        self.current_url = Some(url);
        self.goal = Some(goal);
        self.session_id = Some(session_id);
        self.options = options;
        self.active = true;
        self.awaiting_interrupt = false;
        self.status = AgentStatus::Running;
        self.last_error = None;
        self.last_tool = None;
    }

    pub fn stop(&mut self) {
        self.active = false;
        self.awaiting_interrupt = false;
        self.status = AgentStatus::Stopped;
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.status = AgentStatus::Idle;
        self.goal = None;
        self.session_id = None;
        self.last_error = None;
        self.awaiting_interrupt = false;
        self.last_snapshot = None;
    }

    /// Whether an external trigger may re-enter the planner cycle.
    pub fn is_resumable(&self) -> bool {
        self.active
            && self.status != AgentStatus::Error
            && (self.awaiting_interrupt || self.status == AgentStatus::Waiting)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            status: self.status,
            goal: self.goal.clone(),
            session_id: self.session_id.clone(),
            active: self.active,
            awaiting_interrupt: self.awaiting_interrupt,
            tab_id: self.tab_id,
            last_model: self.last_model.clone(),
            last_tool: self.last_tool.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view returned by `status` and carried by every broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub status: AgentStatus,
    pub goal: Option<String>,
    pub session_id: Option<String>,
    pub active: bool,
    pub awaiting_interrupt: bool,
    pub tab_id: Option<TabId>,
    pub last_model: Option<String>,
    pub last_tool: Option<String>,
    pub last_error: Option<String>,
}

/// Extra detail attached to a status broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StatusNote {
    /// Why a cycle started.
    Reason(String),
    /// Text for the user (from `ask_user`).
    Message(String),
    /// Query of a search that just completed.
    Search(String),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub status: StatusSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<StatusNote>,
}
