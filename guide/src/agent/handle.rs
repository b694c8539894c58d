//! Inbound command queue feeding a single consumer loop.
//!
//! Commands that may run a planner cycle are spawned as tasks so that `stop`
//! and `status` stay responsive while a cycle is in flight. Cycle triggers
//! that arrive mid-cycle are dropped by the agent's processing guard.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use super::error::AgentError;
use super::runtime::StatusSnapshot;
use super::{Agent, PageChange, ScanEvent, StartRequest};

const COMMAND_BUFFER: usize = 32;

/// A request to the agent's command loop.
#[derive(Debug)]
pub enum AgentCommand {
    Start {
        request: StartRequest,
        reply: oneshot::Sender<Result<StatusSnapshot, AgentError>>,
    },
    Stop {
        manual: bool,
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Reset {
        reply: oneshot::Sender<Result<StatusSnapshot, AgentError>>,
    },
    Status {
        reply: oneshot::Sender<StatusSnapshot>,
    },
    Scan(ScanEvent),
    PageChange(PageChange),
}

impl AgentCommand {
    fn name(&self) -> &'static str {
        match self {
            AgentCommand::Start { .. } => "start",
            AgentCommand::Stop { .. } => "stop",
            AgentCommand::Reset { .. } => "reset",
            AgentCommand::Status { .. } => "status",
            AgentCommand::Scan(_) => "scan",
            AgentCommand::PageChange(_) => "page_change",
        }
    }
}

/// Cloneable sender side of the command loop.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    tx: mpsc::Sender<AgentCommand>,
}

impl AgentHandle {
    pub async fn start(&self, request: StartRequest) -> Result<StatusSnapshot, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentCommand::Start { request, reply }).await?;
        rx.await.map_err(|_| AgentError::Shutdown)?
    }

    pub async fn stop(&self, manual: bool) -> Result<StatusSnapshot, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentCommand::Stop { manual, reply }).await?;
        rx.await.map_err(|_| AgentError::Shutdown)
    }

    pub async fn reset(&self) -> Result<StatusSnapshot, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentCommand::Reset { reply }).await?;
        rx.await.map_err(|_| AgentError::Shutdown)?
    }

    pub async fn status(&self) -> Result<StatusSnapshot, AgentError> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentCommand::Status { reply }).await?;
        rx.await.map_err(|_| AgentError::Shutdown)
    }

    /// Queue a scan notification. Outcomes arrive as status broadcasts.
    pub async fn scan(&self, event: ScanEvent) -> Result<(), AgentError> {
        self.send(AgentCommand::Scan(event)).await
    }

    /// Queue a page change notification. Outcomes arrive as status broadcasts.
    pub async fn page_change(&self, change: PageChange) -> Result<(), AgentError> {
        self.send(AgentCommand::PageChange(change)).await
    }

    async fn send(&self, command: AgentCommand) -> Result<(), AgentError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| AgentError::Shutdown)
    }
}

/// Start the command loop for `agent`. The loop ends when every handle is dropped.
pub fn spawn(agent: Arc<Agent>) -> (AgentHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<AgentCommand>(COMMAND_BUFFER);
    let task = tokio::spawn(async move {
        while let Some(command) = rx.recv().await {
            debug!(command = command.name(), "agent command received");
            match command {
                AgentCommand::Status { reply } => {
                    let _ = reply.send(agent.status());
                }
                AgentCommand::Start { request, reply } => {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        let _ = reply.send(agent.start(request).await);
                    });
                }
                AgentCommand::Stop { manual, reply } => {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        let _ = reply.send(agent.stop(manual).await);
                    });
                }
                AgentCommand::Reset { reply } => {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        let _ = reply.send(agent.reset().await);
                    });
                }
                AgentCommand::Scan(event) => {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        agent.handle_scan_event(event).await;
                    });
                }
                AgentCommand::PageChange(change) => {
                    let agent = Arc::clone(&agent);
                    tokio::spawn(async move {
                        agent.handle_page_change(change).await;
                    });
                }
            }
        }
        debug!("agent command loop finished");
    });
    (AgentHandle { tx }, task)
}
