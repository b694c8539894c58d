//! Execution surface contract: the page-side agent that renders effects and
//! captures element snapshots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::snapshot::PageSnapshot;
use crate::core::step::ScrollDirection;

pub type TabId = u64;

/// A browser tab the agent can bind to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub url: String,
}

impl Tab {
    pub fn new(id: TabId, url: &str) -> Self {
        Self {
            id,
            url: url.to_string(),
        }
    }
}

/// Message sent to the surface of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceCommand {
    ShowOverlay {
        reason: String,
    },
    HideOverlay {
        manual: bool,
    },
    Highlight {
        target_id: String,
        message: Option<String>,
    },
    Pulse {
        target_id: String,
        message: Option<String>,
    },
    Scroll {
        direction: ScrollDirection,
        target_id: Option<String>,
    },
    CaptureSnapshot,
}

impl SurfaceCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            SurfaceCommand::ShowOverlay { .. } => "show_overlay",
            SurfaceCommand::HideOverlay { .. } => "hide_overlay",
            SurfaceCommand::Highlight { .. } => "highlight",
            SurfaceCommand::Pulse { .. } => "pulse",
            SurfaceCommand::Scroll { .. } => "scroll",
            SurfaceCommand::CaptureSnapshot => "capture_snapshot",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceReply {
    Ack,
    Snapshot(PageSnapshot),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// Nothing is listening in the tab yet; reinjecting may help.
    #[error("surface is not ready")]
    NotReady,
    /// The page refuses injection (browser-internal pages and similar).
    #[error("page is not accessible: {0}")]
    Inaccessible(String),
    #[error("no such tab: {0}")]
    NoTab(TabId),
    #[error("no active tab")]
    NoActiveTab,
    #[error("snapshot capture failed: {0}")]
    Snapshot(String),
    #[error("surface dispatch failed: {0}")]
    Failed(String),
}

/// Page-side collaborator. Implementations talk to a real browser; tests use
/// a recording fake.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn dispatch(
        &self,
        tab: TabId,
        command: &SurfaceCommand,
    ) -> Result<SurfaceReply, SurfaceError>;

    /// (Re)install the page-side agent in `tab`.
    async fn inject(&self, tab: TabId) -> Result<(), SurfaceError>;

    async fn get_tab(&self, tab: TabId) -> Result<Tab, SurfaceError>;

    async fn active_tab(&self) -> Result<Tab, SurfaceError>;
}
