//! Session memory persisted across cycles (and process restarts).
//!
//! Access is read-modify-write with last writer wins; only one agent is
//! expected to run against a given store.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::plan::{PlanEntry, PlanStatus, clamp_cursor, mark_entry, plan_entries};
use crate::core::snapshot::SnapshotMeta;
use crate::core::step::Step;
use crate::io::search::{SearchOptions, SearchResult};

/// Persisted state of the current session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionMemory {
    pub session_id: Option<String>,
    pub user_goal: Option<String>,
    pub current_url: Option<String>,
    pub step_plan: Vec<PlanEntry>,
    pub current_step_index: usize,
    pub last_search: Option<SearchResult>,
    pub last_snapshot_meta: Option<SnapshotMeta>,
    pub diagnostics: Option<Diagnostics>,
    pub options: SearchOptions,
}

/// Latest failure recorded against the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub last_error: Option<String>,
    pub last_tool: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Field-wise update of [`SessionMemory`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryPatch {
    pub session_id: Option<String>,
    pub user_goal: Option<String>,
    pub current_url: Option<String>,
    /// Replaces the plan and rewinds the cursor to 0.
    pub step_plan: Option<Vec<PlanEntry>>,
    pub last_search: Option<SearchResult>,
    pub last_snapshot_meta: Option<SnapshotMeta>,
    pub options: Option<SearchOptions>,
}

impl MemoryPatch {
    pub fn apply(self, memory: &mut SessionMemory) {
        if let Some(session_id) = self.session_id {
            memory.session_id = Some(session_id);
        }
        if let Some(user_goal) = self.user_goal {
            memory.user_goal = Some(user_goal);
        }
        if let Some(current_url) = self.current_url {
            memory.current_url = Some(current_url);
        }
        if let Some(step_plan) = self.step_plan {
            memory.step_plan = step_plan;
            memory.current_step_index = 0;
        }
        if let Some(last_search) = self.last_search {
            memory.last_search = Some(last_search);
        }
        if let Some(meta) = self.last_snapshot_meta {
            memory.last_snapshot_meta = Some(meta);
        }
        if let Some(options) = self.options {
            memory.options = options;
        }
    }
}

/// Persistence collaborator.
///
/// Implementors provide `load` and `store`; the session operations are built
/// on top of them.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn load(&self) -> Result<SessionMemory>;

    async fn store(&self, memory: &SessionMemory) -> Result<()>;

    async fn save_state(&self, patch: MemoryPatch) -> Result<SessionMemory> {
        let mut memory = self.load().await?;
        patch.apply(&mut memory);
        self.store(&memory).await?;
        Ok(memory)
    }

    async fn reset_state(&self) -> Result<SessionMemory> {
        let memory = SessionMemory::default();
        self.store(&memory).await?;
        Ok(memory)
    }

    /// Replace the plan with entries for `steps` and move the cursor.
    async fn update_plan(&self, steps: &[Step], cursor: usize) -> Result<SessionMemory> {
        let mut memory = self.load().await?;
        memory.step_plan = plan_entries(steps);
        memory.current_step_index = clamp_cursor(cursor, memory.step_plan.len());
        self.store(&memory).await?;
        Ok(memory)
    }

    /// Mark entry `id` done and advance the cursor. Unknown ids are ignored.
    async fn mark_step_complete(&self, id: &str, notes: Option<String>) -> Result<SessionMemory> {
        let mut memory = self.load().await?;
        match mark_entry(&mut memory.step_plan, id, PlanStatus::Done, notes) {
            Some(cursor) => {
                memory.current_step_index = cursor;
                self.store(&memory).await?;
            }
            None => debug!(step_id = id, "mark_step_complete: unknown step id"),
        }
        Ok(memory)
    }

    async fn push_diagnostic(&self, tool: Option<&str>, error: Option<&str>) -> Result<()> {
        let mut memory = self.load().await?;
        memory.diagnostics = Some(Diagnostics {
            last_error: error.map(str::to_string),
            last_tool: tool.map(str::to_string),
            timestamp: Utc::now(),
        });
        self.store(&memory).await
    }
}

/// Memory kept in process; used by tests and embedders without storage.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    memory: Mutex<SessionMemory>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn load(&self) -> Result<SessionMemory> {
        Ok(self.memory.lock().await.clone())
    }

    async fn store(&self, memory: &SessionMemory) -> Result<()> {
        *self.memory.lock().await = memory.clone();
        Ok(())
    }
}

/// Memory persisted as pretty JSON at `path`, replaced atomically on write.
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    path: PathBuf,
}

impl FileMemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn load(&self) -> Result<SessionMemory> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionMemory::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read {}", self.path.display()));
            }
        };
        match serde_json::from_str(&contents) {
            Ok(memory) => Ok(memory),
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "session memory unreadable; starting from defaults"
                );
                Ok(SessionMemory::default())
            }
        }
    }

    async fn store(&self, memory: &SessionMemory) -> Result<()> {
        let mut payload = serde_json::to_string_pretty(memory).context("serialize memory json")?;
        payload.push('\n');
        if let Some(parent) = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, payload)
            .await
            .with_context(|| format!("write temp memory {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("replace memory {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::step::Action;

    fn steps() -> Vec<Step> {
        vec![
            Step::new(Action::Highlight).with_target("el-1"),
            Step::new(Action::Scroll),
            Step::new(Action::Wait),
        ]
    }

    #[tokio::test]
    async fn patch_only_touches_set_fields() {
        let store = InMemoryStore::new();
        store
            .save_state(MemoryPatch {
                user_goal: Some("book a table".into()),
                ..MemoryPatch::default()
            })
            .await
            .expect("save");
        let memory = store
            .save_state(MemoryPatch {
                current_url: Some("https://example.com".into()),
                ..MemoryPatch::default()
            })
            .await
            .expect("save");
        assert_eq!(memory.user_goal.as_deref(), Some("book a table"));
        assert_eq!(memory.current_url.as_deref(), Some("https://example.com"));
    }

    #[tokio::test]
    async fn patch_with_plan_rewinds_cursor() {
        let store = InMemoryStore::new();
        store.update_plan(&steps(), 2).await.expect("update");
        let memory = store
            .save_state(MemoryPatch {
                step_plan: Some(Vec::new()),
                ..MemoryPatch::default()
            })
            .await
            .expect("save");
        assert!(memory.step_plan.is_empty());
        assert_eq!(memory.current_step_index, 0);
    }

    #[tokio::test]
    async fn update_plan_clamps_cursor() {
        let store = InMemoryStore::new();
        let memory = store.update_plan(&steps(), 7).await.expect("update");
        assert_eq!(memory.step_plan.len(), 3);
        assert_eq!(memory.current_step_index, 2);

        let memory = store.update_plan(&[], 4).await.expect("update");
        assert!(memory.step_plan.is_empty());
        assert_eq!(memory.current_step_index, 0);
    }

    #[tokio::test]
    async fn mark_step_complete_advances_cursor() {
        let store = InMemoryStore::new();
        store.update_plan(&steps(), 0).await.expect("update");
        let memory = store
            .mark_step_complete("step-1", None)
            .await
            .expect("mark");
        assert_eq!(memory.step_plan[0].status, PlanStatus::Done);
        assert_eq!(memory.current_step_index, 1);

        let memory = store
            .mark_step_complete("step-42", None)
            .await
            .expect("mark");
        assert_eq!(memory.current_step_index, 1);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let store = InMemoryStore::new();
        store.update_plan(&steps(), 1).await.expect("update");
        store
            .push_diagnostic(Some("search"), Some("boom"))
            .await
            .expect("diagnostic");
        let memory = store.reset_state().await.expect("reset");
        assert_eq!(memory, SessionMemory::default());
        assert_eq!(store.load().await.expect("load"), SessionMemory::default());
    }

    #[tokio::test]
    async fn file_store_round_trips_and_tolerates_garbage() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state").join("memory.json");
        let store = FileMemoryStore::new(&path);
        assert_eq!(store.load().await.expect("load"), SessionMemory::default());

        store.update_plan(&steps(), 0).await.expect("update");
        store
            .push_diagnostic(None, Some("snapshot failed"))
            .await
            .expect("diagnostic");
        let loaded = store.load().await.expect("load");
        assert_eq!(loaded.step_plan.len(), 3);
        assert_eq!(
            loaded.diagnostics.and_then(|d| d.last_error).as_deref(),
            Some("snapshot failed")
        );

        let raw = std::fs::read_to_string(&path).expect("read");
        assert!(raw.contains("\"stepPlan\""));
        assert!(raw.ends_with('\n'));

        std::fs::write(&path, "{not json").expect("write");
        assert_eq!(store.load().await.expect("load"), SessionMemory::default());
    }
}
