//! Persisted plan entries and cursor bookkeeping.
//!
//! Invariants kept by every function here:
//! - entry ids are unique and non-empty (`step-1`, `step-2`, ...)
//! - the cursor is a valid index into the plan, or 0 for an empty plan

use serde::{Deserialize, Serialize};

use crate::core::step::{Action, Step};

/// Progress of a persisted plan entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    #[default]
    Pending,
    Done,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Done => "done",
        }
    }
}

/// One entry of the persisted step plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub id: String,
    pub action: Action,
    pub description: String,
    #[serde(default)]
    pub status: PlanStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Id of the entry at `index` (0-based).
pub fn entry_id(index: usize) -> String {
    format!("step-{}", index + 1)
}

/// Build plan entries for freshly validated steps.
pub fn plan_entries(steps: &[Step]) -> Vec<PlanEntry> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| PlanEntry {
            id: entry_id(index),
            action: step.action,
            description: step.describe(),
            status: PlanStatus::Pending,
            notes: None,
        })
        .collect()
}

/// Clamp `cursor` into the valid range for a plan of `len` entries.
pub fn clamp_cursor(cursor: usize, len: usize) -> usize {
    if len == 0 { 0 } else { cursor.min(len - 1) }
}

/// Mark the entry `id` with `status` and return the advanced cursor.
///
/// Returns `None` when no entry has that id; the plan is left untouched.
pub fn mark_entry(
    plan: &mut [PlanEntry],
    id: &str,
    status: PlanStatus,
    notes: Option<String>,
) -> Option<usize> {
    let index = plan.iter().position(|entry| entry.id == id)?;
    let entry = &mut plan[index];
    entry.status = status;
    if notes.is_some() {
        entry.notes = notes;
    }
    Some(clamp_cursor(index + 1, plan.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample_steps() -> Vec<Step> {
        vec![
            Step::new(Action::Search).with_message("rust async traits"),
            Step::new(Action::Highlight).with_target("el-2"),
            Step::new(Action::Wait),
        ]
    }

    #[test]
    fn entries_have_unique_non_empty_ids() {
        let entries = plan_entries(&sample_steps());
        let ids: HashSet<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));
        assert_eq!(entries[0].id, "step-1");
        assert_eq!(entries[0].description, "search: rust async traits");
        assert!(entries.iter().all(|entry| entry.status == PlanStatus::Pending));
    }

    #[test]
    fn clamp_cursor_handles_empty_and_overflow() {
        assert_eq!(clamp_cursor(5, 0), 0);
        assert_eq!(clamp_cursor(5, 3), 2);
        assert_eq!(clamp_cursor(1, 3), 1);
    }

    #[test]
    fn mark_entry_advances_cursor_and_keeps_notes() {
        let mut entries = plan_entries(&sample_steps());
        assert_eq!(
            mark_entry(&mut entries, "step-1", PlanStatus::Done, Some("ok".into())),
            Some(1)
        );
        assert_eq!(entries[0].status, PlanStatus::Done);
        assert_eq!(entries[0].notes.as_deref(), Some("ok"));

        assert_eq!(
            mark_entry(&mut entries, "step-3", PlanStatus::Done, None),
            Some(2)
        );
        assert_eq!(mark_entry(&mut entries, "step-9", PlanStatus::Done, None), None);
    }
}
