//! Page snapshot data as delivered by the execution surface.

use serde::{Deserialize, Serialize};

/// An interactive element captured from the page.
///
/// Candidates are ephemeral: they belong to the snapshot that produced them
/// and are never kept in agent runtime state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Element {
    pub id: String,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub title: Option<String>,
    pub aria_label: Option<String>,
    pub placeholder: Option<String>,
    pub associated_label: Option<String>,
    pub associated_context: Option<String>,
}

impl Element {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Descriptive fields in ranking order: text, title, aria-label,
    /// placeholder, associated label, associated context.
    pub fn descriptive_fields(&self) -> [Option<&str>; 6] {
        [
            self.text.as_deref(),
            self.title.as_deref(),
            self.aria_label.as_deref(),
            self.placeholder.as_deref(),
            self.associated_label.as_deref(),
            self.associated_context.as_deref(),
        ]
    }
}

/// Counters describing a capture, persisted after every snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    /// Elements seen on the page before filtering.
    pub raw_count: u32,
    /// Elements kept for the model.
    pub llm_count: u32,
    /// Page mutation counter at capture time.
    pub mutation_version: u64,
}

/// A point-in-time inventory of the page's interactive elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageSnapshot {
    pub elements: Vec<Element>,
    pub raw_count: u32,
    pub llm_count: u32,
    pub mutation_version: u64,
}

impl PageSnapshot {
    pub fn from_elements(elements: Vec<Element>) -> Self {
        let count = u32::try_from(elements.len()).unwrap_or(u32::MAX);
        Self {
            elements,
            raw_count: count,
            llm_count: count,
            mutation_version: 0,
        }
    }

    pub fn meta(&self) -> SnapshotMeta {
        SnapshotMeta {
            raw_count: self.raw_count,
            llm_count: self.llm_count,
            mutation_version: self.mutation_version,
        }
    }
}
