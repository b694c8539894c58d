//! Plan step types shared by the validator, the planner and step execution.
//!
//! Actions are a closed set. Anything outside it is rejected by
//! [`crate::core::validator`] and never reaches execution.

use serde::{Deserialize, Serialize};

/// Action a plan step asks the agent to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Search,
    Ground,
    Highlight,
    Pulse,
    Scroll,
    Wait,
    AskUser,
    Noop,
    GetDomSnapshot,
    Type,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Search,
        Action::Ground,
        Action::Highlight,
        Action::Pulse,
        Action::Scroll,
        Action::Wait,
        Action::AskUser,
        Action::Noop,
        Action::GetDomSnapshot,
        Action::Type,
    ];

    /// Parse the wire name of an action (`"ask_user"`, `"get_dom_snapshot"`, ...).
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Search => "search",
            Action::Ground => "ground",
            Action::Highlight => "highlight",
            Action::Pulse => "pulse",
            Action::Scroll => "scroll",
            Action::Wait => "wait",
            Action::AskUser => "ask_user",
            Action::Noop => "noop",
            Action::GetDomSnapshot => "get_dom_snapshot",
            Action::Type => "type",
        }
    }
}

/// Scroll direction accepted on `scroll` steps and tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScrollDirection {
    #[serde(rename = "up")]
    Up,
    #[default]
    #[serde(rename = "down")]
    Down,
    #[serde(rename = "toElement")]
    ToElement,
}

impl ScrollDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "toElement" => Some(ScrollDirection::ToElement),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::ToElement => "toElement",
        }
    }
}

/// One sanitized step of an action plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ScrollDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Step {
    /// A bare step with only the action set.
    pub fn new(action: Action) -> Self {
        Self {
            action,
            target_id: None,
            message: None,
            direction: None,
            text: None,
            reason: None,
        }
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_direction(mut self, direction: ScrollDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Natural-language instruction carried by the step (message, then reason).
    pub fn instruction(&self) -> &str {
        self.message
            .as_deref()
            .or(self.reason.as_deref())
            .unwrap_or_default()
    }

    /// Human-readable summary used for persisted plan entries.
    pub fn describe(&self) -> String {
        let detail = self
            .message
            .as_deref()
            .or(self.reason.as_deref())
            .or(self.text.as_deref());
        match (detail, self.target_id.as_deref()) {
            (Some(detail), Some(target)) => {
                format!("{} {}: {}", self.action.as_str(), target, detail)
            }
            (Some(detail), None) => format!("{}: {}", self.action.as_str(), detail),
            (None, Some(target)) => format!("{} {}", self.action.as_str(), target),
            (None, None) => self.action.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_parse_back() {
        for action in Action::ALL {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("click"), None);
        assert_eq!(Action::parse("ASK_USER"), None);
    }

    #[test]
    fn step_serializes_with_camel_case_fields() {
        let step = Step::new(Action::Scroll)
            .with_target("el-4")
            .with_direction(ScrollDirection::ToElement);
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"action": "scroll", "targetId": "el-4", "direction": "toElement"})
        );
    }

    #[test]
    fn instruction_prefers_message_over_reason() {
        let step = Step::new(Action::Ground)
            .with_reason("find the login form")
            .with_message("click sign in");
        assert_eq!(step.instruction(), "click sign in");
        assert_eq!(
            Step::new(Action::Ground).with_reason("open menu").instruction(),
            "open menu"
        );
        assert_eq!(Step::new(Action::Ground).instruction(), "");
    }

    #[test]
    fn describe_includes_target_and_detail() {
        let step = Step::new(Action::Highlight)
            .with_target("btn-save")
            .with_message("Save here");
        assert_eq!(step.describe(), "highlight btn-save: Save here");
        assert_eq!(Step::new(Action::Wait).describe(), "wait");
    }
}
