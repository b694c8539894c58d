//! Generative model collaborator contract.

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::tools::FunctionDeclaration;

static RATE_LIMIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)resource[\s_-]*exhausted|rate[\s_-]*limit|too many requests|quota|please wait")
        .expect("rate limit pattern is valid")
});

/// Consumer class of the scheduler, each with its own bucket list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Planner,
    Executor,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Planner, Role::Executor];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Planner => "planner",
            Role::Executor => "executor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub context: String,
    pub tools: Vec<FunctionDeclaration>,
}

/// A tool call emitted by the model. `args` may be an object or a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

impl FunctionCall {
    pub fn new(name: &str, args: Value) -> Self {
        Self {
            name: name.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub function_calls: Vec<FunctionCall>,
}

impl ModelResponse {
    pub fn from_text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            function_calls: Vec::new(),
        }
    }

    pub fn from_calls(function_calls: Vec<FunctionCall>) -> Self {
        Self {
            text: None,
            function_calls,
        }
    }

    /// Text output with surrounding whitespace removed, if any remains.
    pub fn text_payload(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

/// Failure reported by the model client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ModelError {
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
    pub message: String,
}

impl ModelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Whether the failure means "this model is over quota right now".
    pub fn is_rate_limit(&self) -> bool {
        self.status == Some(429) || RATE_LIMIT_RE.is_match(&self.message)
    }
}

/// Model client used by the scheduler's tasks.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        role: Role,
        request: &GenerateRequest,
    ) -> Result<ModelResponse, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_errors() {
        assert!(ModelError::with_status(429, "slow down").is_rate_limit());
        assert!(ModelError::new("RESOURCE_EXHAUSTED: try later").is_rate_limit());
        assert!(ModelError::new("Rate limit reached for model").is_rate_limit());
        assert!(ModelError::new("Too Many Requests").is_rate_limit());
        assert!(ModelError::new("Quota exceeded").is_rate_limit());
        assert!(ModelError::new("please wait a moment").is_rate_limit());
    }

    #[test]
    fn other_errors_are_not_rate_limits() {
        assert!(!ModelError::with_status(401, "invalid api key").is_rate_limit());
        assert!(!ModelError::new("bad request").is_rate_limit());
    }

    #[test]
    fn blank_text_is_no_payload() {
        assert_eq!(ModelResponse::from_text("  \n").text_payload(), None);
        assert_eq!(ModelResponse::from_text(" {} ").text_payload(), Some("{}"));
        assert_eq!(ModelResponse::default().text_payload(), None);
    }
}
