//! Plan validation and sanitization.
//!
//! Every plan produced by a model passes through [`validate_plan`] before any
//! step runs. The validator never fails on a single bad step: it drops that
//! step, records an issue for its index, and keeps the rest.
//!
//! Two signals come out of a validation and they can disagree:
//! - [`PlanValidation::valid`] is `true` only when no issue was recorded.
//! - [`PlanValidation::is_usable`] is `true` when at least one step survived
//!   and every issue is a warning (currently only truncation).

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::step::{Action, ScrollDirection, Step};

/// Default number of immediate steps kept from a plan.
pub const MAX_PLAN_STEPS: usize = 3;

const MESSAGE_LIMIT: usize = 120;
const TEXT_LIMIT: usize = 200;
const REASON_LIMIT: usize = 300;

/// A problem found while validating a plan payload.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    #[error("plan payload must be an object")]
    NotAnObject,
    #[error("plan payload must include a steps array")]
    MissingStepsArray,
    #[error("plan payload must include at least one step")]
    NoSteps,
    #[error("plan returned {count} immediate steps; trimming to {kept}")]
    TooManySteps { count: usize, kept: usize },
    #[error("step {index} is not an object")]
    StepNotObject { index: usize },
    #[error("step {index} has unknown action: {action}")]
    UnknownAction { index: usize, action: String },
    #[error("no valid steps found")]
    NoValidSteps,
}

impl ValidationIssue {
    /// Warnings leave the sanitized plan usable.
    pub fn is_warning(&self) -> bool {
        matches!(self, ValidationIssue::TooManySteps { .. })
    }
}

/// Result of validating a plan payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanValidation {
    pub valid: bool,
    pub steps: Vec<Step>,
    pub errors: Vec<ValidationIssue>,
}

impl PlanValidation {
    fn rejected(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: false,
            steps: Vec::new(),
            errors,
        }
    }

    /// Steps survived and nothing worse than a warning was recorded.
    pub fn is_usable(&self) -> bool {
        !self.steps.is_empty() && self.errors.iter().all(ValidationIssue::is_warning)
    }

    /// Issues joined for diagnostics (`"a; b"`).
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Validate and sanitize a candidate plan, keeping at most `max_steps` steps.
///
/// Steps are numbered from 1 in issues, matching how plans are shown to users.
pub fn validate_plan(payload: &Value, max_steps: usize) -> PlanValidation {
    let Some(object) = payload.as_object() else {
        return PlanValidation::rejected(vec![ValidationIssue::NotAnObject]);
    };
    let Some(raw_steps) = object.get("steps").and_then(Value::as_array) else {
        return PlanValidation::rejected(vec![ValidationIssue::MissingStepsArray]);
    };
    if raw_steps.is_empty() {
        return PlanValidation::rejected(vec![ValidationIssue::NoSteps]);
    }

    let mut errors = Vec::new();
    if raw_steps.len() > max_steps {
        errors.push(ValidationIssue::TooManySteps {
            count: raw_steps.len(),
            kept: max_steps,
        });
    }

    let mut steps = Vec::new();
    for (offset, raw) in raw_steps.iter().take(max_steps).enumerate() {
        let index = offset + 1;
        match sanitize_step(raw) {
            Ok(step) => steps.push(step),
            Err(kind) => errors.push(kind.into_issue(index)),
        }
    }

    if steps.is_empty() {
        errors.push(ValidationIssue::NoValidSteps);
        return PlanValidation::rejected(errors);
    }

    PlanValidation {
        valid: errors.is_empty(),
        steps,
        errors,
    }
}

enum StepRejection {
    NotObject,
    UnknownAction(String),
}

impl StepRejection {
    fn into_issue(self, index: usize) -> ValidationIssue {
        match self {
            StepRejection::NotObject => ValidationIssue::StepNotObject { index },
            StepRejection::UnknownAction(action) => {
                ValidationIssue::UnknownAction { index, action }
            }
        }
    }
}

fn sanitize_step(raw: &Value) -> Result<Step, StepRejection> {
    let object = raw.as_object().ok_or(StepRejection::NotObject)?;
    let action = match object.get("action") {
        Some(Value::String(name)) => {
            Action::parse(name).ok_or_else(|| StepRejection::UnknownAction(name.clone()))?
        }
        Some(other) => return Err(StepRejection::UnknownAction(other.to_string())),
        None => return Err(StepRejection::UnknownAction("undefined".to_string())),
    };

    Ok(Step {
        action,
        target_id: string_field(object, "targetId", None),
        message: string_field(object, "message", Some(MESSAGE_LIMIT)),
        direction: object
            .get("direction")
            .and_then(Value::as_str)
            .and_then(ScrollDirection::parse),
        text: string_field(object, "text", Some(TEXT_LIMIT)),
        reason: string_field(object, "reason", Some(REASON_LIMIT)),
    })
}

/// Trim a string field and cap it to `limit` characters; non-strings are dropped.
fn string_field(object: &Map<String, Value>, key: &str, limit: Option<usize>) -> Option<String> {
    let trimmed = object.get(key)?.as_str()?.trim();
    Some(match limit {
        Some(limit) => trimmed.chars().take(limit).collect(),
        None => trimmed.to_string(),
    })
}
