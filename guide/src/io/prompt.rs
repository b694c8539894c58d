//! Prompt templates and the context sections rendered into them.

use minijinja::{Environment, Error, context};

use crate::core::plan::PlanEntry;
use crate::core::snapshot::Element;
use crate::core::step::Action;
use crate::io::search::SearchResult;

const PLANNER_SYSTEM_TEMPLATE: &str = include_str!("prompts/planner_system.md");
const EXECUTOR_SYSTEM_TEMPLATE: &str = include_str!("prompts/executor_system.md");
const PLANNER_CONTEXT_TEMPLATE: &str = include_str!("prompts/planner_context.md");
const EXECUTOR_CONTEXT_TEMPLATE: &str = include_str!("prompts/executor_context.md");

pub const PLANNER_USER_PROMPT: &str = "Provide the next immediate actions as JSON.";
pub const EXECUTOR_USER_PROMPT: &str = "Return the best action as JSON.";

const NO_ELEMENTS: &str = "No actionable elements detected.";
const NO_PLAN: &str = "No plan yet.";
const NO_SEARCH: &str = "No web search performed yet.";
const SEARCH_RESULTS_SHOWN: usize = 3;

/// Inputs for the planner context bundle.
#[derive(Debug, Clone, Copy)]
pub struct PlannerContext<'a> {
    pub url: Option<&'a str>,
    pub goal: &'a str,
    pub plan: &'a [PlanEntry],
    pub search: Option<&'a SearchResult>,
    pub elements: &'a [Element],
}

/// Compiled templates. System prompts are rendered once, at construction.
pub struct Prompts {
    env: Environment<'static>,
    planner_system: String,
    executor_system: String,
    snapshot_limit: usize,
}

impl Prompts {
    pub fn new(max_steps: usize, max_tool_loops: u32, snapshot_limit: usize) -> Result<Self, Error> {
        let mut env = Environment::new();
        env.add_template("planner_system", PLANNER_SYSTEM_TEMPLATE)?;
        env.add_template("executor_system", EXECUTOR_SYSTEM_TEMPLATE)?;
        env.add_template("planner_context", PLANNER_CONTEXT_TEMPLATE)?;
        env.add_template("executor_context", EXECUTOR_CONTEXT_TEMPLATE)?;

        let actions: Vec<&str> = Action::ALL.iter().map(|action| action.as_str()).collect();
        let planner_system = env.get_template("planner_system")?.render(context! {
            max_steps => max_steps,
            max_tool_loops => max_tool_loops,
            actions => actions,
        })?;
        let executor_system = env.get_template("executor_system")?.render(context! {
            max_steps => max_steps,
            actions => actions,
        })?;
        Ok(Self {
            env,
            planner_system,
            executor_system,
            snapshot_limit,
        })
    }

    pub fn planner_system(&self) -> &str {
        &self.planner_system
    }

    pub fn executor_system(&self) -> &str {
        &self.executor_system
    }

    pub fn render_planner_context(&self, input: &PlannerContext<'_>) -> Result<String, Error> {
        self.env.get_template("planner_context")?.render(context! {
            url => input.url.filter(|url| !url.is_empty()).unwrap_or("unknown"),
            goal => input.goal.trim(),
            plan => format_plan(input.plan),
            search => format_search_summary(input.search),
            snapshot => format_snapshot(input.elements, self.snapshot_limit),
        })
    }

    pub fn render_executor_context(
        &self,
        instruction: &str,
        elements: &[Element],
    ) -> Result<String, Error> {
        self.env.get_template("executor_context")?.render(context! {
            instruction => instruction.trim(),
            snapshot => format_snapshot(elements, self.snapshot_limit),
        })
    }
}

/// One line per element (at most `limit`), numbered from 1.
pub fn format_snapshot(elements: &[Element], limit: usize) -> String {
    if elements.is_empty() {
        return NO_ELEMENTS.to_string();
    }
    elements
        .iter()
        .take(limit)
        .enumerate()
        .map(|(index, element)| {
            let quoted = [
                ("text", &element.text),
                ("title", &element.title),
                ("aria", &element.aria_label),
                ("placeholder", &element.placeholder),
                ("label", &element.associated_label),
            ];
            let mut parts = vec![format!("#{} id={}", index + 1, element.id)];
            if let Some(tag) = element.tag.as_deref().filter(|tag| !tag.is_empty()) {
                parts.push(format!("tag={tag}"));
            }
            for (name, value) in quoted {
                if let Some(value) = value.as_deref().filter(|value| !value.is_empty()) {
                    parts.push(format!("{name}=\"{value}\""));
                }
            }
            parts.join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `N. [status] description` per entry.
pub fn format_plan(plan: &[PlanEntry]) -> String {
    if plan.is_empty() {
        return NO_PLAN.to_string();
    }
    plan.iter()
        .enumerate()
        .map(|(index, entry)| {
            format!(
                "{}. [{}] {}",
                index + 1,
                entry.status.as_str(),
                entry.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_search_summary(search: Option<&SearchResult>) -> String {
    let Some(search) = search else {
        return NO_SEARCH.to_string();
    };
    let mut lines = vec![format!("Query: {}", search.query)];
    if let Some(answer) = search.answer.as_deref().filter(|answer| !answer.is_empty()) {
        lines.push(format!("Answer: {answer}"));
    }
    for (index, hit) in search.results.iter().take(SEARCH_RESULTS_SHOWN).enumerate() {
        lines.push(format!("Result {}: {} ({})", index + 1, hit.title, hit.url));
        if let Some(content) = hit.content.as_deref().filter(|content| !content.is_empty()) {
            lines.push(format!("Snippet: {content}"));
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::plan::plan_entries;
    use crate::core::step::Step;
    use crate::io::search::SearchHit;

    fn prompts() -> Prompts {
        Prompts::new(3, 2, 50).expect("templates compile")
    }

    #[test]
    fn system_prompts_mention_bounds_and_actions() {
        let prompts = prompts();
        assert!(prompts.planner_system().contains("between 1 and 3 steps"));
        assert!(prompts.planner_system().contains("at most 2 rounds"));
        assert!(prompts.planner_system().contains("ask_user, noop"));
        assert!(prompts.executor_system().contains("at most 3 steps"));
    }

    #[test]
    fn empty_sections_use_placeholders() {
        let rendered = prompts()
            .render_planner_context(&PlannerContext {
                url: None,
                goal: " find pricing ",
                plan: &[],
                search: None,
                elements: &[],
            })
            .expect("render");
        assert!(rendered.starts_with("Current URL: unknown"));
        assert!(rendered.contains("User goal: find pricing\n"));
        assert!(rendered.contains("Plan so far:\nNo plan yet."));
        assert!(rendered.contains("Latest search:\nNo web search performed yet."));
        assert!(rendered.contains("DOM snapshot:\nNo actionable elements detected."));
    }

    #[test]
    fn snapshot_lines_skip_empty_fields_and_respect_limit() {
        let mut first = Element::new("btn-1").with_tag("button").with_text("Save");
        first.aria_label = Some("Save draft".to_string());
        first.placeholder = Some(String::new());
        let second = Element::new("in-2").with_tag("input");
        let third = Element::new("a-3");

        let rendered = format_snapshot(&[first, second, third], 2);
        assert_eq!(
            rendered,
            "#1 id=btn-1 | tag=button | text=\"Save\" | aria=\"Save draft\"\n#2 id=in-2 | tag=input"
        );
    }

    #[test]
    fn plan_lines_show_status() {
        let plan = plan_entries(&[
            Step::new(Action::Highlight).with_target("el-1").with_message("Open settings"),
            Step::new(Action::Wait),
        ]);
        assert_eq!(
            format_plan(&plan),
            "1. [pending] highlight el-1: Open settings\n2. [pending] wait"
        );
    }

    #[test]
    fn search_summary_caps_results() {
        let hits = (1..=5)
            .map(|n| SearchHit {
                title: format!("Doc {n}"),
                url: format!("https://docs.example/{n}"),
                content: (n == 1).then(|| "First snippet".to_string()),
            })
            .collect();
        let summary = format_search_summary(Some(&SearchResult {
            query: "reset password".to_string(),
            answer: Some("Use the account page.".to_string()),
            results: hits,
        }));
        assert!(summary.starts_with("Query: reset password\nAnswer: Use the account page."));
        assert!(summary.contains("Result 1: Doc 1 (https://docs.example/1)\nSnippet: First snippet"));
        assert!(summary.contains("Result 3: Doc 3"));
        assert!(!summary.contains("Result 4"));
    }
}
