//! Deterministic instruction-to-element grounding.
//!
//! Used whenever the executor model does not return a usable plan. Scoring is
//! token overlap only:
//!
//! | match                                   | weight |
//! |-----------------------------------------|--------|
//! | a field equals the token                | 3      |
//! | a field contains the token              | 2      |
//! | the joined fields contain the token     | 1      |
//! | element is a `button` or `a` (once)     | +0.5   |
//!
//! Each token is awarded at most one weight, checked in the order above.

use crate::core::snapshot::Element;
use crate::core::step::{Action, Step};

const EXACT_WEIGHT: f64 = 3.0;
const PARTIAL_WEIGHT: f64 = 2.0;
const FUZZY_WEIGHT: f64 = 1.0;
const ROLE_BONUS: f64 = 0.5;

/// Default number of candidates returned by [`rank`].
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// An element paired with its grounding score.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<'a> {
    pub element: &'a Element,
    pub score: f64,
}

/// Split an instruction into lowercase alphanumeric tokens longer than one character.
pub fn tokenize(instruction: &str) -> Vec<String> {
    instruction
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() > 1)
        .map(str::to_string)
        .collect()
}

/// Rank `elements` against `instruction`, best first.
///
/// Elements scoring zero are dropped. Ties keep snapshot order.
pub fn rank<'a>(instruction: &str, elements: &'a [Element], max_results: usize) -> Vec<Ranked<'a>> {
    let tokens = tokenize(instruction);
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<Ranked<'a>> = elements
        .iter()
        .map(|element| Ranked {
            element,
            score: score_element(element, &tokens),
        })
        .filter(|entry| entry.score > 0.0)
        .collect();
    // `sort_by` is stable, so equal scores stay in snapshot order.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(max_results);
    scored
}

/// Best single match for `instruction`, if any element scores above zero.
pub fn select_best<'a>(instruction: &str, elements: &'a [Element]) -> Option<Ranked<'a>> {
    rank(instruction, elements, 1).into_iter().next()
}

/// Steps to run when the executor model gave nothing usable.
///
/// Highlights the best match, or asks the user when nothing matches.
pub fn fallback_steps(instruction: &str, elements: &[Element]) -> Vec<Step> {
    match select_best(instruction, elements) {
        Some(best) => vec![
            Step::new(Action::Highlight)
                .with_target(best.element.id.clone())
                .with_message(format!("Try \"{instruction}\" here")),
        ],
        None => vec![Step::new(Action::AskUser).with_message(format!(
            "No element on this page matches \"{instruction}\". Could you describe it differently?"
        ))],
    }
}

fn score_element(element: &Element, tokens: &[String]) -> f64 {
    let fields: Vec<String> = element
        .descriptive_fields()
        .into_iter()
        .flatten()
        .map(|field| field.trim().to_lowercase())
        .filter(|field| !field.is_empty())
        .collect();
    if fields.is_empty() {
        return 0.0;
    }

    let combined = fields.join(" ");
    let mut score = 0.0;
    for token in tokens {
        if fields.iter().any(|field| field == token) {
            score += EXACT_WEIGHT;
        } else if fields.iter().any(|field| field.contains(token.as_str())) {
            score += PARTIAL_WEIGHT;
        } else if combined.contains(token.as_str()) {
            score += FUZZY_WEIGHT;
        }
    }

    if matches!(element.tag.as_deref(), Some("button" | "a")) {
        score += ROLE_BONUS;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids<'a>(ranked: &[Ranked<'a>]) -> Vec<&'a str> {
        ranked.iter().map(|entry| entry.element.id.as_str()).collect()
    }

    #[test]
    fn tokenize_lowercases_and_drops_short_tokens() {
        assert_eq!(
            tokenize("Click the 'Save' button, a/b x2!"),
            vec!["click", "the", "save", "button", "x2"]
        );
        assert!(tokenize("a . b").is_empty());
    }

    #[test]
    fn select_best_prefers_exact_match() {
        let elements = vec![
            Element::new("a").with_text("Save"),
            Element::new("b").with_text("Cancel"),
        ];
        let best = select_best("click save button", &elements).expect("match");
        assert_eq!(best.element.id, "a");
        assert_eq!(best.score, 3.0);
    }

    #[test]
    fn empty_instruction_tokens_return_nothing() {
        let elements = vec![Element::new("a").with_text("Save").with_tag("button")];
        assert!(rank("? !", &elements, 3).is_empty());
    }

    #[test]
    fn precedence_awards_one_weight_per_token() {
        let exact = Element::new("exact").with_text("search");
        let partial = Element::new("partial").with_text("search the docs");
        let fuzzy = Element {
            title: Some("sea".to_string()),
            associated_context: Some("rch".to_string()),
            ..Element::new("fuzzy")
        };
        let elements = vec![fuzzy, partial, exact];
        let ranked = rank("search", &elements, 3);
        assert_eq!(ids(&ranked), vec!["exact", "partial"]);
        assert_eq!(ranked[0].score, 3.0);
        assert_eq!(ranked[1].score, 2.0);
    }

    #[test]
    fn scores_accumulate_across_tokens() {
        let element = Element {
            text: Some("sign".to_string()),
            title: Some("in now".to_string()),
            ..Element::new("joined")
        };
        let elements = vec![element];
        let ranked = rank("sign in now", &elements, 3);
        // "sign" exact (3), "in" partial via "in now" (2), "now" partial (2).
        assert_eq!(ranked[0].score, 7.0);
    }

    #[test]
    fn role_bonus_applies_to_buttons_and_links() {
        let elements = vec![
            Element::new("div").with_text("Checkout").with_tag("div"),
            Element::new("link").with_text("Checkout").with_tag("a"),
        ];
        let ranked = rank("checkout", &elements, 3);
        assert_eq!(ids(&ranked), vec!["link", "div"]);
        assert_eq!(ranked[0].score, 3.5);
    }

    #[test]
    fn elements_without_fields_score_zero_even_with_role() {
        let elements = vec![Element::new("bare").with_tag("button")];
        assert!(rank("submit", &elements, 3).is_empty());
    }

    #[test]
    fn ties_keep_snapshot_order_and_respect_limit() {
        let elements = vec![
            Element::new("first").with_text("Next"),
            Element::new("second").with_text("next"),
            Element::new("third").with_text(" NEXT "),
        ];
        let ranked = rank("next", &elements, 2);
        assert_eq!(ids(&ranked), vec!["first", "second"]);
    }

    #[test]
    fn results_are_positive_and_non_increasing() {
        let elements = vec![
            Element::new("1").with_text("Account settings"),
            Element::new("2").with_text("Settings").with_tag("button"),
            Element::new("3").with_text("Help"),
            Element {
                placeholder: Some("search settings".to_string()),
                ..Element::new("4")
            },
        ];
        let ranked = rank("open account settings", &elements, 10);
        assert!(ranked.iter().all(|entry| entry.score > 0.0));
        assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert!(!ids(&ranked).contains(&"3"));
    }

    #[test]
    fn fallback_highlights_best_match() {
        let elements = vec![Element::new("save-btn").with_text("Save")];
        let steps = fallback_steps("save", &elements);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, Action::Highlight);
        assert_eq!(steps[0].target_id.as_deref(), Some("save-btn"));
        assert_eq!(steps[0].message.as_deref(), Some("Try \"save\" here"));
    }

    #[test]
    fn fallback_asks_user_when_nothing_matches() {
        let elements = vec![Element::new("x").with_text("Cancel")];
        let steps = fallback_steps("publish", &elements);
        assert_eq!(steps[0].action, Action::AskUser);
        assert!(
            steps[0]
                .message
                .as_deref()
                .is_some_and(|message| message.contains("\"publish\""))
        );
    }
}
