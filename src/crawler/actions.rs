//! Typed page actions for the browser driver
//!
//! Actions are plain data: the crawler builds them, the renderer interprets
//! them. Nothing here executes a browser.

use serde::Serialize;
use serde_json::Value;

/// Scrolls to the bottom until the document height stops growing or the
/// round limit is reached. Arguments: `(max_rounds, delay_secs)`.
const SCROLL_UNTIL_STABLE: &str = r#"(max, delay) => new Promise(async (done) => {
  let last = 0;
  for (let i = 0; i < max; i++) {
    await new Promise((r) => setTimeout(r, delay * 1000));
    window.scrollTo(0, document.body.scrollHeight);
    const height = document.body.scrollHeight;
    if (height === last) break;
    last = height;
  }
  done();
})"#;

/// Rounds used when a listing page is scroll-expanded
pub const SCROLL_MAX_ROUNDS: u32 = 12;

/// Pause between scroll rounds (seconds)
pub const SCROLL_DELAY_SECS: f64 = 0.6;

/// One step for the browser driver to perform on a rendered page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PageAction {
    WaitForSelector { selector: String },
    Evaluate { script: String, args: Vec<Value> },
    Fill { selector: String, value: String },
    Click { selector: String },
    WaitForIdle,
}

impl PageAction {
    pub fn wait_for_selector(selector: impl Into<String>) -> Self {
        Self::WaitForSelector {
            selector: selector.into(),
        }
    }

    pub fn fill(selector: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Fill {
            selector: selector.into(),
            value: value.into(),
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Self::Click {
            selector: selector.into(),
        }
    }

    /// Short name used in log lines
    pub fn name(&self) -> &'static str {
        match self {
            Self::WaitForSelector { .. } => "wait_for_selector",
            Self::Evaluate { .. } => "evaluate",
            Self::Fill { .. } => "fill",
            Self::Click { .. } => "click",
            Self::WaitForIdle => "wait_for_idle",
        }
    }
}

/// Builds the scroll-until-stable script action
pub fn infinite_scroll(max_rounds: u32, scroll_delay_secs: f64) -> PageAction {
    PageAction::Evaluate {
        script: SCROLL_UNTIL_STABLE.to_string(),
        args: vec![Value::from(max_rounds), Value::from(scroll_delay_secs)],
    }
}

/// Full action list used to re-fetch a lazy-loading listing page
pub fn scroll_expansion() -> Vec<PageAction> {
    vec![
        PageAction::wait_for_selector("body"),
        infinite_scroll(SCROLL_MAX_ROUNDS, SCROLL_DELAY_SECS),
        PageAction::WaitForIdle,
    ]
}

/// Form login: fill both fields, submit, and wait for the result to settle
pub fn login_sequence(
    email_selector: &str,
    email: &str,
    password_selector: &str,
    password: &str,
    submit_selector: &str,
) -> Vec<PageAction> {
    vec![
        PageAction::fill(email_selector, email),
        PageAction::fill(password_selector, password),
        PageAction::click(submit_selector),
        PageAction::WaitForIdle,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_expansion_shape() {
        let actions = scroll_expansion();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], PageAction::wait_for_selector("body"));
        assert_eq!(actions[2], PageAction::WaitForIdle);

        match &actions[1] {
            PageAction::Evaluate { script, args } => {
                assert!(script.contains("scrollHeight"));
                assert_eq!(args[0], Value::from(12u32));
                assert_eq!(args[1], Value::from(0.6));
            }
            other => panic!("expected evaluate action, got {:?}", other),
        }
    }

    #[test]
    fn test_login_sequence_order() {
        let actions = login_sequence("#email", "ops@example.com", "#password", "hunter2", "button[type=submit]");
        let names: Vec<&str> = actions.iter().map(PageAction::name).collect();
        assert_eq!(names, vec!["fill", "fill", "click", "wait_for_idle"]);
        assert_eq!(actions[1], PageAction::fill("#password", "hunter2"));
    }

    #[test]
    fn test_actions_serialize_tagged() {
        let json = serde_json::to_value(PageAction::click("#next")).unwrap();
        assert_eq!(json, serde_json::json!({"action": "click", "selector": "#next"}));

        let json = serde_json::to_value(PageAction::WaitForIdle).unwrap();
        assert_eq!(json, serde_json::json!({"action": "wait_for_idle"}));
    }
}
