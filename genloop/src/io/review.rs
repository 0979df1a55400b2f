//! Operator review of a generated program, stored as JSON in memory `review`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::io::console::Console;

/// Memory key of the most recent review.
pub const REVIEW_KEY: &str = "review";

/// Answers from the human review. `None` means "unsure".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub ran: Option<bool>,
    pub perfect: Option<bool>,
    pub works: Option<bool>,
    pub comments: String,
    /// Raw answers, comma-joined, in the order asked.
    pub raw: String,
}

impl Review {
    pub fn to_json(&self) -> Result<String> {
        let mut buf = serde_json::to_string_pretty(self).context("serialize review")?;
        buf.push('\n');
        Ok(buf)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parse review")
    }

    /// One-paragraph summary used as default feedback.
    pub fn summary(&self) -> String {
        let flag = |value: Option<bool>| match value {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unsure",
        };
        let mut out = format!(
            "Ran: {}. Did everything wanted: {}. Did something useful: {}.",
            flag(self.ran),
            flag(self.perfect),
            flag(self.works)
        );
        if !self.comments.trim().is_empty() {
            out.push_str("\nComments: ");
            out.push_str(self.comments.trim());
        }
        out
    }
}

/// Ask the review questions. Follow-up questions depend on earlier answers.
pub fn collect_review(console: &dyn Console) -> Result<Review> {
    console.say("To help gauge the quality of the generated code, please answer:");
    let mut raw = Vec::new();

    let ran_answer = console.ask("Did the generated code run at all? (y/n/u) ")?;
    let ran = yes_no(&ran_answer);
    raw.push(ran_answer);

    let mut perfect = None;
    let mut works = None;
    if ran == Some(true) {
        let answer = console.ask("Did the generated code do everything you wanted? (y/n/u) ")?;
        perfect = yes_no(&answer);
        raw.push(answer);
        if perfect != Some(true) {
            let answer = console.ask("Did the generated code do anything useful? (y/n/u) ")?;
            works = yes_no(&answer);
            raw.push(answer);
        }
    }

    let comments =
        console.ask("If you have time, please explain what was not working (ok to leave blank) ")?;
    raw.push(comments.clone());

    Ok(Review {
        ran,
        perfect,
        works,
        comments,
        raw: raw.join(", "),
    })
}

fn yes_no(answer: &str) -> Option<bool> {
    match answer.trim().to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}
