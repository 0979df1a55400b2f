//! Conversation value types shared by the codec, the step engine and sessions.
//!
//! These types are independent of any chat backend. A [`ConversationLog`] is the
//! unit persisted per step, so its JSON form must stay stable across runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Author of a single turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One role-tagged message. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    role: Role,
    content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Ordered, append-only sequence of turns produced by one step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Content of the final turn, or `""` for an empty log.
    pub fn last_content(&self) -> &str {
        self.turns.last().map(Turn::content).unwrap_or_default()
    }

    /// Drop the first `n` turns (used when re-priming a replayed log).
    pub fn without_leading(&self, n: usize) -> Self {
        Self {
            turns: self.turns.iter().skip(n).cloned().collect(),
        }
    }

    /// Serialize to pretty JSON with trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut buf = serde_json::to_string_pretty(self).context("serialize conversation log")?;
        buf.push('\n');
        Ok(buf)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parse conversation log")
    }
}

impl Extend<Turn> for ConversationLog {
    fn extend<I: IntoIterator<Item = Turn>>(&mut self, iter: I) {
        self.turns.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_json_is_role_content_array() {
        let log = ConversationLog::from_turns(vec![Turn::system("sys"), Turn::assistant("hi")]);
        let json = log.to_json().expect("json");
        let expected = "[\n  {\n    \"role\": \"system\",\n    \"content\": \"sys\"\n  },\n  {\n    \"role\": \"assistant\",\n    \"content\": \"hi\"\n  }\n]\n";
        assert_eq!(json, expected);
        assert_eq!(ConversationLog::from_json(&json).expect("parse"), log);
    }

    #[test]
    fn without_leading_drops_priming_turn() {
        let log = ConversationLog::from_turns(vec![
            Turn::system("qa"),
            Turn::user("prompt"),
            Turn::assistant("question"),
        ]);
        let rest = log.without_leading(1);
        assert_eq!(rest.len(), 2);
        assert_eq!(rest.turns()[0].role(), Role::User);
    }

    #[test]
    fn last_content_of_empty_log_is_empty() {
        assert_eq!(ConversationLog::new().last_content(), "");
    }
}
