//! Conversation session abstraction.
//!
//! The [`Session`] trait decouples steps from the chat backend. The shipped
//! backend, [`CommandSession`], pipes the conversation into an external chat
//! command. Tests use scripted sessions that return canned replies.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{ConversationLog, Turn};
use crate::io::config::SessionConfig;
use crate::io::process::run_command_with_timeout;

/// A blocking request/response chat backend.
///
/// `label` only attributes the exchange in logs; it never changes behavior.
pub trait Session {
    /// Send `turns` and return the assistant's reply.
    fn complete(&self, turns: &[Turn], label: &str) -> Result<Turn>;

    /// Fresh exchange: system + user, then the reply.
    fn start(&self, system: &str, user: &str, label: &str) -> Result<ConversationLog> {
        let mut log = ConversationLog::from_turns(vec![Turn::system(system), Turn::user(user)]);
        let reply = self.complete(log.turns(), label)?;
        log.push(reply);
        Ok(log)
    }

    /// Continue `log`, optionally appending a user turn first.
    fn next(
        &self,
        mut log: ConversationLog,
        user: Option<&str>,
        label: &str,
    ) -> Result<ConversationLog> {
        if let Some(user) = user {
            log.push(Turn::user(user));
        }
        let reply = self.complete(log.turns(), label)?;
        log.push(reply);
        Ok(log)
    }
}

/// JSON written to the chat command's stdin.
#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    label: &'a str,
    messages: &'a [Turn],
}

/// Session backed by an external chat command.
///
/// The command receives `{"label": .., "messages": [{"role", "content"}..]}`
/// on stdin and must print the assistant reply on stdout.
#[derive(Debug, Clone)]
pub struct CommandSession {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandSession {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        }
    }
}

impl Session for CommandSession {
    #[instrument(skip_all, fields(label = %label, turns = turns.len()))]
    fn complete(&self, turns: &[Turn], label: &str) -> Result<Turn> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("no chat command configured; set session.command in genloop.toml");
        };
        let payload = serde_json::to_vec(&SessionRequest {
            label,
            messages: turns,
        })
        .context("serialize session request")?;

        let mut cmd = Command::new(program);
        cmd.args(args);
        info!(program = %program, "sending conversation");
        let output = run_command_with_timeout(cmd, &payload, self.timeout, self.output_limit_bytes)
            .with_context(|| format!("run chat command '{program}'"))?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "chat command timed out");
            bail!("chat command timed out after {:?}", self.timeout);
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "chat command failed");
            bail!(
                "chat command failed with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            );
        }

        let reply = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(bytes = reply.len(), "received reply");
        Ok(Turn::assistant(reply))
    }
}
