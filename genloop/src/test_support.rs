//! Test doubles and scratch projects, shared by unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::core::types::Turn;
use crate::io::config::{GenConfig, write_config};
use crate::io::console::Console;
use crate::io::session::Session;
use crate::io::store::{ProjectPaths, Stores};

/// One exchange as the session saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub label: String,
    pub turns: Vec<Turn>,
}

/// Session that replays canned replies in order and records every request.
pub struct ScriptedSession {
    replies: RefCell<VecDeque<String>>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl ScriptedSession {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: RefCell::new(replies.into_iter().map(Into::into).collect()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.borrow().len()
    }
}

impl Session for ScriptedSession {
    fn complete(&self, turns: &[Turn], label: &str) -> Result<Turn> {
        self.requests.borrow_mut().push(RecordedRequest {
            label: label.to_string(),
            turns: turns.to_vec(),
        });
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted session has no reply left for '{label}'"))?;
        Ok(Turn::assistant(reply))
    }
}

/// Console that answers from a script and captures everything shown.
pub struct ScriptedConsole {
    answers: RefCell<VecDeque<String>>,
    output: RefCell<String>,
}

impl ScriptedConsole {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: RefCell::new(answers.into_iter().map(Into::into).collect()),
            output: RefCell::new(String::new()),
        }
    }

    pub fn output(&self) -> String {
        self.output.borrow().clone()
    }

    pub fn is_exhausted(&self) -> bool {
        self.answers.borrow().is_empty()
    }
}

impl Console for ScriptedConsole {
    fn say(&self, text: &str) {
        let mut output = self.output.borrow_mut();
        output.push_str(text);
        output.push('\n');
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        self.output.borrow_mut().push_str(prompt);
        self.answers
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted console has no answer left for {prompt:?}"))
    }
}

/// Project directory in a temp dir, removed on drop.
pub struct TestProject {
    temp: TempDir,
    paths: ProjectPaths,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir()?;
        let paths = ProjectPaths::new(temp.path());
        Ok(Self { temp, paths })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn stores(&self) -> Stores {
        Stores::open(&self.paths)
    }

    /// Write an operator input file (`prompt`, `feedback`, ...). Panics on I/O failure.
    pub fn write_input(&self, key: &str, contents: &str) {
        self.stores()
            .input
            .set(key, contents)
            .expect("write project input");
    }

    pub fn write_config(&self, config: &GenConfig) -> Result<()> {
        write_config(&self.paths.config_path, config)
    }
}
