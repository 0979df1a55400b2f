//! Directory-backed artifact stores for a project.
//!
//! Each store maps a relative key to a text file under its root. Writes are
//! atomic (temp file + rename) and complete before `set` returns, so the next
//! step always sees the previous step's artifacts.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use crate::core::codec::normalize_path;
use crate::core::errors::StepError;
use crate::core::types::ConversationLog;
use crate::io::config::CONFIG_FILE;

/// Canonical locations inside a project directory.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub memory_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub preprompts_dir: PathBuf,
    pub config_path: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let memory_dir = root.join("memory");
        Self {
            logs_dir: memory_dir.join("logs"),
            memory_dir,
            workspace_dir: root.join("workspace"),
            preprompts_dir: root.join("preprompts"),
            config_path: root.join(CONFIG_FILE),
            root,
        }
    }
}

/// A named key -> text mapping persisted under one directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    name: &'static str,
    root: PathBuf,
}

impl FileStore {
    pub fn new(name: &'static str, root: impl Into<PathBuf>) -> Self {
        Self {
            name,
            root: root.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for `key`. Keys that escape the root are rejected.
    pub fn path_of(&self, key: &str) -> Result<PathBuf> {
        let rel = normalize_path(key).with_context(|| format!("{} key '{key}'", self.name))?;
        Ok(self.root.join(rel))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_of(key).is_ok_and(|path| path.is_file())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_of(key)?;
        if !path.is_file() {
            return Ok(None);
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        Ok(Some(contents))
    }

    /// Like [`FileStore::get`], but absence is a [`StepError::MissingArtifact`].
    pub fn require(&self, key: &str) -> Result<String> {
        self.get(key)?.ok_or_else(|| {
            StepError::MissingArtifact {
                store: self.name.to_string(),
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Replace the full content of `key`, creating parent directories.
    pub fn set(&self, key: &str, contents: &str) -> Result<()> {
        let path = self.path_of(key)?;
        debug!(store = self.name, key, bytes = contents.len(), "writing artifact");
        write_atomic(&path, contents)
    }

    /// All keys currently stored, as sorted `/`-separated relative paths.
    pub fn keys(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.with_context(|| format!("walk {}", self.root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.root)
                .with_context(|| format!("relativize {}", entry.path().display()))?;
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            keys.push(key);
        }
        keys.sort();
        Ok(keys)
    }

    /// Every key with its content, for diffing store state in tests and tooling.
    pub fn snapshot(&self) -> Result<BTreeMap<String, String>> {
        let mut snapshot = BTreeMap::new();
        for key in self.keys()? {
            let contents = self.require(&key)?;
            snapshot.insert(key, contents);
        }
        Ok(snapshot)
    }
}

/// The stores a workflow reads and writes.
#[derive(Debug, Clone)]
pub struct Stores {
    /// Operator inputs: `prompt`, `feedback`, `file_list`. Rooted at the project.
    pub input: FileStore,
    /// Derived documents: `specification`, `unit_tests`, `review`.
    pub memory: FileStore,
    /// One serialized conversation per step name.
    pub logs: FileStore,
    /// The generated project.
    pub workspace: FileStore,
    /// Per-project prompt overrides.
    pub preprompts: FileStore,
}

impl Stores {
    pub fn open(paths: &ProjectPaths) -> Self {
        Self {
            input: FileStore::new("input", &paths.root),
            memory: FileStore::new("memory", &paths.memory_dir),
            logs: FileStore::new("logs", &paths.logs_dir),
            workspace: FileStore::new("workspace", &paths.workspace_dir),
            preprompts: FileStore::new("preprompts", &paths.preprompts_dir),
        }
    }

    /// Persist a step's conversation under the step name.
    pub fn save_log(&self, step: &str, log: &ConversationLog) -> Result<()> {
        self.logs.set(step, &log.to_json()?)
    }

    /// Load a step's recorded conversation; absence is a [`StepError::MissingLog`].
    pub fn load_log(&self, step: &str) -> Result<ConversationLog> {
        let raw = self.logs.get(step)?.ok_or_else(|| StepError::MissingLog {
            step: step.to_string(),
        })?;
        ConversationLog::from_json(&raw).with_context(|| format!("replay log of step '{step}'"))
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("artifact path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let file_name = path
        .file_name()
        .with_context(|| format!("artifact path missing file name {}", path.display()))?;
    let tmp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp artifact {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
