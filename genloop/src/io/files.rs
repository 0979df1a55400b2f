//! Codec write side: decoded blocks into a store, stored files back into text.

use std::collections::BTreeSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::codec::{FileBlock, decode, encode, normalize_path};
use crate::io::store::FileStore;

/// Workspace key holding the most recent full model reply.
pub const ALL_OUTPUT: &str = "all_output.txt";

/// Outcome of writing a set of blocks. Writes are not transactional: every
/// block listed in `written` is on disk even when `failed` is non-empty.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteReport {
    pub written: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl WriteReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Write every block into `store`, in order.
pub fn write_blocks(store: &FileStore, blocks: &[FileBlock]) -> WriteReport {
    write_filtered(store, blocks, |_| true)
}

/// Write only blocks whose normalized path is in `allowed`; others are ignored.
pub fn write_selected(store: &FileStore, blocks: &[FileBlock], allowed: &[String]) -> WriteReport {
    let allowed: BTreeSet<String> = allowed
        .iter()
        .filter_map(|path| normalize_path(path).ok())
        .collect();
    write_filtered(store, blocks, |path| allowed.contains(path))
}

fn write_filtered(
    store: &FileStore,
    blocks: &[FileBlock],
    keep: impl Fn(&str) -> bool,
) -> WriteReport {
    let mut report = WriteReport::default();
    for block in blocks {
        let path = match normalize_path(&block.path) {
            Ok(path) => path,
            Err(err) => {
                warn!(path = %block.path, err = %err, "rejected file block");
                report.failed.push((block.path.clone(), err.to_string()));
                continue;
            }
        };
        if !keep(&path) {
            debug!(path = %path, "file not in allowed set, ignoring");
            report.skipped.push(path);
            continue;
        }
        match store.set(&path, &block.content) {
            Ok(()) => report.written.push(path),
            Err(err) => {
                warn!(path = %path, err = %format!("{err:#}"), "failed to write file block");
                report.failed.push((path, format!("{err:#}")));
            }
        }
    }
    report
}

/// Store `reply` as [`ALL_OUTPUT`] and decode it into `workspace`.
///
/// Non-empty input that yields no blocks is logged as a warning; the reply is
/// still kept so a later step can inspect it.
pub fn to_files(reply: &str, workspace: &FileStore) -> Result<WriteReport> {
    workspace.set(ALL_OUTPUT, reply)?;
    let blocks = decode(reply);
    if blocks.is_empty() && !reply.trim().is_empty() {
        warn!("model reply contained no file blocks");
    }
    let report = write_blocks(workspace, &blocks);
    info!(
        written = report.written.len(),
        failed = report.failed.len(),
        "decoded reply into workspace"
    );
    Ok(report)
}

/// Like [`to_files`], restricted to `allowed` paths.
pub fn to_selected_files(
    reply: &str,
    workspace: &FileStore,
    allowed: &[String],
) -> Result<WriteReport> {
    workspace.set(ALL_OUTPUT, reply)?;
    let blocks = decode(reply);
    if blocks.is_empty() && !reply.trim().is_empty() {
        warn!("model reply contained no file blocks");
    }
    let report = write_selected(workspace, &blocks, allowed);
    info!(
        written = report.written.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "applied reply to listed files"
    );
    Ok(report)
}

/// Encode stored files as tagged blocks, in the order of `paths`.
pub fn encode_files(store: &FileStore, paths: &[String]) -> Result<String> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        files.push((path.as_str(), store.require(path)?));
    }
    Ok(encode(
        files
            .iter()
            .map(|(path, content)| (*path, content.as_str())),
    ))
}

/// Parse a `file_list` document: one relative path per line, blanks and `#`
/// comments ignored.
pub fn parse_file_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
