//! Chat-text codec: filename-tagged fenced blocks <-> `(path, content)` pairs.
//!
//! Wire format, one block per file:
//!
//! ````text
//! relative/path/to/file.ext
//! ```lang
//! raw content
//! ```
//! ````
//!
//! Decoding is line-oriented and recovering. A fence is a line holding nothing
//! but three or more backticks (an opening fence may add a language tag).
//! Backticks anywhere else are content.
//!
//! The newline before a closing fence belongs to the fence: decoding drops it
//! and [`encode_block`] adds it back. Files decoded from a model reply
//! therefore end without a trailing newline, unlike [`extract_code_blocks`],
//! which keeps block text verbatim.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// A decoded file: path as written by the model, optional fence tag, raw content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBlock {
    pub path: String,
    pub language: Option<String>,
    pub content: String,
}

/// Rejections from [`normalize_path`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("empty path")]
    EmptyPath,
    #[error("path escapes the workspace root: {0}")]
    Escapes(String),
    #[error("path has an invalid component: {0}")]
    InvalidComponent(String),
}

/// Decode every headed fenced block in `text`.
///
/// - A header is the last non-blank line before an opening fence.
/// - A header not followed by a fence before the next header is dropped.
/// - Fenced blocks without a header are skipped (their content is never
///   scanned for headers).
/// - A missing closing fence takes the rest of the input as content.
/// - Duplicate paths, compared after [`normalize_path`], keep the position of
///   the first block and the content of the last.
pub fn decode(text: &str) -> Vec<FileBlock> {
    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let mut blocks: Vec<FileBlock> = Vec::new();
    let mut header: Option<String> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx];
        if let Some(tag) = opening_fence(line) {
            let (content, next) = read_block(&lines, idx + 1);
            if let Some(path) = header.take() {
                let language = (!tag.is_empty()).then(|| tag.to_string());
                upsert(
                    &mut blocks,
                    FileBlock {
                        path,
                        language,
                        content,
                    },
                );
            }
            idx = next;
            continue;
        }
        if !line.trim().is_empty() {
            header = parse_header(line);
        }
        idx += 1;
    }

    blocks
}

/// Encode files as tagged blocks, in the given order.
pub fn encode<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::new();
    for (path, content) in files {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&encode_block(path, content));
    }
    out
}

/// Encode a single file block. The newline before the closing fence is framing,
/// so [`decode`] returns `content` byte-for-byte.
pub fn encode_block(path: &str, content: &str) -> String {
    let mut out = String::with_capacity(path.len() + content.len() + 16);
    out.push_str(path);
    out.push_str("\n```");
    out.push_str(language_for(path));
    out.push('\n');
    out.push_str(content);
    out.push_str("\n```\n");
    out
}

/// Fence tag for a path, from its file name or extension. Unknown -> `""`.
pub fn language_for(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name {
        "Dockerfile" => return "dockerfile",
        "Makefile" | "makefile" | "GNUmakefile" => return "makefile",
        _ => {}
    }
    let Some((_, ext)) = name.rsplit_once('.') else {
        return "";
    };
    match ext.to_ascii_lowercase().as_str() {
        "rs" => "rust",
        "py" => "python",
        "js" | "mjs" | "cjs" => "javascript",
        "jsx" => "jsx",
        "ts" => "typescript",
        "tsx" => "tsx",
        "go" => "go",
        "java" => "java",
        "kt" | "kts" => "kotlin",
        "scala" => "scala",
        "c" | "h" => "c",
        "cc" | "cpp" | "cxx" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "sh" | "bash" => "bash",
        "zsh" => "zsh",
        "ps1" => "powershell",
        "sql" => "sql",
        "html" | "htm" => "html",
        "css" => "css",
        "scss" => "scss",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "md" => "markdown",
        _ => "",
    }
}

/// Contents of every fenced block in `text`, headers ignored, joined by `\n`.
pub fn extract_code_blocks(text: &str) -> String {
    static CODE_BLOCK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").unwrap());

    CODE_BLOCK_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Normalize a model-supplied path to a clean relative path.
///
/// Leading `/` and `.` components are clamped away; `..` may only cancel a
/// preceding component.
pub fn normalize_path(raw: &str) -> Result<String, CodecError> {
    let unified = raw.trim().replace('\\', "/");
    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(CodecError::Escapes(raw.to_string()));
                }
            }
            p if p.contains(':') || p.chars().any(char::is_control) => {
                return Err(CodecError::InvalidComponent(raw.to_string()));
            }
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return Err(CodecError::EmptyPath);
    }
    Ok(parts.join("/"))
}

/// Identity of a block's target file. Rejected paths compare raw so the write
/// side still reports them.
fn dedup_key(path: &str) -> String {
    normalize_path(path).unwrap_or_else(|_| path.to_string())
}

fn upsert(blocks: &mut Vec<FileBlock>, block: FileBlock) {
    let key = dedup_key(&block.path);
    match blocks.iter_mut().find(|b| dedup_key(&b.path) == key) {
        Some(existing) => *existing = block,
        None => blocks.push(block),
    }
}

/// Return the tag of an opening fence line (`""` for a bare fence).
fn opening_fence(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let ticks = trimmed.chars().take_while(|c| *c == '`').count();
    if ticks < 3 {
        return None;
    }
    let rest = trimmed[ticks..].trim();
    if rest.contains('`') {
        return None;
    }
    Some(rest.split_whitespace().next().unwrap_or(""))
}

fn is_closing_fence(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 3 && trimmed.chars().all(|c| c == '`')
}

/// Collect block content starting at `start`. Returns content and next line index.
fn read_block(lines: &[&str], start: usize) -> (String, usize) {
    for (offset, line) in lines[start..].iter().enumerate() {
        if is_closing_fence(line) {
            let end = start + offset;
            let mut content = lines[start..end].concat();
            if content.ends_with("\r\n") {
                content.truncate(content.len() - 2);
            } else if content.ends_with('\n') {
                content.truncate(content.len() - 1);
            }
            return (content, end + 1);
        }
    }
    (lines[start..].concat(), lines.len())
}

/// Strip decoration from a candidate header line and return the path, if any.
fn parse_header(line: &str) -> Option<String> {
    let cleaned = strip_decoration(line.trim().trim_start_matches('#'));
    if cleaned.is_empty() {
        return None;
    }
    if !cleaned.contains(char::is_whitespace) {
        return (!cleaned.contains('`')).then(|| cleaned.to_string());
    }
    // Prose around the name ("Here is `main.py`:"): keep the last path-like token.
    cleaned
        .split_whitespace()
        .rev()
        .map(|token| strip_decoration(token).trim_end_matches(['.', ',', ';']))
        .find(|token| is_path_like(token))
        .map(str::to_string)
}

fn is_path_like(token: &str) -> bool {
    !token.is_empty()
        && !token.contains('`')
        && (token.contains('/') || token.trim_start_matches('.').contains('.'))
}

fn strip_decoration(raw: &str) -> &str {
    const PAIRS: [(&str, &str); 9] = [
        ("**", "**"),
        ("__", "__"),
        ("*", "*"),
        ("_", "_"),
        ("`", "`"),
        ("\"", "\""),
        ("'", "'"),
        ("[", "]"),
        ("<", ">"),
    ];
    const LABELS: [&str; 3] = ["filename:", "file:", "path:"];

    let mut s = raw.trim();
    loop {
        let before = s;
        s = s.trim().trim_end_matches(':').trim();
        for prefix in ["- ", "* ", "+ "] {
            if let Some(rest) = s.strip_prefix(prefix) {
                s = rest.trim();
            }
        }
        for label in LABELS {
            let matches = s.len() > label.len()
                && s.get(..label.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(label));
            if matches {
                s = s[label.len()..].trim();
            }
        }
        for (open, close) in PAIRS {
            if s.len() > open.len() + close.len() && s.starts_with(open) && s.ends_with(close) {
                s = &s[open.len()..s.len() - close.len()];
            }
        }
        if s == before {
            return s;
        }
    }
}
