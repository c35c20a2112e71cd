//! Builtin file skills: read, write, edit, list and search.
//!
//! These run with the agent's own permissions; they are not sandboxed.
//! Every I/O failure is reported as text so the model can react to it,
//! and only malformed calls surface as `Err`.

use std::io::ErrorKind;
use std::path::Path;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::skills::{Skill, SkillContext};

/// Lines shown by read_file when no window is requested.
const MAX_FILE_LINES: usize = 500;

/// Longer lines are cut in read_file output.
const MAX_LINE_LENGTH: usize = 500;

/// Entries returned by list_files.
const MAX_LIST_ENTRIES: usize = 100;

/// Matches returned by search_files.
const MAX_SEARCH_RESULTS: usize = 50;

/// Longer matching lines are cut in search_files output.
const MAX_MATCH_LINE_LENGTH: usize = 200;

/// Directory names never descended into by list/search.
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "venv", ".git"];

fn required_str<'a>(params: &'a Value, key: &str) -> anyhow::Result<&'a str> {
    params[key]
        .as_str()
        .ok_or_else(|| anyhow!("Missing required parameter: {key}"))
}

fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params[key].as_str().filter(|s| !s.is_empty())
}

/// Cuts `line` to `max` characters, marking the cut with "...".
fn clip_line(line: &str, max: usize) -> String {
    if line.chars().count() > max {
        let mut clipped: String = line.chars().take(max).collect();
        clipped.push_str("...");
        clipped
    } else {
        line.to_string()
    }
}

fn is_hidden_or_skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// Walks files under `root`, pruning hidden and skipped directories,
/// sorted by relative path.
fn walk_files(root: &Path) -> Vec<DirEntry> {
    let mut files: Vec<DirEntry> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden_or_skipped(&e.file_name().to_string_lossy()))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));
    files
}

fn parse_glob(pattern: Option<&str>) -> Result<Option<glob::Pattern>, String> {
    pattern
        .map(|p| glob::Pattern::new(p).map_err(|e| format!("Error: Invalid pattern '{p}': {e}")))
        .transpose()
}

// ── read_file ──────────────────────────────────────────

pub struct ReadFileSkill;

/// Numbers the selected window of `content`, 1-based.
fn render_lines(content: &str, offset: Option<usize>, limit: Option<usize>) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    let start = offset.map(|o| o.saturating_sub(1)).unwrap_or(0).min(total);
    let end = match (offset, limit) {
        (_, Some(limit)) => start.saturating_add(limit).min(total),
        (None, None) if total > MAX_FILE_LINES => MAX_FILE_LINES,
        _ => total,
    };

    let mut result = lines[start..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:4} | {}", start + i + 1, clip_line(line, MAX_LINE_LENGTH)))
        .collect::<Vec<_>>()
        .join("\n");

    if end < total {
        result.push_str(&format!(
            "\n\n[Showing lines {}-{end} of {total} total]\nUse read_file with offset={} to see more.",
            start + 1,
            end + 1
        ));
    }
    result
}

#[async_trait]
impl Skill for ReadFileSkill {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Returns content with line numbers. Large files are \
         automatically truncated. Use offset/limit to read specific sections."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to read"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed). Optional."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read. Optional."
                }
            },
            "required": ["path"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem:read".to_string()]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> anyhow::Result<String> {
        let path = required_str(&params, "path")?;
        let offset = params["offset"].as_u64().map(|n| n as usize);
        let limit = params["limit"].as_u64().map(|n| n as usize);

        let bytes = match tokio::fs::read(context.resolve(path)).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return Ok(match e.kind() {
                    ErrorKind::NotFound => format!("Error: File not found: {path}"),
                    ErrorKind::PermissionDenied => format!("Error: Permission denied: {path}"),
                    _ => format!("Error reading file: {e}"),
                })
            }
        };

        let Ok(content) = String::from_utf8(bytes) else {
            return Ok(format!("Error: Cannot read binary file: {path}"));
        };

        debug!("read_file {path} ({} bytes)", content.len());
        Ok(render_lines(&content, offset, limit))
    }
}

// ── write_file ─────────────────────────────────────────

pub struct WriteFileSkill;

#[async_trait]
impl Skill for WriteFileSkill {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a new file. Creates parent directories if needed. \
         For editing existing files, prefer edit_file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem:write".to_string()]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> anyhow::Result<String> {
        let path = required_str(&params, "path")?;
        let content = required_str(&params, "content")?;
        let target = context.resolve(path);

        let written = async {
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, content).await
        }
        .await;

        Ok(match written {
            Ok(()) => {
                let lines = content.matches('\n').count() + 1;
                format!(
                    "Successfully wrote {} bytes ({lines} lines) to {path}",
                    content.len()
                )
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                format!("Error: Permission denied: {path}")
            }
            Err(e) => format!("Error writing file: {e}"),
        })
    }
}

// ── edit_file ──────────────────────────────────────────

pub struct EditFileSkill;

#[async_trait]
impl Skill for EditFileSkill {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit an existing file by replacing a specific string. The old_string must match \
         exactly and appear only once. Use for surgical edits instead of rewriting entire files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file to edit"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact string to find and replace. Must match exactly once."
                },
                "new_string": {
                    "type": "string",
                    "description": "The string to replace it with"
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem:read".to_string(), "filesystem:write".to_string()]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> anyhow::Result<String> {
        let path = required_str(&params, "path")?;
        let old_string = required_str(&params, "old_string")?;
        let new_string = required_str(&params, "new_string")?;
        let target = context.resolve(path);

        if old_string.is_empty() {
            return Ok("Error: old_string must not be empty.".to_string());
        }

        let content = match tokio::fs::read_to_string(&target).await {
            Ok(content) => content,
            Err(e) => {
                return Ok(match e.kind() {
                    ErrorKind::NotFound => format!("Error: File not found: {path}"),
                    ErrorKind::PermissionDenied => format!("Error: Permission denied: {path}"),
                    _ => format!("Error editing file: {e}"),
                })
            }
        };

        match content.matches(old_string).count() {
            0 => {
                return Ok(format!(
                    "Error: Could not find the specified text in {path}. \
                     Make sure old_string matches exactly."
                ))
            }
            1 => {}
            count => {
                return Ok(format!(
                    "Error: Found {count} occurrences. Please provide a more specific old_string."
                ))
            }
        }

        let updated = content.replacen(old_string, new_string, 1);
        if let Err(e) = tokio::fs::write(&target, updated).await {
            return Ok(match e.kind() {
                ErrorKind::PermissionDenied => format!("Error: Permission denied: {path}"),
                _ => format!("Error editing file: {e}"),
            });
        }

        let old_lines = old_string.matches('\n').count() + 1;
        let new_lines = new_string.matches('\n').count() + 1;
        Ok(format!(
            "Successfully edited {path}: replaced {old_lines} line(s) with {new_lines} line(s)"
        ))
    }
}

// ── list_files ─────────────────────────────────────────

pub struct ListFilesSkill;

fn list_entries(root: &Path, recursive: bool, pattern: Option<&glob::Pattern>) -> std::io::Result<Vec<String>> {
    let matches = |name: &str| pattern.map_or(true, |p| p.matches(name));

    if recursive {
        return Ok(walk_files(root)
            .into_iter()
            .filter(|e| matches(&e.file_name().to_string_lossy()))
            .filter_map(|e| {
                e.path()
                    .strip_prefix(root)
                    .ok()
                    .map(|rel| rel.to_string_lossy().into_owned())
            })
            .collect());
    }

    let mut dir_entries = std::fs::read_dir(root)?.collect::<std::io::Result<Vec<_>>>()?;
    dir_entries.sort_by_key(|e| e.file_name());

    let mut entries = Vec::new();
    for entry in dir_entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !matches(&name) {
            continue;
        }
        if entry.path().is_dir() {
            entries.push(format!("{name}/"));
        } else {
            entries.push(name);
        }
    }
    Ok(entries)
}

#[async_trait]
impl Skill for ListFilesSkill {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a directory. Supports recursive listing and glob pattern filtering."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (defaults to current directory)",
                    "default": "."
                },
                "recursive": {
                    "type": "boolean",
                    "description": "If true, list files recursively",
                    "default": false
                },
                "pattern": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g., '*.py', '*.js')"
                }
            },
            "required": []
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem:read".to_string()]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> anyhow::Result<String> {
        let path = optional_str(&params, "path").unwrap_or(".").to_string();
        let recursive = params["recursive"].as_bool().unwrap_or(false);
        let pattern_str = optional_str(&params, "pattern").map(str::to_string);
        let pattern = match parse_glob(pattern_str.as_deref()) {
            Ok(p) => p,
            Err(message) => return Ok(message),
        };

        let root = context.resolve(&path);
        if !root.exists() {
            return Ok(format!("Error: Directory not found: {path}"));
        }
        if !root.is_dir() {
            return Ok(format!("Error: Not a directory: {path}"));
        }

        let listed =
            tokio::task::spawn_blocking(move || list_entries(&root, recursive, pattern.as_ref()))
                .await?;
        let mut entries = match listed {
            Ok(entries) => entries,
            Err(e) => return Ok(format!("Error listing directory: {e}")),
        };

        if entries.is_empty() {
            let suffix = pattern_str
                .map(|p| format!(" matching '{p}'"))
                .unwrap_or_default();
            return Ok(format!("No files found in {path}{suffix}"));
        }

        if entries.len() > MAX_LIST_ENTRIES {
            entries.truncate(MAX_LIST_ENTRIES);
            entries.push(format!("... and more files (limited to {MAX_LIST_ENTRIES})"));
        }

        Ok(entries.join("\n"))
    }
}

// ── search_files ───────────────────────────────────────

pub struct SearchFilesSkill;

fn search(root: &Path, needle: &str, file_pattern: Option<&glob::Pattern>) -> String {
    let needle_lower = needle.to_lowercase();
    let mut results = Vec::new();
    let mut files_searched = 0usize;

    for entry in walk_files(root) {
        if let Some(p) = file_pattern {
            if !p.matches(&entry.file_name().to_string_lossy()) {
                continue;
            }
        }

        // Unreadable and binary files are skipped
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };
        files_searched += 1;

        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();

        for (i, line) in content.lines().enumerate() {
            if !line.to_lowercase().contains(&needle_lower) {
                continue;
            }
            let shown = clip_line(line.trim_end(), MAX_MATCH_LINE_LENGTH);
            results.push(format!("{rel}:{}: {shown}", i + 1));
            if results.len() >= MAX_SEARCH_RESULTS {
                results.push(format!("\n... (stopped at {MAX_SEARCH_RESULTS} results)"));
                return results.join("\n");
            }
        }
    }

    if results.is_empty() {
        return format!("No matches found for '{needle}' in {files_searched} files");
    }
    results.join("\n")
}

#[async_trait]
impl Skill for SearchFilesSkill {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search for a text pattern across files. Returns matching lines with file paths \
         and line numbers. Great for finding function definitions, usages, etc."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to search in",
                    "default": "."
                },
                "pattern": {
                    "type": "string",
                    "description": "Text pattern to search for (case-insensitive)"
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Optional glob pattern to filter files (e.g., '*.py')"
                }
            },
            "required": ["pattern"]
        })
    }

    fn capabilities(&self) -> Vec<String> {
        vec!["filesystem:read".to_string()]
    }

    async fn execute(&self, params: Value, context: &SkillContext) -> anyhow::Result<String> {
        let needle = required_str(&params, "pattern")?.to_string();
        let path = optional_str(&params, "path").unwrap_or(".");
        let file_pattern = match parse_glob(optional_str(&params, "file_pattern")) {
            Ok(p) => p,
            Err(message) => return Ok(message),
        };

        let root = context.resolve(path);
        if !root.is_dir() {
            return Ok(format!("Error searching: {path} is not a directory"));
        }

        let result =
            tokio::task::spawn_blocking(move || search(&root, &needle, file_pattern.as_ref()))
                .await?;
        Ok(result)
    }
}
