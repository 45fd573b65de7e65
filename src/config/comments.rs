use std::path::Path;

use anyhow::{Context, Result};
use regex::Regex;

use crate::il::expr::Comments;
use crate::il::node::{Graph, ModuleId};

// ─── Comment extraction ─────────────────────────────────────────────────────

/// Which top-level block a comment run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum BlockKey {
    Provider(String),
    Resource(String, String),
    Data(String, String),
    Module(String),
    Variable(String),
    Local(String),
    Output(String),
}

/// Reparse the module's .tf sources and attach leading/trailing comments to
/// the bound top-level nodes. This is a line-oriented scan, deliberately
/// tolerant: a file it cannot make sense of contributes nothing.
pub fn attach_comments(graph: &mut Graph, module: ModuleId, dir: &Path) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Cannot re-read module directory: {}", dir.display()))?;
    let mut tf_files: Vec<_> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "tf").unwrap_or(false))
        .collect();
    tf_files.sort();

    let mut found = Vec::new();
    for file in &tf_files {
        let content = std::fs::read_to_string(file)
            .with_context(|| format!("Cannot re-read {}", file.display()))?;
        scan_file(&content, &mut found);
    }

    for (key, comments) in found {
        if comments.is_empty() {
            continue;
        }
        let id = {
            let m = graph.module(module);
            match &key {
                BlockKey::Provider(name) => m.providers.get(name).copied(),
                BlockKey::Resource(ty, name) => m.resources.get(&format!("{}.{}", ty, name)).copied(),
                BlockKey::Data(ty, name) => {
                    m.resources.get(&format!("data.{}.{}", ty, name)).copied()
                }
                BlockKey::Module(name) => m.modules.get(name).copied(),
                BlockKey::Variable(name) => m.variables.get(name).copied(),
                BlockKey::Local(name) => m.locals.get(name).copied(),
                BlockKey::Output(name) => m.outputs.get(name).copied(),
            }
        };
        match id {
            Some(id) => graph.node_mut(id).set_comments(comments),
            None => tracing::warn!("Comment target not found in graph: {:?}", key),
        }
    }

    Ok(())
}

fn scan_file(content: &str, found: &mut Vec<(BlockKey, Comments)>) {
    let two_label = Regex::new(r#"^\s*(resource|data)\s+"([^"]+)"\s+"([^"]+)"\s*\{"#).unwrap();
    let one_label =
        Regex::new(r#"^\s*(provider|variable|output|module)\s+"([^"]+)"\s*\{"#).unwrap();
    let locals_open = Regex::new(r"^\s*locals\s*\{").unwrap();
    let attribute = Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_-]*)\s*=").unwrap();

    let mut pending: Vec<String> = Vec::new();
    let mut depth: i32 = 0;
    let mut in_locals_at: Option<i32> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(comment) = leading_comment(trimmed) {
            pending.push(comment.to_string());
            continue;
        }
        if trimmed.is_empty() {
            pending.clear();
            continue;
        }

        let key = if depth == 0 {
            if let Some(caps) = two_label.captures(line) {
                let ty = caps[2].to_string();
                let name = caps[3].to_string();
                match &caps[1] {
                    "data" => Some(BlockKey::Data(ty, name)),
                    _ => Some(BlockKey::Resource(ty, name)),
                }
            } else if let Some(caps) = one_label.captures(line) {
                let name = caps[2].to_string();
                match &caps[1] {
                    "provider" => Some(BlockKey::Provider(name)),
                    "variable" => Some(BlockKey::Variable(name)),
                    "output" => Some(BlockKey::Output(name)),
                    _ => Some(BlockKey::Module(name)),
                }
            } else {
                if locals_open.is_match(line) {
                    in_locals_at = Some(depth);
                }
                None
            }
        } else if in_locals_at == Some(depth - 1) {
            attribute
                .captures(line)
                .map(|caps| BlockKey::Local(caps[1].to_string()))
        } else {
            None
        };

        if let Some(key) = key {
            let comments = Comments {
                leading: std::mem::take(&mut pending),
                trailing: trailing_comment(line).into_iter().collect(),
            };
            found.push((key, comments));
        } else {
            pending.clear();
        }

        depth += brace_delta(line);
        if depth == 0 {
            in_locals_at = None;
        }
    }
}

fn leading_comment(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix('#')
        .or_else(|| trimmed.strip_prefix("//"))
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

fn trailing_comment(line: &str) -> Option<String> {
    // Only look outside quoted strings.
    let mut in_string = false;
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'#' if !in_string => {
                return Some(
                    line[i + 1..]
                        .strip_prefix(' ')
                        .unwrap_or(&line[i + 1..])
                        .to_string(),
                );
            }
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => {
                return Some(
                    line[i + 2..]
                        .strip_prefix(' ')
                        .unwrap_or(&line[i + 2..])
                        .to_string(),
                );
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Net brace depth change for a line, ignoring braces inside strings and
/// comments. Interpolation braces inside strings are skipped with the string.
fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b'{' if !in_string => delta += 1,
            b'}' if !in_string => delta -= 1,
            b'#' if !in_string => break,
            b'/' if !in_string && i + 1 < bytes.len() && bytes[i + 1] == b'/' => break,
            _ => {}
        }
        i += 1;
    }
    delta
}
