use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tree_sitter::Node;

/// Extract UTF-8 text from a tree-sitter node, returning `""` on failure.
pub fn txt<'a>(node: Node, src: &'a [u8]) -> &'a str {
    node.utf8_text(src).unwrap_or("")
}

/// Strip surrounding quotes (`'`, `"`, `` ` ``) from a string literal.
pub fn trim_quotes(s: &str) -> &str {
    s.trim_matches(|c: char| c == '\'' || c == '"' || c == '`')
}

/// Value of a string literal node.
///
/// Accepts quoted strings and template strings without substitutions; any
/// other node (including interpolated templates) yields `None`.
pub fn string_literal(node: Node, src: &[u8]) -> Option<String> {
    match node.kind() {
        "string" => Some(trim_quotes(txt(node, src)).to_string()),
        "template_string" => {
            let mut cursor = node.walk();
            let interpolated = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "template_substitution");
            if interpolated {
                None
            } else {
                Some(trim_quotes(txt(node, src)).to_string())
            }
        }
        _ => None,
    }
}

/// Canonical absolute path with forward slashes, used as every map key.
///
/// Falls back to a lexically normalized path when the file does not exist.
pub fn canonical_posix(path: &Path) -> String {
    let abs = std::fs::canonicalize(path).unwrap_or_else(|_| lexical_normalize(path));
    abs.to_string_lossy().replace('\\', "/")
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Normalize an HTTP path: drop origin, query and fragment, force a leading
/// slash, collapse repeated slashes and drop a trailing slash.
pub fn normalize_http_path(value: &str) -> String {
    let no_query = value.split('?').next().unwrap_or(value);
    let no_hash = no_query.split('#').next().unwrap_or(no_query);
    let without_origin = strip_origin(no_hash.trim());

    let mut out = String::with_capacity(without_origin.len() + 1);
    out.push('/');
    for segment in without_origin.split('/').filter(|s| !s.is_empty()) {
        if out.len() > 1 {
            out.push('/');
        }
        out.push_str(segment);
    }
    out
}

fn strip_origin(value: &str) -> &str {
    for scheme in ["http://", "https://"] {
        if let Some(rest) = value.strip_prefix(scheme) {
            return rest.find('/').map_or("", |i| &rest[i..]);
        }
    }
    value
}

/// Join a mount prefix and a child path without doubling or dangling slashes.
pub fn join_http_paths(left: &str, right: &str) -> String {
    let l = normalize_http_path(left);
    let r = normalize_http_path(right);
    if l == "/" {
        return r;
    }
    if r == "/" {
        return l;
    }
    format!("{l}{r}")
}

/// Split a normalized HTTP path into its non-empty segments.
pub fn http_segments(path: &str) -> Vec<String> {
    normalize_http_path(path)
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Find the git repository root for a directory.
pub fn git_root(dir: &Path) -> Option<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(PathBuf::from(root))
}
