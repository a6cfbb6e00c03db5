use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::RegexSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::RouteError;

/// Globs for files that may register routes.
pub const SOURCE_FILE_GLOBS: &[&str] = &["**/*.{ts,tsx,js,jsx,mjs,cjs,mts,cts}"];

/// Lines that look like a router or app registration.
pub const ROUTE_CANDIDATE_PATTERNS: &[&str] = &[
    r"express\.Router\(",
    r"\bRouter\(",
    r"\bexpress\(",
    r"\.(use|route|all|get|post|put|delete|patch|options|head)\(",
];

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternMode {
    Regex,
    /// Literal, smart-case.
    Fixed,
}

/// One files-with-matches query.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub root: PathBuf,
    pub patterns: Vec<String>,
    pub mode: PatternMode,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub timeout: Duration,
}

impl SearchQuery {
    /// Candidate route files under `root`.
    pub fn route_candidates(root: &Path, exclude_globs: &[String], timeout: Duration) -> Self {
        Self {
            root: root.to_path_buf(),
            patterns: ROUTE_CANDIDATE_PATTERNS.iter().map(|p| p.to_string()).collect(),
            mode: PatternMode::Regex,
            include_globs: SOURCE_FILE_GLOBS.iter().map(|g| g.to_string()).collect(),
            exclude_globs: exclude_globs.to_vec(),
            timeout,
        }
    }
}

/// Anything that can list files whose contents match a query.
pub trait ContentSearch: Send + Sync {
    /// Absolute paths of matching files, sorted.
    fn files_with_matches(&self, query: &SearchQuery) -> Result<Vec<PathBuf>, RouteError>;
}

// --- ripgrep ---

#[derive(Debug, Clone)]
pub struct RipgrepSearch {
    binary: PathBuf,
}

impl RipgrepSearch {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn args(query: &SearchQuery) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--no-messages".to_string(),
            "--color".to_string(),
            "never".to_string(),
            "--files-with-matches".to_string(),
        ];
        if query.mode == PatternMode::Fixed {
            args.push("-F".to_string());
            args.push("-S".to_string());
        }
        for glob in &query.include_globs {
            args.push("-g".to_string());
            args.push(glob.clone());
        }
        for exclude in &query.exclude_globs {
            args.push("-g".to_string());
            args.push(format!("!{exclude}"));
        }
        for pattern in &query.patterns {
            args.push("-e".to_string());
            args.push(pattern.clone());
        }
        args.push(query.root.to_string_lossy().to_string());
        args
    }
}

impl ContentSearch for RipgrepSearch {
    fn files_with_matches(&self, query: &SearchQuery) -> Result<Vec<PathBuf>, RouteError> {
        if query.patterns.is_empty() {
            return Ok(Vec::new());
        }

        let mut child = Command::new(&self.binary)
            .args(Self::args(query))
            .current_dir(&query.root)
            .env("CI", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| RouteError::Search(format!("spawn {}: {e}", self.binary.display())))?;

        // Drain stdout on a separate thread so a full pipe cannot stall the child.
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| RouteError::Search("stdout not captured".to_string()))?;
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            let _ = stdout.read_to_string(&mut buf);
            buf
        });

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if started.elapsed() >= query.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    let _ = reader.join();
                    warn!(
                        root = %query.root.display(),
                        timeout_ms = query.timeout.as_millis() as u64,
                        "content search timed out"
                    );
                    return Err(RouteError::SearchTimeout {
                        timeout: query.timeout,
                    });
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(RouteError::Search(format!("wait: {e}")));
                }
            }
        };

        let output = reader
            .join()
            .map_err(|_| RouteError::Search("stdout reader panicked".to_string()))?;

        // Exit 1 means no matches; 2 means errors, but matches found so far are still listed.
        if status.code() == Some(2) && output.trim().is_empty() {
            return Err(RouteError::Search(format!("{} exited with status 2", self.binary.display())));
        }

        let mut files: Vec<PathBuf> = output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|rel_or_abs| query.root.join(rel_or_abs))
            .collect();
        files.sort();
        files.dedup();
        debug!(count = files.len(), "ripgrep candidates");
        Ok(files)
    }
}

// --- in-process walk ---

/// Directory walk with glob filtering and regex or literal matching.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSearch;

enum Matcher {
    Regex(RegexSet),
    Fixed(Vec<(String, bool)>),
}

impl Matcher {
    fn new(query: &SearchQuery) -> Result<Self, RouteError> {
        match query.mode {
            PatternMode::Regex => RegexSet::new(&query.patterns)
                .map(Matcher::Regex)
                .map_err(|e| RouteError::Search(format!("invalid pattern: {e}"))),
            PatternMode::Fixed => Ok(Matcher::Fixed(
                query
                    .patterns
                    .iter()
                    .map(|p| {
                        // Smart case: any uppercase makes the literal case-sensitive.
                        let sensitive = p.chars().any(char::is_uppercase);
                        let needle = if sensitive { p.clone() } else { p.to_lowercase() };
                        (needle, sensitive)
                    })
                    .collect(),
            )),
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Regex(set) => set.is_match(text),
            Matcher::Fixed(needles) => {
                let lowered = text.to_lowercase();
                needles.iter().any(|(needle, sensitive)| {
                    if *sensitive {
                        text.contains(needle.as_str())
                    } else {
                        lowered.contains(needle.as_str())
                    }
                })
            }
        }
    }
}

fn glob_set(globs: &[String]) -> Result<GlobSet, RouteError> {
    let mut builder = GlobSetBuilder::new();
    for glob in globs {
        let glob = Glob::new(glob).map_err(|e| RouteError::InvalidGlob(format!("{glob}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| RouteError::InvalidGlob(e.to_string()))
}

fn relative_posix(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

impl ContentSearch for WalkSearch {
    fn files_with_matches(&self, query: &SearchQuery) -> Result<Vec<PathBuf>, RouteError> {
        if query.patterns.is_empty() {
            return Ok(Vec::new());
        }
        let include = glob_set(&query.include_globs)?;
        let exclude = glob_set(&query.exclude_globs)?;
        let matcher = Matcher::new(query)?;
        let started = Instant::now();
        let root = query.root.as_path();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if entry.depth() == 0 || !entry.file_type().is_dir() {
                    return true;
                }
                let hidden = entry.file_name().to_string_lossy().starts_with('.');
                // A directory is pruned when anything inside it would be excluded.
                let probe = format!("{}/_", relative_posix(root, entry.path()));
                !hidden && !exclude.is_match(&probe)
            });

        let mut files = Vec::new();
        for entry in walker {
            if started.elapsed() >= query.timeout {
                warn!(
                    root = %root.display(),
                    timeout_ms = query.timeout.as_millis() as u64,
                    "content search timed out"
                );
                return Err(RouteError::SearchTimeout {
                    timeout: query.timeout,
                });
            }
            let Ok(entry) = entry else {
                continue;
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = relative_posix(root, entry.path());
            if (!query.include_globs.is_empty() && !include.is_match(&rel)) || exclude.is_match(&rel) {
                continue;
            }
            let Ok(text) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if matcher.is_match(&text) {
                files.push(entry.into_path());
            }
        }
        files.sort();
        debug!(count = files.len(), "walk candidates");
        Ok(files)
    }
}

/// Primary search with a fallback used when the primary fails for any reason
/// other than running out of time.
pub struct FallbackSearch<P, S> {
    primary: P,
    secondary: S,
}

impl<P, S> FallbackSearch<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }
}

impl<P: ContentSearch, S: ContentSearch> ContentSearch for FallbackSearch<P, S> {
    fn files_with_matches(&self, query: &SearchQuery) -> Result<Vec<PathBuf>, RouteError> {
        match self.primary.files_with_matches(query) {
            Err(RouteError::Search(reason)) => {
                debug!(%reason, "primary search unavailable, walking the tree");
                self.secondary.files_with_matches(query)
            }
            other => other,
        }
    }
}

/// `rg` when available, otherwise the in-process walk.
pub fn default_search(binary: &Path) -> FallbackSearch<RipgrepSearch, WalkSearch> {
    FallbackSearch::new(RipgrepSearch::new(binary), WalkSearch)
}
