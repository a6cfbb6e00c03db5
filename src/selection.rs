use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use tracing::warn;

use crate::search::{ContentSearch, PatternMode, SearchQuery};
use crate::util::{canonical_posix, normalize_http_path};

pub const TEST_FILE_GLOBS: &[&str] = &[
    "**/*.{test,spec}.{ts,tsx,js,jsx,mjs,cjs}",
    "**/__tests__/**/*.{ts,tsx,js,jsx}",
    "tests/**/*.{ts,tsx,js,jsx}",
];

/// Literal strings a test is likely to contain when it exercises `http_path`.
///
/// `/users/:id/posts` expands to itself, the prefix before the first
/// parameter (`/users/`, `/users`) and the parent path (`/users/:id`).
pub fn expand_http_search_tokens(http_path: &str) -> Vec<String> {
    let normalized = normalize_http_path(http_path);
    let mut tokens = vec![normalized.clone()];

    if let Some(param_at) = normalized.find("/:") {
        let prefix = &normalized[..param_at];
        tokens.push(format!("{prefix}/"));
        tokens.push(prefix.to_string());
    }
    if let Some(last_slash) = normalized.rfind('/').filter(|i| *i > 0) {
        let parent = &normalized[..last_slash];
        tokens.push(parent.to_string());
        tokens.push(format!("{parent}/"));
    }

    let mut seen = BTreeSet::new();
    tokens
        .into_iter()
        .filter(|t| t.len() > 1)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// Canonical paths of test files mentioning any token of any path in `http_paths`.
pub fn discover_tests_for_http_paths(
    search: &dyn ContentSearch,
    repo_root: &Path,
    http_paths: &[String],
    exclude_globs: &[String],
    timeout: Duration,
) -> Vec<String> {
    let tokens: Vec<String> = http_paths
        .iter()
        .flat_map(|p| expand_http_search_tokens(p))
        .collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let query = SearchQuery {
        root: repo_root.to_path_buf(),
        patterns: tokens,
        mode: PatternMode::Fixed,
        include_globs: TEST_FILE_GLOBS.iter().map(|g| g.to_string()).collect(),
        exclude_globs: exclude_globs.to_vec(),
        timeout,
    };
    match search.files_with_matches(&query) {
        Ok(files) => {
            let found: BTreeSet<String> = files.iter().map(|f| canonical_posix(f)).collect();
            found.into_iter().collect()
        }
        Err(e) => {
            warn!(root = %repo_root.display(), error = %e, "test discovery failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::WalkSearch;
    use std::fs;

    #[test]
    fn tokens_for_param_route() {
        assert_eq!(
            expand_http_search_tokens("/users/:id/posts"),
            vec!["/users/:id/posts", "/users/", "/users", "/users/:id", "/users/:id/"]
        );
    }

    #[test]
    fn tokens_for_plain_route() {
        assert_eq!(
            expand_http_search_tokens("/api/health/"),
            vec!["/api/health", "/api", "/api/"]
        );
    }

    #[test]
    fn root_route_has_no_tokens() {
        assert!(expand_http_search_tokens("/").is_empty());
    }

    #[test]
    fn finds_tests_mentioning_route() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/__tests__")).unwrap();
        fs::create_dir_all(dir.path().join("src/routes")).unwrap();
        fs::write(
            dir.path().join("src/__tests__/users.test.ts"),
            "await request(app).get('/users/42');",
        )
        .unwrap();
        fs::write(dir.path().join("src/orders.spec.js"), "get('/orders')").unwrap();
        fs::write(dir.path().join("src/routes/users.js"), "router.get('/users/:id', h)").unwrap();

        let found = discover_tests_for_http_paths(
            &WalkSearch,
            dir.path(),
            &["/users/:id".to_string()],
            &[],
            Duration::from_secs(5),
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("src/__tests__/users.test.ts"));
    }
}
