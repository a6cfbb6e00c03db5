use std::path::PathBuf;
use std::time::Duration;

/// Paths never worth scanning for route registrations.
pub const DEFAULT_EXCLUDE_GLOBS: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/.next/**",
    "**/coverage/**",
];

const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Knobs for one route index build.
#[derive(Debug, Clone)]
pub struct IndexOptions {
    /// Content search executable (ripgrep compatible).
    pub search_binary: PathBuf,
    /// Budget for each external search call.
    pub search_timeout: Duration,
    pub exclude_globs: Vec<String>,
    /// Analyze candidate files on the rayon pool.
    pub parallel: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            search_binary: PathBuf::from("rg"),
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            exclude_globs: DEFAULT_EXCLUDE_GLOBS.iter().map(|g| g.to_string()).collect(),
            parallel: true,
        }
    }
}

impl IndexOptions {
    /// Defaults overridden by `ROUTESCOPE_RG` and `ROUTESCOPE_SEARCH_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(bin) = std::env::var("ROUTESCOPE_RG") {
            if !bin.trim().is_empty() {
                options.search_binary = PathBuf::from(bin.trim());
            }
        }
        if let Ok(raw) = std::env::var("ROUTESCOPE_SEARCH_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) => options.search_timeout = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid ROUTESCOPE_SEARCH_TIMEOUT_MS"),
            }
        }
        options
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_node_modules() {
        let options = IndexOptions::default();
        assert!(options
            .exclude_globs
            .iter()
            .any(|g| g == "**/node_modules/**"));
        assert!(options.parallel);
        assert_eq!(options.search_timeout, DEFAULT_SEARCH_TIMEOUT);
    }

    #[test]
    fn with_timeout_overrides_budget() {
        let options = IndexOptions::default().with_timeout(Duration::from_millis(5));
        assert_eq!(options.search_timeout, Duration::from_millis(5));
    }
}
