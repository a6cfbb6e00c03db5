use std::time::Duration;

/// Errors produced while building a route index.
///
/// None of these escape the [`crate::index::RouteIndexStore`] boundary: a
/// failing file is skipped and a failing search yields zero candidates.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("unsupported extension: .{0}")]
    UnsupportedExtension(String),

    #[error("parse failed: {0}")]
    ParseFailed(String),

    #[error("search: {0}")]
    Search(String),

    #[error("search timed out after {}ms", timeout.as_millis())]
    SearchTimeout { timeout: Duration },

    #[error("invalid glob: {0}")]
    InvalidGlob(String),
}
