mod babel;
mod heuristic;
mod jest;
mod metro;
mod shared;
mod ts;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::util::lexical_normalize;

pub use babel::BabelAliasConfig;
pub use jest::JestAliasConfig;
pub use metro::MetroAliasConfig;
pub use ts::TsPathsConfig;

/// One module-aliasing convention: maps a bare specifier to a file on disk.
pub trait AliasResolver {
    /// The resolved file, or `None` when this alias table has nothing for `specifier`.
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf>;
}

/// Supported alias dialects, in the order they are tried at each directory level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    TsPaths,
    Babel,
    Jest,
    Metro,
}

impl Dialect {
    pub const ORDER: [Dialect; 4] = [Self::TsPaths, Self::Babel, Self::Jest, Self::Metro];

    /// Read this dialect's config located directly in `dir`. Missing and
    /// malformed configs both come back as `None`.
    fn load(self, dir: &Path) -> Option<AliasConfig> {
        match self {
            Self::TsPaths => ts::load(dir).map(AliasConfig::TsPaths),
            Self::Babel => babel::load(dir).map(AliasConfig::Babel),
            Self::Jest => jest::load(dir).map(AliasConfig::Jest),
            Self::Metro => metro::load(dir).map(AliasConfig::Metro),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TsPaths => "tsconfig",
            Self::Babel => "babel",
            Self::Jest => "jest",
            Self::Metro => "metro",
        })
    }
}

/// A parsed alias configuration, scoped to the directory it was found in.
#[derive(Debug, Clone)]
pub enum AliasConfig {
    TsPaths(TsPathsConfig),
    Babel(BabelAliasConfig),
    Jest(JestAliasConfig),
    Metro(MetroAliasConfig),
}

impl AliasResolver for AliasConfig {
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        match self {
            Self::TsPaths(cfg) => cfg.resolve_alias(specifier),
            Self::Babel(cfg) => cfg.resolve_alias(specifier),
            Self::Jest(cfg) => cfg.resolve_alias(specifier),
            Self::Metro(cfg) => cfg.resolve_alias(specifier),
        }
    }
}

/// Memoization shared by every resolution in one index build.
///
/// Both tables are append-only: a config absence or a failed resolution is
/// remembered for the lifetime of the cache. Drop the cache to start fresh.
#[derive(Default)]
pub struct ResolverCache {
    configs: Mutex<HashMap<(Dialect, PathBuf), Option<Arc<AliasConfig>>>>,
    resolutions: Mutex<HashMap<(PathBuf, String), Option<PathBuf>>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn config(&self, dialect: Dialect, dir: &Path) -> Option<Arc<AliasConfig>> {
        let key = (dialect, dir.to_path_buf());
        if let Some(cached) = self.configs.lock().get(&key) {
            return cached.clone();
        }
        // Loaded outside the lock; a concurrent loader of the same key produces the same value.
        let loaded = dialect.load(dir).map(Arc::new);
        if loaded.is_some() {
            tracing::debug!(%dialect, dir = %dir.display(), "loaded alias config");
        }
        self.configs.lock().entry(key).or_insert(loaded).clone()
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions.lock().len()
    }
}

/// Resolves import/require specifiers to files under one repository root.
pub struct ModuleResolver<'a> {
    root: PathBuf,
    cache: &'a ResolverCache,
}

impl<'a> ModuleResolver<'a> {
    pub fn new(root: &Path, cache: &'a ResolverCache) -> Self {
        Self {
            root: lexical_normalize(root),
            cache,
        }
    }

    /// Resolve `specifier` as imported from `from_file`.
    ///
    /// Returns `None` for anything that does not land on a file: node_modules
    /// packages, unmatched aliases, missing files.
    pub fn resolve(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        let key = (from_file.to_path_buf(), specifier.to_string());
        if let Some(cached) = self.cache.resolutions.lock().get(&key) {
            return cached.clone();
        }
        let resolved = self.resolve_uncached(from_file, specifier);
        if resolved.is_none() {
            tracing::trace!(from = %from_file.display(), %specifier, "unresolved specifier");
        }
        self.cache.resolutions.lock().insert(key, resolved.clone());
        resolved
    }

    fn resolve_uncached(&self, from_file: &Path, specifier: &str) -> Option<PathBuf> {
        let specifier = specifier.trim();
        if specifier.is_empty() {
            return None;
        }
        let parent = from_file.parent()?;

        if is_relative(specifier) {
            return shared::probe(&lexical_normalize(&parent.join(specifier)));
        }
        if specifier.starts_with('/') {
            return shared::probe(Path::new(specifier));
        }

        let mut dir = lexical_normalize(parent);
        while dir.starts_with(&self.root) {
            for dialect in Dialect::ORDER {
                let Some(config) = self.cache.config(dialect, &dir) else {
                    continue;
                };
                if let Some(hit) = config.resolve_alias(specifier) {
                    return Some(hit);
                }
            }
            if dir == self.root || !dir.pop() {
                break;
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}
