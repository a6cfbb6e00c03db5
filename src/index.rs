use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::config::IndexOptions;
use crate::graph::{ForwardMap, GraphBuilder, ReverseMap, RouteGraph};
use crate::model::HttpMethod;
use crate::search::{default_search, ContentSearch};
use crate::trie::{RouteTrie, RouteTrieBuilder};
use crate::util::{canonical_posix, http_segments, normalize_http_path};

/// Routes of one repository, queryable in both directions.
#[derive(Debug, Clone, Default)]
pub struct RouteIndex {
    trie: RouteTrie<BTreeSet<String>>,
    forward: ForwardMap,
    reverse: ReverseMap,
}

impl RouteIndex {
    pub fn from_graph(graph: RouteGraph) -> Self {
        let mut builder = RouteTrieBuilder::new();
        for (route, methods) in &graph.forward {
            let segments = http_segments(route);
            for (method, sources) in methods {
                // Each (route, method) is inserted once with its merged sources;
                // the trie overwrites on re-insert.
                builder.insert(&segments, method, sources.clone());
            }
        }
        Self {
            trie: builder.build(),
            forward: graph.forward,
            reverse: graph.reverse,
        }
    }

    /// Source files reachable for a concrete request path, across every method.
    ///
    /// `/users/42` matches a route registered as `/users/:id`. Sorted, deduplicated.
    pub fn sources_for_http_route(&self, http_path: &str) -> Vec<String> {
        let segments = http_segments(http_path);
        let mut out: BTreeSet<String> = BTreeSet::new();
        let methods = HttpMethod::CONCRETE
            .iter()
            .map(|m| m.key())
            .chain(std::iter::once(HttpMethod::WILDCARD_KEY));
        for method in methods {
            for sources in self.trie.lookup(&segments, method) {
                out.extend(sources);
            }
        }
        out.into_iter().collect()
    }

    /// Source files for one method; `All` asks for wildcard registrations only.
    pub fn sources_for(&self, method: HttpMethod, http_path: &str) -> Vec<String> {
        let segments = http_segments(http_path);
        let out: BTreeSet<String> = self
            .trie
            .lookup(&segments, method.key())
            .into_iter()
            .flatten()
            .collect();
        out.into_iter().collect()
    }

    /// Absolute routes served by `source_path` (any spelling of an existing file).
    pub fn http_routes_for_source(&self, source_path: &str) -> Vec<String> {
        self.reverse
            .get(&canonical_posix(Path::new(source_path)))
            .map(|routes| routes.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Registered route patterns with their methods, for listing.
    pub fn routes(&self) -> impl Iterator<Item = (&str, Vec<&str>)> {
        self.forward
            .iter()
            .map(|(route, methods)| (route.as_str(), methods.keys().map(String::as_str).collect()))
    }

    pub fn forward(&self) -> &ForwardMap {
        &self.forward
    }

    pub fn reverse(&self) -> &ReverseMap {
        &self.reverse
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// Builds and memoizes one [`RouteIndex`] per repository root.
///
/// A build never fails: files that cannot be read or parsed are skipped and a
/// failed or timed-out search yields an empty index. Call [`Self::rebuild`]
/// after the repository changes.
pub struct RouteIndexStore {
    options: IndexOptions,
    search: Box<dyn ContentSearch>,
    indexes: Mutex<HashMap<String, Arc<RouteIndex>>>,
}

impl RouteIndexStore {
    /// Store searching with `rg` and walking the tree when it is missing.
    pub fn new(options: IndexOptions) -> Self {
        let search = default_search(&options.search_binary);
        Self::with_search(options, search)
    }

    pub fn with_search(options: IndexOptions, search: impl ContentSearch + 'static) -> Self {
        Self {
            options,
            search: Box::new(search),
            indexes: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// The index for `repo_root`, built on first use.
    pub fn index_for(&self, repo_root: &Path) -> Arc<RouteIndex> {
        let key = canonical_posix(repo_root);
        if let Some(index) = self.indexes.lock().get(&key) {
            return Arc::clone(index);
        }
        let built = self.build(&key);
        // Two racing builders of the same root produce equal indexes; keep the first.
        Arc::clone(self.indexes.lock().entry(key).or_insert(built))
    }

    /// Discard any cached index for `repo_root` and build a fresh one.
    pub fn rebuild(&self, repo_root: &Path) -> Arc<RouteIndex> {
        let key = canonical_posix(repo_root);
        let built = self.build(&key);
        self.indexes.lock().insert(key, Arc::clone(&built));
        built
    }

    fn build(&self, root: &str) -> Arc<RouteIndex> {
        debug!(root, "building route index");
        let root = PathBuf::from(root);
        let graph = GraphBuilder::new(&root, &self.options, self.search.as_ref()).build();
        Arc::new(RouteIndex::from_graph(graph))
    }

    /// Union of sources for every path in `http_paths`, sorted and deduplicated.
    pub fn resolve_sources_for_http_routes<S: AsRef<str>>(
        &self,
        repo_root: &Path,
        http_paths: &[S],
    ) -> Vec<String> {
        let index = self.index_for(repo_root);
        let mut out: BTreeSet<String> = BTreeSet::new();
        for path in http_paths {
            out.extend(index.sources_for_http_route(&normalize_http_path(path.as_ref())));
        }
        out.into_iter().collect()
    }

    /// Routes served by `source`; relative paths are taken from `repo_root`.
    pub fn http_routes_for_source(&self, repo_root: &Path, source: &Path) -> Vec<String> {
        let absolute = if source.is_absolute() {
            source.to_path_buf()
        } else {
            repo_root.join(source)
        };
        self.index_for(repo_root)
            .http_routes_for_source(&absolute.to_string_lossy())
    }

    /// Cached roots, for diagnostics.
    pub fn cached_roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self.indexes.lock().keys().cloned().collect();
        roots.sort();
        roots
    }
}
