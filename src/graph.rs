use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::IndexOptions;
use crate::extract::analyze_file;
use crate::model::{FileRouteInfo, HttpMethod};
use crate::resolve::{ModuleResolver, ResolverCache};
use crate::search::{ContentSearch, SearchQuery};
use crate::util::join_http_paths;

/// Absolute route -> method key -> canonical source files.
pub type ForwardMap = BTreeMap<String, BTreeMap<String, BTreeSet<String>>>;
/// Canonical source file -> absolute routes it serves.
pub type ReverseMap = BTreeMap<String, BTreeSet<String>>;

/// Which containers of a file a traversal step reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum MountScope {
    /// Entry point: the file's app containers.
    App,
    /// Mounted router file: its router containers.
    Router,
    /// A router declared and mounted in the same file.
    Local(String),
}

/// Routes gathered by one traversal.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteGraph {
    pub forward: ForwardMap,
    pub reverse: ReverseMap,
}

impl RouteGraph {
    fn record(&mut self, method: &str, route: &str, sources: impl IntoIterator<Item = String>) {
        let entry = self
            .forward
            .entry(route.to_string())
            .or_default()
            .entry(method.to_string())
            .or_default();
        for source in sources {
            self.reverse
                .entry(source.clone())
                .or_default()
                .insert(route.to_string());
            entry.insert(source);
        }
    }

    pub fn route_count(&self) -> usize {
        self.forward.values().map(BTreeMap::len).sum()
    }
}

/// Builds a [`RouteGraph`] for one repository root.
pub struct GraphBuilder<'a> {
    root: PathBuf,
    options: &'a IndexOptions,
    search: &'a dyn ContentSearch,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(root: &Path, options: &'a IndexOptions, search: &'a dyn ContentSearch) -> Self {
        Self {
            root: root.to_path_buf(),
            options,
            search,
        }
    }

    /// Candidate files; empty when the search fails or times out.
    pub fn discover(&self) -> Vec<PathBuf> {
        let query = SearchQuery::route_candidates(
            &self.root,
            &self.options.exclude_globs,
            self.options.search_timeout,
        );
        match self.search.files_with_matches(&query) {
            Ok(files) => files,
            Err(e) => {
                warn!(root = %self.root.display(), error = %e, "route discovery failed");
                Vec::new()
            }
        }
    }

    /// Extract every file, keyed by canonical path. Unreadable or unparsable
    /// files are skipped.
    pub fn analyze(&self, files: &[PathBuf]) -> BTreeMap<String, FileRouteInfo> {
        let cache = ResolverCache::new();
        let analyze_one = |path: &PathBuf| {
            let resolver = ModuleResolver::new(&self.root, &cache);
            match analyze_file(path, &resolver) {
                Ok(info) if !info.is_empty() => Some(info),
                Ok(_) => None,
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "skipping file");
                    None
                }
            }
        };

        let infos: Vec<FileRouteInfo> = if self.options.parallel {
            files.par_iter().filter_map(analyze_one).collect()
        } else {
            files.iter().filter_map(analyze_one).collect()
        };
        debug!(
            files = files.len(),
            with_routes = infos.len(),
            resolutions = cache.resolution_count(),
            "analyzed candidates"
        );
        infos.into_iter().map(|info| (info.path.clone(), info)).collect()
    }

    pub fn build(&self) -> RouteGraph {
        let started = Instant::now();
        let files = self.discover();
        let infos = self.analyze(&files);
        let graph = traverse(&infos);
        info!(
            root = %self.root.display(),
            candidates = files.len(),
            routes = graph.route_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "route graph built"
        );
        graph
    }
}

/// One queued traversal step.
#[derive(Debug, Clone)]
struct Visit {
    file: String,
    base: String,
    scope: MountScope,
    /// (file, scope) pairs already expanded on the way here.
    chain: Vec<(String, MountScope)>,
}

impl Visit {
    fn seed(file: &str, scope: MountScope) -> Self {
        Self {
            file: file.to_string(),
            base: "/".to_string(),
            scope,
            chain: Vec::new(),
        }
    }

    fn child(&self, file: &str, base: String, scope: MountScope) -> Option<Self> {
        let key = (file.to_string(), scope);
        let current = (self.file.clone(), self.scope.clone());
        if key == current || self.chain.contains(&key) {
            return None;
        }
        let mut chain = self.chain.clone();
        chain.push(current);
        Some(Self {
            file: key.0,
            base,
            scope: key.1,
            chain,
        })
    }
}

/// Breadth-first walk from every app container through `use` mounts.
///
/// Each (file, base path, scope) is expanded at most once, and a mount that
/// leads back to a container already on its own mount chain is not followed,
/// so self-mounting routers terminate. Files that export a router are also
/// walked at `/` so routers never mounted by a discovered app still show up.
pub fn traverse(infos: &BTreeMap<String, FileRouteInfo>) -> RouteGraph {
    let router_files: BTreeSet<&str> = infos
        .values()
        .filter(|info| info.exports_router)
        .map(|info| info.path.as_str())
        .collect();

    let mut queue: VecDeque<Visit> = VecDeque::new();
    for info in infos.values().filter(|info| info.has_app()) {
        queue.push_back(Visit::seed(&info.path, MountScope::App));
    }
    for path in &router_files {
        queue.push_back(Visit::seed(path, MountScope::Router));
    }

    let mut graph = RouteGraph::default();
    let mut visited: HashSet<(String, String, MountScope)> = HashSet::new();

    while let Some(visit) = queue.pop_front() {
        let key = (visit.file.clone(), visit.base.clone(), visit.scope.clone());
        if !visited.insert(key) {
            continue;
        }
        let Some(info) = infos.get(&visit.file) else {
            continue;
        };

        let in_scope = |name: &str| match &visit.scope {
            MountScope::App => info.app_containers.contains(name),
            MountScope::Router => info.router_containers.contains(name),
            MountScope::Local(local) => local == name,
        };

        for (name, routes) in info.containers.iter().filter(|(name, _)| in_scope(name.as_str())) {
            for (method, path, targets) in routes.handlers() {
                let route = join_http_paths(&visit.base, path);
                let mut sources: BTreeSet<String> = BTreeSet::new();
                sources.insert(info.path.clone());
                sources.extend(targets.iter().filter_map(|t| info.imports.get(t).cloned()));
                graph.record(method.key(), &route, sources);
            }

            for (mount_path, targets) in routes.uses() {
                let child_base = join_http_paths(&visit.base, mount_path);
                for target in targets {
                    let next = if let Some(target_file) = info.imports.get(target) {
                        if router_files.contains(target_file.as_str()) {
                            visit.child(target_file, child_base.clone(), MountScope::Router)
                        } else {
                            if *target_file != info.path {
                                graph.record(
                                    HttpMethod::WILDCARD_KEY,
                                    &child_base,
                                    [target_file.clone()],
                                );
                            }
                            None
                        }
                    } else if target != name && info.router_containers.contains(target) {
                        visit.child(&info.path, child_base.clone(), MountScope::Local(target.clone()))
                    } else {
                        None
                    };
                    if let Some(next) = next {
                        queue.push_back(next);
                    }
                }
            }
        }
    }

    graph
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerRoutes, RouteEntry};

    fn handler(method: HttpMethod, path: &str, targets: &[&str]) -> RouteEntry {
        RouteEntry::Handler {
            method,
            path: path.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn mount(path: &str, targets: &[&str]) -> RouteEntry {
        RouteEntry::Use {
            mount_path: path.to_string(),
            targets: targets.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn app_file(path: &str, imports: &[(&str, &str)], entries: Vec<RouteEntry>) -> FileRouteInfo {
        FileRouteInfo {
            path: path.to_string(),
            imports: imports
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            app_containers: ["app".to_string()].into(),
            containers: [("app".to_string(), ContainerRoutes { entries })].into(),
            ..FileRouteInfo::default()
        }
    }

    fn router_file(path: &str, imports: &[(&str, &str)], entries: Vec<RouteEntry>) -> FileRouteInfo {
        FileRouteInfo {
            path: path.to_string(),
            imports: imports
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            router_containers: ["router".to_string()].into(),
            containers: [("router".to_string(), ContainerRoutes { entries })].into(),
            exports_router: true,
            ..FileRouteInfo::default()
        }
    }

    fn index(files: Vec<FileRouteInfo>) -> BTreeMap<String, FileRouteInfo> {
        files.into_iter().map(|f| (f.path.clone(), f)).collect()
    }

    fn sources(graph: &RouteGraph, route: &str, method: &str) -> Vec<String> {
        graph
            .forward
            .get(route)
            .and_then(|m| m.get(method))
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn mounted_router_routes_are_prefixed() {
        let infos = index(vec![
            app_file("/r/app.js", &[("users", "/r/routes/users.js")], vec![mount("/api", &["users"])]),
            router_file(
                "/r/routes/users.js",
                &[("list", "/r/controllers/users.js")],
                vec![handler(HttpMethod::Get, "/users", &["list"])],
            ),
        ]);
        let graph = traverse(&infos);
        assert_eq!(
            sources(&graph, "/api/users", "get"),
            vec!["/r/controllers/users.js", "/r/routes/users.js"]
        );
        // Also reachable at the root because the router file is exported.
        assert!(graph.forward.contains_key("/users"));
        assert!(graph.reverse["/r/controllers/users.js"].contains("/api/users"));
    }

    #[test]
    fn nested_mounts_compose() {
        let infos = index(vec![
            app_file("/r/app.js", &[("v1", "/r/v1.js")], vec![mount("/api", &["v1"])]),
            router_file("/r/v1.js", &[("orders", "/r/orders.js")], vec![mount("/v1", &["orders"])]),
            router_file("/r/orders.js", &[], vec![handler(HttpMethod::Post, "/orders/:id", &[])]),
        ]);
        let graph = traverse(&infos);
        assert_eq!(sources(&graph, "/api/v1/orders/:id", "post"), vec!["/r/orders.js"]);
    }

    #[test]
    fn self_mount_cycle_terminates() {
        let infos = index(vec![
            app_file("/r/app.js", &[("loop", "/r/loop.js")], vec![mount("/a", &["loop"])]),
            router_file(
                "/r/loop.js",
                &[("self", "/r/loop.js")],
                vec![mount("/", &["self"]), handler(HttpMethod::Get, "/ping", &[])],
            ),
        ]);
        let graph = traverse(&infos);
        assert_eq!(sources(&graph, "/a/ping", "get"), vec!["/r/loop.js"]);
    }

    #[test]
    fn growing_cycle_is_bounded_by_visited_bases() {
        let infos = index(vec![
            app_file("/r/app.js", &[("a", "/r/a.js")], vec![mount("/", &["a"])]),
            router_file("/r/a.js", &[("b", "/r/b.js")], vec![mount("/", &["b"])]),
            router_file(
                "/r/b.js",
                &[("a", "/r/a.js")],
                vec![mount("/", &["a"]), handler(HttpMethod::Get, "/x", &[])],
            ),
        ]);
        let graph = traverse(&infos);
        assert_eq!(sources(&graph, "/x", "get"), vec!["/r/b.js"]);
    }

    #[test]
    fn self_mount_under_a_prefix_is_not_followed_again() {
        let infos = index(vec![
            app_file("/r/app.js", &[("loop", "/r/loop.js")], vec![mount("/loop", &["loop"])]),
            router_file(
                "/r/loop.js",
                &[("again", "/r/loop.js")],
                vec![mount("/again", &["again"]), handler(HttpMethod::Get, "/ping", &[])],
            ),
        ]);
        let graph = traverse(&infos);
        assert!(graph.forward.contains_key("/loop/ping"));
        assert!(!graph.forward.contains_key("/loop/again/ping"));
    }

    #[test]
    fn all_and_middleware_use_wildcard_key() {
        let infos = index(vec![app_file(
            "/r/app.js",
            &[("auth", "/r/middleware/auth.js")],
            vec![mount("/admin", &["auth"]), handler(HttpMethod::All, "/health", &[])],
        )]);
        let graph = traverse(&infos);
        assert_eq!(sources(&graph, "/admin", "*"), vec!["/r/middleware/auth.js"]);
        assert_eq!(sources(&graph, "/health", "*"), vec!["/r/app.js"]);
    }

    #[test]
    fn local_router_mount_is_expanded() {
        let mut app = app_file("/r/app.js", &[], vec![mount("/api", &["api"])]);
        app.router_containers.insert("api".to_string());
        app.containers.insert(
            "api".to_string(),
            ContainerRoutes {
                entries: vec![handler(HttpMethod::Get, "/status", &[])],
            },
        );
        let graph = traverse(&index(vec![app]));
        assert_eq!(sources(&graph, "/api/status", "get"), vec!["/r/app.js"]);
        // The app scope does not read router containers directly.
        assert!(!graph.forward.contains_key("/status"));
    }

    #[test]
    fn unresolved_targets_contribute_only_the_registering_file() {
        let infos = index(vec![app_file(
            "/r/app.js",
            &[],
            vec![handler(HttpMethod::Get, "/", &["somePackageHandler"])],
        )]);
        let graph = traverse(&infos);
        assert_eq!(sources(&graph, "/", "get"), vec!["/r/app.js"]);
    }
}
