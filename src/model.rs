use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A local binding produced by an import, a `require`, or an inline
/// `require()` found among route arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ImportDescriptor {
    pub local: String,
    pub specifier: String,
}

impl ImportDescriptor {
    pub fn new(local: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            specifier: specifier.into(),
        }
    }

    /// Synthetic binding for `require('<specifier>')` used inline as a route target.
    pub fn inline_require(specifier: &str) -> Self {
        Self::new(format!("require('{specifier}')"), specifier)
    }
}

/// HTTP methods a route handler can be registered for.
///
/// `All` covers `container.all(...)` and middleware mounts; it is stored
/// under the wildcard key `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    All,
}

impl HttpMethod {
    /// Every concrete method, without the wildcard.
    pub const CONCRETE: [HttpMethod; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Delete,
        Self::Patch,
        Self::Options,
        Self::Head,
    ];

    pub const WILDCARD_KEY: &'static str = "*";

    /// Map a member-call property name (`get`, `post`, ...) to a method.
    pub fn from_call_name(name: &str) -> Option<Self> {
        match name {
            "get" => Some(Self::Get),
            "post" => Some(Self::Post),
            "put" => Some(Self::Put),
            "delete" => Some(Self::Delete),
            "patch" => Some(Self::Patch),
            "options" => Some(Self::Options),
            "head" => Some(Self::Head),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    /// Key used in the trie payload map.
    pub fn key(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Delete => "delete",
            Self::Patch => "patch",
            Self::Options => "options",
            Self::Head => "head",
            Self::All => Self::WILDCARD_KEY,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            other => f.write_str(&other.key().to_ascii_uppercase()),
        }
    }
}

/// One registration on a router or app container, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteEntry {
    /// `container.use([path,] ...targets)`
    Use {
        mount_path: String,
        targets: Vec<String>,
    },
    /// `container.<method>(path, ...targets)`
    Handler {
        method: HttpMethod,
        path: String,
        targets: Vec<String>,
    },
}

/// Registrations accumulated for one container identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerRoutes {
    pub entries: Vec<RouteEntry>,
}

impl ContainerRoutes {
    pub fn uses(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().filter_map(|e| match e {
            RouteEntry::Use { mount_path, targets } => Some((mount_path.as_str(), targets.as_slice())),
            RouteEntry::Handler { .. } => None,
        })
    }

    pub fn handlers(&self) -> impl Iterator<Item = (HttpMethod, &str, &[String])> {
        self.entries.iter().filter_map(|e| match e {
            RouteEntry::Handler {
                method,
                path,
                targets,
            } => Some((*method, path.as_str(), targets.as_slice())),
            RouteEntry::Use { .. } => None,
        })
    }
}

/// Everything the extractor learned about one file.
///
/// Transient: only lives until the route index has been assembled.
#[derive(Debug, Clone, Default)]
pub struct FileRouteInfo {
    /// Canonical absolute path (forward slashes).
    pub path: String,
    /// Local binding -> canonical absolute path of the imported file.
    pub imports: BTreeMap<String, String>,
    pub router_containers: BTreeSet<String>,
    pub app_containers: BTreeSet<String>,
    /// Registrations of router and app containers only.
    pub containers: BTreeMap<String, ContainerRoutes>,
    pub exports_router: bool,
}

impl FileRouteInfo {
    pub fn has_app(&self) -> bool {
        self.app_containers
            .iter()
            .any(|name| self.containers.contains_key(name))
    }

    /// True when the file holds nothing the graph builder can use.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty() && !self.exports_router
    }
}
