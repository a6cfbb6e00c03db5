//! Route extraction: one pass over a file's syntax tree recording router/app
//! containers, import bindings, exported routers and route registrations.

mod exports;
mod imports;
mod targets;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::error::RouteError;
use crate::model::{ContainerRoutes, FileRouteInfo, HttpMethod, ImportDescriptor, RouteEntry};
use crate::parser;
use crate::resolve::ModuleResolver;
use crate::util::{canonical_posix, string_literal, txt};

use targets::TargetScan;

/// The closed set of node shapes the route walk dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    VariableDecl,
    CallExpr,
    MemberAccess,
    ImportDecl,
    ExportAssign,
    StringLiteral,
    ArrowFn,
    FunctionExpr,
    BinaryAssign,
    Other,
}

impl NodeTag {
    pub fn of(node: Node) -> Self {
        match node.kind() {
            "variable_declarator" => Self::VariableDecl,
            "call_expression" => Self::CallExpr,
            "member_expression" | "subscript_expression" => Self::MemberAccess,
            "import_statement" => Self::ImportDecl,
            "export_statement" => Self::ExportAssign,
            "string" | "template_string" => Self::StringLiteral,
            "arrow_function" => Self::ArrowFn,
            "function_expression" | "function" | "generator_function" => Self::FunctionExpr,
            "assignment_expression" => Self::BinaryAssign,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Router,
    App,
}

/// Parse `source` and extract its route facts, resolving imports with `resolver`.
pub fn extract_file_routes(
    path: &Path,
    source: &str,
    resolver: &ModuleResolver<'_>,
) -> Result<FileRouteInfo, RouteError> {
    let tree = parser::parse_source(path, source)?;
    Ok(collect(path, &tree, source, resolver))
}

/// Read, parse and extract one file.
pub fn analyze_file(path: &Path, resolver: &ModuleResolver<'_>) -> Result<FileRouteInfo, RouteError> {
    let (tree, source) = parser::parse_file(path)?;
    Ok(collect(path, &tree, &source, resolver))
}

fn collect(path: &Path, tree: &Tree, source: &str, resolver: &ModuleResolver<'_>) -> FileRouteInfo {
    let mut collector = RouteCollector::default();
    collector.visit(tree.root_node(), source.as_bytes());
    collector.finish(path, resolver)
}

#[derive(Default)]
struct RouteCollector {
    router_containers: BTreeSet<String>,
    app_containers: BTreeSet<String>,
    imports: Vec<ImportDescriptor>,
    inline_requires: Vec<ImportDescriptor>,
    exported: BTreeSet<String>,
    // Every receiver of a route-shaped call; filtered to real containers in `finish`.
    registrations: BTreeMap<String, ContainerRoutes>,
}

impl RouteCollector {
    fn visit(&mut self, node: Node, src: &[u8]) {
        match NodeTag::of(node) {
            NodeTag::VariableDecl => self.visit_declarator(node, src),
            NodeTag::CallExpr => self.visit_call(node, src),
            NodeTag::ImportDecl => imports::collect_import_statement(node, src, &mut self.imports),
            NodeTag::ExportAssign => exports::collect_export_statement(node, src, &mut self.exported),
            NodeTag::BinaryAssign => self.visit_assignment(node, src),
            NodeTag::MemberAccess
            | NodeTag::StringLiteral
            | NodeTag::ArrowFn
            | NodeTag::FunctionExpr
            | NodeTag::Other => {}
        }

        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child, src);
        }
    }

    fn visit_declarator(&mut self, node: Node, src: &[u8]) {
        let (Some(name), Some(value)) = (
            node.child_by_field_name("name"),
            node.child_by_field_name("value"),
        ) else {
            return;
        };
        let value = unwrap_expression(value);

        match name.kind() {
            "identifier" => {
                let local = txt(name, src);
                if let Some(kind) = container_kind(value, src) {
                    self.mark_container(local, kind);
                } else if let Some(specifier) = require_through_member(value, src) {
                    self.imports.push(ImportDescriptor::new(local, specifier));
                }
            }
            "object_pattern" => {
                if let Some(specifier) = imports::require_specifier(value, src) {
                    for local in imports::destructured_bindings(name, src) {
                        self.imports.push(ImportDescriptor::new(local, specifier.clone()));
                    }
                }
            }
            _ => {}
        }
    }

    fn visit_assignment(&mut self, node: Node, src: &[u8]) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };

        if exports::is_module_export_target(left, src) {
            exports::exported_identifiers(right, src, &mut self.exported);
        } else if left.kind() == "identifier" {
            if let Some(kind) = container_kind(unwrap_expression(right), src) {
                self.mark_container(txt(left, src), kind);
            }
        }
    }

    fn visit_call(&mut self, node: Node, src: &[u8]) {
        let Some(callee) = node
            .child_by_field_name("function")
            .filter(|c| c.kind() == "member_expression")
        else {
            return;
        };
        let (Some(object), Some(property)) = (
            callee.child_by_field_name("object"),
            callee.child_by_field_name("property"),
        ) else {
            return;
        };
        let args = call_arguments(node);
        let property = txt(property, src);

        if object.kind() == "identifier" {
            let container = txt(object, src).to_string();
            if property == "use" {
                self.record_use(container, &args, src);
            } else if let Some(method) = HttpMethod::from_call_name(property) {
                self.record_handler(container, method, &args, src);
            }
            return;
        }

        // container.route('/p').get(h).post(h2)
        if let Some(method) = HttpMethod::from_call_name(property) {
            if let Some((container, path)) = route_chain_base(object, src) {
                let scan = TargetScan::default().scan(&args, src);
                self.push_entry(
                    container,
                    RouteEntry::Handler {
                        method,
                        path,
                        targets: scan.identifiers,
                    },
                );
                self.inline_requires.extend(scan.inline_requires);
            }
        }
    }

    fn record_use(&mut self, container: String, args: &[Node], src: &[u8]) {
        let (mount_path, rest) = match args.split_first() {
            Some((first, rest)) => match string_literal(*first, src) {
                Some(path) => (path, rest),
                None => ("/".to_string(), args),
            },
            None => return,
        };
        let scan = TargetScan::default().scan(rest, src);
        self.push_entry(
            container,
            RouteEntry::Use {
                mount_path,
                targets: scan.identifiers,
            },
        );
        self.inline_requires.extend(scan.inline_requires);
    }

    fn record_handler(&mut self, container: String, method: HttpMethod, args: &[Node], src: &[u8]) {
        // `app.get('env')` reads a setting; a route needs a handler argument.
        let Some((first, rest)) = args.split_first().filter(|(_, rest)| !rest.is_empty()) else {
            return;
        };
        let Some(path) = string_literal(*first, src) else {
            return;
        };
        let scan = TargetScan::default().scan(rest, src);
        self.push_entry(
            container,
            RouteEntry::Handler {
                method,
                path,
                targets: scan.identifiers,
            },
        );
        self.inline_requires.extend(scan.inline_requires);
    }

    fn push_entry(&mut self, container: String, entry: RouteEntry) {
        self.registrations
            .entry(container)
            .or_default()
            .entries
            .push(entry);
    }

    fn mark_container(&mut self, name: &str, kind: ContainerKind) {
        match kind {
            ContainerKind::Router => self.router_containers.insert(name.to_string()),
            ContainerKind::App => self.app_containers.insert(name.to_string()),
        };
    }

    fn finish(self, path: &Path, resolver: &ModuleResolver<'_>) -> FileRouteInfo {
        let mut imports = BTreeMap::new();
        for descriptor in self.imports.iter().chain(self.inline_requires.iter()) {
            if imports.contains_key(&descriptor.local) {
                continue;
            }
            if let Some(resolved) = resolver.resolve(path, &descriptor.specifier) {
                imports.insert(descriptor.local.clone(), canonical_posix(&resolved));
            }
        }

        let containers = self
            .registrations
            .into_iter()
            .filter(|(name, _)| {
                self.router_containers.contains(name) || self.app_containers.contains(name)
            })
            .collect();

        let exports_router = self
            .exported
            .iter()
            .any(|name| self.router_containers.contains(name));

        FileRouteInfo {
            path: canonical_posix(path),
            imports,
            router_containers: self.router_containers,
            app_containers: self.app_containers,
            containers,
            exports_router,
        }
    }
}

/// Strip wrappers that do not change which value an expression denotes.
pub(crate) fn unwrap_expression(mut node: Node) -> Node {
    while matches!(
        node.kind(),
        "parenthesized_expression"
            | "as_expression"
            | "satisfies_expression"
            | "non_null_expression"
            | "await_expression"
            | "type_assertion"
    ) {
        let mut cursor = node.walk();
        let inner = node
            .named_children(&mut cursor)
            .find(|c| !matches!(c.kind(), "comment" | "type_arguments"));
        match inner {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

/// `Router()`, `express.Router()` and friends are routers; `express()` is an app.
fn container_kind(value: Node, src: &[u8]) -> Option<ContainerKind> {
    if value.kind() != "call_expression" {
        return None;
    }
    let callee = value.child_by_field_name("function")?;
    match callee.kind() {
        "identifier" => match txt(callee, src) {
            "Router" => Some(ContainerKind::Router),
            "express" => Some(ContainerKind::App),
            _ => None,
        },
        "member_expression" => {
            let property = callee.child_by_field_name("property")?;
            (txt(property, src) == "Router").then_some(ContainerKind::Router)
        }
        _ => None,
    }
}

/// `require('x')` or `require('x').member`.
fn require_through_member(value: Node, src: &[u8]) -> Option<String> {
    if let Some(specifier) = imports::require_specifier(value, src) {
        return Some(specifier);
    }
    if value.kind() == "member_expression" {
        let object = value.child_by_field_name("object")?;
        return imports::require_specifier(object, src);
    }
    None
}

/// Walk down `x.route('/p').get(...).post(...)` to `(x, '/p')`.
fn route_chain_base(node: Node, src: &[u8]) -> Option<(String, String)> {
    if node.kind() != "call_expression" {
        return None;
    }
    let callee = node.child_by_field_name("function")?;
    if callee.kind() != "member_expression" {
        return None;
    }
    let object = callee.child_by_field_name("object")?;
    let property = txt(callee.child_by_field_name("property")?, src);

    if property == "route" && object.kind() == "identifier" {
        let args = call_arguments(node);
        let path = string_literal(*args.first()?, src)?;
        return Some((txt(object, src).to_string(), path));
    }
    if HttpMethod::from_call_name(property).is_some() {
        return route_chain_base(object, src);
    }
    None
}

fn call_arguments(call: Node) -> Vec<Node> {
    let Some(args) = call.child_by_field_name("arguments") else {
        return Vec::new();
    };
    let mut cursor = args.walk();
    let nodes: Vec<Node> = args
        .named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect();
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolverCache;
    use std::fs;

    fn extract_in(dir: &Path, rel: &str, src: &str) -> FileRouteInfo {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, src).unwrap();
        let cache = ResolverCache::new();
        let resolver = ModuleResolver::new(dir, &cache);
        extract_file_routes(&path, src, &resolver).unwrap()
    }

    fn entries(info: &FileRouteInfo, container: &str) -> Vec<RouteEntry> {
        info.containers
            .get(container)
            .map(|c| c.entries.clone())
            .unwrap_or_default()
    }

    #[test]
    fn node_tag_maps_closed_set() {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .unwrap();
        let tree = parser.parse("const a = f();", None).unwrap();
        let decl = tree.root_node().child(0).unwrap();
        assert_eq!(NodeTag::of(decl), NodeTag::Other);
        let declarator = decl.named_child(0).unwrap();
        assert_eq!(NodeTag::of(declarator), NodeTag::VariableDecl);
        let call = declarator.child_by_field_name("value").unwrap();
        assert_eq!(NodeTag::of(call), NodeTag::CallExpr);
    }

    #[test]
    fn router_factory_calls_mark_router_containers() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "r.js",
            "const express = require('express');\nconst a = express.Router();\nconst b = Router();\nlet c;\nc = express.Router({ mergeParams: true });\nconst app = express();",
        );
        assert_eq!(
            info.router_containers.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["a", "b", "c"]
        );
        assert!(info.app_containers.contains("app"));
    }

    #[test]
    fn handlers_require_literal_first_argument() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "r.js",
            "const router = require('express').Router();\nrouter.get('/:id', getUser);\nrouter.get(pathVar, other);\nrouter.all(`/any`, (req, res) => res.end());",
        );
        assert_eq!(
            entries(&info, "router"),
            vec![
                RouteEntry::Handler {
                    method: HttpMethod::Get,
                    path: "/:id".to_string(),
                    targets: vec!["getUser".to_string()],
                },
                RouteEntry::Handler {
                    method: HttpMethod::All,
                    path: "/any".to_string(),
                    targets: vec![],
                },
            ]
        );
    }

    #[test]
    fn use_defaults_mount_path_and_scans_targets() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "app.js",
            "const app = express();\napp.use(auth.required, [limiter], (api));\napp.use('/v1', makeRouter(db), handlers['x']);",
        );
        assert_eq!(
            entries(&info, "app"),
            vec![
                RouteEntry::Use {
                    mount_path: "/".to_string(),
                    targets: vec!["auth".to_string(), "limiter".to_string(), "api".to_string()],
                },
                RouteEntry::Use {
                    mount_path: "/v1".to_string(),
                    targets: vec!["makeRouter".to_string(), "db".to_string(), "handlers".to_string()],
                },
            ]
        );
    }

    #[test]
    fn inline_require_becomes_synthetic_import() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("routes")).unwrap();
        fs::write(dir.path().join("routes/users.js"), "").unwrap();
        let info = extract_in(
            dir.path(),
            "app.js",
            "const app = express();\napp.use('/users', require('./routes/users'));",
        );
        let local = "require('./routes/users')";
        assert_eq!(
            entries(&info, "app"),
            vec![RouteEntry::Use {
                mount_path: "/users".to_string(),
                targets: vec![local.to_string()],
            }]
        );
        assert!(info.imports[local].ends_with("/routes/users.js"));
    }

    #[test]
    fn non_container_receivers_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "client.js",
            "axios.get('/api/users');\nmap.get('key');\nconst router = Router();\nrouter.get('/ok', h);",
        );
        assert_eq!(info.containers.keys().collect::<Vec<_>>(), vec!["router"]);
    }

    #[test]
    fn route_chains_register_handlers() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "r.ts",
            "const router = Router();\nrouter.route('/items').get(list).post(create);",
        );
        let paths: Vec<(HttpMethod, String)> = info.containers["router"]
            .handlers()
            .map(|(m, p, _)| (m, p.to_string()))
            .collect();
        assert!(paths.contains(&(HttpMethod::Get, "/items".to_string())));
        assert!(paths.contains(&(HttpMethod::Post, "/items".to_string())));
    }

    #[test]
    fn es_imports_and_requires_are_resolved() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("c")).unwrap();
        for f in ["a.ts", "b.ts", "c/index.ts", "d.js", "e.js", "f.ts"] {
            fs::write(dir.path().join(f), "").unwrap();
        }
        let info = extract_in(
            dir.path(),
            "app.ts",
            "import a from './a';\nimport { b as bee, other } from './b';\nimport * as c from './c';\nconst d = require('./d');\nconst { e, x: why } = require('./e');\nimport f = require('./f');\nimport express from 'express';",
        );
        let locals: Vec<&str> = info.imports.keys().map(String::as_str).collect();
        assert_eq!(locals, vec!["a", "bee", "c", "d", "e", "f", "other", "why"]);
        assert!(info.imports["c"].ends_with("/c/index.ts"));
        assert!(!info.imports.contains_key("express"));
    }

    #[test]
    fn commonjs_exports_detect_router() {
        let cases = [
            "const router = Router();\nmodule.exports = router;",
            "const router = Router();\nmodule.exports.users = router;",
            "const router = Router();\nexports.users = router;",
            "const router = Router();\nmodule.exports = (router);",
            "const router = Router();\nmodule.exports = { router };",
            "module.exports = () => { const r = Router(); r.get('/', h); return r; };",
            "module.exports = function () { const r = express.Router(); return r; };",
            "const router = Router();\nmodule.exports = () => router;",
        ];
        for src in cases {
            let dir = tempfile::tempdir().unwrap();
            let info = extract_in(dir.path(), "r.js", src);
            assert!(info.exports_router, "not detected: {src}");
        }
    }

    #[test]
    fn es_exports_detect_router() {
        let cases = [
            "const router = Router();\nexport default router;",
            "const router = Router();\nexport { router };",
            "const router = Router();\nexport { router as default };",
            "export const router = Router();",
            "const router = Router();\nexport = router;",
            "export default function () { const r = Router(); return r; }",
        ];
        for src in cases {
            let dir = tempfile::tempdir().unwrap();
            let info = extract_in(dir.path(), "r.ts", src);
            assert!(info.exports_router, "not detected: {src}");
        }
    }

    #[test]
    fn exporting_a_non_router_is_not_a_router_export() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(
            dir.path(),
            "r.js",
            "const router = Router();\nconst helper = () => 1;\nmodule.exports = helper;",
        );
        assert!(!info.exports_router);
    }

    #[test]
    fn malformed_source_still_yields_info() {
        let dir = tempfile::tempdir().unwrap();
        let info = extract_in(dir.path(), "r.js", "const router = Router(;\nrouter.get('/x', h");
        assert!(info.path.ends_with("/r.js"));
    }
}
