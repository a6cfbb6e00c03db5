use std::fs;
use std::path::Path;
use std::time::Duration;

use routescope::search::WalkSearch;
use routescope::util::canonical_posix;
use routescope::{HttpMethod, IndexOptions, RouteIndex, RouteIndexStore};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn store() -> RouteIndexStore {
    let options = IndexOptions {
        search_timeout: Duration::from_secs(10),
        ..IndexOptions::default()
    };
    RouteIndexStore::with_search(options, WalkSearch)
}

fn abs(root: &Path, rel: &str) -> String {
    canonical_posix(&root.join(rel))
}

fn express_users_app(root: &Path) {
    write(
        root,
        "app.js",
        "const express = require('express');\n\
         const users = require('./routes/users');\n\
         const app = express();\n\
         app.use('/users', users);\n\
         app.get('/health', (req, res) => res.send('ok'));\n\
         module.exports = app;\n",
    );
    write(
        root,
        "routes/users.js",
        "const { Router } = require('express');\n\
         const { getUser, updateUser } = require('../controllers/users');\n\
         const router = Router();\n\
         router.get('/:id', getUser);\n\
         router.put('/:id', updateUser);\n\
         module.exports = router;\n",
    );
    write(
        root,
        "controllers/users.js",
        "exports.getUser = (req, res) => res.json({});\n\
         exports.updateUser = (req, res) => res.json({});\n",
    );
}

// --- scenarios ---

#[test]
fn mounted_router_resolves_to_router_and_handler_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    express_users_app(root);

    let store = store();
    let expected = vec![abs(root, "controllers/users.js"), abs(root, "routes/users.js")];
    assert_eq!(store.resolve_sources_for_http_routes(root, &["/users/:id"]), expected);
    assert_eq!(store.resolve_sources_for_http_routes(root, &["/users/42"]), expected);
    // routes/users.js is also walked at `/` as an exported router, but the
    // literal `/health` outranks its `/:id`.
    let index = store.index_for(root);
    assert_eq!(index.sources_for(HttpMethod::Get, "/health"), vec![abs(root, "app.js")]);
    assert!(index.sources_for(HttpMethod::Put, "/health").is_empty());
    assert_eq!(
        store.resolve_sources_for_http_routes(root, &["/health"]),
        vec![abs(root, "app.js")]
    );
}

#[test]
fn reverse_lookup_lists_mounted_routes() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    express_users_app(root);

    let store = store();
    let routes = store.http_routes_for_source(root, Path::new("controllers/users.js"));
    assert!(routes.contains(&"/users/:id".to_string()), "{routes:?}");
    assert!(store
        .http_routes_for_source(root, Path::new("app.js"))
        .contains(&"/health".to_string()));
}

#[test]
fn tsconfig_paths_alias_reaches_typescript_router() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "tsconfig.json",
        r#"{"compilerOptions":{"baseUrl":".","paths":{"@app/*":["src/*"]}}}"#,
    );
    write(
        root,
        "src/server.ts",
        "import express from 'express';\n\
         const users = require('@app/routes/users');\n\
         const app = express();\n\
         app.use('/api/users', users);\n",
    );
    write(
        root,
        "src/routes/users.ts",
        "import { Router } from 'express';\n\
         const router = Router();\n\
         router.get('/', (req, res) => res.json([]));\n\
         export default router;\n",
    );

    let sources = store().resolve_sources_for_http_routes(root, &["/api/users"]);
    assert_eq!(sources, vec![abs(root, "src/routes/users.ts")]);
}

#[test]
fn unresolvable_mount_is_not_expanded() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app.js",
        "const express = require('express');\n\
         const legacy = require('some-legacy-package/routes');\n\
         const app = express();\n\
         app.use('/legacy', legacy);\n\
         app.post('/login', login);\n",
    );

    let store = store();
    assert!(store
        .resolve_sources_for_http_routes(root, &["/legacy"])
        .is_empty());
    assert_eq!(
        store.resolve_sources_for_http_routes(root, &["/login"]),
        vec![abs(root, "app.js")]
    );
    let index = store.index_for(root);
    assert!(index.forward().keys().all(|route| !route.starts_with("/legacy")));
}

#[test]
fn self_mounting_router_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app.js",
        "const express = require('express');\n\
         const app = express();\n\
         app.use('/loop', require('./loop'));\n",
    );
    write(
        root,
        "loop.js",
        "const express = require('express');\n\
         const router = express.Router();\n\
         router.use('/again', require('./loop'));\n\
         router.get('/ping', (req, res) => res.end());\n\
         module.exports = router;\n",
    );

    let index = store().index_for(root);
    assert_eq!(index.sources_for_http_route("/loop/ping"), vec![abs(root, "loop.js")]);
    assert!(index.sources_for_http_route("/loop/again/ping").is_empty());
}

#[test]
fn middleware_mount_applies_to_every_method() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app.js",
        "const express = require('express');\n\
         const auth = require('./middleware/auth');\n\
         const admin = require('./routes/admin');\n\
         const app = express();\n\
         app.use('/admin', auth, admin);\n",
    );
    write(
        root,
        "middleware/auth.js",
        "module.exports = function auth(req, res, next) { next(); };\n",
    );
    write(
        root,
        "routes/admin.js",
        "const router = require('express').Router();\n\
         router.delete('/users/:id', (req, res) => res.end());\n\
         module.exports = router;\n",
    );

    let sources = store().resolve_sources_for_http_routes(root, &["/admin/users/7"]);
    assert_eq!(
        sources,
        vec![abs(root, "middleware/auth.js"), abs(root, "routes/admin.js")]
    );
}

#[test]
fn prefix_middleware_answers_unregistered_subpath() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "app.js",
        "const express = require('express');\n\
         const auth = require('./middleware/auth');\n\
         const app = express();\n\
         app.use('/admin', auth);\n\
         app.get('/admin/users', (req, res) => res.json([]));\n",
    );
    write(
        root,
        "middleware/auth.js",
        "module.exports = function auth(req, res, next) { next(); };\n",
    );

    let store = store();
    assert_eq!(
        store.resolve_sources_for_http_routes(root, &["/admin/settings"]),
        vec![abs(root, "middleware/auth.js")]
    );
    assert_eq!(
        store.resolve_sources_for_http_routes(root, &["/admin/users"]),
        vec![abs(root, "app.js"), abs(root, "middleware/auth.js")]
    );
}

// --- properties ---

#[test]
fn rebuild_over_unchanged_repo_is_identical() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    express_users_app(root);

    let store = store();
    let first = store.index_for(root);
    let second = store.rebuild(root);
    assert_eq!(first.forward(), second.forward());
    assert_eq!(first.reverse(), second.reverse());
}

#[test]
fn every_recorded_triple_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    express_users_app(root);

    let index: std::sync::Arc<RouteIndex> = store().index_for(root);
    assert!(!index.is_empty());
    for (route, methods) in index.forward() {
        for sources in methods.values() {
            let found = index.sources_for_http_route(route);
            for source in sources {
                assert!(found.contains(source), "{route} missing {source}");
                assert!(
                    index.http_routes_for_source(source).contains(route),
                    "{source} missing {route}"
                );
            }
        }
    }
}

#[test]
fn broken_files_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    express_users_app(root);
    write(root, "broken.js", "app.use('/x', (((;\n");
    fs::write(root.join("binary.js"), [0xff, 0xfe, 0x00, b'.', b'u', b's', b'e', b'(']).unwrap();

    let sources = store().resolve_sources_for_http_routes(root, &["/users/1"]);
    assert_eq!(sources.len(), 2);
}

#[test]
fn node_modules_are_never_indexed() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(
        root,
        "node_modules/pkg/app.js",
        "const app = require('express')();\nconst express = require('express');\nconst a = express();\na.get('/vendored', h);\n",
    );

    assert!(store()
        .resolve_sources_for_http_routes(root, &["/vendored"])
        .is_empty());
}
