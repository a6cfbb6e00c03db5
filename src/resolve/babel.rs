use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{heuristic, shared, AliasResolver};

const JSON_FILES: &[&str] = &[".babelrc", ".babelrc.json", "babel.config.json"];
const JS_FILES: &[&str] = &[
    "babel.config.js",
    "babel.config.cjs",
    "babel.config.mjs",
    ".babelrc.js",
    ".babelrc.cjs",
];
const PLUGIN_NAMES: &[&str] = &["module-resolver", "babel-plugin-module-resolver"];

/// Options of `babel-plugin-module-resolver`.
#[derive(Debug, Clone, PartialEq)]
pub struct BabelAliasConfig {
    pub dir: PathBuf,
    pub aliases: Vec<(String, String)>,
    pub roots: Vec<PathBuf>,
    /// Probe extensions without the dot; empty means the default list.
    pub extensions: Vec<String>,
}

impl AliasResolver for BabelAliasConfig {
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        let best = self
            .aliases
            .iter()
            .filter_map(|(key, target)| {
                expand_alias(key, target, specifier).map(|expanded| (key.len(), expanded))
            })
            .max_by_key(|(len, _)| *len);

        if let Some((_, expanded)) = best {
            if let Some(hit) = self.probe_target(&expanded) {
                return Some(hit);
            }
        }

        self.roots
            .iter()
            .find_map(|root| self.probe(&root.join(specifier)))
    }
}

impl BabelAliasConfig {
    fn probe_target(&self, target: &str) -> Option<PathBuf> {
        let path = Path::new(target);
        if path.is_absolute() {
            return self.probe(path);
        }
        if target.starts_with('.') {
            return self.probe(&self.dir.join(path));
        }
        // Bare targets point into node_modules.
        None
    }

    fn probe(&self, base: &Path) -> Option<PathBuf> {
        if self.extensions.is_empty() {
            return shared::probe(base);
        }
        let exts: Vec<&str> = std::iter::once("")
            .chain(self.extensions.iter().map(String::as_str))
            .collect();
        shared::probe_with(base, &exts)
    }
}

/// Apply one alias entry to a specifier.
///
/// `"@app/*": "./src/*"` is a glob-star alias; `"@app": "./src"` matches the
/// key itself or the key followed by a `/` subpath.
fn expand_alias(key: &str, target: &str, specifier: &str) -> Option<String> {
    if let Some(prefix) = key.strip_suffix('*') {
        let rest = specifier.strip_prefix(prefix)?;
        return Some(if target.contains('*') {
            target.replacen('*', rest, 1)
        } else {
            format!("{}/{}", target.trim_end_matches('/'), rest)
        });
    }
    if specifier == key {
        return Some(target.to_string());
    }
    let rest = specifier.strip_prefix(key)?.strip_prefix('/')?;
    Some(format!("{}/{}", target.trim_end_matches('/'), rest))
}

/// Load module-resolver options from a babel config located directly in `dir`.
pub(crate) fn load(dir: &Path) -> Option<BabelAliasConfig> {
    for name in JSON_FILES {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        return load_json(dir, &path);
    }

    for name in JS_FILES {
        let path = dir.join(name);
        if !path.is_file() {
            continue;
        }
        let content = std::fs::read_to_string(&path).ok()?;
        return from_js(dir, &content);
    }

    let package = dir.join("package.json");
    if package.is_file() {
        let content = std::fs::read_to_string(&package).ok()?;
        let val: Value = serde_json::from_str(&content).ok()?;
        return from_json(dir, val.get("babel")?);
    }

    None
}

fn load_json(dir: &Path, path: &Path) -> Option<BabelAliasConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str::<Value>(&heuristic::strip_comments(&content)) {
        Ok(val) => from_json(dir, &val),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse babel config");
            None
        }
    }
}

fn from_json(dir: &Path, val: &Value) -> Option<BabelAliasConfig> {
    let plugins = val.get("plugins")?.as_array()?;
    let options = plugins.iter().find_map(|plugin| {
        let entry = plugin.as_array()?;
        let name = entry.first()?.as_str()?;
        if PLUGIN_NAMES.contains(&name) {
            entry.get(1)
        } else {
            None
        }
    })?;

    let aliases = options
        .get("alias")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| Some((k.clone(), v.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();

    let roots = match options.get("root") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(arr)) => arr.iter().filter_map(|v| v.as_str().map(String::from)).collect(),
        _ => Vec::new(),
    };

    let extensions = options
        .get("extensions")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    Some(build(dir, aliases, roots, extensions))
}

fn from_js(dir: &Path, content: &str) -> Option<BabelAliasConfig> {
    if !content.contains("module-resolver") {
        return None;
    }
    let text = heuristic::strip_comments(content);

    let aliases = heuristic::object_body(&text, "alias")
        .map(|body| {
            heuristic::object_entries(body)
                .into_iter()
                .filter_map(|(k, v)| Some((k, heuristic::single_literal(&v)?)))
                .collect()
        })
        .unwrap_or_default();

    let roots = heuristic::array_body(&text, "root")
        .map(heuristic::literal_strings)
        .or_else(|| heuristic::string_value(&text, "root").map(|r| vec![r]))
        .unwrap_or_default();

    let extensions = heuristic::array_body(&text, "extensions")
        .map(heuristic::literal_strings)
        .unwrap_or_default();

    Some(build(dir, aliases, roots, extensions))
}

fn build(
    dir: &Path,
    aliases: Vec<(String, String)>,
    roots: Vec<String>,
    extensions: Vec<String>,
) -> BabelAliasConfig {
    BabelAliasConfig {
        dir: dir.to_path_buf(),
        aliases,
        roots: roots
            .iter()
            // Glob roots ("./src/**") are not search directories we can probe.
            .filter(|r| !r.contains('*'))
            .map(|r| dir.join(r))
            .collect(),
        extensions: extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect(),
    }
}
