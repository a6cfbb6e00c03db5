use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::Value;

use super::{heuristic, shared, AliasResolver};

const JS_FILES: &[&str] = &[
    "jest.config.js",
    "jest.config.ts",
    "jest.config.cjs",
    "jest.config.mjs",
];

/// `moduleNameMapper` + `moduleDirectories` from a Jest config.
#[derive(Debug, Clone)]
pub struct JestAliasConfig {
    pub root_dir: PathBuf,
    /// Declaration order matters: the first matching regex wins.
    pub mappers: Vec<(Regex, Vec<String>)>,
    pub module_directories: Vec<String>,
}

impl AliasResolver for JestAliasConfig {
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        if let Some((re, targets)) = self.mappers.iter().find(|(re, _)| re.is_match(specifier)) {
            let caps = re.captures(specifier)?;
            return targets.iter().find_map(|target| {
                let mapped = substitute_captures(target, &caps);
                let mapped = mapped.replace("<rootDir>", &self.root_dir.to_string_lossy());
                let path = Path::new(&mapped);
                if path.is_absolute() {
                    shared::probe(path)
                } else if mapped.starts_with('.') {
                    shared::probe(&self.root_dir.join(path))
                } else {
                    None
                }
            });
        }

        self.module_directories
            .iter()
            .filter(|d| d.as_str() != "node_modules")
            .find_map(|d| shared::probe(&self.root_dir.join(d).join(specifier)))
    }
}

/// Replace `$1`..`$9` with the corresponding capture groups.
fn substitute_captures(target: &str, caps: &regex::Captures<'_>) -> String {
    let mut out = String::with_capacity(target.len());
    let mut chars = target.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '$' {
            if let Some(d) = chars.peek().and_then(|n| n.to_digit(10)) {
                chars.next();
                out.push_str(caps.get(d as usize).map_or("", |m| m.as_str()));
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Load Jest options from a config located directly in `dir`.
pub(crate) fn load(dir: &Path) -> Option<JestAliasConfig> {
    let json = dir.join("jest.config.json");
    if json.is_file() {
        let content = std::fs::read_to_string(&json).ok()?;
        return match serde_json::from_str::<Value>(&content) {
            Ok(val) => from_json(dir, &val),
            Err(e) => {
                tracing::warn!(path = %json.display(), error = %e, "failed to parse jest config");
                None
            }
        };
    }

    for name in JS_FILES {
        let path = dir.join(name);
        if path.is_file() {
            let content = std::fs::read_to_string(&path).ok()?;
            return from_js(dir, &content);
        }
    }

    let package = dir.join("package.json");
    if package.is_file() {
        let content = std::fs::read_to_string(&package).ok()?;
        let val: Value = serde_json::from_str(&content).ok()?;
        return from_json(dir, val.get("jest")?);
    }

    None
}

fn from_json(dir: &Path, val: &Value) -> Option<JestAliasConfig> {
    let root_dir = val
        .get("rootDir")
        .and_then(Value::as_str)
        .map_or_else(|| dir.to_path_buf(), |r| dir.join(r));

    let raw_mappers = val
        .get("moduleNameMapper")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .map(|(k, v)| {
                    let targets = match v {
                        Value::String(s) => vec![s.clone()],
                        Value::Array(arr) => arr.iter().filter_map(|t| t.as_str().map(String::from)).collect(),
                        _ => Vec::new(),
                    };
                    (k.clone(), targets)
                })
                .collect()
        })
        .unwrap_or_default();

    let module_directories = val
        .get("moduleDirectories")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();

    build(root_dir, raw_mappers, module_directories)
}

fn from_js(dir: &Path, content: &str) -> Option<JestAliasConfig> {
    let text = heuristic::strip_comments(content);

    let root_dir = heuristic::string_value(&text, "rootDir")
        .filter(|r| !r.contains("<rootDir>"))
        .map_or_else(|| dir.to_path_buf(), |r| dir.join(r));

    let raw_mappers = heuristic::object_body(&text, "moduleNameMapper")
        .map(|body| {
            heuristic::object_entries(body)
                .into_iter()
                .map(|(k, v)| (k, heuristic::literal_strings(&v)))
                .collect()
        })
        .unwrap_or_default();

    let module_directories = heuristic::array_body(&text, "moduleDirectories")
        .map(heuristic::literal_strings)
        .unwrap_or_default();

    build(root_dir, raw_mappers, module_directories)
}

fn build(
    root_dir: PathBuf,
    raw_mappers: Vec<(String, Vec<String>)>,
    module_directories: Vec<String>,
) -> Option<JestAliasConfig> {
    let mappers: Vec<(Regex, Vec<String>)> = raw_mappers
        .into_iter()
        .filter_map(|(pattern, targets)| match Regex::new(&pattern) {
            Ok(re) => Some((re, targets)),
            Err(e) => {
                tracing::debug!(%pattern, error = %e, "skipping unsupported moduleNameMapper regex");
                None
            }
        })
        .collect();

    let has_module_dirs = module_directories.iter().any(|d| d != "node_modules");
    if mappers.is_empty() && !has_module_dirs {
        return None;
    }

    Some(JestAliasConfig {
        root_dir,
        mappers,
        module_directories,
    })
}
