use std::path::{Path, PathBuf};

use super::{heuristic, shared, AliasResolver};

const CONFIG_FILES: &[&str] = &["tsconfig.json", "jsconfig.json"];
const MAX_EXTENDS_DEPTH: usize = 5;

/// `compilerOptions.paths` + `baseUrl` from a tsconfig/jsconfig.
#[derive(Debug, Clone, PartialEq)]
pub struct TsPathsConfig {
    pub base_url: Option<PathBuf>,
    /// Directory `paths` targets are relative to (`baseUrl`, else the declaring config's dir).
    pub paths_base: PathBuf,
    pub paths: Vec<(String, Vec<String>)>,
}

impl AliasResolver for TsPathsConfig {
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        let mut matches: Vec<(&str, &[String], String)> = self
            .paths
            .iter()
            .filter_map(|(pattern, targets)| {
                match_pattern(pattern, specifier).map(|rest| (pattern.as_str(), targets.as_slice(), rest))
            })
            .collect();
        // Longest key wins.
        matches.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

        for (_, targets, rest) in matches {
            for target in targets {
                let expanded = target.replacen('*', &rest, 1);
                if let Some(hit) = shared::probe(&self.paths_base.join(expanded)) {
                    return Some(hit);
                }
            }
        }

        let base_url = self.base_url.as_ref()?;
        shared::probe(&base_url.join(specifier))
    }
}

/// Match a glob-star `paths` key against a specifier, returning the text the
/// `*` captured (empty for an exact key).
fn match_pattern(pattern: &str, specifier: &str) -> Option<String> {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            let rest = specifier.strip_prefix(prefix)?.strip_suffix(suffix)?;
            Some(rest.to_string())
        }
        None if pattern == specifier => Some(String::new()),
        None => None,
    }
}

/// Load a tsconfig.json/jsconfig.json located directly in `dir`.
pub(crate) fn load(dir: &Path) -> Option<TsPathsConfig> {
    let path = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())?;
    let partial = load_partial(&path, 0)?;

    let config_dir = path.parent()?.to_path_buf();
    let (paths_dir, paths) = partial.paths.unwrap_or((config_dir, Vec::new()));
    if partial.base_url.is_none() && paths.is_empty() {
        return None;
    }
    let paths_base = partial.base_url.clone().unwrap_or(paths_dir);
    Some(TsPathsConfig {
        base_url: partial.base_url,
        paths_base,
        paths,
    })
}

#[derive(Default)]
struct PartialConfig {
    base_url: Option<PathBuf>,
    paths: Option<(PathBuf, Vec<(String, Vec<String>)>)>,
}

fn load_partial(path: &Path, depth: usize) -> Option<PartialConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    let stripped = heuristic::strip_comments(&content);
    let val: serde_json::Value = match serde_json::from_str(&strip_trailing_commas(&stripped)) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to parse tsconfig");
            return None;
        }
    };
    let dir = path.parent()?;

    let mut inherited = val
        .get("extends")
        .and_then(serde_json::Value::as_str)
        .filter(|ext| ext.starts_with('.') && depth < MAX_EXTENDS_DEPTH)
        .and_then(|ext| {
            let target = dir.join(ext);
            let target = if target.is_file() {
                target
            } else {
                PathBuf::from(format!("{}.json", target.display()))
            };
            load_partial(&target, depth + 1)
        })
        .unwrap_or_default();

    let Some(compiler) = val.get("compilerOptions") else {
        return Some(inherited);
    };

    if let Some(base) = compiler.get("baseUrl").and_then(serde_json::Value::as_str) {
        inherited.base_url = Some(dir.join(base));
    }

    if let Some(paths) = compiler.get("paths").and_then(serde_json::Value::as_object) {
        let aliases = paths
            .iter()
            .map(|(pattern, targets)| {
                let replacements = targets
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                (pattern.clone(), replacements)
            })
            .collect();
        inherited.paths = Some((dir.to_path_buf(), aliases));
    }

    Some(inherited)
}

/// tsconfig tolerates trailing commas; serde_json does not.
fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut in_string = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if in_string {
            out.push(c);
            if c == '\\' && i + 1 < chars.len() {
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if c == '"' {
            in_string = true;
        }
        if c == ',' {
            let next = chars[i + 1..].iter().find(|n| !n.is_whitespace());
            if matches!(next, Some('}') | Some(']')) {
                i += 1;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn match_pattern_captures_star() {
        assert_eq!(match_pattern("@app/*", "@app/routes/users"), Some("routes/users".to_string()));
        assert_eq!(match_pattern("@app/*", "@other/x"), None);
        assert_eq!(match_pattern("config", "config"), Some(String::new()));
        assert_eq!(match_pattern("*.svc", "users.svc"), Some("users".to_string()));
    }

    #[test]
    fn strip_trailing_commas_outside_strings() {
        assert_eq!(strip_trailing_commas(r#"{"a": [1, 2,], "b": ",}",}"#), r#"{"a": [1, 2], "b": ",}"}"#);
    }

    #[test]
    fn load_parses_paths_and_base_url() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{
  // compiler settings
  "compilerOptions": {
    "baseUrl": ".",
    "paths": { "@app/*": ["src/*"] },
  }
}"#,
        )
        .unwrap();

        let cfg = load(dir.path()).unwrap();
        assert_eq!(cfg.base_url, Some(dir.path().join(".")));
        assert_eq!(cfg.paths, vec![("@app/*".to_string(), vec!["src/*".to_string()])]);
    }

    #[test]
    fn load_returns_none_without_aliasing_options() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tsconfig.json"), r#"{"compilerOptions":{"strict":true}}"#).unwrap();
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn load_returns_none_for_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tsconfig.json"), "{ not json").unwrap();
        assert!(load(dir.path()).is_none());
    }

    #[test]
    fn load_follows_relative_extends() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tsconfig.base.json"),
            r#"{"compilerOptions":{"baseUrl":"./src"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("tsconfig.json"),
            r#"{"extends":"./tsconfig.base","compilerOptions":{"strict":true}}"#,
        )
        .unwrap();

        let cfg = load(dir.path()).unwrap();
        assert_eq!(cfg.base_url, Some(dir.path().join("./src")));
    }

    #[test]
    fn resolve_alias_prefers_longest_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/routes")).unwrap();
        fs::create_dir_all(dir.path().join("special")).unwrap();
        fs::write(dir.path().join("src/routes/users.ts"), "").unwrap();
        let special = dir.path().join("special/users.ts");
        fs::write(&special, "").unwrap();

        let cfg = TsPathsConfig {
            base_url: None,
            paths_base: dir.path().to_path_buf(),
            paths: vec![
                ("@app/*".to_string(), vec!["src/*".to_string()]),
                ("@app/routes/*".to_string(), vec!["special/*".to_string()]),
            ],
        };
        assert_eq!(cfg.resolve_alias("@app/routes/users"), Some(special));
    }

    #[test]
    fn resolve_alias_falls_back_to_base_url() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        let target = dir.path().join("lib/db.js");
        fs::write(&target, "").unwrap();

        let cfg = TsPathsConfig {
            base_url: Some(dir.path().to_path_buf()),
            paths_base: dir.path().to_path_buf(),
            paths: Vec::new(),
        };
        assert_eq!(cfg.resolve_alias("lib/db"), Some(target));
        assert_eq!(cfg.resolve_alias("express"), None);
    }
}
