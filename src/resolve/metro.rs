use std::path::{Path, PathBuf};

use super::{heuristic, shared, AliasResolver};

const CONFIG_FILES: &[&str] = &["metro.config.js", "metro.config.cjs"];

/// `resolver.extraNodeModules` from a Metro config.
#[derive(Debug, Clone, PartialEq)]
pub struct MetroAliasConfig {
    pub aliases: Vec<(String, PathBuf)>,
}

impl AliasResolver for MetroAliasConfig {
    fn resolve_alias(&self, specifier: &str) -> Option<PathBuf> {
        let (_, base, rest) = self
            .aliases
            .iter()
            .filter_map(|(key, target)| {
                if specifier == key {
                    return Some((key.len(), target, ""));
                }
                let rest = specifier.strip_prefix(key.as_str())?.strip_prefix('/')?;
                Some((key.len(), target, rest))
            })
            .max_by_key(|(len, _, _)| *len)?;

        if rest.is_empty() {
            shared::probe(base)
        } else {
            shared::probe(&base.join(rest))
        }
    }
}

/// Load `extraNodeModules` from a Metro config located directly in `dir`.
pub(crate) fn load(dir: &Path) -> Option<MetroAliasConfig> {
    let path = CONFIG_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())?;
    let content = std::fs::read_to_string(&path).ok()?;
    let text = heuristic::strip_comments(&content);
    let body = heuristic::object_body(&text, "extraNodeModules")?;

    let aliases: Vec<(String, PathBuf)> = heuristic::object_entries(body)
        .into_iter()
        .filter_map(|(key, expr)| Some((key, eval_path_expr(dir, &expr)?)))
        .collect();

    if aliases.is_empty() {
        None
    } else {
        Some(MetroAliasConfig { aliases })
    }
}

/// Evaluate the path expressions commonly found in Metro configs:
/// `'./src'`, `path.resolve(__dirname, 'src')`, `path.join(__dirname, 'a', 'b')`,
/// `__dirname + '/src'` and `` `${__dirname}/src` ``.
fn eval_path_expr(dir: &Path, expr: &str) -> Option<PathBuf> {
    if let Some(literal) = heuristic::single_literal(expr) {
        if let Some(rest) = literal.strip_prefix("${__dirname}") {
            return Some(join_parts(dir, &[rest.to_string()]));
        }
        if literal.contains("${") {
            return None;
        }
        let path = Path::new(&literal);
        return if path.is_absolute() {
            Some(path.to_path_buf())
        } else if literal.starts_with('.') {
            Some(dir.join(path))
        } else {
            None
        };
    }

    if !expr.contains("__dirname") {
        return None;
    }
    let parts = heuristic::literal_strings(expr);
    Some(join_parts(dir, &parts))
}

fn join_parts(dir: &Path, parts: &[String]) -> PathBuf {
    parts.iter().fold(dir.to_path_buf(), |acc, part| {
        let trimmed = part.trim_start_matches('/');
        if trimmed.is_empty() {
            acc
        } else {
            acc.join(trimmed)
        }
    })
}
