use std::path::{Path, PathBuf};

/// Probe order for extensionless specifiers. The empty entry tries the path as written.
pub(crate) const EXTENSIONS: &[&str] = &[
    "", "ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts", "json",
];

/// Probe `base` against the default extension list, then `base/index.<ext>`.
pub(crate) fn probe(base: &Path) -> Option<PathBuf> {
    probe_with(base, EXTENSIONS)
}

/// Probe `base` against `exts` (an empty entry means "as written"), then the
/// directory index, then the TypeScript sibling of an ESM-style `.js` path.
pub(crate) fn probe_with(base: &Path, exts: &[&str]) -> Option<PathBuf> {
    for ext in exts {
        let candidate = with_appended_extension(base, ext);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    for ext in exts.iter().filter(|e| !e.is_empty()) {
        let candidate = base.join(format!("index.{ext}"));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    ts_sibling(base)
}

/// `./users.controller` must become `users.controller.ts`, so extensions are
/// appended rather than swapped.
fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    if ext.is_empty() {
        return base.to_path_buf();
    }
    let mut raw = base.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

fn ts_sibling(base: &Path) -> Option<PathBuf> {
    let ext = base.extension().and_then(|e| e.to_str())?;
    let replacements: &[&str] = match ext {
        "js" => &["ts", "tsx"],
        "jsx" => &["tsx"],
        "mjs" => &["mts"],
        "cjs" => &["cts"],
        _ => return None,
    };
    replacements
        .iter()
        .map(|r| base.with_extension(r))
        .find(|candidate| candidate.is_file())
}
