use std::path::Path;

use tree_sitter::{Language, Parser, Tree};

use crate::error::RouteError;

/// Extensions the route extractor is willing to parse.
pub const SOURCE_EXTENSIONS: &[&str] = &["ts", "tsx", "js", "jsx", "mjs", "cjs", "mts", "cts"];

/// Detect the tree-sitter language from a file extension.
///
/// JSX-capable extensions get the TSX grammar; everything else in the JS/TS
/// family is parsed with the TypeScript grammar, which accepts plain JS.
pub fn detect_language(ext: &str) -> Result<Language, RouteError> {
    match ext {
        "tsx" | "jsx" => Ok(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "ts" | "mts" | "cts" | "js" | "mjs" | "cjs" => {
            Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
        }
        _ => Err(RouteError::UnsupportedExtension(ext.to_string())),
    }
}

/// Parse already-loaded source text using the grammar chosen by `path`'s extension.
pub fn parse_source(path: &Path, source: &str) -> Result<Tree, RouteError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = detect_language(ext)?;

    let mut parser = Parser::new();
    parser
        .set_language(&language)
        .map_err(|e| RouteError::ParseFailed(e.to_string()))?;

    parser
        .parse(source, None)
        .ok_or_else(|| RouteError::ParseFailed(path.display().to_string()))
}

/// Read and parse a source file, returning the tree-sitter tree and source text.
pub fn parse_file(path: &Path) -> Result<(Tree, String), RouteError> {
    let source = std::fs::read_to_string(path).map_err(|e| RouteError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let tree = parse_source(path, &source)?;
    Ok((tree, source))
}
