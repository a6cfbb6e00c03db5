//! `routescope`: static HTTP route to source resolution for Express-style
//! TypeScript/JavaScript codebases.
//!
//! Parses candidate files with tree-sitter, resolves imports through
//! tsconfig/babel/jest/metro aliases, walks router mounts from each app, and
//! answers "which files serve `/api/users/42`?" and the reverse.

pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod index;
pub mod model;
pub mod parser;
pub mod resolve;
pub mod search;
pub mod selection;
pub mod trie;
pub mod util;

pub use config::IndexOptions;
pub use error::RouteError;
pub use index::{RouteIndex, RouteIndexStore};
pub use model::HttpMethod;
