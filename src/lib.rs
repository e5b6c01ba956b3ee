//! # code-intel
//!
//! A local code-intelligence engine: it ingests a source repository, parses
//! each file into semantic chunks, embeds the chunks as dense vectors,
//! persists a symbol-level knowledge graph, and answers semantic search,
//! definition, reference, and statistics queries over MCP (stdio) or the CLI.
//!
//! ## Architecture
//!
//! - `domain`: models (chunks, usages, edges, projects), path and filter
//!   hygiene, errors
//! - `application`: service traits and the indexing/retrieval use cases
//! - `connector`: external integrations (tree-sitter, DuckDB, the embedding
//!   endpoint, git, MCP)

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::Config;
pub use connector::*;
pub use domain::*;
