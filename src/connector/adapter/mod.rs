mod duckdb_knowledge_graph;
mod duckdb_vector_store;
pub mod embedding_cache;
mod git_meta;
mod http_embedding;
pub mod mcp;
mod mock_embedding;
pub mod resolver;
pub mod text_chunker;
mod treesitter_parser;

pub use duckdb_knowledge_graph::*;
pub use duckdb_vector_store::*;
pub use embedding_cache::EmbeddingCache;
pub use git_meta::*;
pub use http_embedding::*;
pub use mock_embedding::*;
pub use treesitter_parser::*;
