mod delete_project;
mod find_definition;
mod find_references;
mod project_stats;
mod refresh_index;
pub mod scope;
mod search_code;

pub use delete_project::*;
pub use find_definition::*;
pub use find_references::*;
pub use project_stats::*;
pub use refresh_index::*;
pub use search_code::*;
