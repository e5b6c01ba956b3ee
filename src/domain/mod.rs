mod error;
pub mod models;
pub mod paths;
pub mod sanitize;

pub use error::*;
pub use models::*;
