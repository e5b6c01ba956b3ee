mod dart;
mod javascript;
mod python;

use std::sync::Arc;

pub use dart::DartResolver;
pub use javascript::JavaScriptResolver;
pub use python::PythonResolver;

use crate::application::ImportResolver;

/// Every language resolver the linker dispatches over. Languages without a
/// resolver simply never produce structural import links.
pub fn default_resolvers() -> Vec<Arc<dyn ImportResolver>> {
    vec![
        Arc::new(PythonResolver),
        Arc::new(JavaScriptResolver),
        Arc::new(DartResolver),
    ]
}
