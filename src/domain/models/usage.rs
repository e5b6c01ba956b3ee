use serde::{Deserialize, Serialize};

/// A transient record of a name reference, produced by the parser and
/// consumed by the linker. Usages are never persisted; they exist only to
/// become edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    containing_chunk_id: String,
    referenced_name: String,
    kind: UsageKind,
    context: Option<String>,
    line: u32,
}

impl Usage {
    pub fn new(
        containing_chunk_id: impl Into<String>,
        referenced_name: impl Into<String>,
        kind: UsageKind,
        line: u32,
    ) -> Self {
        Self {
            containing_chunk_id: containing_chunk_id.into(),
            referenced_name: referenced_name.into(),
            kind,
            context: None,
            line,
        }
    }

    /// Attach the enclosing call identifier (e.g. `Depends` for an argument
    /// of a dependency-injection call, or `inherits` for a base class).
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn containing_chunk_id(&self) -> &str {
        &self.containing_chunk_id
    }

    pub fn referenced_name(&self) -> &str {
        &self.referenced_name
    }

    pub fn kind(&self) -> UsageKind {
        self.kind
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageKind {
    Call,
    Decorator,
    Instantiation,
    Reference,
    MatchTarget,
}

impl UsageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageKind::Call => "call",
            UsageKind::Decorator => "decorator",
            UsageKind::Instantiation => "instantiation",
            UsageKind::Reference => "reference",
            UsageKind::MatchTarget => "match_target",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_with_context() {
        let usage = Usage::new("abc123", "verify_token", UsageKind::Call, 7)
            .with_context("Depends");
        assert_eq!(usage.referenced_name(), "verify_token");
        assert_eq!(usage.context(), Some("Depends"));
        assert_eq!(usage.kind(), UsageKind::Call);
    }
}
