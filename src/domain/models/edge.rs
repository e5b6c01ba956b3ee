use serde::{Deserialize, Serialize};

use super::{Usage, UsageKind};

/// A persisted relation between two chunks in the knowledge graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    source_id: String,
    target_id: String,
    kind: EdgeKind,
    confidence: Confidence,
    project: String,
    /// Filename of the source chunk, denormalized so that incremental
    /// passes can clear a file's outgoing edges without a join.
    source_file: String,
}

impl Edge {
    pub fn new(
        project: impl Into<String>,
        source_id: impl Into<String>,
        source_file: impl Into<String>,
        target_id: impl Into<String>,
        kind: EdgeKind,
        confidence: Confidence,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            confidence,
            project: project.into(),
            source_file: source_file.into(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Call,
    Import,
    Inherit,
    Instantiate,
    Decorator,
    Reference,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Call => "call",
            EdgeKind::Import => "import",
            EdgeKind::Inherit => "inherit",
            EdgeKind::Instantiate => "instantiate",
            EdgeKind::Decorator => "decorator",
            EdgeKind::Reference => "reference",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "call" => EdgeKind::Call,
            "import" => EdgeKind::Import,
            "inherit" => EdgeKind::Inherit,
            "instantiate" => EdgeKind::Instantiate,
            "decorator" => EdgeKind::Decorator,
            _ => EdgeKind::Reference,
        }
    }

    /// Edge kind implied by a usage. An inheritance reference is tagged by
    /// the parser with context `inherits`.
    pub fn from_usage(usage: &Usage) -> Self {
        if usage.context() == Some("inherits") {
            return EdgeKind::Inherit;
        }
        match usage.kind() {
            UsageKind::Call => EdgeKind::Call,
            UsageKind::Decorator => EdgeKind::Decorator,
            UsageKind::Instantiation => EdgeKind::Instantiate,
            UsageKind::Reference | UsageKind::MatchTarget => EdgeKind::Reference,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How an edge was derived: structural edges come from AST plus import
/// resolution; name-match edges from symbol-name equality alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Structural,
    NameMatch,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Structural => "structural",
            Confidence::NameMatch => "name_match",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "structural" => Confidence::Structural,
            _ => Confidence::NameMatch,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_roundtrip() {
        for kind in [
            EdgeKind::Call,
            EdgeKind::Import,
            EdgeKind::Inherit,
            EdgeKind::Instantiate,
            EdgeKind::Decorator,
            EdgeKind::Reference,
        ] {
            assert_eq!(EdgeKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_edge_kind_from_usage() {
        let call = Usage::new("c1", "foo", UsageKind::Call, 1);
        assert_eq!(EdgeKind::from_usage(&call), EdgeKind::Call);

        let widget = Usage::new("c1", "LoginScreen", UsageKind::Instantiation, 3);
        assert_eq!(EdgeKind::from_usage(&widget), EdgeKind::Instantiate);

        let base = Usage::new("c1", "BaseModel", UsageKind::Reference, 2)
            .with_context("inherits");
        assert_eq!(EdgeKind::from_usage(&base), EdgeKind::Inherit);
    }

    #[test]
    fn test_confidence_parse() {
        assert_eq!(Confidence::parse("structural"), Confidence::Structural);
        assert_eq!(Confidence::parse("name_match"), Confidence::NameMatch);
    }
}
