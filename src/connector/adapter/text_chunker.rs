//! Line-level chunkers for languages without a tree-sitter grammar: SQL
//! statements, Firestore security rules, and Mermaid diagrams embedded in
//! Markdown. HTML and CSS fall through to the synthetic whole-file chunk.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::application::ParsedFile;
use crate::domain::{Chunk, Language, SymbolKind, Usage, UsageKind};

pub fn parse(content: &str, filename: &str, language: Language) -> ParsedFile {
    match language {
        Language::Sql => parse_sql(content, filename),
        Language::Firestore => parse_firestore(content, filename),
        Language::Markdown => parse_markdown(content, filename),
        _ => ParsedFile::default(),
    }
}

fn match_path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*match\s+(\S+)").expect("match regex"))
}

fn rules_function_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*function\s+(\w+)\s*\(").expect("function regex"))
}

fn call_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\w+)\s*\(").expect("call regex"))
}

fn mermaid_node_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `A[Label]`, `B(Label)`, `C{Label}` node definitions.
    RE.get_or_init(|| Regex::new(r"(\w+)\s*[\[({]([^\])}]+)[\])}]").expect("mermaid regex"))
}

fn dart_import_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\s*(?:import|export)\s+['"]([^'"]+)['"]"#).expect("dart regex"))
}

/// Import strings declared by a Dart file.
pub fn scan_dart_imports(content: &str) -> Vec<String> {
    let mut imports = Vec::new();
    for line in content.lines() {
        if let Some(caps) = dart_import_regex().captures(line) {
            let import = caps[1].to_string();
            if !imports.contains(&import) {
                imports.push(import);
            }
        }
    }
    imports
}

/// Each `CREATE` or `SELECT` statement becomes one chunk. CREATE statements
/// are named after the object they create; SELECT blocks get a line-anchored
/// synthetic name.
fn parse_sql(content: &str, filename: &str) -> ParsedFile {
    let mut chunks = Vec::new();

    let mut statement = String::new();
    let mut start_line = 0u32;
    let lines: Vec<&str> = content.lines().collect();

    for (i, line) in lines.iter().enumerate() {
        if statement.trim().is_empty() {
            start_line = i as u32 + 1;
            statement.clear();
        }
        statement.push_str(line);
        statement.push('\n');

        if line.trim_end().ends_with(';') || i == lines.len() - 1 {
            let end_line = i as u32 + 1;
            if let Some(chunk) =
                sql_statement_chunk(&statement, filename, start_line, end_line)
            {
                chunks.push(chunk);
            }
            statement.clear();
        }
    }

    ParsedFile {
        chunks,
        usages: Vec::new(),
        dependencies: Vec::new(),
    }
}

fn sql_statement_chunk(
    statement: &str,
    filename: &str,
    start_line: u32,
    end_line: u32,
) -> Option<Chunk> {
    let trimmed = statement.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_uppercase();

    let symbol_name = if upper.starts_with("CREATE") {
        // Skip modifiers to the created object's name:
        // CREATE [OR REPLACE] [TEMP] TABLE [IF NOT EXISTS] name ...
        let words: Vec<&str> = trimmed.split_whitespace().collect();
        let skip: HashSet<&str> = [
            "CREATE", "OR", "REPLACE", "TEMP", "TEMPORARY", "TABLE", "VIEW", "INDEX",
            "UNIQUE", "FUNCTION", "TRIGGER", "SCHEMA", "IF", "NOT", "EXISTS",
        ]
        .into();
        words
            .iter()
            .find(|w| !skip.contains(w.to_uppercase().as_str()))
            .map(|w| w.trim_end_matches('(').trim_matches('"').to_string())?
    } else if upper.starts_with("SELECT") {
        format!("select:{start_line}")
    } else {
        return None;
    };

    Some(Chunk::new(
        filename,
        symbol_name,
        SymbolKind::Chunk,
        start_line,
        end_line,
        statement.trim_end(),
        Language::Sql,
    ))
}

/// Each `match` path becomes a `match_path` chunk named by the literal path;
/// rules functions become `function` chunks, and calls to them from inside a
/// match block are recorded as `match_target` usages.
fn parse_firestore(content: &str, filename: &str) -> ParsedFile {
    let lines: Vec<&str> = content.lines().collect();

    // First pass: function names defined anywhere in the file.
    let mut function_names: HashSet<String> = HashSet::new();
    for line in &lines {
        if let Some(caps) = rules_function_regex().captures(line) {
            function_names.insert(caps[1].to_string());
        }
    }

    let mut chunks: Vec<Chunk> = Vec::new();
    let mut usages: Vec<Usage> = Vec::new();

    // (chunk index, brace depth at open) for blocks still open.
    let mut open_blocks: Vec<(usize, i32)> = Vec::new();
    let mut depth = 0i32;

    for (i, line) in lines.iter().enumerate() {
        let line_no = i as u32 + 1;

        if let Some(caps) = match_path_regex().captures(line) {
            let path = caps[1].to_string();
            let chunk = Chunk::new(
                filename,
                path,
                SymbolKind::MatchPath,
                line_no,
                line_no,
                *line,
                Language::Firestore,
            );
            chunks.push(chunk);
            open_blocks.push((chunks.len() - 1, depth));
        } else if let Some(caps) = rules_function_regex().captures(line) {
            let name = caps[1].to_string();
            let chunk = Chunk::new(
                filename,
                name,
                SymbolKind::Function,
                line_no,
                line_no,
                *line,
                Language::Firestore,
            );
            chunks.push(chunk);
            open_blocks.push((chunks.len() - 1, depth));
        } else if let Some((idx, _)) = open_blocks.last() {
            // Calls to rules functions inside the innermost open block.
            for caps in call_regex().captures_iter(line) {
                let callee = caps[1].to_string();
                if function_names.contains(&callee) {
                    usages.push(Usage::new(
                        chunks[*idx].id().to_string(),
                        callee,
                        UsageKind::MatchTarget,
                        line_no,
                    ));
                }
            }
        }

        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    while let Some((idx, open_depth)) = open_blocks.last().copied() {
                        if depth <= open_depth {
                            let (start, name, kind) = {
                                let c = &chunks[idx];
                                (c.start_line(), c.symbol_name().to_string(), c.symbol_kind())
                            };
                            let body: String = lines[(start as usize - 1)..=i].join("\n");
                            chunks[idx] = Chunk::new(
                                filename,
                                name,
                                kind,
                                start,
                                line_no,
                                body,
                                Language::Firestore,
                            );
                            open_blocks.pop();
                        } else {
                            break;
                        }
                    }
                }
                _ => {}
            }
        }
    }

    // Usages reference chunk ids computed before the block close rewrote
    // end lines; rebuild them against the final chunks by line containment.
    let usages = usages
        .into_iter()
        .map(|u| {
            let id = chunks
                .iter()
                .filter(|c| c.contains_line(u.line()))
                .min_by_key(|c| c.line_count())
                .map(|c| c.id().to_string())
                .unwrap_or_else(|| u.containing_chunk_id().to_string());
            let mut rebuilt = Usage::new(id, u.referenced_name(), u.kind(), u.line());
            if let Some(ctx) = u.context() {
                rebuilt = rebuilt.with_context(ctx);
            }
            rebuilt
        })
        .collect();

    ParsedFile {
        chunks,
        usages,
        dependencies: Vec::new(),
    }
}

/// Every node label in a Mermaid fence becomes a `diagram_node` chunk.
fn parse_markdown(content: &str, filename: &str) -> ParsedFile {
    let mut chunks = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut in_mermaid = false;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_mermaid = trimmed.trim_start_matches('`').trim().starts_with("mermaid");
            continue;
        }
        if !in_mermaid {
            continue;
        }
        for caps in mermaid_node_regex().captures_iter(line) {
            let label = caps[2].trim().to_string();
            if label.is_empty() || !seen.insert(label.clone()) {
                continue;
            }
            let line_no = i as u32 + 1;
            chunks.push(Chunk::new(
                filename,
                label,
                SymbolKind::DiagramNode,
                line_no,
                line_no,
                line,
                Language::Markdown,
            ));
        }
    }

    ParsedFile {
        chunks,
        usages: Vec::new(),
        dependencies: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_create_and_select_chunks() {
        let content = "CREATE TABLE IF NOT EXISTS users (\n  id INTEGER\n);\n\nSELECT * FROM users;\n";
        let parsed = parse(content, "schema.sql", Language::Sql);

        assert_eq!(parsed.chunks.len(), 2);
        assert_eq!(parsed.chunks[0].symbol_name(), "users");
        assert_eq!(parsed.chunks[0].start_line(), 1);
        assert_eq!(parsed.chunks[0].end_line(), 3);
        assert_eq!(parsed.chunks[1].symbol_name(), "select:5");
    }

    #[test]
    fn test_sql_ignores_other_statements() {
        let content = "INSERT INTO t VALUES (1);\nSELECT 1;\n";
        let parsed = parse(content, "x.sql", Language::Sql);
        assert_eq!(parsed.chunks.len(), 1);
        assert!(parsed.chunks[0].symbol_name().starts_with("select:"));
    }

    #[test]
    fn test_firestore_match_paths() {
        let content = r#"
rules_version = '2';
service cloud.firestore {
  match /databases/{database}/documents {
    function isOwner(uid) {
      return request.auth.uid == uid;
    }
    match /users/{userId} {
      allow read: if isOwner(userId);
    }
  }
}
"#;
        let parsed = parse(content, "firestore.rules", Language::Firestore);

        let paths: Vec<&str> = parsed
            .chunks
            .iter()
            .filter(|c| c.symbol_kind() == SymbolKind::MatchPath)
            .map(|c| c.symbol_name())
            .collect();
        assert!(paths.contains(&"/databases/{database}/documents"));
        assert!(paths.contains(&"/users/{userId}"));

        let func = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "isOwner")
            .expect("rules function chunk");
        assert_eq!(func.symbol_kind(), SymbolKind::Function);

        let usage = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "isOwner")
            .expect("call from match block");
        assert_eq!(usage.kind(), UsageKind::MatchTarget);
    }

    #[test]
    fn test_markdown_mermaid_nodes() {
        let content = r#"
# Architecture

```mermaid
graph TD
    A[Indexer] --> B[VectorStore]
    B --> C[Retriever]
```

Regular text with [a link](x) that is not a node.
"#;
        let parsed = parse(content, "docs/arch.md", Language::Markdown);

        let labels: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(labels.contains(&"Indexer"));
        assert!(labels.contains(&"VectorStore"));
        assert!(labels.contains(&"Retriever"));
        assert!(!labels.contains(&"a link"));
        for chunk in &parsed.chunks {
            assert_eq!(chunk.symbol_kind(), SymbolKind::DiagramNode);
        }
    }

    #[test]
    fn test_dart_import_scan() {
        let content = "import 'package:flutter/material.dart';\nimport 'login_screen.dart';\n\nclass X {}\n";
        let imports = scan_dart_imports(content);
        assert_eq!(
            imports,
            vec![
                "package:flutter/material.dart".to_string(),
                "login_screen.dart".to_string()
            ]
        );
    }
}
