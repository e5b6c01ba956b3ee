use std::collections::HashMap;

use async_trait::async_trait;
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Node, Parser, Query, QueryCursor};

use crate::application::{ParsedFile, ParserService};
use crate::connector::adapter::text_chunker;
use crate::domain::{
    content_hash, Chunk, DomainError, Language, SymbolKind, Usage, UsageKind,
};

/// Calls whose arguments are injected dependencies; an identifier argument of
/// `Depends(verify_token)` is a usage of `verify_token` with context
/// `Depends`.
const INJECTION_FUNCTIONS: &[&str] = &["Depends", "Inject", "Provide"];

/// Normalize import paths by stripping surrounding delimiters.
/// - Go imports: "fmt" -> fmt
/// - C++ string includes: "header.h" -> header.h
/// - C++ system includes: <iostream> -> iostream
fn normalize_import_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() < 2 {
        return trimmed.to_string();
    }

    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return trimmed[1..trimmed.len() - 1].to_string();
    }

    trimmed.to_string()
}

/// Collapse runs of whitespace to single spaces.
fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Names too generic to be worth an edge.
fn is_noise_name(name: &str) -> bool {
    name.len() < 2
        || matches!(
            name,
            "if" | "else"
                | "for"
                | "while"
                | "return"
                | "true"
                | "false"
                | "null"
                | "None"
                | "self"
                | "this"
                | "super"
                | "print"
                | "println"
                | "len"
                | "str"
                | "int"
                | "bool"
                | "float"
                | "void"
                | "String"
                | "Object"
                | "List"
                | "Map"
                | "Set"
                | "Vec"
                | "Some"
                | "Ok"
                | "Err"
        )
}

pub struct TreeSitterParser {
    supported: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported: Language::all_supported(),
        }
    }

    fn ts_language(&self, language: Language, filename: &str) -> Option<tree_sitter::Language> {
        match language {
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => {
                if filename.ends_with(".tsx") {
                    Some(tree_sitter_typescript::LANGUAGE_TSX.into())
                } else {
                    Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
                }
            }
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Java => Some(tree_sitter_java::LANGUAGE.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Dart => Some(tree_sitter_dart::language()),
            _ => None,
        }
    }

    /// Definition query per language. Captures: `@name` for the declared
    /// identifier, plus one of `@function` / `@class` / `@method` /
    /// `@variable` / `@constant` on the definition node itself.
    fn chunk_query(&self, language: Language) -> &'static str {
        match language {
            Language::Python => {
                r#"
                (module (function_definition name: (identifier) @name) @function)
                (module (decorated_definition definition: (function_definition name: (identifier) @name) @function))
                (module (class_definition name: (identifier) @name) @class)
                (module (decorated_definition definition: (class_definition name: (identifier) @name) @class))
                (class_definition body: (block (function_definition name: (identifier) @name) @method))
                (class_definition body: (block (decorated_definition definition: (function_definition name: (identifier) @name) @method)))
                (module (expression_statement (assignment left: (identifier) @name)) @variable)
                "#
            }
            Language::JavaScript => {
                r#"
                (program (function_declaration name: (identifier) @name) @function)
                (program (export_statement declaration: (function_declaration name: (identifier) @name) @function))
                (program (class_declaration name: (identifier) @name) @class)
                (program (export_statement declaration: (class_declaration name: (identifier) @name) @class))
                (class_declaration body: (class_body (method_definition name: (property_identifier) @name) @method))
                (program (lexical_declaration (variable_declarator name: (identifier) @name)) @variable)
                (program (export_statement declaration: (lexical_declaration (variable_declarator name: (identifier) @name)) @variable))
                "#
            }
            Language::TypeScript => {
                r#"
                (program (function_declaration name: (identifier) @name) @function)
                (program (export_statement declaration: (function_declaration name: (identifier) @name) @function))
                (program (class_declaration name: (type_identifier) @name) @class)
                (program (export_statement declaration: (class_declaration name: (type_identifier) @name) @class))
                (class_declaration body: (class_body (method_definition name: (property_identifier) @name) @method))
                (program (lexical_declaration (variable_declarator name: (identifier) @name)) @variable)
                (program (export_statement declaration: (lexical_declaration (variable_declarator name: (identifier) @name)) @variable))
                "#
            }
            Language::Go => {
                r#"
                (source_file (function_declaration name: (identifier) @name) @function)
                (source_file (method_declaration name: (field_identifier) @name) @method)
                (source_file (type_declaration (type_spec name: (type_identifier) @name)) @class)
                (source_file (const_declaration (const_spec name: (identifier) @name)) @constant)
                (source_file (var_declaration (var_spec name: (identifier) @name)) @variable)
                "#
            }
            Language::Rust => {
                r#"
                (source_file (function_item name: (identifier) @name) @function)
                (impl_item body: (declaration_list (function_item name: (identifier) @name) @method))
                (source_file (struct_item name: (type_identifier) @name) @class)
                (source_file (enum_item name: (type_identifier) @name) @class)
                (source_file (trait_item name: (type_identifier) @name) @class)
                (source_file (const_item name: (identifier) @name) @constant)
                (source_file (static_item name: (identifier) @name) @constant)
                "#
            }
            Language::Java => {
                r#"
                (class_declaration name: (identifier) @name) @class
                (interface_declaration name: (identifier) @name) @class
                (enum_declaration name: (identifier) @name) @class
                (class_body (method_declaration name: (identifier) @name) @method)
                (class_body (constructor_declaration name: (identifier) @name) @method)
                "#
            }
            Language::Cpp => {
                r#"
                (class_specifier name: (type_identifier) @name) @class
                (struct_specifier name: (type_identifier) @name) @class
                (enum_specifier name: (type_identifier) @name) @class
                (function_definition
                  declarator: (function_declarator declarator: (identifier) @name)) @function
                (function_definition
                  declarator: (function_declarator declarator: (field_identifier) @name)) @method
                (function_definition
                  declarator: (function_declarator
                    declarator: (qualified_identifier name: (identifier) @name))) @method
                "#
            }
            Language::Dart => {
                r#"
                (class_definition name: (identifier) @name) @class
                (enum_declaration name: (identifier) @name) @class
                (mixin_declaration (identifier) @name) @class
                (function_signature name: (identifier) @name) @function
                (method_signature (function_signature name: (identifier) @name)) @method
                (method_signature (getter_signature name: (identifier) @name)) @method
                (method_signature (setter_signature name: (identifier) @name)) @method
                "#
            }
            _ => "",
        }
    }

    /// Usage query per language. Captures: `@callee` on calls, `@new` on
    /// instantiations, `@decorator` on whole decorator nodes, `@base` on
    /// inheritance targets.
    fn usage_query(&self, language: Language, filename: &str) -> &'static str {
        match language {
            Language::Python => {
                r#"
                (call function: (identifier) @callee)
                (call function: (attribute attribute: (identifier) @callee))
                (decorator) @decorator
                (class_definition superclasses: (argument_list (identifier) @base))
                "#
            }
            Language::JavaScript => {
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (member_expression property: (property_identifier) @callee))
                (new_expression constructor: (identifier) @new)
                (jsx_opening_element name: (identifier) @new)
                (jsx_self_closing_element name: (identifier) @new)
                (class_declaration (class_heritage (identifier) @base))
                "#
            }
            Language::TypeScript => {
                if filename.ends_with(".tsx") {
                    r#"
                    (call_expression function: (identifier) @callee)
                    (call_expression function: (member_expression property: (property_identifier) @callee))
                    (new_expression constructor: (identifier) @new)
                    (decorator (identifier) @decorator_name)
                    (decorator (call_expression function: (identifier) @decorator_name))
                    (jsx_opening_element name: (identifier) @new)
                    (jsx_self_closing_element name: (identifier) @new)
                    "#
                } else {
                    r#"
                    (call_expression function: (identifier) @callee)
                    (call_expression function: (member_expression property: (property_identifier) @callee))
                    (new_expression constructor: (identifier) @new)
                    (decorator (identifier) @decorator_name)
                    (decorator (call_expression function: (identifier) @decorator_name))
                    "#
                }
            }
            Language::Go => {
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (selector_expression field: (field_identifier) @callee))
                (composite_literal type: (type_identifier) @new)
                "#
            }
            Language::Rust => {
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (field_expression field: (field_identifier) @callee))
                (call_expression function: (scoped_identifier name: (identifier) @callee))
                (macro_invocation macro: (identifier) @callee)
                (struct_expression name: (type_identifier) @new)
                "#
            }
            Language::Java => {
                r#"
                (method_invocation name: (identifier) @callee)
                (object_creation_expression type: (type_identifier) @new)
                (superclass (type_identifier) @base)
                (marker_annotation name: (identifier) @decorator_name)
                (annotation name: (identifier) @decorator_name)
                "#
            }
            Language::Cpp => {
                r#"
                (call_expression function: (identifier) @callee)
                (call_expression function: (field_expression field: (field_identifier) @callee))
                (call_expression function: (qualified_identifier name: (identifier) @callee))
                (new_expression type: (type_identifier) @new)
                (base_class_clause (type_identifier) @base)
                "#
            }
            // Dart usages are walked manually; the grammar's call shapes are
            // too irregular for a stable query.
            Language::Dart => "",
            _ => "",
        }
    }

    /// Import query per language; captures `@import` on the specifier.
    fn import_query(&self, language: Language) -> &'static str {
        match language {
            Language::Python => {
                r#"
                (import_statement name: (dotted_name) @import)
                (import_statement name: (aliased_import name: (dotted_name) @import))
                (import_from_statement module_name: (dotted_name) @import)
                (import_from_statement module_name: (relative_import) @import)
                "#
            }
            Language::JavaScript | Language::TypeScript => {
                r#"
                (import_statement source: (string (string_fragment) @import))
                "#
            }
            Language::Go => {
                r#"
                (import_spec path: (interpreted_string_literal) @import)
                "#
            }
            Language::Rust => {
                r#"
                (use_declaration argument: (_) @import)
                "#
            }
            Language::Java => {
                r#"
                (import_declaration (scoped_identifier) @import)
                "#
            }
            Language::Cpp => {
                r#"
                (preproc_include path: (string_literal) @import)
                (preproc_include path: (system_lib_string) @import)
                "#
            }
            // Dart imports are collected by a line scan.
            Language::Dart => "",
            _ => "",
        }
    }

    /// Node kinds counted as branch points for the cyclomatic estimate.
    fn complexity_kinds(language: Language) -> &'static [&'static str] {
        match language {
            Language::Python => &[
                "if_statement",
                "elif_clause",
                "for_statement",
                "while_statement",
                "except_clause",
                "case_clause",
                "conditional_expression",
                "boolean_operator",
            ],
            Language::JavaScript | Language::TypeScript => &[
                "if_statement",
                "for_statement",
                "for_in_statement",
                "while_statement",
                "do_statement",
                "switch_case",
                "catch_clause",
                "ternary_expression",
                "&&",
                "||",
            ],
            Language::Go => &[
                "if_statement",
                "for_statement",
                "expression_case",
                "type_case",
                "&&",
                "||",
            ],
            Language::Rust => &[
                "if_expression",
                "while_expression",
                "for_expression",
                "match_arm",
                "&&",
                "||",
            ],
            Language::Java => &[
                "if_statement",
                "for_statement",
                "enhanced_for_statement",
                "while_statement",
                "switch_block_statement_group",
                "catch_clause",
                "ternary_expression",
                "&&",
                "||",
            ],
            Language::Cpp => &[
                "if_statement",
                "for_statement",
                "while_statement",
                "case_statement",
                "catch_clause",
                "conditional_expression",
                "&&",
                "||",
            ],
            Language::Dart => &[
                "if_statement",
                "for_statement",
                "while_statement",
                "conditional_expression",
                "&&",
                "||",
            ],
            _ => &[],
        }
    }

    /// 1 + branch points within the node.
    fn complexity_of(node: Node, language: Language) -> u32 {
        let kinds = Self::complexity_kinds(language);
        if kinds.is_empty() {
            return 1;
        }

        let mut count = 1u32;
        let mut cursor = node.walk();
        let mut visited = false;
        loop {
            if !visited {
                if kinds.contains(&cursor.node().kind()) {
                    count += 1;
                }
                if cursor.goto_first_child() {
                    continue;
                }
            }
            if cursor.goto_next_sibling() {
                visited = false;
                continue;
            }
            if !cursor.goto_parent() {
                break;
            }
            visited = true;
        }
        count
    }

    /// Declared name plus parameter list as written, whitespace collapsed.
    fn signature_of(node: Node, name: &str, content: &str) -> String {
        let params = node
            .child_by_field_name("parameters")
            .or_else(|| {
                node.child_by_field_name("declarator")
                    .and_then(|d| d.child_by_field_name("parameters"))
            });
        match params {
            Some(p) => normalize_ws(&format!("{name}{}", &content[p.byte_range()])),
            None => String::new(),
        }
    }

    fn capture_to_symbol_kind(capture_name: &str) -> SymbolKind {
        match capture_name {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "method" => SymbolKind::Method,
            "constant" => SymbolKind::Constant,
            "variable" => SymbolKind::Variable,
            _ => SymbolKind::Chunk,
        }
    }

    fn extract_chunks(
        &self,
        tree: &tree_sitter::Tree,
        content: &str,
        filename: &str,
        language: Language,
        ts_language: &tree_sitter::Language,
    ) -> Result<Vec<Chunk>, DomainError> {
        let query_source = self.chunk_query(language);
        if query_source.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to create chunk query: {e}")))?;
        let capture_names: Vec<&str> = query.capture_names().to_vec();

        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        // Keyed by chunk id so overlapping patterns (e.g. Dart method over
        // function signature) collapse; the more specific kind wins.
        let mut chunks: HashMap<String, Chunk> = HashMap::new();

        while let Some(query_match) = matches_iter.next() {
            let mut symbol_name: Option<String> = None;
            let mut main_node = None;
            let mut kind = SymbolKind::Chunk;

            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                if capture_name == "name" {
                    symbol_name = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    kind = Self::capture_to_symbol_kind(capture_name);
                }
            }

            let (node, name) = match (main_node, symbol_name) {
                (Some(n), Some(s)) if !s.is_empty() => (n, s),
                _ => continue,
            };

            // Uppercase module-level bindings are constants.
            let kind = if kind == SymbolKind::Variable && is_screaming_case(&name) {
                SymbolKind::Constant
            } else {
                kind
            };

            let (start_byte, end_byte, start_line, end_line) = chunk_region(node, language);
            let node_content = content
                .get(start_byte..end_byte)
                .unwrap_or("")
                .to_string();

            let signature = if matches!(kind, SymbolKind::Function | SymbolKind::Method) {
                Self::signature_of(node, &name, content)
            } else {
                String::new()
            };
            let complexity = Self::complexity_of(node, language);

            let chunk = Chunk::new(
                filename, &name, kind, start_line, end_line, node_content, language,
            )
            .with_signature(signature)
            .with_complexity(complexity);

            chunks
                .entry(chunk.id().to_string())
                .and_modify(|existing| {
                    if existing.symbol_kind() == SymbolKind::Function
                        && kind == SymbolKind::Method
                    {
                        *existing = chunk.clone();
                    }
                })
                .or_insert(chunk);
        }

        let mut out: Vec<Chunk> = chunks.into_values().collect();
        out.sort_by_key(|c| (c.start_line(), c.symbol_name().to_string()));
        Ok(out)
    }

    fn extract_dependencies(
        &self,
        tree: &tree_sitter::Tree,
        content: &str,
        language: Language,
        ts_language: &tree_sitter::Language,
    ) -> Result<Vec<String>, DomainError> {
        if language == Language::Dart {
            return Ok(text_chunker::scan_dart_imports(content));
        }

        let query_source = self.import_query(language);
        if query_source.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to create import query: {e}")))?;

        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        let mut deps: Vec<String> = Vec::new();
        while let Some(query_match) = matches_iter.next() {
            for capture in query_match.captures {
                let raw = &content[capture.node.byte_range()];
                let import = normalize_import_path(raw);
                if !import.is_empty() && !deps.contains(&import) {
                    deps.push(import);
                }
            }
        }
        Ok(deps)
    }

    fn extract_usages(
        &self,
        tree: &tree_sitter::Tree,
        content: &str,
        filename: &str,
        language: Language,
        ts_language: &tree_sitter::Language,
        chunks: &[Chunk],
    ) -> Result<Vec<Usage>, DomainError> {
        if language == Language::Dart {
            return Ok(dart_usages(tree, content, chunks));
        }

        let query_source = self.usage_query(language, filename);
        if query_source.is_empty() {
            return Ok(Vec::new());
        }

        let query = Query::new(ts_language, query_source)
            .map_err(|e| DomainError::parse(format!("Failed to create usage query: {e}")))?;
        let capture_names: Vec<&str> = query.capture_names().to_vec();

        let mut cursor = QueryCursor::new();
        let mut matches_iter = cursor.matches(&query, tree.root_node(), content.as_bytes());

        let mut usages: Vec<Usage> = Vec::new();
        let mut seen: HashMap<(String, u32, UsageKind), ()> = HashMap::new();

        while let Some(query_match) = matches_iter.next() {
            for capture in query_match.captures {
                let capture_name = capture_names
                    .get(capture.index as usize)
                    .copied()
                    .unwrap_or("");
                let node = capture.node;
                let line = node.start_position().row as u32 + 1;

                let (name, kind, context) = match capture_name {
                    "callee" => {
                        let name = content[node.byte_range()].to_string();
                        (name, UsageKind::Call, None)
                    }
                    "new" => {
                        let name = content[node.byte_range()].to_string();
                        (name, UsageKind::Instantiation, None)
                    }
                    "base" => {
                        let name = content[node.byte_range()].to_string();
                        (name, UsageKind::Reference, Some("inherits".to_string()))
                    }
                    "decorator_name" => {
                        let name = content[node.byte_range()].to_string();
                        (name, UsageKind::Decorator, None)
                    }
                    "decorator" => {
                        // Whole decorator node: strip `@`, drop any call
                        // arguments, keep the last dotted component.
                        let raw = content[node.byte_range()].trim_start_matches('@');
                        let callee = raw.split('(').next().unwrap_or(raw).trim();
                        let name = callee.rsplit('.').next().unwrap_or(callee).to_string();
                        (name, UsageKind::Decorator, None)
                    }
                    _ => continue,
                };

                if is_noise_name(&name) {
                    continue;
                }

                // Injected dependencies: arguments of Depends(...) and
                // friends become usages of the argument, tagged with the
                // wrapping call.
                if kind == UsageKind::Call && INJECTION_FUNCTIONS.contains(&name.as_str()) {
                    if let Some(call_node) = node.parent().and_then(|p| {
                        if p.kind() == "call" || p.kind() == "call_expression" {
                            Some(p)
                        } else {
                            p.parent()
                        }
                    }) {
                        for arg in injection_arguments(call_node, content) {
                            if is_noise_name(&arg) {
                                continue;
                            }
                            let key = (arg.clone(), line, UsageKind::Call);
                            if seen.insert(key, ()).is_none() {
                                let chunk_id = enclosing_chunk_id(chunks, line);
                                usages.push(
                                    Usage::new(chunk_id, arg, UsageKind::Call, line)
                                        .with_context(&name),
                                );
                            }
                        }
                    }
                    continue;
                }

                let key = (name.clone(), line, kind);
                if seen.insert(key, ()).is_none() {
                    let chunk_id = enclosing_chunk_id(chunks, line);
                    let mut usage = Usage::new(chunk_id, name, kind, line);
                    if let Some(ctx) = context {
                        usage = usage.with_context(ctx);
                    }
                    usages.push(usage);
                }
            }
        }

        Ok(usages)
    }
}

/// Prefer the tightest chunk containing the line; fall back to the file's
/// first chunk so every usage has an anchor.
fn enclosing_chunk_id(chunks: &[Chunk], line: u32) -> String {
    let mut best: Option<&Chunk> = None;
    for chunk in chunks {
        if chunk.contains_line(line) {
            let better = match best {
                None => true,
                Some(b) => chunk.line_count() < b.line_count(),
            };
            if better {
                best = Some(chunk);
            }
        }
    }
    best.or_else(|| chunks.first())
        .map(|c| c.id().to_string())
        .unwrap_or_default()
}

fn is_screaming_case(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_uppercase() || c == '_' || c.is_ascii_digit())
        && name.chars().any(|c| c.is_ascii_uppercase())
}

/// The byte/line region a definition node covers. Dart signatures carry
/// their body as a sibling node, so the region is extended over it.
fn chunk_region(node: Node, language: Language) -> (usize, usize, u32, u32) {
    let mut end_node = node;
    if language == Language::Dart
        && matches!(node.kind(), "function_signature" | "method_signature")
    {
        if let Some(next) = node.next_named_sibling() {
            if next.kind() == "function_body" {
                end_node = next;
            }
        }
    }
    (
        node.start_byte(),
        end_node.end_byte(),
        node.start_position().row as u32 + 1,
        end_node.end_position().row as u32 + 1,
    )
}

/// Identifier arguments of an injection call.
fn injection_arguments(call_node: Node, content: &str) -> Vec<String> {
    let mut args = Vec::new();
    let Some(arg_list) = call_node
        .child_by_field_name("arguments")
        .or_else(|| call_node.named_child((call_node.named_child_count().saturating_sub(1)) as u32))
    else {
        return args;
    };
    let mut cursor = arg_list.walk();
    for child in arg_list.named_children(&mut cursor) {
        if child.kind() == "identifier" {
            args.push(content[child.byte_range()].to_string());
        }
    }
    args
}

/// Dart usage walk. The grammar's call shapes vary across versions, so this
/// leans on a stable invariant instead: an identifier immediately followed
/// by `(` is a call, an instantiation when capitalized (widget builds).
fn dart_usages(tree: &tree_sitter::Tree, content: &str, chunks: &[Chunk]) -> Vec<Usage> {
    let bytes = content.as_bytes();
    let mut usages = Vec::new();
    let mut seen: HashMap<(String, u32), ()> = HashMap::new();

    let mut cursor = tree.root_node().walk();
    let mut visited = false;
    loop {
        if !visited {
            let node = cursor.node();
            if node.kind() == "identifier" {
                // Skip declaration names; only reference positions count.
                let in_declaration = node.parent().is_some_and(|p| {
                    matches!(
                        p.kind(),
                        "function_signature"
                            | "getter_signature"
                            | "setter_signature"
                            | "class_definition"
                            | "enum_declaration"
                            | "mixin_declaration"
                    )
                });
                let mut next = node.end_byte();
                while next < bytes.len() && (bytes[next] == b' ' || bytes[next] == b'\t') {
                    next += 1;
                }
                if !in_declaration && next < bytes.len() && bytes[next] == b'(' {
                    let name = content[node.byte_range()].to_string();
                    let line = node.start_position().row as u32 + 1;
                    if !is_noise_name(&name)
                        && seen.insert((name.clone(), line), ()).is_none()
                    {
                        let kind = if name.chars().next().is_some_and(|c| c.is_uppercase()) {
                            UsageKind::Instantiation
                        } else {
                            UsageKind::Call
                        };
                        usages.push(Usage::new(enclosing_chunk_id(chunks, line), name, kind, line));
                    }
                }
            }
            if cursor.goto_first_child() {
                continue;
            }
        }
        if cursor.goto_next_sibling() {
            visited = false;
            continue;
        }
        if !cursor.goto_parent() {
            break;
        }
        visited = true;
    }
    usages
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    async fn parse_file(
        &self,
        content: &str,
        filename: &str,
        language: Language,
    ) -> Result<ParsedFile, DomainError> {
        let hash = content_hash(content);

        // Languages without a grammar go through the text scanners.
        if !language.has_grammar() {
            let mut parsed = text_chunker::parse(content, filename, language);
            if parsed.chunks.is_empty() {
                parsed
                    .chunks
                    .push(Chunk::whole_file(filename, content, language));
            }
            parsed.chunks = parsed
                .chunks
                .into_iter()
                .map(|c| c.with_content_hash(&hash))
                .collect();
            return Ok(parsed);
        }

        let ts_language = self
            .ts_language(language, filename)
            .ok_or_else(|| DomainError::parse(format!("Unsupported language: {language:?}")))?;

        let mut parser = Parser::new();
        parser
            .set_language(&ts_language)
            .map_err(|e| DomainError::parse(format!("Failed to set language: {e}")))?;

        let tree = parser
            .parse(content, None)
            .ok_or_else(|| DomainError::parse("Failed to parse file"))?;

        let mut chunks =
            self.extract_chunks(&tree, content, filename, language, &ts_language)?;
        if chunks.is_empty() {
            chunks.push(Chunk::whole_file(filename, content, language));
        }

        let dependencies =
            self.extract_dependencies(&tree, content, language, &ts_language)?;

        let usages =
            self.extract_usages(&tree, content, filename, language, &ts_language, &chunks)?;

        let chunks = chunks
            .into_iter()
            .map(|c| {
                c.with_dependencies(dependencies.clone())
                    .with_content_hash(&hash)
            })
            .collect::<Vec<_>>();

        debug!(
            "Parsed {} chunks, {} usages, {} imports from {} ({:?})",
            chunks.len(),
            usages.len(),
            dependencies.len(),
            filename,
            language
        );

        Ok(ParsedFile {
            chunks,
            usages,
            dependencies,
        })
    }

    fn supports_language(&self, language: Language) -> bool {
        self.supported.contains(&language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_python_functions_and_classes() {
        let parser = TreeSitterParser::new();
        let content = r#"
import os
from auth import verify_token

MAX_RETRIES = 3

def fetch(url):
    if not url:
        return None
    return get(url)

class Client:
    def connect(self, host):
        return open_socket(host)
"#;

        let parsed = parser
            .parse_file(content, "src/client.py", Language::Python)
            .await
            .unwrap();

        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"fetch"));
        assert!(names.contains(&"Client"));
        assert!(names.contains(&"connect"));
        assert!(names.contains(&"MAX_RETRIES"));

        let fetch = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "fetch")
            .unwrap();
        assert_eq!(fetch.symbol_kind(), SymbolKind::Function);
        assert_eq!(fetch.signature(), "fetch(url)");
        assert_eq!(fetch.complexity(), 2);

        let constant = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "MAX_RETRIES")
            .unwrap();
        assert_eq!(constant.symbol_kind(), SymbolKind::Constant);

        let connect = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "connect")
            .unwrap();
        assert_eq!(connect.symbol_kind(), SymbolKind::Method);

        assert!(parsed.dependencies.contains(&"os".to_string()));
        assert!(parsed.dependencies.contains(&"auth".to_string()));
    }

    #[tokio::test]
    async fn test_python_chunk_carries_dependencies_and_hash() {
        let parser = TreeSitterParser::new();
        let content = "import json\n\ndef dump(x):\n    return json.dumps(x)\n";
        let parsed = parser
            .parse_file(content, "a.py", Language::Python)
            .await
            .unwrap();
        for chunk in &parsed.chunks {
            assert_eq!(chunk.dependencies(), &["json".to_string()]);
            assert_eq!(chunk.content_hash(), content_hash(content));
        }
    }

    #[tokio::test]
    async fn test_python_call_usages_attach_to_enclosing_chunk() {
        let parser = TreeSitterParser::new();
        let content = r#"
def helper():
    return 42

def caller():
    return helper()
"#;
        let parsed = parser
            .parse_file(content, "m.py", Language::Python)
            .await
            .unwrap();

        let caller = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "caller")
            .unwrap();
        let usage = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "helper")
            .expect("should record call to helper");
        assert_eq!(usage.kind(), UsageKind::Call);
        assert_eq!(usage.containing_chunk_id(), caller.id());
    }

    #[tokio::test]
    async fn test_python_decorator_stripped() {
        let parser = TreeSitterParser::new();
        let content = r#"
@app.route("/login")
def login():
    pass
"#;
        let parsed = parser
            .parse_file(content, "views.py", Language::Python)
            .await
            .unwrap();
        let decorator = parsed
            .usages
            .iter()
            .find(|u| u.kind() == UsageKind::Decorator)
            .expect("should record decorator usage");
        // `@app.route(...)` reduces to its last dotted component.
        assert_eq!(decorator.referenced_name(), "route");
    }

    #[tokio::test]
    async fn test_python_depends_injection_context() {
        let parser = TreeSitterParser::new();
        let content = "x = Depends(verify_token)\n";
        let parsed = parser
            .parse_file(content, "deps.py", Language::Python)
            .await
            .unwrap();

        let usage = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "verify_token")
            .expect("should record injected dependency");
        assert_eq!(usage.context(), Some("Depends"));
        assert_eq!(usage.kind(), UsageKind::Call);

        // The usage anchors to the module-level variable chunk for `x`.
        let x_chunk = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "x")
            .unwrap();
        assert_eq!(usage.containing_chunk_id(), x_chunk.id());
    }

    #[tokio::test]
    async fn test_python_inheritance_usage() {
        let parser = TreeSitterParser::new();
        let content = "class Admin(User):\n    pass\n";
        let parsed = parser
            .parse_file(content, "models.py", Language::Python)
            .await
            .unwrap();
        let base = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "User")
            .expect("should record base class");
        assert_eq!(base.context(), Some("inherits"));
    }

    #[tokio::test]
    async fn test_file_without_definitions_gets_whole_file_chunk() {
        let parser = TreeSitterParser::new();
        let content = "from a import foo\nfoo()\n";
        let parsed = parser
            .parse_file(content, "b.py", Language::Python)
            .await
            .unwrap();

        assert_eq!(parsed.chunks.len(), 1);
        assert_eq!(parsed.chunks[0].symbol_kind(), SymbolKind::Chunk);
        assert_eq!(parsed.chunks[0].symbol_name(), "b.py:1-2");

        // The module-level call still records a usage, anchored there.
        let usage = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "foo")
            .unwrap();
        assert_eq!(usage.containing_chunk_id(), parsed.chunks[0].id());
    }

    #[tokio::test]
    async fn test_parse_javascript_chunks_and_jsx() {
        let parser = TreeSitterParser::new();
        let content = r#"
import { api } from "./api";

export function load() {
    return api.get("/items");
}

class Widget {
    render() {
        return <LoginScreen title="hi" />;
    }
}

const config = { retries: 3 };
"#;
        let parsed = parser
            .parse_file(content, "src/widget.jsx", Language::JavaScript)
            .await
            .unwrap();

        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"load"));
        assert!(names.contains(&"Widget"));
        assert!(names.contains(&"render"));
        assert!(names.contains(&"config"));

        assert!(parsed.dependencies.contains(&"./api".to_string()));

        let jsx = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "LoginScreen")
            .expect("JSX tag should be an instantiation usage");
        assert_eq!(jsx.kind(), UsageKind::Instantiation);
    }

    #[tokio::test]
    async fn test_parse_typescript_class() {
        let parser = TreeSitterParser::new();
        let content = r#"
export class AuthService {
    validate(token: string): boolean {
        return token.length > 0;
    }
}
"#;
        let parsed = parser
            .parse_file(content, "src/auth.ts", Language::TypeScript)
            .await
            .unwrap();
        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"AuthService"));
        assert!(names.contains(&"validate"));
    }

    #[tokio::test]
    async fn test_parse_go_declarations() {
        let parser = TreeSitterParser::new();
        let content = r#"
package main

import "fmt"

type Server struct {
    port int
}

func (s *Server) Start() {
    fmt.Println(s.port)
}

func main() {
    s := Server{port: 8080}
    s.Start()
}
"#;
        let parsed = parser
            .parse_file(content, "main.go", Language::Go)
            .await
            .unwrap();

        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"Server"));
        assert!(names.contains(&"Start"));
        assert!(names.contains(&"main"));

        assert!(parsed.dependencies.contains(&"fmt".to_string()));

        let inst = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "Server" && u.kind() == UsageKind::Instantiation);
        assert!(inst.is_some(), "composite literal should be instantiation");
    }

    #[tokio::test]
    async fn test_parse_rust_items() {
        let parser = TreeSitterParser::new();
        let content = r#"
use std::collections::HashMap;

const LIMIT: usize = 10;

pub struct Index {
    map: HashMap<String, u32>,
}

impl Index {
    pub fn insert(&mut self, key: String) {
        let next = self.map.len() as u32;
        self.map.insert(key, next);
    }
}

fn main() {
    let mut index = Index { map: HashMap::new() };
    index.insert("a".to_string());
}
"#;
        let parsed = parser
            .parse_file(content, "src/main.rs", Language::Rust)
            .await
            .unwrap();

        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"Index"));
        assert!(names.contains(&"insert"));
        assert!(names.contains(&"main"));
        assert!(names.contains(&"LIMIT"));

        let inst = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "Index" && u.kind() == UsageKind::Instantiation);
        assert!(inst.is_some(), "struct expression should be instantiation");
    }

    #[tokio::test]
    async fn test_parse_dart_class_and_widget_instantiation() {
        let parser = TreeSitterParser::new();
        let content = r#"
class AuthGate extends StatelessWidget {
  Widget build(BuildContext context) {
    return LoginScreen();
  }
}
"#;
        let parsed = parser
            .parse_file(content, "lib/auth_gate.dart", Language::Dart)
            .await
            .unwrap();

        let names: Vec<&str> = parsed.chunks.iter().map(|c| c.symbol_name()).collect();
        assert!(names.contains(&"AuthGate"));

        let inst = parsed
            .usages
            .iter()
            .find(|u| u.referenced_name() == "LoginScreen")
            .expect("widget build should record instantiation");
        assert_eq!(inst.kind(), UsageKind::Instantiation);
    }

    #[tokio::test]
    async fn test_complexity_counts_branches() {
        let parser = TreeSitterParser::new();
        let content = r#"
def triage(x):
    if x > 10:
        return "high"
    for i in range(x):
        if i % 2:
            continue
    while x:
        x -= 1
    return "low"
"#;
        let parsed = parser
            .parse_file(content, "t.py", Language::Python)
            .await
            .unwrap();
        let triage = parsed
            .chunks
            .iter()
            .find(|c| c.symbol_name() == "triage")
            .unwrap();
        // 1 + if + for + if + while
        assert_eq!(triage.complexity(), 5);
    }

    #[tokio::test]
    async fn test_chunk_ids_stable_across_parses() {
        let parser = TreeSitterParser::new();
        let content = "def foo():\n    pass\n";
        let a = parser
            .parse_file(content, "a.py", Language::Python)
            .await
            .unwrap();
        let b = parser
            .parse_file(content, "a.py", Language::Python)
            .await
            .unwrap();
        assert_eq!(a.chunks[0].id(), b.chunks[0].id());
    }
}
