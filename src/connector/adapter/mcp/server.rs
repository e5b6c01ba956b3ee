use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::tool;
use rmcp::tool_handler;
use rmcp::tool_router;
use rmcp::ErrorData as McpError;
use rmcp::ServerHandler;
use rmcp::ServiceExt;
use schemars::JsonSchema;
use serde::Deserialize;

use crate::connector::api::Container;
use crate::domain::SearchRequest;

use super::tools::{DefinitionOutput, ReferenceOutput, SearchResultOutput};

fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RefreshIndexInput {
    /// Absolute path of the project to index
    pub root_path: String,

    /// Re-index every file, ignoring stored content hashes
    #[serde(default)]
    pub force_full_scan: bool,

    /// Optional include glob(s), gitignore-style, comma-separated
    pub include: Option<String>,

    /// Optional exclude glob(s); exclude wins over include
    pub exclude: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchCodeInput {
    /// Natural language query describing the code you're looking for
    pub query: String,

    /// Absolute path of the indexed project
    pub root_path: String,

    /// Maximum number of results (clamped to 1..=100)
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Optional include glob(s)
    pub include: Option<String>,

    /// Optional exclude glob(s); exclude wins over include
    pub exclude: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetStatsInput {
    /// Absolute path of the indexed project
    pub root_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindDefinitionInput {
    /// Symbol name to resolve
    pub symbol: String,

    /// File the request originates from (project-relative)
    pub filename: Option<String>,

    /// Line of the usage within `filename`
    pub line: Option<u32>,

    /// Absolute path of the indexed project
    pub root_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FindReferencesInput {
    /// Symbol name to look up
    pub symbol: String,

    /// Absolute path of the indexed project
    pub root_path: String,
}

/// MCP server exposing the five code-intelligence tools over stdio.
#[derive(Clone)]
pub struct CodeIntelMcpServer {
    container: Arc<Container>,
    tool_router: ToolRouter<Self>,
}

fn to_json_result<T: serde::Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| McpError::internal_error(format!("Failed to serialize result: {e}"), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[tool_router]
impl CodeIntelMcpServer {
    pub fn new(container: Arc<Container>) -> Self {
        Self {
            container,
            tool_router: Self::tool_router(),
        }
    }

    /// Index or re-index a project. Unchanged files (by content hash) are skipped
    /// unless force_full_scan is set. Returns counts and per-file errors.
    #[tool(name = "refresh_index")]
    async fn refresh_index(
        &self,
        params: Parameters<RefreshIndexInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let report = self
            .container
            .refresh_index_use_case()
            .execute(
                &input.root_path,
                input.force_full_scan,
                input.include.as_deref(),
                input.exclude.as_deref(),
            )
            .await
            .map_err(|e| McpError::internal_error(format!("Index failed: {e}"), None))?;
        to_json_result(&report)
    }

    /// Search indexed code by meaning. Combines dense vector similarity with
    /// keyword matching; results are scoped by the given globs and ranked by
    /// language and file priority.
    #[tool(name = "search_code")]
    async fn search_code(
        &self,
        params: Parameters<SearchCodeInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;

        let mut request = SearchRequest::new(&input.query).with_limit(input.limit);
        if let Some(include) = input.include {
            request = request.with_include(include);
        }
        if let Some(exclude) = input.exclude {
            request = request.with_exclude(exclude);
        }

        let hits = self
            .container
            .search_use_case()
            .execute(&input.root_path, request)
            .await
            .map_err(|e| McpError::internal_error(format!("Search failed: {e}"), None))?;

        let outputs: Vec<SearchResultOutput> =
            hits.iter().map(SearchResultOutput::from).collect();
        to_json_result(&outputs)
    }

    /// Project statistics: chunk/file counts, language breakdown, dependency
    /// hubs, high-risk symbols, active branch and stale-file count.
    #[tool(name = "get_stats")]
    async fn get_stats(
        &self,
        params: Parameters<GetStatsInput>,
    ) -> Result<CallToolResult, McpError> {
        let stats = self
            .container
            .project_stats_use_case()
            .execute(&params.0.root_path)
            .await
            .map_err(|e| McpError::internal_error(format!("Stats failed: {e}"), None))?;
        to_json_result(&stats)
    }

    /// Resolve a symbol to its definition. With a filename and line, follows the
    /// knowledge-graph edges of the enclosing chunk; otherwise (or when no edge
    /// matches) falls back to a project-wide name lookup.
    #[tool(name = "find_definition")]
    async fn find_definition(
        &self,
        params: Parameters<FindDefinitionInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let candidates = self
            .container
            .find_definition_use_case()
            .execute(
                &input.root_path,
                &input.symbol,
                input.filename.as_deref(),
                input.line,
            )
            .await
            .map_err(|e| McpError::internal_error(format!("Definition lookup failed: {e}"), None))?;

        let outputs: Vec<DefinitionOutput> =
            candidates.iter().map(DefinitionOutput::from).collect();
        to_json_result(&outputs)
    }

    /// List the places referencing a symbol, each tagged with the edge kind and
    /// whether the link is structural or a name match.
    #[tool(name = "find_references")]
    async fn find_references(
        &self,
        params: Parameters<FindReferencesInput>,
    ) -> Result<CallToolResult, McpError> {
        let input = params.0;
        let hits = self
            .container
            .find_references_use_case()
            .execute(&input.root_path, &input.symbol)
            .await
            .map_err(|e| McpError::internal_error(format!("Reference lookup failed: {e}"), None))?;

        let outputs: Vec<ReferenceOutput> = hits.iter().map(ReferenceOutput::from).collect();
        to_json_result(&outputs)
    }
}

#[tool_handler]
impl ServerHandler for CodeIntelMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Local code-intelligence server. refresh_index parses and embeds a \
                 project; search_code finds code by meaning; find_definition and \
                 find_references navigate the symbol graph; get_stats summarizes the \
                 indexed project."
                    .into(),
            ),
        }
    }
}

/// Serve the tool surface over stdin/stdout until the client disconnects.
/// Diagnostics stay on stderr; stdout carries only protocol frames.
pub async fn serve_stdio(container: Arc<Container>) -> anyhow::Result<()> {
    let server = CodeIntelMcpServer::new(container);
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
