//! code-intel CLI - local code-intelligence engine.

mod cli;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Commands;
use code_intel::{Config, Container, SearchRequest};

/// code-intel - semantic indexing and symbol graph for a source tree
#[derive(Parser)]
#[command(name = "code-intel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the storage root (default: per-user data dir or STORAGE_ROOT)
    #[arg(long, global = true)]
    storage_root: Option<String>,

    /// Use the deterministic mock embedder instead of the HTTP endpoint
    #[arg(long, global = true)]
    mock_embeddings: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // All diagnostics go to stderr; stdout is reserved for MCP frames and
    // command output. LOG_LEVEL feeds the filter, --verbose raises it.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = Config::from_env().with_mock_embeddings(cli.mock_embeddings);
    if let Some(root) = cli.storage_root {
        config = config.with_storage_root(root.into());
    }
    let container = Arc::new(Container::new(config)?);

    match cli.command {
        Commands::Index {
            root,
            force,
            include,
            exclude,
        } => {
            let report = container
                .refresh_index_use_case()
                .execute(&root, force, include.as_deref(), exclude.as_deref())
                .await?;
            println!(
                "Indexed {} files ({} skipped, {} chunks) in {}ms",
                report.indexed, report.skipped, report.chunks, report.elapsed_ms
            );
            for error in &report.errors {
                eprintln!("  {} [{}]: {}", error.file, error.kind, error.msg);
            }
        }

        Commands::Search {
            query,
            root,
            limit,
            include,
            exclude,
        } => {
            let mut request = SearchRequest::new(&query).with_limit(limit);
            if let Some(include) = include {
                request = request.with_include(include);
            }
            if let Some(exclude) = exclude {
                request = request.with_exclude(exclude);
            }

            let hits = container.search_use_case().execute(&root, request).await?;
            if hits.is_empty() {
                println!("No results found.");
            }
            for (i, hit) in hits.iter().enumerate() {
                let chunk = hit.chunk();
                println!(
                    "{}. {} (score: {:.3})",
                    i + 1,
                    chunk.location(),
                    hit.score()
                );
                println!("   {} [{}]", chunk.symbol_name(), chunk.symbol_kind());
                let preview: String = chunk
                    .content()
                    .lines()
                    .take(3)
                    .map(|l| format!("   | {l}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                println!("{preview}\n");
            }
        }

        Commands::Definition {
            symbol,
            root,
            filename,
            line,
        } => {
            let candidates = container
                .find_definition_use_case()
                .execute(&root, &symbol, filename.as_deref(), line)
                .await?;
            if candidates.is_empty() {
                println!("No definition found for {symbol}.");
            }
            for candidate in &candidates {
                println!(
                    "{} ({}) [{}]",
                    candidate.chunk.location(),
                    candidate.chunk.symbol_kind(),
                    candidate.confidence
                );
            }
        }

        Commands::References { symbol, root } => {
            let hits = container
                .find_references_use_case()
                .execute(&root, &symbol)
                .await?;
            if hits.is_empty() {
                println!("No references found for {symbol}.");
            }
            for hit in &hits {
                println!(
                    "{} {} [{}, {}]",
                    hit.chunk.location(),
                    hit.chunk.symbol_name(),
                    hit.kind,
                    hit.confidence
                );
            }
        }

        Commands::Stats { root } => {
            let stats = container.project_stats_use_case().execute(&root).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        Commands::Delete { root } => {
            container.delete_project_use_case().execute(&root).await?;
            println!("Project deleted.");
        }

        Commands::PruneCache { days } => {
            let pruned = container.embedding_cache().prune(days).await?;
            println!("Pruned {pruned} cached embeddings.");
        }

        Commands::Mcp => {
            code_intel::mcp::serve_stdio(container).await?;
        }
    }

    Ok(())
}
