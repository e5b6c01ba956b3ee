use clap::Subcommand;

#[derive(Subcommand)]
pub enum Commands {
    /// Index a project (incremental unless --force)
    Index {
        /// Project root to index
        root: String,

        /// Re-index every file, ignoring stored content hashes
        #[arg(short, long)]
        force: bool,

        /// Include glob(s), gitignore-style, comma-separated
        #[arg(long)]
        include: Option<String>,

        /// Exclude glob(s); exclude wins over include
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Search indexed code by meaning
    Search {
        query: String,

        /// Project root
        root: String,

        #[arg(long, default_value = "10")]
        limit: usize,

        #[arg(long)]
        include: Option<String>,

        #[arg(long)]
        exclude: Option<String>,
    },

    /// Resolve a symbol to its definition
    Definition {
        symbol: String,

        /// Project root
        root: String,

        /// File the request originates from (project-relative)
        #[arg(long)]
        filename: Option<String>,

        /// Line of the usage within --filename
        #[arg(long)]
        line: Option<u32>,
    },

    /// List the places referencing a symbol
    References {
        symbol: String,

        /// Project root
        root: String,
    },

    /// Show statistics for an indexed project
    Stats {
        /// Project root
        root: String,
    },

    /// Remove a project's chunks and edges from the store
    Delete {
        /// Project root
        root: String,
    },

    /// Drop embedding-cache entries not used for N days
    PruneCache {
        #[arg(long, default_value = "30")]
        days: i64,
    },

    /// Serve the MCP tool surface over stdin/stdout
    Mcp,
}
