use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "askkit",
    about = "Ask your marketing data questions in plain English, get SQL-backed answers",
    version,
    after_help = "Examples:\n  askkit ingest --db sqlite://analytics.db --data-root ./data\n  askkit ask --db sqlite://analytics.db \"what is our total revenue\"\n  askkit ask \"revenue for acme campaigns\"      # auto-detect DB from .env\n  askkit kpi --db sqlite://analytics.db --metrics revenue,roas\n  askkit datasets --db sqlite://analytics.db --format json"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a directory of CSV files into the analytics database
    Ingest(IngestArgs),

    /// Answer a natural-language question with a SQL-backed result
    Ask(AskArgs),

    /// List ingested datasets from the registry
    Datasets(DatasetsArgs),

    /// Compute aggregate KPI metrics across all datasets
    Kpi(KpiArgs),
}

#[derive(Parser, Debug)]
pub struct IngestArgs {
    /// Database connection URL (sqlite://)
    /// Falls back to DATABASE_URL env var or .env file
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Root directory scanned as business/category/*.csv
    /// Falls back to the [ingest] section of askkit.toml
    #[arg(long)]
    pub data_root: Option<String>,

    /// Only ingest files for this business directory
    #[arg(long)]
    pub business: Option<String>,
}

#[derive(Parser, Debug)]
pub struct AskArgs {
    /// Natural-language question about the ingested data
    pub prompt: String,

    /// Database connection URL (sqlite://)
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: AskFormat,
}

#[derive(Parser, Debug)]
pub struct DatasetsArgs {
    /// Database connection URL (sqlite://)
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Output format
    #[arg(long, default_value = "table")]
    pub format: DatasetsFormat,
}

#[derive(Parser, Debug)]
pub struct KpiArgs {
    /// Database connection URL (sqlite://)
    #[arg(long, env = "DATABASE_URL")]
    pub db: Option<String>,

    /// Only compute these metrics (e.g., revenue,roas)
    #[arg(long, value_delimiter = ',')]
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum AskFormat {
    Table,
    Json,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum DatasetsFormat {
    Table,
    Json,
}
