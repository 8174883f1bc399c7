//! # Schema Harness CLI (`sqa`)
//!
//! The `sqa` binary is the primary interface for Schema Harness. It
//! provides commands for store initialization, file ingestion, question
//! answering, raw similarity search, schema summaries, and store resets.
//!
//! ## Usage
//!
//! ```bash
//! sqa --config ./config/sqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sqa init` | Create the persistent stores (document, schema, memory) |
//! | `sqa ingest <path>` | Ingest a schema or document file (or a directory) |
//! | `sqa ask "<question>"` | Answer a question from the indexed stores |
//! | `sqa search "<query>"` | Raw similarity search against one store |
//! | `sqa summary` | Show tables and schema types indexed so far |
//! | `sqa stats` | Show per-store unit counts |
//! | `sqa reset` | Wipe stores (all, or one with `--store`) |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;

use schema_harness::config;
use schema_harness::ingest;
use schema_harness::model::StoreClass;
use schema_harness::qa;
use schema_harness::router::HybridRouter;
use schema_harness::stats;

/// Schema Harness CLI — ingest schema artifacts and documents, then ask
/// questions against them.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sqa",
    about = "Schema Harness — schema-aware ingestion and retrieval for natural-language Q&A",
    version,
    long_about = "Schema Harness ingests heterogeneous schema descriptions (SQL DDL, JSON, YAML) \
    and free-text documents, normalizes them into indexable units, and answers natural-language \
    questions by retrieving the most relevant units from independent persistent similarity indices."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/sqa.toml`. All storage, embedding, generation,
    /// and retrieval settings are read from this file.
    #[arg(long, global = true, default_value = "./config/sqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the persistent stores.
    ///
    /// Creates the document and schema index directories and the memory
    /// database, loading any previously persisted state. This command is
    /// idempotent — running it multiple times is safe.
    Init,

    /// Ingest a schema or document file, or a whole directory.
    ///
    /// Schema files (.sql, .json, .yaml) are canonicalized into the schema
    /// store; document files (.pdf, .txt, .md) are chunked into the
    /// document store. Directory ingestion skips files that fail with a
    /// logged error.
    Ingest {
        /// File or directory to ingest.
        path: PathBuf,

        /// Parse and count units without embedding or writing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Answer a natural-language question from the indexed stores.
    ///
    /// Classifies the question, fans out across the schema and document
    /// stores, merges by the context-sensitive ranking policy, and answers
    /// from the top result (refined by the generative model when one is
    /// configured).
    Ask {
        /// The question to answer.
        question: String,

        /// Results fetched per store (defaults to retrieval.k from config).
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Raw similarity search against one store.
    Search {
        /// The search query string.
        query: String,

        /// Store to search: `document` (combined with schema), `schema`,
        /// or `memory`.
        #[arg(long, default_value = "document")]
        store: String,

        /// Maximum number of results to return.
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Show tables and schema types indexed so far.
    Summary,

    /// Show per-store unit counts.
    Stats,

    /// Reset stores — destructive and irreversible.
    ///
    /// Without `--store`, all three stores are wiped.
    Reset {
        /// Reset only this store: `document`, `schema`, or `memory`.
        #[arg(long)]
        store: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            HybridRouter::open(&cfg).await?;
            println!("Stores initialized successfully.");
        }
        Commands::Ingest { path, dry_run } => {
            let router = HybridRouter::open(&cfg).await?;
            ingest::run_ingest(&cfg, &router, &path, dry_run).await?;
        }
        Commands::Ask { question, k } => {
            let router = HybridRouter::open(&cfg).await?;
            let generator = qa::create_generator(&cfg.generation)?;
            let k = k.unwrap_or(cfg.retrieval.k);

            let answer =
                qa::answer_question(&router, generator.as_deref(), &question, k).await?;

            println!("{}", answer.text);
            println!();
            println!(
                "  source: {}",
                answer.source.as_deref().unwrap_or("unknown")
            );
            println!("  confidence: {}", answer.confidence);
        }
        Commands::Search { query, store, k } => {
            let class = StoreClass::from_str(&store)?;
            let router = HybridRouter::open(&cfg).await?;
            let k = k.unwrap_or(cfg.retrieval.k);

            let results = router.search(&query, class, k).await?;
            if results.is_empty() {
                println!("No results.");
            } else {
                for (i, unit) in results.iter().enumerate() {
                    let excerpt: String = unit.text.chars().take(160).collect();
                    println!(
                        "{}. [{}] {}",
                        i + 1,
                        unit.source().unwrap_or("unknown"),
                        excerpt.replace('\n', " ")
                    );
                }
            }
        }
        Commands::Summary => {
            let router = HybridRouter::open(&cfg).await?;
            stats::run_summary(&router).await?;
        }
        Commands::Stats => {
            let router = HybridRouter::open(&cfg).await?;
            stats::run_stats(&cfg, &router).await?;
        }
        Commands::Reset { store } => {
            let router = HybridRouter::open(&cfg).await?;
            match store {
                Some(name) => {
                    let class = StoreClass::from_str(&name)?;
                    router.reset(class).await?;
                    println!("Store '{}' reset successfully.", class);
                }
                None => {
                    router.reset_all().await?;
                    println!("All stores reset successfully.");
                }
            }
        }
    }

    Ok(())
}
