//! # SheetQA CLI
//!
//! The `sheetqa` binary drives the spreadsheet-backed Q&A service.
//!
//! ## Usage
//!
//! ```bash
//! sheetqa --config ./config/sheetqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sheetqa sync` | Sync the sheet into the vector index (incremental) |
//! | `sheetqa sync --force` | Forced full reindex (manual recovery) |
//! | `sheetqa sync --dry-run` | Show the diff without touching the index |
//! | `sheetqa chat "<query>"` | Ask one question and print the answer |
//! | `sheetqa serve` | Start the HTTP server + periodic fallback sync |
//! | `sheetqa status` | Show manifest and configuration status |
//!
//! ## Environment
//!
//! Secrets are environment variables, never config file entries:
//! `SHEETS_API_KEY`, `OPENAI_API_KEY`, `PINECONE_API_KEY`, and
//! `SHEETS_WEBHOOK_SECRET` (serve mode only).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use sheetqa::chat::ChatEngine;
use sheetqa::config::{self, Config};
use sheetqa::embedding::OpenAiEmbedder;
use sheetqa::generate::OpenAiGenerator;
use sheetqa::indexer::Indexer;
use sheetqa::models::SyncOutcome;
use sheetqa::retrieve::Retriever;
use sheetqa::server;
use sheetqa::sheet::GoogleSheetsReader;
use sheetqa::store::pinecone::PineconeIndex;

/// SheetQA — a spreadsheet-backed retrieval-augmented Q&A service.
#[derive(Parser)]
#[command(
    name = "sheetqa",
    about = "SheetQA — keep a vector index in sync with a spreadsheet and answer questions from it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sheetqa.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync the spreadsheet into the vector index.
    ///
    /// Fetches the sheet, diffs it against the persisted manifest, and
    /// embeds/upserts only what changed. Safe to re-run at any time.
    Sync {
        /// Re-embed every row regardless of the manifest (manual recovery).
        #[arg(long)]
        force: bool,

        /// Show the diff without touching the index or the manifest.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask one question and print the structured answer.
    Chat {
        /// The visitor question.
        query: String,

        /// Reuse an existing session id instead of generating one.
        #[arg(long)]
        session: Option<String>,
    },

    /// Start the HTTP server (chat API, sheet webhook, periodic sync).
    Serve,

    /// Show manifest and configuration status.
    Status,
}

fn build_indexer(config: &Config) -> anyhow::Result<Arc<Indexer>> {
    let sheet = Arc::new(GoogleSheetsReader::new(&config.sheet)?);
    let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
    let index = Arc::new(PineconeIndex::new(&config.vector_store)?);
    Ok(Arc::new(Indexer::new(
        sheet,
        embedder,
        index,
        config.chunking.clone(),
        &config.embedding,
        &config.manifest,
    )))
}

fn build_chat(config: &Config) -> anyhow::Result<Arc<ChatEngine>> {
    let embedder = Arc::new(OpenAiEmbedder::new(&config.embedding)?);
    let index = Arc::new(PineconeIndex::new(&config.vector_store)?);
    let generator = Arc::new(OpenAiGenerator::new(&config.generation)?);
    Ok(Arc::new(ChatEngine::new(
        Retriever::new(embedder, index),
        generator,
        config.retrieval.clone(),
        &config.generation,
    )))
}

fn print_report(report: &sheetqa::models::SyncReport) {
    println!("sync");
    println!("  added: {}", report.added);
    println!("  changed: {}", report.changed);
    println!("  removed: {}", report.removed);
    println!("  unchanged: {}", report.unchanged);
    for error in &report.errors {
        println!("  skipped: {}", error);
    }
    println!("  elapsed: {:.2}s", report.elapsed_seconds);
    println!("ok");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sheetqa=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync { force, dry_run } => {
            let indexer = build_indexer(&cfg)?;

            if dry_run {
                let (diff, errors) = indexer.plan(force).await?;
                println!("sync (dry-run)");
                println!("  added: {}", diff.added.len());
                println!("  changed: {}", diff.changed.len());
                println!("  removed: {}", diff.removed.len());
                println!("  unchanged: {}", diff.unchanged.len());
                for error in &errors {
                    println!("  skipped: {}", error);
                }
                return Ok(());
            }

            match indexer.sync(force).await? {
                SyncOutcome::Completed(report) => print_report(&report),
                SyncOutcome::Skipped => println!("sync skipped (already in flight)"),
            }
        }
        Commands::Chat { query, session } => {
            let chat = build_chat(&cfg)?;
            let response = chat.chat(&query, session).await;

            println!("{}", response.answer);
            println!();
            for source in &response.sources {
                println!(
                    "  [{:.2}] row {} — {}",
                    source.relevance_score, source.row_number, source.question
                );
                if let Some(link) = &source.link {
                    println!("         {}", link);
                }
            }
            println!(
                "confidence: {:.2}  matches: {}  latency: {:.2}s",
                response.confidence, response.matches_found, response.latency_seconds
            );
        }
        Commands::Serve => {
            let indexer = build_indexer(&cfg)?;
            let chat = build_chat(&cfg)?;
            server::run_server(&cfg, indexer, chat).await?;
        }
        Commands::Status => {
            let manifest = sheetqa::manifest::IndexManifest::load(&cfg.manifest.path);
            println!("sheetqa status");
            println!("  spreadsheet: {}", cfg.sheet.spreadsheet_id);
            println!("  sheet name: {}", cfg.sheet.sheet_name);
            println!("  namespace: {}", cfg.vector_store.namespace);
            println!("  manifest: {}", cfg.manifest.path.display());
            println!("  indexed documents: {}", manifest.entries.len());
        }
    }

    Ok(())
}
