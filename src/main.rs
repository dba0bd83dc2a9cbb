//! # docqa CLI
//!
//! Ask questions about local files from the terminal, or serve the same
//! pipeline over HTTP.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa chunk <FILE>` | Print the chunks a document is split into |
//! | `docqa search "<query>" --file <PATH>...` | Rank document chunks against a query |
//! | `docqa ask "<question>" --file <PATH>...` | Answer a question from tables or documents |
//! | `docqa serve` | Start the HTTP server |
//!
//! ## Examples
//!
//! ```bash
//! docqa chunk ./report.pdf --size 500
//! docqa search "renewal terms" --file ./contracts --top-k 3
//! CLAUDE_API_KEY=... docqa ask "What is the notice period?" --file ./contracts/lease.txt
//! docqa ask "total records" --file ./staff.csv
//! docqa serve --config ./config/docqa.toml
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use docqa::answer::{create_generator, DisabledGenerator};
use docqa::chunk::chunk_text_with;
use docqa::config::{self, Config};
use docqa::extract::ingest_path;
use docqa::models::ExtractedContent;
use docqa::session::{IngestReport, Session};
use docqa::traits::AnswerGenerator;

/// Question answering over uploaded tables and documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for every key. A missing file
/// means built-in defaults.
#[derive(Parser)]
#[command(name = "docqa", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// Enable verbose logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a document and print its chunks.
    Chunk {
        /// A .txt or .pdf file.
        file: PathBuf,

        /// Maximum characters per chunk (defaults to `chunking.chunk_size`).
        #[arg(long)]
        size: Option<usize>,
    },

    /// Ingest files and print the chunks most similar to a query.
    Search {
        query: String,

        /// Files or directories to ingest. Directories are walked recursively.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,

        /// Number of results (defaults to `retrieval.top_k`).
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// Ingest files and answer a question.
    ///
    /// Table questions are answered directly; anything else is sent with
    /// the retrieved context to the configured model.
    Ask {
        question: String,

        /// Files or directories to ingest. Directories are walked recursively.
        #[arg(long = "file", required = true)]
        files: Vec<PathBuf>,
    },

    /// Start the HTTP server on `server.bind`.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cfg = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Chunk { file, size } => run_chunk(&cfg, &file, size)?,
        Commands::Search {
            query,
            files,
            top_k,
        } => {
            let session = ingest_all(&cfg, &files)?;
            let top_k = top_k.unwrap_or(cfg.retrieval.top_k);
            let results = session.index().search_scored(&query, top_k);
            if results.is_empty() {
                println!("No results.");
            }
            for (rank, hit) in results.iter().enumerate() {
                println!(
                    "{}. [{:.4}] chunk #{}",
                    rank + 1,
                    hit.score,
                    hit.position
                );
                println!("{}", preview(&hit.text, 240));
                println!();
            }
        }
        Commands::Ask { question, files } => {
            let mut session = ingest_all(&cfg, &files)?;
            let generator: Box<dyn AnswerGenerator> = match create_generator(&cfg.answer) {
                Ok(generator) => generator,
                Err(e) => {
                    tracing::warn!("answer generation unavailable: {}", e);
                    Box::new(DisabledGenerator)
                }
            };
            let (answer, _route) = session.ask(&question, generator.as_ref()).await?;
            println!("{}", answer);
        }
        Commands::Serve => {
            docqa::server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn run_chunk(cfg: &Config, file: &Path, size: Option<usize>) -> Result<()> {
    let text = match ingest_path(file)
        .with_context(|| format!("Failed to extract {}", file.display()))?
    {
        ExtractedContent::Document { text } => text,
        ExtractedContent::Table(_) => bail!(
            "{} is tabular; only documents are chunked",
            file.display()
        ),
    };

    let size = size.unwrap_or(cfg.chunking.chunk_size);
    let chunks = chunk_text_with(&text, size, cfg.chunking.strategy)?;
    for (i, chunk) in chunks.iter().enumerate() {
        println!("--- chunk {} ({} chars) ---", i, chunk.chars().count());
        println!("{}", chunk);
    }
    println!("{} chunks", chunks.len());
    Ok(())
}

/// Expand directories into their files, sorted by path within each directory.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry =
                    entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

/// Ingest every file into a fresh session. Files that fail to extract are
/// reported and skipped.
fn ingest_all(cfg: &Config, paths: &[PathBuf]) -> Result<Session> {
    let mut session = Session::new(cfg);
    for path in collect_files(paths)? {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?
            .to_string();
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;

        match session.ingest(&name, &bytes) {
            Ok(IngestReport::AlreadyProcessed { .. }) => {
                eprintln!("skipped {}: already processed", path.display());
            }
            Ok(IngestReport::Table { rows, columns, .. }) => {
                eprintln!("loaded {} ({} rows, {} columns)", path.display(), rows, columns);
            }
            Ok(IngestReport::Document { chunks, .. }) => {
                eprintln!("indexed {} ({} chunks)", path.display(), chunks);
            }
            Err(e) => eprintln!("skipped {}: {}", path.display(), e),
        }
    }
    Ok(session)
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
