//! Per-user conversation state.
//!
//! A [`Session`] owns everything one user has uploaded and asked: parsed
//! tables, a [`RetrievalIndex`] over document chunks, the set of processed
//! file names, and the message history. Nothing is shared between sessions.
//!
//! ```text
//!   ingest(name, bytes) ──▶ extract ──┬─ Table ────▶ tables
//!                                     └─ Document ─▶ chunk ─▶ index
//!
//!   ask(question) ──▶ route ──┬─ Table(answer)        ──▶ reply
//!                             └─ Documents(context)   ──▶ AnswerGenerator ──▶ reply
//! ```

use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::answer::AnswerError;
use crate::chunk::chunk_text_with;
use crate::config::{ChunkingConfig, Config, RetrievalConfig, TableConfig};
use crate::error::CoreError;
use crate::extract::{ingest_bytes, ExtractError};
use crate::index::RetrievalIndex;
use crate::models::{ExtractedContent, Message, Role};
use crate::table::Table;
use crate::traits::AnswerGenerator;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Upload a file first")]
    NoDocuments,

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Answer(#[from] AnswerError),
}

/// Outcome of ingesting one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestReport {
    /// A file with this name was already ingested; nothing changed.
    AlreadyProcessed { name: String },
    Table {
        name: String,
        rows: usize,
        columns: usize,
    },
    Document { name: String, chunks: usize },
}

/// Where a question is answered from.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Rendered direct answer from an uploaded table.
    Table(String),
    /// Retrieved chunks to hand to the model, most similar first.
    Documents(Vec<String>),
}

impl Route {
    pub fn kind(&self) -> &'static str {
        match self {
            Route::Table(_) => "table",
            Route::Documents(_) => "documents",
        }
    }
}

pub struct Session {
    chunking: ChunkingConfig,
    retrieval: RetrievalConfig,
    table: TableConfig,
    index: RetrievalIndex,
    tables: Vec<(String, Table)>,
    processed: HashSet<String>,
    messages: Vec<Message>,
    /// Bumped by every [`clear`](Session::clear).
    generation: u64,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            chunking: config.chunking.clone(),
            retrieval: config.retrieval.clone(),
            table: config.table.clone(),
            index: RetrievalIndex::new(),
            tables: Vec::new(),
            processed: HashSet::new(),
            messages: Vec::new(),
            generation: 0,
        }
    }

    /// Extract and store one uploaded file.
    ///
    /// A failed extraction leaves the session unchanged, so the same name
    /// can be uploaded again.
    pub fn ingest(&mut self, name: &str, bytes: &[u8]) -> Result<IngestReport, SessionError> {
        if self.processed.contains(name) {
            return Ok(IngestReport::AlreadyProcessed {
                name: name.to_string(),
            });
        }

        let report = match ingest_bytes(name, bytes)? {
            ExtractedContent::Table(table) => {
                let report = IngestReport::Table {
                    name: name.to_string(),
                    rows: table.row_count(),
                    columns: table.column_count(),
                };
                self.tables.push((name.to_string(), table));
                report
            }
            ExtractedContent::Document { text } => {
                let chunks =
                    chunk_text_with(&text, self.chunking.chunk_size, self.chunking.strategy)?;
                let count = chunks.len();
                match self.index.add(chunks) {
                    Ok(()) => {}
                    Err(e @ CoreError::IndexUnavailable(_)) => {
                        warn!(file = name, "document has no indexable terms: {}", e)
                    }
                    Err(e) => return Err(e.into()),
                }
                IngestReport::Document {
                    name: name.to_string(),
                    chunks: count,
                }
            }
        };

        info!(file = name, "ingested {:?}", report);
        self.processed.insert(name.to_string());
        Ok(report)
    }

    /// Decide how `question` is answered.
    ///
    /// Only the first uploaded table is consulted for a direct answer.
    /// Otherwise the top chunks from the index become the model context.
    pub fn route(&self, question: &str) -> Result<Route, SessionError> {
        if self.processed.is_empty() {
            return Err(SessionError::NoDocuments);
        }

        if let Some((_, table)) = self.tables.first() {
            if let Some(answer) = table.lookup(question, self.table.max_listed_values) {
                return Ok(Route::Table(answer.to_string()));
            }
        }

        Ok(Route::Documents(
            self.index.search(question, self.retrieval.top_k),
        ))
    }

    /// Answer `question`, recording both sides of the exchange.
    ///
    /// A generator failure is returned as is; the question stays in the
    /// history without a reply.
    pub async fn ask(
        &mut self,
        question: &str,
        generator: &dyn AnswerGenerator,
    ) -> Result<(String, Route), SessionError> {
        let route = self.route(question)?;
        self.record(Role::User, question);

        let answer = match &route {
            Route::Table(answer) => answer.clone(),
            Route::Documents(context) => generator.generate(context, question).await?,
        };

        self.record(Role::Assistant, answer.clone());
        Ok((answer, route))
    }

    pub fn record(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    pub fn history(&self) -> &[Message] {
        &self.messages
    }

    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.tables.iter().map(|(name, t)| (name.as_str(), t))
    }

    pub fn top_k(&self) -> usize {
        self.retrieval.top_k
    }

    /// Changes whenever the session is cleared. Callers that drop their
    /// borrow across an await compare it before writing results back.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Forget everything, including indexed chunks.
    pub fn clear(&mut self) {
        self.index = RetrievalIndex::new();
        self.tables.clear();
        self.processed.clear();
        self.messages.clear();
        self.generation += 1;
    }
}
