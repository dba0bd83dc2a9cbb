//! # docqa
//!
//! Question answering over uploaded files.
//!
//! Tabular uploads (CSV, XLSX) answer counting and column questions
//! directly. Documents (TXT, PDF) are split into chunks, indexed with
//! TF-IDF, and the chunks most similar to a question are handed to a
//! language model as grounding context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌───────────────┐
//! │  Upload  │──▶│ Extract  │──▶│ Table lookup  │──────────────┐
//! │ CLI/HTTP │   │ csv/xlsx │   └───────────────┘              ▼
//! └──────────┘   │ txt/pdf  │──▶ Chunk ──▶ RetrievalIndex ──▶ Answer
//!                └──────────┘                (TF-IDF)        (model)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Lossless, size-bounded text chunking |
//! | [`index`] | TF-IDF retrieval index |
//! | [`traits`] | `Retriever` and `AnswerGenerator` seams |
//! | [`extract`] | File content extraction |
//! | [`table`] | Direct answers over tables |
//! | [`answer`] | Model-backed answer generation |
//! | [`session`] | Per-user uploads, index, and history |
//! | [`server`] | HTTP API |
//! | [`config`] | TOML configuration |
//! | [`models`] | Shared data types |
//! | [`error`] | Core error type |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod models;
pub mod server;
pub mod session;
pub mod table;
mod tfidf;
pub mod traits;
