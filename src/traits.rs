//! Seams between the question-answering pipeline and its backends.
//!
//! ```text
//!   question ──▶ Retriever::search ──▶ context chunks ──▶ AnswerGenerator::generate ──▶ answer
//!                      ▲
//!   documents ─────────┘ Retriever::add
//! ```
//!
//! [`Retriever`] hides how similarity is computed. The built-in
//! implementation is the TF-IDF [`RetrievalIndex`](crate::index::RetrievalIndex);
//! an embedding-backed index can implement the same trait without callers
//! noticing.
//!
//! [`AnswerGenerator`] is the external model boundary. The crate ships
//! [`AnthropicGenerator`](crate::answer::AnthropicGenerator) and
//! [`DisabledGenerator`](crate::answer::DisabledGenerator); tests plug in
//! their own.

use async_trait::async_trait;

use crate::answer::AnswerError;
use crate::error::CoreError;

/// A growable chunk collection answering similarity queries.
///
/// Implementations must be safe to share across threads: `search` may run
/// concurrently with itself and must never observe a half-applied `add`.
pub trait Retriever: Send + Sync {
    /// Append chunks in order and make them searchable.
    fn add(&self, chunks: Vec<String>) -> Result<(), CoreError>;

    /// Up to `top_k` chunks, most similar first. Empty when nothing is indexed.
    fn search(&self, query: &str, top_k: usize) -> Vec<String>;

    /// Number of chunks held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synthesizes an answer to `question` from retrieved context.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use docqa::answer::AnswerError;
/// use docqa::traits::AnswerGenerator;
///
/// struct Echo;
///
/// #[async_trait]
/// impl AnswerGenerator for Echo {
///     fn name(&self) -> &str { "echo" }
///
///     async fn generate(&self, context: &[String], _question: &str) -> Result<String, AnswerError> {
///         Ok(context.join("\n\n"))
///     }
/// }
/// ```
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Short identifier used in logs (e.g. the model name).
    fn name(&self) -> &str;

    /// Produce an answer. Failures are reported verbatim, never retried here.
    async fn generate(&self, context: &[String], question: &str) -> Result<String, AnswerError>;
}
