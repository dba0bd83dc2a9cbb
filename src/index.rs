//! In-memory retrieval index over a growable corpus of text chunks.
//!
//! The index keeps every chunk ever added, in insertion order, together with
//! a TF-IDF representation of the whole corpus. Each [`add`](RetrievalIndex::add)
//! appends and then refits the vectorizer on the **entire** corpus, because
//! IDF weights depend on every document; vectors from an older fit are not
//! comparable with a newer one.
//!
//! # States
//!
//! ```text
//!   Empty ──add──▶ Indexed ──add──▶ Indexed
//! ```
//!
//! A corpus without a single indexable term is still `Indexed` (its chunks
//! count), but reports [`IndexStatus::Unavailable`] and answers every search
//! with an empty result until usable text arrives.
//!
//! # Concurrency
//!
//! Corpus and vectors live behind one [`RwLock`]: searches share the read
//! lock, an add holds the write lock for the append and the full rebuild, so
//! a reader never observes a corpus and vectors from different fits.
//!
//! # Cost
//!
//! Every add re-vectorizes all chunks, O(total corpus size). This fits the
//! small per-session corpora this crate targets; it is not meant for large
//! document collections.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::tfidf::{cosine_similarity, SparseVector, TfidfVectorizer};
use crate::traits::Retriever;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// A search hit with its corpus position and similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    /// Insertion position of the chunk in the corpus.
    pub position: usize,
    /// Cosine similarity to the query, in `[0, 1]`.
    pub score: f64,
    pub text: String,
}

/// Observable state of a [`RetrievalIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IndexStatus {
    /// No chunk has been added yet.
    Empty,
    /// Chunks are indexed and searchable.
    Indexed { chunks: usize, terms: usize },
    /// Chunks are stored but none contains an indexable term.
    Unavailable { chunks: usize },
}

struct Fitted {
    vectorizer: TfidfVectorizer,
    vectors: Vec<SparseVector>,
}

#[derive(Default)]
struct IndexState {
    corpus: Vec<String>,
    fitted: Option<Fitted>,
}

/// TF-IDF retrieval index owned by one session.
///
/// # Example
///
/// ```rust
/// use docqa::index::RetrievalIndex;
///
/// let index = RetrievalIndex::new();
/// index
///     .add(vec![
///         "The cat sat on the mat.".to_string(),
///         "Dogs bark loudly at night.".to_string(),
///     ])
///     .unwrap();
/// assert_eq!(index.search("cat", 1), vec!["The cat sat on the mat."]);
/// ```
#[derive(Default)]
pub struct RetrievalIndex {
    state: RwLock<IndexState>,
}

impl RetrievalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunks` to the corpus and rebuild the index.
    ///
    /// An empty batch is a no-op. If the resulting corpus has no indexable
    /// term, the chunks are kept but the index becomes unavailable and
    /// [`CoreError::IndexUnavailable`] is returned.
    pub fn add<I, S>(&self, chunks: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut state = self.write();
        let before = state.corpus.len();
        state.corpus.extend(chunks.into_iter().map(Into::into));
        let added = state.corpus.len() - before;
        if added == 0 {
            return Ok(());
        }

        match TfidfVectorizer::fit_transform(state.corpus.as_slice()) {
            Ok((vectorizer, vectors)) => {
                debug!(
                    added,
                    chunks = state.corpus.len(),
                    terms = vectorizer.vocabulary_len(),
                    "rebuilt retrieval index"
                );
                state.fitted = Some(Fitted {
                    vectorizer,
                    vectors,
                });
                Ok(())
            }
            Err(e) => {
                warn!(added, chunks = state.corpus.len(), "retrieval index unavailable: {}", e);
                state.fitted = None;
                Err(e)
            }
        }
    }

    /// The `top_k` chunks most similar to `query`, best first.
    ///
    /// Returns an empty vector when nothing is indexed.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        self.search_scored(query, top_k)
            .into_iter()
            .map(|hit| hit.text)
            .collect()
    }

    /// Like [`search`](Self::search), keeping positions and scores.
    ///
    /// Every chunk is ranked, including zero-score ones; equal scores keep
    /// insertion order.
    pub fn search_scored(&self, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let state = self.read();
        let fitted = match &state.fitted {
            Some(f) if top_k > 0 => f,
            _ => return Vec::new(),
        };

        let query_vec = fitted.vectorizer.transform(query);
        let mut scored: Vec<(usize, f64)> = fitted
            .vectors
            .iter()
            .enumerate()
            .map(|(position, v)| (position, cosine_similarity(&query_vec, v)))
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(position, score)| ScoredChunk {
                position,
                score,
                text: state.corpus[position].clone(),
            })
            .collect()
    }

    /// Number of chunks in the corpus.
    pub fn len(&self) -> usize {
        self.read().corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn status(&self) -> IndexStatus {
        let state = self.read();
        match (&state.fitted, state.corpus.len()) {
            (_, 0) => IndexStatus::Empty,
            (Some(f), chunks) => IndexStatus::Indexed {
                chunks,
                terms: f.vectorizer.vocabulary_len(),
            },
            (None, chunks) => IndexStatus::Unavailable { chunks },
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Retriever for RetrievalIndex {
    fn add(&self, chunks: Vec<String>) -> Result<(), CoreError> {
        RetrievalIndex::add(self, chunks)
    }

    fn search(&self, query: &str, top_k: usize) -> Vec<String> {
        RetrievalIndex::search(self, query, top_k)
    }

    fn len(&self) -> usize {
        RetrievalIndex::len(self)
    }
}
