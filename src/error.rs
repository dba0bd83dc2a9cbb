//! Typed failure conditions of the retrieval core.
//!
//! Host-level failures (extraction, answer generation, session routing) have
//! their own enums next to the code that raises them; see
//! [`ExtractError`](crate::extract::ExtractError),
//! [`AnswerError`](crate::answer::AnswerError) and
//! [`SessionError`](crate::session::SessionError).

use thiserror::Error;

/// Errors raised by the chunker and the retrieval index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A caller-supplied argument is out of range (e.g. a zero chunk size).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The corpus has no usable vocabulary, so no similarity can be computed.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
}
