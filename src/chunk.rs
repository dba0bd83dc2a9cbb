//! Lossless, size-bounded text chunker.
//!
//! Splits extracted document text into chunks of at most `max_size`
//! characters. Chunks are contiguous slices of the input: concatenating them
//! in order gives back the original text byte for byte. Sizes are counted in
//! `char`s, and a split never lands inside a UTF-8 sequence.
//!
//! # Strategies
//!
//! | Strategy | Behaviour |
//! |----------|-----------|
//! | [`ChunkStrategy::Chars`] | Fixed windows of `max_size` characters |
//! | [`ChunkStrategy::Boundary`] | Window ends after the last newline, else the last whitespace, else hard split |
//!
//! Neither strategy trims or drops anything, so the round-trip guarantee
//! holds for both.
//!
//! # Example
//!
//! ```rust
//! use docqa::chunk::chunk_text;
//!
//! let chunks = chunk_text("abcdefgh", 3).unwrap();
//! assert_eq!(chunks, vec!["abc", "def", "gh"]);
//! ```

use serde::Deserialize;

use crate::error::CoreError;

/// How a chunk window is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Cut every `max_size` characters.
    #[default]
    Chars,
    /// Prefer to cut just after a newline or whitespace inside the window.
    Boundary,
}

/// Split `text` into fixed windows of at most `max_size` characters.
///
/// Returns [`CoreError::InvalidArgument`] when `max_size` is zero.
/// Empty input yields no chunks.
pub fn chunk_text(text: &str, max_size: usize) -> Result<Vec<String>, CoreError> {
    chunk_text_with(text, max_size, ChunkStrategy::Chars)
}

/// Split `text` using the given [`ChunkStrategy`].
pub fn chunk_text_with(
    text: &str,
    max_size: usize,
    strategy: ChunkStrategy,
) -> Result<Vec<String>, CoreError> {
    if max_size == 0 {
        return Err(CoreError::InvalidArgument(
            "chunk size must be a positive integer".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let window_end = byte_offset_of_char(remaining, max_size);
        let split_at = match strategy {
            ChunkStrategy::Chars => window_end,
            ChunkStrategy::Boundary if window_end < remaining.len() => {
                boundary_split(&remaining[..window_end]).unwrap_or(window_end)
            }
            ChunkStrategy::Boundary => window_end,
        };

        chunks.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    Ok(chunks)
}

/// Byte offset of the `n`-th character, or the string length if shorter.
fn byte_offset_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}

/// Byte offset just past the last newline in `window`, else just past the
/// last whitespace character. `None` when the window has neither.
fn boundary_split(window: &str) -> Option<usize> {
    let after = |(i, c): (usize, char)| i + c.len_utf8();

    window
        .char_indices()
        .rev()
        .find(|(_, c)| *c == '\n')
        .or_else(|| window.char_indices().rev().find(|(_, c)| c.is_whitespace()))
        .map(after)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples() -> Vec<String> {
        vec![
            String::new(),
            "a".to_string(),
            "abcdefgh".to_string(),
            "The cat sat on the mat.\n\nDogs bark loudly at night.".to_string(),
            "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘".to_string(),
            "naïve café — déjà vu 日本語のテキスト 🚀🚀🚀".to_string(),
            "   leading and trailing whitespace   \n\n\n".to_string(),
            (0..50)
                .map(|i| format!("Paragraph number {}.", i))
                .collect::<Vec<_>>()
                .join("\n\n"),
        ]
    }

    #[test]
    fn test_reference_scenario() {
        let chunks = chunk_text("abcdefgh", 3).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = chunk_text("abc", 0).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));

        let err = chunk_text_with("", 0, ChunkStrategy::Boundary).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(chunk_text("", 5).unwrap().is_empty());
    }

    #[test]
    fn test_round_trip_and_size_bound() {
        for strategy in [ChunkStrategy::Chars, ChunkStrategy::Boundary] {
            for text in samples() {
                for size in [1, 2, 3, 7, 16, 100, 10_000] {
                    let chunks = chunk_text_with(&text, size, strategy).unwrap();
                    assert_eq!(
                        chunks.concat(),
                        text,
                        "round-trip failed for {:?} size {}",
                        strategy,
                        size
                    );
                    for c in &chunks {
                        assert!(
                            c.chars().count() <= size,
                            "chunk {:?} exceeds {} chars",
                            c,
                            size
                        );
                        assert!(!c.is_empty());
                    }
                }
            }
        }
    }

    #[test]
    fn test_multibyte_counted_in_chars() {
        let chunks = chunk_text("日本語テキスト", 3).unwrap();
        assert_eq!(chunks, vec!["日本語", "テキス", "ト"]);
    }

    #[test]
    fn test_text_shorter_than_size_is_one_chunk() {
        let chunks = chunk_text("Hello, world!", 2000).unwrap();
        assert_eq!(chunks, vec!["Hello, world!"]);
    }

    #[test]
    fn test_boundary_prefers_newline() {
        let text = "alpha beta\ngamma delta";
        let chunks = chunk_text_with(text, 14, ChunkStrategy::Boundary).unwrap();
        assert_eq!(chunks[0], "alpha beta\n");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_boundary_falls_back_to_whitespace() {
        let text = "one two three four";
        let chunks = chunk_text_with(text, 10, ChunkStrategy::Boundary).unwrap();
        assert_eq!(chunks[0], "one two ");
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_boundary_hard_split_without_whitespace() {
        let chunks = chunk_text_with("abcdefgh", 3, ChunkStrategy::Boundary).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let c1 = chunk_text_with(text, 5, ChunkStrategy::Boundary).unwrap();
        let c2 = chunk_text_with(text, 5, ChunkStrategy::Boundary).unwrap();
        assert_eq!(c1, c2);
    }
}
