//! TF-IDF vectorizer over sparse term vectors.
//!
//! Crate-private: callers only see [`RetrievalIndex`](crate::index::RetrievalIndex),
//! so the weighting scheme can change without touching the public API.
//!
//! # Weighting
//!
//! ```text
//! tf(t, d)  = raw count of t in d
//! idf(t)    = ln((1 + n) / (1 + df(t))) + 1
//! w(t, d)   = tf(t, d) × idf(t), then L2-normalised per document
//! ```
//!
//! Tokens are lowercased maximal runs of word characters (alphanumeric or
//! `_`) at least two characters long.

use std::collections::HashMap;

use crate::error::CoreError;

/// Sparse vector as `(term_id, weight)` pairs sorted by `term_id`.
pub(crate) type SparseVector = Vec<(usize, f64)>;

/// Vocabulary and IDF weights learned from one corpus.
#[derive(Debug, Clone)]
pub(crate) struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary from `documents` and return their vectors.
    ///
    /// Fails with [`CoreError::IndexUnavailable`] when no document yields a
    /// single token.
    pub(crate) fn fit_transform<S: AsRef<str>>(
        documents: &[S],
    ) -> Result<(Self, Vec<SparseVector>), CoreError> {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut sorted_terms: Vec<&str> = tokenized
            .iter()
            .flat_map(|tokens| tokens.iter().map(String::as_str))
            .collect();
        sorted_terms.sort_unstable();
        sorted_terms.dedup();

        if sorted_terms.is_empty() {
            return Err(CoreError::IndexUnavailable(
                "empty vocabulary; chunks contain no indexable terms".to_string(),
            ));
        }

        for (id, term) in sorted_terms.iter().enumerate() {
            vocabulary.insert((*term).to_string(), id);
        }

        let mut df = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let mut seen: Vec<usize> = tokens
                .iter()
                .filter_map(|t| vocabulary.get(t))
                .copied()
                .collect();
            seen.sort_unstable();
            seen.dedup();
            for id in seen {
                df[id] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let vectorizer = Self { vocabulary, idf };
        let vectors = tokenized
            .iter()
            .map(|tokens| vectorizer.weigh(tokens))
            .collect();

        Ok((vectorizer, vectors))
    }

    /// Vectorize `text` with the learned vocabulary; unknown terms are ignored.
    pub(crate) fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&tokenize(text))
    }

    pub(crate) fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    fn weigh(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            if let Some(&id) = self.vocabulary.get(token) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(id, tf)| (id, tf * self.idf[id]))
            .collect();
        vector.sort_unstable_by_key(|(id, _)| *id);
        l2_normalize(&mut vector);
        vector
    }
}

/// Lowercase and split into word tokens of two or more characters.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2)
        .map(str::to_string)
        .collect()
}

fn l2_normalize(vector: &mut SparseVector) {
    let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    if norm > f64::EPSILON {
        for (_, w) in vector.iter_mut() {
            *w /= norm;
        }
    }
}

/// Cosine similarity of two sparse vectors.
///
/// Returns `0.0` if either vector is zero.
pub(crate) fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }

    let norm_a = a.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
    let denom = norm_a * norm_b;
    if denom < f64::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_lowercases_and_drops_short_tokens() {
        assert_eq!(
            tokenize("The cat sat on a MAT."),
            vec!["the", "cat", "sat", "on", "mat"]
        );
    }

    #[test]
    fn test_tokenize_keeps_unicode_words_and_underscores() {
        assert_eq!(
            tokenize("Café snake_case 42 x"),
            vec!["café", "snake_case", "42"]
        );
    }

    #[test]
    fn test_empty_vocabulary_is_unavailable() {
        let err = TfidfVectorizer::fit_transform(&["", "   ", "a b c"]).unwrap_err();
        assert!(matches!(err, CoreError::IndexUnavailable(_)));
    }

    #[test]
    fn test_idf_is_smoothed() {
        // "cat" occurs in 1 of 2 docs, "the" in both.
        let (v, _) = TfidfVectorizer::fit_transform(&["the cat", "the dog"]).unwrap();
        let cat = v.vocabulary["cat"];
        let the = v.vocabulary["the"];
        assert!((v.idf[cat] - ((3.0f64 / 2.0).ln() + 1.0)).abs() < 1e-12);
        assert!((v.idf[the] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let (_, vectors) =
            TfidfVectorizer::fit_transform(&["alpha beta beta", "gamma", "alpha gamma"]).unwrap();
        for v in &vectors {
            let norm: f64 = v.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transform_ignores_unknown_terms() {
        let (v, _) = TfidfVectorizer::fit_transform(&["alpha beta"]).unwrap();
        assert!(v.transform("zeta omega").is_empty());
        assert_eq!(v.transform("ALPHA zeta").len(), 1);
    }

    #[test]
    fn test_cosine_identical_and_disjoint() {
        let (v, vectors) = TfidfVectorizer::fit_transform(&["red apple", "blue sky"]).unwrap();
        let q = v.transform("red apple");
        assert!((cosine_similarity(&q, &vectors[0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&q, &vectors[1]).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let zero: SparseVector = Vec::new();
        let other: SparseVector = vec![(0, 1.0)];
        assert_eq!(cosine_similarity(&zero, &other), 0.0);
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
    }
}
