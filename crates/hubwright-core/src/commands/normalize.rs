//! Tokenize-and-stem normalization and set similarity.

use std::collections::BTreeSet;
use std::fmt;

use rust_stemmers::{Algorithm, Stemmer};

/// Turns free text into a set of comparable tokens.
pub trait TextNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> BTreeSet<String>;
}

/// Lowercases, splits on anything but letters, digits and `_`, then applies
/// the English Porter stemmer.
pub struct StemmingNormalizer {
    stemmer: Stemmer,
}

impl StemmingNormalizer {
    pub fn english() -> Self {
        Self { stemmer: Stemmer::create(Algorithm::English) }
    }
}

impl Default for StemmingNormalizer {
    fn default() -> Self {
        Self::english()
    }
}

impl fmt::Debug for StemmingNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StemmingNormalizer").finish_non_exhaustive()
    }
}

impl TextNormalizer for StemmingNormalizer {
    fn normalize(&self, text: &str) -> BTreeSet<String> {
        text.to_lowercase()
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|token| !token.is_empty())
            .map(|token| self.stemmer.stem(token).into_owned())
            .collect()
    }
}

/// `|a ∩ b| / |a ∪ b|`, defined as 0 when both sets are empty.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
