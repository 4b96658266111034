//! Byte-pair encoding.
//!
//! Each fragment starts as one symbol per char and is merged pair by pair in
//! the priority order of the merge table, using a binary heap of candidate
//! merges over a linked list of symbols.

mod model;
mod word;

use rustc_hash::FxHashMap;
use thiserror::Error;

pub use model::{Bpe, BpeBuilder};
pub use crate::core::vocab::{Merges, Vocab, VocabR};

/// `(left_id, right_id)` to `(rank, merged_id)`.
pub(crate) type MergeMap = FxHashMap<(u32, u32), (u32, u32)>;

/// Errors raised while building or running a [`Bpe`] model.
#[derive(Error, Debug)]
pub enum BpeError {
    /// A char is missing from the vocabulary, byte fallback could not cover
    /// it, and no unknown token is configured.
    #[error("Unknown token encountered but no unknown token is configured")]
    MissingUnkToken,
    /// A merge names a token, or produces one, that the vocabulary lacks.
    #[error("Merge token out of vocabulary: {0}")]
    MergeTokenOutOfVocabulary(String),
    /// The configured unknown token is not in the vocabulary.
    #[error("Unknown token out of vocabulary: {0}")]
    UnkTokenOutOfVocabulary(String),
    /// The dropout probability lies outside `[0.0, 1.0]`.
    #[error("Dropout must be between 0.0 and 1.0")]
    InvalidDropout,
}
