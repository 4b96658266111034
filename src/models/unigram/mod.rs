//! Unigram language model segmentation.
//!
//! Picks the segmentation maximizing the sum of piece log-probabilities with
//! a Viterbi pass over char positions.

mod model;

use thiserror::Error;

pub use model::{Unigram, UNK_PENALTY};

/// Errors raised while building or running a [`Unigram`] model.
#[derive(Error, Debug)]
pub enum UnigramError {
    /// An unknown id was given for an empty vocabulary.
    #[error("The vocabulary is empty but an unknown id was given")]
    EmptyVocabulary,
    #[error("The unknown id is not within the vocabulary")]
    UnkIdNotInVocabulary,
    /// A char has no piece and the model has no unknown id.
    #[error("Encountered an unknown piece but no unknown id is configured")]
    MissingUnkId,
    /// The lattice has no path from the first char to the last.
    #[error("No segmentation covers the input")]
    Unreachable,
    /// Byte fallback needed a `<0xNN>` piece the vocabulary lacks.
    #[error("Byte fallback piece <0x{0:02X}> is missing from the vocabulary")]
    MissingByteFallback(u8),
}
