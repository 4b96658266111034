//! Core alignment and pipeline engine for tokalign.
//!
//! This module holds everything that is not a model, normalizer,
//! pre-tokenizer or decoder:
//!
//! - [`NormalizedString`]: text plus a per-char alignment with the original,
//!   kept exact through every transformation
//! - [`Pattern`]: delimiter search used by splitting and replacing
//! - [`PreTokenizedString`]: the fragment pipeline that turns model tokens
//!   into offsets in the input
//! - [`Encoding`]: the parallel-vector result of encoding
//! - [`Cache`]: the bounded, lock-protected memo shared by the models
//! - [`Tokenizer`]: the orchestrator with added tokens and batch encoding
//!
//! # Offsets
//!
//! Alignments are char ranges into the original text. Model tokens carry
//! byte offsets into their fragment. [`OffsetType`] chooses whether an
//! [`Encoding`] reports bytes or chars of the input.

pub mod added_vocabulary;
pub mod byte_level;
pub mod cache;
pub mod encoding;
pub mod normalized;
pub(crate) mod offsets;
pub mod pattern;
pub mod pretokenized;
pub mod tokenizer;
pub mod vocab;

pub use added_vocabulary::{AddedToken, AddedVocabulary};
pub use cache::{Cache, DEFAULT_CACHE_CAPACITY};
pub use encoding::Encoding;
pub use normalized::{NormalizedString, OffsetReferential, Range, SplitDelimiterBehavior};
pub use offsets::{OffsetType, Offsets};
pub use pattern::{Invert, Pattern, SysRegex};
pub use pretokenized::{PreTokenizedString, Split, Token};
pub use tokenizer::{Result, Tokenizer, TokenizerError};
pub use vocab::{Merges, Vocab, VocabError, VocabR};
