//! Offset-preserving tokenization.
//!
//! tokalign turns text into vocabulary ids while keeping, for every token,
//! the exact span of the input it came from:
//!
//! - Normalization (case folding, Unicode forms, stripping, replacing) that
//!   keeps a char-level alignment with the original text
//! - Pattern-based pre-tokenization with five delimiter behaviors
//! - BPE with a priority-queue merge loop, optional dropout and byte fallback
//! - Unigram segmentation by Viterbi search
//! - WordLevel and WordPiece lookup models
//! - Rayon batch encoding and a bounded cache shared across threads
//!
//! ```
//! use tokalign::models::bpe::Bpe;
//! use tokalign::pre_tokenizers::Whitespace;
//! use tokalign::Tokenizer;
//!
//! let vocab = [("h", 0), ("i", 1), ("hi", 2)]
//!     .iter()
//!     .map(|(t, i)| (t.to_string(), *i))
//!     .collect();
//! let merges = vec![("h".to_string(), "i".to_string())];
//! let bpe = Bpe::builder().vocab_and_merges(vocab, merges).build().unwrap();
//!
//! let tokenizer = Tokenizer::new(bpe).with_pre_tokenizer(Whitespace);
//! let encoding = tokenizer.encode("hi  hi").unwrap();
//! assert_eq!(encoding.get_ids(), &[2, 2]);
//! assert_eq!(encoding.get_offsets(), &[(0, 2), (4, 6)]);
//! ```

pub mod core;
pub mod decoders;
pub mod models;
pub mod normalizers;
pub mod pre_tokenizers;

pub use crate::core::{
    AddedToken, Encoding, NormalizedString, OffsetReferential, OffsetType, Offsets,
    PreTokenizedString, Range, Result, SplitDelimiterBehavior, Token, Tokenizer, TokenizerError,
};
pub use crate::decoders::Decoder;
pub use crate::models::{Model, ModelWrapper};
pub use crate::normalizers::Normalizer;
pub use crate::pre_tokenizers::PreTokenizer;
