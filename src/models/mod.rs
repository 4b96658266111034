//! Segmentation models.
//!
//! A [`Model`] turns one pre-tokenized fragment into tokens whose offsets are
//! byte offsets within that fragment. [`ModelWrapper`] is the closed set of
//! models a [`Tokenizer`](crate::Tokenizer) can hold.

pub mod bpe;
pub mod unigram;
pub mod wordlevel;
pub mod wordpiece;

use rustc_hash::FxHashMap;

use crate::core::pretokenized::Token;
use crate::core::tokenizer::Result;

use self::bpe::Bpe;
use self::unigram::Unigram;
use self::wordlevel::WordLevel;
use self::wordpiece::WordPiece;

pub trait Model {
    /// Segment `sequence` into tokens.
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>>;
    fn token_to_id(&self, token: &str) -> Option<u32>;
    fn id_to_token(&self, id: u32) -> Option<String>;
    fn get_vocab(&self) -> FxHashMap<String, u32>;
    fn get_vocab_size(&self) -> usize;
}

#[derive(Debug, Clone)]
pub enum ModelWrapper {
    BPE(Bpe),
    Unigram(Unigram),
    WordLevel(WordLevel),
    WordPiece(WordPiece),
}

impl Model for ModelWrapper {
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>> {
        match self {
            Self::BPE(m) => m.tokenize(sequence),
            Self::Unigram(m) => m.tokenize(sequence),
            Self::WordLevel(m) => m.tokenize(sequence),
            Self::WordPiece(m) => m.tokenize(sequence),
        }
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        match self {
            Self::BPE(m) => m.token_to_id(token),
            Self::Unigram(m) => m.token_to_id(token),
            Self::WordLevel(m) => m.token_to_id(token),
            Self::WordPiece(m) => m.token_to_id(token),
        }
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        match self {
            Self::BPE(m) => m.id_to_token(id),
            Self::Unigram(m) => m.id_to_token(id),
            Self::WordLevel(m) => m.id_to_token(id),
            Self::WordPiece(m) => m.id_to_token(id),
        }
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        match self {
            Self::BPE(m) => m.get_vocab(),
            Self::Unigram(m) => m.get_vocab(),
            Self::WordLevel(m) => m.get_vocab(),
            Self::WordPiece(m) => m.get_vocab(),
        }
    }

    fn get_vocab_size(&self) -> usize {
        match self {
            Self::BPE(m) => m.get_vocab_size(),
            Self::Unigram(m) => m.get_vocab_size(),
            Self::WordLevel(m) => m.get_vocab_size(),
            Self::WordPiece(m) => m.get_vocab_size(),
        }
    }
}

impl From<Bpe> for ModelWrapper {
    fn from(model: Bpe) -> Self {
        Self::BPE(model)
    }
}

impl From<Unigram> for ModelWrapper {
    fn from(model: Unigram) -> Self {
        Self::Unigram(model)
    }
}

impl From<WordLevel> for ModelWrapper {
    fn from(model: WordLevel) -> Self {
        Self::WordLevel(model)
    }
}

impl From<WordPiece> for ModelWrapper {
    fn from(model: WordPiece) -> Self {
        Self::WordPiece(model)
    }
}
