//! Greedy longest-match-first subword segmentation.

use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::core::pretokenized::Token;
use crate::core::tokenizer::Result;
use crate::core::vocab::{build_decoder, load_vocab_txt_file, Vocab, VocabR};
use crate::models::Model;

#[derive(Error, Debug)]
pub enum WordPieceError {
    #[error("Fragment cannot be segmented and the unknown token is missing from the vocabulary")]
    MissingUnkToken,
}

#[derive(Debug, Clone)]
pub struct WordPiece {
    vocab: Vocab,
    vocab_r: VocabR,
    pub unk_token: String,
    pub continuing_subword_prefix: String,
    /// Fragments longer than this, in chars, become the unknown token.
    pub max_input_chars_per_word: usize,
}

#[derive(Debug, Clone)]
pub struct WordPieceBuilder {
    vocab: Vocab,
    unk_token: String,
    continuing_subword_prefix: String,
    max_input_chars_per_word: usize,
}

impl Default for WordPieceBuilder {
    fn default() -> Self {
        Self {
            vocab: Vocab::default(),
            unk_token: "[UNK]".to_string(),
            continuing_subword_prefix: "##".to_string(),
            max_input_chars_per_word: 100,
        }
    }
}

impl WordPieceBuilder {
    pub fn vocab(mut self, vocab: Vocab) -> Self {
        self.vocab = vocab;
        self
    }

    pub fn unk_token(mut self, unk_token: String) -> Self {
        self.unk_token = unk_token;
        self
    }

    pub fn continuing_subword_prefix(mut self, prefix: String) -> Self {
        self.continuing_subword_prefix = prefix;
        self
    }

    pub fn max_input_chars_per_word(mut self, max: usize) -> Self {
        self.max_input_chars_per_word = max;
        self
    }

    pub fn build(self) -> WordPiece {
        debug!(vocab = self.vocab.len(), "built WordPiece model");
        WordPiece {
            vocab_r: build_decoder(&self.vocab),
            vocab: self.vocab,
            unk_token: self.unk_token,
            continuing_subword_prefix: self.continuing_subword_prefix,
            max_input_chars_per_word: self.max_input_chars_per_word,
        }
    }
}

impl WordPiece {
    pub fn builder() -> WordPieceBuilder {
        WordPieceBuilder::default()
    }

    /// Load a line-delimited `vocab.txt`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or holds an empty or
    /// repeated token.
    pub fn from_file(vocab: impl AsRef<Path>) -> Result<WordPieceBuilder> {
        Ok(Self::builder().vocab(load_vocab_txt_file(vocab)?))
    }

    fn unk(&self, sequence: &str) -> Result<Vec<Token>> {
        let id = *self
            .vocab
            .get(&self.unk_token)
            .ok_or(WordPieceError::MissingUnkToken)?;
        Ok(vec![Token::new(
            id,
            self.unk_token.clone(),
            (0, sequence.len()),
        )])
    }
}

impl Model for WordPiece {
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>> {
        if sequence.chars().count() > self.max_input_chars_per_word {
            return self.unk(sequence);
        }

        let mut tokens = Vec::new();
        let mut start = 0;
        while start < sequence.len() {
            let mut end = sequence.len();
            let mut found = None;
            while start < end {
                let piece = &sequence[start..end];
                let candidate = if start > 0 {
                    format!("{}{piece}", self.continuing_subword_prefix)
                } else {
                    piece.to_owned()
                };
                if let Some(&id) = self.vocab.get(&candidate) {
                    found = Some(Token::new(id, candidate, (start, end)));
                    break;
                }
                end = sequence[..end]
                    .char_indices()
                    .next_back()
                    .map_or(start, |(i, _)| i);
            }
            match found {
                Some(token) => {
                    start = token.offsets.1;
                    tokens.push(token);
                }
                None => return self.unk(sequence),
            }
        }
        Ok(tokens)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab_r.get(&id).cloned()
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        self.vocab.clone()
    }

    fn get_vocab_size(&self) -> usize {
        self.vocab.len()
    }
}
