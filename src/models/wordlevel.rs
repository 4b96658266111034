//! Whole-fragment vocabulary lookup.

use std::path::Path;

use rustc_hash::FxHashMap;
use thiserror::Error;
use tracing::debug;

use crate::core::pretokenized::Token;
use crate::core::tokenizer::Result;
use crate::core::vocab::{build_decoder, load_vocab_json_file, Vocab, VocabR};
use crate::models::Model;

#[derive(Error, Debug)]
pub enum WordLevelError {
    #[error("Fragment not in vocabulary and the unknown token is missing from it")]
    MissingUnkToken,
}

/// Maps each fragment to one token, or to the unknown token.
#[derive(Debug, Clone)]
pub struct WordLevel {
    vocab: Vocab,
    vocab_r: VocabR,
    pub unk_token: String,
}

#[derive(Debug, Clone)]
pub struct WordLevelBuilder {
    vocab: Vocab,
    unk_token: String,
}

impl Default for WordLevelBuilder {
    fn default() -> Self {
        Self {
            vocab: Vocab::default(),
            unk_token: "<unk>".to_string(),
        }
    }
}

impl WordLevelBuilder {
    pub fn vocab(mut self, vocab: Vocab) -> Self {
        self.vocab = vocab;
        self
    }

    pub fn unk_token(mut self, unk_token: String) -> Self {
        self.unk_token = unk_token;
        self
    }

    pub fn build(self) -> WordLevel {
        debug!(vocab = self.vocab.len(), "built WordLevel model");
        WordLevel {
            vocab_r: build_decoder(&self.vocab),
            vocab: self.vocab,
            unk_token: self.unk_token,
        }
    }
}

impl WordLevel {
    pub fn builder() -> WordLevelBuilder {
        WordLevelBuilder::default()
    }

    /// Load a `vocab.json` token to id map.
    ///
    /// # Arguments
    /// * `vocab` - Path to the JSON file
    /// * `unk_token` - Token returned for words missing from the vocabulary
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(vocab: impl AsRef<Path>, unk_token: String) -> Result<Self> {
        Ok(Self::builder()
            .vocab(load_vocab_json_file(vocab)?)
            .unk_token(unk_token)
            .build())
    }
}

impl Model for WordLevel {
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>> {
        let (id, value) = match self.vocab.get(sequence) {
            Some(&id) => (id, sequence),
            None => (
                *self
                    .vocab
                    .get(&self.unk_token)
                    .ok_or(WordLevelError::MissingUnkToken)?,
                self.unk_token.as_str(),
            ),
        };
        Ok(vec![Token::new(id, value.to_owned(), (0, sequence.len()))])
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

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_wordlevel(unk: &str) -> WordLevel {
        let vocab = [("<unk>", 0), ("hello", 1), ("world", 2)]
            .iter()
            .map(|(t, i)| (t.to_string(), *i))
            .collect();
        WordLevel::builder()
            .vocab(vocab)
            .unk_token(unk.to_string())
            .build()
    }

    #[test]
    fn test_lookup() {
        let model = make_test_wordlevel("<unk>");
        assert_eq!(
            model.tokenize("world").unwrap(),
            vec![Token::new(2, "world".into(), (0, 5))]
        );
        let unknown = model.tokenize("moon").unwrap();
        assert_eq!(unknown[0].id, 0);
        assert_eq!(unknown[0].offsets, (0, 4));
    }

    #[test]
    fn test_missing_unk() {
        let model = make_test_wordlevel("[UNK]");
        assert!(model.tokenize("moon").is_err());
        assert_eq!(model.id_to_token(1), Some("hello".to_string()));
    }
}
