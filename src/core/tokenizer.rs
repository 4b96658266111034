use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};

use super::added_vocabulary::{AddedToken, AddedVocabulary};
use super::encoding::Encoding;
use super::offsets::OffsetType;
use super::vocab::VocabError;
use crate::decoders::{Decoder, DecoderWrapper};
use crate::models::bpe::BpeError;
use crate::models::unigram::UnigramError;
use crate::models::wordlevel::WordLevelError;
use crate::models::wordpiece::WordPieceError;
use crate::models::{Model, ModelWrapper};
use crate::normalizers::NormalizerWrapper;
use crate::pre_tokenizers::{PreTokenizer, PreTokenizerWrapper};

pub type Result<T, E = TokenizerError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("Regex compilation error: {0}")]
    RegexError(#[from] fancy_regex::Error),
    #[error("Vocabulary error: {0}")]
    VocabError(#[from] VocabError),
    #[error("BPE error: {0}")]
    BpeError(#[from] BpeError),
    #[error("Unigram error: {0}")]
    UnigramError(#[from] UnigramError),
    #[error("WordPiece error: {0}")]
    WordPieceError(#[from] WordPieceError),
    #[error("WordLevel error: {0}")]
    WordLevelError(#[from] WordLevelError),
    #[error("Aho-Corasick build error: {0}")]
    AhoCorasickError(#[from] aho_corasick::BuildError),
    #[error("A fragment was never tokenized")]
    NotTokenized,
    #[error("Token span {start}..{end} has no counterpart in the original text")]
    OffsetMapping { start: usize, end: usize },
}

/// Text to [`Encoding`] pipeline.
///
/// Input flows through added-token extraction, the optional normalizer, the
/// optional pre-tokenizer and finally the model, one fragment at a time. Each
/// token of the resulting encoding carries its span in the input.
///
/// # Example
///
/// ```
/// use tokalign::models::wordlevel::WordLevel;
/// use tokalign::normalizers::NormalizerWrapper;
/// use tokalign::pre_tokenizers::Whitespace;
/// use tokalign::Tokenizer;
///
/// let vocab = [("<unk>", 0), ("hello", 1), ("world", 2)]
///     .iter()
///     .map(|(t, i)| (t.to_string(), *i))
///     .collect();
/// let model = WordLevel::builder().vocab(vocab).build();
/// let tokenizer = Tokenizer::new(model)
///     .with_normalizer(NormalizerWrapper::Lowercase)
///     .with_pre_tokenizer(Whitespace::default());
///
/// let encoding = tokenizer.encode("Hello  World").unwrap();
/// assert_eq!(encoding.get_ids(), &[1, 2]);
/// assert_eq!(encoding.get_offsets(), &[(0, 5), (7, 12)]);
/// ```
#[derive(Debug, Clone)]
pub struct Tokenizer {
    model: ModelWrapper,
    normalizer: Option<NormalizerWrapper>,
    pre_tokenizer: Option<PreTokenizerWrapper>,
    decoder: Option<DecoderWrapper>,
    added_vocabulary: AddedVocabulary,
}

impl Tokenizer {
    /// A tokenizer running only `model`, with no normalizer, pre-tokenizer,
    /// decoder or added tokens.
    pub fn new(model: impl Into<ModelWrapper>) -> Self {
        Self {
            model: model.into(),
            normalizer: None,
            pre_tokenizer: None,
            decoder: None,
            added_vocabulary: AddedVocabulary::default(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: impl Into<NormalizerWrapper>) -> Self {
        self.normalizer = Some(normalizer.into());
        self
    }

    pub fn with_pre_tokenizer(mut self, pre_tokenizer: impl Into<PreTokenizerWrapper>) -> Self {
        self.pre_tokenizer = Some(pre_tokenizer.into());
        self
    }

    pub fn with_decoder(mut self, decoder: impl Into<DecoderWrapper>) -> Self {
        self.decoder = Some(decoder.into());
        self
    }

    /// Register tokens matched verbatim in the input before any other step.
    ///
    /// # Arguments
    /// * `tokens` - Tokens to add; empty or already known contents are skipped
    ///
    /// # Errors
    ///
    /// Returns an error if the token matcher cannot be built.
    pub fn with_added_tokens(mut self, tokens: Vec<AddedToken>) -> Result<Self> {
        let added = self.added_vocabulary.add_tokens(tokens)?;
        debug!(added, total = self.added_vocabulary.len(), "registered added tokens");
        Ok(self)
    }

    pub fn model(&self) -> &ModelWrapper {
        &self.model
    }

    pub fn normalizer(&self) -> Option<&NormalizerWrapper> {
        self.normalizer.as_ref()
    }

    pub fn pre_tokenizer(&self) -> Option<&PreTokenizerWrapper> {
        self.pre_tokenizer.as_ref()
    }

    pub fn decoder(&self) -> Option<&DecoderWrapper> {
        self.decoder.as_ref()
    }

    pub fn added_vocabulary(&self) -> &AddedVocabulary {
        &self.added_vocabulary
    }

    /// Encode `text` with byte offsets into it.
    ///
    /// # Errors
    ///
    /// Returns an error if normalization, pre-tokenization or the model fails,
    /// or if a token cannot be mapped back onto `text`.
    pub fn encode(&self, text: &str) -> Result<Encoding> {
        self.encode_with_offsets(text, OffsetType::Byte)
    }

    /// Encode `text`, reporting offsets in bytes or chars of it.
    ///
    /// # Errors
    ///
    /// Same as [`encode`](Self::encode).
    pub fn encode_with_offsets(&self, text: &str, offset_type: OffsetType) -> Result<Encoding> {
        let mut pretokenized = self
            .added_vocabulary
            .extract_and_normalize(self.normalizer.as_ref(), text)?;
        if let Some(pre_tokenizer) = &self.pre_tokenizer {
            pre_tokenizer.pre_tokenize(&mut pretokenized)?;
        }
        pretokenized.tokenize(|normalized| self.model.tokenize(normalized.get()))?;

        let mut encoding = pretokenized.into_encoding(None, 0, offset_type)?;
        encoding.mark_special(|id| self.added_vocabulary.is_special(id));
        trace!(bytes = text.len(), tokens = encoding.len(), "encoded");
        Ok(encoding)
    }

    /// Encode every input in parallel, one outcome per input, in input order.
    pub fn encode_batch(&self, texts: &[&str]) -> Vec<Result<Encoding>> {
        let mut results = Vec::with_capacity(texts.len());
        texts
            .par_iter()
            .map(|text| self.encode(text))
            .collect_into_vec(&mut results);
        results
    }

    /// Encode every input in parallel, failing on the first error.
    ///
    /// # Errors
    ///
    /// Returns the error of the first input, in input order, that failed.
    pub fn try_encode_batch(&self, texts: &[&str]) -> Result<Vec<Encoding>> {
        self.encode_batch(texts).into_iter().collect()
    }

    /// Decode token ids back to text.
    ///
    /// Ids unknown to both the added vocabulary and the model are skipped.
    /// Without a decoder the tokens are joined with a single space.
    ///
    /// # Arguments
    /// * `ids` - Token ids to decode
    /// * `skip_special_tokens` - Leave out added tokens marked special
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder fails.
    pub fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let tokens: Vec<String> = ids
            .iter()
            .filter_map(|&id| match self.added_vocabulary.id_to_token(id) {
                Some(_) if skip_special_tokens && self.added_vocabulary.is_special(id) => None,
                Some(content) => Some(content.to_owned()),
                None => self.model.id_to_token(id),
            })
            .collect();

        match &self.decoder {
            Some(decoder) => decoder.decode(tokens),
            None => Ok(tokens.join(" ")),
        }
    }

    /// Batch decode multiple id lists in parallel.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error, in input order.
    pub fn decode_batch(&self, id_lists: &[&[u32]], skip_special_tokens: bool) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(id_lists.len());
        id_lists
            .par_iter()
            .map(|ids| self.decode(ids, skip_special_tokens))
            .collect_into_vec(&mut results);
        results.into_iter().collect()
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.added_vocabulary
            .token_to_id(token)
            .or_else(|| self.model.token_to_id(token))
    }

    pub fn id_to_token(&self, id: u32) -> Option<String> {
        self.added_vocabulary
            .id_to_token(id)
            .map(str::to_owned)
            .or_else(|| self.model.id_to_token(id))
    }

    /// Vocabulary size, counting added tokens absent from the model when `with_added`.
    pub fn get_vocab_size(&self, with_added: bool) -> usize {
        let base = self.model.get_vocab_size();
        if !with_added {
            return base;
        }
        base + self
            .added_vocabulary
            .tokens()
            .filter(|t| self.model.token_to_id(&t.content).is_none())
            .count()
    }
}
