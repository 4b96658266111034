use std::fmt;
use std::path::PathBuf;

use rand::Rng;
use tracing::{debug, trace};

use super::word::Word;
use super::{BpeError, MergeMap, Merges, Vocab, VocabR};
use crate::core::cache::{Cache, DEFAULT_CACHE_CAPACITY};
use crate::core::pretokenized::Token;
use crate::core::tokenizer::Result;
use crate::core::vocab::{build_decoder, load_merges_file, load_vocab_json_file};
use crate::models::Model;

struct Config {
    files: Option<(PathBuf, PathBuf)>,
    vocab: Vocab,
    merges: Merges,
    cache_capacity: usize,
    dropout: Option<f32>,
    unk_token: Option<String>,
    continuing_subword_prefix: Option<String>,
    end_of_word_suffix: Option<String>,
    fuse_unk: bool,
    byte_fallback: bool,
    ignore_merges: bool,
}

/// Configures and builds a [`Bpe`] model.
pub struct BpeBuilder {
    config: Config,
}

impl Default for BpeBuilder {
    fn default() -> Self {
        Self {
            config: Config {
                files: None,
                vocab: Vocab::default(),
                merges: Merges::new(),
                cache_capacity: DEFAULT_CACHE_CAPACITY,
                dropout: None,
                unk_token: None,
                continuing_subword_prefix: None,
                end_of_word_suffix: None,
                fuse_unk: false,
                byte_fallback: false,
                ignore_merges: false,
            },
        }
    }
}

impl BpeBuilder {
    /// An empty builder: no vocabulary, no merges, default cache, no dropout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the vocabulary and merges from `vocab.json` and `merges.txt` at build time.
    ///
    /// # Arguments
    /// * `vocab` - Path to a JSON object mapping tokens to ids
    /// * `merges` - Path to a merge list, one `left right` pair per line
    pub fn files(mut self, vocab: impl Into<PathBuf>, merges: impl Into<PathBuf>) -> Self {
        self.config.files = Some((vocab.into(), merges.into()));
        self
    }

    /// Use an in-memory vocabulary and merge list.
    ///
    /// # Arguments
    /// * `vocab` - Token to id map
    /// * `merges` - Merge pairs, highest priority first
    pub fn vocab_and_merges(mut self, vocab: Vocab, merges: Merges) -> Self {
        self.config.vocab = vocab;
        self.config.merges = merges;
        self
    }

    /// Number of segmented fragments to cache, 0 to disable caching.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Skip each candidate merge with probability `dropout`.
    ///
    /// # Arguments
    /// * `dropout` - Probability in `[0.0, 1.0]`, checked by [`build`](Self::build)
    pub fn dropout(mut self, dropout: f32) -> Self {
        self.config.dropout = Some(dropout);
        self
    }

    /// Token emitted for chars missing from the vocabulary.
    ///
    /// # Arguments
    /// * `unk_token` - A token that must be in the vocabulary
    pub fn unk_token(mut self, unk_token: String) -> Self {
        self.config.unk_token = Some(unk_token);
        self
    }

    /// Prefix carried by every symbol that does not start a fragment, e.g. `##`.
    pub fn continuing_subword_prefix(mut self, prefix: String) -> Self {
        self.config.continuing_subword_prefix = Some(prefix);
        self
    }

    /// Suffix carried by the last symbol of every fragment, e.g. `</w>`.
    pub fn end_of_word_suffix(mut self, suffix: String) -> Self {
        self.config.end_of_word_suffix = Some(suffix);
        self
    }

    /// Collapse consecutive unknown tokens into one spanning all of them.
    pub fn fuse_unk(mut self, fuse_unk: bool) -> Self {
        self.config.fuse_unk = fuse_unk;
        self
    }

    /// Emit `<0xNN>` tokens for the UTF-8 bytes of unknown chars when the
    /// vocabulary has them, before falling back to the unknown token.
    pub fn byte_fallback(mut self, byte_fallback: bool) -> Self {
        self.config.byte_fallback = byte_fallback;
        self
    }

    /// Return a fragment found whole in the vocabulary without merging it.
    pub fn ignore_merges(mut self, ignore_merges: bool) -> Self {
        self.config.ignore_merges = ignore_merges;
        self
    }

    /// Validate the configuration and build the model.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the dropout probability lies outside `[0.0, 1.0]`
    /// - the vocabulary or merges file cannot be read or parsed
    /// - the unknown token is not in the vocabulary
    /// - a merge names or produces a token missing from the vocabulary
    ///
    /// # Example
    ///
    /// ```
    /// use tokalign::models::bpe::Bpe;
    /// use tokalign::Model;
    ///
    /// let vocab = [("a", 0), ("b", 1), ("ab", 2)]
    ///     .iter()
    ///     .map(|(t, i)| (t.to_string(), *i))
    ///     .collect();
    /// let merges = vec![("a".to_string(), "b".to_string())];
    /// let bpe = Bpe::builder().vocab_and_merges(vocab, merges).build().unwrap();
    /// assert_eq!(bpe.tokenize("ab").unwrap()[0].value, "ab");
    /// ```
    pub fn build(mut self) -> Result<Bpe> {
        if let Some(p) = self.config.dropout {
            if !(0.0..=1.0).contains(&p) {
                return Err(BpeError::InvalidDropout.into());
            }
        }

        if let Some((vocab, merges)) = self.config.files.take() {
            self.config.vocab = load_vocab_json_file(&vocab)?;
            self.config.merges = load_merges_file(&merges)?;
        }

        let vocab = self.config.vocab;
        if let Some(unk) = &self.config.unk_token {
            if !vocab.contains_key(unk) {
                return Err(BpeError::UnkTokenOutOfVocabulary(unk.clone()).into());
            }
        }

        let prefix = self.config.continuing_subword_prefix.as_deref().unwrap_or("");
        let mut merges = MergeMap::default();
        for (rank, (left, right)) in self.config.merges.iter().enumerate() {
            let left_id = *vocab
                .get(left)
                .ok_or_else(|| BpeError::MergeTokenOutOfVocabulary(left.clone()))?;
            let right_id = *vocab
                .get(right)
                .ok_or_else(|| BpeError::MergeTokenOutOfVocabulary(right.clone()))?;
            let suffix = if prefix.is_empty() {
                right.as_str()
            } else {
                right.strip_prefix(prefix).unwrap_or(right)
            };
            let new_token = format!("{left}{suffix}");
            let new_id = *vocab
                .get(&new_token)
                .ok_or(BpeError::MergeTokenOutOfVocabulary(new_token))?;
            merges.insert((left_id, right_id), (rank as u32, new_id));
        }

        debug!(
            vocab = vocab.len(),
            merges = merges.len(),
            cache = self.config.cache_capacity,
            "built BPE model"
        );

        Ok(Bpe {
            vocab_r: build_decoder(&vocab),
            vocab,
            merges,
            cache: Cache::with_capacity(self.config.cache_capacity),
            dropout: self.config.dropout,
            unk_token: self.config.unk_token,
            continuing_subword_prefix: self.config.continuing_subword_prefix,
            end_of_word_suffix: self.config.end_of_word_suffix,
            fuse_unk: self.config.fuse_unk,
            byte_fallback: self.config.byte_fallback,
            ignore_merges: self.config.ignore_merges,
        })
    }
}

/// A byte-pair encoding model.
///
/// Segmentations computed without dropout are cached per fragment.
#[derive(Clone)]
pub struct Bpe {
    vocab: Vocab,
    vocab_r: VocabR,
    merges: MergeMap,
    cache: Option<Cache<String, Word>>,
    /// Probability of skipping each merge, for subword regularization.
    pub dropout: Option<f32>,
    pub unk_token: Option<String>,
    /// Prefix carried by every symbol that does not start a fragment.
    pub continuing_subword_prefix: Option<String>,
    /// Suffix carried by the symbol that ends a fragment.
    pub end_of_word_suffix: Option<String>,
    /// Merge consecutive unknown symbols into one unknown token.
    pub fuse_unk: bool,
    /// Emit `<0xXX>` byte tokens instead of the unknown token when possible.
    pub byte_fallback: bool,
    /// Emit a fragment directly when it is itself a vocabulary entry.
    pub ignore_merges: bool,
}

impl fmt::Debug for Bpe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bpe")
            .field("vocab", &self.vocab.len())
            .field("merges", &self.merges.len())
            .field("dropout", &self.dropout)
            .field("unk_token", &self.unk_token)
            .field("continuing_subword_prefix", &self.continuing_subword_prefix)
            .field("end_of_word_suffix", &self.end_of_word_suffix)
            .field("fuse_unk", &self.fuse_unk)
            .field("byte_fallback", &self.byte_fallback)
            .field("ignore_merges", &self.ignore_merges)
            .finish()
    }
}

impl Default for Bpe {
    fn default() -> Self {
        Self {
            vocab: Vocab::default(),
            vocab_r: VocabR::default(),
            merges: MergeMap::default(),
            cache: Cache::with_capacity(DEFAULT_CACHE_CAPACITY),
            dropout: None,
            unk_token: None,
            continuing_subword_prefix: None,
            end_of_word_suffix: None,
            fuse_unk: false,
            byte_fallback: false,
            ignore_merges: false,
        }
    }
}

impl Bpe {
    pub fn builder() -> BpeBuilder {
        BpeBuilder::new()
    }

    /// A builder reading `vocab.json` and `merges.txt` from disk.
    pub fn from_file(vocab: impl Into<PathBuf>, merges: impl Into<PathBuf>) -> BpeBuilder {
        BpeBuilder::new().files(vocab, merges)
    }

    /// Number of merges in the merge table.
    pub fn get_merges_len(&self) -> usize {
        self.merges.len()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Number of fragments currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.as_ref().map_or(0, Cache::len)
    }

    /// Build the initial one-symbol-per-char word for `sequence`.
    fn merge_word(&self, sequence: &str) -> Result<Word> {
        let mut indices = sequence.char_indices().map(|(i, _)| i).peekable();
        let mut word = Word::with_capacity(sequence.len());
        let mut unk: Option<(u32, usize)> = None;

        while let Some(start) = indices.next() {
            let end = indices.peek().copied().unwrap_or(sequence.len());
            let is_first = start == 0;
            let is_last = end == sequence.len();
            let byte_len = end - start;

            let mut piece = std::borrow::Cow::Borrowed(&sequence[start..end]);
            if let Some(prefix) = self.continuing_subword_prefix.as_deref().filter(|_| !is_first) {
                piece = format!("{prefix}{piece}").into();
            }
            if let Some(suffix) = self.end_of_word_suffix.as_deref().filter(|_| is_last) {
                piece = format!("{piece}{suffix}").into();
            }

            if let Some(&id) = self.vocab.get(piece.as_ref()) {
                if let Some((unk_id, unk_len)) = unk.take() {
                    word.add(unk_id, unk_len);
                }
                word.add(id, byte_len);
                continue;
            }

            if self.byte_fallback {
                let byte_ids: Option<Vec<u32>> = sequence[start..end]
                    .bytes()
                    .map(|b| self.vocab.get(&format!("<0x{b:02X}>")).copied())
                    .collect();
                if let Some(byte_ids) = byte_ids {
                    if let Some((unk_id, unk_len)) = unk.take() {
                        word.add(unk_id, unk_len);
                    }
                    for id in byte_ids {
                        word.add(id, 1);
                    }
                    continue;
                }
            }

            let unk_token = self.unk_token.as_ref().ok_or(BpeError::MissingUnkToken)?;
            let unk_id = *self
                .vocab
                .get(unk_token)
                .ok_or_else(|| BpeError::UnkTokenOutOfVocabulary(unk_token.clone()))?;
            trace!(piece = %piece, "unknown symbol");
            unk = match unk {
                Some((id, len)) if self.fuse_unk => Some((id, len + byte_len)),
                Some(previous) => {
                    word.add(previous.0, previous.1);
                    Some((unk_id, byte_len))
                }
                None => Some((unk_id, byte_len)),
            };
        }
        if let Some((unk_id, unk_len)) = unk {
            word.add(unk_id, unk_len);
        }
        Ok(word)
    }

    fn word_to_tokens<'a>(&'a self, word: &'a Word) -> impl Iterator<Item = Token> + 'a {
        word.get_chars_iter()
            .zip(word.get_offsets_iter())
            .map(move |(id, offsets)| {
                let value = self.vocab_r.get(&id).cloned().unwrap_or_default();
                Token::new(id, value, offsets)
            })
    }

    fn whole_token(&self, sequence: &str) -> Option<Token> {
        if !self.ignore_merges {
            return None;
        }
        self.vocab
            .get(sequence)
            .map(|&id| Token::new(id, sequence.to_owned(), (0, sequence.len())))
    }

    fn tokenize_with_cache(&self, sequence: &str) -> Result<Vec<Token>> {
        if let Some(token) = self.whole_token(sequence) {
            return Ok(vec![token]);
        }
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(sequence)) {
            return Ok(self.word_to_tokens(&hit).collect());
        }
        let mut word = self.merge_word(sequence)?;
        word.merge_all(&self.merges);
        let tokens = self.word_to_tokens(&word).collect();
        if let Some(cache) = &self.cache {
            cache.set(sequence.to_owned(), word);
        }
        Ok(tokens)
    }

    /// Segment `sequence`, drawing dropout decisions from `rng`.
    ///
    /// Never reads or fills the cache. Without dropout this gives the same
    /// result as [`Model::tokenize`].
    ///
    /// # Errors
    ///
    /// Returns an error if a char is unknown and no unknown token can stand in
    /// for it.
    pub fn tokenize_with_rng<R: Rng>(&self, sequence: &str, rng: &mut R) -> Result<Vec<Token>> {
        if sequence.is_empty() {
            return Ok(vec![]);
        }
        if let Some(token) = self.whole_token(sequence) {
            return Ok(vec![token]);
        }
        let mut word = self.merge_word(sequence)?;
        match self.dropout {
            Some(p) if p > 0.0 => word.merge_all_with_dropout(&self.merges, p, rng),
            _ => word.merge_all(&self.merges),
        }
        Ok(self.word_to_tokens(&word).collect())
    }
}

impl Model for Bpe {
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>> {
        if sequence.is_empty() {
            return Ok(vec![]);
        }
        match self.dropout {
            Some(p) if p > 0.0 => self.tokenize_with_rng(sequence, &mut rand::rng()),
            _ => self.tokenize_with_cache(sequence),
        }
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab_r.get(&id).cloned()
    }

    fn get_vocab(&self) -> Vocab {
        self.vocab.clone()
    }

    fn get_vocab_size(&self) -> usize {
        self.vocab.len()
    }
}
