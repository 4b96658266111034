use std::fmt;
use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{debug, trace};

use super::UnigramError;
use crate::core::cache::{Cache, DEFAULT_CACHE_CAPACITY};
use crate::core::pretokenized::Token;
use crate::core::tokenizer::Result;
use crate::core::vocab::load_unigram_json_file;
use crate::models::Model;

/// Score penalty applied to an unknown char relative to the rarest piece.
pub const UNK_PENALTY: f64 = 10.0;

/// Best path reaching a char position.
#[derive(Debug, Clone, Copy)]
struct BestPath {
    score: f64,
    /// Char position the last piece starts at.
    start: usize,
    unk: bool,
}

/// A Unigram model: a list of pieces with log-probability scores.
#[derive(Clone)]
pub struct Unigram {
    token_to_ids: FxHashMap<String, u32>,
    vocab: Vec<(String, f64)>,
    cache: Option<Cache<String, Vec<String>>>,
    min_score: f64,
    /// Longest piece, in chars.
    max_piece_chars: usize,
    unk_id: Option<usize>,
    byte_fallback: bool,
    fuse_unk: bool,
}

impl fmt::Debug for Unigram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unigram")
            .field("vocab", &self.vocab.len())
            .field("unk_id", &self.unk_id)
            .field("byte_fallback", &self.byte_fallback)
            .field("fuse_unk", &self.fuse_unk)
            .finish()
    }
}

impl Unigram {
    /// Build a model from `(piece, score)` pairs, ids being positions in `vocab`.
    ///
    /// # Arguments
    /// * `vocab` - Pieces with their log-probability scores
    /// * `unk_id` - Id of the piece standing for unknown text, if any
    /// * `byte_fallback` - Spell unknown chars as `<0xNN>` byte pieces
    ///
    /// # Errors
    ///
    /// Returns an error if `unk_id` is given and the vocabulary is empty, or
    /// if `unk_id` is not a position in `vocab`.
    pub fn from(vocab: Vec<(String, f64)>, unk_id: Option<usize>, byte_fallback: bool) -> Result<Self> {
        if let Some(unk_id) = unk_id {
            if vocab.is_empty() {
                return Err(UnigramError::EmptyVocabulary.into());
            }
            if unk_id >= vocab.len() {
                return Err(UnigramError::UnkIdNotInVocabulary.into());
            }
        }

        let mut token_to_ids = FxHashMap::default();
        let mut min_score = f64::INFINITY;
        let mut max_piece_chars = 0;
        for (id, (piece, score)) in vocab.iter().enumerate() {
            token_to_ids.insert(piece.clone(), id as u32);
            min_score = min_score.min(*score);
            max_piece_chars = max_piece_chars.max(piece.chars().count());
        }
        if vocab.is_empty() {
            min_score = 0.0;
        }

        debug!(
            vocab = vocab.len(),
            unk_id = ?unk_id,
            byte_fallback,
            "built Unigram model"
        );

        Ok(Self {
            token_to_ids,
            vocab,
            cache: Cache::with_capacity(DEFAULT_CACHE_CAPACITY),
            min_score,
            max_piece_chars,
            unk_id,
            byte_fallback,
            fuse_unk: true,
        })
    }

    /// Load a model from a JSON file (`{"unk_id": .., "vocab": [[piece, score], ..]}`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the model
    /// it describes is rejected by [`from`](Self::from).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = load_unigram_json_file(path)?;
        Self::from(file.vocab, file.unk_id, file.byte_fallback)
    }

    /// Number of segmented fragments to cache, 0 to disable caching.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Cache::with_capacity(capacity);
        self
    }

    /// Merge consecutive unknown chars into one unknown piece. On by default.
    pub fn with_fuse_unk(mut self, fuse_unk: bool) -> Self {
        self.fuse_unk = fuse_unk;
        self
    }

    /// Lowest piece score, the base of the unknown piece penalty.
    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub fn byte_fallback(&self) -> bool {
        self.byte_fallback
    }

    pub fn unk_id(&self) -> Option<usize> {
        self.unk_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, f64)> {
        self.vocab.iter()
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Segment `sentence` into pieces of text. Unknown pieces are returned as
    /// the text they cover.
    ///
    /// # Errors
    ///
    /// Returns an error if an unknown char can be covered neither by byte
    /// fallback nor by the unknown id.
    pub fn encode(&self, sentence: &str) -> Result<Vec<String>> {
        if sentence.is_empty() {
            return Ok(vec![]);
        }
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get(sentence)) {
            return Ok(hit);
        }
        let pieces = self.viterbi(sentence)?;
        if let Some(cache) = &self.cache {
            cache.set(sentence.to_owned(), pieces.clone());
        }
        Ok(pieces)
    }

    fn viterbi(&self, sentence: &str) -> Result<Vec<String>> {
        let bounds: Vec<usize> = sentence
            .char_indices()
            .map(|(b, _)| b)
            .chain(std::iter::once(sentence.len()))
            .collect();
        let n = bounds.len() - 1;
        let unk_score = self.min_score - UNK_PENALTY;
        let max_len = self.max_piece_chars.max(1);

        let mut best: Vec<Option<BestPath>> = vec![None; n + 1];
        best[0] = Some(BestPath {
            score: 0.0,
            start: 0,
            unk: false,
        });

        for start in 0..n {
            let Some(reached) = best[start] else {
                continue;
            };
            for end in (start + 1)..=(start + max_len).min(n) {
                let piece = &sentence[bounds[start]..bounds[end]];
                let (score, unk) = match self.token_to_ids.get(piece) {
                    Some(&id) => (self.vocab[id as usize].1, false),
                    None if end == start + 1 && self.unk_id.is_some() => (unk_score, true),
                    None => continue,
                };
                let candidate = reached.score + score;
                if best[end].map_or(true, |p| candidate > p.score) {
                    best[end] = Some(BestPath {
                        score: candidate,
                        start,
                        unk,
                    });
                }
            }
        }

        if best[n].is_none() {
            if self.unk_id.is_some() || self.byte_fallback {
                trace!(sentence, "no segmentation, falling back to a single piece");
                return Ok(vec![sentence.to_owned()]);
            }
            return Err(UnigramError::Unreachable.into());
        }

        let mut spans: Vec<(usize, usize, bool)> = Vec::new();
        let mut end = n;
        while end > 0 {
            let Some(path) = best[end] else {
                return Err(UnigramError::Unreachable.into());
            };
            spans.push((path.start, end, path.unk));
            end = path.start;
        }
        spans.reverse();

        let mut pieces: Vec<String> = Vec::with_capacity(spans.len());
        let mut previous_unk = false;
        for (start, end, unk) in spans {
            let text = &sentence[bounds[start]..bounds[end]];
            match pieces.last_mut() {
                Some(last) if unk && previous_unk && self.fuse_unk => last.push_str(text),
                _ => pieces.push(text.to_owned()),
            }
            previous_unk = unk;
        }
        Ok(pieces)
    }

    /// `<0xXX>` tokens for every byte of `piece`, or the first byte lacking one.
    fn byte_tokens(&self, piece: &str, offset: usize) -> std::result::Result<Vec<Token>, u8> {
        piece
            .bytes()
            .enumerate()
            .map(|(i, b)| {
                let byte_piece = format!("<0x{b:02X}>");
                match self.token_to_ids.get(&byte_piece) {
                    Some(&id) => Ok(Token::new(id, byte_piece, (offset + i, offset + i + 1))),
                    None => Err(b),
                }
            })
            .collect()
    }
}

impl Model for Unigram {
    fn tokenize(&self, sequence: &str) -> Result<Vec<Token>> {
        let pieces = self.encode(sequence)?;
        let mut tokens = Vec::with_capacity(pieces.len());
        let mut offset = 0;
        for piece in pieces {
            let len = piece.len();
            if let Some(&id) = self.token_to_ids.get(&piece) {
                tokens.push(Token::new(id, piece, (offset, offset + len)));
                offset += len;
                continue;
            }
            if self.byte_fallback {
                match self.byte_tokens(&piece, offset) {
                    Ok(byte_tokens) => {
                        tokens.extend(byte_tokens);
                        offset += len;
                        continue;
                    }
                    Err(b) if self.unk_id.is_none() => {
                        return Err(UnigramError::MissingByteFallback(b).into())
                    }
                    Err(_) => {}
                }
            }
            let unk_id = self.unk_id.ok_or(UnigramError::MissingUnkId)?;
            tokens.push(Token::new(unk_id as u32, piece, (offset, offset + len)));
            offset += len;
        }
        Ok(tokens)
    }

    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_ids.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.vocab.get(id as usize).map(|(piece, _)| piece.clone())
    }

    fn get_vocab(&self) -> FxHashMap<String, u32> {
        self.token_to_ids.clone()
    }

    fn get_vocab_size(&self) -> usize {
        self.vocab.len()
    }
}
