//! The result of encoding one input sequence.

use super::offsets::Offsets;

/// Parallel per-token arrays produced by the tokenization pipeline.
///
/// Every per-token vector has the same length at all times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoding {
    ids: Vec<u32>,
    type_ids: Vec<u32>,
    tokens: Vec<String>,
    words: Vec<Option<u32>>,
    offsets: Vec<Offsets>,
    special_tokens_mask: Vec<u32>,
    attention_mask: Vec<u32>,
    overflowing: Vec<Encoding>,
}

impl Encoding {
    pub fn with_capacity(len: usize) -> Self {
        Self {
            ids: Vec::with_capacity(len),
            type_ids: Vec::with_capacity(len),
            tokens: Vec::with_capacity(len),
            words: Vec::with_capacity(len),
            offsets: Vec::with_capacity(len),
            special_tokens_mask: Vec::with_capacity(len),
            attention_mask: Vec::with_capacity(len),
            overflowing: Vec::new(),
        }
    }

    /// Append one token to every per-token array.
    pub fn push(
        &mut self,
        id: u32,
        token: String,
        offsets: Offsets,
        word: Option<u32>,
        type_id: u32,
    ) {
        self.ids.push(id);
        self.tokens.push(token);
        self.offsets.push(offsets);
        self.words.push(word);
        self.type_ids.push(type_id);
        self.special_tokens_mask.push(0);
        self.attention_mask.push(1);
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get_ids(&self) -> &[u32] {
        &self.ids
    }

    pub fn get_type_ids(&self) -> &[u32] {
        &self.type_ids
    }

    pub fn get_tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn get_word_ids(&self) -> &[Option<u32>] {
        &self.words
    }

    pub fn get_offsets(&self) -> &[Offsets] {
        &self.offsets
    }

    pub fn get_special_tokens_mask(&self) -> &[u32] {
        &self.special_tokens_mask
    }

    pub fn get_attention_mask(&self) -> &[u32] {
        &self.attention_mask
    }

    /// Encodings cut off from this one, empty unless a caller set them.
    pub fn get_overflowing(&self) -> &[Encoding] {
        &self.overflowing
    }

    /// Attach the encodings that a truncation step cut off from this one.
    ///
    /// Truncation lives outside the tokenizer; this is where it hands back
    /// the tail so that no token is lost.
    ///
    /// # Arguments
    /// * `overflowing` - Encodings in the order they were cut off
    pub fn set_overflowing(&mut self, overflowing: Vec<Encoding>) {
        self.overflowing = overflowing;
    }

    /// Flag every token whose id satisfies `is_special` in the special tokens mask.
    pub fn mark_special<F: Fn(u32) -> bool>(&mut self, is_special: F) {
        for (mask, id) in self.special_tokens_mask.iter_mut().zip(&self.ids) {
            *mask = u32::from(is_special(*id));
        }
    }

    /// Word index of token `token`.
    pub fn token_to_word(&self, token: usize) -> Option<u32> {
        self.words.get(token).copied().flatten()
    }

    /// Offsets of token `token` in the original input.
    pub fn token_to_chars(&self, token: usize) -> Option<Offsets> {
        self.offsets.get(token).copied()
    }

    /// Index of the first token whose offsets contain `pos`.
    pub fn char_to_token(&self, pos: usize) -> Option<usize> {
        self.offsets
            .iter()
            .position(|&(start, end)| start <= pos && pos < end)
    }

    /// Indices of the tokens belonging to word `word`, as a half-open range.
    pub fn word_to_tokens(&self, word: u32) -> Option<(usize, usize)> {
        let start = self.words.iter().position(|w| *w == Some(word))?;
        let end = self.words.iter().rposition(|w| *w == Some(word))? + 1;
        Some((start, end))
    }
}

impl FromIterator<(u32, String, Offsets, Option<u32>, u32)> for Encoding {
    fn from_iter<I: IntoIterator<Item = (u32, String, Offsets, Option<u32>, u32)>>(iter: I) -> Self {
        let iter = iter.into_iter();
        let mut encoding = Encoding::with_capacity(iter.size_hint().0);
        for (id, token, offsets, word, type_id) in iter {
            encoding.push(id, token, offsets, word, type_id);
        }
        encoding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Encoding {
        [
            (1, "hel".to_string(), (0, 3), Some(0), 0),
            (2, "lo".to_string(), (3, 5), Some(0), 0),
            (3, "world".to_string(), (6, 11), Some(1), 0),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_parallel_lengths() {
        let encoding = sample();
        assert_eq!(encoding.len(), 3);
        assert_eq!(encoding.get_tokens().len(), 3);
        assert_eq!(encoding.get_offsets().len(), 3);
        assert_eq!(encoding.get_attention_mask(), &[1, 1, 1]);
        assert_eq!(encoding.get_special_tokens_mask(), &[0, 0, 0]);
    }

    #[test]
    fn test_lookups() {
        let encoding = sample();
        assert_eq!(encoding.char_to_token(4), Some(1));
        assert_eq!(encoding.char_to_token(5), None);
        assert_eq!(encoding.token_to_word(2), Some(1));
        assert_eq!(encoding.word_to_tokens(0), Some((0, 2)));
        assert_eq!(encoding.token_to_chars(2), Some((6, 11)));
    }

    #[test]
    fn test_mark_special() {
        let mut encoding = sample();
        encoding.mark_special(|id| id == 2);
        assert_eq!(encoding.get_special_tokens_mask(), &[0, 1, 0]);
    }

    #[test]
    fn test_overflowing() {
        let mut encoding = sample();
        assert!(encoding.get_overflowing().is_empty());
        let tail: Encoding = [(4, "!".to_string(), (11, 12), Some(2), 0)]
            .into_iter()
            .collect();
        encoding.set_overflowing(vec![tail.clone()]);
        assert_eq!(encoding.get_overflowing(), &[tail]);
        assert_eq!(encoding.len(), 3);
    }
}
