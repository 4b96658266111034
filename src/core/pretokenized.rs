//! The pre-tokenization pipeline.
//!
//! A [`PreTokenizedString`] starts as one fragment covering the whole input and
//! is refined by successive [`split`](PreTokenizedString::split),
//! [`normalize`](PreTokenizedString::normalize) and
//! [`tokenize`](PreTokenizedString::tokenize) passes. Once a fragment carries
//! tokens it is frozen and later passes leave it alone. Every fragment keeps
//! its alignments, so [`into_encoding`](PreTokenizedString::into_encoding) can
//! report each token's position in the original input.

use tracing::trace;

use super::encoding::Encoding;
use super::normalized::{NormalizedString, OffsetReferential, Range};
use super::offsets::{CharIndex, OffsetType, Offsets};
use super::tokenizer::{Result, TokenizerError};

/// A token produced by a model, offsets in bytes of the fragment it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub id: u32,
    pub value: String,
    pub offsets: Offsets,
}

impl Token {
    /// # Arguments
    /// * `id` - Vocabulary id
    /// * `value` - Token string as the model spells it
    /// * `offsets` - Byte span within the fragment
    pub fn new(id: u32, value: String, offsets: Offsets) -> Self {
        Self { id, value, offsets }
    }
}

/// One fragment of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub normalized: NormalizedString,
    /// `Some` once the fragment has been tokenized.
    pub tokens: Option<Vec<Token>>,
}

impl From<NormalizedString> for Split {
    fn from(normalized: NormalizedString) -> Self {
        Self {
            normalized,
            tokens: None,
        }
    }
}

impl From<(NormalizedString, Option<Vec<Token>>)> for Split {
    fn from((normalized, tokens): (NormalizedString, Option<Vec<Token>>)) -> Self {
        Self { normalized, tokens }
    }
}

/// An input sentence cut into fragments, each with its own normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreTokenizedString {
    original: String,
    splits: Vec<Split>,
}

impl PreTokenizedString {
    /// Replace every unfrozen fragment with the pieces `split_fn` returns for it.
    ///
    /// `split_fn` receives the fragment index and the fragment; empty pieces it
    /// returns are dropped.
    ///
    /// # Errors
    ///
    /// Returns the first error `split_fn` reports, leaving no fragments behind.
    pub fn split<F, U, R>(&mut self, mut split_fn: F) -> Result<()>
    where
        F: FnMut(usize, NormalizedString) -> Result<U>,
        U: IntoIterator<Item = R>,
        R: Into<Split>,
    {
        let mut new_splits = Vec::with_capacity(self.splits.len());
        for (i, original_split) in self.splits.drain(..).enumerate() {
            if original_split.tokens.is_some() {
                new_splits.push(original_split);
                continue;
            }
            new_splits.extend(
                split_fn(i, original_split.normalized)?
                    .into_iter()
                    .map(Into::into)
                    .filter(|split: &Split| !split.normalized.is_empty()),
            );
        }
        self.splits = new_splits;
        Ok(())
    }

    /// Apply `normalize` to every unfrozen fragment.
    ///
    /// # Errors
    ///
    /// Returns the first error `normalize` reports.
    pub fn normalize<F>(&mut self, normalize: F) -> Result<()>
    where
        F: Fn(&mut NormalizedString) -> Result<()>,
    {
        for split in self.splits.iter_mut().filter(|s| s.tokens.is_none()) {
            normalize(&mut split.normalized)?;
        }
        Ok(())
    }

    /// Attach tokens to every unfrozen fragment, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first error `tokenize` reports.
    pub fn tokenize<F>(&mut self, tokenize: F) -> Result<()>
    where
        F: Fn(&NormalizedString) -> Result<Vec<Token>>,
    {
        for split in self.splits.iter_mut().filter(|s| s.tokens.is_none()) {
            split.tokens = Some(tokenize(&split.normalized)?);
        }
        Ok(())
    }

    /// Build an [`Encoding`] with offsets into the original input.
    ///
    /// # Arguments
    /// * `word_idx` - Word index given to every token, the fragment ordinal if `None`
    /// * `type_id` - Sequence id stored with every token
    /// * `offset_type` - Whether offsets count bytes or chars of the original
    ///
    /// # Errors
    ///
    /// Returns [`TokenizerError::NotTokenized`] if a fragment has no tokens, or
    /// [`TokenizerError::OffsetMapping`] if a token's span has no counterpart
    /// in the original text.
    pub fn into_encoding(
        self,
        word_idx: Option<u32>,
        type_id: u32,
        offset_type: OffsetType,
    ) -> Result<Encoding> {
        if self.splits.is_empty() {
            return Ok(Encoding::default());
        }
        if self.splits.iter().any(|s| s.tokens.is_none()) {
            return Err(TokenizerError::NotTokenized);
        }

        let original_index = match offset_type {
            OffsetType::Byte => Some(CharIndex::new(&self.original)),
            OffsetType::Char => None,
        };
        let capacity = self
            .splits
            .iter()
            .map(|s| s.tokens.as_ref().map_or(0, Vec::len))
            .sum();
        let mut encoding = Encoding::with_capacity(capacity);

        for (idx, split) in self.splits.into_iter().enumerate() {
            let normalized = split.normalized;
            let tokens = split.tokens.unwrap_or_default();
            let shift = normalized.original_shift();
            let index = CharIndex::new(normalized.get());
            let word = word_idx.or(Some(idx as u32));

            for token in tokens {
                let (start, end) = index.chars_of_bytes(token.offsets);
                let range = normalized
                    .convert_offsets(Range::Normalized(start..end))
                    .ok_or(TokenizerError::OffsetMapping {
                        start: token.offsets.0,
                        end: token.offsets.1,
                    })?;
                let mut offsets = (shift + range.start, shift + range.end);
                if let Some(original_index) = &original_index {
                    offsets = original_index.bytes_of_chars(offsets).ok_or(
                        TokenizerError::OffsetMapping {
                            start: offsets.0,
                            end: offsets.1,
                        },
                    )?;
                }
                encoding.push(token.id, token.value, offsets, word, type_id);
            }
        }
        trace!(tokens = encoding.len(), "built encoding");
        Ok(encoding)
    }

    /// Every fragment with its text and offsets in the chosen referential.
    ///
    /// Offsets for [`OffsetReferential::Original`] are positions in the whole
    /// input; for [`OffsetReferential::Normalized`] they are cumulative over
    /// the concatenated normalized fragments.
    pub fn get_splits(
        &self,
        referential: OffsetReferential,
        offset_type: OffsetType,
    ) -> Vec<(&str, Offsets, &Option<Vec<Token>>)> {
        let original_index = CharIndex::new(&self.original);
        let mut normalized_offset = 0;
        self.splits
            .iter()
            .map(|split| {
                let normalized = &split.normalized;
                let offsets = match referential {
                    OffsetReferential::Original => {
                        let chars = normalized.offsets_original();
                        match offset_type {
                            OffsetType::Char => chars,
                            OffsetType::Byte => original_index
                                .bytes_of_chars(chars)
                                .unwrap_or((self.original.len(), self.original.len())),
                        }
                    }
                    OffsetReferential::Normalized => {
                        let len = match offset_type {
                            OffsetType::Char => normalized.len(),
                            OffsetType::Byte => normalized.get().len(),
                        };
                        let offsets = (normalized_offset, normalized_offset + len);
                        normalized_offset += len;
                        offsets
                    }
                };
                (normalized.get(), offsets, &split.tokens)
            })
            .collect()
    }

    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}

impl From<NormalizedString> for PreTokenizedString {
    fn from(normalized: NormalizedString) -> Self {
        Self {
            original: normalized.get_original().to_owned(),
            splits: vec![Split::from(normalized)],
        }
    }
}

impl From<&str> for PreTokenizedString {
    fn from(s: &str) -> Self {
        NormalizedString::from(s).into()
    }
}

impl From<String> for PreTokenizedString {
    fn from(s: String) -> Self {
        NormalizedString::from(s).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalized::SplitDelimiterBehavior;
    use crate::core::pattern::SysRegex;

    fn whole_word_tokens(normalized: &NormalizedString) -> Result<Vec<Token>> {
        Ok(vec![Token::new(
            0,
            normalized.get().to_owned(),
            (0, normalized.get().len()),
        )])
    }

    #[test]
    fn test_merged_with_next_example() {
        let mut pretokenized = PreTokenizedString::from("How are you doing?");
        let re = SysRegex::new(r"\s+|[^\w\s]+").unwrap();
        pretokenized
            .split(|_, normalized| normalized.split(&re, SplitDelimiterBehavior::MergedWithNext))
            .unwrap();
        let pieces: Vec<&str> = pretokenized
            .get_splits(OffsetReferential::Original, OffsetType::Byte)
            .into_iter()
            .map(|(s, _, _)| s)
            .collect();
        assert_eq!(pieces, vec!["How", " are", " you", " doing", "?"]);
    }

    #[test]
    fn test_empty_pieces_dropped() {
        let mut pretokenized = PreTokenizedString::from("  ");
        pretokenized
            .split(|_, normalized| normalized.split(' ', SplitDelimiterBehavior::Removed))
            .unwrap();
        assert!(pretokenized.is_empty());
        let encoding = pretokenized
            .into_encoding(None, 0, OffsetType::Byte)
            .unwrap();
        assert!(encoding.is_empty());
    }

    #[test]
    fn test_not_tokenized() {
        let pretokenized = PreTokenizedString::from("abc");
        assert!(matches!(
            pretokenized.into_encoding(None, 0, OffsetType::Byte),
            Err(TokenizerError::NotTokenized)
        ));
    }

    #[test]
    fn test_frozen_splits_skip_later_passes() {
        let mut pretokenized = PreTokenizedString::from("ab cd");
        pretokenized
            .split(|_, normalized| normalized.split(' ', SplitDelimiterBehavior::Removed))
            .unwrap();
        pretokenized.splits[0].tokens = Some(vec![Token::new(9, "ab".into(), (0, 2))]);
        pretokenized
            .normalize(|n| {
                n.uppercase();
                Ok(())
            })
            .unwrap();
        assert_eq!(pretokenized.splits()[0].normalized.get(), "ab");
        assert_eq!(pretokenized.splits()[1].normalized.get(), "CD");
    }

    #[test]
    fn test_into_encoding_offsets_after_normalization() {
        let mut pretokenized = PreTokenizedString::from("Héllo Wörld");
        pretokenized
            .split(|_, normalized| normalized.split(' ', SplitDelimiterBehavior::Removed))
            .unwrap();
        pretokenized
            .normalize(|n| {
                n.nfd().lowercase();
                Ok(())
            })
            .unwrap();
        pretokenized.tokenize(whole_word_tokens).unwrap();
        let encoding = pretokenized
            .clone()
            .into_encoding(None, 0, OffsetType::Byte)
            .unwrap();
        assert_eq!(encoding.get_offsets(), &[(0, 6), (7, 13)]);
        assert_eq!(encoding.get_word_ids(), &[Some(0), Some(1)]);

        let encoding = pretokenized
            .into_encoding(Some(3), 1, OffsetType::Char)
            .unwrap();
        assert_eq!(encoding.get_offsets(), &[(0, 5), (6, 11)]);
        assert_eq!(encoding.get_word_ids(), &[Some(3), Some(3)]);
        assert_eq!(encoding.get_type_ids(), &[1, 1]);
    }

    #[test]
    fn test_sub_char_tokens_map_to_their_char() {
        let mut pretokenized = PreTokenizedString::from("é");
        pretokenized
            .tokenize(|_| {
                Ok(vec![
                    Token::new(1, "<0xC3>".into(), (0, 1)),
                    Token::new(2, "<0xA9>".into(), (1, 2)),
                ])
            })
            .unwrap();
        let encoding = pretokenized
            .into_encoding(None, 0, OffsetType::Byte)
            .unwrap();
        assert_eq!(encoding.get_offsets(), &[(0, 2), (0, 2)]);
    }

    #[test]
    fn test_get_splits_normalized_referential() {
        let mut pretokenized = PreTokenizedString::from("aé b");
        pretokenized
            .split(|_, normalized| normalized.split(' ', SplitDelimiterBehavior::Removed))
            .unwrap();
        let splits = pretokenized.get_splits(OffsetReferential::Normalized, OffsetType::Char);
        assert_eq!(splits[0].1, (0, 2));
        assert_eq!(splits[1].1, (2, 3));
        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        assert_eq!(splits[1].1, (4, 5));
    }
}
