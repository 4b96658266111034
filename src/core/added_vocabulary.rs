//! Tokens matched verbatim in the raw input.
//!
//! Added tokens are found with a leftmost-longest Aho-Corasick scan before any
//! normalization. Each match becomes a frozen fragment carrying its token, and
//! only the text between matches goes through the normalizer.

use aho_corasick::{AhoCorasick, MatchKind};
use rustc_hash::{FxHashMap, FxHashSet};

use super::normalized::{NormalizedString, Range};
use super::offsets::{CharIndex, Offsets};
use super::pretokenized::{PreTokenizedString, Split, Token};
use super::tokenizer::Result;
use crate::normalizers::Normalizer;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddedToken {
    pub content: String,
    pub id: u32,
    /// Special tokens are flagged in the special tokens mask and can be
    /// skipped when decoding.
    pub special: bool,
}

impl AddedToken {
    pub fn new(content: impl Into<String>, id: u32) -> Self {
        Self {
            content: content.into(),
            id,
            special: false,
        }
    }

    pub fn special(content: impl Into<String>, id: u32) -> Self {
        Self {
            special: true,
            ..Self::new(content, id)
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddedVocabulary {
    tokens: Vec<AddedToken>,
    by_content: FxHashMap<String, u32>,
    by_id: FxHashMap<u32, String>,
    special_ids: FxHashSet<u32>,
    matcher: Option<AhoCorasick>,
}

impl AddedVocabulary {
    /// Register `tokens`, skipping empty and already known contents.
    ///
    /// Returns how many tokens were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the Aho-Corasick matcher cannot be built.
    pub fn add_tokens(&mut self, tokens: Vec<AddedToken>) -> Result<usize> {
        let mut added = 0;
        for token in tokens {
            if token.content.is_empty() || self.by_content.contains_key(&token.content) {
                continue;
            }
            self.by_content.insert(token.content.clone(), token.id);
            self.by_id.insert(token.id, token.content.clone());
            if token.special {
                self.special_ids.insert(token.id);
            }
            self.tokens.push(token);
            added += 1;
        }
        if added > 0 {
            self.matcher = Some(
                AhoCorasick::builder()
                    .match_kind(MatchKind::LeftmostLongest)
                    .build(self.tokens.iter().map(|t| t.content.as_str()))?,
            );
        }
        Ok(added)
    }

    /// Byte spans of every added token in `text` with the matched token id.
    pub fn find_matches(&self, text: &str) -> Vec<(Offsets, u32)> {
        let Some(matcher) = &self.matcher else {
            return Vec::new();
        };
        matcher
            .find_iter(text)
            .map(|m| ((m.start(), m.end()), self.tokens[m.pattern().as_usize()].id))
            .collect()
    }

    /// Split `text` around added tokens and normalize the remaining pieces.
    pub fn extract_and_normalize<N: Normalizer + ?Sized>(
        &self,
        normalizer: Option<&N>,
        text: &str,
    ) -> Result<PreTokenizedString> {
        let mut pretokenized = PreTokenizedString::from(text);
        pretokenized.split(|_, normalized| {
            let matches = self.find_matches(normalized.get());
            let index = CharIndex::new(normalized.get());
            let piece = |start: usize, end: usize| -> Option<NormalizedString> {
                let range = index.chars_of_bytes((start, end));
                normalized.slice(Range::Normalized(range.0..range.1))
            };

            let mut splits: Vec<Split> = Vec::with_capacity(2 * matches.len() + 1);
            let mut last = 0;
            for ((start, end), id) in matches {
                if start > last {
                    if let Some(gap) = piece(last, start) {
                        splits.push(self.normalize_piece(normalizer, gap)?);
                    }
                }
                if let Some(matched) = piece(start, end) {
                    let content = matched.get().to_owned();
                    let len = content.len();
                    splits.push((matched, Some(vec![Token::new(id, content, (0, len))])).into());
                }
                last = end;
            }
            if last < normalized.get().len() {
                if let Some(rest) = piece(last, normalized.get().len()) {
                    splits.push(self.normalize_piece(normalizer, rest)?);
                }
            }
            Ok(splits)
        })?;
        Ok(pretokenized)
    }

    fn normalize_piece<N: Normalizer + ?Sized>(
        &self,
        normalizer: Option<&N>,
        mut piece: NormalizedString,
    ) -> Result<Split> {
        if let Some(normalizer) = normalizer {
            normalizer.normalize(&mut piece)?;
        }
        Ok(piece.into())
    }

    pub fn is_special(&self, id: u32) -> bool {
        self.special_ids.contains(&id)
    }

    pub fn token_to_id(&self, content: &str) -> Option<u32> {
        self.by_content.get(content).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &AddedToken> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalized::OffsetReferential;
    use crate::core::offsets::OffsetType;
    use crate::normalizers::NormalizerWrapper;

    fn make_test_vocabulary() -> AddedVocabulary {
        let mut vocab = AddedVocabulary::default();
        let added = vocab
            .add_tokens(vec![
                AddedToken::special("<s>", 1),
                AddedToken::new("<sep>", 2),
                AddedToken::new("<s>", 9),
                AddedToken::new("", 3),
            ])
            .unwrap();
        assert_eq!(added, 2);
        vocab
    }

    #[test]
    fn test_leftmost_longest() {
        let vocab = make_test_vocabulary();
        assert_eq!(
            vocab.find_matches("a<sep>b<s>"),
            vec![((1, 6), 2), ((7, 10), 1)]
        );
        assert!(vocab.is_special(1));
        assert!(!vocab.is_special(2));
        assert_eq!(vocab.token_to_id("<s>"), Some(1));
        assert_eq!(vocab.id_to_token(2), Some("<sep>"));
    }

    #[test]
    fn test_matches_become_frozen_splits() {
        let vocab = make_test_vocabulary();
        let pretokenized = vocab
            .extract_and_normalize(Some(&NormalizerWrapper::Uppercase), "é<s>ab<sep>")
            .unwrap();
        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        let summary: Vec<(&str, Offsets, bool)> = splits
            .iter()
            .map(|(s, o, t)| (*s, *o, t.is_some()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("É", (0, 2), false),
                ("<s>", (2, 5), true),
                ("AB", (5, 7), false),
                ("<sep>", (7, 12), true),
            ]
        );
    }

    #[test]
    fn test_no_matches() {
        let vocab = AddedVocabulary::default();
        let pretokenized = vocab
            .extract_and_normalize(None::<&NormalizerWrapper>, "plain text")
            .unwrap();
        assert_eq!(pretokenized.len(), 1);
        assert_eq!(pretokenized.splits()[0].normalized.get(), "plain text");

        let empty = vocab
            .extract_and_normalize(None::<&NormalizerWrapper>, "")
            .unwrap();
        assert!(empty.is_empty());
    }
}
