//! Alignment-tracked strings.
//!
//! A [`NormalizedString`] carries the text a caller handed us next to the text
//! produced by normalization. Every char of the normalized text owns one
//! alignment entry: the half-open char range of the original it came from.
//! All mutations go through [`NormalizedString::transform_range`], so the
//! alignment vector always has exactly one entry per normalized char.
//!
//! Ranges and alignments are counted in chars. Patterns report byte offsets
//! and are converted at the boundary.

use std::ops;

use unicode_normalization_alignments::char::is_combining_mark;
use unicode_normalization_alignments::UnicodeNormalization;

use super::offsets::{char_range_to_bytes, char_slice, CharIndex, Offsets};
use super::pattern::Pattern;
use super::tokenizer::Result;

/// Which text a [`Range`] indexes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetReferential {
    Original,
    Normalized,
}

/// A half-open char range tagged with the text it indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Range {
    Original(ops::Range<usize>),
    Normalized(ops::Range<usize>),
}

impl Range {
    /// Which text this range indexes into.
    pub fn referential(&self) -> OffsetReferential {
        match self {
            Range::Original(_) => OffsetReferential::Original,
            Range::Normalized(_) => OffsetReferential::Normalized,
        }
    }

    /// The char range, whatever its referential.
    pub fn inner(&self) -> &ops::Range<usize> {
        match self {
            Range::Original(r) | Range::Normalized(r) => r,
        }
    }

    pub fn into_inner(self) -> ops::Range<usize> {
        match self {
            Range::Original(r) | Range::Normalized(r) => r,
        }
    }
}

/// Clamp `range` to `[0, max_len]`, never producing `end < start`.
fn clip(range: ops::Range<usize>, max_len: usize) -> ops::Range<usize> {
    let start = range.start.min(max_len);
    let end = range.end.min(max_len).max(start);
    start..end
}

/// What happens to the delimiter matched while splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitDelimiterBehavior {
    /// Drop the delimiter.
    Removed,
    /// Keep the delimiter as its own piece.
    Isolated,
    /// Attach the delimiter to the piece before it.
    MergedWithPrevious,
    /// Attach the delimiter to the piece after it.
    MergedWithNext,
    /// Coalesce runs of adjacent delimiters (and of adjacent non-delimiters).
    Contiguous,
}

/// Original text, normalized text, and the char-level alignment between them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedString {
    original: String,
    normalized: String,
    /// One `(start, end)` char range into `original` per char of `normalized`.
    alignments: Vec<(usize, usize)>,
    /// Char offset of `original` inside the sentence it was sliced from.
    original_shift: usize,
}

impl NormalizedString {
    /// Assemble a normalized string from its parts.
    ///
    /// # Arguments
    /// * `original` - Text the alignments point into
    /// * `normalized` - Current normalized text
    /// * `alignments` - One original char range per normalized char
    /// * `original_shift` - Char position of `original` within the whole input
    ///
    /// The caller keeps `alignments.len()` equal to the char count of
    /// `normalized`.
    pub fn new(
        original: String,
        normalized: String,
        alignments: Vec<(usize, usize)>,
        original_shift: usize,
    ) -> Self {
        Self {
            original,
            normalized,
            alignments,
            original_shift,
        }
    }

    /// The current normalized text.
    pub fn get(&self) -> &str {
        &self.normalized
    }

    /// The original text this string was built from.
    ///
    /// For a slice this is only the part of the input the slice covers.
    pub fn get_original(&self) -> &str {
        &self.original
    }

    /// Original char range of every normalized char, in order.
    pub fn alignments(&self) -> &[(usize, usize)] {
        &self.alignments
    }

    /// Length of the normalized text, in chars.
    pub fn len(&self) -> usize {
        self.alignments.len()
    }

    /// Length of the original text, in chars.
    ///
    /// Counts only the chars of [`get_original`](Self::get_original), so a
    /// slice reports the length of the part it covers.
    pub fn len_original(&self) -> usize {
        self.original.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    /// Char position where [`get_original`](Self::get_original) starts in the input.
    pub fn original_shift(&self) -> usize {
        self.original_shift
    }

    /// Char span of `original` within the whole input sentence.
    pub fn offsets_original(&self) -> Offsets {
        (
            self.original_shift,
            self.original_shift + self.len_original(),
        )
    }

    /// Convert a range expressed in one referential into the other.
    ///
    /// An empty normalized range maps to the empty original range at the start
    /// of the char it points at, or at the end of the original text.
    ///
    /// # Arguments
    /// * `range` - Char range, tagged with the referential it is expressed in
    ///
    /// Returns `None` when the range has no counterpart, for example when it
    /// only covers chars that normalization removed.
    pub fn convert_offsets(&self, range: Range) -> Option<ops::Range<usize>> {
        match range {
            Range::Original(target) => {
                let target = clip(target, self.len_original());
                let (first, last) = match (self.alignments.first(), self.alignments.last()) {
                    (Some(first), Some(last)) => (*first, *last),
                    _ => return Some(0..0),
                };
                let len = self.alignments.len();
                if target.end <= first.0 {
                    return Some(0..0);
                }
                if target.start > last.1 {
                    return Some(len..len);
                }
                let start = self
                    .alignments
                    .iter()
                    .position(|&(s, _)| s >= target.start)
                    .unwrap_or(len);
                let end = self
                    .alignments
                    .iter()
                    .rposition(|&(_, e)| e <= target.end)
                    .map(|i| i + 1)?;
                (end >= start).then_some(start..end)
            }
            Range::Normalized(target) => {
                let target = clip(target, self.len());
                if self.alignments.is_empty() && target == (0..0) {
                    return Some(0..self.len_original());
                }
                if target.is_empty() {
                    let at = self
                        .alignments
                        .get(target.start)
                        .map_or(self.len_original(), |a| a.0);
                    return Some(at..at);
                }
                let aligned = &self.alignments[target];
                let (first, last) = (aligned.first()?, aligned.last()?);
                Some(first.0..last.1)
            }
        }
    }

    /// Normalized substring for `range`, in either referential.
    pub fn get_range(&self, range: Range) -> Option<&str> {
        let target = match range {
            Range::Original(_) => self.convert_offsets(range)?,
            Range::Normalized(r) => clip(r, self.len()),
        };
        char_slice(&self.normalized, target)
    }

    /// Original substring for `range`, in either referential.
    pub fn get_range_original(&self, range: Range) -> Option<&str> {
        let target = match range {
            Range::Original(r) => clip(r, self.len_original()),
            Range::Normalized(_) => self.convert_offsets(range)?,
        };
        char_slice(&self.original, target)
    }

    /// Extract the sub-string covered by `range` as a standalone
    /// `NormalizedString` whose alignments point into its own original.
    pub fn slice(&self, range: Range) -> Option<NormalizedString> {
        let norm_index = CharIndex::new(&self.normalized);
        let orig_index = CharIndex::new(&self.original);
        self.slice_indexed(range, &norm_index, &orig_index)
    }

    fn slice_indexed(
        &self,
        range: Range,
        norm_index: &CharIndex,
        orig_index: &CharIndex,
    ) -> Option<NormalizedString> {
        let len_original = orig_index.len_chars();
        let (n_range, mut o_range) = match range {
            Range::Original(r) => {
                let r = clip(r, len_original);
                (self.convert_offsets(Range::Original(r.clone()))?, r)
            }
            Range::Normalized(r) => {
                let r = clip(r, self.len());
                let o = self.convert_offsets(Range::Normalized(r.clone()))?;
                (r, o)
            }
        };

        // Text removed before the first char still belongs to the first slice.
        if n_range.start == 0 {
            o_range.start = 0;
        }
        // Text removed between this slice and the next char belongs to this slice.
        if let Some(&(next_start, _)) = self.alignments.get(n_range.end) {
            if next_start > o_range.end {
                o_range.end = next_start;
            }
        }
        let o_range = clip(o_range, len_original);

        let (ns, ne) = norm_index.bytes_of_chars((n_range.start, n_range.end))?;
        let (os, oe) = orig_index.bytes_of_chars((o_range.start, o_range.end))?;
        let rebase = o_range.start;
        Some(NormalizedString {
            original: self.original.get(os..oe)?.to_owned(),
            normalized: self.normalized.get(ns..ne)?.to_owned(),
            alignments: self.alignments[n_range]
                .iter()
                .map(|&(s, e)| (s.saturating_sub(rebase), e.saturating_sub(rebase)))
                .collect(),
            original_shift: self.original_shift + rebase,
        })
    }

    /// Replace the chars of `range` with `changes`, keeping alignments in sync.
    ///
    /// Each change is a char and a tag relative to the chars being replaced:
    /// `0` takes over the char at the running position, `1` inserts a new char
    /// sharing the alignment of the one before it, and `-n` takes over the char
    /// at the running position and drops the `n` chars after it.
    /// `initial_offset` chars are dropped before the first change applies.
    pub fn transform_range<I>(&mut self, range: Range, changes: I, initial_offset: usize) -> &mut Self
    where
        I: IntoIterator<Item = (char, isize)>,
    {
        let n_range = match range {
            Range::Normalized(r) => clip(r, self.len()),
            Range::Original(_) => match self.convert_offsets(range) {
                Some(r) => r,
                None => return self,
            },
        };
        let Some((byte_start, byte_end)) = char_range_to_bytes(&self.normalized, n_range.clone())
        else {
            return self;
        };

        let mut offset = n_range.start + initial_offset;
        let mut produced = String::with_capacity(byte_end - byte_start);
        let mut produced_alignments: Vec<(usize, usize)> = Vec::with_capacity(n_range.len());
        for (c, change) in changes {
            let alignment = if change > 0 {
                produced_alignments
                    .last()
                    .copied()
                    .or_else(|| {
                        offset
                            .checked_sub(1)
                            .and_then(|i| self.alignments.get(i).copied())
                    })
                    .unwrap_or((0, 0))
            } else {
                let alignment = self
                    .alignments
                    .get(offset)
                    .copied()
                    .or_else(|| produced_alignments.last().copied())
                    .unwrap_or((0, 0));
                offset += 1 + change.unsigned_abs();
                alignment
            };
            produced.push(c);
            produced_alignments.push(alignment);
        }

        self.normalized.replace_range(byte_start..byte_end, &produced);
        self.alignments.splice(n_range, produced_alignments);
        self
    }

    /// [`transform_range`](Self::transform_range) over the whole normalized text.
    pub fn transform<I>(&mut self, changes: I, initial_offset: usize) -> &mut Self
    where
        I: IntoIterator<Item = (char, isize)>,
    {
        let len = self.len();
        self.transform_range(Range::Normalized(0..len), changes, initial_offset)
    }

    /// Apply canonical decomposition (NFD).
    ///
    /// Every char produced by a decomposition keeps the alignment of the char
    /// it came from.
    pub fn nfd(&mut self) -> &mut Self {
        let changes: Vec<(char, isize)> = self.get().nfd().collect();
        self.transform(changes, 0)
    }

    /// Apply compatibility decomposition (NFKD).
    pub fn nfkd(&mut self) -> &mut Self {
        let changes: Vec<(char, isize)> = self.get().nfkd().collect();
        self.transform(changes, 0)
    }

    /// Apply canonical composition (NFC).
    ///
    /// A composed char takes the alignment of the first char it was built from.
    pub fn nfc(&mut self) -> &mut Self {
        let changes: Vec<(char, isize)> = self.get().nfc().collect();
        self.transform(changes, 0)
    }

    /// Apply compatibility composition (NFKC).
    pub fn nfkc(&mut self) -> &mut Self {
        let changes: Vec<(char, isize)> = self.get().nfkc().collect();
        self.transform(changes, 0)
    }

    /// Decompose, then drop every combining mark.
    pub fn strip_accents(&mut self) -> &mut Self {
        self.nfd().filter(|c| !is_combining_mark(c))
    }

    /// Lowercase every char. Chars that lowercase to several chars
    /// (`İ` becomes `i̇`) align every result with the source char.
    pub fn lowercase(&mut self) -> &mut Self {
        let mut changes = Vec::with_capacity(self.normalized.len());
        for c in self.normalized.chars() {
            changes.extend(
                c.to_lowercase()
                    .enumerate()
                    .map(|(i, lc)| (lc, isize::from(i > 0))),
            );
        }
        self.transform(changes, 0)
    }

    /// Uppercase every char, `ß` becoming `SS`.
    pub fn uppercase(&mut self) -> &mut Self {
        let mut changes = Vec::with_capacity(self.normalized.len());
        for c in self.normalized.chars() {
            changes.extend(
                c.to_uppercase()
                    .enumerate()
                    .map(|(i, uc)| (uc, isize::from(i > 0))),
            );
        }
        self.transform(changes, 0)
    }

    /// Keep only the chars for which `keep` returns `true`.
    pub fn filter<F: Fn(char) -> bool>(&mut self, keep: F) -> &mut Self {
        let mut removed: usize = 0;
        let mut removed_start: usize = 0;
        let mut changes = Vec::with_capacity(self.normalized.len());
        let mut last_kept = None;
        for c in self.normalized.chars() {
            if keep(c) {
                match last_kept {
                    Some(lc) => changes.push((lc, -(removed as isize))),
                    None => removed_start = removed,
                }
                last_kept = Some(c);
                removed = 0;
            } else {
                removed += 1;
            }
        }
        if let Some(lc) = last_kept {
            changes.push((lc, -(removed as isize)));
        }
        self.transform(changes, removed_start)
    }

    /// Replace every char with `map(c)`.
    pub fn map<F: Fn(char) -> char>(&mut self, map: F) -> &mut Self {
        let changes: Vec<(char, isize)> = self.normalized.chars().map(|c| (map(c), 0)).collect();
        self.transform(changes, 0)
    }

    /// Remove leading and trailing whitespace.
    pub fn strip(&mut self) -> &mut Self {
        self.lrstrip(true, true)
    }

    pub fn lstrip(&mut self) -> &mut Self {
        self.lrstrip(true, false)
    }

    pub fn rstrip(&mut self) -> &mut Self {
        self.lrstrip(false, true)
    }

    fn lrstrip(&mut self, left: bool, right: bool) -> &mut Self {
        let leading = if left {
            self.normalized.chars().take_while(|c| c.is_whitespace()).count()
        } else {
            0
        };
        let trailing = if right {
            self.normalized
                .chars()
                .rev()
                .take_while(|c| c.is_whitespace())
                .count()
        } else {
            0
        };
        if leading == 0 && trailing == 0 {
            return self;
        }

        let count = self.len();
        let kept_end = count.saturating_sub(trailing);
        let changes: Vec<(char, isize)> = self
            .normalized
            .chars()
            .enumerate()
            .filter_map(|(i, c)| {
                if i < leading || i >= kept_end {
                    None
                } else if i + 1 == kept_end {
                    Some((c, -(trailing as isize)))
                } else {
                    Some((c, 0))
                }
            })
            .collect();
        self.transform(changes, leading)
    }

    /// Insert `s` in front of the normalized text, aligned with its first char.
    pub fn prepend(&mut self, s: &str) -> &mut Self {
        if let Some(first) = self.normalized.chars().next() {
            let changes: Vec<(char, isize)> = s
                .chars()
                .enumerate()
                .map(|(i, c)| (c, isize::from(i != 0)))
                .chain(std::iter::once((first, 1)))
                .collect();
            self.transform_range(Range::Normalized(0..1), changes, 0);
        }
        self
    }

    /// Add `s` after the normalized text, aligned with its last char.
    pub fn append(&mut self, s: &str) -> &mut Self {
        if let Some(last) = self.normalized.chars().next_back() {
            let len = self.len();
            let changes: Vec<(char, isize)> = std::iter::once((last, 0))
                .chain(s.chars().map(|c| (c, 1)))
                .collect();
            self.transform_range(Range::Normalized(len - 1..len), changes, 0);
        }
        self
    }

    /// Replace every match of `pattern` with `content`.
    ///
    /// Inserted chars align with the last char of the match they replace, and
    /// an empty `content` removes the matches outright.
    ///
    /// # Arguments
    /// * `pattern` - What to look for in the normalized text
    /// * `content` - Replacement text, possibly empty
    ///
    /// # Errors
    ///
    /// Returns an error if a regex pattern fails while matching.
    pub fn replace<P: Pattern>(&mut self, pattern: P, content: &str) -> Result<&mut Self> {
        let matches = pattern.find_matches(&self.normalized)?;
        let index = CharIndex::new(&self.normalized);
        let content_len = content.chars().count() as isize;

        let mut shift: isize = 0;
        for (offsets, is_match) in matches {
            if !is_match {
                continue;
            }
            let (start, end) = index.chars_of_bytes(offsets);
            let removed = end - start;
            let range = (start as isize + shift) as usize..(end as isize + shift) as usize;
            self.transform_range(
                Range::Normalized(range),
                content.chars().map(|c| (c, 1)),
                removed,
            );
            shift += content_len - removed as isize;
        }
        Ok(self)
    }

    /// Split on `pattern`, handling the matched delimiters per `behavior`.
    ///
    /// Every piece is a [`slice`](Self::slice) of `self`, so its alignments
    /// and shift still lead back to the sentence `self` came from. Empty
    /// pieces are dropped unless `self` itself is empty.
    ///
    /// # Arguments
    /// * `pattern` - Delimiter to look for in the normalized text
    /// * `behavior` - What to do with each matched delimiter
    ///
    /// # Errors
    ///
    /// Returns an error if a regex pattern fails while matching.
    ///
    /// # Example
    ///
    /// ```
    /// use tokalign::{NormalizedString, SplitDelimiterBehavior};
    ///
    /// let mut n = NormalizedString::from("Hello, World");
    /// n.lowercase().filter(|c| c != ',');
    /// let words = n.split(' ', SplitDelimiterBehavior::Removed).unwrap();
    /// assert_eq!(words[0].get(), "hello");
    /// assert_eq!(words[0].offsets_original(), (0, 6));
    /// assert_eq!(words[1].offsets_original(), (7, 12));
    /// ```
    pub fn split<P: Pattern>(
        &self,
        pattern: P,
        behavior: SplitDelimiterBehavior,
    ) -> Result<Vec<NormalizedString>> {
        let matches = pattern.find_matches(&self.normalized)?;

        // (offsets, should_remove)
        let pieces: Vec<(Offsets, bool)> = match behavior {
            SplitDelimiterBehavior::Removed => matches,
            SplitDelimiterBehavior::Isolated => matches
                .into_iter()
                .map(|(offsets, _)| (offsets, false))
                .collect(),
            SplitDelimiterBehavior::Contiguous => {
                let mut previous_match = false;
                matches
                    .into_iter()
                    .fold(Vec::new(), |mut acc, (offsets, is_match)| {
                        match acc.last_mut() {
                            Some(((_, end), _)) if is_match == previous_match => *end = offsets.1,
                            _ => acc.push((offsets, false)),
                        }
                        previous_match = is_match;
                        acc
                    })
            }
            SplitDelimiterBehavior::MergedWithPrevious => {
                let mut previous_match = false;
                matches
                    .into_iter()
                    .fold(Vec::new(), |mut acc, (offsets, is_match)| {
                        match acc.last_mut() {
                            Some(((_, end), _)) if is_match && !previous_match => *end = offsets.1,
                            _ => acc.push((offsets, false)),
                        }
                        previous_match = is_match;
                        acc
                    })
            }
            SplitDelimiterBehavior::MergedWithNext => {
                let mut previous_match = false;
                let mut merged =
                    matches
                        .into_iter()
                        .rev()
                        .fold(Vec::new(), |mut acc, (offsets, is_match)| {
                            match acc.last_mut() {
                                Some(((start, _), _)) if is_match && !previous_match => {
                                    *start = offsets.0
                                }
                                _ => acc.push((offsets, false)),
                            }
                            previous_match = is_match;
                            acc
                        });
                merged.reverse();
                merged
            }
        };

        let norm_index = CharIndex::new(&self.normalized);
        let orig_index = CharIndex::new(&self.original);
        Ok(pieces
            .into_iter()
            .filter(|(_, remove)| !remove)
            .map(|(offsets, _)| norm_index.chars_of_bytes(offsets))
            .filter(|&(start, end)| start < end || self.is_empty())
            .filter_map(|(start, end)| {
                self.slice_indexed(Range::Normalized(start..end), &norm_index, &orig_index)
            })
            .collect())
    }
}

impl From<String> for NormalizedString {
    fn from(s: String) -> Self {
        let alignments = (0..s.chars().count()).map(|i| (i, i + 1)).collect();
        Self {
            original: s.clone(),
            normalized: s,
            alignments,
            original_shift: 0,
        }
    }
}

impl From<&str> for NormalizedString {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}
