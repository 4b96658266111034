//! Offset units and conversions between byte and character positions.
//!
//! Alignments inside [`NormalizedString`](super::normalized::NormalizedString)
//! are expressed in characters, while patterns and models report byte offsets
//! into the `&str` they were given. [`CharIndex`] bridges the two.

/// A `(start, end)` pair, half-open.
pub type Offsets = (usize, usize);

/// Unit used for the offsets of a produced [`Encoding`](super::encoding::Encoding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OffsetType {
    /// Byte offsets into the UTF-8 input.
    #[default]
    Byte,
    /// Character (Unicode scalar value) offsets into the input.
    Char,
}

/// Byte position of every char boundary of a string, plus its total length.
#[derive(Debug, Clone)]
pub(crate) struct CharIndex {
    boundaries: Vec<usize>,
}

impl CharIndex {
    pub(crate) fn new(s: &str) -> Self {
        let mut boundaries = Vec::with_capacity(s.len() + 1);
        boundaries.extend(s.char_indices().map(|(b, _)| b));
        boundaries.push(s.len());
        Self { boundaries }
    }

    /// Number of chars in the indexed string.
    pub(crate) fn len_chars(&self) -> usize {
        self.boundaries.len() - 1
    }

    /// Byte position where char `char_idx` starts (`len` for one past the end).
    #[inline]
    pub(crate) fn byte_of(&self, char_idx: usize) -> Option<usize> {
        self.boundaries.get(char_idx).copied()
    }

    /// Char index of `byte`, only if `byte` lies exactly on a boundary.
    #[cfg(test)]
    pub(crate) fn char_of(&self, byte: usize) -> Option<usize> {
        self.boundaries.binary_search(&byte).ok()
    }

    /// Char index of the last boundary at or before `byte`.
    #[inline]
    pub(crate) fn char_floor(&self, byte: usize) -> usize {
        match self.boundaries.binary_search(&byte) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }

    /// Convert a byte range to a char range.
    ///
    /// Both ends snap back to the last boundary at or before them, so an end
    /// inside a char leaves that char out. A non-empty byte range that lands
    /// inside a single char maps to that char.
    pub(crate) fn chars_of_bytes(&self, offsets: Offsets) -> Offsets {
        let start = self.char_floor(offsets.0);
        let mut end = self.char_floor(offsets.1);
        if end <= start && offsets.1 > offsets.0 {
            end = (start + 1).min(self.len_chars());
        }
        (start, end.max(start))
    }

    /// Convert a char range to a byte range.
    pub(crate) fn bytes_of_chars(&self, offsets: Offsets) -> Option<Offsets> {
        Some((self.byte_of(offsets.0)?, self.byte_of(offsets.1)?))
    }
}

/// Byte range covering chars `range` of `s`, `None` if out of bounds.
pub(crate) fn char_range_to_bytes(s: &str, range: std::ops::Range<usize>) -> Option<Offsets> {
    let mut boundaries = s
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(s.len()));
    let start = boundaries.nth(range.start)?;
    let end = if range.end <= range.start {
        start
    } else {
        boundaries.nth(range.end - range.start - 1)?
    };
    Some((start, end))
}

/// Substring of `s` made of chars `range`.
pub(crate) fn char_slice(s: &str, range: std::ops::Range<usize>) -> Option<&str> {
    let (start, end) = char_range_to_bytes(s, range)?;
    s.get(start..end)
}
