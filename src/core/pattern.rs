//! Patterns used to locate delimiters inside a string.
//!
//! A [`Pattern`] turns a haystack into an ordered, gapless list of byte ranges,
//! each flagged as a match or not. Splitting and replacing are built on it.

use fancy_regex::Regex;

use super::offsets::Offsets;
use super::tokenizer::Result;

/// Something able to locate delimiters in a string.
pub trait Pattern {
    /// Cut `inside` into consecutive `(byte_range, is_match)` pieces covering
    /// the whole string. An empty string yields `[((0, 0), false)]`.
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>>;
}

/// Interleave `matches` with the gaps between them.
fn fill_gaps<I>(inside: &str, matches: I) -> Vec<(Offsets, bool)>
where
    I: IntoIterator<Item = Offsets>,
{
    let mut prev = 0;
    let mut pieces = Vec::new();
    for (start, end) in matches {
        // zero-width matches are not delimiters
        if start == end {
            continue;
        }
        if prev != start {
            pieces.push(((prev, start), false));
        }
        pieces.push(((start, end), true));
        prev = end;
    }
    if prev != inside.len() {
        pieces.push(((prev, inside.len()), false));
    }
    pieces
}

impl Pattern for char {
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        let target = *self;
        (move |c: char| c == target).find_matches(inside)
    }
}

impl Pattern for &str {
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        if inside.is_empty() {
            return Ok(vec![((0, 0), false)]);
        }
        if self.is_empty() {
            return Ok(vec![((0, inside.len()), false)]);
        }
        let matches = inside
            .match_indices(*self)
            .map(|(start, m)| (start, start + m.len()));
        Ok(fill_gaps(inside, matches))
    }
}

impl Pattern for &String {
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        self.as_str().find_matches(inside)
    }
}

impl<F> Pattern for F
where
    F: Fn(char) -> bool,
{
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        if inside.is_empty() {
            return Ok(vec![((0, 0), false)]);
        }
        let matches = inside
            .char_indices()
            .filter(|(_, c)| self(*c))
            .map(|(start, c)| (start, start + c.len_utf8()));
        Ok(fill_gaps(inside, matches))
    }
}

/// A compiled regular expression usable as a [`Pattern`].
///
/// Backed by `fancy-regex`, so lookarounds used by common pre-tokenizer
/// patterns (`\s+(?!\S)`) are supported.
#[derive(Debug, Clone)]
pub struct SysRegex {
    regex: Regex,
}

impl SysRegex {
    /// Compile `pattern`.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` is not a valid `fancy-regex` pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Byte ranges of every match, left to right.
    ///
    /// # Errors
    ///
    /// Returns an error if matching exceeds the backtracking limit.
    pub fn find_offsets(&self, inside: &str) -> Result<Vec<Offsets>> {
        let mut offsets = Vec::new();
        for m in self.regex.find_iter(inside) {
            let m = m?;
            offsets.push((m.start(), m.end()));
        }
        Ok(offsets)
    }
}

impl Pattern for &SysRegex {
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        if inside.is_empty() {
            return Ok(vec![((0, 0), false)]);
        }
        Ok(fill_gaps(inside, self.find_offsets(inside)?))
    }
}

/// Flips which pieces of the wrapped pattern count as matches.
#[derive(Debug, Clone, Copy)]
pub struct Invert<P: Pattern>(pub P);

impl<P: Pattern> Pattern for Invert<P> {
    fn find_matches(&self, inside: &str) -> Result<Vec<(Offsets, bool)>> {
        Ok(self
            .0
            .find_matches(inside)?
            .into_iter()
            .map(|(offsets, is_match)| (offsets, !is_match))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_pattern() {
        assert_eq!(
            'a'.find_matches("aba").unwrap(),
            vec![((0, 1), true), ((1, 2), false), ((2, 3), true)]
        );
        assert_eq!(
            'x'.find_matches("aba").unwrap(),
            vec![((0, 3), false)]
        );
        assert_eq!('x'.find_matches("").unwrap(), vec![((0, 0), false)]);
    }

    #[test]
    fn test_str_pattern() {
        assert_eq!(
            "ab".find_matches("xabyab").unwrap(),
            vec![((0, 1), false), ((1, 3), true), ((3, 4), false), ((4, 6), true)]
        );
        // an empty literal never matches
        assert_eq!("".find_matches("abc").unwrap(), vec![((0, 3), false)]);
    }

    #[test]
    fn test_fn_pattern_multibyte() {
        let pieces = (|c: char| c == 'é').find_matches("aéb").unwrap();
        assert_eq!(pieces, vec![((0, 1), false), ((1, 3), true), ((3, 4), false)]);
    }

    #[test]
    fn test_regex_pattern() {
        let re = SysRegex::new(r"\s+").unwrap();
        assert_eq!(
            (&re).find_matches("a  b").unwrap(),
            vec![((0, 1), false), ((1, 3), true), ((3, 4), false)]
        );
    }

    #[test]
    fn test_regex_skips_zero_width() {
        let re = SysRegex::new(r"\b").unwrap();
        assert_eq!((&re).find_matches("ab").unwrap(), vec![((0, 2), false)]);
    }

    #[test]
    fn test_regex_lookahead() {
        let re = SysRegex::new(r"\s+(?!\S)").unwrap();
        let pieces = (&re).find_matches("a   b").unwrap();
        assert_eq!(pieces, vec![((0, 1), false), ((1, 3), true), ((3, 5), false)]);
    }

    #[test]
    fn test_invalid_regex() {
        assert!(SysRegex::new("(unclosed").is_err());
    }

    #[test]
    fn test_invert() {
        assert_eq!(
            Invert('a').find_matches("ab").unwrap(),
            vec![((0, 1), false), ((1, 2), true)]
        );
    }
}
