//! Byte-level pre-tokenization and decoding.
//!
//! GPT-2 style models operate on bytes rather than chars. Every byte (0-255) is
//! mapped to a printable char so the result is still a `&str` and can flow
//! through the rest of the pipeline:
//!
//! - Bytes 33-126, 161-172 and 174-255 map to themselves
//! - The remaining bytes (0-32, 127-160, 173) map to U+0100 onwards
//!
//! A multi-byte char becomes several chars. They all share the alignment of
//! the char they came from, so offsets still point at whole input chars.

use std::sync::LazyLock;

use rustc_hash::{FxHashMap, FxHashSet};

use super::normalized::SplitDelimiterBehavior;
use super::pattern::SysRegex;
use super::pretokenized::PreTokenizedString;
use super::tokenizer::Result;
use crate::decoders::Decoder;
use crate::pre_tokenizers::PreTokenizer;

/// GPT-2 word splitting pattern.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// cl100k_base word splitting pattern.
pub const CL100K_BASE_PATTERN: &str = r"(?i:'s|'t|'re|'ve|'m|'ll|'d)|[^\r\n\p{L}\p{N}]?\p{L}+|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

/// o200k_base word splitting pattern.
pub const O200K_BASE_PATTERN: &str = r"[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]*[\p{Ll}\p{Lm}\p{Lo}\p{M}]+(?i:'s|'t|'re|'ve|'m|'ll|'d)?|[^\r\n\p{L}\p{N}]?[\p{Lu}\p{Lt}\p{Lm}\p{Lo}\p{M}]+[\p{Ll}\p{Lm}\p{Lo}\p{M}]*(?i:'s|'t|'re|'ve|'m|'ll|'d)?|\p{N}{1,3}| ?[^\s\p{L}\p{N}]+[\r\n]*|\s*[\r\n]+|\s+(?!\S)|\s+";

static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let is_direct = |b: u8| matches!(b, 33..=126 | 161..=172 | 174..=255);
    let mut mapping = ['\0'; 256];
    let mut next = 0x100u32;
    for b in 0u8..=255 {
        mapping[b as usize] = if is_direct(b) {
            char::from(b)
        } else {
            let c = char::from_u32(next).unwrap_or(char::REPLACEMENT_CHARACTER);
            next += 1;
            c
        };
    }
    mapping
});

static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// The char standing for `byte`.
#[inline]
pub fn byte_to_char(byte: u8) -> char {
    BYTE_TO_CHAR[byte as usize]
}

/// The byte a byte-level char stands for.
#[inline]
pub fn char_to_byte(ch: char) -> Option<u8> {
    CHAR_TO_BYTE.get(&ch).copied()
}

/// Map raw bytes to their byte-level string.
pub fn byte_level_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| byte_to_char(b)).collect()
}

/// Map a byte-level string back to raw bytes, `None` on a foreign char.
pub fn byte_level_decode(text: &str) -> Option<Vec<u8>> {
    text.chars().map(char_to_byte).collect()
}

/// The 256 chars a byte-level vocabulary is built from.
pub fn alphabet() -> FxHashSet<char> {
    BYTE_TO_CHAR.iter().copied().collect()
}

/// Transform changes replacing every char of `s` by the chars of its bytes.
fn byte_changes(s: &str) -> Vec<(char, isize)> {
    let mut changes = Vec::with_capacity(s.len());
    let mut buf = [0u8; 4];
    for c in s.chars() {
        let bytes = c.encode_utf8(&mut buf).as_bytes();
        changes.extend(
            bytes
                .iter()
                .enumerate()
                .map(|(i, &b)| (byte_to_char(b), isize::from(i > 0))),
        );
    }
    changes
}

/// Byte-level pre-tokenizer and decoder.
#[derive(Debug, Clone)]
pub struct ByteLevel {
    /// Add a leading space to a fragment that lacks one, so the first word is
    /// treated like any other.
    pub add_prefix_space: bool,
    regex: Option<SysRegex>,
}

impl ByteLevel {
    /// Byte-level mapping, splitting words with [`GPT2_PATTERN`] when `use_regex`.
    ///
    /// # Errors
    ///
    /// Returns an error if the word pattern fails to compile.
    pub fn new(add_prefix_space: bool, use_regex: bool) -> Result<Self> {
        let regex = if use_regex {
            Some(SysRegex::new(GPT2_PATTERN)?)
        } else {
            None
        };
        Ok(Self {
            add_prefix_space,
            regex,
        })
    }

    /// Byte-level mapping with a custom word splitting pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` does not compile.
    pub fn with_pattern(add_prefix_space: bool, pattern: &str) -> Result<Self> {
        Ok(Self {
            add_prefix_space,
            regex: Some(SysRegex::new(pattern)?),
        })
    }

    pub fn pattern(&self) -> Option<&str> {
        self.regex.as_ref().map(SysRegex::as_str)
    }
}

impl PreTokenizer for ByteLevel {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, mut normalized| {
            if self.add_prefix_space && !normalized.get().starts_with(' ') {
                normalized.prepend(" ");
            }
            match &self.regex {
                Some(re) => normalized.split(re, SplitDelimiterBehavior::Isolated),
                None => Ok(vec![normalized]),
            }
        })?;
        pretokenized.normalize(|normalized| {
            let changes = byte_changes(normalized.get());
            normalized.transform(changes, 0);
            Ok(())
        })
    }
}

impl Decoder for ByteLevel {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        let mut bytes = Vec::with_capacity(tokens.iter().map(String::len).sum());
        let mut buf = [0u8; 4];
        for c in tokens.iter().flat_map(|t| t.chars()) {
            match char_to_byte(c) {
                Some(b) => bytes.push(b),
                None => bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes()),
            }
        }
        Ok(vec![String::from_utf8_lossy(&bytes).into_owned()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalized::OffsetReferential;
    use crate::core::offsets::OffsetType;

    #[test]
    fn test_mapping_is_bijective() {
        assert_eq!(alphabet().len(), 256);
        for b in 0u8..=255 {
            assert_eq!(char_to_byte(byte_to_char(b)), Some(b));
        }
    }

    #[test]
    fn test_space_and_printable() {
        assert_eq!(byte_to_char(b' '), '\u{0120}');
        assert_eq!(byte_to_char(b'\n'), '\u{010A}');
        for b in 33u8..=126 {
            assert_eq!(byte_to_char(b), char::from(b));
        }
    }

    #[test]
    fn test_encode_decode_multibyte() {
        let text = "Hello, 世界! 🌍";
        let encoded = byte_level_encode(text.as_bytes());
        assert_eq!(encoded.chars().count(), text.len());
        let decoded = byte_level_decode(&encoded).unwrap();
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
        assert!(byte_level_decode("\u{4e16}").is_none());
    }

    #[test]
    fn test_pre_tokenize_splits_and_maps() {
        let byte_level = ByteLevel::new(false, true).unwrap();
        let mut pretokenized = PreTokenizedString::from("Hello my friend");
        byte_level.pre_tokenize(&mut pretokenized).unwrap();
        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        let pieces: Vec<(&str, (usize, usize))> =
            splits.into_iter().map(|(s, o, _)| (s, o)).collect();
        assert_eq!(
            pieces,
            vec![
                ("Hello", (0, 5)),
                ("\u{0120}my", (5, 8)),
                ("\u{0120}friend", (8, 15))
            ]
        );
    }

    #[test]
    fn test_pre_tokenize_prefix_space() {
        let byte_level = ByteLevel::new(true, true).unwrap();
        let mut pretokenized = PreTokenizedString::from("Hi");
        byte_level.pre_tokenize(&mut pretokenized).unwrap();
        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        assert_eq!(splits[0].0, "\u{0120}Hi");
        assert_eq!(splits[0].1, (0, 2));
    }

    #[test]
    fn test_custom_pattern() {
        let byte_level = ByteLevel::with_pattern(false, CL100K_BASE_PATTERN).unwrap();
        assert_eq!(byte_level.pattern(), Some(CL100K_BASE_PATTERN));
        let mut pretokenized = PreTokenizedString::from("I'm 12345");
        byte_level.pre_tokenize(&mut pretokenized).unwrap();
        let splits = pretokenized.get_splits(OffsetReferential::Original, OffsetType::Byte);
        let pieces: Vec<(&str, (usize, usize))> =
            splits.into_iter().map(|(s, o, _)| (s, o)).collect();
        assert_eq!(
            pieces,
            vec![
                ("I", (0, 1)),
                ("'m", (1, 3)),
                ("\u{0120}", (3, 4)),
                ("123", (4, 7)),
                ("45", (7, 9))
            ]
        );
        assert!(ByteLevel::with_pattern(false, O200K_BASE_PATTERN).is_ok());
    }

    #[test]
    fn test_multibyte_chars_keep_alignment() {
        let byte_level = ByteLevel::new(false, false).unwrap();
        let mut pretokenized = PreTokenizedString::from("é");
        byte_level.pre_tokenize(&mut pretokenized).unwrap();
        let normalized = &pretokenized.splits()[0].normalized;
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized.alignments(), &[(0, 1), (0, 1)]);
    }

    #[test]
    fn test_decode() {
        let byte_level = ByteLevel::new(false, true).unwrap();
        let tokens = vec!["Hello".to_string(), "\u{0120}w".to_string(), "orld".to_string()];
        assert_eq!(byte_level.decode(tokens).unwrap(), "Hello world");
    }
}
