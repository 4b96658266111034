//! Normalizers rewrite a [`NormalizedString`] in place, keeping its
//! alignments with the original text.

use crate::core::normalized::NormalizedString;
use crate::core::pattern::SysRegex;
use crate::core::tokenizer::Result;

/// Rewrites a [`NormalizedString`] in place.
pub trait Normalizer {
    /// Normalize `normalized`, keeping its alignments in sync.
    ///
    /// # Errors
    ///
    /// Returns an error if a pattern fails while matching.
    fn normalize(&self, normalized: &mut NormalizedString) -> Result<()>;
}

/// What a [`Replace`] normalizer looks for.
#[derive(Debug, Clone)]
pub enum ReplacePattern {
    String(String),
    Regex(SysRegex),
}

/// Replace every match of a literal or regex with fixed content.
#[derive(Debug, Clone)]
pub struct Replace {
    pattern: ReplacePattern,
    content: String,
}

impl Replace {
    /// Replace every occurrence of the literal `pattern`.
    ///
    /// # Arguments
    /// * `pattern` - Text to look for
    /// * `content` - Replacement, possibly empty to delete the matches
    pub fn literal(pattern: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            pattern: ReplacePattern::String(pattern.into()),
            content: content.into(),
        }
    }

    /// Replace every match of the regex `pattern`.
    ///
    /// # Arguments
    /// * `pattern` - Regex in `fancy-regex` syntax
    /// * `content` - Replacement, inserted as is
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` does not compile.
    pub fn regex(pattern: &str, content: impl Into<String>) -> Result<Self> {
        Ok(Self {
            pattern: ReplacePattern::Regex(SysRegex::new(pattern)?),
            content: content.into(),
        })
    }
}

impl Normalizer for Replace {
    fn normalize(&self, normalized: &mut NormalizedString) -> Result<()> {
        match &self.pattern {
            ReplacePattern::String(s) => normalized.replace(s, &self.content)?,
            ReplacePattern::Regex(re) => normalized.replace(re, &self.content)?,
        };
        Ok(())
    }
}

/// Any of the normalizers, for use where one type is needed.
#[derive(Debug, Clone)]
pub enum NormalizerWrapper {
    NFC,
    NFD,
    NFKC,
    NFKD,
    Lowercase,
    Uppercase,
    /// Remove whitespace on the chosen sides.
    Strip { left: bool, right: bool },
    /// Decompose and drop combining marks.
    StripAccents,
    Replace(Replace),
    /// Prefix non-empty input with the given text.
    Prepend(String),
    /// Apply each normalizer in turn.
    Sequence(Vec<NormalizerWrapper>),
}

impl Normalizer for NormalizerWrapper {
    fn normalize(&self, normalized: &mut NormalizedString) -> Result<()> {
        match self {
            Self::NFC => {
                normalized.nfc();
            }
            Self::NFD => {
                normalized.nfd();
            }
            Self::NFKC => {
                normalized.nfkc();
            }
            Self::NFKD => {
                normalized.nfkd();
            }
            Self::Lowercase => {
                normalized.lowercase();
            }
            Self::Uppercase => {
                normalized.uppercase();
            }
            Self::Strip { left, right } => match (*left, *right) {
                (true, true) => {
                    normalized.strip();
                }
                (true, false) => {
                    normalized.lstrip();
                }
                (false, true) => {
                    normalized.rstrip();
                }
                (false, false) => {}
            },
            Self::StripAccents => {
                normalized.strip_accents();
            }
            Self::Replace(replace) => replace.normalize(normalized)?,
            Self::Prepend(prefix) => {
                if !normalized.is_empty() {
                    normalized.prepend(prefix);
                }
            }
            Self::Sequence(normalizers) => {
                for normalizer in normalizers {
                    normalizer.normalize(normalized)?;
                }
            }
        }
        Ok(())
    }
}

impl From<Replace> for NormalizerWrapper {
    fn from(replace: Replace) -> Self {
        Self::Replace(replace)
    }
}

impl From<Vec<NormalizerWrapper>> for NormalizerWrapper {
    fn from(normalizers: Vec<NormalizerWrapper>) -> Self {
        Self::Sequence(normalizers)
    }
}
