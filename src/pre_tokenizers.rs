//! Pre-tokenizers cut a [`PreTokenizedString`] into word-like fragments.
//!
//! Every fragment is a slice of the input it came from, so splitting never
//! loses track of where a fragment sits in the original text.

use std::sync::LazyLock;

use crate::core::normalized::SplitDelimiterBehavior;
use crate::core::pattern::{Invert, SysRegex};
use crate::core::pretokenized::PreTokenizedString;
use crate::core::tokenizer::Result;
use crate::decoders::Decoder;

pub use crate::core::byte_level::ByteLevel;

static WORDS_AND_SYMBOLS: LazyLock<SysRegex> =
    LazyLock::new(|| SysRegex::new(r"\w+|[^\w\s]+").expect("word pattern compiles"));

pub trait PreTokenizer {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()>;
}

/// Runs of word chars and runs of other non-space chars; whitespace is dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Whitespace;

impl PreTokenizer for Whitespace {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        let re: &SysRegex = &WORDS_AND_SYMBOLS;
        pretokenized.split(|_, normalized| {
            normalized.split(Invert(re), SplitDelimiterBehavior::Removed)
        })
    }
}

/// Split on whitespace only.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceSplit;

impl PreTokenizer for WhitespaceSplit {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, normalized| {
            normalized.split(char::is_whitespace, SplitDelimiterBehavior::Removed)
        })
    }
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation()
        || matches!(c as u32,
            0x00A1..=0x00BF
            | 0x2010..=0x2027
            | 0x2030..=0x205E
            | 0x2E00..=0x2E7F
            | 0x3001..=0x303F
            | 0xFF01..=0xFF0F
        )
}

/// Split on every punctuation char.
#[derive(Debug, Clone, Copy)]
pub struct Punctuation {
    pub behavior: SplitDelimiterBehavior,
}

impl Default for Punctuation {
    fn default() -> Self {
        Self {
            behavior: SplitDelimiterBehavior::Isolated,
        }
    }
}

impl Punctuation {
    pub fn new(behavior: SplitDelimiterBehavior) -> Self {
        Self { behavior }
    }
}

impl PreTokenizer for Punctuation {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, normalized| normalized.split(is_punctuation, self.behavior))
    }
}

/// Split on one delimiter char, dropping it.
#[derive(Debug, Clone, Copy)]
pub struct CharDelimiterSplit {
    pub delimiter: char,
}

impl CharDelimiterSplit {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }
}

impl PreTokenizer for CharDelimiterSplit {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, normalized| {
            normalized.split(self.delimiter, SplitDelimiterBehavior::Removed)
        })
    }
}

#[derive(Debug, Clone)]
pub enum SplitPattern {
    String(String),
    Regex(SysRegex),
}

/// Split on a literal or regex with a configurable delimiter behavior.
///
/// With `invert` the matches become the content and the text between them
/// is treated as the delimiter.
#[derive(Debug, Clone)]
pub struct Split {
    pattern: SplitPattern,
    pub behavior: SplitDelimiterBehavior,
    pub invert: bool,
}

impl Split {
    /// Split on every occurrence of a literal.
    ///
    /// # Arguments
    /// * `pattern` - Delimiter text
    /// * `behavior` - What happens to each delimiter
    /// * `invert` - Treat the matches as the pieces to keep instead
    pub fn literal(pattern: impl Into<String>, behavior: SplitDelimiterBehavior, invert: bool) -> Self {
        Self {
            pattern: SplitPattern::String(pattern.into()),
            behavior,
            invert,
        }
    }

    /// Split on every match of a regex.
    ///
    /// # Errors
    ///
    /// Returns an error if `pattern` does not compile.
    pub fn regex(pattern: &str, behavior: SplitDelimiterBehavior, invert: bool) -> Result<Self> {
        Ok(Self {
            pattern: SplitPattern::Regex(SysRegex::new(pattern)?),
            behavior,
            invert,
        })
    }
}

impl PreTokenizer for Split {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, normalized| match (&self.pattern, self.invert) {
            (SplitPattern::String(s), false) => normalized.split(s, self.behavior),
            (SplitPattern::String(s), true) => normalized.split(Invert(s), self.behavior),
            (SplitPattern::Regex(re), false) => normalized.split(re, self.behavior),
            (SplitPattern::Regex(re), true) => normalized.split(Invert(re), self.behavior),
        })
    }
}

/// When [`Metaspace`] adds a leading replacement char.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrependScheme {
    #[default]
    Always,
    /// Only on the fragment that starts the input.
    First,
    Never,
}

/// SentencePiece style: spaces become a visible marker char.
#[derive(Debug, Clone)]
pub struct Metaspace {
    replacement: char,
    str_rep: String,
    pub prepend_scheme: PrependScheme,
    /// Cut before every marker, keeping it at the front of the next fragment.
    pub split: bool,
}

impl Default for Metaspace {
    fn default() -> Self {
        Self::new('▁', PrependScheme::Always, true)
    }
}

impl Metaspace {
    pub fn new(replacement: char, prepend_scheme: PrependScheme, split: bool) -> Self {
        Self {
            replacement,
            str_rep: replacement.to_string(),
            prepend_scheme,
            split,
        }
    }

    pub fn replacement(&self) -> char {
        self.replacement
    }
}

impl PreTokenizer for Metaspace {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        pretokenized.split(|_, mut normalized| {
            normalized.replace(' ', &self.str_rep)?;
            let prepend = !normalized.get().starts_with(self.replacement)
                && match self.prepend_scheme {
                    PrependScheme::Always => true,
                    PrependScheme::First => normalized.offsets_original().0 == 0,
                    PrependScheme::Never => false,
                };
            if prepend {
                normalized.prepend(&self.str_rep);
            }
            if self.split {
                normalized.split(self.replacement, SplitDelimiterBehavior::MergedWithNext)
            } else {
                Ok(vec![normalized])
            }
        })
    }
}

impl Decoder for Metaspace {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let token = token.replace(self.replacement, " ");
                match token.strip_prefix(' ') {
                    Some(rest) if i == 0 && self.prepend_scheme != PrependScheme::Never => {
                        rest.to_owned()
                    }
                    _ => token,
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub enum PreTokenizerWrapper {
    ByteLevel(ByteLevel),
    CharDelimiterSplit(CharDelimiterSplit),
    Metaspace(Metaspace),
    Punctuation(Punctuation),
    Sequence(Vec<PreTokenizerWrapper>),
    Split(Split),
    Whitespace(Whitespace),
    WhitespaceSplit(WhitespaceSplit),
}

impl PreTokenizer for PreTokenizerWrapper {
    fn pre_tokenize(&self, pretokenized: &mut PreTokenizedString) -> Result<()> {
        match self {
            Self::ByteLevel(p) => p.pre_tokenize(pretokenized),
            Self::CharDelimiterSplit(p) => p.pre_tokenize(pretokenized),
            Self::Metaspace(p) => p.pre_tokenize(pretokenized),
            Self::Punctuation(p) => p.pre_tokenize(pretokenized),
            Self::Sequence(pre_tokenizers) => {
                for p in pre_tokenizers {
                    p.pre_tokenize(pretokenized)?;
                }
                Ok(())
            }
            Self::Split(p) => p.pre_tokenize(pretokenized),
            Self::Whitespace(p) => p.pre_tokenize(pretokenized),
            Self::WhitespaceSplit(p) => p.pre_tokenize(pretokenized),
        }
    }
}

macro_rules! impl_from_pre_tokenizer {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for PreTokenizerWrapper {
                fn from(p: $variant) -> Self {
                    Self::$variant(p)
                }
            }
        )*
    };
}

impl_from_pre_tokenizer!(
    ByteLevel,
    CharDelimiterSplit,
    Metaspace,
    Punctuation,
    Split,
    Whitespace,
    WhitespaceSplit
);

impl From<Vec<PreTokenizerWrapper>> for PreTokenizerWrapper {
    fn from(pre_tokenizers: Vec<PreTokenizerWrapper>) -> Self {
        Self::Sequence(pre_tokenizers)
    }
}
