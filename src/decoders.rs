//! Decoders turn model tokens back into text.
//!
//! A decoder rewrites the whole token list at once, since some of them
//! (byte-level, byte fallback) only produce text once several tokens are
//! combined. Invalid UTF-8 is replaced with U+FFFD rather than rejected.

use crate::core::tokenizer::Result;

pub use crate::core::byte_level::ByteLevel;
pub use crate::pre_tokenizers::Metaspace;

/// Turns a list of tokens back into text.
pub trait Decoder {
    /// Rewrite `tokens` into text pieces that concatenate to the output.
    ///
    /// The result need not have one piece per token; byte decoders merge
    /// runs of tokens into a single piece.
    ///
    /// # Arguments
    /// * `tokens` - Token strings, in order
    ///
    /// # Errors
    ///
    /// Returns an error if the decoder cannot process the tokens.
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>>;

    /// Decode `tokens` into one string.
    ///
    /// # Errors
    ///
    /// Returns an error if [`decode_chain`](Self::decode_chain) fails.
    fn decode(&self, tokens: Vec<String>) -> Result<String> {
        Ok(self.decode_chain(tokens)?.join(""))
    }
}

/// Glue WordPiece continuation pieces back onto the word before them.
#[derive(Debug, Clone)]
pub struct WordPiece {
    /// Marker of continuation pieces, `##` by default.
    pub prefix: String,
    /// Undo the spaces tokenization put before punctuation and contractions.
    pub cleanup: bool,
}

impl Default for WordPiece {
    fn default() -> Self {
        Self {
            prefix: "##".to_string(),
            cleanup: true,
        }
    }
}

fn cleanup(text: &str) -> String {
    text.replace(" .", ".")
        .replace(" ?", "?")
        .replace(" !", "!")
        .replace(" ,", ",")
        .replace(" ' ", "'")
        .replace(" n't", "n't")
        .replace(" 'm", "'m")
        .replace(" do not", " don't")
        .replace(" 's", "'s")
        .replace(" 've", "'ve")
        .replace(" 're", "'re")
}

impl Decoder for WordPiece {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let token = if i == 0 {
                    token
                } else {
                    match token.strip_prefix(self.prefix.as_str()) {
                        Some(rest) => rest.to_owned(),
                        None => format!(" {token}"),
                    }
                };
                if self.cleanup {
                    cleanup(&token)
                } else {
                    token
                }
            })
            .collect())
    }
}

/// Replace the end-of-word suffix with a space, dropping it on the last token.
#[derive(Debug, Clone)]
pub struct BPEDecoder {
    /// End-of-word marker, `</w>` by default.
    pub suffix: String,
}

impl Default for BPEDecoder {
    fn default() -> Self {
        Self {
            suffix: "</w>".to_string(),
        }
    }
}

impl Decoder for BPEDecoder {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        let last = tokens.len().saturating_sub(1);
        Ok(tokens
            .into_iter()
            .enumerate()
            .map(|(i, token)| {
                let replacement = if i == last { "" } else { " " };
                token.replace(&self.suffix, replacement)
            })
            .collect())
    }
}

fn parse_byte_token(token: &str) -> Option<u8> {
    let hex = token.strip_prefix("<0x")?.strip_suffix('>')?;
    if hex.len() != 2 {
        return None;
    }
    u8::from_str_radix(hex, 16).ok()
}

/// Reassemble runs of `<0xNN>` byte tokens into text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteFallback;

impl Decoder for ByteFallback {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        let mut decoded = Vec::with_capacity(tokens.len());
        let mut pending: Vec<u8> = Vec::new();

        let flush = |pending: &mut Vec<u8>, decoded: &mut Vec<String>| {
            if pending.is_empty() {
                return;
            }
            match std::str::from_utf8(pending) {
                Ok(s) => decoded.push(s.to_owned()),
                Err(_) => decoded.extend(pending.iter().map(|_| "\u{FFFD}".to_string())),
            }
            pending.clear();
        };

        for token in tokens {
            match parse_byte_token(&token) {
                Some(b) => pending.push(b),
                None => {
                    flush(&mut pending, &mut decoded);
                    decoded.push(token);
                }
            }
        }
        flush(&mut pending, &mut decoded);
        Ok(decoded)
    }
}

/// Any of the decoders, for use where one type is needed.
#[derive(Debug, Clone)]
pub enum DecoderWrapper {
    BPE(BPEDecoder),
    ByteFallback(ByteFallback),
    ByteLevel(ByteLevel),
    Metaspace(Metaspace),
    WordPiece(WordPiece),
    /// Feed the output of each decoder into the next.
    Sequence(Vec<DecoderWrapper>),
}

impl Decoder for DecoderWrapper {
    fn decode_chain(&self, tokens: Vec<String>) -> Result<Vec<String>> {
        match self {
            Self::BPE(d) => d.decode_chain(tokens),
            Self::ByteFallback(d) => d.decode_chain(tokens),
            Self::ByteLevel(d) => d.decode_chain(tokens),
            Self::Metaspace(d) => d.decode_chain(tokens),
            Self::WordPiece(d) => d.decode_chain(tokens),
            Self::Sequence(decoders) => decoders
                .iter()
                .try_fold(tokens, |tokens, d| d.decode_chain(tokens)),
        }
    }
}

impl From<BPEDecoder> for DecoderWrapper {
    fn from(d: BPEDecoder) -> Self {
        Self::BPE(d)
    }
}

impl From<ByteFallback> for DecoderWrapper {
    fn from(d: ByteFallback) -> Self {
        Self::ByteFallback(d)
    }
}

impl From<ByteLevel> for DecoderWrapper {
    fn from(d: ByteLevel) -> Self {
        Self::ByteLevel(d)
    }
}

impl From<Metaspace> for DecoderWrapper {
    fn from(d: Metaspace) -> Self {
        Self::Metaspace(d)
    }
}

impl From<WordPiece> for DecoderWrapper {
    fn from(d: WordPiece) -> Self {
        Self::WordPiece(d)
    }
}

impl From<Vec<DecoderWrapper>> for DecoderWrapper {
    fn from(decoders: Vec<DecoderWrapper>) -> Self {
        Self::Sequence(decoders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_wordpiece() {
        let decoder = WordPiece::default();
        let decoded = decoder
            .decode(tokens(&["I", "do", "n't", "lik", "##e", "it", "."]))
            .unwrap();
        assert_eq!(decoded, "I don't like it.");
    }

    #[test]
    fn test_bpe_suffix() {
        let decoder = BPEDecoder::default();
        let decoded = decoder
            .decode(tokens(&["hel", "lo</w>", "wor", "ld</w>"]))
            .unwrap();
        assert_eq!(decoded, "hello world");
    }

    #[test]
    fn test_byte_fallback() {
        let decoder = ByteFallback;
        assert_eq!(
            decoder
                .decode_chain(tokens(&["a", "<0xC3>", "<0xA9>", "b"]))
                .unwrap(),
            tokens(&["a", "é", "b"])
        );
        assert_eq!(
            decoder.decode_chain(tokens(&["<0xC3>", "x"])).unwrap(),
            tokens(&["\u{FFFD}", "x"])
        );
        assert_eq!(parse_byte_token("<0x4>"), None);
        assert_eq!(parse_byte_token("<0xzz>"), None);
    }

    #[test]
    fn test_sequence() {
        let decoder = DecoderWrapper::Sequence(vec![
            ByteFallback.into(),
            Metaspace::default().into(),
        ]);
        let decoded = decoder
            .decode(tokens(&["▁caf", "<0xC3>", "<0xA9>", "▁ok"]))
            .unwrap();
        assert_eq!(decoded, "café ok");
    }
}
