//! Vocabulary and merge table loaders.
//!
//! Supported formats:
//!
//! - `vocab.json`: a JSON object mapping each token to its id
//! - `merges.txt`: an optional `#version` header, then one `left right` pair
//!   per line, highest priority first
//! - `vocab.txt`: one token per line, the id being the line index
//! - Unigram model JSON: `{"unk_id": 0, "vocab": [["<unk>", 0.0], ...]}`
//!
//! Every loader comes as a `load_*` function over in-memory data and a
//! `load_*_file` wrapper reading from a path. Parse errors carry the 1-based
//! line number they were found on.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::Deserialize;
use thiserror::Error;

/// Token string to id.
pub type Vocab = FxHashMap<String, u32>;
/// Id to token string.
pub type VocabR = FxHashMap<u32, String>;
/// Merge pairs in priority order.
pub type Merges = Vec<(String, String)>;

/// Errors that can occur when loading vocabulary files.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid merge on line {line}: {content:?}")]
    BadMergeLine { line: usize, content: String },
    #[error("Invalid vocabulary entry on line {line}: {content:?}")]
    BadVocabLine { line: usize, content: String },
}

/// Contents of a Unigram model file.
#[derive(Debug, Clone, Deserialize)]
pub struct UnigramVocab {
    /// `(piece, score)` pairs, ids being positions.
    pub vocab: Vec<(String, f64)>,
    #[serde(default)]
    pub unk_id: Option<usize>,
    #[serde(default)]
    pub byte_fallback: bool,
}

/// Parse a `vocab.json` token to id map.
///
/// # Errors
///
/// Returns an error if `data` is not a JSON object of token to id.
pub fn load_vocab_json(data: &[u8]) -> Result<Vocab, VocabError> {
    Ok(serde_json::from_slice(data)?)
}

/// Read and parse a `vocab.json` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON object of
/// token to id.
pub fn load_vocab_json_file(path: impl AsRef<Path>) -> Result<Vocab, VocabError> {
    let data = std::fs::read(path)?;
    load_vocab_json(&data)
}

/// Parse a `merges.txt` merge list.
///
/// A `#version` header on the first line and blank lines are skipped.
///
/// # Errors
///
/// Returns [`VocabError::BadMergeLine`] for a line that is not exactly two
/// whitespace-separated tokens.
pub fn load_merges(data: &str) -> Result<Merges, VocabError> {
    let mut merges = Vec::new();
    for (i, line) in data.lines().enumerate() {
        if (i == 0 && line.starts_with("#version")) || line.trim().is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(left), Some(right), None) => merges.push((left.to_owned(), right.to_owned())),
            _ => {
                return Err(VocabError::BadMergeLine {
                    line: i + 1,
                    content: line.to_owned(),
                })
            }
        }
    }
    Ok(merges)
}

/// Read and parse a `merges.txt` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds a malformed merge.
pub fn load_merges_file(path: impl AsRef<Path>) -> Result<Merges, VocabError> {
    let data = std::fs::read_to_string(path)?;
    load_merges(&data)
}

/// Parse a line-delimited vocabulary, ids assigned by line.
///
/// # Errors
///
/// Returns [`VocabError::BadVocabLine`] for an empty or repeated token.
pub fn load_vocab_txt(data: &str) -> Result<Vocab, VocabError> {
    let mut vocab = Vocab::default();
    for (i, line) in data.lines().enumerate() {
        let token = line.trim_end();
        if token.is_empty() || vocab.contains_key(token) {
            return Err(VocabError::BadVocabLine {
                line: i + 1,
                content: line.to_owned(),
            });
        }
        vocab.insert(token.to_owned(), i as u32);
    }
    Ok(vocab)
}

/// Read and parse a `vocab.txt` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds an empty or
/// repeated token.
pub fn load_vocab_txt_file(path: impl AsRef<Path>) -> Result<Vocab, VocabError> {
    let data = std::fs::read_to_string(path)?;
    load_vocab_txt(&data)
}

/// Parse a Unigram model JSON file.
///
/// # Errors
///
/// Returns an error if `data` does not match [`UnigramVocab`].
pub fn load_unigram_json(data: &[u8]) -> Result<UnigramVocab, VocabError> {
    Ok(serde_json::from_slice(data)?)
}

/// Read and parse a Unigram model JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not match
/// [`UnigramVocab`].
pub fn load_unigram_json_file(path: impl AsRef<Path>) -> Result<UnigramVocab, VocabError> {
    let data = std::fs::read(path)?;
    load_unigram_json(&data)
}

/// Build the id to token map from a token to id map.
///
/// If two tokens share an id, which one survives is unspecified.
pub fn build_decoder(vocab: &Vocab) -> VocabR {
    vocab.iter().map(|(k, v)| (*v, k.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_vocab_json() {
        let vocab = load_vocab_json(br#"{"a": 0, "b": 1, "ab": 2}"#).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.get("ab"), Some(&2));
    }

    #[test]
    fn test_load_merges_with_header() {
        let merges = load_merges("#version: 0.2\na b\n\nab c\n").unwrap();
        assert_eq!(
            merges,
            vec![
                ("a".to_string(), "b".to_string()),
                ("ab".to_string(), "c".to_string())
            ]
        );
    }

    #[test]
    fn test_load_merges_bad_line() {
        let err = load_merges("a b\nabc\n").unwrap_err();
        match err {
            VocabError::BadMergeLine { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            load_merges("a b c"),
            Err(VocabError::BadMergeLine { line: 1, .. })
        ));
    }

    #[test]
    fn test_load_vocab_txt() {
        let vocab = load_vocab_txt("[UNK]\nhello\n##lo\n").unwrap();
        assert_eq!(vocab.get("##lo"), Some(&2));
        assert!(matches!(
            load_vocab_txt("a\n\nb"),
            Err(VocabError::BadVocabLine { line: 2, .. })
        ));
        assert!(matches!(
            load_vocab_txt("a\na"),
            Err(VocabError::BadVocabLine { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_unigram_json() {
        let model = load_unigram_json(
            br#"{"type": "Unigram", "unk_id": 0, "vocab": [["<unk>", 0.0], ["a", -1.5]]}"#,
        )
        .unwrap();
        assert_eq!(model.unk_id, Some(0));
        assert_eq!(model.vocab[1], ("a".to_string(), -1.5));
        assert!(!model.byte_fallback);
    }

    #[test]
    fn test_build_decoder() {
        let vocab = load_vocab_json(br#"{"x": 4}"#).unwrap();
        assert_eq!(build_decoder(&vocab).get(&4).map(String::as_str), Some("x"));
    }

    #[test]
    fn test_files() {
        let dir = tempfile::tempdir().unwrap();
        let vocab_path = dir.path().join("vocab.json");
        let merges_path = dir.path().join("merges.txt");
        std::fs::File::create(&vocab_path)
            .unwrap()
            .write_all(br#"{"a": 0}"#)
            .unwrap();
        std::fs::File::create(&merges_path)
            .unwrap()
            .write_all(b"#version: 0.2\n")
            .unwrap();
        assert_eq!(load_vocab_json_file(&vocab_path).unwrap().len(), 1);
        assert!(load_merges_file(&merges_path).unwrap().is_empty());
        assert!(matches!(
            load_vocab_json_file(dir.path().join("missing.json")),
            Err(VocabError::Io(_))
        ));
    }
}
