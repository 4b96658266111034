//! Integration tests for the BPE model.
//!
//! These tests load models from vocabulary files on disk and check that
//! dropout only ever changes how a fragment is split, never what it covers.

use std::io::Write;

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::NamedTempFile;
use tokalign::core::VocabError;
use tokalign::models::bpe::Bpe;
use tokalign::pre_tokenizers::Whitespace;
use tokalign::{Model, Tokenizer, TokenizerError};

const VOCAB_JSON: &str = r#"{
    "u": 0, "n": 1, "r": 2, "e": 3, "l": 4, "a": 5, "t": 6, "d": 7,
    "re": 8, "at": 9, "ed": 10, "un": 11, "ated": 12, "rel": 13,
    "related": 14, "unrelated": 15
}"#;

const MERGES_TXT: &str = "#version: 0.2
r e
a t
e d
u n
at ed
re l
rel ated
un related
";

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn load_unrelated_bpe(dropout: Option<f32>) -> Bpe {
    let vocab = write_temp(VOCAB_JSON);
    let merges = write_temp(MERGES_TXT);
    let mut builder = Bpe::from_file(vocab.path(), merges.path());
    if let Some(p) = dropout {
        builder = builder.dropout(p);
    }
    builder.build().unwrap()
}

fn values(tokens: &[tokalign::Token]) -> Vec<&str> {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

/// Test loading vocab.json and merges.txt from disk.
#[test]
fn test_load_from_files() {
    let bpe = load_unrelated_bpe(None);
    assert_eq!(bpe.get_vocab_size(), 16);
    assert_eq!(bpe.get_merges_len(), 8);
    assert_eq!(bpe.token_to_id("rel"), Some(13));
    assert_eq!(bpe.id_to_token(12), Some("ated".to_string()));

    assert_eq!(values(&bpe.tokenize("unrelated").unwrap()), vec!["unrelated"]);
    assert_eq!(values(&bpe.tokenize("related").unwrap()), vec!["related"]);
    assert_eq!(values(&bpe.tokenize("dune").unwrap()), vec!["d", "un", "e"]);
}

/// Test that a missing file surfaces as a vocabulary error.
#[test]
fn test_missing_file() {
    let merges = write_temp(MERGES_TXT);
    let result = Bpe::from_file("/nonexistent/vocab.json", merges.path()).build();
    assert!(matches!(
        result,
        Err(TokenizerError::VocabError(VocabError::Io(_)))
    ));
}

/// Test that a malformed merges file reports the offending line.
#[test]
fn test_bad_merges_file() {
    let vocab = write_temp(VOCAB_JSON);
    let merges = write_temp("#version: 0.2\nr e\nthis has three\n");
    let err = Bpe::from_file(vocab.path(), merges.path())
        .build()
        .unwrap_err();
    assert!(matches!(
        err,
        TokenizerError::VocabError(VocabError::BadMergeLine { line: 3, .. })
    ));
}

/// Test that full dropout leaves one token per char.
#[test]
fn test_full_dropout() {
    let bpe = load_unrelated_bpe(Some(1.0));
    let tokens = bpe.tokenize("unrelated").unwrap();
    assert_eq!(tokens.len(), 9);
    for (i, token) in tokens.iter().enumerate() {
        assert_eq!(token.offsets, (i, i + 1));
    }
}

/// Test a BPE tokenizer reporting offsets of several words.
#[test]
fn test_tokenizer_offsets() {
    let tokenizer = Tokenizer::new(load_unrelated_bpe(None)).with_pre_tokenizer(Whitespace);
    let encoding = tokenizer.encode("unrelated  related dune").unwrap();
    assert_eq!(
        encoding.get_tokens(),
        &["unrelated", "related", "d", "un", "e"]
    );
    assert_eq!(
        encoding.get_offsets(),
        &[(0, 9), (11, 18), (19, 20), (20, 22), (22, 23)]
    );
    assert_eq!(
        encoding.get_word_ids(),
        &[Some(0), Some(1), Some(2), Some(2), Some(2)]
    );
}

proptest! {
    /// Test that seeded dropout is reproducible and always covers the input.
    #[test]
    fn prop_seeded_dropout(text in "[unrelatd]{1,16}", seed in any::<u64>(), p in 0.0f32..=1.0) {
        let bpe = load_unrelated_bpe(Some(p));
        let a = bpe.tokenize_with_rng(&text, &mut StdRng::seed_from_u64(seed)).unwrap();
        let b = bpe.tokenize_with_rng(&text, &mut StdRng::seed_from_u64(seed)).unwrap();
        prop_assert_eq!(&a, &b);

        let joined: String = a.iter().map(|t| t.value.as_str()).collect();
        prop_assert_eq!(joined, text.clone());
        let mut end = 0;
        for token in &a {
            prop_assert_eq!(token.offsets.0, end);
            end = token.offsets.1;
        }
        prop_assert_eq!(end, text.len());
    }
}
