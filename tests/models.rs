//! Integration tests for the Unigram, WordPiece and WordLevel models.
//!
//! These tests load each model from its on-disk format and run it inside a
//! full tokenizer.

use std::io::Write;

use tempfile::NamedTempFile;
use tokalign::core::VocabError;
use tokalign::models::unigram::Unigram;
use tokalign::models::wordlevel::WordLevel;
use tokalign::models::wordpiece::WordPiece;
use tokalign::pre_tokenizers::{Metaspace, WhitespaceSplit};
use tokalign::{Model, Tokenizer, TokenizerError};

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Test the Viterbi search on the abcd example loaded from JSON.
#[test]
fn test_unigram_from_file() {
    let file = write_temp(
        r#"{
            "unk_id": 0,
            "vocab": [
                ["<unk>", 0.0], ["a", 0.0], ["b", 0.0], ["c", 0.0], ["d", 0.0],
                ["cd", 1.0], ["ab", 2.0], ["abc", 5.0], ["abcd", 10.0]
            ]
        }"#,
    );
    let model = Unigram::from_file(file.path()).unwrap();
    assert_eq!(model.unk_id(), Some(0));
    assert_eq!(model.get_vocab_size(), 9);
    assert_eq!(model.encode("abcd").unwrap(), vec!["abcd"]);
    assert_eq!(model.encode("abcdcd").unwrap(), vec!["abcd", "cd"]);
    assert_eq!(model.encode("bcd").unwrap(), vec!["b", "cd"]);
}

/// Test that a malformed Unigram file is rejected.
#[test]
fn test_unigram_bad_file() {
    let file = write_temp(r#"{"unk_id": 0, "vocab": [["a"]]}"#);
    assert!(matches!(
        Unigram::from_file(file.path()),
        Err(TokenizerError::VocabError(VocabError::Json(_)))
    ));
}

fn make_metaspace_unigram() -> Tokenizer {
    let vocab = [
        ("<unk>", 0.0),
        ("▁", -3.0),
        ("▁ab", -1.0),
        ("a", -3.0),
        ("b", -3.0),
        ("c", -3.0),
        ("d", -3.0),
        ("cd", -2.0),
    ]
    .iter()
    .map(|(p, s)| (p.to_string(), *s))
    .collect();
    let model = Unigram::from(vocab, Some(0), false).unwrap();
    Tokenizer::new(model)
        .with_pre_tokenizer(Metaspace::default())
        .with_decoder(Metaspace::default())
}

/// Test Unigram behind a metaspace pre-tokenizer.
#[test]
fn test_unigram_with_metaspace() {
    let tokenizer = make_metaspace_unigram();
    let encoding = tokenizer.encode("ab cd").unwrap();
    assert_eq!(encoding.get_tokens(), &["▁ab", "▁", "cd"]);
    assert_eq!(encoding.get_ids(), &[2, 1, 7]);
    assert_eq!(encoding.get_offsets(), &[(0, 2), (2, 3), (3, 5)]);
    assert_eq!(tokenizer.decode(encoding.get_ids(), false).unwrap(), "ab cd");
}

/// Test that an unknown char becomes the unknown id over its own span.
#[test]
fn test_unigram_unknown_span() {
    let tokenizer = make_metaspace_unigram();
    let encoding = tokenizer.encode("ab xd").unwrap();
    assert_eq!(encoding.get_ids(), &[2, 1, 0, 6]);
    assert_eq!(encoding.get_tokens()[2], "x");
    assert_eq!(encoding.get_offsets()[2], (3, 4));
}

/// Test loading a WordPiece vocab.txt.
#[test]
fn test_wordpiece_from_file() {
    let file = write_temp("[UNK]\n[CLS]\nun\n##aff\n##able\n");
    let model = WordPiece::from_file(file.path()).unwrap().build();
    assert_eq!(model.token_to_id("##able"), Some(4));

    let tokens = model.tokenize("unaffable").unwrap();
    let values: Vec<&str> = tokens.iter().map(|t| t.value.as_str()).collect();
    assert_eq!(values, vec!["un", "##aff", "##able"]);
    assert_eq!(tokens[2].offsets, (5, 9));
}

/// Test that a duplicate vocab.txt line is reported with its line number.
#[test]
fn test_wordpiece_duplicate_line() {
    let file = write_temp("[UNK]\nun\nun\n");
    assert!(matches!(
        WordPiece::from_file(file.path()),
        Err(TokenizerError::VocabError(VocabError::BadVocabLine { line: 3, .. }))
    ));
}

/// Test loading a WordLevel vocab.json into a tokenizer.
#[test]
fn test_wordlevel_from_file() {
    let file = write_temp(r#"{"<unk>": 0, "hello": 1, "world": 2}"#);
    let model = WordLevel::from_file(file.path(), "<unk>".to_string()).unwrap();
    let tokenizer = Tokenizer::new(model).with_pre_tokenizer(WhitespaceSplit);

    let encoding = tokenizer.encode("hello there world").unwrap();
    assert_eq!(encoding.get_ids(), &[1, 0, 2]);
    assert_eq!(encoding.get_tokens()[1], "<unk>");
    assert_eq!(encoding.get_offsets()[1], (6, 11));
}
