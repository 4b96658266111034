//! Integration tests for parallel and concurrent encoding.
//!
//! These tests verify that one tokenizer shared across threads, with its
//! segmentation cache, gives the same encodings as a single-threaded run.

use std::sync::Once;

use tokalign::models::bpe::Bpe;
use tokalign::models::ModelWrapper;
use tokalign::pre_tokenizers::Whitespace;
use tokalign::{Encoding, Tokenizer};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

fn make_tokenizer(cache_capacity: usize) -> Tokenizer {
    let vocab = [
        "u", "n", "r", "e", "l", "a", "t", "d", "re", "at", "ed", "un", "ated", "rel", "related",
        "unrelated",
    ]
    .iter()
    .enumerate()
    .map(|(i, t)| (t.to_string(), i as u32))
    .collect();
    let merges = [
        ("r", "e"),
        ("a", "t"),
        ("e", "d"),
        ("u", "n"),
        ("at", "ed"),
        ("re", "l"),
        ("rel", "ated"),
        ("un", "related"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    let bpe = Bpe::builder()
        .vocab_and_merges(vocab, merges)
        .cache_capacity(cache_capacity)
        .build()
        .unwrap();
    Tokenizer::new(bpe).with_pre_tokenizer(Whitespace)
}

fn make_texts(n: usize) -> Vec<String> {
    let words = ["unrelated", "related", "dune", "tale", "lard", "rated", "eat", "tuna"];
    (0..n)
        .map(|i| {
            (0..(i % 5) + 1)
                .map(|j| words[(i * 3 + j * 7) % words.len()])
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn reference(texts: &[String]) -> Vec<Encoding> {
    let tokenizer = make_tokenizer(0);
    texts.iter().map(|t| tokenizer.encode(t).unwrap()).collect()
}

fn bpe_cache_len(tokenizer: &Tokenizer) -> usize {
    match tokenizer.model() {
        ModelWrapper::BPE(bpe) => bpe.cache_len(),
        _ => 0,
    }
}

/// Test that batch results line up with their inputs.
#[test]
fn test_encode_batch_order() {
    init_tracing();
    let texts = make_texts(200);
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let tokenizer = make_tokenizer(1_000);

    let batch = tokenizer.try_encode_batch(&refs).unwrap();
    assert_eq!(batch, reference(&texts));
    assert!(bpe_cache_len(&tokenizer) > 0);
}

/// Test that threads sharing one tokenizer agree with a single-threaded run.
#[test]
fn test_shared_tokenizer_across_threads() {
    init_tracing();
    let texts = make_texts(64);
    let expected = reference(&texts);
    let tokenizer = make_tokenizer(1_000);

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for (text, want) in texts.iter().zip(&expected) {
                    assert_eq!(&tokenizer.encode(text).unwrap(), want);
                }
            });
        }
    });
}

/// Test that a tiny cache under contention still yields correct results.
#[test]
fn test_small_cache_under_contention() {
    init_tracing();
    let texts = make_texts(128);
    let expected = reference(&texts);
    let tokenizer = make_tokenizer(2);

    std::thread::scope(|s| {
        for t in 0..4 {
            let (tokenizer, texts, expected) = (&tokenizer, &texts, &expected);
            s.spawn(move || {
                for i in (t..texts.len()).step_by(4) {
                    assert_eq!(tokenizer.encode(&texts[i]).unwrap(), expected[i]);
                }
            });
        }
    });
    assert!(bpe_cache_len(&tokenizer) <= 2);
}

/// Test that batch decoding keeps order and matches single decodes.
#[test]
fn test_decode_batch_order() {
    init_tracing();
    let texts = make_texts(50);
    let tokenizer = make_tokenizer(1_000);
    let encodings = tokenizer
        .try_encode_batch(&texts.iter().map(String::as_str).collect::<Vec<_>>())
        .unwrap();
    let ids: Vec<&[u32]> = encodings.iter().map(Encoding::get_ids).collect();

    let decoded = tokenizer.decode_batch(&ids, false).unwrap();
    assert_eq!(decoded.len(), texts.len());
    for (d, encoding) in decoded.iter().zip(&encodings) {
        assert_eq!(d, &tokenizer.decode(encoding.get_ids(), false).unwrap());
    }
}
