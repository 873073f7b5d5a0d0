//! Integration tests for the byte-level BPE engine.
//!
//! The base vocabulary maps every byte-alphabet character to its byte
//! value, with merged pieces appended from id 256, mirroring how GPT-2
//! vocabularies are laid out.

use blazetok::{byte_encode, BpeTokenizer, BpeVocab, MergeTable};
use rustc_hash::FxHashMap;

fn vocab_json(extra: &[&str]) -> String {
    let mut entries: Vec<String> = (0u32..=255)
        .map(|b| {
            let token = byte_encode(&[b as u8]);
            format!("{}: {}", serde_json::to_string(&token).unwrap(), b)
        })
        .collect();
    for (offset, token) in extra.iter().enumerate() {
        entries.push(format!(
            "{}: {}",
            serde_json::to_string(token).unwrap(),
            256 + offset as u32
        ));
    }
    format!("{{{}}}", entries.join(", "))
}

fn tokenizer_with(extra: &[&str], merges: &str) -> BpeTokenizer {
    let vocab = BpeVocab::from_json(&vocab_json(extra)).unwrap();
    let merges = MergeTable::from_text(merges).unwrap();
    BpeTokenizer::new(vocab, merges, FxHashMap::default()).unwrap()
}

/// Each space-prefixed word pre-tokenizes to one regex match, merges
/// apply, and decode returns the exact input.
#[test]
fn test_quick_brown_fox_roundtrip() {
    let tokenizer = tokenizer_with(
        &["Ġq", "Ġqu", "Ġb", "Ġbr", "own", "ox"],
        "Ġ q\nĠq u\nĠ b\nĠb r\no wn\no x\n",
    );
    let text = "The quick brown fox";
    let ids = tokenizer.encode(text);
    assert!(ids.len() < text.len(), "merges should shorten the sequence");
    assert_eq!(tokenizer.decode(&ids).unwrap(), text);
}

/// Encode/decode is the identity over arbitrary well-formed UTF-8.
#[test]
fn test_roundtrip_over_unicode_inputs() {
    let tokenizer = tokenizer_with(&[], "");
    let cases = [
        "Hello, world!",
        "Multi-line\ntext\nwith\nnewlines",
        "Unicode: こんにちは 世界 🦀",
        "café ñandú Ǘber",
        "  leading and trailing  ",
        "числа 1234 и знаки !@#",
    ];
    for text in cases {
        let ids = tokenizer.encode(text);
        assert_eq!(
            tokenizer.decode(&ids).unwrap(),
            text,
            "roundtrip failed for {text:?}"
        );
    }
}

/// Merge priority follows the rank table, not appearance order.
#[test]
fn test_rank_priority() {
    // "er" outranks "he"; in "her" the er pair wins the first round.
    let tokenizer = tokenizer_with(&["er", "he"], "e r\nh e\n");
    let ids = tokenizer.encode("her");
    assert_eq!(ids, vec![b'h' as u32, 256]);
}

/// Contractions match the leading regex alternatives.
#[test]
fn test_contraction_pretokenization() {
    let tokenizer = tokenizer_with(&["'ll", "'ve"], "' ll\n' ve\n");
    let ids = tokenizer.encode("we'll we've");
    assert!(ids.contains(&256));
    assert!(ids.contains(&257));
}

/// Special tokens splice through encode_with_special only.
#[test]
fn test_special_token_handling() {
    let vocab = BpeVocab::from_json(&vocab_json(&[])).unwrap();
    let merges = MergeTable::from_text("").unwrap();
    let mut specials = FxHashMap::default();
    specials.insert("<|endoftext|>".to_string(), 50256);
    let tokenizer = BpeTokenizer::new(vocab, merges, specials).unwrap();

    let spliced = tokenizer.encode_with_special("a<|endoftext|>b");
    assert_eq!(spliced, vec![b'a' as u32, 50256, b'b' as u32]);
    assert_eq!(tokenizer.decode(&spliced).unwrap(), "a<|endoftext|>b");

    let plain = tokenizer.encode("a<|endoftext|>b");
    assert!(!plain.contains(&50256));
}

/// The piece cache makes repeated encodes agree and is observable.
#[test]
fn test_cache_consistency() {
    let tokenizer = tokenizer_with(&["he", "hel"], "h e\nhe l\n");
    let text = "hello hello hello hello";
    let first = tokenizer.encode(text);
    let second = tokenizer.encode(text);
    assert_eq!(first, second);
    assert!(tokenizer.cache_len() > 0);
}

/// Batch encode agrees with single encode in both modes.
#[test]
fn test_batch_matches_single() {
    let tokenizer = tokenizer_with(&["he"], "h e\n");
    let texts = ["hello", "help", "the he"];
    let sequential = tokenizer.encode_batch(&texts, false);
    let parallel = tokenizer.encode_batch(&texts, true);
    assert_eq!(sequential, parallel);
    for (text, ids) in texts.iter().zip(&sequential) {
        assert_eq!(ids, &tokenizer.encode(text));
    }
}

/// Engines are freely shareable across threads.
#[test]
fn test_concurrent_encode() {
    let tokenizer = std::sync::Arc::new(tokenizer_with(&["he"], "h e\n"));
    let expected = tokenizer.encode("hello world");
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let tokenizer = tokenizer.clone();
            let expected = expected.clone();
            std::thread::spawn(move || {
                for _ in 0..50 {
                    assert_eq!(tokenizer.encode("hello world"), expected);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}
