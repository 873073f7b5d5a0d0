//! Integration tests for the BERT (WordPiece) engine.
//!
//! Vocabularies are built inline with the standard BERT-base layout:
//! [PAD]=0, filler rows, [UNK]=100, [CLS]=101, [SEP]=102.

use blazetok::{BertOptions, BertTokenizer, Padding, SpecialIds, Vocab, WordpieceSegmenter};

fn bert_base_vocab(extra: &[&str]) -> String {
    let mut lines: Vec<String> = (0..100).map(|i| format!("[unused{i}]")).collect();
    lines[0] = "[PAD]".to_string();
    lines.push("[UNK]".to_string());
    lines.push("[CLS]".to_string());
    lines.push("[SEP]".to_string());
    lines.extend(extra.iter().map(|token| token.to_string()));
    lines.join("\n")
}

fn tokenizer_with(extra: &[&str]) -> BertTokenizer {
    BertTokenizer::from_vocab_text(&bert_base_vocab(extra), BertOptions::default())
}

fn id(tokenizer: &BertTokenizer, token: &str) -> u32 {
    let id = tokenizer.vocab().id_of(token, u32::MAX);
    assert_ne!(id, u32::MAX, "token {token} missing from test vocab");
    id
}

/// `"Hello, world!"` frames with [CLS]/[SEP] around hello , world !.
#[test]
fn test_hello_world() {
    let t = tokenizer_with(&["hello", "world", ",", "!"]);
    let ids = t.encode("Hello, world!");
    assert_eq!(ids[0], 101);
    assert_eq!(*ids.last().unwrap(), 102);
    assert_eq!(
        &ids[1..5],
        &[id(&t, "hello"), id(&t, ","), id(&t, "world"), id(&t, "!")]
    );
}

/// CJK isolation: every ideograph becomes its own sub-word.
#[test]
fn test_cjk_characters_isolated() {
    let t = tokenizer_with(&["hello", ",", "世", "界", "!"]);
    let ids = t.encode("Hello, 世界!");
    assert_eq!(
        ids,
        vec![
            101,
            id(&t, "hello"),
            id(&t, ","),
            id(&t, "世"),
            id(&t, "界"),
            id(&t, "!"),
            102
        ]
    );
}

/// Accent stripping feeds WordPiece the folded form.
#[test]
fn test_accents_stripped_before_wordpiece() {
    let t = tokenizer_with(&["ca", "##fe"]);
    assert_eq!(t.tokenize("Café"), vec!["ca", "##fe"]);

    let whole = tokenizer_with(&["cafe"]);
    assert_eq!(whole.tokenize("Café"), vec!["cafe"]);
}

/// padding=max_length fills with [PAD] up to the requested length.
#[test]
fn test_padding_fills_to_max_length() {
    let t = tokenizer_with(&["hello", "world"]);
    let ids = t.encode_with("hello world", Padding::MaxLength, Some(10));
    assert_eq!(ids.len(), 10);
    let body_end = ids.iter().position(|&id| id == 102).unwrap();
    for &id in &ids[body_end + 1..] {
        assert_eq!(id, 0);
    }
}

/// A word outside the vocabulary whose suffix is known: forward collapses
/// to [UNK], bidirectional recovers the split.
#[test]
fn test_bidirectional_prefers_known_split() {
    let forward_only = tokenizer_with(&["foob", "foo", "##bar"]);
    assert_eq!(forward_only.encode("foobar"), vec![101, 100, 102]);

    let bidirectional = BertTokenizer::from_vocab_text(
        &bert_base_vocab(&["foob", "foo", "##bar"]),
        BertOptions {
            bidirectional: true,
            ..BertOptions::default()
        },
    );
    let ids = bidirectional.encode("foobar");
    assert_eq!(
        ids,
        vec![
            101,
            id(&bidirectional, "foo"),
            id(&bidirectional, "##bar"),
            102
        ]
    );
}

/// Round-trip through decode rebuilds words from ## pieces.
#[test]
fn test_decode_rejoins_wordpieces() {
    let t = tokenizer_with(&["token", "##ization", "works"]);
    let ids = t.encode("tokenization works");
    assert_eq!(t.decode(&ids), "tokenization works");
}

/// Vocabulary id/token mapping is a bijection over the table.
#[test]
fn test_vocab_bijection() {
    let vocab = Vocab::from_text(&bert_base_vocab(&["hello", "world", "##s"]));
    let mut seen = std::collections::HashSet::new();
    for (id, token) in vocab.iter() {
        assert_eq!(vocab.token_of(id), token);
        if seen.insert(token.to_string()) {
            assert_eq!(vocab.id_of(token, u32::MAX), id);
        }
    }
}

/// Every plain vocabulary word under the cap segments to its own id.
#[test]
fn test_vocab_words_map_to_single_ids() {
    let vocab = Vocab::from_text(&bert_base_vocab(&["alpha", "beta", "##s", "gamma"]));
    let specials = SpecialIds::resolve(&vocab);
    let segmenter = WordpieceSegmenter::new(&vocab, specials, 100);
    for (id, token) in vocab.iter() {
        if token.starts_with("##") || token.starts_with('[') {
            continue;
        }
        let mut out = Vec::new();
        segmenter.segment_forward(token.as_bytes(), &mut out, usize::MAX);
        assert_eq!(out, vec![id], "vocab word {token} should map to itself");
    }
}

/// A word longer than the per-word byte cap becomes a single [UNK].
#[test]
fn test_word_over_cap_is_unknown() {
    let vocab = Vocab::from_text(&bert_base_vocab(&["a", "##a"]));
    let specials = SpecialIds::resolve(&vocab);
    let segmenter = WordpieceSegmenter::new(&vocab, specials, 8);
    let mut out = Vec::new();
    segmenter.segment_forward(&[b'a'; 9], &mut out, usize::MAX);
    assert_eq!(out, vec![specials.unk]);
}

/// Arbitrary bytes never panic; malformed regions are cleaned away.
#[test]
fn test_encode_total_on_malformed_text() {
    let t = tokenizer_with(&["hello"]);
    let text = String::from_utf8_lossy(&[0xF0, 0x28, 0x8C, 0x28]).into_owned();
    let ids = t.encode(&text);
    assert_eq!(ids[0], 101);
    assert_eq!(*ids.last().unwrap(), 102);
}

/// Batch encoding keeps results keyed by input index, parallel or not.
#[test]
fn test_batch_preserves_input_order() {
    let t = tokenizer_with(&["a", "b", "c"]);
    let texts: Vec<String> = (0..32)
        .map(|i| ["a b", "b c a", "c"][i % 3].to_string())
        .collect();
    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let sequential = t.encode_batch(&refs, Padding::Longest, None, false);
    let parallel = t.encode_batch(&refs, Padding::Longest, None, true);
    assert_eq!(sequential, parallel);
    for (text, ids) in refs.iter().zip(&sequential) {
        assert_eq!(ids, &t.encode(text));
    }
}
