//! Integration tests for chunked/streaming execution and the facade.

use blazetok::{
    chunk_ranges, encode_reader, BertOptions, BertTokenizer, CancelToken, ChunkOptions,
    ChunkedEncoder, Padding, Tokenizer, TokenizerConfig, TokenizerError,
};
use std::io::Write;

fn bert_base_vocab(extra: &[&str]) -> String {
    let mut lines: Vec<String> = (0..100).map(|i| format!("[unused{i}]")).collect();
    lines[0] = "[PAD]".to_string();
    lines.push("[UNK]".to_string());
    lines.push("[CLS]".to_string());
    lines.push("[SEP]".to_string());
    lines.extend(extra.iter().map(|token| token.to_string()));
    lines.join("\n")
}

fn unbounded_tokenizer(extra: &[&str]) -> BertTokenizer {
    BertTokenizer::from_vocab_text(
        &bert_base_vocab(extra),
        BertOptions {
            model_max_length: None,
            ..BertOptions::default()
        },
    )
}

fn options(chunk_size: usize) -> ChunkOptions {
    ChunkOptions {
        chunk_size,
        max_parallelism: 4,
    }
}

/// When every boundary lands on a paragraph break, chunked encode equals
/// the sequential path exactly.
#[test]
fn test_chunked_equals_sequential_on_paragraph_boundaries() {
    let tokenizer = unbounded_tokenizer(&["hello", "world"]);
    let paragraph = "hello world hello world hello\n\n";
    let text = paragraph.repeat(20);
    let encoder = ChunkedEncoder::new(&tokenizer, options(48)).unwrap();
    let chunked = encoder.encode(text.as_bytes(), Padding::Longest, None);
    assert_eq!(chunked, tokenizer.encode(&text));
}

/// Streaming reassembles worker results by chunk index, so it agrees
/// with the in-memory chunked path.
#[test]
fn test_streaming_matches_chunked() {
    let tokenizer = unbounded_tokenizer(&["hello", "world"]);
    let text = "hello world hello world hello\n\n".repeat(20);
    let encoder = ChunkedEncoder::new(&tokenizer, options(48)).unwrap();
    let chunked = encoder.encode(text.as_bytes(), Padding::Longest, None);
    let streamed = encode_reader(
        &tokenizer,
        text.as_bytes(),
        Padding::Longest,
        None,
        &options(48),
        &CancelToken::new(),
    )
    .unwrap();
    assert_eq!(streamed, chunked);
}

/// Many workers, many chunks: order and content still deterministic.
#[test]
fn test_streaming_deterministic_across_runs() {
    let tokenizer = unbounded_tokenizer(&["alpha", "beta", "gamma"]);
    let text = "alpha beta gamma ".repeat(200);
    let first = encode_reader(
        &tokenizer,
        text.as_bytes(),
        Padding::Longest,
        None,
        &options(64),
        &CancelToken::new(),
    )
    .unwrap();
    for _ in 0..3 {
        let again = encode_reader(
            &tokenizer,
            text.as_bytes(),
            Padding::Longest,
            None,
            &options(64),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(again, first);
    }
    assert_eq!(first, tokenizer.encode(&text));
}

/// Chunk spans partition the input and never cut a code point.
#[test]
fn test_chunk_ranges_partition_unicode_input() {
    let text = "héllo wörld 世界 ".repeat(64);
    for chunk_size in [32, 100, 1 << 20] {
        let ranges = chunk_ranges(text.as_bytes(), chunk_size);
        let mut expected = 0;
        for range in &ranges {
            assert_eq!(range.start, expected);
            assert!(text.is_char_boundary(range.start));
            assert!(text.is_char_boundary(range.end));
            expected = range.end;
        }
        assert_eq!(expected, text.len());
    }
}

/// A cancelled call returns Cancelled and no partial ids.
#[test]
fn test_cancellation_returns_no_partial_result() {
    let tokenizer = unbounded_tokenizer(&["hello"]);
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = encode_reader(
        &tokenizer,
        &b"hello hello hello hello"[..],
        Padding::Longest,
        None,
        &options(8),
        &cancel,
    );
    assert!(matches!(result, Err(TokenizerError::Cancelled)));
}

/// The facade streams files through the chunked executor.
#[test]
fn test_facade_process_file() {
    let dir = std::env::temp_dir();
    let vocab_path = dir.join(format!("blazetok-it-vocab-{}.txt", std::process::id()));
    let input_path = dir.join(format!("blazetok-it-input-{}.txt", std::process::id()));
    std::fs::File::create(&vocab_path)
        .unwrap()
        .write_all(bert_base_vocab(&["hello", "world"]).as_bytes())
        .unwrap();
    let text = "hello world\n\n".repeat(50);
    std::fs::File::create(&input_path)
        .unwrap()
        .write_all(text.as_bytes())
        .unwrap();

    let mut config = TokenizerConfig::bert(&vocab_path);
    config.model_max_length = -1;
    config.chunk_size = 32;
    let tokenizer = Tokenizer::from_config(config).unwrap();
    let ids = tokenizer.process_file(&input_path).unwrap();
    assert_eq!(ids, tokenizer.encode(&text));

    let _ = std::fs::remove_file(&vocab_path);
    let _ = std::fs::remove_file(&input_path);
}

/// Truncation and padding apply to the assembled chunked result.
#[test]
fn test_chunked_truncation_and_padding() {
    let tokenizer = unbounded_tokenizer(&["a"]);
    let text = "a ".repeat(500);
    let encoder = ChunkedEncoder::new(&tokenizer, options(64)).unwrap();

    let truncated = encoder.encode(text.as_bytes(), Padding::Longest, Some(12));
    assert_eq!(truncated.len(), 12);
    assert_eq!(truncated[0], 101);
    assert_eq!(*truncated.last().unwrap(), 102);

    let padded = encoder.encode(b"a", Padding::MaxLength, Some(12));
    assert_eq!(padded.len(), 12);
    assert!(padded[4..].iter().all(|&id| id == 0));
}
