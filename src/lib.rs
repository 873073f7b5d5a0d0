//! blazetok — high-throughput WordPiece and byte-level BPE tokenization
//! for neural language models.
//!
//! Converts UTF-8 text into vocabulary ids (and back) with two engines:
//!
//! - WordPiece as used by BERT-family models, driven by explicit-edge
//!   byte automata with greedy longest-match, plus backward and
//!   bidirectional variants
//! - Byte-level BPE as used by GPT-2, with rank-driven merges and the
//!   canonical byte-to-printable-codepoint mapping
//!
//! Built for throughput:
//! - Immutable engines shared freely across threads
//! - Rayon parallelism for batch and chunked encoding
//! - FxHashMap lookups and an LRU cache for repeated BPE pieces
//! - Aho-Corasick scanning for special tokens
//! - A streaming executor with bounded channels and cooperative
//!   cancellation for file-sized inputs

pub mod core;

pub use crate::core::{
    byte_decode, byte_encode, chunk_ranges, encode_reader, BertOptions, BertTokenizer,
    BpeTokenizer, BpeVocab, CancelToken, ChunkOptions, ChunkedEncoder, MergeTable, Padding,
    SpecialIds, Tokenizer, TokenizerConfig, TokenizerError, TokenizerKind, Vocab, VocabError,
    WordpieceSegmenter, GPT2_PATTERN,
};
