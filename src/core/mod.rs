//! Core tokenization engines for blazetok.
//!
//! Two engines share one infrastructure:
//!
//! - [`BertTokenizer`]: UTF-8 normalization (whitespace/control cleanup,
//!   CJK isolation, case/accent folding, punctuation splitting) feeding a
//!   WordPiece segmenter built on explicit-edge byte automata, with
//!   forward, backward, and bidirectional modes.
//! - [`BpeTokenizer`]: GPT-2 byte-level BPE — regex pre-tokenization,
//!   rank-driven pair merging, and the bytes-to-printable-codepoints
//!   mapping, with an LRU piece cache.
//!
//! Around them sit the chunked/streaming executors for large inputs and
//! the [`Tokenizer`] facade that selects an engine from a
//! [`TokenizerConfig`].
//!
//! # Architecture
//!
//! Engines are immutable after construction and freely shared across
//! threads; all per-encode state lives in call-local buffers. Batch and
//! chunked paths fan out on Rayon with results in input order.

mod automaton;
mod bert;
mod bpe;
mod byte_level;
mod chunk;
mod config;
mod folding;
mod normalizer;
mod unicode;
mod vocab;
mod wordpiece;

pub use bert::{BertOptions, BertTokenizer, Padding};
pub use bpe::{BpeTokenizer, GPT2_PATTERN};
pub use byte_level::{byte_decode, byte_encode};
pub use chunk::{chunk_ranges, encode_reader, CancelToken, ChunkOptions, ChunkedEncoder};
pub use config::{Tokenizer, TokenizerConfig, TokenizerError, TokenizerKind};
pub use vocab::{BpeVocab, MergeTable, SpecialIds, Vocab, VocabError};
pub use wordpiece::{WordpieceSegmenter, DEFAULT_MAX_WORD_BYTES};
