//! Byte-level BPE tokenizer engine.
//!
//! Encoding runs in three stages: the GPT-2 pre-tokenization regex cuts
//! the text into pieces, each piece's bytes are mapped to printable code
//! points, and the merge loop repeatedly fuses the adjacent pair with the
//! lowest rank until no ranked pair remains. Per-piece results are
//! memoized in an LRU cache keyed by a hash of the raw piece, so the
//! common pieces of a large document are merged once.
//!
//! Special tokens are never produced by text matching in `encode`; the
//! `encode_with_special` entry point scans for them with an Aho-Corasick
//! matcher and splices their ids between BPE runs.

use aho_corasick::AhoCorasick;
use fancy_regex::Regex;
use lru::LruCache;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHasher};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

use super::byte_level::{byte_decode_into, byte_encode};
use super::config::TokenizerError;
use super::vocab::{BpeVocab, MergeTable};

/// GPT-2 pre-tokenization pattern. Matches are produced left to right,
/// non-overlapping, greedy within each alternative; the pattern is part
/// of the engine contract.
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// Default capacity of the piece cache.
const DEFAULT_CACHE_SIZE: usize = 4096;

pub struct BpeTokenizer {
    vocab: BpeVocab,
    merges: MergeTable,
    special_tokens: FxHashMap<String, u32>,
    special_tokens_decoder: FxHashMap<u32, String>,
    special_token_strings: Vec<String>,
    special_matcher: Option<AhoCorasick>,
    regex: Regex,
    piece_cache: Mutex<LruCache<u64, Vec<u32>>>,
}

impl BpeTokenizer {
    pub fn new(
        vocab: BpeVocab,
        merges: MergeTable,
        special_tokens: FxHashMap<String, u32>,
    ) -> Result<Self, TokenizerError> {
        Self::with_cache_size(vocab, merges, special_tokens, DEFAULT_CACHE_SIZE)
    }

    pub fn with_cache_size(
        vocab: BpeVocab,
        merges: MergeTable,
        special_tokens: FxHashMap<String, u32>,
        cache_size: usize,
    ) -> Result<Self, TokenizerError> {
        let regex = Regex::new(GPT2_PATTERN)?;

        let special_tokens_decoder: FxHashMap<u32, String> = special_tokens
            .iter()
            .map(|(token, &id)| (id, token.clone()))
            .collect();
        let special_token_strings: Vec<String> = special_tokens.keys().cloned().collect();
        let special_matcher = if special_token_strings.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&special_token_strings)?)
        };

        let cache_size = NonZeroUsize::new(cache_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        debug!(
            vocab_size = vocab.len(),
            merge_rules = merges.len(),
            "bpe tokenizer built"
        );
        Ok(Self {
            vocab,
            merges,
            special_tokens,
            special_tokens_decoder,
            special_token_strings,
            special_matcher,
            regex,
            piece_cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    pub fn from_files(
        vocab_path: impl AsRef<std::path::Path>,
        merges_path: impl AsRef<std::path::Path>,
        special_tokens: FxHashMap<String, u32>,
    ) -> Result<Self, TokenizerError> {
        let vocab = BpeVocab::from_file(vocab_path)?;
        let merges = MergeTable::from_file(merges_path)?;
        Self::new(vocab, merges, special_tokens)
    }

    #[inline]
    fn hash_piece(piece: &[u8]) -> u64 {
        let mut hasher = FxHasher::default();
        piece.hash(&mut hasher);
        hasher.finish()
    }

    /// Encode text to ids. Special tokens in the input are treated as
    /// ordinary text.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let mut out = Vec::new();
        let bytes = text.as_bytes();
        for piece in self.regex.find_iter(text).filter_map(|m| m.ok()) {
            self.encode_piece(&bytes[piece.start()..piece.end()], &mut out);
        }
        out
    }

    /// Encode with special tokens spliced in wherever their text occurs.
    pub fn encode_with_special(&self, text: &str) -> Vec<u32> {
        let Some(ref matcher) = self.special_matcher else {
            return self.encode(text);
        };
        let mut out = Vec::new();
        let mut last_end = 0;
        for hit in matcher.find_iter(text.as_bytes()) {
            if hit.start() > last_end {
                out.extend(self.encode(&text[last_end..hit.start()]));
            }
            let token = &self.special_token_strings[hit.pattern().as_usize()];
            if let Some(&id) = self.special_tokens.get(token) {
                out.push(id);
            }
            last_end = hit.end();
        }
        if last_end < text.len() {
            out.extend(self.encode(&text[last_end..]));
        }
        out
    }

    /// Batch encode in parallel; results stay in input order.
    pub fn encode_batch(&self, texts: &[&str], parallel: bool) -> Vec<Vec<u32>> {
        if parallel {
            texts.par_iter().map(|text| self.encode(text)).collect()
        } else {
            texts.iter().map(|text| self.encode(text)).collect()
        }
    }

    /// BPE one pre-tokenized piece, going through the cache.
    fn encode_piece(&self, piece: &[u8], out: &mut Vec<u32>) {
        let encoded = byte_encode(piece);

        // Fast path: the whole piece is a vocabulary token.
        if let Some(id) = self.vocab.id_of(&encoded) {
            out.push(id);
            return;
        }

        let hash = Self::hash_piece(piece);
        if let Ok(mut cache) = self.piece_cache.lock() {
            if let Some(ids) = cache.get(&hash) {
                out.extend_from_slice(ids);
                return;
            }
        }

        let ids = self.merge_piece(&encoded);

        if let Ok(mut cache) = self.piece_cache.lock() {
            cache.put(hash, ids.clone());
        }
        out.extend_from_slice(&ids);
    }

    /// Rank-driven merge loop over one byte-encoded piece.
    ///
    /// The piece is a list of ranges over `encoded`, each carrying the
    /// merge-table symbol of its text (if the table mentions it). Each
    /// round fuses the leftmost occurrence of the lowest-ranked adjacent
    /// pair; when no pair has a rank, the surviving ranges are looked up
    /// in the vocabulary. Range strings missing from the vocabulary are
    /// dropped.
    fn merge_piece(&self, encoded: &str) -> Vec<u32> {
        struct Range {
            start: usize,
            end: usize,
            symbol: Option<u32>,
        }

        let mut ranges: Vec<Range> = encoded
            .char_indices()
            .map(|(start, c)| {
                let end = start + c.len_utf8();
                Range {
                    start,
                    end,
                    symbol: self.merges.symbol_of(&encoded[start..end]),
                }
            })
            .collect();

        while ranges.len() > 1 {
            let mut best: Option<(u32, usize, u32)> = None;
            for i in 0..ranges.len() - 1 {
                let (Some(left), Some(right)) = (ranges[i].symbol, ranges[i + 1].symbol) else {
                    continue;
                };
                if let Some((rank, merged)) = self.merges.lookup(left, right) {
                    // Strict comparison keeps the leftmost occurrence on ties.
                    if best.map_or(true, |(best_rank, _, _)| rank < best_rank) {
                        best = Some((rank, i, merged));
                    }
                }
            }
            let Some((_, at, merged)) = best else {
                break;
            };
            ranges[at].end = ranges[at + 1].end;
            ranges[at].symbol = Some(merged);
            ranges.remove(at + 1);
        }

        ranges
            .iter()
            .filter_map(|range| self.vocab.id_of(&encoded[range.start..range.end]))
            .collect()
    }

    /// Decode ids back to text: concatenate token texts, invert the byte
    /// mapping, and require the result to be valid UTF-8.
    pub fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        let bytes = self.decode_bytes(ids);
        String::from_utf8(bytes).map_err(|_| TokenizerError::Utf8)
    }

    /// Decode, replacing invalid UTF-8 with U+FFFD.
    pub fn decode_lossy(&self, ids: &[u32]) -> String {
        String::from_utf8_lossy(&self.decode_bytes(ids)).into_owned()
    }

    fn decode_bytes(&self, ids: &[u32]) -> Vec<u8> {
        let mut out = Vec::with_capacity(ids.len() * 4);
        for &id in ids {
            if let Some(token) = self.vocab.token_of(id) {
                byte_decode_into(token, &mut out);
            } else if let Some(special) = self.special_tokens_decoder.get(&id) {
                out.extend_from_slice(special.as_bytes());
            }
            // Ids known to neither table are ignored.
        }
        out
    }

    pub fn vocab(&self) -> &BpeVocab {
        &self.vocab
    }

    pub fn special_tokens(&self) -> &FxHashMap<String, u32> {
        &self.special_tokens
    }

    /// Number of cached piece encodings.
    pub fn cache_len(&self) -> usize {
        self.piece_cache.lock().map(|cache| cache.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.piece_cache.lock() {
            cache.clear();
        }
    }
}
