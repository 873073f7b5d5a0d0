//! Vocabulary and merge-table loading.
//!
//! Three on-disk formats feed the engines:
//!
//! - **WordPiece vocab**: plain UTF-8, one token per line, the 0-indexed
//!   line number over non-empty lines is the token id.
//! - **BPE vocab**: a JSON object mapping token string to integer id.
//! - **BPE merges**: one `left right` pair per line; blank lines and
//!   `#` comments are skipped; the 0-based order of appearance among the
//!   remaining lines is the pair's rank (lower merges first).
//!
//! All loaders fail construction with a [`VocabError`]; nothing here is
//! reachable from the encode hot path.

use rustc_hash::FxHashMap;
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading vocabulary or merge files.
#[derive(Error, Debug)]
pub enum VocabError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed merges line {line}: expected two tokens, got {text:?}")]
    MalformedMerge { line: usize, text: String },
    #[error("BPE vocabulary must be a JSON object of token to id")]
    VocabNotObject,
    #[error("invalid id for token {token:?}")]
    InvalidId { token: String },
    #[error("duplicate id {id} for token {token:?}")]
    DuplicateId { id: u32, token: String },
}

/// Ordered WordPiece token table with O(1) lookup in both directions.
///
/// Indices are contiguous from 0 in file order. When the same token text
/// appears twice (filler rows in hand-built vocabularies), the first
/// occurrence owns the string-to-id mapping.
pub struct Vocab {
    tokens: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl Vocab {
    /// Parse vocab text: trailing whitespace stripped per line, empty
    /// lines skipped, running counter of kept lines is the id.
    pub fn from_text(data: &str) -> Self {
        let mut tokens = Vec::new();
        let mut index = FxHashMap::default();
        for line in data.lines() {
            let token = line.trim_end();
            if token.is_empty() {
                continue;
            }
            let id = tokens.len() as u32;
            index.entry(token.to_string()).or_insert(id);
            tokens.push(token.to_string());
        }
        Self { tokens, index }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_text(&data))
    }

    /// Token id, or `default` when the token is not in the table.
    #[inline]
    pub fn id_of(&self, token: &str, default: u32) -> u32 {
        self.index.get(token).copied().unwrap_or(default)
    }

    #[inline]
    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    /// Token text for an id; out-of-range ids map to the empty string so
    /// decoding stays total.
    #[inline]
    pub fn token_of(&self, id: u32) -> &str {
        self.tokens
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (id as u32, token.as_str()))
    }
}

/// Structural token ids the BERT engine emits without text matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    pub pad: u32,
    pub unk: u32,
    pub cls: u32,
    pub sep: u32,
}

impl SpecialIds {
    /// Resolve by vocabulary lookup, falling back to the standard
    /// BERT-base positions when a marker row is absent.
    pub fn resolve(vocab: &Vocab) -> Self {
        Self {
            pad: vocab.id_of("[PAD]", 0),
            unk: vocab.id_of("[UNK]", 100),
            cls: vocab.id_of("[CLS]", 101),
            sep: vocab.id_of("[SEP]", 102),
        }
    }

    #[inline]
    pub fn is_special(&self, id: u32) -> bool {
        id == self.pad || id == self.unk || id == self.cls || id == self.sep
    }
}

/// BPE vocabulary: token string to id and back, loaded from JSON.
pub struct BpeVocab {
    encoder: FxHashMap<String, u32>,
    decoder: FxHashMap<u32, String>,
}

impl BpeVocab {
    pub fn from_json(data: &str) -> Result<Self, VocabError> {
        let value: serde_json::Value = serde_json::from_str(data)?;
        let object = value.as_object().ok_or(VocabError::VocabNotObject)?;

        let mut encoder = FxHashMap::default();
        let mut decoder = FxHashMap::default();
        for (token, id) in object {
            let id = id
                .as_u64()
                .and_then(|id| u32::try_from(id).ok())
                .ok_or_else(|| VocabError::InvalidId {
                    token: token.clone(),
                })?;
            if decoder.insert(id, token.clone()).is_some() {
                return Err(VocabError::DuplicateId {
                    id,
                    token: token.clone(),
                });
            }
            encoder.insert(token.clone(), id);
        }
        Ok(Self { encoder, decoder })
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    #[inline]
    pub fn id_of(&self, token: &str) -> Option<u32> {
        self.encoder.get(token).copied()
    }

    #[inline]
    pub fn token_of(&self, id: u32) -> Option<&str> {
        self.decoder.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.encoder.len()
    }

    pub fn is_empty(&self) -> bool {
        self.encoder.is_empty()
    }
}

/// Ordered BPE merge rules with interned pieces.
///
/// Every left/right/merged piece string is interned to a symbol id so the
/// merge loop can look up pair ranks without building key strings. A pair
/// lookup yields the rank and the symbol of the merged piece.
pub struct MergeTable {
    symbols: FxHashMap<String, u32>,
    pairs: FxHashMap<(u32, u32), (u32, u32)>,
    rules: usize,
}

impl MergeTable {
    pub fn from_text(data: &str) -> Result<Self, VocabError> {
        let mut table = Self {
            symbols: FxHashMap::default(),
            pairs: FxHashMap::default(),
            rules: 0,
        };
        for (line_no, line) in data.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (left, right) = match (fields.next(), fields.next(), fields.next()) {
                (Some(left), Some(right), None) => (left, right),
                _ => {
                    return Err(VocabError::MalformedMerge {
                        line: line_no,
                        text: line.to_string(),
                    })
                }
            };
            let rank = table.rules as u32;
            let left_sym = table.intern(left);
            let right_sym = table.intern(right);
            let merged_sym = table.intern(&format!("{left}{right}"));
            table
                .pairs
                .entry((left_sym, right_sym))
                .or_insert((rank, merged_sym));
            table.rules += 1;
        }
        Ok(table)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, VocabError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_text(&data)
    }

    fn intern(&mut self, piece: &str) -> u32 {
        let next = self.symbols.len() as u32;
        *self.symbols.entry(piece.to_string()).or_insert(next)
    }

    /// Symbol id for a piece string, if any merge rule mentions it.
    #[inline]
    pub fn symbol_of(&self, piece: &str) -> Option<u32> {
        self.symbols.get(piece).copied()
    }

    /// `(rank, merged_symbol)` for an adjacent pair, if the pair is a rule.
    #[inline]
    pub fn lookup(&self, left: u32, right: u32) -> Option<(u32, u32)> {
        self.pairs.get(&(left, right)).copied()
    }

    /// Number of merge rules (ranks run `0..len`).
    pub fn len(&self) -> usize {
        self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules == 0
    }
}
