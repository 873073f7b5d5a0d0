//! BERT tokenizer engine: normalization, WordPiece, special tokens,
//! length budget and padding.
//!
//! The engine is immutable after construction and holds no locks on the
//! encode path; batch encoding fans out over Rayon with input order
//! preserved by the indexed collect.

use rayon::prelude::*;
use tracing::debug;

use super::normalizer::Normalizer;
use super::vocab::{SpecialIds, Vocab, VocabError};
use super::wordpiece::{WordpieceSegmenter, DEFAULT_MAX_WORD_BYTES};

/// Padding behavior for [`BertTokenizer::encode_with`]. Anything that is
/// not `MaxLength` leaves the result unpadded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    MaxLength,
    #[default]
    Longest,
}

impl Padding {
    /// Config-file spelling: `"max_length"` pads, any other value does not.
    pub fn from_name(name: &str) -> Self {
        if name == "max_length" {
            Self::MaxLength
        } else {
            Self::Longest
        }
    }
}

/// Construction knobs; defaults mirror the documented option table.
#[derive(Debug, Clone)]
pub struct BertOptions {
    pub do_lower_case: bool,
    pub tokenize_cjk: bool,
    pub bidirectional: bool,
    /// `None` means unbounded.
    pub model_max_length: Option<usize>,
    pub max_word_bytes: usize,
}

impl Default for BertOptions {
    fn default() -> Self {
        Self {
            do_lower_case: true,
            tokenize_cjk: true,
            bidirectional: false,
            model_max_length: Some(128),
            max_word_bytes: DEFAULT_MAX_WORD_BYTES,
        }
    }
}

pub struct BertTokenizer {
    vocab: Vocab,
    specials: SpecialIds,
    normalizer: Normalizer,
    segmenter: WordpieceSegmenter,
    bidirectional: bool,
    model_max_length: Option<usize>,
}

impl BertTokenizer {
    pub fn new(vocab: Vocab, options: BertOptions) -> Self {
        let specials = SpecialIds::resolve(&vocab);
        let segmenter = WordpieceSegmenter::new(&vocab, specials, options.max_word_bytes);
        let normalizer = Normalizer::new(options.do_lower_case, options.tokenize_cjk);
        debug!(
            vocab_size = vocab.len(),
            bidirectional = options.bidirectional,
            "bert tokenizer built"
        );
        Self {
            vocab,
            specials,
            normalizer,
            segmenter,
            bidirectional: options.bidirectional,
            model_max_length: options.model_max_length,
        }
    }

    pub fn from_vocab_text(data: &str, options: BertOptions) -> Self {
        Self::new(Vocab::from_text(data), options)
    }

    pub fn from_file(
        path: impl AsRef<std::path::Path>,
        options: BertOptions,
    ) -> Result<Self, VocabError> {
        Ok(Self::new(Vocab::from_file(path)?, options))
    }

    /// Encode with engine defaults (no padding, default max length).
    pub fn encode(&self, text: &str) -> Vec<u32> {
        self.encode_with(text, Padding::Longest, None)
    }

    /// Full encode: `[CLS]` + sub-word ids + `[SEP]`, early-stopping the
    /// body at `max_length − 1` and padding up to `max_length` when asked.
    ///
    /// `max_length` falls back to the engine default; `None` there means
    /// unbounded.
    pub fn encode_with(
        &self,
        text: &str,
        padding: Padding,
        max_length: Option<usize>,
    ) -> Vec<u32> {
        let effective = max_length.or(self.model_max_length);
        let mut out = Vec::with_capacity(effective.unwrap_or(64).min(4096));
        out.push(self.specials.cls);
        let body_limit = effective.map_or(usize::MAX, |m| m.saturating_sub(1));
        self.encode_body(text.as_bytes(), &mut out, body_limit);
        out.push(self.specials.sep);
        if padding == Padding::MaxLength {
            if let Some(target) = effective {
                while out.len() < target {
                    out.push(self.specials.pad);
                }
            }
        }
        out
    }

    /// Sub-word ids only — no `[CLS]`/`[SEP]`, no padding. The chunked
    /// executor encodes chunk bodies through this seam.
    pub(crate) fn encode_body(&self, bytes: &[u8], out: &mut Vec<u32>, limit: usize) {
        let mut forward_scratch = Vec::new();
        let mut backward_scratch = Vec::new();
        self.normalizer.normalize(bytes, |sub| {
            if out.len() >= limit {
                return false;
            }
            if self.bidirectional {
                self.segmenter.segment_bidirectional(
                    sub.as_bytes(),
                    out,
                    limit,
                    &mut forward_scratch,
                    &mut backward_scratch,
                );
            } else {
                self.segmenter.segment_forward(sub.as_bytes(), out, limit);
            }
            out.len() < limit
        });
    }

    /// Token strings between `[CLS]` and `[SEP]`, unbounded.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let mut ids = Vec::new();
        self.encode_body(text.as_bytes(), &mut ids, usize::MAX);
        ids.iter()
            .map(|&id| self.vocab.token_of(id).to_string())
            .collect()
    }

    /// Reassemble text: structural tokens are skipped, `##` pieces join
    /// the previous word, everything else gets a separating space.
    pub fn decode(&self, ids: &[u32]) -> String {
        let mut out = String::new();
        for &id in ids {
            if id == self.specials.pad || id == self.specials.cls || id == self.specials.sep {
                continue;
            }
            let token = self.vocab.token_of(id);
            if let Some(rest) = token.strip_prefix("##") {
                out.push_str(rest);
            } else {
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(token);
            }
        }
        out
    }

    /// Per-text encode over a batch; `parallel` fans out on Rayon with
    /// results in input order.
    pub fn encode_batch(
        &self,
        texts: &[&str],
        padding: Padding,
        max_length: Option<usize>,
        parallel: bool,
    ) -> Vec<Vec<u32>> {
        if parallel {
            texts
                .par_iter()
                .map(|text| self.encode_with(text, padding, max_length))
                .collect()
        } else {
            texts
                .iter()
                .map(|text| self.encode_with(text, padding, max_length))
                .collect()
        }
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn specials(&self) -> SpecialIds {
        self.specials
    }

    pub fn model_max_length(&self) -> Option<usize> {
        self.model_max_length
    }
}
