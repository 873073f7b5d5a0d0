//! Engine selection, configuration, and the crate-level error type.
//!
//! The facade collapses the engine zoo into one [`Tokenizer`] with two
//! tagged variants; everything else — bidirectional WordPiece, chunked
//! execution, parallelism — is a configuration knob, not a subtype.

use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::bert::{BertOptions, BertTokenizer, Padding};
use super::bpe::BpeTokenizer;
use super::chunk::{encode_reader, CancelToken, ChunkOptions};
use super::vocab::VocabError;

/// Errors surfaced by engine construction and the streaming executor.
/// Encoding itself is total and never returns one of these.
#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("vocabulary error: {0}")]
    Vocab(#[from] VocabError),
    #[error("regex compilation error: {0}")]
    Regex(#[from] fancy_regex::Error),
    #[error("special token matcher: {0}")]
    AhoCorasick(#[from] aho_corasick::BuildError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("decoded bytes are not valid UTF-8")]
    Utf8,
    #[error("operation cancelled")]
    Cancelled,
}

/// Which engine a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizerKind {
    Bert,
    Bpe,
}

impl TokenizerKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "bert" => Some(Self::Bert),
            "bpe" => Some(Self::Bpe),
            _ => None,
        }
    }
}

/// Recognized options; defaults mirror the documented table.
#[derive(Debug, Clone)]
pub struct TokenizerConfig {
    pub kind: TokenizerKind,
    /// WordPiece vocab file; required for `bert`.
    pub vocab_path: Option<PathBuf>,
    /// BPE vocab JSON; required for `bpe`.
    pub bpe_vocab_path: Option<PathBuf>,
    /// BPE merges file; required for `bpe`.
    pub bpe_merges_path: Option<PathBuf>,
    pub do_lower_case: bool,
    pub tokenize_cjk: bool,
    /// Default encode length; `-1` means unbounded.
    pub model_max_length: i64,
    pub enable_bidirectional: bool,
    pub max_parallelism: usize,
    pub chunk_size: usize,
}

impl TokenizerConfig {
    pub fn bert(vocab_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: TokenizerKind::Bert,
            vocab_path: Some(vocab_path.into()),
            ..Self::base(TokenizerKind::Bert)
        }
    }

    pub fn bpe(vocab_path: impl Into<PathBuf>, merges_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: TokenizerKind::Bpe,
            bpe_vocab_path: Some(vocab_path.into()),
            bpe_merges_path: Some(merges_path.into()),
            ..Self::base(TokenizerKind::Bpe)
        }
    }

    fn base(kind: TokenizerKind) -> Self {
        let chunk_defaults = ChunkOptions::default();
        Self {
            kind,
            vocab_path: None,
            bpe_vocab_path: None,
            bpe_merges_path: None,
            do_lower_case: true,
            tokenize_cjk: true,
            model_max_length: 128,
            enable_bidirectional: false,
            max_parallelism: chunk_defaults.max_parallelism,
            chunk_size: chunk_defaults.chunk_size,
        }
    }

    /// The documented `-1 = unbounded` convention, as an optional cap.
    pub fn effective_max_length(&self) -> Option<usize> {
        if self.model_max_length < 0 {
            None
        } else {
            Some(self.model_max_length as usize)
        }
    }

    fn chunk_options(&self) -> ChunkOptions {
        ChunkOptions {
            chunk_size: self.chunk_size,
            max_parallelism: self.max_parallelism,
        }
    }
}

enum Engine {
    Bert(BertTokenizer),
    Bpe(BpeTokenizer),
}

/// Configured tokenizer facade dispatching to the selected engine.
pub struct Tokenizer {
    engine: Engine,
    chunk_options: ChunkOptions,
}

impl Tokenizer {
    pub fn from_config(config: TokenizerConfig) -> Result<Self, TokenizerError> {
        let engine = match config.kind {
            TokenizerKind::Bert => {
                let vocab_path = config.vocab_path.as_ref().ok_or_else(|| {
                    TokenizerError::Config("type=bert requires vocab_path".into())
                })?;
                let options = BertOptions {
                    do_lower_case: config.do_lower_case,
                    tokenize_cjk: config.tokenize_cjk,
                    bidirectional: config.enable_bidirectional,
                    model_max_length: config.effective_max_length(),
                    ..BertOptions::default()
                };
                Engine::Bert(BertTokenizer::from_file(vocab_path, options)?)
            }
            TokenizerKind::Bpe => {
                let vocab_path = config.bpe_vocab_path.as_ref().ok_or_else(|| {
                    TokenizerError::Config("type=bpe requires bpe_vocab_path".into())
                })?;
                let merges_path = config.bpe_merges_path.as_ref().ok_or_else(|| {
                    TokenizerError::Config("type=bpe requires bpe_merges_path".into())
                })?;
                let vocab = super::vocab::BpeVocab::from_file(vocab_path)?;
                let merges = super::vocab::MergeTable::from_file(merges_path)?;
                // GPT-2 vocabularies carry their end marker inline; treat it
                // as structural when present.
                let mut specials = FxHashMap::default();
                if let Some(id) = vocab.id_of("<|endoftext|>") {
                    specials.insert("<|endoftext|>".to_string(), id);
                }
                Engine::Bpe(BpeTokenizer::new(vocab, merges, specials)?)
            }
        };
        debug!(kind = ?config.kind, "tokenizer configured");
        Ok(Self {
            engine,
            chunk_options: config.chunk_options(),
        })
    }

    pub fn kind(&self) -> TokenizerKind {
        match self.engine {
            Engine::Bert(_) => TokenizerKind::Bert,
            Engine::Bpe(_) => TokenizerKind::Bpe,
        }
    }

    /// Encode with engine defaults.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        match &self.engine {
            Engine::Bert(bert) => bert.encode(text),
            Engine::Bpe(bpe) => bpe.encode(text),
        }
    }

    /// Encode with explicit padding and length. The BPE engine has no
    /// padding token; it truncates to `max_length` and ignores `padding`.
    pub fn encode_with(
        &self,
        text: &str,
        padding: Padding,
        max_length: Option<usize>,
    ) -> Vec<u32> {
        match &self.engine {
            Engine::Bert(bert) => bert.encode_with(text, padding, max_length),
            Engine::Bpe(bpe) => {
                let mut ids = bpe.encode(text);
                if let Some(max) = max_length {
                    ids.truncate(max);
                }
                ids
            }
        }
    }

    pub fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
        match &self.engine {
            Engine::Bert(bert) => Ok(bert.decode(ids)),
            Engine::Bpe(bpe) => bpe.decode(ids),
        }
    }

    /// Token strings without special tokens. BERT only.
    pub fn tokenize(&self, text: &str) -> Result<Vec<String>, TokenizerError> {
        match &self.engine {
            Engine::Bert(bert) => Ok(bert.tokenize(text)),
            Engine::Bpe(_) => Err(TokenizerError::Config(
                "tokenize is only available for type=bert".into(),
            )),
        }
    }

    pub fn batch_encode(
        &self,
        texts: &[&str],
        padding: Padding,
        max_length: Option<usize>,
        parallel: bool,
    ) -> Vec<Vec<u32>> {
        match &self.engine {
            Engine::Bert(bert) => bert.encode_batch(texts, padding, max_length, parallel),
            Engine::Bpe(bpe) => {
                let batch = bpe.encode_batch(texts, parallel);
                match max_length {
                    Some(max) => batch
                        .into_iter()
                        .map(|mut ids| {
                            ids.truncate(max);
                            ids
                        })
                        .collect(),
                    None => batch,
                }
            }
        }
    }

    /// Encode a file. BERT streams it through the chunked executor; BPE
    /// reads it whole (lossily for malformed UTF-8) and encodes.
    pub fn process_file(&self, path: impl AsRef<Path>) -> Result<Vec<u32>, TokenizerError> {
        self.process_file_with_cancel(path, &CancelToken::new())
    }

    /// [`Self::process_file`] with an external cancel signal.
    pub fn process_file_with_cancel(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancelToken,
    ) -> Result<Vec<u32>, TokenizerError> {
        match &self.engine {
            Engine::Bert(bert) => {
                let file = std::fs::File::open(path)?;
                let reader = std::io::BufReader::new(file);
                encode_reader(
                    bert,
                    reader,
                    Padding::Longest,
                    None,
                    &self.chunk_options,
                    cancel,
                )
            }
            Engine::Bpe(bpe) => {
                let bytes = std::fs::read(path)?;
                let text = String::from_utf8_lossy(&bytes);
                Ok(bpe.encode(&text))
            }
        }
    }

    /// Borrow the BERT engine, if that is what was configured.
    pub fn as_bert(&self) -> Option<&BertTokenizer> {
        match &self.engine {
            Engine::Bert(bert) => Some(bert),
            Engine::Bpe(_) => None,
        }
    }

    /// Borrow the BPE engine, if that is what was configured.
    pub fn as_bpe(&self) -> Option<&BpeTokenizer> {
        match &self.engine {
            Engine::Bert(_) => None,
            Engine::Bpe(bpe) => Some(bpe),
        }
    }
}
