//! Chunked and streaming execution for large inputs.
//!
//! Large documents are split into chunks at friendly boundaries and the
//! chunks are encoded independently, without special tokens, on a worker
//! pool; the final sequence is `[CLS]` + the chunk results in input
//! order + `[SEP]`. Boundary preference, best first: a double newline in
//! the last half of the chunk window, a sentence terminator (`". "`) in
//! the last three quarters, any space, the hard size limit. A boundary is
//! always retreated to a code point start.
//!
//! Chunking does not guarantee byte-for-byte identical segmentation to
//! the sequential path: a boundary that falls inside a word (no newline,
//! terminator or space found) splits that word in two. Boundaries on
//! whitespace are exact.
//!
//! The streaming variant is a pipeline of bounded channels: a reader
//! thread publishes `(index, chunk)`, workers publish `(index, ids)`, and
//! the collector reassembles by index. A cancel token halts every stage
//! before it starts its next chunk; a cancelled call returns no partial
//! result.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use tracing::debug;

use super::bert::{BertTokenizer, Padding};
use super::config::TokenizerError;

/// Knobs for the chunked and streaming executors.
#[derive(Debug, Clone)]
pub struct ChunkOptions {
    /// Target chunk size in bytes.
    pub chunk_size: usize,
    /// Worker cap for chunk encoding.
    pub max_parallelism: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 128 * 1024,
            max_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Cooperative cancellation for the streaming pipeline. Cloning shares
/// the flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Rightmost occurrence of `needle` within `window`.
fn rfind(window: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > window.len() {
        return None;
    }
    window.windows(needle.len()).rposition(|w| w == needle)
}

/// Split point for a buffer holding at least `chunk_size` bytes.
/// Returns a boundary in `1..=chunk_size`.
fn split_point(bytes: &[u8], chunk_size: usize) -> usize {
    let window = &bytes[..chunk_size];
    let mut boundary = if let Some(at) = rfind(&window[chunk_size / 2..], b"\n\n") {
        chunk_size / 2 + at + 2
    } else if let Some(at) = rfind(&window[chunk_size / 4..], b". ") {
        chunk_size / 4 + at + 2
    } else if let Some(at) = rfind(window, b" ") {
        at + 1
    } else {
        chunk_size
    };
    // Never cut a code point: back off over continuation bytes.
    while boundary > 0 && boundary < bytes.len() && bytes[boundary] & 0xC0 == 0x80 {
        boundary -= 1;
    }
    if boundary == 0 {
        chunk_size
    } else {
        boundary
    }
}

/// Chunk spans over a full in-memory input.
pub fn chunk_ranges(bytes: &[u8], chunk_size: usize) -> Vec<std::ops::Range<usize>> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut base = 0;
    while bytes.len() - base > chunk_size {
        let cut = base + split_point(&bytes[base..], chunk_size);
        ranges.push(base..cut);
        base = cut;
    }
    if base < bytes.len() || bytes.is_empty() {
        ranges.push(base..bytes.len());
    }
    ranges
}

/// Chunk-parallel encode of an in-memory input.
///
/// Each chunk runs through the BERT engine without special tokens; the
/// assembled result is `[CLS]` + in-order ids + `[SEP]`, truncated to
/// `max_length` and padded when asked.
pub struct ChunkedEncoder<'a> {
    tokenizer: &'a BertTokenizer,
    pool: rayon::ThreadPool,
    options: ChunkOptions,
}

impl<'a> ChunkedEncoder<'a> {
    pub fn new(tokenizer: &'a BertTokenizer, options: ChunkOptions) -> Result<Self, TokenizerError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.max_parallelism)
            .build()?;
        Ok(Self {
            tokenizer,
            pool,
            options,
        })
    }

    pub fn encode(&self, bytes: &[u8], padding: Padding, max_length: Option<usize>) -> Vec<u32> {
        let ranges = chunk_ranges(bytes, self.options.chunk_size);
        debug!(chunks = ranges.len(), "chunked encode");
        let chunk_ids: Vec<Vec<u32>> = self.pool.install(|| {
            ranges
                .par_iter()
                .map(|range| {
                    let mut ids = Vec::new();
                    self.tokenizer
                        .encode_body(&bytes[range.clone()], &mut ids, usize::MAX);
                    ids
                })
                .collect()
        });
        assemble(self.tokenizer, chunk_ids.into_iter(), padding, max_length)
    }
}

/// Stitch per-chunk ids into the final special-token frame.
fn assemble(
    tokenizer: &BertTokenizer,
    chunks: impl Iterator<Item = Vec<u32>>,
    padding: Padding,
    max_length: Option<usize>,
) -> Vec<u32> {
    let specials = tokenizer.specials();
    let effective = max_length.or(tokenizer.model_max_length());
    let body_limit = effective.map_or(usize::MAX, |m| m.saturating_sub(1));
    let mut out = Vec::new();
    out.push(specials.cls);
    'outer: for ids in chunks {
        for id in ids {
            if out.len() >= body_limit {
                break 'outer;
            }
            out.push(id);
        }
    }
    out.push(specials.sep);
    if padding == Padding::MaxLength {
        if let Some(target) = effective {
            while out.len() < target {
                out.push(specials.pad);
            }
        }
    }
    out
}

/// Streaming encode from a byte source.
///
/// The reader thread carves chunks at the same boundaries as
/// [`chunk_ranges`]; workers drain a bounded channel and publish indexed
/// results; the calling thread collects and reassembles. Any I/O error
/// tears the pipeline down and surfaces after the channels close.
pub fn encode_reader<R: Read + Send>(
    tokenizer: &BertTokenizer,
    reader: R,
    padding: Padding,
    max_length: Option<usize>,
    options: &ChunkOptions,
    cancel: &CancelToken,
) -> Result<Vec<u32>, TokenizerError> {
    let chunk_size = options.chunk_size.max(1);
    let workers = options.max_parallelism.max(1);

    let (chunk_tx, chunk_rx) = mpsc::sync_channel::<(usize, Vec<u8>)>(workers * 2);
    let chunk_rx = Mutex::new(chunk_rx);
    let (ids_tx, ids_rx) = mpsc::sync_channel::<(usize, Vec<u32>)>(workers * 2);
    let read_error: Mutex<Option<std::io::Error>> = Mutex::new(None);

    let collected: BTreeMap<usize, Vec<u32>> = std::thread::scope(|scope| {
        let read_error = &read_error;
        let chunk_rx = &chunk_rx;
        scope.spawn(move || {
            read_chunks(reader, chunk_size, chunk_tx, cancel, read_error);
        });
        for _ in 0..workers {
            let worker_tx = ids_tx.clone();
            scope.spawn(move || loop {
                if cancel.is_cancelled() {
                    break;
                }
                let received = {
                    let guard = match chunk_rx.lock() {
                        Ok(guard) => guard,
                        Err(_) => break,
                    };
                    guard.recv()
                };
                let Ok((index, chunk)) = received else {
                    break;
                };
                let mut ids = Vec::new();
                tokenizer.encode_body(&chunk, &mut ids, usize::MAX);
                if worker_tx.send((index, ids)).is_err() {
                    break;
                }
            });
        }
        // The collector's receiver closes once every worker sender drops.
        drop(ids_tx);
        ids_rx.iter().collect()
    });

    if cancel.is_cancelled() {
        return Err(TokenizerError::Cancelled);
    }
    if let Ok(mut slot) = read_error.lock() {
        if let Some(error) = slot.take() {
            return Err(TokenizerError::Io(error));
        }
    }
    Ok(assemble(
        tokenizer,
        collected.into_values(),
        padding,
        max_length,
    ))
}

/// Bounded send that keeps watching the cancel flag instead of blocking
/// forever on a full channel whose consumers have stopped.
fn send_or_cancel<T>(tx: &mpsc::SyncSender<T>, mut item: T, cancel: &CancelToken) -> bool {
    loop {
        if cancel.is_cancelled() {
            return false;
        }
        match tx.try_send(item) {
            Ok(()) => return true,
            Err(mpsc::TrySendError::Full(back)) => {
                item = back;
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Err(mpsc::TrySendError::Disconnected(_)) => return false,
        }
    }
}

fn read_chunks<R: Read>(
    mut reader: R,
    chunk_size: usize,
    chunk_tx: mpsc::SyncSender<(usize, Vec<u8>)>,
    cancel: &CancelToken,
    read_error: &Mutex<Option<std::io::Error>>,
) {
    let mut buffer: Vec<u8> = Vec::with_capacity(chunk_size * 2);
    let mut scratch = vec![0u8; chunk_size];
    let mut index = 0usize;
    loop {
        if cancel.is_cancelled() {
            return;
        }
        let read = match reader.read(&mut scratch) {
            Ok(read) => read,
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(error) => {
                if let Ok(mut slot) = read_error.lock() {
                    *slot = Some(error);
                }
                return;
            }
        };
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&scratch[..read]);
        while buffer.len() > chunk_size {
            let cut = split_point(&buffer, chunk_size);
            let chunk: Vec<u8> = buffer.drain(..cut).collect();
            if !send_or_cancel(&chunk_tx, (index, chunk), cancel) {
                return;
            }
            index += 1;
        }
    }
    if !buffer.is_empty() {
        send_or_cancel(&chunk_tx, (index, buffer), cancel);
    }
}
