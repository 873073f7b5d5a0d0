//! Text normalization ahead of WordPiece segmentation.
//!
//! A single pass over the raw bytes produces a cleaned string, which is
//! whitespace-split into words; each word is then case/accent folded and
//! punctuation-split into the sub-words handed to the segmenter.
//!
//! Cleaning drops NUL, U+FFFD, the line/paragraph separators and control
//! characters, folds any whitespace to a plain space, and (when CJK mode
//! is on) isolates each CJK ideograph between spaces. Isolation never
//! stacks a pad space onto an existing one, so cleaning is idempotent.
//!
//! Malformed UTF-8 never fails the pass: the decoder yields code point 0
//! for invalid sequences and the cleaner drops it.

use super::folding::CaseFolder;
use super::unicode::{is_cjk, is_control, is_punctuation, is_whitespace, Codepoints};

pub struct Normalizer {
    lower_case: bool,
    tokenize_cjk: bool,
    folder: Option<CaseFolder>,
}

impl Normalizer {
    pub fn new(lower_case: bool, tokenize_cjk: bool) -> Self {
        Self {
            lower_case,
            tokenize_cjk,
            folder: lower_case.then(CaseFolder::new),
        }
    }

    /// Cleaning pass: drop, space-fold, and CJK-isolate. Idempotent.
    pub fn clean(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len() + bytes.len() / 8);
        let mut pending_pad = false;
        for (cp, _raw) in Codepoints::new(bytes) {
            if cp == 0 || cp == 0xFFFD || cp == 0x2028 || cp == 0x2029 || is_control(cp) {
                continue;
            }
            if is_whitespace(cp) {
                out.push(' ');
                pending_pad = false;
                continue;
            }
            if pending_pad {
                out.push(' ');
                pending_pad = false;
            }
            let Some(c) = char::from_u32(cp) else {
                continue;
            };
            if self.tokenize_cjk && is_cjk(cp) {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push(c);
                pending_pad = true;
            } else {
                out.push(c);
            }
        }
        if pending_pad {
            out.push(' ');
        }
        out
    }

    /// Full pipeline: clean, split, fold, punctuation-split. `emit` is
    /// called once per sub-word and returns whether to keep going, which
    /// is how the engine enforces its output budget.
    pub fn normalize<F: FnMut(&str) -> bool>(&self, bytes: &[u8], mut emit: F) {
        let cleaned = self.clean(bytes);
        let mut folded = String::new();
        for word in cleaned.split([' ', '\t', '\n', '\r']) {
            if word.is_empty() {
                continue;
            }
            let word = match &self.folder {
                Some(folder) => {
                    folded.clear();
                    fold_word(folder, word, &mut folded);
                    folded.as_str()
                }
                None => word,
            };
            if !split_on_punctuation(word, &mut emit) {
                return;
            }
        }
    }
}

/// Case/accent folding of one whitespace-delimited word.
///
/// Pure-ASCII words lower byte-wise; words entirely below U+0100 go
/// through the prebuilt Latin-1 table; anything else folds code point by
/// code point.
fn fold_word(folder: &CaseFolder, word: &str, out: &mut String) {
    if word.is_ascii() {
        for b in word.bytes() {
            out.push(b.to_ascii_lowercase() as char);
        }
        return;
    }
    if word.chars().all(|c| (c as u32) < 256) {
        for c in word.chars() {
            out.push_str(folder.latin1(c as u32));
        }
        return;
    }
    for c in word.chars() {
        folder.fold_into(c as u32, out);
    }
}

/// Runs of non-punctuation become one sub-word; each punctuation code
/// point is its own sub-word; order is preserved.
fn split_on_punctuation<F: FnMut(&str) -> bool>(word: &str, emit: &mut F) -> bool {
    let mut start = 0;
    for (idx, c) in word.char_indices() {
        if is_punctuation(c as u32) {
            if start < idx && !emit(&word[start..idx]) {
                return false;
            }
            let end = idx + c.len_utf8();
            if !emit(&word[idx..end]) {
                return false;
            }
            start = end;
        }
    }
    if start < word.len() {
        return emit(&word[start..]);
    }
    true
}
