//! WordPiece subword segmentation.
//!
//! Two frozen automata drive the segmenter: an *initial* automaton over
//! vocabulary entries without the `##` prefix, and a *suffix* automaton
//! over the text after `##`. Every non-special vocabulary entry lands in
//! exactly one of the two.
//!
//! The forward pass is the classic greedy longest-match; the backward
//! pass scans right-to-left and is occasionally able to rescue words the
//! forward pass collapses to `[UNK]`. Bidirectional mode runs both and
//! arbitrates.

use super::automaton::{Automaton, AutomatonBuilder};
use super::vocab::{SpecialIds, Vocab};
use tracing::debug;

/// Words longer than this many bytes are not segmented at all and become
/// a single `[UNK]`.
pub const DEFAULT_MAX_WORD_BYTES: usize = 100;

/// Ids below this are the reserved structural slots in the canonical
/// vocabulary layout; the arbitration filter removes them before
/// comparing segmentations.
const RESERVED_IDS: u32 = 4;

pub struct WordpieceSegmenter {
    initial: Automaton,
    suffix: Automaton,
    unk_id: u32,
    max_word_bytes: usize,
}

impl WordpieceSegmenter {
    pub fn new(vocab: &Vocab, specials: SpecialIds, max_word_bytes: usize) -> Self {
        let mut initial = AutomatonBuilder::new();
        let mut suffix = AutomatonBuilder::new();
        for (id, token) in vocab.iter() {
            if specials.is_special(id) {
                continue;
            }
            match token.strip_prefix("##") {
                Some(rest) => suffix.insert(rest.as_bytes(), id),
                None => initial.insert(token.as_bytes(), id),
            }
        }
        let initial = initial.build();
        let suffix = suffix.build();
        debug!(
            initial_states = initial.state_count(),
            suffix_states = suffix.state_count(),
            "wordpiece segmenter built"
        );
        Self {
            initial,
            suffix,
            unk_id: specials.unk,
            max_word_bytes,
        }
    }

    /// Greedy left-to-right longest-match segmentation of one word.
    ///
    /// Appends ids to `out` up to `max_len` total entries; a word whose
    /// tail has no vocabulary entry rolls the whole word back to `[UNK]`.
    pub fn segment_forward(&self, word: &[u8], out: &mut Vec<u32>, max_len: usize) {
        if word.is_empty() {
            return;
        }
        if word.len() > self.max_word_bytes {
            self.push_capped(out, self.unk_id, max_len);
            return;
        }
        let rollback = out.len();
        let mut start = 0;
        while start < word.len() {
            let automaton = if start == 0 { &self.initial } else { &self.suffix };
            match automaton.search(word, start) {
                Some((len, id)) => {
                    self.push_capped(out, id, max_len);
                    start += len;
                }
                None => {
                    out.truncate(rollback);
                    self.push_capped(out, self.unk_id, max_len);
                    return;
                }
            }
        }
    }

    /// Right-to-left segmentation: at each position, the longest span
    /// ending there that the appropriate automaton consumes exactly wins.
    pub fn segment_backward(&self, word: &[u8], out: &mut Vec<u32>, max_len: usize) {
        if word.is_empty() {
            return;
        }
        if word.len() > self.max_word_bytes {
            self.push_capped(out, self.unk_id, max_len);
            return;
        }
        let mut stack: Vec<u32> = Vec::new();
        let mut pos = word.len();
        while pos > 0 {
            let mut matched = None;
            for i in 0..pos {
                let span = &word[i..pos];
                let hit = if i == 0 {
                    self.initial.match_exact(span)
                } else {
                    self.suffix.match_exact(span)
                };
                if let Some(id) = hit {
                    matched = Some((i, id));
                    break;
                }
            }
            match matched {
                Some((i, id)) => {
                    stack.push(id);
                    pos = i;
                }
                None => {
                    self.push_capped(out, self.unk_id, max_len);
                    return;
                }
            }
        }
        for &id in stack.iter().rev() {
            self.push_capped(out, id, max_len);
        }
    }

    /// Run both directions and append the preferred segmentation.
    pub fn segment_bidirectional(
        &self,
        word: &[u8],
        out: &mut Vec<u32>,
        max_len: usize,
        forward_scratch: &mut Vec<u32>,
        backward_scratch: &mut Vec<u32>,
    ) {
        forward_scratch.clear();
        backward_scratch.clear();
        self.segment_forward(word, forward_scratch, usize::MAX);
        self.segment_backward(word, backward_scratch, usize::MAX);
        let winner = if prefer_forward(forward_scratch, backward_scratch) {
            forward_scratch
        } else {
            backward_scratch
        };
        for &id in winner.iter() {
            self.push_capped(out, id, max_len);
        }
    }

    #[inline]
    fn push_capped(&self, out: &mut Vec<u32>, id: u32, max_len: usize) {
        if out.len() < max_len {
            out.push(id);
        }
    }

    pub fn unk_id(&self) -> u32 {
        self.unk_id
    }
}

/// Arbitration between the forward and backward segmentations of a word.
///
/// Equal segmentations prefer forward. Otherwise the segmentation whose
/// smallest id is larger wins: special and unknown ids occupy the bottom
/// of the vocabulary, so a segmentation leaning on them carries the
/// smaller minimum and loses. On equal minima, both sets are filtered to
/// ids past the reserved slots, sorted, and compared lexicographically;
/// the smaller sequence wins, a proper prefix beats its extension, and a
/// full tie goes to forward.
pub fn prefer_forward(forward: &[u32], backward: &[u32]) -> bool {
    if forward == backward {
        return true;
    }
    let forward_min = forward.iter().min();
    let backward_min = backward.iter().min();
    if forward_min != backward_min {
        return forward_min > backward_min;
    }
    let filtered_sorted = |ids: &[u32]| {
        let mut kept: Vec<u32> = ids.iter().copied().filter(|&id| id >= RESERVED_IDS).collect();
        kept.sort_unstable();
        kept
    };
    filtered_sorted(forward) <= filtered_sorted(backward)
}
