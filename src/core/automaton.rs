//! Byte-level keyword automaton for WordPiece longest-match search.
//!
//! This is an Aho–Corasick variant with one deliberate twist: searching
//! follows **explicit** edges only — transitions created by keyword
//! insertion — and stops at the first byte with no explicit continuation.
//! Failure links are still computed, but only to fold fallback targets
//! into the dense goto table at build time; they are never followed
//! during a search. The result is longest-*prefix* matching: a match is
//! always a prefix of the searched span, never a pivoted substring. That
//! is exactly what WordPiece needs, since a word whose prefix has no
//! vocabulary entry must fail as a whole.
//!
//! Construction grows a node pool, then freezes it into three parallel
//! flat arrays (goto table, explicit-edge bitset, per-state output)
//! addressed by state index, giving cache-dense traversal and trivial
//! sharing between threads.

use tracing::debug;

struct BuildNode {
    goto_: [u32; 256],
    explicit: [u64; 4],
    fail: u32,
    output: Option<(u32, u32)>,
}

impl BuildNode {
    fn new() -> Self {
        Self {
            goto_: [0; 256],
            explicit: [0; 4],
            fail: 0,
            output: None,
        }
    }

    #[inline]
    fn has_explicit(&self, byte: u8) -> bool {
        self.explicit[(byte >> 6) as usize] & (1u64 << (byte & 63)) != 0
    }

    #[inline]
    fn mark_explicit(&mut self, byte: u8) {
        self.explicit[(byte >> 6) as usize] |= 1u64 << (byte & 63);
    }
}

/// Incremental keyword insertion; call [`AutomatonBuilder::build`] to
/// freeze into a searchable [`Automaton`].
pub struct AutomatonBuilder {
    nodes: Vec<BuildNode>,
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        Self {
            nodes: vec![BuildNode::new()],
        }
    }

    /// Insert a keyword, recording `(id, byte_length)` at its accepting
    /// state. Later insertions of the same keyword keep the first id.
    pub fn insert(&mut self, keyword: &[u8], id: u32) {
        if keyword.is_empty() {
            return;
        }
        let mut state = 0usize;
        for &byte in keyword {
            if self.nodes[state].has_explicit(byte) {
                state = self.nodes[state].goto_[byte as usize] as usize;
            } else {
                let next = self.nodes.len() as u32;
                self.nodes.push(BuildNode::new());
                self.nodes[state].goto_[byte as usize] = next;
                self.nodes[state].mark_explicit(byte);
                state = next as usize;
            }
        }
        let output = &mut self.nodes[state].output;
        if output.is_none() {
            *output = Some((id, keyword.len() as u32));
        }
    }

    /// Compute failure links breadth-first and fold them into the goto
    /// table, then flatten the pool into the frozen layout.
    pub fn build(mut self) -> Automaton {
        let mut queue = std::collections::VecDeque::new();
        for byte in 0usize..256 {
            if self.nodes[0].has_explicit(byte as u8) {
                let child = self.nodes[0].goto_[byte] as usize;
                self.nodes[child].fail = 0;
                queue.push_back(child);
            }
            // Non-explicit root edges already point back at the root.
        }
        while let Some(state) = queue.pop_front() {
            let fail = self.nodes[state].fail as usize;
            for byte in 0usize..256 {
                let fallback = self.nodes[fail].goto_[byte];
                if self.nodes[state].has_explicit(byte as u8) {
                    let child = self.nodes[state].goto_[byte] as usize;
                    self.nodes[child].fail = fallback;
                    queue.push_back(child);
                } else {
                    self.nodes[state].goto_[byte] = fallback;
                }
            }
        }

        let states = self.nodes.len();
        let mut transitions = Vec::with_capacity(states * 256);
        let mut explicit = Vec::with_capacity(states * 4);
        let mut vocab_ids = Vec::with_capacity(states);
        let mut match_lens = Vec::with_capacity(states);
        for node in &self.nodes {
            transitions.extend_from_slice(&node.goto_);
            explicit.extend_from_slice(&node.explicit);
            match node.output {
                Some((id, len)) => {
                    vocab_ids.push(id as i64);
                    match_lens.push(len);
                }
                None => {
                    vocab_ids.push(-1);
                    match_lens.push(0);
                }
            }
        }
        debug!(states, "keyword automaton frozen");
        Automaton {
            transitions,
            explicit,
            vocab_ids,
            match_lens,
        }
    }
}

impl Default for AutomatonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Frozen automaton: immutable after construction, shared freely.
pub struct Automaton {
    transitions: Vec<u32>,
    explicit: Vec<u64>,
    vocab_ids: Vec<i64>,
    match_lens: Vec<u32>,
}

impl Automaton {
    #[inline]
    fn is_explicit(&self, state: usize, byte: u8) -> bool {
        self.explicit[state * 4 + (byte >> 6) as usize] & (1u64 << (byte & 63)) != 0
    }

    /// Longest prefix of `bytes[start..]` reachable through explicit
    /// edges that ends in an accepting state.
    ///
    /// Returns `(matched_byte_len, vocab_id)`, or `None` when not even a
    /// one-byte prefix is a keyword prefix match.
    #[inline]
    pub fn search(&self, bytes: &[u8], start: usize) -> Option<(usize, u32)> {
        let mut state = 0usize;
        let mut best = None;
        for &byte in &bytes[start..] {
            if !self.is_explicit(state, byte) {
                break;
            }
            state = self.transitions[state * 256 + byte as usize] as usize;
            let id = self.vocab_ids[state];
            if id >= 0 {
                best = Some((self.match_lens[state] as usize, id as u32));
            }
        }
        best
    }

    /// Match requiring the whole span to be consumed exactly.
    #[inline]
    pub fn match_exact(&self, bytes: &[u8]) -> Option<u32> {
        match self.search(bytes, 0) {
            Some((len, id)) if len == bytes.len() => Some(id),
            _ => None,
        }
    }

    /// Number of states, including the root.
    pub fn state_count(&self) -> usize {
        self.vocab_ids.len()
    }
}
