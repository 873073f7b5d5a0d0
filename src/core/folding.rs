//! Case folding and accent stripping for the lowercasing normalizer.
//!
//! The folder maps a single code point to its lowercase, accent-stripped
//! replacement string. Lookups go through three tiers:
//!
//! 1. ASCII `A`..=`Z` shortcut straight to `a`..=`z`.
//! 2. A compiled replacement map embedded at build time
//!    (`data/accent_map.txt`, `0xHHHH 0xHHHH` per line).
//! 3. NFKD decomposition, dropping combining marks and lowercasing the
//!    surviving scalars.
//!
//! A 256-entry table of pre-folded Latin-1 replacements is materialized at
//! construction so the normalizer can fold pure Latin-1 words without
//! touching the decomposition path.

use rustc_hash::FxHashMap;
use unicode_normalization::char::{decompose_compatible, is_combining_mark};

static ACCENT_MAP_SRC: &str = include_str!("data/accent_map.txt");

/// Per-engine fold table, built once at engine construction and shared
/// immutably afterwards.
pub struct CaseFolder {
    map: FxHashMap<u32, String>,
    latin1: Vec<String>,
}

impl CaseFolder {
    pub fn new() -> Self {
        let map = parse_accent_map(ACCENT_MAP_SRC);
        let mut folder = Self {
            map,
            latin1: Vec::new(),
        };
        folder.latin1 = (0u32..256)
            .map(|cp| {
                let mut out = String::new();
                folder.fold_into(cp, &mut out);
                out
            })
            .collect();
        folder
    }

    /// Append the replacement for `cp` to `out`.
    ///
    /// Code points with no mapping and no decomposition pass through
    /// lowercased; ASCII below `A` passes through unchanged.
    pub fn fold_into(&self, cp: u32, out: &mut String) {
        if cp < 0x80 {
            let b = cp as u8;
            out.push(if b.is_ascii_uppercase() {
                b.to_ascii_lowercase() as char
            } else {
                b as char
            });
            return;
        }
        if let Some(replacement) = self.map.get(&cp) {
            out.push_str(replacement);
            return;
        }
        let Some(c) = char::from_u32(cp) else {
            return;
        };
        decompose_compatible(c, |d| {
            if !is_combining_mark(d) {
                for lower in d.to_lowercase() {
                    out.push(lower);
                }
            }
        });
    }

    /// Pre-folded replacement for a code point below 256.
    #[inline]
    pub fn latin1(&self, cp: u32) -> &str {
        &self.latin1[cp as usize]
    }
}

impl Default for CaseFolder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_accent_map(src: &str) -> FxHashMap<u32, String> {
    let mut map = FxHashMap::default();
    for line in src.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(from), Some(to)) = (fields.next(), fields.next()) else {
            continue;
        };
        let (Some(from), Some(to)) = (parse_hex_codepoint(from), parse_hex_codepoint(to)) else {
            continue;
        };
        if let Some(to) = char::from_u32(to) {
            map.insert(from, to.to_string());
        }
    }
    map
}

fn parse_hex_codepoint(field: &str) -> Option<u32> {
    u32::from_str_radix(field.strip_prefix("0x")?, 16).ok()
}
