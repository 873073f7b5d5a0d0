//! GPT-2 byte-to-codepoint mapping for byte-level BPE.
//!
//! BPE operates on printable text, but the input is arbitrary bytes. The
//! fix is a fixed bijection between the 256 byte values and printable
//! code points: bytes that are already printable (`!`..`~`, `¡`..`¬`,
//! `®`..`ÿ`) map to themselves, and the remaining 68 bytes take the next
//! unused code points from U+0100 upward in byte order. The construction
//! is deterministic, so encoders and decoders built independently agree.

use rustc_hash::FxHashMap;
use std::sync::LazyLock;

/// Byte value to its printable stand-in, 256 entries.
static BYTE_TO_CHAR: LazyLock<[char; 256]> = LazyLock::new(|| {
    let mut printable = [false; 256];
    for b in 0x21..=0x7E {
        printable[b] = true;
    }
    for b in 0xA1..=0xAC {
        printable[b] = true;
    }
    for b in 0xAE..=0xFF {
        printable[b] = true;
    }

    let mut mapping = ['\0'; 256];
    let mut next = 0x100u32;
    for b in 0..256 {
        if printable[b] {
            mapping[b] = char::from_u32(b as u32).unwrap();
        } else {
            mapping[b] = char::from_u32(next).unwrap();
            next += 1;
        }
    }
    mapping
});

/// Inverse of [`BYTE_TO_CHAR`].
static CHAR_TO_BYTE: LazyLock<FxHashMap<char, u8>> = LazyLock::new(|| {
    BYTE_TO_CHAR
        .iter()
        .enumerate()
        .map(|(byte, &ch)| (ch, byte as u8))
        .collect()
});

/// Map raw bytes to their printable representation.
#[inline]
pub fn byte_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| BYTE_TO_CHAR[b as usize]).collect()
}

/// Map a printable representation back to raw bytes. Code points outside
/// the byte alphabet are ignored, so decoding stays total.
#[inline]
pub fn byte_decode(text: &str) -> Vec<u8> {
    text.chars()
        .filter_map(|ch| CHAR_TO_BYTE.get(&ch).copied())
        .collect()
}

/// Append the raw bytes of a printable representation to `out`.
#[inline]
pub fn byte_decode_into(text: &str, out: &mut Vec<u8>) {
    out.extend(text.chars().filter_map(|ch| CHAR_TO_BYTE.get(&ch).copied()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_is_bijective() {
        let mut seen = std::collections::HashSet::new();
        for b in 0..256 {
            assert!(seen.insert(BYTE_TO_CHAR[b]), "duplicate for byte {b}");
        }
        assert_eq!(seen.len(), 256);
        assert_eq!(CHAR_TO_BYTE.len(), 256);
    }

    #[test]
    fn test_printable_bytes_map_to_themselves() {
        for b in (0x21u32..=0x7E).chain(0xA1..=0xAC).chain(0xAE..=0xFF) {
            assert_eq!(BYTE_TO_CHAR[b as usize] as u32, b);
        }
    }

    #[test]
    fn test_space_maps_to_g_dot() {
        // 0x20 is the 33rd remapped byte (after 0x00..=0x1F), landing at U+0120.
        assert_eq!(BYTE_TO_CHAR[0x20], '\u{0120}');
    }

    #[test]
    fn test_all_bytes_roundtrip() {
        for b in 0u8..=255 {
            let encoded = byte_encode(&[b]);
            assert_eq!(byte_decode(&encoded), vec![b]);
        }
    }

    #[test]
    fn test_encode_ascii_word() {
        assert_eq!(byte_encode(b"Hello"), "Hello");
        assert_eq!(byte_encode(b" Hello"), "\u{0120}Hello");
    }

    #[test]
    fn test_encode_multibyte_utf8() {
        // "世" is E4 B8 96; each byte maps independently.
        let encoded = byte_encode("世".as_bytes());
        assert_eq!(encoded.chars().count(), 3);
        assert_eq!(byte_decode(&encoded), "世".as_bytes());
    }

    #[test]
    fn test_decode_ignores_foreign_codepoints() {
        // 世 is not in the byte alphabet and is skipped.
        assert_eq!(byte_decode("a世b"), b"ab");
    }

    #[test]
    fn test_full_string_roundtrip() {
        let original = "Hello, 世界! 🌍 café";
        let encoded = byte_encode(original.as_bytes());
        assert_eq!(byte_decode(&encoded), original.as_bytes());
    }
}
