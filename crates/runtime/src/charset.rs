// SPDX-FileCopyrightText: 2025 Knitli Inc. <knitli@knit.li>
// SPDX-FileContributor: Adam Poulemanos <adam@knit.li>
//
// SPDX-License-Identifier: MIT OR Apache-2.0
//! A byte set: the runtime representation every `character-class-set`,
//! `range`, and `charlist` AST node compiles down to. Folding all three
//! surface forms into one bitmap keeps the matcher IR's character-class
//! primitive singular, which is what real PEG engines do.

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteSet {
    bits: [u64; 4],
}

impl ByteSet {
    pub const fn empty() -> Self {
        Self { bits: [0; 4] }
    }

    pub fn single(byte: u8) -> Self {
        let mut s = Self::empty();
        s.insert(byte);
        s
    }

    pub fn range(lo: u8, hi: u8) -> Self {
        let mut s = Self::empty();
        for b in lo..=hi {
            s.insert(b);
        }
        s
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut s = Self::empty();
        for &b in bytes {
            s.insert(b);
        }
        s
    }

    pub fn insert(&mut self, byte: u8) {
        let idx = (byte >> 6) as usize;
        let bit = byte & 0x3f;
        self.bits[idx] |= 1u64 << bit;
    }

    pub fn union(&self, other: &ByteSet) -> ByteSet {
        let mut out = self.clone();
        for i in 0..4 {
            out.bits[i] |= other.bits[i];
        }
        out
    }

    pub fn complement(&self) -> ByteSet {
        let mut out = self.clone();
        for i in 0..4 {
            out.bits[i] = !out.bits[i];
        }
        out
    }

    pub fn contains(&self, byte: u8) -> bool {
        let idx = (byte >> 6) as usize;
        let bit = byte & 0x3f;
        (self.bits[idx] >> bit) & 1 == 1
    }

    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    /// The platform-independent ASCII locale classes named in RPL charsets
    /// (`[:name:]`), per spec §4.4.
    pub fn named(name: &str) -> Option<ByteSet> {
        let mut s = Self::empty();
        let matches: fn(u8) -> bool = match name {
            "digit" => |b| b.is_ascii_digit(),
            "alpha" => |b| b.is_ascii_alphabetic(),
            "alnum" => |b| b.is_ascii_alphanumeric(),
            "upper" => |b| b.is_ascii_uppercase(),
            "lower" => |b| b.is_ascii_lowercase(),
            "space" => |b| b.is_ascii_whitespace(),
            "punct" => |b| b.is_ascii_punctuation(),
            "cntrl" => |b| b.is_ascii_control(),
            "print" => |b| b.is_ascii_graphic() || b == b' ',
            "graph" => |b| b.is_ascii_graphic(),
            "xdigit" => |b| b.is_ascii_hexdigit(),
            "ascii" => |b| b.is_ascii(),
            "word" => |b| b.is_ascii_alphanumeric() || b == b'_',
            _ => return None,
        };
        for b in 0u8..=255 {
            if matches(b) {
                s.insert(b);
            }
        }
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_bounds() {
        let s = ByteSet::range(b'a', b'z');
        assert!(s.contains(b'a'));
        assert!(s.contains(b'z'));
        assert!(!s.contains(b'A'));
    }

    #[test]
    fn complement_flips_membership() {
        let s = ByteSet::range(b'0', b'9').complement();
        assert!(!s.contains(b'5'));
        assert!(s.contains(b'x'));
    }

    #[test]
    fn named_digit_matches_ascii_digits() {
        let s = ByteSet::named("digit").unwrap();
        assert!(s.contains(b'0'));
        assert!(!s.contains(b'a'));
    }

    #[test]
    fn unknown_named_class_is_none() {
        assert!(ByteSet::named("not-a-class").is_none());
    }
}
