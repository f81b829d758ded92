//! Pluggable key orderings.
//!
//! A [`Comparator`] is a stateless total order over raw byte sequences,
//! registered with a database when it is opened. The engine keeps its tree
//! sorted with it, so every comparator here satisfies:
//!
//! - `compare(a, a) == Equal`
//! - `compare(a, b) == compare(b, a).reverse()`
//! - the induced order is transitive
//!
//! [`Comparator::LengthOnly`] collapses keys of equal length: they compare
//! equal, so a database using it keeps at most one key per length.

use lightkv_engine::KeyCompare;
use once_cell::sync::Lazy;
use std::cmp::Ordering;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;

/// Byte-sequence orderings selectable per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    /// Byte-wise lexicographic order.
    Lexicographic,
    /// Reverse byte-wise lexicographic order.
    LexicographicDescending,
    /// Shorter keys first, equal lengths ordered lexicographically.
    LengthThenLexicographic,
    /// Reverse of [`Comparator::LengthThenLexicographic`].
    LengthThenLexicographicDescending,
    /// Orders by length alone.
    LengthOnly,
    /// Native-endian `i32`/`i64` for 4 and 8 byte keys.
    SignedInteger,
    /// Reverse of [`Comparator::SignedInteger`].
    SignedIntegerDescending,
    /// Native-endian `u32`/`u64` for 4 and 8 byte keys.
    UnsignedInteger,
    /// Reverse of [`Comparator::UnsignedInteger`].
    UnsignedIntegerDescending,
    /// Ordinal order of UTF-8 strings (by code point).
    Utf8,
    /// Reverse of [`Comparator::Utf8`].
    Utf8Descending,
    /// Orders by a process-seeded hash, ties broken lexicographically.
    ///
    /// Stable for the lifetime of the process only; a database sorted with
    /// it must not be reopened after a restart.
    Hash,
}

impl Comparator {
    /// Every comparator, for exhaustive checks.
    pub const ALL: [Comparator; 12] = [
        Comparator::Lexicographic,
        Comparator::LexicographicDescending,
        Comparator::LengthThenLexicographic,
        Comparator::LengthThenLexicographicDescending,
        Comparator::LengthOnly,
        Comparator::SignedInteger,
        Comparator::SignedIntegerDescending,
        Comparator::UnsignedInteger,
        Comparator::UnsignedIntegerDescending,
        Comparator::Utf8,
        Comparator::Utf8Descending,
        Comparator::Hash,
    ];

    /// Compares two byte sequences.
    #[must_use]
    pub fn compare(self, a: &[u8], b: &[u8]) -> Ordering {
        (self.as_fn())(a, b)
    }

    /// Returns the function pointer handed to the engine.
    #[must_use]
    pub fn as_fn(self) -> KeyCompare {
        match self {
            Self::Lexicographic => lexicographic,
            Self::LexicographicDescending => lexicographic_desc,
            Self::LengthThenLexicographic => length_then_lexicographic,
            Self::LengthThenLexicographicDescending => length_then_lexicographic_desc,
            Self::LengthOnly => length_only,
            Self::SignedInteger => signed_integer,
            Self::SignedIntegerDescending => signed_integer_desc,
            Self::UnsignedInteger => unsigned_integer,
            Self::UnsignedIntegerDescending => unsigned_integer_desc,
            Self::Utf8 => utf8,
            Self::Utf8Descending => utf8_desc,
            Self::Hash => hashed,
        }
    }
}

fn lexicographic(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

fn lexicographic_desc(a: &[u8], b: &[u8]) -> Ordering {
    b.cmp(a)
}

fn length_then_lexicographic(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn length_then_lexicographic_desc(a: &[u8], b: &[u8]) -> Ordering {
    length_then_lexicographic(b, a)
}

fn length_only(a: &[u8], b: &[u8]) -> Ordering {
    a.len().cmp(&b.len())
}

/// Integer widths sort before every other width so that the fallback stays
/// a total order: 4-byte keys, then 8-byte keys, then the rest.
fn width_class(len: usize) -> u8 {
    match len {
        4 => 0,
        8 => 1,
        _ => 2,
    }
}

fn signed_integer(a: &[u8], b: &[u8]) -> Ordering {
    width_class(a.len())
        .cmp(&width_class(b.len()))
        .then_with(|| match (<[u8; 4]>::try_from(a), <[u8; 4]>::try_from(b)) {
            (Ok(x), Ok(y)) => i32::from_ne_bytes(x).cmp(&i32::from_ne_bytes(y)),
            _ => match (<[u8; 8]>::try_from(a), <[u8; 8]>::try_from(b)) {
                (Ok(x), Ok(y)) => i64::from_ne_bytes(x).cmp(&i64::from_ne_bytes(y)),
                _ => a.cmp(b),
            },
        })
}

fn signed_integer_desc(a: &[u8], b: &[u8]) -> Ordering {
    signed_integer(b, a)
}

fn unsigned_integer(a: &[u8], b: &[u8]) -> Ordering {
    width_class(a.len())
        .cmp(&width_class(b.len()))
        .then_with(|| match (<[u8; 4]>::try_from(a), <[u8; 4]>::try_from(b)) {
            (Ok(x), Ok(y)) => u32::from_ne_bytes(x).cmp(&u32::from_ne_bytes(y)),
            _ => match (<[u8; 8]>::try_from(a), <[u8; 8]>::try_from(b)) {
                (Ok(x), Ok(y)) => u64::from_ne_bytes(x).cmp(&u64::from_ne_bytes(y)),
                _ => a.cmp(b),
            },
        })
}

fn unsigned_integer_desc(a: &[u8], b: &[u8]) -> Ordering {
    unsigned_integer(b, a)
}

fn utf8(a: &[u8], b: &[u8]) -> Ordering {
    match (std::str::from_utf8(a), std::str::from_utf8(b)) {
        (Ok(x), Ok(y)) => x.cmp(y),
        // Invalid sequences: order by lossy text, then raw bytes.
        _ => String::from_utf8_lossy(a)
            .cmp(&String::from_utf8_lossy(b))
            .then_with(|| a.cmp(b)),
    }
}

fn utf8_desc(a: &[u8], b: &[u8]) -> Ordering {
    utf8(b, a)
}

static HASH_SEED: Lazy<RandomState> = Lazy::new(RandomState::new);

fn hashed(a: &[u8], b: &[u8]) -> Ordering {
    HASH_SEED
        .hash_one(a)
        .cmp(&HASH_SEED.hash_one(b))
        .then_with(|| a.cmp(b))
}
