//! Logical message buffers.
//!
//! A [`CharBufferBuilder`] holds the text of one message (start line and
//! header lines) in pooled character chunks. Every textual field of a parsed
//! message is a [`CharSeq`] view into it, so parsing copies nothing past the
//! initial UTF-8 decoding.

mod builder;
mod char_seq;

pub use builder::CharBufferBuilder;
pub use char_seq::CharSeq;
pub use char_seq::Chars;
pub(crate) use char_seq::TextRef;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("index {index} is not in range [0, {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("range [{start}, {end}) is not valid for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
}

/// Hashes characters with ASCII letters lowered: `h = 31 * h + c`, wrapping.
///
/// Header names are hashed with it when parsed and when looked up.
pub fn hash_lower_case(chars: impl Iterator<Item = char>) -> u32 {
    chars.fold(0u32, |hash, ch| hash.wrapping_mul(31).wrapping_add(u32::from(to_lower(ch))))
}

#[inline]
pub(crate) fn to_lower(ch: char) -> char {
    ch.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_ascii_case() {
        assert_eq!(hash_lower_case("Content-Length".chars()), hash_lower_case("content-length".chars()));
        assert_ne!(hash_lower_case("Content-Length".chars()), hash_lower_case("Content-Type".chars()));
        assert_eq!(hash_lower_case("".chars()), 0);
        assert_eq!(hash_lower_case("ab".chars()), 31 * 97 + 98);
    }
}
