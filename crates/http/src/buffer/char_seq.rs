use std::fmt;
use std::fmt::Write;
use std::str;

use crate::buffer::{BufferError, CharBufferBuilder, hash_lower_case, to_lower};
use crate::ensure;

/// A read-only character sequence: a static literal or a range of a builder.
///
/// Range views borrow their builder, so they can't outlive the message that
/// owns it nor survive its release.
#[derive(Clone, Copy)]
pub enum CharSeq<'a> {
    Static(&'static str),
    Range { builder: &'a CharBufferBuilder, start: usize, end: usize },
}

impl<'a> CharSeq<'a> {
    #[inline]
    pub(crate) fn range(builder: &'a CharBufferBuilder, start: usize, end: usize) -> Self {
        CharSeq::Range { builder, start, end }
    }

    pub fn len(&self) -> usize {
        match self {
            CharSeq::Static(s) => s.chars().count(),
            CharSeq::Range { start, end, .. } => end - start,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CharSeq::Static(s) => s.is_empty(),
            CharSeq::Range { start, end, .. } => start == end,
        }
    }

    /// Returns the character at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfBounds`] if `index >= len`.
    pub fn get(&self, index: usize) -> Result<char, BufferError> {
        match *self {
            CharSeq::Static(s) => s.chars().nth(index).ok_or(BufferError::IndexOutOfBounds { index, len: self.len() }),
            CharSeq::Range { builder, start, end } => {
                ensure!(index < end - start, BufferError::IndexOutOfBounds { index, len: end - start });
                Ok(builder.char_at(start + index))
            }
        }
    }

    /// Returns the view over `[start, end)` of this sequence.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] unless `start <= end <= len`.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<CharSeq<'a>, BufferError> {
        let len = self.len();
        ensure!(start <= end && end <= len, BufferError::InvalidRange { start, end, len });

        match *self {
            CharSeq::Static(s) => {
                let byte_offset = |index: usize| s.char_indices().nth(index).map_or(s.len(), |(offset, _)| offset);
                Ok(CharSeq::Static(&s[byte_offset(start)..byte_offset(end)]))
            }
            CharSeq::Range { builder, start: base, .. } => Ok(CharSeq::range(builder, base + start, base + end)),
        }
    }

    pub fn chars(&self) -> Chars<'a> {
        match *self {
            CharSeq::Static(s) => Chars::Static(s.chars()),
            CharSeq::Range { builder, start, end } => Chars::Range { builder, index: start, end },
        }
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        let mut chars = self.chars();
        prefix.chars().all(|expected| chars.next() == Some(expected))
    }

    pub fn eq_ignore_ascii_case(&self, other: &str) -> bool {
        let mut other_chars = other.chars();
        for ch in self.chars() {
            match other_chars.next() {
                Some(o) if to_lower(o) == to_lower(ch) => {}
                _ => return false,
            }
        }
        other_chars.next().is_none()
    }

    pub fn starts_with_ignore_ascii_case(&self, prefix: &str) -> bool {
        let mut chars = self.chars();
        prefix.chars().all(|expected| chars.next().is_some_and(|ch| to_lower(ch) == to_lower(expected)))
    }

    /// See [`hash_lower_case`].
    pub fn hash_lower_case(&self) -> u32 {
        hash_lower_case(self.chars())
    }

    /// Parses the whole sequence as a hexadecimal number.
    ///
    /// Returns `None` on an empty sequence, a non hex digit or an overflow.
    pub fn parse_hex(&self) -> Option<u64> {
        self.parse_radix(16)
    }

    /// Parses the whole sequence as a decimal number.
    ///
    /// Returns `None` on an empty sequence, a non digit or an overflow.
    pub fn parse_decimal(&self) -> Option<u64> {
        self.parse_radix(10)
    }

    fn parse_radix(&self, radix: u32) -> Option<u64> {
        if self.is_empty() {
            return None;
        }

        self.chars().try_fold(0u64, |value, ch| {
            let digit = ch.to_digit(radix)?;
            value.checked_mul(u64::from(radix))?.checked_add(u64::from(digit))
        })
    }

    /// Returns the literal without copying, or renders the range.
    pub fn to_cow(&self) -> std::borrow::Cow<'a, str> {
        match *self {
            CharSeq::Static(s) => std::borrow::Cow::Borrowed(s),
            CharSeq::Range { builder, start, end } => std::borrow::Cow::Owned(builder.copy_range(start, end)),
        }
    }
}

impl fmt::Display for CharSeq<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharSeq::Static(s) => f.write_str(s),
            CharSeq::Range { .. } => self.chars().try_for_each(|ch| f.write_char(ch)),
        }
    }
}

impl fmt::Debug for CharSeq<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_cow())
    }
}

impl PartialEq for CharSeq<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.chars().eq(other.chars())
    }
}

impl Eq for CharSeq<'_> {}

impl PartialEq<str> for CharSeq<'_> {
    fn eq(&self, other: &str) -> bool {
        self.chars().eq(other.chars())
    }
}

impl PartialEq<&str> for CharSeq<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.chars().eq(other.chars())
    }
}

impl PartialEq<CharSeq<'_>> for &str {
    fn eq(&self, other: &CharSeq<'_>) -> bool {
        other == self
    }
}

/// Iterator over the characters of a [`CharSeq`].
#[derive(Debug, Clone)]
pub enum Chars<'a> {
    Static(str::Chars<'static>),
    Range { builder: &'a CharBufferBuilder, index: usize, end: usize },
}

impl Iterator for Chars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self {
            Chars::Static(chars) => chars.next(),
            Chars::Range { builder, index, end } => {
                if *index >= *end {
                    return None;
                }
                let ch = builder.char_at(*index);
                *index += 1;
                Some(ch)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Chars::Static(chars) => chars.size_hint(),
            Chars::Range { index, end, .. } => {
                let remaining = end.saturating_sub(*index);
                (remaining, Some(remaining))
            }
        }
    }
}

/// Where a message field lives: an interned literal or a range of the
/// message's own builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextRef {
    Static(&'static str),
    Range(usize, usize),
}

impl TextRef {
    pub(crate) fn resolve(self, builder: &CharBufferBuilder) -> CharSeq<'_> {
        match self {
            TextRef::Static(s) => CharSeq::Static(s),
            TextRef::Range(start, end) => builder.view(start, end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cio_sockets::pool::{CharChunkPolicy, LockFreePool};
    use std::sync::Arc;

    fn builder_of(text: &str) -> CharBufferBuilder {
        let pool = LockFreePool::<Vec<char>, _>::new(8, CharChunkPolicy::new(3)).unwrap();
        let mut builder = CharBufferBuilder::new(Arc::new(pool), 3);
        builder.append_str(text);
        builder
    }

    #[test]
    fn static_and_range_views_compare_equal() {
        let builder = builder_of("HTTP/1.1 200 OK");
        let range = builder.sub_sequence(0, 8).unwrap();

        assert_eq!(range, CharSeq::Static("HTTP/1.1"));
        assert_eq!(range, "HTTP/1.1");
        assert_eq!(range.to_string(), "HTTP/1.1");
        assert_eq!(format!("{range:?}"), "\"HTTP/1.1\"");
        assert_ne!(range, builder.sub_sequence(0, 7).unwrap());
    }

    #[test]
    fn nested_sub_sequences() {
        let builder = builder_of("Transfer-Encoding: chunked");
        let value = builder.sub_sequence(19, 26).unwrap();

        assert_eq!(value, "chunked");
        assert_eq!(value.sub_sequence(1, 4).unwrap(), "hun");
        assert_eq!(value.get(6).unwrap(), 'd');
        assert!(value.get(7).is_err());
        assert!(value.sub_sequence(3, 8).is_err());

        let literal = CharSeq::Static("h\u{e9}llo");
        assert_eq!(literal.len(), 5);
        assert_eq!(literal.sub_sequence(1, 3).unwrap(), "\u{e9}l");
    }

    #[test]
    fn case_insensitive_comparisons() {
        let builder = builder_of("Keep-Alive, Close");
        let all = builder.sub_sequence(0, builder.len()).unwrap();

        assert!(all.starts_with("Keep"));
        assert!(!all.starts_with("keep"));
        assert!(all.starts_with_ignore_ascii_case("keep-alive"));
        assert!(builder.sub_sequence(12, 17).unwrap().eq_ignore_ascii_case("CLOSE"));
        assert!(!builder.sub_sequence(12, 16).unwrap().eq_ignore_ascii_case("close"));
        assert_eq!(all.hash_lower_case(), hash_lower_case("keep-alive, close".chars()));
    }

    #[test]
    fn parse_numbers() {
        let builder = builder_of("1aF 123 xyz");

        assert_eq!(builder.sub_sequence(0, 3).unwrap().parse_hex(), Some(0x1af));
        assert_eq!(builder.sub_sequence(4, 7).unwrap().parse_decimal(), Some(123));
        assert_eq!(builder.sub_sequence(0, 3).unwrap().parse_decimal(), None);
        assert_eq!(builder.sub_sequence(8, 11).unwrap().parse_hex(), None);
        assert_eq!(builder.sub_sequence(3, 3).unwrap().parse_decimal(), None);
        assert_eq!(CharSeq::Static("ffffffffffffffffff").parse_hex(), None);
    }
}
