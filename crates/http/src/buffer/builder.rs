use std::fmt;
use std::sync::Arc;

use cio_sockets::pool::ObjectPool;
use once_cell::sync::OnceCell;

use crate::buffer::{BufferError, CharSeq, to_lower};
use crate::ensure;

/// A growable character sequence spread over pooled fixed-size chunks.
///
/// Every chunk but the last one is full, so index `i` lives in chunk
/// `i / chunk_size` at offset `i % chunk_size`. Views returned by
/// [`sub_sequence`](Self::sub_sequence) borrow the builder and copy nothing.
///
/// The chunks go back to their pool on [`release`](Self::release) or drop.
pub struct CharBufferBuilder {
    pool: Arc<dyn ObjectPool<Vec<char>>>,
    chunk_size: usize,
    chunks: Vec<Box<Vec<char>>>,
    len: usize,
    rendered: OnceCell<String>,
}

impl CharBufferBuilder {
    pub fn new(pool: Arc<dyn ObjectPool<Vec<char>>>, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0, "chunk size should be positive");
        Self { pool, chunk_size, chunks: Vec::new(), len: 0, rendered: OnceCell::new() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn append_char(&mut self, ch: char) {
        self.writable_chunk().push(ch);
        self.len += 1;
        self.rendered.take();
    }

    pub fn append_str(&mut self, s: &str) {
        let mut chars = s.chars().peekable();
        while chars.peek().is_some() {
            let chunk_size = self.chunk_size;
            let chunk = self.writable_chunk();
            let before = chunk.len();
            chunk.extend(chars.by_ref().take(chunk_size - before));
            let appended = chunk.len() - before;
            self.len += appended;
        }
        self.rendered.take();
    }

    pub fn append_chars(&mut self, mut chars: &[char]) {
        while !chars.is_empty() {
            let chunk_size = self.chunk_size;
            let chunk = self.writable_chunk();
            let count = (chunk_size - chunk.len()).min(chars.len());
            chunk.extend_from_slice(&chars[..count]);
            chars = &chars[count..];
            self.len += count;
        }
        self.rendered.take();
    }

    /// Returns the character at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfBounds`] if `index >= len`.
    pub fn get(&self, index: usize) -> Result<char, BufferError> {
        ensure!(index < self.len, BufferError::IndexOutOfBounds { index, len: self.len });
        Ok(self.char_at(index))
    }

    /// Returns a view over `[start, end)` without copying.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] unless `start <= end <= len`.
    pub fn sub_sequence(&self, start: usize, end: usize) -> Result<CharSeq<'_>, BufferError> {
        ensure!(start <= end && end <= self.len, BufferError::InvalidRange { start, end, len: self.len });
        Ok(self.view(start, end))
    }

    /// The whole content, rendered once and cached until the next append.
    pub fn as_str(&self) -> &str {
        self.rendered.get_or_init(|| self.copy_range(0, self.len))
    }

    /// Copies `[start, end)` into a new string, walking the chunks the range
    /// intersects.
    pub fn copy_range(&self, start: usize, end: usize) -> String {
        debug_assert!(start <= end && end <= self.len);

        let mut copied = String::with_capacity(end - start);
        let mut base = start - start % self.chunk_size;
        while base < end {
            let chunk = &self.chunks[base / self.chunk_size];
            let from = start.saturating_sub(base);
            let to = (end - base).min(self.chunk_size);
            copied.extend(&chunk[from..to]);
            base += self.chunk_size;
        }
        copied
    }

    /// Hash of `[start, end)` with ASCII letters lowered, see [`hash_lower_case`](crate::buffer::hash_lower_case).
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] unless `start <= end <= len`.
    pub fn hash_lower_case(&self, start: usize, end: usize) -> Result<u32, BufferError> {
        Ok(self.sub_sequence(start, end)?.hash_lower_case())
    }

    /// Compares `[start, end)` with `other`, ignoring ASCII case.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::InvalidRange`] unless `start <= end <= len`.
    pub fn equals_lower_case(&self, start: usize, end: usize, other: &str) -> Result<bool, BufferError> {
        Ok(self.sub_sequence(start, end)?.eq_ignore_ascii_case(other))
    }

    /// Gives every chunk back to the pool and empties the builder.
    pub fn release(&mut self) {
        for chunk in self.chunks.drain(..) {
            self.pool.recycle(chunk);
        }
        self.len = 0;
        self.rendered.take();
    }

    /// A view over a range the caller already knows to be valid.
    #[inline]
    pub(crate) fn view(&self, start: usize, end: usize) -> CharSeq<'_> {
        debug_assert!(start <= end && end <= self.len);
        CharSeq::range(self, start, end)
    }

    #[inline]
    pub(crate) fn char_at(&self, index: usize) -> char {
        self.chunks[index / self.chunk_size][index % self.chunk_size]
    }

    #[inline]
    pub(crate) fn lower_at(&self, index: usize) -> char {
        to_lower(self.char_at(index))
    }

    fn writable_chunk(&mut self) -> &mut Vec<char> {
        if self.chunks.last().is_none_or(|chunk| chunk.len() >= self.chunk_size) {
            let chunk = self.pool.borrow();
            self.chunks.push(chunk);
        }

        let last = self.chunks.len() - 1;
        &mut self.chunks[last]
    }
}

impl Drop for CharBufferBuilder {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Display for CharBufferBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CharBufferBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CharBufferBuilder").field("len", &self.len).field("chunks", &self.chunks.len()).finish_non_exhaustive()
    }
}
