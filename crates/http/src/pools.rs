//! The pools shared by every connection of a server.
//!
//! Nothing here is global: build one [`HttpPools`] at startup and hand clones
//! of it to the connections.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use bytes::BytesMut;
use cio_sockets::PoolError;
use cio_sockets::pool::{ByteChunkPolicy, CharChunkPolicy, IntArrayPolicy, LockFreePool, ObjectPool};

use crate::buffer::CharBufferBuilder;
use crate::protocol::{EXPECTED_HEADERS_QTY, HEADER_SIZE};

/// Sizes of the pools built by [`HttpPools::new`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Characters per chunk of a [`CharBufferBuilder`].
    pub char_chunk_size: usize,
    pub char_chunk_pool_size: usize,
    /// Bytes per scratch chunk used for line reads and body copies.
    pub byte_chunk_size: usize,
    pub byte_chunk_pool_size: usize,
    pub header_array_pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            char_chunk_size: 4096,
            char_chunk_pool_size: 4096,
            byte_chunk_size: 4096,
            byte_chunk_pool_size: 4096,
            header_array_pool_size: 1000,
        }
    }
}

/// Character chunks, byte chunks and header index arrays.
#[derive(Clone)]
pub struct HttpPools {
    char_chunks: Arc<dyn ObjectPool<Vec<char>>>,
    char_chunk_size: usize,
    byte_chunks: Arc<dyn ObjectPool<BytesMut>>,
    header_arrays: Arc<dyn ObjectPool<Vec<u32>>>,
}

impl fmt::Debug for HttpPools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPools")
            .field("char_chunks", &self.char_chunks.capacity())
            .field("char_chunk_size", &self.char_chunk_size)
            .field("byte_chunks", &self.byte_chunks.capacity())
            .field("header_arrays", &self.header_arrays.capacity())
            .finish()
    }
}

impl HttpPools {
    /// Builds the pools described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if a pool size or a chunk size is zero or too large.
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        if config.char_chunk_size == 0 {
            return Err(PoolError::ZeroCapacity { capacity: config.char_chunk_size });
        }

        let char_chunks = LockFreePool::<Vec<char>, _>::new(config.char_chunk_pool_size, CharChunkPolicy::new(config.char_chunk_size))?;
        let byte_chunks = LockFreePool::<BytesMut, _>::new(config.byte_chunk_pool_size, ByteChunkPolicy::new(config.byte_chunk_size))?;
        let header_arrays = LockFreePool::<Vec<u32>, _>::new(config.header_array_pool_size, IntArrayPolicy::new(EXPECTED_HEADERS_QTY * HEADER_SIZE))?;

        Ok(Self {
            char_chunks: Arc::new(char_chunks),
            char_chunk_size: config.char_chunk_size,
            byte_chunks: Arc::new(byte_chunks),
            header_arrays: Arc::new(header_arrays),
        })
    }

    pub fn char_chunks(&self) -> &Arc<dyn ObjectPool<Vec<char>>> {
        &self.char_chunks
    }

    pub fn char_chunk_size(&self) -> usize {
        self.char_chunk_size
    }

    pub fn byte_chunks(&self) -> &Arc<dyn ObjectPool<BytesMut>> {
        &self.byte_chunks
    }

    pub fn header_arrays(&self) -> &Arc<dyn ObjectPool<Vec<u32>>> {
        &self.header_arrays
    }

    /// A fresh, empty builder backed by the character chunk pool.
    pub fn char_buffer(&self) -> CharBufferBuilder {
        CharBufferBuilder::new(Arc::clone(&self.char_chunks), self.char_chunk_size)
    }

    /// Borrows a scratch byte chunk, recycled when the guard is dropped.
    pub fn byte_buffer(&self) -> PooledBytes {
        PooledBytes { buf: ManuallyDrop::new(self.byte_chunks.borrow()), pool: Arc::clone(&self.byte_chunks) }
    }

    /// Destroys every idle instance of every pool.
    pub fn dispose(&self) {
        self.char_chunks.dispose();
        self.byte_chunks.dispose();
        self.header_arrays.dispose();
    }
}

/// A byte chunk borrowed from a pool, given back on drop.
pub struct PooledBytes {
    buf: ManuallyDrop<Box<BytesMut>>,
    pool: Arc<dyn ObjectPool<BytesMut>>,
}

impl fmt::Debug for PooledBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBytes").field("len", &self.len()).finish_non_exhaustive()
    }
}

impl Deref for PooledBytes {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}

impl DerefMut for PooledBytes {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Drop for PooledBytes {
    fn drop(&mut self) {
        // SAFETY: `buf` is never touched again after drop.
        let buf = unsafe { ManuallyDrop::take(&mut self.buf) };
        self.pool.recycle(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reject_zero_sizes() {
        let config = PoolConfig { char_chunk_pool_size: 0, ..PoolConfig::default() };
        assert!(HttpPools::new(&config).is_err());

        let config = PoolConfig { char_chunk_size: 0, ..PoolConfig::default() };
        assert!(HttpPools::new(&config).is_err());
    }

    #[test]
    fn pooled_bytes_are_recycled() {
        let pools = HttpPools::new(&PoolConfig::default()).unwrap();

        let address = {
            let mut bytes = pools.byte_buffer();
            bytes.extend_from_slice(b"scratch");
            bytes.as_ptr()
        };

        let bytes = pools.byte_buffer();
        assert!(bytes.is_empty());
        assert_eq!(bytes.as_ptr(), address);
    }
}
