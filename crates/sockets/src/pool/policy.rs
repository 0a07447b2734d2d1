use bytes::BytesMut;

/// Describes the life cycle of one kind of pooled instance.
pub trait PoolPolicy<T>: Send + Sync {
    /// Creates a brand new instance, used when the pool is empty.
    fn produce(&self) -> Box<T>;

    /// Resets a recycled instance before it is handed out again.
    fn clear(&self, _instance: &mut T) {}

    /// Checks that a recycled instance has the shape this pool hands out.
    fn validate(&self, _instance: &T) -> bool {
        true
    }

    /// Destroys an instance the pool will not keep.
    fn destroy(&self, instance: Box<T>) {
        drop(instance);
    }
}

/// Fixed-size character chunks backing the char buffer builder.
#[derive(Debug, Clone, Copy)]
pub struct CharChunkPolicy {
    chunk_size: usize,
}

impl CharChunkPolicy {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl PoolPolicy<Vec<char>> for CharChunkPolicy {
    fn produce(&self) -> Box<Vec<char>> {
        Box::new(Vec::with_capacity(self.chunk_size))
    }

    fn clear(&self, instance: &mut Vec<char>) {
        instance.clear();
    }

    fn validate(&self, instance: &Vec<char>) -> bool {
        instance.capacity() >= self.chunk_size
    }
}

/// Fixed-capacity byte chunks used for socket reads and body copies.
#[derive(Debug, Clone, Copy)]
pub struct ByteChunkPolicy {
    chunk_size: usize,
}

impl ByteChunkPolicy {
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl PoolPolicy<BytesMut> for ByteChunkPolicy {
    fn produce(&self) -> Box<BytesMut> {
        Box::new(BytesMut::with_capacity(self.chunk_size))
    }

    fn clear(&self, instance: &mut BytesMut) {
        instance.clear();
    }

    fn validate(&self, instance: &BytesMut) -> bool {
        // a chunk that was split or frozen elsewhere comes back smaller
        instance.capacity() >= self.chunk_size
    }
}

/// Zero-filled index arrays of a fixed length, used by header tables.
#[derive(Debug, Clone, Copy)]
pub struct IntArrayPolicy {
    len: usize,
}

impl IntArrayPolicy {
    pub fn new(len: usize) -> Self {
        Self { len }
    }

    pub fn array_len(&self) -> usize {
        self.len
    }
}

impl PoolPolicy<Vec<u32>> for IntArrayPolicy {
    fn produce(&self) -> Box<Vec<u32>> {
        Box::new(vec![0; self.len])
    }

    fn clear(&self, instance: &mut Vec<u32>) {
        instance.fill(0);
    }

    fn validate(&self, instance: &Vec<u32>) -> bool {
        instance.len() == self.len
    }
}
