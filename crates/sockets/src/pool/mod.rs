//! Bounded, lock-free pools of reusable instances.
//!
//! Pools recycle fixed-shape resources (byte chunks, character chunks, index
//! arrays) so the hot path of a connection does not allocate per message.
//!
//! # Components
//!
//! - [`ObjectPool`]: the borrow / recycle contract shared by every pool
//! - [`PoolPolicy`]: how instances of one kind are produced, cleared, validated and destroyed
//! - [`LockFreePool`]: the lock-free implementation used for all kinds
//! - [`CharChunkPolicy`], [`ByteChunkPolicy`], [`IntArrayPolicy`]: the buffer kinds used by the HTTP engine
//!
//! Pools are plain values: construct one per buffer kind at startup and share
//! it through an `Arc`. Nothing in this module is a process-wide global.

mod lock_free_pool;
mod policy;

pub use lock_free_pool::LockFreePool;
pub use lock_free_pool::MAX_CAPACITY;
pub use policy::ByteChunkPolicy;
pub use policy::CharChunkPolicy;
pub use policy::IntArrayPolicy;
pub use policy::PoolPolicy;

/// A bounded pool of reusable instances.
///
/// Instances travel as `Box<T>` so the pool can identify them by address and
/// the borrower owns the instance exclusively until it is recycled.
pub trait ObjectPool<T>: Send + Sync {
    /// The number of idle instances the pool aims to keep at most.
    fn capacity(&self) -> usize;

    /// Returns a cleared instance, recycled if one is available, freshly
    /// produced otherwise. Never blocks and never fails.
    fn borrow(&self) -> Box<T>;

    /// Gives an instance back. The instance is either kept for a later
    /// [`borrow`](ObjectPool::borrow) or destroyed when no slot is free.
    fn recycle(&self, instance: Box<T>);

    /// Destroys every idle instance currently held by the pool.
    fn dispose(&self);
}
