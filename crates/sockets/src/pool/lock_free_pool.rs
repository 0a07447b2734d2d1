//! Lock-free bounded pool implementation.
//!
//! Idle instances live in a slot table addressed by a hash of the instance
//! address. Occupied slots are chained into an intrusive stack through the
//! `next` index array, and the stack top is a single 64-bit word holding
//! `version << 32 | index` so that compare-and-swap on it is immune to ABA.
//!
//! A push tries at most [`SLOT_ATTEMPTS`] slots before giving up and destroying
//! the instance. This bounds the cost of a recycle under contention at the
//! price of sometimes dropping an instance while the pool is not full yet.

use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU32, AtomicU64, Ordering};

use tracing::warn;

use crate::error::PoolError;
use crate::pool::{ObjectPool, PoolPolicy};

const MULTIPLIER: usize = 4;

/// Number of slots tried by a single push.
const SLOT_ATTEMPTS: usize = 8;

/// Fractional part of the golden ratio, the Fibonacci hashing multiplier.
const MAGIC: u32 = 0x9E37_79B9;

const INDEX_MASK: u64 = 0xffff_ffff;

/// Largest capacity a pool accepts.
pub const MAX_CAPACITY: usize = (i32::MAX as usize) / MULTIPLIER;

/// A bounded lock-free pool.
///
/// # Type Parameters
///
/// * `T`: The pooled instance type
/// * `P`: The [`PoolPolicy`] producing, clearing and validating instances
pub struct LockFreePool<T, P> {
    capacity: usize,
    policy: P,

    top: AtomicU64,

    // power of two, slot 0 is reserved to mean "none"
    max_index: usize,
    shift: u32,
    instances: Box<[AtomicPtr<T>]>,
    next: Box<[AtomicU32]>,

    _marker: PhantomData<Box<T>>,
}

impl<T, P> std::fmt::Debug for LockFreePool<T, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockFreePool").field("capacity", &self.capacity).field("slots", &self.max_index).finish_non_exhaustive()
    }
}

impl<T, P> LockFreePool<T, P>
where
    P: PoolPolicy<T>,
{
    /// Creates a pool keeping at most `capacity` idle instances.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if `capacity` is zero or larger than [`MAX_CAPACITY`].
    pub fn new(capacity: usize, policy: P) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity { capacity });
        }
        if capacity > MAX_CAPACITY {
            return Err(PoolError::TooLargeCapacity { capacity, max: MAX_CAPACITY });
        }

        let max_index = (capacity * MULTIPLIER).next_power_of_two();
        #[allow(clippy::cast_possible_truncation, reason = "max_index is bounded by MAX_CAPACITY * MULTIPLIER")]
        let shift = (max_index as u32).leading_zeros() + 1;

        let instances = (0..=max_index).map(|_| AtomicPtr::new(ptr::null_mut())).collect();
        let next = (0..=max_index).map(|_| AtomicU32::new(0)).collect();

        Ok(Self { capacity, policy, top: AtomicU64::new(0), max_index, shift, instances, next, _marker: PhantomData })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    fn try_push(&self, instance: Box<T>) -> Result<(), Box<T>> {
        let raw = Box::into_raw(instance);
        let mut index = self.slot_index(raw);

        for _ in 0..SLOT_ATTEMPTS {
            if self.instances[index].compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                self.push_top(index);
                return Ok(());
            }

            index -= 1;
            if index == 0 {
                index = self.max_index;
            }
        }

        // SAFETY: `raw` comes from `Box::into_raw` above and no slot published it.
        Err(unsafe { Box::from_raw(raw) })
    }

    fn try_pop(&self) -> Option<Box<T>> {
        let index = self.pop_top()?;
        let raw = self.instances[index].swap(ptr::null_mut(), Ordering::AcqRel);
        if raw.is_null() {
            return None;
        }

        // SAFETY: the slot held a pointer produced by `Box::into_raw` in `try_push`,
        // and the swap above made this thread its only owner.
        Some(unsafe { Box::from_raw(raw) })
    }

    fn push_top(&self, index: usize) {
        debug_assert!(index > 0 && index <= self.max_index);
        loop {
            let top = self.top.load(Ordering::Acquire);
            let version = ((top >> 32) + 1) & INDEX_MASK;
            #[allow(clippy::cast_possible_truncation, reason = "low half of top is a slot index")]
            let top_index = (top & INDEX_MASK) as u32;
            let new_top = (version << 32) | index as u64;

            self.next[index].store(top_index, Ordering::Relaxed);
            if self.top.compare_exchange_weak(top, new_top, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                return;
            }
        }
    }

    fn pop_top(&self) -> Option<usize> {
        loop {
            let top = self.top.load(Ordering::Acquire);
            if top == 0 {
                return None;
            }

            #[allow(clippy::cast_possible_truncation, reason = "low half of top is a slot index")]
            let top_index = (top & INDEX_MASK) as usize;
            if top_index == 0 {
                return None;
            }

            let version = ((top >> 32) + 1) & INDEX_MASK;
            let next = u64::from(self.next[top_index].load(Ordering::Relaxed));
            let new_top = (version << 32) | next;
            if self.top.compare_exchange_weak(top, new_top, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
                return Some(top_index);
            }
        }
    }

    fn slot_index(&self, raw: *const T) -> usize {
        #[allow(clippy::cast_possible_truncation, reason = "only the low bits of the address feed the hash")]
        let identity = raw.addr() as u32;
        (identity.wrapping_mul(MAGIC) >> self.shift) as usize + 1
    }
}

impl<T, P> ObjectPool<T> for LockFreePool<T, P>
where
    T: Send + Sync,
    P: PoolPolicy<T>,
{
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn borrow(&self) -> Box<T> {
        match self.try_pop() {
            Some(mut instance) => {
                self.policy.clear(&mut instance);
                instance
            }
            None => self.policy.produce(),
        }
    }

    fn recycle(&self, instance: Box<T>) {
        if !self.policy.validate(&instance) {
            warn!("recycled instance does not match the pool shape, destroying it");
            self.policy.destroy(instance);
            return;
        }

        if let Err(instance) = self.try_push(instance) {
            self.policy.destroy(instance);
        }
    }

    fn dispose(&self) {
        while let Some(instance) = self.try_pop() {
            self.policy.destroy(instance);
        }
    }
}

impl<T, P> Drop for LockFreePool<T, P> {
    fn drop(&mut self) {
        for slot in &*self.instances {
            let raw = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !raw.is_null() {
                // SAFETY: every non-null slot owns a pointer from `Box::into_raw`, and
                // `&mut self` guarantees no concurrent borrower.
                drop(unsafe { Box::from_raw(raw) });
            }
        }
    }
}
