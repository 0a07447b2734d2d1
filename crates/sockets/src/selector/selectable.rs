use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use mio::Token;
use parking_lot::Mutex;
use tracing::trace;

use crate::error::SelectError;
use crate::selector::{InterestSet, SelectInterest, SelectorHandle};

/// One pending waiter per interest kind.
#[derive(Debug, Default)]
struct InterestSlot {
    waker: AtomicWaker,
    // the interest is pushed to the reactor and not fired yet
    armed: AtomicBool,
    // the reactor fired the interest and nobody consumed it yet
    fired: AtomicBool,
}

#[derive(Debug, Default)]
pub(crate) struct Registration {
    pub(crate) interest: InterestSet,
    pub(crate) registered: bool,
}

/// The reactor-facing state of a socket.
///
/// Holds the interest mask mirrored into the OS poller, a typed slot per
/// interest kind and the failure, if any, every pending operation is resumed
/// with. The mask is only mutated by the owning socket through
/// [`SelectorHandle::select`] and by the reactor callback.
#[derive(Debug)]
pub struct Selectable {
    fd: RawFd,
    token: Token,
    pub(crate) registration: Mutex<Registration>,
    slots: [InterestSlot; 4],
    failure: Mutex<Option<SelectError>>,
}

impl Selectable {
    pub(crate) fn new(fd: RawFd, token: Token) -> Self {
        Self {
            fd,
            token,
            registration: Mutex::new(Registration::default()),
            slots: Default::default(),
            failure: Mutex::new(None),
        }
    }

    #[inline]
    pub(crate) fn fd(&self) -> RawFd {
        self.fd
    }

    #[inline]
    pub(crate) fn token(&self) -> Token {
        self.token
    }

    /// Returns the current interest mask.
    pub fn interest(&self) -> InterestSet {
        self.registration.lock().interest
    }

    pub fn failure(&self) -> Option<SelectError> {
        self.failure.lock().clone()
    }

    /// Polls until the reactor observed readiness for `interest`.
    ///
    /// The first pending poll arms the interest: it stores the waker in the
    /// interest slot and pushes the interest to the selector. The poll resolves
    /// once the reactor fired the slot, or fails once the socket or the selector
    /// was closed.
    pub fn poll_ready(self: &Arc<Self>, cx: &mut Context<'_>, selector: &SelectorHandle, interest: SelectInterest) -> Poll<io::Result<()>> {
        if let Some(failure) = self.failure() {
            return Poll::Ready(Err(failure.into()));
        }

        let slot = &self.slots[interest.index()];
        if slot.fired.swap(false, Ordering::AcqRel) {
            return Poll::Ready(Ok(()));
        }

        slot.waker.register(cx.waker());

        if !slot.armed.swap(true, Ordering::AcqRel) {
            if let Err(e) = selector.select(self, interest) {
                slot.armed.store(false, Ordering::Release);
                return Poll::Ready(Err(e.into()));
            }
        }

        // the failure or the readiness may have landed while arming
        if let Some(failure) = self.failure() {
            return Poll::Ready(Err(failure.into()));
        }
        if slot.fired.swap(false, Ordering::AcqRel) {
            return Poll::Ready(Ok(()));
        }

        Poll::Pending
    }

    /// Waits until the reactor observed readiness for `interest`.
    pub async fn ready(self: &Arc<Self>, selector: &SelectorHandle, interest: SelectInterest) -> io::Result<()> {
        std::future::poll_fn(|cx| self.poll_ready(cx, selector, interest)).await
    }

    /// Reactor callback: wakes every armed slot whose interest became ready.
    pub(crate) fn on_selected(&self, ready: InterestSet) {
        let mut fired = InterestSet::EMPTY;

        for interest in ready.iter() {
            let slot = &self.slots[interest.index()];
            if slot.armed.swap(false, Ordering::AcqRel) {
                slot.fired.store(true, Ordering::Release);
                slot.waker.wake();
                fired.insert(interest);
            }
        }

        if !fired.is_empty() {
            trace!(token = self.token.0, ?fired, "selectable fired");
            self.registration.lock().interest.remove_all(fired);
        }
    }

    /// Resumes every pending operation with `failure`.
    ///
    /// The first failure wins: a socket closed after its selector was shut
    /// down keeps reporting the cancellation.
    pub(crate) fn on_selection_failed(&self, failure: SelectError) {
        {
            let mut current = self.failure.lock();
            if current.is_none() {
                *current = Some(failure);
            }
        }

        self.registration.lock().interest = InterestSet::EMPTY;

        for slot in &self.slots {
            slot.armed.store(false, Ordering::Release);
            slot.waker.wake();
        }
    }
}
