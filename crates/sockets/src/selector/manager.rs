use std::collections::HashMap;
use std::io;
use std::os::fd::RawFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};

use mio::unix::SourceFd;
use mio::{Events, Poll, Registry, Token, Waker};
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::error::SelectError;
use crate::selector::{InterestSet, SelectInterest, Selectable};

const WAKE_TOKEN: Token = Token(0);

/// Configuration of a [`SelectorManager`].
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Capacity of the event buffer filled by one poll.
    pub events_capacity: usize,
    /// Name of the reactor thread.
    pub thread_name: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { events_capacity: 1024, thread_name: "cio-selector".to_string() }
    }
}

#[derive(Debug)]
struct Inner {
    registry: Registry,
    waker: Waker,
    registrations: Mutex<HashMap<Token, Arc<Selectable>>>,
    next_token: AtomicUsize,
    closed: AtomicBool,
}

/// Owns one OS readiness poller and the reactor thread driving it.
///
/// Sockets do not own the manager, they keep a [`SelectorHandle`]. Dropping
/// the manager shuts the reactor down and resumes every suspended operation
/// with [`SelectError::Cancelled`].
#[derive(Debug)]
pub struct SelectorManager {
    handle: SelectorHandle,
    thread: Option<JoinHandle<()>>,
}

/// A cheap, cloneable reference to a running selector.
#[derive(Debug, Clone)]
pub struct SelectorHandle {
    inner: Arc<Inner>,
}

impl SelectorManager {
    /// Starts a selector with the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS poller or the reactor thread can't be created.
    pub fn new() -> io::Result<Self> {
        Self::with_config(SelectorConfig::default())
    }

    /// Starts a selector with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS poller or the reactor thread can't be created.
    pub fn with_config(config: SelectorConfig) -> io::Result<Self> {
        let poll = Poll::new()?;
        let registry = poll.registry().try_clone()?;
        let waker = Waker::new(poll.registry(), WAKE_TOKEN)?;

        let inner = Arc::new(Inner {
            registry,
            waker,
            registrations: Mutex::new(HashMap::new()),
            next_token: AtomicUsize::new(WAKE_TOKEN.0 + 1),
            closed: AtomicBool::new(false),
        });

        let loop_inner = Arc::clone(&inner);
        let events_capacity = config.events_capacity;
        let thread = thread::Builder::new().name(config.thread_name).spawn(move || run_loop(poll, &loop_inner, events_capacity))?;

        Ok(Self { handle: SelectorHandle { inner }, thread: Some(thread) })
    }

    pub fn handle(&self) -> SelectorHandle {
        self.handle.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Stops the reactor and waits for its thread to finish.
    ///
    /// Every operation still suspended on a registered socket is resumed with
    /// [`SelectError::Cancelled`]. Calling it more than once is a no-op.
    pub fn close(&mut self) {
        self.handle.inner.closed.store(true, Ordering::Release);
        if let Err(e) = self.handle.inner.waker.wake() {
            error!(cause = %e, "failed to wake selector for shutdown");
        }

        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                error!("selector thread panicked");
            }
        }
    }
}

impl Drop for SelectorManager {
    fn drop(&mut self) {
        self.close();
    }
}

impl SelectorHandle {
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Creates the reactor-side state for a socket file descriptor.
    ///
    /// Nothing is registered with the OS until the first [`select`](Self::select).
    pub fn selectable(&self, fd: RawFd) -> Arc<Selectable> {
        let token = Token(self.inner.next_token.fetch_add(1, Ordering::Relaxed));
        Arc::new(Selectable::new(fd, token))
    }

    /// Adds `interest` to the selectable's mask and mirrors the mask into the
    /// OS poller, registering the selectable on first use.
    ///
    /// On a registration failure every pending operation of the selectable is
    /// resumed with the failure before it is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SelectError::Cancelled`] if the selector is closed and
    /// [`SelectError::Registration`] if the OS rejected the registration.
    pub fn select(&self, selectable: &Arc<Selectable>, interest: SelectInterest) -> Result<(), SelectError> {
        if self.is_closed() {
            return Err(SelectError::Cancelled);
        }

        let mut registration = selectable.registration.lock();
        registration.interest.insert(interest);
        let Some(mio_interest) = registration.interest.to_mio() else {
            return Ok(());
        };

        let fd = selectable.fd();
        let result = if registration.registered {
            self.inner.registry.reregister(&mut SourceFd(&fd), selectable.token(), mio_interest)
        } else {
            // visible to the reactor before the first event can be delivered
            self.inner.registrations.lock().insert(selectable.token(), Arc::clone(selectable));
            self.inner.registry.register(&mut SourceFd(&fd), selectable.token(), mio_interest)
        };

        match result {
            Ok(()) => {
                registration.registered = true;
                drop(registration);

                // the reactor may have drained the registrations concurrently
                if self.is_closed() {
                    self.inner.registrations.lock().remove(&selectable.token());
                    selectable.on_selection_failed(SelectError::Cancelled);
                    return Err(SelectError::Cancelled);
                }

                trace!(token = selectable.token().0, ?interest, "interest pushed");
                Ok(())
            }
            Err(e) => {
                let was_registered = registration.registered;
                drop(registration);
                if !was_registered {
                    self.inner.registrations.lock().remove(&selectable.token());
                }

                error!(token = selectable.token().0, cause = %e, "selector registration failed");
                let failure = SelectError::registration(&e);
                selectable.on_selection_failed(failure.clone());
                Err(failure)
            }
        }
    }

    /// Deregisters a closed socket and resumes its pending operations with
    /// [`SelectError::Closed`]. Safe to call for a socket that was never
    /// registered.
    pub fn notify_closed(&self, selectable: &Selectable) {
        let was_registered = {
            let mut registration = selectable.registration.lock();
            let was_registered = registration.registered;
            registration.registered = false;
            registration.interest = InterestSet::EMPTY;
            was_registered
        };

        if was_registered {
            self.inner.registrations.lock().remove(&selectable.token());
            let fd = selectable.fd();
            if let Err(e) = self.inner.registry.deregister(&mut SourceFd(&fd)) {
                trace!(token = selectable.token().0, cause = %e, "deregister closed selectable failed");
            }
        }

        selectable.on_selection_failed(SelectError::Closed);
    }
}

fn run_loop(mut poll: Poll, inner: &Inner, events_capacity: usize) {
    let mut events = Events::with_capacity(events_capacity);
    debug!("selector loop started");

    while !inner.closed.load(Ordering::Acquire) {
        if let Err(e) = poll.poll(&mut events, None) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            error!(cause = %e, "selector poll failed, stopping selector");
            break;
        }

        for event in &events {
            if event.token() == WAKE_TOKEN {
                continue;
            }

            let selectable = inner.registrations.lock().get(&event.token()).cloned();
            match selectable {
                Some(selectable) => selectable.on_selected(InterestSet::from_event(event)),
                None => trace!(token = event.token().0, "event for unregistered selectable"),
            }
        }
    }

    inner.closed.store(true, Ordering::Release);

    let cancelled: Vec<_> = inner.registrations.lock().drain().map(|(_, selectable)| selectable).collect();
    for selectable in cancelled {
        selectable.on_selection_failed(SelectError::Cancelled);
    }

    debug!("selector loop stopped");
}
