//! The readiness reactor.
//!
//! A [`SelectorManager`] owns one OS readiness poller (epoll / kqueue through
//! `mio`) and a dedicated thread blocking on it. Sockets own a [`Selectable`]
//! holding their interest mask and one waiter slot per interest kind.
//!
//! # Flow
//!
//! 1. A socket operation hits `WouldBlock`
//! 2. It polls [`Selectable::poll_ready`], which stores the task waker and pushes
//!    the interest through [`SelectorHandle::select`]
//! 3. The reactor thread observes readiness and runs the selectable callback,
//!    waking the task exactly once
//! 4. The task retries the operation
//!
//! Closing a socket ([`SelectorHandle::notify_closed`]) or the manager resumes
//! every suspended operation with a failure instead of leaving it hanging.

mod interest;
mod manager;
mod selectable;

pub use interest::InterestSet;
pub use interest::SelectInterest;
pub use manager::SelectorConfig;
pub use manager::SelectorHandle;
pub use manager::SelectorManager;
pub use selectable::Selectable;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SelectError;
    use std::net::TcpListener as StdTcpListener;
    use std::os::fd::AsRawFd;
    use std::time::Duration;

    fn listener() -> StdTcpListener {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        listener
    }

    #[tokio::test]
    async fn accept_readiness_wakes_waiter() {
        let selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        let listener = listener();
        let address = listener.local_addr().unwrap();
        let selectable = handle.selectable(listener.as_raw_fd());

        let waiter = {
            let selectable = selectable.clone();
            let handle = handle.clone();
            tokio::spawn(async move { selectable.ready(&handle, SelectInterest::Accept).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _client = std::net::TcpStream::connect(address).unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap().unwrap();
        // fired interests are dropped from the mask
        assert!(!selectable.interest().contains(SelectInterest::Accept));

        handle.notify_closed(&selectable);
    }

    #[tokio::test]
    async fn notify_closed_resumes_waiter() {
        let selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        let listener = listener();
        let selectable = handle.selectable(listener.as_raw_fd());

        let waiter = {
            let selectable = selectable.clone();
            let handle = handle.clone();
            tokio::spawn(async move { selectable.ready(&handle, SelectInterest::Accept).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.notify_closed(&selectable);

        let error = tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap().unwrap_err();
        assert_eq!(SelectError::from_io(&error), Some(&SelectError::Closed));
    }

    #[test]
    fn notify_closed_on_unregistered_is_safe() {
        let selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        let listener = listener();
        let selectable = handle.selectable(listener.as_raw_fd());

        handle.notify_closed(&selectable);
        handle.notify_closed(&selectable);
        assert_eq!(selectable.failure(), Some(SelectError::Closed));
    }

    #[tokio::test]
    async fn shutdown_cancels_waiters() {
        let mut selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        let listener = listener();
        let selectable = handle.selectable(listener.as_raw_fd());

        let waiter = {
            let selectable = selectable.clone();
            let handle = handle.clone();
            tokio::spawn(async move { selectable.ready(&handle, SelectInterest::Accept).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        selector.close();
        assert!(selector.is_closed());

        let error = tokio::time::timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap().unwrap_err();
        assert_eq!(SelectError::from_io(&error), Some(&SelectError::Cancelled));

        let late = handle.selectable(listener.as_raw_fd());
        assert_eq!(handle.select(&late, SelectInterest::Read), Err(SelectError::Cancelled));
    }

    #[test]
    fn registration_failure_is_reported() {
        let selector = SelectorManager::new().unwrap();
        let handle = selector.handle();
        // not an open descriptor
        let selectable = handle.selectable(-1);

        let result = handle.select(&selectable, SelectInterest::Read);
        assert!(matches!(result, Err(SelectError::Registration { .. })));
        assert!(matches!(selectable.failure(), Some(SelectError::Registration { .. })));
    }
}
