use mio::Interest;
use mio::event::Event;

/// The kinds of readiness a socket operation can suspend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectInterest {
    Read,
    Write,
    Accept,
    Connect,
}

impl SelectInterest {
    pub const ALL: [SelectInterest; 4] = [SelectInterest::Read, SelectInterest::Write, SelectInterest::Accept, SelectInterest::Connect];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    const fn flag(self) -> u8 {
        1 << (self as u8)
    }
}

/// A bitmask of [`SelectInterest`]s.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterestSet(u8);

impl InterestSet {
    pub const EMPTY: InterestSet = InterestSet(0);

    #[inline]
    pub fn contains(self, interest: SelectInterest) -> bool {
        self.0 & interest.flag() != 0
    }

    #[inline]
    pub fn insert(&mut self, interest: SelectInterest) {
        self.0 |= interest.flag();
    }

    #[inline]
    pub fn remove(&mut self, interest: SelectInterest) {
        self.0 &= !interest.flag();
    }

    #[inline]
    pub fn remove_all(&mut self, other: InterestSet) {
        self.0 &= !other.0;
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = SelectInterest> {
        SelectInterest::ALL.into_iter().filter(move |interest| self.contains(*interest))
    }

    /// The mio registration mirroring this mask, `None` when the mask is empty.
    ///
    /// Read and accept readiness are both reported by mio as readable, write
    /// and connect readiness as writable.
    pub(crate) fn to_mio(self) -> Option<Interest> {
        let readable = self.contains(SelectInterest::Read) || self.contains(SelectInterest::Accept);
        let writable = self.contains(SelectInterest::Write) || self.contains(SelectInterest::Connect);

        match (readable, writable) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }

    /// The interests a mio event makes ready.
    ///
    /// Errors and half-closes wake both directions so the suspended operation
    /// retries and observes the failure from the socket itself.
    pub(crate) fn from_event(event: &Event) -> Self {
        let mut ready = InterestSet::EMPTY;
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            ready.insert(SelectInterest::Read);
            ready.insert(SelectInterest::Accept);
        }
        if event.is_writable() || event.is_write_closed() || event.is_error() {
            ready.insert(SelectInterest::Write);
            ready.insert(SelectInterest::Connect);
        }
        ready
    }
}

impl From<SelectInterest> for InterestSet {
    fn from(interest: SelectInterest) -> Self {
        InterestSet(interest.flag())
    }
}
