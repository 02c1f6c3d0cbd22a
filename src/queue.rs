//! Request queue (4.D): buffers outbound requests while no transport is
//! available.

use std::collections::VecDeque;
use std::time::Duration;

use lber::structures::Tag;

use crate::pending::{ExpectedCodes, Pending};

/// One buffered request, realizing the `QueueEntry` data-model entry.
pub struct QueueEntry {
    pub request: Tag,
    pub expected: ExpectedCodes,
    pub pending: Pending,
    pub controls: Vec<crate::controls::RawControl>,
    pub id_reply: Option<tokio::sync::oneshot::Sender<i32>>,
}

/// Bounded FIFO with an optional insertion timeout, armed on the
/// empty-to-non-empty transition per the documented contract (the
/// "second enqueue" quirk in the original source is not reproduced).
pub struct RequestQueue {
    entries: VecDeque<QueueEntry>,
    capacity: usize,
    frozen: bool,
    timeout: Option<Duration>,
}

impl RequestQueue {
    pub fn new(capacity: usize, frozen: bool, timeout: Option<Duration>) -> RequestQueue {
        RequestQueue {
            entries: VecDeque::new(),
            capacity,
            frozen,
            timeout,
        }
    }

    /// `true` if this call transitioned the queue from empty to
    /// non-empty, i.e. the caller should (re)arm the queue timer.
    pub fn enqueue(&mut self, entry: QueueEntry) -> std::result::Result<bool, QueueEntry> {
        if self.frozen || self.entries.len() >= self.capacity {
            return Err(entry);
        }
        let was_empty = self.entries.is_empty();
        self.entries.push_back(entry);
        Ok(was_empty)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drain every entry in FIFO order, calling `handler` on each.
    pub fn flush(&mut self, mut handler: impl FnMut(QueueEntry)) {
        while let Some(entry) = self.entries.pop_front() {
            handler(entry);
        }
    }

    /// Drain every entry, failing each with `QueueTimeout` (the queue's
    /// `purge()` per 4.D).
    pub fn purge(&mut self) {
        self.purge_with(|| crate::error::LdapError::QueueTimeout);
    }

    /// Drain every entry, failing each with whatever `err_factory`
    /// produces. Used where the caller needs a reason other than
    /// `QueueTimeout` (e.g. a destroyed client).
    pub fn purge_with(&mut self, err_factory: impl Fn() -> crate::error::LdapError) {
        self.freeze();
        self.flush(|entry| entry.pending.fail(err_factory()));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pending::EXPECT_SUCCESS;
    use lber::structures::Null;
    use tokio::sync::oneshot;

    fn dummy_entry() -> QueueEntry {
        let (tx, _rx) = oneshot::channel();
        QueueEntry {
            request: Tag::Null(Null::default()),
            expected: EXPECT_SUCCESS,
            pending: Pending::Single {
                expected: EXPECT_SUCCESS,
                reply: tx,
            },
            controls: Vec::new(),
            id_reply: None,
        }
    }

    #[test]
    fn enqueue_reports_empty_to_nonempty_transition() {
        let mut q = RequestQueue::new(10, false, None);
        assert_eq!(q.enqueue(dummy_entry()), Ok(true));
        assert_eq!(q.enqueue(dummy_entry()), Ok(false));
    }

    #[test]
    fn frozen_queue_rejects_enqueue() {
        let mut q = RequestQueue::new(10, true, None);
        assert!(q.enqueue(dummy_entry()).is_err());
    }

    #[test]
    fn capacity_limit_is_enforced() {
        let mut q = RequestQueue::new(1, false, None);
        assert!(q.enqueue(dummy_entry()).is_ok());
        assert!(q.enqueue(dummy_entry()).is_err());
    }

    #[test]
    fn flush_drains_in_fifo_order() {
        let mut q = RequestQueue::new(10, false, None);
        q.enqueue(dummy_entry()).unwrap();
        q.enqueue(dummy_entry()).unwrap();
        let mut count = 0;
        q.flush(|_| count += 1);
        assert_eq!(count, 2);
        assert!(q.is_empty());
    }
}
