//! Request table (4.C): `messageID` → continuation.

use std::collections::HashMap;

use lber::structures::Tag;
use tokio::sync::{mpsc, oneshot};

use crate::error::{LdapError, Result};
use crate::message::{Outcome, SearchItem};

/// Codes a request accepts as a successful outcome (4.G: "expected
/// success codes").
pub type ExpectedCodes = &'static [u32];

pub const EXPECT_SUCCESS: ExpectedCodes = &[0];
pub const EXPECT_COMPARE: ExpectedCodes = &[5, 6];

/// The continuation for one outstanding request, realizing the
/// `PendingRequest` data-model entry as a Rust enum over channel ends.
pub enum Pending {
    /// A single-response operation (bind, add, delete, modify,
    /// modifyDN, compare, extended).
    Single {
        expected: ExpectedCodes,
        reply: oneshot::Sender<Result<Outcome>>,
    },
    /// A streaming search: the original request PDU is kept so the
    /// paged-search driver (4.H) can re-serialize it with an updated
    /// cookie.
    Search {
        request: Tag,
        sink: mpsc::UnboundedSender<SearchItem>,
        /// The page size originally requested for a paged search, reused
        /// on every continuation instead of the response control's
        /// (unrelated) total-result-estimate field.
        page_size: Option<i32>,
    },
    /// Abandon has no response; the table only tracks it long enough to
    /// satisfy bookkeeping. In practice abandon never installs an entry
    /// (4.G: "the completion fires immediately with nil").
    Unbind {
        reply: oneshot::Sender<Result<()>>,
    },
}

impl Pending {
    /// Resolve this pending entry with a transport-level failure (used
    /// when the table is drained on disconnect, or a timeout fires).
    pub fn fail(self, err: LdapError) {
        match self {
            Pending::Single { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Pending::Search { sink, .. } => {
                let _ = sink.send(SearchItem::Error(err.to_string()));
            }
            Pending::Unbind { reply } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Owned exclusively by the actor task; no locking needed (5: "single
/// owner").
#[derive(Default)]
pub struct RequestTable {
    entries: HashMap<i32, Pending>,
}

impl RequestTable {
    pub fn new() -> RequestTable {
        RequestTable::default()
    }

    pub fn install(&mut self, id: i32, pending: Pending) {
        self.entries.insert(id, pending);
    }

    pub fn take(&mut self, id: i32) -> Option<Pending> {
        self.entries.remove(&id)
    }

    pub fn peek(&self, id: i32) -> Option<&Pending> {
        self.entries.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove every entry and resolve each with `err`, used when the
    /// transport is torn down (invariant 6: N pending → N errors, bar a
    /// pending Unbind which is handled by the caller before draining).
    pub fn drain(&mut self, err_factory: impl Fn() -> LdapError) {
        for (_, pending) in self.entries.drain() {
            pending.fail(err_factory());
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn install_and_take_round_trips() {
        let mut table = RequestTable::new();
        let (tx, _rx) = oneshot::channel();
        table.install(
            1,
            Pending::Single {
                expected: EXPECT_SUCCESS,
                reply: tx,
            },
        );
        assert_eq!(table.len(), 1);
        assert!(table.take(1).is_some());
        assert!(table.is_empty());
    }

    #[test]
    fn drain_resolves_every_entry_with_error() {
        let mut table = RequestTable::new();
        let (tx1, rx1) = oneshot::channel();
        let (tx2, rx2) = oneshot::channel();
        table.install(
            1,
            Pending::Single {
                expected: EXPECT_SUCCESS,
                reply: tx1,
            },
        );
        table.install(
            2,
            Pending::Single {
                expected: EXPECT_SUCCESS,
                reply: tx2,
            },
        );
        table.drain(|| LdapError::Connection("closed".to_string()));
        assert!(table.is_empty());
        assert!(rx1.try_recv().unwrap().is_err());
        assert!(rx2.try_recv().unwrap().is_err());
    }
}
