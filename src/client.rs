//! The public `Client` handle: a cheap, `Clone`-able front for the
//! actor task that owns the connection.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_stream::Stream;

use crate::actor::{self, ActorCommand, ClientEvent};
use crate::error::{LdapError, Result};
use crate::message::SearchItem;
use crate::result::LdapResult;
use crate::settings::LdapConnSettings;

/// The future a setup hook returns.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

/// A user-registered setup hook, run against a [`RestrictedClient`]
/// right after each successful dial, before ordinary traffic resumes.
pub type SetupHook = Arc<dyn Fn(RestrictedClient) -> HookFuture + Send + Sync>;

/// A handle to one LDAP connection. Clones share the same background
/// actor task (5: "single owner" of the transport/table/queue, reached
/// by every clone through the same command channel).
#[derive(Clone)]
pub struct Client {
    pub(crate) cmd_tx: mpsc::UnboundedSender<ActorCommand>,
    events: broadcast::Sender<ClientEvent>,
}

impl Client {
    /// Start connecting to `url` (`ldap://host[:port]` or
    /// `ldaps://host[:port]`) and return a handle immediately; dialing
    /// happens on the actor task per the documented state machine.
    pub fn new(url: impl Into<String>, settings: LdapConnSettings) -> Client {
        let (cmd_tx, events) = actor::spawn(url.into(), settings);
        Client { cmd_tx, events }
    }

    pub(crate) fn from_parts(
        cmd_tx: mpsc::UnboundedSender<ActorCommand>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Client {
        Client { cmd_tx, events }
    }

    /// Subscribe to this client's event stream (6: `connect`,
    /// `connectError`, ..., `destroy`). Each subscriber gets its own
    /// lagging-tolerant receiver.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Send the Unbind PDU and close the transport. Further operations
    /// on this handle will fail as disconnected.
    pub async fn unbind(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(ActorCommand::Unbind(tx))
            .map_err(|_| LdapError::ClientDestroyed)?;
        rx.await.map_err(|_| LdapError::ClientDestroyed)?
    }

    /// Abandon an in-flight request by `messageID`. Completes as soon
    /// as the Abandon PDU is written (or immediately if there's no
    /// transport); the abandoned request's table entry is untouched.
    pub async fn abandon(&self, message_id: i32) -> Result<()> {
        self.cmd_tx
            .send(ActorCommand::Abandon(message_id))
            .map_err(|_| LdapError::ClientDestroyed)
    }

    /// Terminal: freeze the queue, error everything outstanding, and
    /// suppress future reconnects.
    pub fn destroy(&self) {
        let _ = self.cmd_tx.send(ActorCommand::Destroy);
    }
}

/// A `Client` restricted to the operations a setup hook may perform
/// (bind, search, unbind), submitted bypassing the request queue so
/// they run immediately against the connection that was just dialed,
/// rather than waiting behind whatever ordinary traffic is queued.
#[derive(Clone)]
pub struct RestrictedClient(Client);

impl RestrictedClient {
    pub(crate) fn new(client: Client) -> RestrictedClient {
        RestrictedClient(client)
    }

    pub async fn simple_bind(&self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        self.0.simple_bind_bypass(bind_dn, bind_pw).await
    }

    pub async fn search(
        &self,
        base: &str,
        scope: crate::dispatch::Scope,
        filter: &str,
        attrs: Vec<String>,
    ) -> Result<SearchStream> {
        self.0.search_bypass(base, scope, filter, attrs).await
    }

    pub async fn unbind(&self) -> Result<()> {
        self.0.unbind().await
    }
}

/// A streaming Search result: one `SearchItem` per entry/reference,
/// terminated by `Done` or `Error`. Ported from the teacher's
/// `EntryStream`'s "drive to completion, then read the overall result"
/// two-phase contract (6).
pub struct SearchStream {
    client: Client,
    message_id: i32,
    rx: mpsc::UnboundedReceiver<SearchItem>,
    done: Option<LdapResult>,
}

impl SearchStream {
    pub(crate) fn new(
        client: Client,
        message_id: i32,
        rx: mpsc::UnboundedReceiver<SearchItem>,
    ) -> SearchStream {
        SearchStream {
            client,
            message_id,
            rx,
            done: None,
        }
    }

    /// Abandon the underlying search.
    pub async fn abandon(&self) -> Result<()> {
        self.client.abandon(self.message_id).await
    }

    /// Drive the stream to completion, discarding entries already
    /// consumed by the caller, and return the terminal `LdapResult`.
    pub async fn result(mut self) -> Result<LdapResult> {
        if let Some(result) = self.done.take() {
            return Ok(result);
        }
        while let Some(item) = self.rx.recv().await {
            match item {
                SearchItem::Entry(_) => continue,
                SearchItem::Done(result) => return Ok(result),
                SearchItem::Error(msg) => return Err(LdapError::Connection(msg)),
            }
        }
        Err(LdapError::Connection(
            "search stream closed without a terminal response".to_string(),
        ))
    }

    /// Pull the next item without going through the `Stream` impl,
    /// recording the terminal result for a later `result()` call.
    pub async fn next_item(&mut self) -> Option<SearchItem> {
        let item = self.rx.recv().await?;
        if let SearchItem::Done(ref result) = item {
            self.done = Some(result.clone());
        }
        Some(item)
    }
}

impl Stream for SearchStream {
    type Item = SearchItem;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let poll = this.rx.poll_recv(cx);
        if let std::task::Poll::Ready(Some(SearchItem::Done(ref result))) = poll {
            this.done = Some(result.clone());
        }
        poll
    }
}
