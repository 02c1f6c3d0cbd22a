//! The background task that owns one `Client`'s Transport, request
//! table, queue and backoff state (5: "one `tokio::spawn`-ed actor task
//! per `Client`").

use futures_util::{SinkExt, StreamExt};
use lber::structures::Tag;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::codec::Framed;

use crate::client::{Client, RestrictedClient};
use crate::codec::{LdapCodec, OutMessage};
use crate::conn::{self, Transport};
use crate::controls::RawControl;
use crate::error::{LdapError, Result};
use crate::message::{app, LdapMessage, Outcome, SearchEntry, SearchItem};
use crate::paged::{self, PagedOutcome, PagedResults};
use crate::pending::{ExpectedCodes, Pending, RequestTable};
use crate::queue::{QueueEntry, RequestQueue};
use crate::reconnect::Backoff;
use crate::settings::LdapConnSettings;

const MAX_MESSAGE_ID: i32 = i32::MAX;

/// Events a `Client` publishes over its `broadcast` channel (6).
#[derive(Clone, Debug)]
pub enum ClientEvent {
    Connect,
    ConnectError(String),
    ConnectTimeout,
    Setup,
    Error(String),
    Close,
    End,
    SocketTimeout,
    Timeout(i32),
    Idle,
    Destroy,
}

/// Where a request's outcome goes once it resolves.
pub enum Completion {
    Single(oneshot::Sender<Result<Outcome>>),
    Search(mpsc::UnboundedSender<SearchItem>),
}

/// One call into the actor: build a request, submit it, and wait.
pub struct Submit {
    pub protocol_op: Tag,
    pub expected: ExpectedCodes,
    pub controls: Vec<RawControl>,
    pub completion: Completion,
    pub bypass: bool,
    /// The page size originally requested for a paged search (`None`
    /// for every other operation); carried through to `Pending::Search`
    /// so a later continuation reuses it instead of the response
    /// control's total-result-estimate field.
    pub page_size: Option<i32>,
    /// Told the `messageID` the request is assigned, once that's
    /// decided -- a `Search` completion needs this to build its
    /// `SearchStream`'s `abandon()`.
    pub id_reply: Option<oneshot::Sender<i32>>,
}

pub enum ActorCommand {
    Submit(Submit),
    Abandon(i32),
    Unbind(oneshot::Sender<Result<()>>),
    Destroy,
    RequestTimedOut(i32),
    IdleCheck,
    QueuePurge,
    /// Reported by the setup-hook driver task spawned from
    /// `connect_with_retry` once every hook has run (or one failed).
    SetupComplete(Result<()>),
}

pub struct Actor {
    url: String,
    settings: LdapConnSettings,
    framed: Option<Framed<Transport, LdapCodec>>,
    table: RequestTable,
    queue: RequestQueue,
    next_id: i32,
    destroyed: bool,
    /// `true` between a successful dial with setup hooks registered and
    /// that hook chain completing; gates ordinary (non-bypass) writes so
    /// hook traffic goes first.
    setting_up: bool,
    events: broadcast::Sender<ClientEvent>,
    cmd_tx: mpsc::UnboundedSender<ActorCommand>,
    cmd_rx: mpsc::UnboundedReceiver<ActorCommand>,
}

/// Spawn the actor task and return the handle the `Client` talks to.
pub fn spawn(
    url: String,
    settings: LdapConnSettings,
) -> (
    mpsc::UnboundedSender<ActorCommand>,
    broadcast::Sender<ClientEvent>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (events, _) = broadcast::channel(64);

    let queue_policy = settings.queue_policy();
    let actor = Actor {
        url,
        settings,
        framed: None,
        table: RequestTable::new(),
        queue: RequestQueue::new(queue_policy.size, !queue_policy.enabled, queue_policy.timeout),
        next_id: 0,
        destroyed: false,
        setting_up: false,
        events: events.clone(),
        cmd_tx: cmd_tx.clone(),
        cmd_rx,
    };
    tokio::spawn(actor.run());
    (cmd_tx, events)
}

impl Actor {
    fn next_message_id(&mut self) -> i32 {
        self.next_id = if self.next_id >= MAX_MESSAGE_ID {
            1
        } else {
            self.next_id + 1
        };
        self.next_id
    }

    fn emit(&self, ev: ClientEvent) {
        let _ = self.events.send(ev);
    }

    async fn connect_with_retry(&mut self) -> bool {
        let mut backoff = self.settings.reconnect().map(Backoff::new);
        loop {
            match conn::dial(&self.url, &self.settings).await {
                Ok(transport) => {
                    self.next_id = 0;
                    self.framed = Some(Framed::new(transport, LdapCodec));
                    self.emit(ClientEvent::Connect);
                    let hooks = self.settings.setup_hooks();
                    if hooks.is_empty() {
                        self.flush_queue().await;
                    } else {
                        self.setting_up = true;
                        self.run_setup_hooks(hooks);
                    }
                    return true;
                }
                Err(e) => {
                    let is_timeout = matches!(&e, LdapError::Connection(msg) if msg.contains("timeout"));
                    if is_timeout {
                        self.emit(ClientEvent::ConnectTimeout);
                    } else {
                        self.emit(ClientEvent::ConnectError(e.to_string()));
                    }
                    match backoff.as_mut().and_then(|b| b.next_delay()) {
                        Some(delay) => tokio::time::sleep(delay).await,
                        None => return false,
                    }
                }
            }
        }
    }

    async fn flush_queue(&mut self) {
        let mut drained = Vec::new();
        self.queue.flush(|entry| drained.push(entry));
        for entry in drained {
            let id = self.next_message_id();
            self.write_request(
                id,
                entry.request,
                entry.controls,
                entry.pending,
                entry.id_reply,
            )
            .await;
            self.arm_request_timeout(id);
        }
    }

    /// Arm the per-request timeout timer (4.G: "arm per-request timer
    /// if `timeout > 0`") for a just-written request.
    fn arm_request_timeout(&self, id: i32) {
        let timeout = self.settings.request_timeout();
        if !timeout.is_zero() {
            let tx = self.cmd_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                let _ = tx.send(ActorCommand::RequestTimedOut(id));
            });
        }
    }

    /// Spawn the setup-hook driver as its own task rather than running
    /// it inline: `connect_with_retry` runs on this actor's own task, so
    /// blocking here on a hook's `cmd_tx` round-trip would deadlock
    /// against the `select!` loop that's supposed to service it.
    fn run_setup_hooks(&self, hooks: Vec<crate::client::SetupHook>) {
        let client = Client::from_parts(self.cmd_tx.clone(), self.events.clone());
        let restricted = RestrictedClient::new(client);
        let tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let mut outcome = Ok(());
            for hook in hooks {
                if let Err(e) = hook(restricted.clone()).await {
                    outcome = Err(e);
                    break;
                }
            }
            let _ = tx.send(ActorCommand::SetupComplete(outcome));
        });
    }

    async fn write_request(
        &mut self,
        id: i32,
        request: Tag,
        controls: Vec<RawControl>,
        pending: Pending,
        id_reply: Option<oneshot::Sender<i32>>,
    ) {
        if let Some(id_reply) = id_reply {
            let _ = id_reply.send(id);
        }
        let Some(framed) = self.framed.as_mut() else {
            pending.fail(LdapError::Connection("not connected".to_string()));
            return;
        };
        let out = OutMessage {
            id,
            protocol_op: request,
            controls,
        };
        match framed.send(out).await {
            Ok(()) => {
                self.table.install(id, pending);
            }
            Err(e) => {
                pending.fail(e);
            }
        }
    }

    async fn handle_submit(&mut self, submit: Submit) {
        let Submit {
            protocol_op,
            expected,
            controls,
            completion,
            bypass,
            page_size,
            id_reply,
        } = submit;

        let pending = match completion {
            Completion::Single(reply) => Pending::Single { expected, reply },
            Completion::Search(sink) => Pending::Search {
                request: protocol_op.clone(),
                sink,
                page_size,
            },
        };

        let transport_ready = self.framed.is_some();
        if bypass && transport_ready {
            let id = self.next_message_id();
            self.write_request(id, protocol_op, controls, pending, id_reply)
                .await;
            self.arm_request_timeout(id);
            return;
        }

        // Ordinary (non-bypass) requests wait out a setup-hook run even
        // though the transport already exists, so hook traffic is never
        // interleaved with it.
        let writable = transport_ready && !self.setting_up;

        if !writable {
            if self.destroyed {
                pending.fail(LdapError::ClientDestroyed);
                return;
            }
            let entry = QueueEntry {
                request: protocol_op,
                expected,
                pending,
                controls,
                id_reply,
            };
            match self.queue.enqueue(entry) {
                Ok(became_nonempty) => {
                    if became_nonempty {
                        if let Some(timeout) = self.queue.timeout() {
                            let tx = self.cmd_tx.clone();
                            tokio::spawn(async move {
                                tokio::time::sleep(timeout).await;
                                let _ = tx.send(ActorCommand::QueuePurge);
                            });
                        }
                    }
                    if !transport_ready && self.settings.reconnect().is_some() {
                        self.connect_with_retry().await;
                    }
                }
                Err(entry) => entry.pending.fail(LdapError::Connection(
                    "request queue is frozen or full".to_string(),
                )),
            }
            return;
        }

        let id = self.next_message_id();
        self.write_request(id, protocol_op, controls, pending, id_reply)
            .await;
        self.arm_request_timeout(id);
    }

    fn update_idle(&mut self) {
        if self.table.is_empty() {
            if let Some(timeout) = self.settings.idle_timeout() {
                let tx = self.cmd_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    let _ = tx.send(ActorCommand::IdleCheck);
                });
            }
        }
    }

    async fn handle_incoming(&mut self, msg: LdapMessage) {
        let id = msg.id;
        let op_id = msg.protocol_op.id;

        if op_id == app::SEARCH_RESULT_ENTRY || op_id == app::SEARCH_RESULT_REFERENCE {
            if let Some(Pending::Search { sink, .. }) = self.table.peek(id) {
                let sink = sink.clone();
                match SearchEntry::from_tag(msg.protocol_op) {
                    Ok(entry) => {
                        let _ = sink.send(SearchItem::Entry(entry));
                    }
                    Err(e) => {
                        let _ = sink.send(SearchItem::Error(e.to_string()));
                    }
                }
            } else {
                log::warn!("unsolicited message id={id}");
            }
            return;
        }

        let result_pdu = crate::message::parse_ldap_result(msg.protocol_op);
        let (mut result, rest) = match result_pdu {
            Ok(v) => v,
            Err(e) => {
                log::error!("malformed response id={id}: {e}");
                return;
            }
        };
        result.ctrls = msg.controls.clone();

        if op_id == app::SEARCH_RESULT_DONE {
            if let Some(Pending::Search {
                request, page_size, ..
            }) = self.table.peek(id)
            {
                match paged::inspect(&msg.controls) {
                    PagedOutcome::Continue(pr) => {
                        let request = request.clone();
                        let page_size = page_size.unwrap_or(0);
                        self.resend_paged(id, request, page_size, &pr).await;
                        return;
                    }
                    PagedOutcome::Exhausted | PagedOutcome::NotPaged => {}
                }
            }
        }

        let Some(pending) = self.table.take(id) else {
            log::warn!("unsolicited message id={id}, rc={}", result.rc);
            return;
        };
        self.update_idle();

        match pending {
            Pending::Single { expected, reply } => {
                let outcome = if expected.contains(&result.rc) {
                    Ok(Outcome { result, extra: rest })
                } else {
                    Err(LdapError::Server { result })
                };
                let _ = reply.send(outcome);
            }
            Pending::Search { sink, .. } => {
                let _ = sink.send(SearchItem::Done(result));
            }
            Pending::Unbind { reply } => {
                let _ = reply.send(Ok(()));
            }
        }
    }

    async fn resend_paged(&mut self, id: i32, request: Tag, page_size: i32, cookie_src: &PagedResults) {
        let next = cookie_src.continuation(page_size);
        let Some(framed) = self.framed.as_mut() else {
            return;
        };
        let out = OutMessage {
            id,
            protocol_op: request,
            controls: vec![next.to_raw()],
        };
        if let Err(e) = framed.send(out).await {
            if let Some(pending) = self.table.take(id) {
                pending.fail(e);
            }
        }
    }

    async fn teardown(&mut self, reason: LdapError) {
        self.framed = None;
        self.emit(ClientEvent::Close);
        let message = reason.to_string();
        self.table.drain(|| LdapError::Connection(message.clone()));
        self.emit(ClientEvent::Error(message));
        if !self.destroyed && self.settings.reconnect().is_some() {
            self.connect_with_retry().await;
        }
    }

    pub async fn run(mut self) {
        if !self.connect_with_retry().await && self.settings.reconnect().is_none() {
            // Single attempt, as documented for an absent reconnect policy;
            // queued entries will fail lazily as they're submitted.
        }

        loop {
            if self.destroyed && self.table.is_empty() && self.queue.is_empty() {
                break;
            }

            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(ActorCommand::Submit(submit)) => self.handle_submit(submit).await,
                        Some(ActorCommand::Abandon(id)) => {
                            if self.framed.is_some() {
                                let abandon_id = self.next_message_id();
                                let out = OutMessage {
                                    id: abandon_id,
                                    protocol_op: Tag::Integer(lber::structures::Integer {
                                        id: app::ABANDON_REQUEST,
                                        class: lber::common::TagClass::Application,
                                        inner: id as i64,
                                    }),
                                    controls: Vec::new(),
                                };
                                if let Some(framed) = self.framed.as_mut() {
                                    let _ = framed.send(out).await;
                                }
                            }
                            self.table.take(id);
                            self.update_idle();
                        }
                        Some(ActorCommand::Unbind(reply)) => {
                            if self.framed.is_some() {
                                let id = self.next_message_id();
                                let out = OutMessage {
                                    id,
                                    protocol_op: Tag::Null(lber::structures::Null {
                                        id: app::UNBIND_REQUEST,
                                        class: lber::common::TagClass::Application,
                                    }),
                                    controls: Vec::new(),
                                };
                                if let Some(framed) = self.framed.as_mut() {
                                    let _ = framed.send(out).await;
                                }
                            }
                            self.framed = None;
                            self.emit(ClientEvent::End);
                            let _ = reply.send(Ok(()));
                        }
                        Some(ActorCommand::Destroy) => {
                            self.destroyed = true;
                            self.queue.purge_with(|| LdapError::ClientDestroyed);
                            self.table.drain(|| LdapError::ClientDestroyed);
                            self.emit(ClientEvent::Destroy);
                        }
                        Some(ActorCommand::RequestTimedOut(id)) => {
                            if let Some(pending) = self.table.take(id) {
                                self.update_idle();
                                self.emit(ClientEvent::Timeout(id));
                                match pending {
                                    Pending::Single { reply, .. } => {
                                        let _ = reply.send(Err(LdapError::request_timeout()));
                                    }
                                    Pending::Search { sink, .. } => {
                                        let _ = sink.send(SearchItem::Error(
                                            LdapError::request_timeout().to_string(),
                                        ));
                                    }
                                    Pending::Unbind { reply } => {
                                        let _ = reply.send(Err(LdapError::request_timeout()));
                                    }
                                }
                            }
                        }
                        Some(ActorCommand::IdleCheck) => {
                            if self.table.is_empty() {
                                self.emit(ClientEvent::Idle);
                            }
                        }
                        Some(ActorCommand::QueuePurge) => {
                            self.queue.purge();
                        }
                        Some(ActorCommand::SetupComplete(outcome)) => {
                            self.setting_up = false;
                            match outcome {
                                Ok(()) => {
                                    self.emit(ClientEvent::Setup);
                                    self.flush_queue().await;
                                }
                                Err(e) => self.teardown(e).await,
                            }
                        }
                        None => break,
                    }
                }
                incoming = async {
                    match self.framed.as_mut() {
                        Some(f) => f.next().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match incoming {
                        Some(Ok(msg)) => self.handle_incoming(msg).await,
                        Some(Err(e)) => self.teardown(e).await,
                        None => self.teardown(LdapError::Connection("transport closed".to_string())).await,
                    }
                }
            }
        }
    }
}
