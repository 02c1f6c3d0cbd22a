//! `Client`'s per-operation inherent methods: build the operation's
//! request `Tag` (grounded file-for-file on the teacher's `bind.rs`,
//! `add.rs`, `delete.rs`, `modify.rs`, `modifydn.rs`, `compare.rs`,
//! `extended.rs`, `unbind.rs`, `abandon.rs`, `search.rs`) and submit it
//! through the actor instead of the teacher's `tokio_service::Service`.

use std::hash::Hash;

use tokio::sync::{mpsc, oneshot};

use lber::common::TagClass;
use lber::structures::{Boolean, Enumerated, Integer, OctetString, Sequence, Set, Tag};

use crate::actor::{ActorCommand, Completion, Submit};
use crate::client::{Client, SearchStream};
use crate::error::{LdapError, Result};
use crate::exop::{Exop, WhoAmI, WhoAmIResp};
use crate::message::app;
use crate::pending::{EXPECT_COMPARE, EXPECT_SUCCESS};
use crate::result::{CompareResult, LdapResult};

/// Search scope (RFC 4511 §4.5.1.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Base = 0,
    OneLevel = 1,
    Subtree = 2,
}

/// Alias dereferencing policy (RFC 4511 §4.5.1.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerefAliases {
    Never = 0,
    InSearch = 1,
    FindingBaseObject = 2,
    Always = 3,
}

/// One change inside a Modify request.
#[derive(Clone, Debug, PartialEq)]
pub enum Mod<S: AsRef<str> + Eq + Hash> {
    Add(S, std::collections::HashSet<S>),
    Delete(S, std::collections::HashSet<S>),
    Replace(S, std::collections::HashSet<S>),
}

fn octet(s: impl AsRef<[u8]>) -> Tag {
    Tag::OctetString(OctetString {
        inner: s.as_ref().to_vec(),
        ..Default::default()
    })
}

fn bind_request_tag(bind_dn: &str, bind_pw: &str) -> Tag {
    Tag::Sequence(Sequence {
        id: app::BIND_REQUEST,
        class: TagClass::Application,
        inner: vec![
            Tag::Integer(Integer {
                inner: 3,
                ..Default::default()
            }),
            octet(bind_dn),
            Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: bind_pw.as_bytes().to_vec(),
            }),
        ],
    })
}

impl Client {
    async fn send_single_inner(
        &self,
        protocol_op: Tag,
        expected: crate::pending::ExpectedCodes,
        bypass: bool,
    ) -> Result<crate::message::Outcome> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(ActorCommand::Submit(Submit {
                protocol_op,
                expected,
                controls: Vec::new(),
                completion: Completion::Single(tx),
                bypass,
                page_size: None,
                id_reply: None,
            }))
            .map_err(|_| LdapError::ClientDestroyed)?;
        rx.await.map_err(|_| LdapError::ClientDestroyed)?
    }

    async fn send_single(&self, protocol_op: Tag, expected: crate::pending::ExpectedCodes) -> Result<LdapResult> {
        self.send_single_inner(protocol_op, expected, false)
            .await
            .map(|outcome| outcome.result)
    }

    async fn send_single_with_extra(
        &self,
        protocol_op: Tag,
        expected: crate::pending::ExpectedCodes,
    ) -> Result<crate::message::Outcome> {
        self.send_single_inner(protocol_op, expected, false).await
    }

    /// Bind with simple (DN + password) authentication.
    pub async fn simple_bind(&self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        self.send_single(bind_request_tag(bind_dn, bind_pw), EXPECT_SUCCESS)
            .await
    }

    /// Bind with simple authentication, bypassing the request queue.
    /// Used by a [`crate::client::RestrictedClient`] running a setup hook.
    pub(crate) async fn simple_bind_bypass(&self, bind_dn: &str, bind_pw: &str) -> Result<LdapResult> {
        self.send_single_inner(bind_request_tag(bind_dn, bind_pw), EXPECT_SUCCESS, true)
            .await
            .map(|outcome| outcome.result)
    }

    /// Add an entry. Every attribute's value set must be non-empty.
    pub async fn add<S: AsRef<str>>(
        &self,
        dn: &str,
        attrs: Vec<(S, Vec<S>)>,
    ) -> Result<LdapResult> {
        if attrs.iter().any(|(_, vals)| vals.is_empty()) {
            return Err(LdapError::InvalidArgument(
                "empty value set for Add".to_string(),
            ));
        }
        let req = Tag::Sequence(Sequence {
            id: app::ADD_REQUEST,
            class: TagClass::Application,
            inner: vec![
                octet(dn),
                Tag::Sequence(Sequence {
                    inner: attrs
                        .into_iter()
                        .map(|(name, vals)| {
                            Tag::Sequence(Sequence {
                                inner: vec![
                                    octet(name.as_ref()),
                                    Tag::Set(Set {
                                        inner: vals.iter().map(|v| octet(v.as_ref())).collect(),
                                        ..Default::default()
                                    }),
                                ],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        self.send_single(req, EXPECT_SUCCESS).await
    }

    /// Delete a leaf entry.
    pub async fn delete(&self, dn: &str) -> Result<LdapResult> {
        let req = Tag::OctetString(OctetString {
            id: app::DEL_REQUEST,
            class: TagClass::Application,
            inner: dn.as_bytes().to_vec(),
        });
        self.send_single(req, EXPECT_SUCCESS).await
    }

    /// Compare an attribute's value against the directory's.
    pub async fn compare<B: AsRef<[u8]>>(
        &self,
        dn: &str,
        attr: &str,
        val: B,
    ) -> Result<CompareResult> {
        let req = Tag::Sequence(Sequence {
            id: app::COMPARE_REQUEST,
            class: TagClass::Application,
            inner: vec![
                octet(dn),
                Tag::Sequence(Sequence {
                    inner: vec![octet(attr), octet(val.as_ref())],
                    ..Default::default()
                }),
            ],
        });
        self.send_single(req, EXPECT_COMPARE)
            .await
            .map(CompareResult)
    }

    /// Apply a set of attribute changes to an entry.
    pub async fn modify<S: AsRef<str> + Eq + Hash>(
        &self,
        dn: &str,
        mods: Vec<Mod<S>>,
    ) -> Result<LdapResult> {
        if mods.iter().any(|m| matches!(m, Mod::Add(_, set) if set.is_empty())) {
            return Err(LdapError::InvalidArgument(
                "empty value set for Add".to_string(),
            ));
        }
        let req = Tag::Sequence(Sequence {
            id: app::MODIFY_REQUEST,
            class: TagClass::Application,
            inner: vec![
                octet(dn),
                Tag::Sequence(Sequence {
                    inner: mods
                        .into_iter()
                        .map(|m| {
                            let (num, attr, set) = match m {
                                Mod::Add(attr, set) => (0, attr, set),
                                Mod::Delete(attr, set) => (1, attr, set),
                                Mod::Replace(attr, set) => (2, attr, set),
                            };
                            let op = Tag::Enumerated(Enumerated {
                                inner: num,
                                ..Default::default()
                            });
                            let part_attr = Tag::Sequence(Sequence {
                                inner: vec![
                                    octet(attr.as_ref()),
                                    Tag::Set(Set {
                                        inner: set.into_iter().map(|v| octet(v.as_ref())).collect(),
                                        ..Default::default()
                                    }),
                                ],
                                ..Default::default()
                            });
                            Tag::Sequence(Sequence {
                                inner: vec![op, part_attr],
                                ..Default::default()
                            })
                        })
                        .collect(),
                    ..Default::default()
                }),
            ],
        });
        self.send_single(req, EXPECT_SUCCESS).await
    }

    /// Rename/move an entry. If `new_dn` has more than one RDN
    /// component, the first becomes `newRDN` and the remainder becomes
    /// `newSuperior`; the old RDN is always dropped (`deleteOldRdn =
    /// true`).
    pub async fn modify_dn(&self, dn: &str, new_dn: &str) -> Result<LdapResult> {
        let (rdn, new_sup) = match new_dn.split_once(',') {
            Some((rdn, rest)) => (rdn, Some(rest)),
            None => (new_dn, None),
        };
        let mut params = vec![
            octet(dn),
            octet(rdn),
            Tag::Boolean(Boolean {
                inner: true,
                ..Default::default()
            }),
        ];
        if let Some(new_sup) = new_sup {
            params.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: new_sup.as_bytes().to_vec(),
            }));
        }
        let req = Tag::Sequence(Sequence {
            id: app::MODDN_REQUEST,
            class: TagClass::Application,
            inner: params,
        });
        self.send_single(req, EXPECT_SUCCESS).await
    }

    /// Run an extended operation, returning the common result plus any
    /// `responseName`/`response` the server sent back.
    pub async fn extended<E: Into<Exop>>(&self, exop: E) -> Result<(LdapResult, Exop)> {
        let req = Tag::Sequence(Sequence {
            id: app::EXTENDED_REQUEST,
            class: TagClass::Application,
            inner: Vec::from(exop.into()),
        });
        let outcome = self.send_single_with_extra(req, EXPECT_SUCCESS).await?;
        let exop = crate::exop::parse_exop_response(&outcome.extra);
        Ok((outcome.result, exop))
    }

    /// RFC 4532 "Who am I?" extended operation.
    pub async fn who_am_i(&self) -> Result<WhoAmIResp> {
        let (_, exop) = self.extended(WhoAmI).await?;
        Ok(WhoAmIResp::from(exop))
    }

    /// Search with RFC 4511 defaults (`sizeLimit = 0`, `timeLimit =
    /// 10`, `typesOnly = false`, `derefAliases = never`).
    pub async fn search(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<String>,
    ) -> Result<SearchStream> {
        self.search_with(base, scope, DerefAliases::Never, false, filter, attrs, 0, 10)
            .await
    }

    /// Search with every option spelled out.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_with(
        &self,
        base: &str,
        scope: Scope,
        deref: DerefAliases,
        typesonly: bool,
        filter: &str,
        attrs: Vec<String>,
        size_limit: i32,
        time_limit: i32,
    ) -> Result<SearchStream> {
        self.search_inner(
            base, scope, deref, typesonly, filter, attrs, size_limit, time_limit, None, false,
        )
        .await
    }

    /// Search with RFC 2696 paging enabled: the first page's request
    /// carries a PagedResults control (`size = page_size`, empty
    /// cookie); the actor reissues the request with the server's cookie
    /// on every `SEARCH_RESULT_DONE` until the cookie comes back empty.
    #[allow(clippy::too_many_arguments)]
    pub async fn search_paged(
        &self,
        base: &str,
        scope: Scope,
        deref: DerefAliases,
        typesonly: bool,
        filter: &str,
        attrs: Vec<String>,
        page_size: i32,
    ) -> Result<SearchStream> {
        self.search_inner(
            base,
            scope,
            deref,
            typesonly,
            filter,
            attrs,
            0,
            10,
            Some(page_size),
            false,
        )
        .await
    }

    /// Search bypassing the request queue. Used by a
    /// [`crate::client::RestrictedClient`] running a setup hook.
    pub(crate) async fn search_bypass(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<String>,
    ) -> Result<SearchStream> {
        self.search_inner(
            base,
            scope,
            DerefAliases::Never,
            false,
            filter,
            attrs,
            0,
            10,
            None,
            true,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn search_inner(
        &self,
        base: &str,
        scope: Scope,
        deref: DerefAliases,
        typesonly: bool,
        filter: &str,
        attrs: Vec<String>,
        size_limit: i32,
        time_limit: i32,
        page_size: Option<i32>,
        bypass: bool,
    ) -> Result<SearchStream> {
        let filter_tag = crate::filter::parse(filter)
            .map_err(|_| LdapError::InvalidArgument(format!("invalid filter: {filter}")))?;
        let req = Tag::Sequence(Sequence {
            id: app::SEARCH_REQUEST,
            class: TagClass::Application,
            inner: vec![
                octet(base),
                Tag::Integer(Integer {
                    inner: scope as i64,
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: deref as i64,
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: size_limit as i64,
                    ..Default::default()
                }),
                Tag::Integer(Integer {
                    inner: time_limit as i64,
                    ..Default::default()
                }),
                Tag::Boolean(Boolean {
                    inner: typesonly,
                    ..Default::default()
                }),
                filter_tag,
                Tag::Sequence(Sequence {
                    inner: attrs.into_iter().map(octet).collect(),
                    ..Default::default()
                }),
            ],
        });
        let controls = match page_size {
            Some(size) => vec![crate::paged::PagedResults::new(size, Vec::new()).to_raw()],
            None => Vec::new(),
        };

        let (sink_tx, sink_rx) = mpsc::unbounded_channel();
        let (id_tx, id_rx) = oneshot::channel();
        self.cmd_tx
            .send(ActorCommand::Submit(Submit {
                protocol_op: req,
                expected: EXPECT_SUCCESS,
                controls,
                completion: Completion::Search(sink_tx),
                bypass,
                page_size,
                id_reply: Some(id_tx),
            }))
            .map_err(|_| LdapError::ClientDestroyed)?;
        let message_id = id_rx.await.map_err(|_| LdapError::ClientDestroyed)?;
        Ok(SearchStream::new(self.clone(), message_id, sink_rx))
    }

    /// Convenience: run `search` to completion, collecting every entry
    /// into a `Vec` instead of streaming them.
    pub async fn search_all(
        &self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Vec<String>,
    ) -> Result<(Vec<crate::message::SearchEntry>, LdapResult)> {
        let mut stream = self.search(base, scope, filter, attrs).await?;
        let mut entries = Vec::new();
        while let Some(item) = stream.next_item().await {
            match item {
                crate::message::SearchItem::Entry(e) => entries.push(e),
                crate::message::SearchItem::Done(result) => return Ok((entries, result)),
                crate::message::SearchItem::Error(msg) => {
                    return Err(LdapError::Connection(msg));
                }
            }
        }
        Err(LdapError::Connection(
            "search stream closed without a terminal response".to_string(),
        ))
    }
}
