//! Shared helpers for the integration tests: a loopback TCP listener and
//! hand-encoded LDAPMessage responses, built straight from `lber`'s tag
//! types rather than going through the client's own encoder.

use lber::common::TagClass;
use lber::structures::{ASNTag, Enumerated, Integer, OctetString, Sequence, Set, Tag};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};

/// Bind an ephemeral loopback port and return the listener plus the
/// `ldap://` URL a `Client` can dial it with.
pub async fn listen() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, format!("ldap://{addr}"))
}

fn wrap_message(id: i32, protocol_op: Tag) -> Vec<u8> {
    let envelope = Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: id as i64,
                ..Default::default()
            }),
            protocol_op,
        ],
        ..Default::default()
    });
    lber::write::encode(&envelope.into_structure())
}

fn ldap_result_body(app_tag: u64, rc: i64) -> Tag {
    Tag::Sequence(Sequence {
        id: app_tag,
        class: TagClass::Application,
        inner: vec![
            Tag::Enumerated(Enumerated {
                inner: rc,
                ..Default::default()
            }),
            Tag::OctetString(OctetString::default()),
            Tag::OctetString(OctetString::default()),
        ],
    })
}

/// Encode a response PDU that's just the common LDAPResult shape
/// (Bind/Add/Delete/Modify/ModifyDN/Compare/SearchResultDone responses).
pub fn result_response(id: i32, app_tag: u64, rc: i64) -> Vec<u8> {
    wrap_message(id, ldap_result_body(app_tag, rc))
}

/// Encode a SearchResultEntry carrying one attribute with one value per
/// pair in `attrs`.
pub fn search_entry_response(id: i32, dn: &str, attrs: &[(&str, &str)]) -> Vec<u8> {
    let partial_attrs = Tag::Sequence(Sequence {
        inner: attrs
            .iter()
            .map(|(name, val)| {
                Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString::from(*name)),
                        Tag::Set(Set {
                            inner: vec![Tag::OctetString(OctetString::from(*val))],
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                })
            })
            .collect(),
        ..Default::default()
    });
    let body = Tag::Sequence(Sequence {
        id: 4, // app::SEARCH_RESULT_ENTRY
        class: TagClass::Application,
        inner: vec![Tag::OctetString(OctetString::from(dn)), partial_attrs],
    });
    wrap_message(id, body)
}

/// Encode a SearchResultDone carrying a PagedResults response control
/// with the given cookie (empty cookie means "no more pages").
pub fn search_done_paged(id: i32, rc: i64, cookie: &[u8]) -> Vec<u8> {
    let pr_value = Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: 0,
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: cookie.to_vec(),
                ..Default::default()
            }),
        ],
        ..Default::default()
    });
    let pr_bytes = lber::write::encode(&pr_value.into_structure());
    let control = Tag::Sequence(Sequence {
        inner: vec![
            Tag::OctetString(OctetString::from("1.2.840.113556.1.4.319")),
            Tag::OctetString(OctetString {
                inner: pr_bytes,
                ..Default::default()
            }),
        ],
        ..Default::default()
    });
    let controls_envelope = Tag::Sequence(Sequence {
        id: 0,
        class: TagClass::Context,
        inner: vec![control],
    });
    let envelope = Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: id as i64,
                ..Default::default()
            }),
            ldap_result_body(5, rc), // app::SEARCH_RESULT_DONE
            controls_envelope,
        ],
        ..Default::default()
    });
    lber::write::encode(&envelope.into_structure())
}

/// Read and discard whatever bytes the client has written so far; these
/// tests assert on the responses the server sends back, not on the
/// precise bytes of the request.
pub async fn read_request(stream: &mut TcpStream) -> usize {
    let mut buf = vec![0u8; 8192];
    stream.read(&mut buf).await.unwrap()
}
