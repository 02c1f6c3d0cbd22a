//! Extended operation (exop) request/response plumbing.

use lber::common::TagClass;
use lber::structure::StructureTag;
use lber::structures::{ASNTag, OctetString, Tag};

/// An extended operation request or response body: `{ name?, value? }`,
/// both optional per RFC 4511 §4.12.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Exop {
    pub name: Option<String>,
    pub val: Option<Vec<u8>>,
}

impl From<Exop> for Vec<Tag> {
    fn from(exop: Exop) -> Vec<Tag> {
        let mut tags = Vec::new();
        if let Some(name) = exop.name {
            tags.push(Tag::OctetString(OctetString {
                id: 0,
                class: TagClass::Context,
                inner: name.into_bytes(),
            }));
        }
        if let Some(val) = exop.val {
            tags.push(Tag::OctetString(OctetString {
                id: 1,
                class: TagClass::Context,
                inner: val,
            }));
        }
        tags
    }
}

/// Parse the `[10] responseName` / `[11] response` fields trailing an
/// ExtendedResponse's common LDAPResult components.
pub fn parse_exop_response(tags: &[StructureTag]) -> Exop {
    let mut exop = Exop::default();
    for tag in tags {
        match tag.id {
            10 if matches!(tag.class, TagClass::Context) => {
                exop.name = tag
                    .clone()
                    .expect_primitive()
                    .and_then(|b| String::from_utf8(b).ok());
            }
            11 if matches!(tag.class, TagClass::Context) => {
                exop.val = tag.clone().expect_primitive();
            }
            _ => {}
        }
    }
    exop
}

/// OID of the "Who am I?" extended operation (RFC 4532).
pub const WHOAMI_OID: &str = "1.3.6.1.4.1.4203.1.11.3";

/// Request body for WhoAmI: no name, no value.
pub struct WhoAmI;

impl From<WhoAmI> for Exop {
    fn from(_: WhoAmI) -> Exop {
        Exop {
            name: Some(WHOAMI_OID.to_string()),
            val: None,
        }
    }
}

/// Parsed WhoAmI response: the authzId string, if the server sent one.
#[derive(Clone, Debug, PartialEq)]
pub struct WhoAmIResp {
    pub authzid: String,
}

impl From<Exop> for WhoAmIResp {
    fn from(exop: Exop) -> WhoAmIResp {
        WhoAmIResp {
            authzid: exop
                .val
                .and_then(|v| String::from_utf8(v).ok())
                .unwrap_or_default(),
        }
    }
}
