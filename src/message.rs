//! LDAPMessage framing: application tag numbers, the common LDAPResult
//! shape every response PDU starts with, and the Search result types.

use std::collections::HashMap;

use lber::common::TagClass;
use lber::structure::StructureTag;

use crate::controls::Control;
use crate::error::{LdapError, Result};
use crate::result::LdapResult;

/// RFC 4511 §4.2 application tag numbers used in `protocolOp`.
pub mod app {
    pub const BIND_REQUEST: u64 = 0;
    pub const BIND_RESPONSE: u64 = 1;
    pub const UNBIND_REQUEST: u64 = 2;
    pub const SEARCH_REQUEST: u64 = 3;
    pub const SEARCH_RESULT_ENTRY: u64 = 4;
    pub const SEARCH_RESULT_DONE: u64 = 5;
    pub const MODIFY_REQUEST: u64 = 6;
    pub const MODIFY_RESPONSE: u64 = 7;
    pub const ADD_REQUEST: u64 = 8;
    pub const ADD_RESPONSE: u64 = 9;
    pub const DEL_REQUEST: u64 = 10;
    pub const DEL_RESPONSE: u64 = 11;
    pub const MODDN_REQUEST: u64 = 12;
    pub const MODDN_RESPONSE: u64 = 13;
    pub const COMPARE_REQUEST: u64 = 14;
    pub const COMPARE_RESPONSE: u64 = 15;
    pub const ABANDON_REQUEST: u64 = 16;
    pub const SEARCH_RESULT_REFERENCE: u64 = 19;
    pub const EXTENDED_REQUEST: u64 = 23;
    pub const EXTENDED_RESPONSE: u64 = 24;
}

/// A fully framed incoming message: `messageID`, the decoded
/// `protocolOp` body (still opaque), and any response controls.
#[derive(Clone, Debug)]
pub struct LdapMessage {
    pub id: i32,
    pub protocol_op: StructureTag,
    pub controls: Vec<Control>,
}

fn decode_uint(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn expect_octet_string(tag: StructureTag) -> Result<String> {
    let bytes = tag
        .expect_primitive()
        .ok_or_else(|| LdapError::Protocol("expected an OCTET STRING".to_string()))?;
    String::from_utf8(bytes).map_err(|_| LdapError::Protocol("value is not UTF-8".to_string()))
}

/// Split a response PDU's children into the common `LDAPResult`
/// components (resultCode, matchedDN, errorMessage, optional
/// referrals) and whatever operation-specific fields trail them.
pub fn parse_result_fields(fields: Vec<StructureTag>) -> Result<(LdapResult, Vec<StructureTag>)> {
    let mut fields = fields.into_iter();

    let rc_tag = fields
        .next()
        .ok_or_else(|| LdapError::Protocol("LDAPResult missing resultCode".to_string()))?;
    let rc = decode_uint(
        &rc_tag
            .expect_primitive()
            .ok_or_else(|| LdapError::Protocol("resultCode is not primitive".to_string()))?,
    ) as u32;

    let matched = expect_octet_string(
        fields
            .next()
            .ok_or_else(|| LdapError::Protocol("LDAPResult missing matchedDN".to_string()))?,
    )?;
    let text = expect_octet_string(
        fields
            .next()
            .ok_or_else(|| LdapError::Protocol("LDAPResult missing errorMessage".to_string()))?,
    )?;

    let mut refs = Vec::new();
    let mut rest: Vec<StructureTag> = fields.collect();
    if let Some(first) = rest.first() {
        if first.id == 3 && matches!(first.class, TagClass::Context) {
            let referral = rest.remove(0);
            let uris = referral.expect_constructed().unwrap_or_default();
            let mut set = std::collections::HashSet::new();
            for uri in uris {
                if let Some(bytes) = uri.expect_primitive() {
                    if let Ok(s) = String::from_utf8(bytes) {
                        set.insert(s);
                    }
                }
            }
            refs.push(set);
        }
    }

    Ok((
        LdapResult {
            rc,
            matched,
            text,
            refs,
            ctrls: Vec::new(),
        },
        rest,
    ))
}

/// Parse any response PDU sharing the common LDAPResult shape; fails if
/// the tag isn't constructed.
pub fn parse_ldap_result(tag: StructureTag) -> Result<(LdapResult, Vec<StructureTag>)> {
    let fields = tag
        .expect_constructed()
        .ok_or_else(|| LdapError::Protocol("response PDU is not constructed".to_string()))?;
    parse_result_fields(fields)
}

/// One entry from a Search operation, either a real object (name +
/// attribute/value map) or a continuation reference.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchEntry {
    Object {
        dn: String,
        attrs: HashMap<String, Vec<String>>,
    },
    Reference(Vec<String>),
}

impl SearchEntry {
    pub fn from_tag(tag: StructureTag) -> Result<SearchEntry> {
        match tag.id {
            id if id == app::SEARCH_RESULT_ENTRY => {
                let mut fields = tag
                    .expect_constructed()
                    .ok_or_else(|| LdapError::Protocol("entry is not constructed".to_string()))?;
                if fields.len() != 2 {
                    return Err(LdapError::Protocol(
                        "SearchResultEntry needs exactly 2 fields".to_string(),
                    ));
                }
                let attrs_tag = fields.pop().unwrap();
                let dn_tag = fields.pop().unwrap();
                let dn = expect_octet_string(dn_tag)?;
                let attr_list = attrs_tag.expect_constructed().unwrap_or_default();
                let mut attrs = HashMap::new();
                for partial in attr_list {
                    let mut kv = partial.expect_constructed().ok_or_else(|| {
                        LdapError::Protocol("PartialAttribute is not constructed".to_string())
                    })?;
                    if kv.len() != 2 {
                        return Err(LdapError::Protocol(
                            "PartialAttribute needs exactly 2 fields".to_string(),
                        ));
                    }
                    let values_tag = kv.pop().unwrap();
                    let name_tag = kv.pop().unwrap();
                    let name = expect_octet_string(name_tag)?;
                    let values: Vec<String> = values_tag
                        .expect_constructed()
                        .unwrap_or_default()
                        .into_iter()
                        .filter_map(|v| expect_octet_string(v).ok())
                        .collect();
                    attrs.insert(name, values);
                }
                Ok(SearchEntry::Object { dn, attrs })
            }
            id if id == app::SEARCH_RESULT_REFERENCE => {
                let uris = tag
                    .expect_constructed()
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|u| expect_octet_string(u).ok())
                    .collect();
                Ok(SearchEntry::Reference(uris))
            }
            _ => Err(LdapError::Protocol(format!(
                "unexpected tag {} in search result stream",
                tag.id
            ))),
        }
    }
}

/// A streamed item delivered to a search's sink.
#[derive(Clone, Debug)]
pub enum SearchItem {
    Entry(SearchEntry),
    Done(LdapResult),
    Error(String),
}

/// The common `LdapResult` plus whatever operation-specific fields
/// trailed it (only Extended responses carry any: `[10] responseName`,
/// `[11] response`).
#[derive(Clone, Debug)]
pub struct Outcome {
    pub result: LdapResult,
    pub extra: Vec<StructureTag>,
}

#[cfg(test)]
mod test {
    use super::*;
    use lber::structures::{ASNTag, Enumerated, OctetString, Sequence, Tag};

    fn ldap_result_tag(rc: i64) -> StructureTag {
        Tag::Sequence(Sequence {
            inner: vec![
                Tag::Enumerated(Enumerated {
                    inner: rc,
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: b"".to_vec(),
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: b"all good".to_vec(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        })
        .into_structure()
    }

    #[test]
    fn parses_common_result_fields() {
        let (result, rest) = parse_ldap_result(ldap_result_tag(0)).unwrap();
        assert_eq!(result.rc, 0);
        assert_eq!(result.text, "all good");
        assert!(rest.is_empty());
    }
}
