//! LDAP controls: the OID-tagged modifiers attached to requests and
//! responses. The core only interprets one control structurally
//! (PagedResults, RFC 2696) because it has to drive paged search
//! continuation; everything else is carried as opaque bytes.

use lber::common::TagClass;
use lber::structure::{StructureTag, PL};
use lber::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use lber::universal::Types;

use crate::error::{LdapError, Result};
use crate::paged::PagedResults;

pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

/// A control as carried on the wire: `{ oid, criticality, value }`.
#[derive(Clone, Debug, PartialEq)]
pub struct RawControl {
    pub ctype: String,
    pub crit: bool,
    pub val: Option<Vec<u8>>,
}

/// A control recognized by the core, or an opaque passthrough.
#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    PagedResults(PagedResults),
    Raw(RawControl),
}

impl Control {
    pub fn raw(&self) -> RawControl {
        match self {
            Control::PagedResults(pr) => pr.to_raw(),
            Control::Raw(raw) => raw.clone(),
        }
    }
}

/// Build the wire `Tag` for a single control.
pub fn construct_control(ctrl: &RawControl) -> Tag {
    let mut inner = vec![Tag::OctetString(OctetString {
        inner: ctrl.ctype.clone().into_bytes(),
        ..Default::default()
    })];
    if ctrl.crit {
        inner.push(Tag::Boolean(Boolean {
            inner: true,
            ..Default::default()
        }));
    }
    if let Some(ref val) = ctrl.val {
        inner.push(Tag::OctetString(OctetString {
            inner: val.clone(),
            ..Default::default()
        }));
    }
    Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    })
}

/// Build the `[3] Controls` envelope wrapping zero or more controls. The
/// caller decides whether to splice this into the outer LDAPMessage
/// SEQUENCE; an empty `ctrls` yields `None`.
pub fn construct_controls(ctrls: &[RawControl]) -> Option<StructureTag> {
    if ctrls.is_empty() {
        return None;
    }
    let seq = Tag::Sequence(Sequence {
        id: 0,
        class: TagClass::Context,
        inner: ctrls.iter().map(construct_control).collect(),
    });
    Some(seq.into_structure())
}

/// Parse the `[3] Controls` envelope (already unwrapped to its child
/// tags) into typed `Control` values.
pub fn parse_controls(tags: Vec<StructureTag>) -> Result<Vec<Control>> {
    tags.into_iter().map(parse_one_control).collect()
}

fn parse_one_control(tag: StructureTag) -> Result<Control> {
    let mut fields = tag
        .expect_constructed()
        .ok_or_else(|| LdapError::Protocol("control is not constructed".to_string()))?;
    fields.reverse();

    let ctype = fields
        .pop()
        .and_then(StructureTag::expect_primitive)
        .ok_or_else(|| LdapError::Protocol("control missing type".to_string()))?;
    let ctype = String::from_utf8(ctype)
        .map_err(|_| LdapError::Protocol("control OID is not UTF-8".to_string()))?;

    let mut crit = false;
    let mut val = None;
    for field in fields.into_iter().rev() {
        match field.id {
            id if id == Types::Boolean as u64 && matches!(field.class, TagClass::Universal) => {
                let b = field.expect_primitive().unwrap_or_default();
                crit = b.first().copied().unwrap_or(0) != 0;
            }
            _ => {
                val = field.expect_primitive();
            }
        }
    }

    let raw = RawControl { ctype, crit, val };
    if raw.ctype == PAGED_RESULTS_OID {
        if let Some(pr) = PagedResults::from_raw(&raw) {
            return Ok(Control::PagedResults(pr));
        }
    }
    Ok(Control::Raw(raw))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_raw_control() {
        let raw = RawControl {
            ctype: "1.2.3.4".to_string(),
            crit: true,
            val: Some(vec![1, 2, 3]),
        };
        let tag = construct_control(&raw).into_structure();
        let encoded = lber::write::encode(&tag);
        let (_, decoded) = lber::parse::parse_tag(&encoded).unwrap().unwrap();
        let parsed = parse_one_control(decoded).unwrap();
        assert_eq!(parsed, Control::Raw(raw));
    }
}
