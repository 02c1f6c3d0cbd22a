//! RFC 2696 PagedResults control and the continuation driver that uses
//! it to turn a multi-page search into a single logical one.

use lber::structures::{ASNTag, Integer, OctetString, Sequence, Tag};

use crate::controls::{RawControl, PAGED_RESULTS_OID};

/// `{ size, cookie }` as carried inside the PagedResults control value.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PagedResults {
    pub size: i32,
    pub cookie: Vec<u8>,
}

impl PagedResults {
    pub fn new(size: i32, cookie: Vec<u8>) -> PagedResults {
        PagedResults { size, cookie }
    }

    /// Encode the `{size, cookie}` SEQUENCE that makes up the control value.
    fn encode_value(&self) -> Vec<u8> {
        let tag = Tag::Sequence(Sequence {
            inner: vec![
                Tag::Integer(Integer {
                    inner: self.size as i64,
                    ..Default::default()
                }),
                Tag::OctetString(OctetString {
                    inner: self.cookie.clone(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        });
        lber::write::encode(&tag.into_structure())
    }

    pub fn to_raw(&self) -> RawControl {
        RawControl {
            ctype: PAGED_RESULTS_OID.to_string(),
            crit: false,
            val: Some(self.encode_value()),
        }
    }

    /// Decode a PagedResults control from its raw wire form, if `raw` is
    /// shaped like one (type already checked by the caller).
    pub fn from_raw(raw: &RawControl) -> Option<PagedResults> {
        let val = raw.val.as_ref()?;
        let (_, tag) = lber::parse::parse_tag(val).ok()??;
        let mut fields = tag.expect_constructed()?;
        fields.reverse();
        let size_tag = fields.pop()?;
        let size_bytes = size_tag.expect_primitive()?;
        let size = decode_signed(&size_bytes) as i32;
        let cookie = fields.pop()?.expect_primitive()?;
        Some(PagedResults { size, cookie })
    }

    pub fn is_exhausted(&self) -> bool {
        self.cookie.is_empty()
    }

    /// Build the request-side PagedResults control for the next page,
    /// reusing `size` but with the cookie the server handed back.
    pub fn continuation(&self, page_size: i32) -> PagedResults {
        PagedResults {
            size: page_size,
            cookie: self.cookie.clone(),
        }
    }
}

fn decode_signed(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xffu8 } else { 0 }; 8];
    let start = 8usize.saturating_sub(bytes.len());
    buf[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(8)..]);
    i64::from_be_bytes(buf)
}

/// Outcome of inspecting a search's terminal response for a
/// PagedResults control.
pub enum PagedOutcome {
    /// No PagedResults control was present; the search is complete.
    NotPaged,
    /// A PagedResults control was present with an empty cookie; the
    /// search is complete.
    Exhausted,
    /// A PagedResults control with a non-empty cookie: another page is
    /// available. Carries the control to install on the resent request.
    Continue(PagedResults),
}

/// Look for a PagedResults control among a response's controls and
/// classify the result per 4.H.
pub fn inspect(ctrls: &[crate::controls::Control]) -> PagedOutcome {
    for ctrl in ctrls {
        if let crate::controls::Control::PagedResults(pr) = ctrl {
            return if pr.is_exhausted() {
                PagedOutcome::Exhausted
            } else {
                PagedOutcome::Continue(pr.clone())
            };
        }
    }
    PagedOutcome::NotPaged
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_raw_control() {
        let pr = PagedResults::new(100, b"cookie-1".to_vec());
        let raw = pr.to_raw();
        assert_eq!(raw.ctype, PAGED_RESULTS_OID);
        let back = PagedResults::from_raw(&raw).unwrap();
        assert_eq!(back, pr);
    }

    #[test]
    fn empty_cookie_is_exhausted() {
        let pr = PagedResults::new(0, Vec::new());
        assert!(pr.is_exhausted());
    }
}
