use crate::common::TagClass;
use crate::structure::{StructureTag, PL};
use crate::universal::Types;

use super::ASNTag;

/// Octet string value: the workhorse type for DNs, attribute values,
/// filter assertions, and any other raw bytes on the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct OctetString {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<u8>,
}

impl ASNTag for OctetString {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(self.inner),
        }
    }
}

impl Default for OctetString {
    fn default() -> OctetString {
        OctetString {
            id: Types::OctetString as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

impl From<String> for OctetString {
    fn from(s: String) -> OctetString {
        OctetString {
            inner: s.into_bytes(),
            ..Default::default()
        }
    }
}

impl From<Vec<u8>> for OctetString {
    fn from(v: Vec<u8>) -> OctetString {
        OctetString {
            inner: v,
            ..Default::default()
        }
    }
}

impl<'a> From<&'a str> for OctetString {
    fn from(s: &'a str) -> OctetString {
        OctetString {
            inner: s.as_bytes().to_vec(),
            ..Default::default()
        }
    }
}
