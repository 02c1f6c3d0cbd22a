//! The decoded, type-erased form every BER tag parses into.

use crate::common::TagClass;

/// Payload of a decoded tag: either raw bytes (primitive) or nested tags
/// (constructed).
#[derive(Clone, Debug, PartialEq)]
pub enum PL {
    P(Vec<u8>),
    C(Vec<StructureTag>),
}

/// A fully decoded BER tag: class, tag number, and payload.
///
/// This is the common currency between the decoder and every caller that
/// needs to inspect a message without committing to one of the typed
/// `structures::Tag` variants up front (response parsing, control
/// dispatch).
#[derive(Clone, Debug, PartialEq)]
pub struct StructureTag {
    pub class: TagClass,
    pub id: u64,
    pub payload: PL,
}

impl StructureTag {
    /// Return `Some(self)` if the tag's class matches, else `None`.
    pub fn match_class(self, class: TagClass) -> Option<StructureTag> {
        if self.class == class {
            Some(self)
        } else {
            None
        }
    }

    /// Return `Some(self)` if the tag number matches, else `None`.
    pub fn match_id(self, id: u64) -> Option<StructureTag> {
        if self.id == id {
            Some(self)
        } else {
            None
        }
    }

    /// Unwrap a primitive payload, consuming the tag.
    pub fn expect_primitive(self) -> Option<Vec<u8>> {
        match self.payload {
            PL::P(v) => Some(v),
            PL::C(_) => None,
        }
    }

    /// Unwrap a constructed payload, consuming the tag.
    pub fn expect_constructed(self) -> Option<Vec<StructureTag>> {
        match self.payload {
            PL::C(v) => Some(v),
            PL::P(_) => None,
        }
    }

    pub fn is_constructed(&self) -> bool {
        matches!(self.payload, PL::C(_))
    }
}
