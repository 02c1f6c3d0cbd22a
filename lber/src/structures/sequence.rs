use crate::common::TagClass;
use crate::structure::{StructureTag, PL};
use crate::universal::Types;

use super::{ASNTag, Tag};

/// `SEQUENCE OF`-shaped constructed tag: an ordered list of child tags.
/// Covers both LDAP's `SEQUENCE` (the message envelope, most request and
/// response bodies) and attribute/value lists.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

/// `SET OF`-shaped constructed tag, used for attribute value lists and
/// the top-level AttributeList in an add request.
#[derive(Clone, Debug, PartialEq)]
pub struct Set {
    pub id: u64,
    pub class: TagClass,
    pub inner: Vec<Tag>,
}

/// A single child tag wrapped in an explicit context tag, e.g. the
/// `[0] Credentials` choice in a bind request or a `[3] Controls`
/// envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitTag {
    pub id: u64,
    pub class: TagClass,
    pub inner: Box<Tag>,
}

fn seq_into_structure(id: u64, class: TagClass, inner: Vec<Tag>) -> StructureTag {
    StructureTag {
        id,
        class,
        payload: PL::C(inner.into_iter().map(ASNTag::into_structure).collect()),
    }
}

impl ASNTag for Sequence {
    fn into_structure(self) -> StructureTag {
        seq_into_structure(self.id, self.class, self.inner)
    }
}

impl ASNTag for Set {
    fn into_structure(self) -> StructureTag {
        seq_into_structure(self.id, self.class, self.inner)
    }
}

impl ASNTag for ExplicitTag {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::C(vec![(*self.inner).into_structure()]),
        }
    }
}

impl Default for Sequence {
    fn default() -> Sequence {
        Sequence {
            id: Types::Sequence as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}

impl Default for Set {
    fn default() -> Set {
        Set {
            id: Types::Set as u64,
            class: TagClass::Universal,
            inner: Vec::new(),
        }
    }
}
