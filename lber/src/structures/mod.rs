//! Typed builders for the handful of ASN.1 shapes LDAP messages use.
//!
//! Each type here knows how to turn itself into a [`StructureTag`], the
//! type-erased form the encoder actually walks. [`Tag`] is the sum type
//! used everywhere a message field is "any of the above" -- request and
//! response PDUs are built as trees of `Tag`.

mod boolean;
mod integer;
mod null;
mod octetstring;
mod sequence;

pub use boolean::Boolean;
pub use integer::{Enumerated, Integer};
pub use null::Null;
pub use octetstring::OctetString;
pub use sequence::{ExplicitTag, Sequence, Set};

use crate::structure::StructureTag;

/// Conversion from a typed builder into the decoded wire shape.
pub trait ASNTag {
    fn into_structure(self) -> StructureTag;
}

/// Any of the BER shapes used to build an LDAP message.
#[derive(Clone, Debug)]
pub enum Tag {
    Boolean(Boolean),
    Integer(Integer),
    Enumerated(Enumerated),
    OctetString(OctetString),
    Null(Null),
    Sequence(Sequence),
    Set(Set),
    ExplicitTag(ExplicitTag),
    /// An already-decoded tag, passed through verbatim. Used to splice
    /// controls and other opaque bytes into an otherwise typed tree.
    StructureTag(StructureTag),
}

impl ASNTag for Tag {
    fn into_structure(self) -> StructureTag {
        match self {
            Tag::Boolean(t) => t.into_structure(),
            Tag::Integer(t) => t.into_structure(),
            Tag::Enumerated(t) => t.into_structure(),
            Tag::OctetString(t) => t.into_structure(),
            Tag::Null(t) => t.into_structure(),
            Tag::Sequence(t) => t.into_structure(),
            Tag::Set(t) => t.into_structure(),
            Tag::ExplicitTag(t) => t.into_structure(),
            Tag::StructureTag(t) => t,
        }
    }
}
