//! A small ASN.1/BER codec restricted to what LDAP (RFC 4511) needs.
//!
//! This crate is not a general-purpose ASN.1 library. It knows about the
//! handful of universal types LDAP messages are built from (`BOOLEAN`,
//! `INTEGER`/`ENUMERATED`, `OCTET STRING`, `NULL`, `SEQUENCE`/`SET`) plus
//! application- and context-tagged variants of the same shapes, and it
//! decodes both definite- and indefinite-length encodings while only ever
//! emitting definite-length output, per RFC 4511's wire contract.

pub mod common;
pub mod structure;
pub mod structures;
pub mod universal;

pub mod parse;
pub mod write;

pub use common::TagClass;
pub use parse::{parse_tag, parse_uint, DecodeError};
pub use structure::{StructureTag, PL};
pub use structures::{
    ASNTag, Boolean, Enumerated, ExplicitTag, Integer, Null, OctetString, Sequence, Set, Tag,
};
pub use universal::Types;
