use crate::common::TagClass;
use crate::structure::{StructureTag, PL};
use crate::universal::Types;

use super::ASNTag;

/// The ASN.1 `NULL` value, used e.g. for the unauthenticated simple bind
/// credentials and a handful of exop request bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Null {
    pub id: u64,
    pub class: TagClass,
}

impl ASNTag for Null {
    fn into_structure(self) -> StructureTag {
        StructureTag {
            id: self.id,
            class: self.class,
            payload: PL::P(Vec::new()),
        }
    }
}

impl Default for Null {
    fn default() -> Null {
        Null {
            id: Types::Null as u64,
            class: TagClass::Universal,
        }
    }
}
