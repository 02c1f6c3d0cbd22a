use crate::common::TagClass;
use crate::structure::{StructureTag, PL};
use crate::universal::Types;

use super::ASNTag;

/// Integer value (two's complement, variable length, minimal encoding).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integer {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// An `INTEGER`-shaped value under a different universal tag (used for
/// LDAP `ENUMERATED` fields, e.g. scope, derefAliases, modify operation).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Enumerated {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// Minimal two's complement big-endian encoding of `inner`: the fewest
/// bytes such that the value round-trips and the leading bit correctly
/// signals sign.
fn encode_twos_complement(inner: i64) -> Vec<u8> {
    if inner == 0 {
        return vec![0];
    }
    let bytes = inner.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let byte = bytes[start];
        let next = bytes[start + 1];
        let byte_is_sign_extension = if inner < 0 {
            byte == 0xff && next & 0x80 != 0
        } else {
            byte == 0x00 && next & 0x80 == 0
        };
        if !byte_is_sign_extension {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn i_e_into_structure(id: u64, class: TagClass, inner: i64) -> StructureTag {
    StructureTag {
        id,
        class,
        payload: PL::P(encode_twos_complement(inner)),
    }
}

impl ASNTag for Integer {
    fn into_structure(self) -> StructureTag {
        i_e_into_structure(self.id, self.class, self.inner)
    }
}

impl ASNTag for Enumerated {
    fn into_structure(self) -> StructureTag {
        i_e_into_structure(self.id, self.class, self.inner)
    }
}

impl Default for Integer {
    fn default() -> Integer {
        Integer {
            id: Types::Integer as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

impl Default for Enumerated {
    fn default() -> Enumerated {
        Enumerated {
            id: Types::Enumerated as u64,
            class: TagClass::Universal,
            inner: 0,
        }
    }
}

/// Decode a BER-encoded two's complement integer.
pub fn decode_twos_complement(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xffu8 } else { 0 }; 8];
    let start = 8usize.saturating_sub(bytes.len());
    buf[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(8)..]);
    i64::from_be_bytes(buf)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_positive_is_one_byte() {
        assert_eq!(encode_twos_complement(127), vec![127]);
    }

    #[test]
    fn boundary_positive_gets_leading_zero() {
        // 128 doesn't fit in a single signed byte; a zero pad byte must
        // be inserted so the leading bit doesn't read as negative.
        assert_eq!(encode_twos_complement(128), vec![0, 128]);
    }

    #[test]
    fn negative_round_trips() {
        for v in [-1i64, -128, -129, -32768, i64::MIN, i64::MAX, 0] {
            let enc = encode_twos_complement(v);
            assert_eq!(decode_twos_complement(&enc), v, "value {v}");
        }
    }
}
