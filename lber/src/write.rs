//! Definite-length BER encoder.
//!
//! The decoder tolerates indefinite-length input, but everything this
//! crate writes uses definite lengths -- simpler, and every LDAP server
//! worth talking to accepts it.

use std::io;

use bytes::{BufMut, BytesMut};

use crate::common::TagStructure;
use crate::structure::{StructureTag, PL};

fn identifier_octets(tag: &StructureTag) -> Vec<u8> {
    let class = tag.class as u8;
    let structure = if tag.is_constructed() {
        0b0010_0000
    } else {
        0
    };
    if tag.id < 0x1f {
        vec![class | structure | tag.id as u8]
    } else {
        let mut out = vec![class | structure | 0x1f];
        let mut n = tag.id;
        let mut rev = Vec::new();
        rev.push((n & 0x7f) as u8);
        n >>= 7;
        while n > 0 {
            rev.push((n & 0x7f) as u8 | 0x80);
            n >>= 7;
        }
        rev.reverse();
        out.extend(rev);
        out
    }
}

fn length_octets(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let be = len.to_be_bytes();
        let first_nonzero = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
        let body = &be[first_nonzero..];
        let mut out = vec![0x80 | body.len() as u8];
        out.extend_from_slice(body);
        out
    }
}

fn write_into(buf: &mut BytesMut, tag: &StructureTag) {
    match &tag.payload {
        PL::P(bytes) => {
            buf.put_slice(&identifier_octets(tag));
            buf.put_slice(&length_octets(bytes.len()));
            buf.put_slice(bytes);
        }
        PL::C(children) => {
            let mut body = BytesMut::new();
            for child in children {
                write_into(&mut body, child);
            }
            buf.put_slice(&identifier_octets(tag));
            buf.put_slice(&length_octets(body.len()));
            buf.put_slice(&body);
        }
    }
}

/// Definite-length-encode `tag` and append the result to `buf`.
pub fn encode_into(buf: &mut BytesMut, tag: &StructureTag) -> io::Result<()> {
    write_into(buf, tag);
    Ok(())
}

/// Definite-length-encode `tag` into a fresh buffer.
pub fn encode(tag: &StructureTag) -> Vec<u8> {
    let mut buf = BytesMut::new();
    write_into(&mut buf, tag);
    buf.to_vec()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::TagClass;

    #[test]
    fn round_trips_through_parse() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 2,
            payload: PL::P(vec![1, 2, 3]),
        };
        let bytes = encode(&tag);
        let (consumed, decoded) = crate::parse::parse_tag(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, tag);
    }

    #[test]
    fn long_length_uses_minimal_octets() {
        assert_eq!(length_octets(0x7f), vec![0x7f]);
        assert_eq!(length_octets(0x80), vec![0x81, 0x80]);
        assert_eq!(length_octets(300), vec![0x82, 0x01, 0x2c]);
    }

    #[test]
    fn high_tag_number_form() {
        let tag = StructureTag {
            class: TagClass::Application,
            id: 30,
            payload: PL::P(vec![]),
        };
        let bytes = encode(&tag);
        let (_, decoded) = crate::parse::parse_tag(&bytes).unwrap().unwrap();
        assert_eq!(decoded.id, 30);
    }

    #[test]
    fn nested_constructed_round_trips() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![StructureTag {
                class: TagClass::Universal,
                id: 4,
                payload: PL::P(b"cn=admin".to_vec()),
            }]),
        };
        let bytes = encode(&tag);
        let (consumed, decoded) = crate::parse::parse_tag(&bytes).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded, tag);
    }
}
