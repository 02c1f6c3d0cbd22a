//! Hand-rolled BER decoder.
//!
//! Unlike the encoder (which only ever emits definite-length content),
//! the decoder accepts both definite and indefinite length encodings on
//! input -- some LDAP servers emit indefinite-length `SEQUENCE`s, and
//! RFC 4511 requires clients to tolerate it. Every entry point reports
//! "not enough bytes yet" rather than erroring so it composes directly
//! with `tokio_util::codec::Decoder`, which re-polls with more data
//! once it arrives.

use std::fmt;

use crate::common::{TagClass, TagStructure};
use crate::structure::{StructureTag, PL};

/// Outcome of trying to decode one tag's worth of BER from a buffer.
#[derive(Debug, PartialEq)]
pub enum DecodeError {
    /// The buffer holds a structurally invalid encoding (bad tag class,
    /// length with the reserved `0xff` marker, content overruns).
    Malformed(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Malformed(msg) => write!(f, "malformed BER: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Interpret a byte string as an unsigned big-endian integer. Used for
/// the long form of a BER length.
pub fn parse_uint(i: &[u8]) -> u64 {
    i.iter().fold(0u64, |acc, &byte| (acc << 8) | byte as u64)
}

struct Identifier {
    class: TagClass,
    structure: TagStructure,
    id: u64,
    consumed: usize,
}

fn parse_identifier(i: &[u8]) -> Result<Option<Identifier>, DecodeError> {
    if i.is_empty() {
        return Ok(None);
    }
    let first = i[0];
    let class = TagClass::from_u8(first).ok_or_else(|| {
        DecodeError::Malformed("impossible tag class".to_string())
    })?;
    let structure = TagStructure::from_u8(first);
    let low = first & 0b0001_1111;

    if low != 0b0001_1111 {
        return Ok(Some(Identifier {
            class,
            structure,
            id: low as u64,
            consumed: 1,
        }));
    }

    // High tag number form: subsequent base-128 bytes, MSB as continuation.
    let mut id: u64 = 0;
    let mut idx = 1;
    loop {
        if idx >= i.len() {
            return Ok(None);
        }
        let byte = i[idx];
        id = (id << 7) | (byte & 0x7f) as u64;
        idx += 1;
        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok(Some(Identifier {
        class,
        structure,
        id,
        consumed: idx,
    }))
}

enum Length {
    Definite(u64),
    Indefinite,
}

fn parse_length(i: &[u8]) -> Result<Option<(Length, usize)>, DecodeError> {
    if i.is_empty() {
        return Ok(None);
    }
    let first = i[0];
    if first & 0x80 == 0 {
        return Ok(Some((Length::Definite((first & 0x7f) as u64), 1)));
    }
    let count = first & 0x7f;
    if count == 0 {
        return Ok(Some((Length::Indefinite, 1)));
    }
    if count == 0x7f {
        return Err(DecodeError::Malformed("reserved length octet 0xff".to_string()));
    }
    let count = count as usize;
    if i.len() < 1 + count {
        return Ok(None);
    }
    Ok(Some((Length::Definite(parse_uint(&i[1..1 + count])), 1 + count)))
}

/// Try to decode one BER tag from the front of `i`.
///
/// Returns `Ok(None)` when `i` doesn't yet hold a complete tag (the
/// caller should wait for more bytes), `Ok(Some((consumed, tag)))` on
/// success, and `Err` on a structurally invalid encoding.
pub fn parse_tag(i: &[u8]) -> Result<Option<(usize, StructureTag)>, DecodeError> {
    let ident = match parse_identifier(i)? {
        Some(ident) => ident,
        None => return Ok(None),
    };
    let rest = &i[ident.consumed..];
    let (len, len_consumed) = match parse_length(rest)? {
        Some(l) => l,
        None => return Ok(None),
    };
    let header_len = ident.consumed + len_consumed;
    let body = &i[header_len..];

    match (len, ident.structure) {
        (Length::Definite(n), TagStructure::Primitive) => {
            let n = n as usize;
            if body.len() < n {
                return Ok(None);
            }
            Ok(Some((
                header_len + n,
                StructureTag {
                    class: ident.class,
                    id: ident.id,
                    payload: PL::P(body[..n].to_vec()),
                },
            )))
        }
        (Length::Definite(n), TagStructure::Constructed) => {
            let n = n as usize;
            if body.len() < n {
                return Ok(None);
            }
            let content = &body[..n];
            let mut children = Vec::new();
            let mut consumed = 0;
            while consumed < content.len() {
                match parse_tag(&content[consumed..])? {
                    Some((used, child)) => {
                        children.push(child);
                        consumed += used;
                    }
                    None => {
                        return Err(DecodeError::Malformed(
                            "constructed tag's declared length split a child tag".to_string(),
                        ))
                    }
                }
            }
            Ok(Some((
                header_len + n,
                StructureTag {
                    class: ident.class,
                    id: ident.id,
                    payload: PL::C(children),
                },
            )))
        }
        (Length::Indefinite, TagStructure::Primitive) => Err(DecodeError::Malformed(
            "primitive tag cannot use indefinite length".to_string(),
        )),
        (Length::Indefinite, TagStructure::Constructed) => {
            let mut children = Vec::new();
            let mut consumed = 0;
            loop {
                if body.len() < consumed + 2 {
                    return Ok(None);
                }
                if body[consumed] == 0x00 && body[consumed + 1] == 0x00 {
                    consumed += 2;
                    break;
                }
                match parse_tag(&body[consumed..])? {
                    Some((used, child)) => {
                        children.push(child);
                        consumed += used;
                    }
                    None => return Ok(None),
                }
            }
            Ok(Some((
                header_len + consumed,
                StructureTag {
                    class: ident.class,
                    id: ident.id,
                    payload: PL::C(children),
                },
            )))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_primitive() {
        let bytes: Vec<u8> = vec![2, 2, 255, 127];
        let result_tag = StructureTag {
            class: TagClass::Universal,
            id: 2u64,
            payload: PL::P(vec![255, 127]),
        };

        let (consumed, tag) = parse_tag(&bytes[..]).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tag, result_tag);
    }

    #[test]
    fn test_constructed() {
        let bytes: Vec<u8> = vec![
            48, 14, 12, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33,
        ];
        let result_tag = StructureTag {
            class: TagClass::Universal,
            id: 16u64,
            payload: PL::C(vec![StructureTag {
                class: TagClass::Universal,
                id: 12u64,
                payload: PL::P(vec![72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33]),
            }]),
        };

        let (consumed, tag) = parse_tag(&bytes[..]).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tag, result_tag);
    }

    #[test]
    fn test_long_length() {
        let mut bytes: Vec<u8> = vec![0x30, 0x81, 0x0e];
        bytes.extend_from_slice(&[
            12, 12, 72, 101, 108, 108, 111, 32, 87, 111, 114, 108, 100, 33,
        ]);
        let (consumed, tag) = parse_tag(&bytes[..]).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tag.id, 16);
        assert!(tag.is_constructed());
    }

    #[test]
    fn test_incomplete_returns_none() {
        let bytes: Vec<u8> = vec![2, 5, 1, 2];
        assert_eq!(parse_tag(&bytes[..]).unwrap(), None);
    }

    #[test]
    fn test_indefinite_length_constructed() {
        // SEQUENCE, indefinite length, one INTEGER(5), end-of-contents.
        let bytes: Vec<u8> = vec![0x30, 0x80, 0x02, 0x01, 0x05, 0x00, 0x00];
        let (consumed, tag) = parse_tag(&bytes[..]).unwrap().unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(tag.class, TagClass::Universal);
        assert_eq!(tag.id, 16);
        match tag.payload {
            PL::C(children) => {
                assert_eq!(children.len(), 1);
                assert_eq!(children[0].payload, PL::P(vec![5]));
            }
            PL::P(_) => panic!("expected constructed payload"),
        }
    }

    #[test]
    fn test_indefinite_length_incomplete_waits() {
        let bytes: Vec<u8> = vec![0x30, 0x80, 0x02, 0x01, 0x05];
        assert_eq!(parse_tag(&bytes[..]).unwrap(), None);
    }

    #[test]
    fn test_indefinite_primitive_rejected() {
        let bytes: Vec<u8> = vec![0x02, 0x80];
        assert!(parse_tag(&bytes[..]).is_err());
    }
}
