//! Framing of the outer LDAPMessage SEQUENCE on top of the `lber` codec.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use lber::common::TagClass;
use lber::structures::{ASNTag, Integer, Sequence, Tag};
use lber::universal::Types;

use crate::controls::{self, RawControl};
use crate::error::LdapError;
use crate::message::LdapMessage;

fn decode_int(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut buf = [if negative { 0xffu8 } else { 0 }; 8];
    let start = 8usize.saturating_sub(bytes.len());
    buf[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(8)..]);
    i64::from_be_bytes(buf)
}

/// One outbound request: the operation's `protocolOp` tag plus any
/// request controls to attach.
pub struct OutMessage {
    pub id: i32,
    pub protocol_op: Tag,
    pub controls: Vec<RawControl>,
}

pub struct LdapCodec;

impl Decoder for LdapCodec {
    type Item = LdapMessage;
    type Error = LdapError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<LdapMessage>, LdapError> {
        let (consumed, tag) = match lber::parse::parse_tag(buf)
            .map_err(|e| LdapError::Protocol(e.to_string()))?
        {
            Some(v) => v,
            None => return Ok(None),
        };

        let envelope = tag
            .match_class(TagClass::Universal)
            .and_then(|t| t.match_id(Types::Sequence as u64))
            .ok_or_else(|| LdapError::Protocol("top-level tag is not a SEQUENCE".to_string()))?;
        let mut fields = envelope
            .expect_constructed()
            .ok_or_else(|| LdapError::Protocol("LDAPMessage is not constructed".to_string()))?;
        if fields.is_empty() {
            return Err(LdapError::Protocol("empty LDAPMessage".to_string()));
        }

        let id_tag = fields.remove(0);
        let id = decode_int(
            &id_tag
                .expect_primitive()
                .ok_or_else(|| LdapError::Protocol("messageID is not primitive".to_string()))?,
        ) as i32;

        if fields.is_empty() {
            return Err(LdapError::Protocol(
                "LDAPMessage missing protocolOp".to_string(),
            ));
        }

        let controls = if fields.len() > 1
            && fields.last().map(|t| t.id) == Some(0)
            && matches!(fields.last().unwrap().class, TagClass::Context)
        {
            let ctrl_tag = fields.pop().unwrap();
            let ctrl_children = ctrl_tag.expect_constructed().unwrap_or_default();
            controls::parse_controls(ctrl_children)?
        } else {
            Vec::new()
        };

        let protocol_op = fields
            .pop()
            .ok_or_else(|| LdapError::Protocol("LDAPMessage missing protocolOp".to_string()))?;

        buf.split_to(consumed);

        Ok(Some(LdapMessage {
            id,
            protocol_op,
            controls,
        }))
    }
}

impl Encoder<OutMessage> for LdapCodec {
    type Error = LdapError;

    fn encode(&mut self, msg: OutMessage, dst: &mut BytesMut) -> Result<(), LdapError> {
        let mut inner = vec![
            Tag::Integer(Integer {
                inner: msg.id as i64,
                ..Default::default()
            }),
            msg.protocol_op,
        ];
        if let Some(ctrls) = controls::construct_controls(&msg.controls) {
            inner.push(Tag::StructureTag(ctrls));
        }
        let envelope = Tag::Sequence(Sequence {
            inner,
            ..Default::default()
        });
        let structure = envelope.into_structure();
        lber::write::encode_into(dst, &structure)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use lber::structures::OctetString;

    #[test]
    fn round_trips_a_message_without_controls() {
        let mut codec = LdapCodec;
        let mut buf = BytesMut::new();
        let out = OutMessage {
            id: 7,
            protocol_op: Tag::OctetString(OctetString {
                id: 10,
                class: TagClass::Application,
                inner: b"cn=foo".to_vec(),
            }),
            controls: Vec::new(),
        };
        codec.encode(out, &mut buf).unwrap();

        let msg = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(msg.id, 7);
        assert_eq!(msg.protocol_op.id, 10);
        assert!(msg.controls.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_buffer_returns_none() {
        let mut codec = LdapCodec;
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[0x30, 0x05, 0x02, 0x01]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }
}
