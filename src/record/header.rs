//! Record and handshake header framing.

use crate::buffer::Buf;
use crate::types::{ContentType, MessageType, ProtocolVersion};
use crate::Error;

/// DTLS record header length: content_type(1) + version(2) + epoch(2) + seq(6) + length(2)
pub const DTLS_HEADER_LEN: usize = 13;

/// TLS record header length: content_type(1) + version(2) + length(2)
pub const TLS_HEADER_LEN: usize = 5;

/// DTLS handshake header length: msg_type(1) + length(3) + message_seq(2)
/// + fragment_offset(3) + fragment_length(3)
pub const HANDSHAKE_HEADER_LEN: usize = 12;

/// TLS handshake header length: msg_type(1) + length(3)
pub const TLS_HANDSHAKE_HEADER_LEN: usize = 4;

/// Record header as written in front of a protected fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub content_type: ContentType,
    pub version: ProtocolVersion,
    /// Epoch and 48-bit sequence number. Only present for DTLS.
    pub sequence: Option<(u16, u64)>,
    pub length: u16,
}

impl RecordHeader {
    pub fn header_len(&self) -> usize {
        if self.sequence.is_some() {
            DTLS_HEADER_LEN
        } else {
            TLS_HEADER_LEN
        }
    }

    /// Write into `out`, which must be exactly [`RecordHeader::header_len`] long.
    pub fn write(&self, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.header_len());

        out[0] = self.content_type.as_u8();
        out[1..3].copy_from_slice(&self.version.as_u16().to_be_bytes());

        let rest = match self.sequence {
            Some((epoch, seq)) => {
                out[3..5].copy_from_slice(&epoch.to_be_bytes());
                out[5..11].copy_from_slice(&seq.to_be_bytes()[2..]);
                &mut out[11..]
            }
            None => &mut out[3..],
        };
        rest.copy_from_slice(&self.length.to_be_bytes());
    }
}

/// DTLS handshake message header (RFC 6347 §4.2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeHeader {
    pub msg_type: MessageType,
    pub length: u32,
    pub message_seq: u16,
    pub fragment_offset: u32,
    pub fragment_length: u32,
}

impl HandshakeHeader {
    /// Header describing an unfragmented message, as fed to the transcript.
    pub fn unfragmented(msg_type: MessageType, length: u32, message_seq: u16) -> Self {
        HandshakeHeader {
            msg_type,
            length,
            message_seq,
            fragment_offset: 0,
            fragment_length: length,
        }
    }

    pub fn serialize(&self, output: &mut Buf) {
        output.push(self.msg_type.as_u8());
        output.extend_from_slice(&self.length.to_be_bytes()[1..]);
        output.extend_from_slice(&self.message_seq.to_be_bytes());
        output.extend_from_slice(&self.fragment_offset.to_be_bytes()[1..]);
        output.extend_from_slice(&self.fragment_length.to_be_bytes()[1..]);
    }

    /// Parse the 12 byte header at the start of `input`.
    pub fn parse(input: &[u8]) -> Option<HandshakeHeader> {
        if input.len() < HANDSHAKE_HEADER_LEN {
            return None;
        }
        let u24 = |b: &[u8]| u32::from_be_bytes([0, b[0], b[1], b[2]]);
        Some(HandshakeHeader {
            msg_type: MessageType::from_u8(input[0]),
            length: u24(&input[1..4]),
            message_seq: u16::from_be_bytes([input[4], input[5]]),
            fragment_offset: u24(&input[6..9]),
            fragment_length: u24(&input[9..12]),
        })
    }
}

/// Split a TLS style handshake message (type, u24 length, body).
pub fn split_tls_handshake(bytes: &[u8]) -> Result<(MessageType, &[u8]), Error> {
    if bytes.len() < TLS_HANDSHAKE_HEADER_LEN {
        return Err(Error::InvalidHandshake(format!(
            "{} bytes is shorter than the handshake header",
            bytes.len()
        )));
    }

    let msg_type = MessageType::from_u8(bytes[0]);
    let length = u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[TLS_HANDSHAKE_HEADER_LEN..];

    if body.len() != length {
        return Err(Error::InvalidHandshake(format!(
            "{:?} declares {} bytes, has {}",
            msg_type,
            length,
            body.len()
        )));
    }

    Ok((msg_type, body))
}
