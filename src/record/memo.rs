//! Buffered protocol units awaiting (re)transmission.
//!
//! A memo records the epoch that was current when the unit was queued. Emitting
//! it later, possibly more than once, always resolves the cipher through that
//! epoch, so retransmissions reproduce the original framing even after the
//! write cipher has moved on.

use std::fmt;

use super::header::HandshakeHeader;
use crate::buffer::Buf;
use crate::types::{ContentType, MessageType, ProtocolVersion};

/// A queued change_cipher_spec or alert.
pub struct RecordMemo {
    content_type: ContentType,
    version: ProtocolVersion,
    epoch: u16,
    payload: Buf,
}

impl RecordMemo {
    pub fn new(content_type: ContentType, version: ProtocolVersion, epoch: u16, payload: Buf) -> Self {
        RecordMemo {
            content_type,
            version,
            epoch,
            payload,
        }
    }

    #[inline(always)]
    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    #[inline(always)]
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    #[inline(always)]
    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

/// A queued handshake message.
///
/// The payload is the message body without any header. `acquire_offset`
/// tracks how much of the body went out in fragments so far.
pub struct HandshakeMemo {
    record: RecordMemo,
    msg_type: MessageType,
    message_seq: u16,
    acquire_offset: usize,
}

impl HandshakeMemo {
    pub fn new(
        version: ProtocolVersion,
        epoch: u16,
        msg_type: MessageType,
        message_seq: u16,
        body: Buf,
    ) -> Self {
        HandshakeMemo {
            record: RecordMemo::new(ContentType::Handshake, version, epoch, body),
            msg_type,
            message_seq,
            acquire_offset: 0,
        }
    }

    #[inline(always)]
    pub fn msg_type(&self) -> MessageType {
        self.msg_type
    }

    #[inline(always)]
    pub fn message_seq(&self) -> u16 {
        self.message_seq
    }

    #[inline(always)]
    pub fn epoch(&self) -> u16 {
        self.record.epoch
    }

    #[inline(always)]
    pub fn acquire_offset(&self) -> usize {
        self.acquire_offset
    }

    pub fn body(&self) -> &[u8] {
        self.record.payload()
    }

    /// Body bytes not yet packed into a fragment.
    pub fn remaining(&self) -> usize {
        self.body().len() - self.acquire_offset
    }

    /// Header for a fragment covering `len` bytes from the current offset.
    pub fn fragment_header(&self, len: usize) -> HandshakeHeader {
        HandshakeHeader {
            msg_type: self.msg_type,
            length: self.body().len() as u32,
            message_seq: self.message_seq,
            fragment_offset: self.acquire_offset as u32,
            fragment_length: len as u32,
        }
    }

    /// Advance the offset past `len` bytes and return them.
    pub(crate) fn take(&mut self, len: usize) -> &[u8] {
        let start = self.acquire_offset;
        self.acquire_offset += len;
        &self.record.payload[start..start + len]
    }

    pub(crate) fn rewind(&mut self) {
        self.acquire_offset = 0;
    }

    /// Put the offset back to an earlier `offset`.
    pub(crate) fn rewind_to(&mut self, offset: usize) {
        self.acquire_offset = offset.min(self.acquire_offset);
    }
}

/// One entry in the flight buffer.
pub enum Memo {
    Record(RecordMemo),
    Handshake(HandshakeMemo),
}

impl Memo {
    pub fn content_type(&self) -> ContentType {
        match self {
            Memo::Record(r) => r.content_type,
            Memo::Handshake(_) => ContentType::Handshake,
        }
    }

    pub fn epoch(&self) -> u16 {
        match self {
            Memo::Record(r) => r.epoch,
            Memo::Handshake(h) => h.record.epoch,
        }
    }

    pub fn version(&self) -> ProtocolVersion {
        match self {
            Memo::Record(r) => r.version,
            Memo::Handshake(h) => h.record.version,
        }
    }

    pub fn is_alert(&self) -> bool {
        self.content_type() == ContentType::Alert
    }

    pub fn as_handshake(&self) -> Option<&HandshakeMemo> {
        match self {
            Memo::Handshake(h) => Some(h),
            Memo::Record(_) => None,
        }
    }

    /// Give up the payload buffer, for instance to return it to a pool.
    pub fn into_payload(self) -> Buf {
        match self {
            Memo::Record(r) => r.payload,
            Memo::Handshake(h) => h.record.payload,
        }
    }
}

impl fmt::Debug for Memo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Memo::Record(r) => f
                .debug_struct("RecordMemo")
                .field("content_type", &r.content_type)
                .field("epoch", &r.epoch)
                .field("len", &r.payload.len())
                .finish(),
            Memo::Handshake(h) => f
                .debug_struct("HandshakeMemo")
                .field("msg_type", &h.msg_type)
                .field("message_seq", &h.message_seq)
                .field("epoch", &h.record.epoch)
                .field("len", &h.body().len())
                .field("acquire_offset", &h.acquire_offset)
                .finish(),
        }
    }
}
