//! Flight buffer for outgoing DTLS handshake traffic.
//!
//! Memos accumulate until a message that ends a flight is queued. The flight
//! is then emitted record by record, and can be emitted again from the start
//! on retransmission. Queuing anything after a complete flight begins a new
//! one and recycles the old memo buffers. Memos that were never emitted, such
//! as an alert queued ahead of the new flight, are carried over.

use std::fmt;

use super::epoch::EpochCiphers;
use crate::buffer::{Buf, BufferPool};
use crate::record::{Ciphertext, FragmentLimits, HandshakeMemo, Memo, RecordMemo};
use crate::record::{DTLS_HEADER_LEN, HANDSHAKE_HEADER_LEN};
use crate::types::{ContentType, MessageType, ProtocolVersion};
use crate::Error;

#[derive(Default)]
pub(crate) struct Fragmenter {
    flight: Vec<Memo>,
    flight_is_ready: bool,
    /// Memos before this index may be emitted.
    ready_len: usize,
    acquire_index: usize,
    buffers_free: BufferPool,
}

impl Fragmenter {
    pub fn pop_buffer(&mut self) -> Buf {
        self.buffers_free.pop()
    }

    pub fn push_buffer(&mut self, buf: Buf) {
        self.buffers_free.push(buf);
    }

    pub fn queue_up_handshake(&mut self, memo: HandshakeMemo) {
        self.begin_flight_if_ready();

        let ends_flight = memo.msg_type().ends_flight();
        self.flight.push(Memo::Handshake(memo));

        if ends_flight {
            self.flight_is_ready = true;
            self.ready_len = self.flight.len();
        }
    }

    pub fn queue_up_change_cipher_spec(&mut self, version: ProtocolVersion, epoch: u16) {
        self.begin_flight_if_ready();

        let mut payload = self.buffers_free.pop();
        payload.push(1);
        self.flight.push(Memo::Record(RecordMemo::new(
            ContentType::ChangeCipherSpec,
            version,
            epoch,
            payload,
        )));
    }

    /// Alerts are sent right away, so they complete the flight.
    pub fn queue_up_alert(&mut self, version: ProtocolVersion, epoch: u16, level: u8, desc: u8) {
        self.begin_flight_if_ready();

        let mut payload = self.buffers_free.pop();
        payload.extend_from_slice(&[level, desc]);
        self.flight.push(Memo::Record(RecordMemo::new(
            ContentType::Alert,
            version,
            epoch,
            payload,
        )));
        self.flight_is_ready = true;
        self.ready_len = self.flight.len();
    }

    fn begin_flight_if_ready(&mut self) {
        if !self.flight_is_ready {
            return;
        }

        if self.acquire_index >= self.flight.len() {
            trace!("Begin new flight, dropping {} memos", self.flight.len());
            self.clear();
            return;
        }

        // Keep what has not gone out yet. It stays emittable.
        let emitted = self.acquire_index;
        trace!(
            "Begin new flight, dropping {} memos, keeping {}",
            emitted,
            self.flight.len() - emitted
        );
        for memo in self.flight.drain(..emitted) {
            self.buffers_free.push(memo.into_payload());
        }
        self.ready_len = self.flight.len();
        self.acquire_index = 0;
        self.flight_is_ready = false;
    }

    /// Drop all memos and return their buffers to the pool.
    pub fn clear(&mut self) {
        for memo in self.flight.drain(..) {
            self.buffers_free.push(memo.into_payload());
        }
        self.flight_is_ready = false;
        self.ready_len = 0;
        self.acquire_index = 0;
    }

    /// Emit the next record of the flight into `dst`.
    ///
    /// Handshake memos of the same epoch are packed together. A message that
    /// does not fit is continued in the next record at its acquire offset.
    /// If protecting the record fails, the flight is left as it was.
    pub fn acquire_ciphertext(
        &mut self,
        ciphers: &mut EpochCiphers,
        limits: &FragmentLimits,
        dst: &mut Buf,
    ) -> Result<Option<Ciphertext>, Error> {
        if self.acquire_index >= self.ready_len {
            return Ok(None);
        }

        let first = &self.flight[self.acquire_index];
        let epoch = first.epoch();
        let version = first.version();
        let content_type = first.content_type();

        let cipher = ciphers.for_epoch_mut(epoch)?;
        let fragment_size = limits.fragment_size(cipher, DTLS_HEADER_LEN);

        let record_start = dst.len();
        dst.resize(record_start + DTLS_HEADER_LEN + cipher.explicit_nonce_size(), 0);

        let start_index = self.acquire_index;
        let start_offset = self.flight[start_index]
            .as_handshake()
            .map_or(0, |h| h.acquire_offset());

        let mut handshake_type = None;

        match &self.flight[self.acquire_index] {
            Memo::Record(memo) => {
                if memo.payload().len() > fragment_size {
                    dst.truncate(record_start);
                    return Err(Error::PacketTooSmall(limits.packet_limit()));
                }
                dst.extend_from_slice(memo.payload());
                self.acquire_index += 1;
            }
            Memo::Handshake(_) => {
                let mut space = fragment_size;

                while self.acquire_index < self.ready_len {
                    let Some(Memo::Handshake(memo)) = self.flight.get_mut(self.acquire_index) else {
                        break;
                    };
                    if memo.epoch() != epoch {
                        break;
                    }

                    let remaining = memo.remaining();
                    let needed = HANDSHAKE_HEADER_LEN + remaining.min(1);
                    if space < needed {
                        if handshake_type.is_none() {
                            dst.truncate(record_start);
                            return Err(Error::PacketTooSmall(limits.packet_limit()));
                        }
                        break;
                    }

                    let chunk = remaining.min(space - HANDSHAKE_HEADER_LEN);
                    memo.fragment_header(chunk).serialize(dst);
                    dst.extend_from_slice(memo.take(chunk));
                    space -= HANDSHAKE_HEADER_LEN + chunk;
                    handshake_type = Some(memo.msg_type());

                    if memo.remaining() > 0 {
                        // Continues in the next record.
                        break;
                    }
                    self.acquire_index += 1;
                }
            }
        }

        let sequence_number =
            match cipher.encrypt(content_type, dst, record_start, DTLS_HEADER_LEN, version) {
                Ok(seq) => seq,
                Err(e) => {
                    dst.truncate(record_start);
                    self.restore(start_index, start_offset);
                    return Err(e);
                }
            };

        Ok(Some(Ciphertext {
            content_type,
            handshake_type,
            epoch,
            sequence_number,
        }))
    }

    /// Undo an acquire that started at `index` and `offset`. Memos after the
    /// first one were packed from their start.
    fn restore(&mut self, index: usize, offset: usize) {
        let end = self.acquire_index.min(self.flight.len().saturating_sub(1));
        for (i, memo) in self.flight.iter_mut().enumerate().take(end + 1).skip(index) {
            if let Memo::Handshake(h) = memo {
                h.rewind_to(if i == index { offset } else { 0 });
            }
        }
        self.acquire_index = index;
    }

    /// Rewind the flight so the next acquire starts from the first memo.
    pub fn set_retransmission(&mut self) {
        self.acquire_index = 0;
        for memo in &mut self.flight {
            if let Memo::Handshake(h) = memo {
                h.rewind();
            }
        }
    }

    pub fn has_alert(&self) -> bool {
        self.flight.iter().any(|m| m.is_alert())
    }

    /// An alert that has not been emitted yet.
    pub fn has_pending_alert(&self) -> bool {
        self.flight
            .iter()
            .skip(self.acquire_index)
            .any(|m| m.is_alert())
    }

    /// Nothing to emit.
    pub fn is_empty(&self) -> bool {
        self.acquire_index >= self.ready_len
    }

    /// A complete flight that has been emitted in full, and may be resent.
    pub fn is_retransmittable(&self) -> bool {
        self.flight_is_ready
            && !self.flight.is_empty()
            && self.acquire_index >= self.flight.len()
            && !self.has_alert()
    }

    pub fn is_flight_ready(&self) -> bool {
        self.flight_is_ready
    }

    pub fn len(&self) -> usize {
        self.flight.len()
    }

    /// Handshake types buffered in the current flight, in order.
    pub fn handshake_types(&self) -> Vec<MessageType> {
        self.flight
            .iter()
            .filter_map(|m| m.as_handshake().map(|h| h.msg_type()))
            .collect()
    }
}

impl fmt::Debug for Fragmenter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handshake = 0;
        let mut alert = 0;
        let mut ccs = 0;
        for memo in &self.flight {
            match memo.content_type() {
                ContentType::Handshake => handshake += 1,
                ContentType::Alert => alert += 1,
                _ => ccs += 1,
            }
        }

        f.debug_struct("Fragmenter")
            .field("len", &self.flight.len())
            .field("handshake", &handshake)
            .field("alert", &alert)
            .field("ccs", &ccs)
            .field("ready", &self.flight_is_ready)
            .field("acquire_index", &self.acquire_index)
            .field("buffers_free", &self.buffers_free)
            .finish()
    }
}
