//! Write sequence numbers and usage limits.

use crate::Error;

/// Largest 48-bit DTLS sequence number.
pub const DTLS_MAX_SEQUENCE: u64 = (1 << 48) - 1;

/// Largest 64-bit TLS sequence number.
pub const TLS_MAX_SEQUENCE: u64 = u64::MAX;

/// Which transport the sequence numbers are framed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// 64-bit implicit sequence number (TLS).
    Stream,
    /// 16-bit epoch followed by a 48-bit explicit sequence number (DTLS).
    Datagram,
}

/// Issues per-epoch record sequence numbers.
///
/// The counter only moves forward. Callers must check
/// [`Authenticator::seq_num_overflow`] before encrypting; wrapping would reuse
/// a nonce under the same key.
#[derive(Debug, Clone, Copy)]
pub struct Authenticator {
    kind: SequenceKind,
    epoch: u16,
    sequence: u64,
    key_limit: Option<u64>,
}

impl Authenticator {
    pub fn new(kind: SequenceKind) -> Self {
        Authenticator {
            kind,
            epoch: 0,
            sequence: 0,
            key_limit: None,
        }
    }

    /// Start counting at `sequence` instead of 0.
    pub fn with_sequence_number(mut self, sequence: u64) -> Self {
        self.sequence = sequence.min(self.max_sequence());
        self
    }

    /// Cap the number of records this key may protect.
    pub fn with_key_limit(mut self, limit: Option<u64>) -> Self {
        self.key_limit = limit;
        self
    }

    #[inline(always)]
    pub fn kind(&self) -> SequenceKind {
        self.kind
    }

    #[inline(always)]
    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: u16) {
        self.epoch = epoch;
    }

    /// The sequence number the next record will get.
    #[inline(always)]
    pub fn sequence_number(&self) -> u64 {
        self.sequence
    }

    pub fn max_sequence(&self) -> u64 {
        match self.kind {
            SequenceKind::Stream => TLS_MAX_SEQUENCE,
            SequenceKind::Datagram => DTLS_MAX_SEQUENCE,
        }
    }

    /// Within 256 records of exhaustion.
    pub fn seq_num_overflow(&self) -> bool {
        self.sequence >= self.max_sequence() & !0xFF
    }

    /// Past 2^32 below exhaustion. Time to renegotiate or rekey.
    pub fn seq_num_is_huge(&self) -> bool {
        self.sequence >= self.max_sequence() & !0xFFFF_FFFF
    }

    pub fn at_key_limit(&self) -> bool {
        self.key_limit.is_some_and(|limit| self.sequence >= limit)
    }

    /// The 8 byte sequence value as it goes into MAC and AAD input.
    ///
    /// For DTLS the epoch occupies the top two bytes.
    pub fn sequence_bytes(&self) -> [u8; 8] {
        let value = match self.kind {
            SequenceKind::Stream => self.sequence,
            SequenceKind::Datagram => ((self.epoch as u64) << 48) | self.sequence,
        };
        value.to_be_bytes()
    }

    /// Consume the current sequence number.
    pub(crate) fn advance(&mut self) -> Result<u64, Error> {
        if self.seq_num_overflow() {
            return Err(Error::SequenceOverflow);
        }
        let current = self.sequence;
        self.sequence += 1;
        Ok(current)
    }
}
