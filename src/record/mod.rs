//! Record framing shared by the datagram and stream engines.

mod ciphertext;
mod header;
mod memo;

pub use ciphertext::Ciphertext;
pub use header::{split_tls_handshake, HandshakeHeader, RecordHeader};
pub use header::{DTLS_HEADER_LEN, HANDSHAKE_HEADER_LEN, TLS_HANDSHAKE_HEADER_LEN, TLS_HEADER_LEN};
pub use memo::{HandshakeMemo, Memo, RecordMemo};

use std::io;

use crate::buffer::Buf;
use crate::crypto::WriteCipher;
use crate::types::ProtocolVersion;
use crate::Config;

/// Largest plaintext fragment (RFC 5246 §6.2.1).
pub const MAX_PLAINTEXT: usize = 16384;

/// Largest protected fragment (RFC 5246 §6.2.3).
pub const MAX_CIPHERTEXT: usize = MAX_PLAINTEXT + 2048;

/// Size bounds for outgoing records. Can change during a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentLimits {
    pub packet_size: usize,
    pub max_record_size: usize,
    pub max_fragment_length: Option<usize>,
}

impl FragmentLimits {
    pub fn from_config(config: &Config) -> Self {
        FragmentLimits {
            packet_size: config.packet_size(),
            max_record_size: config.max_record_size(),
            max_fragment_length: config.max_fragment_length(),
        }
    }

    /// Largest complete record, header included.
    pub fn packet_limit(&self) -> usize {
        if self.packet_size == 0 {
            self.max_record_size
        } else {
            self.max_record_size.min(self.packet_size)
        }
    }

    /// Largest plaintext fragment `cipher` can protect within the limits.
    pub fn fragment_size(&self, cipher: &WriteCipher, header_size: usize) -> usize {
        let size = cipher
            .calculate_fragment_size(self.packet_limit(), header_size)
            .min(MAX_PLAINTEXT);

        match self.max_fragment_length {
            Some(max) => size.min(max),
            None => size,
        }
    }
}

/// Whether application data gets the 1/n-1 record split.
///
/// Only TLS 1.0 CBC needs it (BEAST), and never on the first application
/// record after a cipher change.
pub fn needs_split(
    version: ProtocolVersion,
    cipher: &WriteCipher,
    cbc_protection: bool,
    first_app_record: bool,
) -> bool {
    cbc_protection && version == ProtocolVersion::TLS1_0 && cipher.is_cbc() && !first_app_record
}

/// Destination for finished records.
pub trait RecordSink: Send {
    fn write_record(&mut self, record: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

impl<W: io::Write + Send> RecordSink for W {
    fn write_record(&mut self, record: &[u8]) -> io::Result<()> {
        self.write_all(record)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(self)
    }
}

/// Scatter list of application data sources.
///
/// Each source is a slice view. Consuming bytes re-slices the view, so the
/// caller sees exactly what is left of each buffer afterwards.
pub struct SourceCursor<'a, 'b> {
    sources: &'a mut [&'b [u8]],
}

impl<'a, 'b> SourceCursor<'a, 'b> {
    pub fn new(sources: &'a mut [&'b [u8]]) -> Self {
        SourceCursor { sources }
    }

    pub fn remaining(&self) -> usize {
        self.sources.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.iter().all(|s| s.is_empty())
    }

    /// Append up to `limit` bytes to `dst`, in source order.
    pub fn gather(&mut self, limit: usize, dst: &mut Buf) -> usize {
        let mut copied = 0;

        for src in self.sources.iter_mut() {
            if copied == limit {
                break;
            }
            let n = src.len().min(limit - copied);
            if n == 0 {
                continue;
            }
            dst.extend_from_slice(&src[..n]);
            *src = &src[n..];
            copied += n;
        }

        copied
    }
}
