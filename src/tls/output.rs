use std::mem;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::Buf;
use crate::crypto::WriteCipher;
use crate::record::{needs_split, split_tls_handshake, Ciphertext, FragmentLimits, RecordSink};
use crate::record::{SourceCursor, TLS_HEADER_LEN};
use crate::transcript::{HandshakeHash, TranscriptSink};
use crate::types::{AlertDescription, AlertLevel, ContentType, ProtocolVersion};
use crate::{Config, Error};

/// Output record layer for stream transports.
///
/// Records are written to the sink as soon as they are complete. Handshake
/// messages are collected until [`TlsOutputRecord::flush`] or until a full
/// record worth has built up. There is no retransmission, and every write
/// after close fails with [`Error::ConnectionClosed`].
pub struct TlsOutputRecord<S: RecordSink, T: TranscriptSink = HandshakeHash> {
    config: Arc<Config>,
    pub(crate) inner: Mutex<Inner<S, T>>,
}

pub(crate) struct Inner<S, T> {
    limits: FragmentLimits,
    cbc_protection: bool,
    version: ProtocolVersion,
    cipher: WriteCipher,
    sink: S,
    transcript: T,
    // Handshake plaintext not yet framed.
    pending: Buf,
    // Scratch space for one record.
    record: Buf,
    first_app_record: bool,
    is_closed: bool,
}

impl<S: RecordSink> TlsOutputRecord<S, HandshakeHash> {
    pub fn new(config: Arc<Config>, sink: S) -> Result<Self, Error> {
        Self::with_transcript(config, sink, HandshakeHash::default())
    }
}

impl<S: RecordSink, T: TranscriptSink> TlsOutputRecord<S, T> {
    pub fn with_transcript(config: Arc<Config>, sink: S, transcript: T) -> Result<Self, Error> {
        let version = config.protocol_version();
        if !version.is_tls() {
            return Err(Error::ConfigError(format!(
                "{} is not a stream protocol version",
                version
            )));
        }

        let inner = Inner {
            limits: FragmentLimits::from_config(&config),
            cbc_protection: config.cbc_protection(),
            version,
            cipher: WriteCipher::null(version),
            sink,
            transcript,
            pending: Buf::new(),
            record: Buf::new(),
            first_app_record: true,
            is_closed: false,
        };

        Ok(TlsOutputRecord {
            config,
            inner: Mutex::new(inner),
        })
    }

    /// Append a handshake message given as type(1) length(3) body.
    ///
    /// Full records are written out right away, the remainder waits for
    /// [`TlsOutputRecord::flush`].
    pub fn encode_handshake(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        let (msg_type, body) = split_tls_handshake(bytes)?;
        trace!("Append {:?} ({} bytes)", msg_type, body.len());

        if inner.transcript.is_hashable(msg_type) {
            inner.transcript.deliver(bytes);
        }
        inner.pending.extend_from_slice(bytes);

        let size = inner.fragment_size()?;
        while inner.pending.len() >= size {
            inner.write_pending(size)?;
        }

        Ok(())
    }

    /// Write any buffered handshake bytes as a record and flush the sink.
    pub fn flush(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.flush()
    }

    pub fn encode_change_cipher_spec(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.write_control(ContentType::ChangeCipherSpec, &[1])
    }

    pub fn encode_alert(&self, level: AlertLevel, description: AlertDescription) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        debug!("Send alert {:?} {}", level, description);
        inner.write_control(ContentType::Alert, &[level.as_u8(), description.as_u8()])
    }

    /// Replace the write cipher.
    ///
    /// Pending handshake bytes go out under the old cipher first. The old
    /// cipher is disposed; a stream has nothing left to resend with it.
    pub fn change_write_ciphers(&self, cipher: WriteCipher, emit_ccs_first: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;

        if emit_ccs_first {
            inner.write_control(ContentType::ChangeCipherSpec, &[1])?;
        } else {
            inner.write_all_pending()?;
        }

        let old = mem::replace(&mut inner.cipher, cipher);
        old.dispose();
        inner.first_app_record = true;

        debug!("Write cipher changed");
        Ok(())
    }

    /// Write all of `sources` as application data records.
    ///
    /// Returns the descriptor of the last record written, or `None` if the
    /// sources were empty.
    pub fn encode_application_data(&self, sources: &mut [&[u8]]) -> Result<Option<Ciphertext>, Error> {
        let mut inner = self.inner.lock();
        inner.ensure_open()?;
        inner.write_application_data(sources)
    }

    /// Flush and close. Closing twice is fine.
    pub fn close(&self) -> Result<(), Error> {
        self.inner.lock().close()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closed
    }

    pub fn set_packet_size(&self, packet_size: usize) {
        self.inner.lock().limits.packet_size = packet_size;
    }

    pub fn set_max_fragment_length(&self, len: Option<usize>) -> Result<(), Error> {
        crate::config::validate_max_fragment_length(len)?;
        self.inner.lock().limits.max_fragment_length = len;
        Ok(())
    }

    pub fn set_protocol_version(&self, version: ProtocolVersion) -> Result<(), Error> {
        if !version.is_tls() {
            return Err(Error::ConfigError(format!(
                "{} is not a stream protocol version",
                version
            )));
        }
        self.inner.lock().version = version;
        Ok(())
    }

    /// The current cipher is close to its usage limits.
    pub fn needs_rekey(&self) -> bool {
        let inner = self.inner.lock();
        inner.cipher.at_key_limit() || inner.cipher.seq_num_is_huge()
    }

    /// Handshake bytes waiting for a flush.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transcript(&self) -> T
    where
        T: Clone,
    {
        self.inner.lock().transcript.clone()
    }

    pub fn into_sink(self) -> S {
        self.inner.into_inner().sink
    }
}

impl<S: RecordSink, T: TranscriptSink> Inner<S, T> {
    fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }

    fn fragment_size(&self) -> Result<usize, Error> {
        let size = self.limits.fragment_size(&self.cipher, TLS_HEADER_LEN);
        if size == 0 {
            return Err(Error::PacketTooSmall(self.limits.packet_limit()));
        }
        Ok(size)
    }

    /// Frame, protect and write one record from the scratch buffer.
    fn seal_and_write(&mut self, content_type: ContentType) -> Result<Ciphertext, Error> {
        if self.cipher.seq_num_overflow() {
            warn!("Sequence number overflow");
            return Err(Error::SequenceOverflow);
        }

        let sequence_number =
            self.cipher
                .encrypt(content_type, &mut self.record, 0, TLS_HEADER_LEN, self.version)?;
        self.sink.write_record(&self.record)?;
        self.record.clear();

        Ok(Ciphertext {
            content_type,
            handshake_type: None,
            epoch: self.cipher.epoch(),
            sequence_number,
        })
    }

    fn start_record(&mut self) {
        self.record.clear();
        self.record
            .resize(TLS_HEADER_LEN + self.cipher.explicit_nonce_size(), 0);
    }

    /// Write up to `size` pending handshake bytes as one record.
    fn write_pending(&mut self, size: usize) -> Result<(), Error> {
        let n = self.pending.len().min(size);
        self.start_record();
        self.record.extend_from_slice(&self.pending[..n]);
        self.seal_and_write(ContentType::Handshake)?;

        let rest = self.pending.len() - n;
        self.pending.copy_within(n.., 0);
        self.pending.truncate(rest);
        Ok(())
    }

    fn write_all_pending(&mut self) -> Result<(), Error> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let size = self.fragment_size()?;
        while !self.pending.is_empty() {
            self.write_pending(size)?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), Error> {
        self.write_all_pending()?;
        self.sink.flush()?;
        Ok(())
    }

    fn write_control(&mut self, content_type: ContentType, body: &[u8]) -> Result<(), Error> {
        self.write_all_pending()?;

        self.start_record();
        self.record.extend_from_slice(body);
        self.seal_and_write(content_type)?;
        self.sink.flush()?;
        Ok(())
    }

    fn write_application_data(&mut self, sources: &mut [&[u8]]) -> Result<Option<Ciphertext>, Error> {
        let mut cursor = SourceCursor::new(sources);
        if cursor.is_empty() {
            return Ok(None);
        }
        if self.cipher.seq_num_overflow() {
            warn!("Sequence number overflow");
            return Err(Error::SequenceOverflow);
        }

        // Handshake bytes must not be overtaken.
        self.write_all_pending()?;

        let mut last = None;
        let mut first_of_write = true;

        while !cursor.is_empty() {
            let mut size = self.fragment_size()?;
            if first_of_write
                && needs_split(
                    self.version,
                    &self.cipher,
                    self.cbc_protection,
                    self.first_app_record,
                )
            {
                size = 1;
            }

            self.start_record();
            let copied = cursor.gather(size, &mut self.record);
            let ciphertext = self.seal_and_write(ContentType::ApplicationData)?;
            trace!("Application data {} bytes seq {}", copied, ciphertext.sequence_number);

            self.first_app_record = false;
            first_of_write = false;
            last = Some(ciphertext);
        }

        self.sink.flush()?;
        Ok(last)
    }

    pub(crate) fn close(&mut self) -> Result<(), Error> {
        if self.is_closed {
            return Ok(());
        }
        let res = self.flush();
        self.is_closed = true;
        debug!("Outbound closed");
        res
    }
}

impl<S: RecordSink, T: TranscriptSink> std::fmt::Debug for TlsOutputRecord<S, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TlsOutputRecord")
            .field("version", &inner.version)
            .field("cipher", &inner.cipher)
            .field("pending", &inner.pending.len())
            .field("is_closed", &inner.is_closed)
            .finish()
    }
}
