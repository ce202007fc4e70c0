use std::sync::Arc;

use parking_lot::Mutex;

use super::epoch::EpochCiphers;
use super::fragmenter::Fragmenter;
use crate::buffer::Buf;
use crate::crypto::WriteCipher;
use crate::record::{needs_split, split_tls_handshake, Ciphertext, FragmentLimits};
use crate::record::{HandshakeHeader, HandshakeMemo, SourceCursor, DTLS_HEADER_LEN};
use crate::transcript::{HandshakeHash, TranscriptSink};
use crate::types::{AlertDescription, AlertLevel, ContentType, MessageType, ProtocolVersion};
use crate::{Config, Error};

/// Output record layer for datagram transports.
///
/// Handshake messages, change_cipher_spec and alerts are buffered per flight
/// and pulled out as records through [`DtlsOutputRecord::encode`]. The same
/// call protects application data once the flight is out.
///
/// All state sits behind one lock, so the engine can be shared between the
/// application and the handshake driver.
pub struct DtlsOutputRecord<T: TranscriptSink = HandshakeHash> {
    config: Arc<Config>,
    pub(crate) inner: Mutex<Inner<T>>,
}

pub(crate) struct Inner<T> {
    limits: FragmentLimits,
    cbc_protection: bool,
    version: ProtocolVersion,
    ciphers: EpochCiphers,
    fragmenter: Fragmenter,
    transcript: T,
    next_handshake_seq: u16,
    first_app_record: bool,
    is_closed: bool,
    is_close_waiting: bool,
}

impl DtlsOutputRecord<HandshakeHash> {
    /// Engine feeding a SHA-256 transcript.
    pub fn new(config: Arc<Config>) -> Result<Self, Error> {
        Self::with_transcript(config, HandshakeHash::default())
    }
}

impl<T: TranscriptSink> DtlsOutputRecord<T> {
    pub fn with_transcript(config: Arc<Config>, transcript: T) -> Result<Self, Error> {
        let version = config.protocol_version();
        if !version.is_dtls() {
            return Err(Error::ConfigError(format!(
                "{} is not a datagram protocol version",
                version
            )));
        }

        let inner = Inner {
            limits: FragmentLimits::from_config(&config),
            cbc_protection: config.cbc_protection(),
            version,
            ciphers: EpochCiphers::new(WriteCipher::null(version)),
            fragmenter: Fragmenter::default(),
            transcript,
            next_handshake_seq: 0,
            first_app_record: true,
            is_closed: false,
            is_close_waiting: false,
        };

        Ok(DtlsOutputRecord {
            config,
            inner: Mutex::new(inner),
        })
    }

    /// Queue a handshake message given as type(1) length(3) body.
    ///
    /// Assigns the next message sequence number and feeds the transcript.
    /// Ignored once the engine is closing.
    pub fn encode_handshake(&self, bytes: &[u8]) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        if inner.is_closing() {
            warn!("Outbound closed, drop handshake message");
            return Ok(());
        }

        let (msg_type, body) = split_tls_handshake(bytes)?;
        inner.queue_handshake(msg_type, body)
    }

    pub fn encode_change_cipher_spec(&self) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        if inner.is_closing() {
            warn!("Outbound closed, drop change_cipher_spec");
            return Ok(());
        }

        inner.queue_change_cipher_spec();
        Ok(())
    }

    pub fn encode_alert(&self, level: AlertLevel, description: AlertDescription) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        if inner.is_closing() {
            warn!("Outbound closed, drop alert {}", description);
            return Ok(());
        }

        debug!("Queue alert {:?} {}", level, description);
        let (version, epoch) = (inner.version, inner.ciphers.write_epoch());
        inner
            .fragmenter
            .queue_up_alert(version, epoch, level.as_u8(), description.as_u8());
        Ok(())
    }

    /// Switch to `cipher` for everything queued from now on.
    ///
    /// With `emit_ccs_first` a change_cipher_spec is queued under the
    /// outgoing epoch before the switch.
    pub fn change_write_ciphers(&self, cipher: WriteCipher, emit_ccs_first: bool) -> Result<(), Error> {
        let mut inner = self.inner.lock();

        if inner.is_closing() {
            warn!("Outbound closed, ignore write cipher change");
            return Ok(());
        }

        if inner.ciphers.write_epoch() == u16::MAX {
            return Err(Error::WrappedEpoch);
        }

        if emit_ccs_first {
            inner.queue_change_cipher_spec();
        }

        inner.ciphers.rotate(cipher)?;
        inner.first_app_record = true;

        debug!("Write epoch now {}", inner.ciphers.write_epoch());
        Ok(())
    }

    /// Produce the next record into `dst`.
    ///
    /// Pending flight records go first. Application data is taken from
    /// `sources` only when the flight buffer has nothing to send; each source
    /// slice is advanced past the bytes consumed. Returns `None` when there
    /// was nothing to do.
    pub fn encode(&self, sources: &mut [&[u8]], dst: &mut Buf) -> Result<Option<Ciphertext>, Error> {
        let mut inner = self.inner.lock();
        inner.encode(sources, dst)
    }

    /// Produce the next flight record, if any.
    pub fn drain(&self, dst: &mut Buf) -> Result<Option<Ciphertext>, Error> {
        self.encode(&mut [], dst)
    }

    /// Rewind a fully sent flight so it goes out again.
    ///
    /// Returns false if there is no flight to resend.
    pub fn launch_retransmission(&self) -> bool {
        let mut inner = self.inner.lock();
        if !inner.fragmenter.is_retransmittable() {
            return false;
        }
        debug!("Retransmit flight of {} memos", inner.fragmenter.len());
        inner.fragmenter.set_retransmission();
        true
    }

    pub fn is_retransmittable(&self) -> bool {
        self.inner.lock().fragmenter.is_retransmittable()
    }

    /// No flight records waiting to be emitted.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().fragmenter.is_empty()
    }

    pub fn has_alert(&self) -> bool {
        self.inner.lock().fragmenter.has_alert()
    }

    /// Stop accepting output.
    ///
    /// If an alert is still waiting to be emitted, the engine stays close
    /// waiting until [`DtlsOutputRecord::encode`] has drained it.
    pub fn close(&self) {
        self.inner.lock().close();
    }

    /// Closed, or closing with a final alert still to drain.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().is_closing()
    }

    pub fn is_close_waiting(&self) -> bool {
        self.inner.lock().is_close_waiting
    }

    /// Start over with a new handshake. The current flight is dropped.
    pub fn init_handshaker(&self) {
        let mut inner = self.inner.lock();
        inner.fragmenter.clear();
        inner.next_handshake_seq = 0;
    }

    pub fn set_packet_size(&self, packet_size: usize) {
        let mut inner = self.inner.lock();
        debug!("Packet size {} -> {}", inner.limits.packet_size, packet_size);
        inner.limits.packet_size = packet_size;
    }

    pub fn set_max_fragment_length(&self, len: Option<usize>) -> Result<(), Error> {
        crate::config::validate_max_fragment_length(len)?;
        self.inner.lock().limits.max_fragment_length = len;
        Ok(())
    }

    /// Change the version written to subsequent records, for instance after
    /// the peer settled on DTLS 1.0.
    pub fn set_protocol_version(&self, version: ProtocolVersion) -> Result<(), Error> {
        if !version.is_dtls() {
            return Err(Error::ConfigError(format!(
                "{} is not a datagram protocol version",
                version
            )));
        }
        self.inner.lock().version = version;
        Ok(())
    }

    pub fn write_epoch(&self) -> u16 {
        self.inner.lock().ciphers.write_epoch()
    }

    /// Epoch of the archived cipher, if a switch has happened.
    pub fn previous_write_epoch(&self) -> Option<u16> {
        self.inner.lock().ciphers.previous_epoch()
    }

    pub fn next_handshake_seq(&self) -> u16 {
        self.inner.lock().next_handshake_seq
    }

    /// The current cipher is close to its usage limits.
    pub fn needs_rekey(&self) -> bool {
        let inner = self.inner.lock();
        let cipher = inner.ciphers.current();
        cipher.at_key_limit() || cipher.seq_num_is_huge()
    }

    /// Handshake message types in the current flight.
    pub fn flight_handshake_types(&self) -> Vec<MessageType> {
        self.inner.lock().fragmenter.handshake_types()
    }

    /// The current flight is complete and will be emitted.
    pub fn is_flight_ready(&self) -> bool {
        self.inner.lock().fragmenter.is_flight_ready()
    }

    /// Number of memos in the current flight.
    pub fn flight_len(&self) -> usize {
        self.inner.lock().fragmenter.len()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copy of the transcript state.
    pub fn transcript(&self) -> T
    where
        T: Clone,
    {
        self.inner.lock().transcript.clone()
    }
}

impl<T: TranscriptSink> Inner<T> {
    #[inline(always)]
    pub(crate) fn is_closing(&self) -> bool {
        self.is_closed || self.is_close_waiting
    }

    #[inline(always)]
    pub(crate) fn is_close_waiting(&self) -> bool {
        self.is_close_waiting
    }

    pub(crate) fn close(&mut self) {
        if self.is_closing() {
            return;
        }

        if self.fragmenter.has_pending_alert() {
            debug!("Close waiting for pending alert");
            self.is_close_waiting = true;
        } else {
            debug!("Outbound closed");
            self.is_closed = true;
        }
    }

    fn queue_handshake(&mut self, msg_type: MessageType, body: &[u8]) -> Result<(), Error> {
        let message_seq = self.next_handshake_seq;
        self.next_handshake_seq = message_seq
            .checked_add(1)
            .ok_or_else(|| Error::InvalidHandshake("message_seq exhausted".into()))?;

        // Hash as an unfragmented message, once. Retransmissions never
        // come back here.
        if self.transcript.is_hashable(msg_type) {
            let mut canonical = self.fragmenter.pop_buffer();
            HandshakeHeader::unfragmented(msg_type, body.len() as u32, message_seq)
                .serialize(&mut canonical);
            canonical.extend_from_slice(body);
            self.transcript.deliver(&canonical);
            self.fragmenter.push_buffer(canonical);
        }

        let mut payload = self.fragmenter.pop_buffer();
        payload.extend_from_slice(body);

        trace!(
            "Queue {:?} seq {} ({} bytes) epoch {}",
            msg_type,
            message_seq,
            body.len(),
            self.ciphers.write_epoch()
        );

        let memo = HandshakeMemo::new(
            self.version,
            self.ciphers.write_epoch(),
            msg_type,
            message_seq,
            payload,
        );
        self.fragmenter.queue_up_handshake(memo);

        Ok(())
    }

    fn queue_change_cipher_spec(&mut self) {
        trace!("Queue change_cipher_spec epoch {}", self.ciphers.write_epoch());
        let (version, epoch) = (self.version, self.ciphers.write_epoch());
        self.fragmenter.queue_up_change_cipher_spec(version, epoch);
    }

    pub(crate) fn encode(
        &mut self,
        sources: &mut [&[u8]],
        dst: &mut Buf,
    ) -> Result<Option<Ciphertext>, Error> {
        if self.is_closed {
            warn!("Outbound closed, nothing to encode");
            return Ok(None);
        }

        if self.ciphers.current().seq_num_overflow() {
            warn!(
                "Sequence number overflow in epoch {}",
                self.ciphers.write_epoch()
            );
            return Err(Error::SequenceOverflow);
        }

        if self.is_close_waiting {
            if sources.iter().any(|s| !s.is_empty()) {
                trace!("Close waiting, application data not accepted");
                return Ok(None);
            }
            let ciphertext = self
                .fragmenter
                .acquire_ciphertext(&mut self.ciphers, &self.limits, dst)?;
            if !self.fragmenter.has_pending_alert() {
                debug!("Final alert drained, outbound closed");
                self.is_close_waiting = false;
                self.is_closed = true;
            }
            return Ok(ciphertext);
        }

        let mut cursor = SourceCursor::new(sources);

        if cursor.is_empty() || !self.fragmenter.is_empty() {
            let ciphertext = self
                .fragmenter
                .acquire_ciphertext(&mut self.ciphers, &self.limits, dst)?;
            if ciphertext.is_some() || cursor.is_empty() {
                return Ok(ciphertext);
            }
        }

        let cipher = self.ciphers.current_mut();
        let mut fragment_size = self.limits.fragment_size(cipher, DTLS_HEADER_LEN);
        if needs_split(
            self.version,
            cipher,
            self.cbc_protection,
            self.first_app_record,
        ) {
            fragment_size = fragment_size.min(1);
        }
        if fragment_size == 0 {
            return Err(Error::PacketTooSmall(self.limits.packet_limit()));
        }

        let record_start = dst.len();
        dst.resize(record_start + DTLS_HEADER_LEN + cipher.explicit_nonce_size(), 0);
        let copied = cursor.gather(fragment_size, dst);

        let epoch = cipher.epoch();
        let sequence_number = match cipher.encrypt(
            ContentType::ApplicationData,
            dst,
            record_start,
            DTLS_HEADER_LEN,
            self.version,
        ) {
            Ok(seq) => seq,
            Err(e) => {
                dst.truncate(record_start);
                return Err(e);
            }
        };
        self.first_app_record = false;

        trace!("Application data {} bytes, epoch {} seq {}", copied, epoch, sequence_number);

        Ok(Some(Ciphertext {
            content_type: ContentType::ApplicationData,
            handshake_type: None,
            epoch,
            sequence_number,
        }))
    }
}

impl<T: TranscriptSink> std::fmt::Debug for DtlsOutputRecord<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DtlsOutputRecord")
            .field("version", &inner.version)
            .field("write_epoch", &inner.ciphers.write_epoch())
            .field("fragmenter", &inner.fragmenter)
            .field("is_closed", &inner.is_closed)
            .field("is_close_waiting", &inner.is_close_waiting)
            .finish()
    }
}
