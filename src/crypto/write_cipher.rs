use super::aead::{Aad, AesGcm, FixedIv, Nonce, AEAD_OVERHEAD, EXPLICIT_NONCE_LEN};
use super::authenticator::{Authenticator, SequenceKind};
use super::cbc::AesCbcHmac;
use crate::buffer::Buf;
use crate::record::{RecordHeader, DTLS_HEADER_LEN, MAX_CIPHERTEXT, TLS_HEADER_LEN};
use crate::rng::SeededRng;
use crate::types::{ContentType, ProtocolVersion};
use crate::{Config, Error};

/// Record protection algorithm.
enum CipherKind {
    Null,
    AesGcm { cipher: AesGcm, iv: FixedIv },
    AesCbc(AesCbcHmac),
}

/// Outbound cipher state bound to a single epoch.
///
/// Owns the [`Authenticator`] handing out the sequence numbers for that
/// epoch. Key material is wiped when the cipher is disposed or dropped.
pub struct WriteCipher {
    kind: CipherKind,
    authenticator: Authenticator,
}

fn sequence_kind(version: ProtocolVersion) -> SequenceKind {
    if version.is_dtls() {
        SequenceKind::Datagram
    } else {
        SequenceKind::Stream
    }
}

impl WriteCipher {
    /// Plaintext records, as used in epoch 0.
    pub fn null(version: ProtocolVersion) -> Self {
        WriteCipher {
            kind: CipherKind::Null,
            authenticator: Authenticator::new(sequence_kind(version)),
        }
    }

    /// AES-128-GCM or AES-256-GCM depending on the key length.
    ///
    /// `fixed_iv` is the 4 byte implicit nonce from the key block. The
    /// cipher reports [`WriteCipher::at_key_limit`] after `key_limit` records.
    pub fn aes_gcm(
        version: ProtocolVersion,
        key: &[u8],
        fixed_iv: &[u8],
        key_limit: u64,
    ) -> Result<Self, Error> {
        let cipher = AesGcm::new(key).map_err(Error::CryptoError)?;
        let iv = FixedIv::new(fixed_iv).ok_or_else(|| {
            Error::CryptoError(format!("Invalid GCM fixed IV size: {}", fixed_iv.len()))
        })?;

        Ok(WriteCipher {
            kind: CipherKind::AesGcm { cipher, iv },
            authenticator: Authenticator::new(sequence_kind(version)).with_key_limit(Some(key_limit)),
        })
    }

    /// AES-CBC with HMAC-SHA256.
    ///
    /// TLS 1.0 chains `iv` across records. Later versions draw a fresh
    /// explicit IV per record from `rng`.
    pub fn aes_cbc_hmac(
        version: ProtocolVersion,
        enc_key: &[u8],
        mac_key: &[u8],
        iv: &[u8],
        rng: SeededRng,
    ) -> Result<Self, Error> {
        let cbc = AesCbcHmac::new(enc_key, mac_key, iv, version.uses_explicit_iv(), rng)
            .map_err(Error::CryptoError)?;

        Ok(WriteCipher {
            kind: CipherKind::AesCbc(cbc),
            authenticator: Authenticator::new(sequence_kind(version)),
        })
    }

    /// AES-GCM for the configured protocol version, limited to
    /// [`Config::aead_key_limit`] records.
    pub fn aes_gcm_from_config(config: &Config, key: &[u8], fixed_iv: &[u8]) -> Result<Self, Error> {
        Self::aes_gcm(config.protocol_version(), key, fixed_iv, config.aead_key_limit())
    }

    /// AES-CBC with HMAC-SHA256 for the configured protocol version. Explicit
    /// IVs come from [`Config::rng_seed`] when set.
    pub fn aes_cbc_hmac_from_config(
        config: &Config,
        enc_key: &[u8],
        mac_key: &[u8],
        iv: &[u8],
    ) -> Result<Self, Error> {
        Self::aes_cbc_hmac(
            config.protocol_version(),
            enc_key,
            mac_key,
            iv,
            SeededRng::new(config.rng_seed()),
        )
    }

    /// Start this cipher's sequence numbers at `sequence`.
    pub fn with_sequence_number(mut self, sequence: u64) -> Self {
        self.authenticator = self.authenticator.with_sequence_number(sequence);
        self
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    #[inline(always)]
    pub fn epoch(&self) -> u16 {
        self.authenticator.epoch()
    }

    pub(crate) fn set_epoch(&mut self, epoch: u16) {
        self.authenticator.set_epoch(epoch);
    }

    pub fn is_null(&self) -> bool {
        matches!(self.kind, CipherKind::Null)
    }

    pub fn is_cbc(&self) -> bool {
        matches!(self.kind, CipherKind::AesCbc(_))
    }

    pub fn seq_num_overflow(&self) -> bool {
        self.authenticator.seq_num_overflow()
    }

    pub fn seq_num_is_huge(&self) -> bool {
        self.authenticator.seq_num_is_huge()
    }

    pub fn at_key_limit(&self) -> bool {
        self.authenticator.at_key_limit()
    }

    /// Bytes reserved between the record header and the plaintext.
    pub fn explicit_nonce_size(&self) -> usize {
        match &self.kind {
            CipherKind::Null => 0,
            CipherKind::AesGcm { .. } => EXPLICIT_NONCE_LEN,
            CipherKind::AesCbc(cbc) => cbc.explicit_iv_len(),
        }
    }

    /// Largest plaintext fragment such that the encrypted record, header
    /// included, stays within `packet_limit`.
    pub fn calculate_fragment_size(&self, packet_limit: usize, header_size: usize) -> usize {
        let available = packet_limit.saturating_sub(header_size);
        match &self.kind {
            CipherKind::Null => available,
            CipherKind::AesGcm { .. } => available.saturating_sub(AEAD_OVERHEAD),
            CipherKind::AesCbc(cbc) => cbc.fragment_size(available),
        }
    }

    /// Protect one record in place.
    ///
    /// `buf[record_start..]` holds `header_size + explicit_nonce_size()`
    /// reserved bytes followed by the plaintext. On return it holds the
    /// complete wire record. Returns the sequence number used.
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        buf: &mut Buf,
        record_start: usize,
        header_size: usize,
        version: ProtocolVersion,
    ) -> Result<u64, Error> {
        let expected = match self.authenticator.kind() {
            SequenceKind::Datagram => DTLS_HEADER_LEN,
            SequenceKind::Stream => TLS_HEADER_LEN,
        };
        if header_size != expected {
            return Err(Error::CryptoError(format!(
                "Header size {} does not match transport ({})",
                header_size, expected
            )));
        }

        let body_start = record_start + header_size;
        let plaintext_start = body_start + self.explicit_nonce_size();
        if buf.len() < plaintext_start {
            return Err(Error::CryptoError("Record buffer lacks header space".into()));
        }

        let plaintext_len = buf.len() - plaintext_start;
        let plaintext_len_u16 =
            u16::try_from(plaintext_len).map_err(|_| Error::RecordTooLarge(plaintext_len))?;

        // Checked before any sequence number is spent.
        if self.authenticator.seq_num_overflow() {
            return Err(Error::SequenceOverflow);
        }

        let sequence_bytes = self.authenticator.sequence_bytes();
        let aad = Aad::new(sequence_bytes, content_type, version, plaintext_len_u16);

        match &mut self.kind {
            CipherKind::Null => {}
            CipherKind::AesGcm { cipher, iv } => {
                buf[body_start..plaintext_start].copy_from_slice(&sequence_bytes);
                let nonce = Nonce::new(*iv, &sequence_bytes);
                let tag = cipher
                    .seal(nonce, &aad, &mut buf[plaintext_start..])
                    .map_err(Error::CryptoError)?;
                buf.extend_from_slice(&tag);
            }
            CipherKind::AesCbc(cbc) => {
                cbc.seal(&aad, buf, body_start)
                    .map_err(Error::CryptoError)?;
            }
        }

        let fragment_len = buf.len() - body_start;
        if fragment_len > MAX_CIPHERTEXT {
            return Err(Error::RecordTooLarge(fragment_len));
        }

        let sequence = self.authenticator.advance()?;

        let header = RecordHeader {
            content_type,
            version,
            sequence: match self.authenticator.kind() {
                SequenceKind::Datagram => Some((self.authenticator.epoch(), sequence)),
                SequenceKind::Stream => None,
            },
            length: fragment_len as u16,
        };
        header.write(&mut buf[record_start..body_start]);

        trace!(
            "Sealed {} record epoch {} seq {} ({} bytes)",
            content_type,
            self.authenticator.epoch(),
            sequence,
            buf.len() - record_start
        );

        Ok(sequence)
    }

    /// Release the key material.
    pub fn dispose(self) {
        trace!("Dispose write cipher for epoch {}", self.epoch());
        // Drop does the wiping.
    }
}

impl Drop for WriteCipher {
    fn drop(&mut self) {
        if let CipherKind::AesGcm { iv, .. } = &mut self.kind {
            zeroize::Zeroize::zeroize(iv);
        }
    }
}

impl std::fmt::Debug for WriteCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.kind {
            CipherKind::Null => "Null",
            CipherKind::AesGcm { .. } => "AesGcm",
            CipherKind::AesCbc(_) => "AesCbcHmac",
        };
        f.debug_struct("WriteCipher")
            .field("kind", &kind)
            .field("epoch", &self.authenticator.epoch())
            .field("sequence", &self.authenticator.sequence_number())
            .finish()
    }
}
