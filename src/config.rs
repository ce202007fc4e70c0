use std::time::Duration;

use crate::record::{DTLS_HEADER_LEN, HANDSHAKE_HEADER_LEN, MAX_PLAINTEXT};
use crate::types::ProtocolVersion;
use crate::Error;

/// Smallest non-zero packet size that can carry one byte of a handshake
/// fragment through the null cipher.
pub const MIN_PACKET_SIZE: usize = DTLS_HEADER_LEN + HANDSHAKE_HEADER_LEN + 1;

/// Largest expansion of a TLS 1.2 ciphertext over its plaintext (RFC 5246 §6.2.3).
const CIPHERTEXT_EXPANSION: usize = 2048;

/// Record layer output configuration.
#[derive(Clone)]
pub struct Config {
    packet_size: usize,
    max_record_size: usize,
    max_fragment_length: Option<usize>,
    protocol_version: ProtocolVersion,
    cbc_protection: bool,
    aead_key_limit: u64,
    linger: Duration,
    rng_seed: Option<u64>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            packet_size: 1150,
            max_record_size: MAX_PLAINTEXT + CIPHERTEXT_EXPANSION,
            max_fragment_length: None,
            protocol_version: ProtocolVersion::DTLS1_2,
            cbc_protection: true,
            aead_key_limit: crate::crypto::AES_GCM_KEY_LIMIT,
            linger: Duration::from_secs(1),
            rng_seed: None,
        }
    }

    /// Largest datagram (or stream chunk) the engines will produce.
    ///
    /// 0 means unbounded, in which case records are only limited by
    /// [`Config::max_record_size`].
    #[inline(always)]
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Largest record on the wire, header included.
    #[inline(always)]
    pub fn max_record_size(&self) -> usize {
        self.max_record_size
    }

    /// Negotiated max fragment length (rfc6066), if any.
    #[inline(always)]
    pub fn max_fragment_length(&self) -> Option<usize> {
        self.max_fragment_length
    }

    /// Protocol version written into record headers.
    #[inline(always)]
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Whether TLS 1.0 CBC application data is split 1/n-1.
    #[inline(always)]
    pub fn cbc_protection(&self) -> bool {
        self.cbc_protection
    }

    /// Records one AES-GCM key may protect before a rekey is required.
    #[inline(always)]
    pub fn aead_key_limit(&self) -> u64 {
        self.aead_key_limit
    }

    /// Upper bound for a lingering close to get hold of the engine.
    #[inline(always)]
    pub fn linger(&self) -> Duration {
        self.linger
    }

    /// Seed for explicit CBC IVs. Only meant for tests.
    #[inline(always)]
    pub fn rng_seed(&self) -> Option<u64> {
        self.rng_seed
    }
}

impl Default for Config {
    fn default() -> Self {
        // The builder defaults always validate.
        Config {
            packet_size: 1150,
            max_record_size: MAX_PLAINTEXT + CIPHERTEXT_EXPANSION,
            max_fragment_length: None,
            protocol_version: ProtocolVersion::DTLS1_2,
            cbc_protection: true,
            aead_key_limit: crate::crypto::AES_GCM_KEY_LIMIT,
            linger: Duration::from_secs(1),
            rng_seed: None,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("packet_size", &self.packet_size)
            .field("max_record_size", &self.max_record_size)
            .field("max_fragment_length", &self.max_fragment_length)
            .field("protocol_version", &self.protocol_version)
            .field("cbc_protection", &self.cbc_protection)
            .field("linger", &self.linger)
            .field("seeded", &self.rng_seed.is_some())
            .finish()
    }
}

/// Builder for record layer configuration.
pub struct ConfigBuilder {
    packet_size: usize,
    max_record_size: usize,
    max_fragment_length: Option<usize>,
    protocol_version: ProtocolVersion,
    cbc_protection: bool,
    aead_key_limit: u64,
    linger: Duration,
    rng_seed: Option<u64>,
}

impl ConfigBuilder {
    /// Set the packet size.
    ///
    /// For datagrams this is the path MTU available to DTLS.
    /// Defaults to 1150. 0 disables the bound.
    pub fn packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Set the max record size, header included.
    ///
    /// Defaults to 16384 + 2048.
    pub fn max_record_size(mut self, max_record_size: usize) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Set the negotiated max fragment length.
    ///
    /// Must be one of 512, 1024, 2048 or 4096.
    pub fn max_fragment_length(mut self, len: Option<usize>) -> Self {
        self.max_fragment_length = len;
        self
    }

    /// Set the protocol version.
    ///
    /// Defaults to DTLS 1.2.
    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Set whether TLS 1.0 CBC records get the 1/n-1 split.
    ///
    /// Defaults to true.
    pub fn cbc_protection(mut self, enabled: bool) -> Self {
        self.cbc_protection = enabled;
        self
    }

    /// Set the AES-GCM usage limit in records.
    ///
    /// Defaults to 2^24.5.
    pub fn aead_key_limit(mut self, limit: u64) -> Self {
        self.aead_key_limit = limit;
        self
    }

    /// Set the linger bound used when closing.
    ///
    /// Defaults to 1 second.
    pub fn linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    /// Seed the explicit IV generator for deterministic output.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::ConfigError` if a setting is out of range.
    pub fn build(self) -> Result<Config, Error> {
        if self.packet_size != 0 && self.packet_size < MIN_PACKET_SIZE {
            return Err(Error::ConfigError(format!(
                "packet_size {} below minimum {}",
                self.packet_size, MIN_PACKET_SIZE
            )));
        }

        if self.max_record_size < MIN_PACKET_SIZE {
            return Err(Error::ConfigError(format!(
                "max_record_size {} below minimum {}",
                self.max_record_size, MIN_PACKET_SIZE
            )));
        }

        validate_max_fragment_length(self.max_fragment_length)?;

        if matches!(self.protocol_version, ProtocolVersion::Unknown(_)) {
            return Err(Error::ConfigError(format!(
                "unsupported protocol version {}",
                self.protocol_version
            )));
        }

        if self.aead_key_limit == 0 {
            return Err(Error::ConfigError("aead_key_limit must be > 0".into()));
        }

        Ok(Config {
            packet_size: self.packet_size,
            max_record_size: self.max_record_size,
            max_fragment_length: self.max_fragment_length,
            protocol_version: self.protocol_version,
            cbc_protection: self.cbc_protection,
            aead_key_limit: self.aead_key_limit,
            linger: self.linger,
            rng_seed: self.rng_seed,
        })
    }
}

pub(crate) fn validate_max_fragment_length(len: Option<usize>) -> Result<(), Error> {
    match len {
        None | Some(512) | Some(1024) | Some(2048) | Some(4096) => Ok(()),
        Some(v) => Err(Error::ConfigError(format!(
            "max_fragment_length {} not one of 512, 1024, 2048, 4096",
            v
        ))),
    }
}
