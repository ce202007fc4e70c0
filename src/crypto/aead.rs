//! AES-GCM record protection in the TLS 1.2 / DTLS 1.2 layout.
//!
//! Each record carries an 8 byte explicit nonce (the sequence value) in front
//! of the ciphertext, and the 16 byte tag after it.

use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Key};
use arrayvec::ArrayVec;
use zeroize::Zeroize;

use crate::types::{ContentType, ProtocolVersion};

/// Explicit nonce transmitted with each record.
pub(crate) const EXPLICIT_NONCE_LEN: usize = 8;

/// GCM authentication tag appended to the ciphertext.
pub(crate) const GCM_TAG_LEN: usize = 16;

/// Overhead per AEAD record (explicit nonce + tag).
pub(crate) const AEAD_OVERHEAD: usize = EXPLICIT_NONCE_LEN + GCM_TAG_LEN; // 24

/// Implicit part of the nonce, derived from the key block.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) struct FixedIv(pub [u8; 4]);

impl FixedIv {
    pub(crate) fn new(iv: &[u8]) -> Option<Self> {
        Some(Self(iv.try_into().ok()?))
    }
}

/// Full AEAD nonce (fixed IV + explicit nonce).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Nonce(pub [u8; 12]);

impl Nonce {
    pub(crate) fn new(iv: FixedIv, explicit_nonce: &[u8; EXPLICIT_NONCE_LEN]) -> Self {
        let mut nonce = [0u8; 12];
        nonce[..4].copy_from_slice(&iv.0);
        nonce[4..].copy_from_slice(explicit_nonce);
        Self(nonce)
    }
}

/// Additional authenticated data: seq(8) type(1) version(2) length(2).
///
/// The same layout is the MAC pseudo-header for CBC records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Aad(pub ArrayVec<u8, 13>);

impl Aad {
    pub(crate) fn new(
        sequence: [u8; 8],
        content_type: ContentType,
        version: ProtocolVersion,
        length: u16,
    ) -> Self {
        let mut aad = ArrayVec::new();
        aad.extend(sequence);
        aad.push(content_type.as_u8());
        aad.push(version.major());
        aad.push(version.minor());
        aad.extend(length.to_be_bytes());
        Aad(aad)
    }
}

impl std::ops::Deref for Aad {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// AES-GCM keyed for one direction of one epoch.
pub(crate) enum AesGcm {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

impl std::fmt::Debug for AesGcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AesGcm::Aes128(_) => f.debug_tuple("AesGcm::Aes128").finish(),
            AesGcm::Aes256(_) => f.debug_tuple("AesGcm::Aes256").finish(),
        }
    }
}

impl AesGcm {
    pub(crate) fn new(key: &[u8]) -> Result<Self, String> {
        match key.len() {
            16 => {
                let key = Key::<Aes128Gcm>::from_slice(key);
                Ok(AesGcm::Aes128(Box::new(Aes128Gcm::new(key))))
            }
            32 => {
                let key = Key::<Aes256Gcm>::from_slice(key);
                Ok(AesGcm::Aes256(Box::new(Aes256Gcm::new(key))))
            }
            _ => Err(format!("Invalid key size for AES-GCM: {}", key.len())),
        }
    }

    /// Encrypt `data` in place and return the detached tag.
    pub(crate) fn seal(
        &self,
        nonce: Nonce,
        aad: &Aad,
        data: &mut [u8],
    ) -> Result<[u8; GCM_TAG_LEN], String> {
        let nonce = aes_gcm::Nonce::from_slice(&nonce.0);

        let tag = match self {
            AesGcm::Aes128(cipher) => cipher.encrypt_in_place_detached(nonce, aad, data),
            AesGcm::Aes256(cipher) => cipher.encrypt_in_place_detached(nonce, aad, data),
        }
        .map_err(|_| "AES-GCM encryption failed".to_string())?;

        let mut out = [0u8; GCM_TAG_LEN];
        out.copy_from_slice(tag.as_slice());
        Ok(out)
    }
}

impl Zeroize for FixedIv {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}
