//! AES-CBC with HMAC-SHA256, MAC-then-encrypt (RFC 5246 §6.2.3.2).

use aes_gcm::aes::cipher::{BlockEncrypt, KeyInit};
use aes_gcm::aes::{Aes128, Aes256, Block};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroize;

use super::aead::Aad;
use crate::buffer::Buf;
use crate::rng::SeededRng;

pub(crate) const BLOCK_LEN: usize = 16;
pub(crate) const MAC_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

enum AesBlock {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl AesBlock {
    fn encrypt_block(&self, block: &mut [u8]) {
        let block = Block::from_mut_slice(block);
        match self {
            AesBlock::Aes128(c) => c.encrypt_block(block),
            AesBlock::Aes256(c) => c.encrypt_block(block),
        }
    }
}

/// CBC state for one epoch.
pub(crate) struct AesCbcHmac {
    block: AesBlock,
    mac_key: Vec<u8>,
    // Next IV. Only chained when there is no explicit IV (TLS 1.0).
    iv: [u8; BLOCK_LEN],
    explicit_iv: bool,
    rng: SeededRng,
}

impl AesCbcHmac {
    pub(crate) fn new(
        enc_key: &[u8],
        mac_key: &[u8],
        iv: &[u8],
        explicit_iv: bool,
        rng: SeededRng,
    ) -> Result<Self, String> {
        let block = match enc_key.len() {
            16 => AesBlock::Aes128(Box::new(
                Aes128::new_from_slice(enc_key).map_err(|_| "Invalid AES-128 key")?,
            )),
            32 => AesBlock::Aes256(Box::new(
                Aes256::new_from_slice(enc_key).map_err(|_| "Invalid AES-256 key")?,
            )),
            n => return Err(format!("Invalid key size for AES-CBC: {}", n)),
        };

        if mac_key.len() != MAC_LEN {
            return Err(format!("Invalid MAC key size: {}", mac_key.len()));
        }

        let iv: [u8; BLOCK_LEN] = iv
            .try_into()
            .map_err(|_| format!("Invalid CBC IV size: {}", iv.len()))?;

        Ok(AesCbcHmac {
            block,
            mac_key: mac_key.to_vec(),
            iv,
            explicit_iv,
            rng,
        })
    }

    pub(crate) fn explicit_iv_len(&self) -> usize {
        if self.explicit_iv {
            BLOCK_LEN
        } else {
            0
        }
    }

    /// Largest plaintext that fits `available` bytes of record body.
    pub(crate) fn fragment_size(&self, available: usize) -> usize {
        let body = available.saturating_sub(self.explicit_iv_len());
        let body = body - body % BLOCK_LEN;
        // at least one padding length byte, and the MAC
        body.saturating_sub(1 + MAC_LEN)
    }

    /// Encrypt `buf[body_start..]` where the first `explicit_iv_len()` bytes
    /// are reserved for the IV and the rest is plaintext.
    ///
    /// The MAC and padding are appended, so `buf` grows.
    pub(crate) fn seal(&mut self, aad: &Aad, buf: &mut Buf, body_start: usize) -> Result<(), String> {
        let iv_len = self.explicit_iv_len();
        let plaintext_start = body_start + iv_len;

        let mut mac =
            <HmacSha256 as Mac>::new_from_slice(&self.mac_key).map_err(|e| e.to_string())?;
        mac.update(aad);
        mac.update(&buf[plaintext_start..]);
        let tag = mac.finalize().into_bytes();
        buf.extend_from_slice(&tag);

        let content_len = buf.len() - plaintext_start;
        let padding = (BLOCK_LEN - (content_len + 1) % BLOCK_LEN) % BLOCK_LEN;
        for _ in 0..=padding {
            buf.push(padding as u8);
        }

        let mut chain = if self.explicit_iv {
            let mut iv = [0u8; BLOCK_LEN];
            self.rng.fill(&mut iv);
            buf[body_start..plaintext_start].copy_from_slice(&iv);
            iv
        } else {
            self.iv
        };

        for block in buf[plaintext_start..].chunks_exact_mut(BLOCK_LEN) {
            for (b, c) in block.iter_mut().zip(chain.iter()) {
                *b ^= c;
            }
            self.block.encrypt_block(block);
            chain.copy_from_slice(block);
        }

        if !self.explicit_iv {
            self.iv = chain;
        }

        Ok(())
    }
}

impl Drop for AesCbcHmac {
    fn drop(&mut self) {
        self.mac_key.zeroize();
        self.iv.zeroize();
    }
}
