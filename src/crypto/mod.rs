//! Outbound record protection.
//!
//! A [`WriteCipher`] is bound to one epoch. It pairs the record protection
//! algorithm with an [`Authenticator`] that hands out the sequence numbers.

mod aead;
mod authenticator;
mod cbc;
mod write_cipher;

pub use authenticator::{Authenticator, SequenceKind, DTLS_MAX_SEQUENCE, TLS_MAX_SEQUENCE};
pub use write_cipher::WriteCipher;

/// Default AES-GCM usage limit in records, 2^24.5 (RFC 8446 §5.5).
pub const AES_GCM_KEY_LIMIT: u64 = 23_726_566;
