//! Handshake transcript feed.
//!
//! Outgoing handshake messages are hashed once, when they are queued. Their
//! later fragmentation and retransmission never touches the transcript.

use sha2::{Digest, Sha256, Sha384};

use crate::buffer::Buf;
use crate::types::MessageType;

/// Receiver of the handshake bytes that go into the Finished computation.
pub trait TranscriptSink: Send {
    /// Whether messages of this type are part of the transcript.
    fn is_hashable(&self, msg_type: MessageType) -> bool;

    /// Feed header and body of one message.
    fn deliver(&mut self, bytes: &[u8]);
}

/// Hash algorithm of the negotiated PRF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha384,
}

/// Running transcript digest.
#[derive(Clone)]
pub enum HandshakeHash {
    Sha256(Sha256),
    Sha384(Sha384),
}

impl HandshakeHash {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => HandshakeHash::Sha256(Sha256::new()),
            HashAlgorithm::Sha384 => HandshakeHash::Sha384(Sha384::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            HandshakeHash::Sha256(hasher) => hasher.update(data),
            HandshakeHash::Sha384(hasher) => hasher.update(data),
        }
    }

    /// Finalize a copy of the state, so hashing can continue.
    pub fn clone_and_finalize(&self) -> Vec<u8> {
        match self {
            HandshakeHash::Sha256(hasher) => hasher.clone().finalize().to_vec(),
            HandshakeHash::Sha384(hasher) => hasher.clone().finalize().to_vec(),
        }
    }
}

impl Default for HandshakeHash {
    fn default() -> Self {
        HandshakeHash::new(HashAlgorithm::Sha256)
    }
}

impl std::fmt::Debug for HandshakeHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandshakeHash::Sha256(_) => f.write_str("HandshakeHash::Sha256"),
            HandshakeHash::Sha384(_) => f.write_str("HandshakeHash::Sha384"),
        }
    }
}

// HelloRequest and HelloVerifyRequest are excluded from the Finished hash
// (RFC 5246 §7.4.1.1, RFC 6347 §4.2.1).
fn in_finished_hash(msg_type: MessageType) -> bool {
    !matches!(
        msg_type,
        MessageType::HelloRequest | MessageType::HelloVerifyRequest
    )
}

impl TranscriptSink for HandshakeHash {
    fn is_hashable(&self, msg_type: MessageType) -> bool {
        in_finished_hash(msg_type)
    }

    fn deliver(&mut self, bytes: &[u8]) {
        self.update(bytes);
    }
}

/// Keeps the raw transcript bytes, for when the PRF hash is not chosen yet.
impl TranscriptSink for Buf {
    fn is_hashable(&self, msg_type: MessageType) -> bool {
        in_finished_hash(msg_type)
    }

    fn deliver(&mut self, bytes: &[u8]) {
        self.extend_from_slice(bytes);
    }
}
