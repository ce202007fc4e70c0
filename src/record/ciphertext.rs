use std::fmt;

use crate::types::{ContentType, MessageType};

/// Summary of one emitted record.
///
/// Returned by the engines after a record has been written to the
/// destination, so the caller can arm retransmission timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    pub content_type: ContentType,
    /// Type of the last handshake message packed into the record. `None`
    /// unless `content_type` is handshake.
    pub handshake_type: Option<MessageType>,
    pub epoch: u16,
    pub sequence_number: u64,
}

impl fmt::Display for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} epoch={} seq={}",
            self.content_type, self.epoch, self.sequence_number
        )?;
        if let Some(t) = self.handshake_type {
            write!(f, " ({:?})", t)?;
        }
        Ok(())
    }
}
