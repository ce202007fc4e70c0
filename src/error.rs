use std::io;

use thiserror::Error;

/// Errors produced by the record output engines.
#[derive(Debug, Error)]
pub enum Error {
    /// The write sequence number is about to wrap. The connection must end.
    #[error("Sequence number overflow")]
    SequenceOverflow,

    #[error("Epoch is not allowed to wrap")]
    WrappedEpoch,

    /// The packet size leaves no room for a single fragment.
    #[error("Packet size too small to carry a fragment: {0}")]
    PacketTooSmall(usize),

    #[error("Record too large: {0}")]
    RecordTooLarge(usize),

    /// A buffered record refers to an epoch whose cipher was disposed.
    #[error("No write cipher for epoch {0}")]
    CipherUnavailable(u16),

    #[error("Crypto error: {0}")]
    CryptoError(String),

    /// Stream transport write after close.
    #[error("Connection or outbound has been closed")]
    ConnectionClosed,

    #[error("Invalid handshake message: {0}")]
    InvalidHandshake(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this error must terminate the connection.
    ///
    /// Callers turn fatal errors into a fatal alert (if still possible) and
    /// tear down the connection. They are never retried.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::SequenceOverflow
            | Error::WrappedEpoch
            | Error::PacketTooSmall(_)
            | Error::RecordTooLarge(_)
            | Error::CipherUnavailable(_)
            | Error::CryptoError(_) => true,
            Error::ConnectionClosed
            | Error::InvalidHandshake(_)
            | Error::ConfigError(_)
            | Error::Io(_) => false,
        }
    }
}
