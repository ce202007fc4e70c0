//! recseal
//!
//! The outbound half of a DTLS/TLS record layer. Handshake messages,
//! change_cipher_spec, alerts and application data go in; framed and
//! protected records come out.
//!
//! Two engines share the record framing and write ciphers:
//!
//! - [`DtlsOutputRecord`] buffers a handshake flight, fragments its messages
//!   to fit the packet size, keeps the previous epoch's cipher for
//!   retransmission and hands out one record per [`DtlsOutputRecord::encode`]
//!   call.
//! - [`TlsOutputRecord`] writes records straight to a [`RecordSink`] and
//!   coalesces handshake messages until flushed.
//!
//! Both track 64-bit (stream) or 48-bit (datagram) sequence numbers per
//! cipher and refuse to write once a sequence number would wrap.
//!
//! ```
//! use std::sync::Arc;
//! use recseal::{Buf, Config, DtlsOutputRecord};
//!
//! let engine = DtlsOutputRecord::new(Arc::new(Config::default())).unwrap();
//!
//! // ClientHello with a 2 byte body ends the flight.
//! engine.encode_handshake(&[1, 0, 0, 2, 0xfe, 0xfd]).unwrap();
//!
//! let mut datagram = Buf::new();
//! let record = engine.drain(&mut datagram).unwrap().unwrap();
//! assert_eq!(record.sequence_number, 0);
//! assert_eq!(datagram.len(), 13 + 12 + 2);
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod buffer;
pub use buffer::{Buf, BufferPool};

mod config;
pub use config::{Config, ConfigBuilder, MIN_PACKET_SIZE};

pub mod crypto;
pub use crypto::{Authenticator, SequenceKind, WriteCipher};

mod dtls;
pub use dtls::DtlsOutputRecord;

mod error;
pub use error::Error;

pub mod record;
pub use record::{Ciphertext, FragmentLimits, RecordSink, SourceCursor};

mod rng;
pub use rng::SeededRng;

mod shutdown;
pub use shutdown::{CloseOutcome, SessionControl};

mod tls;
pub use tls::TlsOutputRecord;

mod transcript;
pub use transcript::{HandshakeHash, HashAlgorithm, TranscriptSink};

pub mod types;
pub use types::{AlertDescription, AlertLevel, ContentType, MessageType, ProtocolVersion};
