//! Datagram (DTLS) output.

mod epoch;
mod fragmenter;
mod output;

pub use output::DtlsOutputRecord;
