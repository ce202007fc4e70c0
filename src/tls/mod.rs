//! Stream (TLS) output.

mod output;

pub use output::TlsOutputRecord;
