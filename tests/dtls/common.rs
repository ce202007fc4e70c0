//! Shared helpers for the datagram engine tests.

#![allow(unused)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use recseal::crypto::AES_GCM_KEY_LIMIT;
use recseal::record::HandshakeHeader;
use recseal::{Buf, Config, DtlsOutputRecord, ProtocolVersion};
use recseal::{SessionControl, WriteCipher};

pub const CLIENT_HELLO: u8 = 1;
pub const SERVER_HELLO: u8 = 2;
pub const HELLO_VERIFY_REQUEST: u8 = 3;
pub const CERTIFICATE: u8 = 11;
pub const SERVER_HELLO_DONE: u8 = 14;
pub const FINISHED: u8 = 20;

pub const CT_CHANGE_CIPHER_SPEC: u8 = 20;
pub const CT_ALERT: u8 = 21;
pub const CT_HANDSHAKE: u8 = 22;
pub const CT_APPLICATION_DATA: u8 = 23;

/// Parsed DTLS record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecHdr {
    pub ctype: u8,
    pub version: u16,
    pub epoch: u16,
    pub seq: u64,
    pub len: usize,
}

/// Parse one DTLS record, returning the header and its fragment.
pub fn parse_record(record: &[u8]) -> (RecHdr, &[u8]) {
    assert!(record.len() >= 13, "record shorter than header");
    let mut seq = [0u8; 8];
    seq[2..].copy_from_slice(&record[5..11]);
    let hdr = RecHdr {
        ctype: record[0],
        version: u16::from_be_bytes([record[1], record[2]]),
        epoch: u16::from_be_bytes([record[3], record[4]]),
        seq: u64::from_be_bytes(seq),
        len: u16::from_be_bytes([record[11], record[12]]) as usize,
    };
    assert_eq!(record.len(), 13 + hdr.len, "one record per buffer");
    (hdr, &record[13..])
}

/// Parse the handshake fragments packed into a plaintext record.
pub fn parse_fragments(mut fragment: &[u8]) -> Vec<(HandshakeHeader, Vec<u8>)> {
    let mut out = Vec::new();
    while !fragment.is_empty() {
        let h = HandshakeHeader::parse(fragment).expect("handshake header");
        let end = 12 + h.fragment_length as usize;
        out.push((h, fragment[12..end].to_vec()));
        fragment = &fragment[end..];
    }
    out
}

/// A handshake message as passed to `encode_handshake`.
pub fn handshake(msg_type: u8, body: &[u8]) -> Vec<u8> {
    let mut v = vec![msg_type];
    v.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    v.extend_from_slice(body);
    v
}

pub fn engine(packet_size: usize) -> DtlsOutputRecord {
    let config = Config::builder()
        .packet_size(packet_size)
        .build()
        .expect("config");
    DtlsOutputRecord::new(Arc::new(config)).expect("engine")
}

/// Pull records until the engine has nothing more to send.
pub fn drain_all<T: recseal::TranscriptSink>(engine: &DtlsOutputRecord<T>) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let mut dst = Buf::new();
        match engine.drain(&mut dst).expect("drain") {
            Some(_) => out.push(dst.into_vec()),
            None => break,
        }
    }
    out
}

pub fn headers(records: &[Vec<u8>]) -> Vec<RecHdr> {
    records.iter().map(|r| parse_record(r).0).collect()
}

pub fn gcm(key: u8) -> WriteCipher {
    WriteCipher::aes_gcm(
        ProtocolVersion::DTLS1_2,
        &[key; 16],
        &[key; 4],
        AES_GCM_KEY_LIMIT,
    )
    .expect("gcm cipher")
}

#[derive(Default)]
pub struct Session {
    invalidated: AtomicBool,
}

impl Session {
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::SeqCst)
    }
}

impl SessionControl for Session {
    fn invalidate(&self) {
        self.invalidated.store(true, Ordering::SeqCst);
    }
}
