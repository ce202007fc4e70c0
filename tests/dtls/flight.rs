//! Flight buffering, fragmentation and retransmission.

use std::collections::BTreeMap;
use std::sync::Arc;

use recseal::record::HandshakeHeader;
use recseal::{Buf, Config, DtlsOutputRecord, Error, MessageType};

use crate::common::*;

#[test]
fn fragments_reassemble_to_original_messages() {
    let _ = env_logger::try_init();

    let e = engine(100);
    let server_hello = vec![0xaa; 40];
    let certificate: Vec<u8> = (0..500u32).map(|i| i as u8).collect();

    e.encode_handshake(&handshake(SERVER_HELLO, &server_hello)).unwrap();
    e.encode_handshake(&handshake(CERTIFICATE, &certificate)).unwrap();
    e.encode_handshake(&handshake(SERVER_HELLO_DONE, &[])).unwrap();

    let records = drain_all(&e);
    assert!(records.len() > 5, "certificate must be split");

    let mut messages: BTreeMap<u16, (u8, u32, Vec<u8>)> = BTreeMap::new();
    for r in &records {
        assert!(r.len() <= 100, "record of {} bytes exceeds packet", r.len());
        let (hdr, fragment) = parse_record(r);
        assert_eq!(hdr.ctype, CT_HANDSHAKE);
        assert_eq!(hdr.epoch, 0);

        for (h, body) in parse_fragments(fragment) {
            let entry = messages
                .entry(h.message_seq)
                .or_insert_with(|| (h.msg_type.as_u8(), h.length, Vec::new()));
            assert_eq!(h.fragment_offset as usize, entry.2.len(), "contiguous");
            assert_eq!(h.length, entry.1);
            entry.2.extend_from_slice(&body);
        }
    }

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[&0], (SERVER_HELLO, 40, server_hello));
    assert_eq!(messages[&1], (CERTIFICATE, 500, certificate));
    assert_eq!(messages[&2], (SERVER_HELLO_DONE, 0, vec![]));
}

#[test]
fn sequence_numbers_increase_by_one() {
    let e = engine(64);
    e.encode_handshake(&handshake(CERTIFICATE, &[7; 300])).unwrap();
    e.encode_handshake(&handshake(SERVER_HELLO_DONE, &[])).unwrap();

    let hdrs = headers(&drain_all(&e));
    for (i, h) in hdrs.iter().enumerate() {
        assert_eq!(h.seq, i as u64);
        assert_eq!(h.version, 0xfefd);
    }
}

#[test]
fn incomplete_flight_is_held_back() {
    let e = engine(1150);
    e.encode_handshake(&handshake(SERVER_HELLO, b"hello")).unwrap();

    assert!(!e.is_flight_ready());
    assert!(e.is_empty());
    assert!(drain_all(&e).is_empty());

    e.encode_handshake(&handshake(SERVER_HELLO_DONE, &[])).unwrap();
    assert!(e.is_flight_ready());

    let records = drain_all(&e);
    assert_eq!(records.len(), 1, "both messages packed in one record");
    let fragments = parse_fragments(parse_record(&records[0]).1);
    assert_eq!(fragments.len(), 2);
}

#[test]
fn next_message_after_flight_starts_over() {
    let e = engine(1150);
    e.encode_handshake(&handshake(CLIENT_HELLO, b"first")).unwrap();
    assert_eq!(drain_all(&e).len(), 1);
    assert!(e.is_retransmittable());

    e.encode_handshake(&handshake(SERVER_HELLO, b"second")).unwrap();
    assert!(!e.is_retransmittable());
    assert!(!e.launch_retransmission());
    assert_eq!(e.flight_len(), 1);
    assert_eq!(e.flight_handshake_types(), vec![MessageType::ServerHello]);
}

#[test]
fn retransmission_resends_with_new_sequence_numbers() {
    let e = engine(60);
    e.encode_handshake(&handshake(CLIENT_HELLO, &[3; 80])).unwrap();

    let first = drain_all(&e);
    assert!(e.launch_retransmission());
    let second = drain_all(&e);

    assert_eq!(first.len(), second.len());
    let n = first.len() as u64;
    for (i, (a, b)) in first.iter().zip(second.iter()).enumerate() {
        let (ha, fa) = parse_record(a);
        let (hb, fb) = parse_record(b);
        assert_eq!(ha.seq, i as u64);
        assert_eq!(hb.seq, n + i as u64);
        assert_eq!(fa, fb, "same fragments on resend");
    }
    assert_eq!(e.next_handshake_seq(), 1, "resend keeps message_seq");
}

#[test]
fn transcript_sees_each_message_once() {
    let config = Arc::new(Config::builder().packet_size(40).build().unwrap());
    let e = DtlsOutputRecord::with_transcript(config, Buf::new()).unwrap();

    e.encode_handshake(&handshake(HELLO_VERIFY_REQUEST, &[1; 20])).unwrap();
    drain_all(&e);
    assert!(e.transcript().is_empty(), "HelloVerifyRequest is not hashed");

    let body = [9u8; 50];
    e.encode_handshake(&handshake(CLIENT_HELLO, &body)).unwrap();

    let mut expected = Buf::new();
    HandshakeHeader::unfragmented(MessageType::ClientHello, 50, 1).serialize(&mut expected);
    expected.extend_from_slice(&body);

    assert_eq!(e.transcript(), expected);
    assert!(drain_all(&e).len() > 1);
    assert!(e.launch_retransmission());
    drain_all(&e);
    assert_eq!(e.transcript(), expected);
}

#[test]
fn packet_too_small_is_reported() {
    let e = engine(1150);
    e.encode_handshake(&handshake(CLIENT_HELLO, b"x")).unwrap();
    e.set_packet_size(20);

    let mut dst = Buf::new();
    assert!(matches!(e.drain(&mut dst), Err(Error::PacketTooSmall(20))));
    assert!(dst.is_empty());

    e.set_packet_size(1150);
    assert!(e.drain(&mut dst).unwrap().is_some());
}

#[test]
fn max_fragment_length_bounds_records() {
    let e = engine(0);
    e.set_max_fragment_length(Some(512)).unwrap();
    e.encode_handshake(&handshake(CERTIFICATE, &[5; 2000])).unwrap();
    e.encode_handshake(&handshake(SERVER_HELLO_DONE, &[])).unwrap();

    for r in drain_all(&e) {
        assert!(parse_record(&r).0.len <= 512);
    }
}
