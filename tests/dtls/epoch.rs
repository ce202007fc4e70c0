//! Write cipher changes and sequence number limits.

use recseal::crypto::DTLS_MAX_SEQUENCE;
use recseal::{Buf, ContentType, Error, MessageType, ProtocolVersion, WriteCipher};

use crate::common::*;

fn flight_across_ccs() -> recseal::DtlsOutputRecord {
    let e = engine(1150);
    e.encode_handshake(&handshake(SERVER_HELLO, &[1; 30])).unwrap();
    e.change_write_ciphers(gcm(1), true).unwrap();
    e.encode_handshake(&handshake(FINISHED, &[2; 12])).unwrap();
    e
}

#[test]
fn change_cipher_spec_splits_flight_by_epoch() {
    let _ = env_logger::try_init();

    let e = flight_across_ccs();
    assert_eq!(e.write_epoch(), 1);
    assert_eq!(e.previous_write_epoch(), Some(0));

    let hdrs = headers(&drain_all(&e));
    assert_eq!(hdrs.len(), 3);

    assert_eq!((hdrs[0].ctype, hdrs[0].epoch, hdrs[0].seq), (CT_HANDSHAKE, 0, 0));
    assert_eq!(
        (hdrs[1].ctype, hdrs[1].epoch, hdrs[1].seq),
        (CT_CHANGE_CIPHER_SPEC, 0, 1)
    );
    assert_eq!((hdrs[2].ctype, hdrs[2].epoch, hdrs[2].seq), (CT_HANDSHAKE, 1, 0));

    // explicit nonce + (handshake header + body) + tag
    assert_eq!(hdrs[2].len, 8 + 12 + 12 + 16);
}

#[test]
fn explicit_nonce_carries_epoch_and_sequence() {
    let e = flight_across_ccs();
    let records = drain_all(&e);
    let (_, fragment) = parse_record(&records[2]);
    assert_eq!(&fragment[..8], &[0, 1, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn retransmission_uses_previous_epoch_cipher() {
    let e = flight_across_ccs();
    let first = headers(&drain_all(&e));

    assert!(e.launch_retransmission());
    let second = headers(&drain_all(&e));

    let epochs: Vec<_> = second.iter().map(|h| (h.epoch, h.seq)).collect();
    assert_eq!(epochs, vec![(0, 2), (0, 3), (1, 1)]);
    assert_eq!(first.len(), second.len());
}

#[test]
fn cipher_two_epochs_back_is_gone() {
    let e = flight_across_ccs();
    drain_all(&e);

    e.change_write_ciphers(gcm(2), false).unwrap();
    assert_eq!(e.write_epoch(), 2);
    assert_eq!(e.previous_write_epoch(), Some(1));

    assert!(e.launch_retransmission());
    let mut dst = Buf::new();
    assert!(matches!(e.drain(&mut dst), Err(Error::CipherUnavailable(0))));
    assert!(dst.is_empty());
}

#[test]
fn descriptor_reports_last_handshake_type() {
    let e = flight_across_ccs();

    let mut dst = Buf::new();
    let first = e.drain(&mut dst).unwrap().unwrap();
    assert_eq!(first.content_type, ContentType::Handshake);
    assert_eq!(first.handshake_type, Some(MessageType::ServerHello));

    dst.clear();
    let ccs = e.drain(&mut dst).unwrap().unwrap();
    assert_eq!(ccs.content_type, ContentType::ChangeCipherSpec);
    assert_eq!(ccs.handshake_type, None);

    dst.clear();
    let finished = e.drain(&mut dst).unwrap().unwrap();
    assert_eq!(finished.epoch, 1);
    assert_eq!(finished.sequence_number, 0);
    assert_eq!(finished.handshake_type, Some(MessageType::Finished));
}

#[test]
fn sequence_overflow_stops_output() {
    let e = engine(1150);
    let start = DTLS_MAX_SEQUENCE - 256;
    e.change_write_ciphers(
        WriteCipher::null(ProtocolVersion::DTLS1_2).with_sequence_number(start),
        false,
    )
    .unwrap();
    assert!(e.needs_rekey());

    let data = [0u8; 10];
    let mut dst = Buf::new();
    let ct = e.encode(&mut [&data[..]], &mut dst).unwrap().unwrap();
    assert_eq!(ct.sequence_number, start);

    let mut dst = Buf::new();
    let res = e.encode(&mut [&data[..]], &mut dst);
    match res {
        Err(err @ Error::SequenceOverflow) => assert!(err.is_fatal()),
        other => panic!("expected overflow, got {:?}", other),
    }
    assert!(dst.is_empty());
}

#[test]
fn epoch_does_not_wrap() {
    let e = engine(1150);
    for _ in 0..u16::MAX {
        e.change_write_ciphers(WriteCipher::null(ProtocolVersion::DTLS1_2), false)
            .unwrap();
    }
    assert_eq!(e.write_epoch(), u16::MAX);

    let res = e.change_write_ciphers(WriteCipher::null(ProtocolVersion::DTLS1_2), false);
    assert!(matches!(res, Err(Error::WrappedEpoch)));
    assert_eq!(e.write_epoch(), u16::MAX);

    // A refused change leaves no change_cipher_spec behind.
    let res = e.change_write_ciphers(WriteCipher::null(ProtocolVersion::DTLS1_2), true);
    assert!(matches!(res, Err(Error::WrappedEpoch)));
    assert_eq!(e.flight_len(), 0);
}
