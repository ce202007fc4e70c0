//! Closing the datagram engine.

use std::io;

use recseal::{AlertDescription, AlertLevel, Buf, CloseOutcome};

use crate::common::*;

struct BrokenPipe;

impl io::Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn close_waits_for_pending_alert() {
    let _ = env_logger::try_init();

    let e = engine(1150);
    e.encode_alert(AlertLevel::Warning, AlertDescription::CloseNotify)
        .unwrap();
    e.close();

    assert!(e.is_closed());
    assert!(e.is_close_waiting());

    let records = drain_all(&e);
    assert_eq!(records.len(), 1);
    let (hdr, fragment) = parse_record(&records[0]);
    assert_eq!(hdr.ctype, CT_ALERT);
    assert_eq!(fragment, &[1, 0]);

    assert!(e.is_closed());
    assert!(!e.is_close_waiting());
    assert!(drain_all(&e).is_empty());
}

#[test]
fn close_waiting_holds_back_application_data() {
    let e = engine(1150);
    e.encode_alert(AlertLevel::Warning, AlertDescription::CloseNotify)
        .unwrap();
    e.close();
    assert!(e.is_close_waiting());

    let data = [5u8; 4];
    let mut sources: [&[u8]; 1] = [&data];
    let mut dst = Buf::new();
    assert_eq!(e.encode(&mut sources, &mut dst).unwrap(), None);
    assert!(dst.is_empty());
    assert_eq!(sources[0].len(), 4);
    assert!(e.is_close_waiting());

    let records = drain_all(&e);
    assert_eq!(records.len(), 1);
    let (hdr, fragment) = parse_record(&records[0]);
    assert_eq!(hdr.ctype, CT_ALERT);
    assert_eq!(fragment, &[1, 0]);
    assert!(!e.is_close_waiting());
}

#[test]
fn unsent_alert_is_kept_for_next_flight() {
    let e = engine(1150);
    e.encode_alert(AlertLevel::Warning, AlertDescription::NoRenegotiation)
        .unwrap();
    e.encode_handshake(&handshake(SERVER_HELLO, &[1; 20])).unwrap();
    e.encode_handshake(&handshake(SERVER_HELLO_DONE, &[])).unwrap();

    let hdrs = headers(&drain_all(&e));
    let types: Vec<u8> = hdrs.iter().map(|h| h.ctype).collect();
    assert_eq!(types, vec![CT_ALERT, CT_HANDSHAKE]);
    assert_eq!(hdrs[0].seq, 0);
    assert_eq!(hdrs[1].seq, 1);
}

#[test]
fn close_without_alert_is_immediate() {
    let e = engine(1150);
    e.close();
    assert!(e.is_closed());
    assert!(!e.is_close_waiting());

    let data = [1u8; 8];
    let mut sources: [&[u8]; 1] = [&data];
    let mut dst = Buf::new();
    assert_eq!(e.encode(&mut sources, &mut dst).unwrap(), None);
}

#[test]
fn alert_flight_is_not_retransmitted() {
    let e = engine(1150);
    e.encode_handshake(&handshake(CLIENT_HELLO, b"hi")).unwrap();
    drain_all(&e);

    e.encode_alert(AlertLevel::Fatal, AlertDescription::HandshakeFailure)
        .unwrap();
    assert_eq!(e.flight_len(), 1);
    assert!(e.has_alert());

    assert_eq!(drain_all(&e).len(), 1);
    assert!(!e.is_retransmittable());
    assert!(!e.launch_retransmission());
}

#[test]
fn linger_close_drains_final_alert() {
    let e = engine(1150);
    e.encode_alert(AlertLevel::Warning, AlertDescription::CloseNotify)
        .unwrap();

    let session = Session::default();
    let mut wire: Vec<u8> = Vec::new();
    assert_eq!(e.linger_close(&mut wire, &session), CloseOutcome::Drained(1));
    assert!(!session.is_invalidated());
    assert!(e.is_closed());

    let (hdr, fragment) = parse_record(&wire);
    assert_eq!((hdr.ctype, hdr.version), (CT_ALERT, 0xfefd));
    assert_eq!(fragment, &[1, 0]);
}

#[test]
fn linger_close_with_nothing_pending() {
    let e = engine(1150);
    let session = Session::default();
    let mut wire: Vec<u8> = Vec::new();
    assert_eq!(e.linger_close(&mut wire, &session), CloseOutcome::Closed);
    assert!(wire.is_empty());
    assert!(!session.is_invalidated());
}

#[test]
fn linger_close_after_close_writes_nothing() {
    let e = engine(1150);
    e.encode_handshake(&handshake(FINISHED, &[1; 12])).unwrap();
    e.close();
    assert!(e.is_closed());

    let session = Session::default();
    let mut wire: Vec<u8> = Vec::new();
    assert_eq!(e.linger_close(&mut wire, &session), CloseOutcome::Closed);
    assert!(wire.is_empty());
    assert!(!session.is_invalidated());
}

#[test]
fn linger_close_failed_write_invalidates_session() {
    let e = engine(1150);
    e.encode_alert(AlertLevel::Fatal, AlertDescription::InternalError)
        .unwrap();

    let session = Session::default();
    let mut sink = BrokenPipe;
    assert_eq!(e.linger_close(&mut sink, &session), CloseOutcome::Abandoned);
    assert!(session.is_invalidated());
}
