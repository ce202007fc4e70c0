//! Application data records.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes128Gcm, KeyInit, Nonce};

use recseal::{Buf, ContentType};

use crate::common::*;

#[test]
fn scatter_sources_are_consumed_in_order() {
    let _ = env_logger::try_init();

    let e = engine(30);
    let a = [1u8; 10];
    let b = [2u8; 10];
    let c = [3u8; 10];
    let mut sources: [&[u8]; 3] = [&a, &b, &c];

    let mut dst = Buf::new();
    let ct = e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!(ct.content_type, ContentType::ApplicationData);
    assert_eq!(ct.sequence_number, 0);

    // 30 - 13 byte header leaves 17 bytes of data
    let (hdr, fragment) = parse_record(&dst);
    assert_eq!(hdr.ctype, CT_APPLICATION_DATA);
    assert_eq!(hdr.len, 17);
    assert_eq!(&fragment[..10], &a);
    assert_eq!(&fragment[10..], &b[..7]);
    assert_eq!(sources[0].len(), 0);
    assert_eq!(sources[1].len(), 3);
    assert_eq!(sources[2].len(), 10);

    let mut dst = Buf::new();
    let ct = e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!(ct.sequence_number, 1);
    let (_, fragment) = parse_record(&dst);
    assert_eq!(fragment, &[2, 2, 2, 3, 3, 3, 3, 3, 3, 3, 3, 3, 3]);
    assert!(sources.iter().all(|s| s.is_empty()));

    let mut dst = Buf::new();
    assert_eq!(e.encode(&mut sources, &mut dst).unwrap(), None);
}

#[test]
fn flight_goes_before_application_data() {
    let e = engine(1150);
    e.encode_handshake(&handshake(CLIENT_HELLO, b"hello")).unwrap();

    let data = [7u8; 20];
    let mut sources: [&[u8]; 1] = [&data];

    let mut dst = Buf::new();
    let ct = e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!(ct.content_type, ContentType::Handshake);
    assert_eq!(sources[0].len(), 20, "data untouched");

    let mut dst = Buf::new();
    let ct = e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!(ct.content_type, ContentType::ApplicationData);
    assert!(sources[0].is_empty());
}

#[test]
fn record_appended_after_existing_bytes() {
    let e = engine(1150);
    let data = [1u8; 4];
    let mut sources: [&[u8]; 1] = [&data];

    let mut dst = Buf::from_slice(b"prefix");
    e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!(&dst[..6], b"prefix");
    assert_eq!(dst.len(), 6 + 13 + 4);
}

#[test]
fn gcm_record_decrypts() {
    let e = engine(1150);
    e.change_write_ciphers(gcm(9), false).unwrap();

    let plaintext = b"application payload";
    let mut sources: [&[u8]; 1] = [plaintext];
    let mut dst = Buf::new();
    let ct = e.encode(&mut sources, &mut dst).unwrap().unwrap();
    assert_eq!((ct.epoch, ct.sequence_number), (1, 0));

    let (hdr, fragment) = parse_record(&dst);
    assert_eq!(hdr.len, 8 + plaintext.len() + 16);

    let explicit = &fragment[..8];
    let mut nonce = [9u8; 12];
    nonce[4..].copy_from_slice(explicit);

    let mut aad = Vec::new();
    aad.extend_from_slice(explicit);
    aad.push(CT_APPLICATION_DATA);
    aad.extend_from_slice(&[0xfe, 0xfd]);
    aad.extend_from_slice(&(plaintext.len() as u16).to_be_bytes());

    let cipher = Aes128Gcm::new_from_slice(&[9; 16]).unwrap();
    let opened = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: &fragment[8..],
                aad: &aad,
            },
        )
        .expect("authentic record");
    assert_eq!(&opened[..], plaintext);
}

#[test]
fn gcm_fragment_size_accounts_for_overhead() {
    let e = engine(100);
    e.change_write_ciphers(gcm(3), false).unwrap();

    let data = [0u8; 200];
    let mut sources: [&[u8]; 1] = [&data];
    let mut dst = Buf::new();
    e.encode(&mut sources, &mut dst).unwrap().unwrap();

    // 100 - 13 header - 8 nonce - 16 tag
    assert_eq!(dst.len(), 100);
    assert_eq!(sources[0].len(), 200 - 63);
}
