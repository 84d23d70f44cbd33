//! Unit tests for the frame codec.
//!
//! Covers the head layout, oversized rejection before allocation, streaming
//! decode across partial reads, and EOF handling.

use bytes::{BufMut, Bytes, BytesMut};
use proptest::prelude::*;
use rstest::rstest;
use tokio_util::codec::{Decoder, Encoder};

use super::*;

fn raw_head(data_len: u32, id: u32) -> [u8; HEAD_LEN] {
    let mut head = [0u8; HEAD_LEN];
    head[..4].copy_from_slice(&data_len.to_le_bytes());
    head[4..].copy_from_slice(&id.to_le_bytes());
    head
}

#[test]
fn pack_writes_length_then_id() {
    let bytes = DataPack::new(64)
        .pack(&Message::new(0x0102_0304, Bytes::from_static(b"abc")))
        .expect("pack should succeed");
    assert_eq!(
        bytes.as_ref(),
        &[3, 0, 0, 0, 0x04, 0x03, 0x02, 0x01, b'a', b'b', b'c']
    );
}

#[test]
fn head_len_is_constant() {
    assert_eq!(DataPack::new(1).head_len(), 8);
    assert_eq!(DataPack::default().head_len(), HEAD_LEN);
}

#[test]
fn empty_payload_packs_to_bare_head() {
    let bytes = DataPack::default()
        .pack(&Message::new(9, Bytes::new()))
        .expect("pack should succeed");
    assert_eq!(bytes.as_ref(), &raw_head(0, 9));
}

#[rstest]
#[case(16, 17)]
#[case(0, 1)]
#[case(4096, 4097)]
fn pack_rejects_payload_over_max(#[case] max: usize, #[case] size: usize) {
    let err = DataPack::new(max)
        .pack(&Message::new(1, vec![0u8; size]))
        .expect_err("oversized payload must not encode");
    assert_eq!(err, EncodeError::PayloadTooLarge { size, max });
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(7)]
fn unpack_head_requires_full_head(#[case] have: usize) {
    let head = raw_head(1, 1);
    let err = DataPack::default()
        .unpack_head(&head[..have])
        .expect_err("short head must fail");
    assert_eq!(
        err,
        DecodeError::IncompleteHead {
            have,
            need: HEAD_LEN
        }
    );
}

#[test]
fn unpack_head_rejects_oversized_declaration() {
    let err = DataPack::new(1024)
        .unpack_head(&raw_head(u32::MAX, 5))
        .expect_err("oversized head must fail");
    assert_eq!(
        err,
        DecodeError::Oversized {
            size: u32::MAX as usize,
            max: 1024
        }
    );
}

#[test]
fn unpack_head_accepts_payload_at_limit() {
    let head = DataPack::new(1024)
        .unpack_head(&raw_head(1024, 5))
        .expect("payload at the limit is valid");
    assert_eq!(head, FrameHead { id: 5, data_len: 1024 });
}

#[test]
fn decoder_rejects_oversized_head_without_reserving_payload() {
    let mut codec = MessageCodec::new(16);
    let mut buf = BytesMut::with_capacity(HEAD_LEN);
    buf.put_slice(&raw_head(1 << 30, 1));
    let capacity_before = buf.capacity();

    let err = codec.decode(&mut buf).expect_err("decode must fail");

    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::Oversized { max: 16, .. })
    ));
    assert!(err.is_protocol_violation());
    assert_eq!(buf.capacity(), capacity_before);
}

#[test]
fn decoder_waits_for_payload_across_partial_reads() {
    let mut codec = MessageCodec::new(64);
    let frame = DataPack::new(64)
        .pack(&Message::new(2, Bytes::from_static(b"hello")))
        .expect("pack");
    let mut buf = BytesMut::new();

    buf.put_slice(&frame[..5]);
    assert!(codec.decode(&mut buf).expect("partial head").is_none());

    buf.put_slice(&frame[5..10]);
    assert!(codec.decode(&mut buf).expect("partial payload").is_none());

    buf.put_slice(&frame[10..]);
    let msg = codec
        .decode(&mut buf)
        .expect("complete frame")
        .expect("message expected");
    assert_eq!(msg, Message::new(2, Bytes::from_static(b"hello")));
    assert!(buf.is_empty());
}

#[test]
fn decoder_yields_back_to_back_frames_in_order() {
    let mut codec = MessageCodec::new(64);
    let mut buf = BytesMut::new();
    for (id, body) in [(1u32, "a"), (2, ""), (3, "ccc")] {
        codec
            .encode(Message::new(id, body), &mut buf)
            .expect("encode");
    }

    let ids: Vec<_> = std::iter::from_fn(|| codec.decode(&mut buf).expect("decode"))
        .map(|m| (m.id(), m.data().clone()))
        .collect();

    assert_eq!(
        ids,
        vec![
            (1, Bytes::from_static(b"a")),
            (2, Bytes::new()),
            (3, Bytes::from_static(b"ccc")),
        ]
    );
}

#[test]
fn decode_eof_on_clean_boundary_ends_stream() {
    let mut codec = MessageCodec::default();
    let mut buf = BytesMut::new();
    assert!(codec.decode_eof(&mut buf).expect("clean close").is_none());
}

#[rstest]
#[case::mid_head(&[1, 0, 0][..], 3, HEAD_LEN)]
#[case::mid_payload(&[4, 0, 0, 0, 1, 0, 0, 0, b'x'][..], HEAD_LEN + 1, HEAD_LEN + 4)]
fn decode_eof_mid_frame_reports_truncation(
    #[case] bytes: &[u8],
    #[case] received: usize,
    #[case] expected: usize,
) {
    let mut codec = MessageCodec::new(64);
    let mut buf = BytesMut::from(bytes);
    let err = codec.decode_eof(&mut buf).expect_err("truncated frame");
    assert!(matches!(
        err,
        CodecError::Decode(DecodeError::Truncated { received: r, expected: e })
            if r == received && e == expected
    ));
}

#[test]
fn encoder_surfaces_encode_error() {
    let mut codec = MessageCodec::new(2);
    let mut buf = BytesMut::new();
    let err = codec
        .encode(Message::new(1, "abc"), &mut buf)
        .expect_err("payload over limit");
    assert!(matches!(err, CodecError::Encode(_)));
    assert!(buf.is_empty());
}

proptest! {
    #[test]
    fn head_describes_packed_payload(
        id in any::<u32>(),
        data in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let pack = DataPack::new(512);
        let bytes = pack.pack(&Message::new(id, data.clone())).expect("pack");
        let head = pack.unpack_head(&bytes).expect("unpack head");
        prop_assert_eq!(head.id, id);
        prop_assert_eq!(head.payload_len(), data.len());
        prop_assert_eq!(&bytes[HEAD_LEN..], &data[..]);
    }
}
