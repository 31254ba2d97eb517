// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

use super::*;
use crate::response::Response;

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Ok;
    let encoded = encode(&response).expect("encode failed");
    let json = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(json.starts_with('{'), "should be a JSON object: {json}");
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original).await.expect("write failed");
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");
    assert_eq!(read_back.as_deref(), Some(original.as_slice()));
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data).await.expect("write failed");

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_returns_none_on_clean_eof() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let got = read_message(&mut cursor).await.expect("read failed");
    assert!(got.is_none());
}

#[tokio::test]
async fn read_message_fails_mid_frame() {
    // Length prefix promises 100 bytes but only 3 follow.
    let mut buffer = 100u32.to_be_bytes().to_vec();
    buffer.extend_from_slice(b"abc");
    let mut cursor = std::io::Cursor::new(buffer);
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, WireError::UnexpectedEof), "got: {err:?}");
}

#[tokio::test]
async fn oversized_frames_are_rejected() {
    let mut cursor = std::io::Cursor::new((MAX_FRAME_LEN as u32 + 1).to_be_bytes().to_vec());
    let err = read_message(&mut cursor).await.unwrap_err();
    assert!(matches!(err, WireError::FrameTooLarge(_)), "got: {err:?}");

    let big = vec![0u8; MAX_FRAME_LEN + 1];
    let mut out = Vec::new();
    let err = write_message(&mut out, &big).await.unwrap_err();
    assert!(matches!(err, WireError::FrameTooLarge(_)), "got: {err:?}");
}

#[test]
fn typed_roundtrip_through_wire_form() {
    let request = crate::Request::Heartbeat {
        runtime_id: "r-1".to_string(),
    };
    let bytes = encode(&request).unwrap();
    let parsed: crate::Request = decode(&bytes).unwrap();
    assert_eq!(request, parsed);
}
