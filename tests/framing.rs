//! V2GTP header integrity: version pair, payload type and announced length.

use v2g_exi::app_hand::{AppHandDocument, ResponseCode, SupportedAppProtocolRes};
use v2g_exi::frame::{decode_framed, encode_framed, read_header, write_header, PayloadType, V2gtpHeader};
use v2g_exi::CodecError;

fn sap_res_frame() -> Vec<u8> {
    let doc = AppHandDocument::SupportedAppProtocolRes(SupportedAppProtocolRes {
        response_code: ResponseCode::OkSuccessfulNegotiation,
        schema_id: Some(1),
    });
    let mut buf = [0u8; 32];
    let len = encode_framed(&mut buf, &doc, PayloadType::SAP).expect("encode");
    buf[..len].to_vec()
}

#[test]
fn test_header_fields() {
    let frame = sap_res_frame();
    let header = V2gtpHeader::parse(&frame).expect("parse");
    assert_eq!(header.payload_type, PayloadType::SAP);
    assert_eq!(header.payload_length, 4);
    assert_eq!(header.payload_type.name(), Some("SAP/ISO2/DIN"));
    assert_eq!(PayloadType(0x1234).name(), None);
}

#[test]
fn test_version_mismatch_rejected() {
    let mut frame = sap_res_frame();
    frame[0] = 0x02;
    frame[1] = 0xFD;
    assert!(matches!(
        read_header(&frame, PayloadType::SAP),
        Err(CodecError::MalformedHeader(_))
    ));
}

#[test]
fn test_inverse_version_mismatch_rejected() {
    let mut frame = sap_res_frame();
    frame[1] = 0xFF;
    let err = read_header(&frame, PayloadType::SAP).unwrap_err();
    assert!(matches!(err, CodecError::MalformedHeader(_)));
    assert_ne!(err.code(), 0);
}

#[test]
fn test_payload_type_mismatch() {
    let frame = sap_res_frame();
    match read_header(&frame, PayloadType::ISO20_MAINSTREAM) {
        Err(CodecError::PayloadTypeMismatch { expected, found }) => {
            assert_eq!(expected, 0x8002);
            assert_eq!(found, 0x8001);
        }
        other => panic!("expected type mismatch, got {:?}", other),
    }
    let decoded: Result<AppHandDocument, _> = decode_framed(&frame, PayloadType::ISO20_DC);
    assert!(matches!(decoded, Err(CodecError::PayloadTypeMismatch { .. })));
}

#[test]
fn test_failed_read_does_not_modify_input() {
    let mut frame = sap_res_frame();
    frame[1] = 0x00;
    let before = frame.clone();
    assert!(read_header(&frame, PayloadType::SAP).is_err());
    assert_eq!(frame, before);
}

#[test]
fn test_truncated_payload() {
    let frame = sap_res_frame();
    let short = &frame[..frame.len() - 1];
    let decoded: Result<AppHandDocument, _> = decode_framed(short, PayloadType::SAP);
    assert!(matches!(decoded, Err(CodecError::BufferOverflow)));
    assert!(matches!(
        V2gtpHeader::parse(&frame[..5]),
        Err(CodecError::MalformedHeader(_))
    ));
}

#[test]
fn test_trailing_bytes_ignored() {
    let mut frame = sap_res_frame();
    frame.extend_from_slice(&[0xFF; 16]);
    let decoded: AppHandDocument = decode_framed(&frame, PayloadType::SAP).expect("decode");
    assert_eq!(decoded.clone(), decoded);
}

#[test]
fn test_decode_stops_at_announced_length() {
    // Announce one byte less than the payload needs.
    let mut frame = sap_res_frame();
    frame[7] = 3;
    frame.push(0x00);
    let decoded: Result<AppHandDocument, _> = decode_framed(&frame, PayloadType::SAP);
    assert!(matches!(decoded, Err(CodecError::BufferOverflow)));
}

#[test]
fn test_write_header_all_payload_types() {
    let types = [
        (PayloadType::SAP, [0x80, 0x01]),
        (PayloadType::ISO2_DIN, [0x80, 0x01]),
        (PayloadType::ISO20_MAINSTREAM, [0x80, 0x02]),
        (PayloadType::ISO20_AC, [0x80, 0x03]),
        (PayloadType::ISO20_DC, [0x80, 0x04]),
        (PayloadType::ISO20_ACDP, [0x80, 0x05]),
        (PayloadType::ISO20_WPT, [0x80, 0x06]),
        (PayloadType::SDP_REQUEST, [0x90, 0x00]),
        (PayloadType::SDP_RESPONSE, [0x90, 0x01]),
    ];
    for (payload_type, tag) in types {
        let mut buf = [0u8; 8];
        write_header(&mut buf, 0x0102_0304, payload_type).expect("write");
        assert_eq!(buf[..2], [0x01, 0xFE]);
        assert_eq!(buf[2..4], tag);
        assert_eq!(buf[4..], [0x01, 0x02, 0x03, 0x04]);
        assert_eq!(read_header(&buf, payload_type).expect("read"), 0x0102_0304);
    }
}

#[test]
fn test_encode_into_short_buffer() {
    let doc = AppHandDocument::SupportedAppProtocolRes(SupportedAppProtocolRes::default());
    let mut buf = [0u8; 9];
    assert!(matches!(
        encode_framed(&mut buf, &doc, PayloadType::SAP),
        Err(CodecError::BufferOverflow)
    ));
}
