//! Messages without golden vectors: decode(encode(m)) == m, plus XML rendering.

use proptest::prelude::*;
use v2g_exi::app_hand::{AppHandDocument, AppProtocol, SupportedAppProtocolReq};
use v2g_exi::iso20::{
    ChargingSession, CodeOnlyRes, HeaderOnlyReq, Iso20Document, MessageHeader, ResponseCode,
    ServiceDiscoveryReq, ServiceIdList, SessionSetupReq, SessionSetupRes, SessionStopReq,
};
use v2g_exi::xmldsig::{Reference, SignatureMethod, Transform, Transforms, XmldsigFragment};
use v2g_exi::{
    decode_document, decode_framed, encode_document, encode_framed, to_xml, BitReader, BitWriter,
    ExiArray, ExiDocument, ExiString, PayloadType,
};

fn round_trip<D: ExiDocument + PartialEq + std::fmt::Debug>(doc: &D) -> D {
    let mut buf = [0u8; 2048];
    let len = encode_document(doc, &mut buf, 0).expect("encode");
    let back: D = decode_document(&buf[..len], 0).expect("decode");
    assert_eq!(&back, doc);
    back
}

fn header() -> MessageHeader {
    MessageHeader::new(b"00000000", 1707896956850052).expect("header")
}

#[test]
fn test_session_setup_res() {
    let doc = Iso20Document::SessionSetupRes(SessionSetupRes {
        header: header(),
        response_code: ResponseCode::OkNewSessionEstablished,
        evse_id: ExiString::try_from("DE*PNX*E12345*1").expect("evseid"),
    });
    round_trip(&doc);
    let xml = to_xml(&doc);
    assert!(xml.contains("<ResponseCode>OK_NewSessionEstablished</ResponseCode>"));
    assert!(xml.contains("<SessionID>3030303030303030</SessionID>"));
    assert!(xml.starts_with("<SessionSetupRes xmlns=\"urn:iso:std:iso:15118:-20:CommonMessages\">"));
}

#[test]
fn test_session_stop_req_optionals() {
    let bare = SessionStopReq {
        header: header(),
        charging_session: ChargingSession::Terminate,
        ..Default::default()
    };
    round_trip(&Iso20Document::SessionStopReq(bare.clone()));

    let full = SessionStopReq {
        ev_termination_code: Some(ExiString::try_from("E42").expect("code")),
        ev_termination_explanation: Some(ExiString::try_from("user <stop> & leave").expect("text")),
        ..bare.clone()
    };
    let doc = Iso20Document::SessionStopReq(full);
    round_trip(&doc);
    assert!(to_xml(&doc).contains("user &lt;stop&gt; &amp; leave"));

    // Only the explanation: the code slot is skipped.
    let explanation_only = SessionStopReq {
        ev_termination_explanation: Some(ExiString::try_from("done").expect("text")),
        ..bare
    };
    round_trip(&Iso20Document::SessionStopReq(explanation_only));
}

#[test]
fn test_service_discovery_req() {
    round_trip(&Iso20Document::ServiceDiscoveryReq(ServiceDiscoveryReq {
        header: header(),
        supported_service_ids: None,
    }));

    let service_id: ExiArray<u16, 16> =
        ExiArray::try_from([1u16, 2, 5000, u16::MAX].as_slice()).expect("ids");
    let doc = Iso20Document::ServiceDiscoveryReq(ServiceDiscoveryReq {
        header: header(),
        supported_service_ids: Some(ServiceIdList { service_id }),
    });
    round_trip(&doc);
    assert!(to_xml(&doc).contains("<ServiceID>65535</ServiceID>"));
}

#[test]
fn test_header_only_and_code_only_messages() {
    let docs = [
        Iso20Document::AuthorizationSetupReq(HeaderOnlyReq { header: header() }),
        Iso20Document::MeteringConfirmationRes(CodeOnlyRes {
            header: header(),
            response_code: ResponseCode::FailedWrongChargeParameter,
        }),
        Iso20Document::ServiceSelectionRes(CodeOnlyRes {
            header: header(),
            response_code: ResponseCode::Ok,
        }),
        Iso20Document::SessionStopRes(CodeOnlyRes {
            header: header(),
            response_code: ResponseCode::FailedUnknownSession,
        }),
    ];
    for doc in &docs {
        round_trip(doc);
    }
}

#[test]
fn test_signature_method_negative_hmac_length() {
    for hmac in [Some(-1i64), Some(-300), Some(0), Some(i64::MIN), Some(i64::MAX), None] {
        let doc = XmldsigFragment::SignatureMethod(SignatureMethod {
            algorithm: ExiString::try_from("http://www.w3.org/2000/09/xmldsig#hmac-sha1").expect("alg"),
            hmac_output_length: hmac,
        });
        round_trip(&doc);
    }
}

#[test]
fn test_transform_with_xpath() {
    let mut transform = Transform::new("http://www.w3.org/TR/1999/REC-xpath-19991116").expect("alg");
    transform
        .xpath
        .push(ExiString::try_from("ancestor-or-self::dsig:SignedInfo").expect("xpath"))
        .expect("push");
    round_trip(&XmldsigFragment::Transform(transform.clone()));

    let mut transforms = Transforms::default();
    transforms.transform.push(transform).expect("push");
    let doc = XmldsigFragment::Transforms(transforms);
    round_trip(&doc);
    let xml = to_xml(&doc);
    assert!(xml.contains("<Transform Algorithm=\"http://www.w3.org/TR/1999/REC-xpath-19991116\">"));
    assert!(xml.contains("<XPath>ancestor-or-self::dsig:SignedInfo</XPath>"));
}

#[test]
fn test_reference_with_all_attributes() {
    let doc = XmldsigFragment::Reference(Reference {
        id: Some(ExiString::try_from("ref-1").expect("id")),
        type_: Some(ExiString::try_from("urn:type").expect("type")),
        uri: Some(ExiString::try_from("#body").expect("uri")),
        transforms: None,
        digest_method: v2g_exi::xmldsig::Method::new("http://www.w3.org/2001/04/xmlenc#sha256")
            .expect("digest"),
        digest_value: [1u8, 2, 3, 4, 5, 6, 7].as_slice().try_into().expect("digest value"),
    });
    round_trip(&doc);
    let xml = to_xml(&doc);
    assert!(xml.contains("<DigestValue>AQIDBAUGBw==</DigestValue>"));
    assert!(xml.contains("<DigestMethod Algorithm=\"http://www.w3.org/2001/04/xmlenc#sha256\"/>"));
    assert!(xml.contains(" Id=\"ref-1\" Type=\"urn:type\" URI=\"#body\""));
}

#[test]
fn test_encoding_is_deterministic() {
    let doc = Iso20Document::SessionSetupReq(SessionSetupReq {
        header: header(),
        evcc_id: ExiString::try_from("PIXV12345678901231").expect("evccid"),
    });
    let mut clean = [0u8; 128];
    let mut dirty = [0xFFu8; 128];
    let a = encode_framed(&mut clean, &doc, PayloadType::ISO20_MAINSTREAM).expect("clean");
    let b = encode_framed(&mut dirty, &doc, PayloadType::ISO20_MAINSTREAM).expect("dirty");
    assert_eq!(a, b);
    assert_eq!(clean[..a], dirty[..b]);
}

#[test]
fn test_encode_at_offset() {
    let mut app_protocol = ExiArray::new();
    app_protocol
        .push(AppProtocol::new("urn:iso:15118:2:2013:MsgDef", 2, 0, 9, 1).expect("protocol"))
        .expect("push");
    let doc = AppHandDocument::SupportedAppProtocolReq(SupportedAppProtocolReq { app_protocol });
    let mut buf = [0xEEu8; 128];
    let len = encode_document(&doc, &mut buf, 3).expect("encode");
    assert_eq!(buf[..3], [0xEE; 3]);
    assert_eq!(buf[3], 0x80);
    let back: AppHandDocument = decode_document(&buf[..3 + len], 3).expect("decode");
    assert_eq!(back, doc);
}

proptest! {
    #[test]
    fn prop_bit_fields_read_back(fields in prop::collection::vec((1u32..=64, any::<u64>()), 0..40)) {
        let mut buf = [0u8; 512];
        let mut w = BitWriter::new(&mut buf, 0);
        let masked: Vec<(u32, u64)> = fields
            .iter()
            .map(|&(width, v)| (width, if width == 64 { v } else { v & ((1u64 << width) - 1) }))
            .collect();
        for &(width, v) in &masked {
            w.write_bits(width, v).unwrap();
        }
        let total: u32 = masked.iter().map(|f| f.0).sum();
        prop_assert_eq!(w.len(), (total as usize).div_ceil(8));
        let mut r = BitReader::new(&buf, 0);
        for &(width, v) in &masked {
            prop_assert_eq!(r.read_bits(width).unwrap(), v);
        }
    }

    #[test]
    fn prop_protocol_namespace_unicode(ns in "\\PC{0,25}", major in any::<u32>(), schema_id in any::<u8>(), priority in 1u8..=20) {
        let mut app_protocol = ExiArray::new();
        app_protocol.push(AppProtocol::new(&ns, major, u32::MAX, schema_id, priority).unwrap()).unwrap();
        let doc = AppHandDocument::SupportedAppProtocolReq(SupportedAppProtocolReq { app_protocol });
        let mut buf = [0u8; 1024];
        let len = encode_framed(&mut buf, &doc, PayloadType::SAP).unwrap();
        let back: AppHandDocument = decode_framed(&buf[..len], PayloadType::SAP).unwrap();
        prop_assert_eq!(back, doc);
    }

    #[test]
    fn prop_session_setup_req(
        session_id in prop::collection::vec(any::<u8>(), 0..=8),
        time_stamp in any::<u64>(),
        evcc_id in "[A-Z0-9*]{0,255}",
    ) {
        let doc = Iso20Document::SessionSetupReq(SessionSetupReq {
            header: MessageHeader::new(&session_id, time_stamp).unwrap(),
            evcc_id: ExiString::try_from(evcc_id.as_str()).unwrap(),
        });
        let mut buf = [0u8; 1024];
        let len = encode_framed(&mut buf, &doc, PayloadType::ISO20_MAINSTREAM).unwrap();
        let back: Iso20Document = decode_framed(&buf[..len], PayloadType::ISO20_MAINSTREAM).unwrap();
        prop_assert_eq!(back, doc);
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode_document::<AppHandDocument>(&data, 0);
        let _ = decode_document::<Iso20Document>(&data, 0);
        let _ = decode_document::<XmldsigFragment>(&data, 0);
    }
}
