//! V2GTP framing: the 8-byte header in front of every EXI payload.
//!
//! Layout: protocol version (0x01), inverse version (0xFE), payload type
//! (big-endian u16), payload length (big-endian u32).

use crate::codec::{decode_document, encode_document, CodecError, ExiDocument};
use byteorder::{BigEndian, ByteOrder};

pub const V2GTP_VERSION: u8 = 0x01;
pub const V2GTP_VERSION_INVERSE: u8 = !V2GTP_VERSION;
pub const V2GTP_HEADER_LEN: usize = 8;

/// 16-bit payload type tag. Opaque to the codec apart from comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadType(pub u16);

impl PayloadType {
    /// SupportedAppProtocol handshake.
    pub const SAP: PayloadType = PayloadType(0x8001);
    /// ISO 15118-2 and DIN 70121 share the handshake's tag.
    pub const ISO2_DIN: PayloadType = PayloadType(0x8001);
    pub const ISO20_MAINSTREAM: PayloadType = PayloadType(0x8002);
    pub const ISO20_AC: PayloadType = PayloadType(0x8003);
    pub const ISO20_DC: PayloadType = PayloadType(0x8004);
    pub const ISO20_ACDP: PayloadType = PayloadType(0x8005);
    pub const ISO20_WPT: PayloadType = PayloadType(0x8006);
    pub const SDP_REQUEST: PayloadType = PayloadType(0x9000);
    pub const SDP_RESPONSE: PayloadType = PayloadType(0x9001);

    pub fn name(self) -> Option<&'static str> {
        Some(match self.0 {
            0x8001 => "SAP/ISO2/DIN",
            0x8002 => "ISO20 mainstream",
            0x8003 => "ISO20 AC",
            0x8004 => "ISO20 DC",
            0x8005 => "ISO20 ACDP",
            0x8006 => "ISO20 WPT",
            0x9000 => "SDP request",
            0x9001 => "SDP response",
            _ => return None,
        })
    }
}

/// Decoded header fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2gtpHeader {
    pub payload_type: PayloadType,
    pub payload_length: u32,
}

impl V2gtpHeader {
    /// Validate the version pair and return the fields, whatever the type.
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() < V2GTP_HEADER_LEN {
            return Err(CodecError::MalformedHeader(format!(
                "{} bytes, header needs {}",
                buf.len(),
                V2GTP_HEADER_LEN
            )));
        }
        if buf[0] != V2GTP_VERSION || buf[1] != !buf[0] {
            return Err(CodecError::MalformedHeader(format!(
                "version {:#04x}, inverse {:#04x}",
                buf[0], buf[1]
            )));
        }
        Ok(V2gtpHeader {
            payload_type: PayloadType(BigEndian::read_u16(&buf[2..4])),
            payload_length: BigEndian::read_u32(&buf[4..8]),
        })
    }

    pub fn write(&self, buf: &mut [u8]) -> Result<(), CodecError> {
        if buf.len() < V2GTP_HEADER_LEN {
            return Err(CodecError::BufferOverflow);
        }
        buf[0] = V2GTP_VERSION;
        buf[1] = V2GTP_VERSION_INVERSE;
        BigEndian::write_u16(&mut buf[2..4], self.payload_type.0);
        BigEndian::write_u32(&mut buf[4..8], self.payload_length);
        Ok(())
    }
}

/// Write a header announcing `payload_length` bytes of `payload_type`.
pub fn write_header(
    buf: &mut [u8],
    payload_length: u32,
    payload_type: PayloadType,
) -> Result<(), CodecError> {
    V2gtpHeader {
        payload_type,
        payload_length,
    }
    .write(buf)
}

/// Validate the header and return the payload length.
pub fn read_header(buf: &[u8], expected: PayloadType) -> Result<u32, CodecError> {
    let header = V2gtpHeader::parse(buf)?;
    if header.payload_type != expected {
        return Err(CodecError::PayloadTypeMismatch {
            expected: expected.0,
            found: header.payload_type.0,
        });
    }
    Ok(header.payload_length)
}

/// Encode `doc` behind a header. Returns the total frame length.
pub fn encode_framed<D: ExiDocument>(
    buf: &mut [u8],
    doc: &D,
    payload_type: PayloadType,
) -> Result<usize, CodecError> {
    let payload_length = encode_document(doc, buf, V2GTP_HEADER_LEN)?;
    let announced = u32::try_from(payload_length).map_err(|_| CodecError::BufferOverflow)?;
    write_header(buf, announced, payload_type)?;
    tracing::trace!(
        payload_type = payload_type.0,
        payload_length,
        "encoded framed message"
    );
    Ok(V2GTP_HEADER_LEN + payload_length)
}

/// Decode a framed document, reading no further than the announced payload.
pub fn decode_framed<D: ExiDocument>(buf: &[u8], expected: PayloadType) -> Result<D, CodecError> {
    let payload_length = read_header(buf, expected)? as usize;
    let end = V2GTP_HEADER_LEN.saturating_add(payload_length);
    if buf.len() < end {
        tracing::debug!(
            available = buf.len() - V2GTP_HEADER_LEN,
            payload_length,
            "truncated frame"
        );
        return Err(CodecError::BufferOverflow);
    }
    decode_document(&buf[..end], V2GTP_HEADER_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let mut buf = [0u8; 8];
        write_header(&mut buf, 0x28, PayloadType::ISO20_MAINSTREAM).unwrap();
        assert_eq!(buf, [0x01, 0xFE, 0x80, 0x02, 0x00, 0x00, 0x00, 0x28]);
        assert_eq!(read_header(&buf, PayloadType::ISO20_MAINSTREAM).unwrap(), 0x28);
    }

    #[test]
    fn short_buffers() {
        let mut buf = [0u8; 7];
        assert!(matches!(
            write_header(&mut buf, 1, PayloadType::SAP),
            Err(CodecError::BufferOverflow)
        ));
        assert!(matches!(
            read_header(&buf, PayloadType::SAP),
            Err(CodecError::MalformedHeader(_))
        ));
    }
}
