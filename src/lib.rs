//! # v2g-exi: EXI codec for vehicle-to-grid messages
//!
//! Encodes and decodes ISO 15118 / DIN 70121 messages in the EXI bit-packed
//! format, plus the V2GTP framing header that carries them over TCP.
//!
//! ## Layers
//!
//! - **Bitstream**: MSB-first bit cursors over caller-owned buffers
//! - **Grammar**: static, schema-derived tables (attributes, particles, simple
//!   types, root elements) and the EXI event productions they imply
//! - **Codec**: one encoder/decoder engine interpreting the tables over typed
//!   values through [`ExiElement`] and [`ExiDocument`]
//! - **Frame**: V2GTP header (version, inverse version, payload type, length)
//!
//! ## Message families
//!
//! - [`app_hand`]: SupportedAppProtocol handshake
//! - [`iso20`]: ISO 15118-20 CommonMessages
//! - [`xmldsig`]: XML signature fragments as signed in ISO 15118-2
//!
//! Each family is a Rust enum with one variant per root element, so exactly one
//! message is selected by construction.
//!
//! ## Usage
//!
//! ```no_run
//! use v2g_exi::frame::{decode_framed, encode_framed, PayloadType};
//! use v2g_exi::iso20::{Iso20Document, MessageHeader, SessionSetupReq};
//!
//! let req = SessionSetupReq {
//!     header: MessageHeader::new(b"00000000", 1707896956850052)?,
//!     evcc_id: "PIXV12345678901231".try_into()?,
//! };
//! let mut buf = [0u8; 256];
//! let len = encode_framed(&mut buf, &Iso20Document::SessionSetupReq(req), PayloadType::ISO20_MAINSTREAM)?;
//! let back: Iso20Document = decode_framed(&buf[..len], PayloadType::ISO20_MAINSTREAM)?;
//! # Ok::<(), v2g_exi::CodecError>(())
//! ```

pub mod app_hand;
pub mod bitstream;
pub mod codec;
pub mod dump;
pub mod frame;
pub mod grammar;
pub mod iso20;
pub mod value;
pub mod xmldsig;

pub use bitstream::{BitReader, BitWriter};
pub use codec::{decode_document, encode_document, CodecError, ExiDocument, ExiElement};
pub use dump::{to_xml, XmlDump};
pub use frame::{
    decode_framed, encode_framed, read_header, write_header, PayloadType, V2gtpHeader,
    V2GTP_HEADER_LEN,
};
pub use value::{Enumerated, ExiArray, ExiBytes, ExiString};
