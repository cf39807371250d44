//! Decode a V2GTP frame or raw EXI stream and print it as XML.
//!
//! Usage:
//!   exi_dump [OPTIONS] [HEX]
//!   exi_dump [OPTIONS] < frame.hex
//!
//! Input is hex text (whitespace ignored). By default it must start with a V2GTP
//! header and the message family is chosen from its payload type.
//!
//! Options:
//!   --family, -F <app-hand|iso20|xmldsig>   Force the message family
//!   --raw, -r                               No V2GTP header; requires --family
//!   --offset, -o <bytes>                    Bytes to skip before a raw EXI stream
//!
//! Set RUST_LOG=v2g_exi=trace to follow root selection and rejections.

use anyhow::{anyhow, bail, Context};
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;
use v2g_exi::app_hand::AppHandDocument;
use v2g_exi::frame::{decode_framed, PayloadType, V2gtpHeader};
use v2g_exi::iso20::Iso20Document;
use v2g_exi::xmldsig::XmldsigFragment;
use v2g_exi::{decode_document, to_xml};

#[derive(Clone, Copy, Debug)]
enum Family {
    AppHand,
    Iso20,
    Xmldsig,
}

impl Family {
    fn parse(s: &str) -> anyhow::Result<Self> {
        match s {
            "app-hand" | "sap" => Ok(Family::AppHand),
            "iso20" => Ok(Family::Iso20),
            "xmldsig" => Ok(Family::Xmldsig),
            other => bail!("unknown family {:?} (expected app-hand, iso20 or xmldsig)", other),
        }
    }

    fn for_payload(payload_type: PayloadType) -> Option<Self> {
        match payload_type {
            PayloadType::SAP => Some(Family::AppHand),
            PayloadType::ISO20_MAINSTREAM => Some(Family::Iso20),
            _ => None,
        }
    }
}

fn take_value(args: &mut Vec<String>, long: &str, short: &str) -> anyhow::Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == long || a == short) else {
        return Ok(None);
    };
    args.remove(pos);
    if pos >= args.len() {
        bail!("{} needs a value", long);
    }
    Ok(Some(args.remove(pos)))
}

fn take_flag(args: &mut Vec<String>, long: &str, short: &str) -> bool {
    match args.iter().position(|a| a == long || a == short) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn render_raw(family: Family, data: &[u8], offset: usize) -> anyhow::Result<String> {
    Ok(match family {
        Family::AppHand => to_xml(&decode_document::<AppHandDocument>(data, offset)?),
        Family::Iso20 => to_xml(&decode_document::<Iso20Document>(data, offset)?),
        Family::Xmldsig => to_xml(&decode_document::<XmldsigFragment>(data, offset)?),
    })
}

fn render_framed(family: Family, data: &[u8], payload_type: PayloadType) -> anyhow::Result<String> {
    Ok(match family {
        Family::AppHand => to_xml(&decode_framed::<AppHandDocument>(data, payload_type)?),
        Family::Iso20 => to_xml(&decode_framed::<Iso20Document>(data, payload_type)?),
        Family::Xmldsig => to_xml(&decode_framed::<XmldsigFragment>(data, payload_type)?),
    })
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let raw = take_flag(&mut args, "--raw", "-r");
    let family = take_value(&mut args, "--family", "-F")?
        .map(|s| Family::parse(&s))
        .transpose()?;
    let offset = take_value(&mut args, "--offset", "-o")?
        .map(|s| s.parse::<usize>().context("--offset must be a byte count"))
        .transpose()?
        .unwrap_or(0);

    let text = match args.first() {
        Some(hex_arg) => hex_arg.clone(),
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s).context("reading stdin")?;
            s
        }
    };
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let data = hex::decode(&compact).context("input is not valid hex")?;

    let xml = if raw {
        let family = family.ok_or_else(|| anyhow!("--raw requires --family"))?;
        render_raw(family, &data, offset)?
    } else {
        let header = V2gtpHeader::parse(&data)?;
        let family = match family.or_else(|| Family::for_payload(header.payload_type)) {
            Some(f) => f,
            None => bail!(
                "no message family for payload type {:#06x} ({})",
                header.payload_type.0,
                header.payload_type.name().unwrap_or("unknown")
            ),
        };
        eprintln!(
            "V2GTP payload type {:#06x}, {} bytes, decoding as {:?}",
            header.payload_type.0, header.payload_length, family
        );
        render_framed(family, &data, header.payload_type)?
    };
    print!("{}", xml);
    Ok(())
}
