//! Decoder fuzz target: feed arbitrary bytes to every message family, raw and framed.
//! Decoding must not panic. Whatever decodes must re-encode.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn check<D: v2g_exi::ExiDocument>(data: &[u8]) {
    if let Ok(doc) = v2g_exi::decode_document::<D>(data, 0) {
        let mut buf = vec![0u8; data.len() + 16];
        v2g_exi::encode_document(&doc, &mut buf, 0).expect("decoded document re-encodes");
    }
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use v2g_exi::app_hand::AppHandDocument;
    use v2g_exi::frame::{decode_framed, PayloadType};
    use v2g_exi::iso20::Iso20Document;
    use v2g_exi::xmldsig::XmldsigFragment;

    check::<AppHandDocument>(data);
    check::<Iso20Document>(data);
    check::<XmldsigFragment>(data);
    let _ = decode_framed::<AppHandDocument>(data, PayloadType::SAP);
    let _ = decode_framed::<Iso20Document>(data, PayloadType::ISO20_MAINSTREAM);
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
